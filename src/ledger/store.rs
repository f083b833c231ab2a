//! redb write-through store for the ledger.
//!
//! Every table holds JSON values. The in-memory maps stay authoritative for
//! reads; a mutation is applied in memory only after its write transaction
//! commits.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{Account, LedgerError, LedgerResult, Receipt};
use crate::backend::{BidRecord, UserId, WithdrawalRecord};
use crate::withdrawal::PayoutProfile;

/// UserId → Account
const ACCOUNTS: TableDefinition<u64, &[u8]> = TableDefinition::new("accounts");

/// Idempotency key → Receipt
const RECEIPTS: TableDefinition<&str, &[u8]> = TableDefinition::new("receipts");

/// UserId → PayoutProfile
const PROFILES: TableDefinition<u64, &[u8]> = TableDefinition::new("profiles");

/// bid_id → BidRecord
const BIDS: TableDefinition<&str, &[u8]> = TableDefinition::new("bids");

/// withdrawal_id → WithdrawalRecord
const WITHDRAWALS: TableDefinition<&str, &[u8]> = TableDefinition::new("withdrawals");

/// Everything on disk, as loaded at startup.
#[derive(Debug, Default)]
pub struct StoredState {
    pub accounts: Vec<(UserId, Account)>,
    pub receipts: Vec<(Uuid, Receipt)>,
    pub profiles: Vec<(UserId, PayoutProfile)>,
    pub bids: Vec<BidRecord>,
    pub withdrawals: Vec<WithdrawalRecord>,
}

pub struct LedgerStore {
    db: Database,
}

fn storage(e: impl std::fmt::Display) -> LedgerError {
    LedgerError::Storage(e.to_string())
}

fn encode<T: Serialize>(value: &T) -> LedgerResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(storage)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> LedgerResult<T> {
    serde_json::from_slice(bytes).map_err(storage)
}

impl LedgerStore {
    /// Creates `<dir>/ledger.redb` if needed.
    pub fn open(dir: impl AsRef<Path>) -> LedgerResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(storage)?;
        let path = dir.join("ledger.redb");
        info!(path = %path.display(), "Opening ledger database");

        let db = Database::create(&path).map_err(storage)?;
        let txn = db.begin_write().map_err(storage)?;
        {
            txn.open_table(ACCOUNTS).map_err(storage)?;
            txn.open_table(RECEIPTS).map_err(storage)?;
            txn.open_table(PROFILES).map_err(storage)?;
            txn.open_table(BIDS).map_err(storage)?;
            txn.open_table(WITHDRAWALS).map_err(storage)?;
        }
        txn.commit().map_err(storage)?;

        Ok(Self { db })
    }

    pub fn load(&self) -> LedgerResult<StoredState> {
        let txn = self.db.begin_read().map_err(storage)?;
        let mut state = StoredState::default();

        let table = txn.open_table(ACCOUNTS).map_err(storage)?;
        for entry in table.iter().map_err(storage)? {
            let (key, value) = entry.map_err(storage)?;
            state.accounts.push((key.value(), decode(value.value())?));
        }

        let table = txn.open_table(RECEIPTS).map_err(storage)?;
        for entry in table.iter().map_err(storage)? {
            let (key, value) = entry.map_err(storage)?;
            let token = Uuid::parse_str(key.value()).map_err(storage)?;
            state.receipts.push((token, decode(value.value())?));
        }

        let table = txn.open_table(PROFILES).map_err(storage)?;
        for entry in table.iter().map_err(storage)? {
            let (key, value) = entry.map_err(storage)?;
            state.profiles.push((key.value(), decode(value.value())?));
        }

        let table = txn.open_table(BIDS).map_err(storage)?;
        for entry in table.iter().map_err(storage)? {
            let (_, value) = entry.map_err(storage)?;
            state.bids.push(decode(value.value())?);
        }

        let table = txn.open_table(WITHDRAWALS).map_err(storage)?;
        for entry in table.iter().map_err(storage)? {
            let (_, value) = entry.map_err(storage)?;
            state.withdrawals.push(decode(value.value())?);
        }

        info!(
            accounts = state.accounts.len(),
            receipts = state.receipts.len(),
            bids = state.bids.len(),
            "Ledger state loaded"
        );
        Ok(state)
    }

    pub fn save_account(&self, user_id: UserId, account: &Account) -> LedgerResult<()> {
        let bytes = encode(account)?;
        self.write(|txn| {
            txn.open_table(ACCOUNTS)?.insert(user_id, bytes.as_slice())?;
            Ok(())
        })
    }

    pub fn save_profile(&self, user_id: UserId, profile: &PayoutProfile) -> LedgerResult<()> {
        let bytes = encode(profile)?;
        self.write(|txn| {
            txn.open_table(PROFILES)?.insert(user_id, bytes.as_slice())?;
            Ok(())
        })
    }

    /// Debit, receipt and bid records in one transaction.
    pub fn commit_bids(
        &self,
        user_id: UserId,
        account: &Account,
        token: Uuid,
        receipt: &Receipt,
        bids: &[BidRecord],
    ) -> LedgerResult<()> {
        let account_bytes = encode(account)?;
        let receipt_bytes = encode(receipt)?;
        let records = bids
            .iter()
            .map(|b| -> LedgerResult<(&str, Vec<u8>)> { Ok((b.bid_id.as_str(), encode(b)?)) })
            .collect::<LedgerResult<Vec<_>>>()?;
        let key = token.to_string();

        self.write(|txn| {
            txn.open_table(ACCOUNTS)?.insert(user_id, account_bytes.as_slice())?;
            txn.open_table(RECEIPTS)?.insert(key.as_str(), receipt_bytes.as_slice())?;
            let mut table = txn.open_table(BIDS)?;
            for (id, bytes) in &records {
                table.insert(*id, bytes.as_slice())?;
            }
            Ok(())
        })
    }

    /// Debit, receipt and pending withdrawal in one transaction.
    pub fn commit_withdrawal(
        &self,
        user_id: UserId,
        account: &Account,
        token: Uuid,
        receipt: &Receipt,
        record: &WithdrawalRecord,
    ) -> LedgerResult<()> {
        let account_bytes = encode(account)?;
        let receipt_bytes = encode(receipt)?;
        let record_bytes = encode(record)?;
        let key = token.to_string();

        self.write(|txn| {
            txn.open_table(ACCOUNTS)?.insert(user_id, account_bytes.as_slice())?;
            txn.open_table(RECEIPTS)?.insert(key.as_str(), receipt_bytes.as_slice())?;
            txn.open_table(WITHDRAWALS)?
                .insert(record.withdrawal_id.as_str(), record_bytes.as_slice())?;
            Ok(())
        })
    }

    /// Commits inline so a commit and its in-memory apply cannot be split
    /// by a cancelled caller.
    fn write<F>(&self, f: F) -> LedgerResult<()>
    where
        F: FnOnce(&WriteTransaction) -> Result<(), redb::Error>,
    {
        let txn = self.db.begin_write().map_err(storage)?;
        f(&txn).map_err(storage)?;
        txn.commit().map_err(storage)
    }
}
