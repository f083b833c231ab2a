//! reqwest-backed collaborator client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::*;
use crate::config::AppConfig;
use crate::market::MarketSession;
use crate::withdrawal::PayoutProfile;

/// JSON-over-HTTP client for the ledger service.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpBackend {
    pub fn new(
        base_url: impl Into<String>,
        api_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, BackendError> {
        Self::new(
            config.backend_url.clone(),
            config.api_token.clone(),
            config.request_timeout,
        )
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Decodes 2xx and 4xx bodies: rejections come back as 4xx with a
    /// regular JSON body. A 5xx is never read as a clean rejection.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, BackendError> {
        let response = self.authorize(request).send().await.map_err(map_send)?;
        let status = response.status();
        if status.is_server_error() {
            warn!(%status, "Backend server error");
            return Err(BackendError::Malformed(format!("HTTP {}", status)));
        }

        // The server has answered; a failure from here on may follow a commit.
        let body = response.text().await.map_err(|e| {
            warn!(%status, error = %e, "Backend response body lost");
            if e.is_timeout() {
                BackendError::Timeout
            } else {
                BackendError::Malformed(format!("HTTP {}: {}", status, e))
            }
        })?;

        serde_json::from_str(&body).map_err(|e| {
            warn!(%status, error = %e, "Undecodable backend response");
            BackendError::Malformed(format!("HTTP {}: {}", status, e))
        })
    }
}

/// Only a failed connect proves the request was never delivered.
fn map_send(e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout
    } else if e.is_connect() {
        BackendError::Network(e.to_string())
    } else {
        BackendError::Malformed(e.to_string())
    }
}

#[async_trait]
impl WalletApi for HttpBackend {
    async fn fetch_balance(&self, user_id: UserId) -> Result<i64, BackendError> {
        let url = self.url(&format!("/balance/{}", user_id));
        let body: BalanceResponse = self.send_json(self.client.get(url)).await?;
        debug!(user_id, balance = body.balance, "Balance fetched");
        Ok(body.balance)
    }
}

#[async_trait]
impl SettlementApi for HttpBackend {
    async fn submit_bids(&self, submission: &BidSubmission) -> Result<BidResponse, BackendError> {
        let request = self.client.post(self.url("/bids")).json(submission);
        self.send_json(request).await
    }
}

#[async_trait]
impl WithdrawalApi for HttpBackend {
    async fn submit_withdrawal(
        &self,
        request: &WithdrawalRequest,
    ) -> Result<WithdrawalResponse, BackendError> {
        let request = self.client.post(self.url("/withdraw_funds")).json(request);
        self.send_json(request).await
    }

    async fn pending_withdrawals(&self, user_id: UserId) -> Result<Vec<WithdrawalRecord>, BackendError> {
        let url = self.url(&format!("/withdrawals/{}/pending", user_id));
        self.send_json(self.client.get(url)).await
    }
}

#[async_trait]
impl MarketApi for HttpBackend {
    async fn fetch_markets(&self) -> Result<Vec<MarketSession>, BackendError> {
        self.send_json(self.client.get(self.url("/markets"))).await
    }
}

#[async_trait]
impl PayoutProfileApi for HttpBackend {
    async fn fetch_profile(&self, user_id: UserId) -> Result<Option<PayoutProfile>, BackendError> {
        let request = self
            .client
            .post(self.url("/get_bank_info"))
            .json(&ProfileRequest { user_id });
        let body: ProfileResponse = self.send_json(request).await?;
        if !body.success {
            debug!(user_id, error = ?body.error, "No payout profile on file");
            return Ok(None);
        }
        Ok(Some(body.profile))
    }

    async fn store_bank_details(&self, details: &BankDetails) -> Result<StoreResponse, BackendError> {
        let request = self.client.post(self.url("/add_bank_info")).json(details);
        self.send_json(request).await
    }

    async fn store_upi_numbers(&self, numbers: &UpiNumbers) -> Result<StoreResponse, BackendError> {
        let request = self.client.post(self.url("/add_upi_number")).json(numbers);
        self.send_json(request).await
    }
}

#[async_trait]
impl BidHistoryApi for HttpBackend {
    async fn bid_history(&self, query: &BidHistoryQuery) -> Result<Vec<BidRecord>, BackendError> {
        let request = self.client.post(self.url("/user_bid_history")).json(query);
        let body: BidHistoryResponse = self.send_json(request).await?;
        Ok(if body.status == 1 { body.bids } else { Vec::new() })
    }
}
