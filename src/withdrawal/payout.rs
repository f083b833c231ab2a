//! Registered payout methods and their registration rules.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::backend::{BankDetails, UpiNumbers};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayoutMethodKind {
    Bank,
    Paytm,
    Phonepe,
    Gpay,
}

impl fmt::Display for PayoutMethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PayoutMethodKind::Bank => "bank",
            PayoutMethodKind::Paytm => "paytm",
            PayoutMethodKind::Phonepe => "phonepe",
            PayoutMethodKind::Gpay => "gpay",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayoutMethod {
    pub kind: PayoutMethodKind,
    pub label: String,
}

/// Payout fields on file for one user. Any of them may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutProfile {
    #[serde(default)]
    pub ac_holder_name: Option<String>,
    #[serde(default)]
    pub bank_name: Option<String>,
    #[serde(default)]
    pub ac_number: Option<String>,
    #[serde(default)]
    pub ifsc_code: Option<String>,
    #[serde(default)]
    pub paytm_number: Option<String>,
    #[serde(default)]
    pub phonepe_number: Option<String>,
    #[serde(default)]
    pub gpay_number: Option<String>,
}

fn filled(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl PayoutProfile {
    /// Methods whose field is non-empty, in offer order. Bank is keyed on
    /// the account number.
    pub fn available_methods(&self) -> Vec<PayoutMethod> {
        let mut methods = Vec::new();
        if let Some(ac) = filled(&self.ac_number) {
            let bank = filled(&self.bank_name).unwrap_or("Bank");
            methods.push(PayoutMethod {
                kind: PayoutMethodKind::Bank,
                label: format!("{} ({})", bank, ac),
            });
        }
        let upi = [
            (PayoutMethodKind::Paytm, "Paytm", &self.paytm_number),
            (PayoutMethodKind::Phonepe, "PhonePe", &self.phonepe_number),
            (PayoutMethodKind::Gpay, "GPay", &self.gpay_number),
        ];
        for (kind, name, field) in upi {
            if let Some(number) = filled(field) {
                methods.push(PayoutMethod {
                    kind,
                    label: format!("{}: {}", name, number),
                });
            }
        }
        methods
    }

    pub fn has(&self, kind: PayoutMethodKind) -> bool {
        self.available_methods().iter().any(|m| m.kind == kind)
    }

    pub fn apply_bank_details(&mut self, details: &BankDetails) {
        self.ac_holder_name = Some(details.ac_holder_name.trim().to_string());
        self.bank_name = Some(details.bank_name.trim().to_string());
        self.ac_number = Some(details.ac_number.trim().to_string());
        self.ifsc_code = Some(details.ifsc_code.trim().to_string());
    }

    /// Absent or blank numbers clear the stored value.
    pub fn apply_upi_numbers(&mut self, numbers: &UpiNumbers) {
        let clean = |n: &Option<String>| filled(n).map(str::to_string);
        self.paytm_number = clean(&numbers.paytm_number);
        self.phonepe_number = clean(&numbers.phonepe_number);
        self.gpay_number = clean(&numbers.gpay_number);
    }
}

// ============================================================================
// REGISTRATION RULES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("Please fill all required fields ({0} is missing)")]
    MissingField(&'static str),

    #[error("Invalid IFSC code: {0}")]
    InvalidIfsc(String),

    #[error("Enter at least one valid 10-digit UPI number")]
    NoUpiNumber,

    #[error("Invalid {method} number: {number}")]
    InvalidUpiNumber { method: PayoutMethodKind, number: String },
}

/// 11 characters: 4 uppercase letters, a literal `0`, 6 uppercase alphanumerics.
pub fn validate_ifsc(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 11
        && bytes[..4].iter().all(u8::is_ascii_uppercase)
        && bytes[4] == b'0'
        && bytes[5..]
            .iter()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
}

pub fn validate_bank_details(details: &BankDetails) -> Result<(), RegistrationError> {
    let required = [
        ("ac_holder_name", &details.ac_holder_name),
        ("bank_name", &details.bank_name),
        ("ac_number", &details.ac_number),
    ];
    for (name, value) in required {
        if value.trim().is_empty() {
            return Err(RegistrationError::MissingField(name));
        }
    }
    let ifsc = details.ifsc_code.trim();
    if !validate_ifsc(ifsc) {
        return Err(RegistrationError::InvalidIfsc(ifsc.to_string()));
    }
    Ok(())
}

/// At least one number present, and every present number is 10 digits.
pub fn validate_upi_numbers(numbers: &UpiNumbers) -> Result<(), RegistrationError> {
    let entries = [
        (PayoutMethodKind::Paytm, &numbers.paytm_number),
        (PayoutMethodKind::Phonepe, &numbers.phonepe_number),
        (PayoutMethodKind::Gpay, &numbers.gpay_number),
    ];

    let mut any = false;
    for (method, field) in entries {
        let Some(number) = filled(field) else { continue };
        if number.len() != 10 || !number.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RegistrationError::InvalidUpiNumber {
                method,
                number: number.to_string(),
            });
        }
        any = true;
    }

    if any {
        Ok(())
    } else {
        Err(RegistrationError::NoUpiNumber)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_registered_methods_offered() {
        let profile = PayoutProfile {
            phonepe_number: Some("9876543210".into()),
            gpay_number: Some("  ".into()),
            ..Default::default()
        };
        let methods = profile.available_methods();
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].kind, PayoutMethodKind::Phonepe);
        assert!(!profile.has(PayoutMethodKind::Bank));
    }

    #[test]
    fn test_offer_order() {
        let profile = PayoutProfile {
            bank_name: Some("SBI".into()),
            ac_number: Some("001122".into()),
            paytm_number: Some("9000000001".into()),
            gpay_number: Some("9000000002".into()),
            ..Default::default()
        };
        let kinds: Vec<_> = profile.available_methods().into_iter().map(|m| m.kind).collect();
        assert_eq!(kinds, vec![PayoutMethodKind::Bank, PayoutMethodKind::Paytm, PayoutMethodKind::Gpay]);
        assert_eq!(profile.available_methods()[0].label, "SBI (001122)");
    }

    #[test]
    fn test_ifsc_format() {
        assert!(validate_ifsc("SBIN0001234"));
        assert!(validate_ifsc("HDFC0ABC123"));
        assert!(!validate_ifsc("SBIN1001234"));
        assert!(!validate_ifsc("sbin0001234"));
        assert!(!validate_ifsc("SBIN000123"));
    }

    #[test]
    fn test_bank_details_required_fields() {
        let mut details = BankDetails {
            user_id: 1,
            ac_holder_name: "R Sharma".into(),
            bank_name: "SBI".into(),
            ac_number: "".into(),
            ifsc_code: "SBIN0001234".into(),
        };
        assert_eq!(validate_bank_details(&details), Err(RegistrationError::MissingField("ac_number")));
        details.ac_number = "12345678".into();
        assert!(validate_bank_details(&details).is_ok());
    }

    #[test]
    fn test_upi_numbers() {
        let mut numbers = UpiNumbers { user_id: 1, ..Default::default() };
        assert_eq!(validate_upi_numbers(&numbers), Err(RegistrationError::NoUpiNumber));

        numbers.paytm_number = Some("98765".into());
        assert!(matches!(
            validate_upi_numbers(&numbers),
            Err(RegistrationError::InvalidUpiNumber { method: PayoutMethodKind::Paytm, .. })
        ));

        numbers.paytm_number = Some("9876543210".into());
        numbers.gpay_number = Some("".into());
        assert!(validate_upi_numbers(&numbers).is_ok());
    }
}
