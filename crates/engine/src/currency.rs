use std::fmt;

use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO 4217-style currency code of an invoice.
///
/// Invoices may be denominated in any currency; every cross-invoice figure is
/// expressed in the single [reporting currency](Currency::reporting) instead.
///
/// Codes are normalized to upper case on parse, so `"hkd"` and `"HKD"` are the
/// same currency.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

/// Code of the reporting currency.
pub const REPORTING_CURRENCY: &str = "USD";

impl Currency {
    /// The currency all `target_amount`s and statistics are expressed in.
    #[must_use]
    pub fn reporting() -> Self {
        Self(REPORTING_CURRENCY.to_string())
    }

    /// Canonical currency code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_reporting(&self) -> bool {
        self.0 == REPORTING_CURRENCY
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::reporting()
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let code = value.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::InvalidCurrency(format!(
                "unsupported currency: {}",
                value.trim()
            )));
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for Currency {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}
