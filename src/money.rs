//! Money Module
//!
//! Currency codes and the decimal amount type used at the API boundary.
//! All monetary values are `rust_decimal::Decimal`; floats never touch a balance.
//!
//! ## Usage
//! ```rust
//! use remitflow::money::{Currency, parse_amount};
//!
//! let ccy: Currency = "usd".parse().unwrap();
//! assert_eq!(ccy, Currency::Usd);
//!
//! let amount = parse_amount("50.00").unwrap();
//! assert_eq!(amount.to_string(), "50.00");
//! ```

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

/// Maximum fractional digits accepted for a transfer amount
pub const MAX_AMOUNT_DECIMALS: u32 = 8;

// ============================================================================
// Error Types
// ============================================================================

/// Money parsing errors
#[derive(Debug, Error, PartialEq)]
pub enum MoneyError {
    #[error("Unsupported currency: {0}")]
    UnsupportedCurrency(String),

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),
}

// ============================================================================
// Currency
// ============================================================================

/// Supported currency codes
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Eur,
    Gbp,
    Jpy,
}

impl Currency {
    /// All supported currencies, in display order
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Eur, Currency::Gbp, Currency::Jpy];

    /// ISO 4217 code
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Gbp => "GBP",
            Currency::Jpy => "JPY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Currency {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "GBP" => Ok(Currency::Gbp),
            "JPY" => Ok(Currency::Jpy),
            _ => Err(MoneyError::UnsupportedCurrency(s.to_string())),
        }
    }
}

// ============================================================================
// Amount parsing
// ============================================================================

/// Parse a client-provided amount string into a positive Decimal
///
/// Rejects `.5`, `5.`, `+5`, scientific notation, zero, negatives and more than
/// [`MAX_AMOUNT_DECIMALS`] fractional digits.
pub fn parse_amount(s: &str) -> Result<Decimal, MoneyError> {
    let s = s.trim();

    if s.is_empty() {
        return Err(MoneyError::InvalidFormat("amount cannot be empty".into()));
    }
    if s.starts_with('.') {
        return Err(MoneyError::InvalidFormat("use 0.5 not .5".into()));
    }
    if s.ends_with('.') {
        return Err(MoneyError::InvalidFormat("use 5.0 not 5.".into()));
    }
    if s.contains('e') || s.contains('E') {
        return Err(MoneyError::InvalidFormat(
            "scientific notation not allowed".into(),
        ));
    }
    if s.starts_with('+') {
        return Err(MoneyError::InvalidFormat("+ prefix not allowed".into()));
    }

    let d = Decimal::from_str(s).map_err(|e| MoneyError::InvalidFormat(e.to_string()))?;
    check_amount(d)
}

/// Validate an already-parsed amount (positive, bounded precision)
pub fn check_amount(d: Decimal) -> Result<Decimal, MoneyError> {
    if d <= Decimal::ZERO {
        return Err(MoneyError::InvalidAmount);
    }
    let scale = d.normalize().scale();
    if scale > MAX_AMOUNT_DECIMALS {
        return Err(MoneyError::PrecisionOverflow {
            provided: scale,
            max: MAX_AMOUNT_DECIMALS,
        });
    }
    Ok(d)
}

// ============================================================================
// StrictDecimal: Format-Validated Decimal at Serde Layer
// ============================================================================

/// Request amount accepting either a JSON string (`"50.00"`) or a JSON number (`50`).
///
/// String input goes through [`parse_amount`]; numbers are checked with
/// [`check_amount`]. Serializes as a string to preserve precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrictDecimal(Decimal);

impl StrictDecimal {
    /// Get the inner Decimal value
    pub fn inner(self) -> Decimal {
        self.0
    }

    pub fn from_decimal(d: Decimal) -> Self {
        Self(d)
    }
}

impl std::ops::Deref for StrictDecimal {
    type Target = Decimal;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'de> Deserialize<'de> for StrictDecimal {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum DecimalOrString {
            String(String),
            Number(Decimal),
        }

        let d = match DecimalOrString::deserialize(deserializer)? {
            DecimalOrString::String(s) => parse_amount(&s),
            DecimalOrString::Number(d) => check_amount(d),
        }
        .map_err(|e| D::Error::custom(e.to_string()))?;

        Ok(StrictDecimal(d))
    }
}

impl Serialize for StrictDecimal {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.0.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_parse_case_insensitive() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(" Eur ".parse::<Currency>().unwrap(), Currency::Eur);
        assert_eq!("GBP".parse::<Currency>().unwrap(), Currency::Gbp);
        assert_eq!("jpy".parse::<Currency>().unwrap(), Currency::Jpy);
    }

    #[test]
    fn test_currency_rejects_unknown() {
        assert_eq!(
            "CHF".parse::<Currency>(),
            Err(MoneyError::UnsupportedCurrency("CHF".to_string()))
        );
    }

    #[test]
    fn test_currency_serde_uses_iso_code() {
        assert_eq!(serde_json::to_string(&Currency::Jpy).unwrap(), r#""JPY""#);
        let c: Currency = serde_json::from_str(r#""GBP""#).unwrap();
        assert_eq!(c, Currency::Gbp);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("50.00").unwrap(), Decimal::new(5000, 2));
        assert_eq!(parse_amount("0.00000001").unwrap(), Decimal::new(1, 8));
        assert_eq!(parse_amount(" 7 ").unwrap(), Decimal::from(7));

        assert_eq!(parse_amount("0"), Err(MoneyError::InvalidAmount));
        assert_eq!(parse_amount("-1"), Err(MoneyError::InvalidAmount));
        assert!(parse_amount("").is_err());
        assert!(parse_amount(".5").is_err());
        assert!(parse_amount("5.").is_err());
        assert!(parse_amount("1e3").is_err());
        assert!(parse_amount("+1").is_err());
        assert!(parse_amount("abc").is_err());
        assert_eq!(
            parse_amount("0.000000001"),
            Err(MoneyError::PrecisionOverflow {
                provided: 9,
                max: MAX_AMOUNT_DECIMALS
            })
        );
    }

    #[test]
    fn test_trailing_zeros_do_not_count_as_precision() {
        assert!(parse_amount("1.0000000000").is_ok());
    }

    #[test]
    fn test_strict_decimal_accepts_string_and_number() {
        let d: StrictDecimal = serde_json::from_str(r#""12.5""#).unwrap();
        assert_eq!(*d, Decimal::new(125, 1));

        let d: StrictDecimal = serde_json::from_str("80").unwrap();
        assert_eq!(*d, Decimal::from(80));
    }

    #[test]
    fn test_strict_decimal_rejects_negative_number() {
        let result: Result<StrictDecimal, _> = serde_json::from_str("-1.5");
        assert!(result.unwrap_err().to_string().contains("must be positive"));
    }

    #[test]
    fn test_strict_decimal_serializes_as_string() {
        let d = StrictDecimal::from_decimal(Decimal::new(4250, 2));
        assert_eq!(serde_json::to_string(&d).unwrap(), r#""42.50""#);
    }
}
