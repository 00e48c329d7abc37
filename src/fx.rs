//! Exchange Rate Table
//!
//! Static conversion multipliers between the four supported currencies,
//! plus the transfer quote (settled amount, fee, gas) derived from them.
//!
//! The table is hand-authored and intentionally not reciprocal-consistent
//! (USD→EUR is 0.85 while EUR→USD is 1.18).

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::money::Currency;
use crate::transfer::error::TransferError;

/// Transfer fee rate: 0.1% of the requested amount
pub const FEE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

/// Simulated gas charged per transaction (informational only)
pub const GAS_USED: Decimal = Decimal::from_parts(100, 0, 0, false, 1);

/// Conversion multiplier from `from` to `to`
///
/// Total over [`Currency`]: every pair has an entry, same-currency pairs are 1.
pub fn rate(from: Currency, to: Currency) -> Decimal {
    use Currency::*;

    match (from, to) {
        (a, b) if a == b => Decimal::ONE,
        (Usd, Eur) => Decimal::new(85, 2),
        (Usd, Gbp) => Decimal::new(75, 2),
        (Usd, Jpy) => Decimal::from(110),
        (Eur, Usd) => Decimal::new(118, 2),
        (Eur, Gbp) => Decimal::new(88, 2),
        (Eur, Jpy) => Decimal::from(130),
        (Gbp, Usd) => Decimal::new(133, 2),
        (Gbp, Eur) => Decimal::new(114, 2),
        (Gbp, Jpy) => Decimal::from(150),
        (Jpy, Usd) => Decimal::new(9, 3),
        (Jpy, Eur) => Decimal::new(77, 4),
        (Jpy, Gbp) => Decimal::new(67, 4),
        // Unreachable: same-currency pairs are handled by the guard above
        _ => Decimal::ONE,
    }
}

/// Parse a pair of raw currency codes
pub fn resolve_pair(from: &str, to: &str) -> Result<(Currency, Currency), TransferError> {
    match (from.parse::<Currency>(), to.parse::<Currency>()) {
        (Ok(f), Ok(t)) => Ok((f, t)),
        _ => Err(TransferError::UnsupportedCurrencyPair {
            from: from.to_string(),
            to: to.to_string(),
        }),
    }
}

/// Look up a rate by raw currency codes
///
/// Unknown codes are an error; there is no parity fallback.
pub fn rate_for_codes(from: &str, to: &str) -> Result<Decimal, TransferError> {
    let (f, t) = resolve_pair(from, to)?;
    Ok(rate(f, t))
}

/// Amounts derived from a transfer request at acceptance time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub exchange_rate: Decimal,
    pub settled_amount: Decimal,
    pub fee: Decimal,
    pub gas_used: Decimal,
}

impl Quote {
    pub fn compute(amount: Decimal, from: Currency, to: Currency) -> Self {
        let exchange_rate = rate(from, to);
        Self {
            exchange_rate,
            settled_amount: amount * exchange_rate,
            fee: amount * FEE_RATE,
            gas_used: GAS_USED,
        }
    }
}

/// One row of the public rate table
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RateEntry {
    pub from: Currency,
    pub to: Currency,
    #[schema(value_type = String, example = "0.85")]
    pub rate: Decimal,
}

/// Full cross table, source-major in [`Currency::ALL`] order
pub fn rate_table() -> Vec<RateEntry> {
    Currency::ALL
        .iter()
        .flat_map(|&from| {
            Currency::ALL.iter().map(move |&to| RateEntry {
                from,
                to,
                rate: rate(from, to),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_same_currency_is_parity() {
        for c in Currency::ALL {
            assert_eq!(rate(c, c), Decimal::ONE, "rate({c},{c})");
        }
    }

    #[test]
    fn test_every_rate_is_positive() {
        for entry in rate_table() {
            assert!(entry.rate > Decimal::ZERO);
        }
        assert_eq!(rate_table().len(), 16);
    }

    #[test]
    fn test_table_is_not_reciprocal() {
        assert_eq!(rate(Currency::Usd, Currency::Eur), dec("0.85"));
        assert_eq!(rate(Currency::Eur, Currency::Usd), dec("1.18"));
        assert_ne!(
            rate(Currency::Usd, Currency::Eur) * rate(Currency::Eur, Currency::Usd),
            Decimal::ONE
        );
    }

    #[test]
    fn test_jpy_rates() {
        assert_eq!(rate(Currency::Jpy, Currency::Usd), dec("0.009"));
        assert_eq!(rate(Currency::Jpy, Currency::Eur), dec("0.0077"));
        assert_eq!(rate(Currency::Jpy, Currency::Gbp), dec("0.0067"));
        assert_eq!(rate(Currency::Gbp, Currency::Jpy), dec("150"));
    }

    #[test]
    fn test_rate_for_codes_rejects_unknown() {
        assert_eq!(rate_for_codes("usd", "EUR").unwrap(), dec("0.85"));

        let err = rate_for_codes("USD", "CHF").unwrap_err();
        assert!(matches!(
            err,
            TransferError::UnsupportedCurrencyPair { ref to, .. } if to == "CHF"
        ));
    }

    #[test]
    fn test_quote_usd_to_eur() {
        let q = Quote::compute(dec("50.00"), Currency::Usd, Currency::Eur);
        assert_eq!(q.exchange_rate, dec("0.85"));
        assert_eq!(q.settled_amount, dec("42.50"));
        assert_eq!(q.fee, dec("0.05"));
        assert_eq!(q.gas_used, dec("10.0"));
    }

    #[test]
    fn test_fee_constants() {
        assert_eq!(FEE_RATE, dec("0.001"));
        assert_eq!(GAS_USED, dec("10"));
    }
}
