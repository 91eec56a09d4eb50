//! Monetary types for the CoreBank engines.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// A monetary amount with currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    /// The amount value (high precision decimal).
    pub value: Decimal,
    /// ISO 4217 currency code.
    pub currency: Currency,
}

impl Money {
    /// Create a new Money instance.
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    /// Parse from the decimal-string wire representation.
    pub fn parse(value: &str, currency: Currency) -> Result<Self, rust_decimal::Error> {
        Ok(Self {
            value: Decimal::from_str(value)?,
            currency,
        })
    }

    /// Create a zero amount in the given currency.
    pub fn zero(currency: Currency) -> Self {
        Self {
            value: Decimal::ZERO,
            currency,
        }
    }

    /// Check if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.value > Decimal::ZERO
    }

    /// Check if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    /// Get the absolute value.
    pub fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
            currency: self.currency.clone(),
        }
    }

    /// Round to the currency's standard decimal places.
    pub fn round(&self) -> Self {
        let places = self.currency.decimal_places();
        Self {
            value: self.value.round_dp(places),
            currency: self.currency.clone(),
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

impl Add for Money {
    type Output = Result<Money, CurrencyMismatchError>;

    fn add(self, other: Money) -> Self::Output {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money {
            value: self.value + other.value,
            currency: self.currency,
        })
    }
}

impl Sub for Money {
    type Output = Result<Money, CurrencyMismatchError>;

    fn sub(self, other: Money) -> Self::Output {
        if self.currency != other.currency {
            return Err(CurrencyMismatchError {
                expected: self.currency,
                actual: other.currency,
            });
        }
        Ok(Money {
            value: self.value - other.value,
            currency: self.currency,
        })
    }
}

/// Error when attempting operations on different currencies.
#[derive(Debug, Clone)]
pub struct CurrencyMismatchError {
    pub expected: Currency,
    pub actual: Currency,
}

impl fmt::Display for CurrencyMismatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Currency mismatch: expected {}, got {}",
            self.expected, self.actual
        )
    }
}

impl std::error::Error for CurrencyMismatchError {}

/// ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Create a new currency from code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into().to_uppercase())
    }

    /// Get the currency code.
    pub fn code(&self) -> &str {
        &self.0
    }

    /// Get the standard decimal places for this currency.
    pub fn decimal_places(&self) -> u32 {
        match self.0.as_str() {
            "JPY" | "KRW" | "VND" => 0,
            "BHD" | "KWD" | "OMR" => 3,
            _ => 2,
        }
    }

    /// Common currencies
    pub fn usd() -> Self {
        Self::new("USD")
    }

    pub fn eur() -> Self {
        Self::new("EUR")
    }

    pub fn gbp() -> Self {
        Self::new("GBP")
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Currency {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A currency pair for FX quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency (the remitter's account currency).
    pub base: Currency,
    /// Quote currency (the settlement currency).
    pub quote: Currency,
}

impl CurrencyPair {
    /// Create a new currency pair.
    pub fn new(base: Currency, quote: Currency) -> Self {
        Self { base, quote }
    }

    /// Check if both sides are the same currency.
    pub fn is_identity(&self) -> bool {
        self.base == self.quote
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A configured FX rate between two currencies. The engine carries a single
/// mid-market style rate per pair; the bid/ask spread is out of scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FxRate {
    /// The currency pair.
    pub pair: CurrencyPair,
    /// Units of quote currency per unit of base currency.
    pub rate: Decimal,
}

impl FxRate {
    /// Create a new FX rate.
    pub fn new(pair: CurrencyPair, rate: Decimal) -> Self {
        Self { pair, rate }
    }

    /// Convert an amount from the base to the quote currency.
    pub fn convert(&self, amount: &Money) -> Result<Money, CurrencyMismatchError> {
        if amount.currency != self.pair.base {
            return Err(CurrencyMismatchError {
                expected: self.pair.base.clone(),
                actual: amount.currency.clone(),
            });
        }
        Ok(Money::new(amount.value * self.rate, self.pair.quote.clone()).round())
    }
}

/// Account balance snapshot.
///
/// `available` reflects in-flight holds and is the balance checked for
/// sufficiency; `current` only moves when a posting commits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Currency of the balance.
    pub currency: Currency,
    /// Available balance (net of holds).
    pub available: Decimal,
    /// Current (booked) balance.
    pub current: Decimal,
    /// When this snapshot was taken.
    pub as_of: chrono::DateTime<chrono::Utc>,
}

impl Balance {
    /// Create a balance snapshot, rounded to the currency's decimal places.
    pub fn new(currency: Currency, available: Decimal, current: Decimal) -> Self {
        let places = currency.decimal_places();
        Self {
            currency,
            available: available.round_dp(places),
            current: current.round_dp(places),
            as_of: chrono::Utc::now(),
        }
    }

    /// Check if the available balance covers the given amount.
    pub fn covers(&self, amount: Decimal) -> bool {
        self.available >= amount
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} available={} current={}",
            self.currency, self.available, self.current
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money_operations() {
        let m1 = Money::parse("100.00", Currency::usd()).unwrap();
        let m2 = Money::parse("50.00", Currency::usd()).unwrap();

        let sum = (m1.clone() + m2.clone()).unwrap();
        assert_eq!(sum.value, dec!(150.00));

        let diff = (m1 - m2).unwrap();
        assert_eq!(diff.value, dec!(50.00));
    }

    #[test]
    fn test_currency_mismatch() {
        let m1 = Money::parse("100.00", Currency::usd()).unwrap();
        let m2 = Money::parse("100.00", Currency::eur()).unwrap();

        assert!((m1 + m2).is_err());
    }

    #[test]
    fn test_fx_rate_conversion() {
        let rate = FxRate::new(
            CurrencyPair::new(Currency::eur(), Currency::usd()),
            dec!(1.15),
        );

        let eur = Money::parse("100.00", Currency::eur()).unwrap();
        let usd = rate.convert(&eur).unwrap();

        assert_eq!(usd.currency, Currency::usd());
        assert_eq!(usd.value, dec!(115.00));

        let wrong = Money::parse("100.00", Currency::gbp()).unwrap();
        assert!(rate.convert(&wrong).is_err());
    }

    #[test]
    fn test_currency_decimal_places() {
        assert_eq!(Currency::usd().decimal_places(), 2);
        assert_eq!(Currency::new("JPY").decimal_places(), 0);
    }

    #[test]
    fn test_balance_rounding() {
        let balance = Balance::new(Currency::eur(), dec!(100.006), dec!(99.999));
        assert_eq!(balance.available, dec!(100.01));
        assert_eq!(balance.current, dec!(100.00));
        assert!(balance.covers(dec!(100.00)));
        assert!(!balance.covers(dec!(100.02)));
    }
}
