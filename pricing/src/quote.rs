//! Quote types.

use chrono::{DateTime, Utc};
use corebank_common::{time, Currency, FxRate, QuoteId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A fee line on a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    /// What the fee is for.
    pub description: String,
    /// Fee amount, in the quote currency.
    pub amount: Decimal,
}

impl Fee {
    /// Create a new fee line.
    pub fn new(description: impl Into<String>, amount: Decimal) -> Self {
        Self {
            description: description.into(),
            amount,
        }
    }
}

/// A priced FX/fee offer. Looked up by id and redeemed at most once;
/// redemption compares the caller's copy against the stored quote for exact
/// equality, so every field participates in `PartialEq`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Unique quote ID.
    pub id: QuoteId,
    /// Currency the remitter's account is denominated in.
    pub base_currency: Currency,
    /// Currency the transfer settles in.
    pub quote_currency: Currency,
    /// Conversion rate, absent for same-currency quotes.
    pub fx_rate: Option<FxRate>,
    /// Itemized fees.
    pub fees: Vec<Fee>,
    /// Sum of all fees.
    pub total_fees: Decimal,
    /// When the quote was issued.
    pub issued_at: DateTime<Utc>,
    /// When the quote expires.
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    /// Create a new quote expiring after the standard validity window.
    pub fn new(
        base_currency: Currency,
        quote_currency: Currency,
        fx_rate: Option<FxRate>,
        fees: Vec<Fee>,
    ) -> Self {
        let total_fees = fees.iter().map(|f| f.amount).sum();
        let issued_at = time::now();
        Self {
            id: QuoteId::new(),
            base_currency,
            quote_currency,
            fx_rate,
            fees,
            total_fees,
            issued_at,
            expires_at: issued_at + time::constants::quote_validity(),
        }
    }

    /// Check if the quote has expired.
    pub fn is_expired(&self) -> bool {
        time::is_expired(self.expires_at)
    }

    /// Check if this quote involves a currency conversion.
    pub fn is_cross_currency(&self) -> bool {
        self.base_currency != self.quote_currency
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebank_common::CurrencyPair;
    use rust_decimal_macros::dec;

    #[test]
    fn test_quote_totals_fees() {
        let quote = Quote::new(
            Currency::eur(),
            Currency::usd(),
            Some(FxRate::new(
                CurrencyPair::new(Currency::eur(), Currency::usd()),
                dec!(1.15),
            )),
            vec![
                Fee::new("Transaction fee", dec!(0.25)),
                Fee::new("Express surcharge", dec!(0.10)),
            ],
        );

        assert_eq!(quote.total_fees, dec!(0.35));
        assert!(quote.is_cross_currency());
        assert!(!quote.is_expired());
    }

    #[test]
    fn test_same_currency_quote() {
        let quote = Quote::new(Currency::eur(), Currency::eur(), None, vec![]);
        assert!(!quote.is_cross_currency());
        assert_eq!(quote.total_fees, Decimal::ZERO);
    }
}
