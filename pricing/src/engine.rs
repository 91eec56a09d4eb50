//! The pricing engine: configured FX rates, fee schedule, and quote store.

use std::collections::HashMap;

use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use corebank_common::{BankError, Currency, CurrencyPair, FxRate, QuoteId, Result};

use crate::quote::{Fee, Quote};

/// One configured FX rate table entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateEntry {
    pub base: String,
    pub quote: String,
    pub rate: Decimal,
}

/// Pricing configuration: the rate table and the fee schedule. The exact
/// fee policy varies per deployment, so the amount is configuration rather
/// than a constant; the remitter-pays asymmetry (debit side charged, credit
/// side free) is fixed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    pub rates: Vec<RateEntry>,
    #[serde(default)]
    pub transaction_fee: Decimal,
}

struct StoredQuote {
    quote: Quote,
    redeemed: bool,
}

/// Generates, stores, and redeems transfer quotes.
pub struct PricingEngine {
    rates: HashMap<CurrencyPair, FxRate>,
    transaction_fee: Decimal,
    quotes: DashMap<QuoteId, StoredQuote>,
    by_ref: Mutex<HashMap<String, QuoteId>>,
}

impl PricingEngine {
    /// Create an engine from configuration.
    pub fn new(config: PricingConfig) -> Self {
        let rates = config
            .rates
            .into_iter()
            .map(|entry| {
                let pair = CurrencyPair::new(
                    Currency::new(entry.base.as_str()),
                    Currency::new(entry.quote.as_str()),
                );
                (pair.clone(), FxRate::new(pair, entry.rate))
            })
            .collect();

        Self {
            rates,
            transaction_fee: config.transaction_fee,
            quotes: DashMap::new(),
            by_ref: Mutex::new(HashMap::new()),
        }
    }

    /// Generate a debit-side quote: FX rate for the pair plus the flat
    /// transaction fee (the remitter pays fees).
    #[instrument(skip(self))]
    pub fn debit_quote(&self, base: Currency, quote: Currency) -> Result<Quote> {
        let fx_rate = self.rate_for(&CurrencyPair::new(base.clone(), quote.clone()))?;
        let fees = vec![Fee::new("Transaction fee", self.transaction_fee)];
        Ok(self.store(Quote::new(base, quote, fx_rate, fees)))
    }

    /// Generate a credit-side quote: no fees are charged to the beneficiary.
    #[instrument(skip(self))]
    pub fn credit_quote(&self, base: Currency, quote: Currency) -> Result<Quote> {
        let fx_rate = self.rate_for(&CurrencyPair::new(base.clone(), quote.clone()))?;
        Ok(self.store(Quote::new(base, quote, fx_rate, Vec::new())))
    }

    /// Debit-side quote, idempotent by the caller's token reference id: the
    /// same reference always returns the originally issued quote unchanged.
    pub fn debit_quote_for_ref(
        &self,
        token_ref: &str,
        base: Currency,
        quote: Currency,
    ) -> Result<Quote> {
        self.quote_for_ref(token_ref, base, quote, true)
    }

    /// Credit-side quote, idempotent by token reference id.
    pub fn credit_quote_for_ref(
        &self,
        token_ref: &str,
        base: Currency,
        quote: Currency,
    ) -> Result<Quote> {
        self.quote_for_ref(token_ref, base, quote, false)
    }

    /// Look up a previously issued quote.
    pub fn lookup_quote(&self, id: &QuoteId) -> Result<Quote> {
        let stored = self
            .quotes
            .get(id)
            .ok_or_else(|| BankError::InvalidQuote(format!("quote not found: {}", id)))?;
        if stored.quote.is_expired() {
            return Err(BankError::InvalidQuote(format!("quote expired: {}", id)));
        }
        Ok(stored.quote.clone())
    }

    /// Redeem a quote, booking the FX deal. The supplied quote must match
    /// the stored one exactly and can be redeemed at most once. Redemption
    /// moves no money; it only validates.
    #[instrument(skip(self, quote), fields(quote_id = %quote.id))]
    pub fn redeem_quote(&self, quote: &Quote) -> Result<()> {
        let mut stored = self
            .quotes
            .get_mut(&quote.id)
            .ok_or_else(|| BankError::InvalidQuote(format!("quote not found: {}", quote.id)))?;

        if stored.redeemed {
            return Err(BankError::InvalidQuote(format!(
                "quote already redeemed: {}",
                quote.id
            )));
        }
        if stored.quote != *quote {
            return Err(BankError::InvalidQuote(format!(
                "quote does not match issued quote: {}",
                quote.id
            )));
        }
        if stored.quote.is_expired() {
            return Err(BankError::InvalidQuote(format!("quote expired: {}", quote.id)));
        }

        stored.redeemed = true;
        debug!("Quote redeemed");
        Ok(())
    }

    fn quote_for_ref(
        &self,
        token_ref: &str,
        base: Currency,
        quote: Currency,
        debit_side: bool,
    ) -> Result<Quote> {
        let mut by_ref = self.by_ref.lock();

        if let Some(id) = by_ref.get(token_ref) {
            if let Some(stored) = self.quotes.get(id) {
                debug!(token_ref, quote_id = %id, "Returning previously issued quote");
                return Ok(stored.quote.clone());
            }
        }

        let issued = if debit_side {
            self.debit_quote(base, quote)?
        } else {
            self.credit_quote(base, quote)?
        };
        by_ref.insert(token_ref.to_string(), issued.id);
        Ok(issued)
    }

    fn rate_for(&self, pair: &CurrencyPair) -> Result<Option<FxRate>> {
        if pair.is_identity() {
            return Ok(None);
        }
        self.rates
            .get(pair)
            .cloned()
            .map(Some)
            .ok_or_else(|| BankError::InvalidCurrency(format!("FX rate not found for {}", pair)))
    }

    fn store(&self, quote: Quote) -> Quote {
        debug!(quote_id = %quote.id, pair = %CurrencyPair::new(quote.base_currency.clone(), quote.quote_currency.clone()), "Quote issued");
        self.quotes.insert(
            quote.id,
            StoredQuote {
                quote: quote.clone(),
                redeemed: false,
            },
        );
        quote
    }

    #[cfg(test)]
    fn insert_for_test(&self, quote: Quote) {
        self.quotes.insert(
            quote.id,
            StoredQuote {
                quote,
                redeemed: false,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn engine() -> PricingEngine {
        PricingEngine::new(PricingConfig {
            rates: vec![
                RateEntry {
                    base: "EUR".to_string(),
                    quote: "USD".to_string(),
                    rate: dec!(1.15),
                },
                RateEntry {
                    base: "USD".to_string(),
                    quote: "EUR".to_string(),
                    rate: dec!(0.87),
                },
            ],
            transaction_fee: dec!(0.25),
        })
    }

    #[test]
    fn test_debit_quote_carries_fee_and_rate() {
        let engine = engine();
        let quote = engine.debit_quote(Currency::eur(), Currency::usd()).unwrap();

        assert_eq!(quote.base_currency, Currency::eur());
        assert_eq!(quote.quote_currency, Currency::usd());
        assert_eq!(quote.fx_rate.as_ref().unwrap().rate, dec!(1.15));
        assert_eq!(quote.total_fees, dec!(0.25));
    }

    #[test]
    fn test_credit_quote_is_free() {
        let engine = engine();
        let quote = engine.credit_quote(Currency::eur(), Currency::eur()).unwrap();

        assert!(quote.fees.is_empty());
        assert_eq!(quote.total_fees, Decimal::ZERO);
        assert!(quote.fx_rate.is_none());
    }

    #[test]
    fn test_unknown_pair_fails() {
        let engine = engine();
        let err = engine
            .debit_quote(Currency::gbp(), Currency::usd())
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CURRENCY");
    }

    #[test]
    fn test_lookup_roundtrip() {
        let engine = engine();
        let quote = engine.debit_quote(Currency::eur(), Currency::usd()).unwrap();

        let found = engine.lookup_quote(&quote.id).unwrap();
        assert_eq!(found, quote);
    }

    #[test]
    fn test_lookup_unknown_quote() {
        let engine = engine();
        let err = engine.lookup_quote(&QuoteId::new()).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_QUOTE");
    }

    #[test]
    fn test_lookup_expired_quote() {
        let engine = engine();
        let mut quote = Quote::new(Currency::eur(), Currency::usd(), None, vec![]);
        quote.expires_at = corebank_common::time::now() - chrono::Duration::seconds(1);
        engine.insert_for_test(quote.clone());

        let err = engine.lookup_quote(&quote.id).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_QUOTE");
    }

    #[test]
    fn test_redeem_once_only() {
        let engine = engine();
        let quote = engine.debit_quote(Currency::eur(), Currency::usd()).unwrap();

        engine.redeem_quote(&quote).unwrap();
        let err = engine.redeem_quote(&quote).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_QUOTE");
    }

    #[test]
    fn test_redeem_tampered_quote_fails() {
        let engine = engine();
        let mut quote = engine.debit_quote(Currency::eur(), Currency::usd()).unwrap();
        quote.total_fees = Decimal::ZERO;

        let err = engine.redeem_quote(&quote).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_QUOTE");
    }

    #[test]
    fn test_redeem_unknown_quote_fails() {
        let engine = engine();
        let quote = Quote::new(Currency::eur(), Currency::usd(), None, vec![]);

        let err = engine.redeem_quote(&quote).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_QUOTE");
    }

    #[test]
    fn test_quote_for_ref_idempotent() {
        let engine = engine();
        let first = engine
            .debit_quote_for_ref("token-1", Currency::eur(), Currency::usd())
            .unwrap();
        let second = engine
            .debit_quote_for_ref("token-1", Currency::eur(), Currency::usd())
            .unwrap();

        assert_eq!(first, second);

        // A different reference mints a fresh quote.
        let third = engine
            .debit_quote_for_ref("token-2", Currency::eur(), Currency::usd())
            .unwrap();
        assert_ne!(first.id, third.id);
    }
}
