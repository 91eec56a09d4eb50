//! The programmatic service facade consumed by the RPC dispatch layer.
//!
//! Translates wire forms (scheme-tagged account identifiers, decimal-string
//! amounts, ISO-4217 currency codes) into engine types and dispatches to
//! the pricing engine, the accounting engine, and the orchestrator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use corebank_common::{
    AccountIdentifier, AccountRef, Balance, BankError, Currency, Money, PostingId, QuoteId,
    Result, TransferId,
};
use corebank_ledger::engine::leg;
use corebank_ledger::posting::{AccountTransfer, Posting, PostingPair};
use corebank_ledger::{AccountDirectory, AccountingEngine, DirectoryConfig};
use corebank_pricing::{PricingConfig, PricingEngine, Quote};

use crate::instruction::{TransactionHandle, TransferInstruction};
use crate::orchestrator::InstantTransferOrchestrator;

/// Wire form of an instant-transfer leg request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferRequest {
    /// Network-wide transfer id.
    pub transfer_id: String,
    /// The customer account this leg acts on.
    pub account: AccountIdentifier,
    /// Instructed amount as a decimal string.
    pub amount: String,
    /// Instructed currency.
    pub currency: String,
    /// Settlement amount, when the debit side converts currency.
    #[serde(default)]
    pub settlement_amount: Option<String>,
    /// Settlement currency, when the debit side converts currency.
    #[serde(default)]
    pub settlement_currency: Option<String>,
    /// Source-side quote previously issued by `prepare_debit`.
    #[serde(default)]
    pub quote: Option<Quote>,
    /// Free-text remittance information.
    #[serde(default)]
    pub description: Option<String>,
}

/// Facade over the engines, exposing the operations the integration
/// endpoint dispatches to.
pub struct BankService {
    engine: Arc<AccountingEngine>,
    pricing: Arc<PricingEngine>,
    orchestrator: InstantTransferOrchestrator,
}

impl BankService {
    /// Create a service over existing engines.
    pub fn new(engine: Arc<AccountingEngine>, pricing: Arc<PricingEngine>) -> Self {
        let orchestrator = InstantTransferOrchestrator::new(engine.clone(), pricing.clone());
        Self {
            engine,
            pricing,
            orchestrator,
        }
    }

    /// Build the full stack from already-parsed configuration.
    pub fn from_config(directory: DirectoryConfig, pricing: PricingConfig) -> Result<Self> {
        let directory = AccountDirectory::from_config(directory)?;
        let engine = Arc::new(AccountingEngine::new(Arc::new(directory)));
        let pricing = Arc::new(PricingEngine::new(pricing));
        Ok(Self::new(engine, pricing))
    }

    /// The orchestrator, for callers that hold engine types directly.
    pub fn orchestrator(&self) -> &InstantTransferOrchestrator {
        &self.orchestrator
    }

    /// Prepare the debit side of a transfer: verify the source account and
    /// funds, then quote from the account currency to the target currency.
    /// Idempotent by `token_ref`; an `existing_quote` is looked up instead.
    #[instrument(skip(self))]
    pub async fn prepare_debit(
        &self,
        token_ref: &str,
        amount: &str,
        currency: &str,
        source: &AccountIdentifier,
        target_currency: Option<&str>,
        existing_quote: Option<&QuoteId>,
    ) -> Result<Quote> {
        let account = resolve(source)?;
        let requested = parse_money(amount, currency)?;
        let balance = self.engine.balance(&account)?;

        if !balance.covers(requested.value) {
            return Err(BankError::InsufficientFunds {
                required: requested,
                available: Money::new(balance.available, balance.currency),
            });
        }

        if let Some(id) = existing_quote {
            return self.pricing.lookup_quote(id);
        }

        let target = target_currency
            .map(Currency::new)
            .unwrap_or_else(|| requested.currency.clone());
        self.pricing
            .debit_quote_for_ref(token_ref, balance.currency, target)
    }

    /// Prepare the credit side: verify the destination account exists and
    /// is denominated in the instructed currency (beneficiary-side FX is
    /// not supported), then issue the fee-free credit quote.
    #[instrument(skip(self))]
    pub async fn prepare_credit(
        &self,
        token_ref: &str,
        amount: &str,
        currency: &str,
        destination: &AccountIdentifier,
        existing_quote: Option<&QuoteId>,
    ) -> Result<Quote> {
        let account = resolve(destination)?;
        let requested = parse_money(amount, currency)?;
        let balance = self.engine.balance(&account)?;

        if balance.currency != requested.currency {
            return Err(BankError::InvalidCurrency(
                "credit side FX is not supported".to_string(),
            ));
        }

        if let Some(id) = existing_quote {
            return self.pricing.lookup_quote(id);
        }

        self.pricing
            .credit_quote_for_ref(token_ref, requested.currency, balance.currency)
    }

    /// Begin the debit leg of an instant transfer.
    pub async fn begin_debit_transaction(
        &self,
        request: TransferRequest,
    ) -> Result<TransactionHandle> {
        let instruction = into_instruction(request)?;
        self.orchestrator.begin_debit(instruction).await
    }

    /// Commit the debit leg.
    pub async fn commit_debit_transaction(
        &self,
        transfer_id: &str,
        transaction_id: &str,
        account: &AccountIdentifier,
        amount: &str,
        currency: &str,
    ) -> Result<()> {
        self.orchestrator
            .commit_debit(
                &TransferId::new(transfer_id),
                &PostingId::new(transaction_id),
                &resolve(account)?,
                &parse_money(amount, currency)?,
            )
            .await
    }

    /// Roll back the debit leg.
    pub async fn rollback_debit_transaction(
        &self,
        transfer_id: &str,
        transaction_id: &str,
        account: &AccountIdentifier,
        amount: &str,
        currency: &str,
    ) -> Result<()> {
        self.orchestrator
            .rollback_debit(
                &TransferId::new(transfer_id),
                &PostingId::new(transaction_id),
                &resolve(account)?,
                &parse_money(amount, currency)?,
            )
            .await
    }

    /// Begin the credit leg of an instant transfer.
    pub async fn begin_credit_transaction(
        &self,
        request: TransferRequest,
    ) -> Result<TransactionHandle> {
        let instruction = into_instruction(request)?;
        self.orchestrator.begin_credit(instruction).await
    }

    /// Commit the credit leg.
    pub async fn commit_credit_transaction(
        &self,
        transfer_id: &str,
        transaction_id: &str,
        account: &AccountIdentifier,
        amount: &str,
        currency: &str,
    ) -> Result<()> {
        self.orchestrator
            .commit_credit(
                &TransferId::new(transfer_id),
                &PostingId::new(transaction_id),
                &resolve(account)?,
                &parse_money(amount, currency)?,
            )
            .await
    }

    /// Roll back the credit leg (no funds were moved at begin time).
    pub async fn rollback_credit_transaction(
        &self,
        transfer_id: &str,
        transaction_id: &str,
        account: &AccountIdentifier,
        amount: &str,
        currency: &str,
    ) -> Result<()> {
        self.orchestrator
            .rollback_credit(
                &TransferId::new(transfer_id),
                &PostingId::new(transaction_id),
                &resolve(account)?,
                &parse_money(amount, currency)?,
            )
            .await
    }

    /// Single-shot transfer: post and settle a balanced pair in one step.
    #[instrument(skip(self))]
    pub async fn transfer(
        &self,
        transfer_id: &str,
        from: &AccountIdentifier,
        to: &AccountIdentifier,
        amount: &str,
        currency: &str,
        description: Option<&str>,
    ) -> Result<PostingPair> {
        let mut transfer = AccountTransfer::new(
            TransferId::new(transfer_id),
            leg::HOLD,
            resolve(from)?,
            resolve(to)?,
            parse_money(amount, currency)?,
        );
        transfer.description = description.map(str::to_string);
        self.engine.post_settled(transfer)
    }

    /// Look up an account balance.
    pub async fn get_balance(&self, account: &AccountIdentifier) -> Result<Balance> {
        self.engine.balance(&resolve(account)?)
    }

    /// Look up a posting on an account.
    pub async fn get_transaction(
        &self,
        account: &AccountIdentifier,
        transaction_id: &str,
    ) -> Result<Option<Posting>> {
        self.engine
            .posting(&resolve(account)?, &PostingId::new(transaction_id))
    }

    /// Page through an account's postings, most recent first.
    pub async fn get_transactions(
        &self,
        account: &AccountIdentifier,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Posting>> {
        self.engine
            .page_postings(&resolve(account)?, offset, limit)
    }
}

fn resolve(account: &AccountIdentifier) -> Result<AccountRef> {
    account
        .as_swift()
        .ok_or_else(|| BankError::UnsupportedAccountType(account.clone()))
}

fn parse_money(amount: &str, currency: &str) -> Result<Money> {
    Money::parse(amount, Currency::new(currency))
        .map_err(|_| BankError::InvalidAmount(amount.to_string()))
}

fn into_instruction(request: TransferRequest) -> Result<TransferInstruction> {
    let amount = parse_money(&request.amount, &request.currency)?;
    let settlement_amount = match (&request.settlement_amount, &request.settlement_currency) {
        (Some(value), Some(currency)) => parse_money(value, currency)?,
        (None, None) => amount.clone(),
        _ => {
            return Err(BankError::InvalidAmount(
                "settlement amount and currency must be supplied together".to_string(),
            ))
        }
    };

    Ok(TransferInstruction {
        transfer_id: TransferId::new(request.transfer_id),
        account: resolve(&request.account)?,
        amount,
        settlement_amount,
        quote: request.quote,
        description: request.description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rejects_unsupported_schemes() {
        let iban = AccountIdentifier::Iban {
            iban: "DE89370400440532013000".to_string(),
        };
        let err = resolve(&iban).unwrap_err();
        assert_eq!(err.error_code(), "UNSUPPORTED_ACCOUNT_TYPE");
    }

    #[test]
    fn test_parse_money_rejects_garbage() {
        let err = parse_money("12,34", "EUR").unwrap_err();
        assert_eq!(err.error_code(), "INVALID_AMOUNT");
        assert!(parse_money("12.34", "EUR").is_ok());
    }

    #[test]
    fn test_instruction_requires_paired_settlement_fields() {
        let request = TransferRequest {
            transfer_id: "tt-1".to_string(),
            account: AccountIdentifier::swift("IRONBANK44", "1000001"),
            amount: "100.00".to_string(),
            currency: "EUR".to_string(),
            settlement_amount: Some("115.00".to_string()),
            settlement_currency: None,
            quote: None,
            description: None,
        };
        assert!(into_instruction(request).is_err());
    }
}
