//! The instant-transfer orchestrator: sequences the accounting and pricing
//! engines through the begin/commit/rollback protocol of each leg.
//!
//! The split exists because the settlement network confirms completion
//! asynchronously: funds are reserved on a holding account at begin time
//! and only settle (or return) once the outcome is known.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{info, instrument, warn};

use corebank_common::{AccountRef, BankError, Money, PostingId, Result, TransferId};
use corebank_ledger::directory::AccountKind;
use corebank_ledger::engine::leg;
use corebank_ledger::posting::AccountTransfer;
use corebank_ledger::AccountingEngine;
use corebank_pricing::PricingEngine;

use crate::instruction::{TransactionHandle, TransferInstruction};
use crate::state::{CreditLegState, DebitLegState};

/// Debit-leg record tracked between begin and commit/rollback. Commit and
/// rollback requests are verified against it before any money moves.
#[derive(Debug, Clone)]
struct DebitLeg {
    transfer_id: TransferId,
    source: AccountRef,
    amount: Money,
    settlement_account: AccountRef,
    state: DebitLegState,
    #[allow(dead_code)]
    begun_at: DateTime<Utc>,
}

/// Credit-leg record. Begin moves no money, so this only captures what was
/// validated.
#[derive(Debug, Clone)]
struct CreditLeg {
    transfer_id: TransferId,
    destination: AccountRef,
    amount: Money,
    settlement_account: AccountRef,
    state: CreditLegState,
    #[allow(dead_code)]
    begun_at: DateTime<Utc>,
}

/// Two-phase saga over the accounting and pricing engines.
pub struct InstantTransferOrchestrator {
    engine: Arc<AccountingEngine>,
    pricing: Arc<PricingEngine>,
    debit_legs: DashMap<PostingId, DebitLeg>,
    credit_legs: DashMap<PostingId, CreditLeg>,
}

impl InstantTransferOrchestrator {
    /// Create a new orchestrator over the given engines.
    pub fn new(engine: Arc<AccountingEngine>, pricing: Arc<PricingEngine>) -> Self {
        Self {
            engine,
            pricing,
            debit_legs: DashMap::new(),
            credit_legs: DashMap::new(),
        }
    }

    /// The accounting engine behind this orchestrator.
    pub fn engine(&self) -> &AccountingEngine {
        &self.engine
    }

    /// Begin the debit leg: place the instructed amount on hold.
    ///
    /// A source matching the configured reject account yields a canceled
    /// posting and a handle that can never be committed. Cross-currency
    /// instructions must carry the source quote, which is redeemed here.
    #[instrument(skip(self, instruction), fields(transfer_id = %instruction.transfer_id))]
    pub async fn begin_debit(&self, instruction: TransferInstruction) -> Result<TransactionHandle> {
        let directory = self.engine.directory();
        let source = directory
            .lookup(&instruction.account)
            .ok_or_else(|| BankError::AccountNotFound(instruction.account.clone()))?;
        let settlement_account = directory
            .category_account(AccountKind::Settlement, instruction.settlement_currency())?
            .reference
            .clone();

        // Re-submission of the same transfer returns the original handle
        // without disturbing the leg state.
        let hold_posting_id = PostingId::debit(&instruction.transfer_id, leg::HOLD);
        if let Some(existing) = self.debit_legs.get(&hold_posting_id) {
            return Ok(TransactionHandle {
                transaction_id: hold_posting_id.clone(),
                amount: existing.amount.clone(),
                settlement_account: existing.settlement_account.clone(),
            });
        }

        let cross_currency = instruction.settlement_currency() != &source.currency;

        let (transaction_id, state) = if source.kind == AccountKind::Reject || !cross_currency {
            let hold = directory
                .category_account(AccountKind::Hold, &instruction.amount.currency)?
                .reference
                .clone();
            let mut transfer = AccountTransfer::new(
                instruction.transfer_id.clone(),
                leg::HOLD,
                instruction.account.clone(),
                hold,
                instruction.amount.clone(),
            );
            transfer.description = instruction.description.clone();

            match self.engine.post_transfer(transfer) {
                Ok(pair) => (pair.debit.id, DebitLegState::Held),
                Err(BankError::RejectedBySimulation { posting_id }) => {
                    warn!(posting = %posting_id, "Debit leg canceled by reject-account simulation");
                    (posting_id, DebitLegState::Canceled)
                }
                Err(other) => return Err(other),
            }
        } else {
            if instruction.amount.currency != source.currency {
                return Err(BankError::currency_mismatch(
                    &source.currency,
                    &instruction.amount.currency,
                ));
            }

            let quote = instruction.quote.as_ref().ok_or_else(|| {
                BankError::InvalidQuote("source quote required for cross-currency debit".to_string())
            })?;
            if quote.base_currency != source.currency
                || &quote.quote_currency != instruction.settlement_currency()
            {
                return Err(BankError::InvalidQuote(format!(
                    "quote {} does not price {}/{}",
                    quote.id,
                    source.currency,
                    instruction.settlement_currency()
                )));
            }
            self.pricing.redeem_quote(quote)?;

            let (first, _) = self.engine.post_fx_transfer(
                &instruction.account,
                instruction.amount.clone(),
                instruction.settlement_amount.clone(),
                instruction.transfer_id.clone(),
                instruction.description.clone(),
            )?;
            (first.debit.id, DebitLegState::Held)
        };

        self.debit_legs.insert(
            transaction_id.clone(),
            DebitLeg {
                transfer_id: instruction.transfer_id.clone(),
                source: instruction.account.clone(),
                amount: instruction.amount.clone(),
                settlement_account: settlement_account.clone(),
                state,
                begun_at: Utc::now(),
            },
        );

        info!(transaction_id = %transaction_id, state = %state, "Debit leg begun");
        Ok(TransactionHandle {
            transaction_id,
            amount: instruction.amount,
            settlement_account,
        })
    }

    /// Commit the debit leg: move the held amount on to settlement.
    #[instrument(skip(self, amount), fields(transfer_id = %transfer_id, transaction_id = %transaction_id))]
    pub async fn commit_debit(
        &self,
        transfer_id: &TransferId,
        transaction_id: &PostingId,
        account: &AccountRef,
        amount: &Money,
    ) -> Result<()> {
        let mut entry = self
            .debit_legs
            .get_mut(transaction_id)
            .ok_or_else(|| BankError::TransactionNotFound(transaction_id.clone()))?;

        verify_debit_leg(&entry, transfer_id, account, amount)?;
        if !entry.state.can_transition_to(DebitLegState::Settled) {
            return Err(BankError::InvalidTransition {
                from: entry.state.to_string(),
                to: DebitLegState::Settled.to_string(),
            });
        }

        self.engine.commit_hold(transfer_id)?;
        entry.state = DebitLegState::Settled;
        info!("Debit leg settled");
        Ok(())
    }

    /// Roll back the debit leg: release the hold back to the source.
    #[instrument(skip(self, amount), fields(transfer_id = %transfer_id, transaction_id = %transaction_id))]
    pub async fn rollback_debit(
        &self,
        transfer_id: &TransferId,
        transaction_id: &PostingId,
        account: &AccountRef,
        amount: &Money,
    ) -> Result<()> {
        let mut entry = self
            .debit_legs
            .get_mut(transaction_id)
            .ok_or_else(|| BankError::TransactionNotFound(transaction_id.clone()))?;

        verify_debit_leg(&entry, transfer_id, account, amount)?;
        if !entry.state.can_transition_to(DebitLegState::Canceled) {
            return Err(BankError::InvalidTransition {
                from: entry.state.to_string(),
                to: DebitLegState::Canceled.to_string(),
            });
        }

        self.engine.rollback_hold(transfer_id)?;
        entry.state = DebitLegState::Canceled;
        info!("Debit leg rolled back");
        Ok(())
    }

    /// Begin the credit leg: validate only. The beneficiary is not credited
    /// until the transfer has cleared, so no money moves here.
    #[instrument(skip(self, instruction), fields(transfer_id = %instruction.transfer_id))]
    pub async fn begin_credit(&self, instruction: TransferInstruction) -> Result<TransactionHandle> {
        let directory = self.engine.directory();
        let destination = directory
            .lookup(&instruction.account)
            .ok_or_else(|| BankError::AccountNotFound(instruction.account.clone()))?;

        let transaction_id = PostingId::credit(&instruction.transfer_id, leg::PAYOUT);
        if destination.kind == AccountKind::Reject {
            warn!("Credit leg rejected by reject-account simulation");
            return Err(BankError::RejectedBySimulation {
                posting_id: transaction_id,
            });
        }
        if destination.currency != instruction.amount.currency {
            return Err(BankError::InvalidCurrency(
                "credit side FX is not supported".to_string(),
            ));
        }

        let settlement_account = directory
            .category_account(AccountKind::Settlement, instruction.settlement_currency())?
            .reference
            .clone();

        if let Some(existing) = self.credit_legs.get(&transaction_id) {
            return Ok(TransactionHandle {
                transaction_id: transaction_id.clone(),
                amount: existing.amount.clone(),
                settlement_account: existing.settlement_account.clone(),
            });
        }

        self.credit_legs.insert(
            transaction_id.clone(),
            CreditLeg {
                transfer_id: instruction.transfer_id.clone(),
                destination: instruction.account.clone(),
                amount: instruction.amount.clone(),
                settlement_account: settlement_account.clone(),
                state: CreditLegState::Pending,
                begun_at: Utc::now(),
            },
        );

        info!(transaction_id = %transaction_id, "Credit leg begun");
        Ok(TransactionHandle {
            transaction_id,
            amount: instruction.amount,
            settlement_account,
        })
    }

    /// Commit the credit leg: pay the beneficiary out of settlement.
    #[instrument(skip(self, amount), fields(transfer_id = %transfer_id, transaction_id = %transaction_id))]
    pub async fn commit_credit(
        &self,
        transfer_id: &TransferId,
        transaction_id: &PostingId,
        account: &AccountRef,
        amount: &Money,
    ) -> Result<()> {
        let mut entry = self
            .credit_legs
            .get_mut(transaction_id)
            .ok_or_else(|| BankError::TransactionNotFound(transaction_id.clone()))?;

        verify_credit_leg(&entry, transfer_id, account, amount)?;
        if !entry.state.can_transition_to(CreditLegState::Settled) {
            return Err(BankError::InvalidTransition {
                from: entry.state.to_string(),
                to: CreditLegState::Settled.to_string(),
            });
        }

        self.engine.post_settled(AccountTransfer::new(
            transfer_id.clone(),
            leg::PAYOUT,
            entry.settlement_account.clone(),
            entry.destination.clone(),
            entry.amount.clone(),
        ))?;
        entry.state = CreditLegState::Settled;
        info!("Credit leg settled");
        Ok(())
    }

    /// Roll back the credit leg. Deliberately a no-op apart from dropping
    /// the pending record: begin moved no funds.
    #[instrument(skip(self, _amount), fields(transfer_id = %_transfer_id, transaction_id = %transaction_id))]
    pub async fn rollback_credit(
        &self,
        _transfer_id: &TransferId,
        transaction_id: &PostingId,
        _account: &AccountRef,
        _amount: &Money,
    ) -> Result<()> {
        if self.credit_legs.remove(transaction_id).is_some() {
            info!("Pending credit leg dropped");
        }
        Ok(())
    }
}

fn verify_debit_leg(
    leg: &DebitLeg,
    transfer_id: &TransferId,
    account: &AccountRef,
    amount: &Money,
) -> Result<()> {
    if &leg.transfer_id != transfer_id {
        return Err(hold_mismatch("transfer_id", leg.transfer_id.as_str(), transfer_id.as_str()));
    }
    if &leg.source != account {
        return Err(hold_mismatch("account", &leg.source.to_string(), &account.to_string()));
    }
    if &leg.amount != amount {
        return Err(hold_mismatch("amount", &leg.amount.to_string(), &amount.to_string()));
    }
    Ok(())
}

fn verify_credit_leg(
    leg: &CreditLeg,
    transfer_id: &TransferId,
    account: &AccountRef,
    amount: &Money,
) -> Result<()> {
    if &leg.transfer_id != transfer_id {
        return Err(hold_mismatch("transfer_id", leg.transfer_id.as_str(), transfer_id.as_str()));
    }
    if &leg.destination != account {
        return Err(hold_mismatch("account", &leg.destination.to_string(), &account.to_string()));
    }
    if &leg.amount != amount {
        return Err(hold_mismatch("amount", &leg.amount.to_string(), &amount.to_string()));
    }
    Ok(())
}

fn hold_mismatch(field: &'static str, expected: &str, actual: &str) -> BankError {
    BankError::HoldMismatch {
        field,
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
