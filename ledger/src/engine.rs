//! The accounting engine: business-level transfer posting on top of the
//! account directory and per-account ledgers.
//!
//! All mutation runs under a single engine-wide lock. Hold times are bounded
//! by pure computation; nothing under the lock performs I/O.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use corebank_common::{
    AccountRef, Balance, BankError, Money, PostingId, Result, TransferId,
};

use crate::account::AccountLedger;
use crate::directory::{AccountDirectory, AccountKind};
use crate::posting::{AccountTransfer, Posting, PostingPair, PostingStatus};

/// Leg numbers used for the movements of a single transfer. Posting ids are
/// derived from these, which keeps re-submission idempotent across both
/// phases and both legs of the protocol.
pub mod leg {
    /// Source account to hold (or to the FX account when converting).
    pub const HOLD: u32 = 0;
    /// FX account to hold, in the settlement currency.
    pub const FX: u32 = 1;
    /// Hold to settlement on commit of the debit leg.
    pub const SETTLE: u32 = 2;
    /// Settlement to beneficiary on commit of the credit leg.
    pub const PAYOUT: u32 = 3;
}

struct LedgerBook {
    accounts: HashMap<AccountRef, AccountLedger>,
    transfers: HashMap<TransferId, Vec<(AccountRef, PostingId)>>,
}

impl LedgerBook {
    fn ledger(&self, account: &AccountRef) -> Result<&AccountLedger> {
        self.accounts
            .get(account)
            .ok_or_else(|| BankError::AccountNotFound(account.clone()))
    }

    fn ledger_mut(&mut self, account: &AccountRef) -> Result<&mut AccountLedger> {
        self.accounts
            .get_mut(account)
            .ok_or_else(|| BankError::AccountNotFound(account.clone()))
    }

    /// Postings of a transfer that are still in `Processing`.
    fn pending_postings(&self, transfer_id: &TransferId) -> Vec<(AccountRef, PostingId)> {
        self.transfers
            .get(transfer_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(account, id)| {
                        self.accounts[account]
                            .posting(id)
                            .map(|p| p.status == PostingStatus::Processing)
                            .unwrap_or(false)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn index_posting(&mut self, transfer_id: &TransferId, account: &AccountRef, id: &PostingId) {
        self.transfers
            .entry(transfer_id.clone())
            .or_default()
            .push((account.clone(), id.clone()));
    }
}

/// In-memory accounting engine. Shared across request threads; all state
/// sits behind one mutex.
pub struct AccountingEngine {
    directory: Arc<AccountDirectory>,
    book: Mutex<LedgerBook>,
}

impl AccountingEngine {
    /// Create an engine seeded with a ledger per configured account.
    pub fn new(directory: Arc<AccountDirectory>) -> Self {
        let accounts = directory
            .all()
            .map(|descriptor| (descriptor.reference.clone(), AccountLedger::new(descriptor)))
            .collect();

        Self {
            directory,
            book: Mutex::new(LedgerBook {
                accounts,
                transfers: HashMap::new(),
            }),
        }
    }

    /// The account directory this engine serves.
    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    /// Look up an account balance.
    pub fn balance(&self, account: &AccountRef) -> Result<Balance> {
        let book = self.book.lock();
        Ok(book.ledger(account)?.balance())
    }

    /// Post a balanced transfer pair. The debit side places a hold on the
    /// source account; both postings stay `Processing` until committed.
    ///
    /// A transfer sourced from the reject account records an
    /// already-canceled debit posting and fails `RejectedBySimulation`.
    /// Re-submitting a transfer id returns the previously posted pair.
    #[instrument(skip(self, transfer), fields(transfer_id = %transfer.transfer_id))]
    pub fn post_transfer(&self, transfer: AccountTransfer) -> Result<PostingPair> {
        let mut book = self.book.lock();
        let (pair, created) = self.post_transfer_locked(&mut book, transfer)?;
        if created {
            info!(
                debit = %pair.debit.id,
                credit = %pair.credit.id,
                amount = %pair.credit.amount,
                currency = %pair.credit.currency,
                "Transfer posted"
            );
        }
        Ok(pair)
    }

    /// Post and immediately commit a transfer: used for internal moves
    /// (hold to settlement, settlement to beneficiary) and the single-shot
    /// transfer operation.
    #[instrument(skip(self, transfer), fields(transfer_id = %transfer.transfer_id))]
    pub fn post_settled(&self, transfer: AccountTransfer) -> Result<PostingPair> {
        let mut book = self.book.lock();
        self.post_settled_locked(&mut book, transfer)
    }

    /// Post the two movements of a cross-currency debit: source to the FX
    /// account in the source currency, FX account to hold in the settlement
    /// currency. The bid/ask spread is not accounted for.
    #[instrument(skip(self, source_amount, settlement_amount), fields(transfer_id = %transfer_id))]
    pub fn post_fx_transfer(
        &self,
        from: &AccountRef,
        source_amount: Money,
        settlement_amount: Money,
        transfer_id: TransferId,
        description: Option<String>,
    ) -> Result<(PostingPair, PostingPair)> {
        let fx_src = self
            .directory
            .category_account(AccountKind::Fx, &source_amount.currency)?
            .reference
            .clone();
        let fx_dst = self
            .directory
            .category_account(AccountKind::Fx, &settlement_amount.currency)?
            .reference
            .clone();
        let hold_dst = self
            .directory
            .category_account(AccountKind::Hold, &settlement_amount.currency)?
            .reference
            .clone();

        let mut book = self.book.lock();

        let mut customer_leg = AccountTransfer::new(
            transfer_id.clone(),
            leg::HOLD,
            from.clone(),
            fx_src,
            source_amount,
        );
        customer_leg.description = description.clone();
        let (first, _) = self.post_transfer_locked(&mut book, customer_leg)?;

        let mut fx_leg = AccountTransfer::new(
            transfer_id.clone(),
            leg::FX,
            fx_dst,
            hold_dst,
            settlement_amount,
        );
        fx_leg.description = description;
        let (second, _) = self.post_transfer_locked(&mut book, fx_leg)?;

        info!(
            source = %first.debit.account,
            held = %second.credit.amount,
            currency = %second.credit.currency,
            "FX transfer posted"
        );
        Ok((first, second))
    }

    /// Commit every pending posting of the transfer, then move the held
    /// amount on to the settlement account. Returns the source account's
    /// updated posting.
    #[instrument(skip(self), fields(transfer_id = %transfer_id))]
    pub fn commit_hold(&self, transfer_id: &TransferId) -> Result<Posting> {
        let mut book = self.book.lock();

        let pending = book.pending_postings(transfer_id);
        if pending.is_empty() {
            return Err(BankError::TransactionNotFound(PostingId::debit(
                transfer_id,
                leg::HOLD,
            )));
        }

        let mut held: Option<(AccountRef, Money)> = None;
        for (account, id) in &pending {
            let committed = book.ledger_mut(account)?.commit(id)?;
            if self
                .directory
                .lookup(account)
                .map(|a| a.kind == AccountKind::Hold)
                .unwrap_or(false)
                && committed.amount > rust_decimal::Decimal::ZERO
            {
                held = Some((account.clone(), committed.money()));
            }
        }

        let (hold_account, held_amount) = held.ok_or_else(|| {
            BankError::TransactionNotFound(PostingId::credit(transfer_id, leg::HOLD))
        })?;

        let settlement = self
            .directory
            .category_account(AccountKind::Settlement, &held_amount.currency)?
            .reference
            .clone();
        self.post_settled_locked(
            &mut book,
            AccountTransfer::new(
                transfer_id.clone(),
                leg::SETTLE,
                hold_account,
                settlement,
                held_amount,
            ),
        )?;

        let source_posting = self.transfer_debit_posting(&book, transfer_id)?;
        info!(posting = %source_posting.id, "Hold committed");
        Ok(source_posting)
    }

    /// Cancel every pending posting of the transfer, releasing the source
    /// account's hold. Returns the source account's updated posting.
    #[instrument(skip(self), fields(transfer_id = %transfer_id))]
    pub fn rollback_hold(&self, transfer_id: &TransferId) -> Result<Posting> {
        let mut book = self.book.lock();

        let pending = book.pending_postings(transfer_id);
        if pending.is_empty() {
            return Err(BankError::TransactionNotFound(PostingId::debit(
                transfer_id,
                leg::HOLD,
            )));
        }

        for (account, id) in &pending {
            book.ledger_mut(account)?.rollback(id)?;
        }

        let source_posting = self.transfer_debit_posting(&book, transfer_id)?;
        info!(posting = %source_posting.id, "Hold rolled back");
        Ok(source_posting)
    }

    /// Look up a posting on an account.
    pub fn posting(&self, account: &AccountRef, id: &PostingId) -> Result<Option<Posting>> {
        let book = self.book.lock();
        Ok(book.ledger(account)?.posting(id).cloned())
    }

    /// Page through an account's postings, most recent first.
    pub fn page_postings(
        &self,
        account: &AccountRef,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Posting>> {
        let book = self.book.lock();
        Ok(book.ledger(account)?.page(offset, limit))
    }

    fn post_transfer_locked(
        &self,
        book: &mut LedgerBook,
        transfer: AccountTransfer,
    ) -> Result<(PostingPair, bool)> {
        let from = self
            .directory
            .lookup(&transfer.from)
            .ok_or_else(|| BankError::AccountNotFound(transfer.from.clone()))?;
        let to = self
            .directory
            .lookup(&transfer.to)
            .ok_or_else(|| BankError::AccountNotFound(transfer.to.clone()))?;

        if !transfer.amount.is_positive() {
            return Err(BankError::InvalidAmount(transfer.amount.to_string()));
        }

        // Simulation hook: debits sourced from the reject account are
        // recorded as canceled without placing a hold, before any further
        // validation.
        if from.kind == AccountKind::Reject {
            let mut pair = transfer.into_pair();
            pair.debit.transition_to(PostingStatus::FailureCanceled)?;
            let posting_id = pair.debit.id.clone();
            let transfer_id = pair.debit.transfer_id.clone();
            let account = pair.debit.account.clone();
            if book.ledger_mut(&account)?.post(pair.debit)? {
                book.index_posting(&transfer_id, &account, &posting_id);
            }
            warn!(posting = %posting_id, "Transfer canceled by reject-account simulation");
            return Err(BankError::RejectedBySimulation { posting_id });
        }

        if from.currency != transfer.amount.currency {
            return Err(BankError::currency_mismatch(
                &from.currency,
                &transfer.amount.currency,
            ));
        }
        if to.currency != transfer.amount.currency {
            return Err(BankError::currency_mismatch(
                &to.currency,
                &transfer.amount.currency,
            ));
        }

        let pair = transfer.into_pair();

        // Idempotent re-submission: both ids derive from the same transfer
        // id and leg, so finding the debit means the pair already exists.
        if let Some(existing_debit) = book.ledger(&pair.debit.account)?.posting(&pair.debit.id) {
            let existing_debit = existing_debit.clone();
            let existing_credit = book
                .ledger(&pair.credit.account)?
                .posting(&pair.credit.id)
                .cloned()
                .ok_or_else(|| BankError::TransactionNotFound(pair.credit.id.clone()))?;
            debug!(posting = %existing_debit.id, "Duplicate transfer ignored");
            return Ok((
                PostingPair {
                    debit: existing_debit,
                    credit: existing_credit,
                },
                false,
            ));
        }

        book.ledger_mut(&pair.debit.account)?.post(pair.debit.clone())?;
        book.index_posting(&pair.debit.transfer_id, &pair.debit.account, &pair.debit.id);
        book.ledger_mut(&pair.credit.account)?.post(pair.credit.clone())?;
        book.index_posting(
            &pair.credit.transfer_id,
            &pair.credit.account,
            &pair.credit.id,
        );

        Ok((pair, true))
    }

    fn post_settled_locked(
        &self,
        book: &mut LedgerBook,
        transfer: AccountTransfer,
    ) -> Result<PostingPair> {
        let (pair, created) = self.post_transfer_locked(book, transfer)?;
        if !created {
            return Ok(pair);
        }

        let debit = book.ledger_mut(&pair.debit.account)?.commit(&pair.debit.id)?;
        let credit = book
            .ledger_mut(&pair.credit.account)?
            .commit(&pair.credit.id)?;
        Ok(PostingPair { debit, credit })
    }

    /// The source-side posting of a transfer (leg 0 debit), as recorded.
    fn transfer_debit_posting(&self, book: &LedgerBook, transfer_id: &TransferId) -> Result<Posting> {
        let id = PostingId::debit(transfer_id, leg::HOLD);
        let entries = book
            .transfers
            .get(transfer_id)
            .ok_or_else(|| BankError::TransactionNotFound(id.clone()))?;
        let (account, _) = entries
            .iter()
            .find(|(_, posting_id)| posting_id == &id)
            .ok_or_else(|| BankError::TransactionNotFound(id.clone()))?;
        book.ledger(account)?
            .posting(&id)
            .cloned()
            .ok_or(BankError::TransactionNotFound(id))
    }
}
