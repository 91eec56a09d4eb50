//! Per-account posting log and balance arithmetic.

use std::collections::HashMap;

use corebank_common::{Balance, BankError, Currency, Money, PostingId, Result, TransferId};
use rust_decimal::Decimal;

use crate::directory::{AccountDescriptor, AccountKind};
use crate::posting::{Posting, PostingStatus, PostingType};

/// Append-ordered posting log for one account, with an id index and the
/// account's available/current balances.
///
/// Balance rules: a debit posting reduces `available` at creation (the hold)
/// and `current` at commit; a credit posting changes nothing at creation and
/// grants both balances at commit. Rollback releases the debit's hold.
pub struct AccountLedger {
    currency: Currency,
    kind: AccountKind,
    available: Decimal,
    current: Decimal,
    postings: Vec<Posting>,
    index: HashMap<PostingId, usize>,
}

impl AccountLedger {
    /// Create a ledger seeded from the account descriptor.
    pub fn new(descriptor: &AccountDescriptor) -> Self {
        Self {
            currency: descriptor.currency.clone(),
            kind: descriptor.kind,
            available: descriptor.opening_balance,
            current: descriptor.opening_balance,
            postings: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Account currency.
    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Account purpose.
    pub fn kind(&self) -> AccountKind {
        self.kind
    }

    /// Current balance snapshot.
    pub fn balance(&self) -> Balance {
        Balance::new(self.currency.clone(), self.available, self.current)
    }

    /// Append a posting. Returns `false` when the posting id already exists
    /// (idempotent re-submission; nothing is re-applied). Customer debits
    /// exceeding the available balance fail with `InsufficientFunds`;
    /// category accounts are internal omnibus accounts and are not
    /// funds-checked. Postings arriving in a terminal state (the reject
    /// simulation) are recorded without any balance effect.
    pub fn post(&mut self, posting: Posting) -> Result<bool> {
        if self.index.contains_key(&posting.id) {
            return Ok(false);
        }

        let live_debit =
            posting.posting_type == PostingType::Debit && posting.status == PostingStatus::Processing;

        if live_debit && self.kind == AccountKind::Customer && posting.magnitude() > self.available {
            return Err(BankError::InsufficientFunds {
                required: Money::new(posting.magnitude(), self.currency.clone()),
                available: Money::new(self.available, self.currency.clone()),
            });
        }

        if live_debit {
            // Hold: the amount is unavailable from now on.
            self.available += posting.amount;
        }

        self.index.insert(posting.id.clone(), self.postings.len());
        self.postings.push(posting);
        Ok(true)
    }

    /// Commit a posting: books the amount into the current balance and, for
    /// credits, makes the funds available. Returns the updated posting.
    pub fn commit(&mut self, id: &PostingId) -> Result<Posting> {
        let posting = self.posting_mut(id)?;
        posting.transition_to(PostingStatus::Success)?;
        let amount = posting.amount;
        let posting_type = posting.posting_type;
        let snapshot = posting.clone();

        self.current += amount;
        if posting_type == PostingType::Credit {
            self.available += amount;
        }
        Ok(snapshot)
    }

    /// Cancel a posting: releases a debit's hold. Returns the updated
    /// posting.
    pub fn rollback(&mut self, id: &PostingId) -> Result<Posting> {
        let posting = self.posting_mut(id)?;
        posting.transition_to(PostingStatus::FailureCanceled)?;
        let amount = posting.amount;
        let posting_type = posting.posting_type;
        let snapshot = posting.clone();

        if posting_type == PostingType::Debit {
            self.available -= amount;
        }
        Ok(snapshot)
    }

    /// Look up a posting by id.
    pub fn posting(&self, id: &PostingId) -> Option<&Posting> {
        self.index.get(id).map(|&i| &self.postings[i])
    }

    /// Page through postings, most recent first.
    pub fn page(&self, offset: usize, limit: usize) -> Vec<Posting> {
        self.postings
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Ids of all postings of a transfer still in `Processing`.
    pub fn processing_postings_of(&self, transfer_id: &TransferId) -> Vec<PostingId> {
        self.postings
            .iter()
            .filter(|p| &p.transfer_id == transfer_id && p.status == PostingStatus::Processing)
            .map(|p| p.id.clone())
            .collect()
    }

    fn posting_mut(&mut self, id: &PostingId) -> Result<&mut Posting> {
        let index = *self
            .index
            .get(id)
            .ok_or_else(|| BankError::TransactionNotFound(id.clone()))?;
        Ok(&mut self.postings[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posting::AccountTransfer;
    use corebank_common::AccountRef;
    use rust_decimal_macros::dec;

    fn customer_descriptor(balance: Decimal) -> AccountDescriptor {
        AccountDescriptor {
            name: "Alice Chandler".to_string(),
            address: None,
            reference: AccountRef::new("IRONBANK44", "1000001"),
            currency: Currency::eur(),
            kind: AccountKind::Customer,
            opening_balance: balance,
        }
    }

    fn debit_posting(transfer: &str, amount: Decimal) -> Posting {
        AccountTransfer::new(
            TransferId::new(transfer),
            0,
            AccountRef::new("IRONBANK44", "1000001"),
            AccountRef::new("IRONBANK44", "hold-EUR"),
            Money::new(amount, Currency::eur()),
        )
        .into_pair()
        .debit
    }

    #[test]
    fn test_debit_holds_available() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(1000.00)));

        assert!(ledger.post(debit_posting("tt-1", dec!(100.00))).unwrap());

        let balance = ledger.balance();
        assert_eq!(balance.available, dec!(900.00));
        assert_eq!(balance.current, dec!(1000.00));
    }

    #[test]
    fn test_duplicate_posting_is_ignored() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(1000.00)));

        assert!(ledger.post(debit_posting("tt-1", dec!(100.00))).unwrap());
        assert!(!ledger.post(debit_posting("tt-1", dec!(100.00))).unwrap());

        // Not double-posted.
        assert_eq!(ledger.balance().available, dec!(900.00));
        assert_eq!(ledger.page(0, 10).len(), 1);
    }

    #[test]
    fn test_insufficient_funds() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(50.00)));

        let err = ledger.post(debit_posting("tt-1", dec!(100.00))).unwrap_err();
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");
        assert_eq!(ledger.balance().available, dec!(50.00));
    }

    #[test]
    fn test_commit_books_current() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(1000.00)));
        let posting = debit_posting("tt-1", dec!(100.00));
        let id = posting.id.clone();
        ledger.post(posting).unwrap();

        let committed = ledger.commit(&id).unwrap();
        assert_eq!(committed.status, PostingStatus::Success);

        let balance = ledger.balance();
        assert_eq!(balance.available, dec!(900.00));
        assert_eq!(balance.current, dec!(900.00));
    }

    #[test]
    fn test_rollback_releases_hold() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(1000.00)));
        let posting = debit_posting("tt-1", dec!(100.00));
        let id = posting.id.clone();
        ledger.post(posting).unwrap();

        let canceled = ledger.rollback(&id).unwrap();
        assert_eq!(canceled.status, PostingStatus::FailureCanceled);

        let balance = ledger.balance();
        assert_eq!(balance.available, dec!(1000.00));
        assert_eq!(balance.current, dec!(1000.00));
    }

    #[test]
    fn test_credit_grants_on_commit_only() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(0.00)));
        let credit = AccountTransfer::new(
            TransferId::new("tt-2"),
            0,
            AccountRef::new("IRONBANK44", "settle-EUR"),
            AccountRef::new("IRONBANK44", "1000001"),
            Money::new(dec!(75.00), Currency::eur()),
        )
        .into_pair()
        .credit;
        let id = credit.id.clone();

        ledger.post(credit).unwrap();
        assert_eq!(ledger.balance().available, dec!(0.00));

        ledger.commit(&id).unwrap();
        let balance = ledger.balance();
        assert_eq!(balance.available, dec!(75.00));
        assert_eq!(balance.current, dec!(75.00));
    }

    #[test]
    fn test_commit_unknown_posting() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(1000.00)));
        let err = ledger.commit(&PostingId::new("missing")).unwrap_err();
        assert_eq!(err.error_code(), "TRANSACTION_NOT_FOUND");
    }

    #[test]
    fn test_commit_twice_rejected() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(1000.00)));
        let posting = debit_posting("tt-1", dec!(100.00));
        let id = posting.id.clone();
        ledger.post(posting).unwrap();

        ledger.commit(&id).unwrap();
        let err = ledger.commit(&id).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        // Balance applied exactly once.
        assert_eq!(ledger.balance().current, dec!(900.00));
    }

    #[test]
    fn test_page_most_recent_first() {
        let mut ledger = AccountLedger::new(&customer_descriptor(dec!(1000.00)));
        for i in 0..5 {
            ledger
                .post(debit_posting(&format!("tt-{}", i), dec!(10.00)))
                .unwrap();
        }

        let page = ledger.page(0, 2);
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].transfer_id, TransferId::new("tt-4"));
        assert_eq!(page[1].transfer_id, TransferId::new("tt-3"));

        // Offset past the end yields an empty page.
        assert!(ledger.page(10, 2).is_empty());
    }
}
