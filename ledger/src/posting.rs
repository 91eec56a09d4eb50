//! Posting types for double-entry transfer recording.

use chrono::{DateTime, Utc};
use corebank_common::{AccountRef, BankError, Currency, Money, PostingId, Result, TransferId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of a posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PostingType {
    /// Debit entry (funds leave the posting's account).
    Debit,
    /// Credit entry (funds arrive at the posting's account).
    Credit,
}

/// Posting lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PostingStatus {
    /// Created, awaiting final settlement confirmation.
    Processing,
    /// Committed; balance change is booked.
    Success,
    /// Canceled before clearing; any hold has been released.
    FailureCanceled,
}

impl PostingStatus {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, PostingStatus::Success | PostingStatus::FailureCanceled)
    }

    /// Check if transition to the given state is valid.
    pub fn can_transition_to(&self, next: PostingStatus) -> bool {
        matches!(
            (self, next),
            (
                PostingStatus::Processing,
                PostingStatus::Success | PostingStatus::FailureCanceled
            )
        )
    }

    /// Get the state name as used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            PostingStatus::Processing => "PROCESSING",
            PostingStatus::Success => "SUCCESS",
            PostingStatus::FailureCanceled => "FAILURE_CANCELED",
        }
    }
}

impl std::fmt::Display for PostingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single signed ledger entry against one account.
///
/// The amount is signed by side: debit postings carry a negative amount,
/// credit postings a positive one, so a balanced pair sums to zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    /// Unique posting ID, derived from the transfer id, leg, and side.
    pub id: PostingId,
    /// Transfer this posting belongs to.
    pub transfer_id: TransferId,
    /// Posting side.
    pub posting_type: PostingType,
    /// Account the posting is recorded against.
    pub account: AccountRef,
    /// The other account of the balanced pair.
    pub counterparty: AccountRef,
    /// Signed amount (negative for debits).
    pub amount: Decimal,
    /// Posting currency.
    pub currency: Currency,
    /// Lifecycle state.
    pub status: PostingStatus,
    /// Free-text description / remittance information.
    pub description: Option<String>,
    /// When the posting was created.
    pub created_at: DateTime<Utc>,
}

impl Posting {
    /// Create a debit posting for a transfer leg.
    pub fn debit(
        transfer_id: TransferId,
        leg: u32,
        account: AccountRef,
        counterparty: AccountRef,
        amount: &Money,
        description: Option<String>,
    ) -> Self {
        Self {
            id: PostingId::debit(&transfer_id, leg),
            transfer_id,
            posting_type: PostingType::Debit,
            account,
            counterparty,
            amount: -amount.value,
            currency: amount.currency.clone(),
            status: PostingStatus::Processing,
            description,
            created_at: Utc::now(),
        }
    }

    /// Create a credit posting for a transfer leg.
    pub fn credit(
        transfer_id: TransferId,
        leg: u32,
        account: AccountRef,
        counterparty: AccountRef,
        amount: &Money,
        description: Option<String>,
    ) -> Self {
        Self {
            id: PostingId::credit(&transfer_id, leg),
            transfer_id,
            posting_type: PostingType::Credit,
            account,
            counterparty,
            amount: amount.value,
            currency: amount.currency.clone(),
            status: PostingStatus::Processing,
            description,
            created_at: Utc::now(),
        }
    }

    /// Unsigned size of the posting.
    pub fn magnitude(&self) -> Decimal {
        self.amount.abs()
    }

    /// The posting amount as Money (signed).
    pub fn money(&self) -> Money {
        Money::new(self.amount, self.currency.clone())
    }

    /// Transition to a new status, rejecting invalid transitions.
    pub fn transition_to(&mut self, next: PostingStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BankError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        self.status = next;
        Ok(())
    }
}

/// A transfer instruction between two accounts, prior to posting. Posting it
/// yields a balanced debit/credit pair sharing the transfer id.
#[derive(Debug, Clone)]
pub struct AccountTransfer {
    /// Transfer this movement belongs to.
    pub transfer_id: TransferId,
    /// Leg number, kept distinct per movement of the same transfer.
    pub leg: u32,
    /// Source account.
    pub from: AccountRef,
    /// Destination account.
    pub to: AccountRef,
    /// Amount and currency moved.
    pub amount: Money,
    /// Free-text description.
    pub description: Option<String>,
}

impl AccountTransfer {
    /// Create a new transfer instruction.
    pub fn new(
        transfer_id: TransferId,
        leg: u32,
        from: AccountRef,
        to: AccountRef,
        amount: Money,
    ) -> Self {
        Self {
            transfer_id,
            leg,
            from,
            to,
            amount,
            description: None,
        }
    }

    /// Attach a description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Convert into the balanced posting pair.
    pub fn into_pair(self) -> PostingPair {
        let debit = Posting::debit(
            self.transfer_id.clone(),
            self.leg,
            self.from.clone(),
            self.to.clone(),
            &self.amount,
            self.description.clone(),
        );
        let credit = Posting::credit(
            self.transfer_id,
            self.leg,
            self.to,
            self.from,
            &self.amount,
            self.description,
        );
        PostingPair { debit, credit }
    }
}

/// A balanced pair of postings recording one transfer movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingPair {
    /// Debit-side posting (source account).
    pub debit: Posting,
    /// Credit-side posting (destination account).
    pub credit: Posting,
}

impl PostingPair {
    /// Verify the pair conserves value: amounts sum to zero, same transfer.
    pub fn is_balanced(&self) -> bool {
        self.debit.amount + self.credit.amount == Decimal::ZERO
            && self.debit.transfer_id == self.credit.transfer_id
            && self.debit.currency == self.credit.currency
    }
}
