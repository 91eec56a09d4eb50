//! Transfer instructions and transaction handles.

use corebank_common::{AccountRef, Currency, Money, PostingId, TransferId};
use corebank_pricing::Quote;
use serde::{Deserialize, Serialize};

/// An instant-transfer instruction for one leg, as handed over by the RPC
/// dispatch layer after deserialization.
#[derive(Debug, Clone)]
pub struct TransferInstruction {
    /// Network-wide transfer id, shared by the debit and credit legs.
    pub transfer_id: TransferId,
    /// The customer account this leg acts on: the source for a debit, the
    /// destination for a credit.
    pub account: AccountRef,
    /// Instructed amount, in the transaction currency.
    pub amount: Money,
    /// Amount the transfer settles in. Equal to `amount` unless the debit
    /// side converts currency.
    pub settlement_amount: Money,
    /// Source-side FX quote; required when the transaction currency differs
    /// from the account currency.
    pub quote: Option<Quote>,
    /// Free-text remittance information.
    pub description: Option<String>,
}

impl TransferInstruction {
    /// Create a same-currency instruction.
    pub fn new(transfer_id: TransferId, account: AccountRef, amount: Money) -> Self {
        Self {
            transfer_id,
            account,
            settlement_amount: amount.clone(),
            amount,
            quote: None,
            description: None,
        }
    }

    /// Set the settlement amount and the quote priced for the conversion.
    pub fn with_fx(mut self, settlement_amount: Money, quote: Quote) -> Self {
        self.settlement_amount = settlement_amount;
        self.quote = Some(quote);
        self
    }

    /// Attach remittance information.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Currency the transfer settles in.
    pub fn settlement_currency(&self) -> &Currency {
        &self.settlement_amount.currency
    }
}

/// Handle returned from a begin call; later commit/rollback calls reference
/// the transaction by this id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionHandle {
    /// Id of the posting (or pending record) created by begin.
    pub transaction_id: PostingId,
    /// The instructed amount.
    pub amount: Money,
    /// Settlement account for the transfer's settlement currency.
    pub settlement_account: AccountRef,
}
