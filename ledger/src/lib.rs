//! CoreBank Ledger
//!
//! Account directory and in-memory double-entry posting ledger with
//! hold/commit/rollback semantics for two-phase transfers.

pub mod account;
pub mod directory;
pub mod engine;
pub mod posting;

pub use account::AccountLedger;
pub use directory::{AccountDescriptor, AccountDirectory, AccountKind, DirectoryConfig};
pub use engine::AccountingEngine;
pub use posting::{AccountTransfer, Posting, PostingPair, PostingStatus, PostingType};
