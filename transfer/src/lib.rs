//! CoreBank Instant Transfer
//!
//! The two-phase (begin/commit/rollback) saga that sequences the accounting
//! and pricing engines for the debit and credit legs of an instant transfer,
//! plus the service facade invoked by the RPC dispatch layer.

pub mod instruction;
pub mod orchestrator;
pub mod service;
pub mod state;

pub use instruction::{TransactionHandle, TransferInstruction};
pub use orchestrator::InstantTransferOrchestrator;
pub use service::{BankService, TransferRequest};
pub use state::{CreditLegState, DebitLegState};
