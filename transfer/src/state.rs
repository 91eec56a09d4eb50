//! Per-leg state machines for the instant-transfer saga.
//!
//! Callers drive begin/commit/rollback from outside; each leg's state
//! machine rejects out-of-order requests instead of trusting the caller.

use corebank_common::{BankError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Debit-leg lifecycle: funds are provisionally held at begin time and only
/// settle (or return) once the network confirms the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebitLegState {
    /// Instruction received, nothing posted yet.
    New,
    /// Hold placed on the source account.
    Held,
    /// Hold moved on to the settlement account.
    Settled,
    /// Canceled; any hold released.
    Canceled,
}

impl DebitLegState {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, DebitLegState::Settled | DebitLegState::Canceled)
    }

    /// Get valid next states from the current state.
    pub fn valid_transitions(&self) -> &[DebitLegState] {
        match self {
            DebitLegState::New => &[DebitLegState::Held, DebitLegState::Canceled],
            DebitLegState::Held => &[DebitLegState::Settled, DebitLegState::Canceled],
            DebitLegState::Settled => &[],
            DebitLegState::Canceled => &[],
        }
    }

    /// Check if transition to the given state is valid.
    pub fn can_transition_to(&self, next: DebitLegState) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Transition, rejecting invalid moves.
    pub fn transition_to(&mut self, next: DebitLegState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(BankError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for DebitLegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DebitLegState::New => "NEW",
            DebitLegState::Held => "HELD",
            DebitLegState::Settled => "SETTLED",
            DebitLegState::Canceled => "CANCELED",
        };
        write!(f, "{}", name)
    }
}

/// Credit-leg lifecycle: begin only validates (no funds move until the
/// debit side has settled), so the pending state carries no hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreditLegState {
    /// Instruction received, nothing validated yet.
    New,
    /// Destination validated, awaiting the payout.
    Pending,
    /// Beneficiary paid out from the settlement account.
    Settled,
    /// Canceled before payout.
    Canceled,
}

impl CreditLegState {
    /// Check if this is a final state.
    pub fn is_final(&self) -> bool {
        matches!(self, CreditLegState::Settled | CreditLegState::Canceled)
    }

    /// Get valid next states from the current state.
    pub fn valid_transitions(&self) -> &[CreditLegState] {
        match self {
            CreditLegState::New => &[CreditLegState::Pending, CreditLegState::Canceled],
            CreditLegState::Pending => &[CreditLegState::Settled, CreditLegState::Canceled],
            CreditLegState::Settled => &[],
            CreditLegState::Canceled => &[],
        }
    }

    /// Check if transition to the given state is valid.
    pub fn can_transition_to(&self, next: CreditLegState) -> bool {
        self.valid_transitions().contains(&next)
    }

    /// Transition, rejecting invalid moves.
    pub fn transition_to(&mut self, next: CreditLegState) -> Result<()> {
        if !self.can_transition_to(next) {
            return Err(BankError::InvalidTransition {
                from: self.to_string(),
                to: next.to_string(),
            });
        }
        *self = next;
        Ok(())
    }
}

impl fmt::Display for CreditLegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CreditLegState::New => "NEW",
            CreditLegState::Pending => "PENDING",
            CreditLegState::Settled => "SETTLED",
            CreditLegState::Canceled => "CANCELED",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debit_leg_happy_path() {
        let mut state = DebitLegState::New;
        state.transition_to(DebitLegState::Held).unwrap();
        state.transition_to(DebitLegState::Settled).unwrap();
        assert!(state.is_final());
    }

    #[test]
    fn test_debit_leg_cancel_from_any_non_terminal() {
        let mut held = DebitLegState::Held;
        held.transition_to(DebitLegState::Canceled).unwrap();

        let mut fresh = DebitLegState::New;
        fresh.transition_to(DebitLegState::Canceled).unwrap();
    }

    #[test]
    fn test_debit_leg_rejects_skip() {
        let mut state = DebitLegState::New;
        let err = state.transition_to(DebitLegState::Settled).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
    }

    #[test]
    fn test_settled_is_terminal() {
        let mut state = DebitLegState::Settled;
        assert!(state.transition_to(DebitLegState::Canceled).is_err());
    }

    #[test]
    fn test_credit_leg_happy_path() {
        let mut state = CreditLegState::New;
        state.transition_to(CreditLegState::Pending).unwrap();
        state.transition_to(CreditLegState::Settled).unwrap();
        assert!(state.is_final());
    }

    #[test]
    fn test_credit_leg_no_direct_settle() {
        let mut state = CreditLegState::New;
        assert!(state.transition_to(CreditLegState::Settled).is_err());
    }
}
