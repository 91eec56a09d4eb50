//! Identifier types for CoreBank entities.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Bank account identity as it appears on the wire and in configuration:
/// an ISO 9362 routing code (BIC) plus an account number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    /// Routing code (BIC) of the holding institution.
    pub bic: String,
    /// Account number within the institution.
    pub number: String,
}

impl AccountRef {
    /// Create a new account reference.
    pub fn new(bic: impl Into<String>, number: impl Into<String>) -> Self {
        Self {
            bic: bic.into(),
            number: number.into(),
        }
    }

    /// Create a canonical string representation.
    pub fn canonical(&self) -> String {
        format!("{}:{}", self.bic, self.number)
    }
}

impl fmt::Display for AccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

/// Account identity as submitted by the calling network. Only the SWIFT
/// scheme is understood by the engine; other schemes are carried so that
/// the service layer can reject them explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountIdentifier {
    /// BIC + account number.
    Swift { bic: String, number: String },
    /// IBAN, not supported by this engine.
    Iban { iban: String },
    /// Any other scheme, identified by name.
    Custom { scheme: String, id: String },
}

impl AccountIdentifier {
    /// Convenience constructor for the supported scheme.
    pub fn swift(bic: impl Into<String>, number: impl Into<String>) -> Self {
        Self::Swift {
            bic: bic.into(),
            number: number.into(),
        }
    }

    /// Resolve to the internal account reference, if the scheme is supported.
    pub fn as_swift(&self) -> Option<AccountRef> {
        match self {
            Self::Swift { bic, number } => Some(AccountRef::new(bic, number)),
            _ => None,
        }
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swift { bic, number } => write!(f, "swift:{}:{}", bic, number),
            Self::Iban { iban } => write!(f, "iban:{}", iban),
            Self::Custom { scheme, id } => write!(f, "{}:{}", scheme, id),
        }
    }
}

/// Unique identifier for a transfer: the caller-supplied reference shared by
/// all postings of the same payment, on both legs of the two-phase protocol.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransferId(String);

impl TransferId {
    /// Create a new transfer ID from the caller-supplied reference.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TransferId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a single posting. Derived deterministically from
/// the transfer id, leg number, and side, so that re-submitting the same
/// transfer produces the same posting ids and the ledger can deduplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostingId(String);

impl PostingId {
    /// Create a posting ID from a raw string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive the debit-side posting ID for a transfer leg.
    pub fn debit(transfer_id: &TransferId, leg: u32) -> Self {
        Self(format!("{}:{}:debit", transfer_id, leg))
    }

    /// Derive the credit-side posting ID for a transfer leg.
    pub fn credit(transfer_id: &TransferId, leg: u32) -> Self {
        Self(format!("{}:{}:credit", transfer_id, leg))
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PostingId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Unique identifier for a pricing quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuoteId(Uuid);

impl QuoteId {
    /// Create a new quote ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for QuoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
