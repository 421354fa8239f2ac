//! Error types for the Veil client.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{ComputeId, QuoteId};

/// Protocol phase an error was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Local checks before any network or ledger interaction.
    Validate,
    /// Requesting a quote.
    Quote,
    /// Paying on the ledger.
    Pay,
    /// Submitting the artifact with its receipt.
    Submit,
    /// Waiting for a compute event.
    Await,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Validate => "validate",
            Phase::Quote => "quote",
            Phase::Pay => "pay",
            Phase::Submit => "submit",
            Phase::Await => "await",
        };
        f.write_str(name)
    }
}

/// Why a payment did not produce a receipt.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentFailure {
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: u64, available: u64 },

    #[error("quote expired before payment")]
    QuoteExpired,

    #[error("quote has already been paid")]
    QuoteAlreadyPaid,

    #[error("payment was not confirmed in time")]
    Timeout,

    #[error("ledger rejected the transaction: {message}")]
    Rejected { message: String },
}

/// Main error type for Veil operations.
#[derive(Error, Debug, Clone)]
pub enum VeilError {
    /// The quote service was unreachable or refused the descriptor.
    #[error("Quote unavailable: {reason}")]
    QuoteUnavailable { reason: String },

    /// No receipt was produced for the quote.
    #[error("Payment failed for quote {quote_id}: {reason}")]
    PaymentFailed {
        quote_id: QuoteId,
        reason: PaymentFailure,
    },

    /// The network refused the artifact/receipt pairing.
    #[error("Submission rejected: {reason}")]
    SubmissionRejected {
        quote_id: Option<QuoteId>,
        reason: String,
    },

    /// Submission did not complete after the quote was paid: transport
    /// failure, unexpected response or missing resource. Whether the network
    /// redeemed the receipt is unknown.
    #[error("Submission failed for quote {quote_id}: {reason}")]
    SubmissionFailed { quote_id: QuoteId, reason: String },

    /// A party declared by the program has no binding.
    #[error("Party '{name}' is declared by the program but not bound")]
    UnboundParty { name: String },

    /// A binding names a party the program does not declare.
    #[error("Party '{name}' is bound but not declared by the program")]
    UnknownParty { name: String },

    /// The caller's wall-clock limit elapsed before the event arrived.
    #[error("Timed out after {waited_ms}ms waiting for compute {compute_id}")]
    AwaitTimeout { compute_id: ComputeId, waited_ms: u64 },

    /// The network closed the event stream.
    #[error("Event stream closed")]
    StreamClosed,

    /// The subscriber fell behind and events were dropped before delivery.
    #[error("Event stream dropped {skipped} events")]
    EventsLost { skipped: u64 },

    /// The network reported a failed computation.
    #[error("Computation {compute_id} failed: {cause}")]
    ComputationFailed { compute_id: ComputeId, cause: String },

    /// A terminal event for this compute id was already delivered.
    #[error("Compute {compute_id} has already settled")]
    AlreadySettled { compute_id: ComputeId },

    /// The artifact is malformed.
    #[error("Invalid artifact: {0}")]
    InvalidArtifact(String),

    /// Resource not found.
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// Configuration could not be loaded or is inconsistent.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl VeilError {
    /// Shorthand for a submission rejection tied to a quote.
    pub fn rejected(quote_id: QuoteId, reason: impl Into<String>) -> Self {
        VeilError::SubmissionRejected {
            quote_id: Some(quote_id),
            reason: reason.into(),
        }
    }

    /// The protocol phase this error belongs to, if any.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            VeilError::UnboundParty { .. }
            | VeilError::UnknownParty { .. }
            | VeilError::InvalidArtifact(_) => Some(Phase::Validate),
            VeilError::QuoteUnavailable { .. } => Some(Phase::Quote),
            VeilError::PaymentFailed { .. } => Some(Phase::Pay),
            VeilError::SubmissionRejected { .. } | VeilError::SubmissionFailed { .. } => {
                Some(Phase::Submit)
            }
            VeilError::AwaitTimeout { .. }
            | VeilError::StreamClosed
            | VeilError::EventsLost { .. }
            | VeilError::ComputationFailed { .. }
            | VeilError::AlreadySettled { .. } => Some(Phase::Await),
            _ => None,
        }
    }

    /// Returns the quote this error is tied to, if any.
    pub fn quote_id(&self) -> Option<QuoteId> {
        match self {
            VeilError::PaymentFailed { quote_id, .. } => Some(*quote_id),
            VeilError::SubmissionRejected { quote_id, .. } => *quote_id,
            VeilError::SubmissionFailed { quote_id, .. } => Some(*quote_id),
            _ => None,
        }
    }

    /// Returns true if the caller may restart the operation from a fresh quote.
    ///
    /// The quote involved is spent either way; nothing here is retried
    /// automatically.
    pub fn should_requote(&self) -> bool {
        match self {
            VeilError::QuoteUnavailable { .. } => true,
            VeilError::PaymentFailed { reason, .. } => !matches!(
                reason,
                PaymentFailure::InsufficientFunds { .. } | PaymentFailure::Rejected { .. }
            ),
            VeilError::SubmissionRejected { .. } => true,
            VeilError::ConnectionError(_) => true,
            _ => false,
        }
    }
}

/// Convenience Result type for Veil operations.
pub type Result<T> = std::result::Result<T, VeilError>;

impl From<serde_json::Error> for VeilError {
    fn from(err: serde_json::Error) -> Self {
        VeilError::SerializationError(err.to_string())
    }
}
