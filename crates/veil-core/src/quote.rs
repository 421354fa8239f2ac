//! Quotes, operation descriptors and payment receipts.
//!
//! A quote is a priced, time-bounded authorization for exactly one network
//! operation. Paying it on the ledger yields a [`PaymentReceipt`], which the
//! network redeems at most once.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{OperationKind, ProgramId, QuoteId, TxHash};

/// What is being priced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationDescriptor {
    /// Upload a compiled program.
    StoreProgram {
        program_name: String,
        payload_bytes: u64,
    },

    /// Store a set of secret values.
    StoreValues {
        value_count: u32,
        payload_bytes: u64,
        ttl_days: u32,
    },

    /// Run a stored program over stored and inline values.
    Compute {
        program_id: ProgramId,
        input_store_count: u32,
        inline_value_count: u32,
    },
}

impl OperationDescriptor {
    /// The kind of operation this describes.
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationDescriptor::StoreProgram { .. } => OperationKind::StoreProgram,
            OperationDescriptor::StoreValues { .. } => OperationKind::StoreValues,
            OperationDescriptor::Compute { .. } => OperationKind::Compute,
        }
    }
}

/// A priced authorization to perform one network operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,

    /// The operation this quote prices.
    pub descriptor: OperationDescriptor,

    /// Price in the ledger's smallest unit.
    pub price: u64,

    pub issued_at: DateTime<Utc>,

    /// After this instant the quote can no longer be paid or redeemed.
    pub expires_at: DateTime<Utc>,
}

impl Quote {
    /// Issue a quote valid for `validity` from now.
    pub fn new(descriptor: OperationDescriptor, price: u64, validity: Duration) -> Self {
        let issued_at = Utc::now();
        Self {
            id: QuoteId::new(),
            descriptor,
            price,
            issued_at,
            expires_at: issued_at + validity,
        }
    }

    /// Check if the quote has expired.
    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }

    /// Returns true if this quote prices exactly `descriptor`.
    pub fn covers(&self, descriptor: &OperationDescriptor) -> bool {
        &self.descriptor == descriptor
    }
}

/// Proof that a quote was paid on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub quote_id: QuoteId,
    pub tx_hash: TxHash,
    pub amount: u64,
    pub paid_at: DateTime<Utc>,
}
