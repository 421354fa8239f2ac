//! # Veil Core
//!
//! Core data model for clients of paid MPC networks.
//!
//! This crate provides the fundamental building blocks:
//! - [`Quote`] and [`PaymentReceipt`] - priced authorization and its proof of payment
//! - [`Artifact`] - programs, secret values and compute jobs
//! - [`ComputeEvent`] - asynchronous completion signals
//! - [`VeilError`] - protocol error taxonomy

pub mod artifact;
pub mod config;
pub mod error;
pub mod event;
pub mod keys;
pub mod permissions;
pub mod quote;
pub mod types;

// Re-exports for convenience
pub use artifact::{
    Artifact, ComputeJob, NamedValues, Program, ProgramBindings, ProgramParties, SecretValue,
    SecretValueSet,
};
pub use config::ClientConfig;
pub use error::{PaymentFailure, Phase, Result, VeilError};
pub use event::{ComputeEvent, ComputeOutcome, ResultBindings};
pub use keys::{NodeKey, UserKey};
pub use permissions::Permissions;
pub use quote::{OperationDescriptor, PaymentReceipt, Quote};
pub use types::*;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::artifact::{
        Artifact, ComputeJob, NamedValues, Program, ProgramBindings, ProgramParties, SecretValue,
        SecretValueSet,
    };
    pub use crate::config::ClientConfig;
    pub use crate::error::{PaymentFailure, Result, VeilError};
    pub use crate::event::{ComputeEvent, ComputeOutcome};
    pub use crate::keys::{NodeKey, UserKey};
    pub use crate::permissions::Permissions;
    pub use crate::types::{ActionId, ComputeId, PartyId, ProgramId, StoreId, UserId};
}
