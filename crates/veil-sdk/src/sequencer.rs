//! Kind-specific hooks for the quote → pay → submit sequence.
//!
//! [`NetworkClient::execute`](crate::NetworkClient::execute) drives every
//! artifact through the same three phases. A [`Submission`] supplies what
//! differs per kind: how to price it, what to check locally before anything
//! is spent, and which network call redeems the receipt.

use std::fmt;

use async_trait::async_trait;
use veil_core::{
    ActionId, ComputeId, ComputeJob, OperationDescriptor, PaymentReceipt, Program, Result,
    SecretValueSet, StoreId,
};

use crate::network::{Network, ProgramRegistry};
use crate::validate::validate_bindings;

/// An artifact that can be paid for and submitted.
#[async_trait]
pub trait Submission: Send + Sync {
    /// Identifier the network returns on success.
    type Id: fmt::Display + Send;

    /// Describe the operation for pricing.
    fn descriptor(&self) -> OperationDescriptor;

    /// Checks that must pass before a quote is requested.
    async fn validate(&self, registry: &dyn ProgramRegistry) -> Result<()>;

    /// Hand the artifact and its receipt to the network.
    async fn submit(&self, network: &dyn Network, receipt: PaymentReceipt) -> Result<Self::Id>;
}

#[async_trait]
impl Submission for Program {
    type Id = ActionId;

    fn descriptor(&self) -> OperationDescriptor {
        Program::descriptor(self)
    }

    async fn validate(&self, _registry: &dyn ProgramRegistry) -> Result<()> {
        Program::validate(self)
    }

    async fn submit(&self, network: &dyn Network, receipt: PaymentReceipt) -> Result<ActionId> {
        network.store_program(self, receipt).await
    }
}

#[async_trait]
impl Submission for SecretValueSet {
    type Id = StoreId;

    fn descriptor(&self) -> OperationDescriptor {
        SecretValueSet::descriptor(self)
    }

    async fn validate(&self, _registry: &dyn ProgramRegistry) -> Result<()> {
        SecretValueSet::validate(self)
    }

    async fn submit(&self, network: &dyn Network, receipt: PaymentReceipt) -> Result<StoreId> {
        network.store_values(self, receipt).await
    }
}

#[async_trait]
impl Submission for ComputeJob {
    type Id = ComputeId;

    fn descriptor(&self) -> OperationDescriptor {
        ComputeJob::descriptor(self)
    }

    async fn validate(&self, registry: &dyn ProgramRegistry) -> Result<()> {
        ComputeJob::validate(self)?;
        let declared = registry.declared_parties(self.program_id()).await?;
        validate_bindings(&declared, &self.bindings)
    }

    async fn submit(&self, network: &dyn Network, receipt: PaymentReceipt) -> Result<ComputeId> {
        network.compute(self, receipt).await
    }
}
