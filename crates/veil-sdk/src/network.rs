//! Interfaces to the MPC network.

use async_trait::async_trait;
use veil_core::{
    ActionId, ComputeId, ComputeJob, PaymentReceipt, Program, ProgramId, ProgramParties, Result,
    SecretValueSet, StoreId,
};

/// Accepts paid submissions.
///
/// Each call redeems `receipt`; the network rejects a receipt that was
/// already redeemed or that was issued for a different operation.
#[async_trait]
pub trait Network: Send + Sync {
    async fn store_program(&self, program: &Program, receipt: PaymentReceipt) -> Result<ActionId>;

    async fn store_values(&self, values: &SecretValueSet, receipt: PaymentReceipt)
        -> Result<StoreId>;

    async fn compute(&self, job: &ComputeJob, receipt: PaymentReceipt) -> Result<ComputeId>;
}

/// Exposes the parties a stored program declares.
#[async_trait]
pub trait ProgramRegistry: Send + Sync {
    async fn declared_parties(&self, program_id: &ProgramId) -> Result<ProgramParties>;
}
