//! In-process network for development and tests.
//!
//! [`LocalNetwork`] keeps the bookkeeping a real cluster does on the client's
//! behalf: it issues quotes, redeems receipts against the ledger, stores
//! programs and values, checks permissions and party coverage, and publishes
//! compute events. It does not evaluate programs; whoever drives the network
//! reports outcomes through [`LocalNetwork::finish`] and [`LocalNetwork::fail`].

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use veil_core::{
    ActionId, ComputeEvent, ComputeId, ComputeJob, OperationDescriptor, PaymentReceipt, Program,
    ProgramId, ProgramParties, Quote, QuoteId, Result, ResultBindings, SecretValueSet, StoreId,
    UserId, VeilError,
};
use veil_events::{BroadcastSource, EventBus};
use veil_payments::{InMemoryLedger, InMemoryQuoteService, PriceSchedule, QuoteService};

use crate::network::{Network, ProgramRegistry};
use crate::validate::validate_bindings;

struct StoredValues {
    values: SecretValueSet,
    expires_at: DateTime<Utc>,
}

struct JobRecord {
    job: ComputeJob,
    requester: UserId,
    settled: bool,
}

#[derive(Default)]
struct NetworkState {
    programs: HashMap<ProgramId, Program>,
    stores: HashMap<StoreId, StoredValues>,
    jobs: HashMap<ComputeId, JobRecord>,
    redeemed: HashSet<QuoteId>,
}

struct Inner {
    cluster_id: String,
    quotes: InMemoryQuoteService,
    ledger: Arc<InMemoryLedger>,
    state: RwLock<NetworkState>,
    events: EventBus,
}

/// A single-cluster network living in this process.
#[derive(Clone)]
pub struct LocalNetwork {
    inner: Arc<Inner>,
}

impl LocalNetwork {
    pub fn new(
        cluster_id: impl Into<String>,
        schedule: PriceSchedule,
        ledger: Arc<InMemoryLedger>,
    ) -> Self {
        Self::with_quote_service(cluster_id, InMemoryQuoteService::new(schedule), ledger)
    }

    pub fn with_quote_service(
        cluster_id: impl Into<String>,
        quotes: InMemoryQuoteService,
        ledger: Arc<InMemoryLedger>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                cluster_id: cluster_id.into(),
                quotes,
                ledger,
                state: RwLock::new(NetworkState::default()),
                events: EventBus::default(),
            }),
        }
    }

    pub fn cluster_id(&self) -> &str {
        &self.inner.cluster_id
    }

    /// Open a session acting as `user`.
    pub fn connect(&self, user: UserId) -> LocalSession {
        tracing::debug!(cluster = %self.inner.cluster_id, %user, "local session opened");
        LocalSession {
            inner: self.inner.clone(),
            user,
        }
    }

    /// Subscribe to compute events published from now on.
    pub fn subscribe(&self) -> BroadcastSource {
        self.inner.events.subscribe()
    }

    /// Number of quotes issued so far.
    pub async fn quotes_issued(&self) -> usize {
        self.inner.quotes.issued_count().await
    }

    /// Compute jobs that have not settled yet.
    pub async fn pending_jobs(&self) -> Vec<ComputeId> {
        let state = self.inner.state.read().await;
        state
            .jobs
            .iter()
            .filter(|(_, record)| !record.settled)
            .map(|(id, _)| *id)
            .collect()
    }

    pub async fn job(&self, compute_id: ComputeId) -> Option<ComputeJob> {
        let state = self.inner.state.read().await;
        state.jobs.get(&compute_id).map(|record| record.job.clone())
    }

    /// Who submitted a compute job.
    pub async fn requester(&self, compute_id: ComputeId) -> Option<UserId> {
        let state = self.inner.state.read().await;
        state.jobs.get(&compute_id).map(|record| record.requester.clone())
    }

    pub async fn stored_values(&self, store_id: StoreId) -> Option<SecretValueSet> {
        let state = self.inner.state.read().await;
        state.stores.get(&store_id).map(|stored| stored.values.clone())
    }

    /// Report a successful computation.
    ///
    /// Only results for the job's bound output parties are published.
    pub async fn finish(&self, compute_id: ComputeId, mut outputs: ResultBindings) -> Result<()> {
        let mut state = self.inner.state.write().await;
        let record = Self::unsettled_job(&mut state, compute_id)?;

        let bound = &record.job.bindings.output_parties;
        outputs.retain(|party, _| bound.contains_key(party));
        record.settled = true;

        tracing::info!(%compute_id, parties = outputs.len(), "compute finished");
        self.inner.events.publish(ComputeEvent::Finished {
            compute_id,
            results: outputs,
        });
        Ok(())
    }

    /// Report a failed computation.
    pub async fn fail(&self, compute_id: ComputeId, cause: impl Into<String>) -> Result<()> {
        let mut state = self.inner.state.write().await;
        let record = Self::unsettled_job(&mut state, compute_id)?;
        record.settled = true;

        let cause = cause.into();
        tracing::info!(%compute_id, %cause, "compute failed");
        self.inner.events.publish(ComputeEvent::Failed { compute_id, cause });
        Ok(())
    }

    fn unsettled_job(state: &mut NetworkState, compute_id: ComputeId) -> Result<&mut JobRecord> {
        let record = state
            .jobs
            .get_mut(&compute_id)
            .ok_or_else(|| VeilError::NotFound {
                resource_type: "ComputeJob".to_string(),
                id: compute_id.to_string(),
            })?;
        if record.settled {
            return Err(VeilError::AlreadySettled { compute_id });
        }
        Ok(record)
    }
}

/// A user's connection to a [`LocalNetwork`].
#[derive(Clone)]
pub struct LocalSession {
    inner: Arc<Inner>,
    user: UserId,
}

impl LocalSession {
    pub fn user(&self) -> &UserId {
        &self.user
    }

    /// Check that `receipt` pays for `descriptor` and has not been used.
    async fn redeem(
        &self,
        state: &mut NetworkState,
        receipt: &PaymentReceipt,
        descriptor: &OperationDescriptor,
    ) -> Result<()> {
        let quote_id = receipt.quote_id;
        let quote: Quote = self
            .inner
            .quotes
            .issued(quote_id)
            .await
            .ok_or_else(|| VeilError::rejected(quote_id, "quote was not issued by this cluster"))?;

        if !quote.covers(descriptor) {
            return Err(VeilError::rejected(
                quote_id,
                "receipt pays for a different operation",
            ));
        }
        if state.redeemed.contains(&quote_id) {
            return Err(VeilError::rejected(quote_id, "receipt already redeemed"));
        }
        if quote.is_expired() {
            return Err(VeilError::rejected(quote_id, "quote expired"));
        }
        if receipt.amount < quote.price {
            return Err(VeilError::rejected(
                quote_id,
                format!("paid {} of {}", receipt.amount, quote.price),
            ));
        }

        let paid = self
            .inner
            .ledger
            .transaction(&receipt.tx_hash)
            .await
            .map_or(false, |tx| tx.body.quote_id == quote_id && tx.body.amount >= quote.price);
        if !paid {
            return Err(VeilError::rejected(quote_id, "payment not found on ledger"));
        }

        state.redeemed.insert(quote_id);
        Ok(())
    }
}

#[async_trait]
impl QuoteService for LocalSession {
    async fn quote(&self, descriptor: &OperationDescriptor) -> Result<Quote> {
        self.inner.quotes.quote(descriptor).await
    }
}

#[async_trait]
impl ProgramRegistry for LocalSession {
    async fn declared_parties(&self, program_id: &ProgramId) -> Result<ProgramParties> {
        let state = self.inner.state.read().await;
        state
            .programs
            .get(program_id)
            .map(|program| program.parties.clone())
            .ok_or_else(|| VeilError::NotFound {
                resource_type: "Program".to_string(),
                id: program_id.to_string(),
            })
    }
}

#[async_trait]
impl Network for LocalSession {
    async fn store_program(&self, program: &Program, receipt: PaymentReceipt) -> Result<ActionId> {
        let quote_id = receipt.quote_id;
        let mut state = self.inner.state.write().await;

        if program.owner != self.user {
            return Err(VeilError::rejected(quote_id, "program owner is not the caller"));
        }
        program
            .validate()
            .map_err(|e| VeilError::rejected(quote_id, e.to_string()))?;
        let program_id = program.id();
        if state.programs.contains_key(&program_id) {
            return Err(VeilError::rejected(
                quote_id,
                format!("program {} already stored", program_id),
            ));
        }

        self.redeem(&mut state, &receipt, &program.descriptor()).await?;

        let action_id = ActionId::new();
        state.programs.insert(program_id.clone(), program.clone());
        tracing::info!(%program_id, %action_id, "program stored");
        Ok(action_id)
    }

    async fn store_values(
        &self,
        values: &SecretValueSet,
        receipt: PaymentReceipt,
    ) -> Result<StoreId> {
        let quote_id = receipt.quote_id;
        let mut state = self.inner.state.write().await;

        if values.permissions.owner != self.user {
            return Err(VeilError::rejected(quote_id, "permissions owner is not the caller"));
        }
        values
            .validate()
            .map_err(|e| VeilError::rejected(quote_id, e.to_string()))?;

        self.redeem(&mut state, &receipt, &values.descriptor()).await?;

        let store_id = StoreId::new();
        state.stores.insert(
            store_id,
            StoredValues {
                values: values.clone(),
                expires_at: Utc::now() + Duration::days(i64::from(values.ttl_days)),
            },
        );
        tracing::info!(
            %store_id,
            values = values.values.len(),
            ttl_days = values.ttl_days,
            "values stored"
        );
        Ok(store_id)
    }

    async fn compute(&self, job: &ComputeJob, receipt: PaymentReceipt) -> Result<ComputeId> {
        let quote_id = receipt.quote_id;
        let mut state = self.inner.state.write().await;
        let program_id = job.program_id();

        let program = state
            .programs
            .get(program_id)
            .ok_or_else(|| {
                VeilError::rejected(quote_id, format!("unknown program {}", program_id))
            })?;
        validate_bindings(&program.parties, &job.bindings)
            .map_err(|e| VeilError::rejected(quote_id, e.to_string()))?;

        let now = Utc::now();
        for store_id in &job.store_ids {
            let stored = state
                .stores
                .get(store_id)
                .filter(|stored| stored.expires_at > now)
                .ok_or_else(|| {
                    VeilError::rejected(quote_id, format!("unknown store {}", store_id))
                })?;

            let permissions = &stored.values.permissions;
            if !permissions.can_compute(&self.user, program_id) {
                return Err(VeilError::rejected(
                    quote_id,
                    format!("no compute permission on store {}", store_id),
                ));
            }
        }

        self.redeem(&mut state, &receipt, &job.descriptor()).await?;

        let compute_id = ComputeId::new();
        state.jobs.insert(
            compute_id,
            JobRecord {
                job: job.clone(),
                requester: self.user.clone(),
                settled: false,
            },
        );
        tracing::info!(%compute_id, %program_id, stores = job.store_ids.len(), "compute accepted");
        Ok(compute_id)
    }
}
