//! Veil network client.

use std::sync::Arc;

use tracing::{info, warn};
use veil_core::{
    ActionId, ClientConfig, ComputeId, ComputeJob, ComputeOutcome, NodeKey, OperationDescriptor,
    PartyId, PaymentFailure, PaymentReceipt, Program, ProgramId, Quote, Result, SecretValueSet,
    StoreId, UserId, UserKey, VeilError,
};
use veil_events::{ComputeWatcher, EventSource};
use veil_payments::{LedgerGateway, QuoteService};

use crate::network::{Network, ProgramRegistry};
use crate::sequencer::Submission;

/// Client for submitting paid operations to an MPC network.
///
/// Every operation runs quote → pay → submit in that order and returns the
/// network-assigned identifier. Nothing is retried.
#[derive(Clone)]
pub struct NetworkClient {
    config: ClientConfig,
    user_id: UserId,
    party_id: PartyId,
    quotes: Arc<dyn QuoteService>,
    ledger: Arc<dyn LedgerGateway>,
    network: Arc<dyn Network>,
    registry: Arc<dyn ProgramRegistry>,
}

impl NetworkClient {
    pub fn builder(config: ClientConfig) -> NetworkClientBuilder {
        NetworkClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn party_id(&self) -> &PartyId {
        &self.party_id
    }

    /// Id a program stored by this client under `name` will have.
    pub fn program_id(&self, name: &str) -> ProgramId {
        ProgramId::new(&self.user_id, name)
    }

    /// Pay for and store a compiled program.
    pub async fn store_program(&self, program: Program) -> Result<ActionId> {
        if program.owner != self.user_id {
            return Err(VeilError::InvalidArtifact(format!(
                "program owner {} is not this client's user {}",
                program.owner, self.user_id
            )));
        }
        self.execute(program).await
    }

    /// Pay for and store a set of secret values.
    pub async fn store_values(&self, values: SecretValueSet) -> Result<StoreId> {
        self.execute(values).await
    }

    /// Pay for and start a computation. The outcome arrives as an event.
    pub async fn compute(&self, job: ComputeJob) -> Result<ComputeId> {
        self.execute(job).await
    }

    /// Run the quote → pay → submit sequence for any artifact kind.
    pub async fn execute<S: Submission>(&self, submission: S) -> Result<S::Id> {
        submission.validate(self.registry.as_ref()).await?;

        let descriptor = submission.descriptor();
        let kind = descriptor.kind();
        let quote = self.request_quote(&descriptor).await?;
        let quote_id = quote.id;
        let price = quote.price;

        let receipt = self.pay(quote).await?;

        let id = submission
            .submit(self.network.as_ref(), receipt)
            .await
            .map_err(|e| {
                let e = match e {
                    VeilError::SubmissionRejected { reason, .. } => VeilError::SubmissionRejected {
                        quote_id: Some(quote_id),
                        reason,
                    },
                    other => VeilError::SubmissionFailed {
                        quote_id,
                        reason: other.to_string(),
                    },
                };
                warn!(%kind, %quote_id, error = %e, "submission did not complete");
                e
            })?;

        info!(%kind, %quote_id, price, id = %id, "submission accepted");
        Ok(id)
    }

    async fn request_quote(&self, descriptor: &OperationDescriptor) -> Result<Quote> {
        let quote = self.quotes.quote(descriptor).await.map_err(|e| match e {
            VeilError::QuoteUnavailable { .. } => e,
            other => VeilError::QuoteUnavailable {
                reason: other.to_string(),
            },
        })?;

        if !quote.covers(descriptor) {
            return Err(VeilError::QuoteUnavailable {
                reason: format!("quote {} prices a different operation", quote.id),
            });
        }

        info!(
            kind = %descriptor.kind(),
            quote_id = %quote.id,
            price = quote.price,
            "quote received"
        );
        Ok(quote)
    }

    /// Pay a quote, consuming it. A failed payment leaves the quote unusable.
    async fn pay(&self, quote: Quote) -> Result<PaymentReceipt> {
        let failed = |reason| VeilError::PaymentFailed {
            quote_id: quote.id,
            reason,
        };

        if quote.is_expired() {
            return Err(failed(PaymentFailure::QuoteExpired));
        }

        let timeout = self.config.payment_timeout();
        let receipt = match tokio::time::timeout(timeout, self.ledger.pay(&quote)).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e @ VeilError::PaymentFailed { .. })) => return Err(e),
            Ok(Err(other)) => {
                return Err(failed(PaymentFailure::Rejected {
                    message: other.to_string(),
                }))
            }
            Err(_) => {
                warn!(
                    quote_id = %quote.id,
                    timeout_ms = timeout.as_millis() as u64,
                    "payment timed out"
                );
                return Err(failed(PaymentFailure::Timeout));
            }
        };

        if receipt.quote_id != quote.id || receipt.amount < quote.price {
            return Err(failed(PaymentFailure::Rejected {
                message: "receipt does not match the quote".to_string(),
            }));
        }

        info!(
            quote_id = %quote.id,
            tx_hash = %receipt.tx_hash,
            amount = receipt.amount,
            "payment confirmed"
        );
        Ok(receipt)
    }

    /// Watch compute outcomes on an event subscription.
    pub fn watch<S: EventSource>(&self, source: S) -> ComputeWatcher<S> {
        ComputeWatcher::new(source)
    }

    /// Wait for a compute outcome using the configured default timeout.
    pub async fn await_compute<S: EventSource>(
        &self,
        watcher: &mut ComputeWatcher<S>,
        compute_id: ComputeId,
    ) -> Result<ComputeOutcome> {
        watcher.wait_for(compute_id, self.config.await_timeout()).await
    }
}

/// Builder wiring a [`NetworkClient`] to its collaborators.
pub struct NetworkClientBuilder {
    config: ClientConfig,
    user_key: Option<UserKey>,
    node_key: Option<NodeKey>,
    quotes: Option<Arc<dyn QuoteService>>,
    ledger: Option<Arc<dyn LedgerGateway>>,
    network: Option<Arc<dyn Network>>,
    registry: Option<Arc<dyn ProgramRegistry>>,
}

impl NetworkClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            user_key: None,
            node_key: None,
            quotes: None,
            ledger: None,
            network: None,
            registry: None,
        }
    }

    /// Defaults to a key derived from `config.user_seed`.
    pub fn user_key(mut self, key: UserKey) -> Self {
        self.user_key = Some(key);
        self
    }

    /// Defaults to a key derived from `config.node_seed`.
    pub fn node_key(mut self, key: NodeKey) -> Self {
        self.node_key = Some(key);
        self
    }

    pub fn quote_service(mut self, quotes: Arc<dyn QuoteService>) -> Self {
        self.quotes = Some(quotes);
        self
    }

    pub fn ledger(mut self, ledger: Arc<dyn LedgerGateway>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn network(mut self, network: Arc<dyn Network>) -> Self {
        self.network = Some(network);
        self
    }

    pub fn registry(mut self, registry: Arc<dyn ProgramRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use one backend as quote service, network and program registry.
    pub fn backend<B>(self, backend: Arc<B>) -> Self
    where
        B: QuoteService + Network + ProgramRegistry + 'static,
    {
        self.quote_service(backend.clone())
            .network(backend.clone())
            .registry(backend)
    }

    pub fn build(self) -> Result<NetworkClient> {
        self.config.validate()?;

        let missing = |what: &str| VeilError::Config(format!("no {} configured", what));
        let user_key = self
            .user_key
            .unwrap_or_else(|| UserKey::from_seed(&self.config.user_seed));
        let node_key = self
            .node_key
            .unwrap_or_else(|| NodeKey::from_seed(&self.config.node_seed));

        Ok(NetworkClient {
            user_id: user_key.user_id(),
            party_id: node_key.party_id(),
            quotes: self.quotes.ok_or_else(|| missing("quote service"))?,
            ledger: self.ledger.ok_or_else(|| missing("ledger gateway"))?,
            network: self.network.ok_or_else(|| missing("network"))?,
            registry: self.registry.ok_or_else(|| missing("program registry"))?,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use veil_core::{
        NamedValues, Permissions, ProgramBindings, ProgramParties, ResultBindings, SecretValue,
    };
    use veil_payments::{
        InMemoryLedger, InMemoryQuoteService, LocalWallet, PriceSchedule, WalletGateway,
    };

    use super::*;
    use crate::local::{LocalNetwork, LocalSession};

    const CHAIN: &str = "veil-test-chain";

    type CallLog = Arc<Mutex<Vec<String>>>;

    /// Records every collaborator call in order.
    struct Recorder {
        inner: LocalSession,
        log: CallLog,
    }

    impl Recorder {
        fn record(&self, call: &str) {
            self.log.lock().unwrap().push(call.to_string());
        }
    }

    #[async_trait]
    impl QuoteService for Recorder {
        async fn quote(&self, descriptor: &OperationDescriptor) -> Result<Quote> {
            self.record("quote");
            self.inner.quote(descriptor).await
        }
    }

    #[async_trait]
    impl ProgramRegistry for Recorder {
        async fn declared_parties(&self, program_id: &ProgramId) -> Result<ProgramParties> {
            self.inner.declared_parties(program_id).await
        }
    }

    #[async_trait]
    impl Network for Recorder {
        async fn store_program(
            &self,
            program: &Program,
            receipt: PaymentReceipt,
        ) -> Result<ActionId> {
            self.record("submit");
            self.inner.store_program(program, receipt).await
        }

        async fn store_values(
            &self,
            values: &SecretValueSet,
            receipt: PaymentReceipt,
        ) -> Result<StoreId> {
            self.record("submit");
            self.inner.store_values(values, receipt).await
        }

        async fn compute(&self, job: &ComputeJob, receipt: PaymentReceipt) -> Result<ComputeId> {
            self.record("submit");
            self.inner.compute(job, receipt).await
        }
    }

    struct RecordingLedger {
        inner: WalletGateway,
        log: CallLog,
    }

    #[async_trait]
    impl LedgerGateway for RecordingLedger {
        async fn pay(&self, quote: &Quote) -> Result<PaymentReceipt> {
            self.log.lock().unwrap().push("pay".to_string());
            self.inner.pay(quote).await
        }
    }

    struct Harness {
        client: NetworkClient,
        network: LocalNetwork,
        ledger: Arc<InMemoryLedger>,
        log: CallLog,
    }

    impl Harness {
        fn calls(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    async fn harness_with(
        schedule: PriceSchedule,
        balance: u64,
        confirmation: Duration,
    ) -> Harness {
        harness_with_quotes(InMemoryQuoteService::new(schedule), balance, confirmation).await
    }

    async fn harness_with_quotes(
        quotes: InMemoryQuoteService,
        balance: u64,
        confirmation: Duration,
    ) -> Harness {
        let config = ClientConfig {
            chain_id: CHAIN.to_string(),
            payment_timeout_ms: 200,
            ..Default::default()
        };
        let user_key = UserKey::from_seed("client");

        let ledger = Arc::new(InMemoryLedger::new(CHAIN));
        let wallet = LocalWallet::from_seed("wallet", CHAIN);
        ledger.fund(&wallet.account(), balance).await;

        let network = LocalNetwork::with_quote_service(&config.cluster_id, quotes, ledger.clone());
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));

        let backend = Arc::new(Recorder {
            inner: network.connect(user_key.user_id()),
            log: log.clone(),
        });
        let gateway = Arc::new(RecordingLedger {
            inner: WalletGateway::new(wallet, ledger.clone())
                .with_confirmation_delay(confirmation),
            log: log.clone(),
        });

        let client = NetworkClient::builder(config)
            .user_key(user_key)
            .backend(backend)
            .ledger(gateway)
            .build()
            .unwrap();

        Harness {
            client,
            network,
            ledger,
            log,
        }
    }

    async fn harness() -> Harness {
        harness_with(PriceSchedule::flat(100), 10_000, Duration::ZERO).await
    }

    fn program(client: &NetworkClient, parties: ProgramParties) -> Program {
        Program::new("vote", vec![0xde, 0xad], client.user_id().clone(), parties)
    }

    fn values(
        client: &NetworkClient,
        name: &str,
        value: i64,
        program: &ProgramId,
    ) -> SecretValueSet {
        let values: NamedValues = [(name.to_string(), SecretValue::Integer(value))]
            .into_iter()
            .collect();
        let permissions = Permissions::default_for_user(client.user_id().clone())
            .with_compute(client.user_id().clone(), program.clone());
        SecretValueSet::new(values, permissions, 5)
    }

    #[tokio::test]
    async fn test_phases_run_in_order() {
        let h = harness().await;
        let client = &h.client;

        client
            .store_program(program(client, ProgramParties::new().input("A")))
            .await
            .unwrap();
        let program_id = client.program_id("vote");
        client
            .store_values(values(client, "a_vote", 3, &program_id))
            .await
            .unwrap();

        assert_eq!(h.calls(), vec!["quote", "pay", "submit", "quote", "pay", "submit"]);
    }

    #[tokio::test]
    async fn test_insufficient_funds_stops_before_submit() {
        let h = harness_with(PriceSchedule::flat(100), 50, Duration::ZERO).await;
        let client = &h.client;

        let err = client
            .store_program(program(client, ProgramParties::new()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            VeilError::PaymentFailed {
                reason: PaymentFailure::InsufficientFunds {
                    required: 100,
                    available: 50
                },
                ..
            }
        ));
        assert_eq!(h.calls(), vec!["quote", "pay"]);
        assert_eq!(h.ledger.transaction_count().await, 0);
    }

    #[tokio::test]
    async fn test_payment_timeout() {
        let h = harness_with(PriceSchedule::flat(100), 10_000, Duration::from_secs(5)).await;
        let client = &h.client;

        let err = client
            .store_program(program(client, ProgramParties::new()))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            VeilError::PaymentFailed {
                reason: PaymentFailure::Timeout,
                ..
            }
        ));
        assert!(err.should_requote());
        assert!(!h.calls().contains(&"submit".to_string()));
    }

    #[tokio::test]
    async fn test_receipt_cannot_be_reused() {
        let h = harness().await;
        let client = &h.client;
        let session = h.network.connect(client.user_id().clone());
        let program_id = client.program_id("vote");

        let set = values(client, "a_vote", 1, &program_id);
        let quote = session.quote(&set.descriptor()).await.unwrap();
        let receipt = client.ledger.pay(&quote).await.unwrap();

        session.store_values(&set, receipt.clone()).await.unwrap();
        let err = session.store_values(&set, receipt).await.unwrap_err();

        match err {
            VeilError::SubmissionRejected { quote_id, reason } => {
                assert_eq!(quote_id, Some(quote.id));
                assert!(reason.contains("already redeemed"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_receipt_for_other_operation_rejected() {
        let h = harness().await;
        let client = &h.client;
        let session = h.network.connect(client.user_id().clone());
        let program_id = client.program_id("vote");

        let paid_for = values(client, "a_vote", 1, &program_id);
        let quote = session.quote(&paid_for.descriptor()).await.unwrap();
        let receipt = client.ledger.pay(&quote).await.unwrap();

        let mut other = paid_for.clone();
        other.ttl_days = 30;
        let err = session.store_values(&other, receipt).await.unwrap_err();
        assert!(matches!(err, VeilError::SubmissionRejected { .. }));
    }

    #[tokio::test]
    async fn test_unbound_party_before_quote() {
        let h = harness().await;
        let client = &h.client;

        client
            .store_program(program(client, ProgramParties::new().input("A").input("B")))
            .await
            .unwrap();
        let quotes_before = h.network.quotes_issued().await;
        let calls_before = h.calls().len();

        let bindings = ProgramBindings::new(client.program_id("vote"))
            .input("A", client.party_id().clone());
        let err = client
            .compute(ComputeJob::new(bindings, vec![]))
            .await
            .unwrap_err();

        assert!(matches!(err, VeilError::UnboundParty { ref name } if name == "B"));
        assert_eq!(err.phase(), Some(veil_core::Phase::Validate));
        assert_eq!(h.network.quotes_issued().await, quotes_before);
        assert_eq!(h.calls().len(), calls_before);
    }

    #[tokio::test]
    async fn test_compute_over_two_stores() {
        let h = harness().await;
        let client = &h.client;
        let me = client.party_id().clone();
        let mut watcher = client.watch(h.network.subscribe());

        let parties = ProgramParties::new()
            .input("Alice")
            .input("Bob")
            .output("Alice")
            .output("Bob");
        client.store_program(program(client, parties)).await.unwrap();
        let program_id = client.program_id("vote");

        let alice = client
            .store_values(values(client, "alice_votes", 7, &program_id))
            .await
            .unwrap();
        let bob = client
            .store_values(values(client, "bob_votes", 4, &program_id))
            .await
            .unwrap();
        assert_ne!(alice, bob);

        let bindings = ProgramBindings::new(program_id)
            .input("Alice", me.clone())
            .input("Bob", me.clone())
            .output("Alice", me.clone())
            .output("Bob", me);
        let compute_id = client
            .compute(ComputeJob::new(bindings, vec![alice, bob]))
            .await
            .unwrap();

        assert_eq!(h.network.pending_jobs().await, vec![compute_id]);
        assert_eq!(h.network.requester(compute_id).await.as_ref(), Some(client.user_id()));
        assert_eq!(
            h.network.job(compute_id).await.map(|job| job.store_ids),
            Some(vec![alice, bob])
        );
        let stored = h.network.stored_values(alice).await.unwrap();
        assert_eq!(stored.values["alice_votes"], SecretValue::Integer(7));

        let mut outputs = ResultBindings::new();
        outputs.insert(
            "Alice".to_string(),
            BTreeMap::from([("alice_wins".to_string(), SecretValue::Boolean(true))]),
        );
        outputs.insert(
            "Bob".to_string(),
            BTreeMap::from([("bob_wins".to_string(), SecretValue::Boolean(false))]),
        );
        outputs.insert("Mallory".to_string(), BTreeMap::new());
        h.network.finish(compute_id, outputs).await.unwrap();
        assert!(h.network.pending_jobs().await.is_empty());

        let results = client
            .await_compute(&mut watcher, compute_id)
            .await
            .unwrap()
            .into_result(compute_id)
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results["Alice"]["alice_wins"], SecretValue::Boolean(true));
        assert!(!results.contains_key("Mallory"));

        // Exactly one terminal event per compute id.
        assert!(h.network.finish(compute_id, ResultBindings::new()).await.is_err());
        assert!(watcher
            .wait_for(compute_id, Some(Duration::ZERO))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_zero_timeout_then_eventual_finish() {
        let h = harness().await;
        let client = &h.client;
        let me = client.party_id().clone();
        let mut watcher = client.watch(h.network.subscribe());

        client
            .store_program(program(client, ProgramParties::new().output("A")))
            .await
            .unwrap();
        let bindings = ProgramBindings::new(client.program_id("vote")).output("A", me);
        let compute_id = client
            .compute(ComputeJob::new(bindings, vec![]))
            .await
            .unwrap();

        let err = watcher
            .wait_for(compute_id, Some(Duration::ZERO))
            .await
            .unwrap_err();
        assert!(matches!(err, VeilError::AwaitTimeout { .. }));

        let network = h.network.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            network.finish(compute_id, ResultBindings::new()).await.unwrap();
        });

        let outcome = watcher.wait_for(compute_id, None).await.unwrap();
        assert!(outcome.is_finished());
    }

    #[tokio::test]
    async fn test_failed_computation_is_an_outcome() {
        let h = harness().await;
        let client = &h.client;
        let mut watcher = client.watch(h.network.subscribe());

        client
            .store_program(program(client, ProgramParties::new()))
            .await
            .unwrap();
        let bindings = ProgramBindings::new(client.program_id("vote"));
        let compute_id = client
            .compute(ComputeJob::new(bindings, vec![]))
            .await
            .unwrap();

        h.network.fail(compute_id, "node dropped out").await.unwrap();

        let outcome = client.await_compute(&mut watcher, compute_id).await.unwrap();
        assert_eq!(
            outcome,
            ComputeOutcome::Failed {
                cause: "node dropped out".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_compute_with_unknown_store_rejected() {
        let h = harness().await;
        let client = &h.client;

        client
            .store_program(program(client, ProgramParties::new()))
            .await
            .unwrap();
        let bindings = ProgramBindings::new(client.program_id("vote"));
        let err = client
            .compute(ComputeJob::new(bindings, vec![StoreId::new()]))
            .await
            .unwrap_err();

        assert!(matches!(err, VeilError::SubmissionRejected { quote_id: Some(_), .. }));
    }

    #[tokio::test]
    async fn test_compute_requires_permission() {
        let h = harness().await;
        let client = &h.client;

        client
            .store_program(program(client, ProgramParties::new()))
            .await
            .unwrap();
        let program_id = client.program_id("vote");
        let store_id = client
            .store_values(values(client, "v", 1, &program_id))
            .await
            .unwrap();

        // Another user with a funded wallet tries to compute on our values.
        let stranger_key = UserKey::from_seed("stranger");
        let stranger = NetworkClient::builder(client.config().clone())
            .user_key(stranger_key.clone())
            .backend(Arc::new(h.network.connect(stranger_key.user_id())))
            .ledger(client.ledger.clone())
            .build()
            .unwrap();

        let err = stranger
            .compute(ComputeJob::new(ProgramBindings::new(program_id), vec![store_id]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VeilError::SubmissionRejected { ref reason, .. } if reason.contains("permission")
        ));
    }

    #[tokio::test]
    async fn test_program_owner_must_be_client() {
        let h = harness().await;
        let foreign = Program::new(
            "vote",
            vec![1],
            UserId("someone-else".to_string()),
            ProgramParties::new(),
        );

        let err = h.client.store_program(foreign).await.unwrap_err();
        assert!(matches!(err, VeilError::InvalidArtifact(_)));
        assert!(h.calls().is_empty());
    }

    #[tokio::test]
    async fn test_owner_needs_compute_grant() {
        let h = harness().await;
        let client = &h.client;

        client
            .store_program(program(client, ProgramParties::new()))
            .await
            .unwrap();
        let values: NamedValues = [("v".to_string(), SecretValue::Integer(1))]
            .into_iter()
            .collect();
        let permissions = Permissions::default_for_user(client.user_id().clone());
        let store_id = client
            .store_values(SecretValueSet::new(values, permissions, 1))
            .await
            .unwrap();

        let bindings = ProgramBindings::new(client.program_id("vote"));
        let err = client
            .compute(ComputeJob::new(bindings, vec![store_id]))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            VeilError::SubmissionRejected { ref reason, .. } if reason.contains("permission")
        ));
    }

    #[tokio::test]
    async fn test_quote_expiring_before_submit_rejected() {
        let quotes = InMemoryQuoteService::new(PriceSchedule::flat(100))
            .with_validity(chrono::Duration::milliseconds(50));
        let h = harness_with_quotes(quotes, 10_000, Duration::from_millis(120)).await;
        let client = &h.client;

        let err = client
            .store_program(program(client, ProgramParties::new()))
            .await
            .unwrap_err();

        match err {
            VeilError::SubmissionRejected { quote_id, reason } => {
                assert!(quote_id.is_some());
                assert!(reason.contains("expired"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(h.calls(), vec!["quote", "pay", "submit"]);
    }

    #[tokio::test]
    async fn test_transport_failure_after_payment_keeps_quote() {
        struct Unreachable;

        #[async_trait]
        impl Network for Unreachable {
            async fn store_program(
                &self,
                _program: &Program,
                _receipt: PaymentReceipt,
            ) -> Result<ActionId> {
                Err(VeilError::ConnectionError("reset by peer".to_string()))
            }

            async fn store_values(
                &self,
                _values: &SecretValueSet,
                _receipt: PaymentReceipt,
            ) -> Result<StoreId> {
                Err(VeilError::Internal("HTTP 502: bad gateway".to_string()))
            }

            async fn compute(
                &self,
                _job: &ComputeJob,
                _receipt: PaymentReceipt,
            ) -> Result<ComputeId> {
                Err(VeilError::SerializationError("truncated body".to_string()))
            }
        }

        let h = harness().await;
        let client = NetworkClient {
            network: Arc::new(Unreachable),
            ..h.client.clone()
        };

        let err = client
            .store_program(program(&client, ProgramParties::new()))
            .await
            .unwrap_err();
        match &err {
            VeilError::SubmissionFailed { reason, .. } => assert!(reason.contains("reset by peer")),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(err.phase(), Some(veil_core::Phase::Submit));
        assert!(err.quote_id().is_some());
        assert!(!err.should_requote());

        // The quote was paid before the submission failed.
        let wallet = LocalWallet::from_seed("wallet", CHAIN);
        assert_eq!(h.ledger.balance(&wallet.account()).await, 9_900);
        assert_eq!(h.calls(), vec!["quote", "pay"]);

        let program_id = client.program_id("vote");
        let err = client
            .store_values(values(&client, "v", 1, &program_id))
            .await
            .unwrap_err();
        assert!(matches!(err, VeilError::SubmissionFailed { .. }));
    }

    #[tokio::test]
    async fn test_builder_requires_collaborators() {
        let result = NetworkClient::builder(ClientConfig::default()).build();
        assert!(matches!(result, Err(VeilError::Config(_))));
    }

    #[tokio::test]
    async fn test_quote_failure_is_quote_unavailable() {
        struct Offline;

        #[async_trait]
        impl QuoteService for Offline {
            async fn quote(&self, _descriptor: &OperationDescriptor) -> Result<Quote> {
                Err(VeilError::ConnectionError("connection refused".to_string()))
            }
        }

        let h = harness().await;
        let client = NetworkClient {
            quotes: Arc::new(Offline),
            ..h.client.clone()
        };

        let err = client
            .store_program(program(&client, ProgramParties::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, VeilError::QuoteUnavailable { .. }));
        assert!(h.calls().is_empty());
    }
}
