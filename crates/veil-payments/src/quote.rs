//! Quote service interface and an in-memory pricing implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use veil_core::{OperationDescriptor, Quote, QuoteId, Result, VeilError};

/// Prices network operations.
#[async_trait]
pub trait QuoteService: Send + Sync {
    /// Price the operation. Fails with `QuoteUnavailable` when the service is
    /// unreachable or refuses the descriptor.
    async fn quote(&self, descriptor: &OperationDescriptor) -> Result<Quote>;
}

/// Linear price schedule, in ledger units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSchedule {
    pub store_program_base: u64,
    pub store_values_base: u64,
    pub compute_base: u64,
    pub per_payload_byte: u64,
    pub per_value: u64,
    pub per_ttl_day: u64,
    pub per_input_store: u64,
}

impl Default for PriceSchedule {
    fn default() -> Self {
        Self {
            store_program_base: 500,
            store_values_base: 100,
            compute_base: 200,
            per_payload_byte: 1,
            per_value: 10,
            per_ttl_day: 5,
            per_input_store: 20,
        }
    }
}

impl PriceSchedule {
    /// Every operation costs exactly `price`.
    pub fn flat(price: u64) -> Self {
        Self {
            store_program_base: price,
            store_values_base: price,
            compute_base: price,
            per_payload_byte: 0,
            per_value: 0,
            per_ttl_day: 0,
            per_input_store: 0,
        }
    }

    pub fn price(&self, descriptor: &OperationDescriptor) -> u64 {
        match descriptor {
            OperationDescriptor::StoreProgram { payload_bytes, .. } => {
                self.store_program_base + self.per_payload_byte * payload_bytes
            }
            OperationDescriptor::StoreValues {
                value_count,
                payload_bytes,
                ttl_days,
            } => {
                self.store_values_base
                    + self.per_value * u64::from(*value_count)
                    + self.per_payload_byte * payload_bytes
                    + self.per_ttl_day * u64::from(*ttl_days)
            }
            OperationDescriptor::Compute {
                input_store_count,
                inline_value_count,
                ..
            } => {
                self.compute_base
                    + self.per_input_store * u64::from(*input_store_count)
                    + self.per_value * u64::from(*inline_value_count)
            }
        }
    }
}

/// Issues quotes from a [`PriceSchedule`] and remembers them for redemption.
pub struct InMemoryQuoteService {
    schedule: PriceSchedule,

    /// How long an issued quote stays valid.
    validity: Duration,

    issued: Arc<RwLock<HashMap<QuoteId, Quote>>>,
}

impl InMemoryQuoteService {
    pub fn new(schedule: PriceSchedule) -> Self {
        Self {
            schedule,
            validity: Duration::minutes(5),
            issued: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn schedule(&self) -> &PriceSchedule {
        &self.schedule
    }

    /// Look up a quote this service issued.
    pub async fn issued(&self, id: QuoteId) -> Option<Quote> {
        self.issued.read().await.get(&id).cloned()
    }

    /// Number of quotes issued so far.
    pub async fn issued_count(&self) -> usize {
        self.issued.read().await.len()
    }
}

impl Default for InMemoryQuoteService {
    fn default() -> Self {
        Self::new(PriceSchedule::default())
    }
}

#[async_trait]
impl QuoteService for InMemoryQuoteService {
    async fn quote(&self, descriptor: &OperationDescriptor) -> Result<Quote> {
        if let OperationDescriptor::StoreValues { ttl_days: 0, .. } = descriptor {
            return Err(VeilError::QuoteUnavailable {
                reason: "values must be stored for at least one day".to_string(),
            });
        }

        let quote = Quote::new(
            descriptor.clone(),
            self.schedule.price(descriptor),
            self.validity,
        );

        tracing::debug!(
            quote_id = %quote.id,
            kind = %descriptor.kind(),
            price = quote.price,
            "quote issued"
        );

        self.issued.write().await.insert(quote.id, quote.clone());
        Ok(quote)
    }
}
