//! REST transport to a remote network.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use veil_core::{
    ActionId, ClientConfig, ComputeId, ComputeJob, NamedValues, OperationDescriptor,
    PaymentReceipt, Permissions, Program, ProgramBindings, ProgramId, ProgramParties, Quote,
    QuoteId, Result, SecretValueSet, StoreId, UserId, VeilError,
};
use veil_payments::QuoteService;

use crate::network::{Network, ProgramRegistry};
use crate::stream::{events_url, WsEventSource};

/// Header naming the cluster a request is addressed to.
pub const CLUSTER_HEADER: &str = "x-veil-cluster";
/// Header naming the calling user.
pub const USER_HEADER: &str = "x-veil-user";

/// Request body for storing a program.
#[derive(Debug, Serialize)]
struct StoreProgramRequest<'a> {
    name: &'a str,
    owner: &'a UserId,
    /// Hex-encoded program binary.
    payload: String,
    parties: &'a ProgramParties,
    receipt: PaymentReceipt,
}

#[derive(Debug, Serialize)]
struct StoreValuesRequest<'a> {
    values: &'a NamedValues,
    permissions: &'a Permissions,
    ttl_days: u32,
    receipt: PaymentReceipt,
}

#[derive(Debug, Serialize)]
struct ComputeRequest<'a> {
    bindings: &'a ProgramBindings,
    store_ids: &'a [StoreId],
    inline_values: &'a NamedValues,
    receipt: PaymentReceipt,
}

#[derive(Debug, Deserialize)]
struct ActionResponse {
    action_id: ActionId,
}

#[derive(Debug, Deserialize)]
struct StoreResponse {
    store_id: StoreId,
}

#[derive(Debug, Deserialize)]
struct ComputeResponse {
    compute_id: ComputeId,
}

/// Error body the network sends with non-success statuses.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Map an unsuccessful HTTP status to an error.
fn status_error(
    status: u16,
    body: &str,
    quote_id: Option<QuoteId>,
    resource: (&str, &str),
) -> VeilError {
    let reason = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error)
        .unwrap_or_else(|_| body.to_string());

    match status {
        402 | 409 | 422 => VeilError::SubmissionRejected { quote_id, reason },
        404 => VeilError::NotFound {
            resource_type: resource.0.to_string(),
            id: resource.1.to_string(),
        },
        _ => VeilError::Internal(format!("HTTP {}: {}", status, reason)),
    }
}

/// A remote network reached over HTTP.
#[derive(Clone)]
pub struct HttpNetwork {
    /// Base URL of the network endpoint.
    base_url: String,
    cluster_id: String,
    user: UserId,
    http_client: reqwest::Client,
}

impl HttpNetwork {
    /// Connect to the network named in `config`, acting as `user`.
    pub async fn connect(config: &ClientConfig, user: UserId) -> Result<Self> {
        let base_url = config.network_url.trim_end_matches('/').to_string();
        let http_client = reqwest::Client::new();

        // Verify connection with health check
        http_client
            .get(format!("{}/health", base_url))
            .send()
            .await
            .map_err(|e| VeilError::ConnectionError(e.to_string()))?
            .error_for_status()
            .map_err(|e| VeilError::ConnectionError(e.to_string()))?;

        tracing::info!(url = %base_url, cluster = %config.cluster_id, "connected to network");
        Ok(Self {
            base_url,
            cluster_id: config.cluster_id.clone(),
            user,
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Open the network's compute event feed.
    pub async fn events(&self) -> Result<WsEventSource> {
        WsEventSource::connect(&events_url(&self.base_url)).await
    }

    fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> reqwest::RequestBuilder {
        self.http_client
            .post(format!("{}{}", self.base_url, path))
            .header(CLUSTER_HEADER, &self.cluster_id)
            .header(USER_HEADER, &self.user.0)
            .json(body)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        quote_id: Option<QuoteId>,
        resource: (&str, &str),
    ) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| VeilError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), &body, quote_id, resource));
        }

        response
            .json()
            .await
            .map_err(|e| VeilError::SerializationError(e.to_string()))
    }
}

#[async_trait]
impl QuoteService for HttpNetwork {
    async fn quote(&self, descriptor: &OperationDescriptor) -> Result<Quote> {
        let request = self.post("/api/v1/quote", descriptor);
        self.send(request, None, ("Quote", "")).await.map_err(|e| {
            VeilError::QuoteUnavailable {
                reason: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl ProgramRegistry for HttpNetwork {
    async fn declared_parties(&self, program_id: &ProgramId) -> Result<ProgramParties> {
        let url = format!(
            "{}/api/v1/programs/{}/{}/parties",
            self.base_url,
            program_id.owner(),
            program_id.name()
        );
        let request = self
            .http_client
            .get(url)
            .header(CLUSTER_HEADER, &self.cluster_id)
            .header(USER_HEADER, &self.user.0);

        self.send(request, None, ("Program", program_id.as_str())).await
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn store_program(&self, program: &Program, receipt: PaymentReceipt) -> Result<ActionId> {
        let quote_id = receipt.quote_id;
        let body = StoreProgramRequest {
            name: &program.name,
            owner: &program.owner,
            payload: hex::encode(&program.payload),
            parties: &program.parties,
            receipt,
        };

        let response: ActionResponse = self
            .send(
                self.post("/api/v1/programs", &body),
                Some(quote_id),
                ("Program", program.name.as_str()),
            )
            .await?;
        Ok(response.action_id)
    }

    async fn store_values(
        &self,
        values: &SecretValueSet,
        receipt: PaymentReceipt,
    ) -> Result<StoreId> {
        let quote_id = receipt.quote_id;
        let body = StoreValuesRequest {
            values: &values.values,
            permissions: &values.permissions,
            ttl_days: values.ttl_days,
            receipt,
        };

        let response: StoreResponse = self
            .send(self.post("/api/v1/values", &body), Some(quote_id), ("Values", ""))
            .await?;
        Ok(response.store_id)
    }

    async fn compute(&self, job: &ComputeJob, receipt: PaymentReceipt) -> Result<ComputeId> {
        let quote_id = receipt.quote_id;
        let body = ComputeRequest {
            bindings: &job.bindings,
            store_ids: &job.store_ids,
            inline_values: &job.inline_values,
            receipt,
        };

        let response: ComputeResponse = self
            .send(
                self.post("/api/v1/compute", &body),
                Some(quote_id),
                ("Program", job.program_id().as_str()),
            )
            .await?;
        Ok(response.compute_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use veil_core::{SecretValue, TxHash};

    fn receipt() -> PaymentReceipt {
        PaymentReceipt {
            quote_id: QuoteId::new(),
            tx_hash: TxHash("ab12".to_string()),
            amount: 100,
            paid_at: Utc::now(),
        }
    }

    #[test]
    fn test_status_mapping() {
        let quote_id = QuoteId::new();

        let body = r#"{"error":"receipt already redeemed"}"#;
        let err = status_error(409, body, Some(quote_id), ("Values", ""));
        match err {
            VeilError::SubmissionRejected { quote_id: q, reason } => {
                assert_eq!(q, Some(quote_id));
                assert_eq!(reason, "receipt already redeemed");
            }
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            status_error(402, "unpaid", Some(quote_id), ("Values", "")),
            VeilError::SubmissionRejected { ref reason, .. } if reason == "unpaid"
        ));
        assert!(matches!(
            status_error(404, "", None, ("Program", "u/vote")),
            VeilError::NotFound { ref id, .. } if id == "u/vote"
        ));
        assert!(matches!(
            status_error(500, "boom", None, ("Program", "")),
            VeilError::Internal(_)
        ));
    }

    #[test]
    fn test_store_program_body() {
        let owner = UserId("u1".to_string());
        let parties = ProgramParties::new().input("Party1").output("Party1");
        let body = StoreProgramRequest {
            name: "vote",
            owner: &owner,
            payload: hex::encode([0xca, 0xfe]),
            parties: &parties,
            receipt: receipt(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["payload"], "cafe");
        assert_eq!(json["owner"], "u1");
        assert_eq!(json["parties"]["inputs"][0], "Party1");
        assert!(json["receipt"]["quote_id"].is_string());
    }

    #[test]
    fn test_store_values_body() {
        let values: NamedValues = [("x".to_string(), SecretValue::Integer(7))]
            .into_iter()
            .collect();
        let permissions = Permissions::default_for_user(UserId("u1".to_string()));
        let body = StoreValuesRequest {
            values: &values,
            permissions: &permissions,
            ttl_days: 3,
            receipt: receipt(),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["ttl_days"], 3);
        assert_eq!(json["values"]["x"]["type"], "integer");
        assert_eq!(json["values"]["x"]["value"], 7);
    }

    #[test]
    fn test_compute_response() {
        let id = ComputeId::new();
        let response: ComputeResponse =
            serde_json::from_str(&format!(r#"{{"compute_id":"{}"}}"#, id)).unwrap();
        assert_eq!(response.compute_id, id);
    }
}
