mod http;
mod inmemory;

pub use http::HttpWebhookClient;
pub use inmemory::{InMemoryWebhookClient, RecordedDelivery};

use serde::Serialize;

pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// JSON body of the outbound POST.
#[derive(Debug, Clone, Serialize)]
pub struct GreetingRequest {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub test: Option<bool>,
}

#[async_trait::async_trait]
pub trait IWebhookClient: Send + Sync {
    /// POST the greeting and return the HTTP status code. Transport-level
    /// failures are errors; non-200 statuses are returned for the caller
    /// to judge.
    async fn deliver(&self, message: &str, idempotency_key: &str) -> anyhow::Result<u16>;
    /// POST a sentinel body to check whether the receiver is accepting
    /// deliveries again.
    async fn probe(&self) -> anyhow::Result<u16>;
}
