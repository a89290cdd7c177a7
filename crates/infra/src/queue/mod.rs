mod inmemory;
mod sqs;

pub use inmemory::InMemoryGreeterQueue;
pub use sqs::SqsGreeterQueue;

/// A message pulled from the queue, with the transport metadata needed to
/// finish, retry or redrive it.
#[derive(Debug, Clone)]
pub struct QueueDelivery {
    pub body: String,
    pub receipt_handle: String,
    pub group_id: Option<String>,
    pub dedup_id: Option<String>,
    pub receive_count: u32,
}

#[async_trait::async_trait]
pub trait IGreeterQueue: Send + Sync {
    /// Enqueue onto the main queue. A dedup id already seen inside the
    /// transport's dedup window is accepted and silently dropped.
    async fn enqueue(&self, body: &str, group_id: &str, dedup_id: &str) -> anyhow::Result<()>;
    async fn receive(&self, max_messages: usize) -> anyhow::Result<Vec<QueueDelivery>>;
    async fn ack(&self, receipt_handle: &str) -> anyhow::Result<()>;
    /// Make the message immediately visible for redelivery. The transport
    /// routes it to the DLQ once its receive count passes the redrive
    /// limit.
    async fn nack(&self, receipt_handle: &str) -> anyhow::Result<()>;
    async fn depth(&self) -> anyhow::Result<u64>;
    async fn receive_dlq(&self, max_messages: usize) -> anyhow::Result<Vec<QueueDelivery>>;
    async fn ack_dlq(&self, receipt_handle: &str) -> anyhow::Result<()>;
    async fn dlq_depth(&self) -> anyhow::Result<u64>;
}
