use super::{IGreeterQueue, QueueDelivery};
use crate::config::AwsConfig;
use anyhow::anyhow;
use aws_credential_types::Credentials;
use aws_sdk_sqs::config::{BehaviorVersion, Region};
use aws_sdk_sqs::types::{MessageSystemAttributeName, QueueAttributeName};
use aws_sdk_sqs::Client;
use tracing::{debug, info};

/// SQS caps a single receive at 10 messages.
const SQS_RECEIVE_LIMIT: usize = 10;
const LONG_POLL_SECS: i32 = 10;

/// FIFO queue pair (main + DLQ) backed by SQS.
pub struct SqsGreeterQueue {
    client: Client,
    queue_url: String,
    dlq_url: String,
}

impl SqsGreeterQueue {
    pub async fn connect(
        aws: &AwsConfig,
        queue_name: &str,
        dlq_name: &str,
    ) -> anyhow::Result<Self> {
        let client = build_client(aws);
        let queue_url = resolve_queue_url(&client, queue_name).await?;
        let dlq_url = resolve_queue_url(&client, dlq_name).await?;

        info!(
            queue_url = %queue_url,
            dlq_url = %dlq_url,
            region = %aws.region,
            "SQS greeter queue initialized"
        );

        Ok(Self {
            client,
            queue_url,
            dlq_url,
        })
    }

    async fn receive_from(&self, queue_url: &str, max: usize) -> anyhow::Result<Vec<QueueDelivery>> {
        let capped = max.min(SQS_RECEIVE_LIMIT) as i32;
        debug!(queue_url = %queue_url, max_messages = capped, "Polling SQS");

        let resp = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .max_number_of_messages(capped)
            .wait_time_seconds(LONG_POLL_SECS)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .send()
            .await
            .map_err(|e| anyhow!("SQS receive failed: {:?}", e))?;

        let messages = resp.messages.unwrap_or_default();
        let mut deliveries = Vec::with_capacity(messages.len());
        for message in messages {
            let receipt_handle = message
                .receipt_handle()
                .ok_or_else(|| anyhow!("SQS message without receipt handle"))?
                .to_string();
            let attr = |name: MessageSystemAttributeName| {
                message
                    .attributes()
                    .and_then(|attrs| attrs.get(&name))
                    .map(|value| value.to_string())
            };
            let receive_count = attr(MessageSystemAttributeName::ApproximateReceiveCount)
                .and_then(|count| count.parse().ok())
                .unwrap_or(1);

            deliveries.push(QueueDelivery {
                body: message.body().unwrap_or("").to_string(),
                receipt_handle,
                group_id: attr(MessageSystemAttributeName::MessageGroupId),
                dedup_id: attr(MessageSystemAttributeName::MessageDeduplicationId),
                receive_count,
            });
        }
        Ok(deliveries)
    }

    async fn delete_from(&self, queue_url: &str, receipt_handle: &str) -> anyhow::Result<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| anyhow!("SQS delete failed: {:?}", e))?;
        Ok(())
    }

    async fn depth_of(&self, queue_url: &str) -> anyhow::Result<u64> {
        let resp = self
            .client
            .get_queue_attributes()
            .queue_url(queue_url)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| anyhow!("SQS depth query failed: {:?}", e))?;
        Ok(resp
            .attributes()
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|value| value.parse().ok())
            .unwrap_or(0))
    }
}

#[async_trait::async_trait]
impl IGreeterQueue for SqsGreeterQueue {
    async fn enqueue(&self, body: &str, group_id: &str, dedup_id: &str) -> anyhow::Result<()> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .message_group_id(group_id)
            .message_deduplication_id(dedup_id)
            .send()
            .await
            .map_err(|e| anyhow!("SQS send failed: {:?}", e))?;
        Ok(())
    }

    async fn receive(&self, max_messages: usize) -> anyhow::Result<Vec<QueueDelivery>> {
        self.receive_from(&self.queue_url, max_messages).await
    }

    async fn ack(&self, receipt_handle: &str) -> anyhow::Result<()> {
        self.delete_from(&self.queue_url, receipt_handle).await
    }

    async fn nack(&self, receipt_handle: &str) -> anyhow::Result<()> {
        // Visibility zero puts the message straight back; the queue's
        // redrive policy owns the trip to the DLQ.
        self.client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .visibility_timeout(0)
            .send()
            .await
            .map_err(|e| anyhow!("SQS visibility change failed: {:?}", e))?;
        Ok(())
    }

    async fn depth(&self) -> anyhow::Result<u64> {
        self.depth_of(&self.queue_url).await
    }

    async fn receive_dlq(&self, max_messages: usize) -> anyhow::Result<Vec<QueueDelivery>> {
        self.receive_from(&self.dlq_url, max_messages).await
    }

    async fn ack_dlq(&self, receipt_handle: &str) -> anyhow::Result<()> {
        self.delete_from(&self.dlq_url, receipt_handle).await
    }

    async fn dlq_depth(&self) -> anyhow::Result<u64> {
        self.depth_of(&self.dlq_url).await
    }
}

// Build the client config directly instead of going through the default
// provider chain, so that a LocalStack style endpoint override and static
// credentials behave the same everywhere.
fn build_client(aws: &AwsConfig) -> Client {
    let mut config = aws_sdk_sqs::Config::builder()
        .region(Region::new(aws.region.clone()))
        .behavior_version(BehaviorVersion::latest());

    if let (Some(key_id), Some(secret)) = (&aws.access_key_id, &aws.secret_access_key) {
        let creds = Credentials::new(
            key_id,
            secret,
            aws.session_token.clone(),
            None,
            "jubilee-static",
        );
        config = config.credentials_provider(creds);
    }

    if let Some(endpoint) = &aws.endpoint_url {
        if !endpoint.is_empty() {
            config = config.endpoint_url(endpoint);
        }
    }

    Client::from_conf(config.build())
}

async fn resolve_queue_url(client: &Client, queue_name: &str) -> anyhow::Result<String> {
    let resp = client
        .get_queue_url()
        .queue_name(queue_name)
        .send()
        .await
        .map_err(|e| anyhow!("queue url lookup for {} failed: {:?}", queue_name, e))?;
    resp.queue_url()
        .map(|url| url.to_string())
        .ok_or_else(|| anyhow!("queue {} has no url", queue_name))
}
