use crate::sender::deliver_greeting::{DeliverGreetingUseCase, DeliveryOutcome};
use crate::shared::usecase::execute;
use jubilee_domain::GreeterMessage;
use jubilee_infra::Context;
use serde::Serialize;
use tracing::{error, warn};

/// Messages pulled from the main queue per batch.
const RECEIVE_BATCH_SIZE: usize = 10;

#[derive(Debug, Default, Serialize)]
pub struct ConsumeReport {
    pub received: u32,
    pub delivered: u32,
    pub dropped: u32,
    pub retried: u32,
    pub poison: u32,
}

/// Pull one batch from the main queue and run the sender on each message:
/// ack on success or terminal drop, nack on retriable failure so the
/// transport redelivers (and eventually dead-letters).
pub async fn process_queue_batch(ctx: &Context) -> anyhow::Result<ConsumeReport> {
    let deliveries = ctx.queue.receive(RECEIVE_BATCH_SIZE).await?;

    let mut report = ConsumeReport::default();
    for delivery in deliveries {
        report.received += 1;

        let message: GreeterMessage = match serde_json::from_str(&delivery.body) {
            Ok(message) => message,
            Err(e) => {
                // An unparseable body would redeliver forever.
                warn!("Dropping malformed greeter message: {}", e);
                report.poison += 1;
                if let Err(e) = ctx.queue.ack(&delivery.receipt_handle).await {
                    error!("Failed to ack poison message: {:?}", e);
                }
                continue;
            }
        };

        match execute(DeliverGreetingUseCase { message }, ctx).await {
            Ok(outcome) => {
                match outcome {
                    DeliveryOutcome::Delivered { .. } => report.delivered += 1,
                    _ => report.dropped += 1,
                }
                if let Err(e) = ctx.queue.ack(&delivery.receipt_handle).await {
                    error!("Failed to ack greeter message: {:?}", e);
                }
            }
            Err(_) => {
                report.retried += 1;
                if let Err(e) = ctx.queue.nack(&delivery.receipt_handle).await {
                    error!("Failed to nack greeter message: {:?}", e);
                }
            }
        }
    }
    Ok(report)
}
