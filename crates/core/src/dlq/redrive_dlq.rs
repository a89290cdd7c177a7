use crate::shared::usecase::UseCase;
use jubilee_infra::Context;
use jubilee_utils::random_suffix;
use serde::Serialize;
use tracing::{info, warn};

/// Messages drained from the DLQ per run.
const REDRIVE_BATCH_SIZE: usize = 10;

/// Drains dead-lettered greeter messages back onto the main queue, gated
/// on a webhook health probe so a recovering receiver is not immediately
/// buried again.
#[derive(Debug)]
pub struct RedriveDlqUseCase;

#[derive(Debug, thiserror::Error)]
pub enum UseCaseErrors {
    #[error("queue failure: {0}")]
    Queue(String),
}

#[derive(Debug, Default, Serialize)]
pub struct RedriveReport {
    pub dlq_depth: u64,
    pub received: u32,
    pub redriven: u32,
    pub failures: u32,
    pub skipped_unhealthy: bool,
}

#[async_trait::async_trait]
impl UseCase for RedriveDlqUseCase {
    type Response = RedriveReport;
    type Errors = UseCaseErrors;

    const NAME: &'static str = "RedriveDlq";

    async fn execute(&mut self, ctx: &Context) -> Result<Self::Response, Self::Errors> {
        let mut report = RedriveReport::default();

        let depth = ctx
            .queue
            .dlq_depth()
            .await
            .map_err(|e| UseCaseErrors::Queue(e.to_string()))?;
        if depth == 0 {
            return Ok(report);
        }
        report.dlq_depth = depth;

        match ctx.webhook.probe().await {
            Ok(200) => {}
            Ok(code) => {
                warn!(status = code, "Webhook still unhealthy, skipping redrive");
                report.skipped_unhealthy = true;
                return Ok(report);
            }
            Err(e) => {
                warn!("Webhook probe failed, skipping redrive: {:?}", e);
                report.skipped_unhealthy = true;
                return Ok(report);
            }
        }

        let deliveries = ctx
            .queue
            .receive_dlq(REDRIVE_BATCH_SIZE)
            .await
            .map_err(|e| UseCaseErrors::Queue(e.to_string()))?;

        for delivery in deliveries {
            report.received += 1;

            let group_id = delivery
                .group_id
                .clone()
                .unwrap_or_else(|| "redrive".to_string());
            let dedup_id = delivery.dedup_id.clone().unwrap_or_else(|| {
                format!(
                    "redrive-{}-{}",
                    ctx.sys.now().timestamp_millis(),
                    random_suffix(8)
                )
            });

            // Enqueue before delete; a crash in between leaves a duplicate,
            // which the sender's claim absorbs.
            if let Err(e) = ctx.queue.enqueue(&delivery.body, &group_id, &dedup_id).await {
                warn!("Failed to redrive DLQ message: {:?}", e);
                report.failures += 1;
                continue;
            }
            if let Err(e) = ctx.queue.ack_dlq(&delivery.receipt_handle).await {
                warn!("Failed to delete redriven message from DLQ: {:?}", e);
                report.failures += 1;
                continue;
            }
            report.redriven += 1;
        }

        info!(
            dlq_depth = report.dlq_depth,
            redriven = report.redriven,
            failures = report.failures,
            "DLQ redrive finished"
        );
        Ok(report)
    }
}
