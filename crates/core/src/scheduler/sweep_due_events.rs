use crate::shared::usecase::UseCase;
use chrono::Datelike;
use jubilee_domain::GreeterMessage;
use jubilee_infra::Context;
use serde::Serialize;
use tracing::{info, warn};

/// Page size for the due-events index scan.
const SWEEP_PAGE_SIZE: usize = 100;

/// One sweep over the due-events index: discovers events whose notify
/// instant has passed and enqueues one greeter message per event. The sweep
/// never mutates event records; duplicate protection is the transport's
/// dedup window plus the sender's claim.
#[derive(Debug)]
pub struct SweepDueEventsUseCase;

#[derive(Debug, thiserror::Error)]
pub enum UseCaseErrors {
    /// Aborts the sweep; already-enqueued items are deduplicated when it
    /// re-runs.
    #[error("due events page read failed: {0}")]
    PageRead(String),
}

#[derive(Debug, Default, Serialize)]
pub struct SweepReport {
    pub processed: u32,
    pub enqueued: u32,
    pub enqueue_failures: u32,
    pub missing_users: u32,
    pub pages: u32,
}

#[async_trait::async_trait]
impl UseCase for SweepDueEventsUseCase {
    type Response = SweepReport;
    type Errors = UseCaseErrors;

    const NAME: &'static str = "SweepDueEvents";

    async fn execute(&mut self, ctx: &Context) -> Result<Self::Response, Self::Errors> {
        // Both pinned for the whole sweep.
        let now = ctx.sys.now();
        let year_now = now.year();

        let mut report = SweepReport::default();
        let mut cursor: Option<String> = None;

        loop {
            let page = ctx
                .repos
                .events
                .query_due(now, year_now, cursor, SWEEP_PAGE_SIZE)
                .await
                .map_err(|e| UseCaseErrors::PageRead(e.to_string()))?;
            report.pages += 1;

            for event in &page.records {
                report.processed += 1;

                let user = match ctx.repos.users.find(&event.user_id).await {
                    Some(user) => user,
                    None => {
                        warn!(user_id = %event.user_id, "Due event has no owning user, skipping");
                        report.missing_users += 1;
                        continue;
                    }
                };

                let message = GreeterMessage::new(&user, event, year_now);
                let body = match serde_json::to_string(&message) {
                    Ok(body) => body,
                    Err(e) => {
                        warn!(user_id = %event.user_id, "Greeter message did not serialize: {}", e);
                        report.enqueue_failures += 1;
                        continue;
                    }
                };
                match ctx
                    .queue
                    .enqueue(&body, &message.group_key(), &message.dedup_key())
                    .await
                {
                    Ok(()) => report.enqueued += 1,
                    Err(e) => {
                        warn!(
                            user_id = %event.user_id,
                            event_type = %event.event_type,
                            "Failed to enqueue greeter message: {:?}", e
                        );
                        report.enqueue_failures += 1;
                    }
                }
            }

            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }

        info!(
            processed = report.processed,
            enqueued = report.enqueued,
            enqueue_failures = report.enqueue_failures,
            pages = report.pages,
            "Due events sweep finished"
        );
        Ok(report)
    }
}
