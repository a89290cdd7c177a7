use crate::shared::usecase::UseCase;
use chrono::{Datelike, Duration};
use jubilee_domain::{format_instant, EventType, SendingStatus};
use jubilee_infra::Context;
use serde::Serialize;
use tracing::warn;

/// The monitor's stuck threshold. Longer than the sender's so the monitor
/// never races a sender's own recovery.
const STUCK_TIMEOUT_MONITOR_SECS: i64 = 10 * 60;
/// How far back the missed-events check looks.
const MISSED_WINDOW_HOURS: i64 = 24;

/// Reports events that should have fired but did not, and promotes
/// long-stuck `sending` records to `failed` so a later delivery can retry
/// them.
#[derive(Debug)]
pub struct HealthCheckUseCase;

#[derive(Debug, thiserror::Error)]
pub enum UseCaseErrors {
    #[error("storage failure: {0}")]
    Storage(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StuckAction {
    MarkedFailedForRetry,
    Monitoring,
}

#[derive(Debug, Serialize)]
pub struct MissedEventReport {
    pub user_id: String,
    pub event_type: EventType,
    pub notify_utc: String,
    pub hours_overdue: i64,
}

#[derive(Debug, Serialize)]
pub struct StuckEventReport {
    pub user_id: String,
    pub event_type: EventType,
    pub sending_attempted_at: String,
    pub minutes_stuck: i64,
    pub action: StuckAction,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub missed_count: usize,
    pub stuck_count: usize,
    pub missed: Vec<MissedEventReport>,
    pub stuck: Vec<StuckEventReport>,
    pub timestamp: String,
}

#[async_trait::async_trait]
impl UseCase for HealthCheckUseCase {
    type Response = HealthReport;
    type Errors = UseCaseErrors;

    const NAME: &'static str = "HealthCheck";

    async fn execute(&mut self, ctx: &Context) -> Result<Self::Response, Self::Errors> {
        let now = ctx.sys.now();
        let current_year = now.year();

        let in_window = ctx
            .repos
            .events
            .query_by_notify_range(now - Duration::hours(MISSED_WINDOW_HOURS), now)
            .await
            .map_err(|e| UseCaseErrors::Storage(e.to_string()))?;
        let missed = in_window
            .into_iter()
            .filter(|event| {
                event.last_sent_year < current_year
                    && event.sending_status != SendingStatus::Completed
            })
            .map(|event| MissedEventReport {
                user_id: event.user_id.to_string(),
                event_type: event.event_type,
                notify_utc: format_instant(&event.notify_utc),
                hours_overdue: (now - event.notify_utc).num_hours(),
            })
            .collect::<Vec<_>>();

        let sendings = ctx
            .repos
            .events
            .query_by_sending_status(SendingStatus::Sending)
            .await
            .map_err(|e| UseCaseErrors::Storage(e.to_string()))?;
        let mut stuck = Vec::with_capacity(sendings.len());
        for event in sendings {
            let Some(attempted_at) = event.sending_attempted_at else {
                continue;
            };
            let elapsed = now - attempted_at;
            let action = if elapsed > Duration::seconds(STUCK_TIMEOUT_MONITOR_SECS) {
                warn!(
                    user_id = %event.user_id,
                    event_type = %event.event_type,
                    "Promoting stuck event to failed for retry"
                );
                ctx.repos
                    .events
                    .mark_failed(
                        &event.user_id,
                        event.event_type,
                        "Stuck in sending state detected by health check",
                        now,
                    )
                    .await
                    .map_err(|e| UseCaseErrors::Storage(e.to_string()))?;
                StuckAction::MarkedFailedForRetry
            } else {
                StuckAction::Monitoring
            };
            stuck.push(StuckEventReport {
                user_id: event.user_id.to_string(),
                event_type: event.event_type,
                sending_attempted_at: format_instant(&attempted_at),
                minutes_stuck: elapsed.num_minutes(),
                action,
            });
        }

        let issues = missed.len() + stuck.len();
        let status = match issues {
            0 => HealthStatus::Healthy,
            1..=4 => HealthStatus::Warning,
            _ => HealthStatus::Critical,
        };
        if status != HealthStatus::Healthy {
            warn!(
                missed = missed.len(),
                stuck = stuck.len(),
                "Health check found unhealthy events"
            );
        }

        Ok(HealthReport {
            status,
            missed_count: missed.len(),
            stuck_count: stuck.len(),
            missed,
            stuck,
            timestamp: format_instant(&now),
        })
    }
}
