use crate::dlq::redrive_dlq::RedriveDlqUseCase;
use crate::monitor::health_check::HealthCheckUseCase;
use crate::scheduler::sweep_due_events::SweepDueEventsUseCase;
use crate::sender::consume::process_queue_batch;
use crate::shared::usecase::execute;
use chrono::{DateTime, Timelike, Utc};
use jubilee_infra::Context;
use std::time::Duration;
use tokio::time::{interval, sleep};
use tracing::error;

const SWEEP_INTERVAL_SECS: u64 = 60;
const DLQ_REDRIVE_INTERVAL_SECS: u64 = 5 * 60;
const HEALTH_CHECK_INTERVAL_SECS: u64 = 5 * 60;
/// Pause after an empty or failed receive before polling again.
const CONSUMER_IDLE_DELAY_SECS: u64 = 1;

/// Seconds to sleep so the first sweep lands on a whole minute. Always in
/// 1..=60: a process started exactly on a boundary waits for the next one
/// rather than sweeping mid-startup.
fn secs_until_next_minute(now: DateTime<Utc>) -> u64 {
    u64::from(60 - now.second())
}

/// Aligns the first sweep to a minute boundary, then sweeps every minute.
pub fn start_due_events_sweep_job(ctx: Context) {
    tokio::spawn(async move {
        let delay = secs_until_next_minute(ctx.sys.now());
        sleep(Duration::from_secs(delay)).await;

        let mut sweep_interval = interval(Duration::from_secs(SWEEP_INTERVAL_SECS));
        loop {
            sweep_interval.tick().await;
            if let Err(e) = execute(SweepDueEventsUseCase, &ctx).await {
                error!("Due events sweep failed: {:?}", e);
            }
        }
    });
}

/// Drains the main queue continuously, one receive batch at a time.
pub fn start_greeter_consumer(ctx: Context) {
    tokio::spawn(async move {
        loop {
            match process_queue_batch(&ctx).await {
                Ok(report) if report.received == 0 => {
                    sleep(Duration::from_secs(CONSUMER_IDLE_DELAY_SECS)).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("Greeter queue receive failed: {:?}", e);
                    sleep(Duration::from_secs(CONSUMER_IDLE_DELAY_SECS)).await;
                }
            }
        }
    });
}

pub fn start_dlq_redrive_job(ctx: Context) {
    tokio::spawn(async move {
        let mut redrive_interval = interval(Duration::from_secs(DLQ_REDRIVE_INTERVAL_SECS));
        loop {
            redrive_interval.tick().await;
            let _ = execute(RedriveDlqUseCase, &ctx).await;
        }
    });
}

pub fn start_health_monitor_job(ctx: Context) {
    tokio::spawn(async move {
        let mut monitor_interval = interval(Duration::from_secs(HEALTH_CHECK_INTERVAL_SECS));
        loop {
            monitor_interval.tick().await;
            let _ = execute(HealthCheckUseCase, &ctx).await;
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use jubilee_domain::parse_instant;

    #[test]
    fn first_sweep_lands_on_the_next_minute_boundary() {
        let delay_at = |s: &str| secs_until_next_minute(parse_instant(s).unwrap());

        assert_eq!(delay_at("2026-06-15T09:00:30.000Z"), 30);
        assert_eq!(delay_at("2026-06-15T09:00:59.000Z"), 1);
        // On the boundary itself: wait out a full minute, never sweep
        // immediately.
        assert_eq!(delay_at("2026-06-15T09:00:00.000Z"), 60);
        // Sub-second startup offsets still round to the same boundary.
        assert_eq!(delay_at("2026-06-15T09:00:30.900Z"), 30);
    }
}
