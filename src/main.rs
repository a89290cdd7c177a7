mod telemetry;

use jubilee_core::{
    start_dlq_redrive_job, start_due_events_sweep_job, start_greeter_consumer,
    start_health_monitor_job,
};
use jubilee_infra::setup_context;
use telemetry::{get_subscriber, init_subscriber};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = get_subscriber("info".into());
    init_subscriber(subscriber);

    let context = setup_context().await;

    start_due_events_sweep_job(context.clone());
    start_greeter_consumer(context.clone());
    start_dlq_redrive_job(context.clone());
    start_health_monitor_job(context);
    info!("All jobs started");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    Ok(())
}
