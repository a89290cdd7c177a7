pub mod dlq;
pub mod job_schedulers;
pub mod monitor;
pub mod scheduler;
pub mod sender;
pub mod shared;

pub use dlq::redrive_dlq::{RedriveDlqUseCase, RedriveReport};
pub use job_schedulers::{
    start_dlq_redrive_job, start_due_events_sweep_job, start_greeter_consumer,
    start_health_monitor_job,
};
pub use monitor::health_check::{HealthCheckUseCase, HealthReport, HealthStatus};
pub use scheduler::sweep_due_events::{SweepDueEventsUseCase, SweepReport};
pub use sender::consume::{process_queue_batch, ConsumeReport};
pub use sender::deliver_greeting::{DeliverGreetingUseCase, DeliveryOutcome};
pub use shared::usecase::{execute, UseCase};
