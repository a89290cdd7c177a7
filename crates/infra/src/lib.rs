mod config;
pub mod queue;
mod repos;
mod system;
pub mod webhook;

pub use config::{AwsConfig, Config};
pub use repos::{
    ClaimOutcome, DeleteResult, DynamoEventRepo, DynamoUserRepo, EventPage, IEventRepo, IUserRepo,
    InMemoryEventRepo, InMemoryUserRepo, Repos,
};
pub use system::{ISys, RealSys};

use queue::{IGreeterQueue, InMemoryGreeterQueue, SqsGreeterQueue};
use std::sync::Arc;
use tracing::{info, warn};
use webhook::{HttpWebhookClient, IWebhookClient, InMemoryWebhookClient};

#[derive(Clone)]
pub struct Context {
    pub repos: Repos,
    pub queue: Arc<dyn IGreeterQueue>,
    pub webhook: Arc<dyn IWebhookClient>,
    pub config: Config,
    pub sys: Arc<dyn ISys>,
}

impl Context {
    pub fn create_inmemory() -> Self {
        Self::create_inmemory_with(Arc::new(RealSys {}), Arc::new(InMemoryWebhookClient::new()))
    }

    /// In-memory infra with an injected clock and webhook double, for tests
    /// that steer time or script receiver behavior.
    pub fn create_inmemory_with(sys: Arc<dyn ISys>, webhook: Arc<dyn IWebhookClient>) -> Self {
        Self {
            repos: Repos::create_inmemory(),
            queue: Arc::new(InMemoryGreeterQueue::new(sys.clone())),
            webhook,
            config: Config::new(),
            sys,
        }
    }

    async fn create_aws(config: Config) -> Self {
        let repos = Repos::create_dynamodb(&config.aws, &config.users_table);
        let queue = SqsGreeterQueue::connect(
            &config.aws,
            &config.greeter_queue_name,
            &config.dlq_queue_name,
        )
        .await
        .expect("Greeter queues must exist and be reachable");
        let webhook = HttpWebhookClient::new(&config.hookbin_url);
        Self {
            repos,
            queue: Arc::new(queue),
            webhook: Arc::new(webhook),
            config,
            sys: Arc::new(RealSys {}),
        }
    }
}

/// Will setup the correct infra Context given the environment
pub async fn setup_context() -> Context {
    const AWS_REGION: &str = "AWS_REGION";

    let args: Vec<_> = std::env::args().collect();

    // cargo run inmemory
    let inmemory_arg_set = args.len() > 1 && args[1].eq("inmemory");
    if inmemory_arg_set {
        info!("Inmemory argument provided. Going to use inmemory infra.");
        return Context::create_inmemory();
    }

    if std::env::var(AWS_REGION).is_ok() {
        info!(
            "{} env var was provided. Going to use the AWS-backed infra.",
            AWS_REGION
        );
        Context::create_aws(Config::new()).await
    } else {
        warn!(
            "{} env var was not provided. Going to use inmemory infra. This should only be used during testing!",
            AWS_REGION
        );
        Context::create_inmemory()
    }
}
