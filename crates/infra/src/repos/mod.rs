mod event;
mod shared;
mod user;

pub use event::{ClaimOutcome, DynamoEventRepo, EventPage, IEventRepo, InMemoryEventRepo};
pub use shared::repo::DeleteResult;
pub use user::{DynamoUserRepo, IUserRepo, InMemoryUserRepo};

use crate::config::AwsConfig;
use aws_credential_types::Credentials;
use aws_sdk_dynamodb::config::{BehaviorVersion, Region};
use aws_sdk_dynamodb::Client;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct Repos {
    pub users: Arc<dyn IUserRepo>,
    pub events: Arc<dyn IEventRepo>,
}

impl Repos {
    pub fn create_inmemory() -> Self {
        Self {
            users: Arc::new(InMemoryUserRepo::new()),
            events: Arc::new(InMemoryEventRepo::new()),
        }
    }

    pub fn create_dynamodb(aws: &AwsConfig, table: &str) -> Self {
        let client = build_client(aws);
        info!(table = %table, region = %aws.region, "DynamoDB repos initialized");
        Self {
            users: Arc::new(DynamoUserRepo::new(client.clone(), table)),
            events: Arc::new(DynamoEventRepo::new(client, table)),
        }
    }
}

// Build the client config directly instead of going through the default
// provider chain, so that a LocalStack style endpoint override and static
// credentials behave the same everywhere.
fn build_client(aws: &AwsConfig) -> Client {
    let mut config = aws_sdk_dynamodb::Config::builder()
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
