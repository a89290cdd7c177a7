use tracing::warn;

#[derive(Debug, Clone)]
pub struct Config {
    /// Storage table holding user and event records.
    pub users_table: String,
    /// Main FIFO queue carrying greeter messages.
    pub greeter_queue_name: String,
    /// Dead-letter queue fed by the transport once redeliveries are
    /// exhausted.
    pub dlq_queue_name: String,
    /// Outbound webhook target.
    pub hookbin_url: String,
    pub aws: AwsConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AwsConfig {
    pub region: String,
    pub endpoint_url: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl Config {
    pub fn new() -> Self {
        let hookbin_url = match std::env::var("HOOKBIN_URL") {
            Ok(url) => url,
            Err(_) => {
                let default_url = "http://localhost:9000/webhook".to_string();
                warn!(
                    "HOOKBIN_URL env var was not provided, falling back to {}. Greetings will not reach anyone real.",
                    default_url
                );
                default_url
            }
        };

        Self {
            users_table: env_or("USERS_TABLE", "users"),
            greeter_queue_name: env_or("GREETER_QUEUE_NAME", "greeter-queue.fifo"),
            dlq_queue_name: env_or("DLQ_QUEUE_NAME", "greeter-dlq.fifo"),
            hookbin_url,
            aws: AwsConfig {
                region: env_or("AWS_REGION", "us-east-1"),
                endpoint_url: std::env::var("AWS_ENDPOINT_URL").ok(),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                session_token: std::env::var("AWS_SESSION_TOKEN").ok(),
            },
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

fn env_or(key: &str, default: &str) -> String {
    match std::env::var(key) {
        Ok(value) => value,
        Err(_) => default.to_string(),
    }
}
