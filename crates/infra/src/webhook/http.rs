use super::{GreetingRequest, IWebhookClient, IDEMPOTENCY_HEADER};
use std::time::Duration;
use tracing::debug;

// Must stay well below the sender's stuck timeout, so a hung receiver
// surfaces as a failed attempt rather than a stuck claim.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpWebhookClient {
    client: reqwest::Client,
    url: String,
}

impl HttpWebhookClient {
    pub fn new(url: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("To build the webhook http client");
        Self {
            client,
            url: url.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl IWebhookClient for HttpWebhookClient {
    async fn deliver(&self, message: &str, idempotency_key: &str) -> anyhow::Result<u16> {
        debug!(idempotency_key = %idempotency_key, "Posting greeting webhook");
        let resp = self
            .client
            .post(&self.url)
            .header(IDEMPOTENCY_HEADER, idempotency_key)
            .json(&GreetingRequest {
                message: message.to_string(),
                test: None,
            })
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }

    async fn probe(&self) -> anyhow::Result<u16> {
        let resp = self
            .client
            .post(&self.url)
            .json(&GreetingRequest {
                message: "health check".to_string(),
                test: Some(true),
            })
            .send()
            .await?;
        Ok(resp.status().as_u16())
    }
}
