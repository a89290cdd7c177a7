use super::IWebhookClient;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// A delivery the receiver actually acted on.
#[derive(Debug, Clone)]
pub struct RecordedDelivery {
    pub message: String,
    pub idempotency_key: String,
}

#[derive(Default)]
struct WebhookState {
    scripted: VecDeque<u16>,
    honored_keys: HashSet<String>,
    deliveries: Vec<RecordedDelivery>,
    probes: u32,
}

/// Webhook double that behaves like an idempotency-aware receiver: a
/// repeated delivery with an already-honored key answers 200 without a new
/// visible side effect. Responses can be scripted per request; the default
/// is 200.
pub struct InMemoryWebhookClient {
    state: Mutex<WebhookState>,
}

impl InMemoryWebhookClient {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WebhookState::default()),
        }
    }

    pub fn script_response(&self, status: u16) {
        self.state.lock().unwrap().scripted.push_back(status);
    }

    pub fn script_responses(&self, statuses: &[u16]) {
        let mut state = self.state.lock().unwrap();
        state.scripted.extend(statuses.iter().copied());
    }

    /// Receiver-visible side effects, in order.
    pub fn deliveries(&self) -> Vec<RecordedDelivery> {
        self.state.lock().unwrap().deliveries.clone()
    }

    pub fn probe_count(&self) -> u32 {
        self.state.lock().unwrap().probes
    }
}

impl Default for InMemoryWebhookClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IWebhookClient for InMemoryWebhookClient {
    async fn deliver(&self, message: &str, idempotency_key: &str) -> anyhow::Result<u16> {
        let mut state = self.state.lock().unwrap();
        let status = state.scripted.pop_front().unwrap_or(200);
        if status == 200 && state.honored_keys.insert(idempotency_key.to_string()) {
            state.deliveries.push(RecordedDelivery {
                message: message.to_string(),
                idempotency_key: idempotency_key.to_string(),
            });
        }
        Ok(status)
    }

    async fn probe(&self) -> anyhow::Result<u16> {
        let mut state = self.state.lock().unwrap();
        state.probes += 1;
        Ok(state.scripted.pop_front().unwrap_or(200))
    }
}
