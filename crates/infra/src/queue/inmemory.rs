use super::{IGreeterQueue, QueueDelivery};
use crate::system::ISys;
use chrono::{DateTime, Duration, Utc};
use jubilee_utils::random_suffix;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Content-based dedup window, matching the FIFO transport's five minutes.
const DEDUP_WINDOW_SECS: i64 = 5 * 60;
/// Redeliveries before a message is routed to the DLQ.
const MAX_RECEIVE_COUNT: u32 = 3;

#[derive(Debug, Clone)]
struct StoredMessage {
    body: String,
    group_id: Option<String>,
    dedup_id: Option<String>,
    receipt_handle: String,
    receive_count: u32,
}

impl StoredMessage {
    fn to_delivery(&self) -> QueueDelivery {
        QueueDelivery {
            body: self.body.clone(),
            receipt_handle: self.receipt_handle.clone(),
            group_id: self.group_id.clone(),
            dedup_id: self.dedup_id.clone(),
            receive_count: self.receive_count,
        }
    }
}

#[derive(Default)]
struct QueueState {
    main: VecDeque<StoredMessage>,
    dlq: VecDeque<StoredMessage>,
    /// Messages handed to a consumer and not yet acked or nacked.
    in_flight: HashMap<String, StoredMessage>,
    dedup_seen: HashMap<String, DateTime<Utc>>,
}

/// FIFO queue double with the transport behaviors the components depend
/// on: the dedup window, receive counting, max-receive DLQ routing.
pub struct InMemoryGreeterQueue {
    state: Mutex<QueueState>,
    sys: Arc<dyn ISys>,
}

impl InMemoryGreeterQueue {
    pub fn new(sys: Arc<dyn ISys>) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            sys,
        }
    }
}

#[async_trait::async_trait]
impl IGreeterQueue for InMemoryGreeterQueue {
    async fn enqueue(&self, body: &str, group_id: &str, dedup_id: &str) -> anyhow::Result<()> {
        let now = self.sys.now();
        let mut state = self.state.lock().unwrap();
        state
            .dedup_seen
            .retain(|_, seen_at| now - *seen_at < Duration::seconds(DEDUP_WINDOW_SECS));
        if state.dedup_seen.contains_key(dedup_id) {
            return Ok(());
        }
        state.dedup_seen.insert(dedup_id.to_string(), now);
        state.main.push_back(StoredMessage {
            body: body.to_string(),
            group_id: Some(group_id.to_string()),
            dedup_id: Some(dedup_id.to_string()),
            receipt_handle: format!("rcpt-{}", random_suffix(16)),
            receive_count: 0,
        });
        Ok(())
    }

    async fn receive(&self, max_messages: usize) -> anyhow::Result<Vec<QueueDelivery>> {
        let mut state = self.state.lock().unwrap();
        let mut deliveries = Vec::new();
        while deliveries.len() < max_messages {
            let Some(mut message) = state.main.pop_front() else {
                break;
            };
            message.receive_count += 1;
            deliveries.push(message.to_delivery());
            state
                .in_flight
                .insert(message.receipt_handle.clone(), message);
        }
        Ok(deliveries)
    }

    async fn ack(&self, receipt_handle: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.in_flight.remove(receipt_handle);
        Ok(())
    }

    async fn nack(&self, receipt_handle: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        let Some(message) = state.in_flight.remove(receipt_handle) else {
            return Ok(());
        };
        if message.receive_count >= MAX_RECEIVE_COUNT {
            state.dlq.push_back(message);
        } else {
            state.main.push_front(message);
        }
        Ok(())
    }

    async fn depth(&self) -> anyhow::Result<u64> {
        Ok(self.state.lock().unwrap().main.len() as u64)
    }

    async fn receive_dlq(&self, max_messages: usize) -> anyhow::Result<Vec<QueueDelivery>> {
        // Unlike the main side, DLQ reads leave the message in place (as a
        // visibility timeout would); only an ack removes it.
        let state = self.state.lock().unwrap();
        Ok(state
            .dlq
            .iter()
            .take(max_messages)
            .map(StoredMessage::to_delivery)
            .collect())
    }

    async fn ack_dlq(&self, receipt_handle: &str) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .dlq
            .retain(|message| message.receipt_handle != receipt_handle);
        Ok(())
    }

    async fn dlq_depth(&self) -> anyhow::Result<u64> {
        Ok(self.state.lock().unwrap().dlq.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct TickingSys {
        now: Mutex<DateTime<Utc>>,
    }

    impl TickingSys {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                now: Mutex::new(Utc::now()),
            })
        }

        fn advance_secs(&self, secs: i64) {
            let mut now = self.now.lock().unwrap();
            *now = *now + Duration::seconds(secs);
        }
    }

    impl ISys for TickingSys {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    #[tokio::test]
    async fn delivers_in_fifo_order() {
        let queue = InMemoryGreeterQueue::new(TickingSys::new());
        queue.enqueue("first", "birthday", "k1").await.unwrap();
        queue.enqueue("second", "birthday", "k2").await.unwrap();

        let deliveries = queue.receive(10).await.unwrap();
        let bodies = deliveries.iter().map(|d| d.body.as_str()).collect::<Vec<_>>();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn dedup_window_drops_repeats_until_it_expires() {
        let sys = TickingSys::new();
        let queue = InMemoryGreeterQueue::new(sys.clone());

        queue.enqueue("body", "birthday", "k1").await.unwrap();
        queue.enqueue("body", "birthday", "k1").await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 1);

        sys.advance_secs(DEDUP_WINDOW_SECS + 1);
        queue.enqueue("body", "birthday", "k1").await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn nacked_messages_redeliver_then_dead_letter() {
        let queue = InMemoryGreeterQueue::new(TickingSys::new());
        queue.enqueue("body", "birthday", "k1").await.unwrap();

        for expected_count in 1..=MAX_RECEIVE_COUNT {
            let deliveries = queue.receive(10).await.unwrap();
            assert_eq!(deliveries.len(), 1);
            assert_eq!(deliveries[0].receive_count, expected_count);
            queue.nack(&deliveries[0].receipt_handle).await.unwrap();
        }

        assert_eq!(queue.depth().await.unwrap(), 0);
        assert_eq!(queue.dlq_depth().await.unwrap(), 1);

        let dead = queue.receive_dlq(10).await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].dedup_id.as_deref(), Some("k1"));
        assert_eq!(dead[0].group_id.as_deref(), Some("birthday"));

        queue.ack_dlq(&dead[0].receipt_handle).await.unwrap();
        assert_eq!(queue.dlq_depth().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn acked_messages_are_gone() {
        let queue = InMemoryGreeterQueue::new(TickingSys::new());
        queue.enqueue("body", "birthday", "k1").await.unwrap();
        let deliveries = queue.receive(10).await.unwrap();
        queue.ack(&deliveries[0].receipt_handle).await.unwrap();
        assert_eq!(queue.depth().await.unwrap(), 0);
        assert!(queue.receive(10).await.unwrap().is_empty());
    }
}
