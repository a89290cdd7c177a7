use chrono::{DateTime, Duration, Utc};
use jubilee_domain::{parse_instant, EventRecord, EventType, User, ID};
use jubilee_infra::webhook::InMemoryWebhookClient;
use jubilee_infra::{Context, ISys};
use std::sync::{Arc, Mutex};

/// A steerable clock shared by the context, the queue and the assertions.
pub struct TestClock {
    now: Mutex<DateTime<Utc>>,
}

impl TestClock {
    pub fn new(start: &str) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(parse_instant(start).unwrap()),
        })
    }

    pub fn advance_secs(&self, secs: i64) {
        let mut now = self.now.lock().unwrap();
        *now = *now + Duration::seconds(secs);
    }
}

impl ISys for TestClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub struct TestHarness {
    pub ctx: Context,
    pub webhook: Arc<InMemoryWebhookClient>,
    pub clock: Arc<TestClock>,
}

pub fn harness(start: &str) -> TestHarness {
    let clock = TestClock::new(start);
    let webhook = Arc::new(InMemoryWebhookClient::new());
    let ctx = Context::create_inmemory_with(clock.clone(), webhook.clone());
    TestHarness {
        ctx,
        webhook,
        clock,
    }
}

/// Ada Lovelace, UTC, birthday 1990-06-15 at 09:00 local, never sent.
pub async fn seed_ada(ctx: &Context) {
    let user = User::new(
        ID::new("ada"),
        "Ada",
        "Lovelace",
        chrono_tz::UTC,
        ctx.sys.now(),
    );
    ctx.repos.users.insert(&user).await.unwrap();
    let event = EventRecord::new(
        ID::new("ada"),
        EventType::Birthday,
        "1990-06-15".parse().unwrap(),
        "09:00".parse().unwrap(),
        parse_instant("2026-06-15T09:00:00.000Z").unwrap(),
    );
    ctx.repos.events.insert(&event).await.unwrap();
}

pub async fn find_ada(ctx: &Context) -> EventRecord {
    ctx.repos
        .events
        .find(&ID::new("ada"), EventType::Birthday)
        .await
        .expect("To find ada's birthday event")
}
