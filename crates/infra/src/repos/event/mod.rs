mod dynamodb;
mod inmemory;

pub use dynamodb::DynamoEventRepo;
pub use inmemory::InMemoryEventRepo;

use crate::repos::shared::repo::DeleteResult;
use chrono::{DateTime, Utc};
use jubilee_domain::{EventRecord, EventType, SendingStatus, ID};

/// Outcome of the conditional year-claim write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed,
    LostRace,
}

/// One page of the due-events index scan. `next_cursor` is opaque and only
/// meaningful when passed back to `query_due`.
#[derive(Debug)]
pub struct EventPage {
    pub records: Vec<EventRecord>,
    pub next_cursor: Option<String>,
}

#[async_trait::async_trait]
pub trait IEventRepo: Send + Sync {
    async fn insert(&self, event: &EventRecord) -> anyhow::Result<()>;
    async fn save(&self, event: &EventRecord) -> anyhow::Result<()>;
    async fn find(&self, user_id: &ID, event_type: EventType) -> Option<EventRecord>;
    /// Events whose notify instant has passed and which have not completed a
    /// delivery in `current_year` yet, in notify order.
    async fn query_due(
        &self,
        now: DateTime<Utc>,
        current_year: i32,
        cursor: Option<String>,
        limit: usize,
    ) -> anyhow::Result<EventPage>;
    async fn query_by_notify_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<EventRecord>>;
    async fn query_by_sending_status(
        &self,
        status: SendingStatus,
    ) -> anyhow::Result<Vec<EventRecord>>;
    /// Atomically claims the event for `current_year`: transitions it to
    /// `sending`, stamps the attempt, advances `last_sent_year` and
    /// `notify_utc`. The write only applies while the stored
    /// `last_sent_year` still equals `expected_last_sent_year` and no other
    /// worker holds or has finished the year.
    async fn claim_for_year(
        &self,
        user_id: &ID,
        event_type: EventType,
        expected_last_sent_year: i32,
        current_year: i32,
        new_notify_utc: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ClaimOutcome>;
    async fn mark_completed(
        &self,
        user_id: &ID,
        event_type: EventType,
        response_code: u16,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()>;
    async fn mark_failed(
        &self,
        user_id: &ID,
        event_type: EventType,
        reason: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()>;
    async fn bulk_insert(&self, events: &[EventRecord]) -> anyhow::Result<()>;
    async fn bulk_delete(&self, keys: &[(ID, EventType)]) -> anyhow::Result<DeleteResult>;
    async fn delete(&self, user_id: &ID, event_type: EventType) -> Option<EventRecord>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use jubilee_domain::{parse_instant, NotifyTime};

    fn utc(s: &str) -> DateTime<Utc> {
        parse_instant(s).unwrap()
    }

    fn event(user_id: &str, notify_utc: &str) -> EventRecord {
        EventRecord::new(
            ID::new(user_id),
            EventType::Birthday,
            "1990-06-15".parse().unwrap(),
            "09:00".parse::<NotifyTime>().unwrap(),
            utc(notify_utc),
        )
    }

    #[tokio::test]
    async fn create_find_and_delete() {
        let repo = InMemoryEventRepo::new();
        let stored = event("ada", "2026-06-15T09:00:00.000Z");

        assert!(repo.insert(&stored).await.is_ok());
        let found = repo
            .find(&stored.user_id, stored.event_type)
            .await
            .expect("To find event");
        assert_eq!(found.notify_utc, stored.notify_utc);

        assert!(repo.delete(&stored.user_id, stored.event_type).await.is_some());
        assert!(repo.find(&stored.user_id, stored.event_type).await.is_none());
    }

    #[tokio::test]
    async fn query_due_filters_and_orders() {
        let repo = InMemoryEventRepo::new();
        let now = utc("2026-06-15T09:00:00.000Z");

        let due_late = event("late", "2026-06-15T08:00:00.000Z");
        let due_early = event("early", "2026-06-14T09:00:00.000Z");
        let due_exact = event("exact", "2026-06-15T09:00:00.000Z");
        let future = event("future", "2026-06-15T09:00:01.000Z");
        let mut sent = event("sent", "2026-06-15T08:00:00.000Z");
        sent.last_sent_year = 2026;

        for stored in [&due_late, &due_early, &due_exact, &future, &sent] {
            repo.insert(stored).await.unwrap();
        }

        let page = repo.query_due(now, 2026, None, 100).await.unwrap();
        assert!(page.next_cursor.is_none());
        let ids = page
            .records
            .iter()
            .map(|record| record.user_id.to_string())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["early", "late", "exact"]);
    }

    #[tokio::test]
    async fn query_due_pages_with_opaque_cursor() {
        let repo = InMemoryEventRepo::new();
        let now = utc("2026-06-15T09:00:00.000Z");
        for user_id in ["a", "b", "c"] {
            repo.insert(&event(user_id, "2026-06-15T08:00:00.000Z"))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut cursor = None;
        let mut pages = 0;
        loop {
            let page = repo.query_due(now, 2026, cursor, 2).await.unwrap();
            pages += 1;
            seen.extend(page.records.into_iter().map(|r| r.user_id.to_string()));
            cursor = page.next_cursor;
            if cursor.is_none() {
                break;
            }
        }
        assert_eq!(pages, 2);
        assert_eq!(seen.len(), 3);
    }

    #[tokio::test]
    async fn claim_transitions_and_advances() {
        let repo = InMemoryEventRepo::new();
        let stored = event("ada", "2026-06-15T09:00:00.000Z");
        repo.insert(&stored).await.unwrap();

        let now = utc("2026-06-15T09:00:05.000Z");
        let next_year = utc("2027-06-15T09:00:00.000Z");
        let outcome = repo
            .claim_for_year(&stored.user_id, stored.event_type, 0, 2026, next_year, now)
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);

        let claimed = repo.find(&stored.user_id, stored.event_type).await.unwrap();
        assert_eq!(claimed.sending_status, SendingStatus::Sending);
        assert_eq!(claimed.last_sent_year, 2026);
        assert_eq!(claimed.notify_utc, next_year);
        assert_eq!(claimed.sending_attempted_at, Some(now));
    }

    #[tokio::test]
    async fn second_claim_loses_the_race() {
        let repo = InMemoryEventRepo::new();
        let stored = event("ada", "2026-06-15T09:00:00.000Z");
        repo.insert(&stored).await.unwrap();

        let now = utc("2026-06-15T09:00:05.000Z");
        let next_year = utc("2027-06-15T09:00:00.000Z");
        let first = repo
            .claim_for_year(&stored.user_id, stored.event_type, 0, 2026, next_year, now)
            .await
            .unwrap();
        assert_eq!(first, ClaimOutcome::Claimed);

        // Same expected year: the record is now sending.
        let second = repo
            .claim_for_year(&stored.user_id, stored.event_type, 0, 2026, next_year, now)
            .await
            .unwrap();
        assert_eq!(second, ClaimOutcome::LostRace);

        // Matching year but still sending: also lost.
        let third = repo
            .claim_for_year(&stored.user_id, stored.event_type, 2026, 2026, next_year, now)
            .await
            .unwrap();
        assert_eq!(third, ClaimOutcome::LostRace);
    }

    #[tokio::test]
    async fn failed_events_can_be_reclaimed_for_the_same_year() {
        let repo = InMemoryEventRepo::new();
        let stored = event("ada", "2026-06-15T09:00:00.000Z");
        repo.insert(&stored).await.unwrap();

        let now = utc("2026-06-15T09:00:05.000Z");
        let next_year = utc("2027-06-15T09:00:00.000Z");
        repo.claim_for_year(&stored.user_id, stored.event_type, 0, 2026, next_year, now)
            .await
            .unwrap();
        repo.mark_failed(&stored.user_id, stored.event_type, "webhook 503", now)
            .await
            .unwrap();

        let outcome = repo
            .claim_for_year(&stored.user_id, stored.event_type, 2026, 2026, next_year, now)
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::Claimed);
    }

    #[tokio::test]
    async fn completed_events_cannot_be_reclaimed() {
        let repo = InMemoryEventRepo::new();
        let stored = event("ada", "2026-06-15T09:00:00.000Z");
        repo.insert(&stored).await.unwrap();

        let now = utc("2026-06-15T09:00:05.000Z");
        let next_year = utc("2027-06-15T09:00:00.000Z");
        repo.claim_for_year(&stored.user_id, stored.event_type, 0, 2026, next_year, now)
            .await
            .unwrap();
        repo.mark_completed(&stored.user_id, stored.event_type, 200, now)
            .await
            .unwrap();

        let outcome = repo
            .claim_for_year(&stored.user_id, stored.event_type, 2026, 2026, next_year, now)
            .await
            .unwrap();
        assert_eq!(outcome, ClaimOutcome::LostRace);
    }

    #[tokio::test]
    async fn terminal_marks_update_the_right_fields() {
        let repo = InMemoryEventRepo::new();
        let stored = event("ada", "2026-06-15T09:00:00.000Z");
        repo.insert(&stored).await.unwrap();

        let now = utc("2026-06-15T09:00:05.000Z");
        repo.mark_failed(&stored.user_id, stored.event_type, "webhook 503", now)
            .await
            .unwrap();
        let failed = repo.find(&stored.user_id, stored.event_type).await.unwrap();
        assert_eq!(failed.sending_status, SendingStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("webhook 503"));
        assert_eq!(failed.marked_failed_at, Some(now));

        repo.mark_completed(&stored.user_id, stored.event_type, 200, now)
            .await
            .unwrap();
        let completed = repo.find(&stored.user_id, stored.event_type).await.unwrap();
        assert_eq!(completed.sending_status, SendingStatus::Completed);
        assert_eq!(completed.webhook_response_code, Some(200));
        assert_eq!(completed.webhook_delivered_at, Some(now));
        assert_eq!(completed.sending_completed_at, Some(now));
        assert!(completed.failure_reason.is_none());
        assert!(completed.marked_failed_at.is_none());
    }

    #[tokio::test]
    async fn range_and_status_queries() {
        let repo = InMemoryEventRepo::new();
        let inside = event("inside", "2026-06-15T00:00:00.000Z");
        let outside = event("outside", "2026-06-17T00:00:00.000Z");
        let mut sending = event("sending", "2026-06-15T06:00:00.000Z");
        sending.sending_status = SendingStatus::Sending;
        for stored in [&inside, &outside, &sending] {
            repo.insert(stored).await.unwrap();
        }

        let in_range = repo
            .query_by_notify_range(utc("2026-06-14T12:00:00.000Z"), utc("2026-06-16T00:00:00.000Z"))
            .await
            .unwrap();
        assert_eq!(in_range.len(), 2);

        let sendings = repo
            .query_by_sending_status(SendingStatus::Sending)
            .await
            .unwrap();
        assert_eq!(sendings.len(), 1);
        assert_eq!(sendings[0].user_id.to_string(), "sending");
    }

    #[tokio::test]
    async fn bulk_insert_and_delete() {
        let repo = InMemoryEventRepo::new();
        let events = vec![
            event("a", "2026-06-15T09:00:00.000Z"),
            event("b", "2026-06-15T09:00:00.000Z"),
        ];
        repo.bulk_insert(&events).await.unwrap();

        let keys = events
            .iter()
            .map(|stored| (stored.user_id.clone(), stored.event_type))
            .collect::<Vec<_>>();
        let res = repo.bulk_delete(&keys).await.unwrap();
        assert_eq!(res.deleted_count, 2);
        assert!(repo.find(&ID::new("a"), EventType::Birthday).await.is_none());
    }
}
