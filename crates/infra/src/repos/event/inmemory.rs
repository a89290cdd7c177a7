use super::{ClaimOutcome, EventPage, IEventRepo};
use crate::repos::shared::inmemory_repo::*;
use crate::repos::shared::repo::DeleteResult;
use chrono::{DateTime, Utc};
use jubilee_domain::{EventRecord, EventType, SendingStatus, ID};

pub struct InMemoryEventRepo {
    events: std::sync::Mutex<Vec<EventRecord>>,
}

impl InMemoryEventRepo {
    pub fn new() -> Self {
        Self {
            events: std::sync::Mutex::new(Vec::new()),
        }
    }
}

impl Default for InMemoryEventRepo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl IEventRepo for InMemoryEventRepo {
    async fn insert(&self, event: &EventRecord) -> anyhow::Result<()> {
        insert(event, &self.events);
        Ok(())
    }

    async fn save(&self, event: &EventRecord) -> anyhow::Result<()> {
        save(event, &self.events);
        Ok(())
    }

    async fn find(&self, user_id: &ID, event_type: EventType) -> Option<EventRecord> {
        find(&(user_id.clone(), event_type), &self.events)
    }

    async fn query_due(
        &self,
        now: DateTime<Utc>,
        current_year: i32,
        cursor: Option<String>,
        limit: usize,
    ) -> anyhow::Result<EventPage> {
        let mut due = find_by(&self.events, |event| {
            event.notify_utc <= now && event.last_sent_year < current_year
        });
        due.sort_by_key(|event| event.notify_utc);

        // The cursor is an offset into the due set, opaque to callers.
        let offset = match cursor {
            Some(cursor) => cursor
                .parse::<usize>()
                .map_err(|_| anyhow::anyhow!("malformed page cursor: {}", cursor))?,
            None => 0,
        };
        let records = due
            .into_iter()
            .skip(offset)
            .collect::<Vec<_>>();
        let next_cursor = if records.len() > limit {
            Some((offset + limit).to_string())
        } else {
            None
        };
        Ok(EventPage {
            records: records.into_iter().take(limit).collect(),
            next_cursor,
        })
    }

    async fn query_by_notify_range(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<EventRecord>> {
        Ok(find_by(&self.events, |event| {
            from <= event.notify_utc && event.notify_utc <= to
        }))
    }

    async fn query_by_sending_status(
        &self,
        status: SendingStatus,
    ) -> anyhow::Result<Vec<EventRecord>> {
        Ok(find_by(&self.events, |event| event.sending_status == status))
    }

    async fn claim_for_year(
        &self,
        user_id: &ID,
        event_type: EventType,
        expected_last_sent_year: i32,
        current_year: i32,
        new_notify_utc: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> anyhow::Result<ClaimOutcome> {
        let mut events = self.events.lock().unwrap();
        let Some(stored) = events
            .iter_mut()
            .find(|stored| stored.user_id == *user_id && stored.event_type == event_type)
        else {
            return Ok(ClaimOutcome::LostRace);
        };

        let claimable = stored.last_sent_year == expected_last_sent_year
            && !matches!(
                stored.sending_status,
                SendingStatus::Sending | SendingStatus::Completed
            );
        if !claimable {
            return Ok(ClaimOutcome::LostRace);
        }

        stored.sending_status = SendingStatus::Sending;
        stored.sending_attempted_at = Some(now);
        stored.last_sent_year = current_year;
        stored.notify_utc = new_notify_utc;
        Ok(ClaimOutcome::Claimed)
    }

    async fn mark_completed(
        &self,
        user_id: &ID,
        event_type: EventType,
        response_code: u16,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        update_one(&(user_id.clone(), event_type), &self.events, |stored| {
            stored.sending_status = SendingStatus::Completed;
            stored.webhook_response_code = Some(response_code);
            stored.webhook_delivered_at = Some(now);
            stored.sending_completed_at = Some(now);
            stored.failure_reason = None;
            stored.marked_failed_at = None;
        });
        Ok(())
    }

    async fn mark_failed(
        &self,
        user_id: &ID,
        event_type: EventType,
        reason: &str,
        now: DateTime<Utc>,
    ) -> anyhow::Result<()> {
        update_one(&(user_id.clone(), event_type), &self.events, |stored| {
            stored.sending_status = SendingStatus::Failed;
            stored.marked_failed_at = Some(now);
            stored.failure_reason = Some(reason.to_string());
        });
        Ok(())
    }

    async fn bulk_insert(&self, events: &[EventRecord]) -> anyhow::Result<()> {
        for event in events {
            insert(event, &self.events);
        }
        Ok(())
    }

    async fn bulk_delete(&self, keys: &[(ID, EventType)]) -> anyhow::Result<DeleteResult> {
        let mut deleted_count = 0;
        for key in keys {
            if delete(key, &self.events).is_some() {
                deleted_count += 1;
            }
        }
        Ok(DeleteResult { deleted_count })
    }

    async fn delete(&self, user_id: &ID, event_type: EventType) -> Option<EventRecord> {
        delete(&(user_id.clone(), event_type), &self.events)
    }
}
