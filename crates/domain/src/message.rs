use crate::event::{EventRecord, EventType, NotifyTime};
use crate::user::User;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The queue message produced by the due-events sweep and consumed by the
/// sender. Field names are the wire contract with the FIFO transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GreeterMessage {
    /// The owning user's id.
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub timezone: String,
    pub pk: String,
    pub sk: String,
    pub event_type: EventType,
    pub event_date: NaiveDate,
    pub notify_local_time: NotifyTime,
    pub last_sent_year: i32,
    pub year_now: i32,
}

impl GreeterMessage {
    pub fn new(user: &User, event: &EventRecord, year_now: i32) -> Self {
        Self {
            id: user.id.to_string(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            timezone: user.timezone.to_string(),
            pk: event.pk(),
            sk: event.sk(),
            event_type: event.event_type,
            event_date: event.date,
            notify_local_time: event.notify_local_time,
            last_sent_year: event.last_sent_year,
            year_now,
        }
    }

    /// FIFO group: preserves per-type ordering at the transport.
    pub fn group_key(&self) -> String {
        self.event_type.to_string()
    }

    /// Collapses repeated enqueues of the same (event, year) inside the
    /// transport's dedup window.
    pub fn dedup_key(&self) -> String {
        format!("{}-{}-{}", self.id, self.event_type, self.year_now)
    }

    /// Shared with the webhook receiver so duplicate deliveries collapse to
    /// one visible side effect.
    pub fn idempotency_key(&self) -> String {
        self.dedup_key()
    }
}
