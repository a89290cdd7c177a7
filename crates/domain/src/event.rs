use crate::shared::entity::{Entity, ID};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// The closed set of yearly occasions a user can register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Birthday,
    Anniversary,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Birthday => "birthday",
            Self::Anniversary => "anniversary",
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("event type: {0} is not recognized")]
pub struct InvalidEventTypeError(pub String);

impl FromStr for EventType {
    type Err = InvalidEventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "birthday" => Ok(Self::Birthday),
            "anniversary" => Ok(Self::Anniversary),
            _ => Err(InvalidEventTypeError(s.to_string())),
        }
    }
}

/// Delivery lifecycle of an event within its current year. Stored records
/// without a status are read as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendingStatus {
    #[default]
    Pending,
    Sending,
    Completed,
    Failed,
}

impl SendingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sending => "sending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl Display for SendingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("sending status: {0} is not recognized")]
pub struct InvalidSendingStatusError(pub String);

impl FromStr for SendingStatus {
    type Err = InvalidSendingStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "sending" => Ok(Self::Sending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(InvalidSendingStatusError(s.to_string())),
        }
    }
}

/// Local wall-clock time of day (24h, minute precision) at which a greeting
/// should arrive. Serializes as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotifyTime {
    hour: u32,
    minute: u32,
}

#[derive(Error, Debug)]
#[error("notify time: {0} is not a valid HH:MM time")]
pub struct InvalidNotifyTimeError(pub String);

impl NotifyTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self, InvalidNotifyTimeError> {
        if hour > 23 || minute > 59 {
            return Err(InvalidNotifyTimeError(format!("{}:{}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).expect("validated at construction")
    }
}

impl Display for NotifyTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for NotifyTime {
    type Err = InvalidNotifyTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s.split(':').collect::<Vec<_>>();
        if parts.len() != 2 || parts[0].len() != 2 || parts[1].len() != 2 {
            return Err(InvalidNotifyTimeError(s.to_string()));
        }
        let hour = parts[0]
            .parse()
            .map_err(|_| InvalidNotifyTimeError(s.to_string()))?;
        let minute = parts[1]
            .parse()
            .map_err(|_| InvalidNotifyTimeError(s.to_string()))?;
        Self::new(hour, minute).map_err(|_| InvalidNotifyTimeError(s.to_string()))
    }
}

impl Serialize for NotifyTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for NotifyTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// A yearly notification target owned by a user, identified by
/// `(user_id, event_type)`.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub user_id: ID,
    pub event_type: EventType,
    /// The anniversary date. The year component is historical and never
    /// used for scheduling.
    pub date: NaiveDate,
    pub notify_local_time: NotifyTime,
    /// Next absolute instant the event should fire.
    pub notify_utc: DateTime<Utc>,
    /// Last calendar year with a completed delivery. 0 when never sent.
    pub last_sent_year: i32,
    pub sending_status: SendingStatus,
    pub sending_attempted_at: Option<DateTime<Utc>>,
    pub sending_completed_at: Option<DateTime<Utc>>,
    pub marked_failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub webhook_response_code: Option<u16>,
    pub webhook_delivered_at: Option<DateTime<Utc>>,
    pub label: Option<String>,
}

impl EventRecord {
    pub fn new(
        user_id: ID,
        event_type: EventType,
        date: NaiveDate,
        notify_local_time: NotifyTime,
        notify_utc: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            event_type,
            date,
            notify_local_time,
            notify_utc,
            last_sent_year: 0,
            sending_status: SendingStatus::Pending,
            sending_attempted_at: None,
            sending_completed_at: None,
            marked_failed_at: None,
            failure_reason: None,
            webhook_response_code: None,
            webhook_delivered_at: None,
            label: None,
        }
    }

    /// Store partition key.
    pub fn pk(&self) -> String {
        format!("USER#{}", self.user_id)
    }

    /// Store sort key.
    pub fn sk(&self) -> String {
        format!("EVENT#{}", self.event_type)
    }
}

impl Entity<(ID, EventType)> for EventRecord {
    fn id(&self) -> (ID, EventType) {
        (self.user_id.clone(), self.event_type)
    }
}
