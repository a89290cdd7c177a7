mod date;
mod event;
mod message;
mod shared;
mod timing;
mod user;

pub use date::{last_day_of_month, normalize_day, parse_event_date, InvalidDateError};
pub use event::{
    EventRecord, EventType, InvalidEventTypeError, InvalidNotifyTimeError,
    InvalidSendingStatusError, NotifyTime, SendingStatus,
};
pub use message::GreeterMessage;
pub use shared::entity::{Entity, InvalidIDError, ID};
pub use timing::{format_instant, next_notify_utc, notify_utc_for_year, parse_instant};
pub use user::{parse_timezone, InvalidTimezoneError, User};

pub use chrono_tz::Tz;
