use crate::shared::entity::{Entity, ID};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

/// A registered user and the timezone their greetings are anchored to.
#[derive(Debug, Clone)]
pub struct User {
    pub id: ID,
    pub first_name: String,
    pub last_name: String,
    /// IANA timezone, validated at parse time.
    pub timezone: Tz,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        id: ID,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        timezone: Tz,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            timezone,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl Entity<ID> for User {
    fn id(&self) -> ID {
        self.id.clone()
    }
}

#[derive(Error, Debug)]
#[error("timezone: {0} is not a valid IANA timezone name")]
pub struct InvalidTimezoneError(pub String);

pub fn parse_timezone(tz: &str) -> Result<Tz, InvalidTimezoneError> {
    tz.parse::<Tz>()
        .map_err(|_| InvalidTimezoneError(tz.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_accepts_valid_timezones() {
        for tz in ["UTC", "Europe/Oslo", "Pacific/Auckland", "America/New_York"] {
            assert!(parse_timezone(tz).is_ok());
        }
    }

    #[test]
    fn it_rejects_invalid_timezones() {
        for tz in ["", "Mars/Olympus", "CEST+2", "utc "] {
            assert!(parse_timezone(tz).is_err());
        }
    }
}
