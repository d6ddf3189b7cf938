use anyhow::{bail, Result};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed enumeration of event types (spec.md §3: "`type` is drawn from a
/// closed enumeration"). Unknown values are rejected at the boundary
/// instead of passed through as bare strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Impression,
    Click,
    Purchase,
}

impl EventType {
    pub const ALL: [EventType; 3] = [EventType::Impression, EventType::Click, EventType::Purchase];

    pub fn as_sql_literal(&self) -> &'static str {
        match self {
            EventType::Impression => "impression",
            EventType::Click => "click",
            EventType::Purchase => "purchase",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql_literal())
    }
}

impl std::str::FromStr for EventType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "impression" => Ok(EventType::Impression),
            "click" => Ok(EventType::Click),
            "purchase" => Ok(EventType::Purchase),
            other => bail!("unrecognized event type {other:?}"),
        }
    }
}

/// Logical row in the lake (spec.md §3).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub country: String,
    pub advertiser_id: i64,
    pub publisher_id: i64,
    pub user_id: i64,
    pub event_type: EventType,
    pub bid_price: f64,
    pub total_price: Option<f64>,
}

impl Event {
    /// `day` is derivable from `timestamp` (spec.md §3 invariant).
    pub fn day(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// `hour` is derivable from `timestamp` (spec.md §3 invariant).
    pub fn hour(&self) -> u32 {
        self.timestamp.hour()
    }

    pub fn minute(&self) -> u32 {
        self.timestamp.minute()
    }

    pub fn year(&self) -> i32 {
        self.timestamp.year()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn day_and_hour_derive_from_timestamp() {
        let e = Event {
            timestamp: DateTime::parse_from_rfc3339("2025-09-10T14:05:00Z")
                .unwrap()
                .with_timezone(&Utc),
            country: "JP".into(),
            advertiser_id: 1,
            publisher_id: 2,
            user_id: 3,
            event_type: EventType::Impression,
            bid_price: 1.5,
            total_price: None,
        };
        assert_eq!(e.day().to_string(), "2025-09-10");
        assert_eq!(e.hour(), 14);
        assert_eq!(e.minute(), 5);
    }

    #[test]
    fn unknown_type_is_rejected() {
        assert!(EventType::from_str("view").is_err());
        assert_eq!(EventType::from_str("purchase").unwrap(), EventType::Purchase);
    }
}
