use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{CounterError, Result};

/// Fixed primary key of the singleton counter row
pub const COUNTER_ID: i32 = 1;

/// Largest count every backend can hold (BIGINT column)
pub const MAX_COUNT: u64 = i64::MAX as u64;

/// `current + 1`, or `MalformedState` once the counter is at [`MAX_COUNT`]
pub fn next_count(current: u64) -> Result<u64> {
    current
        .checked_add(1)
        .filter(|next| *next <= MAX_COUNT)
        .ok_or_else(|| {
            CounterError::malformed_state(format!("count {} cannot be incremented further", current))
        })
}

/// One entry of the append-only visitor log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorRecord {
    pub ip_address: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl VisitorRecord {
    /// New record stamped with the current time and no location
    pub fn new(ip_address: impl Into<String>) -> Self {
        Self {
            ip_address: ip_address.into(),
            city: None,
            region: None,
            country: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_location(
        mut self,
        city: Option<String>,
        region: Option<String>,
        country: Option<String>,
    ) -> Self {
        self.city = city;
        self.region = region;
        self.country = country;
        self
    }
}

/// Hosted API / JSON file representation of the counter row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRow {
    pub id: i32,
    pub count: i64,
}

impl CounterRow {
    pub fn new(count: u64) -> Result<Self> {
        let count = i64::try_from(count).map_err(|_| {
            CounterError::malformed_state(format!("count {} does not fit the counter column", count))
        })?;
        Ok(Self {
            id: COUNTER_ID,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_count_stops_at_column_limit() {
        assert_eq!(next_count(0).unwrap(), 1);
        assert_eq!(next_count(MAX_COUNT - 1).unwrap(), MAX_COUNT);
        assert!(matches!(next_count(MAX_COUNT), Err(CounterError::MalformedState(_))));
        assert!(matches!(next_count(u64::MAX), Err(CounterError::MalformedState(_))));
    }

    #[test]
    fn test_counter_row_rejects_oversized_count() {
        assert_eq!(CounterRow::new(12).unwrap().count, 12);
        assert_eq!(CounterRow::new(MAX_COUNT).unwrap().count, i64::MAX);
        assert!(matches!(
            CounterRow::new(MAX_COUNT + 1),
            Err(CounterError::MalformedState(_))
        ));
    }
}
