use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};

use crate::db::models::{BreakType, TimerType};

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn to_optional_u32(value: Option<i64>, field: &str) -> Result<Option<u32>> {
    value.map(|raw| to_u32(raw, field)).transpose()
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_break_type(value: &str) -> Result<BreakType> {
    match value {
        "short" => Ok(BreakType::Short),
        "long" => Ok(BreakType::Long),
        other => Err(anyhow!("unknown break type {other}")),
    }
}

pub fn parse_timer_type(value: &str) -> Result<TimerType> {
    match value {
        "work" => Ok(TimerType::Work),
        "shortBreak" => Ok(TimerType::ShortBreak),
        "longBreak" => Ok(TimerType::LongBreak),
        other => Err(anyhow!("unknown timer type {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_text_matches_storage_format() {
        for timer_type in [TimerType::Work, TimerType::ShortBreak, TimerType::LongBreak] {
            assert_eq!(parse_timer_type(timer_type.as_str()).unwrap(), timer_type);
        }
        for break_type in [BreakType::Short, BreakType::Long] {
            assert_eq!(parse_break_type(break_type.as_str()).unwrap(), break_type);
        }
        assert!(parse_timer_type("pause").is_err());
        assert!(parse_break_type("medium").is_err());
    }

    #[test]
    fn negative_counters_are_rejected() {
        assert!(to_u32(-1, "remaining_seconds").is_err());
        assert_eq!(to_optional_u32(None, "current_subtask_index").unwrap(), None);
        assert_eq!(to_optional_u32(Some(2), "current_subtask_index").unwrap(), Some(2));
    }
}
