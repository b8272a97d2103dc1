use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::TimingMode;

pub fn to_u32(value: i64, field: &str) -> Result<u32> {
    u32::try_from(value).map_err(|_| anyhow!("{field} contains out-of-range value {value}"))
}

pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_timing_mode(value: &str) -> Result<TimingMode> {
    match value {
        "instant" => Ok(TimingMode::Instant),
        "bounded" => Ok(TimingMode::Bounded),
        "voice" => Ok(TimingMode::Voice),
        other => Err(anyhow!("unknown timing mode {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn datetimes_keep_millisecond_precision() {
        let at = Utc.timestamp_millis_opt(1_700_000_012_345).unwrap();
        let text = format_datetime(&at);
        assert_eq!(text, "2023-11-14T22:13:32.345Z");
        assert_eq!(parse_datetime(&text, "at").unwrap(), at);
    }

    #[test]
    fn timing_modes_round_trip_through_their_names() {
        for mode in [TimingMode::Instant, TimingMode::Bounded, TimingMode::Voice] {
            assert_eq!(parse_timing_mode(mode.as_str()).unwrap(), mode);
        }
        assert!(parse_timing_mode("paused").is_err());
    }
}
