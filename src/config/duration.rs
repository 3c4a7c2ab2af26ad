//! Human-readable durations ("10 sec", "2 min", "250ms").

use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDurationError(String);

impl fmt::Display for ParseDurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid duration '{}'", self.0)
    }
}

impl std::error::Error for ParseDurationError {}

/// Parse `"<amount> <unit>"`; the space is optional.
pub fn parse_duration(input: &str) -> Result<Duration, ParseDurationError> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (amount, unit) = trimmed.split_at(split);

    let amount: u64 = amount
        .parse()
        .map_err(|_| ParseDurationError(input.to_string()))?;

    let duration = match unit.trim().to_ascii_lowercase().as_str() {
        "ms" | "milli" | "millis" | "millisecond" | "milliseconds" => Duration::from_millis(amount),
        "s" | "sec" | "secs" | "second" | "seconds" => Duration::from_secs(amount),
        "m" | "min" | "mins" | "minute" | "minutes" => Duration::from_secs(amount.saturating_mul(60)),
        "h" | "hour" | "hours" => Duration::from_secs(amount.saturating_mul(3600)),
        _ => return Err(ParseDurationError(input.to_string())),
    };
    Ok(duration)
}

/// Inverse of [`parse_duration`], picking the largest exact unit.
pub fn format_duration(duration: &Duration) -> String {
    let millis = duration.as_millis();
    if millis == 0 {
        return "0 millis".to_string();
    }
    if millis % 3_600_000 == 0 {
        format!("{} hours", millis / 3_600_000)
    } else if millis % 60_000 == 0 {
        format!("{} min", millis / 60_000)
    } else if millis % 1000 == 0 {
        format!("{} sec", millis / 1000)
    } else {
        format!("{} millis", millis)
    }
}

/// Serde adapter: `#[serde(with = "crate::config::duration::serde_human")]`.
pub mod serde_human {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&super::format_duration(duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        super::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
