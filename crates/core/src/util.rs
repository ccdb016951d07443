use std::time::Duration;

use crate::config::ServiceNameConfig;

/// Derive the `service.name` resource attribute for a repository.
pub fn service_name(config: &ServiceNameConfig, full_name: &str) -> String {
    if let Some(custom) = config.custom.as_deref().filter(|s| !s.is_empty()) {
        return custom.to_string();
    }
    let mut out = String::new();
    if let Some(prefix) = &config.prefix {
        out.push_str(prefix);
    }
    out.push_str(&full_name.replace('/', "-"));
    if let Some(suffix) = &config.suffix {
        out.push_str(suffix);
    }
    out.to_lowercase()
}

/// Parse a duration such as `250ms`, `5s`, `2m` or `1h`.
/// A bare number is interpreted as seconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (value, unit) = s.split_at(split);
    let value = value.parse::<u64>().ok()?;
    match unit.trim() {
        "ms" => Some(Duration::from_millis(value)),
        "" | "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

/// Serde adapter for durations written as `5s`, `500ms`, etc.
pub mod duration_str {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", value.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(u64),
            Text(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text)
                .ok_or_else(|| D::Error::custom(format!("invalid duration {text:?}"))),
        }
    }
}
