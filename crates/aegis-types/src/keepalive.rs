//! Canonical representation of Ollama's `keep_alive` field.
//!
//! The original source carries two incompatible types for this value
//! (`int | str`) in its config. SPEC_FULL resolves this with a single
//! `KeepAlive` enum that deserializes from either a TOML string or integer
//! and serializes to whichever the wire protocol expects.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::time::Duration;

/// How long a model stays resident in the backend after last use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAlive {
    /// Resident for a fixed duration after the last request.
    Duration(Duration),
    /// Never unloaded until the backend process exits (`-1`).
    Forever,
    /// Unloaded immediately after the response is returned (`0`).
    Immediate,
}

impl Default for KeepAlive {
    fn default() -> Self {
        KeepAlive::Duration(Duration::from_secs(5 * 60))
    }
}

impl KeepAlive {
    /// Render as the value Ollama's JSON API expects for `keep_alive`.
    #[must_use]
    pub fn to_wire_value(self) -> serde_json::Value {
        match self {
            KeepAlive::Duration(d) => serde_json::Value::String(format!("{}s", d.as_secs())),
            KeepAlive::Forever => serde_json::Value::Number((-1).into()),
            KeepAlive::Immediate => serde_json::Value::Number(0.into()),
        }
    }
}

impl Serialize for KeepAlive {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            KeepAlive::Duration(d) => serializer.serialize_str(&format!("{}s", d.as_secs())),
            KeepAlive::Forever => serializer.serialize_i64(-1),
            KeepAlive::Immediate => serializer.serialize_i64(0),
        }
    }
}

impl<'de> Deserialize<'de> for KeepAlive {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Int(i64),
            Str(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Int(-1) => Ok(KeepAlive::Forever),
            Raw::Int(0) => Ok(KeepAlive::Immediate),
            Raw::Int(n) if n > 0 => Ok(KeepAlive::Duration(Duration::from_secs(n as u64))),
            Raw::Int(n) => Err(D::Error::custom(format!("invalid keep_alive seconds: {n}"))),
            Raw::Str(s) => parse_keep_alive_str(&s).ok_or_else(|| {
                D::Error::custom(format!("invalid keep_alive string: {s:?}"))
            }),
        }
    }
}

fn parse_keep_alive_str(s: &str) -> Option<KeepAlive> {
    if s == "-1" {
        return Some(KeepAlive::Forever);
    }
    if s == "0" {
        return Some(KeepAlive::Immediate);
    }
    let (digits, suffix) = s.split_at(s.len() - s.chars().last()?.len_utf8());
    let n: u64 = digits.parse().ok()?;
    let secs = match suffix {
        "s" => n,
        "m" => n * 60,
        "h" => n * 3600,
        _ => return None,
    };
    Some(KeepAlive::Duration(Duration::from_secs(secs)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_duration_suffixes() {
        assert_eq!(
            parse_keep_alive_str("5m"),
            Some(KeepAlive::Duration(Duration::from_secs(300)))
        );
        assert_eq!(
            parse_keep_alive_str("10s"),
            Some(KeepAlive::Duration(Duration::from_secs(10)))
        );
        assert_eq!(
            parse_keep_alive_str("1h"),
            Some(KeepAlive::Duration(Duration::from_secs(3600)))
        );
    }

    #[test]
    fn parses_sentinels() {
        assert_eq!(parse_keep_alive_str("-1"), Some(KeepAlive::Forever));
        assert_eq!(parse_keep_alive_str("0"), Some(KeepAlive::Immediate));
    }

    #[test]
    fn deserializes_from_int() {
        let v: KeepAlive = serde_json::from_str("-1").unwrap();
        assert_eq!(v, KeepAlive::Forever);
        let v: KeepAlive = serde_json::from_str("0").unwrap();
        assert_eq!(v, KeepAlive::Immediate);
        let v: KeepAlive = serde_json::from_str("300").unwrap();
        assert_eq!(v, KeepAlive::Duration(Duration::from_secs(300)));
    }

    #[test]
    fn deserializes_from_string() {
        let v: KeepAlive = serde_json::from_str("\"5m\"").unwrap();
        assert_eq!(v, KeepAlive::Duration(Duration::from_secs(300)));
    }

    #[test]
    fn to_wire_value_round_trips_sentinels() {
        assert_eq!(KeepAlive::Forever.to_wire_value(), serde_json::json!(-1));
        assert_eq!(KeepAlive::Immediate.to_wire_value(), serde_json::json!(0));
    }
}
