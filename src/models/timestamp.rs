//! Timestamp normalization for batch responses.
//!
//! The batch service reports instants in UTC. Responses are read back in
//! Korea Standard Time, so every timestamp string is converted on ingestion.
//! Asia/Seoul has had no daylight saving since 1988, which makes it a fixed
//! `+09:00` offset for every instant this API can produce.

use crate::error::SchemaError;
use chrono::{DateTime, FixedOffset, NaiveDateTime, ParseError, Utc};
use serde::{Deserialize, Deserializer};
use serde_json::Value;

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Formats accepted for timestamps that carry no offset (read as UTC).
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Korea Standard Time (UTC+9).
pub fn kst() -> FixedOffset {
    FixedOffset::east_opt(KST_OFFSET_SECS).expect("UTC+9 is within the valid offset range")
}

/// Parses an ISO-8601 timestamp and expresses it in Korea Standard Time.
///
/// Accepts a trailing `Z`, an explicit offset, or no offset at all, in which
/// case the value is taken to be UTC.
pub fn to_kst(raw: &str) -> Result<DateTime<FixedOffset>, ParseError> {
    let raw = raw.trim();
    let parsed = match DateTime::parse_from_rfc3339(raw) {
        Ok(parsed) => parsed,
        Err(rfc_err) => {
            let naive = NAIVE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .ok_or(rfc_err)?;
            naive.and_utc().fixed_offset()
        }
    };
    Ok(parsed.with_timezone(&kst()))
}

/// Rewrites a raw JSON timestamp in place.
///
/// Strings are converted to KST and re-rendered as RFC 3339. Any other value,
/// including `null`, is left untouched for typed decoding to judge.
pub fn normalize_value(field: &str, value: &mut Value) -> Result<(), SchemaError> {
    if let Value::String(raw) = value {
        let normalized = to_kst(raw).map_err(|source| SchemaError::Timestamp {
            field: field.to_string(),
            raw: raw.clone(),
            source,
        })?;
        *value = Value::String(normalized.to_rfc3339());
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TimestampInput {
    Text(String),
    UnixSeconds(i64),
    FractionalSeconds(f64),
}

impl TimestampInput {
    fn resolve<E: serde::de::Error>(self) -> Result<DateTime<FixedOffset>, E> {
        match self {
            Self::Text(raw) => to_kst(&raw)
                .map_err(|e| E::custom(format!("malformed timestamp {:?}: {}", raw, e))),
            Self::UnixSeconds(secs) => DateTime::<Utc>::from_timestamp(secs, 0)
                .map(|utc| utc.fixed_offset())
                .ok_or_else(|| E::custom(format!("timestamp {} is out of range", secs))),
            Self::FractionalSeconds(value) => from_fractional_secs(value)
                .map(|utc| utc.fixed_offset())
                .ok_or_else(|| E::custom(format!("timestamp {} is out of range", value))),
        }
    }
}

fn from_fractional_secs(value: f64) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let secs = value.floor();
    if secs < i64::MIN as f64 || secs > i64::MAX as f64 {
        return None;
    }
    let nanos = (((value - secs) * 1e9).round() as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(secs as i64, nanos)
}

/// `deserialize_with` hook for required timestamp fields.
pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    TimestampInput::deserialize(deserializer)?.resolve()
}

/// `deserialize_with` hook for optional timestamp fields.
pub(crate) fn deserialize_option<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<FixedOffset>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<TimestampInput>::deserialize(deserializer)?
        .map(TimestampInput::resolve)
        .transpose()
}
