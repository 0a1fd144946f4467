use chrono::{
    DateTime, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat,
    SubsecRound, TimeDelta, Utc,
};

pub type Timestamp = DateTime<Utc>;

/// Formats tried, in order, for timestamps that carry no offset.
/// Such values are read as UTC.
const NAIVE_FORMATS: &[&str] =
    &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[error("unparseable timestamp `{0}`")]
pub struct TimestampError(pub String);

/// Parse an observation timestamp.
///
/// Accepts RFC 3339, ISO-8601 with a `+hhmm` offset, offset-less
/// date-times and bare `YYYY-MM-DD` dates (midnight UTC). Precision is
/// truncated to milliseconds so instants survive the epoch-millis form
/// widgets exchange.
pub fn parse_timestamp(raw: &str) -> Result<Timestamp, TimestampError> {
    parse_exact(raw.trim()).map(|t| t.trunc_subsecs(3))
}

fn parse_exact(raw: &str) -> Result<Timestamp, TimestampError> {

    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    if let Ok(t) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
    {
        return Ok(t.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(n) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(n.and_utc());
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d.and_time(NaiveTime::MIN).and_utc());
    }

    Err(TimestampError(raw.to_string()))
}

pub fn format_timestamp(t: &Timestamp) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch milliseconds, the form slider and picker widgets exchange.
pub fn from_millis(ms: i64) -> Option<Timestamp> {
    DateTime::from_timestamp_millis(ms)
}

pub fn to_millis(t: Timestamp) -> i64 {
    t.timestamp_millis()
}

/// Midnight (UTC) of the day containing `t`.
pub fn day_start(t: Timestamp) -> Timestamp {
    t.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Last millisecond of the day containing `t`.
pub fn day_end(t: Timestamp) -> Timestamp {
    day_start(t) + TimeDelta::days(1) - TimeDelta::milliseconds(1)
}

/// Serde adapter for timestamp fields: lenient on input, RFC 3339 on output.
pub mod serde_timestamp {
    use super::{Timestamp, format_timestamp, parse_timestamp};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(t: &Timestamp, s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        s.serialize_str(&format_timestamp(t))
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Timestamp, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
