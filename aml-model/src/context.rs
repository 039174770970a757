//! Localization and time zone context attached to documents

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Format of date-time values in their neutral (wire) form
pub const NEUTRAL_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
/// Largest UTC offset a session zone may carry, in minutes
pub const MAX_OFFSET_MINUTES: i32 = 14 * 60;

static DEFAULT_CONTEXT: Lazy<Arc<ServerContext>> = Lazy::new(|| Arc::new(ServerContext::default()));

/// Session context used to read and write neutral values.
///
/// Neutral date-times carry no offset on the wire; they are expressed in the
/// session's time zone, which this context pins to a fixed UTC offset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerContext {
    pub language_code: String,
    pub locale: String,
    pub time_zone: String,
    pub utc_offset_minutes: i32,
}

impl Default for ServerContext {
    fn default() -> Self {
        Self {
            language_code: "en".to_string(),
            locale: "en-US".to_string(),
            time_zone: "UTC".to_string(),
            utc_offset_minutes: 0,
        }
    }
}

impl ServerContext {
    /// Build a context, deriving the offset from the zone name when it
    /// carries one (`UTC`, `GMT+02:00`, `-05:00`). Unknown names fall back
    /// to UTC.
    pub fn new<L, C, Z>(language_code: L, locale: C, time_zone: Z) -> Self
    where
        L: Into<String>,
        C: Into<String>,
        Z: Into<String>,
    {
        let time_zone = time_zone.into();
        let utc_offset_minutes = match parse_offset_minutes(&time_zone) {
            Some(minutes) => minutes,
            None => {
                tracing::warn!(time_zone = %time_zone, "unrecognized time zone, using UTC offset");
                0
            }
        };
        Self {
            language_code: language_code.into(),
            locale: locale.into(),
            time_zone,
            utc_offset_minutes,
        }
    }

    /// Process-wide fallback for nodes detached from any document
    pub fn default_context() -> Arc<ServerContext> {
        Arc::clone(&DEFAULT_CONTEXT)
    }

    /// Fixed offset of the session zone; UTC when the stored minutes are
    /// out of range
    pub fn offset(&self) -> FixedOffset {
        self.utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Reject offsets no time zone can have. Contexts built with
    /// [`ServerContext::new`] always pass; deserialized ones may not.
    pub fn validate(&self) -> Result<()> {
        if self.utc_offset_minutes.unsigned_abs() > MAX_OFFSET_MINUTES.unsigned_abs() {
            return Err(Error::argument(format!(
                "UTC offset of {} minutes is outside +/-{}",
                self.utc_offset_minutes, MAX_OFFSET_MINUTES
            )));
        }
        Ok(())
    }

    pub fn is_session_language(&self, language: &str) -> bool {
        self.language_code.eq_ignore_ascii_case(language)
    }

    /// Parse a neutral date-time into the session's wall-clock time.
    ///
    /// Accepts the neutral form with optional fractional seconds, a bare
    /// date, or RFC 3339 text (converted into the session zone).
    pub fn parse_date_time(&self, text: &str) -> Result<NaiveDateTime> {
        let text = text.trim();
        for format in [NEUTRAL_DATE_TIME_FORMAT, "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(value) = NaiveDateTime::parse_from_str(text, format) {
                return Ok(value);
            }
        }
        if let Ok(value) = DateTime::parse_from_rfc3339(text) {
            return Ok(value.with_timezone(&self.offset()).naive_local());
        }
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            if let Some(value) = date.and_hms_opt(0, 0, 0) {
                return Ok(value);
            }
        }
        Err(Error::type_conversion(format!("'{}' is not a date-time", text)))
    }

    /// Attach the session offset to a wall-clock time
    pub fn localize(&self, value: NaiveDateTime) -> Result<DateTime<FixedOffset>> {
        self.offset()
            .from_local_datetime(&value)
            .single()
            .ok_or_else(|| Error::type_conversion(format!("{} is ambiguous in {}", value, self.time_zone)))
    }

    pub fn to_utc(&self, value: NaiveDateTime) -> Result<DateTime<Utc>> {
        Ok(self.localize(value)?.with_timezone(&Utc))
    }

    /// Neutral text for an instant, expressed in the session zone
    pub fn format_instant<Tz: TimeZone>(&self, value: &DateTime<Tz>) -> String {
        self.format_local(value.with_timezone(&self.offset()).naive_local())
    }

    pub fn format_local(&self, value: NaiveDateTime) -> String {
        value.format(NEUTRAL_DATE_TIME_FORMAT).to_string()
    }
}

fn parse_offset_minutes(name: &str) -> Option<i32> {
    let name = name.trim();
    let rest = name
        .strip_prefix("UTC")
        .or_else(|| name.strip_prefix("GMT"))
        .unwrap_or(name)
        .trim_start_matches('(')
        .trim_end_matches(')');
    if rest.is_empty() || rest == "Z" {
        return Some(0);
    }
    if !rest.is_ascii() {
        return None;
    }
    let (sign, digits) = match rest.as_bytes().first()? {
        b'+' => (1, &rest[1..]),
        b'-' => (-1, &rest[1..]),
        _ => return None,
    };
    let (hours, minutes) = match digits.split_once(':') {
        Some((h, m)) => (h.parse::<i32>().ok()?, m.parse::<i32>().ok()?),
        None if digits.len() == 4 => (digits[..2].parse().ok()?, digits[2..].parse().ok()?),
        None => (digits.parse().ok()?, 0),
    };
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }
    let total = hours * 60 + minutes;
    if total > MAX_OFFSET_MINUTES {
        return None;
    }
    Some(sign * total)
}
