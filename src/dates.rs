use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Epoch values at or above this magnitude are treated as milliseconds.
const EPOCH_MILLIS_THRESHOLD: i64 = 100_000_000_000;

/// A date coerced from whatever shape the document store handed back.
///
/// `fallback` is true when the raw value was absent or unusable and the
/// current instant was substituted. The substitution keeps the dashboard
/// rendering; the flag keeps the data-quality problem observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedDate {
    pub value: DateTime<Utc>,
    pub fallback: bool,
}

impl NormalizedDate {
    pub fn date(&self) -> NaiveDate {
        self.value.date_naive()
    }
}

/// Coerces a stored date value into a valid `DateTime<Utc>`. Never fails:
/// strings (RFC 3339, `%Y-%m-%dT%H:%M:%S`, plain `%Y-%m-%d`), timestamp
/// objects (`{"seconds": …}` / `{"_seconds": …}`) and epoch numbers are all
/// accepted; anything else falls back to the current instant with a warning.
pub fn to_valid_date(raw: &Value) -> NormalizedDate {
    if let Some(parsed) = try_parse_date(raw) {
        return NormalizedDate {
            value: parsed,
            fallback: false,
        };
    }
    if !raw.is_null() {
        tracing::warn!(raw = %raw, "Unparseable stored date, falling back to now");
    }
    NormalizedDate {
        value: Utc::now(),
        fallback: true,
    }
}

fn try_parse_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::String(text) => parse_date_text(text),
        Value::Object(fields) => {
            let seconds = fields
                .get("seconds")
                .or_else(|| fields.get("_seconds"))
                .and_then(Value::as_i64)?;
            let nanos = fields
                .get("nanoseconds")
                .or_else(|| fields.get("_nanoseconds"))
                .and_then(Value::as_i64)
                .unwrap_or(0);
            Utc.timestamp_opt(seconds, nanos.clamp(0, 999_999_999) as u32)
                .single()
        }
        Value::Number(number) => {
            let epoch = number.as_i64()?;
            if epoch.unsigned_abs() >= EPOCH_MILLIS_THRESHOLD as u64 {
                Utc.timestamp_millis_opt(epoch).single()
            } else {
                Utc.timestamp_opt(epoch, 0).single()
            }
        }
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&parsed));
    }
    if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return parsed
            .and_hms_opt(0, 0, 0)
            .map(|datetime| Utc.from_utc_datetime(&datetime));
    }
    None
}

/// Whole nights between two calendar dates. Signed: zero or negative when
/// `end <= start`, and callers reject non-positive stays before persisting.
pub fn calculate_nights(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// Half-open calendar window `[first day of month, first day of next month)`.
pub fn month_window(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_first))
}

pub fn days_in_month(year: i32, month: u32) -> i64 {
    month_window(year, month)
        .map(|(first, next_first)| (next_first - first).num_days())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate, Timelike};
    use serde_json::json;

    use super::{calculate_nights, days_in_month, month_window, to_valid_date};

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn parses_iso_date_string() {
        let normalized = to_valid_date(&json!("2024-03-10"));
        assert!(!normalized.fallback);
        assert_eq!(normalized.date(), date(2024, 3, 10));
        assert_eq!(normalized.value.hour(), 0);
    }

    #[test]
    fn parses_rfc3339_string() {
        let normalized = to_valid_date(&json!("2024-03-10T15:30:00-03:00"));
        assert!(!normalized.fallback);
        assert_eq!(normalized.value.hour(), 18);
        assert_eq!(normalized.date(), date(2024, 3, 10));
    }

    #[test]
    fn parses_timestamp_object() {
        // 2024-03-10T00:00:00Z
        let normalized = to_valid_date(&json!({"seconds": 1_710_028_800, "nanoseconds": 0}));
        assert!(!normalized.fallback);
        assert_eq!(normalized.date(), date(2024, 3, 10));

        let underscored = to_valid_date(&json!({"_seconds": 1_710_028_800}));
        assert!(!underscored.fallback);
        assert_eq!(underscored.date(), date(2024, 3, 10));
    }

    #[test]
    fn parses_epoch_millis_and_seconds() {
        let seconds = to_valid_date(&json!(1_710_028_800));
        assert_eq!(seconds.date(), date(2024, 3, 10));
        let millis = to_valid_date(&json!(1_710_028_800_000_i64));
        assert_eq!(millis.date(), date(2024, 3, 10));
    }

    #[test]
    fn extreme_epoch_numbers_fall_back_cleanly() {
        for raw in [json!(i64::MIN), json!(i64::MAX)] {
            let normalized = to_valid_date(&raw);
            assert!(normalized.fallback, "expected fallback for {raw}");
        }
    }

    #[test]
    fn garbage_falls_back_to_now_with_flag() {
        for raw in [json!(null), json!("not-a-date"), json!(""), json!(true)] {
            let normalized = to_valid_date(&raw);
            assert!(normalized.fallback, "expected fallback for {raw}");
            assert!(normalized.value.year() >= 2024);
        }
    }

    #[test]
    fn nights_are_signed() {
        assert_eq!(calculate_nights(date(2024, 5, 1), date(2024, 5, 10)), 9);
        assert_eq!(calculate_nights(date(2024, 5, 10), date(2024, 5, 10)), 0);
        assert_eq!(calculate_nights(date(2024, 5, 10), date(2024, 5, 1)), -9);
    }

    #[test]
    fn month_window_is_half_open() {
        let (first, next_first) = month_window(2024, 12).unwrap();
        assert_eq!(first, date(2024, 12, 1));
        assert_eq!(next_first, date(2025, 1, 1));
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2024, 4), 30);
        assert!(month_window(2024, 13).is_none());
    }
}
