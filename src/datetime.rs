// Date and time handling for the date.* operators
// Dates travel through remappers as ISO-8601 UTC strings; numbers are epoch milliseconds

use std::fmt::Write;

use chrono::format::{Item, StrftimeItems};
use chrono::{
    DateTime, Datelike, Days, FixedOffset, Months, NaiveDate, NaiveDateTime, NaiveTime,
    SecondsFormat, TimeDelta, TimeZone, Timelike, Utc,
};
use thiserror::Error;

use crate::value::JValue;

/// DateTime errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DateTimeError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Format error: {0}")]
    FormatError(String),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),
}

/// Parse an ISO 8601 datetime string
///
/// Accepts full RFC 3339 timestamps, timestamps without an offset (read as
/// UTC) and plain dates (midnight UTC).
pub fn parse_iso8601(s: &str) -> Result<DateTime<Utc>, DateTimeError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for pattern in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, pattern) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
        .map_err(|e| DateTimeError::ParseError(format!("{}: {}", s, e)))
}

/// Format a datetime as ISO 8601 string with millisecond precision
pub fn format_iso8601(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Interpret a remapper value as an instant.
pub fn to_datetime(value: &JValue) -> Option<DateTime<Utc>> {
    match value {
        JValue::String(s) => parse_iso8601(s).ok(),
        JValue::Number(ms) if ms.is_finite() => Utc.timestamp_millis_opt(*ms as i64).single(),
        _ => None,
    }
}

/// The value representation of an instant.
pub fn to_value(dt: &DateTime<Utc>) -> JValue {
    JValue::from(format_iso8601(dt))
}

/// `date.now`
pub fn now() -> JValue {
    to_value(&Utc::now())
}

/// Parse `input` with an optional date-fns style pattern.
pub fn parse(input: &str, pattern: Option<&str>) -> Result<DateTime<Utc>, DateTimeError> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return parse_iso8601(input);
    };
    let format = translate_pattern(pattern);
    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(input, &format) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(input, &format) {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(input, &format)
        .map(|date| Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)))
        .map_err(|e| DateTimeError::ParseError(format!("{} with '{}': {}", input, pattern, e)))
}

/// Format an instant with an optional date-fns style pattern.
pub fn format(dt: &DateTime<Utc>, pattern: Option<&str>) -> Result<String, DateTimeError> {
    let Some(pattern) = pattern.filter(|p| !p.is_empty()) else {
        return Ok(format_iso8601(dt));
    };
    let format = translate_pattern(pattern);
    let items: Vec<Item<'_>> = StrftimeItems::new(&format).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(DateTimeError::FormatError(pattern.to_string()));
    }
    let mut out = String::new();
    write!(out, "{}", dt.format_with_items(items.into_iter()))
        .map_err(|_| DateTimeError::FormatError(pattern.to_string()))?;
    Ok(out)
}

/// Translate date-fns tokens (`yyyy-MM-dd HH:mm`) to chrono strftime items.
fn translate_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' {
            // Quoted literal; '' is an escaped quote
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let mut run = 1;
        while chars.get(i + run) == Some(&c) {
            run += 1;
        }
        let token = match (c, run) {
            ('y', 2) => Some("%y"),
            ('y', _) => Some("%Y"),
            ('M', 1) => Some("%-m"),
            ('M', 2) => Some("%m"),
            ('M', 3) => Some("%b"),
            ('M', _) => Some("%B"),
            ('d', 1) => Some("%-d"),
            ('d', _) => Some("%d"),
            ('D', _) => Some("%j"),
            ('E', 4) => Some("%A"),
            ('E', _) => Some("%a"),
            ('H', 1) => Some("%-H"),
            ('H', _) => Some("%H"),
            ('h', 1) => Some("%-I"),
            ('h', _) => Some("%I"),
            ('m', 1) => Some("%-M"),
            ('m', _) => Some("%M"),
            ('s', 1) => Some("%-S"),
            ('s', _) => Some("%S"),
            ('S', _) => Some("%3f"),
            ('a', _) => Some("%p"),
            ('X' | 'x', 3) => Some("%:z"),
            ('X' | 'x', _) => Some("%z"),
            _ => None,
        };
        match token {
            Some(directive) => out.push_str(directive),
            None => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
            }
        }
        i += run;
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

// ── Durations ────────────────────────────────────────────────────────────────

const SECOND: f64 = 1_000.0;
const MINUTE: f64 = 60.0 * SECOND;
const HOUR: f64 = 60.0 * MINUTE;
const DAY: f64 = 24.0 * HOUR;
const WEEK: f64 = 7.0 * DAY;

/// A parsed duration such as `1w`, `2d 3h` or `-1mo`.
///
/// Months and years are kept apart from the fixed-length units so they can
/// be applied calendar-aware.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Duration {
    pub months: i64,
    pub millis: f64,
}

impl Duration {
    /// Parse the compact duration grammar: signed `<number><unit>` components.
    pub fn parse(s: &str) -> Result<Duration, DateTimeError> {
        let invalid = || DateTimeError::InvalidDuration(s.to_string());
        let chars: Vec<char> = s.chars().collect();
        let mut duration = Duration::default();
        let mut components = 0;
        let mut i = 0;

        loop {
            while i < chars.len() && (chars[i].is_whitespace() || chars[i] == ',') {
                i += 1;
            }
            if i >= chars.len() {
                break;
            }

            let start = i;
            if chars[i] == '-' || chars[i] == '+' {
                i += 1;
            }
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let number: String = chars[start..i].iter().collect();
            let amount: f64 = number.parse().map_err(|_| invalid())?;
            if !amount.is_finite() || amount.abs() >= i64::MAX as f64 {
                return Err(invalid());
            }

            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            let unit_start = i;
            while i < chars.len() && chars[i].is_alphabetic() {
                i += 1;
            }
            let unit: String = chars[unit_start..i].iter().collect::<String>().to_lowercase();

            match unit.as_str() {
                "" | "ms" | "millisecond" | "milliseconds" => duration.millis += amount,
                "s" | "sec" | "secs" | "second" | "seconds" => duration.millis += amount * SECOND,
                "m" | "min" | "mins" | "minute" | "minutes" => duration.millis += amount * MINUTE,
                "h" | "hr" | "hrs" | "hour" | "hours" => duration.millis += amount * HOUR,
                "d" | "day" | "days" => duration.millis += amount * DAY,
                "w" | "wk" | "wks" | "week" | "weeks" => duration.millis += amount * WEEK,
                "mo" | "month" | "months" | "y" | "yr" | "yrs" | "year" | "years" => {
                    if amount.fract() != 0.0 {
                        return Err(invalid());
                    }
                    let factor = if unit.starts_with('m') { 1 } else { 12 };
                    duration.months = (amount as i64)
                        .checked_mul(factor)
                        .and_then(|months| duration.months.checked_add(months))
                        .ok_or_else(invalid)?;
                }
                _ => return Err(invalid()),
            }
            components += 1;
        }

        if components == 0 || !duration.millis.is_finite() {
            return Err(invalid());
        }
        Ok(duration)
    }

    fn negate(self) -> Option<Duration> {
        Some(Duration {
            months: self.months.checked_neg()?,
            millis: -self.millis,
        })
    }

    /// `dt` shifted forward by this duration; `None` when the result leaves chrono's range.
    pub fn add_to(&self, dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        let months = Months::new(u32::try_from(self.months.unsigned_abs()).ok()?);
        let shifted = if self.months >= 0 {
            dt.checked_add_months(months)?
        } else {
            dt.checked_sub_months(months)?
        };
        let millis = self.millis.round();
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return None;
        }
        shifted.checked_add_signed(TimeDelta::try_milliseconds(millis as i64)?)
    }

    /// `dt` shifted backwards by this duration.
    pub fn sub_from(&self, dt: &DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.negate()?.add_to(dt)
    }
}

// ── Calendar units ───────────────────────────────────────────────────────────

/// Unit boundaries for `date.startOf` / `date.endOf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateUnit {
    Year,
    Quarter,
    Month,
    /// Weeks starting on Monday
    Week,
    /// Weeks starting on Sunday
    WeekSun,
    Day,
}

impl DateUnit {
    pub fn from_name(name: &str) -> Option<DateUnit> {
        match name {
            "year" => Some(DateUnit::Year),
            "quarter" => Some(DateUnit::Quarter),
            "month" => Some(DateUnit::Month),
            "week" => Some(DateUnit::Week),
            "weekSun" => Some(DateUnit::WeekSun),
            "day" => Some(DateUnit::Day),
            _ => None,
        }
    }
}

/// Floor `dt` to the start of `unit` at 00:00:00.000.
pub fn start_of(dt: &DateTime<Utc>, unit: DateUnit) -> Option<DateTime<Utc>> {
    let date = dt.date_naive();
    let start = match unit {
        DateUnit::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1)?,
        DateUnit::Quarter => {
            let month = (date.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1)?
        }
        DateUnit::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?,
        DateUnit::Week => {
            date.checked_sub_days(Days::new(date.weekday().num_days_from_monday().into()))?
        }
        DateUnit::WeekSun => {
            date.checked_sub_days(Days::new(date.weekday().num_days_from_sunday().into()))?
        }
        DateUnit::Day => date,
    };
    Some(Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN)))
}

/// Ceil `dt` to the end of `unit` at 23:59:59.999.
pub fn end_of(dt: &DateTime<Utc>, unit: DateUnit) -> Option<DateTime<Utc>> {
    let start = start_of(dt, unit)?;
    let next = match unit {
        DateUnit::Year => start.checked_add_months(Months::new(12))?,
        DateUnit::Quarter => start.checked_add_months(Months::new(3))?,
        DateUnit::Month => start.checked_add_months(Months::new(1))?,
        DateUnit::Week | DateUnit::WeekSun => start.checked_add_days(Days::new(7))?,
        DateUnit::Day => start.checked_add_days(Days::new(1))?,
    };
    next.checked_sub_signed(TimeDelta::milliseconds(1))
}

/// A field `date.set` may override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Year,
    /// 1-based month
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
}

impl DateField {
    pub fn from_name(name: &str) -> Option<DateField> {
        match name {
            "year" | "years" => Some(DateField::Year),
            "month" | "months" => Some(DateField::Month),
            "day" | "days" | "date" => Some(DateField::Day),
            "hour" | "hours" => Some(DateField::Hour),
            "minute" | "minutes" => Some(DateField::Minute),
            "second" | "seconds" => Some(DateField::Second),
            "millisecond" | "milliseconds" => Some(DateField::Millisecond),
            _ => None,
        }
    }
}

/// Override the given fields of `dt`; `None` when the result is not a valid date.
pub fn set(dt: &DateTime<Utc>, fields: &[(DateField, i64)]) -> Option<DateTime<Utc>> {
    let mut year = i64::from(dt.year());
    let mut month = i64::from(dt.month());
    let mut day = i64::from(dt.day());
    let mut hour = i64::from(dt.hour());
    let mut minute = i64::from(dt.minute());
    let mut second = i64::from(dt.second());
    let mut milli = i64::from(dt.timestamp_subsec_millis());

    for (field, value) in fields {
        let target = match field {
            DateField::Year => &mut year,
            DateField::Month => &mut month,
            DateField::Day => &mut day,
            DateField::Hour => &mut hour,
            DateField::Minute => &mut minute,
            DateField::Second => &mut second,
            DateField::Millisecond => &mut milli,
        };
        *target = *value;
    }

    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).ok()?,
        u32::try_from(month).ok()?,
        u32::try_from(day).ok()?,
    )?;
    let time = NaiveTime::from_hms_milli_opt(
        u32::try_from(hour).ok()?,
        u32::try_from(minute).ok()?,
        u32::try_from(second).ok()?,
        u32::try_from(milli).ok()?,
    )?;
    Some(Utc.from_utc_datetime(&date.and_time(time)))
}
