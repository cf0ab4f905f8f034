use crate::error::{AuditError, Result};
use crate::schema::WeekWindow;
use chrono::{Datelike, Days, Duration, NaiveDate, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

const SECONDS_PER_DAY: i64 = 86_400;

pub fn parse_date(text: &str, expected_format: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), expected_format)
        .map_err(|_| AuditError::format(text, format!("date pattern '{}'", expected_format)))
}

/// Layouts understood by [`parse_time_of_day`], in the order they are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLayout {
    /// `7:05pm`, `7:05 PM`, `07:05:30am`
    TwelveHourWithMinutes,
    /// `7pm`, `11 am`
    TwelveHourBare,
    /// `19:05`, `19:05:30`
    TwentyFourHour,
}

impl TimeLayout {
    pub const ORDER: [TimeLayout; 3] = [
        TimeLayout::TwelveHourWithMinutes,
        TimeLayout::TwelveHourBare,
        TimeLayout::TwentyFourHour,
    ];

    fn applies_to(self, text: &str) -> bool {
        let has_meridiem = split_meridiem(text).is_some();
        match self {
            TimeLayout::TwelveHourWithMinutes => has_meridiem && text.contains(':'),
            TimeLayout::TwelveHourBare => has_meridiem && !text.contains(':'),
            TimeLayout::TwentyFourHour => !has_meridiem,
        }
    }

    pub fn parse(self, text: &str) -> Option<NaiveTime> {
        let text = text.trim();
        if !self.applies_to(text) {
            return None;
        }

        match self {
            TimeLayout::TwelveHourWithMinutes => {
                let (body, is_pm) = split_meridiem(text)?;
                let mut parts = body.split(':');
                let hour = parse_component(parts.next()?, 1, 12)?;
                let minute = parse_component(parts.next()?, 0, 59)?;
                let second = match parts.next() {
                    Some(s) => parse_component(s, 0, 59)?,
                    None => 0,
                };
                if parts.next().is_some() {
                    return None;
                }
                NaiveTime::from_hms_opt(to_24_hour(hour, is_pm), minute, second)
            }
            TimeLayout::TwelveHourBare => {
                let (body, is_pm) = split_meridiem(text)?;
                let hour = parse_component(body, 1, 12)?;
                NaiveTime::from_hms_opt(to_24_hour(hour, is_pm), 0, 0)
            }
            TimeLayout::TwentyFourHour => NaiveTime::parse_from_str(text, "%H:%M:%S")
                .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
                .ok(),
        }
    }
}

/// Splits a trailing am/pm marker off `text`, returning the remaining clock
/// digits and whether the marker was pm.
fn split_meridiem(text: &str) -> Option<(&str, bool)> {
    let lower = text.to_ascii_lowercase();
    let is_pm = if lower.ends_with("pm") {
        true
    } else if lower.ends_with("am") {
        false
    } else {
        return None;
    };
    Some((text[..text.len() - 2].trim_end(), is_pm))
}

fn parse_component(text: &str, min: u32, max: u32) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() || text.len() > 2 || !text.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: u32 = text.parse().ok()?;
    (min..=max).contains(&value).then_some(value)
}

fn to_24_hour(hour: u32, is_pm: bool) -> u32 {
    match (hour, is_pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) => h + 12,
        (h, false) => h,
    }
}

pub fn parse_time_of_day(text: &str) -> Result<NaiveTime> {
    TimeLayout::ORDER
        .iter()
        .find_map(|layout| layout.parse(text))
        .ok_or_else(|| AuditError::format(text, "H:MMam/pm, Ham/pm or HH:MM"))
}

/// Parses an invoice air time, trying the configured pattern before the
/// auto-detected layouts.
pub fn parse_invoice_time(text: &str, configured_format: &str) -> Result<NaiveTime> {
    if let Ok(time) = NaiveTime::parse_from_str(text.trim(), configured_format) {
        return Ok(time);
    }
    parse_time_of_day(text).map_err(|_| {
        AuditError::format(
            text,
            format!("time pattern '{}' or a 12/24-hour clock time", configured_format),
        )
    })
}

/// Start and end of a named schedule slot. An end at or before the start
/// means the slot runs past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SlotRange {
    fn bounds(&self, slack_seconds: i64) -> (i64, i64) {
        let start = seconds_of_day(self.start);
        let mut end = seconds_of_day(self.end);
        if end <= start {
            end += SECONDS_PER_DAY;
        }
        (start - slack_seconds, end + slack_seconds)
    }

    /// Inclusive match against `[start - tolerance, end + tolerance]`.
    pub fn contains_with_tolerance(&self, time: NaiveTime, tolerance: Duration) -> bool {
        let (low, high) = self.bounds(tolerance.num_seconds());
        let t = seconds_of_day(time);
        [t - SECONDS_PER_DAY, t, t + SECONDS_PER_DAY]
            .iter()
            .any(|candidate| (low..=high).contains(candidate))
    }

    /// Half-open match against `[start, end)`.
    pub fn contains_exact(&self, time: NaiveTime) -> bool {
        let (low, high) = self.bounds(0);
        let t = seconds_of_day(time);
        [t, t + SECONDS_PER_DAY]
            .iter()
            .any(|candidate| (low..high).contains(candidate))
    }
}

fn seconds_of_day(time: NaiveTime) -> i64 {
    time.num_seconds_from_midnight() as i64
}

pub fn parse_slot_label(label: &str) -> Result<SlotRange> {
    let (start, end) = label
        .split_once(|c| c == '-' || c == '–')
        .ok_or_else(|| AuditError::format(label, "a 'start-end' slot label"))?;

    let start = parse_time_of_day(start)
        .map_err(|_| AuditError::format(label, "a 'start-end' slot label"))?;
    let end = parse_time_of_day(end)
        .map_err(|_| AuditError::format(label, "a 'start-end' slot label"))?;

    Ok(SlotRange { start, end })
}

pub fn week_start(date: NaiveDate) -> Result<NaiveDate> {
    let offset = date.weekday().num_days_from_monday() as u64;
    date.checked_sub_days(Days::new(offset)).ok_or_else(|| {
        AuditError::InvalidArgument(format!("No Monday on or before {}", date))
    })
}

pub fn week_end(date: NaiveDate) -> Result<NaiveDate> {
    let offset = 6 - date.weekday().num_days_from_monday() as u64;
    date.checked_add_days(Days::new(offset)).ok_or_else(|| {
        AuditError::InvalidArgument(format!("No Sunday on or after {}", date))
    })
}

/// Partitions `[Monday on/before min_date, Sunday on/after max_date]` into
/// consecutive 7-day windows, numbered from 1.
pub fn compute_week_windows(min_date: NaiveDate, max_date: NaiveDate) -> Result<Vec<WeekWindow>> {
    if max_date < min_date {
        return Err(AuditError::InvalidArgument(format!(
            "Latest invoice date {} precedes earliest invoice date {}",
            max_date, min_date
        )));
    }

    let start = week_start(min_date)?;
    let end = week_end(max_date)?;
    let total_days = (end - start).num_days() + 1;
    let count = (total_days + 6) / 7;

    let mut windows = Vec::with_capacity(count as usize);
    let mut current = start;
    for index in 1..=count as u32 {
        let window_end = current
            .checked_add_days(Days::new(6))
            .ok_or_else(|| AuditError::InvalidArgument(format!("Week starting {} overflows", current)))?;
        windows.push(WeekWindow {
            index,
            start: current,
            end: window_end,
        });
        current = window_end
            .checked_add_days(Days::new(1))
            .ok_or_else(|| AuditError::InvalidArgument(format!("Week after {} overflows", window_end)))?;
    }

    Ok(windows)
}

pub fn locate_week(date: NaiveDate, windows: &[WeekWindow]) -> Result<u32> {
    windows
        .iter()
        .find(|w| w.contains(date))
        .map(|w| w.index)
        .ok_or(AuditError::OutOfWindow { date })
}

pub fn ordinal_suffix(day: u32) -> &'static str {
    match (day % 10, day % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    }
}

pub fn format_week_heading(start: NaiveDate) -> String {
    format!(
        "Week of {} {}{}",
        start.format("%B"),
        start.day(),
        ordinal_suffix(start.day())
    )
}

/// `0` -> `12:00am`, `13` -> `1:00pm`
pub fn format_clock_hour(hour: u32) -> String {
    let hour = hour % 24;
    let meridiem = if hour < 12 { "am" } else { "pm" };
    let display = match hour % 12 {
        0 => 12,
        h => h,
    };
    format!("{}:00{}", display, meridiem)
}

pub fn format_hour_label(hour: u32) -> String {
    format!("{}-{}", format_clock_hour(hour), format_clock_hour(hour + 1))
}
