//! # Temporal Arithmetic
//!
//! Date parsing, normalization and the single day-difference primitive.
//!
//! Source records carry EDTF-style dates of mixed precision: `1942`,
//! `1942-03`, `1942-03-29`, `1942~`, `1942?`, closed intervals
//! `1942-03-29/1942-04-27` and open intervals `../1942-05-05` or
//! `1942-03-29/..`. Every value is normalized to an optional start and end
//! [`CalendarDate`] plus a [`DatePrecision`].
//!
//! ## Day Differences
//!
//! [`day_diff`] is the ONLY sanctioned way to compute the number of days
//! between two dates anywhere in the engine. It maps both dates onto the
//! epoch-seconds line (midnight UTC) and divides the difference by
//! [`SECONDS_PER_DAY`], truncating toward zero. Duration or interval helpers
//! of the date library are never used for differencing.

use crate::primitives::SECONDS_PER_DAY;
use chrono::{Datelike, NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

// =============================================================================
// CALENDAR DATE
// =============================================================================

/// A proleptic Gregorian calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    /// Build a date from year, month and day. Returns `None` for days that do
    /// not exist in the calendar (e.g. `1942-02-30`).
    #[must_use]
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// Parse a strict `YYYY-MM-DD` string.
    #[must_use]
    pub fn parse_iso(s: &str) -> Option<Self> {
        match parse_partial(s)? {
            Partial::Day(date) => Some(date),
            Partial::Year(_) | Partial::Month(_, _) => None,
        }
    }

    /// Seconds since 1970-01-01T00:00:00Z at midnight UTC of this day.
    #[must_use]
    pub fn epoch_seconds(&self) -> i64 {
        self.0.and_time(NaiveTime::MIN).and_utc().timestamp()
    }

    #[must_use]
    pub fn year(&self) -> i32 {
        self.0.year()
    }

    #[must_use]
    pub fn month(&self) -> u32 {
        self.0.month()
    }

    #[must_use]
    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// Access the underlying `chrono` date.
    #[must_use]
    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

// =============================================================================
// DAY DIFFERENCE
// =============================================================================

/// Whole days from `from` to `to`.
///
/// `(epoch(to) - epoch(from)) / 86400`, truncated toward zero. Negative when
/// `to` precedes `from`.
#[must_use]
pub fn day_diff(from: CalendarDate, to: CalendarDate) -> i64 {
    (to.epoch_seconds() - from.epoch_seconds()) / SECONDS_PER_DAY
}

/// Days in the given month of the proleptic Gregorian calendar.
#[must_use]
pub fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Gregorian leap-year rule.
#[must_use]
pub fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

// =============================================================================
// PRECISION
// =============================================================================

/// How precisely a source date is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatePrecision {
    /// `YYYY-MM-DD`
    Day,
    /// `YYYY-MM`
    Month,
    /// `YYYY`
    Year,
    /// `A/B`
    Interval,
    /// `X~`
    Circa,
    /// `X?`
    Uncertain,
    /// `../B`: only an upper bound is known.
    Before,
    /// `A/..`: only a lower bound is known.
    After,
    /// Empty, `../..` or unparseable.
    Unknown,
}

impl DatePrecision {
    /// A single point in time (possibly coarse) rather than a range.
    #[must_use]
    pub fn is_point(&self) -> bool {
        matches!(self, Self::Day | Self::Month | Self::Year)
    }

    /// Only one bound is known.
    #[must_use]
    pub fn is_open_ended(&self) -> bool {
        matches!(self, Self::Before | Self::After)
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Month => "month",
            Self::Year => "year",
            Self::Interval => "interval",
            Self::Circa => "circa",
            Self::Uncertain => "uncertain",
            Self::Before => "before",
            Self::After => "after",
            Self::Unknown => "unknown",
        }
    }
}

// =============================================================================
// EDTF DATE
// =============================================================================

/// A normalized EDTF date as carried by source records.
///
/// Serializes as the raw EDTF string; deserialization re-derives the
/// normalized bounds, so stored and freshly parsed values are identical.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdtfDate {
    raw: String,
    start: Option<CalendarDate>,
    end: Option<CalendarDate>,
    precision: DatePrecision,
}

impl EdtfDate {
    /// Parse an EDTF string. Never fails: anything unrecognized, or a value
    /// naming a day that does not exist, becomes [`DatePrecision::Unknown`]
    /// with no bounds.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let edtf = raw.trim();
        let (start, end, precision) = normalize(edtf);
        Self {
            raw: edtf.to_string(),
            start,
            end,
            precision,
        }
    }

    /// The raw EDTF string as given by the source.
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn start(&self) -> Option<CalendarDate> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> Option<CalendarDate> {
        self.end
    }

    #[must_use]
    pub fn precision(&self) -> DatePrecision {
        self.precision
    }

    /// The single point used for temporal linking of communications.
    ///
    /// Only day, month and year precision qualify; coarse values are
    /// anchored on the first day of their period. Intervals, circa,
    /// uncertain, open-ended and unknown dates yield `None`.
    #[must_use]
    pub fn point(&self) -> Option<CalendarDate> {
        if self.precision.is_point() {
            self.start
        } else {
            None
        }
    }

    /// First and last day covered by a point date.
    #[must_use]
    pub fn span(&self) -> Option<(CalendarDate, CalendarDate)> {
        if !self.precision.is_point() {
            return None;
        }
        Some((self.start?, self.end?))
    }

    /// Closed interval `[start, end]` when both bounds are known and ordered.
    ///
    /// Open-ended and unknown dates yield `None`.
    #[must_use]
    pub fn interval(&self) -> Option<(CalendarDate, CalendarDate)> {
        if self.precision.is_open_ended() || self.precision == DatePrecision::Unknown {
            return None;
        }
        let (start, end) = (self.start?, self.end?);
        (start <= end).then_some((start, end))
    }
}

impl fmt::Display for EdtfDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for EdtfDate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for EdtfDate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

// =============================================================================
// PARSING
// =============================================================================

/// A single EDTF component before normalization to a bound.
#[derive(Debug, Clone, Copy)]
enum Partial {
    Year(i32),
    Month(i32, u32),
    Day(CalendarDate),
}

impl Partial {
    fn first_day(self) -> Option<CalendarDate> {
        match self {
            Self::Year(y) => CalendarDate::from_ymd(y, 1, 1),
            Self::Month(y, m) => CalendarDate::from_ymd(y, m, 1),
            Self::Day(d) => Some(d),
        }
    }

    fn last_day(self) -> Option<CalendarDate> {
        match self {
            Self::Year(y) => CalendarDate::from_ymd(y, 12, 31),
            Self::Month(y, m) => CalendarDate::from_ymd(y, m, days_in_month(y, m)),
            Self::Day(d) => Some(d),
        }
    }

    fn precision(self) -> DatePrecision {
        match self {
            Self::Year(_) => DatePrecision::Year,
            Self::Month(_, _) => DatePrecision::Month,
            Self::Day(_) => DatePrecision::Day,
        }
    }
}

fn all_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse `YYYY`, `YYYY-MM` or `YYYY-MM-DD`, ignoring trailing `~`/`?`.
fn parse_partial(s: &str) -> Option<Partial> {
    let s = s.trim().trim_end_matches(['~', '?']);
    let mut parts = s.split('-');
    let year_str = parts.next()?;
    let month_str = parts.next();
    let day_str = parts.next();
    if parts.next().is_some() || !all_digits(year_str, 4) {
        return None;
    }
    let year: i32 = year_str.parse().ok()?;

    match (month_str, day_str) {
        (None, None) => Some(Partial::Year(year)),
        (Some(m), None) => {
            if !all_digits(m, 2) {
                return None;
            }
            let month: u32 = m.parse().ok()?;
            (1..=12).contains(&month).then_some(Partial::Month(year, month))
        }
        (Some(m), Some(d)) => {
            if !all_digits(m, 2) || !all_digits(d, 2) {
                return None;
            }
            let date = CalendarDate::from_ymd(year, m.parse().ok()?, d.parse().ok()?)?;
            Some(Partial::Day(date))
        }
        (None, Some(_)) => None,
    }
}

type Normalized = (Option<CalendarDate>, Option<CalendarDate>, DatePrecision);

const UNKNOWN: Normalized = (None, None, DatePrecision::Unknown);

fn normalize(edtf: &str) -> Normalized {
    if edtf.is_empty() || edtf == "../.." {
        return UNKNOWN;
    }

    if let Some(upper) = edtf.strip_prefix("../") {
        return match parse_partial(upper) {
            Some(p) => (None, p.last_day(), DatePrecision::Before),
            None => UNKNOWN,
        };
    }

    if let Some(lower) = edtf.strip_suffix("/..") {
        return match parse_partial(lower) {
            Some(p) => (p.first_day(), None, DatePrecision::After),
            None => UNKNOWN,
        };
    }

    if let Some((lower, upper)) = edtf.split_once('/') {
        let start = parse_partial(lower).and_then(Partial::first_day);
        let end = parse_partial(upper).and_then(Partial::last_day);
        if start.is_none() && end.is_none() {
            return UNKNOWN;
        }
        return (start, end, DatePrecision::Interval);
    }

    let precision_override = if edtf.ends_with('~') {
        Some(DatePrecision::Circa)
    } else if edtf.ends_with('?') {
        Some(DatePrecision::Uncertain)
    } else {
        None
    };

    match parse_partial(edtf) {
        Some(p) => (
            p.first_day(),
            p.last_day(),
            precision_override.unwrap_or_else(|| p.precision()),
        ),
        None => UNKNOWN,
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> CalendarDate {
        CalendarDate::from_ymd(y, m, d).expect("valid date")
    }

    #[test]
    fn day_precision_is_a_point() {
        let d = EdtfDate::parse("1942-03-29");
        assert_eq!(d.precision(), DatePrecision::Day);
        assert_eq!(d.point(), Some(date(1942, 3, 29)));
        assert_eq!(d.span(), Some((date(1942, 3, 29), date(1942, 3, 29))));
    }

    #[test]
    fn month_precision_spans_the_month() {
        let d = EdtfDate::parse("1944-02");
        assert_eq!(d.precision(), DatePrecision::Month);
        assert_eq!(d.point(), Some(date(1944, 2, 1)));
        // 1944 is a leap year
        assert_eq!(d.end(), Some(date(1944, 2, 29)));
    }

    #[test]
    fn year_precision_spans_the_year() {
        let d = EdtfDate::parse("1943");
        assert_eq!(d.precision(), DatePrecision::Year);
        assert_eq!(d.start(), Some(date(1943, 1, 1)));
        assert_eq!(d.end(), Some(date(1943, 12, 31)));
    }

    #[test]
    fn circa_and_uncertain_are_not_points() {
        let circa = EdtfDate::parse("1942~");
        assert_eq!(circa.precision(), DatePrecision::Circa);
        assert_eq!(circa.point(), None);
        assert!(circa.interval().is_some());

        let uncertain = EdtfDate::parse("1942-05?");
        assert_eq!(uncertain.precision(), DatePrecision::Uncertain);
        assert_eq!(uncertain.point(), None);
        assert_eq!(uncertain.start(), Some(date(1942, 5, 1)));
        assert_eq!(uncertain.end(), Some(date(1942, 5, 31)));
    }

    #[test]
    fn closed_interval() {
        let d = EdtfDate::parse("1942-03-29/1942-04");
        assert_eq!(d.precision(), DatePrecision::Interval);
        assert_eq!(d.point(), None);
        assert_eq!(d.interval(), Some((date(1942, 3, 29), date(1942, 4, 30))));
    }

    #[test]
    fn inverted_interval_is_unusable() {
        let d = EdtfDate::parse("1943-01-01/1942-01-01");
        assert_eq!(d.interval(), None);
    }

    #[test]
    fn open_intervals_are_excluded() {
        let before = EdtfDate::parse("../1942-05-05");
        assert_eq!(before.precision(), DatePrecision::Before);
        assert_eq!(before.start(), None);
        assert_eq!(before.end(), Some(date(1942, 5, 5)));
        assert_eq!(before.interval(), None);
        assert_eq!(before.point(), None);

        let after = EdtfDate::parse("1942-03-29/..");
        assert_eq!(after.precision(), DatePrecision::After);
        assert_eq!(after.start(), Some(date(1942, 3, 29)));
        assert_eq!(after.interval(), None);
    }

    #[test]
    fn unknown_inputs() {
        for raw in ["", "../..", "spring 1942", "1942-13", "1942-02-30", "42-01-01"] {
            let d = EdtfDate::parse(raw);
            assert_eq!(d.precision(), DatePrecision::Unknown, "input {raw:?}");
            assert_eq!(d.start(), None);
            assert_eq!(d.end(), None);
        }
    }

    #[test]
    fn serde_roundtrip_preserves_raw() {
        let d = EdtfDate::parse("1942-03");
        let json = serde_json::to_string(&d).expect("serialize");
        assert_eq!(json, "\"1942-03\"");
        let back: EdtfDate = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, d);
    }

    #[test]
    fn day_diff_basic() {
        assert_eq!(day_diff(date(1942, 3, 1), date(1942, 3, 11)), 10);
        assert_eq!(day_diff(date(1942, 3, 11), date(1942, 3, 1)), -10);
        assert_eq!(day_diff(date(1942, 3, 1), date(1942, 3, 1)), 0);
    }

    #[test]
    fn day_diff_crosses_leap_days_and_centuries() {
        assert_eq!(day_diff(date(1944, 2, 28), date(1944, 3, 1)), 2);
        assert_eq!(day_diff(date(1900, 2, 28), date(1900, 3, 1)), 1);
        assert_eq!(day_diff(date(2000, 2, 28), date(2000, 3, 1)), 2);
        assert_eq!(day_diff(date(1939, 9, 1), date(1945, 5, 8)), 2076);
    }

    #[test]
    fn day_diff_before_epoch() {
        assert_eq!(day_diff(date(1969, 12, 31), date(1970, 1, 1)), 1);
        assert!(date(1942, 1, 1).epoch_seconds() < 0);
    }

    #[test]
    fn month_lengths() {
        assert_eq!(days_in_month(1942, 2), 28);
        assert_eq!(days_in_month(1940, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1942, 4), 30);
        assert_eq!(days_in_month(1942, 13), 0);
    }
}
