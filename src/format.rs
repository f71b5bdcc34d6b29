//! Date, time and name labels shared by every panel.
//!
//! Every timestamp is read as local wall-clock time. Offset-carrying inputs are
//! converted into the local zone once, at parse time, so labels and day
//! comparisons never mix UTC and local readings.

use chrono::{DateTime, Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};

use crate::api::models::{Role, UserId};

const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Anything a label can be derived from: backend strings or chrono values.
pub trait AsLocalTime {
    fn as_local(&self) -> Option<NaiveDateTime>;
}

impl AsLocalTime for str {
    fn as_local(&self) -> Option<NaiveDateTime> {
        parse_timestamp(self)
    }
}

impl AsLocalTime for String {
    fn as_local(&self) -> Option<NaiveDateTime> {
        parse_timestamp(self)
    }
}

impl AsLocalTime for NaiveDateTime {
    fn as_local(&self) -> Option<NaiveDateTime> {
        Some(*self)
    }
}

impl AsLocalTime for NaiveDate {
    fn as_local(&self) -> Option<NaiveDateTime> {
        self.and_hms_opt(0, 0, 0)
    }
}

impl<Tz: TimeZone> AsLocalTime for DateTime<Tz> {
    fn as_local(&self) -> Option<NaiveDateTime> {
        Some(self.with_timezone(&Local).naive_local())
    }
}

impl<T: AsLocalTime + ?Sized> AsLocalTime for &T {
    fn as_local(&self) -> Option<NaiveDateTime> {
        (**self).as_local()
    }
}

/// Parses the timestamp shapes the backend emits.
///
/// Naive forms (`2026-02-10T09:00:00`, `2026-02-10 09:00:00`) are taken as
/// local time. RFC 3339 and RFC 2822 forms carry an offset and are shifted
/// into the local zone. A bare date means local midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.as_local();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return dt.as_local();
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// A time of day as the schedule tables hold it: `14:00:00`, `9:00:00` or `14:00`.
pub fn parse_time_of_day(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    ["%H:%M:%S", "%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(raw, fmt).ok())
}

/// Joins a date column with a separate time-slot column.
///
/// The slot wins over any time carried by the date itself; an unreadable slot
/// falls back to the date's own reading.
pub fn join_date_and_slot(date: &str, slot: Option<&str>) -> Option<NaiveDateTime> {
    let day = parse_timestamp(date)?;
    match slot.and_then(parse_time_of_day) {
        Some(time) => Some(day.date().and_time(time)),
        None => Some(day),
    }
}

/// `DD/MM/YYYY`
pub fn format_date_label<T: AsLocalTime + ?Sized>(value: &T) -> Option<String> {
    value.as_local().map(|dt| dt.format("%d/%m/%Y").to_string())
}

/// `HH:MM`, 24-hour clock.
pub fn format_time_label<T: AsLocalTime + ?Sized>(value: &T) -> Option<String> {
    value.as_local().map(|dt| dt.format("%H:%M").to_string())
}

/// `DD/MM/YYYY HH:MM`
pub fn format_date_time_label<T: AsLocalTime + ?Sized>(value: &T) -> Option<String> {
    value.as_local().map(|dt| dt.format("%d/%m/%Y %H:%M").to_string())
}

/// False when either side cannot be read as a timestamp.
pub fn is_same_calendar_day<A, B>(a: &A, b: &B) -> bool
where
    A: AsLocalTime + ?Sized,
    B: AsLocalTime + ?Sized,
{
    match (a.as_local(), b.as_local()) {
        (Some(a), Some(b)) => a.date() == b.date(),
        _ => false,
    }
}

/// `YYYY-MM-DD`, the form the booking endpoints take.
pub fn iso_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `February 2026`; `month` is 1-based.
pub fn month_title(year: i32, month: u32) -> String {
    let name = MONTH_NAMES
        .get(month.saturating_sub(1) as usize)
        .copied()
        .unwrap_or("?");
    format!("{name} {year}")
}

pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(30)
}

/// A record that can be shown by name.
pub trait DisplayRecord {
    fn explicit_name(&self) -> Option<&str>;
    fn role(&self) -> Option<Role>;
    fn record_id(&self) -> Option<&UserId>;
}

/// Ad hoc record for callers that hold the fields loose.
#[derive(Debug, Clone, Copy, Default)]
pub struct NamedRecord<'a> {
    pub name: Option<&'a str>,
    pub role: Option<Role>,
    pub id: Option<&'a UserId>,
}

impl DisplayRecord for NamedRecord<'_> {
    fn explicit_name(&self) -> Option<&str> {
        self.name
    }

    fn role(&self) -> Option<Role> {
        self.role
    }

    fn record_id(&self) -> Option<&UserId> {
        self.id
    }
}

/// Explicit name, then `"<Role> <id>"`, then `"Unknown"`.
pub fn derive_display_name<R: DisplayRecord + ?Sized>(record: &R) -> String {
    if let Some(name) = record.explicit_name().map(str::trim).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    match record.record_id().filter(|id| !id.is_empty()) {
        Some(id) => {
            let role = record.role().map(Role::label).unwrap_or("User");
            format!("{role} {id}")
        }
        None => "Unknown".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_for_naive_iso_input() {
        assert_eq!(format_date_label("2026-02-10T09:00:00").as_deref(), Some("10/02/2026"));
        assert_eq!(format_time_label("2026-02-10T09:00:00").as_deref(), Some("09:00"));
    }

    #[test]
    fn backend_sql_timestamps_parse() {
        assert_eq!(format_date_time_label("2026-02-10 16:30:00").as_deref(), Some("10/02/2026 16:30"));
        assert_eq!(format_time_label("2026-02-10 16:30:00.250").as_deref(), Some("16:30"));
        assert_eq!(format_date_label("2026-02-10").as_deref(), Some("10/02/2026"));
    }

    #[test]
    fn offset_inputs_agree_with_chrono_local_reading() {
        let raw = "2026-02-10T09:00:00Z";
        let expected = DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Local);
        assert_eq!(format_time_label(raw), Some(expected.format("%H:%M").to_string()));
        assert!(is_same_calendar_day(raw, &expected));
    }

    #[test]
    fn schedule_slot_joins_date_column() {
        let joined = join_date_and_slot("2026-02-10", Some("9:00:00"));
        assert_eq!(joined.as_ref().and_then(format_date_time_label).as_deref(), Some("10/02/2026 09:00"));
        let midnight = join_date_and_slot("2026-02-10 00:00:00", Some("14:30"));
        assert_eq!(midnight.as_ref().and_then(format_time_label).as_deref(), Some("14:30"));
        let unslotted = join_date_and_slot("2026-02-10 16:30:00", Some("later"));
        assert_eq!(unslotted.as_ref().and_then(format_time_label).as_deref(), Some("16:30"));
        assert_eq!(join_date_and_slot("soon", Some("14:00")), None);
    }

    #[test]
    fn unparseable_input_yields_nothing() {
        assert_eq!(format_date_label("soon"), None);
        assert_eq!(format_time_label(""), None);
        assert!(!is_same_calendar_day("soon", "2026-02-10"));
    }

    #[test]
    fn same_day_ignores_time_of_day() {
        assert!(is_same_calendar_day("2026-02-10T00:00:00", "2026-02-10 23:59:59"));
        assert!(!is_same_calendar_day("2026-02-10T23:59:59", "2026-02-11T00:00:00"));
        let date = NaiveDate::from_ymd_opt(2026, 2, 10).unwrap();
        assert!(is_same_calendar_day(&date, "2026-02-10T12:00:00"));
    }

    #[test]
    fn month_helpers() {
        assert_eq!(month_title(2026, 2), "February 2026");
        assert_eq!(days_in_month(2026, 2), 28);
        assert_eq!(days_in_month(2028, 2), 29);
        assert_eq!(days_in_month(2026, 12), 31);
    }

    #[test]
    fn display_name_fallback_chain() {
        let id = UserId::from(12);
        let named = NamedRecord { name: Some("  Jo Bloggs "), role: Some(Role::Student), id: Some(&id) };
        assert_eq!(derive_display_name(&named), "Jo Bloggs");

        let blank = NamedRecord { name: Some("   "), role: Some(Role::Student), id: Some(&id) };
        assert_eq!(derive_display_name(&blank), "Student 12");

        let nothing = NamedRecord::default();
        assert_eq!(derive_display_name(&nothing), "Unknown");
    }
}
