//! Cron parsing and forward occurrence search (spec §4.9): a minute/hour/
//! day-of-month/month/day-of-week expression parser plus a bounded forward
//! search for the next matching occurrence.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Timelike, Utc};

use crate::error::{Result, SchedulerError};

const MONTH_NAMES: [(&str, u32); 12] = [
    ("JAN", 1), ("FEB", 2), ("MAR", 3), ("APR", 4), ("MAY", 5), ("JUN", 6),
    ("JUL", 7), ("AUG", 8), ("SEP", 9), ("OCT", 10), ("NOV", 11), ("DEC", 12),
];

const DOW_NAMES: [(&str, u32); 7] =
    [("SUN", 0), ("MON", 1), ("TUE", 2), ("WED", 3), ("THU", 4), ("FRI", 5), ("SAT", 6)];

const SEARCH_LIMIT_DAYS: i64 = 366;

#[derive(Debug, Clone)]
struct CronField {
    values: BTreeSet<u32>,
    wildcard: bool,
}

impl CronField {
    fn wildcard() -> Self {
        Self { values: BTreeSet::new(), wildcard: true }
    }

    fn matches(&self, v: u32) -> bool {
        self.wildcard || self.values.contains(&v)
    }
}

#[derive(Debug, Clone)]
pub struct CronSchedule {
    minute: CronField,
    hour: CronField,
    dom: CronField,
    month: CronField,
    dow: CronField,
}

/// Parses either a classic 5-field cron expression or the `HH:MM [day-spec]`
/// shortcut (e.g. `"09:30"` or `"09:30 MON-FRI"`).
pub fn parse_cron(expr: &str) -> Result<CronSchedule> {
    let expr = expr.trim();
    if let Some(schedule) = parse_short_form(expr)? {
        return Ok(schedule);
    }

    let fields: Vec<&str> = expr.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(SchedulerError::InvalidCron(expr.to_string()));
    }

    let minute = parse_field(fields[0], 0, 59, &[])?;
    let hour = parse_field(fields[1], 0, 23, &[])?;
    let dom = parse_field(fields[2], 1, 31, &[])?;
    let month = parse_field(fields[3], 1, 12, &MONTH_NAMES)?;
    let mut dow = parse_field(fields[4], 0, 7, &DOW_NAMES)?;
    normalize_dow(&mut dow);

    Ok(CronSchedule { minute, hour, dom, month, dow })
}

/// `"HH:MM"` or `"HH:MM <day-spec>"`. Returns `Ok(None)` when `expr` isn't
/// shaped like a short form at all, so the caller falls through to the
/// classic 5-field parser.
fn parse_short_form(expr: &str) -> Result<Option<CronSchedule>> {
    let mut parts = expr.splitn(2, ' ');
    let time_part = parts.next().unwrap_or("");
    let Some((h, m)) = time_part.split_once(':') else {
        return Ok(None);
    };
    if h.is_empty() || h.len() > 2 || m.len() != 2 || !h.bytes().all(|b| b.is_ascii_digit()) || !m.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }

    let hour: u32 = h.parse().map_err(|_| SchedulerError::InvalidCron(expr.to_string()))?;
    let minute: u32 = m.parse().map_err(|_| SchedulerError::InvalidCron(expr.to_string()))?;
    if hour > 23 || minute > 59 {
        return Err(SchedulerError::InvalidCron(expr.to_string()));
    }

    let mut dow = match parts.next() {
        Some(spec) => parse_field(spec, 0, 7, &DOW_NAMES)?,
        None => CronField::wildcard(),
    };
    normalize_dow(&mut dow);

    Ok(Some(CronSchedule {
        minute: CronField { values: BTreeSet::from([minute]), wildcard: false },
        hour: CronField { values: BTreeSet::from([hour]), wildcard: false },
        dom: CronField::wildcard(),
        month: CronField::wildcard(),
        dow,
    }))
}

fn normalize_dow(field: &mut CronField) {
    if field.values.remove(&7) {
        field.values.insert(0);
    }
}

fn parse_field(s: &str, min: u32, max: u32, names: &[(&str, u32)]) -> Result<CronField> {
    if s == "*" {
        return Ok(CronField::wildcard());
    }

    let mut values = BTreeSet::new();
    for part in s.split(',') {
        let (range_part, step) = match part.split_once('/') {
            Some((r, step_s)) => (
                r,
                Some(step_s.parse::<u32>().map_err(|_| SchedulerError::InvalidCron(s.to_string()))?),
            ),
            None => (part, None),
        };

        let (start, end) = if range_part == "*" {
            (min, max)
        } else if let Some((a, b)) = range_part.split_once('-') {
            (resolve_token(a, names, s)?, resolve_token(b, names, s)?)
        } else {
            let v = resolve_token(range_part, names, s)?;
            (v, v)
        };

        if start > end || start < min || end > max {
            return Err(SchedulerError::InvalidCron(s.to_string()));
        }

        let step = step.unwrap_or(1).max(1);
        let mut v = start;
        while v <= end {
            values.insert(v);
            v += step;
        }
    }

    Ok(CronField { values, wildcard: false })
}

fn resolve_token(tok: &str, names: &[(&str, u32)], whole_field: &str) -> Result<u32> {
    if let Ok(n) = tok.parse::<u32>() {
        return Ok(n);
    }
    names
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(tok))
        .map(|(_, v)| *v)
        .ok_or_else(|| SchedulerError::InvalidCron(whole_field.to_string()))
}

fn day_matches(schedule: &CronSchedule, dt: DateTime<Utc>) -> bool {
    let dom_ok = schedule.dom.matches(dt.day());
    let dow_ok = schedule.dow.matches(dt.weekday().num_days_from_sunday());

    if schedule.dom.wildcard && schedule.dow.wildcard {
        true
    } else if schedule.dom.wildcard {
        dow_ok
    } else if schedule.dow.wildcard {
        dom_ok
    } else {
        // Standard cron OR semantics when both day-of-month and
        // day-of-week are restricted.
        dom_ok || dow_ok
    }
}

fn start_of_next_hour(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let truncated = Utc.from_utc_datetime(&dt.date_naive().and_hms_opt(dt.hour(), 0, 0)?);
    Some(truncated + Duration::hours(1))
}

fn start_of_next_day(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let truncated = Utc.from_utc_datetime(&dt.date_naive().and_hms_opt(0, 0, 0)?);
    Some(truncated + Duration::days(1))
}

fn start_of_next_month(dt: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let (y, m) = if dt.month() == 12 { (dt.year() + 1, 1) } else { (dt.year(), dt.month() + 1) };
    let ndt = NaiveDate::from_ymd_opt(y, m, 1)?.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&ndt))
}

/// Forward minute-by-minute search for the next time strictly after `from`
/// that satisfies `schedule`, with coarse skips when month/day/hour don't
/// match, bounded to 366 days.
pub fn next_cron_occurrence(schedule: &CronSchedule, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let start = from + Duration::minutes(1);
    let mut candidate = Utc.from_utc_datetime(&start.date_naive().and_hms_opt(start.hour(), start.minute(), 0)?);
    let limit = from + Duration::days(SEARCH_LIMIT_DAYS);

    loop {
        if candidate > limit {
            return None;
        }
        if !schedule.month.matches(candidate.month()) {
            candidate = start_of_next_month(candidate)?;
            continue;
        }
        if !day_matches(schedule, candidate) {
            candidate = start_of_next_day(candidate)?;
            continue;
        }
        if !schedule.hour.matches(candidate.hour()) {
            candidate = start_of_next_hour(candidate)?;
            continue;
        }
        if !schedule.minute.matches(candidate.minute()) {
            candidate += Duration::minutes(1);
            continue;
        }
        return Some(candidate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn s1_cron_next_occurrence_skips_weekend() {
        let schedule = parse_cron("0 9 * * MON-FRI").unwrap();
        let from = dt(2025, 6, 14, 12, 0); // Saturday
        let next = next_cron_occurrence(&schedule, from).unwrap();
        assert_eq!(next, dt(2025, 6, 16, 9, 0)); // Monday
    }

    #[test]
    fn short_form_time_of_day() {
        let schedule = parse_cron("09:30").unwrap();
        let from = dt(2025, 1, 1, 10, 0);
        let next = next_cron_occurrence(&schedule, from).unwrap();
        assert_eq!(next, dt(2025, 1, 2, 9, 30));
    }

    #[test]
    fn short_form_with_day_spec() {
        let schedule = parse_cron("09:30 MON,WED,FRI").unwrap();
        let from = dt(2025, 6, 14, 12, 0); // Saturday
        let next = next_cron_occurrence(&schedule, from).unwrap();
        assert_eq!(next, dt(2025, 6, 16, 9, 30)); // Monday
    }

    #[test]
    fn step_and_range_fields() {
        let schedule = parse_cron("*/15 8-10 * * *").unwrap();
        let from = dt(2025, 1, 1, 8, 1);
        let next = next_cron_occurrence(&schedule, from).unwrap();
        assert_eq!(next, dt(2025, 1, 1, 8, 15));
    }

    #[test]
    fn named_months() {
        let schedule = parse_cron("0 0 1 JAN *").unwrap();
        let from = dt(2025, 6, 1, 0, 0);
        let next = next_cron_occurrence(&schedule, from).unwrap();
        assert_eq!(next, dt(2026, 1, 1, 0, 0));
    }

    #[test]
    fn dom_or_dow_when_both_restricted() {
        // Fires on the 1st of the month OR any Monday.
        let schedule = parse_cron("0 0 1 * MON").unwrap();
        let from = dt(2025, 6, 2, 0, 0); // Monday
        let next = next_cron_occurrence(&schedule, from).unwrap();
        assert_eq!(next, dt(2025, 6, 9, 0, 0)); // next Monday
    }

    #[test]
    fn rejects_malformed_expression() {
        assert!(parse_cron("not a cron string").is_err());
    }
}
