//! Business-hours parsing and window search (spec §4.9): `"H-H [day-list]"`
//! or the token `business` (Mon-Fri 9-17). Overnight ranges (e.g. `22-6`)
//! roll across midnight.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc, Weekday};

use crate::error::{Result, SchedulerError};

const SEARCH_LIMIT_DAYS: i64 = 8;

#[derive(Debug, Clone)]
pub struct BusinessHours {
    start_hour: u32,
    end_hour: u32,
    overnight: bool,
    days: BTreeSet<Weekday>,
}

pub fn parse_business_hours(expr: &str) -> Result<BusinessHours> {
    let expr = expr.trim();
    if expr.eq_ignore_ascii_case("business") {
        return Ok(BusinessHours { start_hour: 9, end_hour: 17, overnight: false, days: mon_fri() });
    }

    let mut parts = expr.splitn(2, ' ');
    let hours_part = parts.next().ok_or_else(|| SchedulerError::InvalidBusinessHours(expr.to_string()))?;
    let days_part = parts.next();

    let (start_s, end_s) =
        hours_part.split_once('-').ok_or_else(|| SchedulerError::InvalidBusinessHours(expr.to_string()))?;
    let start_hour: u32 =
        start_s.trim().parse().map_err(|_| SchedulerError::InvalidBusinessHours(expr.to_string()))?;
    let end_hour: u32 = end_s.trim().parse().map_err(|_| SchedulerError::InvalidBusinessHours(expr.to_string()))?;
    if start_hour > 23 || end_hour > 23 {
        return Err(SchedulerError::InvalidBusinessHours(expr.to_string()));
    }

    // Days default to every day of the week when no day-list is supplied.
    let days = match days_part {
        Some(spec) => parse_day_list(spec)?,
        None => all_days(),
    };

    Ok(BusinessHours { start_hour, end_hour, overnight: end_hour <= start_hour, days })
}

fn all_days() -> BTreeSet<Weekday> {
    use Weekday::*;
    [Mon, Tue, Wed, Thu, Fri, Sat, Sun].into_iter().collect()
}

fn mon_fri() -> BTreeSet<Weekday> {
    use Weekday::*;
    [Mon, Tue, Wed, Thu, Fri].into_iter().collect()
}

fn parse_day_name(tok: &str) -> Result<Weekday> {
    use Weekday::*;
    let day = match tok.trim().to_uppercase().as_str() {
        "MON" => Mon,
        "TUE" => Tue,
        "WED" => Wed,
        "THU" => Thu,
        "FRI" => Fri,
        "SAT" => Sat,
        "SUN" => Sun,
        other => return Err(SchedulerError::InvalidBusinessHours(other.to_string())),
    };
    Ok(day)
}

fn parse_day_list(spec: &str) -> Result<BTreeSet<Weekday>> {
    let mut days = BTreeSet::new();
    for part in spec.split(',') {
        if let Some((a, b)) = part.split_once('-') {
            let start = parse_day_name(a)?;
            let end = parse_day_name(b)?;
            let mut d = start;
            loop {
                days.insert(d);
                if d == end {
                    break;
                }
                d = d.succ();
            }
        } else {
            days.insert(parse_day_name(part)?);
        }
    }
    Ok(days)
}

impl BusinessHours {
    pub fn is_within(&self, dt: DateTime<Utc>) -> bool {
        let hour = dt.hour();
        if !self.overnight {
            self.days.contains(&dt.weekday()) && hour >= self.start_hour && hour < self.end_hour
        } else if hour >= self.start_hour {
            self.days.contains(&dt.weekday())
        } else if hour < self.end_hour {
            self.days.contains(&dt.weekday().pred())
        } else {
            false
        }
    }

    /// The next timestamp (strictly after `from`) at which the window
    /// starts, searching up to 8 days forward.
    pub fn next_start(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        for day_offset in 0..=SEARCH_LIMIT_DAYS {
            let day = (from + Duration::days(day_offset)).date_naive();
            let candidate = Utc.from_utc_datetime(&day.and_hms_opt(self.start_hour, 0, 0)?);
            if self.days.contains(&day.weekday()) && candidate > from {
                return Some(candidate);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn business_keyword_is_mon_fri_nine_to_five() {
        let bh = parse_business_hours("business").unwrap();
        assert!(bh.is_within(dt(2025, 6, 16, 10, 0))); // Monday 10am
        assert!(!bh.is_within(dt(2025, 6, 14, 10, 0))); // Saturday
        assert!(!bh.is_within(dt(2025, 6, 16, 18, 0))); // after hours
    }

    #[test]
    fn explicit_range_with_day_list() {
        let bh = parse_business_hours("9-17 MON-FRI").unwrap();
        assert!(bh.is_within(dt(2025, 6, 16, 9, 0)));
        assert!(!bh.is_within(dt(2025, 6, 16, 17, 0)));
    }

    #[test]
    fn overnight_range_rolls_across_midnight() {
        let bh = parse_business_hours("22-6").unwrap();
        assert!(bh.is_within(dt(2025, 6, 16, 23, 0))); // 11pm Monday
        assert!(bh.is_within(dt(2025, 6, 17, 2, 0))); // 2am Tuesday, started Monday
        assert!(!bh.is_within(dt(2025, 6, 16, 12, 0))); // noon, outside window
    }

    #[test]
    fn next_start_searches_forward() {
        let bh = parse_business_hours("9-17 MON-FRI").unwrap();
        let from = dt(2025, 6, 14, 12, 0); // Saturday
        let next = bh.next_start(from).unwrap();
        assert_eq!(next, dt(2025, 6, 16, 9, 0)); // Monday
    }
}
