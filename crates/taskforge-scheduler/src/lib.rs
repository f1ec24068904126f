//! Scheduling primitives (spec §4.9): interval/cron/business-hours parsing
//! and the `calculate_next_run` entry point the task store consults to fill
//! in `next_run_at`.

pub mod business_hours;
pub mod cron;
pub mod error;
pub mod interval;

use chrono::{DateTime, Duration, Utc};

pub use business_hours::{parse_business_hours, BusinessHours};
pub use cron::{next_cron_occurrence, parse_cron, CronSchedule};
pub use error::{Result, SchedulerError};
pub use interval::parse_interval;

/// Inputs to [`calculate_next_run`]. At most one of `interval_ms`/`cron`
/// should be set for a well-formed schedule; if both are, cron wins.
#[derive(Debug, Clone, Default)]
pub struct ScheduleInput<'a> {
    pub interval_ms: Option<u64>,
    pub cron: Option<&'a str>,
    pub business_hours: Option<&'a str>,
    pub now: Option<DateTime<Utc>>,
}

/// Computes the next run time from a schedule description. Cron takes
/// precedence over a plain interval; if a business-hours window is given and
/// the computed time falls outside it, the result is advanced to the window's
/// next start.
pub fn calculate_next_run(input: &ScheduleInput<'_>) -> Result<Option<DateTime<Utc>>> {
    let now = input.now.unwrap_or_else(Utc::now);

    let base = if let Some(expr) = input.cron {
        let schedule = parse_cron(expr)?;
        next_cron_occurrence(&schedule, now)
    } else if let Some(ms) = input.interval_ms {
        Some(now + Duration::milliseconds(ms as i64))
    } else {
        None
    };

    let Some(candidate) = base else {
        return Ok(None);
    };

    match input.business_hours {
        Some(expr) => {
            let bh = parse_business_hours(expr)?;
            if bh.is_within(candidate) {
                Ok(Some(candidate))
            } else {
                Ok(bh.next_start(candidate - Duration::seconds(1)))
            }
        }
        None => Ok(Some(candidate)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().unwrap()
    }

    #[test]
    fn cron_takes_precedence_over_interval() {
        let input = ScheduleInput {
            interval_ms: Some(60_000),
            cron: Some("0 9 * * MON-FRI"),
            business_hours: None,
            now: Some(dt(2025, 6, 14, 12, 0)),
        };
        let next = calculate_next_run(&input).unwrap().unwrap();
        assert_eq!(next, dt(2025, 6, 16, 9, 0));
    }

    #[test]
    fn plain_interval_adds_milliseconds() {
        let input = ScheduleInput {
            interval_ms: Some(300_000),
            cron: None,
            business_hours: None,
            now: Some(dt(2025, 6, 14, 12, 0)),
        };
        let next = calculate_next_run(&input).unwrap().unwrap();
        assert_eq!(next, dt(2025, 6, 14, 12, 5));
    }

    #[test]
    fn interval_result_outside_business_hours_advances() {
        let input = ScheduleInput {
            interval_ms: Some(60_000),
            cron: None,
            business_hours: Some("9-17 MON-FRI"),
            now: Some(dt(2025, 6, 14, 20, 0)), // Saturday night
        };
        let next = calculate_next_run(&input).unwrap().unwrap();
        assert_eq!(next, dt(2025, 6, 16, 9, 0)); // next Monday 9am
    }

    #[test]
    fn no_schedule_fields_returns_none() {
        let input = ScheduleInput { now: Some(dt(2025, 6, 14, 12, 0)), ..Default::default() };
        assert_eq!(calculate_next_run(&input).unwrap(), None);
    }
}
