//! Interval string parsing (spec §4.9): `30s | 5m | 2h | 1d`, fractional
//! (`1.5h`), or a bare number interpreted as minutes. Returns milliseconds.

use crate::error::{Result, SchedulerError};

pub fn parse_interval(s: &str) -> Result<u64> {
    let s = s.trim();
    if s.is_empty() {
        return Err(SchedulerError::InvalidInterval(s.to_string()));
    }

    if let Ok(n) = s.parse::<f64>() {
        return to_millis(n, 60_000.0, s);
    }

    let (num_part, unit) = s.split_at(s.len() - 1);
    let n: f64 = num_part.parse().map_err(|_| SchedulerError::InvalidInterval(s.to_string()))?;
    let ms_per_unit = match unit {
        "s" => 1_000.0,
        "m" => 60_000.0,
        "h" => 3_600_000.0,
        "d" => 86_400_000.0,
        _ => return Err(SchedulerError::InvalidInterval(s.to_string())),
    };
    to_millis(n, ms_per_unit, s)
}

fn to_millis(n: f64, ms_per_unit: f64, original: &str) -> Result<u64> {
    if n < 0.0 || !n.is_finite() {
        return Err(SchedulerError::InvalidInterval(original.to_string()));
    }
    Ok((n * ms_per_unit).round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seconds_minutes_hours_days() {
        assert_eq!(parse_interval("30s").unwrap(), 30_000);
        assert_eq!(parse_interval("5m").unwrap(), 300_000);
        assert_eq!(parse_interval("2h").unwrap(), 7_200_000);
        assert_eq!(parse_interval("1d").unwrap(), 86_400_000);
    }

    #[test]
    fn parses_fractional_unit() {
        assert_eq!(parse_interval("1.5h").unwrap(), 5_400_000);
    }

    #[test]
    fn bare_number_is_minutes() {
        assert_eq!(parse_interval("10").unwrap(), 600_000);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_interval("five minutes").is_err());
        assert!(parse_interval("-5m").is_err());
    }
}
