use chrono::{DateTime, Utc};
use croner::Cron;

use crate::error::{Result, SchedulerError};

/// A parsed cron expression.
///
/// Standard 5-field syntax (`min hour dom month dow`); a leading seconds
/// field is accepted when present.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    cron: Cron,
}

impl CronSchedule {
    pub fn parse(expression: &str) -> Result<Self> {
        let cron = Cron::new(expression)
            .with_seconds_optional()
            .parse()
            .map_err(|e| SchedulerError::ScheduleParseFailed {
                expression: expression.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            expression: expression.to_string(),
            cron,
        })
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// First occurrence strictly after `from`.
    pub fn next_after(&self, from: DateTime<Utc>) -> Result<DateTime<Utc>> {
        self.cron
            .find_next_occurrence(&from, false)
            .map_err(|_| SchedulerError::NoNextOccurrence {
                expression: self.expression.clone(),
            })
    }
}

/// Render a delay as `<d>d <h>h <m>m <s>s`. Negative delays render as zero.
pub fn format_delay(delay: chrono::Duration) -> String {
    let total = delay.num_seconds().max(0);
    let (days, rest) = (total / 86_400, total % 86_400);
    let (hours, rest) = (rest / 3_600, rest % 3_600);
    let (minutes, seconds) = (rest / 60, rest % 60);
    format!("{days}d {hours}h {minutes}m {seconds}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn quarterly_default_fires_on_the_first_at_midnight() {
        let schedule = CronSchedule::parse("0 0 1 */3 *").unwrap();
        let next = schedule.next_after(at(2026, 2, 15, 12, 0, 0)).unwrap();
        assert_eq!(next, at(2026, 4, 1, 0, 0, 0));
    }

    #[test]
    fn next_is_strictly_after_from() {
        let schedule = CronSchedule::parse("30 * * * *").unwrap();
        let from = at(2026, 5, 5, 10, 30, 0);
        assert_eq!(schedule.next_after(from).unwrap(), at(2026, 5, 5, 11, 30, 0));
    }

    #[test]
    fn seconds_field_is_optional() {
        let schedule = CronSchedule::parse("*/10 * * * * *").unwrap();
        let next = schedule.next_after(at(2026, 1, 1, 0, 0, 3)).unwrap();
        assert_eq!(next, at(2026, 1, 1, 0, 0, 10));
    }

    #[test]
    fn garbage_is_a_parse_failure() {
        let err = CronSchedule::parse("every tuesday").unwrap_err();
        assert!(matches!(err, SchedulerError::ScheduleParseFailed { .. }));
        assert!(CronSchedule::parse("61 * * * *").is_err());
    }

    #[test]
    fn format_delay_splits_units() {
        let delay = chrono::Duration::seconds(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5);
        assert_eq!(format_delay(delay), "2d 3h 4m 5s");
        assert_eq!(format_delay(chrono::Duration::seconds(59)), "0d 0h 0m 59s");
        assert_eq!(format_delay(chrono::Duration::seconds(-5)), "0d 0h 0m 0s");
    }
}
