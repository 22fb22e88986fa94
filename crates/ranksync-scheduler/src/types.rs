use chrono::{DateTime, Utc};
use ranksync_core::CronSetting;

use crate::schedule::format_delay;

/// A configured job. `index` is its position in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronJob {
    pub index: usize,
    pub expression: String,
    /// Console command line run on every fire.
    pub command: String,
}

impl CronJob {
    pub fn from_settings(settings: &[CronSetting]) -> Vec<Self> {
        settings
            .iter()
            .enumerate()
            .map(|(index, s)| CronJob {
                index,
                expression: s.expression.trim().to_string(),
                command: s.command.trim().to_string(),
            })
            .collect()
    }
}

/// Handed to the dispatcher each time a job fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiredCommand {
    pub job: usize,
    pub command: String,
    pub fired_at: DateTime<Utc>,
}

/// One line of `cron-list` output.
#[derive(Debug, Clone)]
pub struct CronJobStatus {
    pub job: CronJob,
    /// Next fire time, or why there is none.
    pub next_fire: Result<DateTime<Utc>, String>,
    /// Time left until `next_fire` when it was computed.
    pub delay: Option<chrono::Duration>,
}

impl std::fmt::Display for CronJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] `{}` -> {}: ",
            self.job.index, self.job.expression, self.job.command
        )?;
        match (&self.next_fire, self.delay) {
            (Ok(next), Some(delay)) => write!(
                f,
                "next run {} (in {})",
                next.format("%Y-%m-%d %H:%M:%S UTC"),
                format_delay(delay)
            ),
            (Ok(next), None) => write!(f, "next run {}", next.format("%Y-%m-%d %H:%M:%S UTC")),
            (Err(reason), _) => write!(f, "disabled ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn jobs_are_indexed_in_configuration_order() {
        let jobs = CronJob::from_settings(&[
            CronSetting {
                expression: " 0 0 1 */3 * ".into(),
                command: "reset-ranks exp".into(),
            },
            CronSetting {
                expression: "0 4 * * *".into(),
                command: "clear-rank-if-banned".into(),
            },
        ]);
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].index, 0);
        assert_eq!(jobs[0].expression, "0 0 1 */3 *");
        assert_eq!(jobs[1].index, 1);
        assert_eq!(jobs[1].command, "clear-rank-if-banned");
    }

    #[test]
    fn status_line_shows_next_run_and_delay() {
        let status = CronJobStatus {
            job: CronJob {
                index: 0,
                expression: "0 0 1 */3 *".into(),
                command: "reset-ranks exp".into(),
            },
            next_fire: Ok(Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap()),
            delay: Some(chrono::Duration::seconds(90_061)),
        };
        assert_eq!(
            status.to_string(),
            "[0] `0 0 1 */3 *` -> reset-ranks exp: next run 2026-04-01 00:00:00 UTC (in 1d 1h 1m 1s)"
        );
    }

    #[test]
    fn status_line_shows_parse_error() {
        let status = CronJobStatus {
            job: CronJob {
                index: 3,
                expression: "bogus".into(),
                command: "cron-list".into(),
            },
            next_fire: Err("bad expression".into()),
            delay: None,
        };
        assert_eq!(
            status.to_string(),
            "[3] `bogus` -> cron-list: disabled (bad expression)"
        );
    }
}
