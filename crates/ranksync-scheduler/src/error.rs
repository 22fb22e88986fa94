use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The cron expression could not be parsed.
    #[error("Invalid cron expression `{expression}`: {reason}")]
    ScheduleParseFailed { expression: String, reason: String },

    /// The expression is valid but never fires again after the given instant.
    #[error("Cron expression `{expression}` has no next occurrence")]
    NoNextOccurrence { expression: String },
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
