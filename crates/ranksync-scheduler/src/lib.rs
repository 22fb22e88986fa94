//! `ranksync-scheduler` — cron-driven console commands.
//!
//! # Overview
//!
//! Each configured `(expression, command)` pair gets its own tokio task. A
//! task computes the next occurrence, sleeps until it (splitting waits longer
//! than [`sleep::MAX_TIMER_DELAY`]), then sends a [`FiredCommand`] to the
//! dispatcher channel. All tasks share one cancellation token.

pub mod clock;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod sleep;
pub mod types;

pub use clock::{Clock, SystemClock, TokioClock};
pub use engine::{CronService, SchedulerOptions, SETTLE_DELAY};
pub use error::{Result, SchedulerError};
pub use schedule::{format_delay, CronSchedule};
pub use types::{CronJob, CronJobStatus, FiredCommand};
