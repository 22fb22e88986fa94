use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Longest single timer the loops arm: `i32::MAX` milliseconds, about 24.8 days.
pub const MAX_TIMER_DELAY: Duration = Duration::from_millis(i32::MAX as u64);

/// Sleep for `delay` in chunks of at most `max_chunk`, full chunks first and
/// the remainder last.
///
/// Returns `false` as soon as `cancel` fires.
pub async fn sleep_chunked(delay: Duration, max_chunk: Duration, cancel: &CancellationToken) -> bool {
    let max_chunk = if max_chunk.is_zero() {
        MAX_TIMER_DELAY
    } else {
        max_chunk
    };

    let mut remaining = delay;
    while !remaining.is_zero() {
        let chunk = remaining.min(max_chunk);
        tokio::select! {
            _ = cancel.cancelled() => return false,
            _ = tokio::time::sleep(chunk) => {}
        }
        remaining -= chunk;
    }
    !cancel.is_cancelled()
}
