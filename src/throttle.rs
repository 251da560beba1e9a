//! Turns a response's `throttle_time_ms` field into the retry loop's own
//! throttle signal.
//!
//! Every quota-bearing response carries this field; a non-zero value means
//! the broker already delayed replying and is asking the client to back off
//! before sending anything else. Callers fold this straight into their
//! `maybe_retry` loop via [`ErrorOrThrottle::Throttle`] so a throttled
//! response never needs an error variant of its own.

use std::time::Duration;

use tracing::warn;

use crate::backoff::ErrorOrThrottle;

/// Converts a response's `throttle_time_ms` into `Err(Throttle(_))`, or
/// `Ok(())` if there is nothing to wait out.
///
/// A negative value is a malformed response rather than a real request to
/// wait; it is logged and ignored instead of rejecting the whole call over
/// a field that plays no role in correctness.
pub fn maybe_throttle<E>(throttle_time_ms: Option<i32>) -> Result<(), ErrorOrThrottle<E>>
where
    E: Send,
{
    let Some(millis) = throttle_time_ms.filter(|&t| t != 0) else {
        return Ok(());
    };

    let Ok(millis) = u64::try_from(millis) else {
        warn!(throttle_time_ms = millis, "broker sent a negative throttle time, ignoring");
        return Ok(());
    };

    Err(ErrorOrThrottle::Throttle(Duration::from_millis(millis)))
}
