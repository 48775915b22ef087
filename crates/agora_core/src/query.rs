//! Boundary logging for repository queries.
//!
//! # Responsibility
//! - Wrap each repository operation with start/ok/error log lines.
//!
//! # Invariants
//! - The wrapped result is returned unchanged; failures are never replaced
//!   by empty values.
//! - Params are logged with `Debug`; callers pass ids and flags only, never
//!   document bodies.

use log::{debug, error};
use std::fmt::{Debug, Display};
use std::time::Instant;

/// Runs `op` as the query `name`, logging its outcome and duration.
pub fn traced<T, E, P, F>(name: &str, params: P, op: F) -> Result<T, E>
where
    E: Display,
    P: Debug,
    F: FnOnce() -> Result<T, E>,
{
    let started_at = Instant::now();
    debug!("event=query module=repo status=start query={name} params={params:?}");

    let result = op();
    let duration_ms = started_at.elapsed().as_millis();
    match &result {
        Ok(_) => debug!("event=query module=repo status=ok query={name} duration_ms={duration_ms}"),
        Err(err) => error!(
            "event=query module=repo status=error query={name} duration_ms={duration_ms} params={params:?} error={err}"
        ),
    }
    result
}
