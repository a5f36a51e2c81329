//! Retry on transient SQLite lock contention
//!
//! A deferred transaction that read an older snapshot cannot upgrade to a
//! writer once another connection has committed; SQLite reports
//! `SQLITE_BUSY` immediately instead of waiting on the busy timeout. The
//! whole unit of work is retried with exponential backoff.

use crate::error::SubmissionError;
use sightid_common::Error;
use std::future::Future;
use std::time::{Duration, Instant};

/// SQLite primary result codes for busy/locked
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

/// Errors that may signal lock contention
pub trait LockContention {
    fn is_lock_error(&self) -> bool;
}

impl LockContention for Error {
    fn is_lock_error(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => {
                let primary = db_err
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
                    || db_err.message().contains("database is locked")
            }
            _ => false,
        }
    }
}

impl LockContention for SubmissionError {
    fn is_lock_error(&self) -> bool {
        match self {
            SubmissionError::Persistence(err) => err.is_lock_error(),
            _ => false,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-lock error, or
/// `max_wait_ms` has elapsed
///
/// Backoff starts at 10 ms and doubles up to 1 s.
pub async fn retry_on_lock<F, Fut, T, E>(operation_name: &str, max_wait_ms: u64, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: LockContention + From<Error>,
{
    let start_time = Instant::now();
    let max_duration = Duration::from_millis(max_wait_ms);
    let mut attempt = 0u32;
    let mut backoff_ms = 10u64;

    loop {
        attempt += 1;

        let err = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        elapsed_ms = start_time.elapsed().as_millis(),
                        "Database operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => err,
        };

        if !err.is_lock_error() {
            return Err(err);
        }

        let elapsed = start_time.elapsed();
        if elapsed >= max_duration {
            tracing::error!(
                operation = operation_name,
                attempt,
                elapsed_ms = elapsed.as_millis(),
                max_wait_ms,
                "Database operation failed: max retry time exceeded"
            );
            return Err(E::from(Error::Internal(format!(
                "Database locked after {} attempts ({} ms elapsed, max {} ms)",
                attempt,
                elapsed.as_millis(),
                max_wait_ms
            ))));
        }

        tracing::warn!(
            operation = operation_name,
            attempt,
            backoff_ms,
            "Database locked, will retry after backoff"
        );
        tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
        backoff_ms = (backoff_ms * 2).min(1000);
    }
}
