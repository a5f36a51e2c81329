//! Instrumented transactions
//!
//! [`TransactionContext`] is the explicit per-request unit of work: it owns
//! one SQLite transaction, carries the submission's `request_id`, and logs
//! how long the connection waited in the pool and how long it was held.

use sightid_common::{Error, Result};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::time::Instant;
use uuid::Uuid;

const SLOW_ACQUIRE_MS: u128 = 1000;
const LONG_HOLD_MS: u128 = 2000;

/// Logs the connection hold time once, on commit, rollback or drop
struct HoldTimer {
    caller: &'static str,
    request_id: Uuid,
    acquired_at: Instant,
    released: bool,
}

impl HoldTimer {
    fn release(&mut self, how: &'static str) {
        self.released = true;
        let held_ms = self.acquired_at.elapsed().as_millis();

        if held_ms > LONG_HOLD_MS {
            tracing::warn!(
                caller = self.caller,
                request_id = %self.request_id,
                held_ms = held_ms,
                how = how,
                "Long transaction; connection held for an extended period"
            );
        } else {
            tracing::debug!(
                caller = self.caller,
                request_id = %self.request_id,
                held_ms = held_ms,
                how = how,
                "Connection released"
            );
        }
    }
}

impl Drop for HoldTimer {
    fn drop(&mut self) {
        if !self.released {
            self.release("drop");
        }
    }
}

/// One transaction scoped to one request
///
/// Dropping the context without committing rolls the transaction back.
pub struct TransactionContext {
    tx: Transaction<'static, Sqlite>,
    timer: HoldTimer,
}

impl TransactionContext {
    /// Begin a transaction on `pool` for the given request
    pub async fn begin(pool: &SqlitePool, caller: &'static str, request_id: Uuid) -> Result<Self> {
        let start = Instant::now();
        tracing::debug!(caller = caller, request_id = %request_id, "Connection acquisition requested");

        let tx = pool.begin().await.map_err(Error::Database)?;

        let wait_ms = start.elapsed().as_millis();
        if wait_ms > SLOW_ACQUIRE_MS {
            tracing::warn!(
                caller = caller,
                request_id = %request_id,
                wait_ms = wait_ms,
                "Slow connection acquisition; pool may be saturated"
            );
        } else {
            tracing::debug!(caller = caller, request_id = %request_id, wait_ms = wait_ms, "Connection acquired");
        }

        Ok(Self {
            tx,
            timer: HoldTimer {
                caller,
                request_id,
                acquired_at: Instant::now(),
                released: false,
            },
        })
    }

    /// Request this transaction belongs to
    pub fn request_id(&self) -> Uuid {
        self.timer.request_id
    }

    /// Connection to run queries on
    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut *self.tx
    }

    pub async fn commit(self) -> Result<()> {
        let TransactionContext { tx, mut timer } = self;
        let result = tx.commit().await.map_err(Error::Database);
        timer.release("commit");
        result
    }

    pub async fn rollback(self) -> Result<()> {
        let TransactionContext { tx, mut timer } = self;
        let result = tx.rollback().await.map_err(Error::Database);
        timer.release("rollback");
        result
    }
}
