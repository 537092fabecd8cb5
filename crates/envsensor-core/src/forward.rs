//! Forwarding of stored rows to a time-series sink.
//!
//! Rows are forwarded in store-id order, one batch at a time. The forward
//! checkpoint moves past a batch only once the sink has accepted all of it,
//! so a failed run resends from the first unacknowledged row.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{ForwardCheckpoint, Point};
use crate::retry::{RetryConfig, with_retry};
use crate::traits::{LogStore, Sink};

/// Rows per sink write unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct ForwardOptions {
    pub batch_size: usize,
    pub retry: RetryConfig,
}

impl Default for ForwardOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry: RetryConfig::for_sink(),
        }
    }
}

impl ForwardOptions {
    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

/// Totals of one forwarding run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForwardResult {
    pub batches: usize,
    pub points: usize,
    /// Checkpoint after the last accepted batch, if any batch was sent.
    pub checkpoint: Option<ForwardCheckpoint>,
}

/// Pushes rows the sink has not acknowledged yet.
pub struct ForwardSyncEngine<'a, S: LogStore + ?Sized, K: Sink + ?Sized> {
    store: &'a mut S,
    sink: &'a K,
    options: ForwardOptions,
}

impl<'a, S: LogStore + ?Sized, K: Sink + ?Sized> ForwardSyncEngine<'a, S, K> {
    pub fn new(store: &'a mut S, sink: &'a K, options: ForwardOptions) -> Self {
        Self {
            store,
            sink,
            options,
        }
    }

    /// Forward until the store has nothing newer than the checkpoint.
    ///
    /// # Errors
    ///
    /// Stops at the first batch the sink rejects after retries. Batches
    /// accepted before it stay checkpointed.
    pub async fn run(&mut self) -> Result<ForwardResult> {
        if self.options.batch_size == 0 {
            return Err(Error::invalid_config("forward batch size must be positive"));
        }

        let mut cursor = self
            .store
            .forward_checkpoint()?
            .map(|cp| cp.last_row_id)
            .unwrap_or(0);
        let mut result = ForwardResult::default();

        loop {
            let rows = self.store.rows_after(cursor, self.options.batch_size)?;
            let Some(last) = rows.last() else {
                break;
            };
            let checkpoint = ForwardCheckpoint {
                last_row_id: last.id,
                timestamp: last.timestamp,
            };
            let points: Vec<Point> = rows.iter().map(Point::from_row).collect();

            let sink = self.sink;
            with_retry(&self.options.retry, "sink write", || {
                sink.write_batch(&points)
            })
            .await?;

            self.store.set_forward_checkpoint(&checkpoint)?;
            debug!(
                last_row_id = checkpoint.last_row_id,
                points = points.len(),
                "batch forwarded"
            );
            cursor = checkpoint.last_row_id;
            result.batches += 1;
            result.points += points.len();
            result.checkpoint = Some(checkpoint);

            if rows.len() < self.options.batch_size {
                break;
            }
        }

        info!(
            batches = result.batches,
            points = result.points,
            "forwarding complete"
        );
        Ok(result)
    }
}

/// Forward everything new with the given options.
pub async fn forward_rows<S, K>(
    store: &mut S,
    sink: &K,
    options: ForwardOptions,
) -> Result<ForwardResult>
where
    S: LogStore + ?Sized,
    K: Sink + ?Sized,
{
    ForwardSyncEngine::new(store, sink, options).run().await
}
