/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Write workers: consume write groups off the shared queue and apply them
//! with BatchWriteItem, resubmitting unprocessed requests and retrying
//! throttles with jittered backoff.

use crate::backoff;
use crate::config::RetryOptions;
use crate::error::{Error, ErrorSink};
use crate::import::grouper::WriteGroup;
use crate::store::{TableStore, WriteError};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Pull groups off `groups` until the channel closes or the scope is
/// canceled.
///
/// Workers fail slow: a group that cannot be written is recorded in `errors`
/// and the worker moves on to the next one. Cancellation while waiting is
/// recorded once so the shard's failure reflects that work was abandoned.
pub(crate) async fn write_worker<T>(
    worker_id: usize,
    tables: Arc<T>,
    table: String,
    groups: async_channel::Receiver<WriteGroup>,
    retry: RetryOptions,
    errors: ErrorSink,
    cancel: CancellationToken,
) where
    T: TableStore + ?Sized,
{
    let mut rng = fastrand::Rng::new();
    loop {
        let group = tokio::select! {
            _ = cancel.cancelled() => {
                errors.push(Error::Worker {
                    worker: worker_id,
                    source: Box::new(Error::Canceled),
                });
                break;
            }
            group = groups.recv() => match group {
                Ok(group) => group,
                // Channel closed: the producer is done and the queue drained.
                Err(_) => break,
            },
        };
        // The grouper's drain may emit a final empty group.
        if group.is_empty() {
            continue;
        }
        if let Err(error) = write_group(&*tables, &table, group, &retry, &mut rng, &cancel).await {
            errors.push(Error::Worker {
                worker: worker_id,
                source: Box::new(error),
            });
        }
    }
}

/// Apply one group within the configured wall-clock budget.
pub(crate) async fn write_group<T>(
    tables: &T,
    table: &str,
    group: WriteGroup,
    retry: &RetryOptions,
    rng: &mut fastrand::Rng,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    T: TableStore + ?Sized,
{
    match tokio::time::timeout(retry.timeout, apply_group(tables, table, group, retry, rng, cancel))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(Error::WriteTimeout {
            timeout: retry.timeout,
        }),
    }
}

/// The retry loop proper.
///
/// Unprocessed requests and throttles both count against the same attempt
/// budget; any other call failure is fatal for the group immediately.
async fn apply_group<T>(
    tables: &T,
    table: &str,
    group: WriteGroup,
    retry: &RetryOptions,
    rng: &mut fastrand::Rng,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    T: TableStore + ?Sized,
{
    let mut remaining = group;
    let mut attempt = 0;
    loop {
        match tables.batch_write(table, remaining.clone()).await {
            Ok(unprocessed) if unprocessed.is_empty() => return Ok(()),
            Ok(unprocessed) => {
                tracing::debug!(
                    table,
                    unprocessed = unprocessed.len(),
                    attempt,
                    "resubmitting unprocessed write requests"
                );
                remaining = unprocessed;
            }
            Err(WriteError::ThroughputExceeded(_)) => {
                tracing::warn!(table, attempt, "batch write throttled");
            }
            Err(WriteError::Other(source)) => return Err(Error::BatchWrite(source)),
        }
        if backoff::exhausted(attempt, retry.max_attempts) {
            return Err(Error::RetriesExhausted {
                max_attempts: retry.max_attempts,
            });
        }
        let delay = backoff::jittered(rng, attempt, retry.back_off_base);
        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Canceled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
