/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! The restore pipeline.
//!
//! One shard at a time: a blocking producer streams the shard's gzip NDJSON
//! object into write groups and feeds them through a bounded queue to a pool
//! of write workers. The queue's capacity equals the worker count, so at most
//! `concurrency` groups are in flight or waiting at any moment and the
//! producer backpressures against slow writes instead of buffering the shard
//! in memory.

mod grouper;
mod worker;

use crate::config::{RetryOptions, RunConfig};
use crate::error::{Error, ErrorAggregate, ErrorSink};
use crate::export::ExportRecord;
use crate::import::grouper::{BatchGrouper, WriteGroup};
use crate::manifest;
use crate::store::{ObjectStore, TableStore};
use crate::table;
use aws_smithy_types::byte_stream::ByteStream;
use flate2::read::MultiGzDecoder;
use std::io::{BufRead, BufReader};
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::io::SyncIoBridge;
use tokio_util::sync::CancellationToken;

/// Restores one export into one table.
#[derive(Debug)]
pub struct Importer<B, T>
where
    B: ObjectStore,
    T: TableStore,
{
    blobs: B,
    tables: Arc<T>,
    config: RunConfig,
    retry: RetryOptions,
}

impl<B, T> Importer<B, T>
where
    B: ObjectStore,
    T: TableStore,
{
    /// Build an importer over the given stores with default retry behavior.
    pub fn new(config: RunConfig, blobs: B, tables: T) -> Self {
        Self {
            blobs,
            tables: Arc::new(tables),
            config,
            retry: RetryOptions::default(),
        }
    }

    /// Override the write retry behavior.
    pub fn retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }

    /// Run the restore to completion.
    ///
    /// Shards are imported sequentially and a failing shard does not stop the
    /// ones after it: each failed shard contributes exactly one
    /// [`Error::Shard`] to the returned aggregate, wrapping everything that
    /// went wrong inside it.
    pub async fn run(&self) -> Result<(), ErrorAggregate> {
        let hash_key = table::wait_for_table(
            &*self.tables,
            &self.config.table_name,
            table::DEFAULT_PROBE_ATTEMPTS,
        )
        .await?;

        let bucket = &self.config.manifest_bucket;
        let summary =
            manifest::load_summary(&self.blobs, bucket, &self.config.manifest_key).await?;
        let shards =
            manifest::load_shard_manifests(&self.blobs, bucket, &summary.manifest_files_s3_key)
                .await?;
        tracing::info!(
            table = %self.config.table_name,
            shards = shards.len(),
            concurrency = self.config.concurrency,
            "starting restore"
        );

        let mut run_errors = ErrorAggregate::new();
        for shard in &shards {
            tracing::info!(
                key = %shard.data_file_s3_key,
                item_count = shard.item_count,
                "importing shard"
            );
            if let Err(errors) = self
                .import_shard(&hash_key, &shard.data_file_s3_key)
                .await
            {
                run_errors.push(Error::Shard {
                    bucket: bucket.clone(),
                    key: shard.data_file_s3_key.clone(),
                    source: Box::new(errors),
                });
            }
        }
        run_errors.into_result()
    }

    /// Import one shard: spawn the worker pool, stream the data object into
    /// groups, and wait for everything to settle.
    async fn import_shard(&self, hash_key: &str, key: &str) -> Result<(), ErrorAggregate> {
        let bucket = self.config.manifest_bucket.clone();
        let cancel = CancellationToken::new();
        let (tx, rx) = async_channel::bounded::<WriteGroup>(self.config.concurrency);
        let errors = ErrorSink::default();

        let mut workers = JoinSet::new();
        for worker_id in 0..self.config.concurrency {
            workers.spawn(worker::write_worker(
                worker_id,
                Arc::clone(&self.tables),
                self.config.table_name.clone(),
                rx.clone(),
                self.retry.clone(),
                errors.clone(),
                cancel.clone(),
            ));
        }
        drop(rx);

        match self.blobs.get_object(&bucket, key).await {
            Ok(body) => {
                let grouper = BatchGrouper::new(hash_key, fastrand::Rng::new());
                let producer_tx = tx.clone();
                let producer_bucket = bucket.clone();
                let producer_key = key.to_string();
                let produced = tokio::task::spawn_blocking(move || {
                    produce_groups(body, grouper, producer_tx, &producer_bucket, &producer_key)
                })
                .await;
                match produced {
                    Ok(Ok(())) => {
                        tx.close();
                    }
                    Ok(Err(error)) => {
                        // Abort in-flight retries; whatever was already
                        // queued or written stays written.
                        cancel.cancel();
                        tx.close();
                        errors.push(error);
                    }
                    Err(join_error) => std::panic::resume_unwind(join_error.into_panic()),
                }
            }
            Err(error) => {
                // Nothing was produced, so the workers just drain out.
                tx.close();
                errors.push(error);
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(join_error) = joined {
                if join_error.is_panic() {
                    std::panic::resume_unwind(join_error.into_panic());
                }
            }
        }
        errors.drain().into_result()
    }
}

/// Blocking producer: decompress, decode and group the shard's item stream.
///
/// Runs on a blocking thread; the bridge back into the async byte stream and
/// the blocking channel send both park this thread rather than an executor
/// worker. A send failure means every receiver is gone, which only happens
/// after cancellation.
fn produce_groups(
    body: ByteStream,
    mut grouper: BatchGrouper,
    tx: async_channel::Sender<WriteGroup>,
    bucket: &str,
    key: &str,
) -> Result<(), Error> {
    let decoder = MultiGzDecoder::new(SyncIoBridge::new(body.into_async_read()));
    let reader = BufReader::new(decoder);
    for line in reader.lines() {
        let line = line.map_err(|source| Error::ShardRead {
            bucket: bucket.to_string(),
            key: key.to_string(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ExportRecord = serde_json::from_str(&line).map_err(Error::ItemDecode)?;
        if let Some(group) = grouper.push(&record)? {
            tx.send_blocking(group).map_err(|_| Error::Canceled)?;
        }
    }
    for group in grouper.finish() {
        tx.send_blocking(group).map_err(|_| Error::Canceled)?;
    }
    Ok(())
}
