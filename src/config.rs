/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Run configuration and retry tuning.

use crate::error::{Error, ErrorAggregate};
use std::time::Duration;

/// Largest usable write concurrency. BatchWriteItem accepts at most 25
/// requests per call, so more workers than that cannot be kept busy by a
/// single full queue slot each.
pub const MAX_CONCURRENCY: usize = 25;

/// Concurrency used when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 25;

/// Unvalidated run settings, fed from flags and environment variables.
///
/// Setters take `Option`s so that absent flags leave earlier values (or
/// nothing) in place; [`Config::validate`] turns the result into a
/// [`RunConfig`], collecting every problem rather than stopping at the first.
#[derive(Debug, Clone, Default)]
pub struct Config {
    manifest_bucket: Option<String>,
    manifest_key: Option<String>,
    table_name: Option<String>,
    concurrency: Option<usize>,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the S3 bucket holding the export, when present.
    pub fn manifest_bucket(mut self, bucket: Option<String>) -> Self {
        if bucket.is_some() {
            self.manifest_bucket = bucket;
        }
        self
    }

    /// Set the S3 key of the export summary file, when present.
    pub fn manifest_key(mut self, key: Option<String>) -> Self {
        if key.is_some() {
            self.manifest_key = key;
        }
        self
    }

    /// Set the name of the table to restore into, when present.
    pub fn table_name(mut self, table: Option<String>) -> Self {
        if table.is_some() {
            self.table_name = table;
        }
        self
    }

    /// Set the maximum number of concurrent BatchWriteItem workers, when
    /// present.
    pub fn concurrency(mut self, concurrency: Option<usize>) -> Self {
        if concurrency.is_some() {
            self.concurrency = concurrency;
        }
        self
    }

    /// Validate into a [`RunConfig`], reporting all problems together.
    pub fn validate(self) -> Result<RunConfig, ErrorAggregate> {
        let mut errors = ErrorAggregate::new();
        if self.manifest_bucket.is_none() {
            errors.push(Error::Config(
                "the bucket name of the manifest file on S3 is required, but not set".into(),
            ));
        }
        if self.manifest_key.is_none() {
            errors.push(Error::Config(
                "the key name of the manifest file on S3 is required, but not set".into(),
            ));
        }
        if self.table_name.is_none() {
            errors.push(Error::Config(
                "the name of the DynamoDB table to import data into is required, but not set"
                    .into(),
            ));
        }
        let concurrency = self.concurrency.unwrap_or_else(|| {
            tracing::debug!("concurrency is not specified, defaulting to {DEFAULT_CONCURRENCY}");
            DEFAULT_CONCURRENCY
        });
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            errors.push(Error::Config(format!(
                "concurrency (c) needs to satisfy 1 <= c <= {MAX_CONCURRENCY}, but was {concurrency}"
            )));
        }
        errors.into_result()?;
        Ok(RunConfig {
            manifest_bucket: self.manifest_bucket.expect("validated above"),
            manifest_key: self.manifest_key.expect("validated above"),
            table_name: self.table_name.expect("validated above"),
            concurrency,
        })
    }
}

/// Validated settings for one restore run. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// S3 bucket holding the summary, manifest list and data objects.
    pub manifest_bucket: String,
    /// S3 key of the export summary object.
    pub manifest_key: String,
    /// Name of the target table.
    pub table_name: String,
    /// Number of write workers, which is also the write-queue capacity.
    pub concurrency: usize,
}

/// Retry behavior of individual `dynamodb:BatchWriteItem` groups.
///
/// The delay before attempt `n` is sampled uniformly from
/// `[0, back_off_base * 2^n)`. A group stops retrying at whichever of
/// `max_attempts` and `timeout` trips first.
#[derive(Debug, Clone)]
pub struct RetryOptions {
    /// Base component of the backoff duration, in the formula above.
    pub back_off_base: Duration,
    /// Attempt budget for one write group.
    pub max_attempts: u32,
    /// Wall-clock budget for one write group, retries included.
    pub timeout: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            back_off_base: Duration::from_millis(100),
            max_attempts: 8,
            timeout: Duration::from_secs(60),
        }
    }
}

impl RetryOptions {
    /// Override the backoff base.
    pub fn back_off_base(mut self, base: Duration) -> Self {
        self.back_off_base = base;
        self
    }

    /// Override the attempt budget.
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Override the per-group timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
