/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Error types emitted while restoring an export.
//!
//! Failures are aggregated, not short-circuited: a worker appends its errors
//! to a shared [`ErrorSink`] and keeps out of the way of the other workers,
//! and the orchestrator combines per-shard aggregates into the final
//! [`ErrorAggregate`] returned from the run.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Unspecialized boxed error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced while restoring an export into a table.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The run configuration was rejected before any I/O was attempted.
    #[error("{0}")]
    Config(String),

    /// An object could not be fetched from the blob store.
    #[error("failed to fetch s3://{bucket}/{key}")]
    ObjectFetch {
        /// Bucket the fetch targeted.
        bucket: String,
        /// Key the fetch targeted.
        key: String,
        /// Underlying store error.
        #[source]
        source: BoxError,
    },

    /// The export summary object did not decode as JSON.
    #[error("failed to decode JSON in the summary file")]
    SummaryDecode(#[source] serde_json::Error),

    /// The export summary decoded but is not usable.
    #[error("the summary file is invalid: {reason}")]
    SummaryInvalid {
        /// Why the summary was rejected.
        reason: String,
    },

    /// A record of the manifest-list object did not decode.
    #[error("failed to decode JSON in the manifest file")]
    ManifestDecode(#[source] serde_json::Error),

    /// DescribeTable itself failed. A missing or misnamed table is a
    /// configuration problem, not a transient one, so this is never retried.
    #[error("failed to find the DynamoDB table: {table}")]
    TableLookup {
        /// The table that was described.
        table: String,
        /// Underlying call error.
        #[source]
        source: BoxError,
    },

    /// The table exists but never reported ACTIVE within the attempt budget.
    #[error("the table status did not become ACTIVE after {attempts} attempts")]
    TableNeverActive {
        /// The exhausted attempt budget.
        attempts: u32,
    },

    /// The key schema has no HASH element.
    #[error("failed to get the hash key of the table: {table}")]
    MissingPartitionKey {
        /// The table whose schema was scanned.
        table: String,
    },

    /// Reading or decompressing a shard's data object failed.
    #[error("failed to read the data file s3://{bucket}/{key}")]
    ShardRead {
        /// Bucket of the data object.
        bucket: String,
        /// Key of the data object.
        key: String,
        /// Underlying read error.
        #[source]
        source: std::io::Error,
    },

    /// A line of a data object did not decode as a DynamoDB-JSON item.
    #[error("failed to parse a line of the data file as a DynamoDB item")]
    ItemDecode(#[source] serde_json::Error),

    /// An item is missing the table's hash key attribute.
    #[error("the hash key attribute `{attribute}` is missing from an item")]
    MissingKeyAttribute {
        /// The hash key attribute name.
        attribute: String,
    },

    /// The hash key value of an item is not a scalar type.
    #[error("hash key values must be scalar (NULL, BOOL, B, N or S), found {found}")]
    NonScalarKey {
        /// Type tag of the offending value.
        found: &'static str,
    },

    /// A binary attribute value was not valid base64.
    #[error("failed to decode a base64 binary value")]
    InvalidBinary(#[source] base64::DecodeError),

    /// BatchWriteItem failed with a non-retryable error.
    #[error("the API call of dynamodb:BatchWriteItem returned an error")]
    BatchWrite(#[source] BoxError),

    /// A write group was still incomplete when the retry budget ran out.
    #[error("retry attempts reached the maximum value: {max_attempts}")]
    RetriesExhausted {
        /// The exhausted attempt budget.
        max_attempts: u32,
    },

    /// A write group (including its retries) outlived the configured timeout.
    #[error("a write group did not complete within {timeout:?}")]
    WriteTimeout {
        /// The configured per-group timeout.
        timeout: Duration,
    },

    /// The shard scope was canceled while this worker was waiting for work.
    #[error("canceled while waiting for write groups")]
    Canceled,

    /// A worker-level failure, tagged with the worker that hit it.
    #[error("worker {worker} failed")]
    Worker {
        /// Index of the failing worker.
        worker: usize,
        /// The failure itself.
        #[source]
        source: Box<Error>,
    },

    /// Everything that went wrong while importing one shard.
    #[error("failed to import the data file s3://{bucket}/{key}")]
    Shard {
        /// Bucket of the shard's data object.
        bucket: String,
        /// Key of the shard's data object.
        key: String,
        /// The shard's combined failures.
        #[source]
        source: Box<ErrorAggregate>,
    },
}

/// An ordered collection of [`Error`]s treated as a single failure.
///
/// A run that finishes with an empty aggregate is a success even if
/// individual writes were retried along the way.
#[derive(Debug, Default)]
pub struct ErrorAggregate {
    errors: Vec<Error>,
}

impl ErrorAggregate {
    /// Create an empty aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one error.
    pub fn push(&mut self, error: Error) {
        self.errors.push(error);
    }

    /// True when nothing failed.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Number of collected errors.
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// The collected errors, in the order they were recorded.
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// `Ok(())` when empty, otherwise the aggregate itself.
    pub fn into_result(self) -> Result<(), ErrorAggregate> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl From<Error> for ErrorAggregate {
    fn from(error: Error) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl fmt::Display for ErrorAggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.errors.len() {
            0 => write!(f, "no errors"),
            1 => write!(f, "{}", ChainDisplay(&self.errors[0])),
            n => {
                write!(f, "{n} errors occurred:")?;
                for error in &self.errors {
                    write!(f, "\n  - {}", ChainDisplay(error))?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ErrorAggregate {}

/// Thread-safe append-only error collector shared by the write workers.
///
/// Workers fail slow: an error is recorded here and the worker moves on to
/// the next group rather than tearing the pool down.
#[derive(Clone, Debug, Default)]
pub(crate) struct ErrorSink {
    inner: Arc<Mutex<Vec<Error>>>,
}

impl ErrorSink {
    /// Record one error, logging it as it occurs.
    pub(crate) fn push(&self, error: Error) {
        tracing::error!(error = %ChainDisplay(&error), "import error");
        self.inner.lock().expect("error sink poisoned").push(error);
    }

    /// Take everything recorded so far.
    pub(crate) fn drain(&self) -> ErrorAggregate {
        let mut errors = ErrorAggregate::new();
        for error in self.inner.lock().expect("error sink poisoned").drain(..) {
            errors.push(error);
        }
        errors
    }
}

/// Renders an error and its source chain on one line.
struct ChainDisplay<'a>(&'a Error);

impl fmt::Display for ChainDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = std::error::Error::source(self.0);
        while let Some(cause) = source {
            write!(f, ": {cause}")?;
            source = cause.source();
        }
        Ok(())
    }
}
