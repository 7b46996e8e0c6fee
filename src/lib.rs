/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Restore a DynamoDB export-to-S3 back into a live table.
//!
//! An export leaves a summary object, a manifest-list object and a set of
//! gzip-compressed DynamoDB-JSON data objects (shards) in S3. This crate
//! resolves the summary/manifest chain, waits for the target table to become
//! ACTIVE, then streams each shard through a pool of `BatchWriteItem`
//! workers with partition-key-aware batching, jittered retry backoff and
//! resubmission of unprocessed requests.

/* Automatically managed default lints */
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
/* End of automatically managed default lints */
#![warn(
    missing_debug_implementations,
    missing_docs,
    rustdoc::missing_crate_level_docs,
    unreachable_pub,
    rust_2018_idioms
)]

mod backoff;
pub mod config;
pub mod convert;
pub mod error;
pub mod export;
pub mod import;
pub mod manifest;
pub mod store;
pub mod table;

#[cfg(test)]
mod test_util;

pub use crate::config::{Config, RetryOptions, RunConfig};
pub use crate::error::{Error, ErrorAggregate};
pub use crate::import::Importer;
