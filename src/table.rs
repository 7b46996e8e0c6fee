/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Target-table readiness probing.
//!
//! A freshly created (or restored-over) table spends a while in `CREATING`;
//! the probe polls DescribeTable with deterministic exponential delays until
//! the table is `ACTIVE`, then pulls the hash key name out of the key schema.

use crate::backoff;
use crate::error::Error;
use crate::store::TableStore;
use aws_sdk_dynamodb::types::{KeyType, TableStatus};

/// Poll budget for table readiness (about 254s of waiting at most).
pub const DEFAULT_PROBE_ATTEMPTS: u32 = 8;

/// Wait until `table` is ACTIVE and return its hash key attribute name.
///
/// A DescribeTable error fails immediately: a missing or misnamed table is a
/// configuration problem that more polling will not fix. A table that never
/// reaches ACTIVE within `max_attempts` polls fails with
/// [`Error::TableNeverActive`]; a key schema without a HASH element fails
/// with [`Error::MissingPartitionKey`].
pub async fn wait_for_table<T>(tables: &T, table: &str, max_attempts: u32) -> Result<String, Error>
where
    T: TableStore + ?Sized,
{
    let mut attempt = 0;
    let info = loop {
        let info = tables.describe_table(table).await?;
        if matches!(info.status, Some(TableStatus::Active)) {
            break info;
        }
        if backoff::exhausted(attempt, max_attempts) {
            return Err(Error::TableNeverActive {
                attempts: max_attempts,
            });
        }
        let delay = backoff::poll_delay(attempt);
        tracing::info!(
            table,
            status = ?info.status,
            delay_secs = delay.as_secs(),
            "table exists but is not ACTIVE yet, retrying"
        );
        tokio::time::sleep(delay).await;
        attempt += 1;
    };

    info.key_schema
        .iter()
        .find(|element| element.key_type == KeyType::Hash)
        .map(|element| element.attribute_name.clone())
        .ok_or_else(|| Error::MissingPartitionKey {
            table: table.to_string(),
        })
}
