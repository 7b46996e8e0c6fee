/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Seams to the two external stores the restore talks to.
//!
//! The pipeline is written against [`ObjectStore`] and [`TableStore`] so the
//! batching, retry and orchestration logic can be exercised with instrumented
//! stand-ins; the SDK clients implement them directly.

use crate::error::{BoxError, Error};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{KeySchemaElement, TableStatus, WriteRequest};
use aws_smithy_types::byte_stream::ByteStream;
use std::sync::Arc;

/// Where the export's objects (summary, manifest list, data files) live.
#[async_trait]
pub trait ObjectStore: Send + Sync + 'static {
    /// Fetch one object as a byte stream.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream, Error>;
}

/// The table the export is restored into.
#[async_trait]
pub trait TableStore: Send + Sync + 'static {
    /// Describe the table's status and key schema.
    async fn describe_table(&self, table: &str) -> Result<TableInfo, Error>;

    /// Apply a batch of put requests, returning the requests the store did
    /// not process (to be retried by the caller).
    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, WriteError>;
}

/// The slice of a table description the restore cares about.
#[derive(Debug, Clone)]
pub struct TableInfo {
    /// Current table status, when the service reported one.
    pub status: Option<TableStatus>,
    /// The table's key schema.
    pub key_schema: Vec<KeySchemaElement>,
}

/// A failed batch write, split by whether it is worth retrying.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// The table's provisioned throughput was exceeded. Retryable.
    #[error("provisioned throughput exceeded")]
    ThroughputExceeded(#[source] BoxError),

    /// Any other call failure. Fatal for the group, not retried.
    #[error("dynamodb:BatchWriteItem failed")]
    Other(#[source] BoxError),
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for Arc<S> {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream, Error> {
        (**self).get_object(bucket, key).await
    }
}

#[async_trait]
impl<T: TableStore> TableStore for Arc<T> {
    async fn describe_table(&self, table: &str) -> Result<TableInfo, Error> {
        (**self).describe_table(table).await
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, WriteError> {
        (**self).batch_write(table, requests).await
    }
}

#[async_trait]
impl ObjectStore for aws_sdk_s3::Client {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream, Error> {
        let output = self
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| Error::ObjectFetch {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: e.into(),
            })?;
        Ok(output.body)
    }
}

#[async_trait]
impl TableStore for aws_sdk_dynamodb::Client {
    async fn describe_table(&self, table: &str) -> Result<TableInfo, Error> {
        let output = self
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|e| Error::TableLookup {
                table: table.to_string(),
                source: e.into(),
            })?;
        let description = output.table.ok_or_else(|| Error::TableLookup {
            table: table.to_string(),
            source: "DescribeTable returned no table description".into(),
        })?;
        Ok(TableInfo {
            status: description.table_status,
            key_schema: description.key_schema.unwrap_or_default(),
        })
    }

    async fn batch_write(
        &self,
        table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, WriteError> {
        let output = self
            .batch_write_item()
            .request_items(table, requests)
            .send()
            .await
            .map_err(|e| {
                let throttled = e
                    .as_service_error()
                    .is_some_and(|se| se.is_provisioned_throughput_exceeded_exception());
                if throttled {
                    WriteError::ThroughputExceeded(e.into())
                } else {
                    WriteError::Other(e.into())
                }
            })?;
        Ok(output
            .unprocessed_items
            .unwrap_or_default()
            .remove(table)
            .unwrap_or_default())
    }
}
