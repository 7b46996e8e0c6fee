/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Instrumented in-memory stand-ins for the S3 and DynamoDB seams.

use crate::error::Error;
use crate::store::{ObjectStore, TableInfo, TableStore, WriteError};
use async_trait::async_trait;
use aws_sdk_dynamodb::types::{
    AttributeValue, KeySchemaElement, KeyType, PutRequest, TableStatus, WriteRequest,
};
use aws_smithy_types::byte_stream::ByteStream;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// An in-memory blob store keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub(crate) struct MockBlobs {
    objects: HashMap<(String, String), Vec<u8>>,
}

impl MockBlobs {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_object(mut self, bucket: &str, key: &str, body: Vec<u8>) -> Self {
        self.objects.insert((bucket.to_string(), key.to_string()), body);
        self
    }
}

#[async_trait]
impl ObjectStore for MockBlobs {
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ByteStream, Error> {
        match self.objects.get(&(bucket.to_string(), key.to_string())) {
            Some(body) => Ok(ByteStream::from(body.clone())),
            None => Err(Error::ObjectFetch {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "object not found".into(),
            }),
        }
    }
}

/// Scripted result of one `batch_write` call.
#[derive(Debug, Clone, Copy)]
pub(crate) enum WriteOutcome {
    /// Everything processed.
    Ok,
    /// The first `n` requests come back unprocessed.
    Unprocessed(usize),
    /// The call fails with a throughput-exceeded error.
    Throttle,
    /// The call fails with a non-retryable error.
    Fail,
}

/// A scripted table store. Describe statuses and write outcomes are consumed
/// in order; the last entry repeats once the script runs out (an empty write
/// script means every call succeeds).
#[derive(Debug)]
pub(crate) struct MockTables {
    hash_key: Option<String>,
    fail_describe: bool,
    statuses: Vec<TableStatus>,
    writes: Vec<WriteOutcome>,
    write_delay: Option<Duration>,
    describe_count: AtomicUsize,
    write_count: AtomicUsize,
    write_sizes: Mutex<Vec<usize>>,
    written: Mutex<Vec<HashMap<String, AttributeValue>>>,
}

impl MockTables {
    fn base(hash_key: Option<String>) -> Self {
        Self {
            hash_key,
            fail_describe: false,
            statuses: vec![TableStatus::Active],
            writes: Vec::new(),
            write_delay: None,
            describe_count: AtomicUsize::new(0),
            write_count: AtomicUsize::new(0),
            write_sizes: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
        }
    }

    /// An ACTIVE table whose key schema hashes on `name`.
    pub(crate) fn with_hash_key(name: &str) -> Self {
        Self::base(Some(name.to_string()))
    }

    /// An ACTIVE table whose key schema has no HASH element.
    pub(crate) fn without_hash_key() -> Self {
        Self::base(None)
    }

    /// A store whose DescribeTable always fails.
    pub(crate) fn failing_describe() -> Self {
        Self {
            fail_describe: true,
            ..Self::base(None)
        }
    }

    pub(crate) fn statuses(mut self, statuses: impl IntoIterator<Item = TableStatus>) -> Self {
        self.statuses = statuses.into_iter().collect();
        self
    }

    pub(crate) fn writes(mut self, writes: impl IntoIterator<Item = WriteOutcome>) -> Self {
        self.writes = writes.into_iter().collect();
        self
    }

    pub(crate) fn write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub(crate) fn describe_calls(&self) -> usize {
        self.describe_count.load(Ordering::SeqCst)
    }

    pub(crate) fn write_calls(&self) -> usize {
        self.write_count.load(Ordering::SeqCst)
    }

    /// Request counts of every `batch_write` call, in call order.
    pub(crate) fn write_sizes(&self) -> Vec<usize> {
        self.write_sizes.lock().unwrap().clone()
    }

    /// Every item successfully processed so far.
    pub(crate) fn written_items(&self) -> Vec<HashMap<String, AttributeValue>> {
        self.written.lock().unwrap().clone()
    }

    fn record_processed(&self, requests: &[WriteRequest]) {
        let mut written = self.written.lock().unwrap();
        for request in requests {
            if let Some(put) = request.put_request() {
                written.push(put.item().clone());
            }
        }
    }
}

#[async_trait]
impl TableStore for MockTables {
    async fn describe_table(&self, table: &str) -> Result<TableInfo, Error> {
        let call = self.describe_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_describe {
            return Err(Error::TableLookup {
                table: table.to_string(),
                source: "no such table".into(),
            });
        }
        let status = self
            .statuses
            .get(call)
            .or_else(|| self.statuses.last())
            .cloned();
        let key_schema = match &self.hash_key {
            Some(name) => vec![KeySchemaElement::builder()
                .attribute_name(name)
                .key_type(KeyType::Hash)
                .build()
                .expect("attribute name and key type are set")],
            None => vec![KeySchemaElement::builder()
                .attribute_name("sk")
                .key_type(KeyType::Range)
                .build()
                .expect("attribute name and key type are set")],
        };
        Ok(TableInfo { status, key_schema })
    }

    async fn batch_write(
        &self,
        _table: &str,
        requests: Vec<WriteRequest>,
    ) -> Result<Vec<WriteRequest>, WriteError> {
        let call = self.write_count.fetch_add(1, Ordering::SeqCst);
        self.write_sizes.lock().unwrap().push(requests.len());
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .writes
            .get(call)
            .or_else(|| self.writes.last())
            .copied()
            .unwrap_or(WriteOutcome::Ok);
        match outcome {
            WriteOutcome::Ok => {
                self.record_processed(&requests);
                Ok(Vec::new())
            }
            WriteOutcome::Unprocessed(n) => {
                let n = n.min(requests.len());
                self.record_processed(&requests[n..]);
                Ok(requests.into_iter().take(n).collect())
            }
            WriteOutcome::Throttle => Err(WriteError::ThroughputExceeded(
                "provisioned throughput exceeded".into(),
            )),
            WriteOutcome::Fail => Err(WriteError::Other("batch write rejected".into())),
        }
    }
}

/// A put request for an item whose `pk` is the given string.
pub(crate) fn item_request(key: &str) -> WriteRequest {
    let put = PutRequest::builder()
        .item("pk", AttributeValue::S(key.to_string()))
        .build()
        .expect("item is set");
    WriteRequest::builder().put_request(put).build()
}

/// Gzip-compress a byte slice.
pub(crate) fn gzip(data: &[u8]) -> Vec<u8> {
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}
