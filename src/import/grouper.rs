/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Grouping of a shard's item stream into batch-write groups.
//!
//! Items are buffered per hash key value; a buffer is emitted once it is full
//! (25 requests, the BatchWriteItem limit) or, below that, on a random draw:
//! after each append the buffer is closed when its length equals a uniform
//! pick from `[0, 25)`. The draw bounds how long a rarely-seen key's buffer
//! stays open — without it a key appearing only a handful of times would sit
//! in memory until end-of-stream — at the cost of some batch-size efficiency.
//! The random source is injected so the decision sequence is reproducible in
//! tests.

use crate::convert;
use crate::error::Error;
use crate::export::ExportRecord;
use aws_sdk_dynamodb::types::{PutRequest, WriteRequest};
use std::collections::HashMap;

/// Hard limit of `dynamodb:BatchWriteItem`.
pub(crate) const BATCH_CAP: usize = 25;

/// A batch of put requests sent in one BatchWriteItem call.
pub(crate) type WriteGroup = Vec<WriteRequest>;

/// Accumulates decoded items into [`WriteGroup`]s, keyed by hash key value.
#[derive(Debug)]
pub(crate) struct BatchGrouper {
    hash_key: String,
    pending: HashMap<String, WriteGroup>,
    rng: fastrand::Rng,
}

impl BatchGrouper {
    pub(crate) fn new(hash_key: impl Into<String>, rng: fastrand::Rng) -> Self {
        Self {
            hash_key: hash_key.into(),
            pending: HashMap::new(),
            rng,
        }
    }

    /// Add one record, possibly closing (returning) the buffer it landed in.
    ///
    /// Fails — fatally for the enclosing shard — when the record is missing
    /// the hash key attribute, its key value is not scalar, or an attribute
    /// value cannot be converted.
    pub(crate) fn push(&mut self, record: &ExportRecord) -> Result<Option<WriteGroup>, Error> {
        let key_value = record
            .item
            .get(&self.hash_key)
            .ok_or_else(|| Error::MissingKeyAttribute {
                attribute: self.hash_key.clone(),
            })
            .and_then(convert::stringify)?;
        let item = convert::to_item(&record.item)?;
        let put = PutRequest::builder()
            .set_item(Some(item))
            .build()
            .expect("item is set");

        let buffer = self.pending.entry(key_value.clone()).or_default();
        buffer.push(WriteRequest::builder().put_request(put).build());

        // Close on a full buffer; below the cap, close on the random draw.
        // The draw is only taken for non-full buffers so the decision
        // sequence matches the number of kept buffers exactly.
        let len = buffer.len();
        if len >= BATCH_CAP || len == self.rng.usize(0..BATCH_CAP) {
            Ok(self.pending.remove(&key_value))
        } else {
            Ok(None)
        }
    }

    /// Drain every pending buffer at end of input.
    ///
    /// Consecutive buffers are coalesced into groups of at most [`BATCH_CAP`]
    /// elements; a group is emitted whenever appending the next buffer would
    /// overflow it, and the final partially-filled group — possibly empty —
    /// is emitted last. Nothing buffered is ever dropped.
    pub(crate) fn finish(mut self) -> Vec<WriteGroup> {
        let mut groups = Vec::new();
        let mut buffer: WriteGroup = Vec::with_capacity(BATCH_CAP);
        for (_, items) in self.pending.drain() {
            if buffer.len() + items.len() > BATCH_CAP {
                groups.push(std::mem::replace(
                    &mut buffer,
                    Vec::with_capacity(BATCH_CAP),
                ));
            }
            buffer.extend(items);
        }
        groups.push(buffer);
        groups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::ExportValue;
    use aws_sdk_dynamodb::types::AttributeValue;

    fn record(key: &str) -> ExportRecord {
        ExportRecord {
            item: [
                ("pk".to_string(), ExportValue::String(key.to_string())),
                ("n".to_string(), ExportValue::Number("1".to_string())),
            ]
            .into_iter()
            .collect(),
        }
    }

    fn key_of(request: &WriteRequest) -> String {
        let item = request.put_request().expect("put request").item();
        match item.get("pk") {
            Some(AttributeValue::S(s)) => s.clone(),
            other => panic!("unexpected key value {other:?}"),
        }
    }

    /// Run a stream of unique-key records through a grouper and return every
    /// emitted group, drain included.
    fn run(keys: impl IntoIterator<Item = String>, seed: u64) -> Vec<WriteGroup> {
        let mut grouper = BatchGrouper::new("pk", fastrand::Rng::with_seed(seed));
        let mut groups = Vec::new();
        for key in keys {
            if let Some(group) = grouper.push(&record(&key)).unwrap() {
                groups.push(group);
            }
        }
        groups.extend(grouper.finish());
        groups
    }

    #[test]
    fn groups_never_exceed_the_batch_cap() {
        let groups = run((0..500).map(|i| format!("user#{i}")), 11);
        assert!(groups.iter().all(|g| g.len() <= BATCH_CAP));
    }

    #[test]
    fn no_group_repeats_a_key_value_for_unique_key_streams() {
        let groups = run((0..500).map(|i| format!("user#{i}")), 11);
        for group in &groups {
            let mut keys: Vec<_> = group.iter().map(key_of).collect();
            keys.sort();
            keys.dedup();
            assert_eq!(keys.len(), group.len());
        }
    }

    #[test]
    fn every_input_item_lands_in_exactly_one_group() {
        let input: Vec<_> = (0..377).map(|i| format!("user#{i}")).collect();
        let groups = run(input.clone(), 23);
        let mut seen: Vec<_> = groups.iter().flatten().map(key_of).collect();
        seen.sort();
        let mut expected = input;
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[test]
    fn repeated_keys_fill_a_buffer_and_flush_at_the_cap() {
        // Same hash key every time (a hash+range table's export looks like
        // this): the buffer must flush exactly at 25.
        let mut grouper = BatchGrouper::new("pk", fastrand::Rng::with_seed(0));
        let mut emitted = Vec::new();
        for _ in 0..BATCH_CAP * 3 {
            if let Some(group) = grouper.push(&record("same")).unwrap() {
                emitted.push(group);
            }
        }
        emitted.extend(grouper.finish());
        assert!(emitted.iter().all(|g| g.len() <= BATCH_CAP));
        let total: usize = emitted.iter().map(Vec::len).sum();
        assert_eq!(total, BATCH_CAP * 3);
    }

    #[test]
    fn drain_keeps_every_pending_item_and_ends_with_the_final_group() {
        // A seed/stream combination small enough that most buffers survive
        // to the drain.
        let groups = run((0..40).map(|i| format!("k{i}")), 5);
        let last = groups.last().expect("at least the final group");
        assert!(last.len() <= BATCH_CAP);
        let total: usize = groups.iter().map(Vec::len).sum();
        assert_eq!(total, 40);
    }

    #[test]
    fn empty_input_still_emits_the_final_empty_group() {
        let groups = run(Vec::new(), 1);
        assert_eq!(groups.len(), 1);
        assert!(groups[0].is_empty());
    }

    #[test]
    fn decision_sequence_is_reproducible_for_a_seed() {
        let keys: Vec<_> = (0..200).map(|i| format!("user#{i}")).collect();
        let a: Vec<usize> = run(keys.clone(), 99).iter().map(Vec::len).collect();
        let b: Vec<usize> = run(keys, 99).iter().map(Vec::len).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn missing_hash_key_attribute_is_fatal() {
        let mut grouper = BatchGrouper::new("pk", fastrand::Rng::with_seed(0));
        let bad = ExportRecord {
            item: [("other".to_string(), ExportValue::Number("1".to_string()))]
                .into_iter()
                .collect(),
        };
        assert!(matches!(
            grouper.push(&bad),
            Err(Error::MissingKeyAttribute { .. })
        ));
    }

    #[test]
    fn non_scalar_hash_key_value_is_fatal() {
        let mut grouper = BatchGrouper::new("pk", fastrand::Rng::with_seed(0));
        let bad = ExportRecord {
            item: [("pk".to_string(), ExportValue::List(vec![]))]
                .into_iter()
                .collect(),
        };
        assert!(matches!(grouper.push(&bad), Err(Error::NonScalarKey { .. })));
    }
}
