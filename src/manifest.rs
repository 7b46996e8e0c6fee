/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Resolution of the export's summary/manifest chain.
//!
//! An export-to-S3 leaves a summary object pointing at a manifest-list
//! object, which in turn lists one manifest per shard (data file). Both are
//! resolved up front: writes only start once the whole shard list is known.

use crate::error::Error;
use crate::store::ObjectStore;
use serde::Deserialize;

/// The only output format this tool can restore.
const EXPECTED_OUTPUT_FORMAT: &str = "DYNAMODB_JSON";

/// A validated export summary.
#[derive(Debug, Clone)]
pub struct Summary {
    /// Key of the manifest-list object the summary points at.
    pub manifest_files_s3_key: String,
}

/// Raw summary document. Fields the export writes that we do not consume are
/// simply ignored by serde.
#[derive(Debug, Deserialize)]
struct SummaryDoc {
    #[serde(rename = "manifestFilesS3Key", default)]
    manifest_files_s3_key: Option<String>,
    #[serde(rename = "outputFormat", default)]
    output_format: Option<String>,
}

/// One shard of the export: a single compressed data object.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ShardManifest {
    /// Number of items the shard holds, when recorded.
    #[serde(rename = "itemCount", default)]
    pub item_count: Option<u64>,
    /// Key of the shard's gzip-compressed data object.
    #[serde(rename = "dataFileS3Key")]
    pub data_file_s3_key: String,
}

/// Fetch and validate the export summary.
///
/// A summary with an empty manifest-list key or a non-`DYNAMODB_JSON` output
/// format is unusable; the run aborts before any writes.
pub async fn load_summary<B>(blobs: &B, bucket: &str, key: &str) -> Result<Summary, Error>
where
    B: ObjectStore + ?Sized,
{
    let body = fetch(blobs, bucket, key).await?;
    let doc: SummaryDoc = serde_json::from_slice(&body).map_err(Error::SummaryDecode)?;
    let manifest_files_s3_key = match doc.manifest_files_s3_key {
        Some(key) if !key.is_empty() => key,
        _ => {
            return Err(Error::SummaryInvalid {
                reason: "manifestFilesS3Key is missing or empty".into(),
            })
        }
    };
    match doc.output_format.as_deref() {
        Some(EXPECTED_OUTPUT_FORMAT) => {}
        other => {
            return Err(Error::SummaryInvalid {
                reason: format!(
                    "outputFormat must be {EXPECTED_OUTPUT_FORMAT}, found {other:?}"
                ),
            })
        }
    }
    Ok(Summary {
        manifest_files_s3_key,
    })
}

/// Fetch the manifest-list object and decode one [`ShardManifest`] per line.
///
/// A decode failure on any record fails the whole resolution: with a partial
/// list there is no way to tell which shards the restore would be missing.
pub async fn load_shard_manifests<B>(
    blobs: &B,
    bucket: &str,
    key: &str,
) -> Result<Vec<ShardManifest>, Error>
where
    B: ObjectStore + ?Sized,
{
    let body = fetch(blobs, bucket, key).await?;
    let text = String::from_utf8_lossy(&body);
    let mut manifests = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        manifests.push(serde_json::from_str(line).map_err(Error::ManifestDecode)?);
    }
    Ok(manifests)
}

async fn fetch<B>(blobs: &B, bucket: &str, key: &str) -> Result<Vec<u8>, Error>
where
    B: ObjectStore + ?Sized,
{
    let stream = blobs.get_object(bucket, key).await?;
    let bytes = stream.collect().await.map_err(|e| Error::ObjectFetch {
        bucket: bucket.to_string(),
        key: key.to_string(),
        source: e.into(),
    })?;
    Ok(bytes.to_vec())
}
