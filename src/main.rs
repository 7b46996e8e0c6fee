/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

use clap::Parser;
use import_dynamodb::{Config, Importer};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "import-dynamodb",
    about = "Restore a DynamoDB export-to-S3 into a live table"
)]
struct Args {
    /// S3 bucket holding the export.
    #[arg(long, env = "MANIFEST_S3_BUCKET")]
    manifest_bucket: Option<String>,

    /// S3 key of the export's manifest-summary.json.
    #[arg(long, env = "MANIFEST_S3_KEY")]
    manifest_key: Option<String>,

    /// Name of the DynamoDB table to restore into.
    #[arg(long, env = "TABLE_NAME")]
    table_name: Option<String>,

    /// Number of concurrent BatchWriteItem workers (1..=25).
    #[arg(long, env = "CONCURRENCY")]
    concurrency: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,import_dynamodb=info")),
        )
        .init();

    let config = Config::new()
        .manifest_bucket(args.manifest_bucket)
        .manifest_key(args.manifest_key)
        .table_name(args.table_name)
        .concurrency(args.concurrency)
        .validate()?;

    let sdk_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let blobs = aws_sdk_s3::Client::new(&sdk_config);
    let tables = aws_sdk_dynamodb::Client::new(&sdk_config);

    Importer::new(config, blobs, tables).run().await?;
    tracing::info!("restore complete");
    Ok(())
}
