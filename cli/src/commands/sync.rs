use anyhow::{Context, Result};
use std::process;

use crate::config::Config;
use crate::price_client::RemotePriceClient;
use bakecost_core::error::SyncError;
use bakecost_core::models::SyncSummary;
use bakecost_core::service::CatalogService;

use super::helpers::json_error;

/// Exit status when the price source failed and the catalog was left alone.
const EXIT_SYNC_ABORTED: i32 = 2;

/// What the `sync` command prints, and whether it ends in the aborted exit status.
#[derive(Debug, PartialEq)]
pub(crate) enum SyncOutcome {
    /// Printed on stdout; exit 0.
    Finished(String),
    /// Printed on stdout with `--json`, otherwise on stderr; exit 2.
    Aborted(String),
}

pub(crate) fn sync_outcome(
    result: Result<SyncSummary, SyncError>,
    json: bool,
) -> Result<SyncOutcome> {
    match result {
        Ok(summary) => {
            let text = if json {
                serde_json::to_string_pretty(&summary)?
            } else {
                let updated = summary.updated;
                let missing = summary.missing;
                format!("Updated {updated}, missing {missing}")
            };
            Ok(SyncOutcome::Finished(text))
        }
        Err(SyncError::Aborted(reason)) => Ok(SyncOutcome::Aborted(if json {
            json_error(&format!("sync aborted: {reason}"))
        } else {
            format!("Sync aborted: {reason}")
        })),
        Err(e) => Err(e).context("Sync failed"),
    }
}

pub(crate) async fn cmd_sync(config: &Config, dry_run: bool, json: bool) -> Result<()> {
    let client = RemotePriceClient::new(&config.price_url, config.timeout)?;
    let service = CatalogService::open(&config.catalog_path);

    // The engine is synchronous and the client blocks on the runtime handle,
    // so the pass has to run off the async worker threads.
    let result = tokio::task::spawn_blocking(move || service.sync_prices(&client, dry_run))
        .await
        .context("Sync task panicked")?;

    match sync_outcome(result, json)? {
        SyncOutcome::Finished(text) => {
            println!("{text}");
            if dry_run && !json {
                eprintln!("Dry run: catalog not written");
            }
            Ok(())
        }
        SyncOutcome::Aborted(text) => {
            if json {
                println!("{text}");
            } else {
                eprintln!("{text}");
            }
            process::exit(EXIT_SYNC_ABORTED);
        }
    }
}
