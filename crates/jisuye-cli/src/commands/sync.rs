//! Sync command handler

use anyhow::{Context, Result};

use jisuye_core::{DataStores, SyncOutcome};

use crate::output::Output;

/// Push every collection to the remote now
pub async fn sync(stores: &DataStores, output: &Output) -> Result<()> {
    output.message("Syncing to remote...");

    match stores.sync().await.context("Sync failed")? {
        SyncOutcome::Synced => output.success("Sync complete"),
        SyncOutcome::AlreadySyncing => output.message("A sync is already running"),
    }

    if !output.is_quiet() && !output.is_json() {
        output.print_sync_state(&stores.coordinator.state());
    }
    Ok(())
}
