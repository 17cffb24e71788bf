//! Sync state snapshot
//!
//! Transient: rebuilt each session, never persisted.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Coarse coordinator status, orthogonal to the dirty flag
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Nothing in flight
    #[default]
    Idle,
    /// A full sync is running
    Syncing,
    /// The last sync failed
    Error,
}

/// Point-in-time view of the coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncState {
    pub has_unsynced_changes: bool,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub sync_status: SyncStatus,
    pub sync_error: Option<String>,
    /// Set once every store loaded successfully
    pub initialized: bool,
}

impl SyncState {
    /// Whether a manual sync control should be offered
    pub fn show_sync_button(&self) -> bool {
        self.has_unsynced_changes || self.sync_status == SyncStatus::Syncing
    }

    /// Short human-readable status
    pub fn status_text(&self) -> &'static str {
        match self.sync_status {
            SyncStatus::Syncing => "Syncing...",
            SyncStatus::Error => "Sync failed",
            SyncStatus::Idle if self.has_unsynced_changes => "Unsynced changes",
            SyncStatus::Idle => "Synced",
        }
    }
}

/// What a call to `sync_to_remote` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Every store pushed successfully
    Synced,
    /// Another sync was already running; nothing happened
    AlreadySyncing,
}
