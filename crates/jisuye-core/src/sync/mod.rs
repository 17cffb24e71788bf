//! Deferred sync to the remote document store
//!
//! Local mutations mark the [`SyncCoordinator`] dirty. The coordinator then
//! pushes every registered store either when its periodic timer fires or
//! when a sync is requested manually.
//!
//! ## Lifecycle
//!
//! 1. A store mutates and notifies: dirty = true, timer starts (once)
//! 2. Timer tick or manual call: status = syncing
//! 3. Each store pushes its full collection, in registration order
//! 4. Success: dirty cleared, timer stopped. Failure: error recorded, dirty
//!    and timer kept for the next tick
//!
//! ## Usage
//!
//! ```ignore
//! let coordinator = SyncCoordinator::new(DEFAULT_AUTO_SYNC_INTERVAL);
//! let links = Arc::new(LinksStore::new(cache, remote, coordinator.notifier()));
//! coordinator.register(links.clone());
//! coordinator.load_from_remote().await?;
//! ```

mod coordinator;
mod state;

pub use coordinator::{SyncCoordinator, DEFAULT_AUTO_SYNC_INTERVAL};
pub use state::{SyncOutcome, SyncState, SyncStatus};
