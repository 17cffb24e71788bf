//! Navigation guard
//!
//! Decides whether a command may run: anonymous sessions are sent to login
//! for anything that needs auth, and a logged-in user whose data repository
//! does not exist yet is sent to setup. Once the repository is known to
//! exist the answer is remembered in the session store.

use std::sync::Arc;

use tracing::{debug, error};

use crate::cache::{keys, KeyValueStore};
use crate::remote::GitHubDocumentStore;

/// Where navigation should go
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    Login,
    Setup,
}

/// Session mode the guard runs under
#[derive(Clone)]
pub enum GuardMode {
    /// Local development backend: everything is allowed
    Dev,
    /// No session
    Anonymous,
    /// Logged in against GitHub
    GitHub(Arc<GitHubDocumentStore>),
}

pub struct RepositoryGuard {
    session: Arc<dyn KeyValueStore>,
    mode: GuardMode,
}

impl RepositoryGuard {
    pub fn new(session: Arc<dyn KeyValueStore>, mode: GuardMode) -> Self {
        Self { session, mode }
    }

    /// Check a navigation to a target that may or may not need auth
    pub async fn check(&self, requires_auth: bool) -> GuardDecision {
        let repository = match &self.mode {
            GuardMode::Dev => return GuardDecision::Proceed,
            GuardMode::Anonymous if requires_auth => return GuardDecision::Login,
            GuardMode::Anonymous => return GuardDecision::Proceed,
            GuardMode::GitHub(repository) => repository,
        };

        if self.session.contains(keys::REPO_CHECKED) {
            return GuardDecision::Proceed;
        }

        match repository.repo_exists().await {
            Ok(true) => {
                if let Err(e) = self.session.set(keys::REPO_CHECKED, "true") {
                    debug!("could not record repository check: {}", e);
                }
                GuardDecision::Proceed
            }
            Ok(false) => GuardDecision::Setup,
            Err(e) => {
                error!("Error checking repository: {}", e);
                GuardDecision::Proceed
            }
        }
    }

    /// Forget the remembered repository check
    pub fn reset(&self) {
        if let Err(e) = self.session.remove(keys::REPO_CHECKED) {
            debug!("could not clear repository check: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryKeyValueStore;

    fn unreachable_repo() -> Arc<GitHubDocumentStore> {
        Arc::new(
            GitHubDocumentStore::new("token", "octocat", "jisuye-ext-data")
                .unwrap()
                .with_api_base("http://127.0.0.1:9"),
        )
    }

    #[tokio::test]
    async fn test_dev_mode_always_proceeds() {
        let guard = RepositoryGuard::new(Arc::new(MemoryKeyValueStore::new()), GuardMode::Dev);
        assert_eq!(guard.check(true).await, GuardDecision::Proceed);
    }

    #[tokio::test]
    async fn test_anonymous_needs_login_for_protected_targets() {
        let guard = RepositoryGuard::new(Arc::new(MemoryKeyValueStore::new()), GuardMode::Anonymous);
        assert_eq!(guard.check(true).await, GuardDecision::Login);
        assert_eq!(guard.check(false).await, GuardDecision::Proceed);
    }

    #[tokio::test]
    async fn test_remembered_check_skips_lookup() {
        let session = Arc::new(MemoryKeyValueStore::new());
        session.set(keys::REPO_CHECKED, "true").unwrap();
        let guard = RepositoryGuard::new(session, GuardMode::GitHub(unreachable_repo()));
        assert_eq!(guard.check(true).await, GuardDecision::Proceed);
    }

    #[tokio::test]
    async fn test_lookup_error_does_not_block() {
        let session = Arc::new(MemoryKeyValueStore::new());
        let guard = RepositoryGuard::new(session.clone(), GuardMode::GitHub(unreachable_repo()));
        assert_eq!(guard.check(true).await, GuardDecision::Proceed);
        assert!(!session.contains(keys::REPO_CHECKED));
    }
}
