//! Error handling
//!
//! Typed errors for every layer of the core: OAuth, local cache, remote
//! document stores and sync. Each variant maps onto a stable taxonomy code
//! (see [`Error::kind`]) so callers can decide how to surface it.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the core library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed or missing OAuth parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Misconfiguration (e.g. client id not set)
    #[error("Server misconfiguration: {0}")]
    ServerError(String),

    /// No session token and not running against the local backend
    #[error("Not authenticated. Run `jisuye login` first.")]
    NotAuthenticated,

    /// OAuth state returned by the provider does not match the saved one
    #[error("OAuth state mismatch: the callback did not originate from this login attempt")]
    StateMismatch,

    /// Network or API failure talking to the remote document store
    #[error("Remote store error{}: {message}", status.map(|s| format!(" ({})", s)).unwrap_or_default())]
    Remote {
        status: Option<u16>,
        message: String,
    },

    /// The version token used for a write is no longer current
    #[error("Write conflict on '{path}': the remote document changed since it was read")]
    Conflict { path: String },

    /// Entity lookup failed where absence is an error
    #[error("Not found: {0}")]
    NotFound(String),

    /// A collection was edited or pushed before it was ever loaded
    #[error("The {0} were never loaded from the remote or the local cache; nothing was changed")]
    NotLoaded(&'static str),

    /// Local cache could not be read or written
    #[error("Local cache error for '{path}': {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// JSON (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a remote error from a message without a status code
    pub fn remote(message: impl Into<String>) -> Self {
        Error::Remote {
            status: None,
            message: message.into(),
        }
    }

    /// Build a remote error carrying an HTTP status
    pub fn remote_status(status: u16, message: impl Into<String>) -> Self {
        Error::Remote {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Stable snake_case taxonomy code
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidRequest(_) => "invalid_request",
            Error::ServerError(_) => "server_error",
            Error::NotAuthenticated => "not_authenticated",
            Error::StateMismatch => "state_mismatch",
            Error::Remote { .. } | Error::Http(_) | Error::Conflict { .. } => "remote_store_error",
            Error::NotFound(_) => "not_found",
            Error::NotLoaded(_) => "not_loaded",
            Error::Cache { .. } | Error::Io(_) => "cache_error",
            Error::Serialization(_) => "serialization_error",
        }
    }

    /// Whether a cached copy may stand in for the failed operation
    ///
    /// Remote failures (and a missing session) are absorbed by the cache on
    /// reads. Everything else is a local problem and must surface.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Remote { .. }
                | Error::Http(_)
                | Error::Conflict { .. }
                | Error::NotAuthenticated
        )
    }

    /// Whether the session must be restarted from scratch
    pub fn requires_relogin(&self) -> bool {
        matches!(self, Error::StateMismatch | Error::NotAuthenticated)
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            Error::NotAuthenticated => Some("Log in again with `jisuye login`."),
            Error::StateMismatch => {
                Some("Start a fresh login; the previous attempt can no longer be completed.")
            }
            Error::ServerError(_) => {
                Some("Check `client_id` and `oauth_proxy_url` with `jisuye config show`.")
            }
            Error::Conflict { .. } => {
                Some("Another session changed the data. Run `jisuye sync` again to push the full collection.")
            }
            Error::Remote { .. } | Error::Http(_) => {
                Some("Local edits are kept; they will be pushed on the next successful sync.")
            }
            Error::NotLoaded(_) => {
                Some("Check the connection to GitHub and run the command again.")
            }
            _ => None,
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxonomy_codes() {
        assert_eq!(
            Error::InvalidRequest("x".into()).kind(),
            "invalid_request"
        );
        assert_eq!(Error::ServerError("x".into()).kind(), "server_error");
        assert_eq!(Error::NotAuthenticated.kind(), "not_authenticated");
        assert_eq!(Error::StateMismatch.kind(), "state_mismatch");
        assert_eq!(Error::remote("boom").kind(), "remote_store_error");
        assert_eq!(
            Error::Conflict {
                path: "data/links.json".into()
            }
            .kind(),
            "remote_store_error"
        );
        assert_eq!(Error::NotFound("skin".into()).kind(), "not_found");
        assert_eq!(Error::NotLoaded("links").kind(), "not_loaded");
    }

    #[test]
    fn test_remote_errors_are_recoverable() {
        assert!(Error::remote("offline").is_recoverable());
        assert!(Error::NotAuthenticated.is_recoverable());
        assert!(!Error::StateMismatch.is_recoverable());
        assert!(!Error::InvalidRequest("missing code".into()).is_recoverable());
        assert!(!Error::NotLoaded("links").is_recoverable());
    }

    #[test]
    fn test_state_mismatch_forces_relogin() {
        assert!(Error::StateMismatch.requires_relogin());
        assert!(Error::StateMismatch.recovery_suggestion().is_some());
        assert!(!Error::remote("x").requires_relogin());
    }

    #[test]
    fn test_remote_display_includes_status() {
        let err = Error::remote_status(502, "bad gateway");
        let msg = err.to_string();
        assert!(msg.contains("502"));
        assert!(msg.contains("bad gateway"));

        let err = Error::remote("connection reset");
        assert_eq!(err.to_string(), "Remote store error: connection reset");
    }

    #[test]
    fn test_cache_error_display() {
        let err = Error::Cache {
            path: PathBuf::from("/data/cache/cached_links.json"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("cached_links.json"));
        assert_eq!(err.kind(), "cache_error");
    }
}
