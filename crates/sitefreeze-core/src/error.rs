//! Error types and handling for sitefreeze-core operations.
//!
//! Errors fall into three tiers, mirroring the pipeline's failure policy:
//!
//! - **Fatal/config**: missing front key, empty sitemap, preview build
//!   failure, preview never becoming ready. These abort the run.
//! - **Recoverable/per-item**: individual page fetches, discovery probes,
//!   and asset downloads. These are caught where they occur and never
//!   propagate past their component.
//! - **Degraded success** is not an `Error` at all: the run completes and
//!   the failures are itemized in the export report.
//!
//! [`Error::is_recoverable`] reports whether a retry might succeed, which is
//! what the crawler's backoff loop keys on for network-level failures.

use thiserror::Error;

/// The main error type for sitefreeze-core operations.
///
/// All public functions in sitefreeze-core return `Result<T, Error>`.
/// Common standard library and reqwest errors convert automatically.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed.
    ///
    /// Covers output-tree writes, upload copies, and locale-file reads. The
    /// underlying `std::io::Error` is preserved.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Network operation failed.
    ///
    /// Covers content-API requests, crawl fetches, and asset downloads.
    /// Connection and timeout failures are typically recoverable; malformed
    /// request errors are permanent.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Configuration is invalid or incomplete.
    ///
    /// Raised before any network activity, e.g. for a missing front key or
    /// an unparseable locale file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// URL is malformed or invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Discovery produced no URLs to render.
    ///
    /// Fatal: rendering nothing is never the intended outcome, and the
    /// output directory is left untouched when this is raised.
    #[error("sitemap is empty: discovery produced no page or piece URLs")]
    EmptySitemap,

    /// The frontend's production build step exited non-zero.
    #[error("preview build failed: {0}")]
    PreviewBuild(String),

    /// The preview server never answered within the readiness deadline.
    #[error("preview server not ready: {0}")]
    PreviewUnready(String),

    /// Operation timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Requested resource was not found.
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl Error {
    /// Check if the error might be recoverable through retry logic.
    ///
    /// Returns `true` for errors that are typically temporary: network
    /// timeouts, connection failures, and interrupted I/O. Configuration
    /// and pipeline-state errors are permanent.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout(_) => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut | std::io::ErrorKind::Interrupted
            ),
            _ => false,
        }
    }

    /// Get the error category as a string identifier for logging.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Network(_) => "network",
            Self::Config(_) => "config",
            Self::Serialization(_) => "serialization",
            Self::InvalidUrl(_) => "invalid_url",
            Self::EmptySitemap => "empty_sitemap",
            Self::PreviewBuild(_) | Self::PreviewUnready(_) => "preview",
            Self::Timeout(_) => "timeout",
            Self::NotFound(_) => "not_found",
        }
    }
}

/// Convenience type alias for `std::result::Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
