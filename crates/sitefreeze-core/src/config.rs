//! Export configuration.
//!
//! The CLI assembles an [`ExportConfig`] from flags and environment
//! variables; nothing in core reads the environment directly. Locale
//! entries are deserialized from a JSON file so multi-locale deployments
//! can keep their locale map next to the frontend code.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default content-API page size used when paginating piece collections.
pub const PIECE_PAGE_SIZE: usize = 50;

/// One locale of a multi-locale site.
///
/// `prefix` is applied exactly once to every URL path produced for the
/// locale; the default (root) locale uses an empty prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct LocaleEntry {
    /// Locale identifier passed to the content API (e.g. `fr`).
    #[serde(rename = "localeId")]
    pub locale_id: String,
    /// Public base URL of the locale's site, informational.
    #[serde(rename = "baseUrl", default)]
    pub base_url: String,
    /// URL prefix for the locale (e.g. `/fr`); empty for the root locale.
    #[serde(default)]
    pub prefix: String,
}

impl LocaleEntry {
    /// Load locale entries from a JSON array file.
    pub fn load(path: &Path) -> Result<Vec<Self>> {
        let raw = std::fs::read_to_string(path)?;
        let entries: Vec<Self> = serde_json::from_str(&raw)?;
        if entries.is_empty() {
            return Err(Error::Config(format!(
                "locale file '{}' contains no entries",
                path.display()
            )));
        }
        Ok(entries)
    }
}

/// How the crawl reaches a rendered frontend.
#[derive(Debug, Clone)]
pub enum PreviewConfig {
    /// Build the frontend and supervise its preview server as a child
    /// process bound to `host:port`.
    Managed {
        /// Shell command for the production build step.
        build_command: String,
        /// Shell command that starts the preview server.
        serve_command: String,
        /// Host the preview server binds to.
        host: String,
        /// Port the preview server binds to.
        port: u16,
        /// How long to wait for the server to answer before failing.
        ready_deadline: Duration,
    },
    /// Attach to an already-running server instead of spawning one.
    /// Used by tests and by setups that manage the preview themselves.
    External {
        /// Base URL of the running server.
        base_url: String,
    },
}

impl PreviewConfig {
    /// The base URL the crawler resolves sitemap paths against.
    #[must_use]
    pub fn base_url(&self) -> String {
        match self {
            Self::Managed { host, port, .. } => format!("http://{host}:{port}"),
            Self::External { base_url } => base_url.trim_end_matches('/').to_string(),
        }
    }
}

/// Full configuration for one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Content API base URL (e.g. `http://localhost:3000`).
    pub cms_host: String,
    /// Shared-secret front key sent on every content-API request.
    pub front_key: String,
    /// Page-listing endpoint name under `/api/v1/`.
    pub pages_endpoint: String,
    /// Explicit piece collection names; skips discovery when non-empty.
    pub piece_types: Vec<String>,
    /// Locale entries for multi-locale mode; empty means single-locale.
    pub locales: Vec<LocaleEntry>,
    /// Output directory for the static tree.
    pub output_dir: PathBuf,
    /// Preview server configuration.
    pub preview: PreviewConfig,
    /// Directories of build-time static assets copied into the output root.
    pub static_dirs: Vec<PathBuf>,
    /// Candidate local uploads directories, tried in order.
    pub uploads_dirs: Vec<PathBuf>,
    /// Crawl worker count; `None` derives from available parallelism.
    pub concurrency: Option<usize>,
    /// Retry attempts after the first failure of a crawl fetch.
    pub retries: u32,
    /// Per-request crawl timeout.
    pub timeout: Duration,
}

impl ExportConfig {
    /// Validate the parts that must hold before any network activity.
    pub fn validate(&self) -> Result<()> {
        if self.front_key.trim().is_empty() {
            return Err(Error::Config(
                "missing front key: set SITEFREEZE_FRONT_KEY or pass --front-key".to_string(),
            ));
        }
        if self.cms_host.trim().is_empty() {
            return Err(Error::Config("cms host must not be empty".to_string()));
        }
        Ok(())
    }
}
