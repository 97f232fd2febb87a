//! Command-line interface definition.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sitefreeze_core::{ExportConfig, LocaleEntry, PreviewConfig};

/// Default readiness budget for a managed preview server. `npm run
/// preview`-style commands routinely take over a minute on cold caches.
const READY_DEADLINE: Duration = Duration::from_secs(90);

/// Export a headless-CMS frontend as a deployable static site.
#[derive(Parser, Debug, Clone)]
#[command(name = "sitefreeze", version, about, long_about = None)]
pub struct Cli {
    /// Output directory for the static tree (wiped and recreated)
    #[arg(long = "out", default_value = "dist", value_name = "DIR")]
    pub out: PathBuf,

    /// Base URL of the CMS content API
    #[arg(long, default_value = "http://localhost:3000", value_name = "URL")]
    pub cms_host: String,

    /// Shared-secret front key for the content API
    #[arg(long, env = "SITEFREEZE_FRONT_KEY", hide_env_values = true)]
    pub front_key: Option<String>,

    /// Page-listing endpoint name under /api/v1/
    #[arg(long, default_value = "pages", value_name = "NAME")]
    pub pages_endpoint: String,

    /// Piece collections to export, skipping endpoint discovery
    #[arg(long, value_delimiter = ',', value_name = "a,b")]
    pub piece_types: Vec<String>,

    /// JSON file of locale entries for multi-locale export
    #[arg(long, value_name = "FILE")]
    pub locales: Option<PathBuf>,

    /// Host the managed preview server binds to
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// Port the managed preview server binds to
    #[arg(long, default_value_t = 4321)]
    pub port: u16,

    /// Shell command for the frontend production build
    #[arg(long, default_value = "npm run build", value_name = "CMD")]
    pub build_cmd: String,

    /// Shell command that starts the preview server
    #[arg(long, default_value = "npm run preview", value_name = "CMD")]
    pub serve_cmd: String,

    /// Attach to an already-running preview server instead of spawning one
    #[arg(long, value_name = "URL", conflicts_with_all = ["build_cmd", "serve_cmd"])]
    pub external_preview: Option<String>,

    /// Crawl worker count (derived from CPU count when omitted)
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,

    /// Retry attempts after the first failure of each page fetch
    #[arg(long, default_value_t = 2, value_name = "N")]
    pub retries: u32,

    /// Per-request crawl timeout in milliseconds
    #[arg(long, default_value_t = 30_000, value_name = "MS")]
    pub timeout_ms: u64,

    /// Directory of build-time static assets to copy into the output root
    /// (repeatable)
    #[arg(long = "static-dir", value_name = "DIR")]
    pub static_dirs: Vec<PathBuf>,

    /// Candidate local uploads directory, tried in order (repeatable)
    #[arg(long = "uploads-dir", value_name = "DIR")]
    pub uploads_dirs: Vec<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log errors; suppress the progress bar and summary
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Cli {
    /// Assemble the export configuration, reading the locale file if one
    /// was given.
    pub fn into_config(self) -> Result<ExportConfig> {
        let locales = match &self.locales {
            Some(path) => LocaleEntry::load(path)
                .with_context(|| format!("reading locale file '{}'", path.display()))?,
            None => Vec::new(),
        };

        let preview = match self.external_preview {
            Some(base_url) => PreviewConfig::External { base_url },
            None => PreviewConfig::Managed {
                build_command: self.build_cmd,
                serve_command: self.serve_cmd,
                host: self.host,
                port: self.port,
                ready_deadline: READY_DEADLINE,
            },
        };

        Ok(ExportConfig {
            cms_host: self.cms_host,
            front_key: self.front_key.unwrap_or_default(),
            pages_endpoint: self.pages_endpoint,
            piece_types: self.piece_types,
            locales,
            output_dir: self.out,
            preview,
            static_dirs: self.static_dirs,
            uploads_dirs: self.uploads_dirs,
            concurrency: self.concurrency,
            retries: self.retries,
            timeout: Duration::from_millis(self.timeout_ms),
        })
    }
}
