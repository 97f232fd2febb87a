//! # sitefreeze-core
//!
//! Core functionality for sitefreeze - a static-site export pipeline for
//! headless-CMS frontends.
//!
//! The pipeline discovers every publishable URL from a CMS content API
//! (pages plus heuristically discovered piece collections), boots the
//! frontend's local preview server as a child process, crawls each URL under
//! bounded concurrency with retry/backoff, reconciles referenced upload
//! assets, and writes a deployable static directory tree.
//!
//! ## Architecture
//!
//! Data flows one direction through the components:
//!
//! - **Discovery** ([`discovery`]): enumerates page and piece URLs from the
//!   content API, including duck-typed probing of unknown collection
//!   endpoints
//! - **Sitemap** ([`sitemap`]): merges, deduplicates, and sorts the URL set,
//!   applying locale prefixes in multi-locale mode
//! - **Preview** ([`preview`]): builds the frontend and supervises its local
//!   preview server, the rendering oracle for the crawl
//! - **Crawler** ([`crawler`]): fetches every sitemap URL with a bounded
//!   worker pool and writes each body to its mapped output file
//! - **Assets** ([`assets`]): copies or downloads binary uploads referenced
//!   by the rendered HTML
//! - **Export** ([`export`]): sequences everything, owns the output
//!   directory lifecycle, and produces the run report
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`]. Fatal configuration errors
//! abort the run; per-item fetch failures are caught at the narrowest scope
//! and surface only in the final [`export::ExportReport`].

/// Asset reconciliation between rendered HTML and upload sources
pub mod assets;
/// Export configuration assembled by the caller
pub mod config;
/// Bounded-concurrency page crawler
pub mod crawler;
/// Content API discovery client and endpoint probing
pub mod discovery;
/// Error types and result aliases
pub mod error;
/// Export orchestration and run reporting
pub mod export;
/// Preview server build, supervision, and shutdown
pub mod preview;
/// Sitemap construction and multi-locale merging
pub mod sitemap;
/// URL path normalization and output-file mapping
pub mod urlpath;

// Re-export commonly used types
pub use assets::AssetReport;
pub use config::{ExportConfig, LocaleEntry, PreviewConfig};
pub use crawler::{CrawlOptions, CrawlReport, HttpPageFetcher, PageFailure, PageFetcher};
pub use discovery::DiscoveryClient;
pub use error::{Error, Result};
pub use export::{ExportReport, Exporter};
pub use preview::PreviewHandle;
pub use urlpath::{apply_locale_prefix, normalize, output_path};
