//! Export orchestration and run reporting.
//!
//! [`Exporter::run`] sequences the whole pipeline: validate configuration,
//! start the preview server, discover and build the sitemap, and only after
//! the sitemap is known non-empty touch the output directory: wipe it,
//! copy build-time static assets, crawl, reconcile uploads, and ensure a
//! `404.html`. The preview server is shut down on every exit path, success
//! or not.
//!
//! A crawl with failed pages still produces output and a report; the
//! degradation is visible in [`ExportReport::exit_code`], not as an error.

use std::path::Path;

use tracing::{info, instrument, warn};

use crate::assets::{self, AssetReport};
use crate::config::ExportConfig;
use crate::crawler::{self, CrawlOptions, HttpPageFetcher, PageFailure, PageFetcher};
use crate::discovery::DiscoveryClient;
use crate::error::Result;
use crate::preview::PreviewHandle;
use crate::sitemap::{Sitemap, SitemapBuilder};

/// Written when the frontend has no renderable not-found route.
const FALLBACK_404: &str = "<!doctype html>\n<html><head><title>Not found</title></head>\
<body><h1>Page not found</h1></body></html>\n";

/// Outcome of one export run.
#[derive(Debug)]
pub struct ExportReport {
    /// URLs in the final sitemap.
    pub pages_total: usize,
    /// Pages rendered and written.
    pub pages_written: usize,
    /// Pages that failed after retries.
    pub failures: Vec<PageFailure>,
    /// Upload reconciliation counts.
    pub assets: AssetReport,
    /// Total fetch attempts across the crawl.
    pub attempts: usize,
}

impl ExportReport {
    /// Process exit code for the run: `0` on full success, `1` when any
    /// page failed. Degraded success still leaves a deployable tree;
    /// the non-zero code keeps it out of unattended deploys.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.failures.is_empty())
    }
}

/// Runs the export pipeline for one configuration.
pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    /// Creates an exporter; the configuration is validated at run time.
    #[must_use]
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    /// Run the full pipeline.
    ///
    /// # Errors
    ///
    /// Fatal errors only: invalid configuration, preview build/readiness
    /// failure, an empty sitemap, discovery of the page listing failing,
    /// or output-tree I/O. Per-page crawl failures are in the report.
    pub async fn run(&self) -> Result<ExportReport> {
        self.run_with_progress(|_, _| {}).await
    }

    /// [`run`](Self::run) with a per-page progress callback, invoked with
    /// each URL path and whether it rendered.
    #[instrument(skip_all)]
    pub async fn run_with_progress<F>(&self, on_page: F) -> Result<ExportReport>
    where
        F: Fn(&str, bool) + Sync,
    {
        self.config.validate()?;

        let preview = PreviewHandle::start(&self.config.preview).await?;
        let result = self.run_against(&preview, on_page).await;
        preview.shutdown().await;
        result
    }

    async fn run_against<F>(&self, preview: &PreviewHandle, on_page: F) -> Result<ExportReport>
    where
        F: Fn(&str, bool) + Sync,
    {
        let sitemap = self.build_sitemap().await?;
        info!(urls = sitemap.len(), "sitemap built");

        // Everything that can invalidate the run without producing output
        // has passed; now the output directory may be replaced.
        self.prepare_output_dir().await?;
        self.copy_static_dirs()?;

        let fetcher = HttpPageFetcher::new(preview.base_url(), self.config.timeout)?;
        let options = CrawlOptions {
            concurrency: self.config.concurrency,
            retries: self.config.retries,
        };
        let crawl = crawler::crawl(
            &fetcher,
            &sitemap,
            &self.config.output_dir,
            &options,
            on_page,
        )
        .await?;

        let assets = assets::reconcile(
            &self.config.output_dir,
            &self.config.uploads_dirs,
            &self.config.cms_host,
        )
        .await?;

        ensure_not_found_page(&fetcher, &self.config.output_dir).await?;

        Ok(ExportReport {
            pages_total: sitemap.len(),
            pages_written: crawl.pages_written,
            failures: crawl.failures,
            assets,
            attempts: crawl.attempts,
        })
    }

    /// Discover all URLs and build the deduplicated, sorted sitemap.
    ///
    /// Single-locale runs query the API once with no locale parameter.
    /// Multi-locale runs repeat discovery per locale and apply each
    /// locale's prefix on the way into the builder.
    async fn build_sitemap(&self) -> Result<Sitemap> {
        let client = DiscoveryClient::new(
            &self.config.cms_host,
            &self.config.front_key,
            &self.config.pages_endpoint,
        )?;

        let mut builder = SitemapBuilder::new();
        if self.config.locales.is_empty() {
            self.collect_locale(&client, &mut builder, None, "").await?;
        } else {
            for entry in &self.config.locales {
                self.collect_locale(&client, &mut builder, Some(&entry.locale_id), &entry.prefix)
                    .await?;
            }
        }
        builder.build()
    }

    async fn collect_locale(
        &self,
        client: &DiscoveryClient,
        builder: &mut SitemapBuilder,
        locale: Option<&str>,
        prefix: &str,
    ) -> Result<()> {
        let pages = client.fetch_all_pages(locale).await?;
        builder.add_locale(&pages, prefix);

        let piece_types = if self.config.piece_types.is_empty() {
            client.discover_piece_types(locale).await
        } else {
            self.config.piece_types.clone()
        };
        for piece_type in &piece_types {
            let pieces = client.fetch_all_pieces(piece_type, locale).await;
            builder.add_locale(&pieces, prefix);
        }
        Ok(())
    }

    async fn prepare_output_dir(&self) -> Result<()> {
        let dir = &self.config.output_dir;
        if dir.exists() {
            info!(dir = %dir.display(), "replacing existing output directory");
            tokio::fs::remove_dir_all(dir).await?;
        }
        tokio::fs::create_dir_all(dir).await?;
        Ok(())
    }

    fn copy_static_dirs(&self) -> Result<()> {
        for static_dir in &self.config.static_dirs {
            if static_dir.is_dir() {
                let copied = assets::copy_tree(static_dir, &self.config.output_dir)?;
                info!(source = %static_dir.display(), files = copied, "copied static assets");
            } else {
                warn!(source = %static_dir.display(), "static directory missing; skipping");
            }
        }
        Ok(())
    }
}

/// Guarantee a root `404.html` for hosts that serve it on unknown paths.
///
/// The frontend's own not-found route is preferred so the error page
/// matches the site; a minimal document stands in when the route does not
/// render.
async fn ensure_not_found_page(fetcher: &dyn PageFetcher, output_dir: &Path) -> Result<()> {
    let body = match fetcher.fetch("/404/").await {
        Ok(body) => body,
        Err(err) => {
            warn!(error = %err, "not-found route did not render; writing fallback 404.html");
            FALLBACK_404.as_bytes().to_vec()
        },
    };
    tokio::fs::write(output_dir.join("404.html"), body).await?;
    Ok(())
}
