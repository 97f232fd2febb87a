//! Asset reconciliation between rendered HTML and upload sources.
//!
//! Rendered pages reference binary uploads under `/uploads/`; the preview
//! server does not always serve them, so the output tree has to be
//! completed after the crawl. Local sources win: the first existing
//! non-empty candidate directory is mirrored into `{output}/uploads/` and
//! reconciliation stops there. Only when no local source exists does the
//! reconciler fall back to scanning the generated HTML for upload
//! references and downloading each one from the remote host.
//!
//! Download failures are per-file: logged, counted, skipped.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tracing::{debug, instrument, warn};

use crate::error::{Error, Result};

/// Directory name uploads live under, in URLs and in the output tree.
const UPLOADS_SEGMENT: &str = "uploads";

/// Per-file download timeout.
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Attribute values whose path contains an `/uploads/` segment, with or
/// without a scheme-and-host prefix.
const UPLOAD_REF_PATTERN: &str = r#"[a-zA-Z-]+=["']([^"']*/uploads/[^"']+)["']"#;

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct AssetReport {
    /// Files mirrored from a local uploads directory.
    pub files_copied: usize,
    /// Files downloaded from the remote host.
    pub files_downloaded: usize,
    /// Downloads that failed and were skipped.
    pub failures: usize,
}

/// Complete the output tree's `uploads/` directory.
///
/// `local_candidates` are tried in order; the first that exists and is
/// non-empty is copied and ends the pass. With no local source, upload
/// references scanned from the generated HTML are fetched from
/// `remote_base`.
///
/// # Errors
///
/// Output-tree I/O failures abort; individual download failures do not.
#[instrument(skip_all, fields(output = %output_dir.display()))]
pub async fn reconcile(
    output_dir: &Path,
    local_candidates: &[PathBuf],
    remote_base: &str,
) -> Result<AssetReport> {
    for candidate in local_candidates {
        if dir_has_entries(candidate)? {
            debug!(source = %candidate.display(), "mirroring local uploads directory");
            let files_copied = copy_tree(candidate, &output_dir.join(UPLOADS_SEGMENT))?;
            return Ok(AssetReport {
                files_copied,
                ..AssetReport::default()
            });
        }
    }

    let references = scan_upload_references(output_dir, remote_base)?;
    if references.is_empty() {
        return Ok(AssetReport::default());
    }
    debug!(count = references.len(), "downloading referenced uploads");
    download_all(output_dir, remote_base, &references).await
}

fn dir_has_entries(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    Ok(std::fs::read_dir(dir)?.next().is_some())
}

/// Recursively mirror `source` into `dest` with an explicit stack; symlink
/// cycles in an uploads tree would otherwise recurse without bound.
pub(crate) fn copy_tree(source: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    let mut stack = vec![(source.to_path_buf(), dest.to_path_buf())];

    while let Some((from_dir, to_dir)) = stack.pop() {
        std::fs::create_dir_all(&to_dir)?;
        for entry in std::fs::read_dir(&from_dir)? {
            let entry = entry?;
            let from = entry.path();
            let to = to_dir.join(entry.file_name());
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                stack.push((from, to));
            } else if file_type.is_file() {
                std::fs::copy(&from, &to)?;
                copied += 1;
            }
        }
    }
    Ok(copied)
}

/// Collect distinct site-relative upload paths referenced by the generated
/// HTML.
fn scan_upload_references(output_dir: &Path, remote_base: &str) -> Result<BTreeSet<String>> {
    let pattern = Regex::new(UPLOAD_REF_PATTERN)
        .map_err(|e| Error::Config(format!("invalid upload pattern: {e}")))?;
    let remote_base = remote_base.trim_end_matches('/');

    let mut references = BTreeSet::new();
    let mut stack = vec![output_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
            } else if path.extension().is_some_and(|ext| ext == "html") {
                // Crawl bodies are opaque bytes; pages are not required to
                // be valid UTF-8 to be scanned for references.
                let bytes = std::fs::read(&path)?;
                let html = String::from_utf8_lossy(&bytes);
                for capture in pattern.captures_iter(&html) {
                    if let Some(reference) = relative_upload_path(&capture[1], remote_base) {
                        references.insert(reference);
                    }
                }
            }
        }
    }
    Ok(references)
}

/// Reduce a matched attribute value to a `/uploads/...` path, dropping a
/// remote-base prefix when present. Absolute URLs pointing anywhere else
/// are foreign and ignored.
fn relative_upload_path(value: &str, remote_base: &str) -> Option<String> {
    let path = if let Some(rest) = value.strip_prefix(remote_base) {
        rest
    } else if value.starts_with('/') {
        value
    } else {
        return None;
    };
    path.starts_with("/uploads/").then(|| path.to_string())
}

async fn download_all(
    output_dir: &Path,
    remote_base: &str,
    references: &BTreeSet<String>,
) -> Result<AssetReport> {
    let client = Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent(concat!("sitefreeze/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(Error::Network)?;
    let remote_base = remote_base.trim_end_matches('/');

    let mut report = AssetReport::default();
    for reference in references {
        match download_one(&client, remote_base, reference).await {
            Ok(body) => {
                let target = output_dir.join(reference.trim_start_matches('/'));
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::write(&target, body).await?;
                report.files_downloaded += 1;
            },
            Err(err) => {
                warn!(%reference, error = %err, "upload download failed; skipping");
                report.failures += 1;
            },
        }
    }
    Ok(report)
}

async fn download_one(client: &Client, remote_base: &str, reference: &str) -> Result<Vec<u8>> {
    let url = format!("{remote_base}{reference}");
    let response = client.get(&url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}
