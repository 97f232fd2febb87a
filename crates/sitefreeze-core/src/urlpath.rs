//! URL path normalization and output-file mapping.
//!
//! Every URL entering the pipeline is first normalized into a site-relative
//! path string: a single leading `/`, no query string or fragment, and a
//! trailing `/` on every non-file-like path. Equality on the normalized
//! string is the deduplication key for the whole sitemap.
//!
//! The trailing-slash rule is what makes [`output_path`] injective over a
//! deduplicated sitemap: `/foo` and `/foo/` both normalize to `/foo/` and
//! therefore map to one file, never two writers racing on `foo/index.html`.

use std::path::PathBuf;

use url::Url;

/// Base URL used to parse site-relative inputs; only the path component is
/// ever read back out.
const PARSE_BASE: &str = "http://sitefreeze.invalid";

/// Normalize a raw URL or path into a comparable site-relative path.
///
/// - strips query string and fragment
/// - ensures a single leading `/`
/// - leaves file-like paths (dot-extension final segment) untouched at the
///   end, and ensures exactly one trailing `/` on everything else
///
/// Total over all inputs: when URL parsing fails the query/fragment are
/// stripped by naive splitting instead. Idempotent by construction.
#[must_use]
pub fn normalize(raw: &str) -> String {
    let path = extract_path(raw);

    let mut out = String::with_capacity(path.len() + 2);
    if !path.starts_with('/') {
        out.push('/');
    }
    out.push_str(&path);

    if !is_file_like(&out) && !out.ends_with('/') {
        out.push('/');
    }
    out
}

/// Pull the path component out of `raw`, dropping query and fragment.
fn extract_path(raw: &str) -> String {
    if let Ok(url) = Url::parse(raw) {
        if url.has_host() {
            return url.path().to_string();
        }
    }
    if let Ok(base) = Url::parse(PARSE_BASE) {
        if let Ok(url) = base.join(raw) {
            return url.path().to_string();
        }
    }
    // Fallback for inputs the url crate rejects outright.
    raw.split(['?', '#']).next().unwrap_or("").to_string()
}

/// Whether a normalized path names a file rather than a route.
///
/// File-like means the final segment carries a dot-extension, e.g.
/// `/feed.xml` or `/data/export.json`.
fn is_file_like(path: &str) -> bool {
    let last = path.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    match last.rsplit_once('.') {
        Some((stem, ext)) => !stem.is_empty() && !ext.is_empty(),
        None => false,
    }
}

/// Map a normalized URL path to its file location under the output root.
///
/// `/` becomes `index.html`, `/foo/` becomes `foo/index.html`, and
/// file-like paths keep their name: `/feed.xml` becomes `feed.xml`.
///
/// Injective over any set of distinct normalized paths: route paths and
/// file paths can never collide because routes always end in `/` after
/// normalization and gain an `index.html` leaf.
#[must_use]
pub fn output_path(url_path: &str) -> PathBuf {
    let trimmed = url_path.trim_start_matches('/');
    if url_path.ends_with('/') || trimmed.is_empty() {
        let mut path = PathBuf::from(trimmed);
        path.push("index.html");
        path
    } else {
        PathBuf::from(trimmed)
    }
}

/// Apply a locale prefix to a normalized path exactly once.
///
/// The prefix is first normalized itself (single leading `/`, no trailing
/// `/`), so `"fr"`, `"/fr"` and `"/fr/"` in a locale file all mean the
/// same thing and the result always starts with `/`. Skips paths already
/// carrying the prefix, and the path that *is* the prefix itself, so
/// merging a locale's URL set with an already-prefixed set can never
/// produce `/fr/fr/about/`. An empty prefix (the default locale) is the
/// identity.
#[must_use]
pub fn apply_locale_prefix(path: &str, prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        return path.to_string();
    }
    let prefix = if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    };

    let prefixed_root = format!("{prefix}/");
    if path == prefix || path == prefixed_root {
        return prefixed_root;
    }
    if path.starts_with(&prefixed_root) {
        return path.to_string();
    }
    format!("{prefix}{path}")
}
