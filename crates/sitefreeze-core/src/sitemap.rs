//! Sitemap construction.
//!
//! The sitemap is the crawl's work list: every URL discovery produced, as
//! normalized site-relative paths, deduplicated and deterministically
//! ordered. In multi-locale mode each locale's URLs pass through
//! [`apply_locale_prefix`] on the way in, so prefixing happens exactly once
//! no matter how many sources contribute to a locale.

use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::urlpath::{apply_locale_prefix, normalize};

/// The finished, ordered URL set for one export run.
#[derive(Debug, Clone)]
pub struct Sitemap {
    urls: Vec<String>,
}

impl Sitemap {
    /// The normalized URL paths, lexicographically sorted.
    #[must_use]
    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Number of URLs to crawl.
    #[must_use]
    pub fn len(&self) -> usize {
        self.urls.len()
    }

    /// Whether the sitemap has no entries. A built sitemap is never empty;
    /// this exists for symmetry with `len`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Accumulates URLs from discovery sources into a [`Sitemap`].
///
/// Insertion order is irrelevant: the set is ordered and deduplicated on
/// the normalized path string, so the same run inputs always produce the
/// same sitemap.
#[derive(Debug, Default)]
pub struct SitemapBuilder {
    paths: BTreeSet<String>,
}

impl SitemapBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one raw URL or path; it is normalized before insertion.
    pub fn add(&mut self, raw: &str) {
        self.paths.insert(normalize(raw));
    }

    /// Add a locale's URLs, applying its prefix to each normalized path.
    ///
    /// Safe to call with URLs the API already prefixed: the prefix is
    /// applied at most once per path.
    pub fn add_locale<I, S>(&mut self, raws: I, prefix: &str)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for raw in raws {
            self.paths
                .insert(apply_locale_prefix(&normalize(raw.as_ref()), prefix));
        }
    }

    /// Number of distinct paths accumulated so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether nothing has been accumulated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Finish the sitemap.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptySitemap`] when discovery contributed nothing:
    /// rendering an empty site is never the intended outcome, and callers
    /// check this before touching the output directory.
    pub fn build(self) -> Result<Sitemap> {
        if self.paths.is_empty() {
            return Err(Error::EmptySitemap);
        }
        Ok(Sitemap {
            urls: self.paths.into_iter().collect(),
        })
    }
}
