//! Candidate probing for unknown piece collection endpoints.
//!
//! The content API does not declare which of its endpoints are piece
//! collections, so candidates come from two sources behind one trait:
//! enumerating the API root index, and a fixed list of common collection
//! names for APIs that cannot enumerate. Validation is shared: one
//! single-item page request, duck-typed on the response shape.

use async_trait::async_trait;
use tracing::debug;

use super::DiscoveryClient;

/// Endpoint names that are listable but never piece collections.
const EXCLUDED_ENDPOINTS: &[&str] = &[
    "pages",
    "search",
    "login",
    "users",
    "user",
    "settings",
    "global",
    "attachments",
    "oembed",
    "notifications",
    "migrations",
];

/// Common collection names tried when the root index yields nothing useful.
const COMMON_COLLECTIONS: &[&str] = &[
    "articles",
    "posts",
    "blog-posts",
    "news",
    "events",
    "products",
    "projects",
    "people",
    "team-members",
    "case-studies",
    "testimonials",
];

/// A source of piece-collection candidates.
///
/// Implementations differ only in where candidates come from; validation is
/// the same duck-typing test for all of them, so it lives in a default
/// method.
#[async_trait]
pub trait CandidateProbe: Send + Sync {
    /// Candidate endpoint names, in probe order. Failures yield an empty
    /// list rather than an error.
    async fn list_candidates(&self, client: &DiscoveryClient) -> Vec<String>;

    /// Whether `key` behaves like a paginated collection of URL-bearing
    /// items.
    async fn is_valid_collection(
        &self,
        client: &DiscoveryClient,
        key: &str,
        locale: Option<&str>,
    ) -> bool {
        client.probe_collection(key, locale).await
    }
}

/// Enumerates candidates from the API root index (`GET /api/v1/`).
///
/// Keys starting with `@` are framework-reserved modules; a further fixed
/// exclusion list drops listable endpoints that are never content.
pub struct RootIndexProbe;

#[async_trait]
impl CandidateProbe for RootIndexProbe {
    async fn list_candidates(&self, client: &DiscoveryClient) -> Vec<String> {
        let Some(index) = client.api_index().await else {
            debug!("root index unavailable; no enumerated candidates");
            return Vec::new();
        };
        let Some(object) = index.as_object() else {
            return Vec::new();
        };

        object
            .keys()
            .filter(|key| is_candidate_key(key))
            .cloned()
            .collect()
    }
}

/// Offers a fixed list of common collection names.
///
/// Runs after [`RootIndexProbe`] and catches collections on APIs whose root
/// index is disabled or incomplete. Every name still has to pass the same
/// validation request, so a miss costs one 404.
pub struct HeuristicProbe;

#[async_trait]
impl CandidateProbe for HeuristicProbe {
    async fn list_candidates(&self, _client: &DiscoveryClient) -> Vec<String> {
        COMMON_COLLECTIONS.iter().map(ToString::to_string).collect()
    }
}

fn is_candidate_key(key: &str) -> bool {
    !key.starts_with('@') && !EXCLUDED_ENDPOINTS.contains(&key)
}
