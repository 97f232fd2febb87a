//! Content API discovery client.
//!
//! Enumerates everything the CMS will publish for a locale: the flat page
//! tree, plus every piece collection the API exposes. Collections are not
//! declared anywhere, so they are found by probing; see [`probe`] for the
//! two-phase candidate strategy.
//!
//! Failure policy: the page listing is the one fetch that must succeed
//! (without it the crawl has no guaranteed content); every probe and every
//! pagination step degrades gracefully instead of aborting the run.

/// Candidate probing for unknown collection endpoints
pub mod probe;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::config::PIECE_PAGE_SIZE;
use crate::error::{Error, Result};
use crate::urlpath::normalize;

use probe::{CandidateProbe, HeuristicProbe, RootIndexProbe};

/// Header carrying the shared-secret front key on every request.
pub const FRONT_KEY_HEADER: &str = "x-frontend-key";

/// Timeout for individual content-API requests.
const API_TIMEOUT: Duration = Duration::from_secs(10);

/// Pagination guard against APIs that never return a short page.
const MAX_PIECE_PAGES: usize = 1_000;

/// Client for the CMS content API.
///
/// Owns one HTTP client and attaches the front key to every request. All
/// URL output is normalized; see [`crate::urlpath::normalize`].
pub struct DiscoveryClient {
    client: Client,
    host: String,
    front_key: String,
    pages_endpoint: String,
}

impl DiscoveryClient {
    /// Creates a discovery client for the given API host.
    pub fn new(host: &str, front_key: &str, pages_endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .user_agent(concat!("sitefreeze/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(Error::Network)?;
        Ok(Self {
            client,
            host: host.trim_end_matches('/').to_string(),
            front_key: front_key.to_string(),
            pages_endpoint: pages_endpoint.to_string(),
        })
    }

    /// Fetch every published page URL for a locale.
    ///
    /// A non-empty listing is guaranteed to contain the site root even when
    /// the API omits it; a locale-specific homepage (`/{locale}/`) already
    /// in the result stands in for the bare root. An empty listing stays
    /// empty so the caller can fail on an empty sitemap.
    ///
    /// # Errors
    ///
    /// A non-2xx response here is fatal: the crawl would have no
    /// guaranteed content without the page tree.
    #[instrument(skip(self))]
    pub async fn fetch_all_pages(&self, locale: Option<&str>) -> Result<Vec<String>> {
        let mut url = format!(
            "{}/api/v1/{}?all=1&flat=1&published=1",
            self.host, self.pages_endpoint
        );
        if let Some(locale) = locale {
            url.push_str(&format!("&locale={locale}"));
        }

        let response = self
            .client
            .get(&url)
            .header(FRONT_KEY_HEADER, &self.front_key)
            .send()
            .await?;
        let response_status = response.status();
        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(_) if response_status == StatusCode::NOT_FOUND => {
                return Err(Error::NotFound(format!(
                    "page listing not found at '{url}'; check --cms-host and the pages endpoint"
                )));
            },
            Err(err) => return Err(Error::Network(err)),
        };

        let body: Value = response.json().await?;
        let mut urls: Vec<String> = results_array(&body)
            .iter()
            .filter_map(item_url)
            .map(|raw| normalize(&raw))
            .collect();

        ensure_root(&mut urls, locale);
        debug!(count = urls.len(), "fetched page listing");
        Ok(urls)
    }

    /// Discover piece collection endpoints for a locale.
    ///
    /// Runs the root-enumeration probe first, then always also tests the
    /// fixed heuristic list for names the root index did not surface (some
    /// APIs cannot enumerate at all). Probe failures are swallowed; the
    /// result is the deduplicated union of everything that validated.
    #[instrument(skip(self))]
    pub async fn discover_piece_types(&self, locale: Option<&str>) -> Vec<String> {
        let probes: [&dyn CandidateProbe; 2] = [&RootIndexProbe, &HeuristicProbe];

        let mut found: Vec<String> = Vec::new();
        for probe in probes {
            for candidate in probe.list_candidates(self).await {
                if found.iter().any(|f| f == &candidate) {
                    continue;
                }
                if probe.is_valid_collection(self, &candidate, locale).await {
                    debug!(collection = %candidate, "discovered piece collection");
                    found.push(candidate);
                }
            }
        }
        found
    }

    /// Fetch every piece URL of a collection, paginating until a short page.
    ///
    /// Any page-fetch failure is treated as end of pagination; partial
    /// results are returned rather than aborting the run.
    #[instrument(skip(self))]
    pub async fn fetch_all_pieces(&self, piece_type: &str, locale: Option<&str>) -> Vec<String> {
        let mut urls = Vec::new();

        for page in 1..=MAX_PIECE_PAGES {
            let Some(results) = self.fetch_piece_page(piece_type, page, locale).await else {
                break;
            };
            let count = results.len();
            urls.extend(results.iter().filter_map(item_url).map(|u| normalize(&u)));
            if count < PIECE_PAGE_SIZE {
                break;
            }
        }

        debug!(collection = %piece_type, count = urls.len(), "fetched piece urls");
        urls
    }

    async fn fetch_piece_page(
        &self,
        piece_type: &str,
        page: usize,
        locale: Option<&str>,
    ) -> Option<Vec<Value>> {
        let mut url = format!(
            "{}/api/v1/{piece_type}?page={page}&perPage={PIECE_PAGE_SIZE}",
            self.host
        );
        if let Some(locale) = locale {
            url.push_str(&format!("&locale={locale}"));
        }

        let response = match self
            .client
            .get(&url)
            .header(FRONT_KEY_HEADER, &self.front_key)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(collection = %piece_type, page, status = %r.status(), "piece page fetch failed; ending pagination");
                return None;
            },
            Err(e) => {
                warn!(collection = %piece_type, page, error = %e, "piece page fetch failed; ending pagination");
                return None;
            },
        };

        let body: Value = response.json().await.ok()?;
        Some(results_array(&body).to_vec())
    }

    /// One-request duck-typing test: does `key` behave like a paginated
    /// collection whose items resolve to URLs?
    pub(crate) async fn probe_collection(&self, key: &str, locale: Option<&str>) -> bool {
        let mut url = format!("{}/api/v1/{key}?page=1&perPage=1", self.host);
        if let Some(locale) = locale {
            url.push_str(&format!("&locale={locale}"));
        }

        let response = match self
            .client
            .get(&url)
            .header(FRONT_KEY_HEADER, &self.front_key)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => r,
            Ok(_) | Err(_) => return false,
        };

        let Ok(body) = response.json::<Value>().await else {
            return false;
        };
        let Some(results) = body.get("results").and_then(Value::as_array) else {
            return false;
        };

        match results.first() {
            Some(item) => item_url(item).is_some(),
            None => {
                // A currently-empty collection looks identical to an empty
                // non-content endpoint; accept provisionally rather than
                // drop collections that happen to have no items yet.
                debug!(collection = %key, "empty results page; provisionally accepting");
                true
            },
        }
    }

    /// GET an API path and parse the body as JSON; `None` on any failure.
    pub(crate) async fn api_index(&self) -> Option<Value> {
        let url = format!("{}/api/v1/", self.host);
        let response = self
            .client
            .get(&url)
            .header(FRONT_KEY_HEADER, &self.front_key)
            .send()
            .await
            .ok()?;
        if !response.status().is_success() {
            return None;
        }
        response.json().await.ok()
    }
}

/// View a listing body as its `results` array; a bare top-level array is
/// accepted too.
fn results_array(body: &Value) -> &[Value] {
    body.get("results")
        .and_then(Value::as_array)
        .or_else(|| body.as_array())
        .map_or(&[], Vec::as_slice)
}

/// Canonical URL field of a listing item.
fn item_url(item: &Value) -> Option<String> {
    item.get("_url")
        .or_else(|| item.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Guarantee the site root is present, locale-aware: a locale homepage
/// already in the list stands in for the bare root.
///
/// A listing with no URLs at all gets no fallback root: an API serving
/// nothing must surface as an empty sitemap, not render one blank page.
fn ensure_root(urls: &mut Vec<String>, locale: Option<&str>) {
    if urls.is_empty() || urls.iter().any(|u| u == "/") {
        return;
    }
    if let Some(locale) = locale {
        let locale_root = format!("/{locale}/");
        if urls.iter().any(|u| u == &locale_root) {
            return;
        }
    }
    urls.push("/".to_string());
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> DiscoveryClient {
        DiscoveryClient::new(&server.uri(), "test-key", "pages").unwrap()
    }

    #[tokio::test]
    async fn test_fetch_all_pages_extracts_and_normalizes_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pages"))
            .and(header(FRONT_KEY_HEADER, "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    { "_url": "https://example.com/" },
                    { "_url": "https://example.com/about?draft=1" },
                    { "url": "/team" }
                ]
            })))
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_all_pages(None).await.unwrap();
        assert_eq!(urls, vec!["/", "/about/", "/team/"]);
    }

    #[tokio::test]
    async fn test_fetch_all_pages_accepts_bare_array_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{ "_url": "/" }, { "_url": "/about/" }])),
            )
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_all_pages(None).await.unwrap();
        assert_eq!(urls, vec!["/", "/about/"]);
    }

    #[tokio::test]
    async fn test_fetch_all_pages_guarantees_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [{ "_url": "/about/" }] })),
            )
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_all_pages(None).await.unwrap();
        assert!(urls.contains(&"/".to_string()));
    }

    #[tokio::test]
    async fn test_empty_listing_gets_no_fallback_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_all_pages(None).await.unwrap();
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_locale_homepage_suppresses_bare_root() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pages"))
            .and(query_param("locale", "fr"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "_url": "/fr/" }, { "_url": "/fr/apropos/" }]
            })))
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_all_pages(Some("fr")).await.unwrap();
        assert_eq!(urls, vec!["/fr/", "/fr/apropos/"]);
        assert!(!urls.contains(&"/".to_string()));
    }

    #[tokio::test]
    async fn test_fetch_all_pages_failure_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = client_for(&server).fetch_all_pages(None).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_fetch_all_pages_404_maps_to_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/pages"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        match client_for(&server).fetch_all_pages(None).await {
            Err(Error::NotFound(msg)) => assert!(msg.contains("--cms-host")),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_all_pieces_paginates_until_short_page() {
        let server = MockServer::start().await;

        let full_page: Vec<Value> = (0..PIECE_PAGE_SIZE)
            .map(|i| json!({ "_url": format!("/articles/a{i}") }))
            .collect();
        Mock::given(method("GET"))
            .and(path("/api/v1/articles"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": full_page })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/articles"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{ "_url": "/articles/last" }]
            })))
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_all_pieces("articles", None).await;
        assert_eq!(urls.len(), PIECE_PAGE_SIZE + 1);
        assert_eq!(urls.last().unwrap(), "/articles/last/");
    }

    #[tokio::test]
    async fn test_piece_page_error_ends_pagination_gracefully() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/articles"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let urls = client_for(&server).fetch_all_pieces("articles", None).await;
        assert!(urls.is_empty());
    }

    #[tokio::test]
    async fn test_probe_collection_accepts_items_with_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/articles"))
            .and(query_param("perPage", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [{ "_url": "/articles/one" }] })),
            )
            .mount(&server)
            .await;

        assert!(client_for(&server).probe_collection("articles", None).await);
    }

    #[tokio::test]
    async fn test_probe_collection_rejects_items_without_urls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/settings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [{ "theme": "dark" }] })),
            )
            .mount(&server)
            .await;

        assert!(!client_for(&server).probe_collection("settings", None).await);
    }

    #[tokio::test]
    async fn test_probe_collection_provisionally_accepts_empty_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/events"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
            .mount(&server)
            .await;

        assert!(client_for(&server).probe_collection("events", None).await);
    }

    #[tokio::test]
    async fn test_probe_collection_rejects_non_listing_bodies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;

        assert!(!client_for(&server).probe_collection("health", None).await);
    }

    #[tokio::test]
    async fn test_discovery_unions_root_and_heuristic_probes() {
        let server = MockServer::start().await;

        // Root index enumerates one custom collection plus noise.
        Mock::given(method("GET"))
            .and(path("/api/v1/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "recipes": {}, "@core/page": {}, "search": {}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/recipes"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [{ "_url": "/recipes/pie" }] })),
            )
            .mount(&server)
            .await;
        // One heuristic name also validates; everything else 404s.
        Mock::given(method("GET"))
            .and(path("/api/v1/articles"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [{ "_url": "/articles/one" }] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let types = client_for(&server).discover_piece_types(None).await;
        assert!(types.contains(&"recipes".to_string()));
        assert!(types.contains(&"articles".to_string()));
        assert!(!types.iter().any(|t| t.starts_with('@')));
        assert!(!types.contains(&"search".to_string()));
    }

    #[tokio::test]
    async fn test_discovery_survives_missing_root_index() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/articles"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "results": [{ "_url": "/articles/one" }] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let types = client_for(&server).discover_piece_types(None).await;
        assert_eq!(types, vec!["articles".to_string()]);
    }
}
