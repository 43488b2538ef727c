//! Search capability for the enrichment orchestrator.
//!
//! - [`SearchProvider`]: keyword query → ranked `{title, url, snippet}` hits
//! - [`HttpSearchProvider`]: JSON web-search API client, retried under the
//!   same [`FetchPolicy`] as page fetches
//! - [`CachedSearch`]: wraps any provider with the libSQL lookup cache, so
//!   repeated queries within the TTL cost no quota and need no pacing

mod parser;

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};

use conftrack_fetcher::FetchPolicy;
use conftrack_shared::{ConfTrackError, Result, SearchConfig, SearchHit};
use conftrack_storage::LookupCache;

pub use parser::parse_response;

/// User-Agent string for search requests.
const USER_AGENT: &str = concat!("conftrack/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// Hits for one query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Served from the lookup cache; the provider was not called.
    pub cached: bool,
}

/// Keyword search. Any error means "no data" to the caller.
pub trait SearchProvider: Send + Sync {
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<SearchResults>> + Send;
}

// ---------------------------------------------------------------------------
// HttpSearchProvider
// ---------------------------------------------------------------------------

/// Client for a web-search JSON API (`GET <endpoint>?q=..&count=..`).
pub struct HttpSearchProvider {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    policy: FetchPolicy,
}

/// Outcome of a single attempt that did not produce hits.
enum AttemptError {
    /// Transport failure, 5xx or 429: worth another try.
    Transient(ConfTrackError),
    Permanent(ConfTrackError),
}

impl HttpSearchProvider {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>, policy: FetchPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(policy.timeout)
            .build()
            .map_err(|e| ConfTrackError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
            policy,
        })
    }

    /// Provider from `[search]`, or `None` when no API key is in the
    /// environment (search pass is then skipped).
    pub fn from_config(config: &SearchConfig) -> Result<Option<Self>> {
        let Some(key) = config.api_key() else {
            info!(env = %config.api_key_env, "search API key not set, search disabled");
            return Ok(None);
        };
        let policy = FetchPolicy {
            timeout: Duration::from_secs(config.timeout_secs),
            ..FetchPolicy::default()
        };
        Self::new(config.resolved_endpoint(), Some(key), policy).map(Some)
    }

    async fn search_once(&self, query: &str, limit: usize) -> std::result::Result<String, AttemptError> {
        let count = limit.to_string();
        let mut request = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("count", count.as_str())])
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("X-Subscription-Token", key);
        }

        let response = request.send().await.map_err(|e| {
            AttemptError::Transient(ConfTrackError::Network(format!("search: {e}")))
        })?;

        let status = response.status();
        if !status.is_success() {
            let err = ConfTrackError::Network(format!("search: HTTP {status}"));
            return Err(
                if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    AttemptError::Transient(err)
                } else {
                    AttemptError::Permanent(err)
                },
            );
        }

        response.text().await.map_err(|e| {
            AttemptError::Transient(ConfTrackError::Network(format!(
                "search: failed to read body: {e}"
            )))
        })
    }
}

impl SearchProvider for HttpSearchProvider {
    #[instrument(skip_all, fields(query = %query))]
    async fn search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        let body = loop {
            match self.search_once(query, limit).await {
                Ok(body) => break body,
                Err(AttemptError::Transient(e)) if attempt < attempts => {
                    debug!(attempt, error = %e, "transient search failure, retrying");
                    tokio::time::sleep(self.policy.backoff * attempt).await;
                    attempt += 1;
                }
                Err(AttemptError::Transient(e) | AttemptError::Permanent(e)) => return Err(e),
            }
        };

        let hits = parse_response(&body, limit)?;
        debug!(hits = hits.len(), "search returned");
        Ok(SearchResults {
            hits,
            cached: false,
        })
    }
}

// ---------------------------------------------------------------------------
// CachedSearch
// ---------------------------------------------------------------------------

/// A provider whose responses are kept in a [`LookupCache`].
///
/// Cache read/write failures are logged and bypassed.
pub struct CachedSearch<P> {
    inner: P,
    cache: LookupCache,
    ttl: chrono::Duration,
}

impl<P: SearchProvider> CachedSearch<P> {
    pub fn new(inner: P, cache: LookupCache, ttl: chrono::Duration) -> Self {
        Self { inner, cache, ttl }
    }

    /// Drop expired entries; returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        self.cache.purge_expired(self.ttl).await
    }
}

/// Stable cache key for a query and result cap.
pub fn cache_key(query: &str, limit: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{limit}|{}", query.trim().to_lowercase()));
    format!("{:x}", hasher.finalize())
}

impl<P: SearchProvider> SearchProvider for CachedSearch<P> {
    async fn search(&self, query: &str, limit: usize) -> Result<SearchResults> {
        let key = cache_key(query, limit);

        match self.cache.get(&key, self.ttl).await {
            Ok(Some(payload)) => match serde_json::from_str::<Vec<SearchHit>>(&payload) {
                Ok(hits) => {
                    debug!(%query, hits = hits.len(), "search cache hit");
                    return Ok(SearchResults { hits, cached: true });
                }
                Err(e) => warn!(%query, error = %e, "cached search payload unreadable"),
            },
            Ok(None) => {}
            Err(e) => warn!(%query, error = %e, "search cache read failed"),
        }

        let results = self.inner.search(query, limit).await?;
        match serde_json::to_string(&results.hits) {
            Ok(payload) => {
                if let Err(e) = self.cache.put(&key, query, &payload).await {
                    warn!(%query, error = %e, "search cache write failed");
                }
            }
            Err(e) => warn!(%query, error = %e, "search hits not serialisable"),
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;
    use wiremock::matchers::{header, method, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const BODY: &str = r#"{"web":{"results":[
        {"title":"2027 AFA Annual Meeting","url":"https://afajof.org/meeting","description":"Submission deadline: April 15, 2026"}
    ]}}"#;

    fn provider(server: &MockServer) -> HttpSearchProvider {
        HttpSearchProvider::new(
            format!("{}/res/v1/web/search", server.uri()),
            Some("test-key".into()),
            FetchPolicy {
                timeout: Duration::from_secs(5),
                attempts: 2,
                backoff: Duration::from_millis(10),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sends_query_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "AFA Annual Meeting 2027"))
            .and(query_param("count", "5"))
            .and(header("X-Subscription-Token", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .expect(1)
            .mount(&server)
            .await;

        let results = provider(&server).search("AFA Annual Meeting 2027", 5).await.unwrap();
        assert!(!results.cached);
        assert_eq!(results.hits.len(), 1);
        assert_eq!(results.hits[0].url, "https://afajof.org/meeting");
    }

    #[tokio::test]
    async fn http_error_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(2)
            .mount(&server)
            .await;

        let err = provider(&server).search("anything", 5).await.unwrap_err();
        assert!(matches!(err, ConfTrackError::Network(_)));
    }

    #[tokio::test]
    async fn server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .expect(1)
            .mount(&server)
            .await;

        let results = provider(&server).search("AFA Annual Meeting 2027", 5).await.unwrap();
        assert_eq!(results.hits.len(), 1);
        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        assert!(provider(&server).search("anything", 5).await.is_err());
    }

    #[tokio::test]
    async fn cache_serves_repeat_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(BODY))
            .expect(1)
            .mount(&server)
            .await;

        let db = std::env::temp_dir().join(format!("conftrack_search_{}.db", Uuid::now_v7()));
        let cache = LookupCache::open(&db).await.unwrap();
        let search = CachedSearch::new(provider(&server), cache, chrono::Duration::hours(1));

        let first = search.search("AFA Annual Meeting 2027", 5).await.unwrap();
        let second = search.search("afa annual meeting 2027 ", 5).await.unwrap();
        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(first.hits, second.hits);
    }

    #[test]
    fn cache_key_depends_on_limit() {
        assert_ne!(cache_key("q", 5), cache_key("q", 10));
        assert_eq!(cache_key("Q ", 5), cache_key("q", 5));
        assert_eq!(cache_key("q", 5).len(), 64);
    }
}
