//! Page-fetch capability with one timeout/retry policy for every caller.
//!
//! The orchestrator only sees [`PageFetcher`]; redirects, retries and the
//! private-address guard live here.

use std::future::Future;
use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};
use url::Url;

use conftrack_shared::{ConfTrackError, Result};

/// User-Agent string for fetch requests.
const USER_AGENT: &str = concat!("conftrack/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Capability
// ---------------------------------------------------------------------------

/// A successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Final URL after redirects.
    pub url: String,
    pub status: u16,
    pub body: String,
}

/// Fetch a URL, returning the body or a `Network` error.
///
/// Non-2xx statuses, timeouts and transport failures are all errors; callers
/// treat any error as "no data".
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage>> + Send;
}

/// Timeout and retry settings applied to every request.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub timeout: Duration,
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Sleep before retry `n` is `backoff * n`.
    pub backoff: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            attempts: 2,
            backoff: Duration::from_millis(750),
        }
    }
}

// ---------------------------------------------------------------------------
// HttpFetcher
// ---------------------------------------------------------------------------

/// `reqwest`-backed [`PageFetcher`].
pub struct HttpFetcher {
    client: Client,
    policy: FetchPolicy,
    /// Allow localhost/private IPs (for tests against mock servers).
    allow_localhost: bool,
}

/// Outcome of a single attempt that did not produce a page.
enum AttemptError {
    /// Transport failure, 5xx or 429: worth another try.
    Transient(ConfTrackError),
    Permanent(ConfTrackError),
}

impl HttpFetcher {
    pub fn new(policy: FetchPolicy) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(policy.timeout)
            .build()
            .map_err(|e| ConfTrackError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            policy,
            allow_localhost: false,
        })
    }

    /// Allow fetching localhost/private IPs (for tests against mock servers).
    #[cfg(test)]
    pub fn allow_localhost(mut self) -> Self {
        self.allow_localhost = true;
        self
    }

    async fn fetch_once(&self, url: &Url) -> std::result::Result<FetchedPage, AttemptError> {
        debug!(%url, "fetching page");

        let response = self.client.get(url.as_str()).send().await.map_err(|e| {
            AttemptError::Transient(ConfTrackError::Network(format!("{url}: {e}")))
        })?;

        let status = response.status();
        if !status.is_success() {
            let err = ConfTrackError::Network(format!("{url}: HTTP {status}"));
            return Err(
                if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    AttemptError::Transient(err)
                } else {
                    AttemptError::Permanent(err)
                },
            );
        }

        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| {
            AttemptError::Transient(ConfTrackError::Network(format!(
                "{url}: body read failed: {e}"
            )))
        })?;

        Ok(FetchedPage {
            url: final_url,
            status: status.as_u16(),
            body,
        })
    }
}

impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        let parsed = Url::parse(url)
            .map_err(|e| ConfTrackError::Network(format!("invalid URL {url}: {e}")))?;

        if !self.allow_localhost && is_ssrf_target(&parsed) {
            warn!(%url, "SSRF protection: blocked");
            return Err(ConfTrackError::Network(format!("{url}: blocked target")));
        }

        let attempts = self.policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(&parsed).await {
                Ok(page) => return Ok(page),
                Err(AttemptError::Transient(e)) if attempt < attempts => {
                    debug!(%url, attempt, error = %e, "transient fetch failure, retrying");
                    tokio::time::sleep(self.policy.backoff * attempt).await;
                    attempt += 1;
                }
                Err(AttemptError::Transient(e) | AttemptError::Permanent(e)) => return Err(e),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// SSRF protection
// ---------------------------------------------------------------------------

/// Check if a URL targets a potentially dangerous resource.
pub fn is_ssrf_target(url: &Url) -> bool {
    match url.scheme() {
        "http" | "https" => {}
        _ => return true,
    }

    match url.host() {
        Some(url::Host::Ipv4(v4)) => is_private_ip(&IpAddr::V4(v4)),
        Some(url::Host::Ipv6(v6)) => is_private_ip(&IpAddr::V6(v6)),
        Some(url::Host::Domain(host)) => {
            host == "localhost" || host.ends_with(".local") || host.ends_with(".internal")
        }
        None => true,
    }
}

/// Check if an IP is in a private/reserved range.
fn is_private_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_broadcast()
                || v4.is_unspecified()
                // 100.64.0.0/10 (Carrier-grade NAT)
                || (v4.octets()[0] == 100 && (v4.octets()[1] & 0xC0) == 64)
        }
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(FetchPolicy {
            timeout: Duration::from_secs(5),
            attempts: 2,
            backoff: Duration::from_millis(10),
        })
        .unwrap()
        .allow_localhost()
    }

    #[test]
    fn ssrf_blocks_private_targets() {
        for raw in [
            "file:///etc/passwd",
            "http://192.168.1.1/admin",
            "http://10.0.0.1/",
            "http://127.0.0.1:8080/",
            "http://localhost:3000/api",
            "http://[::1]/",
        ] {
            let url = Url::parse(raw).unwrap();
            assert!(is_ssrf_target(&url), "{raw} should be blocked");
        }
    }

    #[test]
    fn ssrf_allows_public() {
        let url = Url::parse("https://www.aaahq.org/Meetings/2026/ATA").unwrap();
        assert!(!is_ssrf_target(&url));
    }

    #[tokio::test]
    async fn fetch_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/cfp"))
            .respond_with(ResponseTemplate::new(200).set_body_string("Submission Deadline: May 1, 2026"))
            .mount(&server)
            .await;

        let page = fetcher().fetch(&format!("{}/cfp", server.uri())).await.unwrap();
        assert_eq!(page.status, 200);
        assert!(page.body.contains("May 1, 2026"));
    }

    #[tokio::test]
    async fn not_found_is_an_error_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher()
            .fetch(&format!("{}/gone", server.uri()))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let page = fetcher().fetch(&format!("{}/flaky", server.uri())).await.unwrap();
        assert_eq!(page.body, "ok");
    }

    #[tokio::test]
    async fn localhost_blocked_by_default() {
        let strict = HttpFetcher::new(FetchPolicy::default()).unwrap();
        let err = strict.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(err.to_string().contains("blocked"));
    }
}
