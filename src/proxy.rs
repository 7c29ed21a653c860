//! CORS-safe fetches of Google-hosted images and shared album pages.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::Url;

use crate::config::ProxyConfig;

static ALBUM_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://lh3\.googleusercontent\.com/[A-Za-z0-9_\-/]+(?:=[A-Za-z0-9_\-]+)?")
        .expect("valid album image regex")
});

/// Redirect hops followed per fetch.
const MAX_REDIRECTS: usize = 5;

static PROXY_ROUTE: LazyLock<Url> =
    LazyLock::new(|| Url::parse("http://localhost/api/proxy").expect("valid proxy route"));

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("host not allowed: {host}")]
    Disallowed { host: String },

    #[error("upstream returned status {status}")]
    Upstream { status: u16 },

    #[error("upstream request failed: {0}")]
    Network(String),

    #[error("no images found in album")]
    NoImages,
}

/// An image fetched through the proxy.
#[derive(Debug)]
pub struct ProxiedImage {
    pub content_type: String,
    pub body: Vec<u8>,
}

fn host_allowed(host: &str, allowed: &[String]) -> bool {
    let host = host.trim_end_matches('.').to_ascii_lowercase();
    allowed.iter().any(|suffix| {
        let suffix = suffix.trim_start_matches('.').to_ascii_lowercase();
        host == suffix || host.ends_with(&format!(".{suffix}"))
    })
}

/// Parse `raw` and check it is http(s) with a host in `allowed`.
pub fn check_url(raw: &str, allowed: &[String]) -> Result<Url, ProxyError> {
    let url = Url::parse(raw.trim()).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProxyError::InvalidUrl(format!("unsupported scheme {}", url.scheme())));
    }
    let host = url
        .host_str()
        .ok_or_else(|| ProxyError::InvalidUrl("missing host".into()))?;
    if !host_allowed(host, allowed) {
        return Err(ProxyError::Disallowed { host: host.to_string() });
    }
    Ok(url)
}

pub fn is_allowed_image_url(raw: &str, config: &ProxyConfig) -> bool {
    check_url(raw, &config.allowed_image_hosts).is_ok()
}

pub fn is_allowed_album_url(raw: &str, config: &ProxyConfig) -> bool {
    check_url(raw, &config.allowed_album_hosts).is_ok()
}

/// Unique full-size image URLs in an album page, in document order.
///
/// Size suffixes (`=w600-h400-no`) are replaced with `=s0`. Profile pictures
/// under `/a/` and `/a-/` are skipped.
pub fn extract_album_images(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ALBUM_IMAGE
        .find_iter(html)
        .map(|m| m.as_str())
        .filter(|u| !u.contains(".com/a/") && !u.contains(".com/a-/"))
        .map(|u| {
            let base = u.split_once('=').map_or(u, |(base, _)| base);
            format!("{base}=s0")
        })
        .filter(|u| seen.insert(u.clone()))
        .collect()
}

/// Path that serves `url` through the image proxy.
pub fn proxied_src(url: &str) -> String {
    let mut proxy = PROXY_ROUTE.clone();
    proxy.query_pairs_mut().append_pair("u", url);
    format!("{}?{}", proxy.path(), proxy.query().unwrap_or_default())
}

/// Client for the proxies. It never follows redirects itself; [`fetch_image`]
/// and [`fetch_album`] follow them hop by hop against their allow-list.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .redirect(Policy::none())
        .user_agent(concat!("matrix/", env!("CARGO_PKG_VERSION")))
        .build()
}

async fn get(
    http: &reqwest::Client,
    mut url: Url,
    allowed: &[String],
) -> Result<reqwest::Response, ProxyError> {
    for _ in 0..=MAX_REDIRECTS {
        let response = http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| ProxyError::Network(e.to_string()))?;
        // A client with its own redirect policy may already have left the list.
        check_url(response.url().as_str(), allowed)?;

        let status = response.status();
        if status.is_redirection() {
            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or(ProxyError::Upstream {
                    status: status.as_u16(),
                })?;
            let next = url
                .join(location)
                .map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;
            url = check_url(next.as_str(), allowed)?;
            tracing::debug!(%url, "following redirect");
            continue;
        }
        if !status.is_success() {
            return Err(ProxyError::Upstream {
                status: status.as_u16(),
            });
        }
        return Ok(response);
    }
    Err(ProxyError::Network(format!(
        "more than {MAX_REDIRECTS} redirects"
    )))
}

pub async fn fetch_image(
    http: &reqwest::Client,
    raw: &str,
    config: &ProxyConfig,
) -> Result<ProxiedImage, ProxyError> {
    let url = check_url(raw, &config.allowed_image_hosts)?;
    let response = get(http, url, &config.allowed_image_hosts).await?;
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let body = response
        .bytes()
        .await
        .map_err(|e| ProxyError::Network(e.to_string()))?
        .to_vec();
    tracing::debug!(bytes = body.len(), %content_type, "proxied image");
    Ok(ProxiedImage { content_type, body })
}

pub async fn fetch_album(
    http: &reqwest::Client,
    raw: &str,
    config: &ProxyConfig,
) -> Result<Vec<String>, ProxyError> {
    let url = check_url(raw, &config.allowed_album_hosts)?;
    let html = get(http, url, &config.allowed_album_hosts)
        .await?
        .text()
        .await
        .map_err(|e| ProxyError::Network(e.to_string()))?;
    let images = extract_album_images(&html);
    if images.is_empty() {
        return Err(ProxyError::NoImages);
    }
    tracing::info!(count = images.len(), "album images extracted");
    Ok(images)
}
