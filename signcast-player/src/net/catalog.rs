//! Upstream catalog fetch
//!
//! REST fallback for catalog delivery: one paged request per attempt,
//! lenient envelope parsing, bounded exponential backoff. Exhausting the
//! retries yields an empty list, never an error; the caller treats empty as
//! "nothing changed, keep the previous catalog".

use crate::net::connectivity::Connectivity;
use crate::net::protocol::parse_media_payload;
use crate::{Error, Result};
use serde_json::Value;
use signcast_common::model::MediaAsset;
use std::time::Duration;
use tracing::{debug, warn};

const FETCH_MAX_ATTEMPTS: u32 = 3;
const FETCH_RETRY_BASE: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Catalog REST client
pub struct CatalogFetcher {
    http_client: reqwest::Client,
    base_url: String,
    connectivity: Option<Connectivity>,
    retry_base: Duration,
}

impl CatalogFetcher {
    pub fn new(base_url: &str, connectivity: Option<Connectivity>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("signcast/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            connectivity,
            retry_base: FETCH_RETRY_BASE,
        })
    }

    /// Override the retry backoff base (2s by default)
    pub fn with_retry_base(mut self, base: Duration) -> Self {
        self.retry_base = base;
        self
    }

    /// Fetch the device's catalog with bounded retries.
    ///
    /// A failed attempt is any of: unreachable network, HTTP failure,
    /// malformed envelope, or an empty filtered result. Exhaustion returns
    /// the empty list.
    pub async fn fetch(&self, device_id: &str) -> Vec<MediaAsset> {
        for attempt in 1..=FETCH_MAX_ATTEMPTS {
            if let Some(connectivity) = &self.connectivity {
                if !connectivity.is_online().await {
                    warn!(attempt, "No network for catalog fetch");
                    self.backoff(attempt).await;
                    continue;
                }
            }

            match self.fetch_once(device_id).await {
                Ok(assets) if !assets.is_empty() => {
                    debug!(
                        attempt,
                        count = assets.len(),
                        "Fetched catalog from upstream"
                    );
                    return assets;
                }
                Ok(_) => warn!(attempt, "Catalog fetch returned no active entries"),
                Err(e) => warn!(attempt, "Catalog fetch failed: {}", e),
            }

            self.backoff(attempt).await;
        }

        warn!("Catalog fetch attempts exhausted; keeping previous catalog");
        Vec::new()
    }

    async fn backoff(&self, attempt: u32) {
        if attempt < FETCH_MAX_ATTEMPTS {
            let delay = self.retry_base * 2u32.pow(attempt - 1);
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::time::sleep(delay).await;
        }
    }

    async fn fetch_once(&self, device_id: &str) -> Result<Vec<MediaAsset>> {
        let url = format!("{}/media/{}?page=1&limit=10", self.base_url, device_id);
        debug!(url = %url, "Fetching catalog");

        let response = self.http_client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http(format!("Catalog endpoint returned {}", status)));
        }

        let envelope: Value = response.json().await?;
        if envelope.get("status").and_then(Value::as_str) != Some("success") {
            return Err(Error::Internal(format!(
                "Unexpected envelope status: {:?}",
                envelope.get("status")
            )));
        }

        let data = envelope
            .get("data")
            .ok_or_else(|| Error::Internal("Envelope has no data field".to_string()))?;

        parse_media_payload(data)
            .ok_or_else(|| Error::Internal("Envelope has no mediaAllData array".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    async fn spawn_upstream(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fetcher(base_url: &str) -> CatalogFetcher {
        CatalogFetcher::new(base_url, None)
            .unwrap()
            .with_retry_base(Duration::from_millis(10))
    }

    #[tokio::test]
    async fn fetch_parses_and_filters_catalog() {
        let app = Router::new().route(
            "/media/:device_id",
            get(|| async {
                Json(json!({
                    "status": "success",
                    "data": {"mediaAllData": [
                        {"_id": "m1", "url": "https://cdn.example.com/m1.mp4", "isActive": true, "displayOrder": 1},
                        {"_id": "m2", "isActive": false},
                        {"bad": "entry"}
                    ]}
                }))
            }),
        );
        let base = spawn_upstream(app).await;

        let assets = fetcher(&base).fetch("dev-1").await;
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, "m1");
    }

    #[tokio::test]
    async fn empty_result_is_retried_then_succeeds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/media/:device_id",
            get({
                let hits = hits.clone();
                move || {
                    let hits = hits.clone();
                    async move {
                        let n = hits.fetch_add(1, Ordering::SeqCst);
                        if n == 0 {
                            Json(json!({"status": "success", "data": {"mediaAllData": []}}))
                        } else {
                            Json(json!({
                                "status": "success",
                                "data": {"mediaAllData": [
                                    {"_id": "late", "url": "https://cdn.example.com/late.mp4", "isActive": true}
                                ]}
                            }))
                        }
                    }
                }
            }),
        );
        let base = spawn_upstream(app).await;

        let assets = fetcher(&base).fetch("dev-1").await;
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].id, "late");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhausted_retries_yield_empty_list() {
        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/media/:device_id",
            get({
                let hits = hits.clone();
                move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Json(json!({"status": "error"}))
                    }
                }
            }),
        );
        let base = spawn_upstream(app).await;

        let assets = fetcher(&base).fetch("dev-1").await;
        assert!(assets.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_empty_list() {
        // Bind then drop to obtain a dead port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let assets = fetcher(&format!("http://{}", addr)).fetch("dev-1").await;
        assert!(assets.is_empty());
    }

    #[tokio::test]
    async fn offline_probe_skips_requests() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = listener.local_addr().unwrap();
        drop(listener);

        let hits = Arc::new(AtomicUsize::new(0));
        let app = Router::new().route(
            "/media/:device_id",
            get({
                let hits = hits.clone();
                move || {
                    let hits = hits.clone();
                    async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        Json(json!({"status": "success", "data": {"mediaAllData": []}}))
                    }
                }
            }),
        );
        let base = spawn_upstream(app).await;

        let fetcher = CatalogFetcher::new(&base, Some(Connectivity::new(dead_addr.to_string())))
            .unwrap()
            .with_retry_base(Duration::from_millis(10));

        let assets = fetcher.fetch("dev-1").await;
        assert!(assets.is_empty());
        assert_eq!(hits.load(Ordering::SeqCst), 0, "no request should reach upstream");
    }
}
