//! Network reachability checks
//!
//! Downloads and registration retries are gated on reachability of the
//! upstream host. The check is a bounded TCP connect; the probe target is
//! derived from the configured upstream URL, so tests can point it at a
//! local listener or a closed port.

use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Reachability prober for one upstream endpoint
#[derive(Debug, Clone)]
pub struct Connectivity {
    probe_addr: String,
    timeout: Duration,
}

impl Connectivity {
    pub fn new(probe_addr: impl Into<String>) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Derive the probe target from an upstream URL
    pub fn from_url(url: &str) -> Option<Self> {
        let parsed = reqwest::Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        let port = parsed.port_or_known_default()?;
        Some(Self::new(format!("{}:{}", host, port)))
    }

    /// Whether the upstream endpoint currently accepts connections
    pub async fn is_online(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.probe_addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Reachability probe to {} failed: {}", self.probe_addr, e);
                false
            }
            Err(_) => {
                debug!("Reachability probe to {} timed out", self.probe_addr);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn online_when_listener_accepts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connectivity = Connectivity::new(addr.to_string());
        assert!(connectivity.is_online().await);
    }

    #[tokio::test]
    async fn offline_when_port_closed() {
        // Bind then drop to obtain a port that refuses connections
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connectivity = Connectivity::new(addr.to_string());
        assert!(!connectivity.is_online().await);
    }

    #[test]
    fn probe_target_from_url() {
        let c = Connectivity::from_url("https://upstream.example.com/media").unwrap();
        assert_eq!(c.probe_addr, "upstream.example.com:443");

        let c = Connectivity::from_url("ws://upstream.example.com/").unwrap();
        assert_eq!(c.probe_addr, "upstream.example.com:80");

        let c = Connectivity::from_url("http://127.0.0.1:9443").unwrap();
        assert_eq!(c.probe_addr, "127.0.0.1:9443");

        assert!(Connectivity::from_url("not a url").is_none());
    }
}
