//! Client IP to region lookup.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use backoff::ExponentialBackoff;
use reqwest::{Client, StatusCode};
use tracing::debug;

use super::types::GeoResponse;

/// Region reported when a lookup is skipped or fails.
pub const UNKNOWN_REGION: &str = "unknown";

const GEO_API_BASE: &str = "http://ip-api.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Geo lookup settings.
#[derive(Debug, Clone)]
pub struct GeoConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Budget for one lookup, retries included.
    pub timeout: Duration,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: GEO_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Resolves client addresses to country codes over HTTP.
#[derive(Debug, Clone)]
pub struct GeoLocator {
    client: Option<Client>,
    base_url: String,
    timeout: Duration,
}

impl GeoLocator {
    pub fn new(config: GeoConfig) -> Result<Self> {
        let client = if config.enabled {
            Some(
                Client::builder()
                    .timeout(config.timeout)
                    .build()
                    .context("Failed to create HTTP client")?,
            )
        } else {
            None
        };

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout,
        })
    }

    /// A locator that never performs I/O.
    pub fn disabled() -> Self {
        Self {
            client: None,
            base_url: GEO_API_BASE.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Country code for `ip`, or [`UNKNOWN_REGION`].
    pub async fn locate(&self, ip: IpAddr) -> String {
        let Some(client) = &self.client else {
            return UNKNOWN_REGION.to_string();
        };
        if !is_routable(ip) {
            return UNKNOWN_REGION.to_string();
        }

        match self.lookup(client, ip).await {
            Ok(Some(code)) => code,
            Ok(None) => {
                debug!(ip = %ip, "Geo lookup found no country");
                UNKNOWN_REGION.to_string()
            }
            Err(e) => {
                debug!(ip = %ip, error = %e, "Geo lookup failed");
                UNKNOWN_REGION.to_string()
            }
        }
    }

    async fn lookup(&self, client: &Client, ip: IpAddr) -> Result<Option<String>> {
        let url = format!("{}/json/{}?fields=status,countryCode", self.base_url, ip);
        let url = url.as_str();

        let policy = ExponentialBackoff {
            initial_interval: Duration::from_millis(100),
            max_elapsed_time: Some(self.timeout),
            ..Default::default()
        };

        let response: GeoResponse = backoff::future::retry(policy, || async move {
            let response = client
                .get(url)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(anyhow!(e).context("Geo request failed")))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                return Err(backoff::Error::transient(anyhow!(
                    "Geo request failed: {}",
                    status
                )));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(anyhow!(
                    "Geo request failed: {}",
                    status
                )));
            }

            response
                .json::<GeoResponse>()
                .await
                .map_err(|e| backoff::Error::permanent(anyhow!(e).context("Failed to parse geo response")))
        })
        .await?;

        Ok(response.country())
    }
}

/// Whether `ip` could belong to a public host.
pub fn is_routable(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation())
        }
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return is_routable(IpAddr::V4(v4));
            }
            let first = v6.segments()[0];
            let unique_local = first & 0xfe00 == 0xfc00;
            let link_local = first & 0xffc0 == 0xfe80;
            !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
        }
    }
}
