//! `reqwest`-backed transport.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE};
use secrecy::ExposeSecret;
use tracing::{debug, instrument};
use url::Url;

use super::{ApiRequest, ApiResponse, Transport, TransportError};
use crate::config::StorefrontConfig;

/// Transport that talks to the real backend over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built
    /// (e.g. TLS backend initialisation failure).
    pub fn new(config: &StorefrontConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
        })
    }

    /// Resolve an API path against the base URL, keeping any base path prefix.
    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let joined = format!("{base}/{}", path.trim_start_matches('/'));
        Url::parse(&joined).map_err(|e| TransportError::Http(format!("invalid URL {joined}: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self, request), fields(method = %request.method, path = %request.path))]
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(&request.path)?;

        let mut builder = self.client.request(request.method, url);
        if let Some(bearer) = &request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {}", bearer.expose_secret()));
        }
        if let Some(cookie) = &request.cookie {
            builder = builder.header(COOKIE, cookie.expose_secret());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let response = builder.send().await?;
        let status = response.status();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_owned)
            .collect();
        let body = response.text().await?;

        debug!(status = %status, "Response received");

        Ok(ApiResponse {
            status,
            set_cookies,
            body,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_url_for_keeps_base_path() {
        let config = StorefrontConfig::for_base_url("https://shop.example.com/backend/").unwrap();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.url_for("/api/cart/count").unwrap().as_str(),
            "https://shop.example.com/backend/api/cart/count"
        );
    }

    #[test]
    fn test_url_for_root_base() {
        let config = StorefrontConfig::for_base_url("http://localhost:8080").unwrap();
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.url_for("api/favorites/ids").unwrap().as_str(),
            "http://localhost:8080/api/favorites/ids"
        );
    }
}
