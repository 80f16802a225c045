//! HTTP client for FHIR R4 servers
//!
//! Implements [`FhirSearch`] over the FHIR REST API and adds resource creation
//! for the `seed` command.

use super::models::Bundle;
use super::search::FhirSearch;
use crate::config::FhirConfig;
use crate::domain::{CapacityError, FhirError, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, ClientBuilder, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

const FHIR_JSON: &str = "application/fhir+json";

/// FHIR REST client
///
/// # Example
///
/// ```no_run
/// use capacity_mapping::adapters::fhir::FhirClient;
/// use capacity_mapping::config::FhirConfig;
///
/// let config = FhirConfig {
///     base_url: "https://hapi.example.org/baseR4".to_string(),
///     ..Default::default()
/// };
/// let client = FhirClient::new(config).expect("valid configuration");
/// ```
pub struct FhirClient {
    base_url: String,
    client: Client,
    config: FhirConfig,
}

impl FhirClient {
    /// Create a new FHIR client from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the base URL is not a valid URL or the
    /// HTTP client cannot be built.
    pub fn new(config: FhirConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url).map_err(|e| {
            CapacityError::Configuration(format!("Invalid FHIR base URL '{base_url}': {e}"))
        })?;

        let mut client_builder = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification disabled for FHIR server");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            CapacityError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            base_url,
            client,
            config,
        })
    }

    /// Creates a resource on the server and returns the stored representation
    ///
    /// The POST is sent once; a failed create is never repeated.
    ///
    /// # Errors
    ///
    /// Returns a FHIR error if the server rejects the resource.
    pub async fn create(
        &self,
        resource_type: &str,
        resource: &serde_json::Value,
    ) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.base_url, resource_type);

        let request = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, FHIR_JSON)
            .body(resource.to_string());
        let resp = self.send(request).await?;
        read_json(resp).await
    }

    /// Build authorization header value
    fn auth_header_value(&self) -> Option<String> {
        match self.config.auth_type.as_str() {
            "basic" => {
                let username = self.config.username.as_deref()?;
                let password = self.config.password.as_ref()?;
                let credentials = format!("{username}:{}", password.expose_secret());
                let encoded = general_purpose::STANDARD.encode(credentials.as_bytes());
                Some(format!("Basic {encoded}"))
            }
            "bearer" => {
                let token = self.config.token.as_ref()?;
                Some(format!("Bearer {}", token.expose_secret()))
            }
            _ => None,
        }
    }

    fn search_url(&self, resource_type: &str) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, resource_type)).map_err(|e| {
            CapacityError::Fhir(FhirError::QueryFailed(format!(
                "Invalid search URL for {resource_type}: {e}"
            )))
        })?;

        if let Some(page_size) = self.config.page_size {
            url.query_pairs_mut()
                .append_pair("_count", &page_size.to_string());
        }

        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let mut request = request.header(ACCEPT, FHIR_JSON);
        if let Some(auth) = self.auth_header_value() {
            request = request.header(AUTHORIZATION, auth);
        }

        let resp = request.send().await.map_err(|e| {
            if e.is_timeout() {
                CapacityError::Fhir(FhirError::Timeout(e.to_string()))
            } else {
                CapacityError::Fhir(FhirError::ConnectionFailed(e.to_string()))
            }
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let message = resp.text().await.unwrap_or_default();
        let status = status.as_u16();
        Err(CapacityError::Fhir(if status >= 500 {
            FhirError::ServerError { status, message }
        } else {
            FhirError::ClientError { status, message }
        }))
    }

    async fn get_bundle(&self, url: &str) -> Result<Bundle> {
        tracing::debug!(url = %url, "Fetching FHIR bundle");

        self.retry_request(|| async {
            let resp = self.send(self.client.get(url)).await?;
            read_json(resp).await
        })
        .await
    }

    /// Retry a request with exponential backoff
    ///
    /// Client errors (4xx) are returned immediately.
    async fn retry_request<F, T, Fut>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.config.retry.max_retries;
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if attempt >= max_retries || !is_retryable(&e) {
                        return Err(e);
                    }

                    let delay_ms = self.config.retry.delay_ms(attempt);
                    crate::log_retry_attempt!(attempt, max_retries, e);
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
    }
}

fn is_retryable(error: &CapacityError) -> bool {
    !matches!(
        error,
        CapacityError::Fhir(FhirError::ClientError { .. })
            | CapacityError::Fhir(FhirError::InvalidResponse(_))
    )
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    resp.json::<T>()
        .await
        .map_err(|e| CapacityError::Fhir(FhirError::InvalidResponse(e.to_string())))
}

#[async_trait]
impl FhirSearch for FhirClient {
    async fn search(&self, resource_type: &str) -> Result<Bundle> {
        let url = self.search_url(resource_type)?;
        tracing::info!(
            base_url = %self.base_url,
            resource_type,
            "Searching FHIR server"
        );
        self.get_bundle(url.as_str()).await
    }

    async fn fetch_page(&self, url: &str) -> Result<Bundle> {
        self.get_bundle(url).await
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}
