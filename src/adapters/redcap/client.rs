//! REDCap API client
//!
//! Record import through the REDCap API (`content=record`, `action=import`)
//! using flat JSON records.

use super::sink::RecordSink;
use crate::config::RegistryConfig;
use crate::core::codebook::FlatRecord;
use crate::domain::{CapacityError, RegistryError, Result};
use async_trait::async_trait;
use reqwest::{Client, ClientBuilder};
use secrecy::ExposeSecret;
use std::time::Duration;

/// REDCap API client
pub struct RedcapClient {
    client: Client,
    config: RegistryConfig,
}

impl RedcapClient {
    /// Create a new REDCap client from configuration
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        let mut client_builder =
            ClientBuilder::new().timeout(Duration::from_secs(config.timeout_seconds));

        if !config.tls_verify {
            tracing::warn!("TLS certificate verification disabled for REDCap API");
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder.build().map_err(|e| {
            CapacityError::Configuration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self { client, config })
    }

    fn import_form(&self, data: &str) -> Vec<(&'static str, String)> {
        vec![
            ("token", self.config.token.expose_secret().to_string()),
            ("content", "record".to_string()),
            ("action", "import".to_string()),
            ("format", "json".to_string()),
            ("type", "flat".to_string()),
            ("overwriteBehavior", self.config.overwrite_behavior.clone()),
            ("returnContent", "count".to_string()),
            ("returnFormat", "json".to_string()),
            ("data", data.to_string()),
        ]
    }
}

/// Reads the `count` member of an import response
///
/// REDCap versions differ in whether the count is a number or a string.
fn parse_import_count(body: &serde_json::Value) -> Option<usize> {
    match body.get("count")? {
        serde_json::Value::Number(n) => n.as_u64().map(|n| n as usize),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[async_trait]
impl RecordSink for RedcapClient {
    async fn import_records(&self, records: &[FlatRecord]) -> Result<usize> {
        let data = serde_json::to_string(records)?;

        tracing::info!(
            api_url = %self.config.api_url,
            records = records.len(),
            overwrite_behavior = %self.config.overwrite_behavior,
            "Importing records into REDCap"
        );

        let resp = self
            .client
            .post(&self.config.api_url)
            .form(&self.import_form(&data))
            .send()
            .await
            .map_err(|e| RegistryError::ConnectionFailed(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(RegistryError::ImportRejected {
                status: status.as_u16(),
                message,
            }
            .into());
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RegistryError::InvalidResponse(e.to_string()))?;

        let count = parse_import_count(&body).ok_or_else(|| {
            RegistryError::InvalidResponse(format!("Missing import count in response: {body}"))
        })?;

        tracing::info!(count, "REDCap import completed");
        Ok(count)
    }

    fn destination(&self) -> &str {
        &self.config.api_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::secret_string;
    use serde_json::json;

    fn config() -> RegistryConfig {
        RegistryConfig {
            api_url: "https://redcap.example.org/api/".to_string(),
            token: secret_string("TOKEN123".to_string()),
            overwrite_behavior: "normal".to_string(),
            tls_verify: true,
            timeout_seconds: 30,
        }
    }

    #[test]
    fn test_import_form_fields() {
        let client = RedcapClient::new(config()).unwrap();
        let form = client.import_form("[]");

        let get = |key: &str| {
            form.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.as_str())
        };
        assert_eq!(get("token"), Some("TOKEN123"));
        assert_eq!(get("content"), Some("record"));
        assert_eq!(get("action"), Some("import"));
        assert_eq!(get("type"), Some("flat"));
        assert_eq!(get("overwriteBehavior"), Some("normal"));
        assert_eq!(get("returnContent"), Some("count"));
        assert_eq!(get("data"), Some("[]"));
    }

    #[test]
    fn test_parse_import_count() {
        assert_eq!(parse_import_count(&json!({"count": 4})), Some(4));
        assert_eq!(parse_import_count(&json!({"count": "7"})), Some(7));
        assert_eq!(parse_import_count(&json!({"error": "bad"})), None);
    }

    #[test]
    fn test_destination() {
        let client = RedcapClient::new(config()).unwrap();
        assert_eq!(client.destination(), "https://redcap.example.org/api/");
    }
}
