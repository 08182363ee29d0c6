use crate::auth::CredentialProvider;
use crate::cache::NeighborCache;
use crate::error::{ProspectorError, Result};
use crate::profile::ProfileSummary;
use crate::source::NeighborSource;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Response envelope from the similarity proxy
#[derive(Deserialize)]
struct SimilarResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<SimilarData>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SimilarData {
    #[serde(default)]
    similar_profiles: Vec<ProfileSummary>,
}

/// Neighbor source backed by the REST similarity proxy
///
/// Issues `GET {base_url}/similar-by-username?username=…` with a bearer
/// token when one is available. No retries: a start-time failure is
/// surfaced to the operator and an expansion-time failure is dropped by
/// the engine, so retrying here would only hide the contract.
pub struct HttpNeighborSource {
    client: Client,
    base_url: String,
    credentials: Arc<dyn CredentialProvider>,
    cache: Option<Arc<NeighborCache>>,
}

impl HttpNeighborSource {
    /// Create a new proxy client
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be created (should not happen in
    /// normal operation)
    pub fn new(
        base_url: String,
        timeout_secs: u64,
        credentials: Arc<dyn CredentialProvider>,
        cache: Option<Arc<NeighborCache>>,
    ) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            cache,
        }
    }

    fn parse_body(body: &str) -> Result<Vec<ProfileSummary>> {
        let envelope: SimilarResponse = serde_json::from_str(body)
            .map_err(|e| ProspectorError::Source(format!("Failed to parse response: {}", e)))?;

        if !envelope.success {
            return Err(ProspectorError::Source(
                envelope
                    .message
                    .unwrap_or_else(|| "similar lookup failed".to_string()),
            ));
        }

        Ok(envelope.data.map(|d| d.similar_profiles).unwrap_or_default())
    }

    async fn fetch_from_proxy(&self, identifier: &str) -> Result<Vec<ProfileSummary>> {
        let url = format!("{}/similar-by-username", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("username", identifier)]);

        if let Some(token) = self.credentials.access_token() {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ProspectorError::Source(format!("Network error: {}", e)))?;

        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            return Err(ProspectorError::Source(
                "Authentication rejected by proxy (401)".to_string(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProspectorError::Source(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(ProspectorError::Source(format!(
                "Proxy error {}: {}",
                status, body
            )));
        }

        Self::parse_body(&body)
    }
}

#[async_trait]
impl NeighborSource for HttpNeighborSource {
    async fn fetch_neighbors(&self, identifier: &str) -> Result<Vec<ProfileSummary>> {
        if let Some(cache) = &self.cache {
            if let Some(cached) = cache.get(identifier) {
                log::debug!("Neighbor cache hit for {}", identifier);
                return Ok(cached);
            }
        }

        let neighbors = self.fetch_from_proxy(identifier).await?;

        if let Some(cache) = &self.cache {
            cache.put(identifier.to_string(), neighbors.clone());
        }

        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::StaticCredentials;

    fn source() -> HttpNeighborSource {
        HttpNeighborSource::new(
            "https://api.example.com/profiles/".to_string(),
            30,
            Arc::new(StaticCredentials::new(Some("tok".to_string()))),
            None,
        )
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let s = source();
        assert_eq!(s.base_url, "https://api.example.com/profiles");
    }

    #[test]
    fn test_parse_body_success() {
        let body = r#"{
            "success": true,
            "data": {
                "currentUser": { "username": "alice", "urn": "urn:x" },
                "similarProfiles": [
                    { "publicIdentifier": "bob", "firstName": "Bob" },
                    { "publicIdentifier": "carol" }
                ]
            }
        }"#;
        let profiles = HttpNeighborSource::parse_body(body).unwrap();
        assert_eq!(profiles.len(), 2);
        assert_eq!(profiles[0].public_identifier, "bob");
        assert_eq!(profiles[1].public_identifier, "carol");
    }

    #[test]
    fn test_parse_body_reported_failure() {
        let body = r#"{ "success": false, "message": "upstream down" }"#;
        let err = HttpNeighborSource::parse_body(body).unwrap_err();
        assert!(matches!(err, ProspectorError::Source(_)));
        assert!(err.to_string().contains("upstream down"));
    }

    #[test]
    fn test_parse_body_empty_profiles_is_success() {
        let body = r#"{ "success": true, "data": { "similarProfiles": [] } }"#;
        let profiles = HttpNeighborSource::parse_body(body).unwrap();
        assert!(profiles.is_empty());
    }

    #[test]
    fn test_parse_body_missing_data_is_empty() {
        let body = r#"{ "success": true }"#;
        let profiles = HttpNeighborSource::parse_body(body).unwrap();
        assert!(profiles.is_empty());
    }

    #[test]
    fn test_parse_body_malformed() {
        let err = HttpNeighborSource::parse_body("{oops").unwrap_err();
        assert!(matches!(err, ProspectorError::Source(_)));
    }
}
