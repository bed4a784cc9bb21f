//! Permission checks delegated to the document system's REST API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::DocumentApiConfig;
use crate::metrics;

use super::error::AuthError;
use super::types::{Caller, Identity, ManagementCredentials};

/// Answers the permission questions the streaming layer cannot decide from
/// local state: page readability and management identity.
#[async_trait]
pub trait PermissionOracle: Send + Sync {
    /// Whether the caller can read the given page.
    async fn check_page_access(&self, page_id: i64, caller: &Caller) -> Result<bool, AuthError>;

    /// Resolves management credentials to a user identity.
    async fn verify_manager(
        &self,
        credentials: &ManagementCredentials,
    ) -> Result<Identity, AuthError>;

    /// Oracle name for logging.
    fn name(&self) -> &str;
}

/// Oracle backed by the document system's HTTP API.
///
/// Page checks run with the caller's own credentials when present, so the
/// document system's per-user permissions apply. Anonymous callers are
/// checked with the configured service account.
pub struct DocumentApiOracle {
    client: Client,
    base_url: String,
    service_credentials: ManagementCredentials,
}

impl DocumentApiOracle {
    pub fn new(config: &DocumentApiConfig) -> Result<Self, AuthError> {
        if config.url.is_empty() {
            return Err(AuthError::ConfigurationError(
                "document API URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| AuthError::ConfigurationError(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            service_credentials: ManagementCredentials::new(&config.token_id, &config.token_secret),
        })
    }

    async fn page_lookup(&self, page_id: i64, caller: &Caller) -> Result<bool, AuthError> {
        let url = format!("{}/api/pages/{}", self.base_url, page_id);
        let credentials = caller.credentials().unwrap_or(&self.service_credentials);

        debug!(
            "page access check: page_id={}, caller_credentials={}",
            page_id,
            !caller.is_anonymous()
        );

        let response = self
            .client
            .get(&url)
            .header("Authorization", credentials.header_value())
            .send()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(true);
        }
        // The document system reports pages the caller cannot see as missing
        if status == 401 || status == 403 || status == 404 {
            return Ok(false);
        }

        Err(AuthError::ServiceUnavailable(format!(
            "page lookup returned {}",
            status
        )))
    }

    async fn identity_lookup(
        &self,
        credentials: &ManagementCredentials,
    ) -> Result<Identity, AuthError> {
        let url = format!("{}/api/users/me", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", credentials.header_value())
            .send()
            .await
            .map_err(|e| AuthError::ServiceUnavailable(e.to_string()))?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(AuthError::InvalidCredentials(
                "management credentials rejected".to_string(),
            ));
        }
        if !status.is_success() {
            return Err(AuthError::ServiceUnavailable(format!(
                "identity lookup returned {}",
                status
            )));
        }

        let profile: UserProfile = response.json().await.map_err(|e| {
            AuthError::ServiceUnavailable(format!("failed to parse identity response: {}", e))
        })?;

        Ok(Identity {
            user_id: profile.id,
            name: profile.name,
            email: profile.email,
        })
    }
}

#[async_trait]
impl PermissionOracle for DocumentApiOracle {
    async fn check_page_access(&self, page_id: i64, caller: &Caller) -> Result<bool, AuthError> {
        let started = Instant::now();
        let result = self.page_lookup(page_id, caller).await;

        metrics::ORACLE_DURATION
            .with_label_values(&["page_access"])
            .observe(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::ORACLE_REQUESTS
            .with_label_values(&["page_access", status])
            .inc();

        result
    }

    async fn verify_manager(
        &self,
        credentials: &ManagementCredentials,
    ) -> Result<Identity, AuthError> {
        let started = Instant::now();
        let result = self.identity_lookup(credentials).await;

        metrics::ORACLE_DURATION
            .with_label_values(&["verify_manager"])
            .observe(started.elapsed().as_secs_f64());
        let status = if result.is_ok() { "success" } else { "error" };
        metrics::ORACLE_REQUESTS
            .with_label_values(&["verify_manager", status])
            .inc();

        result
    }

    fn name(&self) -> &str {
        "document_api"
    }
}

#[derive(Debug, Deserialize)]
struct UserProfile {
    id: i64,
    name: String,
    #[serde(default)]
    email: String,
}
