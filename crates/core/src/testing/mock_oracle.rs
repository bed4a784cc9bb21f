//! Mock permission oracle for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::{AuthError, Caller, Identity, ManagementCredentials, PermissionOracle};

/// A recorded page access check for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedPageCheck {
    /// Page that was checked.
    pub page_id: i64,
    /// Whether the caller presented credentials.
    pub with_credentials: bool,
}

/// Mock implementation of the PermissionOracle trait.
///
/// Pages deny access unless granted; managers are rejected unless
/// registered. A scripted error fails the next call so outage handling
/// can be exercised.
#[derive(Debug)]
pub struct MockOracle {
    /// Per-page access decisions.
    page_access: Arc<RwLock<HashMap<i64, bool>>>,
    /// Decision for pages with no explicit entry.
    default_page_access: Arc<RwLock<bool>>,
    /// Registered managers by token id: (secret, identity).
    managers: Arc<RwLock<HashMap<String, (String, Identity)>>>,
    /// If set, the next call will fail with this error.
    next_error: Arc<RwLock<Option<AuthError>>>,
    /// Recorded page checks.
    page_checks: Arc<RwLock<Vec<RecordedPageCheck>>>,
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl MockOracle {
    /// Create a new mock oracle that denies everything.
    pub fn new() -> Self {
        Self {
            page_access: Arc::new(RwLock::new(HashMap::new())),
            default_page_access: Arc::new(RwLock::new(false)),
            managers: Arc::new(RwLock::new(HashMap::new())),
            next_error: Arc::new(RwLock::new(None)),
            page_checks: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Make the given page readable.
    pub async fn grant_page(&self, page_id: i64) {
        self.page_access.write().await.insert(page_id, true);
    }

    /// Make the given page unreadable (overriding the default).
    pub async fn deny_page(&self, page_id: i64) {
        self.page_access.write().await.insert(page_id, false);
    }

    /// Set the decision for pages with no explicit entry.
    pub async fn set_default_page_access(&self, allow: bool) {
        *self.default_page_access.write().await = allow;
    }

    /// Register management credentials that verify to the given identity.
    pub async fn register_manager(&self, credentials: &ManagementCredentials, identity: Identity) {
        self.managers.write().await.insert(
            credentials.token_id.clone(),
            (credentials.token_secret.clone(), identity),
        );
    }

    /// Configure the next call to fail with the given error.
    pub async fn set_next_error(&self, error: AuthError) {
        *self.next_error.write().await = Some(error);
    }

    /// Get all recorded page checks.
    pub async fn recorded_page_checks(&self) -> Vec<RecordedPageCheck> {
        self.page_checks.read().await.clone()
    }

    /// Take the next error if set.
    async fn take_error(&self) -> Option<AuthError> {
        self.next_error.write().await.take()
    }
}

#[async_trait]
impl PermissionOracle for MockOracle {
    async fn check_page_access(&self, page_id: i64, caller: &Caller) -> Result<bool, AuthError> {
        self.page_checks.write().await.push(RecordedPageCheck {
            page_id,
            with_credentials: !caller.is_anonymous(),
        });

        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        match self.page_access.read().await.get(&page_id) {
            Some(allowed) => Ok(*allowed),
            None => Ok(*self.default_page_access.read().await),
        }
    }

    async fn verify_manager(
        &self,
        credentials: &ManagementCredentials,
    ) -> Result<Identity, AuthError> {
        if let Some(err) = self.take_error().await {
            return Err(err);
        }

        match self.managers.read().await.get(&credentials.token_id) {
            Some((secret, identity)) if *secret == credentials.token_secret => {
                Ok(identity.clone())
            }
            _ => Err(AuthError::InvalidCredentials(
                "management credentials rejected".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin() -> Identity {
        Identity {
            user_id: 7,
            name: "Admin".to_string(),
            email: "admin@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn test_pages_deny_by_default() {
        let oracle = MockOracle::new();
        assert!(!oracle
            .check_page_access(5, &Caller::Anonymous)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_granted_page_allows() {
        let oracle = MockOracle::new();
        oracle.grant_page(5).await;

        assert!(oracle
            .check_page_access(5, &Caller::Anonymous)
            .await
            .unwrap());
        assert!(!oracle
            .check_page_access(6, &Caller::Anonymous)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_default_page_access_flips_unlisted_pages() {
        let oracle = MockOracle::new();
        oracle.set_default_page_access(true).await;
        oracle.deny_page(9).await;

        assert!(oracle
            .check_page_access(1, &Caller::Anonymous)
            .await
            .unwrap());
        assert!(!oracle
            .check_page_access(9, &Caller::Anonymous)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_registered_manager_verifies() {
        let oracle = MockOracle::new();
        let credentials = ManagementCredentials::new("svc", "secret");
        oracle.register_manager(&credentials, admin()).await;

        let identity = oracle.verify_manager(&credentials).await.unwrap();
        assert_eq!(identity.user_id, 7);
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let oracle = MockOracle::new();
        oracle
            .register_manager(&ManagementCredentials::new("svc", "secret"), admin())
            .await;

        let result = oracle
            .verify_manager(&ManagementCredentials::new("svc", "wrong"))
            .await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials(_))));
    }

    #[tokio::test]
    async fn test_next_error_consumed_once() {
        let oracle = MockOracle::new();
        oracle.grant_page(5).await;
        oracle
            .set_next_error(AuthError::ServiceUnavailable("connect refused".to_string()))
            .await;

        assert!(oracle.check_page_access(5, &Caller::Anonymous).await.is_err());
        assert!(oracle
            .check_page_access(5, &Caller::Anonymous)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_page_checks_are_recorded() {
        let oracle = MockOracle::new();
        let _ = oracle.check_page_access(3, &Caller::Anonymous).await;
        let _ = oracle
            .check_page_access(
                4,
                &Caller::Manager(ManagementCredentials::new("svc", "secret")),
            )
            .await;

        let checks = oracle.recorded_page_checks().await;
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].page_id, 3);
        assert!(!checks[0].with_credentials);
        assert!(checks[1].with_credentials);
    }
}
