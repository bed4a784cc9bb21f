//! Viewer token issuance.
//!
//! Whether a token is granted depends on the video's visibility:
//!
//! - `public` / `unlisted`: granted to anyone who can name the video.
//! - `page_protected`: granted when the caller can read the video's page,
//!   as reported by the permission oracle.
//! - `private`: granted only to verified management credentials.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::store::{Video, Visibility};

use super::error::AuthError;
use super::oracle::PermissionOracle;
use super::signer::TokenSigner;
use super::types::{Caller, IssuedToken};

/// Decides whether a caller may obtain a viewer token and mints it.
pub struct TokenIssuer {
    signer: TokenSigner,
    oracle: Option<Arc<dyn PermissionOracle>>,
}

impl TokenIssuer {
    pub fn new(signer: TokenSigner, oracle: Option<Arc<dyn PermissionOracle>>) -> Self {
        Self { signer, oracle }
    }

    /// Issues a viewer token for the video, enforcing its visibility policy.
    pub async fn issue(
        &self,
        video: &Video,
        page_id: Option<i64>,
        caller: &Caller,
    ) -> Result<IssuedToken, AuthError> {
        match video.visibility {
            Visibility::Public | Visibility::Unlisted => {
                // Open visibilities accept the token request as-is
                Ok(self.signer.issue(&video.id, page_id))
            }
            Visibility::PageProtected => self.issue_page_protected(video, page_id, caller).await,
            Visibility::Private => self.issue_private(video, page_id, caller).await,
        }
    }

    async fn issue_page_protected(
        &self,
        video: &Video,
        page_id: Option<i64>,
        caller: &Caller,
    ) -> Result<IssuedToken, AuthError> {
        let page_id = page_id.ok_or_else(|| {
            AuthError::Forbidden("this video requires a page context".to_string())
        })?;

        if let Some(bound_page) = video.page_id {
            if bound_page != page_id {
                return Err(AuthError::Forbidden(
                    "video is not available on this page".to_string(),
                ));
            }
        }

        match &self.oracle {
            Some(oracle) => {
                if !oracle.check_page_access(page_id, caller).await? {
                    return Err(AuthError::Forbidden("page not accessible".to_string()));
                }
                debug!(
                    "page access granted: video_id={}, page_id={}, oracle={}",
                    video.id,
                    page_id,
                    oracle.name()
                );
            }
            None => {
                warn!(
                    "no permission oracle configured, allowing page-protected access: video_id={}, page_id={}",
                    video.id, page_id
                );
            }
        }

        Ok(self.signer.issue(&video.id, Some(page_id)))
    }

    async fn issue_private(
        &self,
        video: &Video,
        page_id: Option<i64>,
        caller: &Caller,
    ) -> Result<IssuedToken, AuthError> {
        let credentials = caller
            .credentials()
            .ok_or_else(|| AuthError::Forbidden("this video is private".to_string()))?;

        // Private videos fail closed: without an oracle the credentials
        // cannot be verified
        let oracle = self.oracle.as_ref().ok_or_else(|| {
            AuthError::Forbidden("management verification is not configured".to_string())
        })?;

        let identity = oracle.verify_manager(credentials).await?;
        debug!(
            "private access granted: video_id={}, user_id={}, name={}",
            video.id, identity.user_id, identity.name
        );

        Ok(self.signer.issue(&video.id, page_id))
    }
}
