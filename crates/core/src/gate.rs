//! Per-request streaming authorization.
//!
//! Every playlist, segment, and thumbnail fetch passes through
//! [`StreamingGate::authorize`]. The decision combines the video's
//! visibility with the presented credentials, then folds in readiness:
//! an unauthorized caller is told a not-ready video does not exist, while
//! an authorized caller learns its current status.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::auth::{AuthError, Caller, PermissionOracle, TokenSigner};
use crate::store::{Video, VideoStatus, Visibility};

/// Denial outcomes of the streaming gate.
///
/// `Forbidden` and `NotFound` deliberately carry no detail; an
/// unauthorized caller must not be able to tell a denied video from a
/// missing one.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("not found")]
    NotFound,
    #[error("access denied")]
    Forbidden,
    #[error("video is not ready: {status}")]
    NotReady { status: VideoStatus },
    #[error("permission service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// Authorizes stream content delivery for a single request.
pub struct StreamingGate {
    signer: TokenSigner,
    oracle: Option<Arc<dyn PermissionOracle>>,
}

impl StreamingGate {
    pub fn new(signer: TokenSigner, oracle: Option<Arc<dyn PermissionOracle>>) -> Self {
        Self { signer, oracle }
    }

    /// Decides whether this request may fetch the video's stream content.
    ///
    /// `token` is the viewer token from the request, if any; `caller`
    /// carries management credentials when the request presented them.
    pub async fn authorize(
        &self,
        video: &Video,
        token: Option<&str>,
        caller: &Caller,
    ) -> Result<(), GateError> {
        let access = self.check_access(video, token, caller).await;

        match (access, video.is_ready()) {
            (Ok(()), true) => Ok(()),
            (Ok(()), false) => Err(GateError::NotReady {
                status: video.status,
            }),
            (Err(GateError::ServiceUnavailable(reason)), _) => {
                Err(GateError::ServiceUnavailable(reason))
            }
            (Err(_), true) => Err(GateError::Forbidden),
            // Unauthorized callers cannot learn that a hidden video exists
            (Err(_), false) => Err(GateError::NotFound),
        }
    }

    async fn check_access(
        &self,
        video: &Video,
        token: Option<&str>,
        caller: &Caller,
    ) -> Result<(), GateError> {
        match video.visibility {
            Visibility::Public | Visibility::Unlisted => Ok(()),
            Visibility::PageProtected => self.check_viewer_token(video, token),
            Visibility::Private => self.check_manager(video, caller).await,
        }
    }

    fn check_viewer_token(&self, video: &Video, token: Option<&str>) -> Result<(), GateError> {
        let token = token.ok_or(GateError::Forbidden)?;

        let claims = self.signer.verify(token, &video.id).map_err(|e| {
            debug!("viewer token rejected: video_id={}, reason={}", video.id, e);
            GateError::Forbidden
        })?;

        if let Some(bound_page) = video.page_id {
            if claims.page_id != Some(bound_page) {
                debug!(
                    "viewer token page mismatch: video_id={}, token_page={:?}, bound_page={}",
                    video.id, claims.page_id, bound_page
                );
                return Err(GateError::Forbidden);
            }
        }

        Ok(())
    }

    /// Private videos accept only management credentials, verified against
    /// the document system's identity API. Viewer tokens are never accepted.
    async fn check_manager(&self, video: &Video, caller: &Caller) -> Result<(), GateError> {
        let credentials = caller.credentials().ok_or(GateError::Forbidden)?;

        // Fail closed when identity cannot be verified
        let oracle = self.oracle.as_ref().ok_or(GateError::Forbidden)?;

        match oracle.verify_manager(credentials).await {
            Ok(identity) => {
                debug!(
                    "private stream access: video_id={}, user_id={}",
                    video.id, identity.user_id
                );
                Ok(())
            }
            Err(AuthError::ServiceUnavailable(reason)) => {
                Err(GateError::ServiceUnavailable(reason))
            }
            Err(e) => {
                debug!(
                    "management credentials rejected: video_id={}, reason={}",
                    video.id, e
                );
                Err(GateError::Forbidden)
            }
        }
    }
}
