//! Viewer token issuance and validation.
//!
//! Access to stream content is granted through short-lived HMAC-signed
//! tokens. [`TokenSigner`] mints and validates the tokens themselves;
//! [`TokenIssuer`] decides who gets one based on the video's visibility,
//! consulting the [`PermissionOracle`] for page readability and management
//! identity checks.

mod clock;
mod error;
mod issuer;
mod oracle;
mod signer;
mod types;

pub use clock::{Clock, SystemClock};
pub use error::AuthError;
pub use issuer::TokenIssuer;
pub use oracle::{DocumentApiOracle, PermissionOracle};
pub use signer::TokenSigner;
pub use types::{Caller, Identity, IssuedToken, ManagementCredentials, ViewerToken};

use std::sync::Arc;

use crate::config::AuthConfig;

/// Factory function to create the token signer from config
pub fn create_signer(config: &AuthConfig, clock: Arc<dyn Clock>) -> Result<TokenSigner, AuthError> {
    if config.signing_key.is_empty() {
        return Err(AuthError::ConfigurationError(
            "auth.signing_key must be set".to_string(),
        ));
    }

    Ok(TokenSigner::new(
        config.signing_key.clone(),
        config.token_ttl_secs,
        config.clock_skew_secs,
        clock,
    ))
}

/// Factory function to create the permission oracle from config.
///
/// Returns `None` when no document API is configured; issuance and the
/// streaming gate then apply their oracle-less fallbacks.
pub fn create_oracle(
    config: &AuthConfig,
) -> Result<Option<Arc<dyn PermissionOracle>>, AuthError> {
    match &config.document_api {
        Some(api) => Ok(Some(Arc::new(DocumentApiOracle::new(api)?))),
        None => Ok(None),
    }
}
