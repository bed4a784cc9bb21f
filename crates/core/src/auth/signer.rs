//! Viewer token signing and validation.
//!
//! Tokens are stateless capability grants: `v1:{video}:{page|none}:{exp}:{sig}`
//! where `sig` is the first 32 hex characters of an HMAC-SHA256 over
//! `viewer:{video}:{page|none}:{exp}` with the deployment signing key. Trust
//! derives entirely from the signature and expiry; validation never consults
//! storage or the permission oracle.

use std::sync::Arc;

use sha2::{Digest, Sha256};

use super::clock::Clock;
use super::error::AuthError;
use super::types::{IssuedToken, ViewerToken};

const TOKEN_VERSION: &str = "v1";
const SIGNATURE_HEX_LEN: usize = 32;
const HMAC_BLOCK_SIZE: usize = 64;

/// Issues and validates viewer tokens.
#[derive(Clone)]
pub struct TokenSigner {
    signing_key: Vec<u8>,
    ttl_secs: u64,
    skew_secs: u64,
    clock: Arc<dyn Clock>,
}

impl TokenSigner {
    pub fn new(
        signing_key: impl Into<String>,
        ttl_secs: u64,
        skew_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signing_key: signing_key.into().into_bytes(),
            ttl_secs,
            skew_secs,
            clock,
        }
    }

    /// Mints a token for a video, optionally scoped to a page.
    pub fn issue(&self, video_id: &str, page_id: Option<i64>) -> IssuedToken {
        let expires_at = self.clock.now_unix() + self.ttl_secs as i64;
        let page_part = page_part(page_id);
        let signature = self.signature(video_id, &page_part, expires_at);

        IssuedToken {
            token: format!(
                "{}:{}:{}:{}:{}",
                TOKEN_VERSION, video_id, page_part, expires_at, signature
            ),
            expires_at,
            video_id: video_id.to_string(),
        }
    }

    /// Validates a token presented for the given video.
    ///
    /// Checks format, video binding, expiry (with skew tolerance), and
    /// signature, in that order.
    pub fn verify(&self, token: &str, video_id: &str) -> Result<ViewerToken, AuthError> {
        let parts: Vec<&str> = token.split(':').collect();
        if parts.len() != 5 || parts[0] != TOKEN_VERSION {
            return Err(AuthError::InvalidToken("malformed token".to_string()));
        }

        let token_video_id = parts[1];
        let page_part = parts[2];
        let expires_at: i64 = parts[3]
            .parse()
            .map_err(|_| AuthError::InvalidToken("malformed expiry".to_string()))?;
        let presented_sig = parts[4];

        let page_id = if page_part == "none" {
            None
        } else {
            Some(
                page_part
                    .parse::<i64>()
                    .map_err(|_| AuthError::InvalidToken("malformed page id".to_string()))?,
            )
        };

        if token_video_id != video_id {
            return Err(AuthError::InvalidToken("token video mismatch".to_string()));
        }

        if self.clock.now_unix() > expires_at + self.skew_secs as i64 {
            return Err(AuthError::TokenExpired);
        }

        // Recompute over the exact bytes the issuer signed
        let expected_sig = self.signature(token_video_id, page_part, expires_at);
        if !constant_time_eq(presented_sig.as_bytes(), expected_sig.as_bytes()) {
            return Err(AuthError::InvalidToken("invalid signature".to_string()));
        }

        Ok(ViewerToken {
            video_id: token_video_id.to_string(),
            page_id,
            expires_at,
        })
    }

    fn signature(&self, video_id: &str, page_part: &str, expires_at: i64) -> String {
        let payload = format!("viewer:{}:{}:{}", video_id, page_part, expires_at);
        let mac = hmac_sha256(&self.signing_key, payload.as_bytes());
        let hex: String = mac.iter().map(|b| format!("{:02x}", b)).collect();
        hex[..SIGNATURE_HEX_LEN].to_string()
    }
}

fn page_part(page_id: Option<i64>) -> String {
    match page_id {
        Some(id) => id.to_string(),
        None => "none".to_string(),
    }
}

/// HMAC-SHA256 (RFC 2104) over the message with the given key.
fn hmac_sha256(key: &[u8], message: &[u8]) -> [u8; 32] {
    let mut block_key = [0u8; HMAC_BLOCK_SIZE];
    if key.len() > HMAC_BLOCK_SIZE {
        let digest = Sha256::digest(key);
        block_key[..digest.len()].copy_from_slice(&digest);
    } else {
        block_key[..key.len()].copy_from_slice(key);
    }

    let mut inner = Sha256::new();
    let ipad: Vec<u8> = block_key.iter().map(|b| b ^ 0x36).collect();
    inner.update(&ipad);
    inner.update(message);
    let inner_hash = inner.finalize();

    let mut outer = Sha256::new();
    let opad: Vec<u8> = block_key.iter().map(|b| b ^ 0x5c).collect();
    outer.update(&opad);
    outer.update(inner_hash);
    outer.finalize().into()
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}
