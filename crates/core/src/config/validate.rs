use super::{types::Config, ConfigError};
use crate::encoder::presets;

/// Validate configuration
/// Currently validates:
/// - Auth section exists (enforced by serde)
/// - Signing key is long enough to be a real secret
/// - Server port is not 0
/// - Pool sizes are non-zero
/// - Enabled presets resolve against the quality ladder
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    // Server validation
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    // Auth validation
    if config.auth.signing_key.len() < 16 {
        return Err(ConfigError::ValidationError(
            "auth.signing_key must be at least 16 characters".to_string(),
        ));
    }
    if let Some(ref api) = config.auth.document_api {
        if api.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.document_api.url cannot be empty".to_string(),
            ));
        }
        if api.token_id.is_empty() || api.token_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "auth.document_api requires token_id and token_secret".to_string(),
            ));
        }
    }

    // Pipeline validation
    if config.pipeline.workers == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.workers cannot be 0".to_string(),
        ));
    }
    if config.pipeline.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "pipeline.max_attempts cannot be 0".to_string(),
        ));
    }
    if config.pipeline.presets.is_empty() {
        return Err(ConfigError::ValidationError(
            "pipeline.presets cannot be empty".to_string(),
        ));
    }
    presets::ladder_from_names(&config.pipeline.presets)
        .map_err(|unknown| {
            ConfigError::ValidationError(format!("unknown preset name: {}", unknown))
        })?;

    // Encoder validation
    if config.encoder.job_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "encoder.job_concurrency cannot be 0".to_string(),
        ));
    }
    if config.encoder.segment_secs == 0 {
        return Err(ConfigError::ValidationError(
            "encoder.segment_secs cannot be 0".to_string(),
        ));
    }

    Ok(())
}
