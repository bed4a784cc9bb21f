use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub auth: AuthConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub encoder: EncoderSettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Authentication configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Secret key used to sign viewer tokens (deployment secret)
    pub signing_key: String,
    /// Viewer token lifetime in seconds (short-lived: minutes, not hours)
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    /// Clock skew tolerated when validating token expiry
    #[serde(default = "default_clock_skew")]
    pub clock_skew_secs: u64,
    /// External document system API (permission oracle); when absent,
    /// page checks are skipped with a warning and private videos deny all
    /// viewer token requests
    #[serde(default)]
    pub document_api: Option<DocumentApiConfig>,
}

fn default_token_ttl() -> u64 {
    600
}

fn default_clock_skew() -> u64 {
    5
}

/// External document system API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DocumentApiConfig {
    /// Base URL (e.g., "http://bookstack.internal")
    pub url: String,
    /// Service account API token ID
    pub token_id: String,
    /// Service account API token secret
    pub token_secret: String,
    /// Request timeout in seconds (default: 10)
    #[serde(default = "default_api_timeout")]
    pub timeout_secs: u32,
}

fn default_api_timeout() -> u32 {
    10
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("reelgate.db")
}

/// Blob storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Root directory for original/variant/thumbnail blobs
    #[serde(default = "default_storage_root")]
    pub root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

fn default_storage_root() -> PathBuf {
    PathBuf::from("media")
}

/// Encoder invocation settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EncoderSettings {
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,
    #[serde(default = "default_ffprobe_path")]
    pub ffprobe_path: PathBuf,
    /// Timeout for a single encoder invocation in seconds
    #[serde(default = "default_encoder_timeout")]
    pub timeout_secs: u64,
    /// Concurrent preset encodes within one job
    #[serde(default = "default_job_concurrency")]
    pub job_concurrency: usize,
    /// Target segment duration in seconds
    #[serde(default = "default_segment_secs")]
    pub segment_secs: u32,
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            ffprobe_path: default_ffprobe_path(),
            timeout_secs: default_encoder_timeout(),
            job_concurrency: default_job_concurrency(),
            segment_secs: default_segment_secs(),
        }
    }
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_ffprobe_path() -> PathBuf {
    PathBuf::from("ffprobe")
}

fn default_encoder_timeout() -> u64 {
    3600
}

fn default_job_concurrency() -> usize {
    2
}

fn default_segment_secs() -> u32 {
    6
}

/// Pipeline and scheduler settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineSettings {
    /// Worker pool size
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Total attempts per job before it is failed for good
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Extra encode attempts per preset before that preset is abandoned
    #[serde(default = "default_preset_retries")]
    pub preset_retries: u32,
    /// Dispatch loop poll interval in seconds
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Enabled preset names, resolved against the built-in quality ladder
    #[serde(default = "default_presets")]
    pub presets: Vec<String>,
    /// Scratch directory for per-job encode workspaces
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            preset_retries: default_preset_retries(),
            poll_interval_secs: default_poll_interval(),
            presets: default_presets(),
            work_dir: default_work_dir(),
        }
    }
}

fn default_workers() -> usize {
    2
}

fn default_max_attempts() -> u32 {
    3
}

fn default_preset_retries() -> u32 {
    2
}

fn default_poll_interval() -> u64 {
    1
}

fn default_presets() -> Vec<String> {
    vec![
        "1080p".to_string(),
        "720p".to_string(),
        "480p".to_string(),
        "360p".to_string(),
    ]
}

fn default_work_dir() -> PathBuf {
    std::env::temp_dir().join("reelgate")
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub auth: SanitizedAuthConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub encoder: EncoderSettings,
    pub pipeline: PipelineSettings,
}

/// Sanitized auth config (signing key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedAuthConfig {
    pub signing_key_configured: bool,
    pub token_ttl_secs: u64,
    pub clock_skew_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_api: Option<SanitizedDocumentApiConfig>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SanitizedDocumentApiConfig {
    pub url: String,
    pub token_id: String,
    pub token_secret_configured: bool,
    pub timeout_secs: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            auth: SanitizedAuthConfig {
                signing_key_configured: !config.auth.signing_key.is_empty(),
                token_ttl_secs: config.auth.token_ttl_secs,
                clock_skew_secs: config.auth.clock_skew_secs,
                document_api: config.auth.document_api.as_ref().map(|d| {
                    SanitizedDocumentApiConfig {
                        url: d.url.clone(),
                        token_id: d.token_id.clone(),
                        token_secret_configured: !d.token_secret.is_empty(),
                        timeout_secs: d.timeout_secs,
                    }
                }),
            },
            server: config.server.clone(),
            database: config.database.clone(),
            storage: config.storage.clone(),
            encoder: config.encoder.clone(),
            pipeline: config.pipeline.clone(),
        }
    }
}
