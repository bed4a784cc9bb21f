pub mod auth;
pub mod config;
pub mod encoder;
pub mod gate;
pub mod metrics;
pub mod pipeline;
pub mod scheduler;
pub mod storage;
pub mod store;
pub mod testing;

pub use auth::{
    create_oracle, create_signer, AuthError, Caller, Clock, DocumentApiOracle, Identity,
    IssuedToken, ManagementCredentials, PermissionOracle, SystemClock, TokenIssuer, TokenSigner,
    ViewerToken,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use encoder::{Encoder, EncoderConfig, EncoderError, FfmpegEncoder, MediaInfo};
pub use gate::{GateError, StreamingGate};
pub use pipeline::{JobRunner, PipelineError};
pub use scheduler::{JobScheduler, SchedulerError, SchedulerStatus};
pub use storage::{BlobStore, FsBlobStore, StorageError};
pub use store::{
    CreateVariantRequest, CreateVideoRequest, FailureClass, Job, JobFilter, JobState, MediaStore,
    SqliteMediaStore, StoreError, Variant, Video, VideoFilter, VideoStatus, Visibility,
};
