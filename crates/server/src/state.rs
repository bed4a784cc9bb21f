use std::sync::Arc;

use reelgate_core::{
    BlobStore, Config, JobScheduler, MediaStore, PermissionOracle, SanitizedConfig, StreamingGate,
    TokenIssuer,
};

/// Shared application state
pub struct AppState {
    config: Config,
    store: Arc<dyn MediaStore>,
    blobs: Arc<dyn BlobStore>,
    scheduler: Arc<JobScheduler>,
    issuer: TokenIssuer,
    gate: StreamingGate,
    oracle: Option<Arc<dyn PermissionOracle>>,
}

impl AppState {
    pub fn new(
        config: Config,
        store: Arc<dyn MediaStore>,
        blobs: Arc<dyn BlobStore>,
        scheduler: Arc<JobScheduler>,
        issuer: TokenIssuer,
        gate: StreamingGate,
        oracle: Option<Arc<dyn PermissionOracle>>,
    ) -> Self {
        Self {
            config,
            store,
            blobs,
            scheduler,
            issuer,
            gate,
            oracle,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn store(&self) -> &dyn MediaStore {
        self.store.as_ref()
    }

    pub fn blobs(&self) -> &dyn BlobStore {
        self.blobs.as_ref()
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    pub fn gate(&self) -> &StreamingGate {
        &self.gate
    }

    /// The permission oracle, when a document API is configured.
    pub fn oracle(&self) -> Option<&Arc<dyn PermissionOracle>> {
        self.oracle.as_ref()
    }
}
