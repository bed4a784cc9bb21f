//! HTTP server for the reelgate video pipeline.
//!
//! Exposed as a library so integration tests can assemble the router
//! in-process with mock dependencies.

pub mod api;
pub mod metrics;
pub mod state;
