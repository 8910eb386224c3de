//! trace-diagram library
//!
//! Subnetwork and start-point tracing against a remote trace service, with
//! schematic diagram export, map highlighting of the traced features and
//! selection sync into other data collections. Used both by the binary and
//! by the integration tests.

pub mod config;
pub mod error;
pub mod map;
pub mod models;
pub mod selection;
pub mod service;
pub mod shell;
pub mod trace;

// Re-export commonly used types for convenience
pub use error::{TraceError, TraceResult};
pub use models::{FeatureId, HighlightedFeature, TraceCandidate, TraceInput, TraceMode};
pub use trace::{PickOutcome, PipelineOutcome, PipelineState, TraceSession};
