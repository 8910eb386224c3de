//! Error taxonomy for the trace pipeline
//!
//! Boundary traits (transport, map, collections) report `anyhow::Error`; the
//! service client and the orchestrator fold those into [`TraceError`] so the
//! host shell always receives one user-facing message per failed operation.

/// Trace pipeline errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TraceError {
    /// The backend answered with its error sentinel; carries the decoded message
    #[error("Query failed, message: {0}")]
    Service(String),

    /// Well-formed but empty candidate list
    #[error("No data currently matches this condition")]
    EmptyResult,

    /// Response did not decode to the expected shape
    #[error("Unexpected response from trace service: {0}")]
    MalformedResult(String),

    /// Start-point mode is active but no start point has been resolved
    #[error("Start point not set")]
    MissingInput,

    /// HTTP-level failure (connection, non-success status)
    #[error("Trace service unreachable: {0}")]
    Transport(String),

    /// Converting the picked point to the service's spatial reference failed
    #[error("Coordinate projection failed: {0}")]
    Projection(String),

    /// A map capability call failed outside of per-layer processing
    #[error("Map operation failed: {0}")]
    Map(String),

    /// A pipeline is already running
    #[error("A trace is already in progress")]
    Busy,

    /// The run was replaced (teardown) before it finished; its result is dropped
    #[error("Trace was superseded")]
    Superseded,
}

/// Result type for trace operations
pub type TraceResult<T> = Result<T, TraceError>;

impl TraceError {
    /// Whether this error ends the pipeline and must be shown to the user.
    ///
    /// `Busy` is a rejected trigger and `Superseded` a discarded run: neither
    /// raises a message.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TraceError::Busy | TraceError::Superseded)
    }
}
