//! Trace-and-diagram workflow
//!
//! Mode selection, interactive start-point picking, the four-stage pipeline
//! (resolve input, trace, build diagram, export) and the result set it leaves
//! highlighted on the map. [`TraceSession`] ties them to one map view.

mod highlight;
mod mode;
mod orchestrator;
mod picker;
mod session;

pub use highlight::{HighlightManager, HighlightSummary, HighlightTicket};
pub use mode::TraceModeSelector;
pub use orchestrator::{
    LoadingFlag, PipelineOutcome, PipelineState, SideEffects, TraceOrchestrator,
};
pub use picker::{PickOutcome, StartPointPicker};
pub use session::TraceSession;
