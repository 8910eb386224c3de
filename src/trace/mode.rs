//! Trace mode selection
//!
//! Holds the active input mode and both modes' values. Switching modes never
//! clears the other mode's value, so the user can switch back without
//! re-entering anything.

use crate::error::{TraceError, TraceResult};
use crate::models::{TraceInput, TraceMode};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceModeSelector {
    mode: TraceMode,
    candidate_id: Option<String>,
    resolved_start_point: String,
}

impl TraceModeSelector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> TraceMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TraceMode) {
        self.mode = mode;
    }

    pub fn candidate_id(&self) -> Option<&str> {
        self.candidate_id.as_deref()
    }

    pub fn select_candidate(&mut self, candidate_id: &str) {
        self.candidate_id = Some(candidate_id.to_string());
    }

    pub fn resolved_start_point(&self) -> &str {
        &self.resolved_start_point
    }

    pub fn set_resolved_start_point(&mut self, id: &str) {
        self.resolved_start_point = id.to_string();
    }

    /// The value to send for the active mode.
    ///
    /// Start-point mode without a resolved point yields `MissingInput`.
    /// Subnetwork mode sends the selected candidate, or an empty id when the
    /// candidate list has not been loaded.
    pub fn trace_input(&self) -> TraceResult<TraceInput> {
        match self.mode {
            TraceMode::Subnetwork => Ok(TraceInput::Subnetwork {
                candidate_id: self.candidate_id.clone().unwrap_or_default(),
            }),
            TraceMode::StartPoint if self.resolved_start_point.is_empty() => {
                Err(TraceError::MissingInput)
            }
            TraceMode::StartPoint => Ok(TraceInput::StartPoint {
                resolved_id: self.resolved_start_point.clone(),
            }),
        }
    }
}
