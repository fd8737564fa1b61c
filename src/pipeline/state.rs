//! Pipeline states and error kinds.

use thiserror::Error;

/// Failures that move the pipeline into [`PipelineState::Error`].
///
/// Both are recoverable by running again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("OCR engine failed to load: {0}")]
    EngineLoad(String),
    #[error("OCR failed: {0}")]
    Recognition(String),
}

/// Recognition pipeline state machine states.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    /// Nothing in flight (initial state, and after clear)
    #[default]
    Idle,
    /// Loading the recognition engine
    LoadingEngine,
    /// Engine is recognizing the image
    Recognizing,
    /// Turning recognized text into a draft
    Parsing,
    /// A draft is available
    Done,
    /// The last run failed
    Error(String),
}

impl PipelineState {
    /// True while a run is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            PipelineState::LoadingEngine | PipelineState::Recognizing | PipelineState::Parsing
        )
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::LoadingEngine => write!(f, "Loading engine"),
            PipelineState::Recognizing => write!(f, "Recognizing"),
            PipelineState::Parsing => write!(f, "Parsing"),
            PipelineState::Done => write!(f, "Done"),
            PipelineState::Error(msg) => write!(f, "Error: {}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_display() {
        assert_eq!(format!("{}", PipelineState::Idle), "Idle");
        assert_eq!(format!("{}", PipelineState::LoadingEngine), "Loading engine");
        assert_eq!(
            format!("{}", PipelineState::Error("test".to_string())),
            "Error: test"
        );
    }

    #[test]
    fn test_busy_states() {
        assert!(!PipelineState::Idle.is_busy());
        assert!(PipelineState::LoadingEngine.is_busy());
        assert!(PipelineState::Recognizing.is_busy());
        assert!(PipelineState::Parsing.is_busy());
        assert!(!PipelineState::Done.is_busy());
        assert!(!PipelineState::Error(String::new()).is_busy());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            PipelineError::Recognition("bad image".to_string()).to_string(),
            "OCR failed: bad image"
        );
        assert_eq!(
            PipelineError::EngineLoad("missing".to_string()).to_string(),
            "OCR engine failed to load: missing"
        );
    }
}
