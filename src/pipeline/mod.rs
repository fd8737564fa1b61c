//! Recognition pipeline: image bytes → OCR → parsed stat block draft.
//!
//! The pipeline sequences through: Idle → LoadingEngine → Recognizing →
//! Parsing → Done, or into Error from any in-flight state. Recognition runs on
//! a worker thread; the owner drives transitions with [`Pipeline::poll`] or
//! [`Pipeline::wait`].

pub mod orchestrator;
pub mod state;
pub mod worker;

pub use orchestrator::{Pipeline, PipelineOptions};
pub use state::PipelineState;
