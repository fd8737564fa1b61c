pub mod engine;
pub mod preprocess;
pub mod setup;

pub use engine::{EngineOptions, RecognitionEngine, TesseractEngine};
pub use preprocess::PrepareOptions;
pub use setup::ensure_tesseract;
