//! Background recognition worker.
//!
//! Recognition is the only slow step of the pipeline, so it runs on its own
//! thread and reports back over a channel. The owning [`Pipeline`] applies the
//! events on its own thread.
//!
//! [`Pipeline`]: super::Pipeline

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use super::state::PipelineError;
use crate::ocr::RecognitionEngine;

/// Events sent from the worker to the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// The engine finished loading
    EngineReady,
    /// Advisory recognition progress in [0, 1]
    Progress(f32),
    /// Recognition succeeded with this text
    Recognized(String),
    /// Loading or recognition failed
    Failed(PipelineError),
}

/// One recognition request.
#[derive(Debug, Clone)]
pub struct RecognitionJob {
    pub image: Vec<u8>,
    pub language: String,
    /// Load the engine before recognizing
    pub needs_load: bool,
}

/// Spawns a worker thread for `job` and returns the event receiver.
///
/// Dropping the receiver detaches the worker: it still runs to completion,
/// its events are discarded.
pub fn spawn_recognition(
    engine: Arc<dyn RecognitionEngine>,
    job: RecognitionJob,
) -> Receiver<WorkerEvent> {
    let (sender, receiver) = channel();

    thread::spawn(move || {
        run_recognition(engine.as_ref(), job, &sender);
    });

    receiver
}

/// Loads the engine if needed, then recognizes the job's image.
///
/// Always ends by sending exactly one `Recognized` or `Failed` event.
pub fn run_recognition(engine: &dyn RecognitionEngine, job: RecognitionJob, sender: &Sender<WorkerEvent>) {
    if job.needs_load {
        crate::log(&format!("OCR worker: loading engine (lang={})", job.language));
        if let Err(e) = engine.load(&job.language) {
            crate::log(&format!("OCR worker: engine load failed: {:#}", e));
            send(sender, WorkerEvent::Failed(PipelineError::EngineLoad(format!("{:#}", e))));
            return;
        }
        send(sender, WorkerEvent::EngineReady);
    }

    crate::log(&format!("OCR worker: recognizing {} bytes", job.image.len()));

    let mut report = |fraction: f32| send(sender, WorkerEvent::Progress(fraction));
    match engine.recognize(&job.image, &job.language, &mut report) {
        Ok(text) => {
            crate::log(&format!("OCR worker: recognized {} characters", text.len()));
            send(sender, WorkerEvent::Recognized(text));
        }
        Err(e) => {
            crate::log(&format!("OCR worker: recognition failed: {:#}", e));
            send(sender, WorkerEvent::Failed(PipelineError::Recognition(format!("{:#}", e))));
        }
    }
}

fn send(sender: &Sender<WorkerEvent>, event: WorkerEvent) {
    // Receiver is gone after a clear; the result is no longer wanted.
    let _ = sender.send(event);
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct ScriptedEngine {
        loaded: AtomicBool,
        fail_load: bool,
        text: Option<&'static str>,
    }

    impl RecognitionEngine for ScriptedEngine {
        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }

        fn load(&self, _language: &str) -> Result<()> {
            if self.fail_load {
                return Err(anyhow!("no traineddata"));
            }
            self.loaded.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn recognize(&self, _image: &[u8], _language: &str, progress: &mut dyn FnMut(f32)) -> Result<String> {
            progress(0.5);
            self.text
                .map(str::to_string)
                .ok_or_else(|| anyhow!("unreadable image"))
        }
    }

    fn job(needs_load: bool) -> RecognitionJob {
        RecognitionJob {
            image: vec![1, 2, 3],
            language: "eng".to_string(),
            needs_load,
        }
    }

    fn collect(engine: ScriptedEngine, job: RecognitionJob) -> Vec<WorkerEvent> {
        let (sender, receiver) = channel();
        run_recognition(&engine, job, &sender);
        drop(sender);
        receiver.iter().collect()
    }

    #[test]
    fn test_load_then_recognize() {
        let engine = ScriptedEngine {
            loaded: AtomicBool::new(false),
            fail_load: false,
            text: Some("Goblin"),
        };
        assert_eq!(
            collect(engine, job(true)),
            vec![
                WorkerEvent::EngineReady,
                WorkerEvent::Progress(0.5),
                WorkerEvent::Recognized("Goblin".to_string()),
            ]
        );
    }

    #[test]
    fn test_load_failure_stops_before_recognizing() {
        let engine = ScriptedEngine {
            loaded: AtomicBool::new(false),
            fail_load: true,
            text: Some("Goblin"),
        };
        assert_eq!(
            collect(engine, job(true)),
            vec![WorkerEvent::Failed(PipelineError::EngineLoad(
                "no traineddata".to_string()
            ))]
        );
    }

    #[test]
    fn test_recognition_failure() {
        let engine = ScriptedEngine {
            loaded: AtomicBool::new(true),
            fail_load: false,
            text: None,
        };
        let events = collect(engine, job(false));
        assert_eq!(
            events.last(),
            Some(&WorkerEvent::Failed(PipelineError::Recognition(
                "unreadable image".to_string()
            )))
        );
    }

    #[test]
    fn test_spawned_worker_survives_dropped_receiver() {
        let engine: Arc<dyn RecognitionEngine> = Arc::new(ScriptedEngine {
            loaded: AtomicBool::new(true),
            fail_load: false,
            text: Some("Goblin"),
        });
        let receiver = spawn_recognition(engine.clone(), job(false));
        drop(receiver);

        let receiver = spawn_recognition(engine, job(false));
        let events: Vec<WorkerEvent> = receiver.iter().collect();
        assert_eq!(events.last(), Some(&WorkerEvent::Recognized("Goblin".to_string())));
    }
}
