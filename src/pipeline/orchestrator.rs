use std::sync::mpsc::{Receiver, TryRecvError};
use std::sync::Arc;

use super::state::{PipelineError, PipelineState};
use super::worker::{spawn_recognition, RecognitionJob, WorkerEvent};
use crate::log;
use crate::ocr::RecognitionEngine;
use crate::statblock::{build_draft, normalize, DraftSource, ImportMethod, StatBlockDraft};

/// Settings a pipeline instance runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOptions {
    /// Recognition language tag, e.g. "eng"
    pub language: String,
    /// Provenance stamped onto every draft
    pub source: DraftSource,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            source: DraftSource::default(),
        }
    }
}

/// One recognition pipeline, owned by its caller.
///
/// At most one run is in flight at a time. Recognition cannot be cancelled;
/// `clear` only detaches the pipeline from a running recognition.
pub struct Pipeline {
    engine: Arc<dyn RecognitionEngine>,
    options: PipelineOptions,
    state: PipelineState,
    progress: f32,
    text: String,
    draft: Option<StatBlockDraft>,
    events: Option<Receiver<WorkerEvent>>,
}

impl Pipeline {
    pub fn new(engine: Arc<dyn RecognitionEngine>, options: PipelineOptions) -> Self {
        Self {
            engine,
            options,
            state: PipelineState::Idle,
            progress: 0.0,
            text: String::new(),
            draft: None,
            events: None,
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Recognition progress in [0, 1]. Only meaningful while recognizing.
    #[allow(dead_code)]
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Normalized text of the last successful run or reparse.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn draft(&self) -> Option<&StatBlockDraft> {
        self.draft.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            PipelineState::Error(msg) => Some(msg),
            _ => None,
        }
    }

    /// One-line status for display.
    pub fn status_text(&self) -> String {
        match &self.state {
            PipelineState::Idle => "Ready".to_string(),
            PipelineState::LoadingEngine => "Loading OCR library…".to_string(),
            PipelineState::Recognizing => {
                format!("OCR in progress: {}%", (self.progress * 100.0).round() as u32)
            }
            PipelineState::Parsing => "Parsing text…".to_string(),
            PipelineState::Done => match &self.draft {
                Some(draft) => format!("Parsed: {}", draft.name()),
                None => "Done".to_string(),
            },
            PipelineState::Error(msg) => msg.clone(),
        }
    }

    /// Starts recognizing `image`.
    ///
    /// Returns `false` and does nothing while another run is in flight.
    /// Starting from Done or Error discards the previous text and draft.
    pub fn run(&mut self, image: Vec<u8>) -> bool {
        if self.state.is_busy() {
            log(&format!("Pipeline: run ignored, already {}", self.state));
            return false;
        }

        self.text.clear();
        self.draft = None;
        self.progress = 0.0;

        let needs_load = !self.engine.is_loaded();
        self.set_state(if needs_load {
            PipelineState::LoadingEngine
        } else {
            PipelineState::Recognizing
        });

        let job = RecognitionJob {
            image,
            language: self.options.language.clone(),
            needs_load,
        };
        self.events = Some(spawn_recognition(self.engine.clone(), job));
        true
    }

    /// Applies any worker events that have arrived, without blocking.
    pub fn poll(&mut self) -> &PipelineState {
        while self.state.is_busy() {
            let Some(events) = &self.events else { break };
            match events.try_recv() {
                Ok(event) => self.apply(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.worker_vanished(),
            }
        }
        &self.state
    }

    /// Blocks until the current run reaches Done or Error.
    pub fn wait(&mut self) -> &PipelineState {
        while self.state.is_busy() {
            let Some(events) = &self.events else { break };
            match events.recv() {
                Ok(event) => self.apply(event),
                Err(_) => self.worker_vanished(),
            }
        }
        &self.state
    }

    /// Re-parses user-edited `text` without running recognition.
    ///
    /// Returns `false` and does nothing while a run is in flight.
    pub fn reparse(&mut self, text: &str) -> bool {
        if self.state.is_busy() {
            log(&format!("Pipeline: reparse ignored, already {}", self.state));
            return false;
        }

        self.set_state(PipelineState::Parsing);
        self.finish_parsing(text, ImportMethod::TextReparse);
        true
    }

    /// Returns to Idle, dropping text, draft, error and any running recognition.
    #[allow(dead_code)]
    pub fn clear(&mut self) {
        if self.state.is_busy() {
            log("Pipeline: cleared during run, detaching from recognition");
        }
        self.events = None;
        self.text.clear();
        self.draft = None;
        self.progress = 0.0;
        self.set_state(PipelineState::Idle);
    }

    fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::EngineReady => {
                if self.state == PipelineState::LoadingEngine {
                    self.progress = 0.0;
                    self.set_state(PipelineState::Recognizing);
                }
            }
            WorkerEvent::Progress(fraction) => {
                if self.state == PipelineState::Recognizing && fraction.is_finite() {
                    self.progress = self.progress.max(fraction.clamp(0.0, 1.0));
                }
            }
            WorkerEvent::Recognized(text) => {
                self.events = None;
                self.set_state(PipelineState::Parsing);
                self.finish_parsing(&text, ImportMethod::ScreenshotOcr);
            }
            WorkerEvent::Failed(error) => self.fail(error),
        }
    }

    /// Normalizes, extracts and segments `text`, then enters Done.
    fn finish_parsing(&mut self, text: &str, method: ImportMethod) {
        self.text = normalize(text);
        let draft = build_draft(&self.text, &self.options.source, method);
        log(&format!(
            "Pipeline: parsed '{}' (AC {}, HP {}, CR {}, abilities {:?})",
            draft.parsed.core.name,
            draft.parsed.core.ac,
            draft.parsed.core.hp,
            draft.parsed.core.cr,
            draft.parsed.core.abilities.to_array()
        ));
        self.draft = Some(draft);
        self.set_state(PipelineState::Done);
    }

    fn worker_vanished(&mut self) {
        self.fail(PipelineError::Recognition(
            "recognition worker stopped without a result".to_string(),
        ));
    }

    fn fail(&mut self, error: PipelineError) {
        self.events = None;
        self.set_state(PipelineState::Error(error.to_string()));
    }

    fn set_state(&mut self, state: PipelineState) {
        if self.state != state {
            log(&format!("Pipeline: {} -> {}", self.state, state));
        }
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc::{channel, Sender};
    use std::sync::Mutex;

    const OWLBEAR: &str = "Owlbear\r\nLarge monstrosity, unaligned\r\nArmor Class 13 (natural armor)\r\n\
        Hit Points 59 (7d10 + 21)\r\nSpeed 40 ft.\r\n\
        STR 20 (+5) DEX 12 (+1) CON 17 (+3) INT 3 (-4) WIS 12 (+1) CHA 7 (-2)\r\n\
        Challenge 3 (700 XP)\r\nKeen Sight and Smell. The owlbear has advantage.\r\n\
        Actions\r\nBeak. Melee Weapon Attack: +7 to hit, reach 5 ft., one target.";

    /// Engine whose behavior is scripted per test.
    struct FakeEngine {
        loaded: AtomicBool,
        fail_load: AtomicBool,
        load_calls: AtomicUsize,
        result: Mutex<Result<String, String>>,
        progress: Vec<f32>,
        /// When set, recognition blocks until a message arrives.
        gate: Option<Mutex<std::sync::mpsc::Receiver<()>>>,
    }

    impl FakeEngine {
        fn returning(text: &str) -> Self {
            Self {
                loaded: AtomicBool::new(false),
                fail_load: AtomicBool::new(false),
                load_calls: AtomicUsize::new(0),
                result: Mutex::new(Ok(text.to_string())),
                progress: vec![0.25, 0.75],
                gate: None,
            }
        }

        fn gated(text: &str) -> (Self, Sender<()>) {
            let (sender, receiver) = channel();
            let mut engine = Self::returning(text);
            engine.gate = Some(Mutex::new(receiver));
            (engine, sender)
        }
    }

    impl RecognitionEngine for FakeEngine {
        fn is_loaded(&self) -> bool {
            self.loaded.load(Ordering::SeqCst)
        }

        fn load(&self, _language: &str) -> Result<()> {
            self.load_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_load.load(Ordering::SeqCst) {
                return Err(anyhow!("library unavailable"));
            }
            self.loaded.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn recognize(&self, _image: &[u8], _language: &str, progress: &mut dyn FnMut(f32)) -> Result<String> {
            if let Some(gate) = &self.gate {
                let _ = gate.lock().unwrap().recv();
            }
            for fraction in &self.progress {
                progress(*fraction);
            }
            self.result.lock().unwrap().clone().map_err(|e| anyhow!(e))
        }
    }

    fn new_pipeline(engine: Arc<FakeEngine>) -> Pipeline {
        Pipeline::new(engine, PipelineOptions::default())
    }

    #[test]
    fn test_run_to_done() {
        let engine = Arc::new(FakeEngine::returning(OWLBEAR));
        let mut pipeline = new_pipeline(engine.clone());

        assert!(pipeline.run(vec![0u8; 4]));
        assert_eq!(pipeline.state(), &PipelineState::LoadingEngine);
        assert_eq!(pipeline.wait(), &PipelineState::Done);

        let draft = pipeline.draft().unwrap();
        assert_eq!(draft.parsed.core.name, "Owlbear");
        assert_eq!(draft.parsed.core.hp, 59);
        assert_eq!(draft.parsed.core.abilities.to_array(), [20, 12, 17, 3, 12, 7]);
        assert_eq!(draft.parsed.sections.actions[0].label, "Beak");
        assert_eq!(draft.imported_from, ImportMethod::ScreenshotOcr);
        assert!(!pipeline.text().contains('\r'));
        assert_eq!(pipeline.status_text(), "Parsed: Owlbear");
    }

    #[test]
    fn test_engine_loaded_once() {
        let engine = Arc::new(FakeEngine::returning(OWLBEAR));
        let mut pipeline = new_pipeline(engine.clone());

        pipeline.run(vec![1]);
        pipeline.wait();
        assert!(pipeline.run(vec![2]));
        assert_eq!(pipeline.state(), &PipelineState::Recognizing);
        assert_eq!(pipeline.wait(), &PipelineState::Done);

        assert_eq!(engine.load_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_load_failure_then_retry() {
        let engine = Arc::new(FakeEngine::returning(OWLBEAR));
        engine.fail_load.store(true, Ordering::SeqCst);
        let mut pipeline = new_pipeline(engine.clone());

        pipeline.run(vec![1]);
        pipeline.wait();
        assert_eq!(
            pipeline.error(),
            Some("OCR engine failed to load: library unavailable")
        );
        assert!(pipeline.draft().is_none());

        engine.fail_load.store(false, Ordering::SeqCst);
        assert!(pipeline.run(vec![1]));
        assert_eq!(pipeline.wait(), &PipelineState::Done);
    }

    #[test]
    fn test_recognition_failure() {
        let engine = Arc::new(FakeEngine::returning(OWLBEAR));
        *engine.result.lock().unwrap() = Err("image too small".to_string());
        let mut pipeline = new_pipeline(engine);

        pipeline.run(vec![1]);
        assert_eq!(
            pipeline.wait(),
            &PipelineState::Error("OCR failed: image too small".to_string())
        );
        assert_eq!(pipeline.status_text(), "OCR failed: image too small");
    }

    #[test]
    fn test_run_while_busy_is_ignored() {
        let (engine, release) = FakeEngine::gated(OWLBEAR);
        let engine = Arc::new(engine);
        let mut pipeline = new_pipeline(engine);

        assert!(pipeline.run(vec![1]));
        assert!(!pipeline.run(vec![2]));
        assert!(!pipeline.reparse("Goblin"));
        assert!(pipeline.state().is_busy());

        release.send(()).unwrap();
        assert_eq!(pipeline.wait(), &PipelineState::Done);
        assert_eq!(pipeline.draft().unwrap().parsed.core.name, "Owlbear");
    }

    #[test]
    fn test_progress_never_decreases() {
        let mut engine = FakeEngine::returning(OWLBEAR);
        engine.progress = vec![0.5, 0.2, 1.7];
        let (sender, receiver) = channel::<()>();
        engine.gate = Some(Mutex::new(receiver));
        let mut pipeline = new_pipeline(Arc::new(engine));

        pipeline.run(vec![1]);
        sender.send(()).unwrap();

        let mut seen = Vec::new();
        while pipeline.poll().is_busy() {
            seen.push(pipeline.progress());
            std::thread::yield_now();
        }
        assert!(seen.windows(2).all(|pair| pair[0] <= pair[1]));
        assert!(pipeline.progress() <= 1.0);
        assert_eq!(pipeline.state(), &PipelineState::Done);
    }

    #[test]
    fn test_progress_clamped() {
        let mut pipeline = new_pipeline(Arc::new(FakeEngine::returning(OWLBEAR)));
        pipeline.set_state(PipelineState::Recognizing);

        pipeline.apply(WorkerEvent::Progress(0.6));
        pipeline.apply(WorkerEvent::Progress(0.3));
        assert_eq!(pipeline.progress(), 0.6);
        assert_eq!(pipeline.status_text(), "OCR in progress: 60%");

        pipeline.apply(WorkerEvent::Progress(4.0));
        assert_eq!(pipeline.progress(), 1.0);

        pipeline.apply(WorkerEvent::Progress(f32::NAN));
        assert_eq!(pipeline.progress(), 1.0);
    }

    #[test]
    fn test_clear_detaches_running_recognition() {
        let (engine, release) = FakeEngine::gated(OWLBEAR);
        let mut pipeline = new_pipeline(Arc::new(engine));

        pipeline.run(vec![1]);
        pipeline.clear();
        assert_eq!(pipeline.state(), &PipelineState::Idle);

        release.send(()).unwrap();
        assert_eq!(pipeline.poll(), &PipelineState::Idle);
        assert_eq!(pipeline.wait(), &PipelineState::Idle);
        assert!(pipeline.draft().is_none());
    }

    #[test]
    fn test_rerun_discards_previous_result() {
        let engine = Arc::new(FakeEngine::returning(OWLBEAR));
        let mut pipeline = new_pipeline(engine.clone());

        pipeline.run(vec![1]);
        pipeline.wait();
        assert!(pipeline.draft().is_some());

        *engine.result.lock().unwrap() = Err("blurry".to_string());
        pipeline.run(vec![2]);
        assert!(pipeline.draft().is_none());
        assert_eq!(pipeline.text(), "");
        pipeline.wait();
        assert!(pipeline.draft().is_none());
    }

    #[test]
    fn test_reparse_lands_in_done() {
        let mut pipeline = new_pipeline(Arc::new(FakeEngine::returning(OWLBEAR)));

        assert!(pipeline.reparse(OWLBEAR));
        assert_eq!(pipeline.state(), &PipelineState::Done);
        let first = pipeline.draft().unwrap().clone();
        assert_eq!(first.imported_from, ImportMethod::TextReparse);

        let edited = pipeline.text().to_string();
        assert!(pipeline.reparse(&edited));
        let second = pipeline.draft().unwrap();

        assert_eq!(first.parsed, second.parsed);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_clear_from_done_and_error() {
        let mut pipeline = new_pipeline(Arc::new(FakeEngine::returning(OWLBEAR)));
        pipeline.reparse(OWLBEAR);
        pipeline.clear();
        assert_eq!(pipeline.state(), &PipelineState::Idle);
        assert_eq!(pipeline.text(), "");
        assert_eq!(pipeline.status_text(), "Ready");

        pipeline.fail(PipelineError::Recognition("x".to_string()));
        assert!(pipeline.error().is_some());
        pipeline.clear();
        assert!(pipeline.error().is_none());
    }
}
