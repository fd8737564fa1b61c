//! Stat Block Importer
//!
//! Turns screenshots of tabletop monster stat blocks into structured monster
//! drafts. Recognition is done by Tesseract; the recognized text is parsed
//! into fields, ability scores and named entries, and the resulting draft is
//! printed as JSON and optionally saved.

mod config;
mod drafts;
mod ocr;
mod paths;
mod pipeline;
mod statblock;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use drafts::{save_draft, DirectoryVault, DraftStore, JsonFileStore, VaultSink};
use ocr::TesseractEngine;
use pipeline::{Pipeline, PipelineState};
use statblock::{ReviewEdits, StatBlockDraft};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Logs a message to stderr and the log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    eprint!("{}", line);
    let log_path = paths::get_logs_dir().join("statblock_importer.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

#[derive(Parser, Debug)]
#[clap(name = "statblock-importer")]
#[clap(about = "Import monster stat blocks from screenshots")]
struct Cli {
    /// Config file (defaults to config.json next to the executable)
    #[clap(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Recognize a screenshot and print the parsed draft
    Import {
        /// Screenshot to recognize
        image: PathBuf,

        /// Wait for recognition without logging progress
        #[clap(long)]
        quiet: bool,

        #[clap(flatten)]
        output: OutputArgs,

        #[clap(flatten)]
        review: ReviewArgs,
    },
    /// Parse already-recognized text ("-" reads stdin)
    Reparse {
        text: String,

        #[clap(flatten)]
        output: OutputArgs,

        #[clap(flatten)]
        review: ReviewArgs,
    },
    /// List saved drafts, newest first
    Drafts {
        /// Print the full saved drafts as JSON
        #[clap(long)]
        json: bool,
    },
    /// Locate Tesseract and download missing language data
    Setup,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Save the draft to the draft store
    #[clap(long)]
    save: bool,

    /// Write the draft JSON to a file instead of stdout
    #[clap(long, value_name = "FILE")]
    out: Option<PathBuf>,

    /// Write the normalized text to a file, for editing and `reparse`
    #[clap(long, value_name = "FILE")]
    text_out: Option<PathBuf>,
}

/// Overrides applied to the parsed draft before output.
#[derive(Args, Debug)]
struct ReviewArgs {
    #[clap(long)]
    name: Option<String>,

    #[clap(long, value_name = "TEXT")]
    size_type: Option<String>,

    #[clap(long)]
    alignment: Option<String>,

    #[clap(long)]
    cr: Option<String>,

    #[clap(long)]
    ac: Option<String>,

    #[clap(long)]
    hp: Option<String>,
}

impl From<ReviewArgs> for ReviewEdits {
    fn from(args: ReviewArgs) -> Self {
        Self {
            name: args.name,
            size_type: args.size_type,
            alignment: args.alignment,
            cr: args.cr,
            ac: args.ac,
            hp: args.hp,
        }
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        let log_path = paths::get_logs_dir().join("statblock_importer.log");
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    let cli = Cli::parse();

    if let Err(e) = paths::ensure_directories() {
        eprintln!("Failed to create log directory: {}", e);
    }
    config::init_config(cli.config.as_deref());

    match cli.command {
        Command::Import {
            image,
            quiet,
            output,
            review,
        } => {
            let bytes = std::fs::read(&image)
                .with_context(|| format!("Failed to read image: {}", image.display()))?;
            log(&format!("Importing {} ({} bytes)", image.display(), bytes.len()));
            let (draft, text) = recognize(bytes, quiet)?;
            finish(draft, &text, review.into(), &output)
        }
        Command::Reparse {
            text,
            output,
            review,
        } => {
            let text = if text == "-" {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("Failed to read text from stdin")?;
                buf
            } else {
                text
            };
            let (draft, text) = reparse(&text)?;
            finish(draft, &text, review.into(), &output)
        }
        Command::Drafts { json } => list_drafts(json),
        Command::Setup => {
            let paths = ocr::ensure_tesseract(&config::get_config().language)?;
            println!("tesseract: {}", paths.executable.display());
            println!("tessdata:  {}", paths.tessdata.display());
            Ok(())
        }
    }
}

fn new_pipeline() -> Pipeline {
    let config = config::get_config();
    let engine = Arc::new(TesseractEngine::new(config.engine_options()));
    Pipeline::new(engine, config.pipeline_options())
}

/// Runs recognition to completion, logging status changes unless `quiet`.
fn recognize(image: Vec<u8>, quiet: bool) -> Result<(StatBlockDraft, String)> {
    let mut pipeline = new_pipeline();
    if !pipeline.run(image) {
        bail!("Pipeline is busy");
    }

    if quiet {
        pipeline.wait();
        return take_draft(&pipeline);
    }

    let mut last_status = String::new();
    while pipeline.poll().is_busy() {
        let status = pipeline.status_text();
        if status != last_status {
            log(&status);
            last_status = status;
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    take_draft(&pipeline)
}

fn reparse(text: &str) -> Result<(StatBlockDraft, String)> {
    let mut pipeline = new_pipeline();
    if !pipeline.reparse(text) {
        bail!("Pipeline is busy");
    }
    take_draft(&pipeline)
}

/// The finished draft and its normalized text.
fn take_draft(pipeline: &Pipeline) -> Result<(StatBlockDraft, String)> {
    if let Some(msg) = pipeline.error() {
        bail!("{}", msg);
    }
    match (pipeline.state(), pipeline.draft()) {
        (PipelineState::Done, Some(draft)) => Ok((draft.clone(), pipeline.text().to_string())),
        (PipelineState::Done, None) => Err(anyhow!("Pipeline finished without a draft")),
        (other, _) => Err(anyhow!("Pipeline stopped unexpectedly: {}", other)),
    }
}

/// Applies review edits, writes the JSON and saves if requested.
fn finish(draft: StatBlockDraft, text: &str, edits: ReviewEdits, output: &OutputArgs) -> Result<()> {
    let draft = if edits.is_empty() {
        draft
    } else {
        edits.apply(&draft)
    };
    log(&format!("Parsed '{}' (CR {})", draft.name(), draft.parsed.core.cr));

    if let Some(path) = &output.text_out {
        write_file(path, text)?;
        log(&format!("Text written to {}", path.display()));
    }

    let json = draft.to_json_pretty().context("Failed to serialize draft")?;
    match &output.out {
        Some(path) => {
            write_file(path, &json)?;
            log(&format!("Draft written to {}", path.display()));
        }
        None => println!("{}", json),
    }

    if output.save {
        let config = config::get_config();
        let mut store = open_store();
        let vault = config.vault_dir.as_ref().map(DirectoryVault::new);
        save_draft(
            &mut store,
            vault.as_ref().map(|v| v as &dyn VaultSink),
            &draft,
        )?;
    }

    Ok(())
}

fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create dir: {}", parent.display()))?;
    }
    std::fs::write(path, contents).with_context(|| format!("Failed to write {}", path.display()))
}

fn open_store() -> DraftStore<JsonFileStore> {
    let config = config::get_config();
    DraftStore::new(
        JsonFileStore::new(config.storage_path()),
        config.storage_key.clone(),
        config.draft_capacity,
    )
}

fn list_drafts(json: bool) -> Result<()> {
    let drafts = open_store().list();

    if json {
        let out = serde_json::to_string_pretty(&drafts).context("Failed to serialize drafts")?;
        println!("{}", out);
        return Ok(());
    }

    if drafts.is_empty() {
        println!("No saved drafts.");
        return Ok(());
    }
    for saved in &drafts {
        println!(
            "{}  {}  CR {}  ({})",
            saved.saved_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
            saved.draft.name(),
            saved.draft.parsed.core.cr,
            saved.draft.id
        );
    }
    Ok(())
}
