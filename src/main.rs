//! cardscan
//!
//! Reads the set code / collector number / language line printed in the
//! lower-left corner of a trading card photograph.

mod config;
mod detection;
mod identifier;
mod ocr;
mod paths;
mod pipeline;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use config::{get_config, init_config, ScanConfig};
use identifier::{default_cache_path, IdentifierCandidate, SetCodeVocabulary, VocabularyStore};
use ocr::{ensure_tessdata, TesseractEngine};
use pipeline::{DetectionPipeline, DiagnosticsRecorder, DiagnosticsSink, NoDiagnostics, Scanner};

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("cardscan.log");
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        let _ = file.write_all(line.as_bytes());
    }
}

#[derive(Parser)]
#[command(name = "cardscan")]
#[command(about = "Read the identifier line from trading card photographs")]
#[command(version)]
struct Cli {
    /// Path to config.json (defaults to the one next to the executable)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a photograph and print the card identifier.
    Scan {
        /// Path to the photograph.
        #[arg(long)]
        image: PathBuf,

        /// Directory to write intermediate images and a summary into.
        #[arg(long)]
        debug_dir: Option<PathBuf>,

        /// Use only the cached set list.
        #[arg(long)]
        offline: bool,
    },

    /// Run the image stages only and save the OCR-ready text line.
    Prepare {
        /// Path to the photograph.
        #[arg(long)]
        image: PathBuf,

        /// Output PNG path.
        #[arg(long)]
        out: PathBuf,
    },

    /// Score and parse a transcription.
    Parse {
        /// OCR text, e.g. "FDN U 0125 EN".
        #[arg(long)]
        text: String,

        /// Use only the cached set list.
        #[arg(long)]
        offline: bool,
    },

    /// Show the cached set list, optionally refetching it.
    Vocab {
        #[arg(long)]
        refresh: bool,
    },
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
        let log_path = paths::get_logs_dir().join("cardscan.log");
        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
            let _ = file.write_all(log_msg.as_bytes());
        }
    }));

    paths::ensure_directories()?;

    let cli = Cli::parse();
    init_config(cli.config.as_deref());
    let config = get_config();

    match cli.command {
        Commands::Scan {
            image,
            debug_dir,
            offline,
        } => run_scan(config, &image, debug_dir.as_deref(), offline),
        Commands::Prepare { image, out } => run_prepare(config, &image, &out),
        Commands::Parse { text, offline } => run_parse(config, &text, offline),
        Commands::Vocab { refresh } => run_vocab(config, refresh),
    }
}

fn vocabulary_store(config: &ScanConfig) -> VocabularyStore {
    VocabularyStore::new(default_cache_path(), config.vocabulary.clone())
}

fn load_vocabulary(config: &ScanConfig, offline: bool) -> SetCodeVocabulary {
    let vocabulary = vocabulary_store(config).load(offline);
    if vocabulary.is_empty() {
        log("Warning: no set codes available, identifiers cannot be parsed");
    }
    vocabulary
}

fn open_image(path: &Path) -> Result<image::RgbaImage> {
    let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(img.to_rgba8())
}

fn run_scan(config: &ScanConfig, image: &Path, debug_dir: Option<&Path>, offline: bool) -> Result<()> {
    let img = open_image(image)?;
    let vocabulary = load_vocabulary(config, offline);

    if let Err(e) = ensure_tessdata(&config.ocr.language) {
        log(&format!("Warning: Failed to setup tessdata: {:#}", e));
        log("OCR may not work correctly.");
    }
    let engine = TesseractEngine::locate(config.ocr.clone())?;
    let scanner = Scanner::new(DetectionPipeline::new(config.clone()), Box::new(engine));

    let mut recorder = DiagnosticsRecorder::new();
    let mut no_diagnostics = NoDiagnostics;
    let sink: &mut dyn DiagnosticsSink = if debug_dir.is_some() {
        &mut recorder
    } else {
        &mut no_diagnostics
    };
    let result = scanner.scan(&img, &vocabulary, sink);

    if let Some(dir) = debug_dir {
        for outcome in &recorder.summary().stages {
            log(&format!(
                "  {}: {}",
                outcome.stage,
                if outcome.ok { "ok" } else { "failed" }
            ));
        }
        let session = dir.join(Local::now().format("%Y%m%d_%H%M%S").to_string());
        if let Err(e) = recorder.save_to_dir(&session) {
            log(&format!("Failed to save diagnostics: {:#}", e));
        }
    }

    let outcome = result?;
    println!("{}", outcome.identifier);
    if let Some(path) = outcome.identifier.lookup_path() {
        println!("{}", path);
    }
    Ok(())
}

fn run_prepare(config: &ScanConfig, image: &Path, out: &Path) -> Result<()> {
    let img = open_image(image)?;
    let prepared = DetectionPipeline::new(config.clone()).prepare(&img, &mut NoDiagnostics)?;
    prepared
        .conditioned
        .save(out)
        .with_context(|| format!("Failed to save {}", out.display()))?;
    log(&format!(
        "Saved {}x{} text line (source rows {}..{}) to {}",
        prepared.conditioned.width(),
        prepared.conditioned.height(),
        prepared.text_area.y,
        prepared.text_area.y + prepared.text_area.height,
        out.display()
    ));
    Ok(())
}

fn run_parse(config: &ScanConfig, text: &str, offline: bool) -> Result<()> {
    let vocabulary = load_vocabulary(config, offline);
    let candidate = IdentifierCandidate::choose(text, &vocabulary);
    println!(
        "raw {:?} = {}, cleaned {:?} = {}",
        candidate.raw_text, candidate.raw_score, candidate.cleaned_text, candidate.cleaned_score
    );

    let parsed = identifier::parse_identifier(&candidate.final_text, &vocabulary);
    if !parsed.is_valid() {
        return Err(pipeline::ScanError::ParseFailure {
            text: candidate.final_text,
        }
        .into());
    }
    println!("{}", parsed);
    if let Some(path) = parsed.lookup_path() {
        println!("{}", path);
    }
    Ok(())
}

fn run_vocab(config: &ScanConfig, refresh: bool) -> Result<()> {
    let store = vocabulary_store(config);
    let vocabulary: SetCodeVocabulary = if refresh {
        store.refresh()?
    } else {
        store.load(false)
    };

    println!("{} set codes", vocabulary.len());
    if !vocabulary.is_empty() {
        println!("{}", vocabulary.codes().join(" "));
    }
    if let Some(cached) = store.read_cache()? {
        let age = Utc::now().signed_duration_since(cached.fetched_at);
        println!(
            "cache {} (fetched {}, {}h old)",
            store.cache_path().display(),
            cached.fetched_at.format("%Y-%m-%d %H:%M"),
            age.num_hours()
        );
    }
    Ok(())
}
