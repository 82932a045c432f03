use anyhow::{anyhow, Context, Result};
use image::GrayImage;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

use super::setup::{find_tessdata_dir, find_tesseract_executable};
use crate::config::OcrConfig;
use crate::log;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Turns a conditioned image into a line of text.
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, img: &GrayImage) -> Result<String>;
}

/// Runs the `tesseract` executable on a temporary PNG.
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    config: OcrConfig,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata_dir: Option<PathBuf>, config: OcrConfig) -> Self {
        Self {
            executable,
            tessdata_dir,
            config,
        }
    }

    /// Finds the executable and trained data on this machine.
    pub fn locate(config: OcrConfig) -> Result<Self> {
        let executable = find_tesseract_executable()?;
        // Without a tessdata dir tesseract falls back to its compiled-in path
        let tessdata_dir = find_tessdata_dir(&config.language).ok();
        log(&format!(
            "Using tesseract {} (tessdata: {})",
            executable.display(),
            tessdata_dir
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "default".to_string())
        ));
        Ok(Self::new(executable, tessdata_dir, config))
    }

    fn command_args(&self, input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![input.into(), "stdout".into()];
        if let Some(dir) = &self.tessdata_dir {
            args.push("--tessdata-dir".into());
            args.push(dir.into());
        }
        args.push("-l".into());
        args.push(self.config.language.as_str().into());
        args.push("--psm".into());
        args.push(self.config.page_segmentation_mode.to_string().into());
        args.push("-c".into());
        args.push(format!("tessedit_char_whitelist={}", self.config.char_whitelist).into());
        args
    }
}

impl TextRecognizer for TesseractEngine {
    fn recognize(&self, img: &GrayImage) -> Result<String> {
        let temp_input = NamedTempFile::with_suffix(".png")?;
        img.save(temp_input.path())
            .context("Failed to write OCR input image")?;

        let mut child = Command::new(&self.executable)
            .args(self.command_args(temp_input.path()))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {}", self.executable.display()))?;

        // Drained while polling so a chatty child cannot fill the pipe and stall
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let timeout = Duration::from_millis(self.config.timeout_ms);
        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(anyhow!(
                    "Tesseract timed out after {} ms",
                    self.config.timeout_ms
                ));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = join_reader(stdout).context("Failed to read tesseract output")?;
        if !status.success() {
            let stderr = join_reader(stderr).unwrap_or_default();
            return Err(anyhow!("Tesseract failed: {}", stderr.trim()));
        }

        let text = normalize_output(&stdout);
        log(&format!("Tesseract output: {:?}", text));
        Ok(text)
    }
}

/// Reads a child pipe to the end on its own thread.
fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<io::Result<String>> {
    thread::spawn(move || {
        let mut buf = String::new();
        pipe.read_to_string(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(reader: Option<JoinHandle<io::Result<String>>>) -> Result<String> {
    match reader {
        Some(handle) => handle
            .join()
            .map_err(|_| anyhow!("Pipe reader thread panicked"))?
            .map_err(Into::into),
        None => Ok(String::new()),
    }
}

/// Joins Tesseract's output lines into one, dropping blank lines and the
/// trailing form feed.
pub fn normalize_output(raw: &str) -> String {
    raw.lines()
        .map(|line| line.trim_matches(|c: char| c.is_whitespace() || c == '\u{c}'))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
