use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::log;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

#[cfg(windows)]
const TESSERACT_BINARY: &str = "tesseract.exe";
#[cfg(not(windows))]
const TESSERACT_BINARY: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &["/usr/local/bin", "/usr/bin", "/opt/homebrew/bin"];

#[cfg(windows)]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const SYSTEM_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

/// Returns the directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("cardscan")
        .join("tesseract")
}

fn traineddata_name(language: &str) -> String {
    format!("{}.traineddata", language)
}

/// Finds the Tesseract executable, checking our local dir first, then PATH,
/// then the usual install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(TESSERACT_BINARY);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = Command::new("tesseract").arg("--version").output() {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for dir in COMMON_INSTALL_DIRS {
        let p = Path::new(dir).join(TESSERACT_BINARY);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a tessdata directory that holds the trained data for `language`.
pub fn find_tessdata_dir(language: &str) -> Result<PathBuf> {
    let file = traineddata_name(language);

    let local_tessdata = get_tesseract_dir().join("tessdata");
    if local_tessdata.join(&file).exists() {
        return Ok(local_tessdata);
    }

    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        if let Some(dir) = tessdata_under_prefix(Path::new(&prefix), &file) {
            return Ok(dir);
        }
    }

    for path in SYSTEM_TESSDATA_DIRS {
        let p = PathBuf::from(path);
        if p.join(&file).exists() {
            return Ok(p);
        }
    }

    Err(anyhow!(
        "tessdata directory not found. Please ensure {} is available.",
        file
    ))
}

/// `TESSDATA_PREFIX` may point at the tessdata dir itself or at its parent.
fn tessdata_under_prefix(prefix: &Path, file: &str) -> Option<PathBuf> {
    if prefix.join(file).exists() {
        return Some(prefix.to_path_buf());
    }
    let nested = prefix.join("tessdata");
    nested.join(file).exists().then_some(nested)
}

/// Makes sure trained data for `language` is available, downloading it into
/// the local tessdata dir when no installed copy is found.
pub fn ensure_tessdata(language: &str) -> Result<PathBuf> {
    if let Ok(dir) = find_tessdata_dir(language) {
        log(&format!("tessdata found at: {}", dir.display()));
        return Ok(dir);
    }

    let tessdata_dir = get_tesseract_dir().join("tessdata");
    fs::create_dir_all(&tessdata_dir)
        .with_context(|| format!("Failed to create {}", tessdata_dir.display()))?;
    download_tessdata(&tessdata_dir, language)?;
    Ok(tessdata_dir)
}

fn download_tessdata(tessdata_dir: &Path, language: &str) -> Result<()> {
    let file = traineddata_name(language);
    let url = format!("{}/{}", TESSDATA_REPO, file);
    let target = tessdata_dir.join(&file);

    log(&format!("Downloading {}...", file));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client.get(&url).header("User-Agent", "cardscan").send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            file,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut out = fs::File::create(&target)?;
    out.write_all(&bytes)?;

    log(&format!("Downloaded {} ({} bytes)", file, bytes.len()));

    Ok(())
}
