//! Scanner configuration.
//!
//! Loads settings from config.json at startup. Every heuristic threshold used
//! by the detection stages lives here so it can be tuned without rebuilding.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<ScanConfig> = OnceLock::new();

/// A rectangle in relative coordinates (0.0 to 1.0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// X position of top-left corner (0.0 = left edge, 1.0 = right edge)
    pub x: f32,
    /// Y position of top-left corner (0.0 = top edge, 1.0 = bottom edge)
    pub y: f32,
    /// Width as fraction of image width
    pub width: f32,
    /// Height as fraction of image height
    pub height: f32,
}

/// Where the pipeline looks for the card before edge scanning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Region of the photograph expected to hold the card's lower-left corner
    pub quadrant: RelativeRect,
    /// Height of the candidate strip, as a fraction of the edge-cropped region (from the bottom)
    pub strip_height_fraction: f32,
    /// Width of the candidate strip, as a fraction of the edge-cropped region (from the left)
    pub strip_width_fraction: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quadrant: RelativeRect {
                x: 0.0,
                y: 0.5,
                width: 0.5,
                height: 0.5,
            },
            strip_height_fraction: 0.25,
            strip_width_fraction: 0.6,
        }
    }
}

/// Border detection thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Luma below this value counts as a dark (border) pixel
    pub dark_luma_threshold: f32,
    /// Fraction of sampled pixels that must be dark for a row/column to be the edge
    pub dark_fraction: f32,
    /// Width of the column strip sampled for the bottom edge, as a fraction of image width
    pub bottom_strip_fraction: f32,
    /// Height of the row strip sampled for the left edge, as a fraction of image height
    pub left_strip_fraction: f32,
    /// Minimum strip thickness in pixels
    pub min_strip_pixels: u32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            dark_luma_threshold: 100.0,
            dark_fraction: 0.6,
            bottom_strip_fraction: 0.15,
            left_strip_fraction: 0.10,
            min_strip_pixels: 3,
        }
    }
}

/// Foil classification thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceConfig {
    /// Luma above this is a bright pixel
    pub bright_luma: f32,
    /// Luma below this is a dark pixel
    pub dark_luma: f32,
    /// Colour variance above this votes for foil
    pub color_variance_threshold: f32,
    /// Midtone ratio above this votes for foil
    pub midtone_ratio_threshold: f32,
    /// Dark and bright ratios both below this vote for foil
    pub extreme_ratio_ceiling: f32,
    /// Number of votes needed to classify as foil
    pub votes_required: u32,
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            bright_luma: 180.0,
            dark_luma: 75.0,
            color_variance_threshold: 15.0,
            midtone_ratio_threshold: 0.4,
            extreme_ratio_ceiling: 0.3,
            votes_required: 2,
        }
    }
}

/// Text line consensus parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TextLineConfig {
    /// Fraction of the strip width (from the left) that is sampled
    pub sample_width_fraction: f32,
    /// Sobel magnitude above which a pixel counts as an edge
    pub sobel_threshold: f32,
    /// Side length of the square blocks used for text-likelihood
    pub block_size: u32,
    /// Contrast ratio range that scores a block as text-like
    pub contrast_ratio_range: (f32, f32),
    /// Local variance range that scores a block as text-like
    pub variance_range: (f32, f32),
    /// Row distance used when comparing a brightness row with its neighbours
    /// (1 = adjacent rows)
    pub peak_neighbor_offset: u32,
    /// Minimum rise over both neighbours for a brightness peak
    pub brightness_peak_rise: f32,
    /// Absolute brightness floor for a brightness peak
    pub brightness_floor: f32,
    /// Minimum edge density for an edge peak
    pub edge_peak_floor: f32,
    /// Minimum row-of-blocks score for a text-pattern peak
    pub text_peak_floor: f32,
    /// Maximum distance in rows for two signals to agree
    pub fusion_tolerance: u32,
    /// Cap on the text span height in rows
    pub max_span_rows: u32,
    /// Text span height as a fraction of strip height
    pub span_fraction: f32,
    /// Fraction of the strip (from the bottom) used when no peak is found
    pub fallback_fraction: f32,
}

impl Default for TextLineConfig {
    fn default() -> Self {
        Self {
            sample_width_fraction: 0.8,
            sobel_threshold: 50.0,
            block_size: 8,
            contrast_ratio_range: (0.2, 0.8),
            variance_range: (200.0, 2000.0),
            peak_neighbor_offset: 1,
            brightness_peak_rise: 10.0,
            brightness_floor: 30.0,
            edge_peak_floor: 0.1,
            text_peak_floor: 0.3,
            fusion_tolerance: 20,
            max_span_rows: 60,
            span_fraction: 0.08,
            fallback_fraction: 0.15,
        }
    }
}

/// Contrast conditioning parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionConfig {
    /// Linear stretch factor for non-foil regions
    pub contrast_factor: f32,
    /// Stretch midpoint for non-foil regions
    pub midpoint: f32,
    /// Gain applied above the foil threshold
    pub foil_bright_gain: f32,
    /// Gain applied below the foil threshold
    pub foil_dark_gain: f32,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            contrast_factor: 2.5,
            midpoint: 128.0,
            foil_bright_gain: 1.8,
            foil_dark_gain: 0.6,
        }
    }
}

/// Tesseract invocation settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language
    pub language: String,
    /// Page segmentation mode (13 = raw single text line)
    pub page_segmentation_mode: u32,
    /// Characters Tesseract may emit
    pub char_whitelist: String,
    /// Hard ceiling on a single recognition call (milliseconds)
    pub timeout_ms: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            page_segmentation_mode: 13,
            char_whitelist: default_char_whitelist(),
            timeout_ms: 30_000,
        }
    }
}

fn default_char_whitelist() -> String {
    let mut whitelist: String = ('A'..='Z').chain('a'..='z').chain('0'..='9').collect();
    whitelist.push_str(" /");
    whitelist
}

/// Set-code listing source and cache policy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct VocabularyConfig {
    /// Endpoint returning the list of known sets
    pub source_url: String,
    /// Cached listing older than this is refetched (hours)
    pub refresh_hours: i64,
    /// Request timeout (seconds)
    pub request_timeout_secs: u64,
}

impl Default for VocabularyConfig {
    fn default() -> Self {
        Self {
            source_url: "https://api.scryfall.com/sets".to_string(),
            refresh_hours: 24,
            request_timeout_secs: 30,
        }
    }
}

/// Complete scanner configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub pipeline: PipelineConfig,
    pub edge: EdgeConfig,
    pub surface: SurfaceConfig,
    pub text_line: TextLineConfig,
    pub condition: ConditionConfig,
    pub ocr: OcrConfig,
    pub vocabulary: VocabularyConfig,
}

/// Returns config.json next to the executable, or in the working directory.
pub fn default_config_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.join("config.json")))
        .unwrap_or_else(|| Path::new("config.json").to_path_buf())
}

/// Loads configuration from the given path or returns defaults.
pub fn load_config(config_path: &Path) -> ScanConfig {
    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded from config.json");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse config.json: {}. Using defaults.",
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read config.json: {}. Using defaults.",
                    e
                ));
            }
        }
    } else {
        crate::log("config.json not found. Using default config.");
    }

    ScanConfig::default()
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config(config_path: Option<&Path>) {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    let _ = CONFIG.set(load_config(&path));
}

/// Returns a reference to the global configuration, or defaults if
/// `init_config` was never called.
pub fn get_config() -> &'static ScanConfig {
    CONFIG.get_or_init(ScanConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = load_config(&dir.path().join("nope.json"));
        assert_eq!(config.edge.dark_luma_threshold, 100.0);
        assert_eq!(config.text_line.block_size, 8);
        assert_eq!(config.ocr.timeout_ms, 30_000);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{ "text_line": { "fusion_tolerance": 12 }, "edge": { "dark_fraction": 0.7 } }"#,
        )
        .unwrap();

        let config = load_config(&path);
        assert_eq!(config.text_line.fusion_tolerance, 12);
        assert_eq!(config.text_line.sobel_threshold, 50.0);
        assert_eq!(config.edge.dark_fraction, 0.7);
        assert_eq!(config.edge.min_strip_pixels, 3);
        assert_eq!(config.surface.votes_required, 2);
    }

    #[test]
    fn test_invalid_json_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        let config = load_config(&path);
        assert_eq!(config.condition.contrast_factor, 2.5);
    }

    #[test]
    fn test_shipped_config_parses() {
        let config: ScanConfig = serde_json::from_str(include_str!("../config.json")).unwrap();
        assert_eq!(config.pipeline.quadrant.y, 0.5);
        assert_eq!(config.text_line.variance_range, (200.0, 2000.0));
        assert_eq!(config.text_line.max_span_rows, 60);
        assert_eq!(config.ocr.char_whitelist, default_char_whitelist());
    }

    #[test]
    fn test_whitelist_covers_alphanumerics_space_and_slash() {
        let whitelist = default_char_whitelist();
        assert!(whitelist.contains('A'));
        assert!(whitelist.contains('z'));
        assert!(whitelist.contains('7'));
        assert!(whitelist.contains(' '));
        assert!(whitelist.contains('/'));
        assert!(!whitelist.contains('|'));
    }
}
