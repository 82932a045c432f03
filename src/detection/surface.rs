//! Foil / non-foil surface classification.
//!
//! Foil finishes shimmer (higher per-pixel colour spread) and wash out the
//! pure black and white extremes (more midtones). Each of three indicators
//! casts a vote; a region is foil once enough votes agree.

use image::RgbaImage;
use serde::Serialize;

use super::raster::luma;
use crate::config::SurfaceConfig;

/// Brightness and colour statistics over a region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct SurfaceStats {
    pub average_brightness: f32,
    pub color_variance: f32,
    pub bright_pixel_ratio: f32,
    pub dark_pixel_ratio: f32,
    pub midtone_pixel_ratio: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FoilDetectionResult {
    pub is_foil: bool,
    pub stats: SurfaceStats,
}

/// Accumulates surface statistics in a single pass over the region.
pub fn surface_stats(img: &RgbaImage, config: &SurfaceConfig) -> SurfaceStats {
    let total = img.width() as u64 * img.height() as u64;
    if total == 0 {
        return SurfaceStats::default();
    }

    let mut brightness_sum = 0.0f64;
    let mut deviation_sum = 0.0f64;
    let (mut bright, mut dark, mut midtone) = (0u64, 0u64, 0u64);

    for pixel in img.pixels() {
        let y = luma(pixel);
        brightness_sum += y as f64;

        if y > config.bright_luma {
            bright += 1;
        } else if y < config.dark_luma {
            dark += 1;
        } else {
            midtone += 1;
        }

        let [r, g, b] = [pixel[0] as f32, pixel[1] as f32, pixel[2] as f32];
        let mean = (r + g + b) / 3.0;
        let deviation = ((r - mean).abs() + (g - mean).abs() + (b - mean).abs()) / 3.0;
        deviation_sum += deviation as f64;
    }

    let n = total as f64;
    SurfaceStats {
        average_brightness: (brightness_sum / n) as f32,
        color_variance: (deviation_sum / n) as f32,
        bright_pixel_ratio: (bright as f64 / n) as f32,
        dark_pixel_ratio: (dark as f64 / n) as f32,
        midtone_pixel_ratio: (midtone as f64 / n) as f32,
    }
}

/// Classifies a region as foil when enough indicators agree.
pub fn classify_surface(img: &RgbaImage, config: &SurfaceConfig) -> FoilDetectionResult {
    let stats = surface_stats(img, config);

    let votes = [
        stats.color_variance > config.color_variance_threshold,
        stats.midtone_pixel_ratio > config.midtone_ratio_threshold,
        stats.dark_pixel_ratio < config.extreme_ratio_ceiling
            && stats.bright_pixel_ratio < config.extreme_ratio_ceiling,
    ]
    .iter()
    .filter(|&&vote| vote)
    .count() as u32;

    let is_foil = img.width() > 0 && img.height() > 0 && votes >= config.votes_required;

    crate::log(&format!(
        "Surface: brightness={:.1} variance={:.1} bright={:.2} dark={:.2} mid={:.2} votes={} foil={}",
        stats.average_brightness,
        stats.color_variance,
        stats.bright_pixel_ratio,
        stats.dark_pixel_ratio,
        stats.midtone_pixel_ratio,
        votes,
        is_foil
    ));

    FoilDetectionResult { is_foil, stats }
}
