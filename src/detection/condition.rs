use image::{GrayImage, Luma, RgbaImage};

use super::raster::luma;
use super::surface::FoilDetectionResult;
use crate::config::ConditionConfig;

/// Picks the foil stretch threshold from the region's average brightness.
pub fn foil_threshold(average_brightness: f32) -> f32 {
    if average_brightness > 140.0 {
        160.0
    } else if average_brightness < 100.0 {
        100.0
    } else {
        128.0
    }
}

/// Linear contrast stretch around the midpoint.
#[inline]
fn stretch_linear(value: f32, config: &ConditionConfig) -> f32 {
    (value - config.midpoint) * config.contrast_factor + config.midpoint
}

/// Two-sided stretch: brights pushed up from the threshold, darks compressed toward black.
#[inline]
fn stretch_foil(value: f32, threshold: f32, config: &ConditionConfig) -> f32 {
    if value > threshold {
        threshold + (value - threshold) * config.foil_bright_gain
    } else {
        value * config.foil_dark_gain
    }
}

/// Converts the text region into an OCR-ready grayscale image.
///
/// The identifier is printed light-on-dark, so both paths finish with an
/// inversion to give Tesseract dark text on a light background. Foil regions
/// get an adaptive two-sided stretch instead of the flat linear one, which
/// would clip their uneven background into uniform gray.
pub fn condition_region(
    region: RgbaImage,
    foil: &FoilDetectionResult,
    config: &ConditionConfig,
) -> GrayImage {
    let (width, height) = region.dimensions();
    let threshold = foil_threshold(foil.stats.average_brightness);

    crate::log(&format!(
        "Conditioning {}x{} region ({})",
        width,
        height,
        if foil.is_foil {
            format!("foil, threshold {}", threshold)
        } else {
            "standard".to_string()
        }
    ));

    let mut output = GrayImage::new(width, height);
    for (x, y, pixel) in region.enumerate_pixels() {
        let value = luma(pixel).round();
        let stretched = if foil.is_foil {
            stretch_foil(value, threshold, config)
        } else {
            stretch_linear(value, config)
        };
        let inverted = 255 - stretched.round().clamp(0.0, 255.0) as u8;
        output.put_pixel(x, y, Luma([inverted]));
    }

    output
}
