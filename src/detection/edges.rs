//! Card border detection by dark-pixel majority voting.
//!
//! The printed card border is near-black. Once the photograph is reduced to the
//! quadrant holding the card corner, the border is the first row (scanning up
//! from the bottom) or column (scanning in from the left) in which most sampled
//! pixels are dark.

use image::RgbaImage;

use super::raster::luma;
use crate::config::EdgeConfig;

/// Which border to look for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeSide {
    Bottom,
    Left,
}

impl std::fmt::Display for EdgeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeSide::Bottom => write!(f, "bottom"),
            EdgeSide::Left => write!(f, "left"),
        }
    }
}

/// Thickness of the sampled strip along an image dimension.
fn strip_len(dimension: u32, fraction: f32, min_pixels: u32) -> u32 {
    let len = ((dimension as f32 * fraction) as u32).max(min_pixels);
    len.min(dimension)
}

/// Finds the row (bottom) or column (left) of the card's outer edge.
///
/// Returns `None` if no row/column reaches the dark majority.
pub fn find_edge(img: &RgbaImage, side: EdgeSide, config: &EdgeConfig) -> Option<u32> {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return None;
    }

    let is_dark = |x: u32, y: u32| luma(img.get_pixel(x, y)) < config.dark_luma_threshold;
    let is_majority = |dark: u32, total: u32| dark as f32 >= config.dark_fraction * total as f32;

    match side {
        EdgeSide::Bottom => {
            let strip = strip_len(width, config.bottom_strip_fraction, config.min_strip_pixels);
            let x_start = width - strip;
            (0..height).rev().find(|&y| {
                let dark = (x_start..width).filter(|&x| is_dark(x, y)).count() as u32;
                is_majority(dark, strip)
            })
        }
        EdgeSide::Left => {
            let strip = strip_len(height, config.left_strip_fraction, config.min_strip_pixels);
            let y_start = height - strip;
            (0..width).find(|&x| {
                let dark = (y_start..height).filter(|&y| is_dark(x, y)).count() as u32;
                is_majority(dark, strip)
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    const DARK: Rgba<u8> = Rgba([10, 10, 10, 255]);
    const LIGHT: Rgba<u8> = Rgba([220, 220, 220, 255]);

    #[test]
    fn test_bottom_edge_returns_band_start() {
        // Dark border down to band_end, light table below it
        for band_end in [10u32, 45, 70, 99] {
            let img = RgbaImage::from_fn(200, 100, |_, y| if y <= band_end { DARK } else { LIGHT });
            assert_eq!(
                find_edge(&img, EdgeSide::Bottom, &EdgeConfig::default()),
                Some(band_end)
            );
        }
    }

    #[test]
    fn test_bottom_edge_ignores_minority_noise() {
        // Strip is the rightmost 30 columns. Rows below the band get 10 dark
        // pixels (33%), which must not trigger the 60% majority.
        let img = RgbaImage::from_fn(200, 100, |x, y| {
            if y <= 60 {
                DARK
            } else if x >= 170 && (x - 170) % 3 == 0 {
                DARK
            } else {
                LIGHT
            }
        });
        assert_eq!(find_edge(&img, EdgeSide::Bottom, &EdgeConfig::default()), Some(60));
    }

    #[test]
    fn test_bottom_edge_only_samples_right_strip() {
        // Dark on the left half only: the right-hand strip never turns dark
        let img = RgbaImage::from_fn(200, 100, |x, _| if x < 100 { DARK } else { LIGHT });
        assert_eq!(find_edge(&img, EdgeSide::Bottom, &EdgeConfig::default()), None);
    }

    #[test]
    fn test_left_edge_returns_first_dark_column() {
        let img = RgbaImage::from_fn(200, 100, |x, _| if x >= 37 { DARK } else { LIGHT });
        assert_eq!(find_edge(&img, EdgeSide::Left, &EdgeConfig::default()), Some(37));
    }

    #[test]
    fn test_left_edge_samples_bottom_rows() {
        // Only the top rows are dark: the bottom strip never qualifies
        let img = RgbaImage::from_fn(200, 100, |_, y| if y < 50 { DARK } else { LIGHT });
        assert_eq!(find_edge(&img, EdgeSide::Left, &EdgeConfig::default()), None);
    }

    #[test]
    fn test_no_edge_on_light_image() {
        let img = RgbaImage::from_pixel(50, 50, LIGHT);
        assert_eq!(find_edge(&img, EdgeSide::Bottom, &EdgeConfig::default()), None);
        assert_eq!(find_edge(&img, EdgeSide::Left, &EdgeConfig::default()), None);
    }

    #[test]
    fn test_tiny_image_uses_whole_dimension() {
        // 2 pixels wide is below the 3-pixel minimum strip
        let img = RgbaImage::from_pixel(2, 2, DARK);
        assert_eq!(find_edge(&img, EdgeSide::Bottom, &EdgeConfig::default()), Some(1));
        assert_eq!(find_edge(&img, EdgeSide::Left, &EdgeConfig::default()), Some(0));
        assert_eq!(find_edge(&RgbaImage::new(0, 0), EdgeSide::Left, &EdgeConfig::default()), None);
    }

    #[test]
    fn test_strip_len() {
        assert_eq!(strip_len(1000, 0.15, 3), 150);
        assert_eq!(strip_len(10, 0.15, 3), 3);
        assert_eq!(strip_len(2, 0.15, 3), 2);
    }
}
