//! Vertical localisation of the identifier text line.
//!
//! Three independent per-row signals are computed over the candidate strip:
//!
//! - brightness: mean luma per row,
//! - edge density: fraction of pixels whose Sobel magnitude exceeds a threshold,
//! - text likelihood: 8×8 blocks scored on contrast ratio and local variance,
//!   averaged per row of blocks.
//!
//! Every brightness peak is a candidate. Candidates gain a point for each other
//! signal that peaks within the fusion tolerance, and the best-supported
//! candidate (closest to the strip bottom on ties) marks the bottom of the text
//! span. Without any brightness peak the bottom of the strip is used instead.
//!
//! All rows are in strip coordinates (0 = top).

use image::RgbaImage;
use serde::Serialize;

use super::raster::luma_plane;
use crate::config::TextLineConfig;

type Kernel3 = [[f32; 3]; 3];

const SOBEL_KERNEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];
const SOBEL_KERNEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Vertical span believed to hold the identifier text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct TextBounds {
    /// Top row of the span
    pub start_y: u32,
    pub height: u32,
    /// True when no brightness peak existed and the strip bottom was used
    pub used_fallback: bool,
}

/// A brightness peak with its consensus score (1..=3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ConsensusCandidate {
    pub row: u32,
    pub score: u32,
}

/// Per-row signals for a strip.
#[derive(Clone, Debug, PartialEq)]
pub struct LineSignals {
    pub brightness: Vec<f32>,
    pub edge_density: Vec<f32>,
    /// (centre row, score) for each row of blocks, top to bottom
    pub block_rows: Vec<(u32, f32)>,
}

/// Full result of a text line search, kept for diagnostics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextLineAnalysis {
    pub bounds: TextBounds,
    /// Candidates in ranking order (best first)
    pub candidates: Vec<ConsensusCandidate>,
    pub edge_peaks: Vec<u32>,
    pub text_peaks: Vec<u32>,
}

/// Luma plane with clamped neighbour access.
struct Plane {
    data: Vec<f32>,
    width: usize,
    height: usize,
}

impl Plane {
    fn from_image(img: &RgbaImage) -> Self {
        Self {
            data: luma_plane(img),
            width: img.width() as usize,
            height: img.height() as usize,
        }
    }

    #[inline]
    fn at(&self, x: isize, y: isize) -> f32 {
        let x = x.clamp(0, self.width as isize - 1) as usize;
        let y = y.clamp(0, self.height as isize - 1) as usize;
        self.data[y * self.width + x]
    }

    fn sobel_magnitude(&self, x: usize, y: usize) -> f32 {
        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        for ky in 0..3 {
            for kx in 0..3 {
                let v = self.at(x as isize + kx as isize - 1, y as isize + ky as isize - 1);
                sum_x += v * SOBEL_KERNEL_X[ky][kx];
                sum_y += v * SOBEL_KERNEL_Y[ky][kx];
            }
        }
        (sum_x * sum_x + sum_y * sum_y).sqrt()
    }

    fn local_variance(&self, x: usize, y: usize) -> f32 {
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let v = self.at(x as isize + dx, y as isize + dy);
                sum += v;
                sum_sq += v * v;
            }
        }
        let mean = sum / 9.0;
        (sum_sq / 9.0 - mean * mean).max(0.0)
    }
}

fn sampled_width(width: u32, config: &TextLineConfig) -> usize {
    ((width as f32 * config.sample_width_fraction) as usize).clamp(1, width.max(1) as usize)
}

#[inline]
fn in_range(value: f32, range: (f32, f32)) -> bool {
    value >= range.0 && value <= range.1
}

/// Computes the three per-row signals over the sampled width of the strip.
pub fn compute_signals(strip: &RgbaImage, config: &TextLineConfig) -> LineSignals {
    let (width, height) = strip.dimensions();
    if width == 0 || height == 0 {
        return LineSignals {
            brightness: Vec::new(),
            edge_density: Vec::new(),
            block_rows: Vec::new(),
        };
    }

    let plane = Plane::from_image(strip);
    let sample_w = sampled_width(width, config);
    let h = height as usize;

    let mut brightness = vec![0.0f32; h];
    let mut edge_density = vec![0.0f32; h];
    for y in (0..h).rev() {
        let row = &plane.data[y * plane.width..y * plane.width + sample_w];
        brightness[y] = row.iter().sum::<f32>() / sample_w as f32;

        let edges = (0..sample_w)
            .filter(|&x| plane.sobel_magnitude(x, y) > config.sobel_threshold)
            .count();
        edge_density[y] = edges as f32 / sample_w as f32;
    }

    let block_rows = block_text_scores(&plane, sample_w, config);

    LineSignals {
        brightness,
        edge_density,
        block_rows,
    }
}

/// Scores each row of blocks for text likelihood, top to bottom.
fn block_text_scores(plane: &Plane, sample_w: usize, config: &TextLineConfig) -> Vec<(u32, f32)> {
    let bs = config.block_size.max(1) as usize;
    let mut rows = Vec::new();

    for by in (0..plane.height).step_by(bs) {
        let block_h = bs.min(plane.height - by);
        let mut total = 0.0f32;
        let mut blocks = 0usize;

        for bx in (0..sample_w).step_by(bs) {
            let block_w = bs.min(sample_w - bx);
            let n = (block_w * block_h) as f32;

            let mut sum = 0.0f32;
            for y in by..by + block_h {
                for x in bx..bx + block_w {
                    sum += plane.at(x as isize, y as isize);
                }
            }
            let mean = sum / n;

            let mut brighter = 0usize;
            let mut variance_sum = 0.0f32;
            for y in by..by + block_h {
                for x in bx..bx + block_w {
                    if plane.at(x as isize, y as isize) > mean {
                        brighter += 1;
                    }
                    variance_sum += plane.local_variance(x, y);
                }
            }

            let contrast_ratio = brighter as f32 / n;
            let variance = variance_sum / n;

            let mut score = 0.0;
            if in_range(contrast_ratio, config.contrast_ratio_range) {
                score += 0.5;
            }
            if in_range(variance, config.variance_range) {
                score += 0.5;
            }
            total += score;
            blocks += 1;
        }

        let centre = (by + block_h / 2) as u32;
        let score = if blocks > 0 { total / blocks as f32 } else { 0.0 };
        rows.push((centre, score));
    }

    rows
}

/// Rows brighter than both neighbours by the configured rise, and above the
/// absolute floor. Neighbours are the adjacent rows unless a wider offset is
/// configured. Bottom-most first.
pub fn brightness_peaks(profile: &[f32], config: &TextLineConfig) -> Vec<u32> {
    let d = config.peak_neighbor_offset.max(1) as usize;
    if profile.len() <= 2 * d {
        return Vec::new();
    }

    (d..profile.len() - d)
        .rev()
        .filter(|&y| {
            let b = profile[y];
            b > config.brightness_floor
                && b - profile[y - d] > config.brightness_peak_rise
                && b - profile[y + d] > config.brightness_peak_rise
        })
        .map(|y| y as u32)
        .collect()
}

/// Local maxima of the edge density profile above the floor. Bottom-most first.
pub fn edge_peaks(profile: &[f32], config: &TextLineConfig) -> Vec<u32> {
    (0..profile.len())
        .rev()
        .filter(|&y| {
            let e = profile[y];
            e > config.edge_peak_floor
                && (y == 0 || e >= profile[y - 1])
                && (y + 1 == profile.len() || e >= profile[y + 1])
        })
        .map(|y| y as u32)
        .collect()
}

/// Rows of blocks scoring above the floor, as their centre rows.
pub fn text_peaks(block_rows: &[(u32, f32)], config: &TextLineConfig) -> Vec<u32> {
    block_rows
        .iter()
        .filter(|(_, score)| *score > config.text_peak_floor)
        .map(|(row, _)| *row)
        .collect()
}

/// Scores every brightness peak by how many other signals agree with it,
/// best first. Ties go to the row closest to the strip bottom.
pub fn fuse_peaks(
    brightness: &[u32],
    edges: &[u32],
    texts: &[u32],
    tolerance: u32,
) -> Vec<ConsensusCandidate> {
    let near = |row: u32, peaks: &[u32]| peaks.iter().any(|&p| p.abs_diff(row) <= tolerance);

    let mut candidates: Vec<ConsensusCandidate> = brightness
        .iter()
        .map(|&row| ConsensusCandidate {
            row,
            score: 1 + near(row, edges) as u32 + near(row, texts) as u32,
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score).then(b.row.cmp(&a.row)));
    candidates
}

/// Runs the full consensus search and keeps the intermediate peaks.
pub fn analyze_text_line(strip: &RgbaImage, config: &TextLineConfig) -> TextLineAnalysis {
    let height = strip.height();
    let signals = compute_signals(strip, config);

    let bright = brightness_peaks(&signals.brightness, config);
    let edge_peaks = edge_peaks(&signals.edge_density, config);
    let text_peaks = text_peaks(&signals.block_rows, config);
    let candidates = fuse_peaks(&bright, &edge_peaks, &text_peaks, config.fusion_tolerance);

    let bounds = match candidates.first() {
        Some(best) => {
            let span = ((height as f32 * config.span_fraction).round() as u32)
                .min(config.max_span_rows)
                .max(1);
            let bottom = best.row + 1;
            let start_y = bottom.saturating_sub(span);
            crate::log(&format!(
                "Text line: row {} (score {}/3, {} candidates), span {}..{}",
                best.row,
                best.score,
                candidates.len(),
                start_y,
                bottom
            ));
            TextBounds {
                start_y,
                height: bottom - start_y,
                used_fallback: false,
            }
        }
        None => {
            let fallback = ((height as f32 * config.fallback_fraction).round() as u32)
                .max(1)
                .min(height);
            crate::log(&format!(
                "Text line: no brightness peaks, using bottom {} rows",
                fallback
            ));
            TextBounds {
                start_y: height - fallback,
                height: fallback,
                used_fallback: true,
            }
        }
    };

    TextLineAnalysis {
        bounds,
        candidates,
        edge_peaks,
        text_peaks,
    }
}
