//! Orchestration of a single scan: photograph in, card identifier out.

pub mod diagnostics;
pub mod error;

pub use diagnostics::{DiagnosticsRecorder, DiagnosticsSink, NoDiagnostics, Stage};
pub use error::ScanError;

use image::{GrayImage, RgbaImage};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::config::ScanConfig;
use crate::detection::{
    analyze_text_line, classify_surface, condition_region, crop, find_edge, EdgeSide,
    FoilDetectionResult, Rect, TextBounds,
};
use crate::identifier::{parse_identifier, IdentifierCandidate, ParsedIdentifier, SetCodeVocabulary};
use crate::log;
use crate::ocr::TextRecognizer;

/// Output of the image stages, ready for recognition.
#[derive(Clone, Debug)]
pub struct PreparedRegion {
    pub conditioned: GrayImage,
    pub foil: FoilDetectionResult,
    /// Text span within the candidate strip
    pub text_bounds: TextBounds,
    /// Text area in the coordinates of the original photograph
    pub text_area: Rect,
}

#[derive(Clone, Debug, Serialize)]
pub struct ScanOutcome {
    pub identifier: ParsedIdentifier,
    pub candidate: IdentifierCandidate,
    pub foil: FoilDetectionResult,
    pub text_bounds: TextBounds,
}

/// The image stages, from quadrant crop to conditioned text line.
pub struct DetectionPipeline {
    config: ScanConfig,
}

fn fraction_of(len: u32, fraction: f32) -> u32 {
    ((len as f32 * fraction).round() as u32).clamp(1, len.max(1))
}

impl DetectionPipeline {
    pub fn new(config: ScanConfig) -> Self {
        Self { config }
    }

    /// Runs every image stage on `img`, reporting into `sink`.
    pub fn prepare(
        &self,
        img: &RgbaImage,
        sink: &mut dyn DiagnosticsSink,
    ) -> Result<PreparedRegion, ScanError> {
        let (width, height) = img.dimensions();
        log(&format!("Scanning {}x{} image", width, height));

        let quadrant_rect = Rect::from_relative(&self.config.pipeline.quadrant, width, height)
            .clamp_to(width, height)
            .unwrap_or_default();
        let quadrant = crop_or_fail(img, quadrant_rect, Stage::Quadrant, sink)?;
        // Offset of the working image within the photograph
        let (mut origin_x, mut origin_y) = (quadrant_rect.x, quadrant_rect.y);

        let bottom = find_edge(&quadrant, EdgeSide::Bottom, &self.config.edge);
        sink.edge(EdgeSide::Bottom, bottom);
        let Some(bottom) = bottom else {
            log("Bottom edge not found");
            sink.stage(Stage::BottomEdge, false);
            return Err(ScanError::geometry(Stage::BottomEdge));
        };
        log(&format!("Bottom edge at row {}", bottom));
        let bottom_rect = Rect::new(0, 0, quadrant.width() as i64, bottom as i64 + 1);
        let bottom_cropped = crop_or_fail(&quadrant, bottom_rect, Stage::BottomEdge, sink)?;

        let left = find_edge(&bottom_cropped, EdgeSide::Left, &self.config.edge);
        sink.edge(EdgeSide::Left, left);
        let Some(left) = left else {
            log("Left edge not found");
            sink.stage(Stage::LeftEdge, false);
            return Err(ScanError::geometry(Stage::LeftEdge));
        };
        log(&format!("Left edge at column {}", left));
        let left_rect = Rect::new(
            left as i64,
            0,
            bottom_cropped.width() as i64 - left as i64,
            bottom_cropped.height() as i64,
        );
        let card = crop_or_fail(&bottom_cropped, left_rect, Stage::LeftEdge, sink)?;
        origin_x += left as i64;

        let strip_height = fraction_of(card.height(), self.config.pipeline.strip_height_fraction);
        let strip_width = fraction_of(card.width(), self.config.pipeline.strip_width_fraction);
        let strip_rect = Rect::new(
            0,
            card.height() as i64 - strip_height as i64,
            strip_width as i64,
            strip_height as i64,
        );
        let strip = crop_or_fail(&card, strip_rect, Stage::CandidateStrip, sink)?;
        origin_y += strip_rect.y;

        let foil = classify_surface(&strip, &self.config.surface);
        sink.surface(&foil);
        sink.stage(Stage::Surface, true);

        let analysis = analyze_text_line(&strip, &self.config.text_line);
        sink.text_line(&analysis);
        sink.stage(Stage::TextLine, true);
        let bounds = analysis.bounds;

        let text_rect = Rect::new(0, bounds.start_y as i64, strip.width() as i64, bounds.height as i64);
        let text_area = crop_or_fail(&strip, text_rect, Stage::TextArea, sink)?;

        let conditioned = condition_region(text_area, &foil, &self.config.condition);
        sink.conditioned(&conditioned);
        sink.stage(Stage::Conditioning, true);

        Ok(PreparedRegion {
            conditioned,
            foil,
            text_bounds: bounds,
            text_area: Rect::new(
                origin_x,
                origin_y + text_rect.y,
                text_rect.width,
                text_rect.height,
            ),
        })
    }
}

fn crop_or_fail(
    img: &RgbaImage,
    rect: Rect,
    stage: Stage,
    sink: &mut dyn DiagnosticsSink,
) -> Result<RgbaImage, ScanError> {
    match crop(img, rect) {
        Some(cropped) => {
            sink.image(stage, &cropped);
            sink.stage(stage, true);
            Ok(cropped)
        }
        None => {
            log(&format!("Empty crop at {} stage: {:?}", stage, rect));
            sink.stage(stage, false);
            Err(ScanError::geometry(stage))
        }
    }
}

/// Releases the in-flight flag when the scan ends, however it ends.
struct ScanGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::SeqCst);
    }
}

/// Runs the full chain with a single scan in flight at a time.
pub struct Scanner {
    pipeline: DetectionPipeline,
    recognizer: Box<dyn TextRecognizer>,
    busy: AtomicBool,
}

impl Scanner {
    pub fn new(pipeline: DetectionPipeline, recognizer: Box<dyn TextRecognizer>) -> Self {
        Self {
            pipeline,
            recognizer,
            busy: AtomicBool::new(false),
        }
    }

    #[cfg(test)]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    fn begin(&self) -> Result<ScanGuard<'_>, ScanError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            log("Scan rejected: another scan is in progress");
            return Err(ScanError::Busy);
        }
        Ok(ScanGuard { busy: &self.busy })
    }

    /// Scans `img` and parses the identifier against `vocabulary`.
    pub fn scan(
        &self,
        img: &RgbaImage,
        vocabulary: &SetCodeVocabulary,
        sink: &mut dyn DiagnosticsSink,
    ) -> Result<ScanOutcome, ScanError> {
        let _guard = self.begin()?;

        let prepared = self.pipeline.prepare(img, sink)?;

        let raw = match self.recognizer.recognize(&prepared.conditioned) {
            Ok(raw) => {
                sink.stage(Stage::Recognition, true);
                raw
            }
            Err(e) => {
                log(&format!("OCR failed: {:#}", e));
                sink.stage(Stage::Recognition, false);
                return Err(ScanError::Engine(e));
            }
        };

        let candidate = IdentifierCandidate::choose(&raw, vocabulary);
        sink.candidate(&candidate);

        let identifier = parse_identifier(&candidate.final_text, vocabulary);
        sink.parsed(&identifier);
        sink.stage(Stage::Parsing, identifier.is_valid());
        if !identifier.is_valid() {
            return Err(ScanError::ParseFailure {
                text: candidate.final_text,
            });
        }

        log(&format!("Identified {}", identifier));
        Ok(ScanOutcome {
            identifier,
            candidate,
            foil: prepared.foil,
            text_bounds: prepared.text_bounds,
        })
    }
}
