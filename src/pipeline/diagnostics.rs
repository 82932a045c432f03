//! Optional observation of a scan's intermediate results.
//!
//! The pipeline reports into whatever sink the caller passes in; nothing is
//! kept between scans unless the caller keeps the sink.

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use image::{GrayImage, RgbaImage};
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::detection::{EdgeSide, FoilDetectionResult, TextLineAnalysis};
use crate::identifier::{IdentifierCandidate, ParsedIdentifier};

/// Steps of a scan, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Quadrant,
    BottomEdge,
    LeftEdge,
    CandidateStrip,
    Surface,
    TextLine,
    TextArea,
    Conditioning,
    Recognition,
    Parsing,
}

impl Stage {
    /// File-name friendly identifier.
    pub fn slug(&self) -> &'static str {
        match self {
            Stage::Quadrant => "quadrant",
            Stage::BottomEdge => "bottom_edge",
            Stage::LeftEdge => "left_edge",
            Stage::CandidateStrip => "candidate_strip",
            Stage::Surface => "surface",
            Stage::TextLine => "text_line",
            Stage::TextArea => "text_area",
            Stage::Conditioning => "conditioning",
            Stage::Recognition => "recognition",
            Stage::Parsing => "parsing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.slug().replace('_', " "))
    }
}

/// Receives intermediate results. Every method defaults to a no-op.
pub trait DiagnosticsSink {
    fn image(&mut self, _stage: Stage, _img: &RgbaImage) {}
    fn conditioned(&mut self, _img: &GrayImage) {}
    fn edge(&mut self, _side: EdgeSide, _coordinate: Option<u32>) {}
    fn surface(&mut self, _result: &FoilDetectionResult) {}
    fn text_line(&mut self, _analysis: &TextLineAnalysis) {}
    fn candidate(&mut self, _candidate: &IdentifierCandidate) {}
    fn parsed(&mut self, _parsed: &ParsedIdentifier) {}
    fn stage(&mut self, _stage: Stage, _ok: bool) {}
}

/// Discards everything.
pub struct NoDiagnostics;

impl DiagnosticsSink for NoDiagnostics {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub ok: bool,
}

/// Everything but the images; written as `summary.json`.
#[derive(Clone, Debug, Serialize)]
pub struct DiagnosticsSummary {
    pub started_at: DateTime<Local>,
    pub stages: Vec<StageOutcome>,
    pub bottom_edge: Option<u32>,
    pub left_edge: Option<u32>,
    pub surface: Option<FoilDetectionResult>,
    pub text_line: Option<TextLineAnalysis>,
    pub candidate: Option<IdentifierCandidate>,
    pub parsed: Option<ParsedIdentifier>,
}

/// Keeps a copy of everything the pipeline reports.
pub struct DiagnosticsRecorder {
    images: Vec<(Stage, RgbaImage)>,
    conditioned: Option<GrayImage>,
    summary: DiagnosticsSummary,
}

impl DiagnosticsRecorder {
    pub fn new() -> Self {
        Self {
            images: Vec::new(),
            conditioned: None,
            summary: DiagnosticsSummary {
                started_at: Local::now(),
                stages: Vec::new(),
                bottom_edge: None,
                left_edge: None,
                surface: None,
                text_line: None,
                candidate: None,
                parsed: None,
            },
        }
    }

    pub fn summary(&self) -> &DiagnosticsSummary {
        &self.summary
    }

    #[cfg(test)]
    pub fn images(&self) -> &[(Stage, RgbaImage)] {
        &self.images
    }

    #[cfg(test)]
    pub fn conditioned_image(&self) -> Option<&GrayImage> {
        self.conditioned.as_ref()
    }

    /// Outcome of the most recent report for `stage`, if it ran.
    #[cfg(test)]
    pub fn outcome(&self, stage: Stage) -> Option<bool> {
        self.summary
            .stages
            .iter()
            .rev()
            .find(|o| o.stage == stage)
            .map(|o| o.ok)
    }

    /// Writes one PNG per recorded image plus `summary.json` into `dir`.
    pub fn save_to_dir(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

        for (i, (stage, img)) in self.images.iter().enumerate() {
            let path = dir.join(format!("{:02}_{}.png", i + 1, stage.slug()));
            img.save(&path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
        }

        if let Some(img) = &self.conditioned {
            let path = dir.join(format!("{:02}_conditioned.png", self.images.len() + 1));
            img.save(&path)
                .with_context(|| format!("Failed to save {}", path.display()))?;
        }

        let json = serde_json::to_string_pretty(&self.summary)?;
        fs::write(dir.join("summary.json"), json)?;

        crate::log(&format!("Diagnostics saved to {}", dir.display()));
        Ok(())
    }
}

impl Default for DiagnosticsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl DiagnosticsSink for DiagnosticsRecorder {
    fn image(&mut self, stage: Stage, img: &RgbaImage) {
        self.images.push((stage, img.clone()));
    }

    fn conditioned(&mut self, img: &GrayImage) {
        self.conditioned = Some(img.clone());
    }

    fn edge(&mut self, side: EdgeSide, coordinate: Option<u32>) {
        match side {
            EdgeSide::Bottom => self.summary.bottom_edge = coordinate,
            EdgeSide::Left => self.summary.left_edge = coordinate,
        }
    }

    fn surface(&mut self, result: &FoilDetectionResult) {
        self.summary.surface = Some(*result);
    }

    fn text_line(&mut self, analysis: &TextLineAnalysis) {
        self.summary.text_line = Some(analysis.clone());
    }

    fn candidate(&mut self, candidate: &IdentifierCandidate) {
        self.summary.candidate = Some(candidate.clone());
    }

    fn parsed(&mut self, parsed: &ParsedIdentifier) {
        self.summary.parsed = Some(parsed.clone());
    }

    fn stage(&mut self, stage: Stage, ok: bool) {
        self.summary.stages.push(StageOutcome { stage, ok });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgba};
    use tempfile::tempdir;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::BottomEdge.to_string(), "bottom edge");
        assert_eq!(Stage::Quadrant.to_string(), "quadrant");
    }

    #[test]
    fn test_recorder_tracks_outcomes() {
        let mut recorder = DiagnosticsRecorder::new();
        recorder.stage(Stage::Quadrant, true);
        recorder.edge(EdgeSide::Bottom, None);
        recorder.stage(Stage::BottomEdge, false);

        assert_eq!(recorder.outcome(Stage::Quadrant), Some(true));
        assert_eq!(recorder.outcome(Stage::BottomEdge), Some(false));
        assert_eq!(recorder.outcome(Stage::LeftEdge), None);
        assert_eq!(recorder.summary().bottom_edge, None);
    }

    #[test]
    fn test_save_to_dir() {
        let mut recorder = DiagnosticsRecorder::new();
        recorder.image(Stage::Quadrant, &RgbaImage::from_pixel(4, 3, Rgba([1, 2, 3, 255])));
        recorder.image(Stage::TextArea, &RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])));
        recorder.conditioned(&GrayImage::from_pixel(2, 2, Luma([200])));
        recorder.edge(EdgeSide::Left, Some(7));
        recorder.stage(Stage::Quadrant, true);

        let dir = tempdir().unwrap();
        let out = dir.path().join("scan");
        recorder.save_to_dir(&out).unwrap();

        assert!(out.join("01_quadrant.png").exists());
        assert!(out.join("02_text_area.png").exists());
        assert!(out.join("03_conditioned.png").exists());

        let saved = image::open(out.join("01_quadrant.png")).unwrap().to_rgba8();
        assert_eq!(saved.dimensions(), (4, 3));

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join("summary.json")).unwrap()).unwrap();
        assert_eq!(summary["left_edge"], 7);
        assert_eq!(summary["stages"][0]["stage"], "quadrant");
        assert_eq!(summary["stages"][0]["ok"], true);
        assert!(summary["parsed"].is_null());
    }

    #[test]
    fn test_no_diagnostics_accepts_everything() {
        let mut sink = NoDiagnostics;
        sink.image(Stage::Quadrant, &RgbaImage::new(1, 1));
        sink.stage(Stage::Quadrant, true);
    }
}
