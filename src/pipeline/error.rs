use thiserror::Error;

use super::diagnostics::Stage;

#[derive(Debug, Error)]
pub enum ScanError {
    /// A geometric stage found nothing to work with.
    #[error("card not clearly detected ({stage})")]
    GeometryNotFound { stage: Stage },

    #[error("identifier not recognized: {text:?}")]
    ParseFailure { text: String },

    /// Recognition engine failure, passed through as reported.
    #[error("OCR engine error: {0:#}")]
    Engine(#[source] anyhow::Error),

    #[error("a scan is already in progress")]
    Busy,
}

impl ScanError {
    pub fn geometry(stage: Stage) -> Self {
        Self::GeometryNotFound { stage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ScanError::geometry(Stage::BottomEdge).to_string(),
            "card not clearly detected (bottom edge)"
        );
        assert_eq!(
            ScanError::ParseFailure { text: "XX 12".to_string() }.to_string(),
            "identifier not recognized: \"XX 12\""
        );
        assert_eq!(ScanError::Busy.to_string(), "a scan is already in progress");
    }

    #[test]
    fn test_engine_error_keeps_message() {
        let err = ScanError::Engine(anyhow::anyhow!("tesseract exploded"));
        assert!(err.to_string().contains("tesseract exploded"));
    }
}
