//! Image stages of the card scan: border detection, surface classification,
//! text line localisation and OCR conditioning.
//!
//! Every stage is a pure function of its input buffer and its config section.

pub mod condition;
pub mod edges;
pub mod raster;
pub mod surface;
pub mod text_line;

pub use condition::condition_region;
pub use edges::{find_edge, EdgeSide};
pub use raster::{crop, Rect};
pub use surface::{classify_surface, FoilDetectionResult};
pub use text_line::{analyze_text_line, TextBounds, TextLineAnalysis};
