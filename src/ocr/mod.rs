pub mod engine;
pub mod setup;

pub use engine::{TesseractEngine, TextRecognizer};
pub use setup::ensure_tessdata;
