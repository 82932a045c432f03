//! Identifier line text handling: set code vocabulary, OCR cleanup,
//! candidate scoring and final parsing.

pub mod cleanup;
pub mod grammar;
pub mod parse;
pub mod score;
pub mod store;
pub mod vocabulary;

pub use parse::{parse_identifier, ParsedIdentifier};
pub use score::IdentifierCandidate;
pub use store::{default_cache_path, VocabularyStore};
pub use vocabulary::SetCodeVocabulary;
