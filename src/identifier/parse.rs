use serde::Serialize;

use super::grammar::{find_digit_run, find_language, DEFAULT_LANGUAGE};
use super::vocabulary::SetCodeVocabulary;

/// Card identifier extracted from the winning transcription.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ParsedIdentifier {
    pub set_code: Option<String>,
    pub collector_number: Option<String>,
    pub language: Option<String>,
}

impl ParsedIdentifier {
    /// A parse only counts when both set code and collector number were found.
    pub fn is_valid(&self) -> bool {
        self.set_code.is_some() && self.collector_number.is_some()
    }

    pub fn language_or_default(&self) -> &str {
        self.language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
    }

    /// Path handed to the metadata lookup: `set/number[/lang]`, lower-case,
    /// with the printed leading zeros dropped from the number.
    pub fn lookup_path(&self) -> Option<String> {
        let set = self.set_code.as_ref()?.to_lowercase();
        let number = self.collector_number.as_ref()?;
        let trimmed = number.trim_start_matches('0');
        let number = if trimmed.is_empty() { "0" } else { trimmed };

        Some(match &self.language {
            Some(lang) => format!("{}/{}/{}", set, number, lang.to_lowercase()),
            None => format!("{}/{}", set, number),
        })
    }
}

impl std::fmt::Display for ParsedIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.set_code.as_deref().unwrap_or("?"),
            self.collector_number.as_deref().unwrap_or("?"),
            self.language_or_default()
        )
    }
}

/// Extracts set code, collector number and language from a transcription.
///
/// Never fails; missing pieces are left as `None` and `is_valid` reports
/// whether the result is usable.
pub fn parse_identifier(text: &str, vocabulary: &SetCodeVocabulary) -> ParsedIdentifier {
    let upper = text.trim().to_uppercase();

    let parsed = ParsedIdentifier {
        set_code: vocabulary.find(&upper),
        collector_number: find_digit_run(&upper).map(str::to_string),
        language: find_language(&upper).map(str::to_string),
    };

    crate::log(&format!(
        "Parsed {:?}: set={:?} number={:?} lang={:?}",
        upper, parsed.set_code, parsed.collector_number, parsed.language
    ));

    parsed
}
