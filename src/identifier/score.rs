use serde::Serialize;

use super::cleanup::clean_ocr_text;
use super::grammar::{find_digit_run, find_language, has_rarity_token};
use super::vocabulary::SetCodeVocabulary;

const SET_CODE_POINTS: u32 = 50;
const RARITY_POINTS: u32 = 15;
const NUMBER_POINTS: u32 = 30;
const LANGUAGE_POINTS: u32 = 10;
const LENGTH_POINTS: u32 = 5;
const LENGTH_BONUS_MIN_CHARS: usize = 10;

/// Scores how much of the identifier grammar a transcription contains.
///
/// Partial credit is given per grammar element so that noisy OCR output can
/// still be ranked.
pub fn score_text(text: &str, vocabulary: &SetCodeVocabulary) -> u32 {
    let upper = text.to_uppercase();
    let mut score = 0;

    if vocabulary.matches(&upper) {
        score += SET_CODE_POINTS;
    }
    if has_rarity_token(&upper) {
        score += RARITY_POINTS;
    }
    if find_digit_run(&upper).is_some() {
        score += NUMBER_POINTS;
    }
    if find_language(&upper).is_some() {
        score += LANGUAGE_POINTS;
    }
    if upper.chars().count() > LENGTH_BONUS_MIN_CHARS {
        score += LENGTH_POINTS;
    }

    score
}

/// Raw and cleaned transcriptions with their scores and the winner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct IdentifierCandidate {
    pub raw_text: String,
    pub cleaned_text: String,
    pub raw_score: u32,
    pub cleaned_score: u32,
    pub final_text: String,
    pub final_score: u32,
    pub used_raw: bool,
}

impl IdentifierCandidate {
    /// Cleans the raw transcription, scores both variants and keeps the
    /// better one. Ties go to the cleaned text.
    pub fn choose(raw: &str, vocabulary: &SetCodeVocabulary) -> Self {
        let raw_text = raw.trim().to_string();
        let cleaned_text = clean_ocr_text(&raw_text, vocabulary);
        let raw_score = score_text(&raw_text, vocabulary);
        let cleaned_score = score_text(&cleaned_text, vocabulary);

        let used_raw = raw_score > cleaned_score;
        let (final_text, final_score) = if used_raw {
            (raw_text.clone(), raw_score)
        } else {
            (cleaned_text.clone(), cleaned_score)
        };

        crate::log(&format!(
            "OCR scoring: raw {:?} = {}, cleaned {:?} = {}, using {}",
            raw_text,
            raw_score,
            cleaned_text,
            cleaned_score,
            if used_raw { "raw" } else { "cleaned" }
        ));

        Self {
            raw_text,
            cleaned_text,
            raw_score,
            cleaned_score,
            final_text,
            final_score,
            used_raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab() -> SetCodeVocabulary {
        SetCodeVocabulary::new(["FDN", "MKM"]).unwrap()
    }

    #[test]
    fn test_full_identifier_scores_every_element() {
        assert_eq!(score_text("FDN U 0125 EN", &vocab()), 50 + 15 + 30 + 10 + 5);
    }

    #[test]
    fn test_partial_matches() {
        let vocab = vocab();
        assert_eq!(score_text("", &vocab), 0);
        assert_eq!(score_text("0125", &vocab), 30);
        assert_eq!(score_text("xx R 12", &vocab), 15);
        assert_eq!(score_text("ZZZ 9 DE", &vocab), 10);
        assert_eq!(score_text("abcdefghijk", &vocab), 5);
    }

    #[test]
    fn test_appending_set_code_adds_exactly_fifty() {
        let vocab = vocab();
        for base in ["?? 12", "x", "Q 7", ""] {
            let before = score_text(base, &vocab);
            let after = score_text(&format!("{} FDN", base), &vocab);
            assert_eq!(after, before + 50, "base {:?}", base);
        }
    }

    #[test]
    fn test_cleaned_wins_when_it_repairs_number() {
        let candidate = IdentifierCandidate::choose("FDN U O1Z5 EN", &vocab());
        // Neither variant has a digit run; scores tie, cleaned preferred
        assert!(!candidate.used_raw);

        let candidate = IdentifierCandidate::choose("FDN U Ol25 EN", &vocab());
        assert_eq!(candidate.cleaned_text, "FDN U 0125 EN");
        assert_eq!(candidate.raw_score, 50 + 15 + 10 + 5);
        assert_eq!(candidate.cleaned_score, 50 + 15 + 30 + 10 + 5);
        assert_eq!(candidate.final_text, "FDN U 0125 EN");
        assert!(!candidate.used_raw);
    }

    #[test]
    fn test_number_read_as_letters_is_recovered() {
        let vocab = vocab();
        let candidate = IdentifierCandidate::choose("FDN U OlSS EN", &vocab);
        assert_eq!(candidate.cleaned_text, "FDN U 0155 EN");
        assert_eq!(candidate.raw_score, 50 + 15 + 10 + 5);
        assert_eq!(candidate.cleaned_score, 50 + 15 + 30 + 10 + 5);
        assert!(!candidate.used_raw);

        let parsed = crate::identifier::parse_identifier(&candidate.final_text, &vocab);
        assert_eq!(parsed.collector_number.as_deref(), Some("0155"));
        assert!(parsed.is_valid());
    }

    #[test]
    fn test_raw_wins_when_cleanup_hurts() {
        // The trailing "S" turns into a sixth digit and destroys the number run
        let candidate = IdentifierCandidate::choose("MKM U 12345S", &vocab());
        assert_eq!(candidate.cleaned_text, "MKM U 123455");
        assert_eq!(candidate.raw_score, 50 + 15 + 30 + 5);
        assert_eq!(candidate.cleaned_score, 50 + 15 + 5);
        assert!(candidate.used_raw);
        assert_eq!(candidate.final_text, "MKM U 12345S");
        assert_eq!(candidate.final_score, 100);
    }
}
