//! Corrections for characters Tesseract commonly confuses on the identifier line.

use super::grammar::is_rarity_letter;
use super::vocabulary::SetCodeVocabulary;

/// Maps letter/symbol look-alikes onto the digit they usually are.
fn confusable_digit(c: char) -> char {
    match c {
        '|' | '\\' | 'I' | 'l' => '1',
        'O' => '0',
        'S' => '5',
        other => other,
    }
}

/// `UU0125` -> `U0125`, `CC` -> `C`. Only applies when the repeated rarity
/// letter is followed by nothing or a digit, so set codes like `MMA` survive.
fn collapse_rarity_prefix(token: &str) -> String {
    let mut chars = token.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    if !is_rarity_letter(first) {
        return token.to_string();
    }

    let repeats = token.chars().take_while(|&c| c == first).count();
    let rest: String = token.chars().skip(repeats).collect();
    if repeats >= 2 && rest.chars().next().is_none_or(|c| c.is_ascii_digit()) {
        format!("{}{}", first, rest)
    } else {
        token.to_string()
    }
}

/// Shortens any run of four or more identical digits to three.
fn collapse_digit_runs(token: &str) -> String {
    let mut out = String::with_capacity(token.len());
    let mut prev: Option<char> = None;
    let mut run = 0;
    for c in token.chars() {
        if Some(c) == prev && c.is_ascii_digit() {
            run += 1;
        } else {
            run = 1;
            prev = Some(c);
        }
        if !(c.is_ascii_digit() && run > 3) {
            out.push(c);
        }
    }
    out
}

/// Replaces look-alikes in one token.
///
/// Tokens that already hold a digit are always mapped. Letter-only tokens are
/// mapped only when they turn into a whole 3 to 5 digit collector number and
/// are not a known set code, which leaves set codes, rarity letters and
/// language tags alone.
fn map_confusables(token: String, vocabulary: &SetCodeVocabulary) -> String {
    if token.chars().any(|c| c.is_ascii_digit()) {
        return token.chars().map(confusable_digit).collect();
    }

    let mapped: String = token.chars().map(confusable_digit).collect();
    let is_number = (3..=5).contains(&mapped.len()) && mapped.chars().all(|c| c.is_ascii_digit());
    if is_number && !vocabulary.contains_code(&token) {
        mapped
    } else {
        token
    }
}

/// Produces the cleaned transcription scored alongside the raw one.
pub fn clean_ocr_text(raw: &str, vocabulary: &SetCodeVocabulary) -> String {
    raw.split_whitespace()
        .map(|token| {
            let token = collapse_rarity_prefix(token);
            let token = map_confusables(token, vocabulary);
            collapse_digit_runs(&token)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean(raw: &str) -> String {
        clean_ocr_text(raw, &SetCodeVocabulary::new(["FDN", "MKM", "SOI"]).unwrap())
    }

    #[test]
    fn test_confusables_fixed_in_number_tokens() {
        assert_eq!(clean("FDN U O125 EN"), "FDN U 0125 EN");
        assert_eq!(clean("FDN U 0l2S"), "FDN U 0125");
        assert_eq!(clean("MKM R |0I2"), "MKM R 1012");
        assert_eq!(clean(r"MKM R 0\23"), "MKM R 0123");
    }

    #[test]
    fn test_all_letter_number_is_repaired() {
        assert_eq!(clean("FDN U OlSS EN"), "FDN U 0155 EN");
        assert_eq!(clean("MKM R ISO"), "MKM R 150");
    }

    #[test]
    fn test_known_set_code_spared() {
        // "SOI" would map to a valid number but is a set code
        assert_eq!(clean("SOI C OlSS"), "SOI C 0155");
        // Too long to be a collector number
        assert_eq!(clean("FDN U OOSSII"), "FDN U OOSSII");
    }

    #[test]
    fn test_letter_tokens_untouched() {
        assert_eq!(clean("OTJ S 0042 ES"), "OTJ S 0042 ES");
        assert_eq!(clean("DSK I 0101"), "DSK I 0101");
    }

    #[test]
    fn test_repeated_rarity_collapsed() {
        assert_eq!(clean("FDN UU 0125"), "FDN U 0125");
        assert_eq!(clean("CCC0125 EN"), "C0125 EN");
        assert_eq!(clean("MMA M 0042"), "MMA M 0042");
    }

    #[test]
    fn test_long_digit_runs_collapsed() {
        assert_eq!(clean("FDN U 00001"), "FDN U 0001");
        assert_eq!(clean("FDN U 0125"), "FDN U 0125");
        assert_eq!(clean("FDN U 0OOO1"), "FDN U 0001");
    }

    #[test]
    fn test_whitespace_normalized() {
        assert_eq!(clean("  FDN\tU   0125 \n"), "FDN U 0125");
        assert_eq!(clean(""), "");
    }
}
