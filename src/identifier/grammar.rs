//! Fixed pieces of the identifier line grammar: `SET RARITY NUMBER [LANG]`.

/// Single-letter rarity markers printed between set code and number.
pub const RARITY_LETTERS: [char; 8] = ['C', 'U', 'R', 'M', 'B', 'L', 'S', 'T'];

/// Language tags that may follow the collector number.
pub const LANGUAGE_CODES: [&str; 10] = ["EN", "DE", "FR", "ES", "IT", "PT", "JP", "KO", "RU", "ZH"];

/// Language assumed downstream when none was printed or recognized.
pub const DEFAULT_LANGUAGE: &str = "EN";

pub fn is_rarity_letter(c: char) -> bool {
    RARITY_LETTERS.contains(&c)
}

/// Returns the first run of exactly 3 to 5 ASCII digits.
pub fn find_digit_run(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if (3..=5).contains(&(i - start)) {
                return Some(&text[start..i]);
            }
        } else {
            i += 1;
        }
    }
    None
}

/// True if a rarity letter appears with whitespace immediately on both sides.
pub fn has_rarity_token(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(3).any(|w| w[0].is_whitespace() && is_rarity_letter(w[1]) && w[2].is_whitespace())
}

/// Returns the first standalone language code (alphanumeric token equal to a known code).
pub fn find_language(text: &str) -> Option<&'static str> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| token.len() == 2)
        .find_map(|token| LANGUAGE_CODES.iter().copied().find(|code| *code == token))
}
