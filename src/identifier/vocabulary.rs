use anyhow::{Context, Result};
use regex::Regex;

/// Known set codes compiled into a single alternation.
///
/// Built once per refresh of the set listing and borrowed by the scorer and
/// parser. An empty vocabulary matches nothing, so every parse fails.
#[derive(Clone, Debug)]
pub struct SetCodeVocabulary {
    codes: Vec<String>,
    /// Matches a code anywhere in the text
    anywhere: Option<Regex>,
    /// Matches a code not glued to other letters or digits
    standalone: Option<Regex>,
}

impl SetCodeVocabulary {
    /// Builds the matcher from a list of set codes.
    ///
    /// Codes are upper-cased; blanks and codes with non-alphanumeric
    /// characters are dropped. Longer codes are tried first so that e.g.
    /// `MH3` wins over `MH`.
    pub fn new<I, S>(codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut codes: Vec<String> = codes
            .into_iter()
            .map(|c| c.as_ref().trim().to_uppercase())
            .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_alphanumeric()))
            .collect();
        codes.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        codes.dedup();

        if codes.is_empty() {
            return Ok(Self::empty());
        }

        let alternation = codes
            .iter()
            .map(|c| regex::escape(c))
            .collect::<Vec<_>>()
            .join("|");

        let anywhere = Regex::new(&format!("(?:{})", alternation))
            .context("Failed to compile set code pattern")?;
        let standalone = Regex::new(&format!("(?:^|[^A-Z0-9])({})(?:[^A-Z0-9]|$)", alternation))
            .context("Failed to compile standalone set code pattern")?;

        Ok(Self {
            codes,
            anywhere: Some(anywhere),
            standalone: Some(standalone),
        })
    }

    pub fn empty() -> Self {
        Self {
            codes: Vec::new(),
            anywhere: None,
            standalone: None,
        }
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    /// True if `token` is exactly one of the known codes (case-insensitive).
    pub fn contains_code(&self, token: &str) -> bool {
        self.codes.iter().any(|c| c.eq_ignore_ascii_case(token))
    }

    /// True if any known code occurs in the text (case-insensitive).
    pub fn matches(&self, text: &str) -> bool {
        self.anywhere
            .as_ref()
            .is_some_and(|re| re.is_match(&text.to_uppercase()))
    }

    /// Extracts a set code from upper-cased text.
    ///
    /// A standalone occurrence is preferred; otherwise the first code found
    /// anywhere in the text is used.
    pub fn find(&self, upper_text: &str) -> Option<String> {
        if let Some(caps) = self.standalone.as_ref().and_then(|re| re.captures(upper_text)) {
            return caps.get(1).map(|m| m.as_str().to_string());
        }
        self.anywhere
            .as_ref()
            .and_then(|re| re.find(upper_text))
            .map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_normalized() {
        let vocab = SetCodeVocabulary::new(["fdn", " MKM ", "", "FDN", "a-b", "mh3"]).unwrap();
        assert_eq!(vocab.codes(), &["FDN", "MH3", "MKM"]);
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn test_matches_is_case_insensitive_substring() {
        let vocab = SetCodeVocabulary::new(["FDN"]).unwrap();
        assert!(vocab.matches("fdn u 0125"));
        assert!(vocab.matches("xxFDNxx"));
        assert!(!vocab.matches("FD N"));
    }

    #[test]
    fn test_find_prefers_standalone_code() {
        // "DSK" occurs inside "XDSKX" first, but the standalone "MKM" wins
        let vocab = SetCodeVocabulary::new(["DSK", "MKM"]).unwrap();
        assert_eq!(vocab.find("XDSKX MKM 0042"), Some("MKM".to_string()));
        assert_eq!(vocab.find("XDSKX 0042"), Some("DSK".to_string()));
        assert_eq!(vocab.find("NOTHING 0042"), None);
    }

    #[test]
    fn test_contains_code_is_exact() {
        let vocab = SetCodeVocabulary::new(["SOI", "MH3"]).unwrap();
        assert!(vocab.contains_code("soi"));
        assert!(vocab.contains_code("MH3"));
        assert!(!vocab.contains_code("SO"));
        assert!(!vocab.contains_code("XSOI"));
    }

    #[test]
    fn test_longer_codes_win() {
        let vocab = SetCodeVocabulary::new(["MH", "MH3"]).unwrap();
        assert_eq!(vocab.find("MH3 R 0123"), Some("MH3".to_string()));
    }

    #[test]
    fn test_empty_vocabulary_matches_nothing() {
        let vocab = SetCodeVocabulary::new(Vec::<String>::new()).unwrap();
        assert!(vocab.is_empty());
        assert!(!vocab.matches("FDN U 0125"));
        assert_eq!(vocab.find("FDN U 0125"), None);
    }
}
