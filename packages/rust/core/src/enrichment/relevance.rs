//! "Is this page about this record?" — one keyword-overlap predicate shared
//! by every pass.

use std::collections::BTreeSet;

use conftrack_extract::normalize_name;

/// Words too generic to tell one event from another.
const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "annual", "at", "call", "conference", "congress", "for", "forum", "in",
    "international", "meeting", "midyear", "of", "on", "papers", "summit", "symposium", "the",
    "to", "workshop",
];

/// Distinctive tokens of a record name plus how many a text must contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelevanceGate {
    tokens: Vec<String>,
    required: usize,
}

impl RelevanceGate {
    pub fn for_name(name: &str) -> Self {
        let tokens = distinctive_tokens(name);
        let n = tokens.len();
        let required = 2.max((n * 2).div_ceil(5));
        Self { tokens, required }
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn required(&self) -> usize {
        self.required
    }

    /// Whether `text` mentions enough distinctive tokens. A name with fewer
    /// than two never passes.
    pub fn matches(&self, text: &str) -> bool {
        if self.tokens.len() < self.required {
            return false;
        }
        let haystack: BTreeSet<String> = normalize_name(text)
            .split_whitespace()
            .map(String::from)
            .collect();
        let hits = self.tokens.iter().filter(|t| haystack.contains(*t)).count();
        hits >= self.required
    }
}

/// Name tokens minus stop words, years, numbers and ordinals.
pub fn distinctive_tokens(name: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    normalize_name(name)
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .filter(|t| !STOP_WORDS.contains(t))
        .filter(|t| !is_numeric_or_ordinal(t))
        .filter(|t| seen.insert(t.to_string()))
        .map(String::from)
        .collect()
}

fn is_numeric_or_ordinal(token: &str) -> bool {
    let digits = token.trim_end_matches(|c: char| c.is_ascii_alphabetic());
    !digits.is_empty()
        && digits.chars().all(|c| c.is_ascii_digit())
        && matches!(&token[digits.len()..], "" | "st" | "nd" | "rd" | "th")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_drop_generic_words() {
        assert_eq!(
            distinctive_tokens("The 12th Annual AAA ATA Midyear Meeting 2026"),
            vec!["aaa", "ata"]
        );
        assert!(distinctive_tokens("Annual Conference 2026").is_empty());
    }

    #[test]
    fn required_count_scales() {
        assert_eq!(RelevanceGate::for_name("Finance").required(), 2);
        assert_eq!(RelevanceGate::for_name("AAA ATA Meeting").required(), 2);
        // 6 tokens: ceil(2.4) = 3
        let gate = RelevanceGate::for_name("Utah Winter Finance Banking Derivatives Markets");
        assert_eq!(gate.tokens().len(), 6);
        assert_eq!(gate.required(), 3);
    }

    #[test]
    fn gate_checks_overlap() {
        let gate = RelevanceGate::for_name("AAA ATA Midyear Meeting 2026");
        assert!(gate.matches("2026 ATA Midyear Meeting | American Accounting Association (AAA)"));
        assert!(!gate.matches("AAA roadside assistance"));
        assert!(!RelevanceGate::for_name("Annual Meeting").matches("annual meeting"));
    }

    #[test]
    fn single_token_names_never_pass() {
        let gate = RelevanceGate::for_name("Finance Conference 2026");
        assert_eq!(gate.tokens(), ["finance"]);
        assert!(!gate.matches("Finance news roundup https://news.example.com/finance"));
    }
}
