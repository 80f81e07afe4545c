// Text Processing Service
// Sentence and word tokenization shared by the local detectors

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn sentence_boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]+").expect("sentence boundary regex"))
}

fn word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+(?:'\p{L}+)?").expect("word regex"))
}

/// Normalize typographic punctuation and whitespace before scoring or rewriting
pub fn normalize_punctuation(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let s = text
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ")
        .replace("\r\n", "\n")
        .replace('\r', "\n");

    s.lines()
        .map(|ln| ln.split_whitespace().collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Split on `.`, `!` and `?` runs; empty pieces are discarded
pub fn split_sentences(text: &str) -> Vec<&str> {
    sentence_boundary_re()
        .split(text)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Lowercased word tokens
pub fn word_tokens(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    word_re()
        .find_iter(&lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Whitespace-delimited word count of a sentence
pub fn word_count(sentence: &str) -> usize {
    sentence.split_whitespace().count()
}

/// Unique tokens over total tokens; 0.0 for empty input
pub fn lexical_diversity(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    unique.len() as f64 / tokens.len() as f64
}

/// `1 - unique/total` over sliding n-grams. `None` when there is no complete n-gram.
pub fn ngram_repetition(tokens: &[String], n: usize) -> Option<f64> {
    if n == 0 || tokens.len() < n {
        return None;
    }
    let grams: Vec<&[String]> = tokens.windows(n).collect();
    let unique: HashSet<&[String]> = grams.iter().copied().collect();
    Some(1.0 - unique.len() as f64 / grams.len() as f64)
}

/// Mean and population variance
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    (mean, variance)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_punctuation() {
        let input = "Hello\u{201c}World\u{201d}  it\u{2019}s   fine";
        assert_eq!(normalize_punctuation(input), "Hello\"World\" it's fine");
    }

    #[test]
    fn test_split_sentences_discards_empty() {
        let sentences = split_sentences("First one. Second one!! Third?  ...");
        assert_eq!(sentences, vec!["First one", "Second one", "Third"]);
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("...!?").is_empty());
    }

    #[test]
    fn test_word_tokens_lowercase() {
        let tokens = word_tokens("The Cat's hat, THE end.");
        assert_eq!(tokens, vec!["the", "cat's", "hat", "the", "end"]);
    }

    #[test]
    fn test_word_tokens_non_latin() {
        let tokens = word_tokens("Привет, Мир! Ça va très bien.");
        assert_eq!(tokens, vec!["привет", "мир", "ça", "va", "très", "bien"]);
    }

    #[test]
    fn test_lexical_diversity() {
        let tokens = word_tokens("a a b b");
        assert!((lexical_diversity(&tokens) - 0.5).abs() < 1e-9);
        assert_eq!(lexical_diversity(&[]), 0.0);
    }

    #[test]
    fn test_ngram_repetition() {
        let tokens = word_tokens("a b a b a b");
        // bigrams: ab ba ab ba ab -> 2 unique of 5
        let rep = ngram_repetition(&tokens, 2).unwrap();
        assert!((rep - 0.6).abs() < 1e-9);
        assert!(ngram_repetition(&tokens[..1], 2).is_none());
    }

    #[test]
    fn test_mean_and_variance() {
        let (mean, var) = mean_and_variance(&[8.0, 5.0]);
        assert!((mean - 6.5).abs() < 1e-9);
        assert!((var - 2.25).abs() < 1e-9);
    }
}
