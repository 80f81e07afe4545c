// Perplexity-Proxy Detector
// Cheap stand-in for language-model perplexity: vocabulary commonness,
// n-gram repetition and formulaic sentence framing.

use crate::services::text_processor::{ngram_repetition, split_sentences, word_tokens};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

use super::heuristic::MIN_WORDS;
use super::{clamp_score, MIN_SCORE};

const COMMON_RATIO_THRESHOLD: f64 = 0.4;
const RARE_VOCABULARY_BONUS: f64 = 30.0;
const BIGRAM_REPEAT_THRESHOLD: f64 = 0.3;
const BIGRAM_REPEAT_BONUS: f64 = 20.0;
const TRIGRAM_REPEAT_THRESHOLD: f64 = 0.2;
const TRIGRAM_REPEAT_BONUS: f64 = 25.0;
const FORMULAIC_HIT_BONUS: f64 = 2.0;
const FORMULAIC_CAP: f64 = 20.0;

const COMMON_WORDS: &[&str] = &[
    "the", "be", "is", "are", "was", "to", "of", "and", "a", "in", "that", "have", "i", "it",
    "for", "not", "on", "with", "he", "as", "you", "do", "at", "this", "but", "his", "by",
    "from", "they", "we", "say", "her", "she", "or", "an", "will", "my", "one", "all", "would",
    "there", "their", "what", "so", "up", "out", "if", "about", "who", "get", "which", "go",
    "me", "when", "make", "can", "like", "time", "no", "just", "him", "know", "take",
];

fn common_words() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| COMMON_WORDS.iter().copied().collect())
}

fn opener_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:this|these|the|in|by|through|with|for|as)\s").expect("opener regex")
    })
}

fn closing_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)\b(?:important|significant|crucial|essential|vital|fundamental|invaluable)\b(?:\s+\S+){0,2}\s*$",
        )
        .expect("closing regex")
    })
}

/// Share of tokens drawn from the high-frequency English list
pub fn common_word_ratio(tokens: &[String]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let set = common_words();
    tokens.iter().filter(|t| set.contains(t.as_str())).count() as f64 / tokens.len() as f64
}

/// Formulaic openers and evaluative closings, one hit per match
fn formulaic_hits(text: &str) -> usize {
    split_sentences(text)
        .iter()
        .map(|s| usize::from(opener_re().is_match(s)) + usize::from(closing_re().is_match(s)))
        .sum()
}

/// Score text for AI-likeness in [5, 95]. Pure and deterministic.
pub fn perplexity_score(text: &str) -> f64 {
    let tokens = word_tokens(text);
    if tokens.len() < MIN_WORDS {
        return MIN_SCORE;
    }

    let mut score = 0.0;

    if common_word_ratio(&tokens) < COMMON_RATIO_THRESHOLD {
        score += RARE_VOCABULARY_BONUS;
    }

    if ngram_repetition(&tokens, 2).is_some_and(|r| r > BIGRAM_REPEAT_THRESHOLD) {
        score += BIGRAM_REPEAT_BONUS;
    }
    if ngram_repetition(&tokens, 3).is_some_and(|r| r > TRIGRAM_REPEAT_THRESHOLD) {
        score += TRIGRAM_REPEAT_BONUS;
    }

    score += (formulaic_hits(text) as f64 * FORMULAIC_HIT_BONUS).min(FORMULAIC_CAP);

    clamp_score(score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::detection::MAX_SCORE;

    #[test]
    fn test_non_latin_text_is_scored() {
        // no token is on the English frequency list
        assert_eq!(perplexity_score("Привет мир. Как дела сегодня?"), 30.0);
    }

    #[test]
    fn test_degenerate_input_returns_minimum() {
        assert_eq!(perplexity_score(""), MIN_SCORE);
        assert_eq!(perplexity_score("word"), MIN_SCORE);
        assert_eq!(perplexity_score("  ...  "), MIN_SCORE);
    }

    #[test]
    fn test_rare_vocabulary_bonus() {
        let score = perplexity_score("Quantum entanglement elucidates nonlocal correlations.");
        assert_eq!(score, 30.0);
    }

    #[test]
    fn test_repetitive_formulaic_text_scores_high() {
        let text = "The system is important. The system is important. The system is important.";
        // bigram and trigram repetition plus three openers and three closings
        assert_eq!(perplexity_score(text), 57.0);
    }

    #[test]
    fn test_everyday_text_scores_low() {
        let text = "I know you like it and we can go out when you want to.";
        assert!(perplexity_score(text) <= 10.0);
    }

    #[test]
    fn test_formulaic_hits_are_capped() {
        let sentence = "This result is crucial. ";
        let text = sentence.repeat(20);
        let hits = formulaic_hits(&text);
        assert_eq!(hits, 40);
        let score = perplexity_score(&text);
        assert!(score <= MAX_SCORE);
    }

    #[test]
    fn test_common_word_ratio() {
        let tokens = word_tokens("the cat and the zygote");
        assert!((common_word_ratio(&tokens) - 0.6).abs() < 1e-9);
    }
}
