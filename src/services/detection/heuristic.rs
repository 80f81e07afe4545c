// Heuristic Detector
// Structural AI-likeness score from sentence statistics, vocabulary and phrasing
//
// Each signal is a gated bonus: when its threshold trips, a fixed amount is added.
// The sum is clamped to [MIN_SCORE, MAX_SCORE].

use crate::services::text_processor::{
    lexical_diversity, mean_and_variance, split_sentences, word_count, word_tokens,
};
use regex::Regex;
use std::sync::OnceLock;

use super::{clamp_score, MIN_SCORE};

/// Mean sentence length band typical of generated prose (exclusive bounds)
const SENTENCE_LEN_BAND: (f64, f64) = (15.0, 25.0);
const SENTENCE_LEN_BONUS: f64 = 20.0;
const LOW_VARIANCE_THRESHOLD: f64 = 10.0;
const LOW_VARIANCE_BONUS: f64 = 15.0;
const LOW_DIVERSITY_THRESHOLD: f64 = 0.4;
const LOW_DIVERSITY_BONUS: f64 = 25.0;
const FORMAL_PATTERN_THRESHOLD: usize = 3;
const FORMAL_PATTERN_BONUS: f64 = 20.0;
const TRANSITION_DENSITY: f64 = 0.3;
const TRANSITION_BONUS: f64 = 15.0;
const PASSIVE_DENSITY: f64 = 0.4;
const PASSIVE_BONUS: f64 = 10.0;

/// Inputs with fewer words than this carry no usable signal
pub(crate) const MIN_WORDS: usize = 2;

const TRANSITION_WORDS: &[&str] = &[
    "however",
    "therefore",
    "furthermore",
    "moreover",
    "additionally",
    "consequently",
    "thus",
    "hence",
    "nevertheless",
    "nonetheless",
    "meanwhile",
    "subsequently",
    "accordingly",
    "ultimately",
];

fn formal_patterns() -> &'static [Regex] {
    static RE: OnceLock<Vec<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        [
            r"\bfurthermore\b",
            r"\bmoreover\b",
            r"\badditionally\b",
            r"\bconsequently\b",
            r"\bnevertheless\b",
            r"\bin conclusion\b",
            r"\bit is important to note\b",
            r"\bit is worth noting\b",
            r"\butiliz(?:e|es|ed|ing|ation)\b",
            r"\bfacilitat(?:e|es|ed|ing)\b",
            r"\bdemonstrat(?:e|es|ed|ing)\b",
            r"\bleverag(?:e|es|ed|ing)\b",
            r"\bsignificant(?:ly)?\b",
            r"\bcomprehensive\b",
            r"\bsubsequently\b",
            r"\bin order to\b",
            r"\bplays a (?:crucial|vital|pivotal) role\b",
            r"\bdelve\b",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("formal pattern regex"))
        .collect()
    })
}

fn passive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b(?:was|were|is|are|been)\s+[a-z]+ed\b").expect("passive voice regex")
    })
}

/// Count of formal connective / filler occurrences in lowercased text
pub fn formal_pattern_count(lower: &str) -> usize {
    formal_patterns()
        .iter()
        .map(|re| re.find_iter(lower).count())
        .sum()
}

/// Score text for AI-likeness in [5, 95]. Pure and deterministic.
pub fn heuristic_score(text: &str) -> f64 {
    let sentences = split_sentences(text);
    let tokens = word_tokens(text);
    if sentences.is_empty() || tokens.len() < MIN_WORDS {
        return MIN_SCORE;
    }

    let lengths: Vec<f64> = sentences.iter().map(|s| word_count(s) as f64).collect();
    let (mean_len, variance) = mean_and_variance(&lengths);
    let sentence_count = sentences.len() as f64;
    let lower = text.to_lowercase();

    let mut score = 0.0;

    if mean_len > SENTENCE_LEN_BAND.0 && mean_len < SENTENCE_LEN_BAND.1 {
        score += SENTENCE_LEN_BONUS;
    }

    if variance < LOW_VARIANCE_THRESHOLD {
        score += LOW_VARIANCE_BONUS;
    }

    if lexical_diversity(&tokens) < LOW_DIVERSITY_THRESHOLD {
        score += LOW_DIVERSITY_BONUS;
    }

    if formal_pattern_count(&lower) > FORMAL_PATTERN_THRESHOLD {
        score += FORMAL_PATTERN_BONUS;
    }

    let transitions = tokens
        .iter()
        .filter(|t| TRANSITION_WORDS.contains(&t.as_str()))
        .count() as f64;
    if transitions > TRANSITION_DENSITY * sentence_count {
        score += TRANSITION_BONUS;
    }

    let passives = passive_re().find_iter(&lower).count() as f64;
    if passives > PASSIVE_DENSITY * sentence_count {
        score += PASSIVE_BONUS;
    }

    clamp_score(score)
}
