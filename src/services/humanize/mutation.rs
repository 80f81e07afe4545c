// Fallback Mutation
// Offline rewrite used when the generation service is unavailable.
//
// Up to three stages run cumulatively, `min(attempt, 3)` of them:
//   1. formal words -> randomly chosen casual synonyms
//   2. merge some short sentences with ", and" + stock phrase simplification
//   3. move the first clause of some long comma-separated sentences to the end
//
// All randomness comes from the caller's RNG, so a fixed seed reproduces the output.

use rand::seq::IndexedRandom;
use rand::Rng;
use regex::{Captures, Regex};
use std::sync::OnceLock;

pub const MUTATION_STAGES: u32 = 3;

const MERGE_PROBABILITY: f64 = 0.35;
const REORDER_PROBABILITY: f64 = 0.4;
const SHORT_SENTENCE_WORDS: usize = 12;
const MIN_REORDER_CLAUSES: usize = 3;

const CASUAL_SYNONYMS: &[(&str, &[&str])] = &[
    ("utilize", &["use", "work with", "rely on"]),
    ("utilizes", &["uses", "works with", "relies on"]),
    ("utilized", &["used", "relied on"]),
    ("facilitate", &["help", "make easier", "support"]),
    ("facilitates", &["helps", "makes easier", "supports"]),
    ("demonstrate", &["show", "prove"]),
    ("demonstrates", &["shows", "proves"]),
    ("furthermore", &["also", "plus", "on top of that"]),
    ("moreover", &["also", "besides"]),
    ("additionally", &["also", "plus"]),
    ("consequently", &["so", "as a result"]),
    ("therefore", &["so", "that's why"]),
    ("however", &["but", "still"]),
    ("significant", &["big", "real", "major"]),
    ("numerous", &["many", "lots of"]),
    ("approximately", &["about", "around"]),
    ("commence", &["start", "begin"]),
    ("obtain", &["get"]),
    ("purchase", &["buy"]),
    ("subsequently", &["later", "then"]),
];

const STOCK_PHRASES: &[(&str, &str)] = &[
    ("it is important to note that", "note that"),
    ("in order to", "to"),
    ("due to the fact that", "because"),
    ("at this point in time", "now"),
    ("a large number of", "a lot of"),
];

/// Result of a fallback rewrite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationOutcome {
    pub text: String,
    pub stages_applied: u32,
}

fn formal_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        let words: Vec<&str> = CASUAL_SYNONYMS.iter().map(|(w, _)| *w).collect();
        Regex::new(&format!(r"(?i)\b(?:{})\b", words.join("|"))).expect("formal word regex")
    })
}

fn stock_phrase_res() -> &'static [(Regex, &'static str)] {
    static RE: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    RE.get_or_init(|| {
        STOCK_PHRASES
            .iter()
            .map(|(phrase, plain)| {
                let re = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase)))
                    .expect("stock phrase regex");
                (re, *plain)
            })
            .collect()
    })
}

fn sentence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^.!?]+[.!?]*").expect("sentence regex"))
}

/// Apply `min(attempt, 3)` mutation stages to `text`
pub fn mutate<R: Rng + ?Sized>(text: &str, attempt: u32, rng: &mut R) -> MutationOutcome {
    let stages = attempt.min(MUTATION_STAGES);
    let mut out = text.to_string();

    if stages >= 1 {
        out = replace_formal_words(&out, rng);
    }
    if stages >= 2 {
        out = merge_short_sentences(&out, rng);
        out = simplify_stock_phrases(&out);
    }
    if stages >= 3 {
        out = reorder_clauses(&out, rng);
    }

    MutationOutcome {
        text: out,
        stages_applied: stages,
    }
}

fn replace_formal_words<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    formal_word_re()
        .replace_all(text, |caps: &Captures| {
            let word = &caps[0];
            let lower = word.to_lowercase();
            CASUAL_SYNONYMS
                .iter()
                .find(|(formal, _)| *formal == lower)
                .and_then(|(_, alts)| alts.choose(rng))
                .map(|alt| match_case(word, alt))
                .unwrap_or_else(|| word.to_string())
        })
        .into_owned()
}

fn simplify_stock_phrases(text: &str) -> String {
    stock_phrase_res()
        .iter()
        .fold(text.to_string(), |acc, (re, plain)| {
            re.replace_all(&acc, |caps: &Captures| match_case(&caps[0], plain))
                .into_owned()
        })
}

fn merge_short_sentences<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut sentences = parse_sentences(text);
    let mut i = 0;
    while i + 1 < sentences.len() {
        let mergeable = sentences[i].end == "."
            && !sentences[i + 1].lead.contains('\n')
            && sentences[i + 1].word_count() > 0
            && sentences[i].word_count() <= SHORT_SENTENCE_WORDS
            && sentences[i + 1].word_count() <= SHORT_SENTENCE_WORDS;
        if mergeable && rng.random_bool(MERGE_PROBABILITY) {
            sentences[i].end = ", and".to_string();
            sentences[i + 1].body = lowercase_first(&sentences[i + 1].body);
            i += 2;
        } else {
            i += 1;
        }
    }
    join_sentences(&sentences)
}

fn reorder_clauses<R: Rng + ?Sized>(text: &str, rng: &mut R) -> String {
    let mut sentences = parse_sentences(text);
    for sentence in sentences.iter_mut() {
        if let Some(rotated) = rotate_clauses(&sentence.body) {
            if rng.random_bool(REORDER_PROBABILITY) {
                sentence.body = rotated;
            }
        }
    }
    join_sentences(&sentences)
}

/// Move the first comma-separated clause to the end. `None` when the sentence is too short.
pub fn rotate_clauses(body: &str) -> Option<String> {
    let clauses: Vec<&str> = body.split(',').map(str::trim).filter(|c| !c.is_empty()).collect();
    if clauses.len() < MIN_REORDER_CLAUSES {
        return None;
    }
    let mut rotated: Vec<String> = clauses[1..].iter().map(|c| c.to_string()).collect();
    rotated.push(lowercase_first(clauses[0]));
    Some(capitalize_first(&rotated.join(", ")))
}

#[derive(Debug, Clone)]
struct Sentence {
    lead: String,
    body: String,
    end: String,
}

impl Sentence {
    fn word_count(&self) -> usize {
        self.body.split_whitespace().count()
    }
}

fn parse_sentences(text: &str) -> Vec<Sentence> {
    let mut sentences: Vec<Sentence> = Vec::new();
    let mut last = 0;
    for m in sentence_re().find_iter(text) {
        let gap = &text[last..m.start()];
        let raw = m.as_str();
        last = m.end();

        let body_start = raw.len() - raw.trim_start().len();
        let body_end = raw.trim_end_matches(['.', '!', '?']).len().max(body_start);
        let lead = format!("{}{}", gap, &raw[..body_start]);
        sentences.push(Sentence {
            lead,
            body: raw[body_start..body_end].to_string(),
            end: raw[body_end..].to_string(),
        });
    }
    let tail = &text[last..];
    if !tail.is_empty() {
        sentences.push(Sentence {
            lead: tail.to_string(),
            body: String::new(),
            end: String::new(),
        });
    }
    sentences
}

fn join_sentences(sentences: &[Sentence]) -> String {
    sentences
        .iter()
        .map(|s| format!("{}{}{}", s.lead, s.body, s.end))
        .collect()
}

fn match_case(original: &str, replacement: &str) -> String {
    if original.chars().next().is_some_and(char::is_uppercase) {
        capitalize_first(replacement)
    } else {
        replacement.to_string()
    }
}

fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lowercase the first letter unless the word looks like "I" or an acronym
fn lowercase_first(s: &str) -> String {
    let first_word = s.split_whitespace().next().unwrap_or("");
    let keep = first_word == "I"
        || first_word.starts_with("I'")
        || first_word.chars().filter(|c| c.is_uppercase()).count() > 1;
    if keep {
        return s.to_string();
    }
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SAMPLE: &str = "We utilize the tool in order to save time. It is fast. It is cheap. \
                          Furthermore, the team, the budget, and the schedule all benefit.";

    #[test]
    fn test_same_seed_same_output() {
        for attempt in 1..=3 {
            let a = mutate(SAMPLE, attempt, &mut StdRng::seed_from_u64(7));
            let b = mutate(SAMPLE, attempt, &mut StdRng::seed_from_u64(7));
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_stage_count_follows_attempt() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(mutate(SAMPLE, 1, &mut rng).stages_applied, 1);
        assert_eq!(mutate(SAMPLE, 2, &mut rng).stages_applied, 2);
        assert_eq!(mutate(SAMPLE, 3, &mut rng).stages_applied, 3);
        assert_eq!(mutate(SAMPLE, 9, &mut rng).stages_applied, 3);
    }

    #[test]
    fn test_first_stage_only_replaces_words() {
        let out = mutate(SAMPLE, 1, &mut StdRng::seed_from_u64(3)).text;
        assert!(!out.contains("utilize"));
        assert!(!out.contains("Furthermore"));
        // stock phrases belong to the second stage
        assert!(out.contains("in order to"));
    }

    #[test]
    fn test_second_stage_simplifies_phrases() {
        let out = mutate(SAMPLE, 2, &mut StdRng::seed_from_u64(3)).text;
        assert!(!out.contains("in order to"));
        assert!(out.contains("to save time"));
    }

    #[test]
    fn test_replacement_keeps_capitalization() {
        let out = replace_formal_words("Moreover, it works.", &mut StdRng::seed_from_u64(11));
        assert!(out.starts_with("Also,") || out.starts_with("Besides,"));
    }

    #[test]
    fn test_stock_phrase_capitalized() {
        let out = simplify_stock_phrases("It is important to note that prices rose.");
        assert_eq!(out, "Note that prices rose.");
    }

    #[test]
    fn test_rotate_clauses() {
        assert_eq!(
            rotate_clauses("First part, second part, third part").as_deref(),
            Some("Second part, third part, first part")
        );
        assert!(rotate_clauses("Only, two").is_none());
    }

    #[test]
    fn test_parse_and_join_is_lossless() {
        let texts = ["", "No terminator", "One. Two!  Three?\n\nFour...", "...lead"];
        for text in texts {
            assert_eq!(join_sentences(&parse_sentences(text)), text);
        }
    }

    #[test]
    fn test_merge_keeps_paragraph_breaks() {
        let text = "Short one.\n\nShort two.";
        for seed in 0..20 {
            let out = merge_short_sentences(text, &mut StdRng::seed_from_u64(seed));
            assert_eq!(out, text);
        }
    }

    #[test]
    fn test_merge_never_joins_trailing_whitespace() {
        let text = "Short one. Short two.  ";
        for seed in 0..50 {
            let out = merge_short_sentences(text, &mut StdRng::seed_from_u64(seed));
            assert!(!out.trim_end().ends_with(", and"), "seed {seed}: {out:?}");
            assert!(out.ends_with("two.  "), "seed {seed}: {out:?}");
        }
    }

    #[test]
    fn test_third_attempt_reorders_clauses() {
        let text = "First part, second part, third part.";
        let rotated = "Second part, third part, first part.";
        let mut seen_rotation = false;
        for seed in 0..64 {
            assert_eq!(mutate(text, 1, &mut StdRng::seed_from_u64(seed)).text, text);
            assert_eq!(mutate(text, 2, &mut StdRng::seed_from_u64(seed)).text, text);

            let third = mutate(text, 3, &mut StdRng::seed_from_u64(seed)).text;
            assert!(third == text || third == rotated, "seed {seed}: {third:?}");
            seen_rotation |= third == rotated;
        }
        assert!(seen_rotation);
    }

    #[test]
    fn test_lowercase_first_keeps_pronoun_and_acronyms() {
        assert_eq!(lowercase_first("It works"), "it works");
        assert_eq!(lowercase_first("I think so"), "I think so");
        assert_eq!(lowercase_first("NASA said"), "NASA said");
    }
}
