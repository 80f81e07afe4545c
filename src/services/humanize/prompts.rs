// Rewrite Prompts
// System prompts escalate in how far the rewrite may stray from the source phrasing.

const FIRST_PASS_PROMPT: &str = r#"You rewrite text so it reads as if a thoughtful person wrote it by hand.
Keep every fact, claim and number from the input.
Vary sentence length: mix short sentences with longer ones.
Prefer plain, everyday words over formal ones ("use" instead of "utilize", "help" instead of "facilitate").
Avoid stock transitions such as "Furthermore", "Moreover" and "Additionally".
Return only the rewritten text, with no preamble and no quotes."#;

const SECOND_PASS_PROMPT: &str = r#"Rewrite the text in a relaxed, conversational voice, the way someone explains it to a friend.
Keep the meaning and all facts intact.
Restructure sentences freely: merge some, split others, change the order of clauses.
Use contractions, the occasional rhetorical question and a few idiomatic expressions.
Drop formal connectives and passive constructions; say who does what.
Small natural imperfections are fine: a sentence fragment here, an aside in parentheses there.
Return only the rewritten text, with no preamble and no quotes."#;

const THIRD_PASS_PROMPT: &str = r#"Completely rework the text into a personal, natural piece of writing.
The facts must survive, but nothing else about the original phrasing has to.
Write with a clear personal voice: opinions, hedges ("I think", "honestly"), contractions and idioms.
Let the rhythm be uneven. Very short sentences. Then a longer one that wanders a little before getting to the point.
Add a brief tangent or example that a person would naturally bring up, as long as it stays true to the content.
Avoid predictable openers like "This", "These" or "In", and never end a sentence on words like "important" or "crucial".
Return only the rewritten text, with no preamble and no quotes."#;

/// Number of distinct escalation levels
pub const PROMPT_LEVELS: u32 = 3;

/// Escalation level for an attempt ordinal, in 1..=PROMPT_LEVELS
pub fn escalation_level(attempt: u32) -> u32 {
    attempt.clamp(1, PROMPT_LEVELS)
}

/// System prompt for an attempt ordinal
pub fn system_prompt(attempt: u32) -> &'static str {
    match escalation_level(attempt) {
        1 => FIRST_PASS_PROMPT,
        2 => SECOND_PASS_PROMPT,
        _ => THIRD_PASS_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_selection() {
        assert_eq!(system_prompt(1), FIRST_PASS_PROMPT);
        assert_eq!(system_prompt(2), SECOND_PASS_PROMPT);
        assert_eq!(system_prompt(3), THIRD_PASS_PROMPT);
        assert_eq!(system_prompt(7), THIRD_PASS_PROMPT);
        assert_eq!(system_prompt(0), FIRST_PASS_PROMPT);
    }
}
