//! Part-of-speech tagging seam for the object candidate mask.
//!
//! The candidate filter only needs one question answered per word: is it
//! a noun? The seam is a trait so a real tagger can be plugged in; the
//! default [`LexiconTagger`] is a word-list + suffix heuristic that
//! mirrors how perceptron taggers behave on isolated words: unknown
//! open-class words default to the noun category, and closed-class or
//! clearly verbal/adverbial forms are rejected.

/// Answers the single question the candidate filter asks.
pub trait PosTagger {
    /// Returns `true` if `word`, taken in isolation, is noun-tagged.
    fn is_noun(&self, word: &str) -> bool;
}

const CLOSED_CLASS: &[&str] = &[
    // determiners and articles
    "a", "an", "the", "this", "that", "these", "those", "some", "any", "each",
    "every", "no", "all", "both",
    // pronouns
    "i", "you", "he", "she", "it", "we", "they", "him", "her", "them", "his",
    "its", "their", "theirs", "mine", "yours", "ours", "who", "whom", "which",
    "what",
    // prepositions and conjunctions
    "of", "in", "on", "at", "by", "for", "with", "to", "from", "as", "into",
    "onto", "over", "under", "about", "and", "or", "but", "nor", "so", "yet",
    "if", "because", "while", "than",
    // auxiliaries and modals
    "is", "are", "was", "were", "be", "been", "being", "am", "do", "does",
    "did", "have", "has", "had", "can", "could", "will", "would", "shall",
    "should", "may", "might", "must", "not",
    // frequent bare adjectives/adverbs that survive the suffix checks
    "very", "quite", "big", "small", "old", "new", "good", "bad", "red",
    "blue", "green", "white", "black", "dark", "light", "ancient", "modern",
];

const LY_NOUN_EXCEPTIONS: &[&str] = &["assembly", "family", "supply", "belly", "jelly", "lily"];

const ING_NOUN_EXCEPTIONS: &[&str] = &[
    "king", "ring", "thing", "wing", "spring", "string", "morning", "evening",
    "building", "painting", "drawing", "ceiling", "clothing", "lightning",
];

/// Word-list and suffix based noun heuristic.
///
/// # Example
///
/// ```
/// use lexi_gate::pos::{LexiconTagger, PosTagger};
///
/// let tagger = LexiconTagger;
/// assert!(tagger.is_noun("statue"));
/// assert!(tagger.is_noun("painting"));
/// assert!(!tagger.is_noun("quickly"));
/// assert!(!tagger.is_noun("the"));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LexiconTagger;

impl PosTagger for LexiconTagger {
    fn is_noun(&self, word: &str) -> bool {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '-');
        if trimmed.is_empty() || !trimmed.chars().any(char::is_alphabetic) {
            return false;
        }
        let lower = trimmed.to_ascii_lowercase();

        if CLOSED_CLASS.contains(&lower.as_str()) {
            return false;
        }
        // Adverbs: -ly, with a short noun exception list
        if lower.ends_with("ly") && !LY_NOUN_EXCEPTIONS.contains(&lower.as_str()) {
            return false;
        }
        // Gerunds/participles: -ing, unless a lexicalized noun
        if lower.len() > 4
            && lower.ends_with("ing")
            && !ING_NOUN_EXCEPTIONS.contains(&lower.as_str())
        {
            return false;
        }
        // Past forms: -ed, sparing -eed stems (seed, feed)
        if lower.len() > 4 && lower.ends_with("ed") && !lower.ends_with("eed") {
            return false;
        }
        // Comparatives/superlatives
        if lower.len() > 5 && (lower.ends_with("est") || lower.ends_with("ier")) {
            return false;
        }

        // Unknown open-class word: noun by default
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_nouns_accepted() {
        let tagger = LexiconTagger;
        for word in ["statue", "dog", "mountain", "vase", "cathedral", "seed"] {
            assert!(tagger.is_noun(word), "{word} should be a noun");
        }
    }

    #[test]
    fn lexicalized_ing_nouns_accepted() {
        let tagger = LexiconTagger;
        for word in ["painting", "building", "king", "morning"] {
            assert!(tagger.is_noun(word), "{word} should be a noun");
        }
    }

    #[test]
    fn non_nouns_rejected() {
        let tagger = LexiconTagger;
        for word in ["the", "running", "quickly", "painted", "is", "and", "oldest"] {
            assert!(!tagger.is_noun(word), "{word} should not be a noun");
        }
    }

    #[test]
    fn punctuation_and_empty_rejected() {
        let tagger = LexiconTagger;
        assert!(!tagger.is_noun(""));
        assert!(!tagger.is_noun("..."));
        assert!(!tagger.is_noun("123"));
    }

    #[test]
    fn tagging_ignores_case_and_surrounding_punctuation() {
        let tagger = LexiconTagger;
        assert!(tagger.is_noun("Statue"));
        assert!(tagger.is_noun("\"statue\""));
        assert!(!tagger.is_noun("The"));
    }
}
