//! Attribute word-list loading.
//!
//! The attribute vocabulary is a curated plain-text file, one phrase per
//! line. Every line must encode to exactly one token id; a phrase the
//! tokenizer splits (or drops) cannot address a single embedding row, so
//! it is a fatal configuration error caught before any training step.

use std::path::Path;

use lexi_core::{CandidateVocabulary, EmbeddingTable, LexiError};
use lexi_gate::TokenizerOps;
use tracing::info;

/// One validated attribute word: its single token id and surface form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttrWord {
    /// The word's single token id.
    pub id: u32,
    /// The phrase as written in the word list.
    pub text: String,
}

/// Loads and validates the attribute word list.
///
/// Blank lines are skipped; everything else must tokenize to exactly one
/// id.
///
/// # Errors
///
/// Returns [`LexiError::Config`] if the file is unreadable or any line
/// produces zero or multiple token ids.
pub fn load_attr_words(
    path: &Path,
    tokenizer: &dyn TokenizerOps,
) -> Result<Vec<AttrWord>, LexiError> {
    let contents = std::fs::read_to_string(path).map_err(|e| LexiError::Config {
        message: format!("cannot read attribute word list {}: {e}", path.display()),
    })?;

    let mut words = Vec::new();
    for (lineno, line) in contents.lines().enumerate() {
        let phrase = line.trim();
        if phrase.is_empty() {
            continue;
        }
        let ids = tokenizer.encode(phrase);
        if ids.len() != 1 {
            return Err(LexiError::Config {
                message: format!(
                    "attribute word list line {}: {phrase:?} tokenizes to {} ids, expected exactly 1",
                    lineno + 1,
                    ids.len()
                ),
            });
        }
        words.push(AttrWord {
            id: ids[0],
            text: phrase.to_string(),
        });
    }
    info!(words = words.len(), path = %path.display(), "attribute word list loaded");
    Ok(words)
}

/// Builds the attribute candidate vocabulary from validated words.
///
/// # Errors
///
/// Propagates table lookup failures for out-of-range token ids.
pub fn build_attr_vocabulary(
    table: &EmbeddingTable,
    words: &[AttrWord],
) -> Result<CandidateVocabulary, LexiError> {
    let indices: Vec<u32> = words.iter().map(|w| w.id).collect();
    let texts: Vec<String> = words.iter().map(|w| w.text.clone()).collect();
    CandidateVocabulary::from_table(table, indices, texts)
}
