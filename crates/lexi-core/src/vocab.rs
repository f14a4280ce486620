//! Candidate vocabularies: fixed (id, word, embedding) triples drawn from
//! the frozen table, immutable for the run's duration.

use crate::error::LexiError;
use crate::table::EmbeddingTable;

/// A fixed candidate vocabulary: token ids, their decoded surface forms,
/// and the matching snapshot embedding rows (row-major `n × dim`).
///
/// Two disjoint vocabularies exist per run: the ranked object candidates
/// and the curated attribute candidates. Both are built once, before
/// training, and never change afterwards; the weighting networks'
/// parameters are what is learned, not the vocabulary.
#[derive(Debug, Clone)]
pub struct CandidateVocabulary {
    /// Token ids into the embedding table, in rank order.
    pub indices: Vec<u32>,
    /// Decoded word per candidate (used for part-of-speech masking).
    pub words: Vec<String>,
    /// Snapshot embeddings, row-major `len() × dim`.
    pub embeddings: Vec<f32>,
    /// Embedding dimensionality.
    pub dim: usize,
}

impl CandidateVocabulary {
    /// Gathers snapshot rows for the given token ids.
    ///
    /// `words` must parallel `indices`; embeddings are copied from the
    /// table's frozen snapshot so later placeholder writes cannot bleed
    /// into the candidate matrix.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::ShapeMismatch`] if `words` and `indices`
    /// disagree in length, or [`LexiError::RowOutOfRange`] for a bad id.
    pub fn from_table(
        table: &EmbeddingTable,
        indices: Vec<u32>,
        words: Vec<String>,
    ) -> Result<Self, LexiError> {
        if indices.len() != words.len() {
            return Err(LexiError::ShapeMismatch {
                expected: indices.len(),
                got: words.len(),
            });
        }
        let dim = table.dim();
        let mut embeddings = Vec::with_capacity(indices.len() * dim);
        for &id in &indices {
            embeddings.extend_from_slice(table.snapshot_row(id)?);
        }
        Ok(Self {
            indices,
            words,
            embeddings,
            dim,
        })
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// `true` if the vocabulary holds no candidates.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::PlaceholderSlots;

    #[test]
    fn gathers_snapshot_rows_in_order() {
        let data: Vec<f32> = (0..12).map(|i| i as f32).collect();
        let table =
            EmbeddingTable::new(data, 3, PlaceholderSlots { attr: 2, obj: 3 }).unwrap();
        let vocab = CandidateVocabulary::from_table(
            &table,
            vec![1, 0],
            vec!["b".to_string(), "a".to_string()],
        )
        .unwrap();
        assert_eq!(vocab.len(), 2);
        assert_eq!(&vocab.embeddings[..3], &[3.0, 4.0, 5.0]);
        assert_eq!(&vocab.embeddings[3..], &[0.0, 1.0, 2.0]);
    }

    #[test]
    fn rejects_mismatched_words() {
        let table = EmbeddingTable::new(
            vec![0.0; 12],
            3,
            PlaceholderSlots { attr: 2, obj: 3 },
        )
        .unwrap();
        assert!(CandidateVocabulary::from_table(&table, vec![0, 1], vec![]).is_err());
    }

    #[test]
    fn rejects_bad_id() {
        let table = EmbeddingTable::new(
            vec![0.0; 12],
            3,
            PlaceholderSlots { attr: 2, obj: 3 },
        )
        .unwrap();
        let err =
            CandidateVocabulary::from_table(&table, vec![40], vec!["x".to_string()]);
        assert!(matches!(err, Err(LexiError::RowOutOfRange { .. })));
    }
}
