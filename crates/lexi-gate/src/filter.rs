//! Candidate filtering: part-of-speech masking and top-k selection.
//!
//! Both operations are pure functions over (weights, side-information) so
//! they stay independently unit-testable without the generative model.
//! The object path masks non-noun candidates to zero and picks the top-k
//! masked weights as the "explanation subset"; the attribute path skips
//! the mask (its vocabulary is pre-curated) and picks a top-m subset for
//! the final composition.

use lexi_core::LexiError;

use crate::pos::PosTagger;

/// Builds the noun mask for a fixed candidate word list.
///
/// Returns one `f32` per candidate: `1.0` for noun-tagged words, `0.0`
/// otherwise. The candidate set is fixed after indexing, so callers may
/// compute this once and reuse it every step.
///
/// # Example
///
/// ```
/// use lexi_gate::filter::noun_mask;
/// use lexi_gate::pos::LexiconTagger;
///
/// let words = ["statue".to_string(), "quickly".to_string()];
/// assert_eq!(noun_mask(&words, &LexiconTagger), vec![1.0, 0.0]);
/// ```
pub fn noun_mask(words: &[String], tagger: &dyn PosTagger) -> Vec<f32> {
    words
        .iter()
        .map(|w| if tagger.is_noun(w) { 1.0 } else { 0.0 })
        .collect()
}

/// Selects the indices of the `k` candidates with the largest absolute
/// weight, descending, ties broken by stable (ascending-index) order.
///
/// Always returns exactly `k` indices: candidates whose weight was masked
/// to zero still participate, so downstream composition must tolerate
/// near-zero-weight entries (the composer's epsilon floor handles that).
///
/// # Errors
///
/// Returns [`LexiError::Config`] if `k` exceeds the candidate count;
/// that is a sizing mistake, caught at configuration time.
///
/// # Example
///
/// ```
/// use lexi_gate::filter::top_k_indices;
///
/// let weights = [0.1, -0.9, 0.5, 0.9];
/// // |-0.9| and |0.9| tie; index 1 comes first by stable order
/// assert_eq!(top_k_indices(&weights, 3).unwrap(), vec![1, 3, 2]);
/// ```
pub fn top_k_indices(weights: &[f32], k: usize) -> Result<Vec<u32>, LexiError> {
    if k > weights.len() {
        return Err(LexiError::Config {
            message: format!(
                "top-k size {k} exceeds candidate count {}",
                weights.len()
            ),
        });
    }
    let mut indices: Vec<u32> = (0..weights.len() as u32).collect();
    indices.sort_by(|&a, &b| {
        let wa = weights[a as usize].abs();
        let wb = weights[b as usize].abs();
        wb.partial_cmp(&wa).unwrap_or(std::cmp::Ordering::Equal)
    });
    indices.truncate(k);
    Ok(indices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pos::LexiconTagger;

    #[test]
    fn mask_is_stable_across_calls() {
        let words: Vec<String> = ["statue", "the", "dog", "running", "vase"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let first = noun_mask(&words, &LexiconTagger);
        let second = noun_mask(&words, &LexiconTagger);
        assert_eq!(first, second);
        assert_eq!(first, vec![1.0, 0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn mask_contains_exactly_noun_candidates() {
        let words: Vec<String> = ["cat", "quickly", "painting", "is"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mask = noun_mask(&words, &LexiconTagger);
        let kept: Vec<&String> = words
            .iter()
            .zip(mask.iter())
            .filter(|(_, &m)| m == 1.0)
            .map(|(w, _)| w)
            .collect();
        assert_eq!(kept, vec!["cat", "painting"]);
    }

    #[test]
    fn top_k_orders_by_absolute_weight() {
        let weights = [0.2, -0.8, 0.1, 0.5];
        assert_eq!(top_k_indices(&weights, 2).unwrap(), vec![1, 3]);
    }

    #[test]
    fn top_k_returns_exactly_k_even_with_zeros() {
        // Only one nonzero weight, yet k=4 indices come back
        let weights = [0.0, 0.0, 0.7, 0.0, 0.0];
        let top = top_k_indices(&weights, 4).unwrap();
        assert_eq!(top.len(), 4);
        assert_eq!(top[0], 2);
        // Zero-weight ties resolve in ascending index order
        assert_eq!(&top[1..], &[0, 1, 3]);
    }

    #[test]
    fn top_k_full_length_is_a_permutation() {
        let weights = [0.3, 0.1, 0.2];
        let mut top = top_k_indices(&weights, 3).unwrap();
        top.sort_unstable();
        assert_eq!(top, vec![0, 1, 2]);
    }

    #[test]
    fn oversized_k_is_a_config_error() {
        assert!(matches!(
            top_k_indices(&[0.1, 0.2], 3),
            Err(LexiError::Config { .. })
        ));
    }
}
