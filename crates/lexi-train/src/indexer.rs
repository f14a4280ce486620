//! Vocabulary indexing: selecting the object candidate set.
//!
//! Runs once, before training. The full vocabulary's precomputed
//! unit-normalized text encodings are ranked by cosine similarity against
//! the mean target-image feature; the top-N row indices become the fixed
//! object candidate vocabulary. Failure here gates the rest of the run
//! and is fatal; there is nothing to retry.

use std::path::Path;

use candle_core::Device;
use lexi_core::{CandidateVocabulary, EmbeddingTable, LexiError};
use lexi_gate::TokenizerOps;
use tracing::info;

/// Loads the persisted vocabulary similarity table.
///
/// The blob is a safetensors file holding one `[vocab, feat_dim]` tensor
/// keyed by the pretrained model's identity. Returns the row-major data
/// and the feature dimension.
///
/// # Errors
///
/// A missing or unreadable file, or a missing model key, is
/// [`LexiError::Config`]: fatal at startup.
pub fn load_vocab_encodings(
    path: &Path,
    model_id: &str,
) -> Result<(Vec<f32>, usize), LexiError> {
    let tensors = candle_core::safetensors::load(path, &Device::Cpu).map_err(|e| {
        LexiError::Config {
            message: format!(
                "cannot load vocabulary encodings from {}: {e}",
                path.display()
            ),
        }
    })?;
    let tensor = tensors.get(model_id).ok_or_else(|| LexiError::Config {
        message: format!(
            "vocabulary encodings at {} carry no entry for model {model_id:?}",
            path.display()
        ),
    })?;
    let (rows, dim) = tensor.dims2().map_err(|e| LexiError::Config {
        message: format!("vocabulary encodings must be 2-dimensional: {e}"),
    })?;
    let data = tensor
        .flatten_all()
        .and_then(|t| t.to_vec1::<f32>())
        .map_err(|e| LexiError::Internal {
            message: format!("load_vocab_encodings: {e}"),
        })?;
    info!(rows, dim, "loaded vocabulary encodings");
    Ok((data, dim))
}

/// Ranks the full vocabulary against the mean target-image feature and
/// returns the top-`n` row indices, sorted descending by cosine
/// similarity. Deterministic given fixed inputs; ties resolve in
/// ascending-index order.
///
/// `image_features` is row-major `m × feat_dim` (one row per target
/// image); `vocab_encodings` is row-major `vocab × feat_dim`, already
/// unit-normalized.
///
/// # Errors
///
/// Returns [`LexiError::ShapeMismatch`] for ragged inputs and
/// [`LexiError::Config`] if `n` exceeds the vocabulary size or either
/// input is empty.
pub fn rank_candidates(
    image_features: &[f32],
    vocab_encodings: &[f32],
    feat_dim: usize,
    n: usize,
) -> Result<Vec<u32>, LexiError> {
    if feat_dim == 0 || image_features.len() % feat_dim != 0 {
        return Err(LexiError::ShapeMismatch {
            expected: feat_dim.max(1),
            got: image_features.len(),
        });
    }
    if vocab_encodings.len() % feat_dim != 0 {
        return Err(LexiError::ShapeMismatch {
            expected: feat_dim,
            got: vocab_encodings.len(),
        });
    }
    let num_images = image_features.len() / feat_dim;
    let vocab_size = vocab_encodings.len() / feat_dim;
    if num_images == 0 {
        return Err(LexiError::Config {
            message: "no target image features provided".to_string(),
        });
    }
    if n > vocab_size {
        return Err(LexiError::Config {
            message: format!("requested {n} candidates from a vocabulary of {vocab_size}"),
        });
    }

    // Mean target-image feature
    let mut mean = vec![0.0f32; feat_dim];
    for row in image_features.chunks_exact(feat_dim) {
        for (m, x) in mean.iter_mut().zip(row.iter()) {
            *m += x;
        }
    }
    for m in &mut mean {
        *m /= num_images as f32;
    }
    let mean_norm = mean.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-12);

    let scores: Vec<f32> = vocab_encodings
        .chunks_exact(feat_dim)
        .map(|row| {
            let dot: f32 = row.iter().zip(mean.iter()).map(|(a, b)| a * b).sum();
            let row_norm = row.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-12);
            dot / (row_norm * mean_norm)
        })
        .collect();

    let mut indices: Vec<u32> = (0..vocab_size as u32).collect();
    indices.sort_by(|&a, &b| {
        scores[b as usize]
            .partial_cmp(&scores[a as usize])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices.truncate(n);
    Ok(indices)
}

/// Builds the object candidate vocabulary: ranked indices, their decoded
/// surface forms, and their snapshot embedding rows.
///
/// # Errors
///
/// Propagates [`rank_candidates`] errors and table lookup failures.
pub fn build_object_vocabulary(
    table: &EmbeddingTable,
    tokenizer: &dyn TokenizerOps,
    image_features: &[f32],
    vocab_encodings: &[f32],
    feat_dim: usize,
    n: usize,
) -> Result<CandidateVocabulary, LexiError> {
    let indices = rank_candidates(image_features, vocab_encodings, feat_dim, n)?;
    let words: Vec<String> = indices.iter().map(|&id| tokenizer.decode(id)).collect();
    info!(candidates = indices.len(), "object candidate vocabulary indexed");
    CandidateVocabulary::from_table(table, indices, words)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranks_by_cosine_descending() {
        // Vocabulary of 4 unit rows in 2-d; image mean points along +x
        let vocab = [
            1.0, 0.0, // aligned
            0.0, 1.0, // orthogonal
            -1.0, 0.0, // opposed
            0.7071, 0.7071, // diagonal
        ];
        let images = [1.0, 0.0, 1.0, 0.0];
        let top = rank_candidates(&images, &vocab, 2, 4).unwrap();
        assert_eq!(top, vec![0, 3, 1, 2]);
    }

    #[test]
    fn truncates_to_n() {
        let vocab = [1.0, 0.0, 0.0, 1.0, -1.0, 0.0];
        let images = [1.0, 0.0];
        let top = rank_candidates(&images, &vocab, 2, 2).unwrap();
        assert_eq!(top, vec![0, 1]);
    }

    #[test]
    fn deterministic_given_fixed_inputs() {
        let vocab: Vec<f32> = (0..40).map(|i| ((i * 7 % 13) as f32) - 6.0).collect();
        let images: Vec<f32> = (0..8).map(|i| i as f32 * 0.3).collect();
        let a = rank_candidates(&images, &vocab, 4, 6).unwrap();
        let b = rank_candidates(&images, &vocab, 4, 6).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_n_fails() {
        let vocab = [1.0, 0.0];
        let images = [1.0, 0.0];
        assert!(matches!(
            rank_candidates(&images, &vocab, 2, 5),
            Err(LexiError::Config { .. })
        ));
    }

    #[test]
    fn empty_image_set_fails() {
        let vocab = [1.0, 0.0];
        assert!(rank_candidates(&[], &vocab, 2, 1).is_err());
    }

    #[test]
    fn ragged_features_fail() {
        let vocab = [1.0, 0.0];
        assert!(matches!(
            rank_candidates(&[1.0, 0.0, 0.5], &vocab, 2, 1),
            Err(LexiError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn missing_encodings_file_is_config_error() {
        let err = load_vocab_encodings(
            Path::new("/nonexistent/clip_text_encoding.safetensors"),
            "some-model",
        );
        assert!(matches!(err, Err(LexiError::Config { .. })));
    }
}
