//! Embedding composition: weighted sum over candidates, rescaled to the
//! frozen table's average row norm.
//!
//! The generative model's conditioning pathway is sensitive to embedding
//! magnitude; an unconstrained weighted sum over hundreds of unit-scale
//! vectors can collapse or explode in norm. Dividing by the sum's own
//! norm and multiplying by the table's mean row norm keeps the composed
//! embedding in-distribution for the frozen text encoder.

use candle_core::Tensor;
use lexi_core::LexiError;

/// Composes a weight vector and a candidate matrix into one embedding.
///
/// `target_norm` is the mean per-row norm of the frozen reference table,
/// computed once at startup. The epsilon floor guards the renormalization
/// against a degenerate near-zero weighted sum; that condition must not
/// crash the step.
///
/// # Example
///
/// ```no_run
/// use candle_core::{Device, Tensor};
/// use lexi_gate::Composer;
///
/// let device = Device::Cpu;
/// let composer = Composer::new(2.0);
/// let weights = Tensor::from_slice(&[0.5_f32, 0.5], 2, &device).unwrap();
/// let matrix =
///     Tensor::from_slice(&[1.0_f32, 0.0, 0.0, 1.0], (2, 2), &device).unwrap();
/// let v = composer.compose(&weights, &matrix).unwrap();
/// let norm: f32 = v.sqr().unwrap().sum_all().unwrap().sqrt().unwrap()
///     .to_vec0().unwrap();
/// assert!((norm - 2.0).abs() < 1e-5);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Composer {
    target_norm: f64,
    eps: f64,
}

impl Composer {
    /// Creates a composer that rescales to `target_norm`.
    pub fn new(target_norm: f32) -> Self {
        Self {
            target_norm: f64::from(target_norm),
            eps: 1e-8,
        }
    }

    /// The rescaling target.
    pub fn target_norm(&self) -> f32 {
        self.target_norm as f32
    }

    /// Weighted sum without rescaling: `weights · matrix`.
    ///
    /// The explanation-subset embedding fed to the auxiliary consistency
    /// loss uses this raw form; only the embeddings written into the
    /// table are rescaled.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::Internal`] on tensor failures (including
    /// mismatched shapes).
    pub fn compose_raw(
        &self,
        weights: &Tensor,
        matrix: &Tensor,
    ) -> Result<Tensor, LexiError> {
        let map_err = |e: candle_core::Error| LexiError::Internal {
            message: format!("Composer compose_raw: {e}"),
        };
        weights
            .unsqueeze(0)
            .map_err(map_err)?
            .matmul(matrix)
            .map_err(map_err)?
            .squeeze(0)
            .map_err(map_err)
    }

    /// Weighted sum, renormalized to the target norm.
    ///
    /// `sum / max(‖sum‖, ε) × target_norm`, all in-graph so gradients
    /// flow back to the weighting network.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::Internal`] on tensor failures.
    pub fn compose(
        &self,
        weights: &Tensor,
        matrix: &Tensor,
    ) -> Result<Tensor, LexiError> {
        let map_err = |e: candle_core::Error| LexiError::Internal {
            message: format!("Composer compose: {e}"),
        };

        let raw = self.compose_raw(weights, matrix)?;
        let norm = raw
            .sqr()
            .map_err(map_err)?
            .sum_all()
            .map_err(map_err)?
            .sqrt()
            .map_err(map_err)?;
        let floored = (norm + self.eps).map_err(map_err)?;
        raw.broadcast_div(&floored)
            .map_err(map_err)?
            .affine(self.target_norm, 0.0)
            .map_err(map_err)
    }
}

/// In-graph cosine similarity between two vectors of equal length.
///
/// Returns a rank-0 tensor; degenerate inputs are floored by `eps` so the
/// similarity is defined (and near zero) rather than NaN.
///
/// # Errors
///
/// Returns [`LexiError::Internal`] on tensor failures.
pub fn cosine_similarity(a: &Tensor, b: &Tensor) -> Result<Tensor, LexiError> {
    let map_err = |e: candle_core::Error| LexiError::Internal {
        message: format!("cosine_similarity: {e}"),
    };

    let dot = (a * b).map_err(map_err)?.sum_all().map_err(map_err)?;
    let na = a
        .sqr()
        .map_err(map_err)?
        .sum_all()
        .map_err(map_err)?
        .sqrt()
        .map_err(map_err)?;
    let nb = b
        .sqr()
        .map_err(map_err)?
        .sum_all()
        .map_err(map_err)?
        .sqrt()
        .map_err(map_err)?;
    let denom = ((na * nb).map_err(map_err)? + 1e-8).map_err(map_err)?;
    (dot / denom).map_err(map_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::Device;

    fn norm_of(t: &Tensor) -> f32 {
        t.sqr()
            .unwrap()
            .sum_all()
            .unwrap()
            .sqrt()
            .unwrap()
            .to_vec0::<f32>()
            .unwrap()
    }

    #[test]
    fn composed_norm_matches_target() {
        let device = Device::Cpu;
        let composer = Composer::new(3.5);
        let weights = Tensor::from_slice(&[0.2_f32, 0.9, 0.4], 3, &device).unwrap();
        let matrix = Tensor::from_slice(
            &[1.0_f32, 0.5, -0.2, 0.3, 0.1, 0.9, -0.7, 0.4, 0.2, 0.6, 0.8, -0.1],
            (3, 4),
            &device,
        )
        .unwrap();

        let v = composer.compose(&weights, &matrix).unwrap();
        assert_eq!(v.dims(), &[4]);
        assert!((norm_of(&v) - 3.5).abs() < 1e-4);
    }

    #[test]
    fn raw_composition_is_plain_weighted_sum() {
        let device = Device::Cpu;
        let composer = Composer::new(1.0);
        let weights = Tensor::from_slice(&[2.0_f32, 1.0], 2, &device).unwrap();
        let matrix =
            Tensor::from_slice(&[1.0_f32, 0.0, 0.0, 3.0], (2, 2), &device).unwrap();
        let v = composer
            .compose_raw(&weights, &matrix)
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert_eq!(v, vec![2.0, 3.0]);
    }

    #[test]
    fn near_zero_weights_do_not_blow_up() {
        let device = Device::Cpu;
        let composer = Composer::new(2.0);
        let weights = Tensor::from_slice(&[0.0_f32, 0.0], 2, &device).unwrap();
        let matrix =
            Tensor::from_slice(&[1.0_f32, 0.0, 0.0, 1.0], (2, 2), &device).unwrap();
        let v = composer
            .compose(&weights, &matrix)
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!(v.iter().all(|x| x.is_finite()), "{v:?}");
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let device = Device::Cpu;
        let a = Tensor::from_slice(&[0.3_f32, -0.9, 0.4], 3, &device).unwrap();
        let cos = cosine_similarity(&a, &a).unwrap().to_vec0::<f32>().unwrap();
        assert!((cos - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        let device = Device::Cpu;
        let a = Tensor::from_slice(&[1.0_f32, 0.0], 2, &device).unwrap();
        let b = Tensor::from_slice(&[0.0_f32, 1.0], 2, &device).unwrap();
        let cos = cosine_similarity(&a, &b).unwrap().to_vec0::<f32>().unwrap();
        assert!(cos.abs() < 1e-6);
    }
}
