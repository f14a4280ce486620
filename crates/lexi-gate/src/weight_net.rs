//! The weighting network, a small gate that scores candidate embeddings.
//!
//! One hidden projection shared across candidates, a ReLU, and a scalar
//! head with no bias, squashed through a sigmoid:
//!
//! ```text
//! [n, d] → Linear(d→H) → ReLU → Linear(H→1, no bias) → sigmoid → [n]
//! ```
//!
//! Two independent instances exist per run, one sized to the attribute
//! vocabulary, one to the object vocabulary. They are built on the same
//! `VarMap` under distinct name prefixes (`attr.`, `obj.`) so a single
//! checkpoint holds both, but they never share parameters or gradients.

use candle_core::Tensor;
use candle_nn::{linear, linear_no_bias, Linear, Module, VarBuilder};
use lexi_core::LexiError;

/// Default hidden width of the gate.
pub const DEFAULT_HIDDEN_DIM: usize = 512;

/// A per-candidate scalar gate over a candidate embedding matrix.
///
/// # Example
///
/// ```no_run
/// use candle_core::{DType, Device, Tensor};
/// use candle_nn::{VarBuilder, VarMap};
/// use lexi_gate::WeightNet;
///
/// let device = Device::Cpu;
/// let var_map = VarMap::new();
/// let vb = VarBuilder::from_varmap(&var_map, DType::F32, &device);
/// let net = WeightNet::new(vb.pp("obj"), 64, 512).unwrap();
///
/// let candidates = Tensor::zeros((10, 64), DType::F32, &device).unwrap();
/// let weights = net.forward(&candidates).unwrap();
/// assert_eq!(weights.dims(), &[10]);
/// ```
pub struct WeightNet {
    hidden: Linear,
    score: Linear,
    embedding_dim: usize,
    hidden_dim: usize,
}

impl std::fmt::Debug for WeightNet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WeightNet({}→{}→1, {} params)",
            self.embedding_dim,
            self.hidden_dim,
            self.param_count()
        )
    }
}

impl WeightNet {
    /// Creates a trainable weighting network under the given builder.
    ///
    /// The scalar head carries no bias: before the sigmoid the gate is
    /// odd-symmetric under input scaling, which keeps the two instances'
    /// scores comparable across vocabularies of different magnitude.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::Internal`] if parameter creation fails.
    pub fn new(
        vb: VarBuilder,
        embedding_dim: usize,
        hidden_dim: usize,
    ) -> Result<Self, LexiError> {
        let map_err = |e: candle_core::Error| LexiError::Internal {
            message: format!("WeightNet new: {e}"),
        };

        let hidden =
            linear(embedding_dim, hidden_dim, vb.pp("hidden")).map_err(map_err)?;
        let score = linear_no_bias(hidden_dim, 1, vb.pp("score")).map_err(map_err)?;

        Ok(Self {
            hidden,
            score,
            embedding_dim,
            hidden_dim,
        })
    }

    /// Scores a candidate matrix.
    ///
    /// Input shape `[n, embedding_dim]`; output shape `[n]`, every value
    /// in `[0, 1]`. Weights are recomputed fresh each call; the network's
    /// parameters, not the weights, are the learned state.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::ShapeMismatch`] if the matrix's second
    /// dimension is not `embedding_dim`, or [`LexiError::Internal`] on
    /// tensor failures.
    pub fn forward(&self, candidates: &Tensor) -> Result<Tensor, LexiError> {
        let map_err = |e: candle_core::Error| LexiError::Internal {
            message: format!("WeightNet forward: {e}"),
        };

        let (_, d) = candidates.dims2().map_err(map_err)?;
        if d != self.embedding_dim {
            return Err(LexiError::ShapeMismatch {
                expected: self.embedding_dim,
                got: d,
            });
        }

        let h = self.hidden.forward(candidates).map_err(map_err)?;
        let h = h.relu().map_err(map_err)?;
        let s = self.score.forward(&h).map_err(map_err)?; // [n, 1]
        let s = s.squeeze(1).map_err(map_err)?;
        candle_nn::ops::sigmoid(&s).map_err(map_err)
    }

    /// Total trainable parameter count.
    pub fn param_count(&self) -> usize {
        self.embedding_dim * self.hidden_dim + self.hidden_dim + self.hidden_dim
    }

    /// Input embedding dimensionality.
    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use candle_nn::VarMap;

    fn net(dim: usize) -> (WeightNet, VarMap, Device) {
        let device = Device::Cpu;
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, &device);
        let net = WeightNet::new(vb.pp("obj"), dim, 32).unwrap();
        (net, var_map, device)
    }

    #[test]
    fn outputs_one_weight_per_candidate() {
        let (net, _vm, device) = net(8);
        let candidates = Tensor::zeros((12, 8), DType::F32, &device).unwrap();
        let weights = net.forward(&candidates).unwrap();
        assert_eq!(weights.dims(), &[12]);
    }

    #[test]
    fn weights_lie_in_unit_interval() {
        let (net, _vm, device) = net(8);
        // Spread of magnitudes, including large ones that saturate the gate
        let data: Vec<f32> = (0..20 * 8).map(|i| ((i as f32) - 80.0) * 3.7).collect();
        let candidates = Tensor::from_vec(data, (20, 8), &device).unwrap();
        let weights = net
            .forward(&candidates)
            .unwrap()
            .to_vec1::<f32>()
            .unwrap();
        assert!(weights.iter().all(|w| (0.0..=1.0).contains(w)), "{weights:?}");
    }

    #[test]
    fn rejects_wrong_embedding_dim() {
        let (net, _vm, device) = net(8);
        let candidates = Tensor::zeros((4, 5), DType::F32, &device).unwrap();
        assert!(matches!(
            net.forward(&candidates),
            Err(LexiError::ShapeMismatch { expected: 8, got: 5 })
        ));
    }

    #[test]
    fn distinct_prefixes_do_not_share_parameters() {
        let device = Device::Cpu;
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, &device);
        let _attr = WeightNet::new(vb.pp("attr"), 8, 16).unwrap();
        let _obj = WeightNet::new(vb.pp("obj"), 8, 16).unwrap();

        let names: Vec<String> = var_map
            .data()
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert!(names.iter().any(|n| n.starts_with("attr.")));
        assert!(names.iter().any(|n| n.starts_with("obj.")));
        // 2 nets × (hidden weight + hidden bias + score weight)
        assert_eq!(names.len(), 6);
    }

    #[test]
    fn score_head_has_no_bias() {
        let device = Device::Cpu;
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, &device);
        let _net = WeightNet::new(vb.pp("obj"), 8, 16).unwrap();
        let names: Vec<String> = var_map
            .data()
            .lock()
            .unwrap()
            .keys()
            .cloned()
            .collect();
        assert!(!names.iter().any(|n| n.contains("score.bias")), "{names:?}");
    }

    #[test]
    fn debug_format_readable() {
        let (net, _vm, _device) = net(8);
        assert!(format!("{net:?}").contains("WeightNet(8→32→1"));
    }
}
