//! Interfaces to the frozen generative model and its tokenizer.
//!
//! The pretrained denoiser, latent encoder, and text encoder are external
//! collaborators; this crate specifies only the surface the training
//! core needs. Implementations are expected to keep their parameters
//! frozen; the only gradients that matter flow through the two composed
//! placeholder embeddings carried by [`Conditioning`].

use candle_core::Tensor;
use lexi_core::{EmbeddingTable, LexiError};

/// What the denoiser's configuration declares as its training target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictionKind {
    /// The model predicts the sampled noise directly.
    Epsilon,
    /// The model predicts a velocity target derived from latents + noise.
    Velocity,
}

impl PredictionKind {
    /// Parses a scheduler-declared parameterization string.
    ///
    /// # Errors
    ///
    /// An unrecognized parameterization is a fatal configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use lexi_gate::PredictionKind;
    ///
    /// assert_eq!(PredictionKind::parse("epsilon").unwrap(), PredictionKind::Epsilon);
    /// assert_eq!(PredictionKind::parse("v_prediction").unwrap(), PredictionKind::Velocity);
    /// assert!(PredictionKind::parse("sample").is_err());
    /// ```
    pub fn parse(s: &str) -> Result<Self, LexiError> {
        match s {
            "epsilon" => Ok(Self::Epsilon),
            "v_prediction" => Ok(Self::Velocity),
            other => Err(LexiError::Config {
                message: format!("unknown prediction type {other:?}"),
            }),
        }
    }
}

/// Conditioning input for one text-encoder pass.
///
/// Carries the tokenized template, the live embedding table, and the two
/// composed embeddings as graph-connected tensors. Implementations must
/// substitute `attr`/`obj` for the placeholder rows so autograd reaches
/// the weighting networks; every other id resolves to a frozen table row.
pub struct Conditioning<'a> {
    /// Token ids of the (already tokenized) template sentence.
    pub token_ids: &'a [u32],
    /// The live embedding table.
    pub table: &'a EmbeddingTable,
    /// Composed attribute embedding, still attached to the graph.
    pub attr: &'a Tensor,
    /// Composed object embedding, still attached to the graph.
    pub obj: &'a Tensor,
}

impl Conditioning<'_> {
    /// Builds the `[seq, dim]` embedded sequence for the template,
    /// substituting the two composed tensors at the placeholder ids.
    ///
    /// Shared helper so backend implementations do not each re-derive the
    /// placeholder substitution.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::RowOutOfRange`] for an id outside the table,
    /// or [`LexiError::Internal`] on tensor failures.
    pub fn embed_sequence(&self) -> Result<Tensor, LexiError> {
        let map_err = |e: candle_core::Error| LexiError::Internal {
            message: format!("Conditioning embed_sequence: {e}"),
        };

        let slots = self.table.slots();
        let device = self.attr.device();
        let mut parts = Vec::with_capacity(self.token_ids.len());
        for &id in self.token_ids {
            let part = if id == slots.attr {
                self.attr.unsqueeze(0).map_err(map_err)?
            } else if id == slots.obj {
                self.obj.unsqueeze(0).map_err(map_err)?
            } else {
                let row = self.table.row(id)?;
                Tensor::from_slice(row, (1, self.table.dim()), device)
                    .map_err(map_err)?
            };
            parts.push(part);
        }
        Tensor::cat(&parts, 0).map_err(map_err)
    }
}

/// The frozen generative backend: latent encoder, noise schedule, text
/// encoder, and denoiser.
///
/// All methods are synchronous; the training loop is single-threaded and
/// each forward/backward must complete before the optimizer step.
pub trait DiffusionBackend {
    /// Encodes a pixel batch to latents. No gradient flows through this.
    fn encode(&self, images: &Tensor) -> Result<Tensor, LexiError>;

    /// Adds schedule-scaled noise to latents at the given timesteps.
    fn add_noise(
        &self,
        latents: &Tensor,
        noise: &Tensor,
        timesteps: &[usize],
    ) -> Result<Tensor, LexiError>;

    /// Runs the frozen text encoder over an embedded template.
    fn encode_text(&self, cond: &Conditioning<'_>) -> Result<Tensor, LexiError>;

    /// Predicts the noise residual for noisy latents under conditioning.
    fn predict_noise(
        &self,
        noisy_latents: &Tensor,
        timesteps: &[usize],
        cond: &Tensor,
    ) -> Result<Tensor, LexiError>;

    /// The velocity target, for [`PredictionKind::Velocity`] schedules.
    fn velocity(
        &self,
        latents: &Tensor,
        noise: &Tensor,
        timesteps: &[usize],
    ) -> Result<Tensor, LexiError>;

    /// The parameterization this backend's schedule declares.
    fn prediction_kind(&self) -> PredictionKind;

    /// Number of train timesteps in the noise schedule.
    fn num_timesteps(&self) -> usize;
}

/// The tokenizer surface the core needs: encoding attribute phrases and
/// decoding candidate ids for part-of-speech tagging.
pub trait TokenizerOps {
    /// Token ids for `text`, without special tokens.
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Surface form of a single token id.
    fn decode(&self, id: u32) -> String;
}
