//! # lexi-gate
//!
//! The differentiable gating stack: everything between a fixed candidate
//! vocabulary and the two composed concept embeddings:
//!
//! - [`WeightNet`]: the small gate that maps candidate embeddings to
//!   per-candidate weights in `[0, 1]`.
//! - [`filter`]: part-of-speech masking and top-k selection, as pure
//!   functions.
//! - [`Composer`]: weighted sum + renormalization to the frozen table's
//!   mean row norm.
//! - [`pos`]: the part-of-speech tagging seam with a lexicon-based
//!   default.
//! - [`DiffusionBackend`] / [`TokenizerOps`]: interfaces to the frozen
//!   generative model and its tokenizer.
//!
//! ## Architecture Rules
//!
//! - All candle code in the workspace lives here and in `lexi-train`;
//!   `lexi-core` stays tensor-library-free.
//! - The gate's parameters are the only trained state. Candidate
//!   matrices, the embedding table, and the backend stay frozen.

pub mod backend;
pub mod compose;
pub mod filter;
pub mod pos;
pub mod weight_net;

pub use backend::{Conditioning, DiffusionBackend, PredictionKind, TokenizerOps};
pub use compose::{cosine_similarity, Composer};
pub use weight_net::{WeightNet, DEFAULT_HIDDEN_DIM};

pub use lexi_core;
