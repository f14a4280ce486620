//! # lexi-train
//!
//! The training side of the workspace: candidate indexing, attribute
//! word loading, the learning-rate schedule, the orchestrator, and
//! checkpoint output.
//!
//! A run wires together:
//!
//! 1. [`indexer`]: rank the token vocabulary against precomputed image
//!    features and keep the top N object candidates.
//! 2. [`attr_words`]: load the curated attribute word list, rejecting
//!    any entry that does not tokenize to a single token.
//! 3. [`trainer`]: the COMPOSE → FORWARD → BACKWARD/STEP → RESTORE
//!    loop over a frozen diffusion backend.
//! 4. [`checkpoint`]: both weighting networks in one safetensors file,
//!    written at completion.
//!
//! Reproducibility: network initialization, timestep and noise sampling
//! all come from [`rng::SimpleRng`] seeded by the run configuration, so
//! two runs with the same seed produce bit-identical checkpoints.

pub mod attr_words;
pub mod checkpoint;
pub mod indexer;
pub mod rng;
pub mod schedule;
pub mod trainer;

pub use attr_words::{build_attr_vocabulary, load_attr_words, AttrWord};
pub use checkpoint::{save_checkpoint, CHECKPOINT_FILE, RUN_CONFIG_FILE};
pub use indexer::{build_object_vocabulary, load_vocab_encodings, rank_candidates};
pub use schedule::{LrSchedule, LrScheduleKind};
pub use trainer::{TrainOutcome, Trainer, TrainerConfig, Templates, ValidationRecord};

pub use lexi_core;
pub use lexi_gate;
