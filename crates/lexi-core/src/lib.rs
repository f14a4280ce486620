//! # lexi-core
//!
//! Shared types for the lexi concept-embedding learner.
//!
//! A concept is represented not as a free-form learned vector but as a
//! soft convex combination over a fixed candidate vocabulary drawn from a
//! frozen text-to-image model's token-embedding table. This crate holds
//! the pieces every other crate needs:
//!
//! - [`EmbeddingTable`]: the live token-embedding table plus its frozen
//!   reference snapshot, with the two writable placeholder rows and the
//!   restore/verify machinery that keeps every other row bit-identical to
//!   the snapshot across training steps.
//! - [`CandidateVocabulary`]: a fixed set of (id, word, embedding)
//!   candidates, immutable once indexed.
//! - [`LexiError`]: the workspace error type.
//!
//! ## Architecture Rules
//!
//! - No tensor-library dependency here; plain `f32` storage only. All
//!   candle code lives in `lexi-gate`.
//! - The table is an owned resource with explicit `write`/`restore`/
//!   `verify_consistent` operations, never an ambient global.

mod error;
mod table;
mod vocab;

pub use error::LexiError;
pub use table::{EmbeddingTable, PlaceholderSlots, Slot};
pub use vocab::CandidateVocabulary;
