//! The live token-embedding table, modeled as an explicit owned resource.
//!
//! The table is shared between the embedding composer (which writes the
//! two composed concept embeddings each step) and the frozen text encoder
//! (which reads rows to build conditioning). Only the two placeholder rows
//! may ever diverge from the frozen reference snapshot captured at
//! construction; [`EmbeddingTable::restore`] re-asserts that invariant
//! after every optimizer step, and [`EmbeddingTable::verify_consistent`]
//! checks it at step boundaries.

use crate::error::LexiError;

/// The two reserved placeholder token ids, explicitly named.
///
/// The attribute and object slots are independent ids rather than an
/// arithmetic `obj - 1` offset, so the pair survives any tokenizer
/// insertion order.
///
/// # Example
///
/// ```
/// use lexi_core::PlaceholderSlots;
///
/// let slots = PlaceholderSlots { attr: 38, obj: 39 };
/// assert!(slots.contains(38));
/// assert!(!slots.contains(0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaceholderSlots {
    /// Token id of the attribute placeholder row.
    pub attr: u32,
    /// Token id of the object placeholder row.
    pub obj: u32,
}

impl PlaceholderSlots {
    /// Returns `true` if `id` is one of the two placeholder rows.
    pub fn contains(&self, id: u32) -> bool {
        id == self.attr || id == self.obj
    }
}

/// Which of the two placeholder rows a write targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The attribute placeholder row.
    Attr,
    /// The object placeholder row.
    Obj,
}

/// The live token-embedding table plus its frozen reference snapshot.
///
/// Row-major `f32` storage. The snapshot is captured once at construction
/// and never mutated; it is the ground truth used to undo any incidental
/// update the backward pass applies to non-placeholder rows.
///
/// # Example
///
/// ```
/// use lexi_core::{EmbeddingTable, PlaceholderSlots, Slot};
///
/// let rows = vec![1.0_f32; 4 * 3]; // 4 rows, dim 3
/// let slots = PlaceholderSlots { attr: 2, obj: 3 };
/// let mut table = EmbeddingTable::new(rows, 3, slots).unwrap();
///
/// table.write(Slot::Obj, &[0.5, 0.5, 0.5]).unwrap();
/// table.restore();
/// table.verify_consistent().unwrap();
/// assert_eq!(table.row(3).unwrap(), &[0.5, 0.5, 0.5]);
/// ```
#[derive(Debug, Clone)]
pub struct EmbeddingTable {
    live: Vec<f32>,
    snapshot: Vec<f32>,
    dim: usize,
    slots: PlaceholderSlots,
    mean_row_norm: f32,
}

impl EmbeddingTable {
    /// Builds the table from row-major data and captures the frozen
    /// reference snapshot.
    ///
    /// The mean per-row norm is computed here, once, over the snapshot;
    /// it is the rescaling target for every composed embedding.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::ShapeMismatch`] if `data` is not a whole
    /// number of `dim`-sized rows, [`LexiError::RowOutOfRange`] if a
    /// placeholder id falls outside the table, and [`LexiError::Config`]
    /// if the two placeholder ids collide.
    pub fn new(
        data: Vec<f32>,
        dim: usize,
        slots: PlaceholderSlots,
    ) -> Result<Self, LexiError> {
        if dim == 0 || data.len() % dim != 0 {
            return Err(LexiError::ShapeMismatch {
                expected: dim.max(1),
                got: data.len(),
            });
        }
        let rows = data.len() / dim;
        for id in [slots.attr, slots.obj] {
            if id as usize >= rows {
                return Err(LexiError::RowOutOfRange { index: id, rows });
            }
        }
        if slots.attr == slots.obj {
            return Err(LexiError::Config {
                message: "attribute and object placeholder ids must be distinct"
                    .to_string(),
            });
        }

        let mean_row_norm = data
            .chunks_exact(dim)
            .map(|row| row.iter().map(|x| x * x).sum::<f32>().sqrt())
            .sum::<f32>()
            / rows as f32;

        Ok(Self {
            snapshot: data.clone(),
            live: data,
            dim,
            slots,
            mean_row_norm,
        })
    }

    /// Number of rows in the table.
    pub fn rows(&self) -> usize {
        self.live.len() / self.dim
    }

    /// Embedding dimensionality.
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// The two placeholder slot ids.
    pub fn slots(&self) -> PlaceholderSlots {
        self.slots
    }

    /// Mean per-row norm of the frozen reference snapshot.
    ///
    /// Composed embeddings are rescaled to this value so they stay
    /// in-distribution for the frozen text encoder.
    pub fn mean_row_norm(&self) -> f32 {
        self.mean_row_norm
    }

    /// Returns the live row at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::RowOutOfRange`] if `id` is out of range.
    pub fn row(&self, id: u32) -> Result<&[f32], LexiError> {
        let start = id as usize * self.dim;
        self.live
            .get(start..start + self.dim)
            .ok_or(LexiError::RowOutOfRange {
                index: id,
                rows: self.rows(),
            })
    }

    /// Returns the frozen snapshot row at `id`.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::RowOutOfRange`] if `id` is out of range.
    pub fn snapshot_row(&self, id: u32) -> Result<&[f32], LexiError> {
        let start = id as usize * self.dim;
        self.snapshot
            .get(start..start + self.dim)
            .ok_or(LexiError::RowOutOfRange {
                index: id,
                rows: self.rows(),
            })
    }

    /// Writes a composed embedding into one of the two placeholder rows.
    ///
    /// This is the only sanctioned mutation path; every other row is
    /// frozen for the run's duration.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::ShapeMismatch`] if `v` is not `dim` long.
    pub fn write(&mut self, slot: Slot, v: &[f32]) -> Result<(), LexiError> {
        if v.len() != self.dim {
            return Err(LexiError::ShapeMismatch {
                expected: self.dim,
                got: v.len(),
            });
        }
        let id = match slot {
            Slot::Attr => self.slots.attr,
            Slot::Obj => self.slots.obj,
        };
        let start = id as usize * self.dim;
        self.live[start..start + self.dim].copy_from_slice(v);
        Ok(())
    }

    /// Overwrites an arbitrary live row, bypassing the placeholder guard.
    ///
    /// Exists so the restore invariant can be exercised from tests that
    /// simulate gradient leakage; the training loop never calls this on a
    /// non-placeholder row.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::RowOutOfRange`] or [`LexiError::ShapeMismatch`]
    /// on bad inputs.
    pub fn overwrite_row(&mut self, id: u32, v: &[f32]) -> Result<(), LexiError> {
        if id as usize >= self.rows() {
            return Err(LexiError::RowOutOfRange {
                index: id,
                rows: self.rows(),
            });
        }
        if v.len() != self.dim {
            return Err(LexiError::ShapeMismatch {
                expected: self.dim,
                got: v.len(),
            });
        }
        let start = id as usize * self.dim;
        self.live[start..start + self.dim].copy_from_slice(v);
        Ok(())
    }

    /// Restores every non-placeholder row from the frozen snapshot.
    ///
    /// Runs after every optimizer step; this undoes any incidental update
    /// the backward pass applied outside the two placeholder rows. The
    /// placeholder rows keep their last composed values.
    pub fn restore(&mut self) {
        let dim = self.dim;
        for r in 0..self.rows() {
            if self.slots.contains(r as u32) {
                continue;
            }
            let start = r * dim;
            self.live[start..start + dim]
                .copy_from_slice(&self.snapshot[start..start + dim]);
        }
    }

    /// Bit-compares every non-placeholder live row against the snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::ConsistencyViolation`] naming the first row
    /// that differs. Callers should treat this as fatal: the core
    /// correctness guarantee has already been broken.
    pub fn verify_consistent(&self) -> Result<(), LexiError> {
        let dim = self.dim;
        for r in 0..self.rows() {
            if self.slots.contains(r as u32) {
                continue;
            }
            let start = r * dim;
            // Bit-exact comparison, not approximate: restore copies, so
            // any difference at all is leakage.
            let live = &self.live[start..start + dim];
            let snap = &self.snapshot[start..start + dim];
            if live
                .iter()
                .zip(snap.iter())
                .any(|(a, b)| a.to_bits() != b.to_bits())
            {
                return Err(LexiError::ConsistencyViolation { row: r as u32 });
            }
        }
        Ok(())
    }
}
