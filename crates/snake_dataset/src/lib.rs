//! Sample storage and batch iteration for the TextSnake trainer.
//!
//! Ground-truth geometry maps (text-region mask, center-line mask, radius,
//! sin/cos orientation) are precomputed offline and stored per sample next
//! to the image. This crate indexes, decodes, and batches them into burn
//! tensors; it knows nothing about models, losses, or training schedules.

pub mod batch;
pub mod sample;
pub mod types;
pub mod variant;

pub use batch::{BatchIter, GeoBatch};
pub use sample::{index_samples, load_sample, read_maps, write_sample};
pub use types::*;
pub use variant::DatasetVariant;
