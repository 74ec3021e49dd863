//! eigenface-data — Image sources for the eigenface pipeline.
//!
//! Decodes grayscale grids with the `image` crate, pairs face images with
//! their eye annotations on disk, and assembles training and reference
//! batches. Per-item failures are skipped and reported, never fatal.

pub mod dataset;
pub mod error;
pub mod grid;
pub mod preprocess;

pub use dataset::{Batch, DatasetEntry, LabeledFace, SkippedItem};
pub use error::DataError;
pub use grid::{load_face, resize_face, save_face};
