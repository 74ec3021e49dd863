//! eigenface-core — Eigenspace face recognition engine.
//!
//! Normalizes faces by their eye landmarks, trains a PCA subspace with
//! energy-driven component selection, and recognizes faces by nearest
//! neighbour search over subspace projections.

pub mod alignment;
pub mod annotation;
pub mod model;
pub mod recognizer;
pub mod trainer;
pub mod types;

pub use alignment::AlignmentConfig;
pub use annotation::EyeAnnotation;
pub use model::EigenModel;
pub use recognizer::Recognizer;
pub use types::{
    ErrorKind, EuclideanMatcher, FaceImage, GalleryEntry, Matcher, Point, Projection,
    RecognitionResult,
};
