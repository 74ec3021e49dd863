//! Subspace projection and nearest-neighbour recognition.
//!
//! Faces are flattened, centred on the model mean and projected onto the
//! retained principal directions. Recognition is a Euclidean nearest
//! neighbour search over labelled reference projections.

use crate::model::EigenModel;
use crate::types::{
    ErrorKind, EuclideanMatcher, FaceImage, GalleryEntry, Matcher, Projection, RecognitionResult,
};
use ndarray::Array1;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error("face is {found_width}x{found_height}, model expects {width}x{height}")]
    DimensionMismatch {
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
    #[error("no reference data")]
    EmptyReference,
    #[error("reference {label:?} has {found} coefficients, query has {expected}")]
    ProjectionLength {
        label: String,
        expected: usize,
        found: usize,
    },
}

impl RecognizerError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Project a normalized face into the model's subspace.
///
/// The face must already have the model's dimensions; resizing is the
/// caller's policy.
pub fn project(image: &FaceImage, model: &EigenModel) -> Result<Projection, RecognizerError> {
    if image.width() != model.width() || image.height() != model.height() {
        return Err(RecognizerError::DimensionMismatch {
            width: model.width(),
            height: model.height(),
            found_width: image.width(),
            found_height: image.height(),
        });
    }

    let flat = Array1::from_iter(image.pixels().iter().map(|&p| p as f64));
    let centered = flat - model.mean();
    let coefficients = model.directions().dot(&centered);

    Ok(Projection {
        values: coefficients.to_vec(),
    })
}

/// Find the reference projection closest to `query`.
///
/// The first of several equally close references wins, so `reference` must
/// be supplied in a deterministic order.
pub fn match_nearest(
    query: &Projection,
    reference: &[GalleryEntry],
) -> Result<RecognitionResult, RecognizerError> {
    match_with(&EuclideanMatcher, query, reference)
}

fn match_with<M: Matcher>(
    matcher: &M,
    query: &Projection,
    reference: &[GalleryEntry],
) -> Result<RecognitionResult, RecognizerError> {
    if let Some(entry) = reference
        .iter()
        .find(|entry| entry.projection.len() != query.len())
    {
        return Err(RecognizerError::ProjectionLength {
            label: entry.label.clone(),
            expected: query.len(),
            found: entry.projection.len(),
        });
    }
    matcher
        .best_match(query, reference)
        .ok_or(RecognizerError::EmptyReference)
}

/// An eigenspace model together with a gallery of labelled reference faces.
///
/// The model is read-only; only the gallery grows.
pub struct Recognizer<M: Matcher = EuclideanMatcher> {
    model: EigenModel,
    gallery: Vec<GalleryEntry>,
    matcher: M,
}

impl Recognizer<EuclideanMatcher> {
    pub fn new(model: EigenModel) -> Self {
        Self::with_matcher(model, EuclideanMatcher)
    }
}

impl<M: Matcher> Recognizer<M> {
    pub fn with_matcher(model: EigenModel, matcher: M) -> Self {
        Self {
            model,
            gallery: Vec::new(),
            matcher,
        }
    }

    pub fn model(&self) -> &EigenModel {
        &self.model
    }

    pub fn gallery(&self) -> &[GalleryEntry] {
        &self.gallery
    }

    /// Project a reference face and append it to the gallery.
    pub fn enroll(&mut self, label: impl Into<String>, face: &FaceImage) -> Result<(), RecognizerError> {
        let projection = project(face, &self.model)?;
        let label = label.into();
        tracing::debug!(label = %label, "reference enrolled");
        self.gallery.push(GalleryEntry { label, projection });
        Ok(())
    }

    /// Project a query face and return its closest gallery entry.
    pub fn recognize(&self, face: &FaceImage) -> Result<RecognitionResult, RecognizerError> {
        let query = project(face, &self.model)?;
        let result = match_with(&self.matcher, &query, &self.gallery)?;
        tracing::info!(
            label = %result.label,
            distance = result.distance,
            gallery = self.gallery.len(),
            "best match"
        );
        Ok(result)
    }
}
