use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error taxonomy shared by every crate in the workspace.
///
/// Per-module error enums map onto one of these through a `kind()` method so
/// callers can decide between skipping an item and aborting a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A source could not be read or written.
    Io,
    /// A document or annotation is malformed or missing required data.
    Format,
    /// Inputs are well-formed but violate a precondition.
    Validation,
}

#[derive(Error, Debug)]
#[error("pixel buffer holds {actual} samples, expected {expected} for a {width}x{height} grid")]
pub struct GridError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

impl GridError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// A grayscale intensity grid, stored row-major.
///
/// Used both for raw faces as decoded from disk and for faces produced by
/// [`alignment::normalize`](crate::alignment::normalize).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl FaceImage {
    /// Wrap a row-major pixel buffer. The buffer must hold exactly `width * height` samples.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, GridError> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(GridError {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixels (`P` in the subspace dimensions).
    pub fn pixel_count(&self) -> usize {
        self.data.len()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.data
    }

    /// Intensity at `(x, y)`, or `None` outside the grid.
    pub fn get(&self, x: u32, y: u32) -> Option<u8> {
        if x < self.width && y < self.height {
            Some(self.data[y as usize * self.width as usize + x as usize])
        } else {
            None
        }
    }
}

/// Integer image coordinate of a landmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Coordinates are widened before any arithmetic, so this is exact for
    /// the whole `i32` range.
    pub fn distance_to(&self, other: &Point) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        dx.hypot(dy)
    }

    pub fn midpoint(&self, other: &Point) -> (f64, f64) {
        (
            (f64::from(self.x) + f64::from(other.x)) * 0.5,
            (f64::from(self.y) + f64::from(other.y)) * 0.5,
        )
    }
}

/// Coordinates of a mean-centred face in the retained subspace (length `K`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub values: Vec<f64>,
}

impl Projection {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Compute Euclidean distance between two projections.
    pub fn euclidean_distance(&self, other: &Projection) -> f64 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

/// A labelled reference projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub label: String,
    pub projection: Projection,
}

/// Result of matching a probe projection against a gallery.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionResult {
    /// Label of the closest gallery entry.
    pub label: String,
    /// Euclidean distance to that entry in subspace coordinates.
    pub distance: f64,
    /// Position of the entry in the gallery.
    pub index: usize,
}

/// Strategy for comparing a probe projection against a gallery.
///
/// Returns `None` only for an empty gallery.
pub trait Matcher {
    fn best_match(&self, probe: &Projection, gallery: &[GalleryEntry]) -> Option<RecognitionResult>;
}

/// Nearest neighbour by Euclidean distance.
///
/// Ties keep the earliest gallery entry: only a strictly smaller distance
/// replaces the current best, so results depend on gallery order.
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn best_match(&self, probe: &Projection, gallery: &[GalleryEntry]) -> Option<RecognitionResult> {
        gallery
            .iter()
            .enumerate()
            .map(|(i, entry)| (i, probe.euclidean_distance(&entry.projection)))
            .fold(None, |best: Option<(usize, f64)>, (i, distance)| match best {
                Some((_, best_distance)) if distance >= best_distance => best,
                _ => Some((i, distance)),
            })
            .map(|(index, distance)| RecognitionResult {
                label: gallery[index].label.clone(),
                distance,
                index,
            })
    }
}
