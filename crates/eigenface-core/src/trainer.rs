//! PCA subspace training with cumulative-energy component selection.
//!
//! Faces are flattened row-major into an `N × P` data matrix. The covariance
//! eigenproblem is solved on whichever of `XᵀX` (`P × P`) or `XXᵀ` (`N × N`)
//! is smaller; with the sample Gram matrix, directions are recovered as
//! `Xᵀv / ‖Xᵀv‖`.

use crate::model::{EigenModel, ModelError, Provenance};
use crate::types::{ErrorKind, FaceImage};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

/// Eigenvalues at or below this fraction of the largest carry no variance and
/// are not returned as directions.
const NULL_EIGENVALUE_RATIO: f64 = 1e-10;

#[derive(Error, Debug)]
pub enum TrainError {
    #[error("energy percent must be in (0, 100], got {0}")]
    InvalidEnergy(f64),
    #[error("training set is empty")]
    EmptyTrainingSet,
    #[error("image {index} is {found_width}x{found_height}, expected {width}x{height}")]
    DimensionMismatch {
        index: usize,
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
    #[error("no components satisfy energy threshold of {energy_percent}%")]
    ThresholdUnreachable { energy_percent: f64 },
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl TrainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TrainError::Model(e) => e.kind(),
            _ => ErrorKind::Validation,
        }
    }
}

/// Principal directions of a centred data matrix.
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Variance captured by each direction, descending.
    pub eigenvalues: Vec<f64>,
    /// One unit-norm direction per row, same order as `eigenvalues`.
    pub directions: Array2<f64>,
}

/// Train an eigenspace model from normalized faces of identical size.
///
/// Keeps the smallest number of leading directions whose cumulative
/// eigenvalue share reaches `energy_percent / 100`.
pub fn train(images: &[FaceImage], energy_percent: f64) -> Result<EigenModel, TrainError> {
    if !(energy_percent > 0.0 && energy_percent <= 100.0) {
        return Err(TrainError::InvalidEnergy(energy_percent));
    }
    let first = images.first().ok_or(TrainError::EmptyTrainingSet)?;
    let (width, height) = (first.width(), first.height());

    let data = data_matrix(images, width, height)?;
    tracing::debug!(samples = data.nrows(), pixels = data.ncols(), "data matrix built");

    let mean = data.mean_axis(Axis(0)).ok_or(TrainError::EmptyTrainingSet)?;
    let centered = &data - &mean;

    let decomposition = principal_components(&centered);
    tracing::debug!(eigenvalues = ?decomposition.eigenvalues, "eigen decomposition");

    let available = decomposition.eigenvalues.len();
    let selected = select_component_count(&decomposition.eigenvalues, energy_percent)?;
    let k = selected.min(available);
    if k != selected {
        tracing::warn!(selected, available, "component count clamped");
    }

    let directions = decomposition
        .directions
        .slice(ndarray::s![..k, ..])
        .to_owned();
    let eigenvalues = decomposition.eigenvalues[..k].to_vec();

    tracing::info!(
        samples = images.len(),
        pixels = mean.len(),
        available,
        components = k,
        energy_percent,
        "model trained"
    );

    let model = EigenModel::new(width, height, mean, directions, eigenvalues)?;
    Ok(model.with_provenance(Provenance {
        energy_percent,
        sample_count: images.len(),
        trained_at: chrono::Utc::now(),
    }))
}

/// Smallest prefix of `eigenvalues` (descending) whose share of the total
/// reaches `energy_percent / 100`.
pub fn select_component_count(eigenvalues: &[f64], energy_percent: f64) -> Result<usize, TrainError> {
    let total: f64 = eigenvalues.iter().sum();
    let threshold = energy_percent / 100.0;

    let mut cumulative = 0.0;
    for (i, value) in eigenvalues.iter().enumerate() {
        cumulative += value;
        if cumulative / total >= threshold {
            return Ok(i + 1);
        }
    }
    Err(TrainError::ThresholdUnreachable { energy_percent })
}

/// Flatten each face into one row of an `N × P` matrix.
fn data_matrix(images: &[FaceImage], width: u32, height: u32) -> Result<Array2<f64>, TrainError> {
    let pixels = width as usize * height as usize;
    let mut data = Array2::<f64>::zeros((images.len(), pixels));

    for (index, (image, mut row)) in images.iter().zip(data.outer_iter_mut()).enumerate() {
        if image.width() != width || image.height() != height {
            return Err(TrainError::DimensionMismatch {
                index,
                width,
                height,
                found_width: image.width(),
                found_height: image.height(),
            });
        }
        for (dst, &src) in row.iter_mut().zip(image.pixels()) {
            *dst = src as f64;
        }
    }

    Ok(data)
}

/// Eigen-decompose the covariance of a centred `N × P` matrix.
///
/// Eigenvalues are population variances (scaled by `1/N`), sorted descending.
/// Null directions are dropped. Each direction is sign-normalized so that its
/// largest-magnitude component is positive.
pub fn principal_components(centered: &Array2<f64>) -> Decomposition {
    let (samples, pixels) = centered.dim();
    let use_gram = samples <= pixels;

    let scatter = if use_gram {
        centered.dot(&centered.t())
    } else {
        centered.t().dot(centered)
    };
    let n = scatter.nrows();
    let eigen = DMatrix::from_fn(n, n, |i, j| scatter[[i, j]]).symmetric_eigen();

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let largest = order.first().map_or(0.0, |&i| eigen.eigenvalues[i]);
    let cutoff = largest * NULL_EIGENVALUE_RATIO;

    let mut eigenvalues = Vec::new();
    let mut kept: Vec<Array1<f64>> = Vec::new();
    for &idx in &order {
        let value = eigen.eigenvalues[idx];
        if largest <= 0.0 || value <= cutoff {
            break;
        }
        let v = Array1::from_iter(eigen.eigenvectors.column(idx).iter().copied());
        let mut direction = if use_gram { centered.t().dot(&v) } else { v };

        let norm = direction.dot(&direction).sqrt();
        if norm <= f64::EPSILON {
            continue;
        }
        direction /= norm;
        orient(&mut direction);

        eigenvalues.push(value / samples as f64);
        kept.push(direction);
    }

    let mut directions = Array2::<f64>::zeros((kept.len(), pixels));
    for (mut row, direction) in directions.rows_mut().into_iter().zip(&kept) {
        row.assign(direction);
    }

    Decomposition {
        eigenvalues,
        directions,
    }
}

/// Flip `direction` so its largest-magnitude component is positive.
fn orient(direction: &mut Array1<f64>) {
    let pivot = direction
        .iter()
        .copied()
        .fold(0.0f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        direction.mapv_inplace(|x| -x);
    }
}
