//! Trained eigenspace model and its persisted record.
//!
//! The record is a JSON document with the required fields `mean` (length
//! `P`) and `eigenVectors` (`K × P`), tagged with a format name and schema
//! version so the layout can evolve without breaking `load`.

use crate::types::{ErrorKind, Projection};
use chrono::{DateTime, Utc};
use ndarray::{s, Array1, Array2};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::Path;
use thiserror::Error;

pub const MODEL_FORMAT: &str = "eigenface-model";
pub const MODEL_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("cannot open model document {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write model document {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model document: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("not an eigenface model document (format {0:?})")]
    UnknownFormat(String),
    #[error("unsupported model version {found} (this build reads version {})", MODEL_VERSION)]
    UnsupportedVersion { found: u32 },
    #[error("model field `{0}` is absent or empty")]
    MissingField(&'static str),
    #[error("inconsistent model shape: {0}")]
    Shape(String),
    #[error("component count {requested} outside 1..={available}")]
    ComponentCount { requested: usize, available: usize },
    #[error("projection has {found} coefficients, model has {expected} components")]
    ProjectionLength { expected: usize, found: usize },
}

impl ModelError {
    /// A document that cannot be opened counts as a format failure of the
    /// model record, the same as one with missing fields.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::Write { .. } => ErrorKind::Io,
            ModelError::Open { .. }
            | ModelError::Parse(_)
            | ModelError::UnknownFormat(_)
            | ModelError::UnsupportedVersion { .. }
            | ModelError::MissingField(_)
            | ModelError::Shape(_) => ErrorKind::Format,
            ModelError::ComponentCount { .. } | ModelError::ProjectionLength { .. } => {
                ErrorKind::Validation
            }
        }
    }
}

/// How a model was produced. Informational only; never required on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provenance {
    pub energy_percent: f64,
    pub sample_count: usize,
    pub trained_at: DateTime<Utc>,
}

/// A trained eigenspace: mean face plus `K` principal directions of length `P`.
///
/// Immutable once built. Directions are rows of a `K × P` matrix, ordered by
/// descending eigenvalue.
#[derive(Debug, Clone, PartialEq)]
pub struct EigenModel {
    width: u32,
    height: u32,
    mean: Array1<f64>,
    directions: Array2<f64>,
    eigenvalues: Vec<f64>,
    provenance: Option<Provenance>,
}

impl EigenModel {
    /// Assemble a model, checking that every dimension agrees.
    ///
    /// `eigenvalues` may be empty when they are not known (e.g. a record
    /// written by another tool); otherwise it must have one entry per direction.
    pub fn new(
        width: u32,
        height: u32,
        mean: Array1<f64>,
        directions: Array2<f64>,
        eigenvalues: Vec<f64>,
    ) -> Result<Self, ModelError> {
        let pixels = width as usize * height as usize;
        if mean.is_empty() {
            return Err(ModelError::MissingField("mean"));
        }
        if directions.nrows() == 0 || directions.ncols() == 0 {
            return Err(ModelError::MissingField("eigenVectors"));
        }
        if mean.len() != pixels {
            return Err(ModelError::Shape(format!(
                "mean has {} entries, {width}x{height} needs {pixels}",
                mean.len()
            )));
        }
        if directions.ncols() != pixels {
            return Err(ModelError::Shape(format!(
                "eigenvectors have {} entries, {width}x{height} needs {pixels}",
                directions.ncols()
            )));
        }
        if !eigenvalues.is_empty() && eigenvalues.len() != directions.nrows() {
            return Err(ModelError::Shape(format!(
                "{} eigenvalues for {} eigenvectors",
                eigenvalues.len(),
                directions.nrows()
            )));
        }
        Ok(Self {
            width,
            height,
            mean,
            directions,
            eigenvalues,
            provenance: None,
        })
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = Some(provenance);
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Length of a flattened face (`P`).
    pub fn pixel_count(&self) -> usize {
        self.mean.len()
    }

    /// Number of retained directions (`K`).
    pub fn component_count(&self) -> usize {
        self.directions.nrows()
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// `K × P` matrix, one principal direction per row.
    pub fn directions(&self) -> &Array2<f64> {
        &self.directions
    }

    pub fn eigenvalues(&self) -> &[f64] {
        &self.eigenvalues
    }

    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_ref()
    }

    /// The model restricted to its first `k` directions.
    pub fn with_components(&self, k: usize) -> Result<Self, ModelError> {
        let available = self.component_count();
        if k == 0 || k > available {
            return Err(ModelError::ComponentCount {
                requested: k,
                available,
            });
        }
        Ok(Self {
            width: self.width,
            height: self.height,
            mean: self.mean.clone(),
            directions: self.directions.slice(s![..k, ..]).to_owned(),
            eigenvalues: self.eigenvalues.iter().take(k).copied().collect(),
            provenance: self.provenance.clone(),
        })
    }

    /// Map subspace coordinates back to a flattened face: `mean + p · directions`.
    pub fn reconstruct(&self, projection: &Projection) -> Result<Array1<f64>, ModelError> {
        if projection.len() != self.component_count() {
            return Err(ModelError::ProjectionLength {
                expected: self.component_count(),
                found: projection.len(),
            });
        }
        let coeffs = Array1::from(projection.values.clone());
        Ok(&self.mean + &coeffs.dot(&self.directions))
    }

    /// Convert to the persisted record.
    pub fn to_record(&self) -> ModelRecord {
        ModelRecord {
            format: MODEL_FORMAT.to_string(),
            version: MODEL_VERSION,
            width: self.width,
            height: self.height,
            mean: self.mean.to_vec(),
            eigen_vectors: self.directions.outer_iter().map(|row| row.to_vec()).collect(),
            eigenvalues: self.eigenvalues.clone(),
            provenance: self.provenance.clone(),
        }
    }

    /// Validate a record and build the model from it.
    pub fn from_record(record: ModelRecord) -> Result<Self, ModelError> {
        if record.format != MODEL_FORMAT {
            return Err(ModelError::UnknownFormat(record.format));
        }
        if record.version != MODEL_VERSION {
            return Err(ModelError::UnsupportedVersion {
                found: record.version,
            });
        }
        if record.mean.is_empty() {
            return Err(ModelError::MissingField("mean"));
        }
        if record.eigen_vectors.is_empty() {
            return Err(ModelError::MissingField("eigenVectors"));
        }

        let pixels = record.mean.len();
        let rows = record.eigen_vectors.len();
        if let Some((i, row)) = record
            .eigen_vectors
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != pixels)
        {
            return Err(ModelError::Shape(format!(
                "eigenvector {i} has {} entries, mean has {pixels}",
                row.len()
            )));
        }
        let flat: Vec<f64> = record.eigen_vectors.into_iter().flatten().collect();
        let directions = Array2::from_shape_vec((rows, pixels), flat)
            .map_err(|e| ModelError::Shape(e.to_string()))?;

        let model = Self::new(
            record.width,
            record.height,
            Array1::from(record.mean),
            directions,
            record.eigenvalues,
        )?;
        Ok(match record.provenance {
            Some(p) => model.with_provenance(p),
            None => model,
        })
    }
}

/// On-disk layout of an [`EigenModel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub format: String,
    pub version: u32,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub mean: Vec<f64>,
    #[serde(default)]
    pub eigen_vectors: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub eigenvalues: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

/// Serialize a model as a JSON document.
pub fn save<W: Write>(model: &EigenModel, writer: W) -> Result<(), ModelError> {
    serde_json::to_writer_pretty(writer, &model.to_record())?;
    Ok(())
}

/// Deserialize and validate a model from a JSON document.
pub fn load<R: Read>(reader: R) -> Result<EigenModel, ModelError> {
    let record: ModelRecord = serde_json::from_reader(reader)?;
    EigenModel::from_record(record)
}

/// Write a model to `path`, replacing any existing file.
pub fn save_to_path(model: &EigenModel, path: impl AsRef<Path>) -> Result<(), ModelError> {
    let path = path.as_ref();
    let write_err = |source| ModelError::Write {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::create(path).map_err(write_err)?;
    let mut writer = std::io::BufWriter::new(file);
    save(model, &mut writer)?;
    writer.flush().map_err(write_err)?;

    tracing::info!(
        path = %path.display(),
        components = model.component_count(),
        pixels = model.pixel_count(),
        "model saved"
    );
    Ok(())
}

/// Read a model from `path`.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<EigenModel, ModelError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| ModelError::Open {
        path: path.display().to_string(),
        source,
    })?;
    let model = load(std::io::BufReader::new(file))?;

    tracing::info!(
        path = %path.display(),
        width = model.width(),
        height = model.height(),
        components = model.component_count(),
        "model loaded"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn sample_model() -> EigenModel {
        let mean = array![0.5, 1.5, 2.5, 3.5];
        let directions = array![[0.5, 0.5, 0.5, 0.5], [0.5, -0.5, 0.5, -0.5]];
        EigenModel::new(2, 2, mean, directions, vec![4.0, 1.0]).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let model = sample_model().with_provenance(Provenance {
            energy_percent: 90.0,
            sample_count: 7,
            trained_at: Utc::now(),
        });
        let mut buf = Vec::new();
        save(&model, &mut buf).unwrap();
        let loaded = load(buf.as_slice()).unwrap();

        assert_eq!(loaded.width(), 2);
        assert_eq!(loaded.height(), 2);
        for (a, b) in loaded.mean().iter().zip(model.mean().iter()) {
            assert!((a - b).abs() <= 1e-6 * b.abs().max(1.0));
        }
        for (a, b) in loaded.directions().iter().zip(model.directions().iter()) {
            assert!((a - b).abs() <= 1e-6 * b.abs().max(1.0));
        }
        assert_eq!(loaded.eigenvalues(), model.eigenvalues());
        assert_eq!(loaded.provenance(), model.provenance());
    }

    #[test]
    fn test_record_field_names() {
        let json = serde_json::to_value(sample_model().to_record()).unwrap();
        assert_eq!(json["format"], MODEL_FORMAT);
        assert_eq!(json["version"], MODEL_VERSION);
        assert_eq!(json["mean"].as_array().unwrap().len(), 4);
        assert_eq!(json["eigenVectors"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_missing_mean() {
        let json = r#"{"format":"eigenface-model","version":1,"width":1,"height":2,
                      "eigenVectors":[[1.0,0.0]]}"#;
        let err = load(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::MissingField("mean")));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_empty_eigenvectors() {
        let json = r#"{"format":"eigenface-model","version":1,"width":1,"height":2,
                      "mean":[1.0,2.0],"eigenVectors":[]}"#;
        let err = load(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::MissingField("eigenVectors")));
    }

    #[test]
    fn test_unsupported_version() {
        let json = r#"{"format":"eigenface-model","version":9,"width":1,"height":2,
                      "mean":[1.0,2.0],"eigenVectors":[[1.0,0.0]]}"#;
        let err = load(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedVersion { found: 9 }));
    }

    #[test]
    fn test_ragged_eigenvectors() {
        let json = r#"{"format":"eigenface-model","version":1,"width":1,"height":2,
                      "mean":[1.0,2.0],"eigenVectors":[[1.0,0.0],[1.0]]}"#;
        let err = load(json.as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::Shape(_)));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_dimensions_must_match_mean() {
        let json = r#"{"format":"eigenface-model","version":1,"width":3,"height":3,
                      "mean":[1.0,2.0],"eigenVectors":[[1.0,0.0]]}"#;
        assert!(matches!(load(json.as_bytes()), Err(ModelError::Shape(_))));
    }

    #[test]
    fn test_garbage_document() {
        let err = load("mean: [1, 2]".as_bytes()).unwrap_err();
        assert!(matches!(err, ModelError::Parse(_)));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_open_missing_file() {
        let err = load_from_path("/nonexistent/eigenface_model.json").unwrap_err();
        assert!(matches!(err, ModelError::Open { .. }));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_with_components_prefix() {
        let model = sample_model();
        let one = model.with_components(1).unwrap();
        assert_eq!(one.component_count(), 1);
        assert_eq!(one.eigenvalues(), &[4.0]);
        assert!(model.with_components(0).is_err());
        assert!(model.with_components(3).is_err());
    }

    #[test]
    fn test_reconstruct() {
        let model = sample_model();
        let rebuilt = model
            .reconstruct(&Projection { values: vec![2.0, 0.0] })
            .unwrap();
        assert_eq!(rebuilt.to_vec(), vec![1.5, 2.5, 3.5, 4.5]);
        assert!(model.reconstruct(&Projection { values: vec![1.0] }).is_err());
    }
}
