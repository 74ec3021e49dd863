use eigenface_core::alignment::AlignmentError;
use eigenface_core::annotation::AnnotationError;
use eigenface_core::types::GridError;
use eigenface_core::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode image {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("cannot encode image {path}: {source}")]
    Encode {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("no annotation file for {0}")]
    MissingAnnotation(String),
    #[error("bad annotation for {path}: {source}")]
    Annotation {
        path: String,
        #[source]
        source: AnnotationError,
    },
    #[error("cannot normalize {path}: {source}")]
    Alignment {
        path: String,
        #[source]
        source: AlignmentError,
    },
    #[error("{path} is {found_width}x{found_height} after normalization, batch is {width}x{height}")]
    DimensionMismatch {
        path: String,
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
    #[error("cannot resize to {width}x{height}")]
    InvalidSize { width: u32, height: u32 },
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl DataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::Io { .. } | DataError::Decode { .. } | DataError::Encode { .. } => {
                ErrorKind::Io
            }
            DataError::MissingAnnotation(_) | DataError::Annotation { .. } => ErrorKind::Format,
            DataError::Alignment { .. }
            | DataError::DimensionMismatch { .. }
            | DataError::InvalidSize { .. }
            | DataError::Grid(_) => ErrorKind::Validation,
        }
    }
}
