//! Grayscale grid I/O and resampling.

use crate::error::DataError;
use eigenface_core::FaceImage;
use image::imageops::{self, FilterType};
use image::GrayImage;
use std::path::Path;

/// Decode any supported image file as an 8-bit grayscale grid.
pub fn load_face(path: impl AsRef<Path>) -> Result<FaceImage, DataError> {
    let path = path.as_ref();
    let gray = image::open(path)
        .map_err(|source| DataError::Decode {
            path: path.display().to_string(),
            source,
        })?
        .into_luma8();
    from_gray(gray)
}

/// Encode a grid; the format follows the file extension.
pub fn save_face(face: &FaceImage, path: impl AsRef<Path>) -> Result<(), DataError> {
    let path = path.as_ref();
    to_gray(face)?
        .save(path)
        .map_err(|source| DataError::Encode {
            path: path.display().to_string(),
            source,
        })
}

/// Resample a grid to `width × height` with bilinear filtering.
///
/// Returns the input unchanged when it already has those dimensions.
pub fn resize_face(face: &FaceImage, width: u32, height: u32) -> Result<FaceImage, DataError> {
    if width == 0 || height == 0 {
        return Err(DataError::InvalidSize { width, height });
    }
    if face.width() == width && face.height() == height {
        return Ok(face.clone());
    }
    let resized = imageops::resize(&to_gray(face)?, width, height, FilterType::Triangle);
    from_gray(resized)
}

fn from_gray(gray: GrayImage) -> Result<FaceImage, DataError> {
    let (width, height) = gray.dimensions();
    Ok(FaceImage::new(width, height, gray.into_raw())?)
}

fn to_gray(face: &FaceImage) -> Result<GrayImage, DataError> {
    GrayImage::from_raw(face.width(), face.height(), face.pixels().to_vec()).ok_or(
        DataError::InvalidSize {
            width: face.width(),
            height: face.height(),
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use eigenface_core::ErrorKind;

    fn gradient(width: u32, height: u32) -> FaceImage {
        let data = (0..width * height).map(|i| (i % 256) as u8).collect();
        FaceImage::new(width, height, data).unwrap()
    }

    #[test]
    fn test_pgm_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.pgm");
        let face = gradient(7, 5);
        save_face(&face, &path).unwrap();
        let loaded = load_face(&path).unwrap();
        assert_eq!(loaded, face);
    }

    #[test]
    fn test_png_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("face.png");
        let face = gradient(4, 9);
        save_face(&face, &path).unwrap();
        assert_eq!(load_face(&path).unwrap(), face);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_face("/nonexistent/eigenface/face.pgm").unwrap_err();
        assert!(matches!(err, DataError::Decode { .. }));
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_load_garbage_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pgm");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(load_face(&path).is_err());
    }

    #[test]
    fn test_resize_dimensions() {
        let resized = resize_face(&gradient(10, 6), 5, 3).unwrap();
        assert_eq!((resized.width(), resized.height()), (5, 3));
        assert_eq!(resized.pixel_count(), 15);
    }

    #[test]
    fn test_resize_uniform_stays_uniform() {
        let face = FaceImage::new(8, 8, vec![77u8; 64]).unwrap();
        let resized = resize_face(&face, 3, 5).unwrap();
        assert!(resized.pixels().iter().all(|&p| p == 77));
    }

    #[test]
    fn test_resize_same_size_is_identity() {
        let face = gradient(6, 4);
        assert_eq!(resize_face(&face, 6, 4).unwrap(), face);
    }

    #[test]
    fn test_resize_to_zero_rejected() {
        assert!(matches!(
            resize_face(&gradient(4, 4), 0, 4),
            Err(DataError::InvalidSize { .. })
        ));
    }
}
