//! Bulk conversion of source photos into a training-ready dataset.
//!
//! Every source image is converted to grayscale, resized to a fixed size and
//! written as `<out>/pgm/<stem>.pgm`, alongside a default eye annotation at
//! `<out>/eye/<stem>.eye`.

use crate::dataset::{list_files, Batch};
use crate::error::DataError;
use crate::grid::{load_face, resize_face, save_face};
use eigenface_core::EyeAnnotation;
use std::path::{Path, PathBuf};

/// Subdirectory receiving resized images.
pub const IMAGE_SUBDIR: &str = "pgm";
/// Subdirectory receiving generated annotations.
pub const ANNOTATION_SUBDIR: &str = "eye";

#[derive(Debug, Clone)]
pub struct PreprocessOptions {
    /// Extension of the source photos (e.g. `jpg`).
    pub source_extension: String,
    pub width: u32,
    pub height: u32,
}

/// Convert every matching image in `input` and report the written image paths.
///
/// Failing to create the output layout is fatal; a single unreadable or
/// unwritable image is skipped.
pub fn preprocess_directory(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    options: &PreprocessOptions,
) -> Result<Batch<PathBuf>, DataError> {
    let input = input.as_ref();
    let output = output.as_ref();
    if options.width == 0 || options.height == 0 {
        return Err(DataError::InvalidSize {
            width: options.width,
            height: options.height,
        });
    }

    let image_dir = output.join(IMAGE_SUBDIR);
    let annotation_dir = output.join(ANNOTATION_SUBDIR);
    for dir in [&image_dir, &annotation_dir] {
        std::fs::create_dir_all(dir).map_err(|source| DataError::Io {
            path: dir.display().to_string(),
            source,
        })?;
    }

    let sources = list_files(input, &options.source_extension)?;
    let eyes = EyeAnnotation::default_for(options.width, options.height);

    let mut batch = Batch::new();
    for photo in sources {
        let Some(stem) = photo.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let image_path = image_dir.join(format!("{stem}.pgm"));
        let annotation_path = annotation_dir.join(format!("{stem}.eye"));

        let converted = load_face(&photo)
            .and_then(|face| resize_face(&face, options.width, options.height))
            .and_then(|face| save_face(&face, &image_path))
            .and_then(|()| {
                std::fs::write(&annotation_path, eyes.to_string()).map_err(|source| {
                    DataError::Io {
                        path: annotation_path.display().to_string(),
                        source,
                    }
                })
            });

        match converted {
            Ok(()) => {
                tracing::debug!(
                    source = %photo.display(),
                    image = %image_path.display(),
                    annotation = %annotation_path.display(),
                    "image preprocessed"
                );
                batch.items.push(image_path);
            }
            Err(error) => batch.skip(&photo, error),
        }
    }

    tracing::info!(
        converted = batch.items.len(),
        skipped = batch.skipped_count(),
        output = %output.display(),
        "preprocessing finished"
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eigenface_core::{FaceImage, Point};

    fn options() -> PreprocessOptions {
        PreprocessOptions {
            source_extension: "png".into(),
            width: 100,
            height: 50,
        }
    }

    #[test]
    fn test_preprocess_writes_pairs() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let face = FaceImage::new(40, 30, vec![120u8; 1200]).unwrap();
        save_face(&face, input.path().join("person.png")).unwrap();
        std::fs::write(input.path().join("broken.png"), b"nope").unwrap();

        let batch = preprocess_directory(input.path(), output.path(), &options()).unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.skipped_count(), 1);

        let written = load_face(output.path().join("pgm/person.pgm")).unwrap();
        assert_eq!((written.width(), written.height()), (100, 50));

        let eyes = EyeAnnotation::read(output.path().join("eye/person.eye")).unwrap();
        assert_eq!(eyes.left, Point::new(35, 20));
        assert_eq!(eyes.right, Point::new(65, 20));
    }

    #[test]
    fn test_output_is_a_dataset() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let face = FaceImage::new(8, 8, vec![10u8; 64]).unwrap();
        save_face(&face, input.path().join("one.png")).unwrap();

        preprocess_directory(input.path(), output.path(), &options()).unwrap();
        let entries = crate::dataset::discover_in(
            output.path().join(IMAGE_SUBDIR),
            output.path().join(ANNOTATION_SUBDIR),
            "pgm",
            "eye",
        )
        .unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].annotation.as_ref().unwrap().ends_with("eye/one.eye"));
    }

    #[test]
    fn test_zero_size_rejected() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        let opts = PreprocessOptions {
            width: 0,
            ..options()
        };
        assert!(matches!(
            preprocess_directory(input.path(), output.path(), &opts),
            Err(DataError::InvalidSize { .. })
        ));
    }
}
