//! Dataset discovery and batch assembly.
//!
//! A dataset is a flat directory of face images, each optionally paired by
//! file stem with an eye annotation (`face01.pgm` + `face01.eye`). Entries are
//! returned in lexicographic path order so that gallery order, and therefore
//! tie-breaking during matching, is reproducible.

use crate::error::DataError;
use crate::grid::{load_face, resize_face};
use eigenface_core::alignment::{self, AlignmentConfig};
use eigenface_core::{EyeAnnotation, FaceImage};
use std::path::{Path, PathBuf};

/// An image file and its annotation, if one exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetEntry {
    pub image: PathBuf,
    pub annotation: Option<PathBuf>,
}

impl DatasetEntry {
    /// Label used for recognition results: the image path.
    pub fn label(&self) -> String {
        self.image.display().to_string()
    }
}

/// A face together with the label it is reported under.
#[derive(Debug, Clone)]
pub struct LabeledFace {
    pub label: String,
    pub face: FaceImage,
}

/// An item left out of a batch, and why.
#[derive(Debug)]
pub struct SkippedItem {
    pub path: PathBuf,
    pub error: DataError,
}

/// Items assembled from a dataset plus the ones that had to be skipped.
#[derive(Debug)]
pub struct Batch<T> {
    pub items: Vec<T>,
    pub skipped: Vec<SkippedItem>,
}

impl<T> Batch<T> {
    pub(crate) fn new() -> Self {
        Self {
            items: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub(crate) fn skip(&mut self, path: &Path, error: DataError) {
        tracing::warn!(path = %path.display(), error = %error, "skipping item");
        self.skipped.push(SkippedItem {
            path: path.to_path_buf(),
            error,
        });
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Regular files in `dir` with the given extension, sorted by path.
pub fn list_files(dir: impl AsRef<Path>, extension: &str) -> Result<Vec<PathBuf>, DataError> {
    let dir = dir.as_ref();
    let io_err = |source| DataError::Io {
        path: dir.display().to_string(),
        source,
    };

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && has_extension(&path, extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// List files with `image_extension` in `dir`, pairing each with the
/// same-stem file carrying `annotation_extension` when present.
pub fn discover(
    dir: impl AsRef<Path>,
    image_extension: &str,
    annotation_extension: &str,
) -> Result<Vec<DatasetEntry>, DataError> {
    let dir = dir.as_ref();
    discover_in(dir, dir, image_extension, annotation_extension)
}

/// [`discover`] with annotations kept in their own directory.
pub fn discover_in(
    image_dir: impl AsRef<Path>,
    annotation_dir: impl AsRef<Path>,
    image_extension: &str,
    annotation_extension: &str,
) -> Result<Vec<DatasetEntry>, DataError> {
    let image_dir = image_dir.as_ref();
    let annotation_dir = annotation_dir.as_ref();
    let images = list_files(image_dir, image_extension)?;

    let entries: Vec<DatasetEntry> = images
        .into_iter()
        .map(|image| {
            let annotation = image.file_stem().and_then(|stem| {
                let mut name = stem.to_os_string();
                name.push(".");
                name.push(annotation_extension);
                let candidate = annotation_dir.join(name);
                candidate.is_file().then_some(candidate)
            });
            DatasetEntry { image, annotation }
        })
        .collect();

    tracing::debug!(
        dir = %image_dir.display(),
        annotations = %annotation_dir.display(),
        images = entries.len(),
        annotated = entries.iter().filter(|e| e.annotation.is_some()).count(),
        "dataset discovered"
    );
    Ok(entries)
}

/// Load an entry and normalize it with its eye annotation.
pub fn normalized_face(
    entry: &DatasetEntry,
    config: &AlignmentConfig,
) -> Result<FaceImage, DataError> {
    let label = entry.label();
    let annotation_path = entry
        .annotation
        .as_ref()
        .ok_or_else(|| DataError::MissingAnnotation(label.clone()))?;
    let eyes = EyeAnnotation::read(annotation_path).map_err(|source| DataError::Annotation {
        path: annotation_path.display().to_string(),
        source,
    })?;
    let raw = load_face(&entry.image)?;

    alignment::normalize_annotated(&raw, &eyes, config)
        .map_err(|source| DataError::Alignment { path: label, source })
}

/// Normalize every entry for training.
///
/// With a `canvas`, normalized faces are resized to it. Without one, the
/// first accepted face fixes the batch dimensions and faces of any other
/// size are skipped.
pub fn assemble_training_set(
    entries: &[DatasetEntry],
    config: &AlignmentConfig,
    canvas: Option<(u32, u32)>,
) -> Batch<LabeledFace> {
    let mut batch = Batch::new();
    let mut size = canvas;

    for entry in entries {
        let prepared = normalized_face(entry, config).and_then(|face| match size {
            Some((w, h)) if canvas.is_some() => resize_face(&face, w, h),
            Some((w, h)) if (face.width(), face.height()) != (w, h) => {
                Err(DataError::DimensionMismatch {
                    path: entry.label(),
                    width: w,
                    height: h,
                    found_width: face.width(),
                    found_height: face.height(),
                })
            }
            _ => Ok(face),
        });

        match prepared {
            Ok(face) => {
                size.get_or_insert((face.width(), face.height()));
                tracing::debug!(
                    path = %entry.image.display(),
                    width = face.width(),
                    height = face.height(),
                    "face normalized"
                );
                batch.items.push(LabeledFace {
                    label: entry.label(),
                    face,
                });
            }
            Err(error) => batch.skip(&entry.image, error),
        }
    }

    tracing::info!(
        accepted = batch.items.len(),
        skipped = batch.skipped_count(),
        "training set assembled"
    );
    batch
}

/// Prepare a face for projection into a `width × height` model.
///
/// Annotated entries are normalized first; every face is then resized to the
/// model dimensions.
pub fn load_probe(
    entry: &DatasetEntry,
    config: &AlignmentConfig,
    (width, height): (u32, u32),
) -> Result<FaceImage, DataError> {
    let face = match entry.annotation {
        Some(_) => normalized_face(entry, config)?,
        None => load_face(&entry.image)?,
    };
    resize_face(&face, width, height)
}

/// Prepare every entry as a reference face for a `width × height` model.
pub fn assemble_probes(
    entries: &[DatasetEntry],
    config: &AlignmentConfig,
    size: (u32, u32),
) -> Batch<LabeledFace> {
    let mut batch = Batch::new();
    for entry in entries {
        match load_probe(entry, config, size) {
            Ok(face) => batch.items.push(LabeledFace {
                label: entry.label(),
                face,
            }),
            Err(error) => batch.skip(&entry.image, error),
        }
    }

    tracing::info!(
        accepted = batch.items.len(),
        skipped = batch.skipped_count(),
        "reference set assembled"
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::save_face;
    use eigenface_core::{ErrorKind, Point};

    fn write_face(dir: &Path, stem: &str, width: u32, height: u32, fill: u8) {
        let face = FaceImage::new(width, height, vec![fill; (width * height) as usize]).unwrap();
        save_face(&face, dir.join(format!("{stem}.pgm"))).unwrap();
    }

    fn write_eyes(dir: &Path, stem: &str, left: (i32, i32), right: (i32, i32)) {
        let ann = EyeAnnotation::new(Point::new(left.0, left.1), Point::new(right.0, right.1));
        std::fs::write(dir.join(format!("{stem}.eye")), ann.to_string()).unwrap();
    }

    fn config() -> AlignmentConfig {
        AlignmentConfig {
            target_eye_distance: 20.0,
            max_canvas_pixels: 10_000,
        }
    }

    #[test]
    fn test_discover_sorted_and_paired() {
        let dir = tempfile::tempdir().unwrap();
        write_face(dir.path(), "b", 4, 4, 10);
        write_face(dir.path(), "a", 4, 4, 10);
        write_eyes(dir.path(), "a", (1, 1), (3, 1));
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let entries = discover(dir.path(), "pgm", "eye").unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].image.ends_with("a.pgm"));
        assert!(entries[0].annotation.as_ref().unwrap().ends_with("a.eye"));
        assert!(entries[1].image.ends_with("b.pgm"));
        assert!(entries[1].annotation.is_none());
    }

    #[test]
    fn test_discover_missing_directory() {
        let err = discover("/nonexistent/eigenface/dataset", "pgm", "eye").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_training_set_skips_bad_items() {
        let dir = tempfile::tempdir().unwrap();
        // Eyes 10 apart, target 20 → 2x scale → 40x40
        write_face(dir.path(), "good1", 20, 20, 50);
        write_eyes(dir.path(), "good1", (5, 10), (15, 10));
        write_face(dir.path(), "good2", 20, 20, 90);
        write_eyes(dir.path(), "good2", (4, 8), (14, 8));
        // No annotation
        write_face(dir.path(), "lonely", 20, 20, 0);
        // Annotation without numbers
        write_face(dir.path(), "malformed", 20, 20, 0);
        std::fs::write(dir.path().join("malformed.eye"), "#LX\tLY\tRX\tRY\n").unwrap();
        // Eyes 20 apart → 1x scale → 20x20, wrong size for the batch
        write_face(dir.path(), "small", 20, 20, 0);
        write_eyes(dir.path(), "small", (0, 10), (20, 10));

        let entries = discover(dir.path(), "pgm", "eye").unwrap();
        let batch = assemble_training_set(&entries, &config(), None);

        assert_eq!(batch.items.len(), 2);
        assert!(batch.items.iter().all(|f| f.face.width() == 40 && f.face.height() == 40));
        assert_eq!(batch.skipped_count(), 3);

        let kinds: Vec<_> = batch.skipped.iter().map(|s| s.error.kind()).collect();
        assert_eq!(
            kinds,
            vec![ErrorKind::Format, ErrorKind::Format, ErrorKind::Validation]
        );
    }

    #[test]
    fn test_training_set_skips_unusable_eye_geometry() {
        let dir = tempfile::tempdir().unwrap();
        write_face(dir.path(), "good", 20, 20, 50);
        write_eyes(dir.path(), "good", (5, 10), (15, 10));
        // Eyes spanning most of the i32 range.
        write_face(dir.path(), "extreme", 20, 20, 50);
        write_eyes(dir.path(), "extreme", (-2_000_000_000, 0), (2_000_000_000, 0));
        // Eyes 1 apart → 20x scale → 400x400, over the pixel limit.
        write_face(dir.path(), "huge", 20, 20, 50);
        write_eyes(dir.path(), "huge", (10, 10), (11, 10));

        let entries = discover(dir.path(), "pgm", "eye").unwrap();
        let batch = assemble_training_set(&entries, &config(), None);

        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].label, "good");
        let skipped: Vec<_> = batch
            .skipped
            .iter()
            .map(|s| (s.path.file_stem().unwrap().to_owned(), s.error.kind()))
            .collect();
        assert_eq!(
            skipped,
            vec![
                ("extreme".into(), ErrorKind::Validation),
                ("huge".into(), ErrorKind::Validation),
            ]
        );
    }

    #[test]
    fn test_training_set_canvas_resizes() {
        let dir = tempfile::tempdir().unwrap();
        write_face(dir.path(), "a", 20, 20, 50);
        write_eyes(dir.path(), "a", (5, 10), (15, 10));
        write_face(dir.path(), "b", 20, 20, 50);
        write_eyes(dir.path(), "b", (0, 10), (20, 10));

        let entries = discover(dir.path(), "pgm", "eye").unwrap();
        let batch = assemble_training_set(&entries, &config(), Some((16, 12)));
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.skipped_count(), 0);
        assert!(batch.items.iter().all(|f| (f.face.width(), f.face.height()) == (16, 12)));
    }

    #[test]
    fn test_probes_resize_with_or_without_annotation() {
        let dir = tempfile::tempdir().unwrap();
        write_face(dir.path(), "annotated", 20, 20, 50);
        write_eyes(dir.path(), "annotated", (5, 10), (15, 10));
        write_face(dir.path(), "plain", 30, 10, 50);
        std::fs::write(dir.path().join("corrupt.pgm"), b"P5 garbage").unwrap();

        let entries = discover(dir.path(), "pgm", "eye").unwrap();
        let batch = assemble_probes(&entries, &config(), (8, 8));
        assert_eq!(batch.items.len(), 2);
        assert_eq!(batch.skipped_count(), 1);
        assert!(batch.skipped[0].path.ends_with("corrupt.pgm"));
        assert!(batch.items.iter().all(|f| f.face.pixel_count() == 64));
    }
}
