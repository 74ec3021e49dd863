//! Eye-position annotation records.
//!
//! One small text record per image: a header line, then four integers
//! `LX LY RX RY` separated by whitespace.

use crate::types::{ErrorKind, Point};
use std::fmt;
use std::path::Path;
use thiserror::Error;

const HEADER: &str = "#LX\tLY\tRX\tRY";
const FIELD_NAMES: [&str; 4] = ["LX", "LY", "RX", "RY"];

// Default eye placement for a face resized to a fixed canvas, as fractions of
// the canvas width/height.
const DEFAULT_LEFT_EYE_X: f64 = 0.35;
const DEFAULT_RIGHT_EYE_X: f64 = 0.65;
const DEFAULT_EYE_Y: f64 = 0.4;

#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error("cannot read annotation {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("annotation is empty — expected a header line")]
    MissingHeader,
    #[error("annotation is missing field {0}")]
    MissingField(&'static str),
    #[error("annotation field {field} is not an integer: {value:?}")]
    InvalidNumber { field: &'static str, value: String },
}

impl AnnotationError {
    /// Every annotation failure, including a missing file, is a format error:
    /// the image it belongs to cannot be normalized.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Format
    }
}

/// Left and right eye coordinates for one face image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EyeAnnotation {
    pub left: Point,
    pub right: Point,
}

impl EyeAnnotation {
    pub fn new(left: Point, right: Point) -> Self {
        Self { left, right }
    }

    /// Parse an annotation record. The first line is skipped as a header; the
    /// four integers may follow on one or several lines.
    pub fn parse(text: &str) -> Result<Self, AnnotationError> {
        let mut lines = text.lines();
        lines.next().ok_or(AnnotationError::MissingHeader)?;

        let mut tokens = lines.flat_map(str::split_whitespace);
        let mut values = [0i32; 4];
        for (slot, field) in values.iter_mut().zip(FIELD_NAMES) {
            let token = tokens.next().ok_or(AnnotationError::MissingField(field))?;
            *slot = token.parse().map_err(|_| AnnotationError::InvalidNumber {
                field,
                value: token.to_string(),
            })?;
        }

        Ok(Self {
            left: Point::new(values[0], values[1]),
            right: Point::new(values[2], values[3]),
        })
    }

    /// Read and parse an annotation file.
    pub fn read(path: impl AsRef<Path>) -> Result<Self, AnnotationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| AnnotationError::Unreadable {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    /// Conventional eye placement for a face that fills a `width × height` canvas.
    pub fn default_for(width: u32, height: u32) -> Self {
        let w = f64::from(width);
        let h = f64::from(height);
        let y = (h * DEFAULT_EYE_Y) as i32;
        Self {
            left: Point::new((w * DEFAULT_LEFT_EYE_X) as i32, y),
            right: Point::new((w * DEFAULT_RIGHT_EYE_X) as i32, y),
        }
    }
}

impl fmt::Display for EyeAnnotation {
    /// Renders the record in the on-disk format, header included.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER}")?;
        writeln!(
            f,
            "{}\t{}\t{}\t{}",
            self.left.x, self.left.y, self.right.x, self.right.y
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tab_separated() {
        let ann = EyeAnnotation::parse("#LX\tLY\tRX\tRY\n90\t120\t160\t118\n").unwrap();
        assert_eq!(ann.left, Point::new(90, 120));
        assert_eq!(ann.right, Point::new(160, 118));
    }

    #[test]
    fn test_parse_values_across_lines() {
        let ann = EyeAnnotation::parse("header\n1 2\n  3\n4").unwrap();
        assert_eq!(ann.left, Point::new(1, 2));
        assert_eq!(ann.right, Point::new(3, 4));
    }

    #[test]
    fn test_missing_numeric_line() {
        let err = EyeAnnotation::parse("#LX\tLY\tRX\tRY\n").unwrap_err();
        assert!(matches!(err, AnnotationError::MissingField("LX")));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_truncated_line() {
        let err = EyeAnnotation::parse("#LX\tLY\tRX\tRY\n10 20 30").unwrap_err();
        assert!(matches!(err, AnnotationError::MissingField("RY")));
    }

    #[test]
    fn test_non_numeric_field() {
        let err = EyeAnnotation::parse("#\n10 twenty 30 40").unwrap_err();
        match err {
            AnnotationError::InvalidNumber { field, value } => {
                assert_eq!(field, "LY");
                assert_eq!(value, "twenty");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_text() {
        assert!(matches!(
            EyeAnnotation::parse(""),
            Err(AnnotationError::MissingHeader)
        ));
    }

    #[test]
    fn test_missing_file_is_format_error() {
        let err = EyeAnnotation::read("/nonexistent/eigenface/face.eye").unwrap_err();
        assert!(matches!(err, AnnotationError::Unreadable { .. }));
        assert_eq!(err.kind(), ErrorKind::Format);
    }

    #[test]
    fn test_default_for_256() {
        let ann = EyeAnnotation::default_for(256, 256);
        assert_eq!(ann.left, Point::new(89, 102));
        assert_eq!(ann.right, Point::new(166, 102));
    }

    #[test]
    fn test_display_parses_back() {
        let ann = EyeAnnotation::new(Point::new(-3, 7), Point::new(40, 8));
        let text = ann.to_string();
        assert!(text.starts_with(HEADER));
        assert_eq!(EyeAnnotation::parse(&text).unwrap(), ann);
    }
}
