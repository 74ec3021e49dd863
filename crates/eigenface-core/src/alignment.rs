//! Face normalization via an eye-centred similarity transform.
//!
//! Scales a raw face so that the interocular distance becomes a configured
//! target, pivoting around the eye midpoint. The eye line is not leveled
//! (rotation angle 0) and the output canvas is the source size times the
//! scale, so output dimensions vary with eye separation.

use crate::annotation::EyeAnnotation;
use crate::types::{ErrorKind, FaceImage, GridError, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Interocular distance, in output pixels, after normalization.
pub const DEFAULT_TARGET_EYE_DISTANCE: f32 = 100.0;

/// Largest normalized canvas, in pixels, before a face is rejected (4096²).
pub const DEFAULT_MAX_CANVAS_PIXELS: u64 = 4096 * 4096;

/// Rotation applied about the eye midpoint, in degrees.
const EYE_LINE_ANGLE_DEG: f32 = 0.0;

#[derive(Error, Debug)]
pub enum AlignmentError {
    #[error("target eye distance must be positive and finite, got {0}")]
    InvalidTargetDistance(f32),
    #[error("left and right eye coincide at ({}, {}) — interocular distance is zero", .0.x, .0.y)]
    CoincidentEyes(Point),
    #[error("normalized canvas would be {width:.2}x{height:.2} pixels")]
    EmptyCanvas { width: f64, height: f64 },
    #[error("normalized canvas {width}x{height} exceeds the limit of {limit} pixels")]
    CanvasTooLarge { width: u64, height: u64, limit: u64 },
    #[error(transparent)]
    Grid(#[from] GridError),
}

impl AlignmentError {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

/// Parameters of the normalization step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignmentConfig {
    /// Interocular distance the eyes are scaled to.
    pub target_eye_distance: f32,
    /// Upper bound on `width × height` of the normalized canvas.
    pub max_canvas_pixels: u64,
}

impl Default for AlignmentConfig {
    fn default() -> Self {
        Self {
            target_eye_distance: DEFAULT_TARGET_EYE_DISTANCE,
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
        }
    }
}

/// Build a 2×3 similarity matrix rotating by `angle_deg` and scaling by
/// `scale` about `center`.
///
/// Returns [a, b, tx, c, d, ty] representing the matrix:
/// ```text
/// | a  b  tx |
/// | c  d  ty |
/// ```
fn similarity_about(center: (f32, f32), angle_deg: f32, scale: f32) -> [f32; 6] {
    let (cx, cy) = center;
    let theta = angle_deg.to_radians();
    let alpha = scale * theta.cos();
    let beta = scale * theta.sin();
    [
        alpha,
        beta,
        (1.0 - alpha) * cx - beta * cy,
        -beta,
        alpha,
        beta * cx + (1.0 - alpha) * cy,
    ]
}

/// Apply a 2×3 affine warp to produce an `out_width × out_height` output.
///
/// Uses bilinear interpolation. Out-of-bounds pixels are filled with 0 (black).
fn warp_affine(
    frame: &[u8],
    src_width: usize,
    src_height: usize,
    matrix: &[f32; 6],
    out_width: usize,
    out_height: usize,
) -> Vec<u8> {
    let [a, b, tx, c, d, ty] = *matrix;

    let det = a * d - b * c;
    if det.abs() < 1e-12 {
        return vec![0u8; out_width * out_height];
    }
    let inv_det = 1.0 / det;
    let (ia, ib) = (d * inv_det, -b * inv_det);
    let (ic, id) = (-c * inv_det, a * inv_det);

    let mut output = vec![0u8; out_width * out_height];

    for oy in 0..out_height {
        for ox in 0..out_width {
            // Map output pixel back to source: src = M_inv * (dst - t)
            let dx = ox as f32 - tx;
            let dy = oy as f32 - ty;
            let sx = ia * dx + ib * dy;
            let sy = ic * dx + id * dy;

            // i64 keeps the +1 neighbour from overflowing for far-off samples.
            let x0 = sx.floor() as i64;
            let y0 = sy.floor() as i64;
            let x1 = x0 + 1;
            let y1 = y0 + 1;
            let fx = sx - sx.floor();
            let fy = sy - sy.floor();

            let sample = |x: i64, y: i64| -> f32 {
                if x >= 0 && x < src_width as i64 && y >= 0 && y < src_height as i64 {
                    frame[y as usize * src_width + x as usize] as f32
                } else {
                    0.0
                }
            };

            let val = sample(x0, y0) * (1.0 - fx) * (1.0 - fy)
                + sample(x1, y0) * fx * (1.0 - fy)
                + sample(x0, y1) * (1.0 - fx) * fy
                + sample(x1, y1) * fx * fy;

            output[oy * out_width + ox] = val.round().clamp(0.0, 255.0) as u8;
        }
    }

    output
}

/// Normalize a raw face so its eyes sit `target_eye_distance` apart.
///
/// The face is scaled uniformly about the eye midpoint and resampled into a
/// canvas of `(width·scale, height·scale)` pixels, truncated to integers.
/// Canvases larger than `max_canvas_pixels` are rejected before allocation.
pub fn normalize(
    image: &FaceImage,
    left_eye: Point,
    right_eye: Point,
    config: &AlignmentConfig,
) -> Result<FaceImage, AlignmentError> {
    let target = config.target_eye_distance;
    if !(target.is_finite() && target > 0.0) {
        return Err(AlignmentError::InvalidTargetDistance(target));
    }

    let eye_distance = left_eye.distance_to(&right_eye);
    if eye_distance == 0.0 {
        return Err(AlignmentError::CoincidentEyes(left_eye));
    }
    let scale = f64::from(target) / eye_distance;

    let out_w = f64::from(image.width()) * scale;
    let out_h = f64::from(image.height()) * scale;
    if !(out_w >= 1.0 && out_h >= 1.0 && out_w.is_finite() && out_h.is_finite()) {
        return Err(AlignmentError::EmptyCanvas {
            width: out_w,
            height: out_h,
        });
    }
    let (canvas_w, canvas_h) = (out_w.trunc(), out_h.trunc());
    let side_limit = f64::from(u32::MAX);
    if canvas_w * canvas_h > config.max_canvas_pixels as f64
        || canvas_w > side_limit
        || canvas_h > side_limit
    {
        return Err(AlignmentError::CanvasTooLarge {
            width: canvas_w as u64,
            height: canvas_h as u64,
            limit: config.max_canvas_pixels,
        });
    }
    let (out_w, out_h) = (canvas_w as u32, canvas_h as u32);

    let (cx, cy) = left_eye.midpoint(&right_eye);
    let matrix = similarity_about((cx as f32, cy as f32), EYE_LINE_ANGLE_DEG, scale as f32);
    tracing::trace!(
        eye_distance,
        scale,
        width = out_w,
        height = out_h,
        "normalizing face"
    );

    let data = warp_affine(
        image.pixels(),
        image.width() as usize,
        image.height() as usize,
        &matrix,
        out_w as usize,
        out_h as usize,
    );
    Ok(FaceImage::new(out_w, out_h, data)?)
}

/// [`normalize`] using the eye positions of an annotation record.
pub fn normalize_annotated(
    image: &FaceImage,
    eyes: &EyeAnnotation,
    config: &AlignmentConfig,
) -> Result<FaceImage, AlignmentError> {
    normalize(image, eyes.left, eyes.right, config)
}
