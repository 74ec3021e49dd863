use anyhow::{Context, Result};
use eigenface_core::alignment::{
    AlignmentConfig, DEFAULT_MAX_CANVAS_PIXELS, DEFAULT_TARGET_EYE_DISTANCE,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// CLI configuration: defaults, then an optional TOML file, then
/// `EIGENFACE_*` environment variables. Command-line flags win over all three.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Interocular distance faces are normalized to.
    pub target_eye_distance: f32,
    /// Largest normalized canvas, in pixels; bigger faces are skipped.
    pub max_canvas_pixels: u64,
    /// Extension of face images in a dataset directory (default: pgm).
    pub image_extension: String,
    /// Extension of eye annotation files (default: eye).
    pub annotation_extension: String,
    /// Directory holding annotations when they are not next to the images.
    pub annotation_dir: Option<PathBuf>,
    /// Where `train` writes and `recognize` reads the model.
    pub model_path: PathBuf,
    /// Cumulative energy, in percent, the trained subspace must capture.
    pub energy_percent: f64,
    /// Common `[width, height]` normalized faces are resized to before training.
    pub canvas: Option<[u32; 2]>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_eye_distance: DEFAULT_TARGET_EYE_DISTANCE,
            max_canvas_pixels: DEFAULT_MAX_CANVAS_PIXELS,
            image_extension: "pgm".to_string(),
            annotation_extension: "eye".to_string(),
            annotation_dir: None,
            model_path: PathBuf::from("eigenface_model.json"),
            energy_percent: 95.0,
            canvas: None,
        }
    }
}

impl Config {
    /// Load configuration from an optional TOML file and the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml(&text).with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Apply `EIGENFACE_*` overrides from `lookup`. Unparseable values are
    /// ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_parsed(&lookup, "EIGENFACE_TARGET_EYE_DISTANCE", &mut self.target_eye_distance);
        override_parsed(&lookup, "EIGENFACE_MAX_CANVAS_PIXELS", &mut self.max_canvas_pixels);
        override_parsed(&lookup, "EIGENFACE_ENERGY_PERCENT", &mut self.energy_percent);
        if let Some(v) = lookup("EIGENFACE_IMAGE_EXTENSION") {
            self.image_extension = v;
        }
        if let Some(v) = lookup("EIGENFACE_ANNOTATION_EXTENSION") {
            self.annotation_extension = v;
        }
        if let Some(v) = lookup("EIGENFACE_ANNOTATION_DIR") {
            self.annotation_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("EIGENFACE_MODEL_PATH") {
            self.model_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("EIGENFACE_CANVAS") {
            match parse_size(&v) {
                Some((w, h)) => self.canvas = Some([w, h]),
                None => tracing::warn!(value = %v, "ignoring EIGENFACE_CANVAS, expected WIDTHxHEIGHT"),
            }
        }
    }

    pub fn alignment(&self) -> AlignmentConfig {
        AlignmentConfig {
            target_eye_distance: self.target_eye_distance,
            max_canvas_pixels: self.max_canvas_pixels,
        }
    }

    pub fn canvas_size(&self) -> Option<(u32, u32)> {
        self.canvas.map(|[w, h]| (w, h))
    }
}

/// Parse `WIDTHxHEIGHT`, e.g. `64x80`.
pub fn parse_size(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.trim().split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn override_parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable override"),
        }
    }
}
