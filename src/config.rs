//! Application constants and imaging configuration.
//!
//! `ImagingConfig` carries every tunable of the de-identification pipeline.
//! Defaults reproduce the product behaviour; `from_env()` lets an operator
//! override individual values through `PAPIERS_*` variables without a rebuild.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application-level constants
pub const APP_NAME: &str = "Papiers";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const MIB: u64 = 1024 * 1024;

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "papiers=info,warn"
}

/// Resize filter quality levels.
///
/// CatmullRom keeps document text legible after downscaling without the
/// ringing Lanczos3 leaves around high-contrast edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeQuality {
    /// CatmullRom (cubic spline).
    High,
    /// Triangle (bilinear), roughly what a browser canvas does.
    Fast,
}

/// How the size reducer picks a JPEG quality for an oversized artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum QualityStrategy {
    /// One encode at `min(1, max_bytes / size)`. Output may still exceed the target.
    SingleShot,
    /// Binary search over quality, at most `max_attempts` encodes.
    BoundedSearch { max_attempts: u8 },
}

/// Tunables for validation, blur and size reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImagingConfig {
    /// Largest accepted upload, in bytes.
    pub max_input_bytes: u64,
    /// Artifacts above this size go through the size reducer.
    pub max_output_bytes: u64,
    pub max_width: u32,
    pub max_height: u32,
    /// Gaussian sigma of the whole-image blur, in native pixels.
    pub blur_radius: f32,
    /// Gaussian sigma used by region blur.
    pub region_blur_radius: f32,
    /// Quality for lossy (JPEG, WebP) renditions encoded at native size.
    pub encode_quality: u8,
    pub resize_quality: ResizeQuality,
    pub quality_strategy: QualityStrategy,
    /// Width or height above which decoding is refused.
    pub max_decode_dimension: u32,
    /// Apply EXIF orientation before any transform.
    pub correct_orientation: bool,
}

impl Default for ImagingConfig {
    fn default() -> Self {
        Self {
            max_input_bytes: 10 * MIB,
            max_output_bytes: 2 * MIB,
            max_width: 1920,
            max_height: 1080,
            blur_radius: 25.0,
            region_blur_radius: 15.0,
            encode_quality: 92,
            resize_quality: ResizeQuality::High,
            quality_strategy: QualityStrategy::SingleShot,
            max_decode_dimension: 16384,
            correct_orientation: true,
        }
    }
}

impl ImagingConfig {
    /// Defaults with `PAPIERS_*` environment overrides applied.
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Unparsable values are
    /// logged and ignored, leaving the current value in place.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        override_value(&lookup, "PAPIERS_MAX_INPUT_BYTES", &mut self.max_input_bytes);
        override_value(&lookup, "PAPIERS_MAX_OUTPUT_BYTES", &mut self.max_output_bytes);
        override_value(&lookup, "PAPIERS_MAX_WIDTH", &mut self.max_width);
        override_value(&lookup, "PAPIERS_MAX_HEIGHT", &mut self.max_height);
        override_value(&lookup, "PAPIERS_BLUR_RADIUS", &mut self.blur_radius);
        override_value(&lookup, "PAPIERS_REGION_BLUR_RADIUS", &mut self.region_blur_radius);
        override_value(&lookup, "PAPIERS_ENCODE_QUALITY", &mut self.encode_quality);
        override_value(&lookup, "PAPIERS_MAX_DECODE_DIMENSION", &mut self.max_decode_dimension);
        override_value(&lookup, "PAPIERS_CORRECT_ORIENTATION", &mut self.correct_orientation);

        if let Some(raw) = lookup("PAPIERS_QUALITY_SEARCH_ATTEMPTS") {
            match raw.trim().parse::<u8>() {
                Ok(0) => self.quality_strategy = QualityStrategy::SingleShot,
                Ok(n) => self.quality_strategy = QualityStrategy::BoundedSearch { max_attempts: n },
                Err(_) => warn!(key = "PAPIERS_QUALITY_SEARCH_ATTEMPTS", value = %raw, "Ignoring invalid override"),
            }
        }

        if let Some(raw) = lookup("PAPIERS_RESIZE_QUALITY") {
            match raw.trim().to_ascii_lowercase().as_str() {
                "high" => self.resize_quality = ResizeQuality::High,
                "fast" => self.resize_quality = ResizeQuality::Fast,
                _ => warn!(key = "PAPIERS_RESIZE_QUALITY", value = %raw, "Ignoring invalid override"),
            }
        }

        self
    }
}

fn override_value<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => *slot = value,
        Err(_) => warn!(key, value = %raw, "Ignoring invalid override"),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn app_name_is_papiers() {
        assert_eq!(APP_NAME, "Papiers");
    }

    #[test]
    fn app_version_matches_cargo() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn defaults_match_product_limits() {
        let config = ImagingConfig::default();
        assert_eq!(config.max_input_bytes, 10 * 1024 * 1024);
        assert_eq!(config.max_output_bytes, 2 * 1024 * 1024);
        assert_eq!((config.max_width, config.max_height), (1920, 1080));
        assert!((config.blur_radius - 25.0).abs() < f32::EPSILON);
        assert!((config.region_blur_radius - 15.0).abs() < f32::EPSILON);
        assert_eq!(config.quality_strategy, QualityStrategy::SingleShot);
        assert!(config.correct_orientation);
    }

    #[test]
    fn overrides_replace_values() {
        let config = ImagingConfig::default().with_overrides(lookup_from(&[
            ("PAPIERS_MAX_OUTPUT_BYTES", "1048576"),
            ("PAPIERS_MAX_WIDTH", " 1280 "),
            ("PAPIERS_BLUR_RADIUS", "12.5"),
            ("PAPIERS_RESIZE_QUALITY", "FAST"),
            ("PAPIERS_CORRECT_ORIENTATION", "false"),
        ]));
        assert_eq!(config.max_output_bytes, 1024 * 1024);
        assert_eq!(config.max_width, 1280);
        assert!((config.blur_radius - 12.5).abs() < f32::EPSILON);
        assert_eq!(config.resize_quality, ResizeQuality::Fast);
        assert!(!config.correct_orientation);
        assert_eq!(config.max_height, 1080);
    }

    #[test]
    fn invalid_override_keeps_default() {
        let config = ImagingConfig::default().with_overrides(lookup_from(&[
            ("PAPIERS_MAX_WIDTH", "wide"),
            ("PAPIERS_ENCODE_QUALITY", "300"),
            ("PAPIERS_RESIZE_QUALITY", "ultra"),
        ]));
        assert_eq!(config, ImagingConfig::default());
    }

    #[test]
    fn quality_search_override() {
        let config = ImagingConfig::default()
            .with_overrides(lookup_from(&[("PAPIERS_QUALITY_SEARCH_ATTEMPTS", "5")]));
        assert_eq!(
            config.quality_strategy,
            QualityStrategy::BoundedSearch { max_attempts: 5 }
        );

        let config = config.with_overrides(lookup_from(&[("PAPIERS_QUALITY_SEARCH_ATTEMPTS", "0")]));
        assert_eq!(config.quality_strategy, QualityStrategy::SingleShot);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ImagingConfig =
            serde_json::from_str(r#"{"max_width": 800, "quality_strategy": {"kind": "bounded_search", "max_attempts": 4}}"#)
                .unwrap();
        assert_eq!(config.max_width, 800);
        assert_eq!(config.max_height, 1080);
        assert_eq!(
            config.quality_strategy,
            QualityStrategy::BoundedSearch { max_attempts: 4 }
        );
    }

    #[test]
    fn resize_quality_serializes() {
        let json = serde_json::to_string(&ResizeQuality::High).unwrap();
        assert_eq!(json, "\"high\"");
    }
}
