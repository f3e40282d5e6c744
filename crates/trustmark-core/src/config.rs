// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Analyzer configuration: module weights, enabled modules, timeouts, and the
// image-forensics thresholds. Loaded from TOML or built from defaults, and
// validated before any analysis starts.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrustmarkError};
use crate::types::ModuleKind;

/// Top-level analyzer settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub weights: ModuleWeights,
    pub modules: EnabledModules,
    /// Budget for each module before it is treated as failed.
    pub module_timeout_ms: u64,
    pub forensics: ForensicsConfig,
    /// Sender/issuer domains QR payloads are expected to point at.
    pub expected_domains: Vec<String>,
    /// Company the document claims to come from, compared with registry names.
    pub issuer_name: Option<String>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            weights: ModuleWeights::default(),
            modules: EnabledModules::default(),
            module_timeout_ms: 10_000,
            forensics: ForensicsConfig::default(),
            expected_domains: Vec::new(),
            issuer_name: None,
        }
    }
}

impl AnalyzerConfig {
    /// Parse a TOML document and validate it.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let source = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&source)
    }

    pub fn module_timeout(&self) -> Duration {
        Duration::from_millis(self.module_timeout_ms)
    }

    /// Reject weights and thresholds that would make scoring meaningless.
    pub fn validate(&self) -> Result<()> {
        self.weights.validate()?;

        if self.module_timeout_ms == 0 {
            return Err(TrustmarkError::Configuration(
                "module_timeout_ms must be greater than zero".into(),
            ));
        }

        self.forensics.validate()
    }
}

/// Static per-module weights used by the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleWeights {
    pub metadata: f64,
    pub content: f64,
    pub visual: f64,
    pub fonts: f64,
    pub images: f64,
    pub structure: f64,
    pub template: f64,
    pub external: f64,
    /// Weights for additionally registered modules, keyed by module name.
    pub custom: BTreeMap<String, f64>,
}

impl Default for ModuleWeights {
    fn default() -> Self {
        Self {
            metadata: 1.0,
            content: 1.2,
            visual: 0.8,
            fonts: 1.0,
            images: 0.9,
            structure: 1.3,
            template: 1.0,
            external: 1.5,
            custom: BTreeMap::new(),
        }
    }
}

impl ModuleWeights {
    pub fn weight(&self, kind: ModuleKind) -> f64 {
        match kind {
            ModuleKind::Metadata => self.metadata,
            ModuleKind::Content => self.content,
            ModuleKind::Visual => self.visual,
            ModuleKind::Fonts => self.fonts,
            ModuleKind::Images => self.images,
            ModuleKind::Structure => self.structure,
            ModuleKind::Template => self.template,
            ModuleKind::External => self.external,
        }
    }

    /// Weight for a module result's name; unknown modules weigh 1.0.
    pub fn weight_for(&self, module_name: &str) -> f64 {
        match ModuleKind::from_name(module_name) {
            Some(kind) => self.weight(kind),
            None => self.custom.get(module_name).copied().unwrap_or(1.0),
        }
    }

    fn validate(&self) -> Result<()> {
        let builtin = ModuleKind::ALL
            .into_iter()
            .map(|kind| (kind.name().to_string(), self.weight(kind)));
        let custom = self.custom.iter().map(|(name, weight)| (name.clone(), *weight));

        for (name, weight) in builtin.chain(custom) {
            if !weight.is_finite() || weight < 0.0 {
                return Err(TrustmarkError::Configuration(format!(
                    "weight for module {name} must be a finite non-negative number, got {weight}"
                )));
            }
        }
        Ok(())
    }
}

/// Optional modules. The five core modules always run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnabledModules {
    pub structure: bool,
    pub template: bool,
    pub external: bool,
}

impl Default for EnabledModules {
    fn default() -> Self {
        Self {
            structure: true,
            template: false,
            external: false,
        }
    }
}

const MIN_TILE_SIZE: u32 = 8;
/// Keeps per-tile pixel counts well inside `u32`.
const MAX_TILE_SIZE: u32 = 1024;

/// Thresholds for the image-forensics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForensicsConfig {
    /// Side length of one analysis tile, in pixels.
    pub tile_size: u32,
    /// Step between tile origins; smaller than `tile_size` means overlap.
    pub tile_stride: u32,
    /// Robust z-score beyond which a tile counts as anomalous.
    pub deviation_sigmas: f64,
    /// Smallest region, in square pixels, that may produce a flag.
    pub min_region_area: u32,
    /// Regions covering more than this share of the image are ignored.
    pub max_region_fraction: f64,
    /// Images whose median tile noise is below this are treated as clean renders.
    pub min_background_noise: f64,
    /// Luma difference between a region's background and its surroundings
    /// that raises the flag to high severity.
    pub background_delta: f64,
    /// Allowed ratio between image DPI and page DPI, either direction.
    pub resolution_ratio: f64,
    pub exif_tolerance_days: i64,
    /// Pixel tolerance when matching common screen resolutions.
    pub screenshot_tolerance: u32,
    /// Uncompressed/encoded size ratio above which a JPEG counts as heavily compressed.
    pub heavy_compression_ratio: f64,
    /// Images with a shorter side are too small to analyze.
    pub min_image_side: u32,
    /// Images with more pixels are skipped.
    pub max_pixels: u64,
    pub clone_detection: bool,
    /// Error level analysis on JPEG images.
    pub ela: bool,
    /// JPEG quality used for the error level re-save.
    pub ela_quality: u8,
}

impl Default for ForensicsConfig {
    fn default() -> Self {
        Self {
            tile_size: 32,
            tile_stride: 16,
            deviation_sigmas: 3.0,
            min_region_area: 1024,
            max_region_fraction: 0.5,
            min_background_noise: 1.0,
            background_delta: 6.0,
            resolution_ratio: 2.0,
            exif_tolerance_days: 30,
            screenshot_tolerance: 50,
            heavy_compression_ratio: 50.0,
            min_image_side: 64,
            max_pixels: 16_000_000,
            clone_detection: false,
            ela: true,
            ela_quality: 95,
        }
    }
}

impl ForensicsConfig {
    fn validate(&self) -> Result<()> {
        let invalid = |reason: String| Err(TrustmarkError::Configuration(reason));

        if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return invalid(format!(
                "forensics.tile_size must be between {MIN_TILE_SIZE} and {MAX_TILE_SIZE}, got {}",
                self.tile_size
            ));
        }
        if self.tile_stride == 0 || self.tile_stride > self.tile_size {
            return invalid(format!(
                "forensics.tile_stride must be between 1 and tile_size ({}), got {}",
                self.tile_size, self.tile_stride
            ));
        }
        if !(self.deviation_sigmas.is_finite() && self.deviation_sigmas > 0.0) {
            return invalid(format!(
                "forensics.deviation_sigmas must be positive, got {}",
                self.deviation_sigmas
            ));
        }
        if !(self.resolution_ratio.is_finite() && self.resolution_ratio > 1.0) {
            return invalid(format!(
                "forensics.resolution_ratio must be greater than 1.0, got {}",
                self.resolution_ratio
            ));
        }
        if !(self.max_region_fraction > 0.0 && self.max_region_fraction <= 1.0) {
            return invalid(format!(
                "forensics.max_region_fraction must be in (0, 1], got {}",
                self.max_region_fraction
            ));
        }
        if !(1..=100).contains(&self.ela_quality) {
            return invalid(format!(
                "forensics.ela_quality must be between 1 and 100, got {}",
                self.ela_quality
            ));
        }
        if self.exif_tolerance_days < 0 {
            return invalid("forensics.exif_tolerance_days must not be negative".into());
        }
        if !(self.heavy_compression_ratio.is_finite() && self.heavy_compression_ratio > 0.0) {
            return invalid("forensics.heavy_compression_ratio must be positive".into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(AnalyzerConfig::default().validate().is_ok());
    }

    #[test]
    fn default_weights() {
        let weights = ModuleWeights::default();
        assert_eq!(weights.weight_for("metadata"), 1.0);
        assert_eq!(weights.weight_for("content"), 1.2);
        assert_eq!(weights.weight_for("visual"), 0.8);
        assert_eq!(weights.weight_for("fonts"), 1.0);
        assert_eq!(weights.weight_for("images"), 0.9);
        assert_eq!(weights.weight_for("unknown-module"), 1.0);
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut config = AnalyzerConfig::default();
        config.weights.content = -1.0;
        assert!(matches!(config.validate(), Err(TrustmarkError::Configuration(_))));
    }

    #[test]
    fn nan_custom_weight_is_rejected() {
        let mut config = AnalyzerConfig::default();
        config.weights.custom.insert("extra".into(), f64::NAN);
        assert!(matches!(config.validate(), Err(TrustmarkError::Configuration(_))));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = AnalyzerConfig {
            module_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn stride_larger_than_tile_is_rejected() {
        let mut config = AnalyzerConfig::default();
        config.forensics.tile_stride = 64;
        assert!(config.validate().is_err());
    }

    #[test]
    fn oversized_tile_is_rejected() {
        let mut config = AnalyzerConfig::default();
        config.forensics.tile_size = 70_000;
        config.forensics.tile_stride = 16;
        assert!(matches!(config.validate(), Err(TrustmarkError::Configuration(_))));

        config.forensics.tile_size = 1024;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn ela_quality_must_be_a_jpeg_quality() {
        let mut config = AnalyzerConfig::default();
        config.forensics.ela_quality = 0;
        assert!(config.validate().is_err());
        config.forensics.ela_quality = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AnalyzerConfig::from_toml_str(
            r#"
            module_timeout_ms = 2500
            expected_domains = ["example.com"]

            [weights]
            external = 2.0

            [modules]
            external = true

            [forensics]
            clone_detection = true
            "#,
        )
        .expect("valid config");

        assert_eq!(config.module_timeout_ms, 2500);
        assert_eq!(config.weights.external, 2.0);
        assert_eq!(config.weights.content, 1.2);
        assert!(config.modules.external);
        assert!(config.modules.structure);
        assert!(config.forensics.clone_detection);
        assert_eq!(config.forensics.tile_size, 32);
        assert_eq!(config.expected_domains, vec!["example.com".to_string()]);
    }

    #[test]
    fn invalid_toml_values_fail_validation() {
        let err = AnalyzerConfig::from_toml_str("[forensics]\ntile_size = 4\n").unwrap_err();
        assert!(matches!(err, TrustmarkError::Configuration(_)));
    }

    #[test]
    fn malformed_toml_is_a_format_error() {
        let err = AnalyzerConfig::from_toml_str("weights = [").unwrap_err();
        assert!(matches!(err, TrustmarkError::ConfigFormat(_)));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trustmark.toml");
        std::fs::write(&path, "module_timeout_ms = 500\n").expect("write config");
        let config = AnalyzerConfig::from_file(&path).expect("load config");
        assert_eq!(config.module_timeout(), Duration::from_millis(500));
    }
}
