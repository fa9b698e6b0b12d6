// In: src/config.rs

//! The single source of truth for all ebe analysis configuration.
//!
//! `EbeConfig` is created once at the application boundary (e.g. from a JSON
//! document or built by a command-line front end) and validated eagerly with
//! [`EbeConfig::validate`] before any data is read. Every optional bound is an
//! explicit `Option`, so a bound of `0.0` is an active bound, not "unset".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::decoder::RecordFormat;
use crate::error::EbeError;

//==================================================================================
// I. Core Configuration Enums
//==================================================================================

/// Filename substring that marks UrQMD fixed-width output during auto-detection.
pub const FIXED_WIDTH_EXTENSION: &str = ".f13";

/// The input format as requested by the user.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// **Default:** inspect the first filename; `.f13` selects fixed-width,
    /// anything else (including stdin) selects the standard format.
    #[default]
    Auto,
    Std,
    #[serde(alias = "urqmd")]
    Fixed,
}

impl InputFormat {
    /// Resolves `Auto` against the configured inputs.
    pub fn resolve<P: AsRef<Path>>(self, files: &[P]) -> RecordFormat {
        match self {
            InputFormat::Std => RecordFormat::Standard,
            InputFormat::Fixed => RecordFormat::FixedWidth,
            InputFormat::Auto => {
                let first_is_fixed = files
                    .first()
                    .map(|f| f.as_ref().to_string_lossy().contains(FIXED_WIDTH_EXTENSION))
                    .unwrap_or(false);
                if first_is_fixed {
                    RecordFormat::FixedWidth
                } else {
                    RecordFormat::Standard
                }
            }
        }
    }
}

//==================================================================================
// II. The Unified EbeConfig
//==================================================================================

/// The single, unified configuration for a flow analysis run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct EbeConfig {
    /// Files to read in order. Empty, or a single `"-"`, reads stdin.
    #[serde(default)]
    pub files: Vec<PathBuf>,

    #[serde(default, alias = "inputformat")]
    pub input_format: InputFormat,

    /// Lowest harmonic order, >= 1.
    #[serde(default = "default_vn_min")]
    pub vn_min: u32,

    /// Highest harmonic order, >= `vn_min`.
    #[serde(default = "default_vn_max")]
    pub vn_max: u32,

    // --- Particle filtering ---
    /// Allow-list of particle IDs. Mutually exclusive with `charged`.
    #[serde(default)]
    pub particle_ids: Option<Vec<i32>>,

    /// Shortcut selecting every charged species. Mutually exclusive with `particle_ids`.
    #[serde(default)]
    pub charged: bool,

    #[serde(default, alias = "pTmin")]
    pub pt_min: Option<f64>,

    #[serde(default, alias = "pTmax")]
    pub pt_max: Option<f64>,

    /// If only `eta_min` is given, selects `eta_min < |eta|`.
    #[serde(default, alias = "etamin")]
    pub eta_min: Option<f64>,

    /// If only `eta_max` is given, selects `|eta| < eta_max`.
    #[serde(default, alias = "etamax")]
    pub eta_max: Option<f64>,

    // --- Aggregation ---
    /// Width of the pT bins in GeV, differential mode only.
    #[serde(default = "default_bin_width")]
    pub bin_width: f64,

    /// Particle buffer size for bounded-memory aggregation. `None` keeps every
    /// contribution in memory until the end of the run.
    #[serde(default)]
    pub buffer_capacity: Option<usize>,

    /// Below this many particles, flow vectors are reported as zero.
    #[serde(default = "default_min_multiplicity")]
    pub min_multiplicity: usize,
}

impl Default for EbeConfig {
    fn default() -> Self {
        Self {
            files: Vec::new(),
            input_format: InputFormat::default(),
            vn_min: default_vn_min(),
            vn_max: default_vn_max(),
            particle_ids: None,
            charged: false,
            pt_min: None,
            pt_max: None,
            eta_min: None,
            eta_max: None,
            bin_width: default_bin_width(),
            buffer_capacity: None,
            min_multiplicity: default_min_multiplicity(),
        }
    }
}

fn default_vn_min() -> u32 {
    2
}

fn default_vn_max() -> u32 {
    6
}

fn default_bin_width() -> f64 {
    0.1
}

fn default_min_multiplicity() -> usize {
    2
}

impl EbeConfig {
    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(json: &str) -> Result<Self, EbeError> {
        let config: EbeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every range and exclusivity rule. Called by all constructors that
    /// consume a config, so errors surface before any line is read.
    pub fn validate(&self) -> Result<(), EbeError> {
        validate_harmonics(self.vn_min, self.vn_max)?;

        if !(self.bin_width.is_finite() && self.bin_width > 0.0) {
            return Err(EbeError::InvalidConfiguration(format!(
                "bin_width must be a positive number, got {}",
                self.bin_width
            )));
        }
        if self.buffer_capacity == Some(0) {
            return Err(EbeError::InvalidConfiguration(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }

        // Filter rules are owned by the filter itself.
        crate::filter::FilterSpec::from_config(self).validate()
    }

    /// Resolves the concrete record layout for the configured inputs.
    pub fn record_format(&self) -> RecordFormat {
        self.input_format.resolve(&self.files)
    }

    /// True when the configured inputs denote stdin.
    pub fn reads_stdin(&self) -> bool {
        self.files.is_empty() || (self.files.len() == 1 && self.files[0] == Path::new("-"))
    }
}

pub(crate) fn validate_harmonics(vn_min: u32, vn_max: u32) -> Result<(), EbeError> {
    if vn_min < 1 {
        return Err(EbeError::InvalidConfiguration(
            "vn_min must be at least 1".to_string(),
        ));
    }
    if vn_max < vn_min {
        return Err(EbeError::InvalidConfiguration(format!(
            "vn_max ({}) must not be less than vn_min ({})",
            vn_max, vn_min
        )));
    }
    Ok(())
}
