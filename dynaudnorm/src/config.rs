// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Engine tuning options and library path resolution.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// Build script generates constants.rs with DYNAUDNORM_LIB_DIR
include!(concat!(env!("OUT_DIR"), "/constants.rs"));

/// Environment variable that overrides the engine library location at runtime.
pub const LIBRARY_ENV: &str = "DYNAUDNORM_LIBRARY";

/// Base name of the engine shared library, without platform prefix or suffix.
pub const LIBRARY_NAME: &str = "DynamicAudioNormalizerAPI";

/// Tuning options passed to the engine when an instance is created.
///
/// Defaults match the engine's own defaults. Every field may be omitted when
/// deserializing; missing fields take their default value.
///
/// # Examples
///
/// ```
/// use dynaudnorm::NormalizerOptions;
///
/// let options: NormalizerOptions = serde_json::from_str(r#"{"filter_size": 15}"#).unwrap();
/// assert_eq!(options.filter_size, 15);
/// assert_eq!(options.frame_len_msec, 500);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerOptions {
    /// Length of one analysis frame in milliseconds (10..=8000).
    pub frame_len_msec: u32,
    /// Size of the Gaussian smoothing window in frames (odd, 3..=301).
    pub filter_size: u32,
    /// Target peak magnitude (0.01..=1.0).
    pub peak_value: f64,
    /// Maximum gain factor (1.0..=100.0).
    pub max_amplification: f64,
    /// Target RMS value, `0.0` disables RMS targeting (0.0..=1.0).
    pub target_rms: f64,
    /// Compression threshold in standard deviations, `0.0` disables (1.0..=30.0).
    pub compress_factor: f64,
    /// Apply the same gain to all channels.
    pub channels_coupled: bool,
    pub enable_dc_correction: bool,
    pub alt_boundary_mode: bool,
}

impl Default for NormalizerOptions {
    fn default() -> Self {
        Self {
            frame_len_msec: 500,
            filter_size: 31,
            peak_value: 0.95,
            max_amplification: 10.0,
            target_rms: 0.0,
            compress_factor: 0.0,
            channels_coupled: true,
            enable_dc_correction: false,
            alt_boundary_mode: false,
        }
    }
}

impl NormalizerOptions {
    /// Loads options from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Json`] if
    /// it is not a valid options object.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Checks every option against the range the engine accepts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidOption`] naming the first offending option.
    pub fn validate(&self) -> Result<()> {
        if !(3..=301).contains(&self.filter_size) {
            return Err(Error::InvalidOption(format!(
                "filter size {} is out of range, must be in the 3 to 301 range",
                self.filter_size
            )));
        }
        if self.filter_size % 2 != 1 {
            return Err(Error::InvalidOption(format!(
                "filter size {} is invalid, must be an odd value",
                self.filter_size
            )));
        }
        if !(10..=8000).contains(&self.frame_len_msec) {
            return Err(Error::InvalidOption(format!(
                "frame length {} is out of range, must be in the 10 to 8000 range",
                self.frame_len_msec
            )));
        }
        if !(0.01..=1.0).contains(&self.peak_value) {
            return Err(Error::InvalidOption(format!(
                "peak value {:.2} is out of range, must be in the 0.01 to 1.00 range",
                self.peak_value
            )));
        }
        if !(0.0..=1.0).contains(&self.target_rms) {
            return Err(Error::InvalidOption(format!(
                "target RMS {:.2} is out of range, must be in the 0.00 to 1.00 range",
                self.target_rms
            )));
        }
        if self.compress_factor != 0.0 && !(1.0..=30.0).contains(&self.compress_factor) {
            return Err(Error::InvalidOption(format!(
                "compression threshold {:.2} is out of range, must be in the 1.00 to 30.00 range",
                self.compress_factor
            )));
        }
        if !(1.0..=100.0).contains(&self.max_amplification) {
            return Err(Error::InvalidOption(format!(
                "maximum amplification {:.2} is out of range, must be in the 1.00 to 100.00 range",
                self.max_amplification
            )));
        }
        Ok(())
    }
}

/// Returns the path of the engine shared library.
///
/// Resolution order:
/// 1. `DYNAUDNORM_LIBRARY` in the environment, taken verbatim
/// 2. The directory given by `DYNAUDNORM_LIB_DIR` when this crate was built
/// 3. The bare platform file name (e.g. `libDynamicAudioNormalizerAPI.so`),
///    left to the system loader's search path
///
/// # Examples
///
/// ```no_run
/// use dynaudnorm::{config::get_library_path, load_api};
///
/// # fn main() -> Result<(), dynaudnorm::Error> {
/// let api = load_api(get_library_path())?;
/// # Ok(())
/// # }
/// ```
pub fn get_library_path() -> PathBuf {
    if let Some(path) = std::env::var_os(LIBRARY_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(path);
    }
    let file_name = libloading::library_filename(LIBRARY_NAME);
    if DYNAUDNORM_LIB_DIR.is_empty() {
        PathBuf::from(file_name)
    } else {
        Path::new(DYNAUDNORM_LIB_DIR).join(file_name)
    }
}
