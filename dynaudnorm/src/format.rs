// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Fixed-width sample encodings understood by the codec.

use crate::{Error, Result};

/// One of the fixed-width sample encodings found in uncompressed audio streams.
///
/// The format of a stream is fixed when the stream is opened and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// Unsigned 8-bit integer.
    ///
    /// Decoding divides by 255 without re-centering around 128, so decoded values
    /// lie in `[0.0, 1.0]` instead of the usual `[-1.0, 1.0]` of unsigned PCM.
    U8,
    /// Signed 16-bit little-endian integer, full scale 32767.
    S16LE,
    /// 32-bit little-endian IEEE float, copied unscaled.
    F32LE,
    /// 64-bit little-endian IEEE float, copied unscaled.
    F64LE,
}

impl SampleFormat {
    /// Maps a sample width in bytes to its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for any width other than 1, 2, 4 or 8.
    pub fn from_width(width: usize) -> Result<Self> {
        match width {
            1 => Ok(SampleFormat::U8),
            2 => Ok(SampleFormat::S16LE),
            4 => Ok(SampleFormat::F32LE),
            8 => Ok(SampleFormat::F64LE),
            other => Err(Error::Format(format!("Unknown sample size: {other} byte(s)"))),
        }
    }

    /// Width of one encoded sample in bytes.
    pub fn width(self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16LE => 2,
            SampleFormat::F32LE => 4,
            SampleFormat::F64LE => 8,
        }
    }

    /// Integer magnitude representing full scale; `1.0` for float formats.
    pub fn divisor(self) -> f64 {
        match self {
            SampleFormat::U8 => 255.0,
            SampleFormat::S16LE => 32767.0,
            SampleFormat::F32LE | SampleFormat::F64LE => 1.0,
        }
    }

    /// Returns `true` if decoded values are scaled by [`Self::divisor`].
    pub fn is_scaled(self) -> bool {
        matches!(self, SampleFormat::U8 | SampleFormat::S16LE)
    }

    /// Returns `true` for the IEEE float encodings.
    pub fn is_float(self) -> bool {
        !self.is_scaled()
    }
}

impl std::fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SampleFormat::U8 => "u8",
            SampleFormat::S16LE => "s16le",
            SampleFormat::F32LE => "f32le",
            SampleFormat::F64LE => "f64le",
        };
        f.write_str(name)
    }
}
