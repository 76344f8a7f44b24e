// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for codec, buffer, stream and engine operations.
//!
//! Every failure is reported synchronously to the immediate caller. Nothing in
//! this crate retries on its own, and a rejected codec or buffer call leaves its
//! output untouched.

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when using the normalizer bindings.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An operation was attempted on a handle or stream context that is not open
    /// (never opened, already closed, or already destroyed).
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),

    /// Unsupported sample width or a byte stream that does not divide into whole frames.
    #[error("Format error: {0}")]
    Format(String),

    /// A target buffer cannot hold the number of samples implied by the input.
    #[error("Buffer too small: {required} sample(s) required, capacity is {capacity}")]
    BufferTooSmall { required: usize, capacity: usize },

    /// A buffer set whose usable length is zero was used as a processing target.
    #[error("Buffer length is zero")]
    EmptyBuffer,

    /// A sample count of zero, or larger than the usable buffer length.
    #[error("Invalid length {length}, usable buffer length is {usable}")]
    InvalidLength { length: usize, usable: usize },

    /// Fewer channel buffers were supplied than the stream has channels.
    #[error("Number of buffers is insufficient: {required} required, {available} available")]
    MissingChannels { required: usize, available: usize },

    /// A channel count of zero or beyond what the engine ABI can represent.
    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),

    /// A tuning option is outside its accepted range.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// The engine reported a failure or violated its output contract.
    #[error("Engine error: {0}")]
    Engine(String),

    /// A generic error for failures not covered by a more specific variant.
    #[error("Other error: {0}")]
    Other(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The WAV container could not be parsed or written.
    #[error("WAV container: {0}")]
    Wav(#[from] hound::Error),

    #[error("Invalid configuration file: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to convert a Rust string to a C-compatible null-terminated string.
    #[error("Null string: {0}")]
    NulString(#[from] std::ffi::NulError),

    /// Failed to load or interact with the engine dynamic library.
    #[error("Loading library: {0}")]
    LibLoading(#[from] libloading::Error),
}

impl Error {
    /// Returns `true` for errors caused by how the program was invoked or
    /// configured, as opposed to failures while reading, processing or writing
    /// audio.
    ///
    /// Front ends use this to pick a distinct exit status for usage errors.
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Error::InvalidOption(_) | Error::Json(_))
    }

    /// Converts an engine status code (`1` success, `0` failure) into a [`Result`].
    pub(crate) fn from_status(status: std::ffi::c_int, operation: &str) -> Result<()> {
        if status != 0 {
            Ok(())
        } else {
            Err(Error::Engine(format!("{operation} failed")))
        }
    }
}
