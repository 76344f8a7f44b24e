// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Uncompressed WAV stream contexts.
//!
//! [`WaveReader`] and [`WaveWriter`] bind a WAV file to its channel count,
//! sample format and sample rate. Both follow the same lifecycle:
//!
//! ```text
//! new() ──► open() ──► read()/write() ... ──► close()
//! (unopened)  (opened)                        (closed)
//! ```
//!
//! Outside the opened window every accessor and I/O call fails with
//! [`crate::Error::NotInitialized`]. Header handling is delegated to `hound`;
//! sample data goes through [`crate::codec`].
//!
//! # Key Types
//!
//! - [`SampleSource`] / [`SampleSink`]: what the pipeline reads from and writes to
//! - [`StreamSpec`]: the fixed parameters of an opened stream

pub mod reader;
pub mod writer;

use crate::{BufferSet, Result, SampleFormat};

/// Parameters of an opened stream. Fixed for the stream's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSpec {
    pub channels: u16,
    pub format: SampleFormat,
    pub sample_rate: u32,
}

/// A stream of interleaved samples decoded into per-channel buffers.
pub trait SampleSource {
    /// Opens the stream and reports its parameters.
    fn open(&mut self) -> Result<StreamSpec>;

    /// Fills `buffers` with up to their usable length of samples per channel.
    /// Returns the number read; `0` marks the end of the stream.
    fn read(&mut self, buffers: &mut BufferSet) -> Result<usize>;

    /// Releases the stream.
    fn close(&mut self) -> Result<()>;
}

/// A destination for per-channel buffers, encoded to interleaved samples.
pub trait SampleSink {
    /// Opens the stream with the given parameters.
    fn open(&mut self, spec: StreamSpec) -> Result<()>;

    /// Writes the first `length` samples of each channel.
    fn write(&mut self, buffers: &BufferSet, length: usize) -> Result<()>;

    /// Flushes and releases the stream.
    fn close(&mut self) -> Result<()>;
}
