// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! # dynaudnorm - Dynamic Audio Normalizer bindings
//!
//! Safe, idiomatic Rust bindings for the Dynamic Audio Normalizer C library,
//! together with the sample codec and streaming driver needed to normalize
//! uncompressed WAV files block by block.
//!
//! ## Overview
//!
//! The normalizer engine consumes and produces non-interleaved `f64` samples,
//! while audio files store interleaved fixed-width integers or floats. This
//! crate wraps the raw C FFI ([`dynaudnorm_sys`]) with safe abstractions and
//! RAII resource management, and bridges the two sample layouts.
//!
//! ### Key Concepts
//!
//! - **Sample format**: One of the fixed-width encodings in [`SampleFormat`], each with a full-scale divisor
//! - **Buffer set**: One fixed-capacity `f64` buffer per channel ([`BufferSet`]), handed out by [`ChannelBufferPool`]
//! - **Codec**: Conversion between interleaved bytes and buffer sets ([`codec`])
//! - **Engine**: Anything implementing [`Engine`]; [`NormalizerInstance`] is the native one
//! - **Pipeline**: The read → process → write loop with a final flush ([`StreamingPipeline`])
//!
//! ## Architecture
//!
//! ```text
//! WaveReader ──► codec::decode ──► BufferSet ──► Engine::process ──► BufferSet ──► codec::encode ──► WaveWriter
//!                                                     │
//!                                              Engine::flush_buffer (after end of input)
//! ```
//!
//! ## Examples
//!
//! ### Normalizing a WAV file
//!
//! ```no_run
//! use dynaudnorm::{
//!     config::get_library_path, load_api, pipeline::DEFAULT_CHUNK_CAPACITY, NormalizerInstance,
//!     NormalizerOptions, StreamingPipeline, WaveReader, WaveWriter,
//! };
//!
//! # fn main() -> Result<(), dynaudnorm::Error> {
//! // Load the normalizer dynamic library
//! let api = load_api(get_library_path())?;
//! println!("engine version {}", api.version_info());
//!
//! let options = NormalizerOptions {
//!     filter_size: 41,
//!     ..Default::default()
//! };
//! let stats = StreamingPipeline::open(
//!     WaveReader::new("input.wav"),
//!     WaveWriter::new("output.wav"),
//!     DEFAULT_CHUNK_CAPACITY,
//!     |channels, sample_rate| NormalizerInstance::new(api.clone(), channels, sample_rate, &options),
//! )?
//! .run()?;
//! println!("{} samples written", stats.samples_written);
//! # Ok(())
//! # }
//! ```
//!
//! ### Decoding raw samples
//!
//! ```
//! use dynaudnorm::{codec, ChannelBufferPool, SampleFormat};
//!
//! # fn main() -> Result<(), dynaudnorm::Error> {
//! let mut buffers = ChannelBufferPool::allocate(2, 16)?;
//! let bytes = [0x00, 0x40, 0x00, 0xC0]; // one 16-bit stereo frame
//! let frames = codec::decode(&bytes, &mut buffers, 2, SampleFormat::S16LE)?;
//! assert_eq!(frames, 1);
//! assert!(buffers.channel(0)?[0] > 0.0);
//! assert!(buffers.channel(1)?[0] < 0.0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Engine diagnostics are forwarded to `tracing` under the `dynaudnorm::engine`
//! target unless a callback is installed with [`set_log_function`]. The callback
//! must be installed before the first [`NormalizerInstance`] is created.
//!
//! ## Thread Safety
//!
//! - [`NormalizerApi`] is `Send + Sync` and can be shared across threads
//! - Calls into one loaded library are serialized; an instance is never used by
//!   two threads at once and cannot be destroyed while a call on it is running
//! - Engine instances, buffer sets and WAV contexts are single-owner and `Send`
//! - A [`StreamingPipeline`] runs synchronously on the calling thread

mod api;
mod buffer;
mod engine;
mod error;
mod format;
mod instance;
mod logging;

pub mod codec;
pub mod config;
pub mod pipeline;
pub mod registry;
pub mod wave;

pub use api::{
    BuildInfo, EngineConfiguration, NormalizerApi, NormalizerApiHandle, VersionInfo, load_api,
};
pub use buffer::{BufferSet, ChannelBuffer, ChannelBufferPool};
pub use config::NormalizerOptions;
pub use dynaudnorm_sys::CORE_VERSION;
pub use engine::Engine;
pub use error::{Error, Result};
pub use format::SampleFormat;
pub use instance::NormalizerInstance;
pub use logging::{LogCallback, LogLevel, dispatch as dispatch_log, set_log_function};
pub use pipeline::{PipelineState, PipelineStats, StreamingPipeline};
pub use registry::EngineHandle;
pub use wave::{SampleSink, SampleSource, StreamSpec, reader::WaveReader, writer::WaveWriter};
