// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! The engine seam driven by the streaming pipeline.

use crate::{BufferSet, EngineConfiguration, Result};

/// A block-based dynamic normalizer.
///
/// The pipeline only talks to the engine through this trait, so the native
/// engine ([`crate::NormalizerInstance`]) can be swapped for an in-process
/// implementation.
///
/// # Contract
///
/// - `process` and `flush_buffer` never report more samples than they were
///   given room for
/// - after the input ends, repeated `flush_buffer` calls eventually return `0`
///   (the engine's internal delay is bounded)
/// - `destroy` is called exactly once; it consumes the engine
pub trait Engine {
    /// Parameters the engine is running with.
    fn configuration(&self) -> Result<EngineConfiguration>;

    /// Samples of latency between input and output.
    fn internal_delay(&self) -> Result<u64>;

    /// Pushes `count` samples per channel from `input`, writing whatever is ready into
    /// `output`. Returns the number of samples produced (`<= count`, may be `0`).
    fn process(&mut self, input: &BufferSet, output: &mut BufferSet, count: usize) -> Result<usize>;

    /// Like [`Engine::process`], reading from and writing to the same buffers.
    fn process_inplace(&mut self, buffers: &mut BufferSet, count: usize) -> Result<usize>;

    /// Emits buffered samples after the input ended. Returns `0` once drained.
    fn flush_buffer(&mut self, output: &mut BufferSet) -> Result<usize>;

    /// Drops all buffered samples and analysis state.
    fn reset(&mut self) -> Result<()>;

    /// Releases the engine.
    fn destroy(self) -> Result<()>
    where
        Self: Sized;
}
