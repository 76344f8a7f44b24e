// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Read → process → write driver.
//!
//! [`StreamingPipeline`] owns a [`SampleSource`], a [`SampleSink`] and an
//! [`Engine`] and moves through four states:
//!
//! ```text
//! Opening ──► Streaming ──► Flushing ──► Closed
//!                 │  ▲          │  ▲
//!                 └──┘          └──┘
//!          read/process/write  flush/write
//! ```
//!
//! Any error aborts the run. The engine, the source and the sink are released
//! exactly once, in that order, whether the run completed or failed.

use tracing::{debug, error, trace};

use crate::{
    BufferSet, ChannelBufferPool, Engine, Error, Result,
    wave::{SampleSink, SampleSource, StreamSpec},
};

/// Samples per channel moved in one streaming iteration.
pub const DEFAULT_CHUNK_CAPACITY: usize = 4096;

/// Where a [`StreamingPipeline`] is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Opening,
    Streaming,
    Flushing,
    Closed,
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PipelineState::Opening => "opening",
            PipelineState::Streaming => "streaming",
            PipelineState::Flushing => "flushing",
            PipelineState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Counters collected over a run. All sample counts are per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub read_calls: u64,
    pub process_calls: u64,
    pub flush_calls: u64,
    pub samples_read: u64,
    pub samples_processed: u64,
    pub samples_flushed: u64,
    pub samples_written: u64,
}

/// Called after every streaming or flushing iteration.
pub type ProgressCallback = Box<dyn FnMut(PipelineState, &PipelineStats)>;

/// Drives one source through one engine into one sink.
///
/// # Examples
///
/// ```no_run
/// use dynaudnorm::{
///     load_api, NormalizerInstance, NormalizerOptions, StreamingPipeline, WaveReader,
///     WaveWriter, pipeline::DEFAULT_CHUNK_CAPACITY,
/// };
///
/// # fn main() -> Result<(), dynaudnorm::Error> {
/// let api = load_api("libDynamicAudioNormalizerAPI.so")?;
/// let options = NormalizerOptions::default();
///
/// let pipeline = StreamingPipeline::open(
///     WaveReader::new("input.wav"),
///     WaveWriter::new("output.wav"),
///     DEFAULT_CHUNK_CAPACITY,
///     |channels, sample_rate| NormalizerInstance::new(api.clone(), channels, sample_rate, &options),
/// )?;
/// let stats = pipeline.run()?;
/// println!("wrote {} samples", stats.samples_written);
/// # Ok(())
/// # }
/// ```
pub struct StreamingPipeline<R: SampleSource, W: SampleSink, E: Engine> {
    state: PipelineState,
    spec: StreamSpec,
    reader: Option<R>,
    writer: Option<W>,
    engine: Option<E>,
    input: BufferSet,
    output: BufferSet,
    stats: PipelineStats,
    progress: Option<ProgressCallback>,
}

impl<R: SampleSource, W: SampleSink, E: Engine> StreamingPipeline<R, W, E> {
    /// Opens `reader`, then `writer` with the reader's parameters, then builds
    /// the engine with `make_engine(channels, sample_rate)`.
    ///
    /// Whatever was opened before a failure is released again before the error
    /// is returned.
    ///
    /// # Arguments
    ///
    /// * `chunk_capacity` - Samples per channel in each buffer set
    /// * `make_engine` - Constructs the engine for the reader's channel count and sample rate
    ///
    /// # Errors
    ///
    /// - [`Error::EmptyBuffer`] if `chunk_capacity` is zero
    /// - [`Error::InvalidChannelCount`] if the reader reports no channels
    /// - Any error from opening the streams or constructing the engine
    pub fn open<F>(mut reader: R, mut writer: W, chunk_capacity: usize, make_engine: F) -> Result<Self>
    where
        F: FnOnce(u32, u32) -> Result<E>,
    {
        if chunk_capacity == 0 {
            return Err(Error::EmptyBuffer);
        }
        let spec = reader.open()?;
        if spec.channels == 0 {
            close_reader(&mut reader);
            return Err(Error::InvalidChannelCount(0));
        }
        if let Err(err) = writer.open(spec) {
            close_reader(&mut reader);
            return Err(err);
        }

        let setup = ChannelBufferPool::new(spec.channels as usize, chunk_capacity).and_then(|mut pool| {
            let input = pool.acquire()?;
            let output = pool.acquire()?;
            let engine = make_engine(u32::from(spec.channels), spec.sample_rate)?;
            Ok((input, output, engine))
        });
        let (input, output, engine) = match setup {
            Ok(parts) => parts,
            Err(err) => {
                close_reader(&mut reader);
                if let Err(close_err) = writer.close() {
                    error!("Failed to close sink after aborted open: {:?}", close_err);
                }
                return Err(err);
            }
        };

        debug!(
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            format = %spec.format,
            chunk_capacity,
            "pipeline opened"
        );
        Ok(Self {
            state: PipelineState::Streaming,
            spec,
            reader: Some(reader),
            writer: Some(writer),
            engine: Some(engine),
            input,
            output,
            stats: PipelineStats::default(),
            progress: None,
        })
    }

    /// Installs a callback invoked after every iteration.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: FnMut(PipelineState, &PipelineStats) + 'static,
    {
        self.progress = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Parameters reported by the source when the pipeline was opened.
    pub fn spec(&self) -> StreamSpec {
        self.spec
    }

    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// The engine, until the pipeline is closed.
    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// Runs one iteration of the current state.
    ///
    /// # Returns
    ///
    /// The state after the iteration. Once [`PipelineState::Closed`] is
    /// reached further calls do nothing.
    ///
    /// # Errors
    ///
    /// Any error raised by the source, the engine or the sink. The pipeline is
    /// closed before the error is returned.
    pub fn step(&mut self) -> Result<PipelineState> {
        let outcome = match self.state {
            PipelineState::Streaming => self.stream_once(),
            PipelineState::Flushing => self.flush_once(),
            PipelineState::Opening | PipelineState::Closed => return Ok(self.state),
        };
        match outcome {
            Ok(()) => {
                if let Some(progress) = self.progress.as_mut() {
                    progress(self.state, &self.stats);
                }
                Ok(self.state)
            }
            Err(err) => {
                error!("pipeline aborted while {}: {}", self.state, err);
                if let Err(release_err) = self.release() {
                    error!("Failed to release pipeline resources: {:?}", release_err);
                }
                Err(err)
            }
        }
    }

    /// Steps until the pipeline is closed.
    ///
    /// # Returns
    ///
    /// The final [`PipelineStats`].
    pub fn run(mut self) -> Result<PipelineStats> {
        while self.step()? != PipelineState::Closed {}
        Ok(self.stats)
    }

    fn stream_once(&mut self) -> Result<()> {
        let (Some(reader), Some(writer), Some(engine)) =
            (self.reader.as_mut(), self.writer.as_mut(), self.engine.as_mut())
        else {
            return Err(Error::NotInitialized("Pipeline"));
        };

        let read = reader.read(&mut self.input)?;
        self.stats.read_calls += 1;
        if read == 0 {
            debug!(samples_read = self.stats.samples_read, "end of input, flushing");
            self.state = PipelineState::Flushing;
            return Ok(());
        }
        self.stats.samples_read += read as u64;

        let produced = engine.process(&self.input, &mut self.output, read)?;
        self.stats.process_calls += 1;
        if produced > read {
            return Err(Error::Engine(format!(
                "process produced {produced} samples from {read}"
            )));
        }
        self.stats.samples_processed += produced as u64;
        trace!(read, produced, "processed chunk");

        if produced > 0 {
            writer.write(&self.output, produced)?;
            self.stats.samples_written += produced as u64;
        }
        Ok(())
    }

    fn flush_once(&mut self) -> Result<()> {
        let (Some(writer), Some(engine)) = (self.writer.as_mut(), self.engine.as_mut()) else {
            return Err(Error::NotInitialized("Pipeline"));
        };

        let produced = engine.flush_buffer(&mut self.output)?;
        self.stats.flush_calls += 1;
        let capacity = self.output.usable_length()?;
        if produced > capacity {
            return Err(Error::Engine(format!(
                "flush produced {produced} samples into a buffer of {capacity}"
            )));
        }
        if produced == 0 {
            self.release()?;
            debug!(
                samples_written = self.stats.samples_written,
                "pipeline closed"
            );
            return Ok(());
        }
        self.stats.samples_flushed += produced as u64;
        writer.write(&self.output, produced)?;
        self.stats.samples_written += produced as u64;
        Ok(())
    }

    /// Releases the engine, then the source, then the sink. Each is released
    /// at most once; the first failure is returned after all were attempted.
    fn release(&mut self) -> Result<()> {
        self.state = PipelineState::Closed;
        let mut first_err = None;
        if let Some(engine) = self.engine.take()
            && let Err(err) = engine.destroy()
        {
            first_err.get_or_insert(err);
        }
        if let Some(mut reader) = self.reader.take()
            && let Err(err) = reader.close()
        {
            first_err.get_or_insert(err);
        }
        if let Some(mut writer) = self.writer.take()
            && let Err(err) = writer.close()
        {
            first_err.get_or_insert(err);
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl<R: SampleSource, W: SampleSink, E: Engine> Drop for StreamingPipeline<R, W, E> {
    /// Releases whatever a run that did not reach [`PipelineState::Closed`] left open.
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            error!("Failed to release pipeline resources: {:?}", err);
        }
    }
}

fn close_reader<R: SampleSource>(reader: &mut R) {
    if let Err(err) = reader.close() {
        error!("Failed to close source after aborted open: {:?}", err);
    }
}
