// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Helpers shared by the integration tests.
//!
//! None of the tests need the native engine library: [`DelayEngine`] stands in
//! for it behind the `Engine` trait, [`native_engine`] implements its C ABI in
//! process, and [`ScriptedSource`] / [`RecordingSink`] stand in for WAV files
//! where the file format itself is not under test.

#![allow(dead_code)]

pub mod native_engine;

use std::{cell::RefCell, collections::VecDeque, path::PathBuf, rc::Rc};

use dynaudnorm::{
    BufferSet, Engine, EngineConfiguration, Error, Result, SampleFormat, SampleSink, SampleSource,
    StreamSpec,
};

/// Ensures logging is initialized only once across all tests.
static LOG_ONCE: std::sync::Once = std::sync::Once::new();

/// Initializes logging (respects the RUST_LOG environment variable).
pub fn init_logging() {
    LOG_ONCE.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::builder()
                    .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .init();
    });
}

/// RAII guard for per-test scratch directories.
///
/// Creates a unique directory under the system temp dir and removes it on drop.
pub struct TestDirGuard {
    dir: PathBuf,
}

impl TestDirGuard {
    /// Creates a new scratch directory with a unique UUID suffix.
    pub fn new(test: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "dynaudnorm_rust_tests_{}_{}",
            test,
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(dir.as_path()).unwrap_or_else(|_| {
            panic!("Failed to create test directory \"{}\".", dir.display())
        });
        Self { dir }
    }

    pub fn path(&self, file: &str) -> PathBuf {
        self.dir.join(file)
    }
}

impl Drop for TestDirGuard {
    /// Removes the scratch directory on drop.
    fn drop(&mut self) {
        std::fs::remove_dir_all(self.dir.as_path()).unwrap_or_else(|_| {
            panic!("Failed to remove test directory \"{}\".", self.dir.display())
        });
    }
}

/// Everything the fakes below observed, shared with the test body.
#[derive(Debug, Default)]
pub struct Calls {
    pub source_opens: usize,
    pub source_closes: usize,
    pub sink_opens: usize,
    pub sink_closes: usize,
    pub reads: usize,
    pub writes: usize,
    pub process: usize,
    pub flush: usize,
    pub destroys: usize,
    /// Release order as observed across engine, source and sink.
    pub released: Vec<&'static str>,
    /// Samples received by the sink, per channel.
    pub written: Vec<Vec<f64>>,
}

pub type CallLog = Rc<RefCell<Calls>>;

pub fn call_log() -> CallLog {
    Rc::new(RefCell::new(Calls::default()))
}

/// Value of sample `index` on `channel` produced by [`ScriptedSource`].
pub fn ramp(channel: usize, index: usize) -> f64 {
    channel as f64 + index as f64 / 1_000_000.0
}

/// A source returning a fixed sequence of chunk sizes, then end of stream.
pub struct ScriptedSource {
    pub spec: StreamSpec,
    chunks: VecDeque<usize>,
    position: usize,
    fail_on_read: Option<usize>,
    calls: CallLog,
}

impl ScriptedSource {
    pub fn new(channels: u16, chunks: &[usize], calls: &CallLog) -> Self {
        Self {
            spec: StreamSpec {
                channels,
                format: SampleFormat::S16LE,
                sample_rate: 44100,
            },
            chunks: chunks.iter().copied().collect(),
            position: 0,
            fail_on_read: None,
            calls: calls.clone(),
        }
    }

    /// Makes the `n`-th read call (1-based) fail with an I/O error.
    pub fn failing_on_read(mut self, n: usize) -> Self {
        self.fail_on_read = Some(n);
        self
    }
}

impl SampleSource for ScriptedSource {
    fn open(&mut self) -> Result<StreamSpec> {
        self.calls.borrow_mut().source_opens += 1;
        Ok(self.spec)
    }

    fn read(&mut self, buffers: &mut BufferSet) -> Result<usize> {
        let reads = {
            let mut calls = self.calls.borrow_mut();
            calls.reads += 1;
            calls.reads
        };
        if self.fail_on_read == Some(reads) {
            return Err(Error::Io(std::io::Error::other("scripted read failure")));
        }
        let Some(count) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let count = count.min(buffers.usable_length()?);
        for channel in 0..self.spec.channels as usize {
            let samples = buffers.channel_mut(channel)?;
            for (offset, slot) in samples[..count].iter_mut().enumerate() {
                *slot = ramp(channel, self.position + offset);
            }
        }
        self.position += count;
        Ok(count)
    }

    fn close(&mut self) -> Result<()> {
        let mut calls = self.calls.borrow_mut();
        calls.source_closes += 1;
        calls.released.push("source");
        Ok(())
    }
}

/// A sink that keeps every written sample in the shared [`Calls`].
pub struct RecordingSink {
    channels: usize,
    fail_on_write: Option<usize>,
    calls: CallLog,
}

impl RecordingSink {
    pub fn new(calls: &CallLog) -> Self {
        Self {
            channels: 0,
            fail_on_write: None,
            calls: calls.clone(),
        }
    }

    /// Makes the `n`-th write call (1-based) fail.
    pub fn failing_on_write(mut self, n: usize) -> Self {
        self.fail_on_write = Some(n);
        self
    }
}

impl SampleSink for RecordingSink {
    fn open(&mut self, spec: StreamSpec) -> Result<()> {
        self.channels = spec.channels as usize;
        let mut calls = self.calls.borrow_mut();
        calls.sink_opens += 1;
        calls.written = vec![Vec::new(); self.channels];
        Ok(())
    }

    fn write(&mut self, buffers: &BufferSet, length: usize) -> Result<()> {
        let mut calls = self.calls.borrow_mut();
        calls.writes += 1;
        if self.fail_on_write == Some(calls.writes) {
            return Err(Error::Other("scripted write failure".to_string()));
        }
        for channel in 0..self.channels {
            calls.written[channel].extend_from_slice(&buffers.channel(channel)?[..length]);
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let mut calls = self.calls.borrow_mut();
        calls.sink_closes += 1;
        calls.released.push("sink");
        Ok(())
    }
}

/// A pure delay line: output is the input shifted by `delay` samples.
///
/// Flushing drains whatever is still held back, so every sample pushed in
/// eventually comes out unchanged.
pub struct DelayEngine {
    channels: usize,
    sample_rate: u32,
    delay: usize,
    queues: Vec<VecDeque<f64>>,
    overproduce: bool,
    calls: CallLog,
}

impl DelayEngine {
    pub fn new(channels: u32, sample_rate: u32, delay: usize, calls: &CallLog) -> Self {
        Self {
            channels: channels as usize,
            sample_rate,
            delay,
            queues: vec![VecDeque::new(); channels as usize],
            overproduce: false,
            calls: calls.clone(),
        }
    }

    /// Makes `process` report one sample more than it was given.
    pub fn overproducing(mut self) -> Self {
        self.overproduce = true;
        self
    }

    fn drain_into(&mut self, output: &mut BufferSet, count: usize) -> Result<usize> {
        for (channel, queue) in self.queues.iter_mut().enumerate() {
            let target = output.channel_mut(channel)?;
            for (slot, sample) in target.iter_mut().zip(queue.drain(..count)) {
                *slot = sample;
            }
        }
        Ok(count)
    }
}

impl Engine for DelayEngine {
    fn configuration(&self) -> Result<EngineConfiguration> {
        Ok(EngineConfiguration {
            channels: self.channels as u32,
            sample_rate: self.sample_rate,
            frame_len: 0,
            filter_size: 0,
        })
    }

    fn internal_delay(&self) -> Result<u64> {
        Ok(self.delay as u64)
    }

    fn process(&mut self, input: &BufferSet, output: &mut BufferSet, count: usize) -> Result<usize> {
        self.calls.borrow_mut().process += 1;
        for (channel, queue) in self.queues.iter_mut().enumerate() {
            queue.extend(&input.channel(channel)?[..count]);
        }
        let ready = self.queues[0].len().saturating_sub(self.delay).min(count);
        let produced = self.drain_into(output, ready)?;
        Ok(if self.overproduce { count + 1 } else { produced })
    }

    fn process_inplace(&mut self, buffers: &mut BufferSet, count: usize) -> Result<usize> {
        let input = buffers.clone();
        self.process(&input, buffers, count)
    }

    fn flush_buffer(&mut self, output: &mut BufferSet) -> Result<usize> {
        self.calls.borrow_mut().flush += 1;
        let ready = self.queues[0].len().min(output.usable_length()?);
        self.drain_into(output, ready)
    }

    fn reset(&mut self) -> Result<()> {
        self.queues.iter_mut().for_each(VecDeque::clear);
        Ok(())
    }

    fn destroy(self) -> Result<()> {
        let mut calls = self.calls.borrow_mut();
        calls.destroys += 1;
        calls.released.push("engine");
        Ok(())
    }
}
