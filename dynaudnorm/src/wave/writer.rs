// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! WAV writer implementation.

use std::{
    fs::File,
    io::BufWriter,
    path::{Path, PathBuf},
};

use tracing::{debug, error, warn};

use crate::{
    BufferSet, Error, Result, SampleFormat, codec,
    wave::{SampleSink, StreamSpec},
};

struct OpenWriter {
    wav: hound::WavWriter<BufWriter<File>>,
    spec: StreamSpec,
    scratch: Vec<u8>,
}

/// Encodes per-channel buffers and writes them to a WAV file.
///
/// The header is finalised by [`WaveWriter::close`]; a writer dropped while
/// open is closed on a best-effort basis.
pub struct WaveWriter {
    path: PathBuf,
    state: Option<OpenWriter>,
}

impl WaveWriter {
    /// Creates an unopened writer for `path`. The file is created by [`Self::open`].
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Creates (or truncates) the file and writes a header for `spec`.
    ///
    /// # Errors
    ///
    /// - [`Error::Other`] if the writer is already open
    /// - [`Error::InvalidChannelCount`] if `spec.channels` is zero
    /// - [`Error::Format`] for 64-bit float, which the WAV container library cannot write
    /// - [`Error::Io`] / [`Error::Wav`] if the file cannot be created
    pub fn open(&mut self, spec: StreamSpec) -> Result<()> {
        if self.state.is_some() {
            return Err(Error::Other(format!(
                "Wave writer for \"{}\" is already open",
                self.path.display()
            )));
        }
        if spec.channels == 0 {
            return Err(Error::InvalidChannelCount(0));
        }
        if spec.format == SampleFormat::F64LE {
            return Err(Error::Format(
                "64-bit float samples cannot be written to a WAV container".to_string(),
            ));
        }
        let header = hound::WavSpec {
            channels: spec.channels,
            sample_rate: spec.sample_rate,
            bits_per_sample: (spec.format.width() * 8) as u16,
            sample_format: if spec.format.is_float() {
                hound::SampleFormat::Float
            } else {
                hound::SampleFormat::Int
            },
        };
        let wav = hound::WavWriter::create(&self.path, header)?;
        debug!(
            path = %self.path.display(),
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            format = %spec.format,
            "opened wave writer"
        );
        self.state = Some(OpenWriter {
            wav,
            spec,
            scratch: Vec::new(),
        });
        Ok(())
    }

    fn opened(&self) -> Result<&OpenWriter> {
        self.state.as_ref().ok_or(Error::NotInitialized("Wave writer"))
    }

    /// Stream parameters, available while open.
    pub fn spec(&self) -> Result<StreamSpec> {
        Ok(self.opened()?.spec)
    }

    pub fn channels(&self) -> Result<u16> {
        Ok(self.opened()?.spec.channels)
    }

    pub fn sample_rate(&self) -> Result<u32> {
        Ok(self.opened()?.spec.sample_rate)
    }

    /// Width of one sample in bytes.
    pub fn sample_width(&self) -> Result<usize> {
        Ok(self.opened()?.spec.format.width())
    }

    pub fn format(&self) -> Result<SampleFormat> {
        Ok(self.opened()?.spec.format)
    }

    /// Writes the first `length` samples of each channel.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the writer is not open
    /// - [`Error::MissingChannels`] if `buffers` has fewer buffers than the stream has channels
    /// - [`Error::InvalidLength`] if `length` is zero or exceeds the usable buffer length
    pub fn write(&mut self, buffers: &BufferSet, length: usize) -> Result<()> {
        let open = self
            .state
            .as_mut()
            .ok_or(Error::NotInitialized("Wave writer"))?;
        let format = open.spec.format;
        codec::encode_into(
            buffers,
            open.spec.channels as usize,
            format,
            length,
            &mut open.scratch,
        )?;
        for unit in open.scratch.chunks_exact(format.width()) {
            match format {
                // hound stores 8-bit samples offset by 128; undo that so the
                // encoded byte lands in the file unchanged.
                SampleFormat::U8 => open.wav.write_sample((i16::from(unit[0]) - 128) as i8)?,
                SampleFormat::S16LE => open.wav.write_sample(i16::from_le_bytes([unit[0], unit[1]]))?,
                SampleFormat::F32LE => open
                    .wav
                    .write_sample(f32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]))?,
                SampleFormat::F64LE => {
                    return Err(Error::Format(
                        "64-bit float samples cannot be written to a WAV container".to_string(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Finalises the header and closes the file.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the writer is not open
    /// - [`Error::Wav`] if the header cannot be finalised
    pub fn close(&mut self) -> Result<()> {
        let open = self
            .state
            .take()
            .ok_or(Error::NotInitialized("Wave writer"))?;
        open.wav.finalize()?;
        Ok(())
    }
}

impl SampleSink for WaveWriter {
    fn open(&mut self, spec: StreamSpec) -> Result<()> {
        WaveWriter::open(self, spec)
    }

    fn write(&mut self, buffers: &BufferSet, length: usize) -> Result<()> {
        WaveWriter::write(self, buffers, length)
    }

    fn close(&mut self) -> Result<()> {
        WaveWriter::close(self)
    }
}

impl Drop for WaveWriter {
    /// Finalises a writer that was left open.
    fn drop(&mut self) {
        if self.state.is_some() {
            if cfg!(debug_assertions) {
                warn!(
                    "resource leak: wave writer for \"{}\" was not closed",
                    self.path.display()
                );
            }
            if let Err(err) = self.close() {
                error!("Failed to close wave writer: {:?}", err);
            }
        }
    }
}
