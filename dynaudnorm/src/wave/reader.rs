// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! WAV reader implementation.

use std::{
    fs::File,
    io::{BufReader, ErrorKind, Read, Take},
    path::{Path, PathBuf},
};

use tracing::{debug, error, warn};

use crate::{
    BufferSet, Error, Result, SampleFormat, codec,
    wave::{SampleSource, StreamSpec},
};

struct OpenReader {
    data: Take<BufReader<File>>,
    spec: StreamSpec,
    scratch: Vec<u8>,
}

/// Reads interleaved samples from a WAV file into per-channel buffers.
///
/// # Examples
///
/// ```no_run
/// use dynaudnorm::{ChannelBufferPool, WaveReader};
///
/// # fn main() -> Result<(), dynaudnorm::Error> {
/// let mut reader = WaveReader::new("input.wav");
/// let spec = reader.open()?;
/// let mut buffers = ChannelBufferPool::allocate(spec.channels as usize, 4096)?;
/// while reader.read(&mut buffers)? > 0 {
///     // ...
/// }
/// reader.close()?;
/// # Ok(())
/// # }
/// ```
pub struct WaveReader {
    path: PathBuf,
    state: Option<OpenReader>,
}

impl WaveReader {
    /// Creates an unopened reader for `path`. Nothing is touched on disk yet.
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

    /// Opens the file, parses its header and positions at the first sample.
    ///
    /// # Errors
    ///
    /// - [`Error::Other`] if the reader is already open
    /// - [`Error::Io`] / [`Error::Wav`] if the file cannot be opened or parsed
    /// - [`Error::Format`] if the sample encoding is not supported by the codec
    pub fn open(&mut self) -> Result<StreamSpec> {
        if self.state.is_some() {
            return Err(Error::Other(format!(
                "Wave reader for \"{}\" is already open",
                self.path.display()
            )));
        }
        let wav = hound::WavReader::new(BufReader::new(File::open(&self.path)?))?;
        let header = wav.spec();
        let format = format_from_header(&header)?;
        if header.channels == 0 {
            return Err(Error::InvalidChannelCount(0));
        }
        let spec = StreamSpec {
            channels: header.channels,
            format,
            sample_rate: header.sample_rate,
        };
        let data_len = u64::from(wav.len()) * format.width() as u64;
        debug!(
            path = %self.path.display(),
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            %format,
            data_len,
            "opened wave reader"
        );
        self.state = Some(OpenReader {
            data: wav.into_inner().take(data_len),
            spec,
            scratch: Vec::new(),
        });
        Ok(spec)
    }

    fn opened(&self) -> Result<&OpenReader> {
        self.state.as_ref().ok_or(Error::NotInitialized("Wave reader"))
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

    /// Reads up to the usable length of `buffers` samples per channel.
    ///
    /// A truncated final frame is dropped.
    ///
    /// # Returns
    ///
    /// Samples read per channel; `0` at end of stream.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the reader is not open
    /// - [`Error::MissingChannels`] if `buffers` has fewer buffers than the stream has channels
    /// - [`Error::EmptyBuffer`] if `buffers` has zero usable length
    pub fn read(&mut self, buffers: &mut BufferSet) -> Result<usize> {
        let open = self
            .state
            .as_mut()
            .ok_or(Error::NotInitialized("Wave reader"))?;
        let channels = open.spec.channels as usize;
        let format = open.spec.format;
        buffers.ensure_channels(channels)?;
        let frames = buffers.usable_length()?;
        let frame_bytes = channels * format.width();

        open.scratch.resize(frames * frame_bytes, 0);
        let filled = read_full(&mut open.data, &mut open.scratch)?;
        let whole = filled - filled % frame_bytes;
        if whole != filled {
            warn!(
                "dropping {} trailing byte(s) of an incomplete frame",
                filled - whole
            );
        }
        if whole == 0 {
            return Ok(0);
        }
        codec::decode(&open.scratch[..whole], buffers, channels, format)
    }

    /// Closes the file. The reader can be opened again afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the reader is not open.
    pub fn close(&mut self) -> Result<()> {
        self.state
            .take()
            .map(|_| ())
            .ok_or(Error::NotInitialized("Wave reader"))
    }
}

impl SampleSource for WaveReader {
    fn open(&mut self) -> Result<StreamSpec> {
        WaveReader::open(self)
    }

    fn read(&mut self, buffers: &mut BufferSet) -> Result<usize> {
        WaveReader::read(self, buffers)
    }

    fn close(&mut self) -> Result<()> {
        WaveReader::close(self)
    }
}

impl Drop for WaveReader {
    /// Closes a reader that was left open.
    fn drop(&mut self) {
        if self.state.is_some() {
            if cfg!(debug_assertions) {
                warn!(
                    "resource leak: wave reader for \"{}\" was not closed",
                    self.path.display()
                );
            }
            if let Err(err) = self.close() {
                error!("Failed to close wave reader: {:?}", err);
            }
        }
    }
}

/// Maps a WAV header to the codec format, rejecting encodings the codec lacks.
pub(crate) fn format_from_header(header: &hound::WavSpec) -> Result<SampleFormat> {
    if header.bits_per_sample % 8 != 0 {
        return Err(Error::Format(format!(
            "{}-bit samples are not byte aligned",
            header.bits_per_sample
        )));
    }
    let format = SampleFormat::from_width(usize::from(header.bits_per_sample / 8))?;
    let float_header = header.sample_format == hound::SampleFormat::Float;
    if float_header != format.is_float() {
        return Err(Error::Format(format!(
            "{}-bit {} samples are not supported",
            header.bits_per_sample,
            if float_header { "float" } else { "integer" }
        )));
    }
    Ok(format)
}

/// Reads until `buf` is full or the source is exhausted.
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(filled)
}
