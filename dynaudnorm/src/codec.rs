// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Conversion between interleaved fixed-width byte streams and per-channel `f64` buffers.
//!
//! ## Layout
//!
//! An interleaved stream stores samples channel-fastest:
//!
//! ```text
//! | ch0@t0 | ch1@t0 | ... | chN@t0 | ch0@t1 | ch1@t1 | ...
//! ```
//!
//! Unit `i` of the stream belongs to channel `i % channels` at time index
//! `i / channels`.
//!
//! ## Scaling
//!
//! Integer formats are normalised by the format's full-scale divisor on decode
//! and multiplied back (rounded to nearest, saturated to the integer range) on
//! encode. Float formats are copied without scaling.
//!
//! Both directions validate every argument before touching the output, so a
//! rejected call never leaves partially written samples behind.

use tracing::trace;

use crate::{BufferSet, Error, Result, SampleFormat};

/// Decodes an interleaved byte stream into per-channel buffers.
///
/// # Arguments
///
/// * `bytes` - Interleaved samples, a whole number of frames long
/// * `buffers` - Target set with at least `channels` buffers
/// * `channels` - Number of interleaved channels
/// * `format` - Encoding of each sample unit
///
/// # Returns
///
/// The number of per-channel samples written (`bytes.len() / (channels * width)`).
///
/// # Errors
///
/// - [`Error::InvalidChannelCount`] if `channels` is zero
/// - [`Error::Format`] if `bytes.len()` is not a multiple of `channels * width`
/// - [`Error::MissingChannels`] if `buffers` has fewer than `channels` buffers
/// - [`Error::BufferTooSmall`] if a target buffer cannot hold the decoded samples
///
/// # Examples
///
/// ```
/// use dynaudnorm::{codec, ChannelBufferPool, SampleFormat};
///
/// # fn main() -> Result<(), dynaudnorm::Error> {
/// let mut buffers = ChannelBufferPool::allocate(2, 4)?;
/// let bytes = [0xFF, 0x7F, 0x01, 0x80]; // L = 32767, R = -32767
/// let count = codec::decode(&bytes, &mut buffers, 2, SampleFormat::S16LE)?;
/// assert_eq!(count, 1);
/// assert_eq!(buffers.channel(0)?[0], 1.0);
/// assert_eq!(buffers.channel(1)?[0], -1.0);
/// # Ok(())
/// # }
/// ```
pub fn decode(
    bytes: &[u8],
    buffers: &mut BufferSet,
    channels: usize,
    format: SampleFormat,
) -> Result<usize> {
    if channels == 0 {
        return Err(Error::InvalidChannelCount(channels));
    }
    let frame_bytes = channels * format.width();
    if bytes.len() % frame_bytes != 0 {
        return Err(Error::Format(format!(
            "byte length {} is not a multiple of the frame size {} ({} channel(s) x {} byte(s))",
            bytes.len(),
            frame_bytes,
            channels,
            format.width()
        )));
    }
    buffers.ensure_channels(channels)?;
    let frames = bytes.len() / frame_bytes;
    let capacity = buffers.min_capacity();
    if frames > capacity {
        return Err(Error::BufferTooSmall {
            required: frames,
            capacity,
        });
    }

    for channel in 0..channels {
        let target = buffers.channel_mut(channel)?;
        let units = bytes
            .chunks_exact(format.width())
            .skip(channel)
            .step_by(channels);
        for (slot, unit) in target.iter_mut().zip(units) {
            *slot = decode_unit(unit, format);
        }
    }

    trace!(frames, channels, %format, "decoded interleaved block");
    Ok(frames)
}

/// Encodes the first `length` samples of each channel into an interleaved byte stream.
///
/// # Errors
///
/// - [`Error::InvalidChannelCount`] if `channels` is zero
/// - [`Error::MissingChannels`] if `buffers` has fewer than `channels` buffers
/// - [`Error::InvalidLength`] if `length` is zero or exceeds the usable length of `buffers`
pub fn encode(
    buffers: &BufferSet,
    channels: usize,
    format: SampleFormat,
    length: usize,
) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    encode_into(buffers, channels, format, length, &mut bytes)?;
    Ok(bytes)
}

/// Same as [`encode`], but writes into `bytes` (cleared first) so its allocation
/// can be reused across blocks.
pub fn encode_into(
    buffers: &BufferSet,
    channels: usize,
    format: SampleFormat,
    length: usize,
    bytes: &mut Vec<u8>,
) -> Result<()> {
    if channels == 0 {
        return Err(Error::InvalidChannelCount(channels));
    }
    buffers.ensure_channels(channels)?;
    let usable = buffers.min_capacity();
    if length == 0 || length > usable {
        return Err(Error::InvalidLength { length, usable });
    }

    let sources = (0..channels)
        .map(|channel| buffers.channel(channel))
        .collect::<Result<Vec<_>>>()?;

    bytes.clear();
    bytes.reserve(length * channels * format.width());
    for index in 0..length {
        for source in &sources {
            encode_unit(source[index], format, bytes);
        }
    }

    trace!(frames = length, channels, %format, "encoded interleaved block");
    Ok(())
}

fn decode_unit(unit: &[u8], format: SampleFormat) -> f64 {
    match format {
        SampleFormat::U8 => f64::from(unit[0]) / format.divisor(),
        SampleFormat::S16LE => f64::from(i16::from_le_bytes([unit[0], unit[1]])) / format.divisor(),
        SampleFormat::F32LE => f64::from(f32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]])),
        SampleFormat::F64LE => f64::from_le_bytes([
            unit[0], unit[1], unit[2], unit[3], unit[4], unit[5], unit[6], unit[7],
        ]),
    }
}

fn encode_unit(value: f64, format: SampleFormat, bytes: &mut Vec<u8>) {
    match format {
        SampleFormat::U8 => {
            let scaled = quantize(value, format.divisor(), f64::from(u8::MIN), f64::from(u8::MAX));
            bytes.push(scaled as u8);
        }
        SampleFormat::S16LE => {
            let scaled = quantize(value, format.divisor(), f64::from(i16::MIN), f64::from(i16::MAX));
            bytes.extend_from_slice(&(scaled as i16).to_le_bytes());
        }
        SampleFormat::F32LE => bytes.extend_from_slice(&(value as f32).to_le_bytes()),
        SampleFormat::F64LE => bytes.extend_from_slice(&value.to_le_bytes()),
    }
}

/// Scales to full range, rounds to nearest and saturates. NaN maps to zero.
fn quantize(value: f64, divisor: f64, min: f64, max: f64) -> f64 {
    let scaled = (value * divisor).round();
    if scaled.is_nan() {
        0.0
    } else {
        scaled.clamp(min, max)
    }
}
