// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Integration tests for the sample codec.

use dynaudnorm::{BufferSet, ChannelBufferPool, Error, SampleFormat, codec};

fn interleaved_s16(values: &[i16]) -> Vec<u8> {
    values.iter().flat_map(|value| value.to_le_bytes()).collect()
}

/// Deterministic pseudo-random samples in `[low, high]`.
fn samples(seed: u64, count: usize, low: f64, high: f64) -> Vec<f64> {
    let mut state = seed;
    (0..count)
        .map(|_| {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            let unit = (state >> 11) as f64 / (1u64 << 53) as f64;
            low + unit * (high - low)
        })
        .collect()
}

/// Tests that a 2-channel 16-bit stream de-interleaves channel-fastest and
/// that encoding reproduces the original bytes.
#[test]
fn interleaving_order() {
    let bytes = interleaved_s16(&[1000, -1000, 2000, -2000]);
    let mut buffers = ChannelBufferPool::allocate(2, 8).unwrap();

    let frames = codec::decode(&bytes, &mut buffers, 2, SampleFormat::S16LE).unwrap();
    assert_eq!(frames, 2);
    assert_eq!(&buffers.channel(0).unwrap()[..2], &[1000.0 / 32767.0, 2000.0 / 32767.0]);
    assert_eq!(&buffers.channel(1).unwrap()[..2], &[-1000.0 / 32767.0, -2000.0 / 32767.0]);

    let encoded = codec::encode(&buffers, 2, SampleFormat::S16LE, frames).unwrap();
    assert_eq!(encoded, bytes);
}

/// Tests round trips for every format: exact for float formats, within one
/// quantization step for integer formats.
#[test]
fn round_trip_all_formats() {
    let cases = [
        (SampleFormat::U8, 0.0, 1.0),
        (SampleFormat::S16LE, -1.0, 1.0),
        (SampleFormat::F32LE, -1.0, 1.0),
        (SampleFormat::F64LE, -4.0, 4.0),
    ];
    for (seed, (format, low, high)) in cases.into_iter().enumerate() {
        let channels = 3;
        let length = 257;
        let mut original = BufferSet::from_channels(
            (0..channels)
                .map(|channel| samples((seed * 10 + channel) as u64, length, low, high))
                .collect(),
        );
        if format == SampleFormat::F32LE {
            // Float32 round trips exactly only for values it can represent.
            for channel in 0..channels {
                for sample in original.channel_mut(channel).unwrap() {
                    *sample = f64::from(*sample as f32);
                }
            }
        }

        let bytes = codec::encode(&original, channels, format, length).unwrap();
        assert_eq!(bytes.len(), length * channels * format.width());

        let mut decoded = ChannelBufferPool::allocate(channels, length).unwrap();
        let frames = codec::decode(&bytes, &mut decoded, channels, format).unwrap();
        assert_eq!(frames, length);

        let tolerance = if format.is_scaled() {
            1.0 / format.divisor()
        } else {
            0.0
        };
        for channel in 0..channels {
            let expected = original.channel(channel).unwrap();
            let actual = decoded.channel(channel).unwrap();
            for (a, b) in expected.iter().zip(actual) {
                assert!(
                    (a - b).abs() <= tolerance,
                    "{format}: {a} decoded as {b} (tolerance {tolerance})"
                );
            }
        }
    }
}

/// Tests the full-scale divisors, including the uncentered 8-bit mapping.
#[test]
fn integer_scaling() {
    let mut buffers = ChannelBufferPool::allocate(1, 3).unwrap();
    codec::decode(&[0, 128, 255], &mut buffers, 1, SampleFormat::U8).unwrap();
    assert_eq!(buffers.channel(0).unwrap(), &[0.0, 128.0 / 255.0, 1.0]);

    let set = BufferSet::from_channels(vec![vec![1.0, -1.0, 0.5, 2.0, -2.0]]);
    let bytes = codec::encode(&set, 1, SampleFormat::S16LE, 5).unwrap();
    // 0.5 * 32767 = 16383.5 rounds away from zero; out-of-range values saturate.
    assert_eq!(bytes, interleaved_s16(&[32767, -32767, 16384, 32767, -32768]));

    let set = BufferSet::from_channels(vec![vec![-0.5, 0.5, 1.5, f64::NAN]]);
    let bytes = codec::encode(&set, 1, SampleFormat::U8, 4).unwrap();
    assert_eq!(bytes, vec![0, 128, 255, 0]);
}

/// Tests that a byte stream not divisible into whole frames is rejected
/// without touching the target buffers.
#[test]
fn rejects_partial_frames() {
    let mut buffers = BufferSet::from_channels(vec![vec![0.25; 4], vec![0.25; 4]]);
    let before = buffers.clone();

    let result = codec::decode(&[0u8; 6], &mut buffers, 2, SampleFormat::S16LE);
    assert!(matches!(result, Err(Error::Format(_))));
    assert_eq!(buffers, before);

    let result = codec::decode(&[0u8; 3], &mut buffers, 1, SampleFormat::F32LE);
    assert!(matches!(result, Err(Error::Format(_))));
    assert_eq!(buffers, before);
}

/// Tests that decoding more frames than the buffers hold is rejected without
/// partial writes.
#[test]
fn rejects_too_small_buffers() {
    let mut buffers = BufferSet::from_channels(vec![vec![0.25; 2]]);
    let before = buffers.clone();
    let result = codec::decode(&interleaved_s16(&[1, 2, 3]), &mut buffers, 1, SampleFormat::S16LE);
    assert!(matches!(
        result,
        Err(Error::BufferTooSmall {
            required: 3,
            capacity: 2
        })
    ));
    assert_eq!(buffers, before);
}

/// Tests that fewer buffers than channels is rejected in both directions.
#[test]
fn rejects_missing_channels() {
    let mut buffers = ChannelBufferPool::allocate(1, 4).unwrap();
    let result = codec::decode(&[0u8; 8], &mut buffers, 2, SampleFormat::S16LE);
    assert!(matches!(
        result,
        Err(Error::MissingChannels {
            required: 2,
            available: 1
        })
    ));
    let result = codec::encode(&buffers, 2, SampleFormat::S16LE, 1);
    assert!(matches!(result, Err(Error::MissingChannels { .. })));
}

/// Tests that zero channels is refused.
#[test]
fn rejects_zero_channels() {
    let mut buffers = ChannelBufferPool::allocate(1, 4).unwrap();
    assert!(matches!(
        codec::decode(&[], &mut buffers, 0, SampleFormat::U8),
        Err(Error::InvalidChannelCount(0))
    ));
    assert!(matches!(
        codec::encode(&buffers, 0, SampleFormat::U8, 1),
        Err(Error::InvalidChannelCount(0))
    ));
}

/// Tests that an empty byte stream decodes to zero samples.
#[test]
fn empty_stream_decodes_nothing() {
    let mut buffers = ChannelBufferPool::allocate(2, 4).unwrap();
    assert_eq!(
        codec::decode(&[], &mut buffers, 2, SampleFormat::F64LE).unwrap(),
        0
    );
}

/// Tests width lookup, including rejection of unsupported widths.
#[test]
fn sample_format_from_width() {
    assert_eq!(SampleFormat::from_width(1).unwrap(), SampleFormat::U8);
    assert_eq!(SampleFormat::from_width(2).unwrap(), SampleFormat::S16LE);
    assert_eq!(SampleFormat::from_width(4).unwrap(), SampleFormat::F32LE);
    assert_eq!(SampleFormat::from_width(8).unwrap(), SampleFormat::F64LE);
    assert!(matches!(SampleFormat::from_width(3), Err(Error::Format(_))));
    assert!(matches!(SampleFormat::from_width(0), Err(Error::Format(_))));

    assert_eq!(SampleFormat::U8.divisor(), 255.0);
    assert_eq!(SampleFormat::S16LE.divisor(), 32767.0);
    assert_eq!(SampleFormat::F32LE.divisor(), 1.0);
    assert_eq!(SampleFormat::F64LE.divisor(), 1.0);
    assert!(SampleFormat::S16LE.is_scaled());
    assert!(!SampleFormat::F64LE.is_scaled());
}
