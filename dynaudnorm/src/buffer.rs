// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Per-channel sample buffers reused across streaming iterations.
//!
//! A [`BufferSet`] holds one fixed-capacity [`ChannelBuffer`] per channel. Sets
//! allocated through [`ChannelBufferPool`] always have uniform capacity; sets
//! adopted from caller-provided vectors may not, in which case the smallest
//! capacity is the set's [usable length](BufferSet::usable_length).

use crate::{Error, Result};

/// Owned, fixed-capacity sequence of `f64` samples for a single channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelBuffer {
    samples: Box<[f64]>,
}

impl ChannelBuffer {
    /// Allocates a zero-initialised buffer with the given capacity.
    pub fn zeroed(capacity: usize) -> Self {
        Self {
            samples: vec![0.0; capacity].into_boxed_slice(),
        }
    }

    /// Number of samples the buffer can hold. Never changes after allocation.
    pub fn capacity(&self) -> usize {
        self.samples.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.samples
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        &mut self.samples
    }

    pub(crate) fn as_ptr(&self) -> *const f64 {
        self.samples.as_ptr()
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut f64 {
        self.samples.as_mut_ptr()
    }
}

impl From<Vec<f64>> for ChannelBuffer {
    fn from(samples: Vec<f64>) -> Self {
        Self {
            samples: samples.into_boxed_slice(),
        }
    }
}

/// Ordered set of channel buffers, one per channel.
///
/// # Examples
///
/// ```
/// use dynaudnorm::BufferSet;
///
/// let set = BufferSet::from_channels(vec![vec![0.0; 10], vec![0.0; 8], vec![0.0; 12]]);
/// assert_eq!(set.usable_length().unwrap(), 8);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BufferSet {
    channels: Vec<ChannelBuffer>,
}

impl BufferSet {
    /// Adopts caller-provided per-channel vectors. Capacities may differ.
    pub fn from_channels(channels: Vec<Vec<f64>>) -> Self {
        Self {
            channels: channels.into_iter().map(ChannelBuffer::from).collect(),
        }
    }

    /// Number of channel buffers in the set.
    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Minimum capacity across all buffers, or `0` for an empty set.
    pub fn min_capacity(&self) -> usize {
        self.channels
            .iter()
            .map(ChannelBuffer::capacity)
            .min()
            .unwrap_or(0)
    }

    /// Returns the common extent safe to read from or write into every buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyBuffer`] if the set has no buffers or any buffer has
    /// zero capacity.
    pub fn usable_length(&self) -> Result<usize> {
        match self.min_capacity() {
            0 => Err(Error::EmptyBuffer),
            length => Ok(length),
        }
    }

    /// Returns the samples of one channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingChannels`] if `channel` is out of range.
    pub fn channel(&self, channel: usize) -> Result<&[f64]> {
        self.channels
            .get(channel)
            .map(ChannelBuffer::as_slice)
            .ok_or(Error::MissingChannels {
                required: channel + 1,
                available: self.channels.len(),
            })
    }

    /// Returns mutable access to the samples of one channel.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingChannels`] if `channel` is out of range.
    pub fn channel_mut(&mut self, channel: usize) -> Result<&mut [f64]> {
        let available = self.channels.len();
        self.channels
            .get_mut(channel)
            .map(ChannelBuffer::as_mut_slice)
            .ok_or(Error::MissingChannels {
                required: channel + 1,
                available,
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelBuffer> {
        self.channels.iter()
    }

    /// Resets every sample to zero. Capacities are unchanged.
    pub fn clear(&mut self) {
        for buffer in &mut self.channels {
            buffer.as_mut_slice().fill(0.0);
        }
    }

    /// Fails unless the set has at least `required` buffers.
    pub(crate) fn ensure_channels(&self, required: usize) -> Result<()> {
        if self.channels.len() < required {
            return Err(Error::MissingChannels {
                required,
                available: self.channels.len(),
            });
        }
        Ok(())
    }

    /// Read-only channel pointers for the first `channels` buffers.
    pub(crate) fn channel_ptrs(&self, channels: usize) -> Vec<*const f64> {
        self.channels
            .iter()
            .take(channels)
            .map(ChannelBuffer::as_ptr)
            .collect()
    }

    /// Mutable channel pointers for the first `channels` buffers.
    pub(crate) fn channel_ptrs_mut(&mut self, channels: usize) -> Vec<*mut f64> {
        self.channels
            .iter_mut()
            .take(channels)
            .map(ChannelBuffer::as_mut_ptr)
            .collect()
    }
}

/// Allocates and recycles [`BufferSet`]s of one fixed shape.
///
/// The pipeline keeps two sets (input and output) alive for the whole run; the
/// pool lets callers hand sets back and get them again zeroed instead of
/// reallocating.
#[derive(Debug)]
pub struct ChannelBufferPool {
    channels: usize,
    capacity: usize,
    free: Vec<BufferSet>,
}

impl ChannelBufferPool {
    /// Creates a pool handing out sets of `channels` buffers with `capacity` samples each.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidChannelCount`] if `channels` is zero
    /// - [`Error::EmptyBuffer`] if `capacity` is zero
    pub fn new(channels: usize, capacity: usize) -> Result<Self> {
        if channels == 0 {
            return Err(Error::InvalidChannelCount(channels));
        }
        if capacity == 0 {
            return Err(Error::EmptyBuffer);
        }
        Ok(Self {
            channels,
            capacity,
            free: Vec::new(),
        })
    }

    /// Allocates a single zero-initialised set without keeping a pool around.
    pub fn allocate(channels: usize, capacity: usize) -> Result<BufferSet> {
        Self::new(channels, capacity)?.acquire()
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a zeroed set, reusing a recycled one when available.
    pub fn acquire(&mut self) -> Result<BufferSet> {
        if let Some(mut set) = self.free.pop() {
            set.clear();
            return Ok(set);
        }
        Ok(BufferSet {
            channels: (0..self.channels)
                .map(|_| ChannelBuffer::zeroed(self.capacity))
                .collect(),
        })
    }

    /// Hands a set back for reuse.
    ///
    /// Sets of a different shape are not kept; they are returned to the caller.
    pub fn recycle(&mut self, set: BufferSet) -> Option<BufferSet> {
        let matches = set.channels() == self.channels
            && set.iter().all(|buffer| buffer.capacity() == self.capacity);
        if matches {
            self.free.push(set);
            None
        } else {
            Some(set)
        }
    }

    /// Number of recycled sets waiting to be reused.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}
