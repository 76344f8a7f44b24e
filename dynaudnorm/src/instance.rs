// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Native engine instance management.
//!
//! This module provides [`NormalizerInstance`], an owned wrapper around one
//! engine handle of a loaded [`crate::NormalizerApi`].

use tracing::{error, warn};

use crate::{
    BufferSet, Engine, EngineConfiguration, Error, NormalizerOptions, Result,
    api::NormalizerApiHandle, registry::EngineHandle,
};

/// One native normalizer instance.
///
/// The instance is created by [`NormalizerInstance::new`] and should be released
/// with [`NormalizerInstance::destroy`]. Dropping an instance that was not
/// destroyed still releases it, but debug builds report a resource leak because
/// the release error can no longer be returned to anyone.
///
/// # Examples
///
/// ```no_run
/// use dynaudnorm::{load_api, ChannelBufferPool, Engine, NormalizerInstance, NormalizerOptions};
///
/// # fn main() -> Result<(), dynaudnorm::Error> {
/// let api = load_api("libDynamicAudioNormalizerAPI.so")?;
/// let mut normalizer = NormalizerInstance::new(api, 2, 44100, &NormalizerOptions::default())?;
///
/// let input = ChannelBufferPool::allocate(2, 4096)?;
/// let mut output = ChannelBufferPool::allocate(2, 4096)?;
/// let produced = normalizer.process(&input, &mut output, 4096)?;
/// println!("{produced} sample(s) ready, delay {}", normalizer.internal_delay()?);
///
/// normalizer.destroy()?;
/// # Ok(())
/// # }
/// ```
pub struct NormalizerInstance {
    api: NormalizerApiHandle,
    handle: Option<EngineHandle>,
    channels: usize,
}

impl NormalizerInstance {
    /// Creates an engine instance for `channels` channels at `sample_rate` Hz.
    ///
    /// If a log function is to be used it must be installed with
    /// [`crate::set_log_function`] before this call.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidChannelCount`] if `channels` is zero
    /// - [`Error::InvalidOption`] if `options` fail validation
    /// - [`Error::Engine`] if the engine refuses the configuration
    pub fn new(
        api: NormalizerApiHandle,
        channels: u32,
        sample_rate: u32,
        options: &NormalizerOptions,
    ) -> Result<Self> {
        let handle = api.create_instance(channels, sample_rate, options)?;
        Ok(Self {
            api,
            handle: Some(handle),
            channels: channels as usize,
        })
    }

    /// The registry handle backing this instance, `None` once destroyed.
    pub fn handle(&self) -> Option<EngineHandle> {
        self.handle
    }

    /// Number of channels the instance was created for.
    pub fn channels(&self) -> usize {
        self.channels
    }

    fn live_handle(&self) -> Result<EngineHandle> {
        self.handle.ok_or(Error::NotInitialized("Engine instance"))
    }

    fn destroy_inner(&mut self) -> Result<()> {
        let handle = self
            .handle
            .take()
            .ok_or(Error::NotInitialized("Engine instance"))?;
        self.api.destroy_instance(handle)
    }
}

impl Engine for NormalizerInstance {
    fn configuration(&self) -> Result<EngineConfiguration> {
        self.api.configuration(self.live_handle()?)
    }

    fn internal_delay(&self) -> Result<u64> {
        self.api.internal_delay(self.live_handle()?)
    }

    fn process(&mut self, input: &BufferSet, output: &mut BufferSet, count: usize) -> Result<usize> {
        self.api.process(self.live_handle()?, input, output, count)
    }

    fn process_inplace(&mut self, buffers: &mut BufferSet, count: usize) -> Result<usize> {
        self.api.process_inplace(self.live_handle()?, buffers, count)
    }

    fn flush_buffer(&mut self, output: &mut BufferSet) -> Result<usize> {
        self.api.flush_buffer(self.live_handle()?, output)
    }

    fn reset(&mut self) -> Result<()> {
        self.api.reset(self.live_handle()?)
    }

    /// Explicitly destroys this instance, releasing resources immediately.
    fn destroy(mut self) -> Result<()> {
        self.destroy_inner()
    }
}

impl Drop for NormalizerInstance {
    /// Releases the native instance if [`Engine::destroy`] was never called.
    fn drop(&mut self) {
        if self.handle.is_some() {
            if cfg!(debug_assertions) {
                warn!("resource leak: engine instance was dropped without being destroyed");
            }
            if let Err(err) = self.destroy_inner() {
                error!("Failed to release engine instance: {:?}", err);
            }
        }
    }
}
