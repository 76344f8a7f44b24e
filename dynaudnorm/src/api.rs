// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Loaded engine library and handle-level engine operations.
//!
//! [`NormalizerApi`] owns the resolved function table and a [`Registry`] of
//! live native instances. Every operation takes an [`EngineHandle`] and looks
//! the native pointer up first, so a destroyed or foreign handle is rejected
//! with [`Error::NotInitialized`] instead of reaching the engine.
//!
//! The registry lock stays held for the duration of each native call. Calls on
//! one library are therefore serialized, and an instance cannot be destroyed
//! while another thread is inside the engine with it.
//!
//! Most callers use [`crate::NormalizerInstance`], which wraps one handle with
//! RAII cleanup.

use std::{
    ffi::{CStr, c_char, c_int},
    path::Path,
    ptr::NonNull,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{debug, error};

use crate::{
    BufferSet, Error, NormalizerOptions, Result,
    registry::{EngineHandle, Registry},
};

/// Shared handle to a loaded engine library.
pub type NormalizerApiHandle = Arc<NormalizerApi>;

/// Engine parameters as reported back by a live instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfiguration {
    pub channels: u32,
    pub sample_rate: u32,
    pub frame_len: u32,
    pub filter_size: u32,
}

/// Engine library version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionInfo {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl std::fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}-{}", self.major, self.minor, self.patch)
    }
}

/// Build metadata reported by the engine library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub date: String,
    pub time: String,
    pub compiler: String,
    pub arch: String,
    pub debug: bool,
}

/// Native instance as stored in the registry.
struct RawInstance {
    ptr: NonNull<dynaudnorm_sys::Handle>,
    /// Length of the channel pointer arrays the engine reads and writes.
    channels: usize,
}

// Safety: the engine does not tie an instance to the thread that created it.
// The pointer is only dereferenced by the engine while the registry mutex is held.
unsafe impl Send for RawInstance {}

/// A loaded engine library.
pub struct NormalizerApi {
    raw: dynaudnorm_sys::DynamicAudioNormalizerApi,
    instances: Mutex<Registry<RawInstance>>,
}

/// Loads the engine shared library and resolves all entry points.
///
/// # Errors
///
/// Returns [`Error::LibLoading`] if the library cannot be opened or was built
/// for a different engine core revision.
///
/// # Examples
///
/// ```no_run
/// use dynaudnorm::load_api;
///
/// # fn main() -> Result<(), dynaudnorm::Error> {
/// let api = load_api("libDynamicAudioNormalizerAPI.so")?;
/// println!("engine v{}", api.version_info());
/// # Ok(())
/// # }
/// ```
pub fn load_api<P: AsRef<Path>>(path: P) -> Result<NormalizerApiHandle> {
    let raw = unsafe { dynaudnorm_sys::DynamicAudioNormalizerApi::new(path.as_ref().as_os_str())? };
    debug!(path = %path.as_ref().display(), "loaded engine library");
    Ok(unsafe { NormalizerApi::from_raw(raw) })
}

impl NormalizerApi {
    /// Wraps an already resolved function table.
    ///
    /// # Safety
    ///
    /// Every entry point in `raw` must behave like the engine library's: a
    /// created handle stays valid until it is destroyed, and calls touch no
    /// more channels or samples than they are given.
    pub unsafe fn from_raw(raw: dynaudnorm_sys::DynamicAudioNormalizerApi) -> NormalizerApiHandle {
        Arc::new(NormalizerApi {
            raw,
            instances: Mutex::new(Registry::new("Engine instance")),
        })
    }

    /// Gives access to the raw function table (logging setup).
    pub(crate) fn raw(&self) -> &dynaudnorm_sys::DynamicAudioNormalizerApi {
        &self.raw
    }

    fn instances(&self) -> MutexGuard<'_, Registry<RawInstance>> {
        // A poisoned lock only means another thread panicked mid-call; the
        // registry itself is never left half-updated.
        self.instances
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `call` on the live instance behind `handle`, holding the registry lock
    /// until it returns.
    fn with_instance<T>(
        &self,
        handle: EngineHandle,
        call: impl FnOnce(*mut dynaudnorm_sys::Handle, usize) -> Result<T>,
    ) -> Result<T> {
        let instances = self.instances();
        let instance = instances.get(handle)?;
        call(instance.ptr.as_ptr(), instance.channels)
    }

    /// Creates a native engine instance.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidChannelCount`] if `channels` is zero
    /// - [`Error::InvalidOption`] if `options` fail validation
    /// - [`Error::Engine`] if the engine refuses to create the instance
    pub fn create_instance(
        &self,
        channels: u32,
        sample_rate: u32,
        options: &NormalizerOptions,
    ) -> Result<EngineHandle> {
        if channels == 0 {
            return Err(Error::InvalidChannelCount(0));
        }
        options.validate()?;
        let instance = unsafe {
            self.raw.create_instance(
                channels,
                sample_rate,
                options.frame_len_msec,
                options.filter_size,
                options.peak_value,
                options.max_amplification,
                options.target_rms,
                options.compress_factor,
                c_int::from(options.channels_coupled),
                c_int::from(options.enable_dc_correction),
                c_int::from(options.alt_boundary_mode),
                std::ptr::null_mut(),
            )
        };
        let ptr = NonNull::new(instance)
            .ok_or_else(|| Error::Engine("Failed to create engine instance.".to_string()))?;
        let handle = self.instances().insert(RawInstance {
            ptr,
            channels: channels as usize,
        });
        debug!(?handle, channels, sample_rate, "created engine instance");
        Ok(handle)
    }

    /// Destroys a native engine instance. The handle is invalid afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the handle was already destroyed.
    pub fn destroy_instance(&self, handle: EngineHandle) -> Result<()> {
        let mut instances = self.instances();
        let mut instance = instances.remove(handle)?.ptr.as_ptr();
        unsafe { self.raw.destroy_instance(&mut instance) };
        drop(instances);
        debug!(?handle, "destroyed engine instance");
        Ok(())
    }

    /// Returns `true` if `handle` refers to a live instance.
    pub fn is_live(&self, handle: EngineHandle) -> bool {
        self.instances().contains(handle)
    }

    /// Number of instances created and not yet destroyed.
    pub fn live_instances(&self) -> usize {
        self.instances().len()
    }

    /// Number of channels the instance behind `handle` was created for.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitialized`] if the handle is stale.
    pub fn channels(&self, handle: EngineHandle) -> Result<usize> {
        Ok(self.instances().get(handle)?.channels)
    }

    /// Processes `count` samples per channel from `input` into `output`.
    ///
    /// Both sets must hold at least as many channels as the instance was
    /// created for; extra channels are left untouched.
    ///
    /// # Returns
    ///
    /// The number of samples produced per channel, at most `count`. The engine
    /// buffers internally, so early blocks typically produce fewer (or zero)
    /// samples.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the handle is stale
    /// - [`Error::MissingChannels`] if either set has fewer channels than the instance
    /// - [`Error::InvalidLength`] if `count` exceeds either set's usable length
    /// - [`Error::Engine`] if the engine reports a failure
    pub fn process(
        &self,
        handle: EngineHandle,
        input: &BufferSet,
        output: &mut BufferSet,
        count: usize,
    ) -> Result<usize> {
        self.with_instance(handle, |instance, channels| {
            input.ensure_channels(channels)?;
            output.ensure_channels(channels)?;
            check_length(count, input.min_capacity().min(output.min_capacity()))?;
            let samples_in = input.channel_ptrs(channels);
            let samples_out = output.channel_ptrs_mut(channels);
            let mut output_size: i64 = 0;
            Error::from_status(
                unsafe {
                    self.raw.process(
                        instance,
                        samples_in.as_ptr(),
                        samples_out.as_ptr(),
                        count as i64,
                        &mut output_size,
                    )
                },
                "process",
            )?;
            checked_output_size(output_size, count)
        })
    }

    /// Processes `count` samples per channel in place.
    ///
    /// # Errors
    ///
    /// Same as [`Self::process`].
    pub fn process_inplace(
        &self,
        handle: EngineHandle,
        buffers: &mut BufferSet,
        count: usize,
    ) -> Result<usize> {
        self.with_instance(handle, |instance, channels| {
            buffers.ensure_channels(channels)?;
            check_length(count, buffers.min_capacity())?;
            let samples = buffers.channel_ptrs_mut(channels);
            let mut output_size: i64 = 0;
            Error::from_status(
                unsafe {
                    self.raw.process_inplace(
                        instance,
                        samples.as_ptr(),
                        count as i64,
                        &mut output_size,
                    )
                },
                "processInplace",
            )?;
            checked_output_size(output_size, count)
        })
    }

    /// Drains samples still buffered inside the engine into `output`.
    ///
    /// # Returns
    ///
    /// The number of samples written per channel; `0` once the engine is drained.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if the handle is stale
    /// - [`Error::MissingChannels`] if `output` has fewer channels than the instance
    /// - [`Error::EmptyBuffer`] if `output` has no usable length
    /// - [`Error::Engine`] if the engine reports a failure
    pub fn flush_buffer(&self, handle: EngineHandle, output: &mut BufferSet) -> Result<usize> {
        self.with_instance(handle, |instance, channels| {
            output.ensure_channels(channels)?;
            let buffer_size = output.usable_length()?;
            let samples_out = output.channel_ptrs_mut(channels);
            let mut output_size: i64 = 0;
            Error::from_status(
                unsafe {
                    self.raw.flush_buffer(
                        instance,
                        samples_out.as_ptr(),
                        buffer_size as i64,
                        &mut output_size,
                    )
                },
                "flushBuffer",
            )?;
            checked_output_size(output_size, buffer_size)
        })
    }

    /// Discards all buffered state of an instance.
    pub fn reset(&self, handle: EngineHandle) -> Result<()> {
        self.with_instance(handle, |instance, _| {
            Error::from_status(unsafe { self.raw.reset(instance) }, "reset")
        })
    }

    /// Queries the parameters an instance was created with.
    pub fn configuration(&self, handle: EngineHandle) -> Result<EngineConfiguration> {
        let mut configuration = EngineConfiguration {
            channels: 0,
            sample_rate: 0,
            frame_len: 0,
            filter_size: 0,
        };
        self.with_instance(handle, |instance, _| {
            Error::from_status(
                unsafe {
                    self.raw.get_configuration(
                        instance,
                        &mut configuration.channels,
                        &mut configuration.sample_rate,
                        &mut configuration.frame_len,
                        &mut configuration.filter_size,
                    )
                },
                "getConfiguration",
            )
        })?;
        Ok(configuration)
    }

    /// Number of samples the engine holds back before producing output.
    pub fn internal_delay(&self, handle: EngineHandle) -> Result<u64> {
        let mut delay: i64 = 0;
        self.with_instance(handle, |instance, _| {
            Error::from_status(
                unsafe { self.raw.get_internal_delay(instance, &mut delay) },
                "getInternalDelay",
            )
        })?;
        u64::try_from(delay)
            .map_err(|_| Error::Engine(format!("engine reported negative delay {delay}")))
    }

    /// Returns the engine library version.
    pub fn version_info(&self) -> VersionInfo {
        let mut version = VersionInfo {
            major: 0,
            minor: 0,
            patch: 0,
        };
        unsafe {
            self.raw
                .get_version_info(&mut version.major, &mut version.minor, &mut version.patch)
        };
        version
    }

    /// Returns build metadata of the engine library.
    pub fn build_info(&self) -> BuildInfo {
        let mut date: *const c_char = std::ptr::null();
        let mut time: *const c_char = std::ptr::null();
        let mut compiler: *const c_char = std::ptr::null();
        let mut arch: *const c_char = std::ptr::null();
        let mut debug: c_int = 0;
        unsafe {
            self.raw
                .get_build_info(&mut date, &mut time, &mut compiler, &mut arch, &mut debug)
        };
        BuildInfo {
            date: unsafe { owned_c_str(date) },
            time: unsafe { owned_c_str(time) },
            compiler: unsafe { owned_c_str(compiler) },
            arch: unsafe { owned_c_str(arch) },
            debug: debug != 0,
        }
    }
}

impl Drop for NormalizerApi {
    /// Destroys instances whose owners never released them, before the library unloads.
    fn drop(&mut self) {
        let leaked = self.instances().drain();
        if !leaked.is_empty() {
            error!(
                "{} engine instance(s) still alive while unloading the library",
                leaked.len()
            );
        }
        for RawInstance { ptr, .. } in leaked {
            let mut instance = ptr.as_ptr();
            unsafe { self.raw.destroy_instance(&mut instance) };
        }
    }
}

fn check_length(count: usize, usable: usize) -> Result<()> {
    if count > usable {
        return Err(Error::InvalidLength {
            length: count,
            usable,
        });
    }
    Ok(())
}

fn checked_output_size(output_size: i64, limit: usize) -> Result<usize> {
    usize::try_from(output_size)
        .ok()
        .filter(|produced| *produced <= limit)
        .ok_or_else(|| {
            Error::Engine(format!(
                "engine reported {output_size} output sample(s), expected at most {limit}"
            ))
        })
}

/// Copies a static engine string, treating null as empty.
unsafe fn owned_c_str(value: *const c_char) -> String {
    if value.is_null() {
        String::new()
    } else {
        unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned()
    }
}
