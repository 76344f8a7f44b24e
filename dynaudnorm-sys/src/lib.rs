// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! # dynaudnorm-sys: Raw FFI bindings to the Dynamic Audio Normalizer C API
//!
//! This crate describes the C ABI exported by the Dynamic Audio Normalizer engine
//! library (`libDynamicAudioNormalizerAPI`) and loads it at runtime with
//! `libloading`.
//!
//! ## Overview
//!
//! `dynaudnorm-sys` exposes:
//! - The opaque engine handle type ([`Handle`])
//! - The log callback signature ([`LogFunction`])
//! - A function table ([`DynamicAudioNormalizerApi`]) resolved from the shared library
//! - Constants for the core revision and log levels
//!
//! ## Usage
//!
//! **Most users should NOT use this crate directly.** Use the safe [`dynaudnorm`] wrapper
//! crate instead, which provides:
//! - Generation-checked engine handles (use-after-destroy is an error, not UB)
//! - Rust-idiomatic error handling with `Result`
//! - Typed per-channel sample buffers
//!
//! ## Safety
//!
//! All function-table methods are `unsafe` and require the caller to uphold the
//! engine's invariants:
//! - A handle must come from `create_instance` and be destroyed exactly once
//! - Every channel pointer must reference at least `inputSize`/`bufferSize` doubles
//! - A handle must not be used from two threads at the same time
//!
//! ## Versioning
//!
//! The engine decorates every exported symbol with its core revision
//! (`MDynamicAudioNormalizer_process_r8`). Loading a library built for another
//! revision fails because the symbols cannot be resolved.
//!
//! [`dynaudnorm`]: https://docs.rs/dynaudnorm

#![allow(non_snake_case)]
#![allow(clippy::missing_safety_doc)]
#![allow(clippy::too_many_arguments)]

use std::ffi::{OsStr, c_char, c_int, c_void};

/// Engine core revision these bindings were written against.
pub const CORE_VERSION: u32 = 8;

/// Debug-level log message.
pub const LOG_LEVEL_DBG: c_int = 0;
/// Warning-level log message.
pub const LOG_LEVEL_WRN: c_int = 1;
/// Error-level log message.
pub const LOG_LEVEL_ERR: c_int = 2;

/// Opaque engine instance.
#[repr(C)]
pub struct Handle {
    _unused: [u8; 0],
}

/// Callback invoked by the engine for every log message.
pub type LogFunction = unsafe extern "C" fn(logLevel: c_int, message: *const c_char);

pub type CreateInstanceFn = unsafe extern "C" fn(
    channels: u32,
    sampleRate: u32,
    frameLenMsec: u32,
    filterSize: u32,
    peakValue: f64,
    maxAmplification: f64,
    targetRms: f64,
    compressFactor: f64,
    channelsCoupled: c_int,
    enableDCCorrection: c_int,
    altBoundaryMode: c_int,
    logFile: *mut c_void,
) -> *mut Handle;
pub type DestroyInstanceFn = unsafe extern "C" fn(handle: *mut *mut Handle);
pub type ProcessFn = unsafe extern "C" fn(
    handle: *mut Handle,
    samplesIn: *const *const f64,
    samplesOut: *const *mut f64,
    inputSize: i64,
    outputSize: *mut i64,
) -> c_int;
pub type ProcessInplaceFn = unsafe extern "C" fn(
    handle: *mut Handle,
    samplesInOut: *const *mut f64,
    inputSize: i64,
    outputSize: *mut i64,
) -> c_int;
pub type FlushBufferFn = unsafe extern "C" fn(
    handle: *mut Handle,
    samplesOut: *const *mut f64,
    bufferSize: i64,
    outputSize: *mut i64,
) -> c_int;
pub type ResetFn = unsafe extern "C" fn(handle: *mut Handle) -> c_int;
pub type GetConfigurationFn = unsafe extern "C" fn(
    handle: *mut Handle,
    channels: *mut u32,
    sampleRate: *mut u32,
    frameLen: *mut u32,
    filterSize: *mut u32,
) -> c_int;
pub type GetInternalDelayFn =
    unsafe extern "C" fn(handle: *mut Handle, delayInSamples: *mut i64) -> c_int;
pub type GetVersionInfoFn = unsafe extern "C" fn(major: *mut u32, minor: *mut u32, patch: *mut u32);
pub type GetBuildInfoFn = unsafe extern "C" fn(
    date: *mut *const c_char,
    time: *mut *const c_char,
    compiler: *mut *const c_char,
    arch: *mut *const c_char,
    debug: *mut c_int,
);
pub type SetLogFunctionFn =
    unsafe extern "C" fn(logFunction: Option<LogFunction>) -> Option<LogFunction>;

/// Every engine entry point, one pointer each.
///
/// [`DynamicAudioNormalizerApi::from_library`] fills this from the shared
/// library. An in-process engine can fill it directly and go through
/// [`DynamicAudioNormalizerApi::from_functions`].
#[derive(Debug, Clone, Copy)]
pub struct EngineFunctions {
    pub create_instance: CreateInstanceFn,
    pub destroy_instance: DestroyInstanceFn,
    pub process: ProcessFn,
    pub process_inplace: ProcessInplaceFn,
    pub flush_buffer: FlushBufferFn,
    pub reset: ResetFn,
    pub get_configuration: GetConfigurationFn,
    pub get_internal_delay: GetInternalDelayFn,
    pub get_version_info: GetVersionInfoFn,
    pub get_build_info: GetBuildInfoFn,
    pub set_log_function: SetLogFunctionFn,
}

/// Function table resolved from the engine shared library.
///
/// The library stays loaded for as long as this value lives; the resolved
/// function pointers must not be used after it is dropped.
pub struct DynamicAudioNormalizerApi {
    __library: Option<libloading::Library>,
    functions: EngineFunctions,
}

/// Resolves one revision-decorated symbol, e.g. `MDynamicAudioNormalizer_reset_r8`.
unsafe fn resolve<T: Copy>(library: &libloading::Library, name: &str) -> Result<T, libloading::Error> {
    let symbol = format!("MDynamicAudioNormalizer_{name}_r{CORE_VERSION}\0");
    unsafe { library.get::<T>(symbol.as_bytes()).map(|sym| *sym) }
}

impl DynamicAudioNormalizerApi {
    /// Loads the shared library at `path` and resolves every engine entry point.
    pub unsafe fn new<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let library = unsafe { libloading::Library::new(path)? };
        unsafe { Self::from_library(library) }
    }

    /// Resolves every engine entry point from an already loaded library.
    pub unsafe fn from_library<L: Into<libloading::Library>>(
        library: L,
    ) -> Result<Self, libloading::Error> {
        let library = library.into();
        let functions = unsafe {
            EngineFunctions {
                create_instance: resolve(&library, "createInstance")?,
                destroy_instance: resolve(&library, "destroyInstance")?,
                process: resolve(&library, "process")?,
                process_inplace: resolve(&library, "processInplace")?,
                flush_buffer: resolve(&library, "flushBuffer")?,
                reset: resolve(&library, "reset")?,
                get_configuration: resolve(&library, "getConfiguration")?,
                get_internal_delay: resolve(&library, "getInternalDelay")?,
                get_version_info: resolve(&library, "getVersionInfo")?,
                get_build_info: resolve(&library, "getBuildInfo")?,
                set_log_function: resolve(&library, "setLogFunction")?,
            }
        };
        Ok(Self {
            __library: Some(library),
            functions,
        })
    }

    /// Wraps entry points that live in the current process.
    ///
    /// The functions must honour the same contract as the shared library's:
    /// handles stay valid until destroyed, and no more than the given number of
    /// channels and samples is touched.
    pub unsafe fn from_functions(functions: EngineFunctions) -> Self {
        Self {
            __library: None,
            functions,
        }
    }

    pub unsafe fn create_instance(
        &self,
        channels: u32,
        sample_rate: u32,
        frame_len_msec: u32,
        filter_size: u32,
        peak_value: f64,
        max_amplification: f64,
        target_rms: f64,
        compress_factor: f64,
        channels_coupled: c_int,
        enable_dc_correction: c_int,
        alt_boundary_mode: c_int,
        log_file: *mut c_void,
    ) -> *mut Handle {
        unsafe {
            (self.functions.create_instance)(
                channels,
                sample_rate,
                frame_len_msec,
                filter_size,
                peak_value,
                max_amplification,
                target_rms,
                compress_factor,
                channels_coupled,
                enable_dc_correction,
                alt_boundary_mode,
                log_file,
            )
        }
    }

    pub unsafe fn destroy_instance(&self, handle: *mut *mut Handle) {
        unsafe { (self.functions.destroy_instance)(handle) }
    }

    pub unsafe fn process(
        &self,
        handle: *mut Handle,
        samples_in: *const *const f64,
        samples_out: *const *mut f64,
        input_size: i64,
        output_size: *mut i64,
    ) -> c_int {
        unsafe { (self.functions.process)(handle, samples_in, samples_out, input_size, output_size) }
    }

    pub unsafe fn process_inplace(
        &self,
        handle: *mut Handle,
        samples_in_out: *const *mut f64,
        input_size: i64,
        output_size: *mut i64,
    ) -> c_int {
        unsafe { (self.functions.process_inplace)(handle, samples_in_out, input_size, output_size) }
    }

    pub unsafe fn flush_buffer(
        &self,
        handle: *mut Handle,
        samples_out: *const *mut f64,
        buffer_size: i64,
        output_size: *mut i64,
    ) -> c_int {
        unsafe { (self.functions.flush_buffer)(handle, samples_out, buffer_size, output_size) }
    }

    pub unsafe fn reset(&self, handle: *mut Handle) -> c_int {
        unsafe { (self.functions.reset)(handle) }
    }

    pub unsafe fn get_configuration(
        &self,
        handle: *mut Handle,
        channels: *mut u32,
        sample_rate: *mut u32,
        frame_len: *mut u32,
        filter_size: *mut u32,
    ) -> c_int {
        unsafe { (self.functions.get_configuration)(handle, channels, sample_rate, frame_len, filter_size) }
    }

    pub unsafe fn get_internal_delay(&self, handle: *mut Handle, delay_in_samples: *mut i64) -> c_int {
        unsafe { (self.functions.get_internal_delay)(handle, delay_in_samples) }
    }

    pub unsafe fn get_version_info(&self, major: *mut u32, minor: *mut u32, patch: *mut u32) {
        unsafe { (self.functions.get_version_info)(major, minor, patch) }
    }

    pub unsafe fn get_build_info(
        &self,
        date: *mut *const c_char,
        time: *mut *const c_char,
        compiler: *mut *const c_char,
        arch: *mut *const c_char,
        debug: *mut c_int,
    ) {
        unsafe { (self.functions.get_build_info)(date, time, compiler, arch, debug) }
    }

    pub unsafe fn set_log_function(&self, log_function: Option<LogFunction>) -> Option<LogFunction> {
        unsafe { (self.functions.set_log_function)(log_function) }
    }
}
