// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! An in-process implementation of the engine's C ABI.
//!
//! Each instance is a per-channel delay line of [`DELAY`] samples behind a
//! boxed pointer, so [`dynaudnorm::NormalizerApi`] can be exercised end to end
//! without the shared library. The functions also keep a few global counters
//! that let tests detect misuse from the Rust side:
//!
//! - [`stale_calls`] counts calls made with a pointer that is not live
//! - [`overlapping_calls`] counts calls that entered an instance another
//!   thread was still inside
//! - [`destroyed_at`] counts destroyed instances per sample rate, so tests
//!   running in parallel stay apart by using distinct rates

use std::{
    collections::VecDeque,
    ffi::{c_char, c_int, c_void},
    sync::{
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use dynaudnorm::{NormalizerApi, NormalizerApiHandle};
use dynaudnorm_sys::{EngineFunctions, Handle, LogFunction};

/// Samples every instance holds back.
pub const DELAY: usize = 5;

/// Instances created at this sample rate report one sample more than allowed.
pub const OVERPRODUCING_RATE: u32 = 7;

static LIVE: Mutex<Vec<usize>> = Mutex::new(Vec::new());
static DESTROYED: Mutex<Vec<u32>> = Mutex::new(Vec::new());
static STALE_CALLS: AtomicUsize = AtomicUsize::new(0);
static OVERLAPPING_CALLS: AtomicUsize = AtomicUsize::new(0);

struct Instance {
    sample_rate: u32,
    frame_len: u32,
    filter_size: u32,
    queues: Vec<VecDeque<f64>>,
    busy: AtomicBool,
}

/// Builds a shared API handle backed by the functions below.
pub fn api() -> NormalizerApiHandle {
    let functions = EngineFunctions {
        create_instance,
        destroy_instance,
        process,
        process_inplace,
        flush_buffer,
        reset,
        get_configuration,
        get_internal_delay,
        get_version_info,
        get_build_info,
        set_log_function,
    };
    unsafe { NormalizerApi::from_raw(dynaudnorm_sys::DynamicAudioNormalizerApi::from_functions(functions)) }
}

pub fn stale_calls() -> usize {
    STALE_CALLS.load(Ordering::SeqCst)
}

pub fn overlapping_calls() -> usize {
    OVERLAPPING_CALLS.load(Ordering::SeqCst)
}

pub fn destroyed_at(sample_rate: u32) -> usize {
    DESTROYED
        .lock()
        .unwrap()
        .iter()
        .filter(|rate| **rate == sample_rate)
        .count()
}

/// Runs `call` on the instance behind `handle`, or returns `0` (failure) if the
/// pointer is not live.
fn with_instance(handle: *mut Handle, call: impl FnOnce(&mut Instance) -> c_int) -> c_int {
    if !LIVE.lock().unwrap().contains(&(handle as usize)) {
        STALE_CALLS.fetch_add(1, Ordering::SeqCst);
        return 0;
    }
    let instance = unsafe { &mut *(handle as *mut Instance) };
    if instance.busy.swap(true, Ordering::SeqCst) {
        OVERLAPPING_CALLS.fetch_add(1, Ordering::SeqCst);
    }
    // Widen the window in which an unsynchronized second caller would show up.
    std::thread::yield_now();
    let status = call(instance);
    instance.busy.store(false, Ordering::SeqCst);
    status
}

/// Moves `ready` samples per channel from the delay line into `samples_out`.
fn drain(instance: &mut Instance, samples_out: *const *mut f64, ready: usize) {
    for (channel, queue) in instance.queues.iter_mut().enumerate() {
        let out = unsafe { std::slice::from_raw_parts_mut(*samples_out.add(channel), ready) };
        for (slot, sample) in out.iter_mut().zip(queue.drain(..ready)) {
            *slot = sample;
        }
    }
}

fn push(instance: &mut Instance, samples_in: *const *const f64, count: usize) {
    for (channel, queue) in instance.queues.iter_mut().enumerate() {
        let input = unsafe { std::slice::from_raw_parts(*samples_in.add(channel), count) };
        queue.extend(input);
    }
}

fn report(instance: &Instance, produced: usize, output_size: *mut i64) {
    let extra = usize::from(instance.sample_rate == OVERPRODUCING_RATE);
    unsafe { *output_size = (produced + extra) as i64 };
}

unsafe extern "C" fn create_instance(
    channels: u32,
    sample_rate: u32,
    frame_len_msec: u32,
    filter_size: u32,
    _peak_value: f64,
    _max_amplification: f64,
    _target_rms: f64,
    _compress_factor: f64,
    _channels_coupled: c_int,
    _enable_dc_correction: c_int,
    _alt_boundary_mode: c_int,
    _log_file: *mut c_void,
) -> *mut Handle {
    if channels == 0 {
        return std::ptr::null_mut();
    }
    let instance = Box::into_raw(Box::new(Instance {
        sample_rate,
        frame_len: frame_len_msec,
        filter_size,
        queues: vec![VecDeque::new(); channels as usize],
        busy: AtomicBool::new(false),
    }));
    LIVE.lock().unwrap().push(instance as usize);
    instance as *mut Handle
}

unsafe extern "C" fn destroy_instance(handle: *mut *mut Handle) {
    let pointer = unsafe { *handle };
    let mut live = LIVE.lock().unwrap();
    let Some(position) = live.iter().position(|p| *p == pointer as usize) else {
        STALE_CALLS.fetch_add(1, Ordering::SeqCst);
        return;
    };
    live.swap_remove(position);
    let instance = unsafe { Box::from_raw(pointer as *mut Instance) };
    DESTROYED.lock().unwrap().push(instance.sample_rate);
    unsafe { *handle = std::ptr::null_mut() };
}

unsafe extern "C" fn process(
    handle: *mut Handle,
    samples_in: *const *const f64,
    samples_out: *const *mut f64,
    input_size: i64,
    output_size: *mut i64,
) -> c_int {
    with_instance(handle, |instance| {
        let count = input_size as usize;
        push(instance, samples_in, count);
        let ready = instance.queues[0].len().saturating_sub(DELAY).min(count);
        drain(instance, samples_out, ready);
        report(instance, ready, output_size);
        1
    })
}

unsafe extern "C" fn process_inplace(
    handle: *mut Handle,
    samples_in_out: *const *mut f64,
    input_size: i64,
    output_size: *mut i64,
) -> c_int {
    with_instance(handle, |instance| {
        let count = input_size as usize;
        push(instance, samples_in_out as *const *const f64, count);
        let ready = instance.queues[0].len().saturating_sub(DELAY).min(count);
        drain(instance, samples_in_out, ready);
        report(instance, ready, output_size);
        1
    })
}

unsafe extern "C" fn flush_buffer(
    handle: *mut Handle,
    samples_out: *const *mut f64,
    buffer_size: i64,
    output_size: *mut i64,
) -> c_int {
    with_instance(handle, |instance| {
        let ready = instance.queues[0].len().min(buffer_size as usize);
        drain(instance, samples_out, ready);
        report(instance, ready, output_size);
        1
    })
}

unsafe extern "C" fn reset(handle: *mut Handle) -> c_int {
    with_instance(handle, |instance| {
        instance.queues.iter_mut().for_each(VecDeque::clear);
        1
    })
}

unsafe extern "C" fn get_configuration(
    handle: *mut Handle,
    channels: *mut u32,
    sample_rate: *mut u32,
    frame_len: *mut u32,
    filter_size: *mut u32,
) -> c_int {
    with_instance(handle, |instance| {
        unsafe {
            *channels = instance.queues.len() as u32;
            *sample_rate = instance.sample_rate;
            // Frame length in samples, not milliseconds.
            *frame_len = instance.sample_rate / 1000 * instance.frame_len;
            *filter_size = instance.filter_size;
        }
        1
    })
}

unsafe extern "C" fn get_internal_delay(handle: *mut Handle, delay_in_samples: *mut i64) -> c_int {
    with_instance(handle, |_| {
        unsafe { *delay_in_samples = DELAY as i64 };
        1
    })
}

unsafe extern "C" fn get_version_info(major: *mut u32, minor: *mut u32, patch: *mut u32) {
    unsafe {
        *major = 2;
        *minor = 11;
        *patch = 0;
    }
}

unsafe extern "C" fn get_build_info(
    date: *mut *const c_char,
    time: *mut *const c_char,
    compiler: *mut *const c_char,
    arch: *mut *const c_char,
    debug: *mut c_int,
) {
    unsafe {
        *date = c"Jan  1 2025".as_ptr();
        *time = c"12:00:00".as_ptr();
        *compiler = c"rustc".as_ptr();
        *arch = std::ptr::null();
        *debug = 1;
    }
}

unsafe extern "C" fn set_log_function(_log_function: Option<LogFunction>) -> Option<LogFunction> {
    None
}
