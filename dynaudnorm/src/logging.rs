// SPDX-FileCopyrightText: 2025 Contributors to the dynaudnorm-rs project.
// SPDX-License-Identifier: Apache-2.0

//! Routing of engine log messages.
//!
//! The engine reports diagnostics through one process-wide C callback. This
//! module registers a single `extern "C"` trampoline with the engine and
//! forwards every message to the Rust callback installed with
//! [`set_log_function`], or to `tracing` when none is installed.
//!
//! The engine may log from inside any instance call, so the callback has to be
//! installed before the first instance is created and stays in place until it
//! is replaced.

use std::{
    ffi::{CStr, c_char, c_int},
    sync::RwLock,
};

use crate::NormalizerApi;

/// Severity of an engine log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Warning,
    Error,
}

impl LogLevel {
    /// Maps a raw engine level; unknown values are treated as errors.
    pub fn from_raw(level: c_int) -> Self {
        match level {
            dynaudnorm_sys::LOG_LEVEL_DBG => LogLevel::Debug,
            dynaudnorm_sys::LOG_LEVEL_WRN => LogLevel::Warning,
            _ => LogLevel::Error,
        }
    }

    /// The engine's numeric level.
    pub fn as_raw(self) -> c_int {
        match self {
            LogLevel::Debug => dynaudnorm_sys::LOG_LEVEL_DBG,
            LogLevel::Warning => dynaudnorm_sys::LOG_LEVEL_WRN,
            LogLevel::Error => dynaudnorm_sys::LOG_LEVEL_ERR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

/// Callback receiving engine log messages.
pub type LogCallback = Box<dyn Fn(LogLevel, &str) + Send + Sync>;

static LOG_CALLBACK: RwLock<Option<LogCallback>> = RwLock::new(None);

/// Installs `callback` as the receiver of all engine log messages.
///
/// Passing `None` restores forwarding to `tracing`. The trampoline is
/// registered with the engine on every call, so it is safe to call this for
/// each loaded library.
///
/// The engine calls back while an engine operation is in progress, so the
/// callback must not call into the engine itself.
pub fn set_log_function(api: &NormalizerApi, callback: Option<LogCallback>) {
    *LOG_CALLBACK
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner()) = callback;
    unsafe { api.raw().set_log_function(Some(log_trampoline)) };
}

/// Delivers one message to the installed callback, or to `tracing`.
///
/// This is what the engine trampoline calls; it is public so front ends can
/// push their own messages through the same sink.
pub fn dispatch(level: LogLevel, message: &str) {
    let callback = LOG_CALLBACK
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    match callback.as_ref() {
        Some(callback) => callback(level, message),
        None => match level {
            LogLevel::Debug => tracing::debug!(target: "dynaudnorm::engine", "{}", message),
            LogLevel::Warning => tracing::warn!(target: "dynaudnorm::engine", "{}", message),
            LogLevel::Error => tracing::error!(target: "dynaudnorm::engine", "{}", message),
        },
    }
}

unsafe extern "C" fn log_trampoline(level: c_int, message: *const c_char) {
    if message.is_null() {
        return;
    }
    let message = unsafe { CStr::from_ptr(message) }.to_string_lossy();
    // Unwinding across the FFI boundary aborts, so a panicking callback is contained here.
    let _ = std::panic::catch_unwind(|| dispatch(LogLevel::from_raw(level), message.trim_end()));
}
