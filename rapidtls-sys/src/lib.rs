//! Platform-specific bindings for rapidtls.
//!
//! This crate provides the coalescing signal pipe the data plane uses to
//! wake a descriptor-polling reactor (epoll, kqueue), plus the
//! registration hints for hooking it up. It is the one rapidtls crate
//! that talks to OS APIs directly.
//!
//! # Safety
//!
//! This crate contains `unsafe` code as it interfaces directly with OS
//! APIs; everything above it stays `forbid(unsafe_code)`.

#![allow(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, missing_debug_implementations)]

#[cfg(unix)]
pub mod signal;

#[cfg(unix)]
pub use signal::{OptionalSignalPipe, SignalPipe, SignalState};

/// Platform-specific error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Operation not supported on this platform
    Unsupported,

    /// System error with errno
    SystemError(i32),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Unsupported => write!(f, "Operation not supported on this platform"),
            Error::SystemError(errno) => write!(f, "System error: {}", errno),
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Capture the current `errno`.
    pub fn last_os_error() -> Self {
        Error::SystemError(std::io::Error::last_os_error().raw_os_error().unwrap_or(0))
    }
}

/// Result type for platform operations.
pub type Result<T> = std::result::Result<T, Error>;
