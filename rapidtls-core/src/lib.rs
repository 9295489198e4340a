//! # rapidtls Core
//!
//! The rapidtls connection data plane: everything needed to move
//! application bytes across an established TLS 1.2/1.3 session with
//! zero-allocation steady-state I/O.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │         Public API (rapidtls)           │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │      rapidtls-core (this crate)         │
//! │  ┌──────────────────────────────────┐   │
//! │  │   Connection state machine       │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Record plane + cipher state    │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Zero-copy decryption engine    │   │
//! │  ├──────────────────────────────────┤   │
//! │  │   Buffer / arena pools           │   │
//! │  └──────────────────────────────────┘   │
//! └─────────────────┬───────────────────────┘
//!                   │
//! ┌─────────────────▼───────────────────────┐
//! │     rapidtls-crypto (trait interface)   │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The handshake state machine and certificate validation are external
//! collaborators: they consume the [`arena`] pool during negotiation and
//! hand a keyed [`cipher::Cipher`] to this crate's [`conn::Connection`].

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    unused_qualifications
)]
#![forbid(unsafe_code)]

// Re-export crypto interface
pub use rapidtls_crypto;

// Core modules
pub mod alert;
pub mod arena;
pub mod cipher;
pub mod conn;
pub mod detached;
pub mod error;
pub mod pool;
pub mod protocol;
pub mod record;
pub mod suite;
pub mod zerocopy;

// Re-exports
pub use cipher::{Cipher, DirectionSecrets, SessionSecrets};
pub use conn::{Connection, PlaneState};
pub use error::{Error, Result};
pub use protocol::{ContentType, ProtocolVersion};
pub use suite::{CipherSuite, DEFAULT_CIPHER_SUITES};
