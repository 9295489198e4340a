//! # rapidtls: throughput-oriented TLS record layer
//!
//! rapidtls moves application bytes across an established TLS 1.2/1.3
//! session with zero-allocation steady-state I/O: pooled record buffers,
//! in-place AEAD decryption, and a coalescing signal pipe for
//! epoll/kqueue reactors.
//!
//! The handshake is an external collaborator behind the
//! [`HandshakeEngine`](handshake::HandshakeEngine) seam: it negotiates
//! the session (using the arena pool for its transient state) and hands
//! back traffic secrets; rapidtls owns everything after that.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rapidtls::{client, ClientOptions, RootStore};
//!
//! let stream = std::net::TcpStream::connect("example.com:443")?;
//!
//! let options = ClientOptions::builder("example.com")
//!     .with_root_store(RootStore::Platform)
//!     .build()?;
//!
//! // `engine` is your handshake implementation.
//! let mut conn = client(stream, options, &mut engine)?;
//! conn.write(b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n")?;
//! let mut response = [0u8; 4096];
//! let n = conn.read(&mut response)?;
//! conn.close()?;
//! ```
//!
//! For reactors that own their sockets, the
//! [`DetachedConnection`](rapidtls_core::detached::DetachedConnection)
//! variant leaves all I/O to the caller.

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    unused_qualifications
)]
#![forbid(unsafe_code)]

use std::io::{Read, Write};
use std::sync::Arc;

use rapidtls_core::arena::ArenaPool;
use rapidtls_core::cipher::Cipher;
use rapidtls_core::conn::Connection;
#[cfg(unix)]
use rapidtls_core::conn::WakeHook;
use rapidtls_crypto::CryptoProvider;
use rapidtls_crypto_rustcrypto::RustCryptoProvider;

// Re-export the layers underneath
pub use rapidtls_core::{
    self as core, CipherSuite, ContentType, Error, PlaneState, ProtocolVersion, Result,
    DEFAULT_CIPHER_SUITES,
};
pub use rapidtls_core::detached::DetachedConnection;
pub use rapidtls_core::zerocopy::ZeroCopySnapshot;
pub use rapidtls_crypto;
#[cfg(unix)]
pub use rapidtls_sys as sys;

pub mod client;
pub mod handshake;
pub mod server;

pub use client::ClientOptions;
pub use server::ServerOptions;

use handshake::{Established, HandshakeContext, HandshakeEngine};

/// Where trust anchors come from.
#[derive(Debug, Clone)]
pub enum RootStore {
    /// The platform certificate store, loaded by the handshake subsystem
    Platform,

    /// An explicit set of DER-encoded root certificates
    DerCertificates(Vec<Vec<u8>>),
}

/// Signal-pipe registration mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeMode {
    /// No signal pipe
    Disabled,

    /// Level-triggered registration (`EPOLLIN`)
    LevelTriggered,

    /// Edge-triggered registration (`EPOLLIN | EPOLLET` / `EV_CLEAR`)
    EdgeTriggered,
}

/// Establish a client connection over `stream`.
///
/// `engine` drives the handshake (with an arena scoped to it); the
/// negotiated secrets key the data plane. Pool bindings and the signal
/// pipe come from `options`.
pub fn client<S: Read + Write>(
    mut stream: S,
    options: ClientOptions,
    engine: &mut dyn HandshakeEngine,
) -> Result<TlsConnection<S>> {
    let setup = Setup::for_client(&options);
    let established =
        run_handshake(&mut stream, &setup, engine, HandshakeContext::for_client(&options))?;
    finish(stream, established, setup)
}

/// Establish a server connection over `stream`.
pub fn server<S: Read + Write>(
    mut stream: S,
    options: ServerOptions,
    engine: &mut dyn HandshakeEngine,
) -> Result<TlsConnection<S>> {
    let setup = Setup::for_server(&options);
    let established =
        run_handshake(&mut stream, &setup, engine, HandshakeContext::for_server(&options))?;
    finish(stream, established, setup)
}

/// Pool and wake bindings common to both roles.
struct Setup {
    buffer_pool: Option<Arc<rapidtls_core::pool::BufferPool>>,
    arena_pool: Option<Arc<ArenaPool>>,
    wake_mode: WakeMode,
}

impl Setup {
    fn for_client(options: &ClientOptions) -> Self {
        Self {
            buffer_pool: options.buffer_pool.clone(),
            arena_pool: options.arena_pool.clone(),
            wake_mode: options.wake_mode,
        }
    }

    fn for_server(options: &ServerOptions) -> Self {
        Self {
            buffer_pool: options.buffer_pool.clone(),
            arena_pool: options.arena_pool.clone(),
            wake_mode: options.wake_mode,
        }
    }
}

fn run_handshake<S: Read + Write>(
    stream: &mut S,
    setup: &Setup,
    engine: &mut dyn HandshakeEngine,
    context: HandshakeContext<'_>,
) -> Result<Established> {
    let arenas = setup.arena_pool.clone().unwrap_or_else(ArenaPool::new);
    // The arena returns to its pool when this scope ends; nothing
    // handshake-allocated survives into the data plane.
    let mut arena = arenas.acquire();
    engine.establish(stream, context, &mut arena)
}

fn finish<S: Read + Write>(
    stream: S,
    established: Established,
    setup: Setup,
) -> Result<TlsConnection<S>> {
    log::debug!("session established: {}", established.suite.name());

    let provider = RustCryptoProvider::new();
    let cipher = Cipher::new(&provider, established.suite, established.secrets)?;
    let inner = match &setup.buffer_pool {
        Some(pool) => Connection::with_pool(stream, cipher, Arc::clone(pool))?,
        None => Connection::new(stream, cipher),
    };

    let mut conn = TlsConnection {
        inner,
        #[cfg(unix)]
        pipe: None,
    };
    match setup.wake_mode {
        WakeMode::Disabled => {},
        WakeMode::LevelTriggered => conn.attach_signal_pipe(false)?,
        WakeMode::EdgeTriggered => conn.attach_signal_pipe(true)?,
    }
    Ok(conn)
}

/// Wrap an already-keyed cipher without running a handshake. Intended for
/// tests and for callers that negotiated out of band.
pub fn from_cipher<S: Read + Write>(stream: S, cipher: Cipher) -> TlsConnection<S> {
    TlsConnection {
        inner: Connection::new(stream, cipher),
        #[cfg(unix)]
        pipe: None,
    }
}

/// A blocking TLS connection.
///
/// Wraps the core data plane and, when requested, a platform signal pipe
/// that pulses on readiness edges so an external reactor can schedule
/// around blocking calls made elsewhere.
#[derive(Debug)]
pub struct TlsConnection<S> {
    inner: Connection<S>,
    #[cfg(unix)]
    pipe: Option<Arc<rapidtls_sys::SignalPipe>>,
}

impl<S: Read + Write> TlsConnection<S> {
    /// Read decrypted application data. `Ok(0)` is EOF.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf)
    }

    /// Encrypt and send application data.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.inner.write(buf)
    }

    /// Send close_notify and close the connection.
    pub fn close(&mut self) -> Result<()> {
        self.inner.close()
    }

    /// The negotiated cipher suite.
    pub fn suite(&self) -> CipherSuite {
        self.inner.suite()
    }

    /// Current data-plane state.
    pub fn state(&self) -> PlaneState {
        self.inner.state()
    }

    /// Snapshot of the zero-copy engine counters.
    pub fn zero_copy_stats(&self) -> ZeroCopySnapshot {
        self.inner.zero_copy_stats()
    }

    /// Access the core connection (key updates, handshake spillover).
    pub fn plane(&mut self) -> &mut Connection<S> {
        &mut self.inner
    }

    #[cfg(unix)]
    fn attach_signal_pipe(&mut self, edge_triggered: bool) -> Result<()> {
        let pipe = if edge_triggered {
            rapidtls_sys::SignalPipe::new_edge_triggered()
        } else {
            rapidtls_sys::SignalPipe::new()
        }
        .map_err(pipe_error)?;
        let pipe = Arc::new(pipe);
        self.inner.set_wake_hook(Box::new(PipeWake(Arc::clone(&pipe))));
        self.pipe = Some(pipe);
        Ok(())
    }

    #[cfg(not(unix))]
    fn attach_signal_pipe(&mut self, _edge_triggered: bool) -> Result<()> {
        Err(Error::InvalidConfig(
            "signal pipe requires a descriptor-polling platform".into(),
        ))
    }

    /// The signal pipe descriptor for reactor registration, or `-1` if no
    /// pipe is attached.
    #[cfg(unix)]
    pub fn wake_fd(&self) -> std::os::unix::io::RawFd {
        self.pipe.as_ref().map_or(-1, |pipe| pipe.raw_fd())
    }

    /// Consume an outstanding wake after the reactor serviced it.
    #[cfg(unix)]
    pub fn clear_wake(&self) {
        if let Some(pipe) = &self.pipe {
            pipe.clear();
        }
    }
}

impl<S: Read + Write> Read for TlsConnection<S> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        TlsConnection::read(self, buf).map_err(std::io::Error::from)
    }
}

impl<S: Read + Write> Write for TlsConnection<S> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        TlsConnection::write(self, buf).map_err(std::io::Error::from)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(unix)]
struct PipeWake(Arc<rapidtls_sys::SignalPipe>);

#[cfg(unix)]
impl WakeHook for PipeWake {
    fn data_available(&self) {
        self.0.signal();
    }

    fn send_pending(&self) {
        self.0.signal();
    }
}

#[cfg(unix)]
fn pipe_error(err: rapidtls_sys::Error) -> Error {
    Error::Io {
        kind: std::io::ErrorKind::Other,
        message: err.to_string(),
    }
}
