//! Blocking connection data plane.
//!
//! A [`Connection`] owns a transport and a keyed [`Cipher`] and moves
//! application bytes across it as protected records. Application data is
//! the hot path; alerts, handshake messages (KeyUpdate detection), and
//! change-cipher-spec tolerance live on a cold path.
//!
//! The encrypt and decrypt pipelines share no mutable cipher state, so a
//! connection can be [split](Connection::into_split) into halves driven
//! from two threads.

use std::io::{self, Read, Write};
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rapidtls_crypto::CryptoProvider;

use crate::alert::{Alert, AlertDescription};
use crate::cipher::{Cipher, DirectionSecrets, OpenState, SealState};
use crate::error::{Error, Result};
use crate::pool::{BufferPool, PooledBuffer};
use crate::protocol::{ContentType, HandshakeType, ProtocolVersion};
use crate::record::{
    read_record_from, RecordHeader, MAX_CIPHERTEXT_RECORD_LEN, MAX_PLAINTEXT_RECORD_LEN,
    RECORD_HEADER_LEN,
};
use crate::suite::CipherSuite;
use crate::zerocopy::{self, ZeroCopyEngine, ZeroCopySnapshot};

/// Upper bound on buffered peer handshake bytes awaiting the handshake
/// subsystem. A peer that streams handshake messages past this is broken
/// or hostile.
const MAX_BUFFERED_HANDSHAKE: usize = 64 * 1024;

/// Connection data-plane state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneState {
    /// Ready for either direction
    Idle,

    /// An encrypt call is running
    EncryptInProgress,

    /// A read/decrypt call is running
    DecryptInProgress,

    /// close_notify observed or sent; EOF from here on
    Closed,

    /// A fatal error retired the data plane
    Failed,
}

/// Readiness edges the data plane can report to an external reactor.
///
/// The signal pipe in the platform crate is the intended implementation;
/// anything `Send` works.
pub trait WakeHook: Send {
    /// Decrypted plaintext is buffered and ready to drain.
    fn data_available(&self);

    /// Encrypted output was handed to the transport.
    fn send_pending(&self);
}

/// State shared between split halves.
#[derive(Debug, Default)]
struct SharedState {
    failed: AtomicBool,
    closed: AtomicBool,
    /// Alert the read half wants sent; the write half flushes it.
    pending_alert: Mutex<Option<AlertDescription>>,
}

impl SharedState {
    fn is_failed(&self) -> bool {
        self.failed.load(Ordering::Acquire)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn set_failed(&self) {
        self.failed.store(true, Ordering::Release);
    }

    fn set_closed(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

enum RecvBuffer {
    Empty,
    Pooled(PooledBuffer),
    /// Over-allocated so the window at `offset` is aligned, same as the
    /// pool's buffers; otherwise arbitrary heap placement would push the
    /// hot path off in-place decryption.
    Owned { buf: Vec<u8>, offset: usize },
}

impl RecvBuffer {
    fn owned() -> Self {
        let buf = vec![0u8; MAX_CIPHERTEXT_RECORD_LEN + zerocopy::DEFAULT_ALIGNMENT];
        let offset =
            (buf.as_ptr() as usize).wrapping_neg() & (zerocopy::DEFAULT_ALIGNMENT - 1);
        RecvBuffer::Owned { buf, offset }
    }

    fn slice(&self) -> &[u8] {
        match self {
            RecvBuffer::Empty => &[],
            RecvBuffer::Pooled(buf) => buf.as_slice(),
            RecvBuffer::Owned { buf, offset } => {
                &buf[*offset..*offset + MAX_CIPHERTEXT_RECORD_LEN]
            },
        }
    }

    fn slice_mut(&mut self) -> &mut [u8] {
        match self {
            RecvBuffer::Empty => &mut [],
            RecvBuffer::Pooled(buf) => buf.as_mut_slice(),
            RecvBuffer::Owned { buf, offset } => {
                &mut buf[*offset..*offset + MAX_CIPHERTEXT_RECORD_LEN]
            },
        }
    }
}

/// The decrypt pipeline: record reader, zero-copy engine, buffered
/// plaintext, and peer handshake spillover.
struct RecvPipeline {
    open: OpenState,
    engine: ZeroCopyEngine,
    pool: Option<Arc<BufferPool>>,
    buf: RecvBuffer,
    /// Undrained plaintext within `buf`
    plain: Range<usize>,
    /// Peer handshake bytes awaiting the handshake subsystem
    handshake_buf: Vec<u8>,
    key_update_seen: bool,
}

impl RecvPipeline {
    fn new(open: OpenState, pool: Option<Arc<BufferPool>>) -> Self {
        Self {
            open,
            engine: ZeroCopyEngine::new(),
            pool,
            buf: RecvBuffer::Empty,
            plain: 0..0,
            handshake_buf: Vec::new(),
            key_update_seen: false,
        }
    }

    /// Bind a record-sized buffer for the next exchange.
    fn ensure_buffer(&mut self) {
        if matches!(self.buf, RecvBuffer::Empty) {
            self.buf = match &self.pool {
                Some(pool) => RecvBuffer::Pooled(pool.acquire()),
                None => RecvBuffer::owned(),
            };
        }
    }

    /// Copy buffered plaintext out; release the pooled buffer once the
    /// record exchange is fully drained.
    fn drain(&mut self, out: &mut [u8]) -> usize {
        let n = out.len().min(self.plain.len());
        let src = self.buf.slice();
        out[..n].copy_from_slice(&src[self.plain.start..self.plain.start + n]);
        self.plain.start += n;
        if self.plain.is_empty() {
            if let RecvBuffer::Pooled(_) = self.buf {
                self.buf = RecvBuffer::Empty;
            }
            self.plain = 0..0;
        }
        n
    }

    fn has_buffered_plaintext(&self) -> bool {
        !self.plain.is_empty()
    }

    /// Read and decrypt records until application data is delivered, EOF,
    /// or an error. Returns bytes copied into `out` (0 means EOF).
    fn read_into<R: Read>(
        &mut self,
        io: &mut R,
        out: &mut [u8],
        shared: &SharedState,
    ) -> Result<usize> {
        if self.has_buffered_plaintext() {
            return Ok(self.drain(out));
        }
        if out.is_empty() {
            return Ok(0);
        }

        loop {
            self.ensure_buffer();
            let scratch = self.buf.slice_mut();
            let header = match read_record_from(io, scratch)? {
                Some(header) => header,
                None => {
                    // Truncation without close_notify; surfaced as EOF but
                    // worth a note.
                    log::debug!("transport EOF without close_notify");
                    shared.set_closed();
                    return Ok(0);
                },
            };

            let payload = &mut scratch[..header.length as usize];
            let version = self.open.suite().protocol_version();

            if header.content_type == ContentType::ChangeCipherSpec {
                check_change_cipher_spec(version, &header, payload)?;
                continue;
            }
            if version == ProtocolVersion::Tls13
                && header.content_type != ContentType::ApplicationData
            {
                return Err(Error::Unexpected(format!(
                    "plaintext {:?} record after the handshake",
                    header.content_type
                )));
            }

            let decrypted = self.engine.decrypt_in_place(&mut self.open, &header, payload)?;
            match decrypted.content_type {
                ContentType::ApplicationData => {
                    if decrypted.plaintext.is_empty() {
                        continue;
                    }
                    self.plain = decrypted.plaintext;
                    return Ok(self.drain(out));
                },
                ContentType::Alert => {
                    let range = decrypted.plaintext;
                    if range.len() != 2 {
                        return Err(Error::Decode("alert record of wrong length".into()));
                    }
                    let bytes = [payload[range.start], payload[range.start + 1]];
                    match process_alert(&bytes, shared)? {
                        ControlFlow::Eof => return Ok(0),
                        ControlFlow::Continue => continue,
                    }
                },
                ContentType::Handshake => {
                    let range = decrypted.plaintext;
                    stash_handshake(
                        &mut self.handshake_buf,
                        &mut self.key_update_seen,
                        &payload[range],
                    )?;
                    continue;
                },
                ContentType::ChangeCipherSpec => {
                    return Err(Error::Unexpected(
                        "encrypted change_cipher_spec record".into(),
                    ));
                },
            }
        }
    }
}

enum ControlFlow {
    Continue,
    Eof,
}

/// TLS 1.3 middlebox compatibility: a plaintext CCS of exactly one 0x01
/// byte may appear and is dropped; anything else is an error.
#[cold]
fn check_change_cipher_spec(
    version: ProtocolVersion,
    header: &RecordHeader,
    payload: &[u8],
) -> Result<()> {
    if version != ProtocolVersion::Tls13 {
        return Err(Error::Unexpected(
            "change_cipher_spec after the handshake".into(),
        ));
    }
    if header.length != 1 || payload[0] != 0x01 {
        return Err(Error::Decode("malformed change_cipher_spec".into()));
    }
    log::trace!("dropping compatibility change_cipher_spec");
    Ok(())
}

#[cold]
fn process_alert(bytes: &[u8; 2], shared: &SharedState) -> Result<ControlFlow> {
    let alert = Alert::decode(bytes)?;
    if alert.description == AlertDescription::CloseNotify {
        log::debug!("peer sent close_notify");
        shared.set_closed();
        return Ok(ControlFlow::Eof);
    }
    if alert.is_fatal() {
        log::debug!("peer sent fatal alert: {:?}", alert.description);
        return Err(Error::AlertReceived(alert.description));
    }
    log::debug!("ignoring warning alert: {:?}", alert.description);
    Ok(ControlFlow::Continue)
}

/// Buffer peer handshake bytes for the handshake subsystem. KeyUpdate
/// detection is an auxiliary check; the actual rekey happens elsewhere.
#[cold]
fn stash_handshake(
    handshake_buf: &mut Vec<u8>,
    key_update_seen: &mut bool,
    plaintext: &[u8],
) -> Result<()> {
    if handshake_buf.len() + plaintext.len() > MAX_BUFFERED_HANDSHAKE {
        return Err(Error::Unexpected(
            "peer handshake data exceeds buffering limit".into(),
        ));
    }
    if let Some(HandshakeType::KeyUpdate) =
        plaintext.first().copied().and_then(HandshakeType::from_u8)
    {
        log::debug!("peer requested key update");
        *key_update_seen = true;
    }
    handshake_buf.extend_from_slice(plaintext);
    Ok(())
}

/// The encrypt pipeline: fragmentation and record staging.
struct SendPipeline {
    seal: SealState,
    pool: Option<Arc<BufferPool>>,
    scratch: Vec<u8>,
}

impl SendPipeline {
    fn new(seal: SealState, pool: Option<Arc<BufferPool>>) -> Self {
        let scratch = match pool {
            // Pooled buffers are acquired per write call instead.
            Some(_) => Vec::new(),
            None => vec![0u8; RECORD_HEADER_LEN + MAX_CIPHERTEXT_RECORD_LEN],
        };
        Self { seal, pool, scratch }
    }

    /// Encrypt `data` record by record and write every byte to `io`.
    fn write_all<W: Write>(&mut self, io: &mut W, data: &[u8]) -> Result<usize> {
        let mut pooled = self.pool.as_ref().map(|pool| pool.acquire());
        for chunk in data.chunks(MAX_PLAINTEXT_RECORD_LEN) {
            let scratch = match pooled.as_mut() {
                Some(buf) => buf.as_mut_slice(),
                None => self.scratch.as_mut_slice(),
            };
            let n = self.seal.encrypt(ContentType::ApplicationData, chunk, scratch)?;
            io.write_all(&scratch[..n])?;
        }
        Ok(data.len())
    }

    /// Encrypt and write one alert record.
    fn send_alert<W: Write>(&mut self, io: &mut W, alert: Alert) -> Result<()> {
        let mut pooled = self.pool.as_ref().map(|pool| pool.acquire());
        let scratch = match pooled.as_mut() {
            Some(buf) => buf.as_mut_slice(),
            None => self.scratch.as_mut_slice(),
        };
        let n = self.seal.encrypt(ContentType::Alert, &alert.encode(), scratch)?;
        io.write_all(&scratch[..n])?;
        io.flush()?;
        Ok(())
    }
}

/// A blocking TLS connection data plane over transport `S`.
pub struct Connection<S> {
    io: S,
    recv: RecvPipeline,
    send: SendPipeline,
    shared: Arc<SharedState>,
    state: PlaneState,
    wake: Option<Box<dyn WakeHook>>,
}

impl<S> std::fmt::Debug for Connection<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("suite", &self.send.seal.suite())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<S> Connection<S> {
    /// Current data-plane state.
    pub fn state(&self) -> PlaneState {
        if self.shared.is_failed() {
            PlaneState::Failed
        } else if self.shared.is_closed() {
            PlaneState::Closed
        } else {
            self.state
        }
    }
}

impl<S: Read + Write> Connection<S> {
    /// Build a connection from a transport and a keyed cipher, using
    /// owned (non-pooled) record buffers.
    pub fn new(io: S, cipher: Cipher) -> Self {
        let (seal, open) = cipher.split();
        Self {
            io,
            recv: RecvPipeline::new(open, None),
            send: SendPipeline::new(seal, None),
            shared: Arc::new(SharedState::default()),
            state: PlaneState::Idle,
            wake: None,
        }
    }

    /// Build a connection whose record buffers come from `pool`.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if the pool's buffers cannot hold a maximum-size
    /// protected record.
    pub fn with_pool(io: S, cipher: Cipher, pool: Arc<BufferPool>) -> Result<Self> {
        if pool.buffer_size() < RECORD_HEADER_LEN + MAX_CIPHERTEXT_RECORD_LEN {
            return Err(Error::InvalidConfig(format!(
                "pool buffers of {} bytes cannot hold a {}-byte record",
                pool.buffer_size(),
                RECORD_HEADER_LEN + MAX_CIPHERTEXT_RECORD_LEN
            )));
        }
        let (seal, open) = cipher.split();
        Ok(Self {
            io,
            recv: RecvPipeline::new(open, Some(Arc::clone(&pool))),
            send: SendPipeline::new(seal, Some(pool)),
            shared: Arc::new(SharedState::default()),
            state: PlaneState::Idle,
            wake: None,
        })
    }

    /// The negotiated cipher suite.
    pub fn suite(&self) -> CipherSuite {
        self.send.seal.suite()
    }

    /// Snapshot of the zero-copy engine counters.
    pub fn zero_copy_stats(&self) -> ZeroCopySnapshot {
        self.recv.engine.stats()
    }

    /// Install a readiness hook (typically the platform signal pipe).
    pub fn set_wake_hook(&mut self, hook: Box<dyn WakeHook>) {
        self.wake = Some(hook);
    }

    /// Whether the peer requested a key update that the handshake
    /// subsystem has not serviced yet.
    pub fn key_update_pending(&self) -> bool {
        self.recv.key_update_seen
    }

    /// Take buffered peer handshake bytes (KeyUpdate, NewSessionTicket)
    /// for the handshake subsystem.
    pub fn take_handshake_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.recv.handshake_buf)
    }

    /// Install new receive keys; clears the pending key-update flag.
    pub fn rekey_recv(
        &mut self,
        provider: &dyn CryptoProvider,
        secrets: &DirectionSecrets,
    ) -> Result<()> {
        self.recv.open.rekey(provider, secrets)?;
        self.recv.key_update_seen = false;
        Ok(())
    }

    /// Install new send keys.
    pub fn rekey_send(
        &mut self,
        provider: &dyn CryptoProvider,
        secrets: &DirectionSecrets,
    ) -> Result<()> {
        self.send.seal.rekey(provider, secrets)
    }

    /// Shared reference to the transport.
    pub fn get_ref(&self) -> &S {
        &self.io
    }

    /// Mutable reference to the transport.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.io
    }

    fn check_usable(&self) -> Result<()> {
        match self.state() {
            PlaneState::Failed => Err(Error::Unexpected("connection already failed".into())),
            _ => Ok(()),
        }
    }

    /// Fail the connection: best-effort alert, then terminal state.
    fn fail(&mut self, err: Error) -> Error {
        if let Some(description) = err.to_alert() {
            // Alert delivery is best effort; the connection is going away
            // either way.
            let _ = self.send.send_alert(&mut self.io, Alert::fatal(description));
        }
        self.shared.set_failed();
        self.state = PlaneState::Failed;
        err
    }

    /// Read decrypted application data. `Ok(0)` is EOF (close_notify or
    /// transport end).
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_usable()?;
        if self.state() == PlaneState::Closed {
            return Ok(0);
        }

        self.state = PlaneState::DecryptInProgress;
        match self.recv.read_into(&mut self.io, buf, &self.shared) {
            Ok(n) => {
                self.state = PlaneState::Idle;
                if self.recv.has_buffered_plaintext() {
                    if let Some(wake) = &self.wake {
                        wake.data_available();
                    }
                }
                Ok(n)
            },
            Err(err) if err.is_fatal() => Err(self.fail(err)),
            Err(err) => {
                self.state = PlaneState::Idle;
                Err(err)
            },
        }
    }

    /// Encrypt and write all of `buf` as protected records.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.check_usable()?;
        if self.state() == PlaneState::Closed {
            return Err(Error::Unexpected("write after close".into()));
        }

        self.state = PlaneState::EncryptInProgress;
        match self.send.write_all(&mut self.io, buf) {
            Ok(n) => {
                self.state = PlaneState::Idle;
                if let Some(wake) = &self.wake {
                    wake.send_pending();
                }
                Ok(n)
            },
            Err(err) if err.is_fatal() => Err(self.fail(err)),
            Err(err) => {
                self.state = PlaneState::Idle;
                Err(err)
            },
        }
    }

    /// Send close_notify and close the data plane.
    pub fn close(&mut self) -> Result<()> {
        if matches!(self.state(), PlaneState::Closed | PlaneState::Failed) {
            return Ok(());
        }
        let result = self.send.send_alert(&mut self.io, Alert::close_notify());
        self.shared.set_closed();
        self.state = PlaneState::Closed;
        result
    }

    /// Split into independently driven halves.
    ///
    /// `write_io` is a second handle to the same transport (for
    /// `TcpStream`, a `try_clone`). The read half keeps the original.
    pub fn into_split(self, write_io: S) -> (ReadHalf<S>, WriteHalf<S>) {
        let shared = Arc::clone(&self.shared);
        (
            ReadHalf {
                io: self.io,
                recv: self.recv,
                shared: Arc::clone(&shared),
            },
            WriteHalf {
                io: write_io,
                send: self.send,
                shared,
            },
        )
    }
}

impl<S: Read + Write> Read for Connection<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Connection::read(self, buf).map_err(io::Error::from)
    }
}

impl<S: Read + Write> Write for Connection<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Connection::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.io.flush()
    }
}

/// The decrypt half of a split connection.
pub struct ReadHalf<S> {
    io: S,
    recv: RecvPipeline,
    shared: Arc<SharedState>,
}

impl<S> std::fmt::Debug for ReadHalf<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadHalf").finish_non_exhaustive()
    }
}

impl<S: Read> ReadHalf<S> {
    /// Read decrypted application data; see [`Connection::read`].
    ///
    /// On a fatal error the half cannot emit the alert itself (the send
    /// keys live on the write half); it parks the alert for the write
    /// half to flush.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.shared.is_failed() {
            return Err(Error::Unexpected("connection already failed".into()));
        }
        if self.shared.is_closed() && !self.recv.has_buffered_plaintext() {
            return Ok(0);
        }

        match self.recv.read_into(&mut self.io, buf, &self.shared) {
            Ok(n) => Ok(n),
            Err(err) => {
                if err.is_fatal() {
                    if let Some(description) = err.to_alert() {
                        *self
                            .shared
                            .pending_alert
                            .lock()
                            .expect("alert slot poisoned") = Some(description);
                    }
                    self.shared.set_failed();
                }
                Err(err)
            },
        }
    }

    /// Whether the peer requested a key update.
    pub fn key_update_pending(&self) -> bool {
        self.recv.key_update_seen
    }

    /// Take buffered peer handshake bytes.
    pub fn take_handshake_data(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.recv.handshake_buf)
    }

    /// Snapshot of the zero-copy engine counters.
    pub fn zero_copy_stats(&self) -> ZeroCopySnapshot {
        self.recv.engine.stats()
    }
}

impl<S: Read> Read for ReadHalf<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ReadHalf::read(self, buf).map_err(io::Error::from)
    }
}

/// The encrypt half of a split connection.
pub struct WriteHalf<S> {
    io: S,
    send: SendPipeline,
    shared: Arc<SharedState>,
}

impl<S> std::fmt::Debug for WriteHalf<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteHalf").finish_non_exhaustive()
    }
}

impl<S: Write> WriteHalf<S> {
    /// Flush an alert parked by the read half, if any.
    fn flush_pending_alert(&mut self) {
        let pending = self
            .shared
            .pending_alert
            .lock()
            .expect("alert slot poisoned")
            .take();
        if let Some(description) = pending {
            let _ = self.send.send_alert(&mut self.io, Alert::fatal(description));
        }
    }

    /// Encrypt and write all of `buf`; see [`Connection::write`].
    pub fn write(&mut self, buf: &[u8]) -> Result<usize> {
        if self.shared.is_failed() {
            self.flush_pending_alert();
            return Err(Error::Unexpected("connection already failed".into()));
        }
        if self.shared.is_closed() {
            return Err(Error::Unexpected("write after close".into()));
        }

        match self.send.write_all(&mut self.io, buf) {
            Ok(n) => Ok(n),
            Err(err) => {
                if err.is_fatal() {
                    self.shared.set_failed();
                }
                Err(err)
            },
        }
    }

    /// Send close_notify and close the data plane.
    pub fn close(&mut self) -> Result<()> {
        self.flush_pending_alert();
        if self.shared.is_failed() || self.shared.is_closed() {
            self.shared.set_closed();
            return Ok(());
        }
        let result = self.send.send_alert(&mut self.io, Alert::close_notify());
        self.shared.set_closed();
        result
    }
}

impl<S: Write> Write for WriteHalf<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        WriteHalf::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.io.flush()
    }
}
