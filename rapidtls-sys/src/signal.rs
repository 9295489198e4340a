//! Coalescing signal pipe.
//!
//! A wake primitive for descriptor-polling reactors: the data plane calls
//! [`SignalPipe::signal`] whenever output is produced or buffered input is
//! ready, the reactor polls the descriptor and calls
//! [`SignalPipe::clear`] when it services the wake. However many logical
//! signals coalesce between clears, at most one byte sits in the kernel
//! buffer: a compare-and-swap on a three-state word elects exactly one
//! writer.
//!
//! On Linux the pipe is backed by `eventfd` when available (a single
//! descriptor with counter semantics); otherwise by `pipe2`, and on other
//! Unix systems by `pipe` plus `fcntl`. All descriptors are created
//! non-blocking and close-on-exec, atomically where the OS supports it.

use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::{Error, Result};

/// Signal pipe state word values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SignalState {
    /// No wake outstanding
    Idle = 0,

    /// A signaler won the CAS and is about to write
    Pending = 1,

    /// The wake byte is in the kernel buffer
    Sent = 2,
}

const IDLE: u32 = SignalState::Idle as u32;
const PENDING: u32 = SignalState::Pending as u32;
const SENT: u32 = SignalState::Sent as u32;

enum Backend {
    /// Single eventfd descriptor (Linux)
    #[cfg(target_os = "linux")]
    EventFd(RawFd),

    /// Classic pipe pair: (read, write)
    Pipe(RawFd, RawFd),
}

/// A coalescing wake primitive usable from epoll/kqueue.
pub struct SignalPipe {
    backend: Backend,
    state: AtomicU32,
    edge_triggered: bool,
}

impl std::fmt::Debug for SignalPipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalPipe")
            .field("fd", &self.raw_fd())
            .field("edge_triggered", &self.edge_triggered)
            .finish_non_exhaustive()
    }
}

impl SignalPipe {
    /// Create a pipe for level-triggered registration.
    pub fn new() -> Result<Self> {
        Self::with_mode(false)
    }

    /// Create a pipe for edge-triggered registration (`EPOLLET` /
    /// `EV_CLEAR`); [`clear`](Self::clear) then drains to `EAGAIN`.
    pub fn new_edge_triggered() -> Result<Self> {
        Self::with_mode(true)
    }

    fn with_mode(edge_triggered: bool) -> Result<Self> {
        Ok(Self {
            backend: create_backend()?,
            state: AtomicU32::new(IDLE),
            edge_triggered,
        })
    }

    /// The descriptor to register with the reactor.
    pub fn raw_fd(&self) -> RawFd {
        match self.backend {
            #[cfg(target_os = "linux")]
            Backend::EventFd(fd) => fd,
            Backend::Pipe(read_fd, _) => read_fd,
        }
    }

    /// Whether the pipe was created for edge-triggered registration.
    pub fn is_edge_triggered(&self) -> bool {
        self.edge_triggered
    }

    /// Record a wake. Concurrent calls coalesce: only the caller that
    /// moves the state off `Idle` writes to the kernel.
    pub fn signal(&self) {
        if self
            .state
            .compare_exchange(IDLE, PENDING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            if let Err(err) = self.write_wake_byte() {
                // The reactor will still observe is_pending(); losing the
                // kernel byte only costs a poll wakeup.
                log::warn!("signal pipe write failed: {}", err);
            }
            self.state.store(SENT, Ordering::Release);
        }
    }

    /// Consume an outstanding wake, draining the kernel buffer if the
    /// wake byte was written.
    pub fn clear(&self) {
        match self.state.swap(IDLE, Ordering::AcqRel) {
            SENT => self.drain(),
            // Pending: the elected writer has not written yet; its byte
            // will be picked up by the next clear.
            _ => {},
        }
    }

    /// Whether a wake is outstanding.
    pub fn is_pending(&self) -> bool {
        self.state.load(Ordering::Acquire) != IDLE
    }

    /// Current state word, for diagnostics.
    pub fn state(&self) -> SignalState {
        match self.state.load(Ordering::Acquire) {
            PENDING => SignalState::Pending,
            SENT => SignalState::Sent,
            _ => SignalState::Idle,
        }
    }

    fn write_wake_byte(&self) -> Result<()> {
        match self.backend {
            #[cfg(target_os = "linux")]
            Backend::EventFd(fd) => write_retrying(fd, &1u64.to_ne_bytes()),
            Backend::Pipe(_, write_fd) => write_retrying(write_fd, &[1u8]),
        }
    }

    fn drain(&self) {
        let fd = self.raw_fd();
        let mut buf = [0u8; 8];
        loop {
            let rc =
                unsafe { libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
            if rc < 0 {
                let err = std::io::Error::last_os_error();
                if err.raw_os_error() == Some(libc::EINTR) {
                    continue;
                }
                // EAGAIN: empty, done.
                return;
            }
            // Level-triggered needs a single read; edge-triggered must
            // drain to EAGAIN before the next edge can fire.
            if !self.edge_triggered {
                return;
            }
        }
    }

    /// epoll interest flags for registering [`raw_fd`](Self::raw_fd).
    #[cfg(target_os = "linux")]
    pub fn epoll_interest(&self) -> u32 {
        let mut events = libc::EPOLLIN as u32;
        if self.edge_triggered {
            events |= libc::EPOLLET as u32;
        }
        events
    }

    /// kqueue flags for registering [`raw_fd`](Self::raw_fd) with
    /// `EVFILT_READ`.
    #[cfg(any(
        target_os = "macos",
        target_os = "freebsd",
        target_os = "netbsd",
        target_os = "openbsd"
    ))]
    pub fn kevent_flags(&self) -> u16 {
        let mut flags = (libc::EV_ADD | libc::EV_ENABLE) as u16;
        if self.edge_triggered {
            flags |= libc::EV_CLEAR as u16;
        }
        flags
    }
}

impl Drop for SignalPipe {
    fn drop(&mut self) {
        unsafe {
            match self.backend {
                #[cfg(target_os = "linux")]
                Backend::EventFd(fd) => {
                    libc::close(fd);
                },
                Backend::Pipe(read_fd, write_fd) => {
                    libc::close(read_fd);
                    libc::close(write_fd);
                },
            }
        }
    }
}

fn write_retrying(fd: RawFd, buf: &[u8]) -> Result<()> {
    loop {
        let rc = unsafe { libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len()) };
        if rc >= 0 {
            return Ok(());
        }
        match std::io::Error::last_os_error().raw_os_error() {
            Some(libc::EINTR) => continue,
            // A full pipe still wakes the reader.
            Some(libc::EAGAIN) => return Ok(()),
            _ => return Err(Error::last_os_error()),
        }
    }
}

#[cfg(target_os = "linux")]
fn create_backend() -> Result<Backend> {
    // eventfd: one descriptor, counter semantics, same coalesced contract.
    let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
    if fd >= 0 {
        return Ok(Backend::EventFd(fd));
    }
    log::debug!("eventfd unavailable, falling back to pipe2");

    let mut fds = [0 as RawFd; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
    if rc == 0 {
        return Ok(Backend::Pipe(fds[0], fds[1]));
    }
    Err(Error::last_os_error())
}

#[cfg(all(unix, not(target_os = "linux")))]
fn create_backend() -> Result<Backend> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe(fds.as_mut_ptr()) } != 0 {
        return Err(Error::last_os_error());
    }
    for &fd in &fds {
        if let Err(err) = set_nonblocking_cloexec(fd) {
            unsafe {
                libc::close(fds[0]);
                libc::close(fds[1]);
            }
            return Err(err);
        }
    }
    Ok(Backend::Pipe(fds[0], fds[1]))
}

#[cfg(all(unix, not(target_os = "linux")))]
fn set_nonblocking_cloexec(fd: RawFd) -> Result<()> {
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        if flags < 0 || libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
            return Err(Error::last_os_error());
        }
        let fd_flags = libc::fcntl(fd, libc::F_GETFD);
        if fd_flags < 0 || libc::fcntl(fd, libc::F_SETFD, fd_flags | libc::FD_CLOEXEC) < 0 {
            return Err(Error::last_os_error());
        }
    }
    Ok(())
}

/// A signal pipe that compiles down to a no-op when disabled.
///
/// With `ENABLED = false` no descriptors are created, `raw_fd` reports
/// `-1`, and every call is ignored; the enabled variant behaves exactly
/// like [`SignalPipe`].
#[derive(Debug)]
pub struct OptionalSignalPipe<const ENABLED: bool> {
    pipe: Option<SignalPipe>,
}

impl<const ENABLED: bool> OptionalSignalPipe<ENABLED> {
    /// Create the pipe (or the no-op stand-in) for level-triggered use.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pipe: if ENABLED { Some(SignalPipe::new()?) } else { None },
        })
    }

    /// Create the pipe (or the no-op stand-in) for edge-triggered use.
    pub fn new_edge_triggered() -> Result<Self> {
        Ok(Self {
            pipe: if ENABLED {
                Some(SignalPipe::new_edge_triggered()?)
            } else {
                None
            },
        })
    }

    /// The reactor descriptor, or `-1` when disabled.
    pub fn raw_fd(&self) -> RawFd {
        self.pipe.as_ref().map_or(-1, SignalPipe::raw_fd)
    }

    /// Record a wake; no-op when disabled.
    pub fn signal(&self) {
        if let Some(pipe) = &self.pipe {
            pipe.signal();
        }
    }

    /// Consume an outstanding wake; no-op when disabled.
    pub fn clear(&self) {
        if let Some(pipe) = &self.pipe {
            pipe.clear();
        }
    }

    /// Whether a wake is outstanding; always `false` when disabled.
    pub fn is_pending(&self) -> bool {
        self.pipe.as_ref().is_some_and(SignalPipe::is_pending)
    }
}
