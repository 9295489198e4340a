//! The public API against a stub handshake engine.

use std::io::{self, Read, Write};

use rapidtls::core::arena::ScopedArena;
use rapidtls::core::cipher::{DirectionSecrets, SessionSecrets};
use rapidtls::handshake::{Established, HandshakeContext, HandshakeEngine, Role, Transport};
use rapidtls::{client, server, CipherSuite, ClientOptions, RootStore, ServerOptions, WakeMode};

/// In-memory half-duplex transport.
struct MemoryStream {
    incoming: io::Cursor<Vec<u8>>,
    outgoing: Vec<u8>,
}

impl MemoryStream {
    fn empty() -> Self {
        Self::with_incoming(Vec::new())
    }

    fn with_incoming(incoming: Vec<u8>) -> Self {
        Self {
            incoming: io::Cursor::new(incoming),
            outgoing: Vec::new(),
        }
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.incoming.read(buf)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outgoing.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A handshake stub that skips the wire protocol and hands back fixed
/// secrets, mirrored according to role so a client/server pair
/// interoperates.
struct StubEngine {
    suite: CipherSuite,
    saw_server_name: Option<String>,
    arena_bytes_used: usize,
}

impl StubEngine {
    fn new(suite: CipherSuite) -> Self {
        Self {
            suite,
            saw_server_name: None,
            arena_bytes_used: 0,
        }
    }

    fn secrets(&self, role: Role) -> SessionSecrets {
        let a = DirectionSecrets::aead(
            vec![0x11; self.suite.key_len()],
            vec![0x22; self.suite.fixed_iv_len()],
        );
        let b = DirectionSecrets::aead(
            vec![0x33; self.suite.key_len()],
            vec![0x44; self.suite.fixed_iv_len()],
        );
        match role {
            Role::Client => SessionSecrets { send: a, recv: b },
            Role::Server => SessionSecrets { send: b, recv: a },
        }
    }
}

impl HandshakeEngine for StubEngine {
    fn establish(
        &mut self,
        _stream: &mut dyn Transport,
        context: HandshakeContext<'_>,
        arena: &mut ScopedArena,
    ) -> rapidtls::Result<Established> {
        // Exercise the handshake-scoped arena the way a real engine would.
        let transcript = arena.alloc_slice(b"stub transcript");
        self.arena_bytes_used = arena.get(&transcript).len();
        self.saw_server_name = context.server_name.map(str::to_owned);

        Ok(Established {
            suite: self.suite,
            secrets: self.secrets(context.role),
        })
    }
}

#[test]
fn client_server_pair_interoperates() {
    let suite = CipherSuite::Aes128GcmSha256;

    let options = ClientOptions::builder("test.example")
        .with_root_store(RootStore::DerCertificates(vec![vec![0x30]]))
        .build()
        .unwrap();
    let mut engine = StubEngine::new(suite);
    let mut tls_client = client(MemoryStream::empty(), options, &mut engine).unwrap();
    assert_eq!(engine.saw_server_name.as_deref(), Some("test.example"));
    assert_eq!(engine.arena_bytes_used, 15);
    assert_eq!(tls_client.suite(), suite);

    tls_client.write(b"hello from the client").unwrap();
    let wire = std::mem::take(&mut tls_client.plane().get_mut().outgoing);

    let options = ServerOptions::builder(vec![vec![0x30, 0x82]], vec![0x30, 0x81])
        .build()
        .unwrap();
    let mut engine = StubEngine::new(suite);
    let mut tls_server =
        server(MemoryStream::with_incoming(wire), options, &mut engine).unwrap();

    let mut buf = [0u8; 64];
    let n = tls_server.read(&mut buf).unwrap();
    assert_eq!(&buf[..n], b"hello from the client");
}

#[test]
fn handshake_failure_propagates() {
    struct FailingEngine;
    impl HandshakeEngine for FailingEngine {
        fn establish(
            &mut self,
            _stream: &mut dyn Transport,
            _context: HandshakeContext<'_>,
            _arena: &mut ScopedArena,
        ) -> rapidtls::Result<Established> {
            Err(rapidtls::Error::Unexpected("refused".into()))
        }
    }

    let options = ClientOptions::builder("x.example").build().unwrap();
    let result = client(MemoryStream::empty(), options, &mut FailingEngine);
    assert!(result.is_err());
}

#[cfg(unix)]
#[test]
fn wake_pipe_pulses_on_write() {
    let options = ClientOptions::builder("wake.example")
        .with_wake_mode(WakeMode::EdgeTriggered)
        .build()
        .unwrap();
    let mut engine = StubEngine::new(CipherSuite::ChaCha20Poly1305Sha256);
    let mut conn = client(MemoryStream::empty(), options, &mut engine).unwrap();

    assert!(conn.wake_fd() >= 0);
    conn.write(b"pulse").unwrap();
    // The reactor would poll the fd; here we just observe the state.
    conn.clear_wake();
}

#[test]
fn zero_copy_stats_reachable_through_public_api() {
    let suite = CipherSuite::Aes128GcmSha256;
    let mut engine = StubEngine::new(suite);
    let options = ClientOptions::builder("stats.example").build().unwrap();
    let mut tls_client = client(MemoryStream::empty(), options, &mut engine).unwrap();

    tls_client.write(b"count me").unwrap();
    let wire = std::mem::take(&mut tls_client.plane().get_mut().outgoing);

    let mut engine = StubEngine::new(suite);
    let options = ServerOptions::builder(vec![vec![1]], vec![1]).build().unwrap();
    let mut tls_server =
        server(MemoryStream::with_incoming(wire), options, &mut engine).unwrap();

    let mut buf = [0u8; 32];
    tls_server.read(&mut buf).unwrap();
    let stats = tls_server.zero_copy_stats();
    assert_eq!(stats.in_place_decrypts + stats.copy_decrypts, 1);
}
