//! The seam between the data plane and the (external) handshake.
//!
//! rapidtls does not negotiate sessions itself; a [`HandshakeEngine`]
//! implementation drives the handshake protocol over the transport and
//! hands back the negotiated suite and traffic keys. The engine gets a
//! scoped arena for its transient allocations; the arena returns to its
//! pool the moment the handshake scope ends, before the first data-plane
//! call.

use rapidtls_core::arena::ScopedArena;
use rapidtls_core::cipher::SessionSecrets;
use rapidtls_core::suite::CipherSuite;
use rapidtls_core::{ProtocolVersion, Result};

use crate::client::ClientOptions;
use crate::server::ServerOptions;
use crate::RootStore;

/// Transport bound for handshake I/O.
pub trait Transport: std::io::Read + std::io::Write {}

impl<T: std::io::Read + std::io::Write> Transport for T {}

/// Connection role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiating endpoint
    Client,

    /// Accepting endpoint
    Server,
}

/// What the options give the handshake to work with.
#[derive(Debug)]
pub struct HandshakeContext<'a> {
    /// This endpoint's role
    pub role: Role,

    /// Host name for SNI (client role)
    pub server_name: Option<&'a str>,

    /// Trust anchors for peer certificate validation
    pub root_store: &'a RootStore,

    /// Certificate chain to present, DER-encoded (server role)
    pub certificate_chain: &'a [Vec<u8>],

    /// Private key for the presented chain, DER-encoded (server role)
    pub private_key: Option<&'a [u8]>,

    /// Acceptable protocol versions, in preference order
    pub versions: &'a [ProtocolVersion],

    /// Acceptable cipher suites, in preference order
    pub suites: &'a [CipherSuite],
}

impl<'a> HandshakeContext<'a> {
    pub(crate) fn for_client(opts: &'a ClientOptions) -> Self {
        Self {
            role: Role::Client,
            server_name: Some(opts.server_name.as_str()),
            root_store: &opts.root_store,
            certificate_chain: &[],
            private_key: None,
            versions: &opts.versions,
            suites: &opts.suites,
        }
    }

    pub(crate) fn for_server(opts: &'a ServerOptions) -> Self {
        Self {
            role: Role::Server,
            server_name: None,
            root_store: &opts.root_store,
            certificate_chain: &opts.certificate_chain,
            private_key: Some(opts.private_key.as_slice()),
            versions: &opts.versions,
            suites: &opts.suites,
        }
    }
}

/// A completed negotiation: everything the data plane needs.
#[derive(Debug)]
pub struct Established {
    /// The negotiated cipher suite
    pub suite: CipherSuite,

    /// Traffic keys for both directions, sequence counters at zero
    pub secrets: SessionSecrets,
}

/// Drives a TLS handshake to completion over a transport.
///
/// Implementations own the negotiation policy (extensions, certificate
/// validation, key schedule); rapidtls owns everything after the
/// `Finished` flights.
pub trait HandshakeEngine {
    /// Run the handshake. `arena` backs transient allocations and is
    /// recycled when the handshake scope ends.
    fn establish(
        &mut self,
        stream: &mut dyn Transport,
        context: HandshakeContext<'_>,
        arena: &mut ScopedArena,
    ) -> Result<Established>;
}
