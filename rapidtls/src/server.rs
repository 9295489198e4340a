//! Server-side connection options.

use std::sync::Arc;

use rapidtls_core::arena::ArenaPool;
use rapidtls_core::pool::BufferPool;
use rapidtls_core::suite::DEFAULT_CIPHER_SUITES;
use rapidtls_core::{CipherSuite, Error, ProtocolVersion, Result};

use crate::{RootStore, WakeMode};

/// Options for [`server`](crate::server) connections.
#[derive(Debug)]
pub struct ServerOptions {
    /// Certificate chain to present, DER-encoded, leaf first
    pub certificate_chain: Vec<Vec<u8>>,

    /// Private key for the leaf certificate, DER-encoded
    pub private_key: Vec<u8>,

    /// Trust anchors for client certificate validation (mutual TLS)
    pub root_store: RootStore,

    /// Acceptable protocol versions, in preference order
    pub versions: Vec<ProtocolVersion>,

    /// Acceptable cipher suites, in preference order
    pub suites: Vec<CipherSuite>,

    /// Record buffer pool to bind to the connection
    pub buffer_pool: Option<Arc<BufferPool>>,

    /// Arena pool for handshake-scoped allocations
    pub arena_pool: Option<Arc<ArenaPool>>,

    /// Signal-pipe registration mode for reactor integration
    pub wake_mode: WakeMode,
}

impl ServerOptions {
    /// Create a builder from the certificate chain and its private key.
    pub fn builder(certificate_chain: Vec<Vec<u8>>, private_key: Vec<u8>) -> ServerOptionsBuilder {
        ServerOptionsBuilder {
            options: ServerOptions {
                certificate_chain,
                private_key,
                root_store: RootStore::Platform,
                versions: vec![ProtocolVersion::Tls13, ProtocolVersion::Tls12],
                suites: DEFAULT_CIPHER_SUITES.to_vec(),
                buffer_pool: None,
                arena_pool: None,
                wake_mode: WakeMode::Disabled,
            },
        }
    }
}

/// Builder for [`ServerOptions`].
#[derive(Debug)]
pub struct ServerOptionsBuilder {
    options: ServerOptions,
}

impl ServerOptionsBuilder {
    /// Set the trust anchors for client certificates.
    pub fn with_root_store(mut self, root_store: RootStore) -> Self {
        self.options.root_store = root_store;
        self
    }

    /// Set acceptable protocol versions.
    pub fn with_versions(mut self, versions: &[ProtocolVersion]) -> Self {
        self.options.versions = versions.to_vec();
        self
    }

    /// Set acceptable cipher suites.
    pub fn with_suites(mut self, suites: &[CipherSuite]) -> Self {
        self.options.suites = suites.to_vec();
        self
    }

    /// Bind a record buffer pool to the connection.
    pub fn with_buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.options.buffer_pool = Some(pool);
        self
    }

    /// Use `pool` for handshake-scoped arena allocations.
    pub fn with_arena_pool(mut self, pool: Arc<ArenaPool>) -> Self {
        self.options.arena_pool = Some(pool);
        self
    }

    /// Attach a signal pipe for reactor integration.
    pub fn with_wake_mode(mut self, mode: WakeMode) -> Self {
        self.options.wake_mode = mode;
        self
    }

    /// Validate and build the options.
    pub fn build(self) -> Result<ServerOptions> {
        if self.options.certificate_chain.is_empty() {
            return Err(Error::InvalidConfig(
                "a certificate chain is required".into(),
            ));
        }
        if self.options.private_key.is_empty() {
            return Err(Error::InvalidConfig("a private key is required".into()));
        }
        if self.options.versions.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one protocol version is required".into(),
            ));
        }
        if self.options.suites.is_empty() {
            return Err(Error::InvalidConfig(
                "at least one cipher suite is required".into(),
            ));
        }
        Ok(self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_with_chain_and_key() {
        let options = ServerOptions::builder(vec![vec![0x30, 0x82]], vec![0x30, 0x81])
            .build()
            .unwrap();
        assert_eq!(options.certificate_chain.len(), 1);
    }

    #[test]
    fn test_rejects_missing_chain() {
        assert!(ServerOptions::builder(vec![], vec![1]).build().is_err());
    }

    #[test]
    fn test_rejects_missing_key() {
        assert!(ServerOptions::builder(vec![vec![1]], vec![]).build().is_err());
    }
}
