//! Client-side connection options.

use std::sync::Arc;

use rapidtls_core::arena::ArenaPool;
use rapidtls_core::pool::BufferPool;
use rapidtls_core::suite::DEFAULT_CIPHER_SUITES;
use rapidtls_core::{CipherSuite, Error, ProtocolVersion, Result};

use crate::{RootStore, WakeMode};

/// Options for [`client`](crate::client) connections.
#[derive(Debug)]
pub struct ClientOptions {
    /// Host name sent via SNI and checked against the server certificate
    pub server_name: String,

    /// Trust anchors for server certificate validation
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

impl ClientOptions {
    /// Create a builder for a connection to `server_name`.
    pub fn builder(server_name: impl Into<String>) -> ClientOptionsBuilder {
        ClientOptionsBuilder {
            options: ClientOptions {
                server_name: server_name.into(),
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

/// Builder for [`ClientOptions`].
#[derive(Debug)]
pub struct ClientOptionsBuilder {
    options: ClientOptions,
}

impl ClientOptionsBuilder {
    /// Set the trust anchors.
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
    pub fn build(self) -> Result<ClientOptions> {
        if self.options.server_name.is_empty() {
            return Err(Error::InvalidConfig("server name must not be empty".into()));
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
    fn test_defaults() {
        let options = ClientOptions::builder("example.com").build().unwrap();
        assert_eq!(options.server_name, "example.com");
        assert_eq!(options.versions[0], ProtocolVersion::Tls13);
        assert!(!options.suites.is_empty());
        assert_eq!(options.wake_mode, WakeMode::Disabled);
    }

    #[test]
    fn test_rejects_empty_server_name() {
        assert!(ClientOptions::builder("").build().is_err());
    }

    #[test]
    fn test_rejects_empty_suites() {
        let result = ClientOptions::builder("example.com").with_suites(&[]).build();
        assert!(result.is_err());
    }
}
