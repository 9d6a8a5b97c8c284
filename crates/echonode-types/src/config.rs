//! Daemon configuration types.
//!
//! Every field has a default so that a partial (or absent) `config.toml`
//! still yields a runnable node. Loading and CLI overrides live in the
//! binary crate; this module only describes the shape.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Default HTTP control port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;
/// Default peer listen port.
pub const DEFAULT_P2P_PORT: u16 = 8081;

/// Top-level configuration for an echonode process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NodeConfig {
    /// Default tracing filter when `RUST_LOG` is not set.
    pub log_level: String,
    /// HTTP control endpoint settings.
    pub http: HttpConfig,
    /// Peer host settings.
    pub p2p: P2pConfig,
    /// Echo protocol limits.
    pub echo: EchoConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            http: HttpConfig::default(),
            p2p: P2pConfig::default(),
            echo: EchoConfig::default(),
        }
    }
}

/// `[http]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HttpConfig {
    /// Address the HTTP server binds to.
    pub listen_addr: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_HTTP_PORT)),
        }
    }
}

/// `[p2p]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct P2pConfig {
    /// Address the peer host binds to.
    pub listen_addr: SocketAddr,
    /// Skip the signed identity handshake. Local testing only.
    pub insecure: bool,
    /// Deterministic key seed. `None` or `0` draws from the OS CSPRNG.
    pub seed: Option<i64>,
    /// Multiaddresses advertised ahead of the bound socket address,
    /// e.g. `/ip4/203.0.113.7/tcp/8081`.
    pub announce_addrs: Vec<String>,
    /// Upper bound on the connection handshake, in seconds.
    pub handshake_timeout_secs: u64,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_P2P_PORT)),
            insecure: false,
            seed: None,
            announce_addrs: Vec::new(),
            handshake_timeout_secs: 10,
        }
    }
}

/// `[echo]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EchoConfig {
    /// Read deadline for the incoming line, in seconds. `0` waits forever.
    pub read_timeout_secs: u64,
    /// Longest accepted line, terminator included.
    pub max_line_bytes: usize,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: 30,
            max_line_bytes: 64 * 1024,
        }
    }
}

impl NodeConfig {
    /// Check the configuration for suspicious or unusable values.
    ///
    /// Returns a list of human-readable warnings; an empty list means the
    /// configuration looks sane. Entries containing "invalid" should abort
    /// startup.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.p2p.insecure {
            warnings.push(
                "p2p.insecure is enabled: peer identities are not authenticated".to_string(),
            );
        }
        if self.http.listen_addr.port() != 0 && self.http.listen_addr == self.p2p.listen_addr {
            warnings.push(format!(
                "invalid listen addresses: http and p2p both bind {}",
                self.http.listen_addr
            ));
        }
        if self.p2p.handshake_timeout_secs == 0 {
            warnings.push("invalid p2p.handshake_timeout_secs: must be at least 1".to_string());
        }
        if self.echo.max_line_bytes == 0 {
            warnings.push("invalid echo.max_line_bytes: must be at least 1".to_string());
        }
        if self.echo.read_timeout_secs == 0 {
            warnings.push(
                "echo.read_timeout_secs is 0: stalled peers hold their connection forever"
                    .to_string(),
            );
        }

        warnings
    }

    /// Whether `validate` reported anything that should block startup.
    pub fn has_fatal_warnings(&self) -> bool {
        self.validate().iter().any(|w| w.contains("invalid"))
    }
}
