//! echonode wire layer: peer identity, addressing and stream protocols.
//!
//! A node generates an Ed25519 identity, binds a TCP listener, and
//! advertises itself as a multiaddress ending in its peer ID. Inbound
//! connections go through a short framed handshake that proves identities
//! and selects a protocol; the negotiated stream is then handed to the
//! registered [`StreamHandler`].
//!
//! ## Architecture
//!
//! - **Identity / PeerId**: keypair generation and ID derivation
//! - **Multiaddr**: `/ip4/../tcp/../p2p/..` addresses
//! - **PeerHost**: listener, protocol registry and accept loop
//! - **EchoHandler**: the `/echo/1.0.0` protocol
//! - **dial**: outbound streams to other nodes

pub mod address;
pub mod dial;
pub mod echo;
pub mod error;
pub mod handshake;
pub mod host;
pub mod identity;
pub mod message;
pub mod multiaddr;
pub mod stream;

pub use address::build_full_address;
pub use dial::{dial, DialOptions};
pub use echo::{echo_once, EchoHandler, EchoLimits, ECHO_PROTOCOL};
pub use error::WireError;
pub use host::{HostConfig, HostHandle, PeerHost, ProtocolRegistry, StreamHandler};
pub use identity::{Identity, PeerId};
pub use multiaddr::{Multiaddr, Protocol};
pub use stream::PeerStream;
