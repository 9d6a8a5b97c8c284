//! Full-address construction: listen address + peer ID.

use crate::error::WireError;
use crate::identity::PeerId;
use crate::multiaddr::Multiaddr;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// Build the dialable address for `peer_id` from the first listen address.
///
/// The listen addresses are expected in their advertised order. An empty
/// list is an error; there is no fallback address.
pub fn build_full_address(
    listen_addrs: &[Multiaddr],
    peer_id: &PeerId,
) -> Result<Multiaddr, WireError> {
    let base = listen_addrs.first().ok_or(WireError::NoAddress)?;
    Ok(base.clone().with_peer_id(*peer_id))
}

/// The advertised form of a bound socket address.
///
/// A wildcard bind (`0.0.0.0` / `::`) is reachable on loopback, so that is
/// what gets advertised for it.
pub(crate) fn advertised_addr(bound: SocketAddr) -> Multiaddr {
    let ip = match bound.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    Multiaddr::from_socket_addr(SocketAddr::new(ip, bound.port()))
}
