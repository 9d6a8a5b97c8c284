//! Self-describing addresses: `/ip4/127.0.0.1/tcp/8081/p2p/<peer id>`.
//!
//! Only the components this node can actually dial are supported: an IPv4
//! or IPv6 host, a TCP port, and a trailing peer ID.

use crate::error::WireError;
use crate::identity::PeerId;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::str::FromStr;

/// One component of a [`Multiaddr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Ip4(Ipv4Addr),
    Ip6(Ipv6Addr),
    Tcp(u16),
    P2p(PeerId),
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Ip4(ip) => write!(f, "/ip4/{ip}"),
            Protocol::Ip6(ip) => write!(f, "/ip6/{ip}"),
            Protocol::Tcp(port) => write!(f, "/tcp/{port}"),
            Protocol::P2p(id) => write!(f, "/p2p/{id}"),
        }
    }
}

/// An ordered stack of address components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Multiaddr {
    components: Vec<Protocol>,
}

impl Multiaddr {
    pub fn empty() -> Self {
        Self::default()
    }

    /// `/ip4/<ip>/tcp/<port>` or `/ip6/<ip>/tcp/<port>`.
    pub fn from_socket_addr(addr: SocketAddr) -> Self {
        let host = match addr.ip() {
            IpAddr::V4(ip) => Protocol::Ip4(ip),
            IpAddr::V6(ip) => Protocol::Ip6(ip),
        };
        Self {
            components: vec![host, Protocol::Tcp(addr.port())],
        }
    }

    /// Append a component.
    pub fn with(mut self, protocol: Protocol) -> Self {
        self.components.push(protocol);
        self
    }

    /// Append `/p2p/<peer_id>`, replacing an existing trailing peer ID.
    pub fn with_peer_id(mut self, peer_id: PeerId) -> Self {
        if let Some(Protocol::P2p(_)) = self.components.last() {
            self.components.pop();
        }
        self.with(Protocol::P2p(peer_id))
    }

    /// The address without its trailing peer ID, if any.
    pub fn without_peer_id(&self) -> Self {
        let mut components = self.components.clone();
        if let Some(Protocol::P2p(_)) = components.last() {
            components.pop();
        }
        Self { components }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Protocol> {
        self.components.iter()
    }

    /// The trailing peer ID, if present.
    pub fn peer_id(&self) -> Option<PeerId> {
        match self.components.last() {
            Some(Protocol::P2p(id)) => Some(*id),
            _ => None,
        }
    }

    /// The TCP socket address this multiaddress points at.
    pub fn to_socket_addr(&self) -> Option<SocketAddr> {
        let mut iter = self.components.iter();
        let ip = match iter.next()? {
            Protocol::Ip4(ip) => IpAddr::V4(*ip),
            Protocol::Ip6(ip) => IpAddr::V6(*ip),
            _ => return None,
        };
        match iter.next()? {
            Protocol::Tcp(port) => Some(SocketAddr::new(ip, *port)),
            _ => None,
        }
    }
}

impl fmt::Display for Multiaddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for component in &self.components {
            write!(f, "{component}")?;
        }
        Ok(())
    }
}

impl FromStr for Multiaddr {
    type Err = WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('/')
            .ok_or_else(|| WireError::invalid_address(s, "must start with '/'"))?;

        let mut parts = rest.split('/');
        let mut components = Vec::new();
        while let Some(name) = parts.next() {
            let value = parts
                .next()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| WireError::invalid_address(s, format!("missing value for '{name}'")))?;
            let component = match name {
                "ip4" => Protocol::Ip4(
                    value
                        .parse()
                        .map_err(|_| WireError::invalid_address(s, "bad ip4 value"))?,
                ),
                "ip6" => Protocol::Ip6(
                    value
                        .parse()
                        .map_err(|_| WireError::invalid_address(s, "bad ip6 value"))?,
                ),
                "tcp" => Protocol::Tcp(
                    value
                        .parse()
                        .map_err(|_| WireError::invalid_address(s, "bad tcp port"))?,
                ),
                "p2p" => Protocol::P2p(value.parse()?),
                other => {
                    return Err(WireError::invalid_address(
                        s,
                        format!("unsupported protocol '{other}'"),
                    ))
                }
            };
            components.push(component);
        }

        Ok(Self { components })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;

    #[test]
    fn test_socket_addr_forms() {
        let v4 = Multiaddr::from_socket_addr("0.0.0.0:8081".parse().unwrap());
        assert_eq!(v4.to_string(), "/ip4/0.0.0.0/tcp/8081");

        let v6 = Multiaddr::from_socket_addr("[::1]:9000".parse().unwrap());
        assert_eq!(v6.to_string(), "/ip6/::1/tcp/9000");
        assert_eq!(v6.to_socket_addr(), Some("[::1]:9000".parse().unwrap()));
    }

    #[test]
    fn test_parse_full_address() {
        let peer = Identity::generate(Some(1)).unwrap().peer_id();
        let text = format!("/ip4/127.0.0.1/tcp/4001/p2p/{peer}");
        let addr: Multiaddr = text.parse().unwrap();
        assert_eq!(addr.peer_id(), Some(peer));
        assert_eq!(addr.to_socket_addr(), Some("127.0.0.1:4001".parse().unwrap()));
        assert_eq!(addr.to_string(), text);
        assert_eq!(addr.without_peer_id().to_string(), "/ip4/127.0.0.1/tcp/4001");
    }

    #[test]
    fn test_with_peer_id_replaces_trailing_id() {
        let a = Identity::generate(Some(1)).unwrap().peer_id();
        let b = Identity::generate(Some(2)).unwrap().peer_id();
        let addr = Multiaddr::from_socket_addr("10.0.0.1:1".parse().unwrap())
            .with_peer_id(a)
            .with_peer_id(b);
        assert_eq!(addr.iter().count(), 3);
        assert_eq!(addr.peer_id(), Some(b));
    }

    #[test]
    fn test_parse_errors() {
        for bad in [
            "",
            "ip4/1.2.3.4",
            "/ip4",
            "/ip4/999.1.1.1/tcp/1",
            "/ip4/1.2.3.4/tcp/70000",
            "/ip4/1.2.3.4/udp/53",
            "/ip4/1.2.3.4/tcp/1/p2p/xyz",
            "/ip4/1.2.3.4/tcp/",
        ] {
            assert!(bad.parse::<Multiaddr>().is_err(), "accepted {bad:?}");
        }
    }

    #[test]
    fn test_socket_addr_requires_host_then_port() {
        let peer = Identity::generate(Some(1)).unwrap().peer_id();
        let only_peer = Multiaddr::empty().with(Protocol::P2p(peer));
        assert_eq!(only_peer.to_socket_addr(), None);
        assert_eq!(Multiaddr::empty().to_socket_addr(), None);
    }
}
