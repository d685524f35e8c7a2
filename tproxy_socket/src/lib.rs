//! # Transparent proxy sockets for Linux
//!
//! Sockets carrying `IP_TRANSPARENT`, for proxies that receive traffic
//! redirected by a netfilter `TPROXY` rule and want to talk to the real
//! destination under the client's address.
//!
//! - [`TransparentListener`] accepts redirected TCP connections. Each
//!   [`AcceptedConnection`] reports the original destination as its local
//!   address and the client as its remote address.
//! - [`AcceptedConnection::dial_original_destination`] connects onward,
//!   optionally from the client's own address.
//! - [`relay_datagram`] does the same for a single UDP request/reply exchange,
//!   and [`TransparentUdpSocket`] receives redirected datagrams together with
//!   their original destination.
//!
//! The redirection rules (`iptables -t mangle ... -j TPROXY`, `ip rule`,
//! `ip route ... local`) must already be installed, and the process needs
//! `CAP_NET_ADMIN`. Without it socket creation fails with a [`SocketError`]
//! at [`SocketStep::SetTransparent`].

mod addr;
mod error;
mod socket;
mod sys;
mod tcp;
mod udp;

pub use addr::{Family, InvalidNetworkAddress, NetworkAddress};
pub use error::{
    AcceptError, AddressError, DialError, ListenError, RelayError, RelayLeg, SocketError, SocketStep,
};
pub use socket::{create_transparent_socket, SocketConfig, SocketKind};
pub use tcp::{dial_transparent, AcceptedConnection, DialOptions, TransparentListener};
pub use udp::{relay_datagram, RedirectedDatagram, RelayOutcome, TransparentUdpSocket, DEFAULT_REPLY_TIMEOUT};

use std::{
    fmt::{self, Display, Formatter},
    str::FromStr,
};

/// Stream network a [`TransparentListener`] can listen on
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    /// Either family, decided by the bind address
    Tcp,
    /// IPv4 only
    Tcp4,
    /// IPv6 only
    Tcp6,
}

impl Network {
    /// Name of the network, as accepted by `FromStr`
    pub const fn name(self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Tcp4 => "tcp4",
            Network::Tcp6 => "tcp6",
        }
    }

    /// Whether an address of `family` can be used on this network
    pub fn accepts(self, family: Family) -> bool {
        match self {
            Network::Tcp => true,
            Network::Tcp4 => family == Family::Ipv4,
            Network::Tcp6 => family == Family::Ipv6,
        }
    }
}

impl Display for Network {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error type for `Network`'s `FromStr::Err`
#[derive(Debug)]
pub struct InvalidNetwork;

impl Display for InvalidNetwork {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("invalid Network")
    }
}

impl std::error::Error for InvalidNetwork {}

impl FromStr for Network {
    type Err = InvalidNetwork;

    fn from_str(s: &str) -> Result<Network, InvalidNetwork> {
        match s {
            "tcp" => Ok(Network::Tcp),
            "tcp4" => Ok(Network::Tcp4),
            "tcp6" => Ok(Network::Tcp6),
            _ => Err(InvalidNetwork),
        }
    }
}
