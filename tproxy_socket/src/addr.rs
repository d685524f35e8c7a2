use crate::error::AddressError;

use std::{
    fmt::{self, Display, Formatter},
    net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
    str::FromStr,
};

use socket2::{Domain, SockAddr};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Family {
    Ipv4,
    Ipv6,
}

impl Family {
    /// Width of the address in bytes
    pub const fn ip_len(self) -> usize {
        match self {
            Family::Ipv4 => 4,
            Family::Ipv6 => 16,
        }
    }

    pub fn domain(self) -> Domain {
        match self {
            Family::Ipv4 => Domain::IPV4,
            Family::Ipv6 => Domain::IPV6,
        }
    }
}

impl Display for Family {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Family::Ipv4 => f.write_str("IPv4"),
            Family::Ipv6 => f.write_str("IPv6"),
        }
    }
}

/// IP endpoint with an optional IPv6 zone.
///
/// The zone is kept as text, the way it appears in `fe80::1%2`, and only
/// interpreted when the address is turned into a kernel socket address. A
/// zone that is not a plain unsigned integer makes that conversion fail.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct NetworkAddress {
    ip: IpAddr,
    port: u16,
    zone: Option<String>,
}

impl NetworkAddress {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port, zone: None }
    }

    pub fn with_zone(ip: Ipv6Addr, port: u16, zone: impl Into<String>) -> Self {
        Self {
            ip: IpAddr::V6(ip),
            port,
            zone: Some(zone.into()),
        }
    }

    /// Builds an address from raw network-order bytes
    pub fn from_bytes(family: Family, bytes: &[u8], port: u16) -> Result<Self, AddressError> {
        let ip = match family {
            Family::Ipv4 => <[u8; 4]>::try_from(bytes).map(|b| IpAddr::V4(b.into())),
            Family::Ipv6 => <[u8; 16]>::try_from(bytes).map(|b| IpAddr::V6(b.into())),
        }
        .map_err(|_| AddressError::InvalidLength {
            family,
            expected: family.ip_len(),
            actual: bytes.len(),
        })?;

        Ok(Self::new(ip, port))
    }

    pub fn ip(&self) -> IpAddr {
        self.ip
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn zone(&self) -> Option<&str> {
        self.zone.as_deref()
    }

    /// Family the address is sent as on the wire.
    ///
    /// An IPv4-mapped IPv6 address without zone counts as IPv4.
    pub fn family(&self) -> Family {
        match self.ip {
            IpAddr::V4(_) => Family::Ipv4,
            IpAddr::V6(v6) if self.zone.is_none() && v6.to_ipv4_mapped().is_some() => Family::Ipv4,
            IpAddr::V6(_) => Family::Ipv6,
        }
    }

    pub fn is_unspecified(&self) -> bool {
        self.ip.is_unspecified()
    }

    /// Resolves the zone into a standard socket address
    pub fn to_socket_addr(&self) -> Result<SocketAddr, AddressError> {
        let v6 = match self.ip {
            IpAddr::V4(v4) => return Ok(SocketAddrV4::new(v4, self.port).into()),
            IpAddr::V6(v6) => v6,
        };

        match (self.zone.as_deref(), v6.to_ipv4_mapped()) {
            (None, Some(v4)) => Ok(SocketAddrV4::new(v4, self.port).into()),
            (None, None) => Ok(SocketAddrV6::new(v6, self.port, 0, 0).into()),
            (Some(zone), _) => {
                let scope_id = parse_zone(zone)?;
                Ok(SocketAddrV6::new(v6, self.port, 0, scope_id).into())
            }
        }
    }

    /// Kernel representation: `sockaddr_in` or `sockaddr_in6` with the zone as scope id
    pub fn to_raw(&self) -> Result<SockAddr, AddressError> {
        self.to_socket_addr().map(SockAddr::from)
    }

    /// Inverse of [`NetworkAddress::to_raw`]
    pub fn from_raw(raw: &SockAddr) -> Result<Self, AddressError> {
        raw.as_socket()
            .map(Self::from)
            .ok_or(AddressError::UnsupportedFamily(raw.family()))
    }
}

// strconv-style: decimal digits only, no sign, must fit in u32
fn parse_zone(zone: &str) -> Result<u32, AddressError> {
    if zone.is_empty() || !zone.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AddressError::InvalidZone(zone.to_string()));
    }
    zone.parse().map_err(|_| AddressError::InvalidZone(zone.to_string()))
}

impl From<SocketAddr> for NetworkAddress {
    fn from(value: SocketAddr) -> Self {
        match value {
            SocketAddr::V4(v4) => Self::new(IpAddr::V4(*v4.ip()), v4.port()),
            SocketAddr::V6(v6) => Self {
                ip: IpAddr::V6(*v6.ip()),
                port: v6.port(),
                zone: match v6.scope_id() {
                    0 => None,
                    id => Some(id.to_string()),
                },
            },
        }
    }
}

impl TryFrom<&NetworkAddress> for SocketAddr {
    type Error = AddressError;
    fn try_from(value: &NetworkAddress) -> Result<Self, Self::Error> {
        value.to_socket_addr()
    }
}

impl Display for NetworkAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match (self.ip, self.zone.as_deref()) {
            (IpAddr::V4(v4), _) => write!(f, "{}:{}", v4, self.port),
            (IpAddr::V6(v6), None) => write!(f, "[{}]:{}", v6, self.port),
            (IpAddr::V6(v6), Some(zone)) => write!(f, "[{}%{}]:{}", v6, zone, self.port),
        }
    }
}

/// Error type for `NetworkAddress`'s `FromStr::Err`
#[derive(Debug)]
pub struct InvalidNetworkAddress;

impl Display for InvalidNetworkAddress {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str("invalid network address")
    }
}

impl std::error::Error for InvalidNetworkAddress {}

impl FromStr for NetworkAddress {
    type Err = InvalidNetworkAddress;

    /// Accepts `1.2.3.4:80`, `[::1]:80` and `[fe80::1%eth0]:80`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(addr) = SocketAddr::from_str(s) {
            return Ok(addr.into());
        }

        let rest = s.strip_prefix('[').ok_or(InvalidNetworkAddress)?;
        let (host, port) = rest.rsplit_once("]:").ok_or(InvalidNetworkAddress)?;
        let (ip, zone) = host.split_once('%').ok_or(InvalidNetworkAddress)?;
        if zone.is_empty() {
            return Err(InvalidNetworkAddress);
        }

        let ip = Ipv6Addr::from_str(ip).map_err(|_| InvalidNetworkAddress)?;
        let port = port.parse().map_err(|_| InvalidNetworkAddress)?;
        Ok(Self::with_zone(ip, port, zone))
    }
}
