use crate::{
    addr::Family,
    error::{SocketError, SocketStep},
    sys,
};

use log::trace;
use socket2::{Protocol, Socket, Type};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SocketKind {
    Stream,
    Datagram,
}

/// Options for one transparent socket. The transparent-bind option is always applied.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SocketConfig {
    pub family: Family,
    pub kind: SocketKind,
    pub nonblocking: bool,
}

impl SocketConfig {
    pub fn stream(family: Family) -> Self {
        Self {
            family,
            kind: SocketKind::Stream,
            nonblocking: true,
        }
    }

    pub fn datagram(family: Family) -> Self {
        Self {
            family,
            kind: SocketKind::Datagram,
            nonblocking: true,
        }
    }
}

/// Opens a socket and prepares it for transparent operation.
///
/// Options are applied in a fixed order: `SO_REUSEADDR`, `IP_TRANSPARENT`
/// (`IPV6_TRANSPARENT` for IPv6), then `O_NONBLOCK`. When a step fails the half
/// configured socket is closed and the error names the step, so a missing
/// `CAP_NET_ADMIN` shows up as [`SocketStep::SetTransparent`].
pub fn create_transparent_socket(config: &SocketConfig) -> Result<Socket, SocketError> {
    let (ty, protocol) = match config.kind {
        SocketKind::Stream => (Type::STREAM, Protocol::TCP),
        SocketKind::Datagram => (Type::DGRAM, Protocol::UDP),
    };

    let socket = Socket::new(config.family.domain(), ty, Some(protocol))
        .map_err(|e| SocketError::new(SocketStep::Open, e))?;

    // `socket` is dropped, and so closed, on every early return below
    socket
        .set_reuse_address(true)
        .map_err(|e| SocketError::new(SocketStep::SetReuse, e))?;

    sys::set_ip_transparent(&socket, config.family)
        .map_err(|e| SocketError::new(SocketStep::SetTransparent, e))?;

    socket
        .set_nonblocking(config.nonblocking)
        .map_err(|e| SocketError::new(SocketStep::SetNonblocking, e))?;

    trace!(
        "created transparent {:?} socket ({})",
        config.kind,
        config.family
    );

    Ok(socket)
}
