use super::relay::{RedirectedDatagram, MAX_DATAGRAM_SIZE};
use crate::{
    addr::{Family, NetworkAddress},
    error::{ListenError, SocketError, SocketStep},
    socket::{create_transparent_socket, SocketConfig},
    sys,
};

use std::{io, os::fd::AsRawFd};

use log::{debug, trace};
use tokio::{io::Interest, net::UdpSocket};

/// UDP socket receiving TPROXY-redirected datagrams together with their
/// original destination.
///
/// This only receives. Each datagram is answered through
/// [`relay_datagram`](super::relay_datagram), driven by the caller's own loop.
#[derive(Debug)]
pub struct TransparentUdpSocket {
    inner: UdpSocket,
    local_addr: NetworkAddress,
}

impl TransparentUdpSocket {
    /// Must be called from within a tokio runtime.
    pub fn bind(addr: &NetworkAddress) -> Result<TransparentUdpSocket, ListenError> {
        let family = addr.family();
        let bind_addr = addr.to_socket_addr()?;

        let socket = create_transparent_socket(&SocketConfig::datagram(family))?;
        sys::set_recv_original_dst(&socket, family)
            .map_err(|e| SocketError::new(SocketStep::SetRecvOriginalDst, e))?;
        if family == Family::Ipv6 {
            socket
                .set_only_v6(true)
                .map_err(|e| SocketError::new(SocketStep::SetOnlyV6, e))?;
        }

        socket.bind(&bind_addr.into()).map_err(|source| ListenError::Bind {
            addr: bind_addr,
            source,
        })?;

        let inner = UdpSocket::from_std(socket.into()).map_err(ListenError::Register)?;
        let local_addr = inner.local_addr().map_err(ListenError::Register)?.into();

        debug!("transparent udp socket bound on {}", local_addr);

        Ok(TransparentUdpSocket { inner, local_addr })
    }

    pub fn local_addr(&self) -> &NetworkAddress {
        &self.local_addr
    }

    /// Receives the next datagram with its sender and original destination
    pub async fn recv_datagram(&self) -> io::Result<RedirectedDatagram> {
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
        let fd = self.inner.as_raw_fd();

        let (n, source, destination) = self
            .inner
            .async_io(Interest::READABLE, || sys::recv_from_with_destination(fd, &mut buf))
            .await?;
        buf.truncate(n);

        trace!("received {} bytes {} -> {}", n, source, destination);

        Ok(RedirectedDatagram {
            payload: buf,
            source: source.into(),
            destination: destination.into(),
        })
    }
}
