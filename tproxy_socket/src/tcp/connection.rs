use super::dial::{dial_transparent, DialOptions};
use crate::{addr::NetworkAddress, error::DialError};

use std::{
    io::{self, IoSlice},
    pin::Pin,
    task::{Context, Poll},
};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadBuf},
    net::TcpStream,
};

/// A connection accepted by a [`TransparentListener`](super::TransparentListener)
///
/// `local_addr` is where the client meant to go, `remote_addr` is the client.
#[derive(Debug)]
pub struct AcceptedConnection {
    stream: TcpStream,
    local_addr: NetworkAddress,
    remote_addr: NetworkAddress,
}

impl AcceptedConnection {
    pub(crate) fn new(stream: TcpStream, local_addr: NetworkAddress, remote_addr: NetworkAddress) -> Self {
        Self {
            stream,
            local_addr,
            remote_addr,
        }
    }

    /// Original destination of the redirected connection
    pub fn local_addr(&self) -> &NetworkAddress {
        &self.local_addr
    }

    /// The real client
    pub fn remote_addr(&self) -> &NetworkAddress {
        &self.remote_addr
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn into_stream(self) -> TcpStream {
        self.stream
    }

    /// Opens a TCP connection to the original destination.
    ///
    /// With `spoof_source` the outbound socket is bound to the client's address
    /// and port first, so the destination sees the client as the peer.
    /// Otherwise the kernel picks the local address.
    pub async fn dial_original_destination(&self, options: &DialOptions) -> Result<TcpStream, DialError> {
        let bind = if options.spoof_source {
            Some(&self.remote_addr)
        } else {
            None
        };

        dial_transparent(&self.local_addr, bind, options.connect_timeout).await
    }
}

impl AsyncRead for AcceptedConnection {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for AcceptedConnection {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.stream.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        addr::Family,
        socket::{create_transparent_socket, SocketConfig},
    };

    use tokio::net::TcpListener;

    fn transparent_available() -> bool {
        match create_transparent_socket(&SocketConfig::stream(Family::Ipv4)) {
            Ok(_) => true,
            Err(err) if err.is_permission_denied() => false,
            Err(err) => panic!("unexpected socket error: {}", err),
        }
    }

    async fn loopback_stream() -> TcpStream {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (connected, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        drop(connected.unwrap());
        accepted.unwrap().0
    }

    #[tokio::test]
    async fn spoofed_dial_leaves_from_the_client_address() {
        if !transparent_available() {
            return;
        }

        let upstream = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let destination: NetworkAddress = upstream.local_addr().unwrap().into();

        let free_port = std::net::TcpListener::bind("127.0.0.2:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client: NetworkAddress = format!("127.0.0.2:{}", free_port).parse().unwrap();

        let conn = AcceptedConnection::new(loopback_stream().await, destination.clone(), client.clone());

        let options = DialOptions::spoofed();
        let (outbound, accepted) = tokio::join!(conn.dial_original_destination(&options), upstream.accept());
        let outbound = outbound.unwrap();
        let (_, peer) = accepted.unwrap();

        assert_eq!(NetworkAddress::from(outbound.local_addr().unwrap()), client);
        assert_eq!(NetworkAddress::from(outbound.peer_addr().unwrap()), destination);
        assert_eq!(NetworkAddress::from(peer), client);
    }
}
