use super::AcceptedConnection;
use crate::{
    addr::{Family, NetworkAddress},
    error::{AcceptError, ListenError, SocketError, SocketStep},
    socket::{create_transparent_socket, SocketConfig},
    Network,
};

use std::net::SocketAddr;

use log::debug;
use tokio::net::TcpListener;

/// TCP listener whose socket carries `IP_TRANSPARENT`.
///
/// Connections redirected to it by a TPROXY rule are accepted as if the
/// listener owned their original destination, so every accepted connection
/// reports that destination as its local address.
#[derive(Debug)]
pub struct TransparentListener {
    inner: TcpListener,
    local_addr: NetworkAddress,
}

impl TransparentListener {
    /// Binds a transparent listener on `local_addr`.
    ///
    /// `network` is one of `tcp`, `tcp4`, `tcp6`. Must be called from within a
    /// tokio runtime.
    pub fn listen(network: &str, local_addr: Option<&NetworkAddress>) -> Result<TransparentListener, ListenError> {
        let network: Network = network
            .parse()
            .map_err(|_| ListenError::UnknownNetwork(network.to_owned()))?;

        let local_addr = local_addr.ok_or(ListenError::MissingAddress)?;
        let family = local_addr.family();
        if !network.accepts(family) {
            return Err(ListenError::FamilyMismatch {
                network: network.to_string(),
                family,
            });
        }

        let addr = local_addr.to_socket_addr()?;
        let socket = create_transparent_socket(&SocketConfig::stream(family))?;

        // Leaves IPv4 to its own listener, so [::] and 0.0.0.0 can share a port
        if family == Family::Ipv6 {
            socket
                .set_only_v6(true)
                .map_err(|e| SocketError::new(SocketStep::SetOnlyV6, e))?;
        }

        socket
            .bind(&addr.into())
            .map_err(|source| ListenError::Bind { addr, source })?;
        socket.listen(libc::SOMAXCONN).map_err(ListenError::Listen)?;

        let inner = TcpListener::from_std(socket.into()).map_err(ListenError::Register)?;
        let local_addr = inner.local_addr().map_err(ListenError::Register)?.into();

        debug!("transparent listener ({}) bound on {}", network, local_addr);

        Ok(TransparentListener { inner, local_addr })
    }

    /// Waits for the next redirected connection.
    ///
    /// Nothing is retried here. Use [`AcceptError::is_temporary`] to decide
    /// whether to keep accepting.
    pub async fn accept(&self) -> Result<AcceptedConnection, AcceptError> {
        let (stream, peer_addr) = self.inner.accept().await.map_err(AcceptError::new)?;

        // For a transparent listener getsockname() is the original destination
        let local_addr: SocketAddr = stream.local_addr().map_err(AcceptError::new)?;

        debug!("accepted {} -> {}", peer_addr, local_addr);

        Ok(AcceptedConnection::new(stream, local_addr.into(), peer_addr.into()))
    }

    pub fn local_addr(&self) -> &NetworkAddress {
        &self.local_addr
    }
}
