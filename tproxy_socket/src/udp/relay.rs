use crate::{
    addr::{Family, NetworkAddress},
    error::{RelayError, RelayLeg},
    socket::{create_transparent_socket, SocketConfig},
};

use std::{net::SocketAddr, time::Duration};

use log::{debug, trace};
use tokio::{net::UdpSocket, time};

/// How long [`relay_datagram`] waits for the destination's reply unless told otherwise
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

pub(crate) const MAX_DATAGRAM_SIZE: usize = 65535;

/// One datagram intercepted on its way from `source` to `destination`
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RedirectedDatagram {
    pub payload: Vec<u8>,
    pub source: NetworkAddress,
    pub destination: NetworkAddress,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelayOutcome {
    /// A reply of this many bytes was forwarded to the client
    Replied(usize),
    /// Nothing came back within the timeout
    NoReply,
}

/// Relays one redirected datagram and at most one reply.
///
/// The payload leaves from a socket bound to the client's address, so the
/// destination sees the client as sender. A reply that arrives within
/// `reply_timeout` is handed back to the client from a socket bound to the
/// destination's address. Each leg has its own socket and lives only as long
/// as its leg.
///
/// Running out of time is not an error: the call returns
/// [`RelayOutcome::NoReply`].
pub async fn relay_datagram(
    datagram: &RedirectedDatagram,
    reply_timeout: Duration,
) -> Result<RelayOutcome, RelayError> {
    let client = datagram.source.to_socket_addr()?;
    let destination = datagram.destination.to_socket_addr()?;

    let remote = connect_spoofed(RelayLeg::Outbound, datagram.source.family(), client, destination)?;

    let written = remote
        .send(&datagram.payload)
        .await
        .map_err(|source| RelayError::Io {
            leg: RelayLeg::Outbound,
            source,
        })?;
    ensure_complete(RelayLeg::Outbound, written, datagram.payload.len())?;

    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    let n = match time::timeout(reply_timeout, remote.recv(&mut buf)).await {
        Ok(received) => received.map_err(|source| RelayError::Io {
            leg: RelayLeg::Outbound,
            source,
        })?,
        Err(_) => {
            trace!("no reply from {} for {} within {:?}", destination, client, reply_timeout);
            return Ok(RelayOutcome::NoReply);
        }
    };

    // The reply socket is only opened once the outbound one is gone. While both
    // exist on one host they claim each other's 4-tuple and the reply is misrouted.
    drop(remote);

    let local = connect_spoofed(RelayLeg::Reply, datagram.destination.family(), destination, client)?;

    let written = local.send(&buf[..n]).await.map_err(|source| RelayError::Io {
        leg: RelayLeg::Reply,
        source,
    })?;
    ensure_complete(RelayLeg::Reply, written, n)?;

    debug!(
        "relayed {} bytes {} -> {}, {} bytes back",
        datagram.payload.len(),
        client,
        destination,
        n
    );

    Ok(RelayOutcome::Replied(n))
}

fn connect_spoofed(
    leg: RelayLeg,
    family: Family,
    bind: SocketAddr,
    peer: SocketAddr,
) -> Result<UdpSocket, RelayError> {
    let socket = create_transparent_socket(&SocketConfig::datagram(family))?;

    socket
        .bind(&bind.into())
        .map_err(|source| RelayError::Bind { leg, addr: bind, source })?;
    socket
        .connect(&peer.into())
        .map_err(|source| RelayError::Connect { leg, addr: peer, source })?;

    UdpSocket::from_std(socket.into()).map_err(|source| RelayError::Io { leg, source })
}

fn ensure_complete(leg: RelayLeg, written: usize, expected: usize) -> Result<(), RelayError> {
    if written < expected {
        return Err(RelayError::ShortWrite {
            leg,
            written,
            expected,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_write_is_an_error() {
        match ensure_complete(RelayLeg::Outbound, 3, 4) {
            Err(RelayError::ShortWrite {
                leg: RelayLeg::Outbound,
                written: 3,
                expected: 4,
            }) => {}
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            ensure_complete(RelayLeg::Reply, 0, 1),
            Err(RelayError::ShortWrite { leg: RelayLeg::Reply, .. })
        ));
    }

    #[test]
    fn complete_write_passes() {
        assert!(ensure_complete(RelayLeg::Outbound, 4, 4).is_ok());
        assert!(ensure_complete(RelayLeg::Reply, 0, 0).is_ok());
    }

    #[tokio::test]
    async fn invalid_zone_fails_before_any_socket() {
        let datagram = RedirectedDatagram {
            payload: b"ping".to_vec(),
            source: NetworkAddress::with_zone("fe80::1".parse().unwrap(), 5353, "wlan0"),
            destination: "[ff02::fb]:5353".parse().unwrap(),
        };

        assert!(matches!(
            relay_datagram(&datagram, Duration::from_millis(10)).await,
            Err(RelayError::Address(_))
        ));
    }
}
