mod common;

use std::time::Duration;

use tokio::net::UdpSocket;

use common::{ipv6_available, reusable_udp, transparent_available};
use tproxy_socket::{relay_datagram, NetworkAddress, RedirectedDatagram, RelayOutcome, TransparentUdpSocket};

/// Answers one datagram with `tag` followed by the payload
fn spawn_tagged_echo(server: UdpSocket, tag: &'static [u8]) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        let (n, peer) = server.recv_from(&mut buf).await.unwrap();
        let mut reply = tag.to_vec();
        reply.extend_from_slice(&buf[..n]);
        server.send_to(&reply, peer).await.unwrap();
    })
}

fn datagram(payload: &[u8], client: &UdpSocket, destination: &UdpSocket) -> RedirectedDatagram {
    RedirectedDatagram {
        payload: payload.to_vec(),
        source: client.local_addr().unwrap().into(),
        destination: destination.local_addr().unwrap().into(),
    }
}

#[tokio::test]
async fn relays_request_and_reply() {
    if !transparent_available() {
        return;
    }

    let client = reusable_udp("127.0.0.1:0");
    let server = reusable_udp("127.0.0.1:0");
    let server_addr = server.local_addr().unwrap();
    let dgram = datagram(b"query", &client, &server);
    let echo = spawn_tagged_echo(server, b"re:");

    let outcome = relay_datagram(&dgram, Duration::from_secs(5)).await.unwrap();
    assert_eq!(outcome, RelayOutcome::Replied(8));
    echo.await.unwrap();

    let mut buf = [0u8; 64];
    let (n, from) = client.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"re:query");
    // The reply appears to come from the destination itself
    assert_eq!(from, server_addr);
}

#[tokio::test]
async fn missing_reply_is_not_an_error() {
    if !transparent_available() {
        return;
    }

    let client = reusable_udp("127.0.0.1:0");
    let silent = reusable_udp("127.0.0.1:0");
    let dgram = datagram(b"anyone there", &client, &silent);

    let outcome = relay_datagram(&dgram, Duration::from_millis(200)).await.unwrap();
    assert_eq!(outcome, RelayOutcome::NoReply);

    // The request still reached the destination, with the client as sender
    let mut buf = [0u8; 64];
    let (n, from) = silent.recv_from(&mut buf).await.unwrap();
    assert_eq!(&buf[..n], b"anyone there");
    assert_eq!(from, client.local_addr().unwrap());
}

#[tokio::test]
async fn concurrent_relays_do_not_cross() {
    if !transparent_available() {
        return;
    }

    let client_a = reusable_udp("127.0.0.2:0");
    let client_b = reusable_udp("127.0.0.3:0");
    let server_x = reusable_udp("127.0.0.4:0");
    let server_y = reusable_udp("127.0.0.5:0");
    let x_addr = server_x.local_addr().unwrap();
    let y_addr = server_y.local_addr().unwrap();

    let a_to_x = datagram(b"a", &client_a, &server_x);
    let b_to_y = datagram(b"b", &client_b, &server_y);
    let echo_x = spawn_tagged_echo(server_x, b"x:");
    let echo_y = spawn_tagged_echo(server_y, b"y:");

    let timeout = Duration::from_secs(5);
    let (a, b) = tokio::join!(relay_datagram(&a_to_x, timeout), relay_datagram(&b_to_y, timeout));
    assert_eq!(a.unwrap(), RelayOutcome::Replied(3));
    assert_eq!(b.unwrap(), RelayOutcome::Replied(3));
    echo_x.await.unwrap();
    echo_y.await.unwrap();

    let mut buf = [0u8; 16];
    let (n, from) = client_a.recv_from(&mut buf).await.unwrap();
    assert_eq!((&buf[..n], from), (&b"x:a"[..], x_addr));

    let (n, from) = client_b.recv_from(&mut buf).await.unwrap();
    assert_eq!((&buf[..n], from), (&b"y:b"[..], y_addr));
}

#[tokio::test]
async fn receives_datagram_with_original_destination() {
    if !transparent_available() {
        return;
    }

    let addr: NetworkAddress = "127.0.0.1:0".parse().unwrap();
    let socket = TransparentUdpSocket::bind(&addr).unwrap();
    let local = socket.local_addr().to_socket_addr().unwrap();

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"hello", local).await.unwrap();

    let dgram = socket.recv_datagram().await.unwrap();
    assert_eq!(dgram.payload, b"hello");
    assert_eq!(dgram.source, NetworkAddress::from(client.local_addr().unwrap()));
    assert_eq!(dgram.destination, NetworkAddress::from(local));
}

#[tokio::test]
async fn ipv4_datagrams_skip_the_ipv6_wildcard_socket() {
    if !transparent_available() || !ipv6_available() {
        return;
    }

    let any4: NetworkAddress = "0.0.0.0:0".parse().unwrap();
    let v4 = TransparentUdpSocket::bind(&any4).unwrap();
    let port = v4.local_addr().port();

    let any6: NetworkAddress = format!("[::]:{}", port).parse().unwrap();
    let v6 = TransparentUdpSocket::bind(&any6).unwrap();
    assert_eq!(v6.local_addr().port(), port);

    let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    client.send_to(b"v4 only", ("127.0.0.1", port)).await.unwrap();

    let dgram = tokio::time::timeout(Duration::from_secs(5), v4.recv_datagram())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(dgram.payload, b"v4 only");
    assert!(tokio::time::timeout(Duration::from_millis(100), v6.recv_datagram())
        .await
        .is_err());
}
