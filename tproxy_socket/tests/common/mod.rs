#![allow(dead_code)]

use std::net::SocketAddr;

use log::warn;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use tproxy_socket::{create_transparent_socket, Family, SocketConfig};

/// Whether this process may use `IP_TRANSPARENT`. Tests needing it return early otherwise.
pub fn transparent_available() -> bool {
    let _ = env_logger::try_init();

    match create_transparent_socket(&SocketConfig::stream(Family::Ipv4)) {
        Ok(_) => true,
        Err(err) if err.is_permission_denied() => {
            warn!("skipping, no transparent socket privilege: {}", err);
            false
        }
        Err(err) => panic!("unexpected socket error: {}", err),
    }
}

/// UDP socket with `SO_REUSEADDR`, so a transparent socket may share its address
pub fn reusable_udp(addr: &str) -> UdpSocket {
    let addr: SocketAddr = addr.parse().unwrap();
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).unwrap();
    socket.set_reuse_address(true).unwrap();
    socket.set_nonblocking(true).unwrap();
    socket.bind(&addr.into()).unwrap();
    UdpSocket::from_std(socket.into()).unwrap()
}

/// A loopback port that nothing listens on right now
pub fn unused_tcp_port(ip: &str) -> u16 {
    let listener = std::net::TcpListener::bind((ip, 0)).unwrap();
    listener.local_addr().unwrap().port()
}

/// Whether IPv6 loopback works on this host
pub fn ipv6_available() -> bool {
    let available = std::net::TcpListener::bind("[::1]:0").is_ok();
    if !available {
        warn!("skipping, no IPv6 loopback");
    }
    available
}
