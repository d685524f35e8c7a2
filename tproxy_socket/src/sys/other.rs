use crate::addr::Family;

use std::{
    io::{self, Error, ErrorKind},
    net::SocketAddr,
    os::fd::RawFd,
};

use socket2::Socket;

fn unsupported() -> Error {
    Error::new(
        ErrorKind::Unsupported,
        "transparent sockets are not supported on this platform",
    )
}

pub fn set_ip_transparent(_socket: &Socket, _family: Family) -> io::Result<()> {
    Err(unsupported())
}

pub fn set_recv_original_dst(_socket: &Socket, _family: Family) -> io::Result<()> {
    Err(unsupported())
}

pub fn recv_from_with_destination(_fd: RawFd, _buf: &mut [u8]) -> io::Result<(usize, SocketAddr, SocketAddr)> {
    Err(unsupported())
}
