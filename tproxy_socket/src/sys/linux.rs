use crate::addr::Family;

use std::{
    io::{self, Error, ErrorKind},
    mem,
    net::SocketAddr,
    os::fd::{AsRawFd, RawFd},
    ptr,
};

use socket2::{SockAddr, Socket};

/// Lets the socket bind and connect with addresses this host does not own
pub fn set_ip_transparent(socket: &Socket, family: Family) -> io::Result<()> {
    match family {
        Family::Ipv4 => set_int_option(socket, libc::SOL_IP, libc::IP_TRANSPARENT),
        // Same flag as IP_TRANSPARENT, so it covers IPv4-mapped peers too
        Family::Ipv6 => set_int_option(socket, libc::SOL_IPV6, libc::IPV6_TRANSPARENT),
    }
}

/// Asks the kernel to attach the original destination to every received datagram
pub fn set_recv_original_dst(socket: &Socket, family: Family) -> io::Result<()> {
    match family {
        Family::Ipv4 => set_int_option(socket, libc::SOL_IP, libc::IP_RECVORIGDSTADDR),
        Family::Ipv6 => set_int_option(socket, libc::SOL_IPV6, libc::IPV6_RECVORIGDSTADDR),
    }
}

fn set_int_option(socket: &Socket, level: libc::c_int, opt: libc::c_int) -> io::Result<()> {
    let fd = socket.as_raw_fd();
    let enable: libc::c_int = 1;

    unsafe {
        let ret = libc::setsockopt(
            fd,
            level,
            opt,
            &enable as *const _ as *const _,
            mem::size_of_val(&enable) as libc::socklen_t,
        );

        if ret != 0 {
            return Err(Error::last_os_error());
        }
    }

    Ok(())
}

fn get_destination_addr(msg: &libc::msghdr) -> Option<(libc::sockaddr_storage, libc::socklen_t)> {
    unsafe {
        let mut cmsg: *mut libc::cmsghdr = libc::CMSG_FIRSTHDR(msg);
        while !cmsg.is_null() {
            let rcmsg = &*cmsg;
            let len = match (rcmsg.cmsg_level, rcmsg.cmsg_type) {
                (libc::SOL_IP, libc::IP_RECVORIGDSTADDR) => mem::size_of::<libc::sockaddr_in>(),
                (libc::SOL_IPV6, libc::IPV6_RECVORIGDSTADDR) => mem::size_of::<libc::sockaddr_in6>(),
                _ => {
                    cmsg = libc::CMSG_NXTHDR(msg, cmsg);
                    continue;
                }
            };

            let mut dst_addr: libc::sockaddr_storage = mem::zeroed();
            ptr::copy_nonoverlapping(
                libc::CMSG_DATA(cmsg),
                &mut dst_addr as *mut _ as *mut u8,
                len,
            );
            return Some((dst_addr, len as libc::socklen_t));
        }
    }

    None
}

/// `recvmsg` returning (length, source, original destination)
///
/// The socket must have [`set_recv_original_dst`] applied. Returns
/// `WouldBlock` when nothing is queued, so it can be driven by the reactor.
pub fn recv_from_with_destination(fd: RawFd, buf: &mut [u8]) -> io::Result<(usize, SocketAddr, SocketAddr)> {
    unsafe {
        let mut control_buf = [0u8; 64];
        let mut src_addr: libc::sockaddr_storage = mem::zeroed();

        let mut msg: libc::msghdr = mem::zeroed();
        msg.msg_name = &mut src_addr as *mut _ as *mut _;
        msg.msg_namelen = mem::size_of_val(&src_addr) as libc::socklen_t;

        let mut iov = libc::iovec {
            iov_base: buf.as_mut_ptr() as *mut _,
            iov_len: buf.len() as libc::size_t,
        };
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;

        msg.msg_control = control_buf.as_mut_ptr() as *mut _;
        msg.msg_controllen = control_buf.len() as _;

        let ret = libc::recvmsg(fd, &mut msg, 0);
        if ret < 0 {
            return Err(Error::last_os_error());
        }

        let (dst_addr, dst_len) = match get_destination_addr(&msg) {
            None => {
                let err = Error::new(ErrorKind::InvalidData, "missing destination address in msghdr");
                return Err(err);
            }
            Some(d) => d,
        };

        let src = SockAddr::new(src_addr, msg.msg_namelen);
        let dst = SockAddr::new(dst_addr, dst_len);

        match (src.as_socket(), dst.as_socket()) {
            (Some(src), Some(dst)) => Ok((ret as usize, src, dst)),
            _ => Err(Error::new(ErrorKind::InvalidData, "datagram address is not an inet address")),
        }
    }
}
