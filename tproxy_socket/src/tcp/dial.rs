use crate::{
    addr::NetworkAddress,
    error::DialError,
    socket::{create_transparent_socket, SocketConfig},
};

use std::{io, time::Duration};

use log::debug;
use tokio::{net::TcpStream, time};

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DialOptions {
    /// Bind the outbound socket to the client's address before connecting
    pub spoof_source: bool,
    /// Upper bound for the connect to complete. `None` waits as long as the kernel does.
    pub connect_timeout: Option<Duration>,
}

impl DialOptions {
    pub fn spoofed() -> Self {
        Self {
            spoof_source: true,
            connect_timeout: None,
        }
    }
}

/// Connects a transparent TCP socket to `destination`, optionally from `bind`.
///
/// `bind` may be an address this host does not own. The connect is issued
/// non-blocking and awaited here, so the returned stream is established.
pub async fn dial_transparent(
    destination: &NetworkAddress,
    bind: Option<&NetworkAddress>,
    connect_timeout: Option<Duration>,
) -> Result<TcpStream, DialError> {
    let addr = destination.to_socket_addr()?;
    let bind_addr = bind.map(NetworkAddress::to_socket_addr).transpose()?;

    let socket = create_transparent_socket(&SocketConfig::stream(destination.family()))?;

    if let Some(bind_addr) = bind_addr {
        socket
            .bind(&bind_addr.into())
            .map_err(|source| DialError::Bind { addr: bind_addr, source })?;
    }

    match socket.connect(&addr.into()) {
        Ok(()) => {}
        Err(ref err) if is_in_progress(err) => {}
        Err(source) => return Err(DialError::Connect { addr, source }),
    }

    let stream = TcpStream::from_std(socket.into()).map_err(DialError::Register)?;

    let connected = match connect_timeout {
        Some(timeout) => time::timeout(timeout, wait_connected(&stream))
            .await
            .map_err(|_| DialError::Timeout { addr })?,
        None => wait_connected(&stream).await,
    };
    connected.map_err(|source| DialError::Connect { addr, source })?;

    match bind_addr {
        Some(bind_addr) => debug!("dialed {} from {}", addr, bind_addr),
        None => debug!("dialed {}", addr),
    }

    Ok(stream)
}

// EAGAIN from connect(2) means no local port or route was available, not pending
fn is_in_progress(err: &io::Error) -> bool {
    err.raw_os_error() == Some(libc::EINPROGRESS)
}

// A non-blocking connect finishes when the socket turns writable; SO_ERROR tells how
async fn wait_connected(stream: &TcpStream) -> io::Result<()> {
    stream.writable().await?;

    match stream.take_error()? {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_progress_is_matched_by_errno() {
        assert!(is_in_progress(&io::Error::from_raw_os_error(libc::EINPROGRESS)));
        assert!(!is_in_progress(&io::Error::from_raw_os_error(libc::EAGAIN)));
        assert!(!is_in_progress(&io::Error::from(io::ErrorKind::WouldBlock)));
        assert!(!is_in_progress(&io::Error::from_raw_os_error(libc::ECONNREFUSED)));
        // Same text as the kernel message, but not the structured condition
        assert!(!is_in_progress(&io::Error::new(
            io::ErrorKind::Other,
            "operation now in progress"
        )));
    }

    #[test]
    fn default_options_do_not_spoof() {
        let options = DialOptions::default();
        assert!(!options.spoof_source);
        assert_eq!(options.connect_timeout, None);
        assert!(DialOptions::spoofed().spoof_source);
    }
}
