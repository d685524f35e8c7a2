use crate::addr::Family;

use std::{
    fmt::{self, Display, Formatter},
    io,
    net::SocketAddr,
};

use thiserror::Error;

/// Malformed or unconvertible network address
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("zone identifier {0:?} is not a non-negative 32-bit integer")]
    InvalidZone(String),

    #[error("{family} address needs {expected} bytes, got {actual}")]
    InvalidLength {
        family: Family,
        expected: usize,
        actual: usize,
    },

    #[error("unsupported address family {0}")]
    UnsupportedFamily(libc::sa_family_t),
}

/// Step of transparent socket construction
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SocketStep {
    Open,
    SetReuse,
    SetTransparent,
    SetNonblocking,
    SetRecvOriginalDst,
    SetOnlyV6,
}

impl SocketStep {
    pub const fn name(self) -> &'static str {
        match self {
            SocketStep::Open => "open",
            SocketStep::SetReuse => "set-reuse",
            SocketStep::SetTransparent => "set-transparent",
            SocketStep::SetNonblocking => "set-nonblocking",
            SocketStep::SetRecvOriginalDst => "set-recv-original-dst",
            SocketStep::SetOnlyV6 => "set-only-v6",
        }
    }
}

impl Display for SocketStep {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure while creating or configuring a transparent socket
#[derive(Debug, Error)]
#[error("socket {step}: {source}")]
pub struct SocketError {
    pub step: SocketStep,
    #[source]
    pub source: io::Error,
}

impl SocketError {
    pub fn new(step: SocketStep, source: io::Error) -> SocketError {
        SocketError { step, source }
    }

    /// The process lacks the privilege for this step.
    ///
    /// For [`SocketStep::SetTransparent`] this almost always means `CAP_NET_ADMIN`
    /// (or `CAP_NET_RAW`) is missing.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.source.raw_os_error(), Some(libc::EPERM) | Some(libc::EACCES))
            || self.source.kind() == io::ErrorKind::PermissionDenied
    }
}

#[derive(Debug, Error)]
pub enum ListenError {
    #[error("unknown network {0:?}")]
    UnknownNetwork(String),

    #[error("local bind address is missing")]
    MissingAddress,

    #[error("network {network} cannot listen on a {family} address")]
    FamilyMismatch { network: String, family: Family },

    #[error("build socket address: {0}")]
    Address(#[from] AddressError),

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error("socket bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("socket listen: {0}")]
    Listen(#[source] io::Error),

    #[error("register listener: {0}")]
    Register(#[source] io::Error),
}

/// Accept failure, classified as temporary or fatal
#[derive(Debug, Error)]
#[error("accept: {source}")]
pub struct AcceptError {
    #[source]
    pub source: io::Error,
}

impl AcceptError {
    pub fn new(source: io::Error) -> AcceptError {
        AcceptError { source }
    }

    /// Conditions that clear up on their own; an accept loop may log and go on.
    pub fn is_temporary(&self) -> bool {
        match self.source.kind() {
            io::ErrorKind::WouldBlock
            | io::ErrorKind::Interrupted
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset => true,
            _ => matches!(
                self.source.raw_os_error(),
                Some(libc::EMFILE) | Some(libc::ENFILE) | Some(libc::ENOBUFS) | Some(libc::ENOMEM)
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum DialError {
    #[error("build socket address: {0}")]
    Address(#[from] AddressError),

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error("socket bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("socket connect {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("connect {addr} timed out")]
    Timeout { addr: SocketAddr },

    #[error("convert socket to stream: {0}")]
    Register(#[source] io::Error),
}

/// Leg of a datagram relay
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RelayLeg {
    /// Client payload toward the true destination
    Outbound,
    /// Destination reply back toward the client
    Reply,
}

impl Display for RelayLeg {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            RelayLeg::Outbound => f.write_str("outbound"),
            RelayLeg::Reply => f.write_str("reply"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("build socket address: {0}")]
    Address(#[from] AddressError),

    #[error(transparent)]
    Socket(#[from] SocketError),

    #[error("{leg} socket bind {addr}: {source}")]
    Bind {
        leg: RelayLeg,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("{leg} socket connect {addr}: {source}")]
    Connect {
        leg: RelayLeg,
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("{leg} short write: {written} of {expected} bytes")]
    ShortWrite {
        leg: RelayLeg,
        written: usize,
        expected: usize,
    },

    #[error("{leg} i/o: {source}")]
    Io {
        leg: RelayLeg,
        #[source]
        source: io::Error,
    },
}
