mod relay;
mod socket;

pub use self::{
    relay::{relay_datagram, RedirectedDatagram, RelayOutcome, DEFAULT_REPLY_TIMEOUT},
    socket::TransparentUdpSocket,
};
