mod connection;
mod dial;
mod listener;

pub use self::{
    connection::AcceptedConnection,
    dial::{dial_transparent, DialOptions},
    listener::TransparentListener,
};
