use crate::Error;

use std::{fs, net::SocketAddr, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

const DEFAULT_MAX_FLOWS: usize = 1024;
const DEFAULT_UDP_REPLY_TIMEOUT: u64 = 5;

#[derive(Serialize, Deserialize, Default)]
pub struct Config {
    pub tcp_listen: Option<Vec<SocketAddr>>,
    /// `tcp`, `tcp4` or `tcp6`
    pub tcp_network: Option<String>,
    pub udp_listen: Option<Vec<SocketAddr>>,
    pub spoof_source: Option<bool>,
    pub max_flows: Option<usize>,
    /// Seconds
    pub udp_reply_timeout: Option<u64>,
    /// Seconds
    pub connect_timeout: Option<u64>,
    pub debug: Option<bool>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let config = fs::read_to_string(path)?;
        Ok(json5::from_str(&config)?)
    }

    pub fn tcp_listen(&self) -> &[SocketAddr] {
        self.tcp_listen.as_deref().unwrap_or_default()
    }

    pub fn tcp_network(&self) -> &str {
        self.tcp_network.as_deref().unwrap_or("tcp")
    }

    pub fn udp_listen(&self) -> &[SocketAddr] {
        self.udp_listen.as_deref().unwrap_or_default()
    }

    pub fn spoof_source(&self) -> bool {
        self.spoof_source.unwrap_or(true)
    }

    pub fn max_flows(&self) -> usize {
        self.max_flows.unwrap_or(DEFAULT_MAX_FLOWS).max(1)
    }

    pub fn udp_reply_timeout(&self) -> Duration {
        Duration::from_secs(self.udp_reply_timeout.unwrap_or(DEFAULT_UDP_REPLY_TIMEOUT))
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout.map(Duration::from_secs)
    }

    pub fn debug(&self) -> bool {
        self.debug.unwrap_or(false)
    }
}
