#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod config;
mod inbound;
mod logging;
mod pool;

use crate::{config::Config, pool::WorkerPool};

use std::{process, time::Duration};
use tokio::{signal, task::JoinSet, time};

use log::{error, info, warn};
use tproxy_socket::{DialOptions, NetworkAddress, TransparentListener, TransparentUdpSocket};

type Error = Box<dyn std::error::Error + Sync + Send>;

const CONFIG_PATH: &str = "./config.json5";
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() {
    let config = match Config::load(CONFIG_PATH) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("failed to load {}: {}", CONFIG_PATH, err);
            process::exit(1);
        }
    };

    logging::init(config.debug());

    if let Err(err) = run(config).await {
        error!("{}", err);
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Error> {
    let pool = WorkerPool::new(config.max_flows());
    let options = DialOptions {
        spoof_source: config.spoof_source(),
        connect_timeout: config.connect_timeout(),
    };

    let mut servers = JoinSet::new();

    for addr in config.tcp_listen() {
        let addr = NetworkAddress::from(*addr);
        let listener = TransparentListener::listen(config.tcp_network(), Some(&addr))?;
        info!("transparent tcp listening on {}", listener.local_addr());
        servers.spawn(inbound::tcp::serve(listener, pool.clone(), options));
    }

    for addr in config.udp_listen() {
        let socket = TransparentUdpSocket::bind(&NetworkAddress::from(*addr))?;
        info!("transparent udp listening on {}", socket.local_addr());
        servers.spawn(inbound::udp::serve(socket, pool.clone(), config.udp_reply_timeout()));
    }

    if servers.is_empty() {
        return Err("no tcp_listen or udp_listen address configured".into());
    }

    let serving = async {
        while let Some(result) = servers.join_next().await {
            match result {
                Ok(Ok(())) => {}
                Ok(Err(err)) => error!("listener stopped: {}", err),
                Err(err) => error!("listener task failed: {}", err),
            }
        }
    };

    tokio::select! {
        _ = signal::ctrl_c() => info!("shutting down"),
        _ = serving => warn!("all listeners stopped"),
    }

    servers.abort_all();
    pool.close();

    if time::timeout(DRAIN_TIMEOUT, pool.wait_idle()).await.is_err() {
        warn!("{} flows still running at exit", pool.in_flight());
    }

    Ok(())
}
