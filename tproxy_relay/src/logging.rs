use std::env;

use env_logger::Builder;
use log::LevelFilter;

pub fn init(debug: bool) {
    let mut log_builder = Builder::new();
    log_builder.filter(None, LevelFilter::Info);

    if debug {
        log_builder
            .filter(Some("tproxy_relay"), LevelFilter::Debug)
            .filter(Some("tproxy_socket"), LevelFilter::Debug);
    }

    if let Ok(env_conf) = env::var("RUST_LOG") {
        log_builder.parse_filters(&env_conf);
    }

    log_builder.init();
}
