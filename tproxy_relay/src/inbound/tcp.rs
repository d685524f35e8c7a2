use crate::{pool::WorkerPool, Error};

use std::time::Duration;
use tokio::io;

use log::{debug, error, info, warn};
use tproxy_socket::{AcceptedConnection, DialOptions, TransparentListener};

// Pause after a temporary accept failure such as EMFILE, so the loop doesn't spin
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

pub async fn serve(listener: TransparentListener, pool: WorkerPool, options: DialOptions) -> Result<(), Error> {
    loop {
        let client = match listener.accept().await {
            Ok(o) => o,
            Err(err) if err.is_temporary() => {
                warn!("temporary error while accepting on {}: {}", listener.local_addr(), err);
                tokio::time::sleep(ACCEPT_BACKOFF).await;
                continue;
            }
            Err(err) => {
                error!("unrecoverable error while accepting on {}: {}", listener.local_addr(), err);
                return Err(err.into());
            }
        };

        if pool.spawn(run(client, options)).await.is_err() {
            info!("stopped accepting on {}", listener.local_addr());
            return Ok(());
        }
    }
}

async fn run(mut client: AcceptedConnection, options: DialOptions) {
    info!(
        "accepting connection from {} with destination of {}",
        client.remote_addr(),
        client.local_addr()
    );

    let mut server_conn = match client.dial_original_destination(&options).await {
        Ok(o) => o,
        Err(err) => {
            warn!(
                "failed to connect to original destination {}: {}",
                client.local_addr(),
                err
            );
            return;
        }
    };

    match io::copy_bidirectional(&mut client, &mut server_conn).await {
        Ok((up, down)) => debug!(
            "{} <-> {} closed, {} bytes up, {} bytes down",
            client.remote_addr(),
            client.local_addr(),
            up,
            down
        ),
        Err(err) => debug!(
            "{} <-> {} closed with error: {}",
            client.remote_addr(),
            client.local_addr(),
            err
        ),
    }
}
