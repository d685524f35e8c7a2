use crate::{pool::WorkerPool, Error};

use std::{future::Future, io, time::Duration};
use tokio::time;

use log::{info, trace, warn};
use tproxy_socket::{relay_datagram, NetworkAddress, RelayOutcome, TransparentUdpSocket};

// Pause after a receive failure, so a persistent error doesn't spin the loop
const RECV_BACKOFF: Duration = Duration::from_millis(100);

pub async fn serve(socket: TransparentUdpSocket, pool: WorkerPool, reply_timeout: Duration) -> Result<(), Error> {
    loop {
        let datagram = recv_with_backoff(socket.local_addr(), || socket.recv_datagram()).await;

        let spawned = pool
            .spawn(async move {
                match relay_datagram(&datagram, reply_timeout).await {
                    Ok(RelayOutcome::Replied(n)) => trace!(
                        "{} -> {}: {} bytes, {} bytes back",
                        datagram.source,
                        datagram.destination,
                        datagram.payload.len(),
                        n
                    ),
                    Ok(RelayOutcome::NoReply) => trace!(
                        "{} -> {}: {} bytes, no reply",
                        datagram.source,
                        datagram.destination,
                        datagram.payload.len()
                    ),
                    Err(err) => warn!(
                        "failed to relay datagram {} -> {}: {}",
                        datagram.source, datagram.destination, err
                    ),
                }
            })
            .await;

        if spawned.is_err() {
            info!("stopped receiving on {}", socket.local_addr());
            return Ok(());
        }
    }
}

async fn recv_with_backoff<T, F, Fut>(local: &NetworkAddress, mut recv: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = io::Result<T>>,
{
    loop {
        match recv().await {
            Ok(o) => return o,
            Err(err) => {
                warn!("failed to receive on {}: {}", local, err);
                time::sleep(RECV_BACKOFF).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::Instant;

    #[tokio::test]
    async fn receive_errors_pause_the_loop() {
        let local: NetworkAddress = "0.0.0.0:8053".parse().unwrap();
        let mut failures = 3;

        let started = Instant::now();
        let received = recv_with_backoff(&local, || {
            let result = if failures > 0 {
                failures -= 1;
                Err(io::Error::new(io::ErrorKind::Other, "bad file descriptor"))
            } else {
                Ok(7)
            };
            async move { result }
        })
        .await;

        assert_eq!(received, 7);
        assert_eq!(failures, 0);
        assert!(started.elapsed() >= RECV_BACKOFF * 3);
    }
}
