//! UDP listener and best-effort sender.

use std::time::Duration;

use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::envelope::Message;
use crate::error::ChatError;

/// Largest record accepted from the wire. Anything bigger must not be sent;
/// the OS drops what does not fit the datagram.
pub const MAX_RECORD_BYTES: usize = 4096;

/// How long the sender listens for an ICMP port-unreachable echo. Timing out
/// is the expected, successful case.
const SEND_PROBE: Duration = Duration::from_millis(100);

/// Inbound datagram listener, bound once for the life of the process.
pub struct Listener {
    socket: UdpSocket,
}

impl Listener {
    /// Bind to `0.0.0.0:<port>`.
    pub async fn bind(port: &str) -> Result<Self, ChatError> {
        let socket = UdpSocket::bind(format!("0.0.0.0:{port}")).await?;
        info!(addr = %socket.local_addr()?, "listening");
        Ok(Self { socket })
    }

    /// The bound local address.
    pub fn local_addr(&self) -> Result<std::net::SocketAddr, ChatError> {
        Ok(self.socket.local_addr()?)
    }

    /// Read datagrams until shutdown, decoding each in a short-lived task and
    /// pushing the result onto the engine's inbound queue.
    ///
    /// The queue is bounded and the decode task blocks when it is full: a
    /// flooded port exerts backpressure instead of growing memory. Read
    /// errors are logged and the loop continues.
    pub async fn run(self, queue: mpsc::Sender<Message>, mut shutdown: watch::Receiver<bool>) {
        let mut buf = [0u8; MAX_RECORD_BYTES];
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                received = self.socket.recv_from(&mut buf) => {
                    match received {
                        Ok((len, from)) => {
                            let bytes = buf[..len].to_vec();
                            let queue = queue.clone();
                            tokio::spawn(async move {
                                match Message::from_bytes(&bytes) {
                                    Ok(message) => {
                                        if queue.send(message).await.is_err() {
                                            debug!("inbound queue closed");
                                        }
                                    }
                                    Err(err) => warn!(%err, %from, "undecodable datagram"),
                                }
                            });
                        }
                        Err(err) => warn!(%err, "socket read"),
                    }
                }
            }
        }
        info!("listener stopped");
    }
}

/// Transmit one record as a single datagram to `to` (an `address:port`).
///
/// Best-effort: a clean return does not imply receipt. A short zero-byte read
/// after the write catches peers whose stack answers a closed port with ICMP
/// port-unreachable; those sends report [`ChatError::Transport`].
pub async fn send(to: &str, message: &Message) -> Result<(), ChatError> {
    let target = lookup_host(to)
        .await?
        .next()
        .ok_or_else(|| ChatError::NotFound(format!("address {to}")))?;
    let local = if target.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" };

    let socket = UdpSocket::bind(local).await?;
    socket.connect(target).await?;
    socket.send(&message.to_bytes()?).await?;

    let mut probe = [0u8; 1];
    match timeout(SEND_PROBE, socket.recv(&mut probe)).await {
        Err(_elapsed) => Ok(()),
        Ok(Ok(_)) => Ok(()),
        Ok(Err(err)) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::PayloadKind;

    fn sample_message() -> Message {
        Message {
            payload: vec![1, 2, 3, 4],
            signature: vec![9; 32],
            kind: PayloadKind::Text,
        }
    }

    #[tokio::test]
    async fn listener_decodes_and_queues() {
        let listener = Listener::bind("0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (queue_tx, mut queue_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(queue_tx, shutdown_rx));

        send(&format!("127.0.0.1:{port}"), &sample_message())
            .await
            .unwrap();

        let received = timeout(Duration::from_secs(5), queue_rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed");
        assert_eq!(received.payload, vec![1, 2, 3, 4]);
        assert_eq!(received.kind, PayloadKind::Text);

        handle.abort();
    }

    #[tokio::test]
    async fn listener_stops_on_shutdown() {
        let listener = Listener::bind("0").await.unwrap();

        let (queue_tx, _queue_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(queue_tx, shutdown_rx));

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle)
            .await
            .expect("listener did not stop")
            .unwrap();
    }

    #[tokio::test]
    async fn garbage_datagram_is_dropped() {
        let listener = Listener::bind("0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (queue_tx, mut queue_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(listener.run(queue_tx, shutdown_rx));

        let socket = UdpSocket::bind("0.0.0.0:0").await.unwrap();
        socket
            .send_to(b"not a record", format!("127.0.0.1:{port}"))
            .await
            .unwrap();

        // then a real record; only that one should surface
        send(&format!("127.0.0.1:{port}"), &sample_message())
            .await
            .unwrap();

        let received = timeout(Duration::from_secs(5), queue_rx.recv())
            .await
            .expect("timed out")
            .expect("queue closed");
        assert_eq!(received.payload, vec![1, 2, 3, 4]);
        assert!(queue_rx.try_recv().is_err());

        handle.abort();
    }
}
