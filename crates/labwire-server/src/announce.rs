//! UDP discovery announcements.
//!
//! A running server periodically broadcasts a small JSON datagram naming its
//! server type, command port and identity. Clients listening on the announce
//! port learn the host from the datagram's source address, so the payload
//! never carries one.

use std::net::UdpSocket;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use labwire_wire::Announcement;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, ServerError};

/// Default destination for announcements: the local broadcast address on
/// port 50001.
pub const DEFAULT_ANNOUNCE_ADDR: &str = "255.255.255.255:50001";

/// Default interval between announcements.
pub const DEFAULT_ANNOUNCE_INTERVAL: Duration = Duration::from_millis(500);

/// Background announcer thread. Stops on [`Announcer::stop`] or drop.
pub struct Announcer {
    stop_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl Announcer {
    /// Start announcing `server_type` on `announce_addr` every `interval`.
    pub fn start(
        server_type: &str,
        port: u16,
        uuid: Uuid,
        announce_addr: &str,
        interval: Duration,
    ) -> Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(ServerError::Announce)?;
        socket.set_broadcast(true).map_err(ServerError::Announce)?;

        let announcement = Announcement {
            server_type: server_type.to_string(),
            port,
            uuid: uuid.to_string(),
        };
        let payload = serde_json::to_vec(&announcement)?;
        let destination = announce_addr.to_string();

        let (stop_tx, stop_rx) = mpsc::channel();
        let worker = thread::Builder::new()
            .name("labwire-announce".to_string())
            .spawn(move || loop {
                match socket.send_to(&payload, &destination) {
                    Ok(_) => debug!(%destination, "sent announcement"),
                    // Transient send failures are tolerated; the next tick
                    // retries.
                    Err(err) => warn!(%destination, error = %err, "announcement send failed"),
                }
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            })
            .map_err(ServerError::Announce)?;

        Ok(Self {
            stop_tx,
            worker: Some(worker),
        })
    }

    /// Stop the announcer and wait for its thread to exit.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Announcer {
    fn drop(&mut self) {
        self.stop();
    }
}
