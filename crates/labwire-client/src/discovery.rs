//! Server discovery by announcement scan.
//!
//! Servers broadcast small JSON datagrams; a scan listens until one arrives
//! whose server type matches literally, then resolves the host from the
//! datagram's source address. Which server wins when several announce the
//! same type depends on arrival order.

use std::net::UdpSocket;
use std::time::{Duration, Instant};

use labwire_wire::{Announcement, ServerDescriptor};
use tracing::{debug, trace};

use crate::error::{ClientError, Result};

/// Announce port scanned by default, matching the announcer default.
pub const DEFAULT_ANNOUNCE_PORT: u16 = 50001;

/// How long a single poll waits before rechecking the scan deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

const MAX_DATAGRAM: usize = 2048;

/// A source of discovery announcements.
///
/// The UDP socket is the production source; tests substitute scripted ones.
pub trait AnnouncementSource {
    /// Wait up to `timeout` for the next announcement.
    ///
    /// Returns the announcement and the host it arrived from, or `None` when
    /// the timeout passes without one. Malformed datagrams are skipped, not
    /// errors.
    fn poll(&mut self, timeout: Duration) -> Result<Option<(Announcement, String)>>;
}

/// Announcement source reading JSON datagrams from a UDP socket.
pub struct UdpAnnouncementSource {
    socket: UdpSocket,
}

impl UdpAnnouncementSource {
    /// Bind the announce port on all interfaces.
    pub fn bind(port: u16) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port)).map_err(ClientError::Discovery)?;
        Ok(Self { socket })
    }

    /// Port the source is listening on.
    pub fn local_port(&self) -> Result<u16> {
        Ok(self
            .socket
            .local_addr()
            .map_err(ClientError::Discovery)?
            .port())
    }
}

impl AnnouncementSource for UdpAnnouncementSource {
    fn poll(&mut self, timeout: Duration) -> Result<Option<(Announcement, String)>> {
        self.socket
            .set_read_timeout(Some(timeout.max(Duration::from_millis(1))))
            .map_err(ClientError::Discovery)?;

        let mut buf = [0u8; MAX_DATAGRAM];
        match self.socket.recv_from(&mut buf) {
            Ok((len, source)) => match serde_json::from_slice::<Announcement>(&buf[..len]) {
                Ok(announcement) => {
                    trace!(%source, server_type = %announcement.server_type, "announcement");
                    Ok(Some((announcement, source.ip().to_string())))
                }
                Err(err) => {
                    debug!(%source, error = %err, "skipping malformed announcement");
                    Ok(None)
                }
            },
            Err(err)
                if err.kind() == std::io::ErrorKind::WouldBlock
                    || err.kind() == std::io::ErrorKind::TimedOut =>
            {
                Ok(None)
            }
            Err(err) => Err(ClientError::Discovery(err)),
        }
    }
}

/// Scan `source` until a server of exactly `server_type` announces itself.
///
/// The first matching announcement wins. Announcements for other server
/// types are skipped and do not consume the budget beyond the time they
/// took to arrive.
pub fn scan_with<S: AnnouncementSource>(
    source: &mut S,
    server_type: &str,
    budget: Duration,
) -> Result<ServerDescriptor> {
    let deadline = Instant::now() + budget;

    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(ClientError::DiscoveryTimeout {
                server_type: server_type.to_string(),
                budget,
            });
        }

        let remaining = deadline - now;
        if let Some((announcement, host)) = source.poll(remaining.min(POLL_INTERVAL))? {
            if announcement.server_type == server_type {
                let descriptor = announcement.into_descriptor(host);
                debug!(
                    server_type = %descriptor.server_type,
                    host = %descriptor.host,
                    port = %descriptor.port,
                    uuid = %descriptor.uuid,
                    "server discovered"
                );
                return Ok(descriptor);
            }
        }
    }
}

/// Scan the given UDP announce port for a server of `server_type`.
pub fn scan_for(server_type: &str, port: u16, budget: Duration) -> Result<ServerDescriptor> {
    let mut source = UdpAnnouncementSource::bind(port)?;
    scan_with(&mut source, server_type, budget)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Scripted {
        announcements: Vec<Option<(Announcement, String)>>,
    }

    impl AnnouncementSource for Scripted {
        fn poll(&mut self, timeout: Duration) -> Result<Option<(Announcement, String)>> {
            if self.announcements.is_empty() {
                std::thread::sleep(timeout);
                return Ok(None);
            }
            Ok(self.announcements.remove(0))
        }
    }

    fn ann(server_type: &str, port: u16, uuid: &str) -> Option<(Announcement, String)> {
        Some((
            Announcement {
                server_type: server_type.to_string(),
                port,
                uuid: uuid.to_string(),
            },
            "10.0.0.5".to_string(),
        ))
    }

    #[test]
    fn first_matching_announcement_wins() {
        let mut source = Scripted {
            announcements: vec![
                ann("other", 1000, "u-other"),
                None,
                ann("freezer", 2000, "u-first"),
                ann("freezer", 3000, "u-second"),
            ],
        };

        let descriptor = scan_with(&mut source, "freezer", Duration::from_secs(1)).unwrap();
        assert_eq!(descriptor.port, 2000);
        assert_eq!(descriptor.uuid, "u-first");
        assert_eq!(descriptor.host, "10.0.0.5");
    }

    #[test]
    fn type_match_is_literal() {
        let mut source = Scripted {
            announcements: vec![ann("Freezer", 1000, "u-case"), ann("freezer ", 2000, "u-pad")],
        };

        let result = scan_with(&mut source, "freezer", Duration::from_millis(100));
        assert!(matches!(result, Err(ClientError::DiscoveryTimeout { .. })));
    }

    #[test]
    fn budget_bounds_the_scan() {
        let mut source = Scripted {
            announcements: vec![],
        };

        let budget = Duration::from_millis(150);
        let started = Instant::now();
        let result = scan_with(&mut source, "freezer", budget);
        let elapsed = started.elapsed();

        assert!(matches!(
            result,
            Err(ClientError::DiscoveryTimeout { server_type, budget: b })
                if server_type == "freezer" && b == budget
        ));
        assert!(elapsed >= budget);
        assert!(elapsed < budget + Duration::from_secs(1));
    }

    #[test]
    fn udp_source_resolves_host_from_datagram() {
        let mut source = UdpAnnouncementSource::bind(0).unwrap();
        let port = source.local_port().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        let payload = serde_json::to_vec(&Announcement {
            server_type: "freezer".to_string(),
            port: 40123,
            uuid: "u-udp".to_string(),
        })
        .unwrap();
        sender.send_to(&payload, ("127.0.0.1", port)).unwrap();

        let descriptor = scan_with(&mut source, "freezer", Duration::from_secs(2)).unwrap();
        assert_eq!(descriptor.host, "127.0.0.1");
        assert_eq!(descriptor.port, 40123);
        assert_eq!(descriptor.uuid, "u-udp");
    }

    #[test]
    fn udp_source_skips_malformed_datagrams() {
        let mut source = UdpAnnouncementSource::bind(0).unwrap();
        let port = source.local_port().unwrap();

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender.send_to(b"not json", ("127.0.0.1", port)).unwrap();
        let payload = serde_json::to_vec(&Announcement {
            server_type: "freezer".to_string(),
            port: 40124,
            uuid: "u-ok".to_string(),
        })
        .unwrap();
        sender.send_to(&payload, ("127.0.0.1", port)).unwrap();

        let descriptor = scan_with(&mut source, "freezer", Duration::from_secs(2)).unwrap();
        assert_eq!(descriptor.uuid, "u-ok");
    }
}
