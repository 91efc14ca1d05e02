use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpStream, UdpSocket};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::{MacAddress, MacParseError};
use crate::operation::OperationEvent;

/// Discard port conventionally used for Wake-on-LAN.
pub const WOL_PORT: u16 = 9;
pub const MAGIC_PACKET_LEN: usize = 6 + 6 * 16;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("invalid MAC address '{mac}': {source}")]
    InvalidMac {
        mac: String,
        #[source]
        source: MacParseError,
    },

    #[error("udp send to {addr} failed: {source}")]
    Send {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("short udp send to {addr}: {sent}/{len} bytes")]
    ShortSend {
        addr: SocketAddrV4,
        sent: usize,
        len: usize,
    },
}

/// 6 bytes of `0xFF` followed by the MAC repeated 16 times.
pub fn magic_packet(mac: &MacAddress) -> [u8; MAGIC_PACKET_LEN] {
    let mut packet = [0xFFu8; MAGIC_PACKET_LEN];
    for chunk in packet[6..].chunks_exact_mut(6) {
        chunk.copy_from_slice(&mac.0);
    }
    packet
}

/// First three octets equal. An unknown or unspecified local address counts
/// as a match so an undeterminable network never blocks a wake.
pub fn same_subnet(local: Option<Ipv4Addr>, pc: Ipv4Addr) -> bool {
    match local {
        None => true,
        Some(ip) if ip.is_unspecified() => true,
        Some(ip) => ip.octets()[..3] == pc.octets()[..3],
    }
}

/// The socket-level operations the controller performs.
pub trait PowerNetwork: Send + Sync {
    /// Broadcast one magic packet to `broadcast:9`.
    fn send_wol(&self, broadcast: Ipv4Addr, mac: &MacAddress) -> Result<(), NetError>;

    /// Send one datagram, no reply expected.
    fn send_datagram(&self, target: SocketAddrV4, payload: &[u8]) -> Result<(), NetError>;

    /// TCP connect with timeout; the connection is dropped straight away.
    fn probe(&self, target: SocketAddrV4, timeout: Duration) -> bool;

    /// Local address the OS would use to reach `toward`, if any.
    fn local_ipv4(&self, toward: Ipv4Addr) -> Option<Ipv4Addr>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemNetwork;

impl PowerNetwork for SystemNetwork {
    fn send_wol(&self, broadcast: Ipv4Addr, mac: &MacAddress) -> Result<(), NetError> {
        let packet = magic_packet(mac);
        let addr = SocketAddrV4::new(broadcast, WOL_PORT);
        udp_send(addr, &packet)
    }

    fn send_datagram(&self, target: SocketAddrV4, payload: &[u8]) -> Result<(), NetError> {
        udp_send(target, payload)
    }

    fn probe(&self, target: SocketAddrV4, timeout: Duration) -> bool {
        match TcpStream::connect_timeout(&SocketAddr::V4(target), timeout) {
            Ok(stream) => {
                drop(stream);
                true
            }
            Err(e) => {
                debug!(%target, error = %e, "probe: unreachable");
                false
            }
        }
    }

    fn local_ipv4(&self, toward: Ipv4Addr) -> Option<Ipv4Addr> {
        // Connecting a UDP socket only selects a route; nothing is sent.
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        socket.connect((toward, WOL_PORT)).ok()?;
        match socket.local_addr().ok()? {
            SocketAddr::V4(a) if !a.ip().is_unspecified() => Some(*a.ip()),
            _ => None,
        }
    }
}

// SO_BROADCAST is always set so a `.255` command target still works.
fn udp_send(addr: SocketAddrV4, payload: &[u8]) -> Result<(), NetError> {
    let send_err = |e: io::Error| NetError::Send { addr, source: e };

    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).map_err(send_err)?;
    socket.set_broadcast(true).map_err(send_err)?;
    let sent = socket.send_to(payload, addr).map_err(send_err)?;
    if sent != payload.len() {
        return Err(NetError::ShortSend {
            addr,
            sent,
            len: payload.len(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
pub struct WolRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for WolRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(400),
        }
    }
}

/// Up to `retry.attempts` sends with a fixed gap; stops at the first success.
///
/// A MAC that does not parse fails immediately: no socket is opened and no
/// retry is spent on it.
pub fn send_wol_with_retries<F>(
    net: &dyn PowerNetwork,
    broadcast: Ipv4Addr,
    mac: &str,
    retry: WolRetry,
    on_event: &mut F,
) -> Result<u32, NetError>
where
    F: FnMut(OperationEvent),
{
    let mac = mac.parse::<MacAddress>().map_err(|e| NetError::InvalidMac {
        mac: mac.to_string(),
        source: e,
    })?;

    let attempts = retry.attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        on_event(OperationEvent::WolAttempt {
            attempt,
            attempts,
            broadcast,
            mac: mac.to_string(),
        });
        match net.send_wol(broadcast, &mac) {
            Ok(()) => {
                debug!(attempt, "wol sent");
                return Ok(attempt);
            }
            Err(e) => {
                warn!(attempt, attempts, error = %e, "wol send failed");
                if attempt >= attempts {
                    return Err(e);
                }
                on_event(OperationEvent::WolRetry {
                    attempt,
                    attempts,
                    error: e.to_string(),
                });
                std::thread::sleep(retry.delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNetwork;

    #[test]
    fn test_magic_packet_layout() {
        let mac: MacAddress = "70:85:C2:DA:3D:A3".parse().unwrap();
        let packet = magic_packet(&mac);

        assert_eq!(packet.len(), 102);
        assert_eq!(&packet[..6], &[0xFF; 6]);
        for rep in packet[6..].chunks(6) {
            assert_eq!(rep, &[0x70, 0x85, 0xC2, 0xDA, 0x3D, 0xA3]);
        }
    }

    #[test]
    fn test_same_subnet_compares_three_octets() {
        let pc = Ipv4Addr::new(192, 168, 31, 94);
        assert!(same_subnet(Some(Ipv4Addr::new(192, 168, 31, 7)), pc));
        assert!(!same_subnet(Some(Ipv4Addr::new(192, 168, 1, 7)), pc));
        assert!(!same_subnet(Some(Ipv4Addr::new(10, 168, 31, 7)), pc));
    }

    #[test]
    fn test_same_subnet_fails_open() {
        let pc = Ipv4Addr::new(192, 168, 31, 94);
        assert!(same_subnet(None, pc));
        assert!(same_subnet(Some(Ipv4Addr::UNSPECIFIED), pc));
    }

    #[test]
    fn test_wol_retries_until_success() {
        let net = FakeNetwork::new().with_wol_failures(2);
        let mut events = Vec::new();
        let retry = WolRetry {
            attempts: 3,
            delay: Duration::ZERO,
        };

        let attempt = send_wol_with_retries(
            &net,
            Ipv4Addr::new(192, 168, 31, 255),
            "70:85:C2:DA:3D:A3",
            retry,
            &mut |ev| events.push(ev),
        )
        .unwrap();

        assert_eq!(attempt, 3);
        assert_eq!(net.wol_calls(), 3);
        let retries = events
            .iter()
            .filter(|e| matches!(e, OperationEvent::WolRetry { .. }))
            .count();
        assert_eq!(retries, 2);
    }

    #[test]
    fn test_wol_gives_up_after_budget() {
        let net = FakeNetwork::new().with_wol_failures(5);
        let retry = WolRetry {
            attempts: 3,
            delay: Duration::ZERO,
        };
        let r = send_wol_with_retries(
            &net,
            Ipv4Addr::BROADCAST,
            "70:85:C2:DA:3D:A3",
            retry,
            &mut |_| {},
        );
        assert!(matches!(r, Err(NetError::Send { .. })));
        assert_eq!(net.wol_calls(), 3);
    }

    #[test]
    fn test_wol_bad_mac_never_touches_network() {
        let net = FakeNetwork::new();
        let r = send_wol_with_retries(
            &net,
            Ipv4Addr::BROADCAST,
            "not-a-mac",
            WolRetry::default(),
            &mut |_| {},
        );
        assert!(matches!(r, Err(NetError::InvalidMac { .. })));
        assert_eq!(net.wol_calls(), 0);
    }

    #[test]
    fn test_probe_detects_listening_port() {
        let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = listener.local_addr().unwrap().port();
        let target = SocketAddrV4::new(Ipv4Addr::LOCALHOST, port);
        assert!(SystemNetwork.probe(target, Duration::from_secs(1)));

        drop(listener);
        assert!(!SystemNetwork.probe(target, Duration::from_millis(300)));
    }

    #[test]
    fn test_datagram_reaches_receiver() {
        let rx = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        rx.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        let SocketAddr::V4(addr) = rx.local_addr().unwrap() else {
            panic!("expected v4");
        };

        SystemNetwork.send_datagram(addr, b"SHUTDOWN").unwrap();

        let mut buf = [0u8; 64];
        let n = rx.recv(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"SHUTDOWN");
    }
}
