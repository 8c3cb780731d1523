//! Wake-on-LAN magic packets.

use super::{CollaboratorError, NetworkWake};
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddrV4};
use tokio::net::UdpSocket;

/// A 48-bit hardware address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    /// Parse `AA:BB:CC:DD:EE:FF`, `AA-BB-...`, `AABB.CCDD.EEFF` or bare hex.
    ///
    /// After removing `:`, `-` and `.` exactly 12 hex digits must remain.
    pub fn parse(text: &str) -> Option<Self> {
        let hex: String = text
            .trim()
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.'))
            .collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).ok()?;
        }
        Some(Self(bytes))
    }
}

impl std::fmt::Display for MacAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Six `0xFF` bytes followed by sixteen copies of the address.
pub fn magic_packet(mac: MacAddress) -> Vec<u8> {
    let mut packet = vec![0xFF; 6];
    for _ in 0..16 {
        packet.extend_from_slice(&mac.0);
    }
    packet
}

/// Broadcasts magic packets over UDP.
#[derive(Debug, Clone)]
pub struct UdpWake {
    target: SocketAddrV4,
}

impl Default for UdpWake {
    fn default() -> Self {
        Self {
            target: SocketAddrV4::new(Ipv4Addr::BROADCAST, 9),
        }
    }
}

impl UdpWake {
    /// Send to a specific address instead of the limited broadcast.
    pub fn with_target(target: SocketAddrV4) -> Self {
        Self { target }
    }
}

#[async_trait]
impl NetworkWake for UdpWake {
    async fn send_magic_packet(&self, mac: MacAddress) -> Result<String, CollaboratorError> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(|e| CollaboratorError::Failed(format!("cannot open UDP socket: {e}")))?;
        socket
            .set_broadcast(true)
            .map_err(|e| CollaboratorError::Failed(format!("cannot enable broadcast: {e}")))?;
        socket
            .send_to(&magic_packet(mac), self.target)
            .await
            .map_err(|e| CollaboratorError::Failed(format!("cannot send magic packet: {e}")))?;
        tracing::info!(%mac, target = %self.target, "magic packet sent");
        Ok(format!("Magic packet sent to {mac}."))
    }
}
