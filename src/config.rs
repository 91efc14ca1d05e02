use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::str::FromStr;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::store::{KeyValueStore, StoreError};

pub const KEY_PC_IP: &str = "pc_ip";
pub const KEY_BROADCAST_IP: &str = "broadcast_ip";
pub const KEY_PC_MAC: &str = "pc_mac";
pub const KEY_UDP_PORT: &str = "udp_port";
pub const KEY_SHUTDOWN_CMD: &str = "shutdown_cmd";
pub const KEY_TCP_CHECK_PORT: &str = "tcp_check_port";
pub const KEY_CONNECT_TIMEOUT_SEC: &str = "connect_timeout_sec";

/// Keys the `config` command may edit.
pub const CONFIG_KEYS: [&str; 7] = [
    KEY_PC_IP,
    KEY_BROADCAST_IP,
    KEY_PC_MAC,
    KEY_UDP_PORT,
    KEY_SHUTDOWN_CMD,
    KEY_TCP_CHECK_PORT,
    KEY_CONNECT_TIMEOUT_SEC,
];

pub const DEFAULT_PC_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 31, 94);
pub const DEFAULT_BROADCAST_IP: Ipv4Addr = Ipv4Addr::new(192, 168, 31, 255);
pub const DEFAULT_PC_MAC: &str = "70:85:C2:DA:3D:A3";
pub const DEFAULT_UDP_PORT: u16 = 9999;
pub const DEFAULT_SHUTDOWN_CMD: &str = "SHUTDOWN";
pub const DEFAULT_TCP_CHECK_PORT: u16 = 445;
pub const DEFAULT_CONNECT_TIMEOUT_SEC: u64 = 3;

/// Snapshot of the target PC settings, read at the start of each operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceConfig {
    pub pc_address: Ipv4Addr,
    pub broadcast_address: Ipv4Addr,
    /// Kept as text; parsed when a packet is built so a bad value fails the
    /// wake attempt instead of silently targeting another machine.
    pub mac_address: String,
    pub udp_port: u16,
    pub shutdown_command: String,
    pub tcp_probe_port: u16,
    #[serde(serialize_with = "serialize_secs")]
    pub probe_timeout: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_secs())
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            pc_address: DEFAULT_PC_IP,
            broadcast_address: DEFAULT_BROADCAST_IP,
            mac_address: DEFAULT_PC_MAC.to_string(),
            udp_port: DEFAULT_UDP_PORT,
            shutdown_command: DEFAULT_SHUTDOWN_CMD.to_string(),
            tcp_probe_port: DEFAULT_TCP_CHECK_PORT,
            probe_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SEC),
        }
    }
}

impl DeviceConfig {
    /// Read every key, substituting the default for missing, unparsable or
    /// out-of-range values.
    pub fn load(store: &dyn KeyValueStore) -> Result<Self, StoreError> {
        let d = DeviceConfig::default();
        Ok(Self {
            pc_address: parse_or(store, KEY_PC_IP, d.pc_address, accept_any)?,
            broadcast_address: parse_or(store, KEY_BROADCAST_IP, d.broadcast_address, accept_any)?,
            mac_address: text_or(store, KEY_PC_MAC, d.mac_address)?,
            udp_port: parse_or(store, KEY_UDP_PORT, d.udp_port, nonzero_port)?,
            shutdown_command: text_or(store, KEY_SHUTDOWN_CMD, d.shutdown_command)?,
            tcp_probe_port: parse_or(store, KEY_TCP_CHECK_PORT, d.tcp_probe_port, nonzero_port)?,
            probe_timeout: Duration::from_secs(parse_or(
                store,
                KEY_CONNECT_TIMEOUT_SEC,
                DEFAULT_CONNECT_TIMEOUT_SEC,
                nonzero_secs,
            )?),
        })
    }

    pub fn command_target(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.pc_address, self.udp_port)
    }

    pub fn probe_target(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.pc_address, self.tcp_probe_port)
    }
}

fn text_or(store: &dyn KeyValueStore, key: &str, default: String) -> Result<String, StoreError> {
    Ok(store.get(key)?.unwrap_or(default))
}

fn accept_any<T>(_: &T) -> bool {
    true
}

fn nonzero_port(p: &u16) -> bool {
    *p > 0
}

fn nonzero_secs(s: &u64) -> bool {
    *s > 0
}

fn parse_or<T>(
    store: &dyn KeyValueStore,
    key: &str,
    default: T,
    accept: fn(&T) -> bool,
) -> Result<T, StoreError>
where
    T: FromStr + fmt::Display,
{
    let Some(raw) = store.get(key)? else {
        return Ok(default);
    };
    match raw.trim().parse() {
        Ok(v) if accept(&v) => Ok(v),
        _ => {
            warn!(key, value = %raw, default = %default, "invalid config value, using default");
            Ok(default)
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacParseError {
    #[error("expected 6 octets, got {0}")]
    OctetCount(usize),

    #[error("invalid octet '{0}'")]
    InvalidOctet(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacAddress(pub [u8; 6]);

impl FromStr for MacAddress {
    type Err = MacParseError;

    /// Accepts `:` or `-` delimited hex octets, e.g. `70:85:C2:DA:3D:A3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != 6 {
            return Err(MacParseError::OctetCount(parts.len()));
        }

        let mut out = [0u8; 6];
        for (slot, part) in out.iter_mut().zip(parts) {
            if part.is_empty() || part.len() > 2 {
                return Err(MacParseError::InvalidOctet(part.to_string()));
            }
            *slot = u8::from_str_radix(part, 16)
                .map_err(|_| MacParseError::InvalidOctet(part.to_string()))?;
        }
        Ok(MacAddress(out))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValueError {
    #[error("unknown setting '{0}'")]
    UnknownKey(String),

    #[error("{key}: '{value}' is not {expected}")]
    Invalid {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Check a value for `key` and return the normalized form to store.
pub fn validate_value(key: &str, value: &str) -> Result<String, ConfigValueError> {
    let Some(key) = CONFIG_KEYS.iter().copied().find(|k| *k == key) else {
        return Err(ConfigValueError::UnknownKey(key.to_string()));
    };
    let raw = value.trim();
    let invalid = |expected: &'static str| ConfigValueError::Invalid {
        key,
        value: value.to_string(),
        expected,
    };

    match key {
        KEY_PC_IP | KEY_BROADCAST_IP => raw
            .parse::<Ipv4Addr>()
            .map(|a| a.to_string())
            .map_err(|_| invalid("an IPv4 address")),
        KEY_PC_MAC => raw
            .parse::<MacAddress>()
            .map(|m| m.to_string())
            .map_err(|_| invalid("a MAC address (AA:BB:CC:DD:EE:FF)")),
        KEY_UDP_PORT | KEY_TCP_CHECK_PORT => match raw.parse::<u16>() {
            Ok(p) if nonzero_port(&p) => Ok(p.to_string()),
            _ => Err(invalid("a port number (1-65535)")),
        },
        KEY_CONNECT_TIMEOUT_SEC => match raw.parse::<u64>() {
            Ok(s) if nonzero_secs(&s) => Ok(s.to_string()),
            _ => Err(invalid("a positive number of seconds")),
        },
        _ if value.is_empty() => Err(invalid("a non-empty string")),
        _ => Ok(value.to_string()),
    }
}
