use std::fmt;

use serde::Serialize;

/// What the controller currently believes about the PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerStatus {
    Off,
    On,
    PendingWol,
    PendingShutdown,
}

impl PowerStatus {
    pub const ALL: [PowerStatus; 4] = [
        PowerStatus::Off,
        PowerStatus::On,
        PowerStatus::PendingWol,
        PowerStatus::PendingShutdown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PowerStatus::Off => "off",
            PowerStatus::On => "on",
            PowerStatus::PendingWol => "pending_wol",
            PowerStatus::PendingShutdown => "pending_shutdown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "off" => Some(PowerStatus::Off),
            "on" => Some(PowerStatus::On),
            "pending_wol" => Some(PowerStatus::PendingWol),
            "pending_shutdown" => Some(PowerStatus::PendingShutdown),
            _ => None,
        }
    }

    /// Transitional states awaiting confirmation by a probe.
    pub fn is_pending(self) -> bool {
        matches!(self, PowerStatus::PendingWol | PowerStatus::PendingShutdown)
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The persisted `pc_status` value as read back from the store.
///
/// A value written by something other than this crate is kept verbatim so
/// it can be left untouched instead of being coerced into a real status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoredStatus {
    Known(PowerStatus),
    Unrecognized(String),
}

impl StoredStatus {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            None => StoredStatus::Known(PowerStatus::Off),
            Some(s) => match PowerStatus::parse(s) {
                Some(st) => StoredStatus::Known(st),
                None => StoredStatus::Unrecognized(s.to_string()),
            },
        }
    }

    pub fn known(&self) -> Option<PowerStatus> {
        match self {
            StoredStatus::Known(s) => Some(*s),
            StoredStatus::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            StoredStatus::Known(s) => s.as_str(),
            StoredStatus::Unrecognized(raw) => raw,
        }
    }
}

impl fmt::Display for StoredStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<PowerStatus> for StoredStatus {
    fn from(s: PowerStatus) -> Self {
        StoredStatus::Known(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_round_trips() {
        for s in PowerStatus::ALL {
            assert_eq!(PowerStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(PowerStatus::parse("booting"), None);
    }

    #[test]
    fn test_missing_status_reads_as_off() {
        assert_eq!(
            StoredStatus::from_raw(None),
            StoredStatus::Known(PowerStatus::Off)
        );
        assert_eq!(
            StoredStatus::from_raw(Some("weird")),
            StoredStatus::Unrecognized("weird".to_string())
        );
    }
}
