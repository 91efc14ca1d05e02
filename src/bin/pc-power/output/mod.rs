use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::time::{Duration, SystemTime};

use pc_power::config::DeviceConfig;
use pc_power::scheduler::{Due, ScheduleSnapshot};
use pc_power::{CheckOutcome, OperationEvent, StoredStatus, TapOutcome};

use crate::cli;

pub mod human;
pub mod json;


#[derive(Debug, Clone, Copy)]
pub struct OutputOptions {
    pub verbose: bool,
    pub json_timestamps: bool,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub state_path: String,
    pub status: StoredStatus,
    pub fail_count: u32,
    pub schedule: ScheduleSnapshot,
}

#[derive(Debug, Clone)]
pub struct ConfigReport {
    pub state_path: String,
    pub config: DeviceConfig,
    /// Raw values present in the store; everything else is a default.
    pub stored: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct DoctorReport {
    pub state_path: String,
    pub config: DeviceConfig,
    pub status: StoredStatus,
    pub mac_error: Option<String>,
    pub local_address: Option<Ipv4Addr>,
    pub same_subnet: bool,
    /// `None` when the probe was skipped.
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone)]
pub enum Event {
    Operation(OperationEvent),
    Tap(TapOutcome),
    Check(CheckOutcome),
    Tick(Due),
    Status(StatusReport),
    Config(ConfigReport),
    ConfigUpdated { key: String, value: Option<String> },
    Doctor(DoctorReport),
    Error { code: i32, message: String },
}

pub trait Reporter {
    fn emit(&mut self, event: Event);
    fn finish(&mut self);
}

pub fn make(json: bool, verbose: bool) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose,
        json_timestamps: false,
    };
    if json {
        Box::new(json::JsonOutput::new(opts))
    } else {
        Box::new(human::HumanOutput::new(opts))
    }
}

pub fn make_for_watch(args: &cli::WatchArgs) -> Box<dyn Reporter> {
    let opts = OutputOptions {
        verbose: args.out.verbose,
        json_timestamps: args.json_timestamps,
    };
    if args.out.json {
        Box::new(json::JsonOutput::new(opts))
    } else {
        Box::new(human::HumanOutput::new(opts))
    }
}

/// Time from `now` until `at`, zero if already past.
pub fn until(at: SystemTime, now: SystemTime) -> Duration {
    at.duration_since(now).unwrap_or(Duration::ZERO)
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs >= 60 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{secs}s")
    } else {
        format!("{}ms", d.as_millis())
    }
}
