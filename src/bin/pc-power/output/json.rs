use std::collections::BTreeMap;
use std::time::Instant;

use pc_power::machine::ActionOutcome;
use pc_power::scheduler::{unix_millis, Due, ScheduleSnapshot};
use pc_power::{CheckOutcome, OperationEvent, TapOutcome};

use crate::output::{ConfigReport, DoctorReport, Event, OutputOptions, Reporter, StatusReport};

#[derive(serde::Serialize)]
pub struct JsonEvent {
    schema: u32,
    event: &'static str,
    #[serde(flatten)]
    fields: BTreeMap<&'static str, serde_json::Value>,
}

impl JsonEvent {
    pub fn status(event: &'static str) -> Self {
        Self {
            schema: 1,
            event,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_u64(mut self, k: &'static str, v: u64) -> Self {
        self.fields.insert(k, serde_json::Value::from(v));
        self
    }

    pub fn with_str(mut self, k: &'static str, v: &str) -> Self {
        self.fields.insert(k, serde_json::Value::from(v));
        self
    }

    pub fn with_bool(mut self, k: &'static str, v: bool) -> Self {
        self.fields.insert(k, serde_json::Value::from(v));
        self
    }

    pub fn with_value(mut self, k: &'static str, v: serde_json::Value) -> Self {
        self.fields.insert(k, v);
        self
    }
}

pub struct JsonOutput {
    opts: OutputOptions,
    start: Instant,
}

impl JsonOutput {
    pub fn new(opts: OutputOptions) -> Self {
        Self {
            opts,
            start: Instant::now(),
        }
    }

    pub(crate) fn render_event_json(&mut self, ev: JsonEvent) -> String {
        let mut ev = ev;
        if self.opts.json_timestamps {
            ev.fields.insert(
                "t_ms",
                serde_json::Value::from(self.start.elapsed().as_millis() as u64),
            );
        }
        serde_json::to_string(&ev).unwrap_or_else(|_| "{}".to_string())
    }

    fn json_event(&mut self, ev: JsonEvent) {
        println!("{}", self.render_event_json(ev));
    }

    fn error_event(&mut self, code: i32, msg: &str) {
        self.json_event(
            JsonEvent::status("error")
                .with_u64("code", code as u64)
                .with_str("message", msg),
        );

        if self.opts.verbose {
            eprintln!("error: {msg}");
        }
    }
}

impl Reporter for JsonOutput {
    fn emit(&mut self, event: Event) {
        match event {
            Event::Operation(ev) => self.json_event(operation_event_to_json(ev)),
            Event::Tap(outcome) => self.json_event(tap_to_json(&outcome)),
            Event::Check(outcome) => self.json_event(check_to_json(&outcome)),
            Event::Tick(due) => self.json_event(tick_to_json(due)),
            Event::Status(report) => self.json_event(status_to_json(&report)),
            Event::Config(report) => self.json_event(config_to_json(&report)),
            Event::ConfigUpdated { key, value } => {
                let mut ev = JsonEvent::status("config_updated").with_str("key", &key);
                ev = match &value {
                    Some(v) => ev.with_str("value", v),
                    None => ev.with_value("value", serde_json::Value::Null),
                };
                self.json_event(ev)
            }
            Event::Doctor(report) => self.json_event(doctor_to_json(&report)),
            Event::Error { code, message } => self.error_event(code, &message),
        }
    }

    fn finish(&mut self) {}
}

fn opt_ms(v: Option<std::time::SystemTime>) -> serde_json::Value {
    v.map(|t| serde_json::Value::from(unix_millis(t)))
        .unwrap_or(serde_json::Value::Null)
}

fn opt_after_ms(v: Option<std::time::Duration>) -> serde_json::Value {
    v.map(|d| serde_json::Value::from(d.as_millis() as u64))
        .unwrap_or(serde_json::Value::Null)
}

fn action_outcome_str(o: ActionOutcome) -> &'static str {
    match o {
        ActionOutcome::Delivered => "delivered",
        ActionOutcome::SendFailed => "send_failed",
        ActionOutcome::OffSubnet => "off_subnet",
    }
}

fn to_value<T: serde::Serialize>(v: &T) -> serde_json::Value {
    serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
}

pub fn tap_to_json(outcome: &TapOutcome) -> JsonEvent {
    let mut ev = JsonEvent::status("tap")
        .with_str("previous", outcome.previous.as_str())
        .with_str("status", outcome.status.as_str())
        .with_value("action", to_value(&outcome.action))
        .with_value("scheduled_after_ms", opt_after_ms(outcome.scheduled));
    if let Some(o) = outcome.action_outcome {
        ev = ev.with_str("action_outcome", action_outcome_str(o));
    }
    ev
}

pub fn check_to_json(outcome: &CheckOutcome) -> JsonEvent {
    JsonEvent::status("check")
        .with_str("previous", outcome.previous.as_str())
        .with_str("status", outcome.status.as_str())
        .with_bool("reachable", outcome.reachable)
        .with_bool("changed", outcome.changed)
        .with_value("scheduled_after_ms", opt_after_ms(outcome.scheduled))
}

pub fn tick_to_json(due: Due) -> JsonEvent {
    match due {
        Due::FollowUp => JsonEvent::status("tick").with_str("due", "follow_up"),
        Due::Refresh => JsonEvent::status("tick").with_str("due", "refresh"),
        Due::Idle { next } => JsonEvent::status("tick")
            .with_str("due", "idle")
            .with_value("next_at_ms", opt_ms(next)),
    }
}

fn schedule_to_value(s: &ScheduleSnapshot) -> serde_json::Value {
    let mut m = serde_json::Map::new();
    m.insert("next_check_at_ms".to_string(), opt_ms(s.next_check_at));
    m.insert(
        "refresh_every_min".to_string(),
        s.refresh_every
            .map(|d| serde_json::Value::from(d.as_secs() / 60))
            .unwrap_or(serde_json::Value::Null),
    );
    m.insert("last_refresh_at_ms".to_string(), opt_ms(s.last_refresh_at));
    serde_json::Value::Object(m)
}

pub fn status_to_json(report: &StatusReport) -> JsonEvent {
    JsonEvent::status("status")
        .with_str("state_path", &report.state_path)
        .with_str("status", report.status.as_str())
        .with_bool("recognized", report.status.known().is_some())
        .with_u64("shutdown_fail_count", report.fail_count as u64)
        .with_value("schedule", schedule_to_value(&report.schedule))
}

pub fn config_to_json(report: &ConfigReport) -> JsonEvent {
    JsonEvent::status("config")
        .with_str("state_path", &report.state_path)
        .with_value("effective", to_value(&report.config))
        .with_value("stored", to_value(&report.stored))
}

pub fn doctor_to_json(report: &DoctorReport) -> JsonEvent {
    let mut ev = JsonEvent::status("doctor")
        .with_str("state_path", &report.state_path)
        .with_value("config", to_value(&report.config))
        .with_str("status", report.status.as_str())
        .with_bool("mac_valid", report.mac_error.is_none())
        .with_bool("same_subnet", report.same_subnet)
        .with_value(
            "local_address",
            report
                .local_address
                .map(|a| serde_json::Value::from(a.to_string()))
                .unwrap_or(serde_json::Value::Null),
        )
        .with_value(
            "reachable",
            report
                .reachable
                .map(serde_json::Value::from)
                .unwrap_or(serde_json::Value::Null),
        );
    if let Some(e) = &report.mac_error {
        ev = ev.with_str("mac_error", e);
    }
    ev
}

pub fn operation_event_to_json(ev: OperationEvent) -> JsonEvent {
    match ev {
        OperationEvent::StatusLoaded { status } => {
            JsonEvent::status("status_loaded").with_str("status", status.as_str())
        }
        OperationEvent::UnrecognizedStatus { raw } => {
            JsonEvent::status("unrecognized_status").with_str("raw", &raw)
        }
        OperationEvent::Decided { action } => {
            JsonEvent::status("decided").with_value("action", to_value(&action))
        }
        OperationEvent::WolAttempt {
            attempt,
            attempts,
            broadcast,
            mac,
        } => JsonEvent::status("wol_attempt")
            .with_u64("attempt", attempt as u64)
            .with_u64("attempts", attempts as u64)
            .with_str("broadcast", &broadcast.to_string())
            .with_str("mac", &mac),
        OperationEvent::WolRetry {
            attempt,
            attempts,
            error,
        } => JsonEvent::status("wol_retry")
            .with_u64("attempt", attempt as u64)
            .with_u64("attempts", attempts as u64)
            .with_str("error", &error),
        OperationEvent::WolSent { attempt } => {
            JsonEvent::status("wol_sent").with_u64("attempt", attempt as u64)
        }
        OperationEvent::WolFailed { error } => {
            JsonEvent::status("wol_failed").with_str("error", &error)
        }
        OperationEvent::SubnetMismatch { local, pc } => JsonEvent::status("subnet_mismatch")
            .with_str("local", &local.to_string())
            .with_str("pc", &pc.to_string()),
        OperationEvent::ShutdownSent { target } => {
            JsonEvent::status("shutdown_sent").with_str("target", &target.to_string())
        }
        OperationEvent::ShutdownSendFailed { target, error } => {
            JsonEvent::status("shutdown_send_failed")
                .with_str("target", &target.to_string())
                .with_str("error", &error)
        }
        OperationEvent::Probe { target, reachable } => JsonEvent::status("probe")
            .with_str("target", &target.to_string())
            .with_bool("reachable", reachable),
        OperationEvent::FailCount { count, needed } => JsonEvent::status("fail_count")
            .with_u64("count", count as u64)
            .with_u64("needed", needed as u64),
        OperationEvent::StatusChanged { from, to } => JsonEvent::status("status_changed")
            .with_str("from", from.as_str())
            .with_str("to", to.as_str()),
        OperationEvent::StatusUnchanged { status } => {
            JsonEvent::status("status_unchanged").with_str("status", status.as_str())
        }
        OperationEvent::Notified => JsonEvent::status("notified"),
        OperationEvent::Scheduled { after } => {
            JsonEvent::status("scheduled").with_u64("after_ms", after.as_millis() as u64)
        }
        OperationEvent::ScheduleFailed { error } => {
            JsonEvent::status("schedule_failed").with_str("error", &error)
        }
    }
}
