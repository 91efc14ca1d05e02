use std::time::SystemTime;

use pc_power::machine::{ActionOutcome, NetworkAction};
use pc_power::scheduler::Due;
use pc_power::{CheckOutcome, OperationEvent, TapOutcome};

use crate::output::{
    format_duration, until, ConfigReport, DoctorReport, Event, OutputOptions, Reporter,
    StatusReport,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Normal,
    Verbose,
}

pub struct HumanOutput {
    opts: OutputOptions,
}

impl HumanOutput {
    pub fn new(opts: OutputOptions) -> Self {
        Self { opts }
    }

    fn mode(&self) -> Mode {
        if self.opts.verbose {
            Mode::Verbose
        } else {
            Mode::Normal
        }
    }

    fn progress(&mut self, msg: &str) {
        eprintln!("{msg}");
    }

    fn result(&mut self, msg: &str) {
        println!("{msg}");
    }

    /// Progress line for a controller event, or `None` if the event is
    /// quiet at this verbosity.
    pub(crate) fn operation_line(verbose: bool, ev: &OperationEvent) -> Option<String> {
        let line = match ev {
            OperationEvent::WolFailed { error } => format!("wake-on-lan failed: {error}"),
            OperationEvent::SubnetMismatch { local, pc } => format!(
                "warning: this host ({local}) is not on the PC's subnet ({pc}); the wake packet will not reach it"
            ),
            OperationEvent::ShutdownSendFailed { target, error } => {
                format!("shutdown command to {target} failed: {error}")
            }
            OperationEvent::ScheduleFailed { error } => {
                format!("warning: could not schedule follow-up check: {error}")
            }
            OperationEvent::UnrecognizedStatus { raw } => {
                format!("warning: stored status {raw:?} is not recognized")
            }
            _ if !verbose => return None,

            OperationEvent::StatusLoaded { status } => format!("status: {status}"),
            OperationEvent::Decided { action } => format!("action: {}", action_label(*action)),
            OperationEvent::WolAttempt {
                attempt,
                attempts,
                broadcast,
                mac,
            } => format!("wake-on-lan {mac} via {broadcast} ({attempt}/{attempts})"),
            OperationEvent::WolRetry {
                attempt,
                attempts,
                error,
            } => format!("retry wake-on-lan ({attempt}/{attempts}): {error}"),
            OperationEvent::WolSent { attempt } => format!("wake-on-lan sent (attempt {attempt})"),
            OperationEvent::ShutdownSent { target } => format!("shutdown command sent to {target}"),
            OperationEvent::Probe { target, reachable } => format!(
                "probe {target}: {}",
                if *reachable { "reachable" } else { "unreachable" }
            ),
            OperationEvent::FailCount { count, needed } => {
                format!("shutdown fail count {count}/{needed}")
            }
            OperationEvent::StatusChanged { from, to } => format!("status {from} -> {to}"),
            OperationEvent::StatusUnchanged { status } => format!("status unchanged ({status})"),
            OperationEvent::Notified => "notified".to_string(),
            OperationEvent::Scheduled { after } => {
                format!("next check in {}", format_duration(*after))
            }
        };
        Some(line)
    }

    fn on_operation_event(&mut self, ev: OperationEvent) {
        if let Some(line) = Self::operation_line(self.mode() == Mode::Verbose, &ev) {
            self.progress(&line);
        }
    }
}

impl Reporter for HumanOutput {
    fn emit(&mut self, event: Event) {
        match event {
            Event::Operation(ev) => self.on_operation_event(ev),
            Event::Tap(outcome) => emit_tap(&outcome, self),
            Event::Check(outcome) => emit_check(&outcome, self),
            Event::Tick(due) => emit_tick(due, self),
            Event::Status(report) => emit_status(&report, self),
            Event::Config(report) => emit_config(&report, self),
            Event::ConfigUpdated { key, value } => match value {
                Some(v) => self.result(&format!("{key} = {v}")),
                None => self.result(&format!("{key} reset to default")),
            },
            Event::Doctor(report) => emit_doctor(&report, self),
            Event::Error { code: _, message } => eprintln!("error: {message}"),
        }
    }

    fn finish(&mut self) {}
}

fn action_label(action: NetworkAction) -> &'static str {
    match action {
        NetworkAction::None => "none",
        NetworkAction::SendWol => "wake-on-lan",
        NetworkAction::SendShutdown => "shutdown",
    }
}

fn emit_tap(outcome: &TapOutcome, out: &mut HumanOutput) {
    let what = match (outcome.action, outcome.action_outcome) {
        (NetworkAction::None, _) => "no action".to_string(),
        (action, Some(ActionOutcome::Delivered)) | (action, None) => {
            format!("{} sent", action_label(action))
        }
        (action, Some(ActionOutcome::SendFailed)) => format!("{} failed", action_label(action)),
        (action, Some(ActionOutcome::OffSubnet)) => {
            format!("{} sent off-subnet", action_label(action))
        }
    };
    out.result(&format!(
        "{}: {} -> {}",
        what, outcome.previous, outcome.status
    ));
    if let Some(after) = outcome.scheduled {
        out.result(&format!("next check in {}", format_duration(after)));
    }
}

fn emit_check(outcome: &CheckOutcome, out: &mut HumanOutput) {
    let reach = if outcome.reachable {
        "reachable"
    } else {
        "unreachable"
    };
    if outcome.changed {
        out.result(&format!(
            "{reach}: {} -> {}",
            outcome.previous, outcome.status
        ));
    } else {
        out.result(&format!("{reach}: {}", outcome.status));
    }
    if let Some(after) = outcome.scheduled {
        out.result(&format!("next check in {}", format_duration(after)));
    }
}

fn emit_tick(due: Due, out: &mut HumanOutput) {
    match due {
        Due::FollowUp => {
            if out.mode() == Mode::Verbose {
                out.progress("follow-up check due");
            }
        }
        Due::Refresh => {
            if out.mode() == Mode::Verbose {
                out.progress("periodic refresh due");
            }
        }
        Due::Idle { next: Some(at) } => out.result(&format!(
            "nothing due (next in {})",
            format_duration(until(at, SystemTime::now()))
        )),
        Due::Idle { next: None } => out.result("nothing due (no schedule)"),
    }
}

fn emit_status(report: &StatusReport, out: &mut HumanOutput) {
    let now = SystemTime::now();
    match report.status.known() {
        Some(s) => out.result(&format!("status: {s}")),
        None => out.result(&format!("status: {} (unrecognized)", report.status)),
    }
    out.result(&format!("shutdown fail count: {}", report.fail_count));
    match report.schedule.next_check_at {
        Some(at) => out.result(&format!(
            "next check: in {}",
            format_duration(until(at, now))
        )),
        None => out.result("next check: none"),
    }
    match report.schedule.refresh_every {
        Some(every) => out.result(&format!("refresh every: {}", format_duration(every))),
        None => out.result("refresh every: off"),
    }
    out.result(&format!("state: {}", report.state_path));
}

fn emit_config(report: &ConfigReport, out: &mut HumanOutput) {
    let c = &report.config;
    let rows = [
        (pc_power::config::KEY_PC_IP, c.pc_address.to_string()),
        (
            pc_power::config::KEY_BROADCAST_IP,
            c.broadcast_address.to_string(),
        ),
        (pc_power::config::KEY_PC_MAC, c.mac_address.clone()),
        (pc_power::config::KEY_UDP_PORT, c.udp_port.to_string()),
        (
            pc_power::config::KEY_SHUTDOWN_CMD,
            c.shutdown_command.clone(),
        ),
        (
            pc_power::config::KEY_TCP_CHECK_PORT,
            c.tcp_probe_port.to_string(),
        ),
        (
            pc_power::config::KEY_CONNECT_TIMEOUT_SEC,
            c.probe_timeout.as_secs().to_string(),
        ),
    ];
    for (key, value) in rows {
        let origin = if report.stored.contains_key(key) {
            ""
        } else {
            " (default)"
        };
        out.result(&format!("{key} = {value}{origin}"));
    }
    out.result(&format!("state: {}", report.state_path));
}

fn emit_doctor(report: &DoctorReport, out: &mut HumanOutput) {
    out.result("pc-power doctor");
    out.result(&format!("state: {}", report.state_path));
    out.result(&format!("status: {}", report.status));
    out.result(&format!(
        "pc: {} (probe port {}, timeout {}s)",
        report.config.pc_address,
        report.config.tcp_probe_port,
        report.config.probe_timeout.as_secs()
    ));
    match &report.mac_error {
        None => out.result(&format!("mac: {} ok", report.config.mac_address)),
        Some(e) => out.result(&format!("mac: {} invalid: {e}", report.config.mac_address)),
    }
    out.result(&format!("broadcast: {}", report.config.broadcast_address));
    match report.local_address {
        Some(a) => out.result(&format!(
            "local address: {a} ({})",
            if report.same_subnet {
                "same subnet"
            } else {
                "different subnet"
            }
        )),
        None => out.result("local address: unknown"),
    }
    match report.reachable {
        Some(true) => out.result("probe: reachable"),
        Some(false) => out.result("probe: unreachable"),
        None => out.result("probe: skipped"),
    }
}
