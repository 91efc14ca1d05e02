use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

pub const MAX_REFRESH_MIN: u64 = 7 * 24 * 60;

#[derive(Parser)]
#[command(name = "pc-power")]
#[command(about = "Wake-on-LAN / UDP shutdown toggle for a LAN PC")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Toggle the PC: wake it, ask it to shut down, or cancel a pending transition.
    Tap(TapArgs),

    /// Probe the PC now and update the stored status.
    Check(OutputArgs),

    /// Run a scheduled check if one is due (for cron or a systemd timer).
    Tick(OutputArgs),

    /// Stay in the foreground and run scheduled checks as they come due.
    Watch(WatchArgs),

    /// Show the stored status and schedule.
    Status(JsonArgs),

    /// Show or edit the target PC settings.
    Config(ConfigArgs),

    /// Diagnose configuration, routing and reachability.
    Doctor(DoctorArgs),
}

#[derive(Args, Clone)]
pub struct GlobalArgs {
    /// State file holding settings and controller state.
    ///
    /// Default: <config dir>/pc-power/state.json
    #[arg(long, global = true, env = "PC_POWER_STATE")]
    pub state: Option<PathBuf>,

    /// Command to run whenever the PC status changes (e.g. a panel refresh script).
    #[arg(long, global = true)]
    pub notify_cmd: Option<String>,
}

#[derive(Args, Clone, Copy)]
pub struct OutputArgs {
    /// Emit JSON line events to stdout.
    #[arg(long)]
    pub json: bool,

    /// More logs to stderr.
    #[arg(long, short)]
    pub verbose: bool,
}

#[derive(Args, Clone, Copy)]
pub struct JsonArgs {
    /// Emit JSON output.
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct TapArgs {
    /// Wake-on-LAN send attempts.
    #[arg(long, default_value_t = 3)]
    pub wol_attempts: u32,

    /// Delay between Wake-on-LAN attempts.
    #[arg(long, default_value_t = 400)]
    pub wol_retry_delay_ms: u64,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Background refresh period in minutes (0 = follow-ups only, at most a week).
    #[arg(long, default_value_t = 15, value_parser = clap::value_parser!(u64).range(0..=MAX_REFRESH_MIN))]
    pub refresh_min: u64,

    /// How often to look at the schedule.
    #[arg(long, default_value_t = 1000)]
    pub poll_ms: u64,

    /// Include monotonic timestamps in JSON events (milliseconds since start).
    #[arg(long, requires = "json")]
    pub json_timestamps: bool,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective settings (stored values plus defaults).
    Show(JsonArgs),

    /// Store a setting (pc_ip, broadcast_ip, pc_mac, udp_port, shutdown_cmd,
    /// tcp_check_port, connect_timeout_sec).
    Set { key: String, value: String },

    /// Remove a stored setting so its default applies.
    Unset { key: String },
}

#[derive(Args)]
pub struct DoctorArgs {
    /// Skip the live TCP probe.
    #[arg(long)]
    pub no_probe: bool,

    /// Emit JSON output.
    #[arg(long)]
    pub json: bool,
}
