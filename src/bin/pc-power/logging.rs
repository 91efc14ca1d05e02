const DEFAULT_FILTER: &str = "pc_power=debug,info";

/// Tracing stays off unless asked for: stdout carries JSON lines and the
/// subscriber writes to stderr.
pub fn init_tracing() {
    let rust_log = std::env::var("RUST_LOG").ok();
    let own = std::env::var("PC_POWER_LOG").ok();
    let Some(filter) = log_filter(rust_log.as_deref(), own.as_deref()) else {
        return;
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// `RUST_LOG` wins. `PC_POWER_LOG` is either a filter (`debug`,
/// `pc_power=trace`) or a plain switch (`1`, `true`) for the default filter.
fn log_filter(rust_log: Option<&str>, own: Option<&str>) -> Option<String> {
    if let Some(f) = non_empty(rust_log) {
        return Some(f.to_string());
    }
    match non_empty(own)? {
        "1" | "true" | "on" | "yes" => Some(DEFAULT_FILTER.to_string()),
        "0" | "false" | "off" | "no" => None,
        f => Some(f.to_string()),
    }
}

fn non_empty(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|s| !s.is_empty())
}
