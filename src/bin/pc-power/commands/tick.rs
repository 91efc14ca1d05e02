use std::time::SystemTime;

use pc_power::scheduler::Due;

use crate::commands::check;
use crate::context::Host;
use crate::exit_codes;
use crate::output::{Event, Reporter};

pub fn run(host: &Host, out: &mut dyn Reporter) -> i32 {
    match tick_once(host, out, true) {
        Ok(_) => exit_codes::EXIT_OK,
        Err(code) => code,
    }
}

/// Consume whatever is due and run the check for it.
pub(crate) fn tick_once(host: &Host, out: &mut dyn Reporter, report_idle: bool) -> Result<Due, i32> {
    let due = match host.scheduler.take_due(SystemTime::now()) {
        Ok(d) => d,
        Err(e) => {
            out.emit(Event::Error {
                code: exit_codes::EXIT_STORE,
                message: format!("schedule read failed: {e}"),
            });
            return Err(exit_codes::EXIT_STORE);
        }
    };

    match due {
        Due::FollowUp | Due::Refresh => {
            out.emit(Event::Tick(due));
            check::check_now(host, out)?;
        }
        Due::Idle { .. } => {
            if report_idle {
                out.emit(Event::Tick(due));
            }
        }
    }
    Ok(due)
}
