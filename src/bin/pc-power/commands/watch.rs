use std::thread;
use std::time::{Duration, SystemTime};

use pc_power::scheduler::Due;
use tracing::{debug, info, warn};

use crate::cli;
use crate::commands::tick;
use crate::context::Host;
use crate::exit_codes;
use crate::output::{until, Event, Reporter};

pub fn run(args: cli::WatchArgs, host: &Host, out: &mut dyn Reporter) -> i32 {
    let every = (args.refresh_min > 0).then(|| Duration::from_secs(args.refresh_min * 60));
    let installed = host.scheduler.set_refresh(every).map_err(|e| e.to_string());
    if let Err(message) = installed {
        out.emit(Event::Error {
            code: exit_codes::EXIT_STORE,
            message,
        });
        return exit_codes::EXIT_STORE;
    }

    let poll = Duration::from_millis(args.poll_ms.max(50));
    info!(
        refresh_min = args.refresh_min,
        poll_ms = poll.as_millis() as u64,
        state = %host.state_path(),
        "watching schedule"
    );

    loop {
        let wait = match tick::tick_once(host, out, false) {
            // Something ran; it may have scheduled a follow-up already due.
            Ok(Due::FollowUp) | Ok(Due::Refresh) => continue,
            Ok(Due::Idle { next: Some(at) }) => until(at, SystemTime::now()).min(poll),
            Ok(Due::Idle { next: None }) => poll,
            Err(code) => {
                warn!(code, "scheduled check failed");
                poll
            }
        };
        debug!(wait_ms = wait.as_millis() as u64, "idle");
        thread::sleep(wait);
    }
}
