use pc_power::StatusChecker;

use crate::context::Host;
use crate::exit_codes;
use crate::output::{Event, Reporter};

pub fn run(host: &Host, out: &mut dyn Reporter) -> i32 {
    match check_now(host, out) {
        Ok(()) => exit_codes::EXIT_OK,
        Err(code) => code,
    }
}

/// Run one probe cycle and report it. Shared by `tick` and `watch`.
pub(crate) fn check_now(host: &Host, out: &mut dyn Reporter) -> Result<(), i32> {
    let checker = StatusChecker::new(host.collaborators());
    match checker.run(|ev| out.emit(Event::Operation(ev))) {
        Ok(outcome) => {
            out.emit(Event::Check(outcome));
            Ok(())
        }
        Err(e) => {
            let code = exit_codes::for_controller(&e);
            out.emit(Event::Error {
                code,
                message: e.to_string(),
            });
            Err(code)
        }
    }
}
