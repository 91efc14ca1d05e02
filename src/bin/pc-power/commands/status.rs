use pc_power::state;
use pc_power::store::StoreError;

use crate::context::Host;
use crate::exit_codes;
use crate::output::{Event, Reporter, StatusReport};

pub fn run(host: &Host, out: &mut dyn Reporter) -> i32 {
    match load_report(host) {
        Ok(r) => {
            out.emit(Event::Status(r));
            exit_codes::EXIT_OK
        }
        Err(e) => {
            out.emit(Event::Error {
                code: exit_codes::EXIT_STORE,
                message: e.to_string(),
            });
            exit_codes::EXIT_STORE
        }
    }
}

fn load_report(host: &Host) -> Result<StatusReport, StoreError> {
    Ok(StatusReport {
        state_path: host.state_path(),
        status: state::read_status(&*host.store)?,
        fail_count: state::read_fail_count(&*host.store)?,
        schedule: host.scheduler.snapshot()?,
    })
}
