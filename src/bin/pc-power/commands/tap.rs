use pc_power::{ActionExecutor, ActionOptions};

use crate::cli;
use crate::context::{self, Host};
use crate::exit_codes;
use crate::output::{Event, Reporter};

pub fn run(args: cli::TapArgs, host: &Host, out: &mut dyn Reporter) -> i32 {
    let opts = ActionOptions {
        wol_retry: context::wol_retry(&args),
    };

    let executor = ActionExecutor::new(host.collaborators(), opts);
    match executor.run(|ev| out.emit(Event::Operation(ev))) {
        Ok(outcome) => {
            out.emit(Event::Tap(outcome));
            exit_codes::EXIT_OK
        }
        Err(e) => {
            let code = exit_codes::for_controller(&e);
            out.emit(Event::Error {
                code,
                message: e.to_string(),
            });
            code
        }
    }
}
