use pc_power::{ControllerError, ControllerErrorKind};

pub const EXIT_OK: i32 = 0;
pub const EXIT_USAGE: i32 = 2;
pub const EXIT_STORE: i32 = 10;
pub const EXIT_UNEXPECTED: i32 = 20;

pub fn for_controller(e: &ControllerError) -> i32 {
    match e.kind() {
        ControllerErrorKind::Store => EXIT_STORE,
        ControllerErrorKind::Unexpected => EXIT_UNEXPECTED,
    }
}
