//! Power toggle for a LAN PC: Wake-on-LAN to turn it on, a UDP command to shut
//! it down, and TCP reachability probes until the believed status settles.
//!
//! Host capabilities (storage, delayed invocation, change notification) are
//! injected through [`context::Collaborators`].

pub mod action_api;
pub mod check_api;
pub mod config;
pub mod context;
pub mod machine;
pub mod net;
pub mod notify;
pub mod operation;
mod operation_runner;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

pub use action_api::{ActionExecutor, ActionOptions, TapOutcome};
pub use check_api::{CheckOutcome, StatusChecker};
pub use context::Collaborators;
pub use operation::{ControllerError, ControllerErrorKind, OperationEvent};
pub use status::{PowerStatus, StoredStatus};
