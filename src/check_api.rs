use std::time::Duration;

use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::context::Collaborators;
use crate::machine::{self, FailCountUpdate, Transition, Trigger};
use crate::operation::{ControllerError, OperationEvent};
use crate::operation_runner::{commit_transition, NotifyPolicy};
use crate::state;
use crate::status::{PowerStatus, StoredStatus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckOutcome {
    pub previous: StoredStatus,
    pub status: PowerStatus,
    pub reachable: bool,
    pub changed: bool,
    pub scheduled: Option<Duration>,
}

/// Handles one scheduled reachability probe.
///
/// Safe to run late, twice, or after the status it was scheduled for has
/// been cancelled: the status is read fresh right before deciding.
pub struct StatusChecker {
    deps: Collaborators,
}

impl StatusChecker {
    pub fn new(deps: Collaborators) -> Self {
        Self { deps }
    }

    pub fn run<F>(&self, mut on_event: F) -> Result<CheckOutcome, ControllerError>
    where
        F: FnMut(OperationEvent),
    {
        let store = self.deps.store.as_ref();
        let cfg = DeviceConfig::load(store)?;

        let target = cfg.probe_target();
        let reachable = self.deps.network.probe(target, cfg.probe_timeout);
        debug!(%target, reachable, "probe done");
        on_event(OperationEvent::Probe { target, reachable });

        // Read after the probe: a tap may have landed while we were waiting.
        let current = state::read_status(store)?;
        on_event(OperationEvent::StatusLoaded {
            status: current.clone(),
        });

        let t = match current.known() {
            Some(status) => {
                let fail_count = state::read_fail_count(store)?;
                machine::decide(
                    status,
                    Trigger::Probe {
                        reachable,
                        fail_count,
                    },
                )
                .transition()
            }
            None => {
                warn!(raw = %current, "unrecognized pc_status, refreshing from probe");
                on_event(OperationEvent::UnrecognizedStatus {
                    raw: current.to_string(),
                });
                Transition {
                    status: machine::refresh(reachable),
                    fail_count: FailCountUpdate::Keep,
                    reschedule: None,
                }
            }
        };

        let committed =
            commit_transition(&self.deps, &current, &t, NotifyPolicy::OnChange, &mut on_event)?;

        Ok(CheckOutcome {
            previous: current,
            status: t.status,
            reachable,
            changed: committed.changed,
            scheduled: committed.scheduled,
        })
    }
}
