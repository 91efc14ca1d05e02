use std::time::Duration;

use tracing::{info, warn};

use crate::context::Collaborators;
use crate::machine::{FailCountUpdate, Transition, SHUTDOWN_FAILS_NEEDED};
use crate::operation::{ControllerError, OperationEvent};
use crate::state;
use crate::status::StoredStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NotifyPolicy {
    Always,
    OnChange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Committed {
    pub changed: bool,
    pub scheduled: Option<Duration>,
}

/// Persist a resolved transition, tell the observer, request the follow-up.
///
/// Store failures abort. A scheduling failure is reported and swallowed.
pub(crate) fn commit_transition<F>(
    deps: &Collaborators,
    from: &StoredStatus,
    t: &Transition,
    notify: NotifyPolicy,
    on_event: &mut F,
) -> Result<Committed, ControllerError>
where
    F: FnMut(OperationEvent),
{
    let store = deps.store.as_ref();

    if let FailCountUpdate::Set(count) = t.fail_count {
        state::write_fail_count(store, count)?;
        on_event(OperationEvent::FailCount {
            count,
            needed: SHUTDOWN_FAILS_NEEDED,
        });
    }

    let changed = from.known() != Some(t.status);
    if changed {
        state::write_status(store, t.status)?;
        info!(from = %from, to = %t.status, "status changed");
        on_event(OperationEvent::StatusChanged {
            from: from.clone(),
            to: t.status,
        });
    } else {
        on_event(OperationEvent::StatusUnchanged {
            status: from.clone(),
        });
    }

    if changed || notify == NotifyPolicy::Always {
        deps.observer.status_changed();
        on_event(OperationEvent::Notified);
    }

    let mut scheduled = None;
    if let Some(after) = t.reschedule {
        match deps.scheduler.schedule_once(after) {
            Ok(()) => {
                scheduled = Some(after);
                on_event(OperationEvent::Scheduled { after });
            }
            Err(e) => {
                warn!(error = %e, "unable to schedule follow-up check");
                on_event(OperationEvent::ScheduleFailed {
                    error: e.to_string(),
                });
            }
        }
    }

    Ok(Committed { changed, scheduled })
}
