//! Pure decision logic: `(current status, trigger) -> Decision`.
//!
//! ```text
//!            tap: WoL delivered, same subnet
//!   OFF ───────────────────────────────────▶ PENDING_WOL
//!    ▲  ◀──────────────── tap (cancel) ───────┘  │
//!    │                                   probe ok│
//!    │ 3 failed probes                           ▼
//!   PENDING_SHUTDOWN ◀──────── tap ───────────── ON
//!    └──────────────── tap (cancel) ───────────▶ ON
//! ```
//!
//! No I/O happens here. The executor performs the chosen [`NetworkAction`],
//! then asks [`Decision::resolve`] for the final [`Transition`].

use std::time::Duration;

use serde::Serialize;

use crate::status::PowerStatus;

/// Consecutive failed probes needed before a pending shutdown is declared off.
pub const SHUTDOWN_FAILS_NEEDED: u32 = 3;
/// Boot after WoL is slow, so the first check waits longer.
pub const FIRST_CHECK_AFTER_WOL: Duration = Duration::from_secs(10);
pub const FIRST_CHECK_AFTER_SHUTDOWN: Duration = Duration::from_secs(1);
pub const RECHECK_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    UserTap,
    Probe { reachable: bool, fail_count: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkAction {
    None,
    SendWol,
    SendShutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailCountUpdate {
    Keep,
    Set(u32),
}

/// What happened when the executor carried out the decided action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionOutcome {
    Delivered,
    SendFailed,
    /// The packet went out but this host is not on the PC's subnet, so the
    /// broadcast cannot have reached it.
    OffSubnet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub status: PowerStatus,
    pub fail_count: FailCountUpdate,
    pub reschedule: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: NetworkAction,
    /// Status to persist when the action takes effect.
    pub next: PowerStatus,
    /// Status to persist when the action did not take effect. `None` means the
    /// action is best-effort and `next` applies either way.
    pub fallback: Option<PowerStatus>,
    pub fail_count: FailCountUpdate,
    pub reschedule: Option<Duration>,
}

impl Decision {
    fn settled(next: PowerStatus) -> Self {
        Self {
            action: NetworkAction::None,
            next,
            fallback: None,
            fail_count: FailCountUpdate::Keep,
            reschedule: None,
        }
    }

    pub fn resolve(&self, outcome: ActionOutcome) -> Transition {
        match (outcome, self.fallback) {
            (ActionOutcome::Delivered, _) | (_, None) => Transition {
                status: self.next,
                fail_count: self.fail_count,
                reschedule: self.reschedule,
            },
            (_, Some(fallback)) => Transition {
                status: fallback,
                fail_count: FailCountUpdate::Keep,
                reschedule: None,
            },
        }
    }

    /// Shortcut for decisions that carry no network action.
    pub fn transition(&self) -> Transition {
        self.resolve(ActionOutcome::Delivered)
    }
}

pub fn decide(current: PowerStatus, trigger: Trigger) -> Decision {
    match trigger {
        Trigger::UserTap => decide_tap(current),
        Trigger::Probe {
            reachable,
            fail_count,
        } => decide_probe(current, reachable, fail_count),
    }
}

fn decide_tap(current: PowerStatus) -> Decision {
    match current {
        PowerStatus::Off => Decision {
            action: NetworkAction::SendWol,
            next: PowerStatus::PendingWol,
            fallback: Some(PowerStatus::Off),
            fail_count: FailCountUpdate::Keep,
            reschedule: Some(FIRST_CHECK_AFTER_WOL),
        },
        PowerStatus::On => Decision {
            action: NetworkAction::SendShutdown,
            next: PowerStatus::PendingShutdown,
            fallback: None,
            fail_count: FailCountUpdate::Set(0),
            reschedule: Some(FIRST_CHECK_AFTER_SHUTDOWN),
        },
        PowerStatus::PendingWol => Decision::settled(PowerStatus::Off),
        PowerStatus::PendingShutdown => Decision::settled(PowerStatus::On),
    }
}

fn decide_probe(current: PowerStatus, reachable: bool, fail_count: u32) -> Decision {
    match current {
        PowerStatus::PendingWol if reachable => Decision::settled(PowerStatus::On),
        PowerStatus::PendingWol => Decision {
            reschedule: Some(RECHECK_DELAY),
            ..Decision::settled(PowerStatus::PendingWol)
        },
        PowerStatus::PendingShutdown if reachable => Decision {
            fail_count: FailCountUpdate::Set(0),
            reschedule: Some(RECHECK_DELAY),
            ..Decision::settled(PowerStatus::PendingShutdown)
        },
        PowerStatus::PendingShutdown => {
            let fails = fail_count.saturating_add(1);
            if fails >= SHUTDOWN_FAILS_NEEDED {
                Decision {
                    fail_count: FailCountUpdate::Set(fails),
                    ..Decision::settled(PowerStatus::Off)
                }
            } else {
                Decision {
                    fail_count: FailCountUpdate::Set(fails),
                    reschedule: Some(RECHECK_DELAY),
                    ..Decision::settled(PowerStatus::PendingShutdown)
                }
            }
        }
        PowerStatus::On | PowerStatus::Off => Decision::settled(refresh(reachable)),
    }
}

/// Periodic refresh outside a pending transition: believe the probe.
pub fn refresh(reachable: bool) -> PowerStatus {
    if reachable {
        PowerStatus::On
    } else {
        PowerStatus::Off
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(reachable: bool, fail_count: u32) -> Trigger {
        Trigger::Probe {
            reachable,
            fail_count,
        }
    }

    #[test]
    fn test_tap_from_off_sends_wol() {
        let d = decide(PowerStatus::Off, Trigger::UserTap);
        assert_eq!(d.action, NetworkAction::SendWol);

        let ok = d.resolve(ActionOutcome::Delivered);
        assert_eq!(ok.status, PowerStatus::PendingWol);
        assert_eq!(ok.reschedule, Some(Duration::from_secs(10)));

        for outcome in [ActionOutcome::SendFailed, ActionOutcome::OffSubnet] {
            let t = d.resolve(outcome);
            assert_eq!(t.status, PowerStatus::Off);
            assert_eq!(t.reschedule, None);
        }
    }

    #[test]
    fn test_tap_from_on_is_best_effort_shutdown() {
        let d = decide(PowerStatus::On, Trigger::UserTap);
        assert_eq!(d.action, NetworkAction::SendShutdown);

        for outcome in [ActionOutcome::Delivered, ActionOutcome::SendFailed] {
            let t = d.resolve(outcome);
            assert_eq!(t.status, PowerStatus::PendingShutdown);
            assert_eq!(t.fail_count, FailCountUpdate::Set(0));
            assert_eq!(t.reschedule, Some(Duration::from_secs(1)));
        }
    }

    #[test]
    fn test_tap_cancels_pending_without_network() {
        let d = decide(PowerStatus::PendingWol, Trigger::UserTap);
        assert_eq!(d.action, NetworkAction::None);
        assert_eq!(d.transition().status, PowerStatus::Off);

        let d = decide(PowerStatus::PendingShutdown, Trigger::UserTap);
        assert_eq!(d.action, NetworkAction::None);
        assert_eq!(d.transition().status, PowerStatus::On);
        assert_eq!(d.transition().reschedule, None);
    }

    #[test]
    fn test_probe_pending_wol() {
        let t = decide(PowerStatus::PendingWol, probe(true, 0)).transition();
        assert_eq!(t.status, PowerStatus::On);
        assert_eq!(t.reschedule, None);

        let t = decide(PowerStatus::PendingWol, probe(false, 0)).transition();
        assert_eq!(t.status, PowerStatus::PendingWol);
        assert_eq!(t.reschedule, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_probe_pending_shutdown_debounce() {
        let t = decide(PowerStatus::PendingShutdown, probe(false, 0)).transition();
        assert_eq!(t.status, PowerStatus::PendingShutdown);
        assert_eq!(t.fail_count, FailCountUpdate::Set(1));
        assert_eq!(t.reschedule, Some(RECHECK_DELAY));

        let t = decide(PowerStatus::PendingShutdown, probe(false, 2)).transition();
        assert_eq!(t.status, PowerStatus::Off);
        assert_eq!(t.fail_count, FailCountUpdate::Set(3));
        assert_eq!(t.reschedule, None);

        let t = decide(PowerStatus::PendingShutdown, probe(true, 2)).transition();
        assert_eq!(t.status, PowerStatus::PendingShutdown);
        assert_eq!(t.fail_count, FailCountUpdate::Set(0));
        assert_eq!(t.reschedule, Some(RECHECK_DELAY));
    }

    #[test]
    fn test_probe_refresh_from_terminal_states() {
        for current in [PowerStatus::On, PowerStatus::Off] {
            assert_eq!(
                decide(current, probe(true, 0)).transition().status,
                PowerStatus::On
            );
            let t = decide(current, probe(false, 0)).transition();
            assert_eq!(t.status, PowerStatus::Off);
            assert_eq!(t.reschedule, None);
        }
    }

    #[test]
    fn test_every_decision_lands_on_a_valid_status() {
        let outcomes = [
            ActionOutcome::Delivered,
            ActionOutcome::SendFailed,
            ActionOutcome::OffSubnet,
        ];
        for current in PowerStatus::ALL {
            let triggers = [Trigger::UserTap, probe(true, 0), probe(false, 7)];
            for trigger in triggers {
                let d = decide(current, trigger);
                for outcome in outcomes {
                    let t = d.resolve(outcome);
                    assert!(PowerStatus::ALL.contains(&t.status));
                    assert_eq!(t.reschedule.is_some(), t.status.is_pending());
                }
            }
        }
    }
}
