use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::context::Collaborators;
use crate::machine::{self, ActionOutcome, NetworkAction, Trigger};
use crate::net::{self, WolRetry};
use crate::operation::{ControllerError, OperationEvent};
use crate::operation_runner::{commit_transition, NotifyPolicy};
use crate::state;
use crate::status::StoredStatus;

#[derive(Debug, Clone, Default)]
pub struct ActionOptions {
    /// WoL send attempts and the gap between them.
    pub wol_retry: WolRetry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapOutcome {
    pub previous: StoredStatus,
    pub status: StoredStatus,
    pub action: NetworkAction,
    /// `None` when no network action was needed.
    pub action_outcome: Option<ActionOutcome>,
    pub scheduled: Option<Duration>,
}

/// Handles one user tap on the power toggle.
pub struct ActionExecutor {
    deps: Collaborators,
    opts: ActionOptions,
}

impl ActionExecutor {
    pub fn new(deps: Collaborators, opts: ActionOptions) -> Self {
        Self { deps, opts }
    }

    /// Run the tap on the calling thread. WoL retries can block for about a
    /// second; use [`ActionExecutor::spawn`] from a UI thread.
    pub fn run<F>(&self, mut on_event: F) -> Result<TapOutcome, ControllerError>
    where
        F: FnMut(OperationEvent),
    {
        let store = self.deps.store.as_ref();
        let current = state::read_status(store)?;
        on_event(OperationEvent::StatusLoaded {
            status: current.clone(),
        });

        let Some(status) = current.known() else {
            warn!(raw = %current, "unrecognized pc_status, tap ignored");
            on_event(OperationEvent::UnrecognizedStatus {
                raw: current.to_string(),
            });
            return Ok(TapOutcome {
                previous: current.clone(),
                status: current,
                action: NetworkAction::None,
                action_outcome: None,
                scheduled: None,
            });
        };

        let cfg = DeviceConfig::load(store)?;
        let decision = machine::decide(status, Trigger::UserTap);
        debug!(%status, action = ?decision.action, "tap decided");
        on_event(OperationEvent::Decided {
            action: decision.action,
        });

        let action_outcome = match decision.action {
            NetworkAction::None => None,
            NetworkAction::SendWol => Some(self.wake(&cfg, &mut on_event)),
            NetworkAction::SendShutdown => Some(self.shutdown(&cfg, &mut on_event)),
        };

        let t = decision.resolve(action_outcome.unwrap_or(ActionOutcome::Delivered));
        let committed =
            commit_transition(&self.deps, &current, &t, NotifyPolicy::Always, &mut on_event)?;

        Ok(TapOutcome {
            previous: current,
            status: t.status.into(),
            action: decision.action,
            action_outcome,
            scheduled: committed.scheduled,
        })
    }

    /// Run the tap on a worker thread so the caller is never blocked on I/O.
    pub fn spawn<F>(self, on_event: F) -> TapHandle
    where
        F: FnMut(OperationEvent) + Send + 'static,
    {
        TapHandle(std::thread::spawn(move || self.run(on_event)))
    }

    fn wake<F>(&self, cfg: &DeviceConfig, on_event: &mut F) -> ActionOutcome
    where
        F: FnMut(OperationEvent),
    {
        let network = self.deps.network.as_ref();
        match net::send_wol_with_retries(
            network,
            cfg.broadcast_address,
            &cfg.mac_address,
            self.opts.wol_retry,
            on_event,
        ) {
            Ok(attempt) => on_event(OperationEvent::WolSent { attempt }),
            Err(e) => {
                warn!(error = %e, "wol failed, staying off");
                on_event(OperationEvent::WolFailed {
                    error: e.to_string(),
                });
                return ActionOutcome::SendFailed;
            }
        }

        let local = network.local_ipv4(cfg.pc_address);
        if !net::same_subnet(local, cfg.pc_address) {
            if let Some(local) = local {
                warn!(%local, pc = %cfg.pc_address, "not on the PC's subnet, staying off");
                on_event(OperationEvent::SubnetMismatch {
                    local,
                    pc: cfg.pc_address,
                });
            }
            return ActionOutcome::OffSubnet;
        }

        ActionOutcome::Delivered
    }

    fn shutdown<F>(&self, cfg: &DeviceConfig, on_event: &mut F) -> ActionOutcome
    where
        F: FnMut(OperationEvent),
    {
        let target = cfg.command_target();
        match self
            .deps
            .network
            .send_datagram(target, cfg.shutdown_command.as_bytes())
        {
            Ok(()) => {
                on_event(OperationEvent::ShutdownSent { target });
                ActionOutcome::Delivered
            }
            Err(e) => {
                // The probe loop corrects the status if the command never arrived.
                warn!(%target, error = %e, "shutdown command send failed");
                on_event(OperationEvent::ShutdownSendFailed {
                    target,
                    error: e.to_string(),
                });
                ActionOutcome::SendFailed
            }
        }
    }
}

pub struct TapHandle(JoinHandle<Result<TapOutcome, ControllerError>>);

impl TapHandle {
    pub fn join(self) -> Result<TapOutcome, ControllerError> {
        self.0.join().map_err(|_| ControllerError::WorkerPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, SocketAddrV4};

    use super::*;
    use crate::config::{KEY_PC_MAC, KEY_SHUTDOWN_CMD, KEY_UDP_PORT};
    use crate::state::{KEY_PC_STATUS, KEY_SHUTDOWN_FAIL_COUNT};
    use crate::status::PowerStatus;
    use crate::store::KeyValueStore;
    use crate::testing::{FakeNetwork, Harness};

    const LAN_HOST: Ipv4Addr = Ipv4Addr::new(192, 168, 31, 20);

    fn fast() -> ActionOptions {
        ActionOptions {
            wol_retry: WolRetry {
                attempts: 3,
                delay: Duration::ZERO,
            },
        }
    }

    fn tap(h: &Harness) -> (TapOutcome, Vec<OperationEvent>) {
        let mut events = Vec::new();
        let out = ActionExecutor::new(h.collaborators(), fast())
            .run(|ev| events.push(ev))
            .unwrap();
        (out, events)
    }

    fn stored(h: &Harness) -> Option<String> {
        h.store.get(KEY_PC_STATUS).unwrap()
    }

    #[test]
    fn test_tap_off_wol_fails_stays_off() {
        let h = Harness::new(FakeNetwork::new().with_wol_failures(3).with_local(LAN_HOST));
        let (out, events) = tap(&h);

        assert_eq!(out.status, PowerStatus::Off.into());
        assert_eq!(out.action_outcome, Some(ActionOutcome::SendFailed));
        assert_eq!(h.net.wol_calls(), 3);
        assert_eq!(stored(&h), None);
        assert!(h.scheduler.once().is_empty());
        assert_eq!(h.observer.hits(), 1);
        assert!(events
            .iter()
            .any(|e| matches!(e, OperationEvent::WolFailed { .. })));
    }

    #[test]
    fn test_tap_off_other_subnet_stays_off() {
        let h = Harness::new(FakeNetwork::new().with_local(Ipv4Addr::new(10, 0, 0, 2)));
        let (out, events) = tap(&h);

        assert_eq!(out.status, PowerStatus::Off.into());
        assert_eq!(out.action_outcome, Some(ActionOutcome::OffSubnet));
        assert_eq!(h.net.wol_calls(), 1);
        assert!(h.scheduler.once().is_empty());
        assert!(events
            .iter()
            .any(|e| matches!(e, OperationEvent::SubnetMismatch { .. })));
    }

    #[test]
    fn test_tap_off_same_subnet_goes_pending() {
        let h = Harness::new(FakeNetwork::new().with_wol_failures(1).with_local(LAN_HOST));
        let (out, _) = tap(&h);

        assert_eq!(out.status, PowerStatus::PendingWol.into());
        assert_eq!(stored(&h).as_deref(), Some("pending_wol"));
        assert_eq!(h.net.wol_calls(), 2);
        assert_eq!(h.scheduler.once(), vec![Duration::from_secs(10)]);
        assert_eq!(out.scheduled, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_tap_off_unknown_local_address_fails_open() {
        let h = Harness::new(FakeNetwork::new());
        let (out, _) = tap(&h);
        assert_eq!(out.status, PowerStatus::PendingWol.into());
    }

    #[test]
    fn test_tap_off_bad_mac_stays_off() {
        let h = Harness::new(FakeNetwork::new().with_local(LAN_HOST));
        h.store.set(KEY_PC_MAC, "70:85:C2").unwrap();
        let (out, _) = tap(&h);

        assert_eq!(out.status, PowerStatus::Off.into());
        assert_eq!(h.net.wol_calls(), 0);
    }

    #[test]
    fn test_tap_on_sends_shutdown() {
        let h = Harness::new(FakeNetwork::new());
        h.store.set(KEY_PC_STATUS, "on").unwrap();
        h.store.set(KEY_SHUTDOWN_FAIL_COUNT, "2").unwrap();
        h.store.set(KEY_UDP_PORT, "7777").unwrap();
        h.store.set(KEY_SHUTDOWN_CMD, "BYE").unwrap();

        let (out, _) = tap(&h);

        assert_eq!(out.status, PowerStatus::PendingShutdown.into());
        assert_eq!(
            h.store.get(KEY_SHUTDOWN_FAIL_COUNT).unwrap().as_deref(),
            Some("0")
        );
        assert_eq!(
            h.net.datagrams(),
            vec![(
                SocketAddrV4::new(Ipv4Addr::new(192, 168, 31, 94), 7777),
                b"BYE".to_vec()
            )]
        );
        assert_eq!(h.scheduler.once(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_tap_on_send_failure_still_pending() {
        let h = Harness::new(FakeNetwork::new().with_failing_datagrams());
        h.store.set(KEY_PC_STATUS, "on").unwrap();
        let (out, events) = tap(&h);

        assert_eq!(out.status, PowerStatus::PendingShutdown.into());
        assert!(events
            .iter()
            .any(|e| matches!(e, OperationEvent::ShutdownSendFailed { .. })));
    }

    #[test]
    fn test_tap_cancels_pending_states() {
        for (from, to) in [("pending_wol", "off"), ("pending_shutdown", "on")] {
            let h = Harness::new(FakeNetwork::new());
            h.store.set(KEY_PC_STATUS, from).unwrap();
            let (out, _) = tap(&h);

            assert_eq!(out.action, NetworkAction::None);
            assert_eq!(stored(&h).as_deref(), Some(to));
            assert_eq!(h.net.wol_calls(), 0);
            assert!(h.net.datagrams().is_empty());
            assert!(h.scheduler.once().is_empty());
        }
    }

    #[test]
    fn test_tap_unrecognized_status_is_noop() {
        let h = Harness::new(FakeNetwork::new());
        h.store.set(KEY_PC_STATUS, "sleeping").unwrap();
        let (out, events) = tap(&h);

        assert_eq!(out.status, StoredStatus::Unrecognized("sleeping".to_string()));
        assert_eq!(stored(&h).as_deref(), Some("sleeping"));
        assert_eq!(h.net.wol_calls(), 0);
        assert_eq!(h.observer.hits(), 0);
        assert!(events
            .iter()
            .any(|e| matches!(e, OperationEvent::UnrecognizedStatus { .. })));
    }

    #[test]
    fn test_spawned_tap_reports_through_handle() {
        let h = Harness::new(FakeNetwork::new().with_local(LAN_HOST));
        let handle = ActionExecutor::new(h.collaborators(), fast()).spawn(|_| {});
        let out = handle.join().unwrap();
        assert_eq!(out.status, PowerStatus::PendingWol.into());
    }
}
