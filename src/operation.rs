use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use thiserror::Error;

use crate::machine::NetworkAction;
use crate::status::{PowerStatus, StoredStatus};
use crate::store::StoreError;

#[derive(Debug, Clone, PartialEq)]
pub enum OperationEvent {
    StatusLoaded {
        status: StoredStatus,
    },
    UnrecognizedStatus {
        raw: String,
    },
    Decided {
        action: NetworkAction,
    },

    WolAttempt {
        attempt: u32,
        attempts: u32,
        broadcast: Ipv4Addr,
        mac: String,
    },
    WolRetry {
        attempt: u32,
        attempts: u32,
        error: String,
    },
    WolSent {
        attempt: u32,
    },
    WolFailed {
        error: String,
    },
    SubnetMismatch {
        local: Ipv4Addr,
        pc: Ipv4Addr,
    },

    ShutdownSent {
        target: SocketAddrV4,
    },
    ShutdownSendFailed {
        target: SocketAddrV4,
        error: String,
    },

    Probe {
        target: SocketAddrV4,
        reachable: bool,
    },
    FailCount {
        count: u32,
        needed: u32,
    },

    StatusChanged {
        from: StoredStatus,
        to: PowerStatus,
    },
    StatusUnchanged {
        status: StoredStatus,
    },
    Notified,

    Scheduled {
        after: Duration,
    },
    ScheduleFailed {
        error: String,
    },
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ControllerErrorKind {
    Store,
    Unexpected,
}

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("state store failed: {source}")]
    Store {
        #[from]
        source: StoreError,
    },

    #[error("worker thread panicked")]
    WorkerPanicked,
}

impl ControllerError {
    pub fn kind(&self) -> ControllerErrorKind {
        match self {
            ControllerError::Store { .. } => ControllerErrorKind::Store,
            ControllerError::WorkerPanicked => ControllerErrorKind::Unexpected,
        }
    }
}
