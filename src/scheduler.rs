use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tracing::{debug, warn};

use crate::store::{KeyValueStore, StoreError};

pub const KEY_NEXT_CHECK_AT: &str = "next_check_at";
pub const KEY_REFRESH_EVERY_MIN: &str = "refresh_every_min";
pub const KEY_LAST_REFRESH_AT: &str = "last_refresh_at";

pub const DEFAULT_REFRESH_EVERY: Duration = Duration::from_secs(15 * 60);

#[derive(Error, Debug)]
pub enum ScheduleError {
    #[error("unable to persist schedule: {0}")]
    Store(#[from] StoreError),
}

/// Requests future invocations of the status checker.
///
/// Both calls are fire-and-forget: there are no handles to track or cancel.
/// Implementations must deliver at least once even if the requesting process
/// exits in the meantime; duplicates and late runs are tolerated.
pub trait Scheduler: Send + Sync {
    fn schedule_once(&self, after: Duration) -> Result<(), ScheduleError>;
    fn schedule_recurring(&self, every: Duration) -> Result<(), ScheduleError>;
}

/// What a scheduler host should do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Due {
    FollowUp,
    Refresh,
    Idle { next: Option<SystemTime> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSnapshot {
    pub next_check_at: Option<SystemTime>,
    pub refresh_every: Option<Duration>,
    pub last_refresh_at: Option<SystemTime>,
}

/// Keeps the schedule in the same key/value store as the controller state,
/// so a later process (cron job, `watch` loop, app restart) picks it up.
///
/// Only one follow-up is remembered: a newer `schedule_once` replaces an
/// older one.
#[derive(Clone)]
pub struct StoreScheduler {
    store: Arc<dyn KeyValueStore>,
    clock: fn() -> SystemTime,
}

impl StoreScheduler {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            clock: SystemTime::now,
        }
    }

    pub fn with_clock(mut self, clock: fn() -> SystemTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn snapshot(&self) -> Result<ScheduleSnapshot, StoreError> {
        let refresh_every = self
            .store
            .get(KEY_REFRESH_EVERY_MIN)?
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|m| *m > 0)
            .and_then(|m| match m.checked_mul(60) {
                Some(secs) => Some(Duration::from_secs(secs)),
                None => {
                    warn!(minutes = m, "refresh period out of range, refresh off");
                    None
                }
            });

        Ok(ScheduleSnapshot {
            next_check_at: self.read_time(KEY_NEXT_CHECK_AT)?,
            refresh_every,
            last_refresh_at: self.read_time(KEY_LAST_REFRESH_AT)?,
        })
    }

    /// Install the periodic refresh, or switch it off with `None`.
    pub fn set_refresh(&self, every: Option<Duration>) -> Result<(), ScheduleError> {
        match every {
            Some(every) => self.schedule_recurring(every),
            None => {
                self.store.remove(KEY_REFRESH_EVERY_MIN)?;
                Ok(())
            }
        }
    }

    pub fn due(&self, now: SystemTime) -> Result<Due, StoreError> {
        let snap = self.snapshot()?;

        if let Some(at) = snap.next_check_at {
            if at <= now {
                return Ok(Due::FollowUp);
            }
        }

        let refresh_at = match (snap.refresh_every, snap.last_refresh_at) {
            (Some(_), None) => return Ok(Due::Refresh),
            (Some(every), Some(last)) => match last.checked_add(every) {
                Some(at) if at <= now => return Ok(Due::Refresh),
                Some(at) => Some(at),
                None => {
                    warn!(
                        every_secs = every.as_secs(),
                        "refresh period out of range, refresh off"
                    );
                    None
                }
            },
            (None, _) => None,
        };

        let next = match (snap.next_check_at, refresh_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        Ok(Due::Idle { next })
    }

    /// Like [`StoreScheduler::due`], but marks the returned entry as consumed
    /// before the caller runs the check.
    pub fn take_due(&self, now: SystemTime) -> Result<Due, StoreError> {
        let due = self.due(now)?;
        match due {
            Due::FollowUp => self.store.remove(KEY_NEXT_CHECK_AT)?,
            Due::Refresh => self.write_time(KEY_LAST_REFRESH_AT, now)?,
            Due::Idle { .. } => {}
        }
        Ok(due)
    }

    fn read_time(&self, key: &str) -> Result<Option<SystemTime>, StoreError> {
        Ok(self
            .store
            .get(key)?
            .and_then(|s| s.trim().parse::<u64>().ok())
            .and_then(|ms| UNIX_EPOCH.checked_add(Duration::from_millis(ms))))
    }

    fn write_time(&self, key: &str, t: SystemTime) -> Result<(), StoreError> {
        self.store.set(key, &unix_millis(t).to_string())
    }
}

impl Scheduler for StoreScheduler {
    fn schedule_once(&self, after: Duration) -> Result<(), ScheduleError> {
        let at = (self.clock)() + after;
        debug!(after_ms = after.as_millis() as u64, "follow-up check scheduled");
        self.write_time(KEY_NEXT_CHECK_AT, at)?;
        Ok(())
    }

    /// Keeps an existing refresh phase; only the period is updated.
    fn schedule_recurring(&self, every: Duration) -> Result<(), ScheduleError> {
        let minutes = (every.as_secs() / 60).max(1);
        self.store
            .set(KEY_REFRESH_EVERY_MIN, &minutes.to_string())?;
        Ok(())
    }
}

pub fn unix_millis(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
