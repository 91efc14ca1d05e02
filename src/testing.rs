//! In-crate fakes for the injected collaborators.

use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::MacAddress;
use crate::context::Collaborators;
use crate::net::{NetError, PowerNetwork};
use crate::notify::StatusObserver;
use crate::scheduler::{ScheduleError, Scheduler};
use crate::store::MemoryStore;

#[derive(Debug, Default)]
pub struct FakeNetwork {
    wol_failures_left: AtomicU32,
    wol_calls: AtomicU32,
    datagram_fails: AtomicBool,
    reachable: AtomicBool,
    local: Mutex<Option<Ipv4Addr>>,
    datagrams: Mutex<Vec<(SocketAddrV4, Vec<u8>)>>,
    probes: AtomicU32,
}

impl FakeNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_wol_failures(self, n: u32) -> Self {
        self.wol_failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn with_local(self, ip: Ipv4Addr) -> Self {
        *self.local.lock().unwrap() = Some(ip);
        self
    }

    pub fn with_failing_datagrams(self) -> Self {
        self.datagram_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn wol_calls(&self) -> u32 {
        self.wol_calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> u32 {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn datagrams(&self) -> Vec<(SocketAddrV4, Vec<u8>)> {
        self.datagrams.lock().unwrap().clone()
    }
}

fn refused(addr: SocketAddrV4) -> NetError {
    NetError::Send {
        addr,
        source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
    }
}

impl PowerNetwork for FakeNetwork {
    fn send_wol(&self, broadcast: Ipv4Addr, _mac: &MacAddress) -> Result<(), NetError> {
        self.wol_calls.fetch_add(1, Ordering::SeqCst);
        let left = self.wol_failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.wol_failures_left.store(left - 1, Ordering::SeqCst);
            return Err(refused(SocketAddrV4::new(broadcast, 9)));
        }
        Ok(())
    }

    fn send_datagram(&self, target: SocketAddrV4, payload: &[u8]) -> Result<(), NetError> {
        if self.datagram_fails.load(Ordering::SeqCst) {
            return Err(refused(target));
        }
        self.datagrams
            .lock()
            .unwrap()
            .push((target, payload.to_vec()));
        Ok(())
    }

    fn probe(&self, _target: SocketAddrV4, _timeout: Duration) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }

    fn local_ipv4(&self, _toward: Ipv4Addr) -> Option<Ipv4Addr> {
        *self.local.lock().unwrap()
    }
}

#[derive(Debug, Default)]
pub struct RecordingScheduler {
    once: Mutex<Vec<Duration>>,
}

impl RecordingScheduler {
    pub fn once(&self) -> Vec<Duration> {
        self.once.lock().unwrap().clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn schedule_once(&self, after: Duration) -> Result<(), ScheduleError> {
        self.once.lock().unwrap().push(after);
        Ok(())
    }

    fn schedule_recurring(&self, _every: Duration) -> Result<(), ScheduleError> {
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct CountingObserver {
    hits: AtomicUsize,
}

impl CountingObserver {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl StatusObserver for CountingObserver {
    fn status_changed(&self) {
        self.hits.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub net: Arc<FakeNetwork>,
    pub scheduler: Arc<RecordingScheduler>,
    pub observer: Arc<CountingObserver>,
}

impl Harness {
    pub fn new(net: FakeNetwork) -> Self {
        Self {
            store: Arc::new(MemoryStore::new()),
            net: Arc::new(net),
            scheduler: Arc::new(RecordingScheduler::default()),
            observer: Arc::new(CountingObserver::default()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            network: self.net.clone(),
            scheduler: self.scheduler.clone(),
            observer: self.observer.clone(),
        }
    }
}
