use std::sync::Arc;

use crate::net::PowerNetwork;
use crate::notify::StatusObserver;
use crate::scheduler::Scheduler;
use crate::store::KeyValueStore;

/// Host-provided capabilities, injected into the executor and the checker.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn KeyValueStore>,
    pub network: Arc<dyn PowerNetwork>,
    pub scheduler: Arc<dyn Scheduler>,
    pub observer: Arc<dyn StatusObserver>,
}
