use std::sync::Arc;
use std::time::Duration;

use pc_power::net::{SystemNetwork, WolRetry};
use pc_power::notify::{CommandObserver, NoopObserver, StatusObserver};
use pc_power::scheduler::StoreScheduler;
use pc_power::store::{FileStore, KeyValueStore};
use pc_power::Collaborators;

use crate::cli;

/// Concrete capabilities for a CLI process: a JSON state file, a schedule
/// kept in that same file, and an optional notify hook.
pub struct Host {
    pub store: Arc<FileStore>,
    pub scheduler: Arc<StoreScheduler>,
    observer: Arc<dyn StatusObserver>,
}

impl Host {
    pub fn open(args: &cli::GlobalArgs) -> Self {
        let path = args.state.clone().unwrap_or_else(FileStore::default_path);
        let store = Arc::new(FileStore::open(path));
        let kv: Arc<dyn KeyValueStore> = store.clone();
        let scheduler = Arc::new(StoreScheduler::new(kv));

        let observer: Arc<dyn StatusObserver> = match args
            .notify_cmd
            .as_deref()
            .and_then(CommandObserver::from_command_line)
        {
            Some(hook) => Arc::new(hook),
            None => Arc::new(NoopObserver),
        };

        Self {
            store,
            scheduler,
            observer,
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            store: self.store.clone(),
            network: Arc::new(SystemNetwork),
            scheduler: self.scheduler.clone(),
            observer: self.observer.clone(),
        }
    }

    pub fn state_path(&self) -> String {
        self.store.path().display().to_string()
    }
}

pub fn wol_retry(args: &cli::TapArgs) -> WolRetry {
    WolRetry {
        attempts: args.wol_attempts.max(1),
        delay: Duration::from_millis(args.wol_retry_delay_ms),
    }
}
