use crate::status::{PowerStatus, StoredStatus};
use crate::store::{KeyValueStore, StoreError};

pub const KEY_PC_STATUS: &str = "pc_status";
pub const KEY_SHUTDOWN_FAIL_COUNT: &str = "shutdown_fail_count";

pub fn read_status(store: &dyn KeyValueStore) -> Result<StoredStatus, StoreError> {
    let raw = store.get(KEY_PC_STATUS)?;
    Ok(StoredStatus::from_raw(raw.as_deref()))
}

pub fn write_status(store: &dyn KeyValueStore, status: PowerStatus) -> Result<(), StoreError> {
    store.set(KEY_PC_STATUS, status.as_str())
}

/// Missing or malformed counts read as zero.
pub fn read_fail_count(store: &dyn KeyValueStore) -> Result<u32, StoreError> {
    Ok(store
        .get(KEY_SHUTDOWN_FAIL_COUNT)?
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(0))
}

pub fn write_fail_count(store: &dyn KeyValueStore, count: u32) -> Result<(), StoreError> {
    store.set(KEY_SHUTDOWN_FAIL_COUNT, &count.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn test_fail_count_is_string_encoded() {
        let store = MemoryStore::new();
        assert_eq!(read_fail_count(&store).unwrap(), 0);
        write_fail_count(&store, 2).unwrap();
        assert_eq!(
            store.get(KEY_SHUTDOWN_FAIL_COUNT).unwrap().as_deref(),
            Some("2")
        );
        store.set(KEY_SHUTDOWN_FAIL_COUNT, "lots").unwrap();
        assert_eq!(read_fail_count(&store).unwrap(), 0);
    }
}
