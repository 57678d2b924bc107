//! File-backed operation store with atomic replace semantics.

use crate::error::{StoreError, StoreResult};
use crate::store::{LoadedLog, OperationStore};
use outbox_core::Operation;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// A file-backed operation store.
///
/// The full operation list is serialized as a single CBOR document. Writes
/// use the write-then-rename pattern for crash safety:
///
/// 1. Write to a temporary sibling file
/// 2. Sync the temporary file to disk
/// 3. Rename it over the target path
/// 4. Fsync the parent directory so the rename itself is durable
///
/// A concurrent reload therefore observes either the previous complete log
/// or the new complete log, never a partial write.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Creates a store backed by the given path.
    ///
    /// No I/O happens until the first `load` or `save`; parent directories
    /// are created on first save.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    #[cfg(unix)]
    fn sync_parent_dir(&self) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                // On Unix, fsync on a directory syncs its entries
                let dir = File::open(parent)?;
                dir.sync_all()?;
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_parent_dir(&self) -> StoreResult<()> {
        Ok(())
    }
}

impl OperationStore for FileStore {
    fn load(&self) -> LoadedLog {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return LoadedLog::empty(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "operation log unreadable, starting empty");
                return LoadedLog::recovered();
            }
        };

        if bytes.is_empty() {
            return LoadedLog::empty();
        }

        match ciborium::de::from_reader::<Vec<Operation>, _>(bytes.as_slice()) {
            Ok(operations) => LoadedLog {
                operations,
                degraded: false,
            },
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "operation log corrupt, starting empty");
                LoadedLog::recovered()
            }
        }
    }

    fn save(&mut self, operations: &[Operation]) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.temp_path();
        let mut file = File::create(&temp_path)?;
        ciborium::ser::into_writer(&operations, &mut file)
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        file.flush()?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        self.sync_parent_dir()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outbox_core::{OperationKind, OperationStatus};
    use proptest::prelude::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn make_op(path: &str) -> Operation {
        let mut headers = BTreeMap::new();
        headers.insert("X-Client".to_string(), "mobile".to_string());
        Operation::new(OperationKind::Update, "PATCH", path, vec![1, 2, 3])
            .with_headers(headers)
            .with_resource("task", "42")
    }

    #[test]
    fn missing_file_loads_clean_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("queue.cbor"));

        let loaded = store.load();
        assert!(loaded.operations.is_empty());
        assert!(!loaded.degraded);
    }

    #[test]
    fn empty_file_loads_clean_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.cbor");
        fs::write(&path, b"").unwrap();

        let loaded = FileStore::open(&path).load();
        assert!(loaded.operations.is_empty());
        assert!(!loaded.degraded);
    }

    #[test]
    fn save_then_load_preserves_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.cbor");

        let mut op = make_op("/tasks/42");
        op.status = OperationStatus::Failed;
        op.retry_count = 2;
        op.last_error = Some("timeout".to_string());

        let mut store = FileStore::open(&path);
        store.save(&[op.clone()]).unwrap();

        let loaded = FileStore::open(&path).load();
        assert!(!loaded.degraded);
        assert_eq!(loaded.operations, vec![op]);
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.cbor");
        fs::write(&path, b"this is not cbor").unwrap();

        let loaded = FileStore::open(&path).load();
        assert!(loaded.operations.is_empty());
        assert!(loaded.degraded);
    }

    #[test]
    fn save_replaces_previous_log() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.cbor");
        let mut store = FileStore::open(&path);

        store.save(&[make_op("/a"), make_op("/b")]).unwrap();
        store.save(&[make_op("/c")]).unwrap();

        let loaded = store.load();
        assert_eq!(loaded.operations.len(), 1);
        assert_eq!(loaded.operations[0].path, "/c");
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("queue.cbor");
        let mut store = FileStore::open(&path);

        store.save(&[make_op("/a")]).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![OsString::from("queue.cbor")]);
    }

    #[test]
    fn save_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("queue.cbor");

        let mut store = FileStore::open(&path);
        store.save(&[make_op("/a")]).unwrap();

        assert!(path.exists());
    }

    fn operation_strategy() -> impl Strategy<Value = Operation> {
        (
            prop_oneof![
                Just(OperationKind::Create),
                Just(OperationKind::Update),
                Just(OperationKind::Delete),
                Just(OperationKind::Custom),
            ],
            "[A-Z]{3,6}",
            "/[a-z0-9/]{1,24}",
            prop::collection::vec(any::<u8>(), 0..64),
            prop::collection::btree_map("[a-z-]{1,10}", "[a-zA-Z0-9 ]{0,16}", 0..4),
            prop_oneof![
                Just(OperationStatus::Pending),
                Just(OperationStatus::Syncing),
                Just(OperationStatus::Completed),
                Just(OperationStatus::Failed),
                Just(OperationStatus::Cancelled),
            ],
            0u32..5,
            prop::option::of(("[a-z]{1,8}", "[0-9]{1,6}")),
        )
            .prop_map(
                |(kind, method, path, payload, headers, status, retry_count, resource)| {
                    let mut op = Operation::new(kind, method, path, payload).with_headers(headers);
                    op.status = status;
                    op.retry_count = retry_count;
                    if let Some((rt, rid)) = resource {
                        op = op.with_resource(rt, rid);
                    }
                    op
                },
            )
    }

    proptest! {
        #[test]
        fn durability_roundtrip(ops in prop::collection::vec(operation_strategy(), 0..16)) {
            let dir = tempdir().unwrap();
            let path = dir.path().join("queue.cbor");

            let mut store = FileStore::open(&path);
            store.save(&ops).unwrap();

            let loaded = FileStore::open(&path).load();
            prop_assert!(!loaded.degraded);
            prop_assert_eq!(loaded.operations, ops);
        }
    }
}
