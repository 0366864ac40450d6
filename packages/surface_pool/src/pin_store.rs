use std::collections::BTreeSet;
use std::fmt::Debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use foldhash::HashMap;
use parking_lot::Mutex;
use toml::Value;
use tracing::{debug, warn};

use crate::{PinRecord, SlotCategory};

/// Durable storage for pinned slot mappings, partitioned by [`SlotCategory`].
///
/// A pinned lease must reattach to the same slot after a process restart, so every
/// newly established pin is written through to a store and the stored sets are read
/// back when the pool is built.
///
/// Implementations never propagate storage failures: a set that cannot be read or
/// written is treated as empty. They must serialize their own writes so concurrent
/// saves do not lose updates; the pool never invokes a store while holding its locks.
#[cfg_attr(test, mockall::automock)]
pub trait PinStore: Debug + Send + Sync {
    /// Loads the persisted pinned set of one category.
    ///
    /// Returns an empty set when nothing was persisted or the store cannot be read.
    fn load(&self, category: SlotCategory) -> Vec<PinRecord>;

    /// Merges `records` into the persisted pinned set of one category.
    ///
    /// Saving is additive, and a durable write is performed only when the merged set
    /// is larger than what is already stored. Re-pinning an already persisted key
    /// therefore costs no write.
    fn save(&self, category: SlotCategory, records: &[PinRecord]);

    /// Discards the persisted pinned set of one category.
    fn clear(&self, category: SlotCategory);

    /// Discards the persisted pinned sets of every category.
    fn clear_all(&self) {
        for category in SlotCategory::ALL {
            self.clear(category);
        }
    }
}

/// A [`PinStore`] backed by a single TOML file.
///
/// The file holds one array of `slot@key` strings per category:
///
/// ```toml
/// single_instance = ["single_instance.0@pkg/Player"]
/// single_task = ["single_task.0@pkg/Widget", "single_task.1@pkg/Browser"]
/// ```
///
/// A missing file is an empty store. Unreadable or unparseable contents degrade to
/// empty sets and failed writes are dropped, each with a logged warning. Individual
/// entries that do not parse are skipped. The parent directory of `path` must exist;
/// the store does not create it.
#[derive(Debug)]
pub struct FilePinStore {
    path: PathBuf,

    /// Serializes all file access so concurrent saves do not lose updates.
    access: Mutex<()>,
}

impl FilePinStore {
    /// Creates a store backed by the file at `path`.
    ///
    /// The file is not touched until the first load, save or clear.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            access: Mutex::new(()),
        }
    }

    /// The file this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> toml::Table {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no pinned mapping file; all sets empty");
                return toml::Table::new();
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    %error,
                    "cannot read pinned mappings; treating all sets as empty"
                );
                return toml::Table::new();
            }
        };

        match toml::from_str::<Value>(&contents) {
            Ok(Value::Table(table)) => table,
            Ok(_) => {
                warn!(
                    path = %self.path.display(),
                    "pinned mapping file is not a table; treating all sets as empty"
                );
                toml::Table::new()
            }
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    %error,
                    "cannot parse pinned mappings; treating all sets as empty"
                );
                toml::Table::new()
            }
        }
    }

    fn write_table(&self, table: toml::Table) {
        let rendered = match toml::to_string(&Value::Table(table)) {
            Ok(rendered) => rendered,
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    %error,
                    "cannot render pinned mappings; dropping write"
                );
                return;
            }
        };

        if let Err(error) = fs::write(&self.path, rendered) {
            warn!(
                path = %self.path.display(),
                %error,
                "cannot write pinned mappings; dropping write"
            );
        }
    }

    fn stored_set(table: &toml::Table, category: SlotCategory) -> BTreeSet<String> {
        let Some(value) = table.get(category.to_string().as_str()) else {
            return BTreeSet::new();
        };

        let Some(entries) = value.as_array() else {
            warn!(%category, "pinned set is not an array; treating it as empty");
            return BTreeSet::new();
        };

        entries
            .iter()
            .filter_map(|entry| {
                let encoded = entry.as_str();

                if encoded.is_none() {
                    warn!(%category, "skipping non-string pinned mapping entry");
                }

                encoded.map(str::to_owned)
            })
            .collect()
    }
}

impl PinStore for FilePinStore {
    fn load(&self, category: SlotCategory) -> Vec<PinRecord> {
        let _guard = self.access.lock();
        let table = self.read_table();

        Self::stored_set(&table, category)
            .iter()
            .filter_map(|encoded| {
                let record = PinRecord::from_encoded(category, encoded);

                if record.is_none() {
                    warn!(%category, %encoded, "skipping malformed pinned mapping");
                }

                record
            })
            .collect()
    }

    fn save(&self, category: SlotCategory, records: &[PinRecord]) {
        let _guard = self.access.lock();
        let mut table = self.read_table();

        let mut merged = Self::stored_set(&table, category);
        let stored_len = merged.len();

        for record in records {
            merged.insert(record.to_string());
        }

        if merged.len() == stored_len {
            return;
        }

        let entries = merged.into_iter().map(Value::String).collect();
        table.insert(category.to_string(), Value::Array(entries));

        self.write_table(table);
    }

    fn clear(&self, category: SlotCategory) {
        let _guard = self.access.lock();
        let mut table = self.read_table();

        if table.remove(category.to_string().as_str()).is_none() {
            return;
        }

        self.write_table(table);
    }

    fn clear_all(&self) {
        let _guard = self.access.lock();
        let mut table = self.read_table();

        let mut removed = false;

        for category in SlotCategory::ALL {
            removed |= table.remove(category.to_string().as_str()).is_some();
        }

        if removed {
            self.write_table(table);
        }
    }
}

/// A [`PinStore`] that keeps pinned sets in process memory.
///
/// Nothing survives a process restart. Useful in tests and for hosts that want pin
/// semantics without durability.
#[derive(Debug, Default)]
pub struct MemoryPinStore {
    sets: Mutex<HashMap<SlotCategory, BTreeSet<String>>>,
}

impl MemoryPinStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl PinStore for MemoryPinStore {
    fn load(&self, category: SlotCategory) -> Vec<PinRecord> {
        let sets = self.sets.lock();

        sets.get(&category).map_or_else(Vec::new, |set| {
            set.iter()
                .filter_map(|encoded| PinRecord::from_encoded(category, encoded))
                .collect()
        })
    }

    fn save(&self, category: SlotCategory, records: &[PinRecord]) {
        let mut sets = self.sets.lock();
        let set = sets.entry(category).or_default();

        for record in records {
            set.insert(record.to_string());
        }
    }

    fn clear(&self, category: SlotCategory) {
        self.sets.lock().remove(&category);
    }
}

#[cfg(all(test, not(miri)))]
mod tests {
    use std::fmt::Debug;
    use std::fs;
    use std::sync::Arc;

    use static_assertions::assert_impl_all;

    use super::*;
    use crate::{ComponentKey, SlotId};

    assert_impl_all!(FilePinStore: Send, Sync, Debug);
    assert_impl_all!(MemoryPinStore: Send, Sync, Debug);

    fn record(category: SlotCategory, index: u32, key: &str) -> PinRecord {
        PinRecord::new(SlotId::pooled(category, index), ComponentKey::new(key))
    }

    #[test]
    fn trait_object_is_debug() {
        let store: Arc<dyn PinStore> = Arc::new(MemoryPinStore::new());

        assert!(format!("{store:?}").contains("MemoryPinStore"));
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePinStore::new(dir.path().join("pinned.toml"));

        assert!(store.load(SlotCategory::SingleTop).is_empty());
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinned.toml");

        let records = vec![
            record(SlotCategory::SingleTask, 0, "pkg/Widget"),
            record(SlotCategory::SingleTask, 1, "pkg/Browser"),
        ];

        FilePinStore::new(&path).save(SlotCategory::SingleTask, &records);

        // A separate store instance sees the same data, like a restarted process.
        let reloaded = FilePinStore::new(&path).load(SlotCategory::SingleTask);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains(records.first().unwrap()));
        assert!(reloaded.contains(records.last().unwrap()));
    }

    #[test]
    fn save_is_additive() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePinStore::new(dir.path().join("pinned.toml"));

        store.save(
            SlotCategory::SingleTop,
            &[record(SlotCategory::SingleTop, 0, "pkg/A")],
        );
        store.save(
            SlotCategory::SingleTop,
            &[record(SlotCategory::SingleTop, 1, "pkg/B")],
        );

        assert_eq!(store.load(SlotCategory::SingleTop).len(), 2);
    }

    #[test]
    fn redundant_save_does_not_touch_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinned.toml");
        let store = FilePinStore::new(&path);

        let records = [record(SlotCategory::SingleInstance, 0, "pkg/Player")];
        store.save(SlotCategory::SingleInstance, &records);

        // Any rewrite re-renders the whole file and would lose this comment.
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("# sentinel\n");
        fs::write(&path, &contents).unwrap();

        // Saving a set that grows nothing must not write.
        store.save(SlotCategory::SingleInstance, &records);
        assert!(fs::read_to_string(&path).unwrap().contains("# sentinel"));

        // A genuinely larger set writes again.
        store.save(
            SlotCategory::SingleInstance,
            &[record(SlotCategory::SingleInstance, 1, "pkg/Recorder")],
        );
        assert!(!fs::read_to_string(&path).unwrap().contains("# sentinel"));
        assert_eq!(store.load(SlotCategory::SingleInstance).len(), 2);
    }

    #[test]
    fn categories_are_partitioned() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePinStore::new(dir.path().join("pinned.toml"));

        store.save(
            SlotCategory::SingleTop,
            &[record(SlotCategory::SingleTop, 0, "pkg/A")],
        );
        store.save(
            SlotCategory::SingleTask,
            &[record(SlotCategory::SingleTask, 0, "pkg/B")],
        );

        assert_eq!(store.load(SlotCategory::SingleTop).len(), 1);
        assert_eq!(store.load(SlotCategory::SingleTask).len(), 1);
        assert!(store.load(SlotCategory::SingleInstance).is_empty());
    }

    #[test]
    fn clear_removes_only_that_category() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePinStore::new(dir.path().join("pinned.toml"));

        store.save(
            SlotCategory::SingleTop,
            &[record(SlotCategory::SingleTop, 0, "pkg/A")],
        );
        store.save(
            SlotCategory::SingleTask,
            &[record(SlotCategory::SingleTask, 0, "pkg/B")],
        );

        store.clear(SlotCategory::SingleTop);

        assert!(store.load(SlotCategory::SingleTop).is_empty());
        assert_eq!(store.load(SlotCategory::SingleTask).len(), 1);
    }

    #[test]
    fn clear_all_removes_every_category() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilePinStore::new(dir.path().join("pinned.toml"));

        for category in SlotCategory::ALL {
            store.save(category, &[record(category, 0, "pkg/A")]);
        }

        store.clear_all();

        for category in SlotCategory::ALL {
            assert!(store.load(category).is_empty());
        }
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinned.toml");

        fs::write(&path, "not [valid toml").unwrap();
        let store = FilePinStore::new(&path);

        assert!(store.load(SlotCategory::SingleTop).is_empty());

        // The store stays usable: the next save replaces the corrupt contents.
        store.save(
            SlotCategory::SingleTop,
            &[record(SlotCategory::SingleTop, 0, "pkg/A")],
        );
        assert_eq!(store.load(SlotCategory::SingleTop).len(), 1);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pinned.toml");

        fs::write(
            &path,
            r#"single_task = ["single_task.0@pkg/Widget", "garbage", 7]
"#,
        )
        .unwrap();

        let loaded = FilePinStore::new(&path).load(SlotCategory::SingleTask);

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.first().unwrap().key().as_str(), "pkg/Widget");
    }

    #[test]
    fn unwritable_path_degrades_silently() {
        let dir = tempfile::tempdir().unwrap();

        // The parent directory does not exist, so every write fails.
        let store = FilePinStore::new(dir.path().join("missing").join("pinned.toml"));

        store.save(
            SlotCategory::SingleTop,
            &[record(SlotCategory::SingleTop, 0, "pkg/A")],
        );

        assert!(store.load(SlotCategory::SingleTop).is_empty());
    }

    #[test]
    fn memory_store_round_trip() {
        let store = MemoryPinStore::new();

        store.save(
            SlotCategory::SingleInstance,
            &[record(SlotCategory::SingleInstance, 2, "pkg/Player")],
        );

        let loaded = store.load(SlotCategory::SingleInstance);
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.first().unwrap().slot().index(), Some(2));

        store.clear(SlotCategory::SingleInstance);
        assert!(store.load(SlotCategory::SingleInstance).is_empty());
    }

    #[test]
    fn memory_store_clear_all_uses_per_category_clear() {
        let store = MemoryPinStore::new();

        for category in SlotCategory::ALL {
            store.save(category, &[record(category, 0, "pkg/A")]);
        }

        store.clear_all();

        for category in SlotCategory::ALL {
            assert!(store.load(category).is_empty());
        }
    }
}
