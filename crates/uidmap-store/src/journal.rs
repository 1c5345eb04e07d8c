use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::DurableStore;

/// A single mutation recorded in the journal.
///
/// On-disk framing:
/// ```text
/// [4 bytes: payload length (little-endian u32)]
/// [4 bytes: CRC32 of payload (little-endian u32)]
/// [N bytes: payload (bincode-serialized JournalRecord)]
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JournalRecord {
    Set { key: String, value: i64 },
    Remove { key: String },
}

/// Flush/sync strategy applied on `save`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// `fsync` after every save (safest, highest latency).
    #[default]
    EveryWrite,
    /// Rely on OS page-cache buffering (fastest, least durable).
    OsDefault,
}

/// Configuration for a [`JournalStore`].
#[derive(Clone, Debug, Default)]
pub struct JournalConfig {
    /// Sync strategy for `save` and `compact`.
    pub sync_mode: SyncMode,
    /// Rewrite the journal after `load` if it holds superseded records.
    pub compact_on_load: bool,
}

/// Header size: 4 bytes length + 4 bytes CRC.
const HEADER_SIZE: usize = 8;

#[derive(Default)]
struct JournalState {
    /// Current view of the store, including unsaved writes.
    entries: BTreeMap<String, i64>,
    /// Records written since the last successful save.
    pending: Vec<JournalRecord>,
    /// Number of complete records in the journal file.
    records_on_disk: usize,
}

/// Append-only journal file implementing [`DurableStore`].
///
/// Every `set`/`remove` is queued as a [`JournalRecord`]; `save` appends the
/// queue as CRC-framed entries and syncs. `load` replays the file front to
/// back: frames that fail the CRC check are skipped, and a torn tail left by a
/// crash is cut off so later appends stay reachable.
pub struct JournalStore {
    path: PathBuf,
    state: Mutex<JournalState>,
    config: JournalConfig,
}

impl JournalStore {
    /// Prepare a journal at `path`. Nothing is read until [`load`](DurableStore::load).
    pub fn open(path: &Path, config: JournalConfig) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path: path.to_path_buf(),
            state: Mutex::new(JournalState::default()),
            config,
        })
    }

    /// Path to the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of complete records currently in the journal file.
    pub fn records_on_disk(&self) -> usize {
        self.state.lock().records_on_disk
    }

    /// Number of writes waiting for the next `save`.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Rewrite the journal as one `Set` record per live key.
    ///
    /// The new journal is written to a temporary file next to the old one and
    /// renamed over it, so a crash mid-compaction leaves the old journal intact.
    /// Unsaved writes are folded in and become durable.
    pub fn compact(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        self.compact_locked(&mut state)
    }

    fn compact_locked(&self, state: &mut JournalState) -> StoreResult<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut buf = Vec::new();
        for (key, value) in &state.entries {
            encode_frame(
                &JournalRecord::Set {
                    key: key.clone(),
                    value: *value,
                },
                &mut buf,
            )?;
        }

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(&buf)?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;

        let before = state.records_on_disk;
        state.records_on_disk = state.entries.len();
        state.pending.clear();

        info!(
            path = %self.path.display(),
            before,
            after = state.records_on_disk,
            "journal compacted"
        );
        Ok(())
    }
}

impl std::fmt::Debug for JournalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("JournalStore")
            .field("path", &self.path)
            .field("entries", &state.entries.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl DurableStore for JournalStore {
    fn load(&self) -> StoreResult<()> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };

        let replay = replay(&data)?;
        let mut entries = BTreeMap::new();
        for record in &replay.records {
            match record {
                JournalRecord::Set { key, value } => {
                    entries.insert(key.clone(), *value);
                }
                JournalRecord::Remove { key } => {
                    entries.remove(key);
                }
            }
        }

        if replay.valid_len < data.len() {
            warn!(
                path = %self.path.display(),
                valid_len = replay.valid_len,
                file_len = data.len(),
                "truncating torn journal tail"
            );
            let file = OpenOptions::new().write(true).open(&self.path)?;
            file.set_len(replay.valid_len as u64)?;
            file.sync_all()?;
        }

        let mut state = self.state.lock();
        state.entries = entries;
        state.pending.clear();
        state.records_on_disk = replay.records.len();

        debug!(
            path = %self.path.display(),
            records = state.records_on_disk,
            keys = state.entries.len(),
            "journal loaded"
        );

        if self.config.compact_on_load && state.records_on_disk > state.entries.len() {
            self.compact_locked(&mut state)?;
        }
        Ok(())
    }

    fn get(&self, key: &str) -> StoreResult<Option<i64>> {
        Ok(self.state.lock().entries.get(key).copied())
    }

    fn set(&self, key: &str, value: i64) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.entries.insert(key.to_string(), value);
        state.pending.push(JournalRecord::Set {
            key: key.to_string(),
            value,
        });
        Ok(())
    }

    fn remove(&self, key: &str) -> StoreResult<bool> {
        let mut state = self.state.lock();
        let existed = state.entries.remove(key).is_some();
        if existed {
            state.pending.push(JournalRecord::Remove {
                key: key.to_string(),
            });
        }
        Ok(existed)
    }

    fn save(&self) -> StoreResult<()> {
        let mut state = self.state.lock();
        if state.pending.is_empty() {
            return Ok(());
        }

        let mut buf = Vec::new();
        for record in &state.pending {
            encode_frame(record, &mut buf)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let start_len = file.metadata()?.len();

        let written = file.write_all(&buf).and_then(|()| {
            file.flush()?;
            if matches!(self.config.sync_mode, SyncMode::EveryWrite) {
                file.sync_all()?;
            }
            Ok(())
        });
        if let Err(e) = written {
            // Drop the partial frame so the next append is not hidden behind it.
            if let Err(trunc) = file.set_len(start_len) {
                warn!(error = %trunc, "failed to roll back partial journal append");
            }
            return Err(e.into());
        }

        let appended = state.pending.len();
        state.records_on_disk += appended;
        state.pending.clear();

        debug!(offset = start_len, records = appended, bytes = buf.len(), "journal append");
        Ok(())
    }

    fn keys(&self) -> StoreResult<Vec<String>> {
        Ok(self.state.lock().entries.keys().cloned().collect())
    }

    fn entries(&self) -> StoreResult<Vec<(String, i64)>> {
        Ok(self
            .state
            .lock()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }
}

fn encode_frame(record: &JournalRecord, buf: &mut Vec<u8>) -> StoreResult<()> {
    let payload =
        bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))?;
    let length = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    buf.extend_from_slice(&length.to_le_bytes());
    buf.extend_from_slice(&crc.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(())
}

struct Replay {
    records: Vec<JournalRecord>,
    /// Length of the prefix made of complete frames.
    valid_len: usize,
}

/// Decode every frame in `data`.
///
/// A bad length is only treated as a torn tail when no intact frame follows
/// it; otherwise the journal is corrupt mid-file and nothing is truncated.
fn replay(data: &[u8]) -> StoreResult<Replay> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset + HEADER_SIZE <= data.len() {
        let header = &data[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let end = offset + HEADER_SIZE + length;
        if length == 0 || end > data.len() {
            if let Some(next) = next_intact_frame(data, offset + 1) {
                return Err(StoreError::Serialization(format!(
                    "corrupt journal frame at offset {offset} followed by an intact frame at offset {next}"
                )));
            }
            warn!(offset, length, file_len = data.len(), "invalid journal frame length; stopping replay");
            break;
        }

        let payload = &data[offset + HEADER_SIZE..end];
        let actual_crc = crc32fast::hash(payload);
        if actual_crc != expected_crc {
            warn!(
                offset,
                expected = expected_crc,
                actual = actual_crc,
                "CRC mismatch; skipping journal frame"
            );
            offset = end;
            continue;
        }

        match bincode::deserialize::<JournalRecord>(payload) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(offset, error = %e, "failed to decode journal frame; skipping");
            }
        }
        offset = end;
    }

    Ok(Replay {
        records,
        valid_len: offset,
    })
}

/// Offset of the first complete, CRC-valid, decodable frame at or after `from`.
fn next_intact_frame(data: &[u8], from: usize) -> Option<usize> {
    (from..(data.len() + 1).saturating_sub(HEADER_SIZE)).find(|&offset| {
        let header = &data[offset..offset + HEADER_SIZE];
        let length = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let expected_crc = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let end = offset + HEADER_SIZE + length;
        if length == 0 || end > data.len() {
            return false;
        }
        let payload = &data[offset + HEADER_SIZE..end];
        crc32fast::hash(payload) == expected_crc
            && bincode::deserialize::<JournalRecord>(payload).is_ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Seek, SeekFrom};

    fn open_store(path: &Path) -> JournalStore {
        let store = JournalStore::open(path, JournalConfig::default()).unwrap();
        store.load().unwrap();
        store
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("ids.journal"));
        assert!(store.keys().unwrap().is_empty());
        assert_eq!(store.records_on_disk(), 0);
    }

    #[test]
    fn open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/ids.journal");
        let store = open_store(&path);
        store.set("a", 1100).unwrap();
        store.save().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn saved_writes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");

        let store = open_store(&path);
        store.set("custom:block_x", 1025).unwrap();
        store.set("custom:ore", 1026).unwrap();
        assert_eq!(store.pending_len(), 2);
        store.save().unwrap();
        assert_eq!(store.pending_len(), 0);
        drop(store);

        let reopened = open_store(&path);
        assert_eq!(reopened.get("custom:block_x").unwrap(), Some(1025));
        assert_eq!(reopened.get("custom:ore").unwrap(), Some(1026));
        assert_eq!(reopened.records_on_disk(), 2);
    }

    #[test]
    fn unsaved_writes_are_lost() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");

        let store = open_store(&path);
        store.set("kept", 1100).unwrap();
        store.save().unwrap();
        store.set("lost", 1200).unwrap();
        drop(store);

        let reopened = open_store(&path);
        assert_eq!(reopened.keys().unwrap(), vec!["kept"]);
    }

    #[test]
    fn remove_is_replayed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");

        let store = open_store(&path);
        store.set("broken", -1).unwrap();
        store.set("fine", 2000).unwrap();
        store.save().unwrap();
        assert!(store.remove("broken").unwrap());
        assert!(!store.remove("never-there").unwrap());
        store.save().unwrap();
        drop(store);

        let reopened = open_store(&path);
        assert_eq!(reopened.get("broken").unwrap(), None);
        assert_eq!(reopened.get("fine").unwrap(), Some(2000));
        assert_eq!(reopened.records_on_disk(), 3);
    }

    #[test]
    fn crc_mismatch_skips_only_that_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");

        let store = open_store(&path);
        store.set("first", 1100).unwrap();
        store.save().unwrap();
        store.set("second", 1200).unwrap();
        store.save().unwrap();
        drop(store);

        // Flip the first payload byte of the first frame.
        {
            let mut file = OpenOptions::new().read(true).write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            let mut buf = [0u8; 1];
            file.read_exact(&mut buf).unwrap();
            buf[0] ^= 0xFF;
            file.seek(SeekFrom::Start(HEADER_SIZE as u64)).unwrap();
            file.write_all(&buf).unwrap();
            file.sync_all().unwrap();
        }

        let reopened = open_store(&path);
        assert_eq!(reopened.get("first").unwrap(), None);
        assert_eq!(reopened.get("second").unwrap(), Some(1200));
    }

    #[test]
    fn torn_tail_is_truncated_and_later_appends_survive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");

        let store = open_store(&path);
        store.set("first", 1100).unwrap();
        store.save().unwrap();
        store.set("second", 1200).unwrap();
        store.save().unwrap();
        drop(store);

        let full_len = fs::metadata(&path).unwrap().len();
        {
            let file = OpenOptions::new().write(true).open(&path).unwrap();
            file.set_len(full_len - 3).unwrap();
        }

        let store = open_store(&path);
        assert_eq!(store.get("first").unwrap(), Some(1100));
        assert_eq!(store.get("second").unwrap(), None);

        store.set("third", 1300).unwrap();
        store.save().unwrap();
        drop(store);

        let reopened = open_store(&path);
        assert_eq!(reopened.keys().unwrap(), vec!["first", "third"]);
    }

    #[test]
    fn bad_length_before_intact_frames_is_an_error_not_a_truncation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");

        let store = open_store(&path);
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            store.set(key, 1100 + i as i64).unwrap();
            store.save().unwrap();
        }
        drop(store);

        let full_len = fs::metadata(&path).unwrap().len();
        {
            let mut file = OpenOptions::new().write(true).open(&path).unwrap();
            file.seek(SeekFrom::Start(0)).unwrap();
            file.write_all(&[0xFF, 0xFF, 0x00, 0x00]).unwrap();
        }

        let store = JournalStore::open(&path, JournalConfig::default()).unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
        assert_eq!(fs::metadata(&path).unwrap().len(), full_len);
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn compaction_keeps_only_live_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");

        let store = open_store(&path);
        for round in 0..5 {
            store.set("churn", 1100 + round).unwrap();
            store.save().unwrap();
        }
        store.set("gone", 1500).unwrap();
        store.save().unwrap();
        store.remove("gone").unwrap();
        store.save().unwrap();
        assert_eq!(store.records_on_disk(), 7);

        let before = fs::metadata(&path).unwrap().len();
        store.compact().unwrap();
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before);
        assert_eq!(store.records_on_disk(), 1);

        // Appends after compaction land in the new file.
        store.set("fresh", 1600).unwrap();
        store.save().unwrap();
        drop(store);

        let reopened = open_store(&path);
        assert_eq!(
            reopened.entries().unwrap(),
            vec![("churn".to_string(), 1104), ("fresh".to_string(), 1600)]
        );
    }

    #[test]
    fn compact_on_load_rewrites_superseded_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");

        let store = open_store(&path);
        store.set("k", 1100).unwrap();
        store.save().unwrap();
        store.set("k", 1101).unwrap();
        store.save().unwrap();
        drop(store);

        let config = JournalConfig {
            compact_on_load: true,
            ..JournalConfig::default()
        };
        let store = JournalStore::open(&path, config).unwrap();
        store.load().unwrap();
        assert_eq!(store.records_on_disk(), 1);
        assert_eq!(store.get("k").unwrap(), Some(1101));
    }

    #[test]
    fn unreadable_medium_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the journal file should be.
        let path = dir.path().join("ids.journal");
        fs::create_dir(&path).unwrap();

        let store = JournalStore::open(&path, JournalConfig::default()).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Io(_))));
    }

    #[test]
    fn save_without_pending_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");
        let store = open_store(&path);
        store.save().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn os_default_sync_mode_still_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.journal");
        let config = JournalConfig {
            sync_mode: SyncMode::OsDefault,
            ..JournalConfig::default()
        };
        let store = JournalStore::open(&path, config).unwrap();
        store.load().unwrap();
        store.set("k", 4000).unwrap();
        store.save().unwrap();
        drop(store);

        assert_eq!(open_store(&path).get("k").unwrap(), Some(4000));
    }
}
