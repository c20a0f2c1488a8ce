//! File-based log store for persistent storage.
//!
//! On-disk layout under the repository root:
//!
//! ```text
//! <repo>/
//! ├─ LOCK                      # Advisory lock for single-process access
//! └─ threads/
//!    └─ <hex thread key>/
//!       ├─ log.weft            # Length-prefixed record frames
//!       └─ METADATA            # Thread metadata blob
//! ```
//!
//! The LOCK file ensures only one process opens the repository at a time.
//! Metadata writes go through a temp file and rename so a crash mid-write
//! never leaves a torn METADATA file.

use crate::error::{StoreError, StoreResult};
use crate::store::LogStore;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Magic bytes at the start of every log file.
const LOG_MAGIC: [u8; 4] = *b"WFTL";
/// Magic bytes at the start of every metadata file.
const META_MAGIC: [u8; 4] = *b"WFTM";
/// Current on-disk format version.
const FORMAT_VERSION: u16 = 1;

const LOCK_FILE: &str = "LOCK";
const THREADS_DIR: &str = "threads";
const LOG_FILE: &str = "log.weft";
const META_FILE: &str = "METADATA";
const META_TEMP: &str = "METADATA.tmp";

/// Open state for one thread's files.
#[derive(Debug)]
struct ThreadFiles {
    dir: PathBuf,
    log: File,
    /// Byte offset of each record frame, in sequence order.
    offsets: Vec<u64>,
    /// Offset where the next frame will be written.
    end: u64,
}

/// A file-based log store.
///
/// Data survives process restarts. Every `append` and `put_metadata` is
/// synced to disk before returning, which is what gives the manager its
/// crash-consistency guarantee.
///
/// # Thread Safety
///
/// The store is thread-safe; operations on distinct threads proceed
/// independently (per-thread file locks), while the thread table itself is
/// guarded by a read-write lock.
#[derive(Debug)]
pub struct FileLogStore {
    root: PathBuf,
    threads: RwLock<HashMap<Vec<u8>, Mutex<ThreadFiles>>>,
    _lock_file: File,
}

impl FileLogStore {
    /// Opens or creates a log store at the given repository path.
    ///
    /// Existing threads are rediscovered by scanning the `threads/`
    /// directory and re-indexing each log file.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::RepoLocked`] if another process holds the
    /// repository lock, [`StoreError::Corrupted`] if a log file fails its
    /// header or framing checks, or an I/O error.
    pub fn open(path: &Path) -> StoreResult<Self> {
        fs::create_dir_all(path.join(THREADS_DIR))?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::RepoLocked);
        }

        let mut threads = HashMap::new();
        for entry in fs::read_dir(path.join(THREADS_DIR))? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let key = decode_hex(&name.to_string_lossy()).ok_or_else(|| {
                StoreError::Corrupted(format!("invalid thread directory name: {:?}", name))
            })?;
            let files = open_thread_dir(&entry.path())?;
            threads.insert(key, Mutex::new(files));
        }

        Ok(Self {
            root: path.to_path_buf(),
            threads: RwLock::new(threads),
            _lock_file: lock_file,
        })
    }

    /// Returns the repository root path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    fn thread_dir(&self, thread: &[u8]) -> PathBuf {
        self.root.join(THREADS_DIR).join(encode_hex(thread))
    }
}

impl LogStore for FileLogStore {
    fn register(&self, thread: &[u8]) -> StoreResult<()> {
        let mut threads = self.threads.write();
        if threads.contains_key(thread) {
            return Err(StoreError::ThreadExists);
        }

        let dir = self.thread_dir(thread);
        fs::create_dir_all(&dir)?;
        let mut log = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(dir.join(LOG_FILE))?;
        log.write_all(&LOG_MAGIC)?;
        log.write_all(&FORMAT_VERSION.to_le_bytes())?;
        log.sync_all()?;

        let end = (LOG_MAGIC.len() + 2) as u64;
        threads.insert(
            thread.to_vec(),
            Mutex::new(ThreadFiles {
                dir,
                log,
                offsets: Vec::new(),
                end,
            }),
        );
        Ok(())
    }

    fn contains(&self, thread: &[u8]) -> StoreResult<bool> {
        Ok(self.threads.read().contains_key(thread))
    }

    fn append(&self, thread: &[u8], record: &[u8]) -> StoreResult<u64> {
        let threads = self.threads.read();
        let slot = threads.get(thread).ok_or(StoreError::ThreadNotFound)?;
        let mut files = slot.lock();

        let offset = files.end;
        let len = u32::try_from(record.len())
            .map_err(|_| StoreError::Corrupted("record exceeds frame size limit".into()))?;

        files.log.seek(SeekFrom::Start(offset))?;
        files.log.write_all(&len.to_le_bytes())?;
        files.log.write_all(record)?;
        files.log.sync_data()?;

        let seq = files.offsets.len() as u64;
        files.offsets.push(offset);
        files.end = offset + 4 + u64::from(len);
        Ok(seq)
    }

    fn read_range(&self, thread: &[u8], start: u64, max: usize) -> StoreResult<Vec<Vec<u8>>> {
        let threads = self.threads.read();
        let slot = threads.get(thread).ok_or(StoreError::ThreadNotFound)?;
        let mut files = slot.lock();

        let total = files.offsets.len();
        let start = start.min(total as u64) as usize;
        let end = start.saturating_add(max).min(total);

        let mut records = Vec::with_capacity(end - start);
        for i in start..end {
            let offset = files.offsets[i];
            files.log.seek(SeekFrom::Start(offset))?;
            let mut len_buf = [0u8; 4];
            files.log.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as usize;
            let mut payload = vec![0u8; len];
            files.log.read_exact(&mut payload)?;
            records.push(payload);
        }
        Ok(records)
    }

    fn len(&self, thread: &[u8]) -> StoreResult<u64> {
        let threads = self.threads.read();
        let slot = threads.get(thread).ok_or(StoreError::ThreadNotFound)?;
        let count = slot.lock().offsets.len() as u64;
        Ok(count)
    }

    fn put_metadata(&self, thread: &[u8], metadata: &[u8]) -> StoreResult<()> {
        let threads = self.threads.read();
        let slot = threads.get(thread).ok_or(StoreError::ThreadNotFound)?;
        let files = slot.lock();

        // Write to a temp file, sync, then rename into place
        let temp_path = files.dir.join(META_TEMP);
        let mut temp = File::create(&temp_path)?;
        temp.write_all(&META_MAGIC)?;
        temp.write_all(&FORMAT_VERSION.to_le_bytes())?;
        temp.write_all(metadata)?;
        temp.sync_all()?;
        fs::rename(&temp_path, files.dir.join(META_FILE))?;
        Ok(())
    }

    fn get_metadata(&self, thread: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        let threads = self.threads.read();
        let slot = threads.get(thread).ok_or(StoreError::ThreadNotFound)?;
        let files = slot.lock();

        let meta_path = files.dir.join(META_FILE);
        if !meta_path.exists() {
            return Ok(None);
        }

        let data = fs::read(&meta_path)?;
        if data.len() < 6 || data[0..4] != META_MAGIC {
            return Err(StoreError::Corrupted("invalid metadata magic".into()));
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version > FORMAT_VERSION {
            return Err(StoreError::Corrupted(format!(
                "unsupported metadata version: {version}"
            )));
        }
        Ok(Some(data[6..].to_vec()))
    }

    fn delete(&self, thread: &[u8]) -> StoreResult<()> {
        let mut threads = self.threads.write();
        let slot = threads.remove(thread).ok_or(StoreError::ThreadNotFound)?;
        let dir = slot.into_inner().dir;
        fs::remove_dir_all(dir)?;
        Ok(())
    }

    fn threads(&self) -> StoreResult<Vec<Vec<u8>>> {
        Ok(self.threads.read().keys().cloned().collect())
    }

    fn flush(&self) -> StoreResult<()> {
        let threads = self.threads.read();
        for slot in threads.values() {
            slot.lock().log.sync_all()?;
        }
        Ok(())
    }
}

/// Opens and re-indexes an existing thread directory.
fn open_thread_dir(dir: &Path) -> StoreResult<ThreadFiles> {
    let mut log = OpenOptions::new()
        .read(true)
        .write(true)
        .open(dir.join(LOG_FILE))?;
    let size = log.metadata()?.len();

    let mut header = [0u8; 6];
    log.seek(SeekFrom::Start(0))?;
    log.read_exact(&mut header)?;
    if header[0..4] != LOG_MAGIC {
        return Err(StoreError::Corrupted("invalid log magic".into()));
    }
    let version = u16::from_le_bytes([header[4], header[5]]);
    if version > FORMAT_VERSION {
        return Err(StoreError::Corrupted(format!(
            "unsupported log version: {version}"
        )));
    }

    // Walk the frames to rebuild the sequence index
    let mut offsets = Vec::new();
    let mut pos = 6u64;
    while pos < size {
        if pos + 4 > size {
            return Err(StoreError::Corrupted("truncated frame header".into()));
        }
        log.seek(SeekFrom::Start(pos))?;
        let mut len_buf = [0u8; 4];
        log.read_exact(&mut len_buf)?;
        let len = u64::from(u32::from_le_bytes(len_buf));
        if pos + 4 + len > size {
            return Err(StoreError::Corrupted("truncated frame payload".into()));
        }
        offsets.push(pos);
        pos += 4 + len;
    }

    Ok(ThreadFiles {
        dir: dir.to_path_buf(),
        log,
        offsets,
        end: pos,
    })
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        s.push_str(&format!("{b:02x}"));
    }
    s
}

fn decode_hex(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn hex_roundtrip() {
        let key = vec![0x01, 0xab, 0xff, 0x00];
        assert_eq!(decode_hex(&encode_hex(&key)), Some(key));
        assert!(decode_hex("abc").is_none());
        assert!(decode_hex("zz").is_none());
    }

    #[test]
    fn register_append_read() {
        let temp = tempdir().unwrap();
        let store = FileLogStore::open(temp.path()).unwrap();

        store.register(b"t1").unwrap();
        assert_eq!(store.append(b"t1", b"first").unwrap(), 0);
        assert_eq!(store.append(b"t1", b"second").unwrap(), 1);

        let records = store.read_range(b"t1", 0, 10).unwrap();
        assert_eq!(records, vec![b"first".to_vec(), b"second".to_vec()]);
    }

    #[test]
    fn len_tracks_appends() {
        let temp = tempdir().unwrap();
        let store = FileLogStore::open(temp.path()).unwrap();
        store.register(b"t1").unwrap();

        assert_eq!(store.len(b"t1").unwrap(), 0);
        store.append(b"t1", b"a").unwrap();
        store.append(b"t1", b"b").unwrap();
        assert_eq!(store.len(b"t1").unwrap(), 2);
    }

    #[test]
    fn survives_reopen() {
        let temp = tempdir().unwrap();

        {
            let store = FileLogStore::open(temp.path()).unwrap();
            store.register(b"t1").unwrap();
            store.append(b"t1", b"persisted").unwrap();
            store.put_metadata(b"t1", b"meta-blob").unwrap();
        }

        let store = FileLogStore::open(temp.path()).unwrap();
        assert!(store.contains(b"t1").unwrap());
        assert_eq!(store.len(b"t1").unwrap(), 1);
        assert_eq!(
            store.read_range(b"t1", 0, 10).unwrap(),
            vec![b"persisted".to_vec()]
        );
        assert_eq!(
            store.get_metadata(b"t1").unwrap(),
            Some(b"meta-blob".to_vec())
        );
    }

    #[test]
    fn delete_is_permanent() {
        let temp = tempdir().unwrap();

        {
            let store = FileLogStore::open(temp.path()).unwrap();
            store.register(b"t1").unwrap();
            store.append(b"t1", b"doomed").unwrap();
            store.delete(b"t1").unwrap();
            assert!(!store.contains(b"t1").unwrap());
        }

        // Deletion holds across restarts too
        let store = FileLogStore::open(temp.path()).unwrap();
        assert!(!store.contains(b"t1").unwrap());
        assert!(matches!(
            store.read_range(b"t1", 0, 1),
            Err(StoreError::ThreadNotFound)
        ));
    }

    #[test]
    fn second_open_rejected_while_locked() {
        let temp = tempdir().unwrap();
        let _store = FileLogStore::open(temp.path()).unwrap();

        assert!(matches!(
            FileLogStore::open(temp.path()),
            Err(StoreError::RepoLocked)
        ));
    }

    #[test]
    fn metadata_overwrite() {
        let temp = tempdir().unwrap();
        let store = FileLogStore::open(temp.path()).unwrap();
        store.register(b"t1").unwrap();

        store.put_metadata(b"t1", b"one").unwrap();
        store.put_metadata(b"t1", b"two").unwrap();
        assert_eq!(store.get_metadata(b"t1").unwrap(), Some(b"two".to_vec()));
    }

    #[test]
    fn corrupt_log_magic_detected() {
        let temp = tempdir().unwrap();
        {
            let store = FileLogStore::open(temp.path()).unwrap();
            store.register(b"t1").unwrap();
        }

        let log_path = temp
            .path()
            .join(THREADS_DIR)
            .join(encode_hex(b"t1"))
            .join(LOG_FILE);
        fs::write(&log_path, b"XXXXXX").unwrap();

        assert!(matches!(
            FileLogStore::open(temp.path()),
            Err(StoreError::Corrupted(_))
        ));
    }
}
