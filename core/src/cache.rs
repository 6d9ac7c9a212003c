//! Two-tier store for reference lists.
//!
//! # Design
//! Each reference list name owns one slot: a mutex around the in-memory
//! record. Every operation on a name runs under that slot's lock, so
//! operations on one name are serialized while different names never wait on
//! each other. Within the lock the disk tier is always written first and the
//! memory tier only after the write succeeded, which keeps memory from ever
//! holding a value the disk does not.
//!
//! Disk writes go to a temporary file in the cache directory and are renamed
//! over the target, so a crash leaves either the old file or the new one.
//! Store writes use a per-process temp name, which the slot lock keeps
//! exclusive; `export` targets arbitrary paths outside any slot and uses a
//! uniquely named temp file instead.
//! Concurrent writers from several processes are not coordinated: two
//! processes sharing a cache directory each write whole files and the last
//! rename wins.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Deserialize;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::CacheError;
use crate::types::{CacheRecord, ReferenceListName};

pub const CACHE_FILE_EXTENSION: &str = "json";

/// File contents accepted when reading the disk tier.
#[derive(Deserialize)]
#[serde(untagged)]
enum DiskRecord {
    Record(CacheRecord),
    /// A bare list, as written by `export` and by older tooling.
    Entries(Vec<String>),
}

#[derive(Debug)]
pub struct CacheStore {
    dir: PathBuf,
    slots: [Mutex<Option<CacheRecord>>; 3],
}

impl CacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            slots: Default::default(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic disk location of a reference list.
    pub fn path_for(&self, name: ReferenceListName) -> PathBuf {
        self.dir.join(format!("{name}.{CACHE_FILE_EXTENSION}"))
    }

    /// Memory first, then disk. A disk hit is promoted into memory.
    ///
    /// A record in neither tier is `Ok(None)`. Unreadable or malformed files
    /// are errors.
    pub fn get(&self, name: ReferenceListName) -> Result<Option<CacheRecord>, CacheError> {
        let mut slot = self.lock(name);
        if let Some(record) = slot.as_ref() {
            debug!(%name, "reference cache hit (memory)");
            return Ok(Some(record.clone()));
        }

        let path = self.path_for(name);
        let Some(record) = read_record(&path, name)? else {
            debug!(%name, "reference cache miss");
            return Ok(None);
        };
        debug!(%name, path = %path.display(), "reference cache hit (disk), promoting");
        *slot = Some(record.clone());
        Ok(Some(record))
    }

    /// Persist `entries` and then make them visible in memory.
    ///
    /// On failure nothing changes: memory keeps its previous value and the
    /// previous file, if any, is untouched.
    pub fn put(&self, name: ReferenceListName, entries: Vec<String>) -> Result<CacheRecord, CacheError> {
        let record = CacheRecord {
            name,
            fetched_at_ms: now_ms(),
            entries,
        };
        let bytes = serde_json::to_vec_pretty(&record).map_err(|e| CacheError::Serialization {
            name,
            message: e.to_string(),
        })?;

        let mut slot = self.lock(name);
        let path = self.path_for(name);
        write_atomic(&path, &bytes)?;
        *slot = Some(record.clone());
        info!(%name, entries = record.entries.len(), path = %path.display(), "reference list cached");
        Ok(record)
    }

    /// Drop the record from both tiers. Absent records are not an error.
    pub fn invalidate(&self, name: ReferenceListName) -> Result<(), CacheError> {
        let mut slot = self.lock(name);
        let path = self.path_for(name);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::io(path, e)),
        }
        *slot = None;
        debug!(%name, "reference cache invalidated");
        Ok(())
    }

    /// Read a reference list from an arbitrary file, bypassing the store.
    pub fn load_from_path(&self, path: impl AsRef<Path>) -> Result<Vec<String>, CacheError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| CacheError::io(path, e))?;
        match decode(path, &bytes)? {
            DiskRecord::Record(record) => Ok(record.entries),
            DiskRecord::Entries(entries) => Ok(entries),
        }
    }

    /// Write the cached entries for `name` to `path` as a bare JSON list.
    pub fn export(&self, name: ReferenceListName, path: impl AsRef<Path>) -> Result<(), CacheError> {
        let record = self.get(name)?.ok_or(CacheError::NotCached(name))?;
        let bytes = serde_json::to_vec_pretty(&record.entries).map_err(|e| CacheError::Serialization {
            name,
            message: e.to_string(),
        })?;
        write_detached(path.as_ref(), &bytes)
    }

    /// Memory tier only. Never touches disk.
    pub fn memory(&self, name: ReferenceListName) -> Option<CacheRecord> {
        self.lock(name).clone()
    }

    pub fn is_in_memory(&self, name: ReferenceListName) -> bool {
        self.lock(name).is_some()
    }

    pub(crate) fn lock(&self, name: ReferenceListName) -> MutexGuard<'_, Option<CacheRecord>> {
        // A slot only ever holds a complete record, so a poisoned lock is still usable.
        self.slots[name.index()]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn read_record(path: &Path, name: ReferenceListName) -> Result<Option<CacheRecord>, CacheError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(CacheError::io(path, e)),
    };
    let record = match decode(path, &bytes)? {
        DiskRecord::Record(record) => record,
        DiskRecord::Entries(entries) => CacheRecord {
            name,
            fetched_at_ms: modified_ms(path),
            entries,
        },
    };
    if record.name != name {
        return Err(CacheError::Malformed {
            path: path.to_path_buf(),
            message: format!("holds {} instead of {name}", record.name),
        });
    }
    Ok(Some(record))
}

fn decode(path: &Path, bytes: &[u8]) -> Result<DiskRecord, CacheError> {
    serde_json::from_slice(bytes).map_err(|e| CacheError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn modified_ms(path: &Path) -> u64 {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .ok()
        .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Temporary sibling used while replacing `path`.
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()))
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
}

fn sync_dir(dir: &Path) {
    if let Ok(dir) = File::open(dir) {
        let _ = dir.sync_all();
    }
}

/// Replace `path` via `temp_path`. Callers must hold the slot lock for it.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

    let tmp = temp_path(path);
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(CacheError::io(path, e));
    }
    sync_dir(parent);
    Ok(())
}

/// Replace `path` through a uniquely named temp file; safe without a lock.
fn write_detached(path: &Path, bytes: &[u8]) -> Result<(), CacheError> {
    let parent = parent_dir(path);
    fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| CacheError::io(parent, e))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| CacheError::io(path, e))?;
    tmp.persist(path).map_err(|e| CacheError::io(path, e.error))?;
    sync_dir(parent);
    Ok(())
}
