use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::warn;

/// Failures surfaced by the storage layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// WAL append or flush failed. Fatal for the operation; the in-memory
    /// state is left untouched.
    #[error("wal i/o failed: {0}")]
    WalIo(#[from] io::Error),

    /// Keys are tokenized by the first space in a WAL record, so they may not
    /// contain whitespace.
    #[error("key may not be empty or contain whitespace: {0:?}")]
    InvalidKey(String),

    /// A value containing a newline would not round-trip through the
    /// line-oriented WAL.
    #[error("value may not contain a newline")]
    InvalidValue,
}

/// Durable key-value store: an append-only log in front of an in-memory map.
///
/// The log format is one record per line, `PUT <key> <value>` (the value is
/// the remainder of the line and may contain spaces) or `DEL <key>`. Unknown
/// tags and malformed lines are skipped during recovery.
///
/// Lock order is WAL mutex before data lock; every record is flushed before
/// the corresponding map mutation becomes visible. The two steps are not
/// atomic with respect to crashes — the WAL is authoritative and the next
/// replay heals a crash between them.
pub struct WalStore {
    path: PathBuf,
    wal: Mutex<BufWriter<File>>,
    data: RwLock<HashMap<String, String>>,
    skipped_records: AtomicUsize,
}

enum WalRecord<'a> {
    Put { key: &'a str, value: &'a str },
    Del { key: &'a str },
}

fn parse_record(line: &str) -> Option<WalRecord<'_>> {
    let (tag, rest) = line.split_once(' ')?;
    match tag {
        "PUT" => {
            let (key, value) = rest.split_once(' ')?;
            if key.is_empty() {
                return None;
            }
            Some(WalRecord::Put { key, value })
        }
        "DEL" => {
            if rest.is_empty() || rest.contains(' ') {
                return None;
            }
            Some(WalRecord::Del { key: rest })
        }
        _ => None,
    }
}

fn validate_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() || key.chars().any(char::is_whitespace) {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

fn validate_value(value: &str) -> Result<(), StoreError> {
    if value.contains('\n') {
        return Err(StoreError::InvalidValue);
    }
    Ok(())
}

impl WalStore {
    /// Opens the store at `path`, replaying any existing log into memory and
    /// keeping the file open for appends afterwards.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut data = HashMap::new();
        let mut skipped = 0usize;

        match File::open(&path) {
            Ok(file) => {
                for line in BufReader::new(file).lines() {
                    match parse_record(&line?) {
                        Some(WalRecord::Put { key, value }) => {
                            data.insert(key.to_string(), value.to_string());
                        }
                        Some(WalRecord::Del { key }) => {
                            data.remove(key);
                        }
                        None => skipped += 1,
                    }
                }
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        if skipped > 0 {
            warn!(
                path = %path.display(),
                skipped,
                "skipped malformed records during wal replay"
            );
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            wal: Mutex::new(BufWriter::new(file)),
            data: RwLock::new(data),
            skipped_records: AtomicUsize::new(skipped),
        })
    }

    /// Stores `value` under `key`, logging the mutation first.
    pub fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_key(key)?;
        validate_value(value)?;
        {
            let mut wal = self.wal.lock();
            writeln!(wal, "PUT {key} {value}")?;
            wal.flush()?;
        }
        self.data.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Returns the stored value, or `None` if the key is absent. A stored
    /// empty string is a legitimate value and comes back as `Some("")`.
    pub fn get(&self, key: &str) -> Option<String> {
        self.data.read().get(key).cloned()
    }

    /// Deletes `key`, logging the tombstone first. Returns whether the key
    /// was present.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        validate_key(key)?;
        {
            let mut wal = self.wal.lock();
            writeln!(wal, "DEL {key}")?;
            wal.flush()?;
        }
        Ok(self.data.write().remove(key).is_some())
    }

    /// Stores a batch of entries: all records are written under a single WAL
    /// mutex acquisition and flushed once, then applied under a single write
    /// lock. A crash mid-batch may leave it partially applied; replay of what
    /// was durably logged heals the difference.
    pub fn put_batch(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        for (key, value) in entries {
            validate_key(key)?;
            validate_value(value)?;
        }
        {
            let mut wal = self.wal.lock();
            for (key, value) in entries {
                writeln!(wal, "PUT {key} {value}")?;
            }
            wal.flush()?;
        }
        let mut data = self.data.write();
        for (key, value) in entries {
            data.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    /// Deletes a batch of keys under a single WAL acquisition and a single
    /// flush. Returns how many keys were actually present.
    pub fn remove_batch(&self, keys: &[String]) -> Result<usize, StoreError> {
        for key in keys {
            validate_key(key)?;
        }
        {
            let mut wal = self.wal.lock();
            for key in keys {
                writeln!(wal, "DEL {key}")?;
            }
            wal.flush()?;
        }
        let mut data = self.data.write();
        Ok(keys.iter().filter(|key| data.remove(*key).is_some()).count())
    }

    /// Snapshot of all stored keys.
    pub fn all_keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    /// Snapshot copy of the full map.
    pub fn all_data(&self) -> HashMap<String, String> {
        self.data.read().clone()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when no key is stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Malformed lines encountered during the last replay.
    pub fn skipped_records(&self) -> usize {
        self.skipped_records.load(Ordering::Relaxed)
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
