// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Memoization of parsed histories and patchsets.
//!
//! The cache collaborator only stores bytes; this module decides keys,
//! expiry and the serialized form. A value is built completely in memory
//! before it is stored, so a failed parse never leaves an entry behind.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use tracing::{debug, warn};

use crate::error::{VcError, VcResult};

/// Bump whenever the serialized shape of [`crate::FileHistory`] changes.
pub const HISTORY_FORMAT_VERSION: u32 = 3;
/// Bump whenever the serialized shape of [`crate::PatchsetLog`] changes.
pub const PATCHSET_FORMAT_VERSION: u32 = 3;

/// Subversion has no cheap per-path mtime, so entries simply expire.
pub const SVN_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Byte store used to memoize expensive parse results
#[cfg_attr(test, mockall::automock)]
pub trait VcCache: Send + Sync {
    /// Whether `key` was stored less than `max_age` ago.
    fn exists(&self, key: &str, max_age: Duration) -> bool;

    fn get(&self, key: &str) -> Option<Vec<u8>>;

    fn set(&self, key: &str, data: &[u8]) -> VcResult<()>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn file_history(sourceroot: &str, path: &str, quicklog: bool) -> Self {
        Self(format!(
            "{}_n{}_f{}_v{}",
            sourceroot,
            path,
            u8::from(quicklog),
            HISTORY_FORMAT_VERSION
        ))
    }

    pub fn patchsets(sourceroot: &str, path: &str) -> Self {
        Self(format!(
            "{}_n{}_f_v{}",
            sourceroot, path, PATCHSET_FORMAT_VERSION
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// How long a stored entry stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Valid as long as it was stored after the file's last modification
    UntilModified(SystemTime),
    Fixed(Duration),
}

impl CachePolicy {
    pub fn max_age(&self, now: SystemTime) -> Duration {
        match self {
            CachePolicy::UntilModified(mtime) => now.duration_since(*mtime).unwrap_or(Duration::ZERO),
            CachePolicy::Fixed(ttl) => *ttl,
        }
    }
}

/// Return the cached value for `key`, or build, store and return a fresh one.
pub fn load_or_build<T, F>(
    cache: Option<&dyn VcCache>,
    key: &CacheKey,
    policy: CachePolicy,
    build: F,
) -> VcResult<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> VcResult<T>,
{
    let Some(cache) = cache else {
        return build();
    };

    let max_age = policy.max_age(SystemTime::now());
    if cache.exists(key.as_str(), max_age) {
        if let Some(bytes) = cache.get(key.as_str()) {
            match serde_json::from_slice(&bytes) {
                Ok(value) => {
                    debug!(cache_key = %key.as_str(), "Cache hit");
                    return Ok(value);
                }
                Err(e) => {
                    warn!(cache_key = %key.as_str(), error = %e, "Discarding unreadable cache entry");
                }
            }
        }
    }

    debug!(cache_key = %key.as_str(), max_age_secs = max_age.as_secs(), "Cache miss");
    let value = build()?;
    let bytes = serde_json::to_vec(&value)?;
    match cache.set(key.as_str(), &bytes) {
        Ok(()) => debug!(cache_key = %key.as_str(), bytes = bytes.len(), "Stored cache entry"),
        Err(e) => warn!(cache_key = %key.as_str(), error = %e, "Failed to store cache entry"),
    }
    Ok(value)
}

/// Process-local cache
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (SystemTime, Vec<u8>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (SystemTime, Vec<u8>)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl VcCache for MemoryCache {
    fn exists(&self, key: &str, max_age: Duration) -> bool {
        let entries = self.lock();
        entries.get(key).is_some_and(|(stored, _)| {
            let age = SystemTime::now()
                .duration_since(*stored)
                .unwrap_or(Duration::ZERO);
            age < max_age
        })
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().get(key).map(|(_, data)| data.clone())
    }

    fn set(&self, key: &str, data: &[u8]) -> VcResult<()> {
        self.lock()
            .insert(key.to_string(), (SystemTime::now(), data.to_vec()));
        Ok(())
    }
}

/// One file per entry under a directory. Entry age is the file's mtime.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let digest = blake3::hash(key.as_bytes());
        self.dir.join(format!("{}.json", digest.to_hex()))
    }
}

impl VcCache for FileCache {
    fn exists(&self, key: &str, max_age: Duration) -> bool {
        let modified = match fs::metadata(self.path_for(key)).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(_) => return false,
        };
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        age < max_age
    }

    fn get(&self, key: &str) -> Option<Vec<u8>> {
        match fs::read(self.path_for(key)) {
            Ok(data) => Some(data),
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(cache_key = %key, error = %e, "Failed to read cache file");
                None
            }
        }
    }

    fn set(&self, key: &str, data: &[u8]) -> VcResult<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| VcError::Cache(format!("{}: {}", self.dir.display(), e)))?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(data)?;
        tmp.persist(self.path_for(key))
            .map_err(|e| VcError::Cache(e.to_string()))?;
        Ok(())
    }
}
