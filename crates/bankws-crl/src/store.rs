#![forbid(unsafe_code)]

//! Where the cached CRL lives.
//!
//! The cache is process-wide shared state, so it sits behind [`CacheStore`]:
//! production uses [`FileCacheStore`], tests use [`MemoryCacheStore`].

use bankws_core::Error;
use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime};

/// CRL bytes plus the time they were written to the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedCrl {
    pub der: Vec<u8>,
    pub modified: SystemTime,
}

impl CachedCrl {
    /// Age at `now`. A modification time in the future counts as age zero.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.modified).unwrap_or(Duration::ZERO)
    }

    pub fn is_fresh(&self, now: SystemTime, max_age: Duration) -> bool {
        self.age(now) < max_age
    }
}

/// Held for the duration of a refresh; released on drop.
pub struct CacheLock {
    file: Option<File>,
}

impl CacheLock {
    /// A lock that excludes nothing, for stores without cross-process state.
    pub fn none() -> Self {
        Self { file: None }
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        if let Some(file) = &self.file {
            if let Err(e) = file.unlock() {
                log::warn!("failed to release CRL cache lock: {e}");
            }
        }
    }
}

/// Storage for the cached CRL.
pub trait CacheStore: Send + Sync {
    fn load(&self) -> Result<Option<CachedCrl>, Error>;
    fn store(&self, der: &[u8]) -> Result<(), Error>;

    /// Exclude other refreshers of the same cache.
    fn lock(&self) -> Result<CacheLock, Error> {
        Ok(CacheLock::none())
    }
}

/// A CRL cache file. Its modification time is the freshness signal.
#[derive(Debug, Clone)]
pub struct FileCacheStore {
    path: PathBuf,
}

impl FileCacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent(&self) -> Result<(), Error> {
        match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => std::fs::create_dir_all(dir)
                .map_err(|e| Error::Crl(format!("creating {}: {e}", dir.display()))),
            _ => Ok(()),
        }
    }
}

impl CacheStore for FileCacheStore {
    fn load(&self) -> Result<Option<CachedCrl>, Error> {
        let metadata = match std::fs::metadata(&self.path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Crl(format!("{}: {e}", self.path.display()))),
        };
        let modified = metadata.modified()?;
        let der = std::fs::read(&self.path)
            .map_err(|e| Error::Crl(format!("{}: {e}", self.path.display())))?;
        Ok(Some(CachedCrl { der, modified }))
    }

    /// Write to a sibling temporary file and rename it over the cache so
    /// readers never observe a partial CRL.
    fn store(&self, der: &[u8]) -> Result<(), Error> {
        self.ensure_parent()?;
        let tmp = self.path.with_extension("crl.tmp");
        std::fs::write(&tmp, der)
            .map_err(|e| Error::Crl(format!("writing {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Crl(format!("replacing {}: {e}", self.path.display())))
    }

    fn lock(&self) -> Result<CacheLock, Error> {
        self.ensure_parent()?;
        let lock_path = self.path.with_extension("lock");
        let file = File::create(&lock_path)
            .map_err(|e| Error::Crl(format!("creating {}: {e}", lock_path.display())))?;
        file.lock_exclusive()
            .map_err(|e| Error::Crl(format!("locking {}: {e}", lock_path.display())))?;
        Ok(CacheLock { file: Some(file) })
    }
}

/// An in-memory cache.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: Mutex<Option<CachedCrl>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `der` cached as of `modified`.
    pub fn with_crl(der: Vec<u8>, modified: SystemTime) -> Self {
        Self {
            inner: Mutex::new(Some(CachedCrl { der, modified })),
        }
    }

    pub fn snapshot(&self) -> Option<CachedCrl> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self) -> Result<Option<CachedCrl>, Error> {
        Ok(self.snapshot())
    }

    fn store(&self, der: &[u8]) -> Result<(), Error> {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = Some(CachedCrl {
            der: der.to_vec(),
            modified: SystemTime::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_freshness() {
        let now = SystemTime::now();
        let day = Duration::from_secs(86_400);
        let cached = CachedCrl {
            der: vec![],
            modified: now - Duration::from_secs(3600),
        };
        assert!(cached.is_fresh(now, day));
        assert!(!cached.is_fresh(now + day, day));
        let future = CachedCrl {
            der: vec![],
            modified: now + day,
        };
        assert_eq!(future.age(now), Duration::ZERO);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path().join("resources").join("bank.crl"));
        assert_eq!(store.load().unwrap(), None);

        {
            let _lock = store.lock().unwrap();
            store.store(b"first").unwrap();
            store.store(b"second").unwrap();
        }
        let cached = store.load().unwrap().unwrap();
        assert_eq!(cached.der, b"second");
        assert!(cached.is_fresh(SystemTime::now(), Duration::from_secs(60)));
        assert!(!dir.path().join("resources").join("bank.crl.tmp").exists());
        assert!(dir.path().join("resources").join("bank.lock").exists());
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryCacheStore::new();
        assert!(store.load().unwrap().is_none());
        store.store(b"crl").unwrap();
        assert_eq!(store.snapshot().unwrap().der, b"crl");
    }
}
