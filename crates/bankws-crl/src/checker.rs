#![forbid(unsafe_code)]

//! RevocationChecker: serial-number lookup in the cached CRL.

use crate::config::RevocationConfig;
use crate::fetch::{self, CrlFetcher};
use crate::store::{CacheStore, FileCacheStore};
use bankws_core::Error;
use der::Decode;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;
use x509_cert::crl::CertificateList;
use x509_cert::Certificate;

/// Answers whether a certificate has been revoked.
pub trait RevocationCheck: Send + Sync {
    fn is_revoked(&self, certificate_der: &[u8]) -> Result<bool, Error>;
}

pub struct RevocationChecker<S = FileCacheStore, F = Box<dyn CrlFetcher>> {
    store: S,
    fetcher: F,
    config: RevocationConfig,
    refresh: Mutex<()>,
}

impl RevocationChecker {
    /// File cache at `config.cache_path`, fetching from `config.crl_url`
    /// (HTTP, or a local `file://` path).
    pub fn from_config(config: RevocationConfig) -> Self {
        let store = FileCacheStore::new(config.cache_path.clone());
        let fetcher = fetch::fetcher_for(&config.crl_url, config.fetch_timeout);
        Self::new(store, fetcher, config)
    }
}

impl<S: CacheStore, F: CrlFetcher> RevocationChecker<S, F> {
    pub fn new(store: S, fetcher: F, config: RevocationConfig) -> Self {
        Self {
            store,
            fetcher,
            config,
            refresh: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RevocationConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The CRL to check against, refreshed first when the cache is missing
    /// or older than `max_age`. `None` means no CRL has ever been obtained.
    pub fn current_crl(&self) -> Result<Option<Vec<u8>>, Error> {
        let _guard = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.cache_lock();

        let cached = self.store.load().unwrap_or_else(|e| {
            log::warn!("ignoring unreadable CRL cache: {e}");
            None
        });
        if let Some(c) = &cached {
            if c.is_fresh(SystemTime::now(), self.config.max_age) {
                log::debug!("using cached CRL ({}s old)", c.age(SystemTime::now()).as_secs());
                return Ok(Some(c.der.clone()));
            }
        }

        match self.refresh_locked() {
            Ok(der) => Ok(Some(der)),
            Err(e) => match cached {
                Some(c) => {
                    log::warn!(
                        "CRL refresh from {} failed ({e}); using cached CRL from {}s ago",
                        self.fetcher.source(),
                        c.age(SystemTime::now()).as_secs()
                    );
                    Ok(Some(c.der))
                }
                None => {
                    log::error!(
                        "CRL refresh from {} failed ({e}) and no cached CRL exists",
                        self.fetcher.source()
                    );
                    Ok(None)
                }
            },
        }
    }

    /// Fetch and cache a new CRL regardless of the cache's age.
    pub fn force_refresh(&self) -> Result<Vec<u8>, Error> {
        let _guard = self.refresh.lock().unwrap_or_else(PoisonError::into_inner);
        let _lock = self.store.lock()?;
        self.refresh_locked()
    }

    fn refresh_locked(&self) -> Result<Vec<u8>, Error> {
        let der = self.fetcher.fetch()?;
        let crl = parse_crl(&der)?;
        if let Err(e) = self.store.store(&der) {
            log::warn!("could not update CRL cache: {e}");
        }
        log::info!(
            "refreshed CRL from {} ({} revoked certificates)",
            self.fetcher.source(),
            revoked_count(&crl)
        );
        Ok(der)
    }

    /// A lock failure only loses cross-process exclusion; the check goes on.
    fn cache_lock(&self) -> Option<crate::store::CacheLock> {
        match self.store.lock() {
            Ok(lock) => Some(lock),
            Err(e) => {
                log::warn!("proceeding without CRL cache lock: {e}");
                None
            }
        }
    }
}

impl<S: CacheStore, F: CrlFetcher> RevocationCheck for RevocationChecker<S, F> {
    fn is_revoked(&self, certificate_der: &[u8]) -> Result<bool, Error> {
        let cert = Certificate::from_der(certificate_der)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        let serial = &cert.tbs_certificate.serial_number;

        let Some(crl_der) = self.current_crl()? else {
            if self.config.fail_closed {
                log::error!(
                    "no CRL available; treating certificate {} as revoked",
                    hex(serial.as_bytes())
                );
                return Ok(true);
            }
            log::error!(
                "no CRL available; treating certificate {} as NOT revoked",
                hex(serial.as_bytes())
            );
            return Ok(false);
        };

        let crl = parse_crl(&crl_der)?;
        let revoked = crl
            .tbs_cert_list
            .revoked_certificates
            .iter()
            .flatten()
            .any(|entry| entry.serial_number == *serial);
        if revoked {
            log::warn!("certificate {} is on the CRL", hex(serial.as_bytes()));
        }
        Ok(revoked)
    }
}

fn parse_crl(der: &[u8]) -> Result<CertificateList, Error> {
    CertificateList::from_der(der).map_err(|e| Error::Crl(format!("failed to parse CRL: {e}")))
}

fn revoked_count(crl: &CertificateList) -> usize {
    crl.tbs_cert_list
        .revoked_certificates
        .as_ref()
        .map_or(0, Vec::len)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryCacheStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const REVOKED_CRL: &[u8] = include_bytes!("../../../test-data/crl/revoked.crl");
    const EMPTY_CRL: &[u8] = include_bytes!("../../../test-data/crl/empty.crl");
    const SIGNER: &[u8] = include_bytes!("../../../test-data/certs/signer.der");
    const OTHER: &[u8] = include_bytes!("../../../test-data/certs/other.der");

    /// Serves a fixed response and counts calls.
    struct ScriptedFetcher {
        response: Option<&'static [u8]>,
        calls: AtomicUsize,
    }

    impl ScriptedFetcher {
        fn serving(crl: &'static [u8]) -> Self {
            Self {
                response: Some(crl),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CrlFetcher for ScriptedFetcher {
        fn fetch(&self) -> Result<Vec<u8>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.response
                .map(<[u8]>::to_vec)
                .ok_or_else(|| Error::Network("timed out".into()))
        }

        fn source(&self) -> String {
            "scripted".into()
        }
    }

    fn days_ago(days: u64) -> SystemTime {
        SystemTime::now() - Duration::from_secs(days * 86_400)
    }

    #[test]
    fn test_revoked_serial_found() {
        let checker = RevocationChecker::new(
            MemoryCacheStore::new(),
            ScriptedFetcher::serving(REVOKED_CRL),
            RevocationConfig::default(),
        );
        assert!(checker.is_revoked(SIGNER).unwrap());
        assert!(!checker.is_revoked(OTHER).unwrap());
    }

    #[test]
    fn test_fresh_cache_is_not_refetched() {
        let checker = RevocationChecker::new(
            MemoryCacheStore::with_crl(EMPTY_CRL.to_vec(), SystemTime::now()),
            ScriptedFetcher::serving(REVOKED_CRL),
            RevocationConfig::default(),
        );
        assert!(!checker.is_revoked(SIGNER).unwrap());
        assert_eq!(checker.fetcher.calls(), 0);
    }

    #[test]
    fn test_stale_cache_is_refreshed_and_stored() {
        let checker = RevocationChecker::new(
            MemoryCacheStore::with_crl(EMPTY_CRL.to_vec(), days_ago(2)),
            ScriptedFetcher::serving(REVOKED_CRL),
            RevocationConfig::default(),
        );
        assert!(checker.is_revoked(SIGNER).unwrap());
        assert_eq!(checker.fetcher.calls(), 1);
        assert_eq!(checker.store().snapshot().unwrap().der, REVOKED_CRL);

        // Now fresh: no second download.
        assert!(checker.is_revoked(SIGNER).unwrap());
        assert_eq!(checker.fetcher.calls(), 1);
    }

    #[test]
    fn test_refresh_failure_falls_back_to_stale_cache() {
        let checker = RevocationChecker::new(
            MemoryCacheStore::with_crl(REVOKED_CRL.to_vec(), days_ago(5)),
            ScriptedFetcher::failing(),
            RevocationConfig::default(),
        );
        assert!(checker.is_revoked(SIGNER).unwrap());
        assert_eq!(checker.fetcher.calls(), 1);
    }

    #[test]
    fn test_no_crl_ever_obtained_follows_policy() {
        let open = RevocationChecker::new(
            MemoryCacheStore::new(),
            ScriptedFetcher::failing(),
            RevocationConfig::default(),
        );
        assert!(!open.is_revoked(SIGNER).unwrap());

        let closed = RevocationChecker::new(
            MemoryCacheStore::new(),
            ScriptedFetcher::failing(),
            RevocationConfig {
                fail_closed: true,
                ..RevocationConfig::default()
            },
        );
        assert!(closed.is_revoked(SIGNER).unwrap());
    }

    #[test]
    fn test_garbage_download_is_not_cached() {
        static HTML: &[u8] = b"<html>maintenance</html>";
        let checker = RevocationChecker::new(
            MemoryCacheStore::with_crl(REVOKED_CRL.to_vec(), days_ago(3)),
            ScriptedFetcher::serving(HTML),
            RevocationConfig::default(),
        );
        assert!(checker.is_revoked(SIGNER).unwrap());
        assert_eq!(checker.store().snapshot().unwrap().der, REVOKED_CRL);
        assert!(checker.force_refresh().is_err());
    }

    #[test]
    fn test_unparsable_certificate_is_error() {
        let checker = RevocationChecker::new(
            MemoryCacheStore::new(),
            ScriptedFetcher::serving(EMPTY_CRL),
            RevocationConfig::default(),
        );
        assert!(matches!(checker.is_revoked(b"nope"), Err(Error::Certificate(_))));
    }

    #[test]
    fn test_file_cache_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let config = RevocationConfig {
            cache_path: dir.path().join("resources/bank.crl"),
            ..RevocationConfig::default()
        };
        let checker = RevocationChecker::new(
            FileCacheStore::new(config.cache_path.clone()),
            ScriptedFetcher::serving(REVOKED_CRL),
            config,
        );
        assert!(checker.is_revoked(SIGNER).unwrap());
        assert_eq!(std::fs::read(dir.path().join("resources/bank.crl")).unwrap(), REVOKED_CRL);
    }
}
