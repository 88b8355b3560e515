#![forbid(unsafe_code)]

//! Certificate revocation checking against a locally cached CRL.
//!
//! The bank publishes a single DER CRL. It is cached in one file, refreshed
//! at most once per [`RevocationConfig::max_age`], and consulted by serial
//! number. Refresh failures never fail a validation: a stale cache is used
//! when one exists, and without any cache the checker follows
//! [`RevocationConfig::fail_closed`].

pub mod checker;
pub mod config;
pub mod fetch;
pub mod store;

pub use checker::{RevocationCheck, RevocationChecker};
pub use config::RevocationConfig;
pub use fetch::{fetcher_for, CrlFetcher, FileCrlFetcher, HttpCrlFetcher};
pub use store::{CacheStore, CachedCrl, FileCacheStore, MemoryCacheStore};
