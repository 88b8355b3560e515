#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

/// CRL distribution point of the bank's web-service CA.
pub const DEFAULT_CRL_URL: &str = "http://wsk.op.fi/crl/ws/OP-Pohjola-ws.crl";

/// Where the cached CRL is kept, relative to the working directory.
pub const DEFAULT_CACHE_PATH: &str = "resources/OP-Pohjola-ws.crl";

/// Settings for [`RevocationChecker`](crate::RevocationChecker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationConfig {
    pub crl_url: String,
    pub cache_path: PathBuf,
    /// A cached CRL older than this is refreshed before use.
    pub max_age: Duration,
    /// Applies to the whole CRL download.
    pub fetch_timeout: Duration,
    /// When no CRL has ever been obtained: `false` treats every certificate
    /// as not revoked, `true` treats every certificate as revoked.
    pub fail_closed: bool,
}

impl Default for RevocationConfig {
    fn default() -> Self {
        Self {
            crl_url: DEFAULT_CRL_URL.to_owned(),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            max_age: Duration::from_secs(24 * 60 * 60),
            fetch_timeout: Duration::from_secs(30),
            fail_closed: false,
        }
    }
}
