#![forbid(unsafe_code)]

//! Obtaining a fresh CRL.

use bankws_core::Error;
use std::path::PathBuf;
use std::time::Duration;

/// Source of fresh CRL bytes.
pub trait CrlFetcher: Send + Sync {
    fn fetch(&self) -> Result<Vec<u8>, Error>;

    /// Where the CRL comes from, for log messages.
    fn source(&self) -> String;
}

impl<T: CrlFetcher + ?Sized> CrlFetcher for Box<T> {
    fn fetch(&self) -> Result<Vec<u8>, Error> {
        (**self).fetch()
    }

    fn source(&self) -> String {
        (**self).source()
    }
}

/// Downloads the CRL over HTTP with a single overall timeout.
#[derive(Debug, Clone)]
pub struct HttpCrlFetcher {
    url: String,
    timeout: Duration,
    user_agent: String,
}

impl HttpCrlFetcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            user_agent: format!("bankws/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl CrlFetcher for HttpCrlFetcher {
    fn fetch(&self) -> Result<Vec<u8>, Error> {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(self.timeout))
            .build();
        let agent = ureq::Agent::new_with_config(config);

        let response = agent
            .get(&self.url)
            .header("User-Agent", &self.user_agent)
            .call()
            .map_err(|e| Error::Network(format!("GET {} failed: {e}", self.url)))?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(Error::Network(format!("GET {} returned HTTP {status}", self.url)));
        }

        response
            .into_body()
            .read_to_vec()
            .map_err(|e| Error::Network(format!("reading CRL from {}: {e}", self.url)))
    }

    fn source(&self) -> String {
        self.url.clone()
    }
}

/// Reads the CRL from a local file, for hosts that receive it out of band.
#[derive(Debug, Clone)]
pub struct FileCrlFetcher {
    path: PathBuf,
}

impl FileCrlFetcher {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CrlFetcher for FileCrlFetcher {
    fn fetch(&self) -> Result<Vec<u8>, Error> {
        std::fs::read(&self.path)
            .map_err(|e| Error::Crl(format!("{}: {e}", self.path.display())))
    }

    fn source(&self) -> String {
        self.path.display().to_string()
    }
}

/// Pick a fetcher for `location`: `file://` paths are read locally,
/// anything else is fetched over HTTP.
pub fn fetcher_for(location: &str, timeout: Duration) -> Box<dyn CrlFetcher> {
    match location.strip_prefix("file://") {
        Some(path) => Box::new(FileCrlFetcher::new(path)),
        None => Box::new(HttpCrlFetcher::new(location, timeout)),
    }
}
