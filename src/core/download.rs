use crate::models::error::SError;
use camino::Utf8Path;
use std::fs::{self, File};
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("spplice/", env!("CARGO_PKG_VERSION"));

/// The HTTP plumbing the installer and scripts download through.
pub trait Downloader: Send + Sync {
    /// Streams `url` into `destination`, replacing whatever is there.
    fn download_file(&self, url: &str, destination: &Utf8Path) -> Result<(), SError>;

    fn download_string(&self, url: &str) -> Result<String, SError>;
}

pub struct HttpDownloader {
    agent: ureq::Agent,
    attempts: u32,
}

impl Default for HttpDownloader {
    fn default() -> Self {
        Self::new(Duration::from_secs(300), Duration::from_secs(15))
    }
}

impl HttpDownloader {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Self {
        Self {
            agent: Self::build_agent(timeout, connect_timeout),
            attempts: 3,
        }
    }

    fn build_agent(timeout: Duration, connect_timeout: Duration) -> ureq::Agent {
        ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .user_agent(USER_AGENT)
            .redirects(8)
            .build()
    }

    fn fetch_to(&self, url: &str, destination: &Utf8Path) -> Result<(), SError> {
        let response = self.agent.get(url).call()?;

        // Written beside the target first so a broken transfer never leaves a truncated file.
        let partial = destination.with_extension("part");
        let result = (|| -> io::Result<()> {
            let mut file = File::create(&partial)?;
            io::copy(&mut response.into_reader(), &mut file)?;
            file.sync_all()?;
            drop(file);
            fs::rename(&partial, destination)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&partial);
        }
        result.map_err(Into::into)
    }
}

impl Downloader for HttpDownloader {
    fn download_file(&self, url: &str, destination: &Utf8Path) -> Result<(), SError> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut last_error = SError::Acquisition(format!("no attempt made for {url}"));
        for attempt in 1..=self.attempts {
            match self.fetch_to(url, destination) {
                Ok(()) => {
                    debug!(url, %destination, "Download complete");
                    return Ok(());
                }
                Err(e) => {
                    warn!(url, attempt, "Download failed: {e}");
                    last_error = e;
                }
            }
        }
        Err(SError::Acquisition(format!("{url}: {last_error}")))
    }

    fn download_string(&self, url: &str) -> Result<String, SError> {
        let response = self.agent.get(url).call()?;
        response.into_string().map_err(|e| SError::Acquisition(e.to_string()))
    }
}
