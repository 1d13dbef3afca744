//! Where host records come from.
//!
//! The retrieval engine only needs [`HostSource::fetch`]. Sources handle
//! their own per-call retry/throttling; batch pacing is the engine's job.

pub mod directory;
#[cfg(feature = "shodan")]
pub mod shodan;

use thiserror::Error;

use crate::record::{HostIdentifier, HostRecord};

pub use directory::RecordDirectory;
#[cfg(feature = "shodan")]
pub use shodan::ShodanClient;

/// Why a single host could not be fetched. Never fatal to a batch.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("no information available for {0}")]
    NotFound(HostIdentifier),

    #[error("API error: {0}")]
    Api(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed host record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetches one host record per call.
pub trait HostSource: Send + Sync {
    fn fetch(&self, id: &HostIdentifier) -> Result<HostRecord, FetchError>;
}

impl<S: HostSource + ?Sized> HostSource for &S {
    fn fetch(&self, id: &HostIdentifier) -> Result<HostRecord, FetchError> {
        (**self).fetch(id)
    }
}

impl<S: HostSource + ?Sized> HostSource for Box<S> {
    fn fetch(&self, id: &HostIdentifier) -> Result<HostRecord, FetchError> {
        (**self).fetch(id)
    }
}
