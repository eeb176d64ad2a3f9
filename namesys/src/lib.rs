//! Mutable name records: publishing, multi-router resolution and periodic
//! republishing, plus DNSLink domains resolved through the same path model.

mod local_store;
mod name_service;
mod progress;
mod record;
mod republish;
pub mod routing;
mod signer;

pub use local_store::LocalStore;
pub use name_service::{NameService, PublishOptions, ResolveOptions, Settings};
pub use progress::{NameSysEvent, ProgressSink};
pub use record::NameRecord;
pub use republish::{RepublishOptions, Republisher};
pub use routing::{Router, RoutingOptions};
pub use signer::RecordSigner;

use thiserror::Error;
use types::{Aborted, ParseError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("record not found{}", format_causes(.causes))]
    NotFound { causes: Vec<String> },
    #[error("record validation failed: {0}")]
    Validation(String),
    #[error("recursion limit exceeded")]
    RecursionLimit,
    #[error("routing error: {0}")]
    Transport(String),
    #[error("republish is already running")]
    AlreadyActive,
    #[error(transparent)]
    Malformed(#[from] ParseError),
    #[error(transparent)]
    DnsLink(dnslink::Error),
    #[error(transparent)]
    Datastore(#[from] anyhow::Error),
    #[error("operation aborted")]
    Aborted,
}

impl Error {
    pub(crate) fn not_found() -> Self {
        Error::NotFound { causes: vec![] }
    }
}

fn format_causes(causes: &[String]) -> String {
    if causes.is_empty() {
        String::new()
    } else {
        format!(": {}", causes.join("; "))
    }
}

impl From<Aborted> for Error {
    fn from(_: Aborted) -> Self {
        Error::Aborted
    }
}

impl From<dnslink::Error> for Error {
    fn from(e: dnslink::Error) -> Self {
        match e {
            dnslink::Error::RecursionLimit => Error::RecursionLimit,
            dnslink::Error::Aborted => Error::Aborted,
            e => Error::DnsLink(e),
        }
    }
}
