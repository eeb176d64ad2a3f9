//! DNSLink resolution: turns a domain into the `/ipfs/...` or `/ipns/...` path
//! published in its `dnslink=` TXT record.

mod answer;
mod queue;
mod recursive;
pub mod resolver;
mod tlru;

pub use answer::{dnslink_value, find_dnslink_answer, DnsAnswer};
pub use queue::{Permit, TaskQueue};
pub use recursive::{resolve_dnslink, DnsLink, MAX_RECURSIVE_DEPTH};
pub use resolver::{
    resolver_from_config, DnsJsonOverHttpsResolver, DnsOverHttpsResolver, DnsResolver,
    QueuedResolver, ResolverSettings, SystemResolver, TxtTransport,
};

use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use types::{AbortSignal, Aborted};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("domain not found: {domain}")]
    NotFound { domain: String },
    #[error("no dnslink records found for domain: {domain}")]
    DnsLinkNotFound { domain: String },
    #[error("no TXT data for domain: {domain}")]
    NoData { domain: String },
    #[error("recursion limit exceeded")]
    RecursionLimit,
    #[error("dns transport error: {0}")]
    Transport(String),
    #[error("unexpected HTTP status: {status}")]
    HttpStatus { status: u16 },
    #[error("malformed dns response: {0}")]
    Malformed(String),
    #[error("dns lookup aborted")]
    Aborted,
}

impl Error {
    /// Errors that make the resolver retry with the `_dnslink.` form of the domain.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::DnsLinkNotFound { .. } | Error::NoData { .. }
        )
    }
}

impl From<Aborted> for Error {
    fn from(_: Aborted) -> Self {
        Error::Aborted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsLinkEvent {
    /// Served from the cache; carries the cached dnslink value.
    Cache(String),
    /// A network query for the domain is about to be queued.
    Query(String),
    /// The transport answered.
    Answer {
        domain: String,
        answers: Vec<DnsAnswer>,
    },
}

pub type ProgressSink = Arc<dyn Fn(DnsLinkEvent) + Send + Sync>;

#[derive(Clone, Default)]
pub struct ResolveOptions {
    /// Skip the cache lookup. The fresh answer is still cached.
    pub nocache: bool,
    pub signal: Option<AbortSignal>,
    pub on_progress: Option<ProgressSink>,
}

impl ResolveOptions {
    pub(crate) fn emit(&self, event: DnsLinkEvent) {
        if let Some(on_progress) = &self.on_progress {
            on_progress(event);
        }
    }
}

impl fmt::Debug for ResolveOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolveOptions")
            .field("nocache", &self.nocache)
            .field("signal", &self.signal)
            .field("on_progress", &self.on_progress.is_some())
            .finish()
    }
}
