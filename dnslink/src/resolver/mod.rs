//! TXT lookup strategies sharing one cache-and-queue front end.

mod doh;
mod json;
mod system;

pub use doh::DnsOverHttps;
pub use json::DnsJsonOverHttps;
pub use system::SystemTransport;

use std::sync::Arc;
use std::time::Duration;

use async_std::task;
use async_trait::async_trait;
use config::{Config, DnsResolverConfig};
use parking_lot::Mutex;
use tracing::{debug, trace};
use types::AbortSignal;

use crate::answer::{dnslink_value, find_dnslink_answer, DnsAnswer};
use crate::queue::TaskQueue;
use crate::tlru::Tlru;
use crate::{DnsLinkEvent, Error, ResolveOptions};

/// Resolves one domain to its dnslink value, without following indirections.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    async fn resolve(&self, domain: &str, options: &ResolveOptions) -> Result<String, Error>;
}

/// A way of asking the network for the TXT records of a domain.
#[async_trait]
pub trait TxtTransport: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cache key of the TXT query for `domain`.
    fn query_key(&self, domain: &str) -> String;

    async fn query_txt(&self, domain: &str) -> Result<Vec<DnsAnswer>, Error>;
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub cache_size: usize,
    pub concurrency: usize,
    /// Cache lifetime of answers that carry no TTL.
    pub default_ttl: Duration,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            cache_size: 1000,
            concurrency: 4,
            default_ttl: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for ResolverSettings {
    fn from(config: &Config) -> Self {
        ResolverSettings {
            cache_size: config.dns_cache_size,
            concurrency: config.dns_concurrency,
            default_ttl: config.dns_default_ttl,
        }
    }
}

pub struct QueuedResolver<T> {
    transport: Arc<T>,
    cache: Mutex<Tlru<String>>,
    queue: TaskQueue,
    default_ttl: Duration,
}

pub type SystemResolver = QueuedResolver<SystemTransport>;
pub type DnsOverHttpsResolver = QueuedResolver<DnsOverHttps>;
pub type DnsJsonOverHttpsResolver = QueuedResolver<DnsJsonOverHttps>;

impl<T: TxtTransport + 'static> QueuedResolver<T> {
    pub fn new(transport: T, settings: ResolverSettings) -> Self {
        QueuedResolver {
            transport: Arc::new(transport),
            cache: Mutex::new(Tlru::new(settings.cache_size)),
            queue: TaskQueue::new(settings.concurrency),
            default_ttl: settings.default_ttl,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[async_trait]
impl<T: TxtTransport + 'static> DnsResolver for QueuedResolver<T> {
    #[tracing::instrument(skip(self, options))]
    async fn resolve(&self, domain: &str, options: &ResolveOptions) -> Result<String, Error> {
        let key = self.transport.query_key(domain);
        if !options.nocache {
            let cached = self.cache.lock().get(&key);
            if let Some(value) = cached {
                trace!(%key, "dnslink cache hit");
                options.emit(DnsLinkEvent::Cache(value.clone()));
                return Ok(value);
            }
        }

        options.emit(DnsLinkEvent::Query(domain.to_string()));
        trace!(transport = self.transport.name(), domain, "queueing TXT query");
        let queue = self.queue.clone();
        let transport = self.transport.clone();
        let name = domain.to_string();
        let lookup = async move {
            let permit = queue.acquire().await;
            // the slot stays taken until the transport returns, even if the caller gives up
            task::spawn(async move {
                let _permit = permit;
                transport.query_txt(&name).await
            })
            .await
        };
        let answers = AbortSignal::guard(options.signal.as_ref(), lookup).await??;
        options.emit(DnsLinkEvent::Answer {
            domain: domain.to_string(),
            answers: answers.clone(),
        });

        let answer = find_dnslink_answer(domain, &answers)?;
        let value = dnslink_value(&answer.data);
        let ttl = answer
            .ttl
            .map(|ttl| Duration::from_secs(ttl as u64))
            .unwrap_or(self.default_ttl);
        debug!(%value, ?ttl, "dnslink resolved");
        self.cache.lock().set(key, value.clone(), ttl);
        Ok(value)
    }
}

/// Builds the resolver selected by `config.dns_resolver`.
pub async fn resolver_from_config(config: &Config) -> Result<Arc<dyn DnsResolver>, Error> {
    let settings = ResolverSettings::from(config);
    let resolver: Arc<dyn DnsResolver> = match &config.dns_resolver {
        DnsResolverConfig::System { servers } => {
            let transport = SystemTransport::new(servers, config.dns_timeout).await?;
            Arc::new(QueuedResolver::new(transport, settings))
        }
        DnsResolverConfig::DnsOverHttps { url } => Arc::new(QueuedResolver::new(
            DnsOverHttps::new(url.clone(), config.dns_timeout),
            settings,
        )),
        DnsResolverConfig::DnsJsonOverHttps { url } => Arc::new(QueuedResolver::new(
            DnsJsonOverHttps::new(url.clone(), config.dns_timeout),
            settings,
        )),
    };
    Ok(resolver)
}
