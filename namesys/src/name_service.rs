use std::sync::Arc;
use std::time::Duration;

use async_std::task;
use config::Config;
use dnslink::{DnsLink, DnsResolver};
use futures_util::future::try_join_all;
use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use store::Datastore;
use tracing::{debug, info};
use types::{AbortSignal, Cid, Identity, Path};

use crate::progress::{emit, NameSysEvent, ProgressSink};
use crate::republish::{RepublishOptions, Republisher};
use crate::routing::{Router, RoutingOptions};
use crate::{Error, LocalStore, NameRecord, RecordSigner};

#[derive(Debug, Clone)]
pub struct Settings {
    pub record_lifetime: Duration,
    pub republish_interval: Duration,
    /// Indirection budget for both record chains and DNSLink aliases.
    pub max_recursion_depth: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            record_lifetime: Duration::from_secs(24 * 60 * 60),
            republish_interval: Duration::from_secs(23 * 60 * 60),
            max_recursion_depth: dnslink::MAX_RECURSIVE_DEPTH,
        }
    }
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Settings {
            record_lifetime: config.record_lifetime,
            republish_interval: config.republish_interval,
            max_recursion_depth: config.max_recursion_depth,
        }
    }
}

#[derive(Clone, Default)]
pub struct PublishOptions {
    /// Validity of the new record; `Settings::record_lifetime` when `None`.
    pub lifetime: Option<Duration>,
    pub signal: Option<AbortSignal>,
    pub on_progress: Option<ProgressSink>,
}

#[derive(Clone, Default)]
pub struct ResolveOptions {
    /// Bypass the DNS cache for domain lookups.
    pub nocache: bool,
    pub signal: Option<AbortSignal>,
    /// `Settings::max_recursion_depth` when `None`.
    pub max_depth: Option<u32>,
    pub on_progress: Option<ProgressSink>,
}

impl ResolveOptions {
    fn dnslink_options(&self) -> dnslink::ResolveOptions {
        let on_progress = self.on_progress.clone().map(|sink| {
            Arc::new(move |event: dnslink::DnsLinkEvent| sink(NameSysEvent::DnsLink(event)))
                as dnslink::ProgressSink
        });
        dnslink::ResolveOptions {
            nocache: self.nocache,
            signal: self.signal.clone(),
            on_progress,
        }
    }
}

/// Publishes and resolves name records across the local store and a set of
/// routers, and resolves DNSLink domains into the same path space.
pub struct NameService {
    local: LocalStore,
    routers: Vec<Arc<dyn Router>>,
    signer: Arc<dyn RecordSigner>,
    dnslink: DnsLink,
    settings: Settings,
    republisher: Republisher,
}

impl NameService {
    pub fn new(
        datastore: Arc<dyn Datastore>,
        signer: Arc<dyn RecordSigner>,
        dns_resolver: Arc<dyn DnsResolver>,
    ) -> Self {
        NameService {
            local: LocalStore::new(datastore),
            routers: Vec::new(),
            signer,
            dnslink: DnsLink::new(dns_resolver),
            settings: Settings::default(),
            republisher: Republisher::default(),
        }
    }

    pub fn with_router(mut self, router: Arc<dyn Router>) -> Self {
        self.routers.push(router);
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.dnslink = self
            .dnslink
            .with_max_depth(settings.max_recursion_depth);
        self.settings = settings;
        self
    }

    pub fn local_store(&self) -> &LocalStore {
        &self.local
    }

    #[tracing::instrument(skip_all, fields(%identity, %target))]
    pub async fn publish(
        &self,
        identity: &Identity,
        target: &Path,
        options: &PublishOptions,
    ) -> Result<NameRecord, Error> {
        if options.signal.as_ref().is_some_and(|s| s.is_aborted()) {
            return Err(Error::Aborted);
        }
        let routing_key = identity.routing_key();

        let sequence = if self.local.has(&routing_key)? {
            let previous = self.signer.unmarshal(&self.local.get(&routing_key)?)?;
            previous
                .sequence
                .checked_add(1)
                .ok_or_else(|| Error::Validation("sequence number exhausted".to_string()))?
        } else {
            1
        };

        let value = target.to_string();
        let lifetime = options.lifetime.unwrap_or(self.settings.record_lifetime);
        let record = self
            .signer
            .create(identity, value.as_bytes(), sequence, lifetime)?;
        let bytes = self.signer.marshal(&record)?;

        self.local.put(&routing_key, &bytes)?;
        info!(sequence, "record stored locally");
        emit(
            &options.on_progress,
            NameSysEvent::PublishLocal {
                routing_key: routing_key.clone(),
            },
        );

        let routing_options = RoutingOptions {
            signal: options.signal.clone(),
        };
        try_join_all(self.routers.iter().map(|router| {
            let routing_key = &routing_key;
            let bytes = &bytes;
            let routing_options = &routing_options;
            async move {
                router.put(routing_key, bytes, routing_options).await?;
                debug!(router = router.name(), "record published");
                emit(
                    &options.on_progress,
                    NameSysEvent::PublishRouter {
                        router: router.name().to_string(),
                    },
                );
                Ok::<_, Error>(())
            }
        }))
        .await?;

        Ok(record)
    }

    /// Resolves an identity to the content it ultimately points at, following
    /// `/ipns/` indirections.
    #[tracing::instrument(skip_all, fields(%identity))]
    pub async fn resolve(&self, identity: &Identity, options: &ResolveOptions) -> Result<Cid, Error> {
        let depth = options
            .max_depth
            .unwrap_or(self.settings.max_recursion_depth);
        self.resolve_with_depth(identity.clone(), depth, options)
            .await
    }

    async fn resolve_with_depth(
        &self,
        identity: Identity,
        depth: u32,
        options: &ResolveOptions,
    ) -> Result<Cid, Error> {
        let mut identity = identity;
        let mut depth = depth;
        loop {
            if depth == 0 {
                return Err(Error::RecursionLimit);
            }
            let record = self.find_record(&identity.routing_key(), options).await?;
            match record.value_str()?.parse::<Path>()? {
                Path::Ipfs(cid) => return Ok(cid),
                Path::Ipns(next) => {
                    debug!(%identity, %next, "following record indirection");
                    identity = next;
                    depth -= 1;
                }
            }
        }
    }

    /// Resolves a DNSLink domain, then any identity it points at.
    #[tracing::instrument(skip(self, options))]
    pub async fn resolve_domain(&self, domain: &str, options: &ResolveOptions) -> Result<Cid, Error> {
        let depth = options
            .max_depth
            .unwrap_or(self.settings.max_recursion_depth);
        let value = self
            .dnslink
            .resolve_with_depth(domain, depth, &options.dnslink_options())
            .await?;
        match value.parse::<Path>()? {
            Path::Ipfs(cid) => Ok(cid),
            Path::Ipns(identity) => self.resolve_with_depth(identity, depth, options).await,
        }
    }

    /// Queries the local store and every router at once. The first record
    /// that validates wins; the other lookups are left to finish on their own.
    async fn find_record(
        &self,
        routing_key: &[u8],
        options: &ResolveOptions,
    ) -> Result<NameRecord, Error> {
        let sources = std::iter::once(Arc::new(self.local.clone()) as Arc<dyn Router>)
            .chain(self.routers.iter().cloned());
        let mut lookups: FuturesUnordered<_> = sources
            .map(|router| {
                let routing_key = routing_key.to_vec();
                let signer = self.signer.clone();
                let on_progress = options.on_progress.clone();
                let routing_options = RoutingOptions {
                    signal: options.signal.clone(),
                };
                let name = router.name().to_string();
                let lookup = task::spawn(async move {
                    emit(
                        &on_progress,
                        NameSysEvent::ResolveQuery {
                            router: router.name().to_string(),
                        },
                    );
                    let bytes = router.get(&routing_key, &routing_options).await?;
                    signer.validate(&routing_key, &bytes)?;
                    emit(
                        &on_progress,
                        NameSysEvent::ResolveAnswer {
                            router: router.name().to_string(),
                        },
                    );
                    Ok::<_, Error>(bytes)
                });
                async move { (name, lookup.await) }
            })
            .collect();

        let race = async {
            let mut causes = Vec::new();
            while let Some((name, result)) = lookups.next().await {
                match result {
                    Ok(bytes) => {
                        debug!(router = %name, "record found");
                        return Ok(bytes);
                    }
                    Err(e) => {
                        debug!(router = %name, %e, "record lookup failed");
                        causes.push(format!("{name}: {e}"));
                    }
                }
            }
            Err(Error::NotFound { causes })
        };
        let bytes = AbortSignal::guard(options.signal.as_ref(), race).await??;
        self.signer.unmarshal(&bytes)
    }

    /// Starts periodically sending every locally stored record to the routers.
    pub fn activate_republish(&self, options: RepublishOptions) -> Result<(), Error> {
        let interval = options
            .interval
            .unwrap_or(self.settings.republish_interval);
        self.republisher.activate(
            self.local.clone(),
            self.routers.clone(),
            interval,
            options.signal,
        )
    }

    pub fn cancel_republish(&self) {
        self.republisher.cancel();
    }

    pub fn is_republishing(&self) -> bool {
        self.republisher.is_active()
    }
}
