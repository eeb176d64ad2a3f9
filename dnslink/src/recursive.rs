use std::sync::Arc;

use tracing::debug;
use types::{Cid, Identity};

use crate::{DnsResolver, Error, ResolveOptions};

pub const MAX_RECURSIVE_DEPTH: u32 = 32;

const DNSLINK_LABEL: &str = "_dnslink.";

/// Adds `_dnslink.` to a bare domain or strips it from a prefixed one.
fn toggle_dnslink_label(domain: &str) -> String {
    match domain.strip_prefix(DNSLINK_LABEL) {
        Some(bare) => bare.to_string(),
        None => format!("{DNSLINK_LABEL}{domain}"),
    }
}

/// Follows `/ipns/<domain>` dnslink values until one points at content or
/// at an identity, consuming one unit of `depth` per lookup.
pub async fn resolve_dnslink(
    domain: &str,
    depth: u32,
    resolver: &dyn DnsResolver,
    options: &ResolveOptions,
) -> Result<String, Error> {
    let mut domain = domain.to_string();
    let mut depth = depth;
    loop {
        if depth == 0 {
            return Err(Error::RecursionLimit);
        }

        let record = match resolver.resolve(&domain, options).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                let alternate = toggle_dnslink_label(&domain);
                debug!(%domain, %alternate, "no dnslink record, trying alternate name");
                resolver.resolve(&alternate, options).await?
            }
            Err(e) => return Err(e),
        };

        let result = record.replacen("dnslink=", "", 1);
        // /ipfs/<cid>/..., /ipns/<identity or domain>/...
        let next = result.split('/').nth(2).unwrap_or_default();
        if Cid::is_valid(next) || Identity::is_valid(next) {
            return Ok(result);
        }
        if next.is_empty() {
            return Err(Error::Malformed(format!("invalid dnslink value: {result}")));
        }

        debug!(%domain, next, "following dnslink to another domain");
        domain = next.to_string();
        depth -= 1;
    }
}

/// Recursive DNSLink resolver over a single-lookup [`DnsResolver`].
#[derive(Clone)]
pub struct DnsLink {
    resolver: Arc<dyn DnsResolver>,
    max_depth: u32,
}

impl DnsLink {
    pub fn new(resolver: Arc<dyn DnsResolver>) -> Self {
        DnsLink {
            resolver,
            max_depth: MAX_RECURSIVE_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub async fn resolve(&self, domain: &str, options: &ResolveOptions) -> Result<String, Error> {
        resolve_dnslink(domain, self.max_depth, self.resolver.as_ref(), options).await
    }

    pub async fn resolve_with_depth(
        &self,
        domain: &str,
        depth: u32,
        options: &ResolveOptions,
    ) -> Result<String, Error> {
        resolve_dnslink(domain, depth, self.resolver.as_ref(), options).await
    }
}
