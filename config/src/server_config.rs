use std::net::SocketAddr;

use serde::Deserialize;
use url::Url;

/// Upstream DNS server used by the system resolver.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DnsServerAddr {
    /// IP Address
    UdpSocketAddr(SocketAddr),
    /// eg. tcp://114.114.114.114:53
    TcpSocketAddr(Url),
}

/// Which transport the dnslink resolver uses for TXT lookups.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DnsResolverConfig {
    /// OS resolver configuration, or the given name servers when not empty.
    System {
        #[serde(default)]
        servers: Vec<DnsServerAddr>,
    },
    /// RFC 8484 wire format over HTTPS.
    DnsOverHttps { url: Url },
    /// `application/dns-json` over HTTPS, as served by Google and Cloudflare.
    DnsJsonOverHttps { url: Url },
}

impl Default for DnsResolverConfig {
    fn default() -> Self {
        DnsResolverConfig::System { servers: vec![] }
    }
}

impl DnsResolverConfig {
    pub fn url(&self) -> Option<&Url> {
        match self {
            DnsResolverConfig::System { .. } => None,
            DnsResolverConfig::DnsOverHttps { url } | DnsResolverConfig::DnsJsonOverHttps { url } => {
                Some(url)
            }
        }
    }
}
