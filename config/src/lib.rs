mod server_config;
pub use server_config::{DnsResolverConfig, DnsServerAddr};

use serde::Deserialize;
use std::fs::File;
use std::io;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_DB_PATH: &str = "namesys.sqlite";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    db_path: Option<PathBuf>,
    #[serde(default)]
    pub dns_resolver: DnsResolverConfig,
    #[serde(with = "duration", default = "default_dns_timeout")]
    pub dns_timeout: Duration,
    #[serde(default = "default_dns_cache_size")]
    pub dns_cache_size: usize,
    #[serde(default = "default_dns_concurrency")]
    pub dns_concurrency: usize,
    #[serde(with = "duration", default = "default_dns_ttl")]
    pub dns_default_ttl: Duration,
    #[serde(with = "duration", default = "default_record_lifetime")]
    pub record_lifetime: Duration,
    #[serde(with = "duration", default = "default_republish_interval")]
    pub republish_interval: Duration,
    #[serde(default = "default_max_recursion_depth")]
    pub max_recursion_depth: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: None,
            dns_resolver: DnsResolverConfig::default(),
            dns_timeout: default_dns_timeout(),
            dns_cache_size: default_dns_cache_size(),
            dns_concurrency: default_dns_concurrency(),
            dns_default_ttl: default_dns_ttl(),
            record_lifetime: default_record_lifetime(),
            republish_interval: default_republish_interval(),
            max_recursion_depth: default_max_recursion_depth(),
        }
    }
}

fn default_dns_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_dns_cache_size() -> usize {
    1000
}
// browsers cap connections per host at around 6
fn default_dns_concurrency() -> usize {
    4
}
fn default_dns_ttl() -> Duration {
    Duration::from_secs(60)
}
fn default_record_lifetime() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}
fn default_republish_interval() -> Duration {
    Duration::from_secs(23 * 60 * 60)
}
fn default_max_recursion_depth() -> u32 {
    32
}

pub mod duration {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use std::time::Duration;

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(s.len());
        let (num, unit) = s.split_at(split);
        let invalid = || format!("invalid value: {}, expected 10ms, 10s, 10m or 10h", &s);
        let n: u64 = num.parse().map_err(|_| invalid())?;
        match unit {
            "ms" => Ok(Duration::from_millis(n)),
            "s" => Ok(Duration::from_secs(n)),
            "m" => n.checked_mul(60).map(Duration::from_secs).ok_or_else(invalid),
            "h" => n.checked_mul(60 * 60).map(Duration::from_secs).ok_or_else(invalid),
            _ => Err(invalid()),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(|_| {
            Error::invalid_value(serde::de::Unexpected::Str(&s), &"10ms, 10s, 10m or 10h")
        })
    }
}

impl Config {
    pub fn from_config_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Config::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> io::Result<Self> {
        let conf: Config = serde_yaml::from_reader(reader)
            .map_err(|e| io::Error::new(ErrorKind::InvalidData, e))?;
        conf.validate()?;
        tracing::debug!(?conf, "config loaded");
        Ok(conf)
    }

    pub fn db_path(&self) -> &Path {
        self.db_path
            .as_deref()
            .unwrap_or_else(|| Path::new(DEFAULT_DB_PATH))
    }

    fn validate(&self) -> io::Result<()> {
        let invalid = |msg: &str| Err(io::Error::new(ErrorKind::InvalidData, msg.to_string()));
        if self.dns_cache_size == 0 {
            return invalid("dns_cache_size must be greater than 0.");
        }
        if self.dns_concurrency == 0 {
            return invalid("dns_concurrency must be greater than 0.");
        }
        if self.max_recursion_depth == 0 {
            return invalid("max_recursion_depth must be greater than 0.");
        }
        if self.republish_interval.is_zero() {
            return invalid("republish_interval must be greater than 0.");
        }
        if let Some(url) = self.dns_resolver.url() {
            if !["https", "http"].contains(&url.scheme()) {
                return invalid("dns resolver url must be http or https.");
            }
        }
        if let DnsResolverConfig::System { servers } = &self.dns_resolver {
            for server in servers {
                if let DnsServerAddr::TcpSocketAddr(url) = server {
                    // the system resolver has no TLS transport
                    if url.scheme() != "tcp"
                        || url.host().is_none()
                        || url.port().is_none()
                    {
                        return invalid("tcp dns server must look like tcp://1.1.1.1:53.");
                    }
                }
            }
        }
        Ok(())
    }
}
