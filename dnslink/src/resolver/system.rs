use std::time::Duration;

use async_std_resolver::config::{
    NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts,
};
use async_std_resolver::{resolver, AsyncStdResolver};
use async_trait::async_trait;
use config::DnsServerAddr;
use hickory_proto::op::ResponseCode;
use hickory_proto::rr::RData;
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::system_conf::read_system_conf;

use super::TxtTransport;
use crate::answer::DnsAnswer;
use crate::Error;

/// TXT lookups through the operating system resolver or explicit name servers.
#[derive(Clone)]
pub struct SystemTransport {
    resolver: AsyncStdResolver,
}

impl SystemTransport {
    /// Uses the OS configuration when `dns_servers` is empty.
    ///
    /// hickory's own answer cache is disabled; caching is left to the
    /// resolver front end so `nocache` always reaches the network.
    pub async fn new(dns_servers: &[DnsServerAddr], timeout: Duration) -> Result<Self, Error> {
        if dns_servers.is_empty() {
            let (config, mut opts) = read_system_conf()
                .map_err(|e| Error::Transport(format!("read system dns config: {e}")))?;
            opts.timeout = timeout;
            opts.cache_size = 0;
            let resolver = resolver(config, opts).await;
            return Ok(SystemTransport { resolver });
        }

        let mut name_servers = NameServerConfigGroup::with_capacity(dns_servers.len());
        for addr in dns_servers {
            match addr {
                DnsServerAddr::UdpSocketAddr(addr) => {
                    let udp = NameServerConfig {
                        socket_addr: *addr,
                        protocol: Protocol::Udp,
                        tls_dns_name: None,
                        trust_negative_responses: false,
                        bind_addr: None,
                    };
                    name_servers.push(udp);
                }
                DnsServerAddr::TcpSocketAddr(addr) => {
                    if addr.scheme() != "tcp" {
                        return Err(Error::Transport(format!("unsupported dns server: {addr}")));
                    }
                    let socket_addr = match (addr.host_str(), addr.port()) {
                        (Some(host), Some(port)) => format!("{host}:{port}")
                            .parse()
                            .map_err(|_| Error::Transport(format!("invalid dns server: {addr}")))?,
                        _ => return Err(Error::Transport(format!("invalid dns server: {addr}"))),
                    };
                    let tcp = NameServerConfig {
                        socket_addr,
                        protocol: Protocol::Tcp,
                        tls_dns_name: None,
                        trust_negative_responses: false,
                        bind_addr: None,
                    };
                    name_servers.push(tcp);
                }
            }
        }

        let num_concurrent_reqs = name_servers.len();
        let resolver = resolver(
            ResolverConfig::from_parts(None, Vec::new(), name_servers),
            {
                let mut opts = ResolverOpts::default();
                opts.timeout = timeout;
                opts.num_concurrent_reqs = num_concurrent_reqs;
                opts.cache_size = 0;
                opts
            },
        )
        .await;

        Ok(SystemTransport { resolver })
    }
}

fn map_resolve_error(domain: &str, e: ResolveError) -> Error {
    match e.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            Error::NotFound {
                domain: domain.to_string(),
            }
        }
        ResolveErrorKind::NoRecordsFound { .. } => Error::NoData {
            domain: domain.to_string(),
        },
        _ => Error::Transport(format!("{domain} not resolved: {e}")),
    }
}

#[async_trait]
impl TxtTransport for SystemTransport {
    fn name(&self) -> &'static str {
        "system"
    }

    fn query_key(&self, domain: &str) -> String {
        domain.to_string()
    }

    async fn query_txt(&self, domain: &str) -> Result<Vec<DnsAnswer>, Error> {
        let lookup = self
            .resolver
            .txt_lookup(domain)
            .await
            .map_err(|e| map_resolve_error(domain, e))?;
        let answers = lookup
            .as_lookup()
            .record_iter()
            .filter_map(|record| match record.data() {
                Some(RData::TXT(txt)) => Some(DnsAnswer {
                    name: record.name().to_string(),
                    ttl: Some(record.ttl()),
                    data: txt
                        .txt_data()
                        .iter()
                        .map(|chunk| String::from_utf8_lossy(chunk))
                        .collect(),
                }),
                _ => None,
            })
            .collect();
        Ok(answers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DnsResolver, QueuedResolver, ResolverSettings};
    use crate::ResolveOptions;
    use async_std::task;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    #[ignore]
    fn test_query_txt() {
        task::block_on(async {
            let transport = SystemTransport::new(
                &[DnsServerAddr::UdpSocketAddr("1.1.1.1:53".parse().unwrap())],
                Duration::from_secs(5),
            )
            .await
            .unwrap();
            let answers = transport.query_txt("_dnslink.ipfs.tech").await.unwrap();
            assert!(answers.iter().any(|a| a.data.starts_with("dnslink=")));
        });
    }

    #[test]
    fn test_reject_tcp_server_without_port() {
        task::block_on(async {
            let server = DnsServerAddr::TcpSocketAddr("tcp://1.1.1.1".parse().unwrap());
            let result = SystemTransport::new(&[server], Duration::from_secs(1)).await;
            assert!(matches!(result, Err(Error::Transport(_))));
        });
    }

    #[test]
    fn test_reject_tls_server() {
        task::block_on(async {
            let server = DnsServerAddr::TcpSocketAddr("tls://1.1.1.1:853".parse().unwrap());
            let result = SystemTransport::new(&[server], Duration::from_secs(1)).await;
            assert!(matches!(result, Err(Error::Transport(_))));
        });
    }

    /// Answers every TXT query with one dnslink record, TTL 300.
    fn serve_udp_dns() -> (std::net::SocketAddr, Arc<AtomicUsize>) {
        use hickory_proto::op::{Message, MessageType};
        use hickory_proto::rr::rdata::TXT;
        use hickory_proto::rr::Record;

        let socket = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let addr = socket.local_addr().unwrap();
        let queries = Arc::new(AtomicUsize::new(0));
        let counter = queries.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; 1500];
            while let Ok((len, peer)) = socket.recv_from(&mut buf) {
                let Ok(request) = Message::from_vec(&buf[..len]) else {
                    continue;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut response = Message::new();
                response
                    .set_id(request.id())
                    .set_message_type(MessageType::Response)
                    .set_op_code(request.op_code())
                    .set_recursion_desired(request.recursion_desired())
                    .set_recursion_available(true)
                    .set_response_code(ResponseCode::NoError)
                    .add_queries(request.queries().to_vec());
                for query in request.queries() {
                    response.add_answer(Record::from_rdata(
                        query.name().clone(),
                        300,
                        RData::TXT(TXT::new(vec!["dnslink=/ipns/example.org".to_string()])),
                    ));
                }
                if let Ok(bytes) = response.to_vec() {
                    let _ = socket.send_to(&bytes, peer);
                }
            }
        });
        (addr, queries)
    }

    #[test]
    fn test_nocache_reaches_the_server() {
        task::block_on(async {
            let (addr, queries) = serve_udp_dns();
            let transport =
                SystemTransport::new(&[DnsServerAddr::UdpSocketAddr(addr)], Duration::from_secs(2))
                    .await
                    .unwrap();
            let resolver = QueuedResolver::new(transport, ResolverSettings::default());
            let nocache = ResolveOptions {
                nocache: true,
                ..Default::default()
            };
            for _ in 0..3 {
                let value = resolver.resolve("example.com", &nocache).await.unwrap();
                assert_eq!(value, "/ipns/example.org");
            }
            assert_eq!(queries.load(Ordering::SeqCst), 3);

            // the front end cache still answers plain lookups
            resolver
                .resolve("example.com", &ResolveOptions::default())
                .await
                .unwrap();
            assert_eq!(queries.load(Ordering::SeqCst), 3);
        });
    }
}
