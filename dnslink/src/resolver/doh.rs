use std::io::Read;
use std::time::Duration;

use async_std::task;
use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{Name, RData, RecordType};
use tracing::trace;
use types::URL_SAFE_ENGINE;
use url::Url;

use super::TxtTransport;
use crate::answer::DnsAnswer;
use crate::Error;

const DNS_MESSAGE: &str = "application/dns-message";
const MAX_RESPONSE_SIZE: u64 = 64 * 1024;

/// RFC 8484 DNS over HTTPS: wire-format query in the `dns` GET parameter.
#[derive(Debug, Clone)]
pub struct DnsOverHttps {
    url: Url,
    timeout: Duration,
}

impl DnsOverHttps {
    pub fn new(url: Url, timeout: Duration) -> Self {
        DnsOverHttps { url, timeout }
    }
}

/// Encodes a recursive TXT query for `domain` as unpadded base64url.
pub(crate) fn encode_query(domain: &str) -> Result<String, Error> {
    let name = Name::from_ascii(domain)
        .map_err(|e| Error::Malformed(format!("invalid domain {domain}: {e}")))?;
    let mut message = Message::new();
    message
        .set_id(rand::random())
        .set_message_type(MessageType::Query)
        .set_op_code(OpCode::Query)
        .set_recursion_desired(true)
        .add_query(Query::query(name, RecordType::TXT));
    let bytes = message
        .to_vec()
        .map_err(|e| Error::Malformed(e.to_string()))?;
    Ok(base64::encode_engine(bytes, &URL_SAFE_ENGINE))
}

pub(crate) fn parse_response(domain: &str, body: &[u8]) -> Result<Vec<DnsAnswer>, Error> {
    let message = Message::from_vec(body).map_err(|e| Error::Malformed(e.to_string()))?;
    match message.response_code() {
        ResponseCode::NoError => {}
        ResponseCode::NXDomain => {
            return Err(Error::NotFound {
                domain: domain.to_string(),
            })
        }
        code => return Err(Error::Transport(format!("{domain}: {code}"))),
    }
    Ok(message
        .answers()
        .iter()
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
        .collect())
}

pub(crate) fn map_http_error(e: ureq::Error) -> Error {
    match e {
        ureq::Error::Status(status, _) => Error::HttpStatus { status },
        ureq::Error::Transport(t) => Error::Transport(t.to_string()),
    }
}

#[async_trait]
impl TxtTransport for DnsOverHttps {
    fn name(&self) -> &'static str {
        "dns-over-https"
    }

    fn query_key(&self, domain: &str) -> String {
        format!("name={domain}&type=TXT")
    }

    async fn query_txt(&self, domain: &str) -> Result<Vec<DnsAnswer>, Error> {
        let query = encode_query(domain)?;
        let url = self.url.clone();
        let timeout = self.timeout;
        trace!(%url, domain, "dns-over-https query");
        // ureq blocks; an aborted lookup leaves the request to finish or time out on its own
        let body = task::spawn_blocking(move || -> Result<Vec<u8>, Error> {
            let response = ureq::get(url.as_str())
                .query("dns", &query)
                .set("accept", DNS_MESSAGE)
                .timeout(timeout)
                .call()
                .map_err(map_http_error)?;
            if response.status() != 200 {
                return Err(Error::HttpStatus {
                    status: response.status(),
                });
            }
            let mut body = Vec::new();
            response
                .into_reader()
                .take(MAX_RESPONSE_SIZE)
                .read_to_end(&mut body)
                .map_err(|e| Error::Transport(e.to_string()))?;
            Ok(body)
        })
        .await?;
        parse_response(domain, &body)
    }
}
