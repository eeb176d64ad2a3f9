use std::time::Duration;

use async_std::task;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::trace;
use url::Url;

use super::doh::map_http_error;
use super::TxtTransport;
use crate::answer::DnsAnswer;
use crate::Error;

const DNS_JSON: &str = "application/dns-json";
const RECORD_TYPE_TXT: u16 = 16;
const STATUS_NOERROR: u32 = 0;
const STATUS_NXDOMAIN: u32 = 3;

/// DNS over HTTPS with JSON answers, the dialect served by Google and Cloudflare.
#[derive(Debug, Clone)]
pub struct DnsJsonOverHttps {
    url: Url,
    timeout: Duration,
}

impl DnsJsonOverHttps {
    pub fn new(url: Url, timeout: Duration) -> Self {
        DnsJsonOverHttps { url, timeout }
    }
}

#[derive(Debug, Deserialize)]
struct JsonResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<JsonAnswer>,
}

#[derive(Debug, Deserialize)]
struct JsonAnswer {
    name: String,
    #[serde(rename = "type")]
    record_type: u16,
    #[serde(rename = "TTL")]
    ttl: Option<u32>,
    data: String,
}

fn into_answers(domain: &str, response: JsonResponse) -> Result<Vec<DnsAnswer>, Error> {
    match response.status {
        STATUS_NOERROR => {}
        STATUS_NXDOMAIN => {
            return Err(Error::NotFound {
                domain: domain.to_string(),
            })
        }
        status => {
            return Err(Error::Transport(format!(
                "{domain}: dns status {status}"
            )))
        }
    }
    Ok(response
        .answer
        .into_iter()
        .filter(|answer| answer.record_type == RECORD_TYPE_TXT)
        .map(|answer| DnsAnswer {
            name: answer.name,
            ttl: answer.ttl,
            data: answer.data,
        })
        .collect())
}

#[async_trait]
impl TxtTransport for DnsJsonOverHttps {
    fn name(&self) -> &'static str {
        "dns-json-over-https"
    }

    fn query_key(&self, domain: &str) -> String {
        format!("name={domain}&type=TXT")
    }

    async fn query_txt(&self, domain: &str) -> Result<Vec<DnsAnswer>, Error> {
        let url = self.url.clone();
        let timeout = self.timeout;
        let name = domain.to_string();
        trace!(%url, domain, "dns-json-over-https query");
        let response = task::spawn_blocking(move || -> Result<JsonResponse, Error> {
            let response = ureq::get(url.as_str())
                .query("name", &name)
                .query("type", "TXT")
                .set("accept", DNS_JSON)
                .timeout(timeout)
                .call()
                .map_err(map_http_error)?;
            if response.status() != 200 {
                return Err(Error::HttpStatus {
                    status: response.status(),
                });
            }
            response
                .into_json::<JsonResponse>()
                .map_err(|e| Error::Malformed(e.to_string()))
        })
        .await?;
        into_answers(domain, response)
    }
}
