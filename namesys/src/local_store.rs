use std::io::{Cursor, Read};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use chrono::{DateTime, SecondsFormat, Utc};
use store::Datastore;
use tracing::debug;
use types::base32_lower;

use crate::routing::{Router, RoutingOptions};
use crate::Error;

const DHT_RECORD_PREFIX: &str = "/dht/record/";

/// A record wrapped the way a DHT node stores what it receives.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DhtRecord {
    key: Vec<u8>,
    value: Vec<u8>,
    time_received: DateTime<Utc>,
}

impl DhtRecord {
    fn serialize(&self) -> Vec<u8> {
        let time = self
            .time_received
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let mut buf = Vec::with_capacity(12 + self.key.len() + self.value.len() + time.len());
        for field in [&self.key[..], &self.value[..], time.as_bytes()] {
            let _ = buf.write_u32::<BigEndian>(field.len() as u32);
            buf.extend_from_slice(field);
        }
        buf
    }

    fn deserialize(bytes: &[u8]) -> anyhow::Result<Self> {
        let mut cur = Cursor::new(bytes);
        let mut field = |name: &str| -> anyhow::Result<Vec<u8>> {
            let len = cur
                .read_u32::<BigEndian>()
                .with_context(|| format!("read {name} length"))?;
            let mut data = vec![0; len as usize];
            cur.read_exact(&mut data)
                .with_context(|| format!("read {name}"))?;
            Ok(data)
        };
        let key = field("key")?;
        let value = field("value")?;
        let time = String::from_utf8(field("time received")?)
            .map_err(|_| anyhow!("time received is not utf-8"))?;
        let time_received = DateTime::parse_from_rfc3339(&time)
            .context("parse time received")?
            .with_timezone(&Utc);
        Ok(DhtRecord {
            key,
            value,
            time_received,
        })
    }
}

fn datastore_key(routing_key: &[u8]) -> String {
    format!("{DHT_RECORD_PREFIX}{}", base32_lower(routing_key))
}

/// Name records kept in the local datastore, framed as DHT records so they can
/// be served to the network later.
#[derive(Clone)]
pub struct LocalStore {
    datastore: Arc<dyn Datastore>,
}

impl LocalStore {
    pub fn new(datastore: Arc<dyn Datastore>) -> Self {
        LocalStore { datastore }
    }

    pub fn put(&self, routing_key: &[u8], record: &[u8]) -> Result<(), Error> {
        let framed = DhtRecord {
            key: routing_key.to_vec(),
            value: record.to_vec(),
            time_received: Utc::now(),
        };
        self.datastore
            .put(&datastore_key(routing_key), &framed.serialize())?;
        Ok(())
    }

    pub fn get(&self, routing_key: &[u8]) -> Result<Vec<u8>, Error> {
        let Some(bytes) = self.datastore.get(&datastore_key(routing_key))? else {
            return Err(Error::not_found());
        };
        Ok(DhtRecord::deserialize(&bytes)?.value)
    }

    pub fn has(&self, routing_key: &[u8]) -> Result<bool, Error> {
        Ok(self.datastore.has(&datastore_key(routing_key))?)
    }

    /// Every stored `(routing key, record)` pair. Undecodable entries are skipped.
    pub fn list(&self) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Error> {
        let entries = self.datastore.query_prefix(DHT_RECORD_PREFIX)?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, bytes)| match DhtRecord::deserialize(&bytes) {
                Ok(record) => Some((record.key, record.value)),
                Err(e) => {
                    debug!(%key, ?e, "skip undecodable record");
                    None
                }
            })
            .collect())
    }
}

#[async_trait]
impl Router for LocalStore {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(
        &self,
        routing_key: &[u8],
        record: &[u8],
        _options: &RoutingOptions,
    ) -> Result<(), Error> {
        LocalStore::put(self, routing_key, record)
    }

    async fn get(&self, routing_key: &[u8], _options: &RoutingOptions) -> Result<Vec<u8>, Error> {
        LocalStore::get(self, routing_key)
    }
}
