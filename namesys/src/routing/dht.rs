use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use tracing::debug;
use types::AbortSignal;

use super::{Router, RoutingOptions};
use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    PutValue,
    GetValue,
    AddProvider,
    GetProviders,
    FindNode,
    Ping,
}

/// Progress of a DHT query as reported by the DHT implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    SendingQuery { to: String, message: MessageType },
    PeerResponse { from: String, message: MessageType },
    FinalPeer { peer: String },
    QueryError { from: String, error: String },
    Provider { from: String, providers: Vec<String> },
    Value { from: String, value: Vec<u8> },
}

pub type QueryStream = BoxStream<'static, QueryEvent>;

/// The subset of a Kademlia DHT used to store name records.
pub trait Dht: Send + Sync {
    fn put(&self, key: &[u8], value: &[u8]) -> QueryStream;
    fn get(&self, key: &[u8]) -> QueryStream;
}

fn log_event(prefix: &str, event: &QueryEvent) {
    match event {
        QueryEvent::SendingQuery { to, message } => debug!("{prefix} sending {message:?} -> {to}"),
        QueryEvent::PeerResponse { from, message } => {
            debug!("{prefix} peer response {message:?} <- {from}")
        }
        QueryEvent::FinalPeer { peer } => debug!("{prefix} final peer {peer}"),
        QueryEvent::QueryError { from, error } => debug!("{prefix} query error from {from}: {error}"),
        QueryEvent::Provider { providers, .. } => {
            debug!("{prefix} providers {}", providers.join(", "))
        }
        QueryEvent::Value { from, .. } => debug!("{prefix} value <- {from}"),
    }
}

/// Routes name records through a DHT.
pub struct DhtRouter<D> {
    dht: D,
}

impl<D: Dht> DhtRouter<D> {
    pub fn new(dht: D) -> Self {
        DhtRouter { dht }
    }
}

#[async_trait]
impl<D: Dht> Router for DhtRouter<D> {
    fn name(&self) -> &str {
        "dht"
    }

    async fn put(
        &self,
        routing_key: &[u8],
        record: &[u8],
        options: &RoutingOptions,
    ) -> Result<(), Error> {
        let mut events = self.dht.put(routing_key, record);
        let stored = AbortSignal::guard(options.signal.as_ref(), async {
            let mut stored = false;
            while let Some(event) = events.next().await {
                log_event("dht put", &event);
                if let QueryEvent::PeerResponse {
                    message: MessageType::PutValue,
                    ..
                } = event
                {
                    stored = true;
                }
            }
            stored
        })
        .await?;
        if !stored {
            return Err(Error::Transport("could not store value in the DHT".to_string()));
        }
        Ok(())
    }

    async fn get(&self, routing_key: &[u8], options: &RoutingOptions) -> Result<Vec<u8>, Error> {
        let mut events = self.dht.get(routing_key);
        let value = AbortSignal::guard(options.signal.as_ref(), async {
            while let Some(event) = events.next().await {
                log_event("dht get", &event);
                if let QueryEvent::Value { value, .. } = event {
                    return Some(value);
                }
            }
            None
        })
        .await?;
        value.ok_or_else(Error::not_found)
    }
}
