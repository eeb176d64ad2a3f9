use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_std::task;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, error};
use types::{AbortSignal, URL_SAFE_ENGINE};

use super::{Router, RoutingOptions};
use crate::{Error, RecordSigner};

pub type MessageStream = BoxStream<'static, Vec<u8>>;

/// Publish/subscribe transport carrying raw record bytes.
#[async_trait]
pub trait PubSub: Send + Sync {
    async fn publish(&self, topic: &str, data: &[u8]) -> Result<(), Error>;
    fn subscribe(&self, topic: &str) -> Result<MessageStream, Error>;
}

const RECORD_TOPIC_PREFIX: &str = "/record/";

pub fn topic_for(routing_key: &[u8]) -> String {
    format!(
        "{RECORD_TOPIC_PREFIX}{}",
        base64::encode_engine(routing_key, &URL_SAFE_ENGINE)
    )
}

#[derive(Default)]
struct State {
    subscriptions: HashSet<String>,
    /// Best record seen per topic: `(sequence, bytes)`.
    records: HashMap<String, (u64, Vec<u8>)>,
}

/// Routes name records over pubsub topics.
///
/// The first `get` for a key subscribes to its topic; answers arrive with the
/// messages received afterwards.
pub struct PubSubRouter {
    pubsub: Arc<dyn PubSub>,
    signer: Arc<dyn RecordSigner>,
    state: Arc<Mutex<State>>,
}

impl PubSubRouter {
    pub fn new(pubsub: Arc<dyn PubSub>, signer: Arc<dyn RecordSigner>) -> Self {
        PubSubRouter {
            pubsub,
            signer,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    fn subscribe(&self, routing_key: &[u8], topic: &str) -> Result<(), Error> {
        if !self.state.lock().subscriptions.insert(topic.to_string()) {
            return Ok(());
        }
        let mut messages = match self.pubsub.subscribe(topic) {
            Ok(messages) => messages,
            Err(e) => {
                self.state.lock().subscriptions.remove(topic);
                return Err(e);
            }
        };
        debug!(topic, "subscribed to record topic");
        let state = self.state.clone();
        let signer = self.signer.clone();
        let routing_key = routing_key.to_vec();
        let topic = topic.to_string();
        task::spawn(async move {
            while let Some(message) = messages.next().await {
                if let Err(e) = signer.validate(&routing_key, &message) {
                    error!(%topic, ?e, "dropping invalid record");
                    continue;
                }
                let sequence = match signer.unmarshal(&message) {
                    Ok(record) => record.sequence,
                    Err(e) => {
                        error!(%topic, ?e, "dropping undecodable record");
                        continue;
                    }
                };
                let mut guard = state.lock();
                let newer = guard
                    .records
                    .get(&topic)
                    .map_or(true, |(current, _)| sequence > *current);
                if newer {
                    debug!(%topic, sequence, "retained record from pubsub");
                    guard.records.insert(topic.clone(), (sequence, message));
                }
            }
            state.lock().subscriptions.remove(&topic);
        });
        Ok(())
    }
}

#[async_trait]
impl Router for PubSubRouter {
    fn name(&self) -> &str {
        "pubsub"
    }

    async fn put(
        &self,
        routing_key: &[u8],
        record: &[u8],
        options: &RoutingOptions,
    ) -> Result<(), Error> {
        let topic = topic_for(routing_key);
        AbortSignal::guard(
            options.signal.as_ref(),
            self.pubsub.publish(&topic, record),
        )
        .await?
    }

    async fn get(&self, routing_key: &[u8], _options: &RoutingOptions) -> Result<Vec<u8>, Error> {
        let topic = topic_for(routing_key);
        self.subscribe(routing_key, &topic)?;
        let record = self
            .state
            .lock()
            .records
            .get(&topic)
            .map(|(_, record)| record.clone());
        record.ok_or_else(Error::not_found)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::signer::tests::TestSigner;
    use async_std::channel::{unbounded, Sender};
    use std::time::Duration;
    use types::Identity;

    /// In-process pubsub delivering every message to every subscriber.
    #[derive(Default)]
    pub struct LocalPubSub {
        subscribers: Mutex<HashMap<String, Vec<Sender<Vec<u8>>>>>,
    }

    #[async_trait]
    impl PubSub for LocalPubSub {
        async fn publish(&self, topic: &str, data: &[u8]) -> Result<(), Error> {
            let subscribers = self
                .subscribers
                .lock()
                .get(topic)
                .cloned()
                .unwrap_or_default();
            for subscriber in subscribers {
                let _ = subscriber.send(data.to_vec()).await;
            }
            Ok(())
        }

        fn subscribe(&self, topic: &str) -> Result<MessageStream, Error> {
            let (tx, rx) = unbounded();
            self.subscribers
                .lock()
                .entry(topic.to_string())
                .or_default()
                .push(tx);
            Ok(rx.boxed())
        }
    }

    #[test]
    fn test_topic() {
        assert_eq!(topic_for(b"/ipns/\xfb\xff"), "/record/L2lwbnMv-_8");
    }

    #[test]
    fn test_keeps_highest_sequence() {
        task::block_on(async {
            let identity = Identity::from_public_key(b"alice");
            let routing_key = identity.routing_key();
            let pubsub = Arc::new(LocalPubSub::default());
            let router = PubSubRouter::new(pubsub.clone(), Arc::new(TestSigner));
            let options = RoutingOptions::default();

            // first get only subscribes
            let err = router.get(&routing_key, &options).await.unwrap_err();
            assert!(matches!(err, Error::NotFound { .. }));

            let record = |sequence| {
                let record = TestSigner
                    .create(&identity, b"/ipfs/x", sequence, Duration::from_secs(60))
                    .unwrap();
                TestSigner.marshal(&record).unwrap()
            };
            router.put(&routing_key, &record(2), &options).await.unwrap();
            router.put(&routing_key, &record(1), &options).await.unwrap();
            // signed for someone else, never retained
            let mallory = Identity::from_public_key(b"mallory");
            let forged = TestSigner
                .create(&mallory, b"/ipfs/y", 9, Duration::from_secs(60))
                .unwrap();
            router
                .put(&routing_key, &TestSigner.marshal(&forged).unwrap(), &options)
                .await
                .unwrap();
            task::sleep(Duration::from_millis(50)).await;

            let bytes = router.get(&routing_key, &options).await.unwrap();
            assert_eq!(TestSigner.unmarshal(&bytes).unwrap().sequence, 2);
        });
    }
}
