mod dht;
mod pubsub;

pub use dht::{Dht, DhtRouter, MessageType, QueryEvent, QueryStream};
pub use pubsub::{topic_for, MessageStream, PubSub, PubSubRouter};

use async_trait::async_trait;
use types::AbortSignal;

use crate::Error;

#[derive(Debug, Clone, Default)]
pub struct RoutingOptions {
    pub signal: Option<AbortSignal>,
}

/// Stores and fetches marshaled name records by routing key.
#[async_trait]
pub trait Router: Send + Sync {
    fn name(&self) -> &str;

    async fn put(
        &self,
        routing_key: &[u8],
        record: &[u8],
        options: &RoutingOptions,
    ) -> Result<(), Error>;

    async fn get(&self, routing_key: &[u8], options: &RoutingOptions) -> Result<Vec<u8>, Error>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use async_std::task;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Router backed by a map, with optional latency and failure injection.
    #[derive(Default)]
    pub struct MemoryRouter {
        pub name: String,
        pub records: Mutex<HashMap<Vec<u8>, Vec<u8>>>,
        pub delay: Duration,
        pub fail_put: bool,
        pub puts: AtomicUsize,
        pub gets: AtomicUsize,
    }

    impl MemoryRouter {
        pub fn new(name: &str) -> Self {
            MemoryRouter {
                name: name.to_string(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl Router for MemoryRouter {
        fn name(&self) -> &str {
            &self.name
        }

        async fn put(
            &self,
            routing_key: &[u8],
            record: &[u8],
            _options: &RoutingOptions,
        ) -> Result<(), Error> {
            if !self.delay.is_zero() {
                task::sleep(self.delay).await;
            }
            if self.fail_put {
                return Err(Error::Transport(format!("{} is unreachable", self.name)));
            }
            self.records
                .lock()
                .insert(routing_key.to_vec(), record.to_vec());
            self.puts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn get(
            &self,
            routing_key: &[u8],
            _options: &RoutingOptions,
        ) -> Result<Vec<u8>, Error> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                task::sleep(self.delay).await;
            }
            let record = self.records.lock().get(routing_key).cloned();
            record.ok_or_else(Error::not_found)
        }
    }
}
