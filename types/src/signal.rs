//! Cancellation shared between a caller and the operations it started.
//!
//! The channel never carries a message. Aborting closes it, which wakes every
//! pending `recv` at once; a closed channel is how a signal reports abortion.

use std::future::Future;

use async_std::channel::{bounded, Receiver, Sender};
use async_std::prelude::FutureExt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation aborted")]
pub struct Aborted;

#[derive(Clone)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        let (sender, receiver) = bounded(1);
        AbortController {
            signal: AbortSignal { sender, receiver },
        }
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Idempotent.
    pub fn abort(&self) {
        self.signal.sender.close();
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

/// Each clone holds a sender so dropping the controller alone never aborts.
#[derive(Clone)]
pub struct AbortSignal {
    sender: Sender<()>,
    receiver: Receiver<()>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        self.receiver.is_closed()
    }

    /// Resolves once the controller aborts.
    pub async fn aborted(&self) {
        while self.receiver.recv().await.is_ok() {}
    }

    /// Run `fut` until it completes or `signal` aborts, whichever comes first.
    /// On abort `fut` is dropped.
    pub async fn guard<F: Future>(signal: Option<&AbortSignal>, fut: F) -> Result<F::Output, Aborted> {
        let Some(signal) = signal else {
            return Ok(fut.await);
        };
        if signal.is_aborted() {
            return Err(Aborted);
        }
        let work = async { Ok(fut.await) };
        let abort = async {
            signal.aborted().await;
            Err(Aborted)
        };
        work.race(abort).await
    }
}

impl std::fmt::Debug for AbortSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbortSignal")
            .field("aborted", &self.is_aborted())
            .finish()
    }
}
