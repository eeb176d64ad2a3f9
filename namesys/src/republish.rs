use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_std::prelude::FutureExt;
use async_std::task;
use futures_util::future::join_all;
use parking_lot::Mutex;
use tracing::{error, info};
use types::{AbortController, AbortSignal};

use crate::routing::{Router, RoutingOptions};
use crate::{Error, LocalStore};

#[derive(Debug, Clone, Default)]
pub struct RepublishOptions {
    /// Time between cycle starts; the service default when `None`.
    pub interval: Option<Duration>,
    /// Aborting stops future cycles. A running cycle still completes.
    pub signal: Option<AbortSignal>,
}

struct Job {
    controller: AbortController,
    running: Arc<AtomicBool>,
}

/// The single periodic republish job of a name service.
#[derive(Default)]
pub struct Republisher {
    job: Mutex<Option<Job>>,
}

/// Delay before the next cycle so cycles start `interval` apart.
fn next_delay(interval: Duration, elapsed: Duration) -> Duration {
    interval.saturating_sub(elapsed)
}

impl Republisher {
    pub fn is_active(&self) -> bool {
        self.job
            .lock()
            .as_ref()
            .map_or(false, |job| job.running.load(Ordering::SeqCst))
    }

    pub(crate) fn activate(
        &self,
        local: LocalStore,
        routers: Vec<Arc<dyn Router>>,
        interval: Duration,
        signal: Option<AbortSignal>,
    ) -> Result<(), Error> {
        let mut job = self.job.lock();
        if job
            .as_ref()
            .map_or(false, |job| job.running.load(Ordering::SeqCst))
        {
            return Err(Error::AlreadyActive);
        }

        let controller = AbortController::new();
        let running = Arc::new(AtomicBool::new(true));
        let stop = controller.signal();
        let running_flag = running.clone();
        task::spawn(async move {
            run(&local, &routers, interval, stop, signal).await;
            running_flag.store(false, Ordering::SeqCst);
        });
        info!(?interval, "republish activated");
        *job = Some(Job {
            controller,
            running,
        });
        Ok(())
    }

    /// Stops scheduling further cycles. Safe to call repeatedly.
    ///
    /// The job stays registered until its running cycle finishes, so
    /// `activate` keeps failing with `AlreadyActive` until then.
    pub fn cancel(&self) {
        if let Some(job) = self.job.lock().as_ref() {
            if !job.controller.signal().is_aborted() {
                job.controller.abort();
                info!("republish cancelled");
            }
        }
    }
}

impl Drop for Republisher {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn run(
    local: &LocalStore,
    routers: &[Arc<dyn Router>],
    interval: Duration,
    stop: AbortSignal,
    signal: Option<AbortSignal>,
) {
    let mut delay = interval;
    loop {
        if stop.is_aborted() || signal.as_ref().is_some_and(|s| s.is_aborted()) {
            break;
        }
        let cancelled = async {
            match &signal {
                Some(signal) => stop.aborted().race(signal.aborted()).await,
                None => stop.aborted().await,
            }
            true
        };
        let elapsed = async {
            task::sleep(delay).await;
            false
        };
        if cancelled.race(elapsed).await {
            break;
        }

        let started = Instant::now();
        if let Err(e) = republish_once(local, routers).await {
            error!(?e, "republish cycle failed");
        }
        let took = started.elapsed();
        delay = next_delay(interval, took);
        info!(?took, next = ?delay, "republish cycle finished");
    }
}

/// Sends every locally stored record to every router.
async fn republish_once(local: &LocalStore, routers: &[Arc<dyn Router>]) -> Result<(), Error> {
    let records = local.list()?;
    let options = RoutingOptions::default();
    let puts = records.iter().flat_map(|(routing_key, record)| {
        let options = &options;
        routers.iter().map(move |router| async move {
            router
                .put(routing_key, record, options)
                .await
                .map_err(|e| format!("{}: {e}", router.name()))
        })
    });
    let failures: Vec<String> = join_all(puts)
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect();
    info!(
        records = records.len(),
        failed = failures.len(),
        "republished records"
    );
    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Transport(failures.join("; ")))
    }
}
