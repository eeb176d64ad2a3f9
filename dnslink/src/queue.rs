use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;

use async_std::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;

struct State {
    available: usize,
    /// One sender per task waiting for a slot, oldest first.
    waiters: VecDeque<Sender<()>>,
}

struct Inner {
    state: Mutex<State>,
    concurrency: usize,
}

impl Inner {
    /// Hands the slot to the oldest live waiter, or back to the pool.
    fn release(&self) {
        let mut state = self.state.lock();
        while let Some(waiter) = state.waiters.pop_front() {
            if waiter.try_send(()).is_ok() {
                return;
            }
        }
        state.available += 1;
    }
}

/// Runs at most `concurrency` futures at a time; the rest wait in arrival order.
#[derive(Clone)]
pub struct TaskQueue {
    inner: Arc<Inner>,
}

/// A slot in the queue, returned when dropped.
///
/// Owned, so it can travel with work that outlives the caller's future.
pub struct Permit {
    inner: Arc<Inner>,
}

impl Drop for Permit {
    fn drop(&mut self) {
        self.inner.release();
    }
}

/// A task waiting for a slot. If it is dropped after the slot was handed
/// over but before it was taken, the slot moves on to the next waiter.
struct Waiting {
    inner: Arc<Inner>,
    slot: Receiver<()>,
    granted: bool,
}

impl Drop for Waiting {
    fn drop(&mut self) {
        if self.granted {
            return;
        }
        self.slot.close();
        if self.slot.try_recv().is_ok() {
            self.inner.release();
        }
    }
}

impl TaskQueue {
    pub fn new(concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        TaskQueue {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    available: concurrency,
                    waiters: VecDeque::new(),
                }),
                concurrency,
            }),
        }
    }

    /// Number of slots currently held.
    pub fn active(&self) -> usize {
        self.inner.concurrency - self.inner.state.lock().available
    }

    /// Waits for a free slot.
    pub async fn acquire(&self) -> Permit {
        let slot = {
            let mut state = self.inner.state.lock();
            if state.waiters.is_empty() && state.available > 0 {
                state.available -= 1;
                return Permit {
                    inner: self.inner.clone(),
                };
            }
            let (tx, rx) = bounded(1);
            state.waiters.push_back(tx);
            rx
        };
        let mut waiting = Waiting {
            inner: self.inner.clone(),
            slot,
            granted: false,
        };
        // the sender stays queued in `inner` until it is handed a slot
        let _ = waiting.slot.recv().await;
        waiting.granted = true;
        Permit {
            inner: self.inner.clone(),
        }
    }

    pub async fn add<F: Future>(&self, task: F) -> F::Output {
        let _permit = self.acquire().await;
        task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::task;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_limits_concurrency() {
        task::block_on(async {
            let queue = TaskQueue::new(4);
            let running = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let mut handles = Vec::new();
            for _ in 0..10 {
                let queue = queue.clone();
                let running = running.clone();
                let peak = peak.clone();
                handles.push(task::spawn(async move {
                    queue
                        .add(async {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            peak.fetch_max(now, Ordering::SeqCst);
                            task::sleep(Duration::from_millis(20)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                }));
            }
            for handle in handles {
                handle.await;
            }
            assert_eq!(peak.load(Ordering::SeqCst), 4);
            assert_eq!(queue.active(), 0);
        });
    }

    #[test]
    fn test_runs_in_arrival_order() {
        task::block_on(async {
            let queue = TaskQueue::new(1);
            let order = Arc::new(Mutex::new(Vec::new()));
            let mut handles = Vec::new();
            for i in 0..8 {
                let queue = queue.clone();
                let order = order.clone();
                handles.push(task::spawn(async move {
                    queue
                        .add(async {
                            order.lock().push(i);
                            task::sleep(Duration::from_millis(5)).await;
                        })
                        .await
                }));
                // let the task reach the queue before spawning the next one
                task::sleep(Duration::from_millis(2)).await;
            }
            for handle in handles {
                handle.await;
            }
            assert_eq!(*order.lock(), (0..8).collect::<Vec<_>>());
        });
    }

    #[test]
    fn test_newcomer_does_not_overtake_waiters() {
        task::block_on(async {
            let queue = TaskQueue::new(1);
            let first = queue.acquire().await;
            let waiter = {
                let queue = queue.clone();
                task::spawn(async move {
                    let _permit = queue.acquire().await;
                    task::sleep(Duration::from_millis(50)).await;
                })
            };
            task::sleep(Duration::from_millis(10)).await;
            drop(first);
            // the released slot already belongs to the waiter
            let newcomer =
                async_std::future::timeout(Duration::from_millis(10), queue.acquire()).await;
            assert!(newcomer.is_err());
            waiter.await;
            assert_eq!(queue.active(), 0);
        });
    }

    #[test]
    fn test_dropped_task_releases_slot() {
        task::block_on(async {
            let queue = TaskQueue::new(1);
            let pending = queue.add(std::future::pending::<()>());
            let _ = async_std::future::timeout(Duration::from_millis(10), pending).await;
            assert_eq!(queue.active(), 0);
            assert_eq!(queue.add(async { 7 }).await, 7);
        });
    }

    #[test]
    fn test_abandoned_waiter_passes_slot_on() {
        task::block_on(async {
            let queue = TaskQueue::new(1);
            let held = queue.acquire().await;
            // gives up while queued
            let gave_up = async_std::future::timeout(Duration::from_millis(10), queue.acquire()).await;
            assert!(gave_up.is_err());
            drop(held);
            assert_eq!(queue.active(), 0);
            let _permit = queue.acquire().await;
            assert_eq!(queue.active(), 1);
        });
    }

    #[test]
    fn test_permit_outlives_caller() {
        task::block_on(async {
            let queue = TaskQueue::new(1);
            let permit = queue.acquire().await;
            let worker = task::spawn(async move {
                let _permit = permit;
                task::sleep(Duration::from_millis(30)).await;
            });
            assert_eq!(queue.active(), 1);
            worker.await;
            assert_eq!(queue.active(), 0);
        });
    }
}
