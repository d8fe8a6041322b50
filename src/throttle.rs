//! Debounce/coalescing scheduler used to rate-limit bursts of requests
//! (keystrokes, hover events) before they reach the ghc-mod session.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::oneshot;

type Factory<T> = Box<dyn FnOnce() -> BoxFuture<'static, T> + Send>;

/// A task waiting to run, together with everyone awaiting its result.
struct PendingRun<T> {
    factory: Factory<T>,
    waiters: Vec<oneshot::Sender<T>>,
}

struct Inner<T> {
    /// Bumped whenever the debounce window restarts; a sleeping timer task
    /// whose epoch no longer matches has been superseded.
    epoch: u64,
    /// Waiting for the debounce timer to fire.
    pending: Option<PendingRun<T>>,
    /// A produced future is currently being awaited.
    executing: bool,
    /// Runs immediately after the executing task settles; replaced by later
    /// triggers, so only the most recent caller's task survives.
    queued: Option<PendingRun<T>>,
}

/// Debounces triggered tasks and keeps at most one execution in flight plus
/// one queued behind it.
///
/// Semantics:
/// - triggers arriving while the timer is pending replace the pending task
///   and restart the delay (last caller wins);
/// - triggers arriving while a task is executing are queued; when the
///   executing task settles the queued one starts immediately, and
///   intermediate triggers never run;
/// - every caller's future settles with the result of whichever task actually
///   ran on its behalf, which may have been produced for a newer trigger.
pub struct ThrottledDelayer<T> {
    delay: Duration,
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Clone + Send + 'static> ThrottledDelayer<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            inner: Arc::new(Mutex::new(Inner {
                epoch: 0,
                pending: None,
                executing: false,
                queued: None,
            })),
        }
    }

    /// Schedules `factory` to run after the delay, coalescing with other
    /// recent triggers. Resolves to `None` only if the scheduled run is
    /// abandoned, e.g. the runtime shuts down before it settles.
    pub fn trigger<F, Fut>(&self, factory: F) -> impl Future<Output = Option<T>> + Send + 'static
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let boxed: Factory<T> = Box::new(move || factory().boxed());

        let mut inner = self.inner.lock().unwrap();
        if inner.executing {
            match &mut inner.queued {
                Some(run) => {
                    run.factory = boxed;
                    run.waiters.push(tx);
                }
                None => {
                    inner.queued = Some(PendingRun {
                        factory: boxed,
                        waiters: vec![tx],
                    });
                }
            }
        } else {
            match &mut inner.pending {
                Some(run) => {
                    run.factory = boxed;
                    run.waiters.push(tx);
                }
                None => {
                    inner.pending = Some(PendingRun {
                        factory: boxed,
                        waiters: vec![tx],
                    });
                }
            }
            // Restart the debounce window and invalidate any sleeping timer.
            inner.epoch += 1;
            self.arm(inner.epoch);
        }
        drop(inner);

        async move { rx.await.ok() }
    }

    fn arm(&self, epoch: u64) {
        let inner = Arc::clone(&self.inner);
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let run = {
                let mut guard = inner.lock().unwrap();
                if guard.epoch != epoch || guard.executing {
                    return;
                }
                let Some(run) = guard.pending.take() else {
                    return;
                };
                guard.executing = true;
                run
            };
            Self::drive(inner, run).await;
        });
    }

    /// Runs `run`, then any task queued behind it, until the queue is empty.
    async fn drive(inner: Arc<Mutex<Inner<T>>>, mut run: PendingRun<T>) {
        loop {
            let result = (run.factory)().await;
            for tx in run.waiters {
                let _ = tx.send(result.clone());
            }
            let next = {
                let mut guard = inner.lock().unwrap();
                match guard.queued.take() {
                    Some(next) => next,
                    None => {
                        guard.executing = false;
                        return;
                    }
                }
            };
            run = next;
        }
    }
}

/// Per-key table of delayers, e.g. one per open document URI.
///
/// Owned by the backend so independent sessions never share scheduler state.
pub struct DelayerRegistry<T> {
    delay: Duration,
    slots: Mutex<HashMap<String, Arc<ThrottledDelayer<T>>>>,
}

impl<T: Clone + Send + 'static> DelayerRegistry<T> {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the delayer for `key`, creating it on first use.
    pub fn delayer(&self, key: &str) -> Arc<ThrottledDelayer<T>> {
        let mut slots = self.slots.lock().unwrap();
        Arc::clone(
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(ThrottledDelayer::new(self.delay))),
        )
    }

    /// Drops the slot for `key`, e.g. when a document closes.
    pub fn remove(&self, key: &str) {
        self.slots.lock().unwrap().remove(key);
    }
}
