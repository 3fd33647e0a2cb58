/// Per-alias debounced refresh scheduler (SPEC_FULL.md §4.6, C6).
///
/// Each alias gets its own debounce window: repeated `request_refresh` calls
/// within the window coalesce into a single refresh. A refresh already
/// in-flight is never interrupted; a request that arrives while one is
/// running is recorded as "queued" and triggers exactly one follow-up refresh
/// once the in-flight one completes (§4.6 invariant, §8 testable property).
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::trace;

type RefreshFn = dyn Fn(String) -> BoxFuture<'static, ()> + Send + Sync;

#[derive(Default)]
struct AliasState {
    timer: Option<JoinHandle<()>>,
    in_flight: bool,
    queued: bool,
}

pub struct RefreshScheduler {
    debounce: Duration,
    refresh_fn: Arc<RefreshFn>,
    states: Mutex<HashMap<String, AliasState>>,
}

impl RefreshScheduler {
    pub fn new(
        debounce: Duration,
        refresh_fn: impl Fn(String) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            debounce,
            refresh_fn: Arc::new(refresh_fn),
            states: Mutex::new(HashMap::new()),
        })
    }

    /// Requests a refresh for `alias`, coalescing with any pending debounce
    /// window or queuing behind an in-flight refresh.
    pub async fn request_refresh(self: &Arc<Self>, alias: impl Into<String>) {
        let alias = alias.into();
        let mut states = self.states.lock().await;
        let state = states.entry(alias.clone()).or_default();

        if state.in_flight {
            state.queued = true;
            trace!(alias, "refresh requested while in-flight, queuing follow-up");
            return;
        }

        if let Some(handle) = state.timer.take() {
            handle.abort();
        }

        let scheduler = Arc::clone(self);
        let alias_for_timer = alias.clone();
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(scheduler.debounce).await;
            scheduler.fire(alias_for_timer).await;
        }));
    }

    async fn fire(self: Arc<Self>, alias: String) {
        {
            let mut states = self.states.lock().await;
            let state = states.entry(alias.clone()).or_default();
            state.timer = None;
            state.in_flight = true;
        }

        (self.refresh_fn)(alias.clone()).await;

        let should_requeue = {
            let mut states = self.states.lock().await;
            let state = states.entry(alias.clone()).or_default();
            state.in_flight = false;
            let had_queue = state.queued;
            state.queued = false;
            had_queue
        };

        if should_requeue {
            self.request_refresh(alias).await;
        }
    }

    /// True while a debounce timer or an in-flight refresh is outstanding for
    /// `alias`. Intended for tests and health diagnostics.
    pub async fn is_pending(&self, alias: &str) -> bool {
        let states = self.states.lock().await;
        match states.get(alias) {
            Some(state) => state.timer.is_some() || state.in_flight || state.queued,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_scheduler(debounce: Duration) -> (Arc<RefreshScheduler>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_for_closure = Arc::clone(&counter);
        let scheduler = RefreshScheduler::new(debounce, move |_alias| {
            let counter = Arc::clone(&counter_for_closure);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
        (scheduler, counter)
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_requests_within_debounce_coalesce() {
        let (scheduler, counter) = counting_scheduler(Duration::from_millis(5));
        scheduler.request_refresh("alpha").await;
        scheduler.request_refresh("alpha").await;
        scheduler.request_refresh("alpha").await;

        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn request_during_in_flight_refresh_queues_one_followup() {
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_for_closure = Arc::clone(&counter);
        let scheduler = RefreshScheduler::new(Duration::from_millis(5), move |_alias| {
            let counter = Arc::clone(&counter_for_closure);
            Box::pin(async move {
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
            })
        });

        scheduler.request_refresh("alpha").await;
        tokio::time::advance(Duration::from_millis(5)).await;
        tokio::task::yield_now().await;
        assert!(scheduler.is_pending("alpha").await);

        // Fires while the first refresh is still sleeping inside its body.
        scheduler.request_refresh("alpha").await;
        scheduler.request_refresh("alpha").await;

        tokio::time::advance(Duration::from_millis(100)).await;
        tokio::task::yield_now().await;
        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn independent_aliases_do_not_interfere() {
        let (scheduler, counter) = counting_scheduler(Duration::from_millis(5));
        scheduler.request_refresh("alpha").await;
        scheduler.request_refresh("beta").await;

        tokio::time::advance(Duration::from_millis(20)).await;
        tokio::task::yield_now().await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
