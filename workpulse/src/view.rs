//! Data views: snapshots of server collections kept fresh by the bus.
//!
//! A [`DataView`] subscribes to the domains it renders, fetches once on
//! mount, and refetches whenever one of those domains advances. Every
//! fetch takes a sequence number at start; a result is applied only if it
//! is newer than the last applied one, so a slow stale response never
//! overwrites a fresher snapshot. A failed fetch keeps the previous
//! snapshot and records a notice. Results that arrive after the view is
//! dropped are discarded.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::api::ApiError;
use crate::bus::{Domain, Subscription, UpdateBus};

/// Loads the full collection a view renders.
pub trait Fetch<T>: Send + Sync + 'static {
    /// Fetch the current records.
    fn fetch(&self) -> impl Future<Output = Result<Vec<T>, ApiError>> + Send;
}

/// A [`Fetch`] built from a closure returning a future.
pub struct FetchFn<F, T> {
    f: F,
    _records: PhantomData<fn() -> T>,
}

/// Wrap a closure as a [`Fetch`] implementation.
pub const fn fetch_fn<F, Fut, T>(f: F) -> FetchFn<F, T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, ApiError>> + Send,
{
    FetchFn {
        f,
        _records: PhantomData,
    }
}

impl<F, Fut, T> Fetch<T> for FetchFn<F, T>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Vec<T>, ApiError>> + Send,
    T: 'static,
{
    fn fetch(&self) -> impl Future<Output = Result<Vec<T>, ApiError>> + Send {
        (self.f)()
    }
}

/// What a view currently shows.
#[derive(Debug, Clone)]
pub struct ViewState<T> {
    /// Last successfully fetched records, in server order.
    pub records: Arc<Vec<T>>,
    /// Whether a fetch is in flight.
    pub loading: bool,
    /// Message from the last failed fetch, until dismissed or superseded.
    pub notice: Option<String>,
    /// Number of snapshots applied so far.
    pub revision: u64,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(Vec::new()),
            loading: false,
            notice: None,
            revision: 0,
        }
    }
}

struct Inner<T, F> {
    name: String,
    fetcher: F,
    runtime: Handle,
    state: watch::Sender<ViewState<T>>,
    started: AtomicU64,
    applied: Mutex<u64>,
    mounted: AtomicBool,
}

impl<T, F> Inner<T, F>
where
    T: Send + Sync + 'static,
    F: Fetch<T>,
{
    async fn refresh(&self) {
        // Raise the flag before taking a number, so it can never land after
        // a newer fetch has already cleared it.
        self.state.send_if_modified(|s| !std::mem::replace(&mut s.loading, true));
        let seq = self.started.fetch_add(1, Ordering::AcqRel) + 1;
        let result = self.fetcher.fetch().await;
        self.apply(seq, result);
    }

    fn spawn_refresh(self: Arc<Self>) {
        let runtime = self.runtime.clone();
        runtime.spawn(async move { self.refresh().await });
    }

    fn apply(&self, seq: u64, result: Result<Vec<T>, ApiError>) {
        if !self.mounted.load(Ordering::Acquire) {
            tracing::debug!(view = %self.name, seq, "view unmounted, discarding fetch result");
            return;
        }

        let mut applied = self.applied.lock();
        if seq <= *applied {
            tracing::debug!(view = %self.name, seq, applied = *applied, "discarding stale fetch result");
            let still_loading = *applied < self.started.load(Ordering::Acquire);
            self.state
                .send_if_modified(|s| std::mem::replace(&mut s.loading, still_loading) != still_loading);
            return;
        }
        *applied = seq;
        let still_loading = seq < self.started.load(Ordering::Acquire);

        match result {
            Ok(records) => {
                tracing::debug!(view = %self.name, seq, count = records.len(), "snapshot replaced");
                self.state.send_modify(|s| {
                    s.records = Arc::new(records);
                    s.notice = None;
                    s.revision += 1;
                    s.loading = still_loading;
                });
            }
            Err(e) => {
                tracing::warn!(view = %self.name, seq, err = %e, "fetch failed, keeping last snapshot");
                let notice = format!("Could not refresh {}: {e}", self.name);
                self.state.send_modify(|s| {
                    s.notice = Some(notice);
                    s.loading = still_loading;
                });
            }
        }
    }
}

/// A mounted view over one server collection.
pub struct DataView<T, F> {
    inner: Arc<Inner<T, F>>,
    _subscriptions: Vec<Subscription>,
}

impl<T, F> DataView<T, F>
where
    T: Send + Sync + 'static,
    F: Fetch<T>,
{
    /// Subscribe to `domains`, then perform the initial fetch.
    ///
    /// Resolves once the initial fetch has been applied (or has failed).
    pub async fn mount(
        name: impl Into<String>,
        bus: &Arc<UpdateBus>,
        domains: &[Domain],
        fetcher: F,
    ) -> Self {
        let inner = Arc::new(Inner {
            name: name.into(),
            fetcher,
            runtime: Handle::current(),
            state: watch::Sender::new(ViewState::default()),
            started: AtomicU64::new(0),
            applied: Mutex::new(0),
            mounted: AtomicBool::new(true),
        });

        let subscriptions = domains
            .iter()
            .map(|&domain| {
                let weak = Arc::downgrade(&inner);
                bus.subscribe(domain, move |generation| {
                    if let Some(inner) = weak.upgrade() {
                        tracing::debug!(view = %inner.name, %domain, generation, "refetching");
                        inner.spawn_refresh();
                    }
                })
            })
            .collect();
        tracing::debug!(view = %inner.name, ?domains, "view mounted");

        let view = Self {
            inner,
            _subscriptions: subscriptions,
        };
        view.refresh().await;
        view
    }

    /// Refetch now. This is the retry path after a failed fetch.
    pub async fn refresh(&self) {
        self.inner.refresh().await;
    }

    /// Current state (cloned; records are shared).
    #[must_use]
    pub fn state(&self) -> ViewState<T> {
        let state = self.inner.state.borrow();
        ViewState {
            records: Arc::clone(&state.records),
            loading: state.loading,
            notice: state.notice.clone(),
            revision: state.revision,
        }
    }

    /// Current records.
    #[must_use]
    pub fn records(&self) -> Arc<Vec<T>> {
        Arc::clone(&self.inner.state.borrow().records)
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ViewState<T>> {
        self.inner.state.subscribe()
    }

    /// Clear the current notice.
    pub fn dismiss_notice(&self) {
        self.inner
            .state
            .send_if_modified(|s| s.notice.take().is_some());
    }

    /// View name used in logs and notices.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Release the subscriptions and discard any in-flight results.
    pub fn unmount(self) {}
}

impl<T, F> Drop for DataView<T, F> {
    fn drop(&mut self) {
        self.inner.mounted.store(false, Ordering::Release);
        tracing::debug!(view = %self.inner.name, "view unmounted");
    }
}
