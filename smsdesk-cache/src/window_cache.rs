use crate::{is_valid, CacheWindow, Clock, SystemClock, WindowKey, DEFAULT_TTL};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::debug;

type SharedFetch<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

/// Introspection snapshot, no behavioral contract.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
    /// Fetches currently in flight.
    pub pending: usize,
}

struct PendingFetch<T, E> {
    id: u64,
    future: SharedFetch<T, E>,
}

struct State<T, E> {
    windows: HashMap<String, CacheWindow<T>>,
    pending: HashMap<String, PendingFetch<T, E>>,
    // Bumped on invalidation so fetches started before it don't store results.
    generation: u64,
    next_fetch_id: u64,
}

/// In-memory TTL cache of listing windows with single-flight fetching.
///
/// Cloning is cheap and clones share the same storage.
pub struct WindowCache<T, E> {
    state: Arc<Mutex<State<T, E>>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T, E> WindowCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                windows: HashMap::new(),
                pending: HashMap::new(),
                generation: 0,
                next_fetch_id: 0,
            })),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Return the window for `(offset, service, country)`, fetching it with
    /// `fetch` only when nothing is in flight and nothing fresh is cached.
    ///
    /// Callers arriving while a fetch for the same key is in flight wait for
    /// that fetch instead of starting another one. Failed fetches are not
    /// cached; the next call starts over.
    ///
    /// `fetch` is invoked with the cache lock held and must not touch this
    /// cache synchronously (awaiting inside the returned future is fine).
    /// The returned future is spawned on the current tokio runtime and runs
    /// to completion even if this call is dropped.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        offset: u64,
        service: Option<&str>,
        country: Option<&str>,
        fetch: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let key = WindowKey::new(offset, service, country).into_string();

        let in_flight = {
            let mut state = self.lock();

            let joined = state.pending.get(&key).map(|p| p.future.clone());
            if let Some(future) = joined {
                debug!(key = %key, "joining in-flight fetch");
                future
            } else {
                let now = self.clock.now();
                let cached = state
                    .windows
                    .get(&key)
                    .filter(|window| is_valid(*window, now, self.ttl))
                    .map(|window| window.payload.clone());
                if let Some(payload) = cached {
                    debug!(key = %key, "window cache hit");
                    return Ok(payload);
                }

                if state.windows.remove(&key).is_some() {
                    debug!(key = %key, "window expired");
                }
                debug!(key = %key, "window cache miss, fetching");
                self.start_fetch(&mut state, key, fetch())
            }
        };

        in_flight.await
    }

    // Registers the in-flight future before anyone awaits it. The fetch runs
    // in its own task so it settles, and clears its marker, even when every
    // caller has gone away.
    fn start_fetch<Fut>(
        &self,
        state: &mut State<T, E>,
        key: String,
        fetch: Fut,
    ) -> SharedFetch<T, E>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let id = state.next_fetch_id;
        state.next_fetch_id += 1;
        let generation = state.generation;

        let shared_state = Arc::clone(&self.state);
        let clock = Arc::clone(&self.clock);
        let fetch_key = key.clone();

        let task = tokio::spawn(async move {
            let result = fetch.await;

            let mut state = shared_state.lock().unwrap_or_else(PoisonError::into_inner);
            if state.pending.get(&fetch_key).map(|p| p.id) == Some(id) {
                state.pending.remove(&fetch_key);
            }
            match &result {
                Ok(payload) if state.generation == generation => {
                    let window = CacheWindow::new(fetch_key.clone(), payload.clone(), clock.now());
                    state.windows.insert(fetch_key, window);
                }
                Ok(_) => {
                    debug!(key = %fetch_key, "cache invalidated during fetch, result not stored")
                }
                Err(_) => debug!(key = %fetch_key, "fetch failed, nothing cached"),
            }
            result
        });

        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                // Only runtime shutdown cancels the task, and its waiters go with it.
                Err(_) => futures::future::pending().await,
            }
        }
        .boxed()
        .shared();

        state.pending.insert(
            key,
            PendingFetch {
                id,
                future: future.clone(),
            },
        );
        future
    }

    /// Drop every cached window and in-flight marker.
    pub fn invalidate_all(&self) {
        let mut state = self.lock();
        let dropped = state.windows.len();
        state.windows.clear();
        state.pending.clear();
        state.generation += 1;
        debug!(dropped, "window cache invalidated");
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let mut keys: Vec<String> = state.windows.keys().cloned().collect();
        keys.sort();
        CacheStats {
            size: keys.len(),
            keys,
            pending: state.pending.len(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T, E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, E> Clone for WindowCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            ttl: self.ttl,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<T, E> Default for WindowCache<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T, E> fmt::Debug for WindowCache<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("WindowCache")
            .field("ttl", &self.ttl)
            .field("windows", &state.windows.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}
