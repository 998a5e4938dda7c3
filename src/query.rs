//! Async query abstraction for data fetching.
//!
//! Inspired by TanStack Query, this module provides a `Query<T, D>` type that
//! encapsulates async data fetching, loading states, and error handling. `D`
//! is the dependency value the fetcher is called with; changing it through
//! `set_deps` re-runs the query.
//!
//! # Example
//!
//! ```ignore
//! let api = ctx.api.clone();
//! let mut query = Query::with_deps(project_id, move |id: String| {
//!     let api = api.clone();
//!     async move { api.get_project(&id).await }
//! });
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! // Navigating to a sibling project re-fetches; a late response for the
//! // previous id is discarded.
//! query.set_deps(next_id);
//! ```

use futures::future::{BoxFuture, FutureExt};
use std::future::Future;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::api::{ApiError, ApiResult};

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(ApiError),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&ApiError> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A factory function that creates futures for fetching data
type FetcherFn<T, D> = Box<dyn Fn(D) -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;

/// A result tagged with the generation of the fetch that produced it
type Tagged<T> = (u64, ApiResult<T>);

/// Async query for data fetching with state management.
///
/// Every fetch bumps a generation counter; `poll` only applies results whose
/// generation is still current, so a slow response for superseded
/// dependencies never overwrites newer state.
pub struct Query<T, D = ()> {
  state: QueryState<T>,
  fetcher: FetcherFn<T, D>,
  deps: D,
  tx: mpsc::UnboundedSender<Tagged<T>>,
  rx: mpsc::UnboundedReceiver<Tagged<T>>,
  generation: u64,
  in_flight: Option<AbortHandle>,
  fetched_at: Option<Instant>,
  stale_time: Duration,
  /// Keep showing the last successful data while refetching or after a
  /// failed refetch
  keep_previous: bool,
  previous: Option<T>,
}

impl<T: Send + 'static> Query<T, ()> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    Self::with_deps((), move |()| fetcher())
  }
}

impl<T, D> Query<T, D>
where
  T: Send + 'static,
  D: Clone + PartialEq,
{
  /// Create a query whose fetcher receives a dependency value.
  pub fn with_deps<F, Fut>(deps: D, fetcher: F) -> Self
  where
    F: Fn(D) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    let (tx, rx) = mpsc::unbounded_channel();
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move |deps| fetcher(deps).boxed()),
      deps,
      tx,
      rx,
      generation: 0,
      in_flight: None,
      fetched_at: None,
      stale_time: Duration::from_secs(60), // Default 1 minute
      keep_previous: false,
      previous: None,
    }
  }

  /// Set the stale time for this query.
  ///
  /// After this duration, the data is considered stale and `is_stale()` returns true.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  /// Keep the last successful data readable through `data()` while a
  /// refetch runs, and after it fails.
  pub fn keep_previous_data(mut self) -> Self {
    self.keep_previous = true;
    self
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded, or the previous data when
  /// `keep_previous_data` is on.
  pub fn data(&self) -> Option<&T> {
    self.state.data().or(self.previous.as_ref())
  }

  /// True when `data()` is serving results from before the current fetch.
  pub fn is_previous_data(&self) -> bool {
    !self.state.is_success() && self.previous.is_some()
  }

  pub fn deps(&self) -> &D {
    &self.deps
  }

  /// Check if the query is currently loading.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if the query succeeded.
  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error if the query failed.
  pub fn error(&self) -> Option<&ApiError> {
    self.state.error()
  }

  /// Check if the data is stale (older than stale_time).
  pub fn is_stale(&self) -> bool {
    match &self.state {
      QueryState::Success(_) => self
        .fetched_at
        .map(|t| t.elapsed() > self.stale_time)
        .unwrap_or(true),
      _ => false,
    }
  }

  /// Start fetching data if not already loading.
  ///
  /// This is a no-op if the query is already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, superseding any pending fetch.
  pub fn refetch(&mut self) {
    self.start_fetch();
  }

  /// Change the dependency value, re-fetching if it differs from the current one.
  ///
  /// Returns `true` if a fetch was started.
  pub fn set_deps(&mut self, deps: D) -> bool {
    if deps == self.deps && !matches!(self.state, QueryState::Idle) {
      return false;
    }
    if deps != self.deps {
      self.previous = None;
    }
    self.deps = deps;
    self.start_fetch();
    true
  }

  /// Replace the data directly, e.g. with a mutation response or cached value.
  ///
  /// Any pending fetch is superseded.
  pub fn set_data(&mut self, data: T) {
    self.supersede();
    self.previous = None;
    self.state = QueryState::Success(data);
    self.fetched_at = Some(Instant::now());
  }

  /// Switch to new dependencies with data already in hand, without fetching.
  ///
  /// Used when a cache hit makes the request unnecessary.
  pub fn prime(&mut self, deps: D, data: T) {
    self.deps = deps;
    self.set_data(data);
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;

    while let Ok((generation, result)) = self.rx.try_recv() {
      if generation != self.generation {
        debug!(generation, current = self.generation, "discarding stale query result");
        continue;
      }

      self.in_flight = None;
      match result {
        Ok(data) => {
          self.previous = None;
          self.state = QueryState::Success(data);
          self.fetched_at = Some(Instant::now());
        }
        Err(error) => {
          self.state = QueryState::Error(error);
        }
      }
      changed = true;
    }

    changed
  }

  /// Abort the running fetch and invalidate any result it may still send.
  fn supersede(&mut self) {
    self.generation += 1;
    if let Some(handle) = self.in_flight.take() {
      handle.abort();
    }
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    self.supersede();
    let prior = std::mem::replace(&mut self.state, QueryState::Loading);
    if self.keep_previous {
      if let QueryState::Success(data) = prior {
        self.previous = Some(data);
      }
    }

    let generation = self.generation;
    let future = (self.fetcher)(self.deps.clone());
    let task = tokio::spawn(future);
    self.in_flight = Some(task.abort_handle());

    let tx = self.tx.clone();
    tokio::spawn(async move {
      // A panicking fetcher surfaces as an error instead of a dead query
      let result = task.await.unwrap_or_else(|e| Err(ApiError::from(e)));
      // Ignore send errors - the query may have been dropped
      let _ = tx.send((generation, result));
    });
  }
}

impl<T, D> Drop for Query<T, D> {
  fn drop(&mut self) {
    if let Some(handle) = self.in_flight.take() {
      handle.abort();
    }
  }
}

impl<T: std::fmt::Debug, D: std::fmt::Debug> std::fmt::Debug for Query<T, D> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("deps", &self.deps)
      .field("generation", &self.generation)
      .field("fetched_at", &self.fetched_at)
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err(ApiError::new("Something went wrong")) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(
      query.error().map(|e| e.message.as_str()),
      Some("Something went wrong")
    );
  }

  #[tokio::test]
  async fn test_query_panic_becomes_error() {
    let mut query: Query<i32> = Query::new(|| async {
      let explode = true;
      if explode {
        panic!("fetcher exploded");
      }
      Ok(0)
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert_eq!(
      query.error().map(|e| e.message.as_str()),
      Some("fetcher exploded")
    );
  }

  #[tokio::test]
  async fn test_query_stale() {
    let mut query = Query::new(|| async { Ok(42) }).with_stale_time(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    // With zero stale time, should immediately be stale
    assert!(query.is_stale());
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();
    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(42)
      }
    });

    query.fetch();
    assert!(query.is_loading());

    // Second fetch should be no-op
    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(query.poll());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(n)
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Refetch should cancel the first and start a new one
    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // Only the second fetch should have been applied
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_keep_previous_data_across_failed_refetch() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let mut query = Query::new(move || {
      let calls = calls_clone.clone();
      async move {
        match calls.fetch_add(1, Ordering::SeqCst) {
          0 => Ok(vec![1, 2]),
          1 => Err(ApiError::new("unavailable")),
          _ => Ok(vec![3]),
        }
      }
    })
    .keep_previous_data();

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert!(!query.is_previous_data());

    query.refetch();
    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&vec![1, 2]));
    assert!(query.is_previous_data());

    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert!(query.is_error());
    assert_eq!(query.data(), Some(&vec![1, 2]));

    // A later success replaces the held data
    query.refetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&vec![3]));
    assert!(!query.is_previous_data());
  }

  #[tokio::test]
  async fn test_data_cleared_while_refetching_by_default() {
    let mut query = Query::new(|| async { Ok(7) });
    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    query.refetch();
    assert!(query.data().is_none());
  }

  #[tokio::test]
  async fn test_set_deps_refetches_on_change() {
    let mut query = Query::with_deps(1u32, |n: u32| async move { Ok(n * 10) });

    // First call with equal deps still starts the initial fetch
    assert!(query.set_deps(1));
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&10));

    assert!(!query.set_deps(1));
    assert!(query.set_deps(2));
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&20));
    assert_eq!(*query.deps(), 2);
  }

  #[tokio::test]
  async fn test_slow_response_for_old_deps_is_discarded() {
    // The first id is slow, the second fast: the slow result must not win
    let mut query = Query::with_deps("slow".to_string(), |id: String| async move {
      if id == "slow" {
        tokio::time::sleep(Duration::from_millis(80)).await;
      }
      Ok(id)
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(5)).await;
    query.set_deps("fast".to_string());

    tokio::time::sleep(Duration::from_millis(120)).await;
    query.poll();
    assert_eq!(query.data().map(String::as_str), Some("fast"));

    // Nothing else arrives later
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!query.poll());
  }

  #[tokio::test]
  async fn test_prime_switches_deps_without_fetching() {
    let calls = Arc::new(AtomicU32::new(0));
    let calls_clone = calls.clone();
    let mut query = Query::with_deps(1u32, move |n: u32| {
      calls_clone.fetch_add(1, Ordering::SeqCst);
      async move { Ok(n * 10) }
    });

    query.prime(3, 99);
    assert_eq!(query.data(), Some(&99));
    assert_eq!(*query.deps(), 3);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Same deps after priming is not a change
    assert!(!query.set_deps(3));
    query.refetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();
    assert_eq!(query.data(), Some(&30));
  }

  #[tokio::test]
  async fn test_set_data_supersedes_pending_fetch() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok("from server".to_string())
    });

    query.fetch();
    query.set_data("from mutation".to_string());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!query.poll());
    assert_eq!(query.data().map(String::as_str), Some("from mutation"));
  }
}
