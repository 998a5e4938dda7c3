//! Write-side counterpart of `Query`.
//!
//! A `Mutation<I, R>` wraps one API write: submit an input, poll on each tick,
//! and read back the loading/error/result state. Success and error callbacks
//! run during `poll`, on the UI task.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::api::{ApiClient, ApiError, ApiResult};

/// The state of a mutation
#[derive(Debug, Clone)]
pub enum MutationState<R> {
  Idle,
  Loading,
  Success(R),
  Error(ApiError),
}

type MutateFn<I, R> =
  Box<dyn Fn(Arc<dyn ApiClient>, I) -> BoxFuture<'static, ApiResult<R>> + Send + Sync>;

type SuccessFn<R> = Box<dyn FnMut(&R) + Send>;

type ErrorFn = Box<dyn FnMut(&ApiError) + Send>;

pub struct Mutation<I, R> {
  api: Arc<dyn ApiClient>,
  mutate: MutateFn<I, R>,
  state: MutationState<R>,
  receiver: Option<oneshot::Receiver<ApiResult<R>>>,
  on_success: Option<SuccessFn<R>>,
  on_error: Option<ErrorFn>,
}

impl<I, R> Mutation<I, R>
where
  I: Send + 'static,
  R: Send + 'static,
{
  /// Create a mutation from an async function of the API client and input.
  ///
  /// The function may fail with anything convertible into `ApiError`
  /// (including plain strings); failures are normalized before they reach
  /// the state or the error callback.
  pub fn new<F, Fut, E>(api: Arc<dyn ApiClient>, mutate: F) -> Self
  where
    F: Fn(Arc<dyn ApiClient>, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R, E>> + Send + 'static,
    E: Into<ApiError> + Send + 'static,
  {
    Self {
      api,
      mutate: Box::new(move |api, input| {
        let fut = mutate(api, input);
        async move { fut.await.map_err(Into::into) }.boxed()
      }),
      state: MutationState::Idle,
      receiver: None,
      on_success: None,
      on_error: None,
    }
  }

  pub fn on_success(mut self, callback: impl FnMut(&R) + Send + 'static) -> Self {
    self.on_success = Some(Box::new(callback));
    self
  }

  pub fn on_error(mut self, callback: impl FnMut(&ApiError) + Send + 'static) -> Self {
    self.on_error = Some(Box::new(callback));
    self
  }

  pub fn state(&self) -> &MutationState<R> {
    &self.state
  }

  pub fn is_loading(&self) -> bool {
    matches!(self.state, MutationState::Loading)
  }

  pub fn error(&self) -> Option<&ApiError> {
    match &self.state {
      MutationState::Error(e) => Some(e),
      _ => None,
    }
  }

  pub fn result(&self) -> Option<&R> {
    match &self.state {
      MutationState::Success(r) => Some(r),
      _ => None,
    }
  }

  /// Start the mutation.
  ///
  /// Returns `false` without doing anything if a submission is already in
  /// flight.
  pub fn submit(&mut self, input: I) -> bool {
    if self.is_loading() {
      debug!("mutation already in flight, ignoring submit");
      return false;
    }

    let (tx, rx) = oneshot::channel();
    self.receiver = Some(rx);
    self.state = MutationState::Loading;

    let task = tokio::spawn((self.mutate)(Arc::clone(&self.api), input));
    tokio::spawn(async move {
      let result = task.await.unwrap_or_else(|e| Err(ApiError::from(e)));
      let _ = tx.send(result);
    });

    true
  }

  /// Poll for the outcome of a pending submission.
  ///
  /// Returns `true` if the state changed. Callbacks run from here.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    let result = match receiver.try_recv() {
      Ok(result) => result,
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => Err(ApiError::new("Mutation was cancelled")),
    };
    self.receiver = None;

    match result {
      Ok(value) => {
        if let Some(callback) = self.on_success.as_mut() {
          callback(&value);
        }
        self.state = MutationState::Success(value);
      }
      Err(error) => {
        warn!(error = %error, status = ?error.status, "mutation failed");
        if let Some(callback) = self.on_error.as_mut() {
          callback(&error);
        }
        self.state = MutationState::Error(error);
      }
    }

    true
  }

  /// Return to idle, dropping any result, error or pending submission.
  pub fn reset(&mut self) {
    self.receiver = None;
    self.state = MutationState::Idle;
  }
}
