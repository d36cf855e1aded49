//! # Select
//!
//! Map/filter combinator over a [`Pull`].
//!
//! [`select`] pulls from an inner sequence and runs every item through an
//! asynchronous transform. A transform returning `Ok(None)` skips the item and
//! the next one is pulled; `Ok(Some(value))` is handed to the caller.
//!
//! Once the inner sequence reports [`Pulled::Terminal`], the select reports it
//! on every later call without pulling again. Errors from the inner sequence
//! and from the transform pass through unchanged. An item whose transform
//! fails is consumed and lost; it is not retried.
//!
//! ```rust
//! use pullweave::prelude::*;
//!
//! # async fn example() -> Result<(), PullError> {
//! let adapter = SourceAdapter::new(VecSource::new(vec![0, 1, -1, 2, 3]));
//! let doubled = adapter.select(|v: i32| async move { Ok((v > 0).then_some(v * 2)) });
//!
//! assert_eq!(doubled.collect_all().await?, vec![2, 4, 6]);
//! # Ok(())
//! # }
//! ```

use crate::error::PullError;
use crate::pull::{Pull, Pulled};
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

/// Creates a [`Select`] over `inner`.
pub fn select<P, F, Fut, U>(inner: P, transform: F) -> Select<P, F>
where
  P: Pull,
  F: Fn(P::Item) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Option<U>, PullError>> + Send,
  U: Send,
{
  Select::new(inner, transform)
}

/// Pull-through map/filter wrapper returned by [`select`].
pub struct Select<P, F> {
  inner: P,
  transform: F,
  finished: AtomicBool,
}

impl<P, F> Select<P, F> {
  /// Wraps `inner` with `transform`.
  pub fn new(inner: P, transform: F) -> Self {
    Self {
      inner,
      transform,
      finished: AtomicBool::new(false),
    }
  }
}

#[async_trait]
impl<P, F, Fut, U> Pull for Select<P, F>
where
  P: Pull,
  F: Fn(P::Item) -> Fut + Send + Sync,
  Fut: Future<Output = Result<Option<U>, PullError>> + Send,
  U: Send,
{
  type Item = U;

  async fn next(&self) -> Result<Pulled<U>, PullError> {
    loop {
      if self.finished.load(Ordering::Acquire) {
        return Ok(Pulled::Terminal);
      }
      match self.inner.next().await? {
        Pulled::Terminal => {
          self.finished.store(true, Ordering::Release);
          return Ok(Pulled::Terminal);
        }
        Pulled::Item(value) => {
          if let Some(selected) = (self.transform)(value).await? {
            return Ok(Pulled::Item(selected));
          }
        }
      }
    }
  }

  fn cancel(&self) {
    self.inner.cancel();
  }
}

impl<P: fmt::Debug, F> fmt::Debug for Select<P, F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Select")
      .field("inner", &self.inner)
      .field("finished", &self.finished.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}
