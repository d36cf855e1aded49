//! # Flatten
//!
//! Merges a sequence of sequences into one.
//!
//! The outer [`Pull`] yields sub-sequences; [`Flatten`] drains each of them in
//! turn. Empty sub-sequences are skipped transparently.
//!
//! ## Sharing the Outer Cursor
//!
//! All concurrent pulls share one in-flight acquisition of the current
//! sub-sequence. When several of them find that sub-sequence exhausted at the
//! same time, only the first one advances the outer cursor: an acquisition is
//! replaced only if it is still the one the caller observed. The others retry
//! against the acquisition that replaced it instead of skipping sub-sequences.

use crate::error::PullError;
use crate::pull::{Pull, Pulled};
use crate::sync::lock;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, trace};

type AcquireFuture<S> = Shared<BoxFuture<'static, Result<Option<Arc<S>>, PullError>>>;

/// One pull of the outer sequence, shared by every caller that observed it.
struct Acquisition<S> {
  id: u64,
  future: AcquireFuture<S>,
}

impl<S> Clone for Acquisition<S> {
  fn clone(&self) -> Self {
    Self {
      id: self.id,
      future: self.future.clone(),
    }
  }
}

/// Creates a [`Flatten`] over `outer`.
pub fn flatten<P>(outer: P) -> Flatten<P>
where
  P: Pull + 'static,
  P::Item: Pull + 'static,
{
  Flatten::new(outer)
}

/// Pull-through wrapper returned by [`flatten`].
pub struct Flatten<P: Pull> {
  outer: Arc<P>,
  current: Mutex<Option<Acquisition<P::Item>>>,
  next_id: AtomicU64,
  outer_exhausted: AtomicBool,
}

impl<P> Flatten<P>
where
  P: Pull + 'static,
  P::Item: Pull + 'static,
{
  /// Wraps `outer`.
  pub fn new(outer: P) -> Self {
    Self {
      outer: Arc::new(outer),
      current: Mutex::new(None),
      next_id: AtomicU64::new(0),
      outer_exhausted: AtomicBool::new(false),
    }
  }

  fn acquire(&self) -> Acquisition<P::Item> {
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let outer = Arc::clone(&self.outer);
    debug!(acquisition = id, "acquiring next sub-sequence");
    let future = async move {
      let pulled = outer.next().await?;
      Ok::<_, PullError>(pulled.into_item().map(Arc::new))
    }
    .boxed()
    .shared();
    Acquisition { id, future }
  }

  fn current_or_acquire(&self) -> Acquisition<P::Item> {
    lock(&self.current)
      .get_or_insert_with(|| self.acquire())
      .clone()
  }

  /// Moves the outer cursor past acquisition `id`, unless another caller already did.
  fn advance_past(&self, id: u64) {
    let mut current = lock(&self.current);
    if current.as_ref().is_some_and(|acquisition| acquisition.id == id) {
      *current = Some(self.acquire());
    } else {
      trace!(acquisition = id, "outer cursor already advanced");
    }
  }
}

#[async_trait]
impl<P> Pull for Flatten<P>
where
  P: Pull + 'static,
  P::Item: Pull + 'static,
{
  type Item = <P::Item as Pull>::Item;

  async fn next(&self) -> Result<Pulled<Self::Item>, PullError> {
    loop {
      if self.outer_exhausted.load(Ordering::Acquire) {
        return Ok(Pulled::Terminal);
      }
      let acquisition = self.current_or_acquire();
      let Some(sub) = acquisition.future.clone().await? else {
        debug!("outer sequence exhausted");
        self.outer_exhausted.store(true, Ordering::Release);
        return Ok(Pulled::Terminal);
      };
      match sub.next().await? {
        Pulled::Item(item) => return Ok(Pulled::Item(item)),
        Pulled::Terminal => self.advance_past(acquisition.id),
      }
    }
  }

  fn cancel(&self) {
    self.outer.cancel();
    if let Some(acquisition) = lock(&self.current).as_ref() {
      if let Some(Ok(Some(sub))) = acquisition.future.peek() {
        sub.cancel();
      }
    }
  }
}

impl<P: Pull> fmt::Debug for Flatten<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Flatten")
      .field("acquisition", &lock(&self.current).as_ref().map(|a| a.id))
      .field("outer_exhausted", &self.outer_exhausted.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}
