//! # One-Shot Signal
//!
//! A resettable readiness broadcast used to wake suspended pulls.
//!
//! A [`OneShotSignal`] is made of rounds. [`OneShotSignal::wait`] subscribes to
//! the current round; every subscriber of a round settles together when the
//! round is resolved or rejected (fan-out, not queueing). Settling swaps in a
//! fresh round before the old one fires, so a waiter that wakes up and
//! subscribes again never lands on a round that has already fired.
//!
//! ```rust
//! use pullweave::signal::OneShotSignal;
//!
//! # async fn example() {
//! let signal = OneShotSignal::new();
//! let first = signal.wait();
//! let second = signal.wait();
//! signal.resolve();
//! assert!(first.await.is_ok());
//! assert!(second.await.is_ok());
//! # }
//! ```

use crate::error::PullError;
use crate::sync::lock;
use futures::future::{FutureExt, Shared};
use futures::ready;
use pin_project::pin_project;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tracing::trace;

type Outcome = Result<(), PullError>;

struct Round {
  tx: oneshot::Sender<Outcome>,
  rx: Shared<oneshot::Receiver<Outcome>>,
}

impl Round {
  fn new() -> Self {
    let (tx, rx) = oneshot::channel();
    Self { tx, rx: rx.shared() }
  }
}

/// Single-fire broadcast that re-arms itself after every settlement.
pub struct OneShotSignal {
  round: Mutex<Round>,
}

impl OneShotSignal {
  /// Creates a signal with one pending round.
  pub fn new() -> Self {
    Self {
      round: Mutex::new(Round::new()),
    }
  }

  /// Subscribes to the current round.
  ///
  /// All futures obtained before the next settlement resolve together.
  pub fn wait(&self) -> SignalWait {
    SignalWait {
      inner: lock(&self.round).rx.clone(),
    }
  }

  /// Fires the current round successfully.
  pub fn resolve(&self) {
    trace!("OneShotSignal::resolve()");
    self.settle(Ok(()));
  }

  /// Fires the current round with `error`.
  pub fn reject(&self, error: PullError) {
    trace!(%error, "OneShotSignal::reject()");
    self.settle(Err(error));
  }

  fn settle(&self, outcome: Outcome) {
    // The replacement must be installed before any waiter can resume.
    let fired = std::mem::replace(&mut *lock(&self.round), Round::new());
    let _ = fired.tx.send(outcome);
  }
}

impl Default for OneShotSignal {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for OneShotSignal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("OneShotSignal").finish_non_exhaustive()
  }
}

/// Future returned by [`OneShotSignal::wait`].
///
/// Resolves to `Ok(())` when its round is resolved and to the rejection error
/// when it is rejected. A signal dropped without settling reads as
/// [`PullError::Cancelled`].
#[pin_project]
#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct SignalWait {
  #[pin]
  inner: Shared<oneshot::Receiver<Outcome>>,
}

impl Future for SignalWait {
  type Output = Outcome;

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
    match ready!(self.project().inner.poll(cx)) {
      Ok(outcome) => Poll::Ready(outcome),
      Err(_) => Poll::Ready(Err(PullError::Cancelled)),
    }
  }
}

impl fmt::Debug for SignalWait {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SignalWait").finish_non_exhaustive()
  }
}
