//! # Source Trait
//!
//! The push side of the crate. A [`Source`] is an external producer that
//! buffers items on its own and announces what happens to it through the
//! [`SourceEvents`] handle it receives when an adapter attaches to it.
//!
//! ## Contract
//!
//! - [`SourceEvents::ready`] is emitted whenever at least one new item may be
//!   taken.
//! - [`SourceEvents::end`] is emitted once, after the last item has been
//!   buffered.
//! - [`SourceEvents::error`] is emitted at most once; the source is dead
//!   afterwards.
//! - [`Source::try_take`] never blocks.
//! - [`Source::pause`] is a best-effort request to stop producing.

use crate::error::PullError;
use crate::signal::OneShotSignal;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// A push-based producer of items.
pub trait Source: Send + 'static {
  /// The raw item type produced by this source.
  type Item: Send + 'static;

  /// Called once when an adapter takes ownership of the source.
  ///
  /// The source keeps `events` and reports readiness, end and errors through
  /// it. Events that happened before attachment should be replayed here.
  fn attach(&mut self, events: SourceEvents);

  /// Takes the next buffered item, or `None` if nothing is buffered right now.
  fn try_take(&mut self) -> Option<Self::Item>;

  /// Asks the source to stop producing.
  fn pause(&mut self) {}
}

/// Adapter state that sources are allowed to touch.
///
/// Kept apart from the source itself so that a source may emit events while
/// the adapter is draining it.
pub(crate) struct EventState {
  pub(crate) signal: OneShotSignal,
  sticky: OnceLock<PullError>,
  exhausted: AtomicBool,
}

impl EventState {
  pub(crate) fn new() -> Self {
    Self {
      signal: OneShotSignal::new(),
      sticky: OnceLock::new(),
      exhausted: AtomicBool::new(false),
    }
  }

  /// The sticky error, if one has been stored.
  pub(crate) fn sticky(&self) -> Option<&PullError> {
    self.sticky.get()
  }

  pub(crate) fn is_exhausted(&self) -> bool {
    self.exhausted.load(Ordering::Acquire)
  }

  /// Stores `error` unless an earlier one won, then wakes every waiter with
  /// whichever error is now sticky.
  pub(crate) fn fail(&self, error: PullError) {
    let sticky = self.sticky.get_or_init(|| error);
    self.signal.reject(sticky.clone());
  }
}

/// Handle through which a [`Source`] reports events to its adapter.
#[derive(Clone)]
pub struct SourceEvents {
  state: Arc<EventState>,
}

impl SourceEvents {
  pub(crate) fn new(state: Arc<EventState>) -> Self {
    Self { state }
  }

  /// Announces that at least one item may be available.
  pub fn ready(&self) {
    trace!("SourceEvents::ready()");
    self.state.signal.resolve();
  }

  /// Announces that the source has buffered its last item.
  pub fn end(&self) {
    if !self.state.exhausted.swap(true, Ordering::AcqRel) {
      debug!("source ended");
    }
    self.state.signal.resolve();
  }

  /// Announces a fault. Usually built with [`PullError::from_source`].
  pub fn error(&self, error: PullError) {
    debug!(%error, "source failed");
    self.state.fail(error);
  }
}

impl fmt::Debug for SourceEvents {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SourceEvents")
      .field("exhausted", &self.state.is_exhausted())
      .field("sticky", &self.state.sticky())
      .finish()
  }
}
