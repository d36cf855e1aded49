//! Source over a preloaded vector.

use crate::source::{Source, SourceEvents};
use std::collections::VecDeque;

/// A source whose items are all buffered up front.
///
/// Reports readiness and its end as soon as it is attached.
#[derive(Debug, Clone)]
pub struct VecSource<T> {
  data: VecDeque<T>,
  paused: bool,
}

impl<T: Send + 'static> VecSource<T> {
  /// Creates a source yielding `data` in order.
  pub fn new(data: Vec<T>) -> Self {
    Self {
      data: data.into(),
      paused: false,
    }
  }

  /// Number of items not taken yet.
  pub fn remaining(&self) -> usize {
    self.data.len()
  }
}

impl<T: Send + 'static> From<Vec<T>> for VecSource<T> {
  fn from(data: Vec<T>) -> Self {
    Self::new(data)
  }
}

impl<T: Send + 'static> Source for VecSource<T> {
  type Item = T;

  fn attach(&mut self, events: SourceEvents) {
    events.ready();
    events.end();
  }

  fn try_take(&mut self) -> Option<T> {
    if self.paused {
      return None;
    }
    self.data.pop_front()
  }

  fn pause(&mut self) {
    self.paused = true;
  }
}
