//! In-memory push source.
//!
//! [`buffered`] returns a [`Pusher`] and a [`BufferedSource`] sharing one
//! buffer. The pusher side is what a producer task holds; the source side is
//! handed to a [`SourceAdapter`](crate::adapter::SourceAdapter). Events that
//! happen before the source is attached are replayed on attachment.
//!
//! ```rust
//! use pullweave::prelude::*;
//!
//! # async fn example() -> Result<(), PullError> {
//! let (pusher, source) = buffered();
//! let adapter = SourceAdapter::new(source);
//!
//! tokio::spawn(async move {
//!   for line in ["a", "b"] {
//!     pusher.push(line);
//!   }
//!   pusher.end();
//! });
//!
//! assert_eq!(adapter.collect_all().await?, vec!["a", "b"]);
//! # Ok(())
//! # }
//! ```

use crate::error::PullError;
use crate::source::{Source, SourceEvents};
use crate::sync::lock;
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{trace, warn};

struct Buffer<T> {
  items: VecDeque<T>,
  ended: bool,
  failure: Option<PullError>,
  paused: bool,
  events: Option<SourceEvents>,
}

impl<T> Buffer<T> {
  fn is_closed(&self) -> bool {
    self.ended || self.failure.is_some()
  }
}

/// Creates a connected [`Pusher`] / [`BufferedSource`] pair.
pub fn buffered<T: Send + 'static>() -> (Pusher<T>, BufferedSource<T>) {
  let buffer = Arc::new(Mutex::new(Buffer {
    items: VecDeque::new(),
    ended: false,
    failure: None,
    paused: false,
    events: None,
  }));
  (
    Pusher {
      buffer: Arc::clone(&buffer),
    },
    BufferedSource { buffer },
  )
}

/// Producer side of a [`BufferedSource`].
pub struct Pusher<T> {
  buffer: Arc<Mutex<Buffer<T>>>,
}

impl<T: Send + 'static> Pusher<T> {
  /// Buffers `item` and reports readiness.
  ///
  /// Returns `false` and drops the item if the source already ended or failed.
  pub fn push(&self, item: T) -> bool {
    let events = {
      let mut buffer = lock(&self.buffer);
      if buffer.is_closed() {
        warn!("push after the source was closed, dropping item");
        return false;
      }
      buffer.items.push_back(item);
      buffer.events.clone()
    };
    if let Some(events) = events {
      events.ready();
    }
    true
  }

  /// Reports that no more items will be pushed.
  pub fn end(&self) {
    let events = {
      let mut buffer = lock(&self.buffer);
      if buffer.is_closed() {
        return;
      }
      buffer.ended = true;
      buffer.events.clone()
    };
    if let Some(events) = events {
      events.end();
    }
  }

  /// Reports a fault. Only the first failure is kept.
  pub fn fail(&self, error: PullError) {
    let events = {
      let mut buffer = lock(&self.buffer);
      if buffer.is_closed() {
        return;
      }
      buffer.failure = Some(error.clone());
      buffer.events.clone()
    };
    if let Some(events) = events {
      events.error(error);
    }
  }

  /// Returns `true` once the consumer side asked the source to pause.
  #[must_use]
  pub fn is_paused(&self) -> bool {
    lock(&self.buffer).paused
  }

  /// Number of items buffered and not taken yet.
  pub fn buffered_len(&self) -> usize {
    lock(&self.buffer).items.len()
  }
}

impl<T> Clone for Pusher<T> {
  fn clone(&self) -> Self {
    Self {
      buffer: Arc::clone(&self.buffer),
    }
  }
}

impl<T> fmt::Debug for Pusher<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let buffer = lock(&self.buffer);
    f.debug_struct("Pusher")
      .field("buffered", &buffer.items.len())
      .field("ended", &buffer.ended)
      .field("paused", &buffer.paused)
      .finish()
  }
}

/// Consumer side of [`buffered`].
pub struct BufferedSource<T> {
  buffer: Arc<Mutex<Buffer<T>>>,
}

impl<T: Send + 'static> Source for BufferedSource<T> {
  type Item = T;

  fn attach(&mut self, events: SourceEvents) {
    let mut buffer = lock(&self.buffer);
    trace!(buffered = buffer.items.len(), "BufferedSource::attach()");
    if !buffer.items.is_empty() {
      events.ready();
    }
    if let Some(error) = &buffer.failure {
      events.error(error.clone());
    } else if buffer.ended {
      events.end();
    }
    buffer.events = Some(events);
  }

  fn try_take(&mut self) -> Option<T> {
    let mut buffer = lock(&self.buffer);
    if buffer.paused {
      return None;
    }
    buffer.items.pop_front()
  }

  fn pause(&mut self) {
    lock(&self.buffer).paused = true;
  }
}

impl<T> fmt::Debug for BufferedSource<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("BufferedSource").finish_non_exhaustive()
  }
}
