//! # Pull Trait
//!
//! The pull-based side of the crate: [`Pulled`], the tagged result of a pull,
//! and [`Pull`], the operation every adapter and combinator implements.
//!
//! ## Concurrency
//!
//! [`Pull::next`] takes `&self`, so many call sites may pull from the same
//! adapter without waiting for each other. Each item is handed to exactly one
//! caller, in source order. Which *waiting* caller receives which item is not
//! guaranteed: it depends on the order in which the runtime resumes them.

use crate::error::PullError;
use crate::flatten::Flatten;
use crate::select::Select;
use crate::stream::{PullStream, into_stream};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Result of a successful pull.
///
/// `Terminal` is disjoint from every item value, so items such as `0`,
/// `false` or `None` are delivered like any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pulled<T> {
  /// The next item of the sequence.
  Item(T),
  /// The sequence is exhausted. Every later pull reports this again.
  Terminal,
}

impl<T> Pulled<T> {
  /// Returns `true` for [`Pulled::Terminal`].
  #[must_use]
  pub fn is_terminal(&self) -> bool {
    matches!(self, Pulled::Terminal)
  }

  /// Converts into an `Option`, mapping `Terminal` to `None`.
  pub fn into_item(self) -> Option<T> {
    match self {
      Pulled::Item(item) => Some(item),
      Pulled::Terminal => None,
    }
  }

  /// Maps the item, leaving `Terminal` untouched.
  pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Pulled<U> {
    match self {
      Pulled::Item(item) => Pulled::Item(f(item)),
      Pulled::Terminal => Pulled::Terminal,
    }
  }
}

impl<T> From<Option<T>> for Pulled<T> {
  fn from(value: Option<T>) -> Self {
    value.map_or(Pulled::Terminal, Pulled::Item)
  }
}

/// A pull-based sequence of items.
#[async_trait]
pub trait Pull: Send + Sync {
  /// The item type produced by this sequence.
  type Item: Send;

  /// Pulls the next item.
  ///
  /// Resolves to [`Pulled::Terminal`] once the sequence is exhausted and fails
  /// with the sticky error once one has been set.
  async fn next(&self) -> Result<Pulled<Self::Item>, PullError>;

  /// Requests cooperative cancellation.
  ///
  /// Suspended and future pulls fail with [`PullError::Cancelled`] unless an
  /// error was already stored. Calling it more than once has no further effect.
  fn cancel(&self);
}

#[async_trait]
impl<P: Pull + ?Sized> Pull for Arc<P> {
  type Item = P::Item;

  async fn next(&self) -> Result<Pulled<Self::Item>, PullError> {
    (**self).next().await
  }

  fn cancel(&self) {
    (**self).cancel()
  }
}

#[async_trait]
impl<P: Pull + ?Sized> Pull for Box<P> {
  type Item = P::Item;

  async fn next(&self) -> Result<Pulled<Self::Item>, PullError> {
    (**self).next().await
  }

  fn cancel(&self) {
    (**self).cancel()
  }
}

/// Combinators available on every [`Pull`].
#[async_trait]
pub trait PullExt: Pull {
  /// Maps and filters items with an asynchronous transform.
  ///
  /// See [`select`](crate::select::select).
  fn select<U, F, Fut>(self, transform: F) -> Select<Self, F>
  where
    Self: Sized,
    F: Fn(Self::Item) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<U>, PullError>> + Send,
    U: Send,
  {
    Select::new(self, transform)
  }

  /// Merges a sequence of sequences into one.
  ///
  /// See [`flatten`](crate::flatten::flatten).
  fn flatten(self) -> Flatten<Self>
  where
    Self: Sized + 'static,
    Self::Item: Pull + 'static,
  {
    Flatten::new(self)
  }

  /// Bridges this sequence into a [`futures::Stream`].
  fn into_stream(self) -> PullStream<Self::Item>
  where
    Self: Sized + 'static,
  {
    into_stream(self)
  }

  /// Pulls one item at a time until the sequence is exhausted.
  async fn collect_all(&self) -> Result<Vec<Self::Item>, PullError> {
    let mut items = Vec::new();
    while let Pulled::Item(item) = self.next().await? {
      items.push(item);
    }
    Ok(items)
  }
}

impl<P: Pull + ?Sized> PullExt for P {}
