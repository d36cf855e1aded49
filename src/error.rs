//! # Error Handling
//!
//! Errors surfaced by pull operations.
//!
//! Every failure a caller can observe from [`Pull::next`](crate::pull::Pull::next)
//! is a [`PullError`]. The type is cheap to clone because an adapter hands the
//! same sticky error to every pending and future caller once it has been set.
//!
//! ## Error Kinds
//!
//! - **Source**: the underlying source reported a fault, or the factory that
//!   was supposed to produce the source failed
//! - **Cancelled**: the consumer stopped the adapter on purpose
//! - **AlreadyInitialized**: a deferred adapter was initialized twice
//! - **Transform**: a `select` transform failed for a single item
//!
//! ## Example
//!
//! ```rust
//! use pullweave::error::PullError;
//!
//! let error = PullError::source_message("connection reset");
//! assert!(!error.is_cancelled());
//! assert_eq!(error.to_string(), "source failed: connection reset");
//! ```

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error accepted from sources, factories and transforms.
pub type BoxError = Box<dyn Error + Send + Sync>;

/// Error returned by a pull operation.
///
/// Source errors and cancellation are sticky: once an adapter has stored one,
/// it is the outcome of every later pull. Cloning shares the wrapped error, so
/// callers can check identity with [`PullError::ptr_eq`].
#[derive(Error, Debug, Clone)]
pub enum PullError {
  /// The source (or the factory producing it) reported a fault.
  #[error("source failed: {0}")]
  Source(Arc<dyn Error + Send + Sync>),
  /// The adapter was cancelled by its consumer.
  #[error("pull cancelled")]
  Cancelled,
  /// `init` was called on a deferred adapter that was already initialized.
  #[error("adapter already initialized")]
  AlreadyInitialized,
  /// A `select` transform failed. The item it was applied to is lost.
  #[error("transform failed: {0}")]
  Transform(Arc<dyn Error + Send + Sync>),
}

impl PullError {
  /// Wraps a source fault.
  pub fn from_source<E: Into<BoxError>>(error: E) -> Self {
    PullError::Source(Arc::from(error.into()))
  }

  /// Wraps a transform failure.
  pub fn from_transform<E: Into<BoxError>>(error: E) -> Self {
    PullError::Transform(Arc::from(error.into()))
  }

  /// Creates a source fault from a plain message.
  pub fn source_message(message: impl Into<String>) -> Self {
    Self::from_source(StringError(message.into()))
  }

  /// Creates a transform failure from a plain message.
  pub fn transform_message(message: impl Into<String>) -> Self {
    Self::from_transform(StringError(message.into()))
  }

  /// Returns `true` if the adapter was stopped on purpose.
  #[must_use]
  pub fn is_cancelled(&self) -> bool {
    matches!(self, PullError::Cancelled)
  }

  /// Returns `true` if both errors are the same error instance.
  ///
  /// Unit variants compare equal by kind; wrapped errors compare by pointer,
  /// which is how a sticky error can be recognised across callers.
  #[must_use]
  pub fn ptr_eq(&self, other: &PullError) -> bool {
    match (self, other) {
      (PullError::Source(a), PullError::Source(b)) => Arc::ptr_eq(a, b),
      (PullError::Transform(a), PullError::Transform(b)) => Arc::ptr_eq(a, b),
      (PullError::Cancelled, PullError::Cancelled) => true,
      (PullError::AlreadyInitialized, PullError::AlreadyInitialized) => true,
      _ => false,
    }
  }
}

/// A simple error type that wraps a string message.
///
/// This is useful for creating errors from string messages without
/// needing to implement a full error type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringError(pub String);

impl fmt::Display for StringError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Error for StringError {}
