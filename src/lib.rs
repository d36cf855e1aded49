//! # pullweave
//!
//! Pull-based, concurrency-safe sequences over push-based sources.
//!
//! A push source announces that data became available, that it ended or that
//! it failed, and lets a consumer take whatever it has buffered without
//! blocking. pullweave turns such a source into a [`Pull`]: an object whose
//! [`next`](Pull::next) returns a future resolving to the next item, or to
//! [`Pulled::Terminal`] once the source is exhausted. Any number of call sites
//! may pull concurrently; each item is delivered exactly once, in source order.
//!
//! ## Key Features
//!
//! - **Signal-driven**: suspended pulls wait on a one-shot broadcast, never poll
//! - **No double delivery**: the source buffer is drained synchronously by one
//!   pull at a time
//! - **Deferred initialization**: attach the source later, or from an async factory
//! - **Cooperative cancellation**: pause the source and wake every waiter
//! - **Combinators**: [`select`](select::select) and [`flatten`](flatten::flatten)
//!
//! ## Quick Start
//!
//! ```rust
//! use pullweave::prelude::*;
//!
//! # async fn example() -> Result<(), PullError> {
//! let (pusher, source) = buffered();
//! let adapter = SourceAdapter::new(source);
//!
//! pusher.push(1);
//! pusher.push(2);
//! pusher.end();
//!
//! assert_eq!(adapter.next().await?, Pulled::Item(1));
//! assert_eq!(adapter.next().await?, Pulled::Item(2));
//! assert_eq!(adapter.next().await?, Pulled::Terminal);
//! # Ok(())
//! # }
//! ```
//!
//! ## Ordering
//!
//! Items leave the source in order and no item reaches two callers. When
//! several pulls are suspended at once, which of them receives which item is
//! up to the order in which the runtime resumes them.

// Documentation enforcement - treat missing docs as errors
#![deny(missing_docs)]

/// Pull-based adapter over a push-based source.
pub mod adapter;
/// Error types.
pub mod error;
/// Flattening combinator.
pub mod flatten;
/// The pull trait and its result type.
pub mod pull;
/// Map/filter combinator.
pub mod select;
/// Resettable one-shot broadcast signal.
pub mod signal;
/// The push-based source contract.
pub mod source;
/// Built-in sources.
pub mod sources;
/// Bridge to `futures::Stream`.
pub mod stream;

mod sync;

pub use adapter::{AdapterConfig, DeferredAdapter, SourceAdapter};
pub use error::PullError;
pub use flatten::{Flatten, flatten};
pub use pull::{Pull, PullExt, Pulled};
pub use select::{Select, select};
pub use signal::OneShotSignal;
pub use source::{Source, SourceEvents};

/// Commonly used items.
pub mod prelude {
  pub use crate::adapter::{AdapterConfig, DeferredAdapter, SourceAdapter};
  pub use crate::error::PullError;
  pub use crate::pull::{Pull, PullExt, Pulled};
  pub use crate::source::{Source, SourceEvents};
  pub use crate::sources::{BufferedSource, Pusher, VecSource, buffered};
}

#[cfg(test)]
mod adapter_test;
