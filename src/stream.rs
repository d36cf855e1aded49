//! Bridges a [`Pull`] into a [`futures::Stream`].
//!
//! The stream pulls one item per poll cycle, ends on [`Pulled::Terminal`] and
//! yields a failure once before ending.

use crate::error::PullError;
use crate::pull::{Pull, Pulled};
use async_stream::stream;
use futures::Stream;
use std::pin::Pin;

/// Boxed stream produced by [`into_stream`].
pub type PullStream<T> = Pin<Box<dyn Stream<Item = Result<T, PullError>> + Send>>;

/// Turns `pull` into a stream of its items.
pub fn into_stream<P>(pull: P) -> PullStream<P::Item>
where
  P: Pull + 'static,
{
  Box::pin(stream! {
    loop {
      match pull.next().await {
        Ok(Pulled::Item(item)) => yield Ok(item),
        Ok(Pulled::Terminal) => break,
        Err(error) => {
          yield Err(error);
          break;
        }
      }
    }
  })
}
