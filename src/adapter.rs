//! # Source Adapter
//!
//! Turns a push-based [`Source`] into a pull-based sequence.
//!
//! ## Overview
//!
//! A [`SourceAdapter`] owns its source and implements [`Pull`]. Each call to
//! [`Pull::next`] runs a non-suspending drain loop against the source's
//! buffer; when nothing is buffered it suspends on the adapter's
//! [`OneShotSignal`](crate::signal::OneShotSignal) and retries once the source
//! reports readiness, end or an error. Because many suspended pulls wake on
//! the same readiness event while only some of them find an item, a pull that
//! drains nothing goes back to sleep instead of finishing.
//!
//! ## Lifecycle
//!
//! - [`SourceAdapter::new`] attaches a ready source immediately.
//! - [`SourceAdapter::from_factory`] invokes a factory and attaches the source
//!   it eventually produces. Inside a Tokio runtime the factory future is
//!   spawned right away; otherwise it is driven by the first pulls.
//! - [`SourceAdapter::deferred`] returns a [`DeferredAdapter`] whose pulls
//!   suspend until [`DeferredAdapter::init`] supplies the source.
//!
//! Cancelling an adapter pauses its source, stores [`PullError::Cancelled`]
//! as the sticky error and wakes every suspended pull. An initialization that
//! completes after cancellation is discarded.
//!
//! ## Errors
//!
//! Source errors are sticky and pre-empt items that were still buffered when
//! the error arrived.
//!
//! ## Example
//!
//! ```rust
//! use pullweave::prelude::*;
//!
//! # async fn example() -> Result<(), PullError> {
//! let adapter = SourceAdapter::new(VecSource::new(vec![1, -2, 3]))
//!   .with_transform(|v: i32| (v > 0).then_some(v * 10));
//!
//! assert_eq!(adapter.next().await?, Pulled::Item(10));
//! assert_eq!(adapter.next().await?, Pulled::Item(30));
//! assert_eq!(adapter.next().await?, Pulled::Terminal);
//! # Ok(())
//! # }
//! ```

use crate::error::PullError;
use crate::pull::{Pull, Pulled};
use crate::source::{EventState, Source, SourceEvents};
use crate::sync::lock;
use async_trait::async_trait;
use futures::future::{BoxFuture, Either, FutureExt, Shared, select};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, trace, warn};

/// Configuration for a source adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
  /// Optional name for identifying this adapter in logs.
  pub name: Option<String>,
  /// Whether cancelling the adapter pauses its source.
  pub pause_on_cancel: bool,
}

impl Default for AdapterConfig {
  fn default() -> Self {
    Self {
      name: None,
      pause_on_cancel: true,
    }
  }
}

impl AdapterConfig {
  /// Sets the name used in log records.
  pub fn with_name(mut self, name: String) -> Self {
    self.name = Some(name);
    self
  }

  /// Sets whether cancellation pauses the source.
  pub fn with_pause_on_cancel(mut self, pause: bool) -> Self {
    self.pause_on_cancel = pause;
    self
  }

  /// Returns the current name, if set.
  pub fn name(&self) -> Option<String> {
    self.name.clone()
  }

  /// Returns whether cancellation pauses the source.
  pub fn pause_on_cancel(&self) -> bool {
    self.pause_on_cancel
  }
}

type InitFuture = Shared<BoxFuture<'static, ()>>;
type Transform<I, T> = Arc<dyn Fn(I) -> Option<T> + Send + Sync>;

enum Phase<S> {
  AwaitingInit,
  Initializing(InitFuture),
  Active(S),
  Terminal,
}

impl<S> Phase<S> {
  fn label(&self) -> &'static str {
    match self {
      Phase::AwaitingInit => "awaiting_init",
      Phase::Initializing(_) => "initializing",
      Phase::Active(_) => "active",
      Phase::Terminal => "terminal",
    }
  }
}

/// State shared by every handle to one adapter.
struct Core<S: Source> {
  events: Arc<EventState>,
  /// `Terminal` is absorbing, so it doubles as the validity token for
  /// initializations that complete late.
  phase: Mutex<Phase<S>>,
  init_claimed: AtomicBool,
  config: AdapterConfig,
}

impl<S: Source> Core<S> {
  fn new(config: AdapterConfig) -> Arc<Self> {
    Arc::new(Self {
      events: Arc::new(EventState::new()),
      phase: Mutex::new(Phase::AwaitingInit),
      init_claimed: AtomicBool::new(false),
      config,
    })
  }

  fn name(&self) -> &str {
    self.config.name.as_deref().unwrap_or("source_adapter")
  }

  fn sticky_or_cancelled(&self) -> PullError {
    self
      .events
      .sticky()
      .cloned()
      .unwrap_or(PullError::Cancelled)
  }

  /// Claims the one allowed initialization.
  fn claim_init(&self) -> Result<(), PullError> {
    if self.init_claimed.swap(true, Ordering::AcqRel) {
      return Err(PullError::AlreadyInitialized);
    }
    Ok(())
  }

  /// Hands `source` to the adapter unless the initialization that produced it
  /// has been overtaken by a cancellation.
  fn attach(&self, mut source: S) -> Result<(), PullError> {
    let mut phase = lock(&self.phase);
    if matches!(*phase, Phase::Terminal) {
      drop(phase);
      warn!(adapter = self.name(), "initialization finished after cancellation, discarding source");
      source.pause();
      return Err(self.sticky_or_cancelled());
    }
    source.attach(SourceEvents::new(Arc::clone(&self.events)));
    *phase = Phase::Active(source);
    drop(phase);
    debug!(adapter = self.name(), "source attached");
    self.events.signal.resolve();
    Ok(())
  }

  fn init_failed(&self, error: PullError) {
    let mut phase = lock(&self.phase);
    if matches!(*phase, Phase::Terminal) {
      debug!(adapter = self.name(), %error, "ignoring initialization failure after cancellation");
      return;
    }
    *phase = Phase::Terminal;
    drop(phase);
    debug!(adapter = self.name(), %error, "initialization failed");
    self.events.fail(error);
  }

  /// Installs a pending initialization driven by `pending`.
  fn begin_init<Fut>(self: &Arc<Self>, pending: Fut)
  where
    Fut: Future<Output = Result<S, PullError>> + Send + 'static,
  {
    let mut phase = lock(&self.phase);
    if !matches!(*phase, Phase::AwaitingInit) {
      debug!(adapter = self.name(), phase = phase.label(), "initialization skipped");
      return;
    }
    let core: Weak<Self> = Arc::downgrade(self);
    let init = async move {
      let outcome = pending.await;
      let Some(core) = core.upgrade() else {
        return;
      };
      match outcome {
        Ok(source) => {
          let _ = core.attach(source);
        }
        Err(error) => core.init_failed(error),
      }
    }
    .boxed()
    .shared();

    if let Ok(handle) = tokio::runtime::Handle::try_current() {
      handle.spawn(init.clone());
    }
    *phase = Phase::Initializing(init);
    drop(phase);
    debug!(adapter = self.name(), "initialization started");
    // Pulls parked while awaiting init must join the race against the new future.
    self.events.signal.resolve();
  }

  fn cancel(&self) {
    let mut phase = lock(&self.phase);
    if let Phase::Active(source) = &mut *phase {
      if self.config.pause_on_cancel {
        source.pause();
      }
    }
    let previous = std::mem::replace(&mut *phase, Phase::Terminal);
    drop(phase);
    debug!(adapter = self.name(), phase = previous.label(), "adapter cancelled");
    drop(previous);
    self.events.fail(PullError::Cancelled);
  }
}

/// Outcome of one synchronous pull attempt.
enum Attempt<T> {
  Done(Pulled<T>),
  Wait(Option<InitFuture>),
}

/// Pull-based adapter over a push-based [`Source`].
///
/// Clones share the same source, state and transform, so they can be handed
/// to concurrent tasks.
pub struct SourceAdapter<S: Source, T = <S as Source>::Item> {
  core: Arc<Core<S>>,
  transform: Transform<S::Item, T>,
}

impl<S: Source> SourceAdapter<S> {
  /// Creates an adapter attached to `source`.
  pub fn new(source: S) -> Self {
    Self::with_config(source, AdapterConfig::default())
  }

  /// Creates an adapter attached to `source` with the given configuration.
  pub fn with_config(source: S, config: AdapterConfig) -> Self {
    let adapter = Self::unattached(config);
    adapter.core.init_claimed.store(true, Ordering::Release);
    // A fresh core cannot have been cancelled yet.
    let _ = adapter.core.attach(source);
    adapter
  }

  /// Creates an adapter whose source is produced by `factory`.
  ///
  /// `factory` is invoked immediately. A failing factory becomes the sticky
  /// error of the adapter.
  pub fn from_factory<F, Fut>(factory: F) -> Self
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, PullError>> + Send + 'static,
  {
    Self::from_factory_with_config(factory, AdapterConfig::default())
  }

  /// Same as [`SourceAdapter::from_factory`] with the given configuration.
  pub fn from_factory_with_config<F, Fut>(factory: F, config: AdapterConfig) -> Self
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, PullError>> + Send + 'static,
  {
    let adapter = Self::unattached(config);
    adapter.core.init_claimed.store(true, Ordering::Release);
    adapter.core.begin_init(factory());
    adapter
  }

  /// Creates an adapter without a source.
  ///
  /// Pulls suspend until [`DeferredAdapter::init`] or
  /// [`DeferredAdapter::init_with`] is called.
  pub fn deferred() -> DeferredAdapter<S> {
    Self::deferred_with_config(AdapterConfig::default())
  }

  /// Same as [`SourceAdapter::deferred`] with the given configuration.
  pub fn deferred_with_config(config: AdapterConfig) -> DeferredAdapter<S> {
    DeferredAdapter {
      adapter: Self::unattached(config),
    }
  }

  fn unattached(config: AdapterConfig) -> Self {
    Self {
      core: Core::new(config),
      transform: Arc::new(|raw: S::Item| Some(raw)),
    }
  }
}

impl<S: Source, T: Send + 'static> SourceAdapter<S, T> {
  /// Applies `transform` to every item taken from the source.
  ///
  /// Items for which `transform` returns `None` are skipped and the drain
  /// loop moves on to the next buffered item.
  pub fn with_transform<U, F>(self, transform: F) -> SourceAdapter<S, U>
  where
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
  {
    let inner = self.transform;
    SourceAdapter {
      core: self.core,
      transform: Arc::new(move |raw: S::Item| inner(raw).and_then(&transform)),
    }
  }

  /// Returns the adapter's configuration.
  pub fn config(&self) -> &AdapterConfig {
    &self.core.config
  }

  /// Returns `true` once the source has reported its end.
  #[must_use]
  pub fn is_exhausted(&self) -> bool {
    self.core.events.is_exhausted()
  }

  /// Returns the sticky error, if one has been stored.
  pub fn error(&self) -> Option<PullError> {
    self.core.events.sticky().cloned()
  }

  /// Runs one drain attempt without suspending.
  fn attempt(&self) -> Result<Attempt<T>, PullError> {
    if let Some(error) = self.core.events.sticky() {
      return Err(error.clone());
    }
    let mut phase = lock(&self.core.phase);
    match &mut *phase {
      Phase::AwaitingInit => Ok(Attempt::Wait(None)),
      Phase::Initializing(init) => Ok(Attempt::Wait(Some(init.clone()))),
      Phase::Terminal => Err(self.core.sticky_or_cancelled()),
      Phase::Active(source) => {
        // Read before draining: items buffered ahead of the end are still taken.
        let ended = self.core.events.is_exhausted();
        while let Some(raw) = source.try_take() {
          match (self.transform)(raw) {
            Some(item) => return Ok(Attempt::Done(Pulled::Item(item))),
            None => trace!(adapter = self.core.name(), "item skipped by transform"),
          }
        }
        if ended {
          Ok(Attempt::Done(Pulled::Terminal))
        } else {
          Ok(Attempt::Wait(None))
        }
      }
    }
  }
}

#[async_trait]
impl<S, T> Pull for SourceAdapter<S, T>
where
  S: Source,
  T: Send + 'static,
{
  type Item = T;

  async fn next(&self) -> Result<Pulled<T>, PullError> {
    loop {
      // Subscribe before looking so no event between the two is missed.
      let wake = self.core.events.signal.wait();
      match self.attempt()? {
        Attempt::Done(pulled) => return Ok(pulled),
        Attempt::Wait(None) => {
          // A rejection carries the sticky error, which the next attempt reports.
          let _ = wake.await;
        }
        Attempt::Wait(Some(init)) => {
          if let Either::Right((_, _)) = select(init, wake).await {
            trace!(adapter = self.core.name(), "woken while initializing");
          }
        }
      }
    }
  }

  fn cancel(&self) {
    self.core.cancel();
  }
}

impl<S: Source, T> Clone for SourceAdapter<S, T> {
  fn clone(&self) -> Self {
    Self {
      core: Arc::clone(&self.core),
      transform: Arc::clone(&self.transform),
    }
  }
}

impl<S: Source, T> fmt::Debug for SourceAdapter<S, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SourceAdapter")
      .field("name", &self.core.name())
      .field("phase", &lock(&self.core.phase).label())
      .field("exhausted", &self.core.events.is_exhausted())
      .field("error", &self.core.events.sticky())
      .finish()
  }
}

/// A [`SourceAdapter`] constructed without a source.
///
/// Exposes the one-time [`init`](DeferredAdapter::init) operation. A second
/// initialization fails with [`PullError::AlreadyInitialized`] and leaves the
/// adapter untouched.
pub struct DeferredAdapter<S: Source, T = <S as Source>::Item> {
  adapter: SourceAdapter<S, T>,
}

impl<S: Source, T: Send + 'static> DeferredAdapter<S, T> {
  /// Attaches `source`.
  ///
  /// Fails with [`PullError::AlreadyInitialized`] on a second call, and with
  /// the sticky error if the adapter was cancelled before being initialized;
  /// in that case the source is paused and dropped.
  pub fn init(&self, source: S) -> Result<(), PullError> {
    let core = &self.adapter.core;
    core.claim_init()?;
    core.attach(source)
  }

  /// Attaches the source produced by `factory`.
  ///
  /// Fails with [`PullError::AlreadyInitialized`] on a second call and with
  /// the sticky error if the adapter was already cancelled; `factory` is not
  /// invoked in either case.
  pub fn init_with<F, Fut>(&self, factory: F) -> Result<(), PullError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<S, PullError>> + Send + 'static,
  {
    let core = &self.adapter.core;
    core.claim_init()?;
    if let Some(error) = core.events.sticky() {
      return Err(error.clone());
    }
    core.begin_init(factory());
    Ok(())
  }

  /// Applies `transform` to every item, see [`SourceAdapter::with_transform`].
  pub fn with_transform<U, F>(self, transform: F) -> DeferredAdapter<S, U>
  where
    F: Fn(T) -> Option<U> + Send + Sync + 'static,
  {
    DeferredAdapter {
      adapter: self.adapter.with_transform(transform),
    }
  }

  /// Returns a pull-only handle sharing this adapter's state.
  ///
  /// The handle cannot initialize the adapter, so it can be handed to
  /// consumers while the owner keeps the right to call `init`.
  pub fn handle(&self) -> SourceAdapter<S, T> {
    self.adapter.clone()
  }

  /// Returns the adapter's configuration.
  pub fn config(&self) -> &AdapterConfig {
    self.adapter.config()
  }
}

#[async_trait]
impl<S, T> Pull for DeferredAdapter<S, T>
where
  S: Source,
  T: Send + 'static,
{
  type Item = T;

  async fn next(&self) -> Result<Pulled<T>, PullError> {
    self.adapter.next().await
  }

  fn cancel(&self) {
    self.adapter.cancel();
  }
}

impl<S: Source, T> fmt::Debug for DeferredAdapter<S, T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("DeferredAdapter").field(&self.adapter).finish()
  }
}
