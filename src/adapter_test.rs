use crate::adapter::{AdapterConfig, SourceAdapter};
use crate::error::PullError;
use crate::pull::{Pull, PullExt, Pulled};
use crate::source::{Source, SourceEvents};
use crate::sources::{BufferedSource, VecSource, buffered};
use futures::future::join_all;
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::oneshot;
use tokio_test::{assert_pending, assert_ready, task};

/// Source that reports an error while items are still buffered.
struct FailingSource {
  items: Vec<i32>,
  paused: Arc<AtomicBool>,
}

impl Source for FailingSource {
  type Item = i32;

  fn attach(&mut self, events: SourceEvents) {
    events.ready();
    events.error(PullError::source_message("device lost"));
  }

  fn try_take(&mut self) -> Option<i32> {
    self.items.pop()
  }

  fn pause(&mut self) {
    self.paused.store(true, Ordering::SeqCst);
  }
}

async fn yield_until(mut condition: impl FnMut() -> bool) {
  for _ in 0..64 {
    if condition() {
      return;
    }
    tokio::task::yield_now().await;
  }
}

#[test]
fn test_adapter_config_default() {
  let config = AdapterConfig::default();

  assert_eq!(config.name(), None);
  assert!(config.pause_on_cancel());
}

#[test]
fn test_adapter_config_builder_chain() {
  let config = AdapterConfig::default()
    .with_name("lines".to_string())
    .with_pause_on_cancel(false);

  assert_eq!(config.name(), Some("lines".to_string()));
  assert!(!config.pause_on_cancel());
}

#[test]
fn test_adapter_keeps_config() {
  let config = AdapterConfig::default().with_name("numbers".to_string());
  let adapter = SourceAdapter::with_config(VecSource::new(vec![1]), config.clone());

  assert_eq!(adapter.config(), &config);
}

#[tokio::test]
async fn test_sequential_pulls_preserve_order() {
  let adapter = SourceAdapter::new(VecSource::new(vec![5, 3, 9, 1]));

  for expected in [5, 3, 9, 1] {
    assert_eq!(adapter.next().await.unwrap(), Pulled::Item(expected));
  }
  assert_eq!(adapter.next().await.unwrap(), Pulled::Terminal);
}

#[tokio::test]
async fn test_falsy_items_are_items() {
  let adapter = SourceAdapter::new(VecSource::new(vec![
    (0, false, String::new(), None::<u8>),
    (0, false, String::new(), None),
  ]));

  let items = adapter.collect_all().await.unwrap();

  assert_eq!(items.len(), 2);
  assert_eq!(items[0], (0, false, String::new(), None));
}

#[tokio::test]
async fn test_exhaustion_is_idempotent() {
  let adapter = SourceAdapter::new(VecSource::new(Vec::<i32>::new()));

  for _ in 0..5 {
    assert_eq!(adapter.next().await.unwrap(), Pulled::Terminal);
  }
  assert!(adapter.is_exhausted());
}

#[tokio::test]
async fn test_items_buffered_before_end_are_delivered() {
  let (pusher, source) = buffered();
  pusher.push("a");
  pusher.push("b");
  pusher.end();
  let adapter = SourceAdapter::new(source);

  assert_eq!(adapter.collect_all().await.unwrap(), vec!["a", "b"]);
  assert_eq!(adapter.next().await.unwrap(), Pulled::Terminal);
}

#[tokio::test]
async fn test_pull_waits_for_readiness() {
  let (pusher, source) = buffered();
  let adapter = SourceAdapter::new(source);
  let mut pending = task::spawn(adapter.next());

  assert_pending!(pending.poll());

  pusher.push(42);
  assert!(pending.is_woken());
  assert_eq!(assert_ready!(pending.poll()).unwrap(), Pulled::Item(42));
}

#[tokio::test]
async fn test_concurrent_pulls_receive_distinct_items() {
  let (pusher, source) = buffered();
  let adapter = SourceAdapter::new(source);

  let handles: Vec<_> = (0..8)
    .map(|_| {
      let adapter = adapter.clone();
      tokio::spawn(async move { adapter.next().await })
    })
    .collect();
  tokio::task::yield_now().await;
  for i in 0..8 {
    pusher.push(i);
  }

  let mut items = Vec::new();
  for handle in handles {
    items.push(handle.await.unwrap().unwrap().into_item().unwrap());
  }
  items.sort_unstable();
  assert_eq!(items, (0..8).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_concurrent_pulls_fewer_than_items() {
  let adapter = SourceAdapter::new(VecSource::new((0..20).collect::<Vec<i32>>()));

  let results = join_all((0..7).map(|_| adapter.next())).await;
  let items: HashSet<i32> = results
    .into_iter()
    .map(|r| r.unwrap().into_item().unwrap())
    .collect();

  assert_eq!(items.len(), 7);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_pulls_on_worker_threads() {
  let (pusher, source) = buffered();
  let adapter = SourceAdapter::new(source);

  let consumers: Vec<_> = (0..4)
    .map(|_| {
      let adapter = adapter.clone();
      tokio::spawn(async move { adapter.collect_all().await.unwrap() })
    })
    .collect();
  let producer = tokio::spawn(async move {
    for i in 0..500 {
      pusher.push(i);
      if i % 50 == 0 {
        tokio::task::yield_now().await;
      }
    }
    pusher.end();
  });

  producer.await.unwrap();
  let mut items = Vec::new();
  for consumer in consumers {
    items.extend(consumer.await.unwrap());
  }
  items.sort_unstable();
  assert_eq!(items, (0..500).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_end_wakes_all_waiters_with_terminal() {
  let (pusher, source) = buffered::<i32>();
  let adapter = SourceAdapter::new(source);

  let waiters: Vec<_> = (0..3)
    .map(|_| {
      let adapter = adapter.clone();
      tokio::spawn(async move { adapter.next().await })
    })
    .collect();
  tokio::task::yield_now().await;
  pusher.end();

  for waiter in waiters {
    assert_eq!(waiter.await.unwrap().unwrap(), Pulled::Terminal);
  }
}

#[tokio::test]
async fn test_source_error_is_sticky() {
  let (pusher, source) = buffered();
  let adapter = SourceAdapter::new(source);
  pusher.push(1);
  assert_eq!(adapter.next().await.unwrap(), Pulled::Item(1));

  let waiter = tokio::spawn({
    let adapter = adapter.clone();
    async move { adapter.next().await }
  });
  tokio::task::yield_now().await;
  pusher.fail(PullError::source_message("socket closed"));

  let first = waiter.await.unwrap().unwrap_err();
  assert_eq!(first.to_string(), "source failed: socket closed");
  for _ in 0..3 {
    assert!(adapter.next().await.unwrap_err().ptr_eq(&first));
  }
  assert!(adapter.error().unwrap().ptr_eq(&first));
}

#[tokio::test]
async fn test_error_preempts_buffered_items() {
  let paused = Arc::new(AtomicBool::new(false));
  let adapter = SourceAdapter::new(FailingSource {
    items: vec![1, 2, 3],
    paused: Arc::clone(&paused),
  });

  let error = adapter.next().await.unwrap_err();
  assert_eq!(error.to_string(), "source failed: device lost");
}

#[tokio::test]
async fn test_first_error_wins() {
  let (pusher, source) = buffered::<i32>();
  let adapter = SourceAdapter::new(source);
  pusher.fail(PullError::source_message("first"));
  adapter.cancel();

  let error = adapter.next().await.unwrap_err();
  assert_eq!(error.to_string(), "source failed: first");
}

#[tokio::test]
async fn test_cancel_wakes_waiters() {
  let (pusher, source) = buffered::<i32>();
  let adapter = SourceAdapter::new(source);
  let mut pending = task::spawn(adapter.next());
  assert_pending!(pending.poll());

  adapter.cancel();

  assert!(pending.is_woken());
  assert!(assert_ready!(pending.poll()).unwrap_err().is_cancelled());
  assert!(pusher.is_paused());
}

#[tokio::test]
async fn test_cancel_is_idempotent() {
  let (_pusher, source) = buffered::<i32>();
  let adapter = SourceAdapter::new(source);

  adapter.cancel();
  adapter.cancel();

  assert!(adapter.next().await.unwrap_err().is_cancelled());
  assert!(adapter.error().unwrap().is_cancelled());
}

#[tokio::test]
async fn test_cancel_prevents_further_delivery() {
  let (pusher, source) = buffered();
  pusher.push(1);
  let adapter = SourceAdapter::new(source);

  adapter.cancel();

  assert!(adapter.next().await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_cancel_without_pausing() {
  let (pusher, source) = buffered::<i32>();
  let config = AdapterConfig::default().with_pause_on_cancel(false);
  let adapter = SourceAdapter::with_config(source, config);

  adapter.cancel();

  assert!(!pusher.is_paused());
  assert!(adapter.next().await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_transform_skips_items() {
  let adapter = SourceAdapter::new(VecSource::new(vec![1, 2, 3, 4, 5, 6]))
    .with_transform(|v: i32| (v % 3 != 0).then_some(v))
    .with_transform(|v: i32| Some(v.to_string()));

  assert_eq!(adapter.collect_all().await.unwrap(), vec!["1", "2", "4", "5"]);
}

#[tokio::test]
async fn test_transform_skipping_everything_ends() {
  let adapter =
    SourceAdapter::new(VecSource::new(vec![1, 2, 3])).with_transform(|_: i32| None::<i32>);

  assert_eq!(adapter.next().await.unwrap(), Pulled::Terminal);
}

#[tokio::test]
async fn test_factory_source_is_attached() {
  let adapter = SourceAdapter::from_factory(|| async { Ok(VecSource::new(vec!['x', 'y'])) });

  assert_eq!(adapter.collect_all().await.unwrap(), vec!['x', 'y']);
}

#[test]
fn test_factory_driven_by_pulls_without_runtime() {
  let adapter = SourceAdapter::from_factory(|| async { Ok(VecSource::new(vec![1])) });

  let items = futures::executor::block_on(adapter.collect_all()).unwrap();
  assert_eq!(items, vec![1]);
}

#[tokio::test]
async fn test_factory_failure_is_sticky() {
  let adapter = SourceAdapter::<VecSource<i32>>::from_factory(|| async {
    Err(PullError::source_message("no such file"))
  });

  let error = adapter.next().await.unwrap_err();
  assert_eq!(error.to_string(), "source failed: no such file");
  assert!(adapter.next().await.unwrap_err().ptr_eq(&error));
}

#[tokio::test]
async fn test_cancel_during_initialization_discards_late_source() {
  let (tx, rx) = oneshot::channel::<BufferedSource<i32>>();
  let adapter = SourceAdapter::from_factory(move || async move { rx.await.map_err(PullError::from_source) });

  let waiter = tokio::spawn({
    let adapter = adapter.clone();
    async move { adapter.next().await }
  });
  tokio::task::yield_now().await;
  adapter.cancel();
  assert!(waiter.await.unwrap().unwrap_err().is_cancelled());

  let (pusher, source) = buffered();
  pusher.push(1);
  assert!(tx.send(source).is_ok());
  yield_until(|| pusher.is_paused()).await;

  assert!(pusher.is_paused());
  assert!(adapter.next().await.unwrap_err().is_cancelled());
}

#[tokio::test]
async fn test_deferred_pull_suspends_until_init() {
  let adapter = SourceAdapter::<VecSource<i32>>::deferred();
  let mut pending = task::spawn(adapter.next());

  assert_pending!(pending.poll());
  assert_pending!(pending.poll());

  adapter.init(VecSource::new(vec![10, 20])).unwrap();

  assert!(pending.is_woken());
  assert_eq!(assert_ready!(pending.poll()).unwrap(), Pulled::Item(10));
  drop(pending);
  assert_eq!(adapter.next().await.unwrap(), Pulled::Item(20));
  assert_eq!(adapter.next().await.unwrap(), Pulled::Terminal);
}

#[tokio::test]
async fn test_deferred_second_init_fails() {
  let adapter = SourceAdapter::<VecSource<i32>>::deferred();
  adapter.init(VecSource::new(vec![1])).unwrap();

  let error = adapter.init(VecSource::new(vec![2])).unwrap_err();
  assert!(matches!(error, PullError::AlreadyInitialized));
  let error = adapter
    .init_with(|| async { Ok(VecSource::new(vec![3])) })
    .unwrap_err();
  assert!(matches!(error, PullError::AlreadyInitialized));

  assert_eq!(adapter.collect_all().await.unwrap(), vec![1]);
}

#[tokio::test]
async fn test_deferred_init_with_factory() {
  let adapter = SourceAdapter::<BufferedSource<&str>>::deferred();
  let handle = adapter.handle();
  let waiter = tokio::spawn(async move { handle.collect_all().await });
  tokio::task::yield_now().await;

  let (pusher, source) = buffered();
  pusher.push("late");
  pusher.end();
  adapter.init_with(move || async move { Ok(source) }).unwrap();

  assert_eq!(waiter.await.unwrap().unwrap(), vec!["late"]);
}

#[tokio::test]
async fn test_deferred_cancel_before_init() {
  let adapter = SourceAdapter::<BufferedSource<i32>>::deferred();
  let mut pending = task::spawn(adapter.next());
  assert_pending!(pending.poll());

  adapter.cancel();
  assert!(assert_ready!(pending.poll()).unwrap_err().is_cancelled());
  drop(pending);

  let (pusher, source) = buffered();
  assert!(adapter.init(source).unwrap_err().is_cancelled());
  assert!(pusher.is_paused());
}

#[tokio::test]
async fn test_deferred_transform() {
  let adapter = SourceAdapter::<VecSource<i32>>::deferred().with_transform(|v: i32| Some(v + 1));
  adapter.init(VecSource::new(vec![1, 2])).unwrap();

  assert_eq!(adapter.collect_all().await.unwrap(), vec![2, 3]);
}

proptest! {
  #[test]
  fn prop_adapter_preserves_order(values in prop::collection::vec(any::<i32>(), 0..64)) {
    let adapter = SourceAdapter::new(VecSource::new(values.clone()));

    let actual = futures::executor::block_on(adapter.collect_all()).unwrap();
    prop_assert_eq!(actual, values);
  }

  #[test]
  fn prop_buffered_adapter_preserves_push_order(values in prop::collection::vec(any::<i32>(), 0..64)) {
    let (pusher, source) = buffered::<i32>();
    for value in &values {
      pusher.push(*value);
    }
    pusher.end();
    let adapter = SourceAdapter::new(source);

    let actual = futures::executor::block_on(adapter.collect_all()).unwrap();
    prop_assert_eq!(actual, values);
  }
}
