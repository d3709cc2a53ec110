use conduit::concurrency::deadline::{Deadline, Expiry};
use conduit::concurrency::fan_in::{FanInReceiver, Producer, fan_in};
use conduit::concurrency::signal::{CompletionRx, completion_signal, create_cancel_channel};
use conduit::workers::consumer::{CancellableConsumer, ConsumerState};
use conduit::workers::dispatcher::TaskDispatcher;
use conduit::workers::producer::{IntervalProducer, ProducerOutcome};
use conduit_config::shared::{ChannelConfig, ConsumerConfig};
use conduit_telemetry::tracing::init_test_tracing;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;

const ITEMS: u32 = 10;

/// Wires one interval producer into a fan-in channel and returns what the consumer needs.
fn start_interval_producer(
    config: &ConsumerConfig,
    deadline: &Deadline,
) -> (
    FanInReceiver<u32>,
    CompletionRx,
    JoinHandle<ProducerOutcome>,
) {
    let (mut coordinator, receiver) = fan_in(&ChannelConfig::default()).unwrap();
    let (completion_tx, completion_rx) = completion_signal();
    let producer: Producer<u32> = coordinator.producer();
    coordinator.spawn_close_when_done();

    let interval_producer = IntervalProducer::from_config(config).unwrap();
    let deadline = deadline.clone();
    let producer_task = tokio::spawn(async move {
        interval_producer
            .run(0..ITEMS, producer, completion_tx, &deadline)
            .await
            .unwrap()
    });

    (receiver, completion_rx, producer_task)
}

#[tokio::test(start_paused = true)]
async fn consumer_completes_when_producer_finishes_in_time() {
    init_test_tracing();

    // 10 items paced at 90ms signal completion at 900ms, before the 1000ms deadline.
    let config = ConsumerConfig::default();
    let deadline = Deadline::after(config.deadline());
    let (receiver, completion_rx, producer_task) = start_interval_producer(&config, &deadline);

    let mut received = Vec::new();
    let outcome = CancellableConsumer::new(receiver, completion_rx)
        .run(&deadline, |item| received.push(item))
        .await;

    assert_eq!(outcome.state, ConsumerState::Completed);
    assert_eq!(outcome.received, ITEMS as usize);
    assert_eq!(received, (0..ITEMS).collect::<Vec<_>>());

    let producer_outcome = producer_task.await.unwrap();
    assert_eq!(producer_outcome.emitted, ITEMS as usize);
    assert_eq!(producer_outcome.stopped, None);
}

#[tokio::test(start_paused = true)]
async fn consumer_times_out_when_deadline_is_shorter_than_the_sequence() {
    init_test_tracing();

    let config = ConsumerConfig {
        deadline_ms: 500,
        ..ConsumerConfig::default()
    };
    let deadline = Deadline::after(config.deadline());
    let (receiver, completion_rx, producer_task) = start_interval_producer(&config, &deadline);

    let mut received = Vec::new();
    let outcome = CancellableConsumer::new(receiver, completion_rx)
        .run(&deadline, |item| received.push(item))
        .await;

    assert_eq!(outcome.state, ConsumerState::TimedOut);
    assert!(outcome.received >= 5, "received {}", outcome.received);
    assert!(outcome.received < ITEMS as usize);
    assert_eq!(received, (0..outcome.received as u32).collect::<Vec<_>>());

    // The producer shares the deadline and stops instead of running to the end.
    let producer_outcome = producer_task.await.unwrap();
    assert_eq!(producer_outcome.stopped, Some(Expiry::TimedOut));
    assert!(producer_outcome.emitted < ITEMS as usize);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_consumer_and_producer() {
    init_test_tracing();

    let (cancel_tx, cancel_rx) = create_cancel_channel();
    let config = ConsumerConfig::default();
    let deadline = Deadline::after(config.deadline()).with_cancellation(cancel_rx);
    let (receiver, completion_rx, producer_task) = start_interval_producer(&config, &deadline);

    let consumer = CancellableConsumer::new(receiver, completion_rx).spawn(deadline, |_| {});
    sleep(Duration::from_millis(250)).await;
    cancel_tx.cancel();

    let outcome = consumer.wait().await.unwrap();
    assert_eq!(outcome.state, ConsumerState::Cancelled);
    assert_eq!(outcome.received, 3);

    let producer_outcome = producer_task.await.unwrap();
    assert_eq!(producer_outcome.stopped, Some(Expiry::Cancelled));
    assert_eq!(producer_outcome.emitted, 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_wins_over_an_elapsed_time_bound() {
    init_test_tracing();

    let (cancel_tx, cancel_rx) = create_cancel_channel();
    let (_completion_tx, completion_rx) = completion_signal();
    let (coordinator, receiver) = fan_in::<u32>(&ChannelConfig::default()).unwrap();
    coordinator.close_when_done().await;

    let deadline = Deadline::after(Duration::from_millis(100)).with_cancellation(cancel_rx);
    sleep(Duration::from_millis(200)).await;
    cancel_tx.cancel();

    let outcome = CancellableConsumer::new(receiver, completion_rx)
        .run(&deadline, |_| {})
        .await;

    assert_eq!(outcome.state, ConsumerState::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn dispatched_workers_feed_a_fan_in_consumer() {
    init_test_tracing();

    let (mut coordinator, mut receiver) = fan_in(&ChannelConfig { capacity: 8 }).unwrap();
    let producer = Arc::new(coordinator.producer());
    let closer = coordinator.spawn_close_when_done();

    let collector = tokio::spawn(async move {
        let mut items = Vec::new();
        while let Some(item) = receiver.recv().await {
            items.push(item);
        }
        items
    });

    let summary = TaskDispatcher::new(4)
        .run(100, move |item| {
            let producer = Arc::clone(&producer);
            async move {
                producer.send(item * 2).await.unwrap();
            }
        })
        .await
        .unwrap();
    closer.await.unwrap();

    let mut items = collector.await.unwrap();
    items.sort_unstable();

    assert_eq!(summary.processed, 100);
    assert_eq!(items, (0..100).map(|item| item * 2).collect::<Vec<_>>());
}
