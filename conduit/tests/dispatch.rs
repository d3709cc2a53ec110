use conduit::concurrency::aggregator::SharedAggregator;
use conduit::concurrency::barrier::CompletionBarrier;
use conduit::workers::dispatcher::TaskDispatcher;
use conduit_config::shared::DispatchConfig;
use conduit_telemetry::tracing::init_test_tracing;

const PRIME_LIMIT: usize = 1_000_000;

fn is_prime(n: usize) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }

    let mut divisor = 3;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 2;
    }

    true
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_prime_classification_matches_sequential() {
    init_test_tracing();

    let sequential: Vec<usize> = (0..PRIME_LIMIT).filter(|&n| is_prime(n)).collect();

    let config = DispatchConfig {
        worker_count: 16,
        total_items: PRIME_LIMIT,
    };
    let primes = SharedAggregator::with_capacity(sequential.len());
    let sink = primes.clone();

    let summary = TaskDispatcher::from_config(&config)
        .run_blocking(config.total_items, move |n| {
            if is_prime(n) {
                sink.append(n);
            }
        })
        .await
        .unwrap();

    assert_eq!(summary.processed, PRIME_LIMIT);
    assert_eq!(summary.stopped, None);

    let mut parallel = primes.snapshot();
    parallel.sort_unstable();
    assert_eq!(parallel.len(), 78_498);
    assert_eq!(parallel, sequential);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn one_million_concurrent_appends_are_all_kept() {
    init_test_tracing();

    let aggregator = SharedAggregator::with_capacity(1_000_000);
    let sink = aggregator.clone();

    let summary = TaskDispatcher::new(100_000)
        .run(1_000_000, move |item| {
            let sink = sink.clone();
            async move { sink.append(item) }
        })
        .await
        .unwrap();

    assert_eq!(summary.workers, 100_000);
    assert_eq!(aggregator.count(), 1_000_000);

    let mut items = aggregator.snapshot();
    items.sort_unstable();
    items.dedup();
    assert_eq!(items.len(), 1_000_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn barrier_releases_after_every_spawned_worker() {
    init_test_tracing();

    let barrier = CompletionBarrier::new();
    let aggregator = SharedAggregator::new();
    barrier.add(64);

    for worker in 0..64 {
        let barrier = barrier.clone();
        let aggregator = aggregator.clone();
        tokio::spawn(async move {
            tokio::task::yield_now().await;
            aggregator.append(worker);
            barrier.done();
        });
    }
    barrier.wait().await;

    assert_eq!(barrier.pending(), 0);
    assert_eq!(aggregator.count(), 64);
}
