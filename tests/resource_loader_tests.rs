//! Resource Loader Tests
//!
//! Tests for:
//! - Reference counting: load/unload balance, `measure_load`, shared entries
//! - Dependency graphs: chain, variable and fan-out keys torn down to zero
//! - Concurrency: in-flight sharing on one task and across spawned tasks,
//!   measuring entries mid-load and mid-unload
//! - Failure handling: no residue, shared failures, dependency failures,
//!   panics, failing unloaders, double unloads, cancelled loads

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bainangua::prelude::*;
use futures::FutureExt;
use futures::future::try_join_all;

// ============================================================================
// Keys
// ============================================================================

macro_rules! test_key {
    ($($name:ident($value:ty) => $resource:ty),* $(,)?) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            struct $name($value);

            impl ResourceKey for $name {
                type Resource = $resource;
            }
        )*
    };
}

test_key! {
    IdentityKey(u32) => u32,
    DelayKey(u64) => u64,
    ChainLoadKey(u32) => u64,
    VariableLoadKey(u32) => u32,
    BadUnloadKey(u32) => u32,
    CountedKey(u32) => u32,
    FlakyKey(u32) => u32,
    DependentKey(u32) => u32,
    PanicKey(u32) => u32,
    FailingUnloadKey(u32) => u32,
    FanOutKey(u32) => u64,
    SlowUnloadKey(u64) => u64,
}

type NamedKey = SingleResourceKey<&'static str, String>;

const MAX_CHAIN: u32 = 30;

#[derive(Default)]
struct TestContext {
    invocations: AtomicUsize,
    unloads: AtomicUsize,
    flaky_failures: AtomicUsize,
}

impl TestContext {
    fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    fn unloads(&self) -> usize {
        self.unloads.load(Ordering::SeqCst)
    }
}

loader_directory! {
    struct TestLoaders {
        context: TestContext,
        stores: TestStores,
        identity: IdentityKey => identity_loader,
        delay: DelayKey => delay_loader,
        chain: ChainLoadKey => chain_loader,
        variable: VariableLoadKey => variable_loader,
        bad_unload: BadUnloadKey => bad_unload_loader,
        counted: CountedKey => counted_loader,
        flaky: FlakyKey => flaky_loader,
        dependent: DependentKey => dependent_loader,
        panic: PanicKey => panic_loader,
        failing_unload: FailingUnloadKey => failing_unload_loader,
        fan_out: FanOutKey => fan_out_loader,
        named: NamedKey => named_loader,
        slow_unload: SlowUnloadKey => slow_unload_loader,
    }
}

type Loader = ResourceLoader<TestLoaders>;

fn new_loader() -> Loader {
    let _ = env_logger::builder().is_test(true).try_init();
    ResourceLoader::new(TestContext::default(), TestLoaders)
}

// ============================================================================
// Loader functions
// ============================================================================

fn identity_loader(_loader: Loader, key: IdentityKey) -> LoaderRoutine<u32> {
    async move { Ok(LoaderOutcome::new(key.0)) }.boxed()
}

fn delay_loader(_loader: Loader, key: DelayKey) -> LoaderRoutine<u64> {
    async move {
        tokio::time::sleep(Duration::from_millis(key.0)).await;
        Ok(LoaderOutcome::new(key.0))
    }
    .boxed()
}

/// Fibonacci through the cache: N > 0 depends on N-1, N > 1 also on N-2.
fn chain_loader(loader: Loader, key: ChainLoadKey) -> LoaderRoutine<u64> {
    async move {
        let n = key.0.min(MAX_CHAIN);
        if n == 0 {
            return Ok(LoaderOutcome::new(0));
        }
        let a = loader.load_resource(ChainLoadKey(n - 1)).await?;
        // fib(-1) = 1
        let b = if n > 1 {
            match loader.load_resource(ChainLoadKey(n - 2)).await {
                Ok(b) => b,
                Err(err) => {
                    loader.unload_resource(&ChainLoadKey(n - 1)).await?;
                    return Err(err);
                }
            }
        } else {
            1
        };
        Ok(LoaderOutcome::new(a + b).with_unloader(async move {
            if n > 1 {
                loader.unload_resource(&ChainLoadKey(n - 2)).await?;
            }
            loader.unload_resource(&ChainLoadKey(n - 1)).await
        }))
    }
    .boxed()
}

/// Bit 1 loads an identity key, bit 2 a delay key, bit 4 a chain key.
fn variable_loader(loader: Loader, key: VariableLoadKey) -> LoaderRoutine<u32> {
    async move {
        let v = key.0;
        let identity = ((v & 1) != 0).then_some(IdentityKey(v));
        let delay = ((v & 2) != 0).then_some(DelayKey(u64::from(v & 0xf) * 5));
        let chain = ((v & 4) != 0).then_some(ChainLoadKey(v >> 4));

        if let Some(dep) = identity {
            loader.load_resource(dep).await?;
        }
        if let Some(dep) = delay {
            loader.load_resource(dep).await?;
        }
        if let Some(dep) = chain {
            loader.load_resource(dep).await?;
        }

        Ok(LoaderOutcome::new(v).with_unloader(async move {
            if let Some(dep) = chain {
                loader.unload_resource(&dep).await?;
            }
            if let Some(dep) = delay {
                loader.unload_resource(&dep).await?;
            }
            if let Some(dep) = identity {
                loader.unload_resource(&dep).await?;
            }
            Ok(())
        }))
    }
    .boxed()
}

/// Loads `IdentityKey(3)` and forgets to release it.
fn bad_unload_loader(loader: Loader, key: BadUnloadKey) -> LoaderRoutine<u32> {
    async move {
        loader.load_resource(IdentityKey(3)).await?;
        Ok(LoaderOutcome::new(key.0).with_unloader(async { Ok(()) }))
    }
    .boxed()
}

fn counted_loader(loader: Loader, key: CountedKey) -> LoaderRoutine<u32> {
    async move {
        loader.context().invocations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(LoaderOutcome::new(key.0 * 10).with_unloader(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            loader.context().unloads.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }))
    }
    .boxed()
}

/// Fails while `flaky_failures` is positive.
fn flaky_loader(loader: Loader, key: FlakyKey) -> LoaderRoutine<u32> {
    async move {
        let context = loader.context();
        context.invocations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        if context
            .flaky_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(LoaderError::message(format!("{key:?} is not ready yet")));
        }
        Ok(LoaderOutcome::new(key.0))
    }
    .boxed()
}

fn dependent_loader(loader: Loader, key: DependentKey) -> LoaderRoutine<u32> {
    async move {
        let value = loader.load_resource(FlakyKey(key.0)).await?;
        Ok(LoaderOutcome::new(value + 1).with_unloader(async move {
            loader.unload_resource(&FlakyKey(key.0)).await
        }))
    }
    .boxed()
}

/// 13 panics inside the future, 14 before returning it.
fn panic_loader(_loader: Loader, key: PanicKey) -> LoaderRoutine<u32> {
    assert!(key.0 != 14, "loader exploded eagerly");
    async move {
        assert!(key.0 != 13, "loader exploded");
        Ok(LoaderOutcome::new(key.0))
    }
    .boxed()
}

fn failing_unload_loader(_loader: Loader, key: FailingUnloadKey) -> LoaderRoutine<u32> {
    async move {
        Ok(LoaderOutcome::new(key.0)
            .with_unloader(async { Err(LoaderError::message("unloader refused")) }))
    }
    .boxed()
}

/// Loads three dependencies concurrently.
fn fan_out_loader(loader: Loader, key: FanOutKey) -> LoaderRoutine<u64> {
    async move {
        let identity = IdentityKey(key.0);
        let delay = DelayKey(5);
        let chain = ChainLoadKey(key.0 % 8);
        let (a, b, c) = futures::try_join!(
            loader.load_resource(identity),
            loader.load_resource(delay),
            loader.load_resource(chain),
        )?;

        Ok(LoaderOutcome::new(u64::from(a) + b + c).with_unloader(async move {
            futures::try_join!(
                loader.unload_resource(&identity),
                loader.unload_resource(&delay),
                loader.unload_resource(&chain),
            )?;
            Ok(())
        }))
    }
    .boxed()
}

fn named_loader(_loader: Loader, key: NamedKey) -> LoaderRoutine<String> {
    async move { Ok(LoaderOutcome::new(key.key.to_uppercase())) }.boxed()
}

/// Loads at once; the unloader takes `key.0` milliseconds.
fn slow_unload_loader(_loader: Loader, key: SlowUnloadKey) -> LoaderRoutine<u64> {
    async move {
        Ok(LoaderOutcome::new(key.0).with_unloader(async move {
            tokio::time::sleep(Duration::from_millis(key.0)).await;
            Ok(())
        }))
    }
    .boxed()
}

fn fibonacci(n: u32) -> u64 {
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 0..n {
        (a, b) = (b, a + b);
    }
    a
}

// ============================================================================
// Basic load / unload
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn identity_load_counts_one_entry() {
    let loader = new_loader();
    assert_eq!(loader.load_resource(IdentityKey(3)).await.unwrap(), 3);
    assert_eq!(loader.measure_load(), 1);

    loader.unload_resource(&IdentityKey(3)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_resource_keys_are_routed_by_type() {
    let loader = new_loader();
    let key = NamedKey::new("vertex");
    assert_eq!(loader.load_resource(key).await.unwrap(), "VERTEX");
    assert_eq!(loader.outstanding(), vec!["String<\"vertex\">".to_string()]);
    loader.unload_resource(&key).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delayed_load_round_trips() {
    let loader = new_loader();
    assert_eq!(loader.load_resource(DelayKey(15)).await.unwrap(), 15);
    assert!(loader.contains_key(&DelayKey(15)));
    loader.unload_resource(&DelayKey(15)).await.unwrap();
    assert!(!loader.contains_key(&DelayKey(15)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn leaking_unloader_leaves_its_dependency() {
    let loader = new_loader();
    loader.load_resource(BadUnloadKey(0)).await.unwrap();
    assert_eq!(loader.measure_load(), 2);

    loader.unload_resource(&BadUnloadKey(0)).await.unwrap();
    assert_eq!(loader.measure_load(), 1);
    assert_eq!(loader.outstanding(), vec!["IdentityKey(3)".to_string()]);

    loader.unload_resource(&IdentityKey(3)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shared_release_does_not_run_the_unloader() {
    let loader = new_loader();
    loader.load_resource(CountedKey(2)).await.unwrap();
    loader.load_resource(CountedKey(2)).await.unwrap();
    assert_eq!(loader.reference_count(&CountedKey(2)).await, Some(2));

    loader.unload_resource(&CountedKey(2)).await.unwrap();
    assert_eq!(loader.context().unloads(), 0);
    assert_eq!(loader.peek_resource(&CountedKey(2)).await, Some(20));
    assert_eq!(loader.reference_count(&CountedKey(2)).await, Some(1));

    loader.unload_resource(&CountedKey(2)).await.unwrap();
    assert_eq!(loader.context().unloads(), 1);
    assert_eq!(loader.peek_resource(&CountedKey(2)).await, None);
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reload_after_full_release_runs_the_loader_again() {
    let loader = new_loader();
    loader.load_resource(CountedKey(5)).await.unwrap();
    loader.unload_resource(&CountedKey(5)).await.unwrap();
    loader.load_resource(CountedKey(5)).await.unwrap();
    assert_eq!(loader.context().invocations(), 2);

    loader.unload_resource(&CountedKey(5)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

// ============================================================================
// Dependency graphs
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chains_tear_down_completely() {
    let loader = new_loader();
    for n in 0..=MAX_CHAIN {
        let value = loader.load_resource(ChainLoadKey(n)).await.unwrap();
        assert_eq!(value, fibonacci(n), "chain {n}");
        assert_eq!(loader.measure_load(), n as usize + 1, "chain {n}");

        loader.unload_resource(&ChainLoadKey(n)).await.unwrap();
        assert_eq!(loader.measure_load(), 0, "chain {n}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chain_of_one_holds_key_zero() {
    let loader = new_loader();
    assert_eq!(loader.load_resource(ChainLoadKey(1)).await.unwrap(), 1);
    assert_eq!(loader.reference_count(&ChainLoadKey(0)).await, Some(1));

    // A second holder of key 0 keeps it past the chain's teardown.
    loader.load_resource(ChainLoadKey(0)).await.unwrap();
    loader.unload_resource(&ChainLoadKey(1)).await.unwrap();
    assert_eq!(loader.outstanding(), vec!["ChainLoadKey(0)".to_string()]);

    loader.unload_resource(&ChainLoadKey(0)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn chain_length_is_clamped() {
    let loader = new_loader();
    assert_eq!(
        loader.load_resource(ChainLoadKey(45)).await.unwrap(),
        fibonacci(MAX_CHAIN)
    );
    assert_eq!(loader.measure_load(), MAX_CHAIN as usize + 1);
    loader.unload_resource(&ChainLoadKey(45)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn variable_keys_share_dependencies() {
    let loader = new_loader();
    let keys: Vec<VariableLoadKey> = (0..64).map(VariableLoadKey).collect();

    let values = try_join_all(keys.iter().map(|key| loader.load_resource(*key)))
        .await
        .unwrap();
    assert_eq!(values, (0..64).collect::<Vec<u32>>());
    assert!(loader.measure_load() > keys.len());

    try_join_all(keys.iter().map(|key| loader.unload_resource(key)))
        .await
        .unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fan_out_loads_release_every_dependency() {
    let loader = new_loader();
    let keys: Vec<FanOutKey> = (0..10).map(FanOutKey).collect();
    let values = try_join_all(keys.iter().map(|key| loader.load_resource(*key)))
        .await
        .unwrap();
    assert_eq!(values[3], 3 + 5 + fibonacci(3));

    for key in &keys {
        loader.unload_resource(key).await.unwrap();
    }
    assert_eq!(loader.measure_load(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_share_one_invocation() {
    let loader = new_loader();
    let (a, b) = futures::join!(
        loader.load_resource(CountedKey(7)),
        loader.load_resource(CountedKey(7)),
    );
    assert_eq!(a.unwrap(), 70);
    assert_eq!(b.unwrap(), 70);
    assert_eq!(loader.context().invocations(), 1);
    assert_eq!(loader.measure_load(), 1);
    assert_eq!(loader.reference_count(&CountedKey(7)).await, Some(2));

    loader.unload_resource(&CountedKey(7)).await.unwrap();
    loader.unload_resource(&CountedKey(7)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
    assert_eq!(loader.context().unloads(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loading_entries_are_measured() {
    let loader = new_loader();
    let pending = tokio::spawn({
        let loader = loader.clone();
        async move { loader.load_resource(DelayKey(200)).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(loader.contains_key(&DelayKey(200)));
    assert_eq!(loader.measure_load(), 1);

    assert_eq!(pending.await.unwrap().unwrap(), 200);
    assert_eq!(loader.measure_load(), 1);
    loader.unload_resource(&DelayKey(200)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unloading_entries_are_measured() {
    let loader = new_loader();
    loader.load_resource(SlowUnloadKey(200)).await.unwrap();

    let pending = tokio::spawn({
        let loader = loader.clone();
        async move { loader.unload_resource(&SlowUnloadKey(200)).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(loader.measure_load(), 1);

    pending.await.unwrap().unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_tasks_share_one_invocation() {
    let loader = new_loader();

    let loads: Vec<_> = (0..8)
        .map(|_| {
            let loader = loader.clone();
            tokio::spawn(async move { loader.load_resource(CountedKey(1)).await })
        })
        .collect();
    for handle in loads {
        assert_eq!(handle.await.unwrap().unwrap(), 10);
    }
    assert_eq!(loader.context().invocations(), 1);
    assert_eq!(loader.reference_count(&CountedKey(1)).await, Some(8));

    let unloads: Vec<_> = (0..8)
        .map(|_| {
            let loader = loader.clone();
            tokio::spawn(async move { loader.unload_resource(&CountedKey(1)).await })
        })
        .collect();
    for handle in unloads {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(loader.measure_load(), 0);
    assert_eq!(loader.context().unloads(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn load_during_teardown_starts_fresh() {
    let loader = new_loader();
    loader.load_resource(CountedKey(3)).await.unwrap();

    let (unloaded, reloaded) = futures::join!(
        loader.unload_resource(&CountedKey(3)),
        loader.load_resource(CountedKey(3)),
    );
    unloaded.unwrap();
    assert_eq!(reloaded.unwrap(), 30);
    assert_eq!(loader.context().invocations(), 2);
    assert_eq!(loader.context().unloads(), 1);
    assert_eq!(loader.measure_load(), 1);

    loader.unload_resource(&CountedKey(3)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

// ============================================================================
// Failures
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failed_load_leaves_no_residue_and_retries() {
    let loader = new_loader();
    loader.context().flaky_failures.store(1, Ordering::SeqCst);

    let err = loader.load_resource(FlakyKey(4)).await.unwrap_err();
    assert!(matches!(err, LoaderError::LoadFailure { .. }));
    assert!(matches!(err.root_cause(), LoaderError::Message(_)));
    assert_eq!(loader.measure_load(), 0);

    assert_eq!(loader.load_resource(FlakyKey(4)).await.unwrap(), 4);
    assert_eq!(loader.context().invocations(), 2);
    loader.unload_resource(&FlakyKey(4)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn waiters_share_the_failure() {
    let loader = new_loader();
    loader.context().flaky_failures.store(1, Ordering::SeqCst);

    let (a, b) = futures::join!(
        loader.load_resource(FlakyKey(8)),
        loader.load_resource(FlakyKey(8)),
    );
    let (a, b) = (a.unwrap_err(), b.unwrap_err());
    assert_eq!(a.to_string(), b.to_string());
    assert_eq!(loader.context().invocations(), 1);
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dependency_failure_is_reported_as_such() {
    let loader = new_loader();
    loader.context().flaky_failures.store(1, Ordering::SeqCst);

    let err = loader.load_resource(DependentKey(2)).await.unwrap_err();
    assert!(matches!(err, LoaderError::DependencyLoadFailure { .. }));
    assert!(matches!(err.root_cause(), LoaderError::Message(_)));
    assert_eq!(loader.measure_load(), 0);

    assert_eq!(loader.load_resource(DependentKey(2)).await.unwrap(), 3);
    assert_eq!(loader.measure_load(), 2);
    loader.unload_resource(&DependentKey(2)).await.unwrap();
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn panicking_loaders_become_load_failures() {
    let loader = new_loader();
    for (key, expected) in [(13, "loader exploded"), (14, "loader exploded eagerly")] {
        let err = loader.load_resource(PanicKey(key)).await.unwrap_err();
        assert!(matches!(err, LoaderError::LoadFailure { .. }));
        assert!(
            matches!(err.root_cause(), LoaderError::Panicked { message } if message == expected),
            "{err}"
        );
    }
    assert_eq!(loader.measure_load(), 0);

    assert_eq!(loader.load_resource(PanicKey(1)).await.unwrap(), 1);
    loader.unload_resource(&PanicKey(1)).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_unloader_still_frees_the_entry() {
    let loader = new_loader();
    loader.load_resource(FailingUnloadKey(1)).await.unwrap();

    let err = loader.unload_resource(&FailingUnloadKey(1)).await.unwrap_err();
    assert!(matches!(err, LoaderError::UnloadFailure { .. }));
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn double_unload_is_an_error() {
    let loader = new_loader();
    let err = loader.unload_resource(&IdentityKey(9)).await.unwrap_err();
    assert!(matches!(err, LoaderError::DoubleUnload { ref key } if key == "IdentityKey(9)"));

    loader.load_resource(IdentityKey(9)).await.unwrap();
    loader.unload_resource(&IdentityKey(9)).await.unwrap();
    assert!(matches!(
        loader.unload_resource(&IdentityKey(9)).await,
        Err(LoaderError::DoubleUnload { .. })
    ));
    assert_eq!(loader.measure_load(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancelled_load_leaves_no_residue() {
    let loader = new_loader();
    let timed_out = tokio::time::timeout(
        Duration::from_millis(10),
        loader.load_resource(DelayKey(2_000)),
    )
    .await;
    assert!(timed_out.is_err());
    assert_eq!(loader.measure_load(), 0);

    assert_eq!(loader.load_resource(DelayKey(1)).await.unwrap(), 1);
    loader.unload_resource(&DelayKey(1)).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn storage_is_scoped_to_each_loader() {
    let first = new_loader();
    let second = ResourceLoader::with_stores(
        TestContext::default(),
        TestLoaders,
        create_loader_storage(&TestLoaders),
    );
    first.load_resource(IdentityKey(1)).await.unwrap();
    assert_eq!(first.measure_load(), 1);
    assert_eq!(second.measure_load(), 0);
    assert!(matches!(
        second.unload_resource(&IdentityKey(1)).await,
        Err(LoaderError::DoubleUnload { .. })
    ));
    first.unload_resource(&IdentityKey(1)).await.unwrap();
}
