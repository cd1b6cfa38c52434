//! End-to-end scenarios across the lifecycle manager and the pipeline.

use std::sync::Arc;
use std::time::Duration;

use seqforge_design::{
    GenerateError, GenerationConstraints, GenerationPipeline, PipelineOptions,
};
use seqforge_models::{
    Capability, ManualClock, ModelCatalog, ModelDescriptor, ModelError, ModelLoader,
    ModelManager, PoolConfig, SlotState,
};
use seqforge_testing::MockLoader;
use tokio_util::sync::CancellationToken;

fn generation_model(id: &str, bytes: u64) -> ModelDescriptor {
    ModelDescriptor::new(id, bytes).with_capability(Capability::Generation)
}

fn catalog(models: &[(&str, u64, Arc<MockLoader>)]) -> ModelCatalog {
    let mut builder = ModelCatalog::builder();
    for (id, bytes, loader) in models {
        builder = builder
            .register(
                generation_model(id, *bytes),
                Arc::clone(loader) as Arc<dyn ModelLoader>,
            )
            .unwrap();
    }
    builder.build().unwrap()
}

async fn state_of(manager: &ModelManager, id: &str) -> SlotState {
    manager
        .status()
        .await
        .models
        .iter()
        .find(|m| m.model_id == id)
        .unwrap()
        .state
        .clone()
}

#[tokio::test]
async fn admitting_a_model_evicts_the_idle_one() {
    seqforge_testing::init_tracing();
    let loader = Arc::new(MockLoader::new());
    let catalog = catalog(&[
        ("x", 600, loader.clone()),
        ("y", 600, loader.clone()),
    ]);
    let config = PoolConfig::default().with_memory_budget_bytes(1000);
    let manager = ModelManager::new(catalog, config).unwrap();

    let lease = manager.acquire("x").await.unwrap();
    manager.release(lease).await.unwrap();

    // "y" does not fit next to "x"; "x" is idle and gets evicted.
    let lease = manager.acquire("y").await.unwrap();
    manager.release(lease).await.unwrap();

    assert_eq!(state_of(&manager, "x").await, SlotState::Unloaded);
    assert_eq!(state_of(&manager, "y").await, SlotState::Loaded);

    let report = manager.status().await;
    assert!(report.resident_bytes <= report.budget_bytes);
    assert_eq!(loader.unloads(), 1);
}

#[tokio::test]
async fn loaned_models_are_never_evicted() {
    let loader = Arc::new(MockLoader::new());
    let catalog = catalog(&[
        ("x", 600, loader.clone()),
        ("y", 600, loader.clone()),
    ]);
    let config = PoolConfig::default().with_memory_budget_bytes(1000);
    let manager = ModelManager::new(catalog, config).unwrap();

    // Two concurrent loans on "x".
    let first = manager.acquire("x").await.unwrap();
    let second = manager.acquire("x").await.unwrap();
    assert_eq!(loader.loads(), 1);

    assert!(matches!(
        manager.acquire("y").await,
        Err(ModelError::CapacityExceeded { .. })
    ));
    assert_eq!(state_of(&manager, "x").await, SlotState::Loaded);

    manager.release(first).await.unwrap();
    // Still one loan outstanding.
    assert!(matches!(
        manager.acquire("y").await,
        Err(ModelError::CapacityExceeded { .. })
    ));

    manager.release(second).await.unwrap();
    let lease = manager.acquire("y").await.unwrap();
    manager.release(lease).await.unwrap();
    assert_eq!(state_of(&manager, "x").await, SlotState::Unloaded);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_join_one_load() {
    let loader = Arc::new(MockLoader::new().with_load_delay(Duration::from_millis(100)));
    let catalog = catalog(&[("x", 400, loader.clone())]);
    let manager = ModelManager::new(catalog, PoolConfig::default()).unwrap();

    let (a, b, c) = tokio::join!(
        manager.acquire("x"),
        manager.acquire("x"),
        manager.acquire("x")
    );
    for lease in [a.unwrap(), b.unwrap(), c.unwrap()] {
        manager.release(lease).await.unwrap();
    }
    assert_eq!(loader.loads(), 1);
}

#[tokio::test]
async fn reaper_policy_is_driven_by_the_injected_clock() {
    let loader = Arc::new(MockLoader::new());
    let clock = Arc::new(ManualClock::new());
    let catalog = catalog(&[("x", 400, loader.clone()), ("y", 400, loader.clone())]);
    let config = PoolConfig::default()
        .with_memory_budget_bytes(1000)
        .with_idle_timeout_secs(300);
    let manager = ModelManager::with_clock(catalog, config, clock.clone()).unwrap();

    let lease = manager.acquire("x").await.unwrap();
    manager.release(lease).await.unwrap();
    clock.advance(Duration::from_secs(200));
    let lease = manager.acquire("y").await.unwrap();
    manager.release(lease).await.unwrap();

    // Nothing is stale yet.
    assert_eq!(manager.evict_idle().await, 0);

    clock.advance(Duration::from_secs(150));
    // "x" is now 350s idle, "y" only 150s.
    assert_eq!(manager.evict_idle().await, 1);
    assert_eq!(state_of(&manager, "x").await, SlotState::Unloaded);
    assert_eq!(state_of(&manager, "y").await, SlotState::Loaded);
}

#[tokio::test]
async fn preloaded_models_serve_requests_without_reloading() {
    let loader = Arc::new(MockLoader::new().with_outputs(&["MKTAYIAKQR"]));
    let catalog = catalog(&[("protgpt2", 400, loader.clone())]);
    let config = PoolConfig::default()
        .with_memory_budget_bytes(1000)
        .with_preload_models(vec!["protgpt2".into()]);
    let manager = ModelManager::new(catalog, config).unwrap();

    manager.initialize().await.unwrap();
    assert_eq!(loader.loads(), 1);

    let pipeline = GenerationPipeline::new(manager.clone());
    let result = pipeline
        .generate(
            "protgpt2",
            &GenerationConstraints::new(5, 20),
            &PipelineOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.sequence, "MKTAYIAKQR");
    // The preloaded session was reused.
    assert_eq!(loader.loads(), 1);
    assert_eq!(manager.status().await.models[0].loans, 0);
}

#[tokio::test]
async fn pipeline_ranks_candidates_end_to_end() {
    let loader = Arc::new(MockLoader::new().with_outputs(&[
        "MGGGGGGGGG",
        "MAAAAAAAAA",
        "MAAAAAGGGG",
    ]));
    let catalog = catalog(&[("protgpt2", 400, loader.clone())]);
    let manager = ModelManager::new(catalog, PoolConfig::default()).unwrap();
    let pipeline = GenerationPipeline::new(manager.clone());

    let constraints = GenerationConstraints::new(5, 20).with_composition("A", 1.0);
    let options = PipelineOptions {
        min_candidates: 3,
        max_candidates: 3,
        ..Default::default()
    };
    let result = pipeline
        .generate(
            "protgpt2",
            &constraints,
            &options,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(result.sequence, "MAAAAAAAAA");
    assert_eq!(result.candidates_evaluated, 3);
    assert!(result.score > 0.0 && result.score <= 1.0);
    assert_eq!(result.properties.length, 10);
}

#[tokio::test]
async fn hard_constraint_failures_report_the_attempt_count() {
    let loader = Arc::new(MockLoader::new().with_outputs(&["MWWA"]));
    let catalog = catalog(&[("protgpt2", 400, loader.clone())]);
    let manager = ModelManager::new(catalog, PoolConfig::default()).unwrap();
    let pipeline = GenerationPipeline::new(manager.clone());

    let constraints = GenerationConstraints::new(1, 20).with_forbidden_motif("WW");
    let options = PipelineOptions {
        min_candidates: 1,
        max_candidates: 5,
        ..Default::default()
    };
    match pipeline
        .generate(
            "protgpt2",
            &constraints,
            &options,
            &CancellationToken::new(),
        )
        .await
    {
        Err(GenerateError::NoValidCandidate {
            candidates_evaluated,
            ..
        }) => assert_eq!(candidates_evaluated, 5),
        other => panic!("expected NoValidCandidate, got {other:?}"),
    }
    assert_eq!(manager.status().await.models[0].loans, 0);
}

#[tokio::test(start_paused = true)]
async fn cancellation_restores_the_loan_count() {
    let loader = Arc::new(MockLoader::new());
    let catalog = catalog(&[("slow", 400, loader.clone())]);
    let manager = ModelManager::new(catalog, PoolConfig::default()).unwrap();

    // Hold one loan so the pre-call count is non-zero.
    let held = manager.acquire("slow").await.unwrap();
    assert_eq!(manager.status().await.models[0].loans, 1);

    let pipeline = GenerationPipeline::new(manager.clone());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = pipeline
        .generate(
            "slow",
            &GenerationConstraints::new(1, 20),
            &PipelineOptions::default(),
            &cancel,
        )
        .await;
    assert!(matches!(result, Err(GenerateError::Cancelled { .. })));

    // Back at the pre-call value.
    assert_eq!(manager.status().await.models[0].loans, 1);
    manager.release(held).await.unwrap();
}

#[tokio::test]
async fn load_failures_do_not_poison_the_slot() {
    let loader = Arc::new(MockLoader::new());
    loader.fail_loads(1);
    let catalog = catalog(&[("flaky", 400, loader.clone())]);
    let manager = ModelManager::new(catalog, PoolConfig::default()).unwrap();
    let pipeline = GenerationPipeline::new(manager.clone());

    let result = pipeline
        .generate(
            "flaky",
            &GenerationConstraints::new(1, 20),
            &PipelineOptions::default(),
            &CancellationToken::new(),
        )
        .await;
    assert!(matches!(
        result,
        Err(GenerateError::Model(ModelError::LoadFailed { .. }))
    ));
    assert!(matches!(state_of(&manager, "flaky").await, SlotState::Error(_)));

    // The next request retries the load and succeeds.
    let result = pipeline
        .generate(
            "flaky",
            &GenerationConstraints::new(1, 20),
            &PipelineOptions::default(),
            &CancellationToken::new(),
        )
        .await;
    assert!(result.is_ok());
    assert_eq!(loader.loads(), 2);
}

#[tokio::test]
async fn budget_invariant_holds_across_mixed_traffic() {
    seqforge_testing::init_tracing();
    let loader = Arc::new(MockLoader::new());
    let catalog = catalog(&[
        ("a", 300, loader.clone()),
        ("b", 400, loader.clone()),
        ("c", 500, loader.clone()),
    ]);
    let config = PoolConfig::default().with_memory_budget_bytes(900);
    let manager = ModelManager::new(catalog, config).unwrap();

    for id in ["a", "b", "c", "a", "c", "b"] {
        let lease = manager.acquire(id).await.unwrap();
        let report = manager.status().await;
        assert!(
            report.resident_bytes <= report.budget_bytes,
            "budget exceeded after acquiring {id}"
        );
        manager.release(lease).await.unwrap();
    }

    manager.shutdown().await;
    assert_eq!(manager.status().await.resident_bytes, 0);
}
