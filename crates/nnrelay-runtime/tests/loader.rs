mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{AddBackend, FailingBackend, GatedBackend, ScriptedBackend, ADD_GRAPH};
use nnrelay_core::{ArtifactPaths, Backend, Device, ModelArtifact};
use nnrelay_runtime::{BoundedLoader, SessionError};
use tempfile::TempDir;

fn artifact(dir: &TempDir, model_id: &str) -> ModelArtifact {
    ModelArtifact {
        model_id: model_id.to_string(),
        paths: ArtifactPaths::for_model(dir.path(), model_id),
        quantization: 0,
    }
}

#[tokio::test]
async fn loads_once_then_uses_cached_model() {
    let dir = TempDir::new().unwrap();
    let artifact = artifact(&dir, "2");
    std::fs::write(&artifact.paths.graph, ADD_GRAPH).unwrap();

    let backend = AddBackend::default();
    let loads = Arc::clone(&backend.loads);
    let loader = BoundedLoader::new(Arc::new(backend), Device::Cpu);

    loader.load(artifact.clone(), Duration::from_secs(5)).await.unwrap();
    loader.load(artifact, Duration::from_secs(5)).await.unwrap();

    assert!(loader.is_loaded());
    assert_eq!(loads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_load_stays_unloaded_and_retries() {
    let dir = TempDir::new().unwrap();
    let artifact = artifact(&dir, "100");

    let backend = AddBackend::default();
    let loads = Arc::clone(&backend.loads);
    let loader = BoundedLoader::new(Arc::new(backend), Device::Cpu);

    let err = loader.load(artifact.clone(), Duration::from_secs(5)).await.unwrap_err();
    assert!(matches!(err, SessionError::LoadFailed(_)));
    assert!(!loader.is_loaded());

    std::fs::write(&artifact.paths.graph, ADD_GRAPH).unwrap();
    loader.load(artifact, Duration::from_secs(5)).await.unwrap();
    assert!(loader.is_loaded());
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn backend_error_is_a_load_failure() {
    let dir = TempDir::new().unwrap();
    let loader = BoundedLoader::new(Arc::new(FailingBackend), Device::Cpu);

    let err = loader
        .load(artifact(&dir, "1"), Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("backend refused the graph"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn timeout_returns_promptly_and_discards_late_result() {
    let dir = TempDir::new().unwrap();
    let (backend, gate) = GatedBackend::new();
    let loader = BoundedLoader::new(Arc::new(backend), Device::Cpu);

    let deadline = Duration::from_millis(100);
    let started = Instant::now();
    let err = loader.load(artifact(&dir, "1"), deadline).await.unwrap_err();
    let waited = started.elapsed();

    assert!(matches!(err, SessionError::LoadTimeout(d) if d == deadline));
    assert!(waited >= deadline);
    assert!(waited < Duration::from_secs(2), "waited {waited:?}");

    // The abandoned load finishes in the background but is never installed.
    gate.send(()).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!loader.is_loaded());
}

#[tokio::test]
async fn reset_forgets_loaded_model() {
    let dir = TempDir::new().unwrap();
    let artifact = artifact(&dir, "2");
    std::fs::write(&artifact.paths.graph, ADD_GRAPH).unwrap();
    let loader = BoundedLoader::new(Arc::new(AddBackend::default()), Device::Cpu);

    loader.load(artifact, Duration::from_secs(5)).await.unwrap();
    assert!(loader.model().is_some());

    loader.reset();
    assert!(!loader.is_loaded());
    assert!(loader.model().is_none());
}

async fn wait_until_loaded<B: Backend>(loader: &BoundedLoader<B>) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !loader.is_loaded() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("first load never landed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_failure_does_not_unload() {
    let dir = TempDir::new().unwrap();
    let (backend, outcomes) = ScriptedBackend::new();
    let loads = Arc::clone(&backend.loads);
    let loader = BoundedLoader::new(Arc::new(backend), Device::Cpu);
    let deadline = Duration::from_secs(5);

    let script = async {
        outcomes.send(true).unwrap();
        wait_until_loaded(&loader).await;
        outcomes.send(false).unwrap();
    };
    let (first, second, ()) = tokio::join!(
        loader.load(artifact(&dir, "race"), deadline),
        loader.load(artifact(&dir, "race"), deadline),
        script
    );

    let failures = [&first, &second]
        .iter()
        .filter(|r| matches!(r, Err(SessionError::LoadFailed(_))))
        .count();
    assert_eq!(failures, 1, "{first:?} {second:?}");
    assert!(first.is_ok() || second.is_ok());
    assert_eq!(loads.load(Ordering::SeqCst), 2);
    assert!(loader.is_loaded());

    loader.load(artifact(&dir, "race"), deadline).await.unwrap();
    assert!(loader.is_loaded());
    assert_eq!(loads.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn overlapping_successes_keep_the_first_model() {
    let dir = TempDir::new().unwrap();
    let (backend, outcomes) = ScriptedBackend::new();
    let loader = BoundedLoader::new(Arc::new(backend), Device::Cpu);
    let deadline = Duration::from_secs(5);

    let script = async {
        outcomes.send(true).unwrap();
        wait_until_loaded(&loader).await;
        let installed = loader.model().expect("model installed");
        outcomes.send(true).unwrap();
        installed
    };
    let (first, second, installed) = tokio::join!(
        loader.load(artifact(&dir, "race"), deadline),
        loader.load(artifact(&dir, "race"), deadline),
        script
    );

    first.unwrap();
    second.unwrap();
    let current = loader.model().expect("model still installed");
    assert!(Arc::ptr_eq(&installed, &current));
}
