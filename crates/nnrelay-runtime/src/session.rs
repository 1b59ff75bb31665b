use std::sync::Arc;
use std::time::Duration;

use nnrelay_core::{ArtifactKind, Backend, BackendModel, Device, ModelArtifact, NamedTensor};

use crate::{ArtifactStore, BoundedLoader, Result, SessionError};

/// One model's upload, load and inference state.
pub struct Session<B: Backend> {
    model_id: String,
    store: ArtifactStore,
    loader: BoundedLoader<B>,
}

impl<B: Backend> Session<B> {
    pub fn new(model_id: String, store: ArtifactStore, backend: Arc<B>, device: Device) -> Self {
        Self {
            model_id,
            store,
            loader: BoundedLoader::new(backend, device),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn is_loaded(&self) -> bool {
        self.loader.is_loaded()
    }

    pub fn prepare(&self) {
        self.store.prepare_directory();
        self.loader.reset();
    }

    pub fn append_chunk(&self, kind: ArtifactKind, chunk: &[u8]) -> Result<()> {
        self.store.append(kind, chunk)
    }

    pub async fn load(&self, quantization: i32, timeout: Duration) -> Result<()> {
        let artifact = ModelArtifact {
            model_id: self.model_id.clone(),
            paths: self.store.paths().clone(),
            quantization,
        };
        self.loader.load(artifact, timeout).await
    }

    /// Runs the loaded model on the blocking pool.
    pub async fn infer(&self, inputs: Vec<NamedTensor>) -> Result<Vec<NamedTensor>> {
        let model = self.loader.model().ok_or(SessionError::NotLoaded)?;
        let outcome = tokio::task::spawn_blocking(move || model.lock().infer(inputs)).await;
        match outcome {
            Ok(Ok(outputs)) => Ok(outputs),
            Ok(Err(err)) => Err(SessionError::Inference(err)),
            Err(join) => Err(SessionError::Inference(anyhow::anyhow!(
                "inference worker failed: {join}"
            ))),
        }
    }

    pub fn release(&self) {
        self.store.release();
        self.loader.reset();
    }
}
