use std::sync::Arc;
use std::time::Duration;

use nnrelay_core::{Backend, BackendModel, Device, ModelArtifact};
use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::{Result, SessionError};

pub type SharedModel<M> = Arc<Mutex<M>>;

/// Loads a model with a deadline and caches the result.
///
/// The backend call runs on the blocking pool and reports through a oneshot.
/// A load that misses the deadline is not cancelled: it keeps running and
/// whatever it eventually produces is dropped together with the orphaned
/// sender. Repeated timeouts against a hung backend therefore pile up
/// blocked threads until the backend returns.
pub struct BoundedLoader<B: Backend> {
    backend: Arc<B>,
    device: Device,
    model: RwLock<Option<SharedModel<B::Model>>>,
}

impl<B: Backend> BoundedLoader<B> {
    pub fn new(backend: Arc<B>, device: Device) -> Self {
        Self {
            backend,
            device,
            model: RwLock::new(None),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.model.read().is_some()
    }

    pub fn model(&self) -> Option<SharedModel<B::Model>> {
        self.model.read().clone()
    }

    /// Drops the cached model so the next `load` starts from scratch.
    pub fn reset(&self) {
        self.model.write().take();
    }

    pub async fn load(&self, artifact: ModelArtifact, timeout: Duration) -> Result<()> {
        if self.is_loaded() {
            return Ok(());
        }

        let (tx, rx) = oneshot::channel();
        let backend = Arc::clone(&self.backend);
        let device = self.device.clone();
        let model_id = artifact.model_id.clone();
        tokio::task::spawn_blocking(move || {
            let result = backend.load(&artifact, &device);
            // The receiver is gone once the caller has given up.
            let _ = tx.send(result);
        });

        match tokio::time::timeout(timeout, rx).await {
            Err(_) => {
                warn!(model = %model_id, ?timeout, "model load timed out");
                Err(SessionError::LoadTimeout(timeout))
            }
            Ok(Err(_)) => {
                warn!(model = %model_id, "model load worker exited without reporting");
                Err(SessionError::LoadAborted)
            }
            Ok(Ok(Err(err))) => {
                warn!(model = %model_id, error = %format!("{err:#}"), "model load failed");
                Err(SessionError::LoadFailed(err))
            }
            Ok(Ok(Ok(model))) => {
                let spec = model.spec();
                info!(
                    model = %model_id,
                    backend = self.backend.name(),
                    inputs = spec.inputs.len(),
                    outputs = spec.outputs.len(),
                    "model loaded"
                );
                let mut slot = self.model.write();
                // A racing load may have won already; keep the first model.
                if slot.is_none() {
                    *slot = Some(Arc::new(Mutex::new(model)));
                }
                Ok(())
            }
        }
    }
}
