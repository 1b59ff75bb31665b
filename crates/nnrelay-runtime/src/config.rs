use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Result};
use nnrelay_core::Device;

pub const DEFAULT_LOAD_TIMEOUT: Duration = Duration::from_millis(18_000);

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Root directory holding uploaded (or pre-provisioned) artifacts.
    pub model_dir: PathBuf,
    /// When set, every token shares this one externally provisioned model
    /// and artifacts are never deleted.
    pub shared_model: Option<String>,
    pub load_timeout: Duration,
    pub device: Device,
}

impl ServiceConfig {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            shared_model: None,
            load_timeout: DEFAULT_LOAD_TIMEOUT,
            device: Device::Cpu,
        }
    }

    pub fn with_shared_model(mut self, model_id: impl Into<String>) -> Self {
        self.shared_model = Some(model_id.into());
        self
    }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout = timeout;
        self
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn shared_storage(&self) -> bool {
        self.shared_model.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.model_dir.is_dir(),
            "model directory {} does not exist or is not a directory",
            self.model_dir.display()
        );
        ensure!(!self.load_timeout.is_zero(), "load timeout must be non-zero");
        if let Some(model_id) = &self.shared_model {
            ensure!(!model_id.is_empty(), "shared model id must not be empty");
        }
        Ok(())
    }
}
