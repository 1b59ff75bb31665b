use anyhow::Result;

use crate::{Device, ModelArtifact, ModelSpec, NamedTensor};

/// An inference engine able to turn uploaded artifacts into runnable models.
///
/// `load` may block for a long time; callers bound it with a deadline.
pub trait Backend: Send + Sync + 'static {
    type Model: BackendModel;

    fn name(&self) -> &'static str;
    fn load(&self, artifact: &ModelArtifact, device: &Device) -> Result<Self::Model>;
}

pub trait BackendModel: Send + 'static {
    fn spec(&self) -> &ModelSpec;

    /// Runs the graph on named inputs and returns every named output.
    /// Malformed inputs (unknown names, wrong shapes) are reported as errors.
    fn infer(&mut self, inputs: Vec<NamedTensor>) -> Result<Vec<NamedTensor>>;
}
