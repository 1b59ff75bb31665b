use std::sync::Arc;
use std::time::Instant;

use nnrelay_core::codec::{self, WireTensor};
use nnrelay_core::Backend;
use tracing::{debug, warn};

use crate::{Result, SessionRegistry, Token};

/// Serves inference requests in wire form.
///
/// Every failure (unknown token, undecodable input, model not loaded,
/// backend error) is answered with zero output tensors.
pub struct InferenceDispatcher<B: Backend> {
    registry: Arc<SessionRegistry<B>>,
}

impl<B: Backend> InferenceDispatcher<B> {
    pub fn new(registry: Arc<SessionRegistry<B>>) -> Self {
        Self { registry }
    }

    pub async fn infer(&self, token: &Token, inputs: &[WireTensor]) -> Vec<WireTensor> {
        match self.try_infer(token, inputs).await {
            Ok(outputs) => outputs,
            Err(err) => {
                warn!(%token, error = %err, "inference produced no outputs");
                Vec::new()
            }
        }
    }

    pub async fn try_infer(&self, token: &Token, inputs: &[WireTensor]) -> Result<Vec<WireTensor>> {
        let started = Instant::now();
        let session = self.registry.get(token)?;

        let decoded = inputs
            .iter()
            .map(codec::decode_tensor)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let backend_started = Instant::now();
        let outputs = session.infer(decoded).await?;
        let backend_us = backend_started.elapsed().as_micros() as u64;

        let encoded: Vec<WireTensor> = outputs.iter().map(codec::encode_tensor).collect();
        debug!(
            %token,
            outputs = encoded.len(),
            backend_us,
            total_us = started.elapsed().as_micros() as u64,
            "inference served"
        );
        Ok(encoded)
    }
}
