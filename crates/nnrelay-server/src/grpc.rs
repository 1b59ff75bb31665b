use std::sync::Arc;

use bytes::Bytes;
use nnrelay_core::{ArtifactKind, Backend, WireTensor};
use nnrelay_proto::nnrelay::v1 as pb;
use nnrelay_runtime::{InferenceDispatcher, SessionRegistry, Token};
use tonic::{Request, Response, Status, Streaming};
use tracing::warn;

pub struct RemoteInferenceSvc<B: Backend> {
    registry: Arc<SessionRegistry<B>>,
    dispatcher: InferenceDispatcher<B>,
}

impl<B: Backend> RemoteInferenceSvc<B> {
    pub fn new(registry: Arc<SessionRegistry<B>>) -> Self {
        let dispatcher = InferenceDispatcher::new(Arc::clone(&registry));
        Self {
            registry,
            dispatcher,
        }
    }

    async fn receive_chunks(
        &self,
        mut stream: Streaming<pb::RequestDataChunks>,
        kind: ArtifactKind,
    ) -> Result<bool, Status> {
        while let Some(chunk) = stream.message().await? {
            let token = token_from_pb(chunk.token);
            if let Err(err) = self.registry.append_chunk(&token, kind, &chunk.data) {
                warn!(%token, %kind, error = %err, "artifact upload failed");
                return Ok(false);
            }
        }
        Ok(true)
    }
}

#[tonic::async_trait]
impl<B: Backend> pb::remote_inference_server::RemoteInference for RemoteInferenceSvc<B> {
    async fn prepare(
        &self,
        req: Request<pb::RequestString>,
    ) -> Result<Response<pb::ReplyStatus>, Status> {
        let token = token_from_pb(req.into_inner().token);
        self.registry.prepare(token);
        Ok(status(true))
    }

    async fn send_xml(
        &self,
        req: Request<Streaming<pb::RequestDataChunks>>,
    ) -> Result<Response<pb::ReplyStatus>, Status> {
        let ok = self
            .receive_chunks(req.into_inner(), ArtifactKind::Graph)
            .await?;
        Ok(status(ok))
    }

    async fn send_bin(
        &self,
        req: Request<Streaming<pb::RequestDataChunks>>,
    ) -> Result<Response<pb::ReplyStatus>, Status> {
        let ok = self
            .receive_chunks(req.into_inner(), ArtifactKind::Weights)
            .await?;
        Ok(status(ok))
    }

    async fn load_model(
        &self,
        req: Request<pb::RequestString>,
    ) -> Result<Response<pb::ReplyStatus>, Status> {
        let req = req.into_inner();
        let token = token_from_pb(req.token);
        // Failure and timeout are already logged apart by the loader.
        let ok = self.registry.load_model(&token, req.quant_type).await.is_ok();
        Ok(status(ok))
    }

    async fn release(
        &self,
        req: Request<pb::RequestString>,
    ) -> Result<Response<pb::ReplyStatus>, Status> {
        let token = token_from_pb(req.into_inner().token);
        self.registry.release(&token);
        Ok(status(true))
    }

    async fn get_infer_result(
        &self,
        req: Request<pb::RequestDataTensors>,
    ) -> Result<Response<pb::ReplyDataTensors>, Status> {
        let req = req.into_inner();
        let token = token_from_pb(req.token);
        let inputs: Vec<WireTensor> = req.data_tensors.into_iter().map(tensor_from_pb).collect();

        let outputs = self.dispatcher.infer(&token, &inputs).await;

        Ok(Response::new(pb::ReplyDataTensors {
            data_tensors: outputs.into_iter().map(tensor_to_pb).collect(),
        }))
    }
}

fn status(ok: bool) -> Response<pb::ReplyStatus> {
    Response::new(pb::ReplyStatus { status: ok })
}

fn token_from_pb(token: Option<pb::Token>) -> Token {
    Token::new(token.map(|t| t.data).unwrap_or_default())
}

fn tensor_from_pb(t: pb::DataTensor) -> WireTensor {
    WireTensor {
        node_name: t.node_name,
        shape: t.tensor_shape,
        dtype: t.data_type,
        data: Bytes::from(t.data),
    }
}

fn tensor_to_pb(t: WireTensor) -> pb::DataTensor {
    pb::DataTensor {
        data: t.data.to_vec(),
        node_name: t.node_name,
        tensor_shape: t.shape,
        data_type: t.dtype,
    }
}
