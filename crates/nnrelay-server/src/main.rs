mod cli;
mod grpc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use nnrelay_backend_ort::OrtBackend;
use nnrelay_core::{Backend, Device};
use nnrelay_proto::nnrelay::v1::remote_inference_server::RemoteInferenceServer;
use nnrelay_runtime::{ServiceConfig, SessionRegistry};
use tonic_reflection::server::Builder as ReflectionBuilder;
use tracing_subscriber::EnvFilter;

use grpc::RemoteInferenceSvc;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            grpc_addr,
            log,
            device,
            backend,
            model_dir,
            shared_model,
            load_timeout_ms,
            max_workers,
        } => {
            std::env::set_var("RUST_LOG", &log);
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();

            let mut config = ServiceConfig::new(model_dir)
                .with_device(parse_device(&device)?)
                .with_load_timeout(Duration::from_millis(load_timeout_ms));
            if let Some(model_id) = shared_model {
                config = config.with_shared_model(model_id);
            }
            config.validate()?;
            anyhow::ensure!(max_workers > 0, "max workers must be at least 1");

            match backend.as_str() {
                "onnx" => serve(OrtBackend::new(), config, grpc_addr, max_workers).await,
                other => anyhow::bail!("unsupported backend: {other} (expected onnx)"),
            }
        }
    }
}

async fn serve<B: Backend>(
    backend: B,
    config: ServiceConfig,
    grpc_addr: String,
    max_workers: usize,
) -> Result<()> {
    let addr: std::net::SocketAddr = grpc_addr.parse().context("invalid gRPC bind address")?;

    tracing::info!(
        backend = backend.name(),
        model_dir = %config.model_dir.display(),
        shared_model = config.shared_model.as_deref().unwrap_or("-"),
        load_timeout = ?config.load_timeout,
        "starting session registry"
    );
    let registry = Arc::new(SessionRegistry::new(backend, config));
    let svc = RemoteInferenceSvc::new(registry);

    tracing::info!(%addr, max_workers, "nnrelayd gRPC listening");
    let reflection = ReflectionBuilder::configure()
        .register_encoded_file_descriptor_set(nnrelay_proto::FILE_DESCRIPTOR_SET)
        .build_v1()
        .map_err(|e| anyhow::anyhow!("reflection build failed: {e}"))?;

    tonic::transport::Server::builder()
        .concurrency_limit_per_connection(max_workers)
        .add_service(RemoteInferenceServer::new(svc))
        .add_service(reflection)
        .serve(addr)
        .await?;

    Ok(())
}

fn parse_device(raw: &str) -> Result<Device> {
    if raw.eq_ignore_ascii_case("cpu") {
        return Ok(Device::Cpu);
    }

    if let Some(rest) = raw.strip_prefix("cuda:") {
        let device_id: u32 = rest.parse().context("invalid cuda device id")?;
        return Ok(Device::Cuda { device_id });
    }

    anyhow::bail!("unsupported device: {raw} (expected cpu or cuda:N)");
}
