use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "nnrelayd", version, about = "nnrelay remote inference daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the inference server
    Serve {
        /// Bind address for gRPC
        #[arg(long, default_value = "0.0.0.0:50051")]
        grpc_addr: String,

        /// Log level (RUST_LOG)
        #[arg(long, default_value = "info")]
        log: String,

        /// Device for inference (cpu or cuda:N)
        #[arg(long, default_value = "cpu")]
        device: String,

        /// Inference engine serving the uploaded models
        #[arg(long, default_value = "onnx")]
        backend: String,

        /// Directory receiving uploaded model artifacts
        #[arg(long)]
        model_dir: String,

        /// Serve every token from this pre-provisioned model id instead of
        /// per-token uploads; artifacts are never deleted
        #[arg(long)]
        shared_model: Option<String>,

        /// Deadline for a single model load, in milliseconds
        #[arg(long, default_value_t = 18_000)]
        load_timeout_ms: u64,

        /// Maximum requests served concurrently per connection
        #[arg(long, default_value_t = 10)]
        max_workers: usize,
    },
}
