use std::path::PathBuf;
use std::time::Duration;

use nnrelay_core::{ArtifactKind, CodecError};
use thiserror::Error;

use crate::Token;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no session prepared for token {0}")]
    UnknownSession(Token),

    #[error("failed to append {kind} chunk to {}", path.display())]
    Transfer {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} artifact is shared and read-only")]
    SharedArtifact { kind: ArtifactKind },

    #[error("model load did not finish within {0:?}")]
    LoadTimeout(Duration),

    #[error("model load failed: {0:#}")]
    LoadFailed(anyhow::Error),

    #[error("model load worker exited without reporting")]
    LoadAborted,

    #[error("model is not loaded")]
    NotLoaded,

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
