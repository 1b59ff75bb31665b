use std::path::{Path, PathBuf};

/// File name prefix shared by every uploaded artifact.
pub const ARTIFACT_PREFIX: &str = "remote_model_";
pub const GRAPH_EXTENSION: &str = "onnx";
pub const WEIGHTS_EXTENSION: &str = "bin";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Graph,
    Weights,
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactKind::Graph => f.write_str("graph"),
            ArtifactKind::Weights => f.write_str("weights"),
        }
    }
}

/// Locations of the graph descriptor and weight blob for one model id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub graph: PathBuf,
    pub weights: PathBuf,
}

impl ArtifactPaths {
    /// Pure path derivation, touches nothing on disk.
    pub fn for_model(dir: &Path, model_id: &str) -> Self {
        let stem = format!("{ARTIFACT_PREFIX}{model_id}");
        Self {
            graph: dir.join(format!("{stem}.{GRAPH_EXTENSION}")),
            weights: dir.join(format!("{stem}.{WEIGHTS_EXTENSION}")),
        }
    }

    pub fn path(&self, kind: ArtifactKind) -> &Path {
        match kind {
            ArtifactKind::Graph => &self.graph,
            ArtifactKind::Weights => &self.weights,
        }
    }
}

/// Everything a backend needs to load one model.
#[derive(Clone, Debug)]
pub struct ModelArtifact {
    pub model_id: String,
    pub paths: ArtifactPaths,
    /// Caller-supplied quantization hint, backend specific.
    pub quantization: i32,
}
