use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use nnrelay_core::{ArtifactKind, ArtifactPaths};
use tracing::{debug, warn};

use crate::{Result, SessionError};

/// The graph descriptor and weight blob owned by one session.
///
/// In shared mode the files belong to whoever provisioned them and are never
/// removed from here.
#[derive(Debug)]
pub struct ArtifactStore {
    paths: ArtifactPaths,
    shared: bool,
}

impl ArtifactStore {
    pub fn new(dir: &Path, model_id: &str, shared: bool) -> Self {
        Self {
            paths: ArtifactPaths::for_model(dir, model_id),
            shared,
        }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }

    pub fn is_shared(&self) -> bool {
        self.shared
    }

    /// Makes sure no stale artifact survives into a new upload.
    pub fn prepare_directory(&self) {
        self.remove_artifacts();
    }

    pub fn append_graph_chunk(&self, chunk: &[u8]) -> Result<()> {
        self.append(ArtifactKind::Graph, chunk)
    }

    pub fn append_weight_chunk(&self, chunk: &[u8]) -> Result<()> {
        self.append(ArtifactKind::Weights, chunk)
    }

    /// Shared artifacts are provisioned externally and never written to.
    pub fn append(&self, kind: ArtifactKind, chunk: &[u8]) -> Result<()> {
        if self.shared {
            return Err(SessionError::SharedArtifact { kind });
        }
        let path = self.paths.path(kind);
        let write = || -> io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            file.write_all(chunk)
        };
        write().map_err(|source| SessionError::Transfer {
            kind,
            path: path.to_path_buf(),
            source,
        })?;
        debug!(%kind, path = %path.display(), bytes = chunk.len(), "appended artifact chunk");
        Ok(())
    }

    pub fn release(&self) {
        self.remove_artifacts();
    }

    fn remove_artifacts(&self) {
        if self.shared {
            return;
        }
        for path in [&self.paths.graph, &self.paths.weights] {
            match std::fs::remove_file(path) {
                Ok(()) => debug!(path = %path.display(), "removed artifact"),
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => warn!(path = %path.display(), error = %err, "failed to remove artifact"),
            }
        }
    }
}
