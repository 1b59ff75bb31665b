use std::sync::Arc;

use dashmap::DashMap;
use nnrelay_core::{ArtifactKind, Backend};
use tracing::{info, warn};

use crate::{ArtifactStore, Result, ServiceConfig, Session, SessionError, Token};

/// Token to session mapping shared by every RPC handler.
///
/// In shared-storage mode all tokens alias one session built at startup over
/// the pre-provisioned artifacts.
pub struct SessionRegistry<B: Backend> {
    backend: Arc<B>,
    config: ServiceConfig,
    sessions: DashMap<Token, Arc<Session<B>>>,
    shared: Option<Arc<Session<B>>>,
}

impl<B: Backend> SessionRegistry<B> {
    pub fn new(backend: B, config: ServiceConfig) -> Self {
        let backend = Arc::new(backend);
        let shared = config.shared_model.as_ref().map(|model_id| {
            let store = ArtifactStore::new(&config.model_dir, model_id, true);
            Arc::new(Session::new(
                model_id.clone(),
                store,
                Arc::clone(&backend),
                config.device.clone(),
            ))
        });

        Self {
            backend,
            config,
            sessions: DashMap::new(),
            shared,
        }
    }

    /// Opens (or reopens) the session for `token`. A live session under the
    /// same token is replaced.
    pub fn prepare(&self, token: Token) -> Arc<Session<B>> {
        let session = match &self.shared {
            Some(shared) => Arc::clone(shared),
            None => {
                let model_id = token.model_id();
                let store = ArtifactStore::new(&self.config.model_dir, &model_id, false);
                let session = Arc::new(Session::new(
                    model_id,
                    store,
                    Arc::clone(&self.backend),
                    self.config.device.clone(),
                ));
                session.prepare();
                session
            }
        };

        info!(%token, model = session.model_id(), shared = self.config.shared_storage(), "session prepared");
        if self.sessions.insert(token, Arc::clone(&session)).is_some() {
            info!(model = session.model_id(), "replaced live session");
        }
        session
    }

    /// Returns whether a session was removed. Unknown tokens are a no-op.
    pub fn release(&self, token: &Token) -> bool {
        let Some((_, session)) = self.sessions.remove(token) else {
            warn!(%token, "release for unknown session");
            return false;
        };

        if self.shared.is_none() {
            session.release();
        }
        info!(%token, model = session.model_id(), "session released");
        true
    }

    pub fn get(&self, token: &Token) -> Result<Arc<Session<B>>> {
        self.sessions
            .get(token)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SessionError::UnknownSession(token.clone()))
    }

    pub fn append_chunk(&self, token: &Token, kind: ArtifactKind, chunk: &[u8]) -> Result<()> {
        let session = self.get(token).inspect_err(|_| {
            warn!(%token, %kind, "chunk for unknown session");
        })?;
        session.append_chunk(kind, chunk)
    }

    pub async fn load_model(&self, token: &Token, quantization: i32) -> Result<()> {
        let session = self.get(token).inspect_err(|_| {
            warn!(%token, "load for unknown session");
        })?;
        session.load(quantization, self.config.load_timeout).await
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
