//! Session registry: live chat sessions by id.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::info;
use uuid::Uuid;

use super::session::ChatSession;
use crate::dialogue::Orchestrator;
use crate::documents::DocumentSource;
use crate::error::SessionError;
use crate::identity::HandoffFlags;

/// Creates sessions that share one orchestrator and document source. Each
/// session gets its own slice of the handoff flags.
pub struct SessionRegistry {
    orchestrator: Arc<Orchestrator>,
    documents: Arc<dyn DocumentSource>,
    handoff: HandoffFlags,
    sessions: RwLock<HashMap<Uuid, Arc<ChatSession>>>,
}

impl SessionRegistry {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        documents: Arc<dyn DocumentSource>,
        handoff: HandoffFlags,
    ) -> Arc<Self> {
        Arc::new(Self {
            orchestrator,
            documents,
            handoff,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Start a new session.
    pub async fn create(&self) -> Arc<ChatSession> {
        let session = ChatSession::spawn(
            Arc::clone(&self.orchestrator),
            Arc::clone(&self.documents),
            self.handoff.clone(),
        );
        self.sessions
            .write()
            .await
            .insert(session.id(), Arc::clone(&session));
        session
    }

    pub async fn get(&self, id: Uuid) -> Result<Arc<ChatSession>, SessionError> {
        self.sessions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(SessionError::NotFound { id })
    }

    /// Drop a session. Its worker stops once queued steps have run.
    pub async fn remove(&self, id: Uuid) -> bool {
        let removed = self.sessions.write().await.remove(&id).is_some();
        if removed {
            info!(session_id = %id, "Chat session removed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
