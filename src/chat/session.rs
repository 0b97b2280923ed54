//! Chat session. One user's conversation: state, log, and script queue.
//!
//! Handlers mutate the [`ConversationState`] under one lock and push the
//! resulting [`Script`] onto a per-session queue. A single worker task drains
//! the queue in order, sleeping through each step's delay, so the output of
//! two turns never interleaves.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::log::MessageLog;
use super::model::{Author, Card, Message, SessionEvent};
use crate::dialogue::orchestrator::{download_failed_card, download_ready_card};
use crate::dialogue::{ConversationState, Orchestrator, Script, StepAction};
use crate::documents::DocumentSource;
use crate::error::{IdentityError, SessionError};
use crate::identity::{FlowContext, HandoffFlags};

/// Work for the script worker, executed in FIFO order.
enum Job {
    Run(Script),
    ResetLog,
    Reopen { delay: Duration },
    Flush(oneshot::Sender<()>),
}

struct Inner {
    state: ConversationState,
    /// A greeting has been queued since the last reset.
    greeted: bool,
}

/// One live conversation.
pub struct ChatSession {
    id: Uuid,
    orchestrator: Arc<Orchestrator>,
    /// Reopen flag scoped to this session.
    handoff: HandoffFlags,
    inner: Mutex<Inner>,
    log: Arc<MessageLog>,
    open: Arc<AtomicBool>,
    queue: mpsc::UnboundedSender<Job>,
}

impl ChatSession {
    /// Create a session and spawn its script worker. The reopen flag is
    /// scoped to the new session's id.
    pub fn spawn(
        orchestrator: Arc<Orchestrator>,
        documents: Arc<dyn DocumentSource>,
        handoff: HandoffFlags,
    ) -> Arc<Self> {
        let id = Uuid::new_v4();
        let log = Arc::new(MessageLog::new());
        let open = Arc::new(AtomicBool::new(false));
        let (tx, rx) = mpsc::unbounded_channel();

        spawn_script_worker(id, rx, Arc::clone(&log), documents, Arc::clone(&open));
        info!(session_id = %id, "Chat session created");

        Arc::new(Self {
            id,
            orchestrator,
            handoff: handoff.scoped(id),
            inner: Mutex::new(Inner {
                state: ConversationState::default(),
                greeted: false,
            }),
            log,
            open,
            queue: tx,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Subscribe to messages and session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.log.subscribe()
    }

    /// Read-only copy of the log.
    pub async fn snapshot(&self) -> Vec<Message> {
        self.log.snapshot().await
    }

    /// Copy of the conversation state.
    pub async fn conversation_state(&self) -> ConversationState {
        self.inner.lock().await.state.clone()
    }

    /// Whether this session will reopen and resume after the next sign-in.
    pub fn reopen_requested(&self) -> bool {
        self.handoff.reopen_requested()
    }

    /// Open the chat panel. Greets the first time (and after a reset).
    pub async fn open_chat(&self) -> Result<(), SessionError> {
        self.set_open(true);
        let mut inner = self.inner.lock().await;
        if !inner.greeted && self.log.is_empty().await {
            inner.greeted = true;
            self.enqueue(Job::Run(self.orchestrator.greeting()))?;
        }
        Ok(())
    }

    /// Close the chat panel. Queued steps still run.
    pub fn close_chat(&self) {
        self.set_open(false);
    }

    /// Append a user message now and queue the reply.
    pub async fn send_message(&self, text: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let message = self.log.append(Author::User, Card::text(text)).await;
        info!(session_id = %self.id, "User message received");
        let script = self.orchestrator.handle_utterance(&mut inner.state, &message);
        self.record_handoff(&mut inner.state);
        self.enqueue(Job::Run(script))
    }

    /// Handle a button click.
    pub async fn click(&self, action: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let script = self.orchestrator.handle_action(&mut inner.state, action);
        self.record_handoff(&mut inner.state);
        self.enqueue(Job::Run(script))
    }

    /// Handle a form submission.
    pub async fn submit_form(
        &self,
        action: &str,
        fields: &BTreeMap<String, String>,
    ) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let script = self.orchestrator.submit_form(&mut inner.state, action, fields);
        self.record_handoff(&mut inner.state);
        self.enqueue(Job::Run(script))
    }

    /// Clear the log and state, then greet again.
    ///
    /// The log is cleared in queue order, after anything already queued.
    pub async fn reset_chat(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        inner.state = ConversationState::default();
        inner.greeted = true;
        info!(session_id = %self.id, "Chat reset");
        self.enqueue(Job::ResetLog)?;
        self.enqueue(Job::Run(self.orchestrator.greeting()))
    }

    /// Announce the sign-in and replay whatever was pending.
    pub async fn reinitialize_after_login(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let script = self.orchestrator.resume_after_login(&mut inner.state);
        self.enqueue(Job::Run(script))
    }

    /// Called when the user lands on a page after navigating.
    ///
    /// Once signed in, reads and clears this session's reopen flag. When it
    /// was set, the chat reopens after a short delay and the pending request
    /// resumes. A guest landing leaves the flag for the next visit. Returns
    /// whether a resume was scheduled.
    pub async fn resume_after_navigation(&self, context: FlowContext) -> Result<bool, SessionError> {
        let identity = self.orchestrator.identity();
        identity.set_flow_context(context);

        if !identity.is_authenticated() {
            debug!(session_id = %self.id, "Landing without sign-in, reopen flag kept");
            return Ok(false);
        }

        let reopen = match self.handoff.take_reopen() {
            Ok(reopen) => reopen,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "Failed to read the reopen flag");
                false
            }
        };
        if !reopen {
            debug!(session_id = %self.id, "No resume after navigation");
            return Ok(false);
        }

        let mut inner = self.inner.lock().await;
        self.enqueue(Job::Reopen {
            delay: self.orchestrator.config().reopen_delay,
        })?;
        if !inner.greeted && self.log.is_empty().await {
            inner.greeted = true;
            self.enqueue(Job::Run(self.orchestrator.greeting()))?;
        }
        let script = self.orchestrator.resume_after_login(&mut inner.state);
        info!(session_id = %self.id, context = %context, "Resuming chat after navigation");
        self.enqueue(Job::Run(script))?;
        Ok(true)
    }

    /// Resume after a sign-in. Prefers the navigation resume; when no reopen
    /// was scheduled but a request is still parked, replays it in place.
    /// Returns whether anything was resumed.
    pub async fn resume_pending(&self, context: FlowContext) -> Result<bool, SessionError> {
        if self.resume_after_navigation(context).await? {
            return Ok(true);
        }
        if !self.orchestrator.identity().is_authenticated() {
            return Ok(false);
        }

        let mut inner = self.inner.lock().await;
        if inner.state.pending_action.is_none() {
            return Ok(false);
        }
        let script = self.orchestrator.resume_after_login(&mut inner.state);
        info!(session_id = %self.id, context = %context, "Replaying parked request");
        self.enqueue(Job::Run(script))?;
        Ok(true)
    }

    /// Sign in through the identity store.
    pub async fn login(&self, user_id: &str, secret: &SecretString) -> Result<bool, IdentityError> {
        self.orchestrator.identity().login(user_id, secret).await
    }

    /// Sign out of the active flow context.
    pub fn logout(&self) -> Result<(), IdentityError> {
        self.orchestrator.identity().logout()
    }

    /// Wait until everything queued so far has run.
    pub async fn flush(&self) -> Result<(), SessionError> {
        let (tx, rx) = oneshot::channel();
        self.enqueue(Job::Flush(tx))?;
        rx.await
            .map_err(|_| SessionError::WorkerStopped { id: self.id })
    }

    /// Move a reopen request raised by the last turn into the flag.
    fn record_handoff(&self, state: &mut ConversationState) {
        if std::mem::take(&mut state.reopen_after_login) {
            if let Err(e) = self.handoff.request_reopen() {
                warn!(session_id = %self.id, error = %e, "Failed to set the reopen flag");
            }
        }
    }

    fn set_open(&self, open: bool) {
        let was = self.open.swap(open, Ordering::SeqCst);
        if was != open {
            let _ = self
                .log
                .events()
                .send(SessionEvent::ChatVisibility { open });
        }
    }

    fn enqueue(&self, job: Job) -> Result<(), SessionError> {
        self.queue
            .send(job)
            .map_err(|_| SessionError::WorkerStopped { id: self.id })
    }
}

/// Spawn the worker that executes a session's scripts in order.
///
/// Exits when the session (the only sender) is dropped.
fn spawn_script_worker(
    id: Uuid,
    mut rx: mpsc::UnboundedReceiver<Job>,
    log: Arc<MessageLog>,
    documents: Arc<dyn DocumentSource>,
    open: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            match job {
                Job::Run(script) => {
                    for step in script {
                        if !step.delay.is_zero() {
                            tokio::time::sleep(step.delay).await;
                        }
                        run_step(id, step.action, &log, &documents).await;
                    }
                }
                Job::ResetLog => log.reset().await,
                Job::Reopen { delay } => {
                    tokio::time::sleep(delay).await;
                    if !open.swap(true, Ordering::SeqCst) {
                        let _ = log.events().send(SessionEvent::ChatVisibility { open: true });
                    }
                }
                Job::Flush(done) => {
                    let _ = done.send(());
                }
            }
        }
        debug!(session_id = %id, "Script worker stopped");
    })
}

async fn run_step(
    id: Uuid,
    action: StepAction,
    log: &MessageLog,
    documents: &Arc<dyn DocumentSource>,
) {
    match action {
        StepAction::Say(card) => {
            log.append(Author::Bot, card).await;
        }
        StepAction::Redirect { path, user_hint } => {
            info!(session_id = %id, path = %path, "Redirecting");
            let _ = log.events().send(SessionEvent::Redirect { path, user_hint });
        }
        StepAction::DeliverDocument { ban } => match documents.load_bill(ban.as_deref()).await {
            Ok(doc) => {
                info!(session_id = %id, file = %doc.file_name, "Bill document delivered");
                let _ = log.events().send(SessionEvent::DocumentReady {
                    file_name: doc.file_name.clone(),
                    size_bytes: doc.size_bytes(),
                });
                log.append(Author::Bot, download_ready_card(&doc.file_name))
                    .await;
            }
            Err(e) => {
                warn!(session_id = %id, error = %e, "Bill document unavailable");
                log.append(Author::Bot, download_failed_card()).await;
            }
        },
    }
}
