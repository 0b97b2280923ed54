//! Identity store contract, a mock implementation, and the chat handoff flag.
//!
//! Authentication is simulated: any non-empty user id with a secret of at
//! least eight characters signs in. The signed-in user is persisted under
//! the key of the active flow context.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{IdentityError, StorageError};
use crate::store::KeyValueStore;

/// Minimum secret length the mock login accepts.
pub const MIN_SECRET_LEN: usize = 8;

/// Session-storage key of the "reopen the chat after login" flag.
pub const REOPEN_CHAT_KEY: &str = "reopenChatAfterLogin";

/// Which product line the session is operating under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlowContext {
    Consumer,
    SmallBusiness,
    Enterprise,
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::Consumer
    }
}

impl FlowContext {
    /// Storage key the signed-in user is persisted under.
    pub fn storage_key(&self) -> &'static str {
        match self {
            Self::Consumer => "consumerUser",
            Self::SmallBusiness => "businessUser",
            Self::Enterprise => "enterpriseUser",
        }
    }

    /// Landing page for this context; sign-in returns here.
    pub fn landing_path(&self) -> &'static str {
        match self {
            Self::Consumer => "/",
            Self::SmallBusiness => "/small-business",
            Self::Enterprise => "/enterprise",
        }
    }

    /// Context implied by a redirect path. Unknown paths are consumer.
    pub fn from_path(path: &str) -> Self {
        match path.trim_end_matches('/') {
            "/small-business" => Self::SmallBusiness,
            "/enterprise" => Self::Enterprise,
            _ => Self::Consumer,
        }
    }
}

impl std::fmt::Display for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Consumer => "consumer",
            Self::SmallBusiness => "small-business",
            Self::Enterprise => "enterprise",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for FlowContext {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consumer" => Ok(Self::Consumer),
            "small-business" | "business" => Ok(Self::SmallBusiness),
            "enterprise" => Ok(Self::Enterprise),
            _ => Err(format!("Unknown flow context: {}", s)),
        }
    }
}

/// The current user record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub display_name: String,
    pub is_authenticated: bool,
}

impl User {
    /// An authenticated user; the display name is the part before `@`.
    pub fn signed_in(email: impl Into<String>) -> Self {
        let email = email.into();
        let display_name = email
            .split('@')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("User")
            .to_string();
        Self {
            email,
            display_name,
            is_authenticated: true,
        }
    }
}

/// What the dialogue needs to know about the signed-in user.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    /// Whether a user is signed in under the active flow context.
    fn is_authenticated(&self) -> bool {
        self.current_user().is_authenticated
    }

    /// The user signed in under the active flow context (or a guest).
    fn current_user(&self) -> User;

    /// Attempt a sign-in. `Ok(false)` means the credentials were rejected.
    async fn login(&self, user_id: &str, secret: &SecretString) -> Result<bool, IdentityError>;

    /// Sign out of the active flow context.
    fn logout(&self) -> Result<(), IdentityError>;

    /// The active flow context.
    fn flow_context(&self) -> FlowContext;

    /// Switch the active flow context.
    fn set_flow_context(&self, context: FlowContext);

    /// Where to return after sign-in.
    fn redirect_path(&self) -> String;

    /// Set where to return after sign-in.
    fn set_redirect_path(&self, path: &str);
}

/// Mock identity store persisted through a [`KeyValueStore`].
pub struct MockIdentityStore {
    storage: Arc<dyn KeyValueStore>,
    context: RwLock<FlowContext>,
    redirect_path: RwLock<String>,
    login_delay: Duration,
}

impl MockIdentityStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, login_delay: Duration) -> Self {
        Self {
            storage,
            context: RwLock::new(FlowContext::default()),
            redirect_path: RwLock::new("/".to_string()),
            login_delay,
        }
    }

    fn read_user(&self, context: FlowContext) -> Result<Option<User>, IdentityError> {
        let raw = self
            .storage
            .get(context.storage_key())
            .map_err(|source| IdentityError::Persist {
                context: context.to_string(),
                source,
            })?;
        match raw {
            Some(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                IdentityError::CorruptRecord {
                    context: context.to_string(),
                    reason: e.to_string(),
                }
            }),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl IdentityStore for MockIdentityStore {
    fn current_user(&self) -> User {
        let context = self.flow_context();
        match self.read_user(context) {
            Ok(Some(user)) => user,
            Ok(None) => User::default(),
            Err(e) => {
                warn!(context = %context, error = %e, "Treating unreadable user as guest");
                User::default()
            }
        }
    }

    async fn login(&self, user_id: &str, secret: &SecretString) -> Result<bool, IdentityError> {
        if !self.login_delay.is_zero() {
            tokio::time::sleep(self.login_delay).await;
        }

        let user_id = user_id.trim();
        if user_id.is_empty() || secret.expose_secret().chars().count() < MIN_SECRET_LEN {
            info!("Mock login rejected");
            return Ok(false);
        }

        let context = self.flow_context();
        let user = User::signed_in(user_id);
        let json = serde_json::to_string(&user).map_err(|e| IdentityError::Persist {
            context: context.to_string(),
            source: StorageError::Serialization(e),
        })?;
        // File-backed stores block on disk writes.
        let storage = Arc::clone(&self.storage);
        let key = context.storage_key();
        tokio::task::spawn_blocking(move || storage.set(key, &json))
            .await
            .map_err(StorageError::from)
            .and_then(|written| written)
            .map_err(|source| IdentityError::Persist {
                context: context.to_string(),
                source,
            })?;

        info!(context = %context, user = %user.display_name, "Mock login accepted");
        Ok(true)
    }

    fn logout(&self) -> Result<(), IdentityError> {
        let context = self.flow_context();
        self.storage
            .remove(context.storage_key())
            .map_err(|source| IdentityError::Persist {
                context: context.to_string(),
                source,
            })?;
        info!(context = %context, "Logged out");
        Ok(())
    }

    fn flow_context(&self) -> FlowContext {
        self.context
            .read()
            .map(|c| *c)
            .unwrap_or_else(|e| *e.into_inner())
    }

    fn set_flow_context(&self, context: FlowContext) {
        match self.context.write() {
            Ok(mut guard) => *guard = context,
            Err(e) => *e.into_inner() = context,
        }
    }

    fn redirect_path(&self) -> String {
        self.redirect_path
            .read()
            .map(|p| p.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    fn set_redirect_path(&self, path: &str) {
        match self.redirect_path.write() {
            Ok(mut guard) => *guard = path.to_string(),
            Err(e) => *e.into_inner() = path.to_string(),
        }
    }
}

/// The cross-page handoff flag, kept in session storage.
///
/// Set when a request is parked behind sign-in; the next page load reads
/// and clears it to reopen and resume the chat. Each chat session works on
/// its own copy (see [`HandoffFlags::scoped`]).
#[derive(Clone)]
pub struct HandoffFlags {
    session: Arc<dyn KeyValueStore>,
    key: String,
}

impl HandoffFlags {
    pub fn new(session: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session,
            key: REOPEN_CHAT_KEY.to_string(),
        }
    }

    /// Flags over the same storage under a key of their own.
    pub fn scoped(&self, scope: impl std::fmt::Display) -> Self {
        Self {
            session: Arc::clone(&self.session),
            key: format!("{}:{}", REOPEN_CHAT_KEY, scope),
        }
    }

    /// Storage key of this flag.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ask the next page load to reopen the chat and resume.
    pub fn request_reopen(&self) -> Result<(), StorageError> {
        self.session.set(&self.key, "true")
    }

    /// Whether a reopen is pending, without clearing it.
    pub fn reopen_requested(&self) -> bool {
        matches!(self.session.get(&self.key), Ok(Some(_)))
    }

    /// Read and clear the flag. Returns true if it was set.
    pub fn take_reopen(&self) -> Result<bool, StorageError> {
        let was_set = self.session.get(&self.key)?.is_some();
        if was_set {
            self.session.remove(&self.key)?;
        }
        Ok(was_set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn store() -> MockIdentityStore {
        MockIdentityStore::new(Arc::new(MemoryStore::new()), Duration::ZERO)
    }

    #[tokio::test]
    async fn login_accepts_eight_char_secret() {
        let identity = store();
        assert!(!identity.is_authenticated());

        let ok = identity
            .login("pat@example.com", &SecretString::from("hunter22".to_string()))
            .await
            .unwrap();
        assert!(ok);
        assert!(identity.is_authenticated());

        let user = identity.current_user();
        assert_eq!(user.email, "pat@example.com");
        assert_eq!(user.display_name, "pat");
    }

    #[tokio::test]
    async fn login_rejects_short_secret_and_empty_id() {
        let identity = store();
        let short = SecretString::from("short".to_string());
        assert!(!identity.login("pat", &short).await.unwrap());

        let long = SecretString::from("long-enough".to_string());
        assert!(!identity.login("   ", &long).await.unwrap());
        assert!(!identity.is_authenticated());
    }

    #[tokio::test]
    async fn sessions_are_keyed_by_flow_context() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let identity = MockIdentityStore::new(Arc::clone(&storage), Duration::ZERO);

        identity.set_flow_context(FlowContext::SmallBusiness);
        let secret = SecretString::from("password1".to_string());
        assert!(identity.login("owner@shop.com", &secret).await.unwrap());
        assert!(storage.get("businessUser").unwrap().is_some());

        identity.set_flow_context(FlowContext::Consumer);
        assert!(!identity.is_authenticated());

        identity.set_flow_context(FlowContext::SmallBusiness);
        assert!(identity.is_authenticated());

        identity.logout().unwrap();
        assert!(!identity.is_authenticated());
    }

    #[tokio::test]
    async fn login_persists_to_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("local.json");
        let storage: Arc<dyn KeyValueStore> =
            Arc::new(crate::store::JsonFileStore::open(&path).unwrap());
        let identity = MockIdentityStore::new(storage, Duration::ZERO);

        let secret = SecretString::from("password1".to_string());
        assert!(identity.login("pat@example.com", &secret).await.unwrap());

        let reopened = crate::store::JsonFileStore::open(&path).unwrap();
        let raw = reopened.get("consumerUser").unwrap().unwrap();
        assert!(raw.contains("pat@example.com"));
    }

    #[test]
    fn corrupt_record_reads_as_guest() {
        let storage: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        storage.set("consumerUser", "{not json").unwrap();
        let identity = MockIdentityStore::new(storage, Duration::ZERO);
        assert!(!identity.is_authenticated());
    }

    #[test]
    fn redirect_path_round_trips() {
        let identity = store();
        assert_eq!(identity.redirect_path(), "/");
        identity.set_redirect_path("/small-business");
        assert_eq!(identity.redirect_path(), "/small-business");
    }

    #[test]
    fn flow_context_paths_and_keys() {
        assert_eq!(FlowContext::from_path("/small-business"), FlowContext::SmallBusiness);
        assert_eq!(FlowContext::from_path("/enterprise/"), FlowContext::Enterprise);
        assert_eq!(FlowContext::from_path("/bills"), FlowContext::Consumer);
        assert_eq!(FlowContext::Enterprise.storage_key(), "enterpriseUser");
        assert_eq!(FlowContext::SmallBusiness.landing_path(), "/small-business");
    }

    #[test]
    fn flow_context_display_matches_serde() {
        for ctx in [
            FlowContext::Consumer,
            FlowContext::SmallBusiness,
            FlowContext::Enterprise,
        ] {
            let json = serde_json::to_string(&ctx).unwrap();
            assert_eq!(format!("\"{ctx}\""), json);
            assert_eq!(ctx.to_string().parse::<FlowContext>().unwrap(), ctx);
        }
    }

    #[test]
    fn handoff_flag_is_taken_once() {
        let flags = HandoffFlags::new(Arc::new(MemoryStore::new()));
        assert!(!flags.take_reopen().unwrap());

        flags.request_reopen().unwrap();
        assert!(flags.reopen_requested());
        assert!(flags.take_reopen().unwrap());
        assert!(!flags.reopen_requested());
        assert!(!flags.take_reopen().unwrap());
    }

    #[test]
    fn scoped_flags_do_not_share_state() {
        let base = HandoffFlags::new(Arc::new(MemoryStore::new()));
        let a = base.scoped("a");
        let b = base.scoped("b");
        assert_eq!(a.key(), "reopenChatAfterLogin:a");

        a.request_reopen().unwrap();
        assert!(!b.take_reopen().unwrap());
        assert!(!base.reopen_requested());
        assert!(a.take_reopen().unwrap());
    }

    #[test]
    fn display_name_falls_back_for_bare_at() {
        let user = User::signed_in("@example.com");
        assert_eq!(user.display_name, "User");
    }
}
