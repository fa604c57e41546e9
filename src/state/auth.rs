//! Session store: who is logged in, persisted across restarts.
//!
//! SYSTEM CONTEXT
//! ==============
//! Commands and guards read identity and role through [`AuthStore`]; services
//! read the bearer token from it. Nothing else mutates session state.
//!
//! ARCHITECTURE
//! ============
//! Every mutation follows the same three steps under the session write lock:
//! compute the next [`Session`], [`persist`] it, then commit it in memory.
//! A failed persist puts both stored keys back as they were and leaves the
//! in-memory session untouched.
//!
//! When the login response carries no role, a background task fetches the
//! full profile and merges the role in later. Login and logout bump a
//! generation counter; the task only applies its result if the generation it
//! captured is still current, so a slow profile fetch can never resurrect a
//! session that was logged out or replaced in the meantime.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::{PersistedSnapshot, Session, SessionPatch};
use super::storage::{KeyValueStore, StorageError, save_json};
use crate::net::api::{ApiError, AuthApi};
use crate::net::types::{Credentials, Role};

/// Storage key holding the raw token string.
pub const TOKEN_KEY: &str = "token";
/// Storage key holding the JSON [`PersistedSnapshot`].
pub const SNAPSHOT_KEY: &str = "usuario";

/// Underlying cause of a failed login. Kept as the error source so logs can
/// show it while users only see the generic message.
#[derive(Debug, thiserror::Error)]
pub enum LoginFailure {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("server returned an empty token")]
    EmptyToken,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("inconsistent user data")]
    InconsistentUserData(#[source] LoginFailure),
    #[error("failed to persist session: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// The login failure behind the generic message, if any.
    #[must_use]
    pub fn login_failure(&self) -> Option<&LoginFailure> {
        match self {
            Self::InconsistentUserData(failure) => Some(failure),
            Self::Storage(_) => None,
        }
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Write the snapshot and token of `session` to `storage`.
///
/// The snapshot goes first so a failure there leaves the stored token alone.
///
/// # Errors
///
/// Returns a [`StorageError`] if either write fails.
pub fn persist(storage: &dyn KeyValueStore, session: &Session) -> Result<(), StorageError> {
    save_json(storage, SNAPSHOT_KEY, &session.snapshot())?;
    if session.is_authenticated() {
        storage.set(TOKEN_KEY, session.token())
    } else {
        storage.remove(TOKEN_KEY)
    }
}

/// Remove both persisted keys.
///
/// # Errors
///
/// Returns the first [`StorageError`]; the second key is still attempted.
pub fn clear_persisted(storage: &dyn KeyValueStore) -> Result<(), StorageError> {
    let token = storage.remove(TOKEN_KEY);
    let snapshot = storage.remove(SNAPSHOT_KEY);
    token.and(snapshot)
}

fn read_non_empty(storage: &dyn KeyValueStore, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(value) => value.filter(|v| !v.trim().is_empty()),
        Err(e) => {
            warn!(error = %e, key, "session storage read failed");
            None
        }
    }
}

/// Rebuild the persisted session, clearing storage if the snapshot is corrupt.
fn restore(storage: &dyn KeyValueStore) -> Option<Session> {
    let token = read_non_empty(storage, TOKEN_KEY)?;
    let raw = read_non_empty(storage, SNAPSHOT_KEY)?;
    match serde_json::from_str::<PersistedSnapshot>(&raw) {
        Ok(snapshot) => Some(Session::from_snapshot(snapshot, token)),
        Err(e) => {
            debug!(error = %e, "persisted session snapshot is corrupt; clearing");
            if let Err(e) = clear_persisted(storage) {
                warn!(error = %e, "failed to clear corrupt session");
            }
            None
        }
    }
}

/// Raw values of both session keys as they were before a write.
struct StoredKeys {
    token: Option<String>,
    snapshot: Option<String>,
}

impl StoredKeys {
    fn read(storage: &dyn KeyValueStore) -> Result<Self, StorageError> {
        Ok(Self { token: storage.get(TOKEN_KEY)?, snapshot: storage.get(SNAPSHOT_KEY)? })
    }

    /// Best-effort return of both keys to the captured values after a partial write.
    fn restore(&self, storage: &dyn KeyValueStore) {
        for (key, value) in [(TOKEN_KEY, &self.token), (SNAPSHOT_KEY, &self.snapshot)] {
            let result = match value {
                Some(value) => storage.set(key, value),
                None => storage.remove(key),
            };
            if let Err(e) = result {
                warn!(error = %e, key, "failed to roll back session storage");
            }
        }
    }
}

/// Counts one login as in flight until dropped, so a cancelled login
/// future still releases it.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// =============================================================================
// STORE
// =============================================================================

struct Shared {
    api: Arc<dyn AuthApi>,
    storage: Arc<dyn KeyValueStore>,
    session: RwLock<Session>,
    generation: AtomicU64,
    logins_in_flight: AtomicUsize,
    backfill: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the session store. Cloning is cheap and every clone sees the
/// same session.
#[derive(Clone)]
pub struct AuthStore {
    shared: Arc<Shared>,
}

impl AuthStore {
    /// Create a store holding the empty session. Call [`initialize`](Self::initialize)
    /// to pick up a persisted one.
    #[must_use]
    pub fn new(api: Arc<dyn AuthApi>, storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            shared: Arc::new(Shared {
                api,
                storage,
                session: RwLock::new(Session::empty()),
                generation: AtomicU64::new(0),
                logins_in_flight: AtomicUsize::new(0),
                backfill: Mutex::new(None),
            }),
        }
    }

    /// Rehydrate from storage. Returns whether a session was restored.
    ///
    /// Only restores when both the token and the snapshot are present; a
    /// snapshot that fails to parse clears both keys. No network traffic.
    pub async fn initialize(&self) -> bool {
        let Some(session) = restore(self.shared.storage.as_ref()) else {
            return false;
        };
        debug!(user_id = session.id(), "restored persisted session");
        *self.shared.session.write().await = session;
        true
    }

    /// Log in with `credentials`.
    ///
    /// On success the session is persisted and committed. If the server did
    /// not say which role the user has, a background profile fetch fills it
    /// in later; this call does not wait for it (see [`settle`](Self::settle)).
    ///
    /// # Errors
    ///
    /// Any failure (transport, HTTP status, empty token, storage) yields
    /// [`AuthError::InconsistentUserData`] and leaves the session unchanged.
    pub async fn login(&self, credentials: &Credentials) -> Result<Session, AuthError> {
        let result = {
            let _in_flight = InFlight::enter(&self.shared.logins_in_flight);
            self.shared.api.login(credentials).await
        };

        let response = result.map_err(|e| login_failed(e.into()))?;
        if response.token.trim().is_empty() {
            return Err(login_failed(LoginFailure::EmptyToken));
        }

        let role_missing = response.role.is_unset();
        let session = Session::from_login(response, credentials.role);
        let generation = {
            let mut current = self.shared.session.write().await;
            let storage = self.shared.storage.as_ref();
            let prior = StoredKeys::read(storage).map_err(|e| login_failed(e.into()))?;
            if let Err(e) = persist(storage, &session) {
                prior.restore(storage);
                return Err(login_failed(e.into()));
            }
            *current = session.clone();
            self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1
        };
        info!(user_id = session.id(), role = %session.role(), "logged in");

        if role_missing {
            let task = backfill_role(
                Arc::clone(&self.shared),
                generation,
                session.id(),
                session.token().to_owned(),
                credentials.role,
            );
            let handle = tokio::spawn(task);
            *self.shared.backfill.lock().await = Some(handle);
        }

        Ok(session)
    }

    /// Forget the session and its persisted copy. Safe to call repeatedly.
    pub async fn logout(&self) {
        let mut current = self.shared.session.write().await;
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        let was_authenticated = current.is_authenticated();
        *current = Session::empty();
        if let Err(e) = clear_persisted(self.shared.storage.as_ref()) {
            warn!(error = %e, "failed to clear persisted session");
        }
        if was_authenticated {
            info!("logged out");
        }
    }

    /// Merge `patch` into the session and persist it. Local only; syncing
    /// the profile with the server is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Storage`] if persisting fails; the in-memory
    /// session is then unchanged.
    pub async fn update_profile(&self, patch: &SessionPatch) -> Result<Session, AuthError> {
        let mut current = self.shared.session.write().await;
        let next = current.merged(patch);
        let storage = self.shared.storage.as_ref();
        let prior = StoredKeys::read(storage)?;
        if let Err(e) = persist(storage, &next) {
            prior.restore(storage);
            return Err(e.into());
        }
        *current = next.clone();
        Ok(next)
    }

    /// Wait for the pending role backfill, if one was started.
    pub async fn settle(&self) {
        let handle = self.shared.backfill.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                warn!(error = %e, "role backfill task failed");
            }
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Copy of the current session.
    pub async fn session(&self) -> Session {
        self.shared.session.read().await.clone()
    }

    pub async fn token(&self) -> String {
        self.shared.session.read().await.token().to_owned()
    }

    pub async fn role(&self) -> Role {
        self.shared.session.read().await.role()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.shared.session.read().await.is_authenticated()
    }

    pub async fn is_driver(&self) -> bool {
        self.shared.session.read().await.is_driver()
    }

    pub async fn is_passenger(&self) -> bool {
        self.shared.session.read().await.is_passenger()
    }

    /// True while at least one login request is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.shared.logins_in_flight.load(Ordering::SeqCst) > 0
    }

    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn storage(&self) -> Arc<dyn KeyValueStore> {
        Arc::clone(&self.shared.storage)
    }
}

fn login_failed(failure: LoginFailure) -> AuthError {
    warn!(error = %failure, "login failed");
    AuthError::InconsistentUserData(failure)
}

async fn backfill_role(shared: Arc<Shared>, generation: u64, user_id: i64, token: String, fallback: Role) {
    let role = match shared.api.fetch_user(user_id, &token).await {
        Ok(profile) => profile.role.or(fallback),
        Err(e) => {
            warn!(error = %e, user_id, "profile fetch after login failed");
            return;
        }
    };

    let mut current = shared.session.write().await;
    if shared.generation.load(Ordering::SeqCst) != generation {
        debug!(user_id, "session changed during profile fetch; dropping role");
        return;
    }
    if current.role() == role {
        return;
    }

    let next = current.with_role(role);
    match persist(shared.storage.as_ref(), &next) {
        Ok(()) => {
            *current = next;
            info!(user_id, %role, "role resolved from profile");
        }
        Err(e) => warn!(error = %e, user_id, "failed to persist resolved role"),
    }
}
