use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::Result;
use crate::paths;
use crate::user::User;

// ─── TokenStore ───────────────────────────────────────────────────────────

/// Persistence for the single bearer-token value.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Stores the token in `<state_dir>/auth_token`.
///
/// The directory is created lazily on the first `save`.
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(state_dir: &Path) -> Self {
        FileTokenStore {
            path: paths::token_path(state_dir),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty())
    }

    fn save(&self, token: &str) -> Result<()> {
        crate::io::atomic_write(&self.path, token.as_bytes())
    }

    fn clear(&self) -> Result<()> {
        crate::io::remove_if_exists(&self.path).map(|_| ())
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        lock(&self.token).clone()
    }

    fn save(&self, token: &str) -> Result<()> {
        *lock(&self.token) = Some(token.to_owned());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *lock(&self.token) = None;
        Ok(())
    }
}

// ─── Navigator ────────────────────────────────────────────────────────────

/// Login route the client forces on an authentication rejection.
pub const LOGIN_ROUTE: &str = "/login";
pub const ONBOARDING_ROUTE: &str = "/onboarding";
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Client-side navigation hook, invoked for process-wide redirects such as
/// the forced return to the login view after a 401.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, route: &str) {
        tracing::debug!(route, "navigation requested");
    }
}

/// Remembers every route it was asked to visit.
#[derive(Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<String> {
        lock(&self.routes).clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: &str) {
        lock(&self.routes).push(route.to_owned());
    }
}

// ─── Session ──────────────────────────────────────────────────────────────

#[derive(Default)]
struct SessionState {
    token: Option<String>,
    identity: Option<User>,
}

struct SessionInner {
    state: Mutex<SessionState>,
    store: Box<dyn TokenStore>,
}

/// Holder of the current bearer token and fetched identity.
///
/// Cheap to clone; every clone shares the same state. Handed to the HTTP
/// client and query layer at construction time instead of being looked up
/// from ambient storage. Token writes go through to the [`TokenStore`].
///
/// ```rust,ignore
/// let session = Session::load(FileTokenStore::new(&state_dir));
/// if session.token().is_some() {
///     // identity-gated reads are enabled
/// }
/// session.set_token("abc123")?;
/// session.clear()?; // sign-out or 401
/// ```
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    /// Build a session restoring any token already persisted in `store`.
    pub fn load(store: impl TokenStore + 'static) -> Self {
        let token = store.load();
        Session {
            inner: Arc::new(SessionInner {
                state: Mutex::new(SessionState {
                    token,
                    identity: None,
                }),
                store: Box::new(store),
            }),
        }
    }

    /// A session backed by [`MemoryTokenStore`], starting signed out.
    pub fn in_memory() -> Self {
        Self::load(MemoryTokenStore::default())
    }

    pub fn token(&self) -> Option<String> {
        self.state().token.clone()
    }

    pub fn has_token(&self) -> bool {
        self.state().token.is_some()
    }

    /// Store a new token. A changed token invalidates the fetched identity.
    pub fn set_token(&self, token: &str) -> Result<()> {
        {
            let mut state = self.state();
            if state.token.as_deref() != Some(token) {
                state.identity = None;
            }
            state.token = Some(token.to_owned());
        }
        self.inner.store.save(token)
    }

    /// Drop token and identity, in memory and in the store.
    pub fn clear(&self) -> Result<()> {
        {
            let mut state = self.state();
            state.token = None;
            state.identity = None;
        }
        self.inner.store.clear()
    }

    pub fn identity(&self) -> Option<User> {
        self.state().identity.clone()
    }

    /// Record the identity fetched for the current token. Ignored when no
    /// token is held, so a late response cannot resurrect a cleared session.
    pub fn set_identity(&self, user: User) {
        let mut state = self.state();
        if state.token.is_some() {
            state.identity = Some(user);
        }
    }

    /// True only when a token is held *and* its identity has been fetched.
    pub fn is_authenticated(&self) -> bool {
        let state = self.state();
        state.token.is_some() && state.identity.is_some()
    }

    pub fn requires_onboarding(&self) -> bool {
        self.state()
            .identity
            .as_ref()
            .is_some_and(|u| !u.onboarding_completed)
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        lock(&self.inner.state)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn user(onboarded: bool) -> User {
        serde_json::from_value(serde_json::json!({
            "id": "u1",
            "email": "a@b.co",
            "onboardingCompleted": onboarded
        }))
        .unwrap()
    }

    #[test]
    fn file_store_load_returns_none_when_no_file() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path());
        assert_eq!(store.load(), None);
    }

    #[test]
    fn file_store_save_and_load_trims() {
        let dir = TempDir::new().unwrap();
        let store = FileTokenStore::new(dir.path());
        store.save("abc123\n").unwrap();
        assert_eq!(store.load(), Some("abc123".into()));
    }

    #[test]
    fn file_store_clear_is_noop_when_missing() {
        let dir = TempDir::new().unwrap();
        FileTokenStore::new(dir.path()).clear().unwrap();
    }

    #[test]
    fn session_restores_persisted_token() {
        let dir = TempDir::new().unwrap();
        FileTokenStore::new(dir.path()).save("persisted").unwrap();
        let session = Session::load(FileTokenStore::new(dir.path()));
        assert_eq!(session.token().as_deref(), Some("persisted"));
    }

    #[test]
    fn set_token_writes_through() {
        let dir = TempDir::new().unwrap();
        let session = Session::load(FileTokenStore::new(dir.path()));
        session.set_token("abc123").unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("auth_token")).unwrap(),
            "abc123"
        );
    }

    #[test]
    fn clear_removes_token_and_identity() {
        let dir = TempDir::new().unwrap();
        let session = Session::load(FileTokenStore::new(dir.path()));
        session.set_token("abc").unwrap();
        session.set_identity(user(true));
        assert!(session.is_authenticated());

        session.clear().unwrap();
        assert!(!session.has_token());
        assert!(session.identity().is_none());
        assert!(!dir.path().join("auth_token").exists());
    }

    #[test]
    fn authenticated_requires_token_and_identity() {
        let session = Session::in_memory();
        assert!(!session.is_authenticated());
        session.set_token("t").unwrap();
        assert!(!session.is_authenticated());
        session.set_identity(user(true));
        assert!(session.is_authenticated());
    }

    #[test]
    fn identity_ignored_without_token() {
        let session = Session::in_memory();
        session.set_identity(user(true));
        assert!(session.identity().is_none());
    }

    #[test]
    fn new_token_drops_stale_identity() {
        let session = Session::in_memory();
        session.set_token("first").unwrap();
        session.set_identity(user(true));
        session.set_token("second").unwrap();
        assert!(session.identity().is_none());
    }

    #[test]
    fn clones_share_state() {
        let a = Session::in_memory();
        let b = a.clone();
        a.set_token("shared").unwrap();
        assert_eq!(b.token().as_deref(), Some("shared"));
    }

    #[test]
    fn requires_onboarding_follows_identity() {
        let session = Session::in_memory();
        session.set_token("t").unwrap();
        assert!(!session.requires_onboarding());
        session.set_identity(user(false));
        assert!(session.requires_onboarding());
    }

    #[test]
    fn recording_navigator_keeps_order() {
        let nav = RecordingNavigator::default();
        nav.navigate("/login");
        nav.navigate("/dashboard");
        assert_eq!(nav.routes(), vec!["/login", "/dashboard"]);
    }
}
