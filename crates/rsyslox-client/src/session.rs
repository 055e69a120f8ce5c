use std::sync::Arc;

use parking_lot::RwLock;

/// Credential attached to API requests
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credential {
    /// Admin session token from a login
    SessionToken(String),
    /// Read-only API key
    ApiKey(String),
}

impl Credential {
    /// Header carrying this credential
    pub fn header_name(&self) -> &'static str {
        match self {
            Self::SessionToken(_) => "X-Session-Token",
            Self::ApiKey(_) => "X-API-Key",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::SessionToken(v) | Self::ApiKey(v) => v,
        }
    }
}

/// Source of credentials for API requests.
///
/// Implementations must be cheap; the client consults them on every request.
pub trait SessionProvider: Send + Sync {
    fn credential(&self) -> Option<Credential>;

    /// Whether the session has been rejected by the server
    fn is_expired(&self) -> bool;

    /// Drop the credential and mark the session expired
    fn expire(&self);
}

#[derive(Debug, Default)]
struct SessionInner {
    credential: Option<Credential>,
    expired: bool,
}

/// In-memory session shared between the client and its owner
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionInner>>,
}

impl SessionStore {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SessionInner {
                credential,
                expired: false,
            })),
        }
    }

    /// Install a fresh credential, clearing any previous expiry
    pub fn set_session(&self, credential: Credential) {
        let mut inner = self.inner.write();
        inner.credential = Some(credential);
        inner.expired = false;
    }

    /// Forget the credential without marking the session expired
    pub fn clear_session(&self) {
        self.inner.write().credential = None;
    }
}

impl SessionProvider for SessionStore {
    fn credential(&self) -> Option<Credential> {
        self.inner.read().credential.clone()
    }

    fn is_expired(&self) -> bool {
        self.inner.read().expired
    }

    fn expire(&self) {
        let mut inner = self.inner.write();
        inner.credential = None;
        inner.expired = true;
    }
}
