use std::sync::atomic::{AtomicU32, Ordering};
use tokio::sync::RwLock;

/// The bearer token for one run against the provider.
///
/// A `Session` is created by the caller and handed to the client, so its
/// lifetime is the lifetime of a sync run rather than of the process. The
/// client logs in lazily on first use, reuses the token for every request and
/// drops it when the provider rejects it.
#[derive(Debug, Default)]
pub struct Session {
    token: RwLock<Option<String>>,
    logins: AtomicU32,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that starts with an already issued token.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(Some(token.into())),
            logins: AtomicU32::new(0),
        }
    }

    pub async fn current(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub(crate) async fn store(&self, token: String) {
        *self.token.write().await = Some(token);
        self.logins.fetch_add(1, Ordering::Relaxed);
    }

    /// Forgets `rejected` if it is still the cached token. A token that was
    /// already replaced by a fresh login is left alone.
    pub async fn invalidate(&self, rejected: &str) {
        let mut guard = self.token.write().await;
        if guard.as_deref() == Some(rejected) {
            *guard = None;
        }
    }

    /// Number of successful logins performed through this session.
    pub fn login_count(&self) -> u32 {
        self.logins.load(Ordering::Relaxed)
    }
}
