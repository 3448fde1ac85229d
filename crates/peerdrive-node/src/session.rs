//! The logged-in user on this node.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use peerdrive_dht::PeerAddress;

use crate::error::{Error, Result};

/// Who is logged in, from where, and where their files live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: String,
    pub own_address: PeerAddress,
    pub root: PathBuf,
}

impl Session {
    pub fn new(user_id: impl Into<String>, own_address: PeerAddress, root: PathBuf) -> Self {
        Self {
            user_id: user_id.into(),
            own_address,
            root,
        }
    }
}

/// Shared handle to the current session. Cloning shares the slot.
#[derive(Debug, Clone, Default)]
pub struct SessionProvider {
    current: Arc<RwLock<Option<Session>>>,
    master: Arc<AtomicBool>,
}

impl SessionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current session, or [`Error::NoSession`].
    pub fn current(&self) -> Result<Session> {
        self.current.read().clone().ok_or(Error::NoSession)
    }

    pub fn is_logged_in(&self) -> bool {
        self.current.read().is_some()
    }

    /// Install a session. Fails if another one is active.
    pub fn begin(&self, session: Session) -> Result<()> {
        let mut slot = self.current.write();
        if let Some(active) = slot.as_ref() {
            return Err(Error::SessionActive(active.user_id.clone()));
        }
        *slot = Some(session);
        Ok(())
    }

    /// Drop the session, returning it.
    pub fn clear(&self) -> Option<Session> {
        let previous = self.current.write().take();
        self.master.store(false, Ordering::SeqCst);
        previous
    }

    /// Whether this node currently coordinates the logged-in user's devices.
    pub fn is_master(&self) -> bool {
        self.master.load(Ordering::SeqCst)
    }

    pub(crate) fn set_master(&self, master: bool) {
        self.master.store(master, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerdrive_dht::PeerId;

    fn session(user: &str) -> Session {
        let addr = PeerAddress::new(PeerId::from_bytes([1; 32]), "127.0.0.1:9400".parse().unwrap());
        Session::new(user, addr, PathBuf::from("/tmp").join(user))
    }

    #[test]
    fn test_no_session_by_default() {
        let sessions = SessionProvider::new();
        assert!(!sessions.is_logged_in());
        assert!(matches!(sessions.current(), Err(Error::NoSession)));
    }

    #[test]
    fn test_begin_and_clear() {
        let sessions = SessionProvider::new();
        sessions.begin(session("alice")).unwrap();
        assert_eq!(sessions.current().unwrap().user_id, "alice");

        let shared = sessions.clone();
        assert!(shared.is_logged_in());

        sessions.set_master(true);
        assert!(shared.is_master());

        assert_eq!(shared.clear().map(|s| s.user_id), Some("alice".to_string()));
        assert!(!sessions.is_logged_in());
        assert!(!sessions.is_master());
    }

    #[test]
    fn test_second_session_rejected() {
        let sessions = SessionProvider::new();
        sessions.begin(session("alice")).unwrap();
        let err = sessions.begin(session("bob")).unwrap_err();
        assert!(matches!(err, Error::SessionActive(user) if user == "alice"));
    }
}
