//! The connected account, shared between the orchestrator, the synchronizer and the surface.

use crate::domain::Address;
use crate::orchestration::StakingError;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    account: Option<Address>,
}

impl Session {
    pub fn connected(account: Address) -> Self {
        Self {
            account: Some(account),
        }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn account(&self) -> Option<&Address> {
        self.account.as_ref()
    }

    pub fn require_account(&self) -> Result<Address, StakingError> {
        self.account.clone().ok_or(StakingError::NotConnected)
    }
}

/// Cloneable handle over the current [`Session`]; connecting replaces it as a whole.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<Session>>,
}

impl SessionHandle {
    pub fn new(initial: Session) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub fn connect(&self, account: Address) {
        tracing::info!("Session connected: {}", account);
        self.tx.send_replace(Session::connected(account));
    }

    pub fn disconnect(&self) {
        tracing::info!("Session disconnected");
        self.tx.send_replace(Session::disconnected());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_require_account() {
        assert!(matches!(
            Session::disconnected().require_account(),
            Err(StakingError::NotConnected)
        ));

        let account = Address::from_str("0x00000000000000000000000000000000000000aa").unwrap();
        assert_eq!(
            Session::connected(account.clone()).require_account().unwrap(),
            account
        );
    }

    #[test]
    fn test_handle_swaps_session() {
        let handle = SessionHandle::new(Session::disconnected());
        let other = handle.clone();
        let account = Address::from_str("0x00000000000000000000000000000000000000bb").unwrap();

        other.connect(account.clone());
        assert_eq!(handle.current().account(), Some(&account));

        handle.disconnect();
        assert_eq!(other.current().account(), None);
    }
}
