use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use hk_core::ports::{RemoteSessionError, RemoteSessionPort, SessionPresence};
use hk_core::{AccountId, ApiKey};

#[derive(Default)]
struct ServiceState {
    /// account id -> accepted api key
    accounts: HashMap<AccountId, String>,
    sessions: HashSet<AccountId>,
    fail_next_query: Option<RemoteSessionError>,
    fail_next_sync: Option<RemoteSessionError>,
    fail_next_close: Option<RemoteSessionError>,
}

/// In-process stand-in for the remote health-data service.
///
/// Sessions are shared by every controller using the same instance, which
/// mirrors a real backend keyed by account. Failures can be injected one call
/// at a time.
#[derive(Default)]
pub struct InMemoryRemoteSessionService {
    state: Mutex<ServiceState>,
    sync_delay: Duration,
    query_calls: AtomicUsize,
    sync_calls: AtomicUsize,
    close_calls: AtomicUsize,
}

impl InMemoryRemoteSessionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulated transfer time for `open_sync_session`.
    pub fn with_sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    fn state(&self) -> MutexGuard<'_, ServiceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn register_account(&self, account_id: impl Into<AccountId>, api_key: impl Into<String>) {
        self.state()
            .accounts
            .insert(account_id.into(), api_key.into());
    }

    pub fn has_session(&self, account_id: &AccountId) -> bool {
        self.state().sessions.contains(account_id)
    }

    /// Pretend a session was opened elsewhere (another device).
    pub fn insert_session(&self, account_id: impl Into<AccountId>) {
        self.state().sessions.insert(account_id.into());
    }

    pub fn fail_next_query(&self, error: RemoteSessionError) {
        self.state().fail_next_query = Some(error);
    }

    pub fn fail_next_sync(&self, error: RemoteSessionError) {
        self.state().fail_next_sync = Some(error);
    }

    pub fn fail_next_close(&self, error: RemoteSessionError) {
        self.state().fail_next_close = Some(error);
    }

    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteSessionPort for InMemoryRemoteSessionService {
    async fn query_existing_session(
        &self,
        account_id: &AccountId,
    ) -> Result<SessionPresence, RemoteSessionError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(error) = state.fail_next_query.take() {
            return Err(error);
        }
        Ok(if state.sessions.contains(account_id) {
            SessionPresence::Present
        } else {
            SessionPresence::Absent
        })
    }

    async fn open_sync_session(
        &self,
        account_id: &AccountId,
        api_key: &ApiKey,
    ) -> Result<(), RemoteSessionError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = self.state();
            if let Some(error) = state.fail_next_sync.take() {
                return Err(error);
            }
            match state.accounts.get(account_id) {
                Some(expected) if expected == api_key.expose() => {}
                _ => return Err(RemoteSessionError::Unauthorized),
            }
        }

        if !self.sync_delay.is_zero() {
            tokio::time::sleep(self.sync_delay).await;
        }

        self.state().sessions.insert(account_id.clone());
        tracing::debug!(account_id = %account_id, "sync session established");
        Ok(())
    }

    async fn close_session(&self, account_id: &AccountId) -> Result<(), RemoteSessionError> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();
        if let Some(error) = state.fail_next_close.take() {
            return Err(error);
        }
        state.sessions.remove(account_id);
        Ok(())
    }
}
