//! Connection session: the immutable link between this device and a remote account.

use thiserror::Error;

use crate::ids::AccountId;
use crate::security::ApiKey;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("account id is required")]
    MissingAccountId,

    #[error("api key is required")]
    MissingApiKey,
}

/// Identifies the logical link between the local device and a remote account.
///
/// Created once per controller and never mutated. Only presence of both values
/// is checked here; format validation is the remote service's concern.
#[derive(Debug)]
pub struct ConnectionSession {
    account_id: AccountId,
    api_key: ApiKey,
}

impl ConnectionSession {
    pub fn new(
        account_id: impl Into<AccountId>,
        api_key: impl Into<ApiKey>,
    ) -> Result<Self, SessionError> {
        let account_id = account_id.into();
        let api_key = api_key.into();
        if account_id.is_blank() {
            return Err(SessionError::MissingAccountId);
        }
        if api_key.is_blank() {
            return Err(SessionError::MissingApiKey);
        }
        Ok(Self {
            account_id,
            api_key,
        })
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }
}
