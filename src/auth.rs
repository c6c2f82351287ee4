use std::sync::Arc;

use async_trait::async_trait;

use crate::gateway::{GatewayError, PlatformClient};
use crate::model::{Identity, IdentityError};

/// Token and user id handed out by a successful login.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProfileError {
    #[error("identity not established: {0}")]
    NotEstablished(#[from] IdentityError),
    #[error("profile lookup failed: {0}")]
    Gateway(#[from] GatewayError),
}

/// Supplies the identity claims are made under.
#[async_trait]
pub trait ProfileProvider: Send + Sync {
    async fn identity(&self) -> Result<Identity, ProfileError>;
}

/// An identity known up front (e.g. from configuration).
#[derive(Debug, Clone)]
pub struct StaticProfile {
    identity: Result<Identity, IdentityError>,
}

impl StaticProfile {
    pub fn new(identity: Identity) -> Self {
        Self { identity: Ok(identity) }
    }

    /// Validate the parts now; a missing one surfaces when the identity is asked for.
    pub fn from_parts(token: &str, user_id: &str, phone: &str) -> Self {
        Self {
            identity: Identity::new(token, user_id, phone),
        }
    }
}

#[async_trait]
impl ProfileProvider for StaticProfile {
    async fn identity(&self) -> Result<Identity, ProfileError> {
        self.identity.clone().map_err(ProfileError::from)
    }
}

/// A logged-in session; the verified phone is looked up on the platform.
#[derive(Debug, Clone)]
pub struct SessionProfile {
    client: Arc<PlatformClient>,
    session: Session,
}

impl SessionProfile {
    pub fn new(client: Arc<PlatformClient>, session: Session) -> Self {
        Self { client, session }
    }

    /// Full SMS login: code must already have been requested with
    /// [`PlatformClient::send_sms_code`].
    pub async fn login(
        client: Arc<PlatformClient>,
        phone: &str,
        sms_code: &str,
        open_id: &str,
    ) -> Result<Self, GatewayError> {
        let session = client.login_with_sms(phone, sms_code, open_id).await?;
        Ok(Self::new(client, session))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

#[async_trait]
impl ProfileProvider for SessionProfile {
    async fn identity(&self) -> Result<Identity, ProfileError> {
        let phone = self.client.verified_phone(&self.session.token).await?;
        Ok(Identity::new(
            self.session.token.as_str(),
            self.session.user_id.as_str(),
            phone,
        )?)
    }
}
