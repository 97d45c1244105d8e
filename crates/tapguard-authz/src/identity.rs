//! Identity server boundary

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use tapguard_core::{RemoteError, TargetAction, VerifyToken};

/// How the signed-in user proves who they are
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMode {
    /// Re-enter the account password
    Password,
    /// Confirm a code sent by the federated identity provider
    Federated,
}

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    pub auth_mode: AuthMode,
}

impl Account {
    pub fn new(email: impl Into<String>, auth_mode: AuthMode) -> Self {
        Self {
            email: email.into(),
            auth_mode,
        }
    }
}

/// Server issuing step-up verification tokens
#[async_trait]
pub trait IdentityServer: Send + Sync {
    /// Ask the provider to send a confirmation code for `target`
    async fn request_federated_challenge(&self, target: TargetAction) -> Result<(), RemoteError>;

    /// Exchange a confirmation code for a verify token
    async fn verify_federated_code(
        &self,
        target: TargetAction,
        code: &str,
    ) -> Result<VerifyToken, RemoteError>;

    /// Exchange the account password for a verify token
    async fn verify_password(
        &self,
        target: TargetAction,
        password: &str,
    ) -> Result<VerifyToken, RemoteError>;
}

#[async_trait]
impl<S: IdentityServer + ?Sized> IdentityServer for Arc<S> {
    async fn request_federated_challenge(&self, target: TargetAction) -> Result<(), RemoteError> {
        (**self).request_federated_challenge(target).await
    }

    async fn verify_federated_code(
        &self,
        target: TargetAction,
        code: &str,
    ) -> Result<VerifyToken, RemoteError> {
        (**self).verify_federated_code(target, code).await
    }

    async fn verify_password(
        &self,
        target: TargetAction,
        password: &str,
    ) -> Result<VerifyToken, RemoteError> {
        (**self).verify_password(target, password).await
    }
}
