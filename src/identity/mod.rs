//! Identity provider port.
//!
//! The provider owns sign-in, sessions and account lifecycle. This service
//! only probes the current user and asks for data-store credentials.

pub mod clerk;

use async_trait::async_trait;
use serde::Serialize;

use crate::{
    error::AppError,
    models::learner::{Framework, Theme},
    store::StoreCredential,
};

pub use clerk::ClerkBridge;

/// The signed-in user as the identity provider sees them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    pub id: String,
    pub age: Option<i32>,
    pub grade: Option<i32>,
    pub framework: Option<Framework>,
    pub theme: Option<Theme>,
}

impl Identity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            age: None,
            grade: None,
            framework: None,
            theme: None,
        }
    }
}

/// Result of probing a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentityProbe {
    /// False while the provider is still resolving the session.
    pub is_loaded: bool,
    pub is_signed_in: bool,
    pub identity: Option<Identity>,
}

impl IdentityProbe {
    pub fn loading() -> Self {
        Self {
            is_loaded: false,
            is_signed_in: false,
            identity: None,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            is_loaded: true,
            is_signed_in: false,
            identity: None,
        }
    }

    pub fn signed_in(identity: Identity) -> Self {
        Self {
            is_loaded: true,
            is_signed_in: true,
            identity: Some(identity),
        }
    }

    /// Collapses the probe into the signed-in identity, or the error the
    /// caller should surface.
    pub fn require_identity(self) -> Result<Identity, AppError> {
        if !self.is_loaded {
            return Err(AppError::IdentityNotReady);
        }
        match (self.is_signed_in, self.identity) {
            (true, Some(identity)) => Ok(identity),
            _ => Err(AppError::AuthError("Please sign in".to_string())),
        }
    }
}

#[async_trait]
pub trait IdentityBridge: Send + Sync {
    /// Resolves a session token into the current user.
    async fn current_user(&self, session_token: &str) -> Result<IdentityProbe, AppError>;

    /// Mints a data-store credential for `identity`.
    /// `Ok(None)` means the provider had no token to give.
    async fn mint_store_credential(
        &self,
        identity: &Identity,
    ) -> Result<Option<StoreCredential>, AppError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_identity() {
        assert!(matches!(
            IdentityProbe::loading().require_identity(),
            Err(AppError::IdentityNotReady)
        ));
        assert!(matches!(
            IdentityProbe::signed_out().require_identity(),
            Err(AppError::AuthError(_))
        ));
        let id = IdentityProbe::signed_in(Identity::new("user_9"))
            .require_identity()
            .unwrap();
        assert_eq!(id.id, "user_9");
    }
}
