use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::{check_status, BackendClient, BackendError, Unconfigured};

/// The signed-in admin as reported by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

/// Session management against the hosted auth service.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError>;

    /// Resolves an access token to its user; `Unauthorized` when the token is invalid or expired.
    async fn current_user(&self, access_token: &str) -> Result<AuthUser, BackendError>;
}

#[async_trait]
impl AuthService for BackendClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, BackendError> {
        let response = self
            .authorize(
                self.http().post(self.auth_url("token")),
                None,
            )
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        // A bad password comes back as 400 with an error body; treat it as unauthorized.
        if response.status().as_u16() == 400 {
            return Err(BackendError::Unauthorized);
        }
        let session: Session = check_status(response).await?.json().await?;
        info!("Admin signed in: {}", session.user.id);
        Ok(session)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), BackendError> {
        let response = self
            .authorize(self.http().post(self.auth_url("logout")), Some(access_token))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }

    async fn current_user(&self, access_token: &str) -> Result<AuthUser, BackendError> {
        let response = self
            .authorize(self.http().get(self.auth_url("user")), Some(access_token))
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }
}

#[async_trait]
impl AuthService for Unconfigured {
    async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, BackendError> {
        Err(self.err())
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), BackendError> {
        Err(self.err())
    }

    async fn current_user(&self, _access_token: &str) -> Result<AuthUser, BackendError> {
        Err(self.err())
    }
}
