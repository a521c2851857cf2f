use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::password::{hash_password, verify_password};
use crate::auth::token::TokenCodec;
use crate::db::{BlacklistEntry, BlacklistStore, NewUser, User, UserStore};
use crate::error::{AppError, AuthError};
use crate::Result;

pub struct AuthService {
    users: Arc<dyn UserStore>,
    blacklist: Arc<dyn BlacklistStore>,
    codec: Arc<TokenCodec>,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserStore>,
        blacklist: Arc<dyn BlacklistStore>,
        codec: Arc<TokenCodec>,
    ) -> Self {
        Self {
            users,
            blacklist,
            codec,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Checks the password and issues a fresh token.
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials.into());
        }

        self.codec.issue(&user.username)
    }

    pub async fn sign_up(&self, username: &str, password: &str, email: &str) -> Result<User> {
        if username.trim().is_empty() {
            return Err(AppError::ValidationError("username must not be empty".into()));
        }
        if password.is_empty() {
            return Err(AppError::ValidationError("password must not be empty".into()));
        }

        let user = self
            .users
            .create_user(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: hash_password(password)?,
            })
            .await?;
        info!("Created user {} (id {})", user.username, user.id);
        Ok(user)
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        self.users.list_users().await
    }

    /// Removes the account only. Articles keep pointing at the old id, and
    /// outstanding tokens stay valid until they expire or are revoked.
    pub async fn delete_user(&self, id: i64) -> Result<()> {
        if !self.users.delete_user(id).await? {
            return Err(AppError::NotFound("user".into()));
        }
        info!("Deleted user {}", id);
        Ok(())
    }

    /// Revokes every session of the token's owner.
    ///
    /// The token must carry our signature but may already be expired. The
    /// recorded revocation expiry is the presented token's own expiry.
    pub async fn logout_all(&self, token: &str) -> Result<BlacklistEntry> {
        let claims = self.codec.verify_signature(token).map_err(|e| {
            warn!("Logout-all refused: {}", e);
            AppError::AuthError(AuthError::AuthenticationFailed(
                "logout-all requires a token issued by this server".into(),
            ))
        })?;

        let entry = self
            .blacklist
            .revoke(token, claims.expires_at()?, &claims.sub)
            .await?;
        info!("Revoked all sessions of {} up to {}", entry.username, entry.expiration_time);
        Ok(entry)
    }
}
