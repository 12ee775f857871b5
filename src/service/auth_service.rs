//! Registration, login and refresh-token rotation.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::password::{MIN_PASSWORD_LEN, hash_password, verify_password};
use crate::auth::{TokenKind, TokenService};
use crate::domain::{NewUser, RefreshCredential, UserId, UserRecord};
use crate::error::ServerError;
use crate::persistence::UserStore;

/// Tokens handed to a client after register or login.
#[derive(Debug, Clone)]
pub struct AuthSession {
    /// Short-lived bearer token.
    pub access_token: String,
    /// Long-lived refresh token; its digest is stored.
    pub refresh_token: String,
    /// The authenticated user.
    pub user: UserRecord,
}

/// Account and credential operations.
#[derive(Debug, Clone)]
pub struct AuthService {
    users: Arc<dyn UserStore>,
    tokens: TokenService,
}

impl AuthService {
    /// Creates a new `AuthService`.
    #[must_use]
    pub fn new(users: Arc<dyn UserStore>, tokens: TokenService) -> Self {
        Self { users, tokens }
    }

    /// Registers a user and signs them in.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequest`] for missing fields or a short
    /// password and [`ServerError::Conflict`] for a taken username or email.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, ServerError> {
        let username = username.trim();
        let email = email.trim().to_lowercase();
        let password = password.trim();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ServerError::InvalidRequest(
                "username, email, and password are required".into(),
            ));
        }
        if !email.contains('@') {
            return Err(ServerError::InvalidRequest("email is not valid".into()));
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServerError::InvalidRequest(format!(
                "password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let user = self
            .users
            .insert_user(NewUser {
                username: username.to_string(),
                email,
                password_hash: hash_password(password)?,
            })
            .await?;

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        self.start_session(user).await
    }

    /// Verifies credentials and signs the user in.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidCredentials`] for an unknown email or a
    /// wrong password.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ServerError> {
        let email = email.trim().to_lowercase();
        let user = self
            .users
            .find_user_by_email(&email)
            .await?
            .ok_or(ServerError::InvalidCredentials)?;
        if !verify_password(password, &user.password_hash) {
            return Err(ServerError::InvalidCredentials);
        }
        tracing::info!(user_id = %user.id, "user logged in");
        self.start_session(user).await
    }

    /// Exchanges a stored, unexpired refresh token for a new access token.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Unauthorized`] if the token is invalid,
    /// revoked or expired.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String, ServerError> {
        let claims = self.tokens.validate_refresh(refresh_token)?;
        let digest = TokenService::hash_token(refresh_token);
        let stored = self
            .users
            .find_refresh_token(&digest)
            .await?
            .filter(|c| c.user_id == claims.user_id && c.expires_at > Utc::now())
            .ok_or_else(|| ServerError::Unauthorized("refresh token revoked or expired".into()))?;

        let access = self
            .tokens
            .issue(TokenKind::Access, stored.user_id, &claims.username)?;
        Ok(access.token)
    }

    /// Revokes a refresh token. Unknown tokens are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Storage`] on database failure.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), ServerError> {
        self.users
            .delete_refresh_token(&TokenService::hash_token(refresh_token))
            .await
    }

    /// Loads a user profile.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::UserNotFound`] for unknown ids.
    pub async fn profile(&self, user: UserId) -> Result<UserRecord, ServerError> {
        self.users
            .find_user(user)
            .await?
            .ok_or(ServerError::UserNotFound(user))
    }

    /// Replaces the user's avatar URL.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::InvalidRequest`] for an empty URL and
    /// [`ServerError::UserNotFound`] for unknown ids.
    pub async fn update_avatar(
        &self,
        user: UserId,
        avatar_url: &str,
    ) -> Result<UserRecord, ServerError> {
        let avatar_url = avatar_url.trim();
        if avatar_url.is_empty() {
            return Err(ServerError::InvalidRequest("avatarUrl is required".into()));
        }
        self.users
            .update_avatar(user, avatar_url)
            .await?
            .ok_or(ServerError::UserNotFound(user))
    }

    async fn start_session(&self, user: UserRecord) -> Result<AuthSession, ServerError> {
        let access = self
            .tokens
            .issue(TokenKind::Access, user.id, &user.username)?;
        let refresh = self
            .tokens
            .issue(TokenKind::Refresh, user.id, &user.username)?;
        self.users
            .save_refresh_token(RefreshCredential {
                user_id: user.id,
                token_hash: TokenService::hash_token(&refresh.token),
                expires_at: refresh.expires_at,
            })
            .await?;
        Ok(AuthSession {
            access_token: access.token,
            refresh_token: refresh.token,
            user,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::persistence::MemoryStore;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(MemoryStore::new()),
            TokenService::new(b"test-secret"),
        )
    }

    #[tokio::test]
    async fn register_normalizes_and_signs_in() {
        let auth = service();
        let Ok(session) = auth
            .register("  alice ", " Alice@Example.COM ", "secret1")
            .await
        else {
            panic!("registration failed");
        };
        assert_eq!(session.user.username, "alice");
        assert_eq!(session.user.email, "alice@example.com");
        assert_eq!(session.user.rating, 1200);
        assert!(!session.access_token.is_empty());
    }

    #[tokio::test]
    async fn register_rejects_bad_input_and_duplicates() {
        let auth = service();
        assert!(matches!(
            auth.register("bob", "bob@example.com", "12345").await,
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(matches!(
            auth.register("", "bob@example.com", "123456").await,
            Err(ServerError::InvalidRequest(_))
        ));
        assert!(auth.register("bob", "bob@example.com", "123456").await.is_ok());
        assert!(matches!(
            auth.register("bob", "other@example.com", "123456").await,
            Err(ServerError::Conflict(_))
        ));
        assert!(matches!(
            auth.register("bobby", "BOB@example.com", "123456").await,
            Err(ServerError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn login_checks_password() {
        let auth = service();
        assert_ok!(auth.register("carol", "carol@example.com", "pa55word").await);
        assert_ok!(auth.login("CAROL@example.com", "pa55word").await);
        assert!(matches!(
            auth.login("carol@example.com", "wrong!").await,
            Err(ServerError::InvalidCredentials)
        ));
        assert!(matches!(
            auth.login("nobody@example.com", "pa55word").await,
            Err(ServerError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn refresh_requires_stored_token() {
        let auth = service();
        let Ok(session) = auth.register("dave", "dave@example.com", "123456").await else {
            panic!("registration failed");
        };
        assert_ok!(auth.refresh(&session.refresh_token).await);
        assert_err!(auth.refresh(&session.access_token).await);

        assert_ok!(auth.logout(&session.refresh_token).await);
        assert!(matches!(
            auth.refresh(&session.refresh_token).await,
            Err(ServerError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn avatar_update() {
        let auth = service();
        let Ok(session) = auth.register("erin", "erin@example.com", "123456").await else {
            panic!("registration failed");
        };
        let Ok(user) = auth
            .update_avatar(session.user.id, "https://img.example/erin.png")
            .await
        else {
            panic!("avatar update failed");
        };
        assert_eq!(user.avatar_url.as_deref(), Some("https://img.example/erin.png"));
        assert_err!(auth.update_avatar(session.user.id, " ").await);
    }
}
