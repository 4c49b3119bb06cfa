use std::sync::Arc;

use crate::crypto::password::{hash_password, verify_password};
use crate::crypto::token::{CredentialIssuer, IssuedToken};
use crate::error::{AppError, CredentialError, Result};
use crate::models::session::{AuthSession, DeviceClass, NewSession, SessionRecord};
use crate::models::user::User;
use crate::repositories::session::SessionLedger;
use crate::repositories::user::UserDirectory;
use crate::validation::auth::{validate_email, validate_name, validate_password};

/// Accounts, logins and the credential/session lifecycle.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserDirectory>,
    ledger: Arc<dyn SessionLedger>,
    issuer: CredentialIssuer,
}

impl AuthService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        ledger: Arc<dyn SessionLedger>,
        issuer: CredentialIssuer,
    ) -> Self {
        Self { users, ledger, issuer }
    }

    pub fn issuer(&self) -> &CredentialIssuer {
        &self.issuer
    }

    /// Creates a new user.
    ///
    /// # Arguments
    ///
    /// * `name` - The user's display name.
    /// * `email` - The login email; must not be registered yet.
    /// * `password` - The plaintext password, hashed with Argon2id.
    ///
    /// # Returns
    ///
    /// A `Result` containing the created `User`.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
        validate_name(name)?;
        validate_email(email)?;
        validate_password(password)?;

        tracing::debug!("🔐 Creating user: {}", email);
        let password_hash = hash_password(password)?;
        let user = self
            .users
            .create_user(name.trim(), email, &password_hash)
            .await?;

        tracing::info!("✅ User created with ID: {}", user.id);
        Ok(user)
    }

    /// Checks the password, issues a credential and records its session.
    ///
    /// Recording may evict the user's oldest sessions. If it fails, no
    /// credential is handed out.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_class: DeviceClass,
        origin: String,
    ) -> Result<IssuedToken> {
        tracing::debug!("🔐 Authenticating user: {}", email);

        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !verify_password(password, &user.password_hash)? {
            return Err(AppError::Authentication(
                "Invalid email or password".to_string(),
            ));
        }

        let issued = self.issuer.issue(user.id)?;
        self.ledger
            .record_session(NewSession {
                id: issued.claims.jti,
                user_id: user.id,
                device_class,
                origin,
            })
            .await?;

        tracing::info!("✅ User authenticated: {}", user.id);
        Ok(issued)
    }

    /// Validates a presented credential and checks its session is still live.
    pub async fn authenticate(&self, token: &str) -> Result<AuthSession> {
        let claims = self.issuer.validate(token)?;

        if !self.ledger.is_active(claims.jti).await? {
            tracing::warn!("❌ Session {} of user {} is no longer active", claims.jti, claims.user_id);
            return Err(CredentialError::Revoked.into());
        }

        Ok(AuthSession {
            user_id: claims.user_id,
            session_id: claims.jti,
        })
    }

    /// Rotates the caller's credential: a new token under a new session id,
    /// same session row and age. The old token stops working.
    pub async fn refresh(&self, session: AuthSession) -> Result<IssuedToken> {
        let issued = self.issuer.issue(session.user_id)?;

        if !self.ledger.rotate(session.session_id, issued.claims.jti).await? {
            return Err(CredentialError::Revoked.into());
        }

        tracing::info!("🔄 Session {} rotated to {}", session.session_id, issued.claims.jti);
        Ok(issued)
    }

    pub async fn logout(&self, session: AuthSession) -> Result<()> {
        self.ledger.revoke(session.session_id).await?;
        tracing::info!("✅ User logged out: {}", session.user_id);
        Ok(())
    }

    pub async fn sessions(&self, user_id: i64) -> Result<Vec<SessionRecord>> {
        self.ledger.list_for_user(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::session::MemorySessionLedger;
    use crate::repositories::user::MemoryUserDirectory;
    use std::time::Duration;

    fn service(max_sessions: usize) -> AuthService {
        AuthService::new(
            Arc::new(MemoryUserDirectory::new()),
            Arc::new(MemorySessionLedger::new(max_sessions)),
            CredentialIssuer::new(b"0123456789abcdef0123456789abcdef", Duration::from_secs(900)).unwrap(),
        )
    }

    async fn login(service: &AuthService) -> IssuedToken {
        service
            .login("anna@example.com", "password123", DeviceClass::Desktop, "127.0.0.1".to_string())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn register_then_login_then_authenticate() {
        let service = service(5);
        let user = service.register("Anna", "anna@example.com", "password123").await.unwrap();

        let issued = login(&service).await;
        let session = service.authenticate(&issued.token).await.unwrap();
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.session_id, issued.claims.jti);
    }

    #[tokio::test]
    async fn duplicate_email_conflicts() {
        let service = service(5);
        service.register("Anna", "anna@example.com", "password123").await.unwrap();
        assert!(matches!(
            service.register("Other", "anna@example.com", "password456").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_look_the_same() {
        let service = service(5);
        service.register("Anna", "anna@example.com", "password123").await.unwrap();

        let wrong = service
            .login("anna@example.com", "nope-nope", DeviceClass::Mobile, "x".to_string())
            .await
            .unwrap_err()
            .to_string();
        let unknown = service
            .login("bob@example.com", "password123", DeviceClass::Mobile, "x".to_string())
            .await
            .unwrap_err()
            .to_string();
        assert_eq!(wrong, unknown);
    }

    #[tokio::test]
    async fn evicted_session_credential_is_rejected() {
        let service = service(2);
        service.register("Anna", "anna@example.com", "password123").await.unwrap();

        let first = login(&service).await;
        login(&service).await;
        login(&service).await;

        assert!(matches!(
            service.authenticate(&first.token).await,
            Err(AppError::CredentialInvalid(CredentialError::Revoked))
        ));
    }

    #[tokio::test]
    async fn refresh_rotates_and_kills_the_old_token() {
        let service = service(5);
        service.register("Anna", "anna@example.com", "password123").await.unwrap();
        let issued = login(&service).await;
        let session = service.authenticate(&issued.token).await.unwrap();

        let rotated = service.refresh(session).await.unwrap();
        assert_ne!(rotated.claims.jti, issued.claims.jti);
        assert!(service.authenticate(&rotated.token).await.is_ok());
        assert!(service.authenticate(&issued.token).await.is_err());
        assert_eq!(service.sessions(session.user_id).await.unwrap().len(), 1);

        // the old session id cannot be rotated twice
        assert!(service.refresh(session).await.is_err());
    }

    #[tokio::test]
    async fn logout_revokes() {
        let service = service(5);
        service.register("Anna", "anna@example.com", "password123").await.unwrap();
        let issued = login(&service).await;
        let session = service.authenticate(&issued.token).await.unwrap();

        service.logout(session).await.unwrap();
        assert!(service.authenticate(&issued.token).await.is_err());
    }
}
