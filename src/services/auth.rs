//! Local and Plex-backed authentication: password hashing, JWT issuance and
//! verification, and the first-run setup flow.
//!
//! The OAuth dance itself (PIN polling against plex.tv) is out of scope here;
//! this only enforces the token contract described in the external interfaces
//! — a bearer JWT with a `sub` user id — the same way `integrations::plex`
//! only verifies a token against a required section, not the PIN handshake.

use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, Result};
use crate::models::user::{Claims, User};
use crate::services::entity_store::UserRepository;

#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(users: UserRepository, config: AuthConfig) -> Self {
        Self { users, config }
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        Ok(bcrypt::hash(password, self.config.bcrypt_cost)?)
    }

    pub fn verify_password(&self, password: &str, hash: &str) -> Result<bool> {
        Ok(bcrypt::verify(password, hash)?)
    }

    pub fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            username: user.username.clone(),
            scopes: if user.is_admin { vec!["admin".to_string()] } else { vec![] },
            iat: now.timestamp(),
            exp: (now + self.config.access_token_expiry).timestamp(),
        };
        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )?)
    }

    /// Token lifetime in seconds, for the `expires_in` field of the login/register response.
    pub fn token_ttl_secs(&self) -> i64 {
        self.config.access_token_expiry.as_secs() as i64
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    pub async fn user_from_claims(&self, claims: &Claims) -> Result<User> {
        let id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::TokenInvalid)?;
        self.users.get(id).await.map_err(|_| AppError::TokenInvalid)
    }

    /// `registration_enabled=false` → `Forbidden`. `max_users > 0` and the
    /// table is already at capacity → `Forbidden` with "maximum user limit".
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        registration_enabled: bool,
        max_users: i64,
    ) -> Result<User> {
        if !registration_enabled {
            return Err(AppError::Forbidden { reason: "registration is disabled".to_string() });
        }
        if max_users > 0 {
            enforce_registration_policy(max_users, self.users.count().await?)?;
        }
        if self.users.find_by_username(username).await?.is_some() {
            return Err(AppError::Conflict { message: "username already taken".to_string() });
        }
        if self.users.find_by_email(email).await?.is_some() {
            return Err(AppError::Conflict { message: "email already registered".to_string() });
        }

        let hash = self.hash_password(password)?;
        let user = self.users.create(username, email, &hash).await?;

        if self.users.count().await? == 1 {
            self.users.set_admin(user.id, true).await?;
            return self.users.get(user.id).await;
        }
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<(User, String)> {
        let user = self
            .users
            .find_by_username(username)
            .await?
            .ok_or(AppError::TokenInvalid)?;

        if !self.verify_password(password, &user.password_hash)? {
            return Err(AppError::TokenInvalid);
        }
        if !user.is_active {
            return Err(AppError::Forbidden { reason: "account disabled".to_string() });
        }

        self.users.record_login(user.id).await?;
        let token = self.issue_token(&user)?;
        Ok((user, token))
    }
}

/// Pure capacity gate factored out of [`AuthService::register`] so the policy
/// can be exercised without a database.
pub fn enforce_registration_policy(max_users: i64, current_count: i64) -> Result<()> {
    if current_count >= max_users {
        return Err(AppError::Forbidden { reason: "maximum user limit reached".to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_policy_allows_under_capacity() {
        assert!(enforce_registration_policy(2, 1).is_ok());
    }

    #[test]
    fn registration_policy_rejects_at_capacity() {
        let err = enforce_registration_policy(2, 2).unwrap_err();
        assert!(matches!(err, AppError::Forbidden { reason } if reason.contains("maximum user limit")));
    }
}
