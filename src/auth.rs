use argon2::{Argon2, PasswordHash, PasswordVerifier};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::{RngCore, rngs::OsRng};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{AdminPassword, Config};
use crate::db::{SessionStore, StoreError};
use crate::models::{NewSession, SessionRecord};

/// Verify password using an Argon2 PHC string.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(p) => p,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

/// Generate an opaque session token to return to the client.
/// We store only a hash(token).
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash token for storage (SHA-256 hex).
pub fn hash_access_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let out = hasher.finalize();
    hex::encode(out)
}

/// The single privileged identity. Lives in configuration, never in the stores.
#[derive(Clone, Debug)]
pub struct AdminCredential {
    pub email: String,
    password: AdminPassword,
}

impl AdminCredential {
    pub fn new(email: impl Into<String>, password: AdminPassword) -> Self {
        Self {
            email: email.into(),
            password,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.admin_email.clone(), cfg.admin_password.clone())
    }

    pub fn is_admin(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }

    pub fn verify(&self, email: &str, password: &str) -> bool {
        if !self.is_admin(email) {
            return false;
        }
        match &self.password {
            AdminPassword::Plain(expected) => expected == password,
            AdminPassword::Hashed(phc) => verify_password(password, phc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues opaque bearer tokens bound to one identity email and resolves them back.
///
/// Unknown, tampered, revoked and expired tokens all validate to `None`.
#[derive(Clone, Debug)]
pub struct TokenIssuer {
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(ttl_hours: i64) -> Self {
        Self {
            ttl: Duration::hours(ttl_hours),
        }
    }

    /// `role` is one of the `ROLE_*` constants and is fixed for the token's lifetime.
    pub async fn issue<S>(
        &self,
        store: &S,
        identity_key: &str,
        role: i16,
    ) -> Result<IssuedToken, StoreError>
    where
        S: SessionStore + ?Sized,
    {
        let token = generate_access_token();
        let expires_at = Utc::now() + self.ttl;

        store
            .insert_session(NewSession {
                session_token_id: Uuid::new_v4(),
                identity_email: identity_key.to_string(),
                role,
                token_hash: hash_access_token(&token),
                expires_at,
            })
            .await?;

        Ok(IssuedToken { token, expires_at })
    }

    pub async fn validate<S>(
        &self,
        store: &S,
        token: &str,
    ) -> Result<Option<SessionRecord>, StoreError>
    where
        S: SessionStore + ?Sized,
    {
        let token = token.trim();
        if token.is_empty() {
            return Ok(None);
        }
        store
            .find_active_session(&hash_access_token(token), Utc::now())
            .await
    }

    pub async fn revoke<S>(&self, store: &S, session_token_id: Uuid) -> Result<bool, StoreError>
    where
        S: SessionStore + ?Sized,
    {
        store.revoke_session(session_token_id).await
    }
}
