//! User service.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Utc;
use civic_common::{AppError, AppResult, IdGenerator};
use civic_db::entities::user::{self, UserRole};
use serde::Deserialize;
use validator::Validate;

use crate::store::UserStoreRef;

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    users: UserStoreRef,
    id_gen: IdGenerator,
}

/// Input for creating a new account.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupInput {
    #[validate(email, length(max = 255))]
    pub email: String,

    #[validate(length(min = 8, max = 128))]
    pub password: String,

    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[validate(length(max = 32))]
    pub mobile: Option<String>,
}

/// Input for signing in.
#[derive(Debug, Deserialize, Validate)]
pub struct SigninInput {
    #[validate(length(min = 1, max = 255))]
    pub email: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(users: UserStoreRef) -> Self {
        Self {
            users,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a resident account. The returned model carries a fresh token.
    pub async fn signup(&self, input: SignupInput) -> AppResult<user::Model> {
        input.validate()?;
        self.create_account(
            &input.email,
            &input.password,
            clean(input.first_name),
            clean(input.last_name),
            clean(input.mobile),
            UserRole::Resident,
        )
        .await
    }

    async fn create_account(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
        mobile: Option<String>,
        role: UserRole,
    ) -> AppResult<user::Model> {
        let email = email.trim().to_lowercase();

        // Check if the email is taken
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("Email already registered".to_string()));
        }

        let password_hash = hash_password(password)?;
        let now = Utc::now().into();

        let user = user::Model {
            id: self.id_gen.generate(),
            email,
            first_name,
            last_name,
            mobile,
            password_hash,
            token: Some(self.id_gen.generate_token()),
            role,
            created_at: now,
            updated_at: now,
        };

        self.users.insert(user).await
    }

    /// Verify credentials and hand out a new session token.
    pub async fn signin(&self, input: SigninInput) -> AppResult<user::Model> {
        input.validate()?;

        let user = self
            .users
            .find_by_email(&input.email)
            .await?
            .ok_or(AppError::Unauthorized)?;

        if !verify_password(&input.password, &user.password_hash)? {
            return Err(AppError::Unauthorized);
        }

        let token = self.id_gen.generate_token();
        self.users.update_token(&user.id, Some(token)).await
    }

    /// Invalidate the current session token.
    pub async fn signout(&self, user_id: &str) -> AppResult<()> {
        // Replace with a token nobody holds
        let token = self.id_gen.generate_token();
        self.users.update_token(user_id, Some(token)).await?;
        Ok(())
    }

    /// Authenticate a user by token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.users
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Create the configured admin account if it does not exist yet.
    ///
    /// Returns `true` when an account was created.
    pub async fn ensure_admin(&self, email: &str, password: &str) -> AppResult<bool> {
        if self.users.find_by_email(email).await?.is_some() {
            return Ok(false);
        }
        self.create_account(email, password, None, None, None, UserRole::Admin)
            .await?;
        tracing::info!(email = %email, "Seeded admin account");
        Ok(true)
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Hash a password using Argon2.
fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {e}")))
}

/// Verify a password against a hash.
fn verify_password(password: &str, hash: &str) -> AppResult<bool> {
    let parsed_hash =
        PasswordHash::new(hash).map_err(|e| AppError::Internal(format!("Invalid hash: {e}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}
