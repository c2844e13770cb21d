use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::rngs::OsRng;
use std::sync::Arc;
use thiserror::Error;

use crate::{
    util::random_string, Database, DatabaseError, Identity, NewUser, PrimaryKey, Role, UserData,
};

/// Account lookup, creation, and authentication.
///
/// Secrets are stored as argon2 hashes and are never handed back out.
/// Recovery works through short-lived opaque reset tokens instead of
/// echoing the stored secret.
pub struct Directory<Db> {
    db: Arc<Db>,
    argon: Argon2<'static>,
    recovery_tokens: DashMap<String, RecoveryToken>,
}

#[derive(Debug, Clone)]
struct RecoveryToken {
    user_id: PrimaryKey,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The secret does not match the stored hash
    #[error("Invalid credentials")]
    InvalidCredential,
    /// A role-specific login path was used against a user of another role
    #[error("Account is a {actual}, not a {expected}")]
    WrongRole { expected: Role, actual: Role },
    #[error("Recovery token is invalid or has expired")]
    RecoveryTokenInvalid,
    #[error("{0} must not be empty")]
    MissingField(&'static str),
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(#[from] DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl<Db> Directory<Db>
where
    Db: Database,
{
    const RECOVERY_TOKEN_DURATION_IN_MINUTES: i64 = 30;

    pub fn new(db: &Arc<Db>) -> Self {
        Self {
            db: db.clone(),
            argon: Argon2::default(),
            recovery_tokens: DashMap::new(),
        }
    }

    /// Creates an account with the given role, failing if the external id
    /// is already taken
    pub async fn register(
        &self,
        external_id: &str,
        secret: &str,
        role: Role,
    ) -> Result<UserData, DirectoryError> {
        if external_id.trim().is_empty() {
            return Err(DirectoryError::MissingField("external id"));
        }

        if secret.is_empty() {
            return Err(DirectoryError::MissingField("secret"));
        }

        let secret_hash = self.hash_secret(secret)?;

        let user = self
            .db
            .create_user(NewUser {
                external_id: external_id.to_string(),
                secret_hash,
                role,
            })
            .await?;

        Ok(user)
    }

    /// Verifies the credentials, yielding the identity the presentation
    /// layer should keep in its session state
    pub async fn authenticate(
        &self,
        external_id: &str,
        secret: &str,
    ) -> Result<Identity, DirectoryError> {
        let user = self.db.user_by_external_id(external_id).await?;

        let stored_secret = PasswordHash::parse(&user.secret_hash, Encoding::default())
            .map_err(|e| DirectoryError::HashError(e.to_string()))?;

        self.argon
            .verify_password(secret.as_bytes(), &stored_secret)
            .map_err(|_| DirectoryError::InvalidCredential)?;

        Ok(Identity {
            user_id: user.id,
            role: user.role,
        })
    }

    /// [Self::authenticate], but for role-specific login pages
    pub async fn authenticate_as(
        &self,
        external_id: &str,
        secret: &str,
        role: Role,
    ) -> Result<Identity, DirectoryError> {
        let identity = self.authenticate(external_id, secret).await?;

        if identity.role != role {
            return Err(DirectoryError::WrongRole {
                expected: role,
                actual: identity.role,
            });
        }

        Ok(identity)
    }

    /// Starts a secret recovery, returning an opaque reset token.
    /// The stored secret itself is never returned.
    pub async fn begin_recovery(
        &self,
        external_id: &str,
        role: Role,
    ) -> Result<String, DirectoryError> {
        let user = self.db.user_by_external_id(external_id).await?;

        if user.role != role {
            return Err(DatabaseError::NotFound {
                resource: "user",
                identifier: "external_id",
            }
            .into());
        }

        let token = random_string(32);
        let expires_at =
            Utc::now() + Duration::minutes(Self::RECOVERY_TOKEN_DURATION_IN_MINUTES);

        self.recovery_tokens.insert(
            token.clone(),
            RecoveryToken {
                user_id: user.id,
                expires_at,
            },
        );

        Ok(token)
    }

    /// Consumes a recovery token and replaces the account secret
    pub async fn reset_secret(
        &self,
        token: &str,
        new_secret: &str,
    ) -> Result<(), DirectoryError> {
        if new_secret.is_empty() {
            return Err(DirectoryError::MissingField("secret"));
        }

        self.clear_expired_tokens();

        let (_, recovery) = self
            .recovery_tokens
            .remove(token)
            .ok_or(DirectoryError::RecoveryTokenInvalid)?;

        let secret_hash = self.hash_secret(new_secret)?;
        self.db
            .update_user_secret(recovery.user_id, &secret_hash)
            .await?;

        Ok(())
    }

    /// Returns a user if it exists
    pub async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData, DatabaseError> {
        self.db.user_by_id(user_id).await
    }

    /// Returns a user by the identifier it logs in with, if it exists
    pub async fn user_by_external_id(
        &self,
        external_id: &str,
    ) -> Result<UserData, DatabaseError> {
        self.db.user_by_external_id(external_id).await
    }

    fn hash_secret(&self, secret: &str) -> Result<String, DirectoryError> {
        let salt = SaltString::generate(&mut OsRng);

        let hash = self
            .argon
            .hash_password(secret.as_bytes(), &salt)
            .map_err(|e| DirectoryError::HashError(e.to_string()))?
            .to_string();

        Ok(hash)
    }

    fn clear_expired_tokens(&self) {
        let now = Utc::now();
        self.recovery_tokens.retain(|_, t| t.expires_at > now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SqliteDatabase;

    async fn directory() -> Directory<SqliteDatabase> {
        let db = Arc::new(SqliteDatabase::in_memory().await.expect("database opens"));
        Directory::new(&db)
    }

    #[tokio::test]
    async fn register_and_authenticate() {
        let directory = directory().await;

        let user = directory
            .register("u100", "hunter2", Role::Student)
            .await
            .expect("registers");

        assert_eq!(user.external_id, "u100");
        assert_eq!(user.role, Role::Student);
        assert_ne!(user.secret_hash, "hunter2");

        let identity = directory
            .authenticate("u100", "hunter2")
            .await
            .expect("authenticates");

        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.role, Role::Student);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let directory = directory().await;

        directory
            .register("u100", "first", Role::Student)
            .await
            .expect("registers");

        let err = directory
            .register("u100", "second", Role::Teacher)
            .await
            .expect_err("conflicts");

        assert!(matches!(
            err,
            DirectoryError::Db(DatabaseError::Conflict { .. })
        ));

        // The original secret and role are unchanged
        let identity = directory
            .authenticate("u100", "first")
            .await
            .expect("original secret still works");

        assert_eq!(identity.role, Role::Student);

        directory
            .authenticate("u100", "second")
            .await
            .expect_err("second secret was never stored");
    }

    #[tokio::test]
    async fn authenticate_failure_taxonomy() {
        let directory = directory().await;

        directory
            .register("validuser", "correct", Role::Student)
            .await
            .expect("registers");

        let err = directory
            .authenticate("nouser", "x")
            .await
            .expect_err("unknown user");

        assert!(matches!(
            err,
            DirectoryError::Db(DatabaseError::NotFound { .. })
        ));

        let err = directory
            .authenticate("validuser", "wrongpw")
            .await
            .expect_err("wrong secret");

        assert!(matches!(err, DirectoryError::InvalidCredential));
    }

    #[tokio::test]
    async fn role_specific_login_rejects_other_roles() {
        let directory = directory().await;

        directory
            .register("t1", "secret", Role::Student)
            .await
            .expect("registers");

        let err = directory
            .authenticate_as("t1", "secret", Role::Teacher)
            .await
            .expect_err("not a teacher");

        assert!(matches!(
            err,
            DirectoryError::WrongRole {
                expected: Role::Teacher,
                actual: Role::Student,
            }
        ));

        directory
            .authenticate_as("t1", "secret", Role::Student)
            .await
            .expect("matching role works");
    }

    #[tokio::test]
    async fn recovery_resets_without_revealing_the_secret() {
        let directory = directory().await;

        directory
            .register("u100", "oldsecret", Role::Student)
            .await
            .expect("registers");

        let token = directory
            .begin_recovery("u100", Role::Student)
            .await
            .expect("recovery starts");

        assert_ne!(token, "oldsecret");

        directory
            .reset_secret(&token, "newsecret")
            .await
            .expect("resets");

        directory
            .authenticate("u100", "oldsecret")
            .await
            .expect_err("old secret no longer works");

        directory
            .authenticate("u100", "newsecret")
            .await
            .expect("new secret works");

        // Tokens are single use
        let err = directory
            .reset_secret(&token, "another")
            .await
            .expect_err("token is consumed");

        assert!(matches!(err, DirectoryError::RecoveryTokenInvalid));
    }

    #[tokio::test]
    async fn recovery_requires_a_matching_account() {
        let directory = directory().await;

        directory
            .register("u100", "secret", Role::Student)
            .await
            .expect("registers");

        let err = directory
            .begin_recovery("nouser", Role::Student)
            .await
            .expect_err("unknown account");

        assert!(matches!(
            err,
            DirectoryError::Db(DatabaseError::NotFound { .. })
        ));

        let err = directory
            .begin_recovery("u100", Role::Teacher)
            .await
            .expect_err("role does not match");

        assert!(matches!(
            err,
            DirectoryError::Db(DatabaseError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn empty_fields_are_rejected() {
        let directory = directory().await;

        let err = directory
            .register("  ", "secret", Role::Student)
            .await
            .expect_err("blank external id");

        assert!(matches!(err, DirectoryError::MissingField("external id")));

        let err = directory
            .register("u100", "", Role::Student)
            .await
            .expect_err("empty secret");

        assert!(matches!(err, DirectoryError::MissingField("secret")));
    }
}
