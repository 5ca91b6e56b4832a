use diesel::result::{DatabaseErrorKind, Error as DieselError};

use crate::{
    DbPool, Error,
    config::Auth as AuthConfig,
    db::{NewUser, User},
};

use super::{
    credential::{CredentialError, CredentialManager},
    token::{IssuedToken, TokenService},
};

pub struct AuthManager {
    pool: DbPool,
    credentials: CredentialManager,
    tokens: TokenService,
}

pub struct NewUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

impl AuthManager {
    pub fn new(config: &AuthConfig, pool: DbPool) -> Result<Self, CredentialError> {
        let credentials = CredentialManager::from_config(config)?;
        let tokens = TokenService::new(config);
        Ok(Self::from_parts(pool, credentials, tokens))
    }

    pub fn from_parts(pool: DbPool, credentials: CredentialManager, tokens: TokenService) -> Self {
        Self {
            pool,
            credentials,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub async fn register(&self, request: NewUserRequest) -> Result<User, Error> {
        let conn = self.pool.get().await?;
        if User::find_by_username(&conn, &request.username)
            .await?
            .is_some()
        {
            return Err(Error::bad_request(
                "username already registered",
                "username_taken",
            ));
        }
        if User::find_by_email(&conn, &request.email).await?.is_some() {
            return Err(Error::bad_request("email already registered", "email_taken"));
        }

        let credential = self.credentials.hash_blocking(request.password).await?;
        let new_user = NewUser::new(request.username, request.email, credential);
        let user = match User::create(&conn, new_user).await {
            Ok(user) => user,
            // Lost a race with a concurrent signup for the same name or email.
            Err(Error::Diesel(DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation,
                _,
            ))) => {
                return Err(Error::bad_request(
                    "username or email already registered",
                    "user_exists",
                ));
            }
            Err(err) => return Err(err),
        };
        info!(user_id = user.id, username = %user.username, "registered user");
        Ok(user)
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<IssuedToken, Error> {
        let conn = self.pool.get().await?;
        let user = User::find_by_username(&conn, username).await?;
        let credential = user.as_ref().map(User::credential);
        let verified = self
            .credentials
            .verify_blocking(password.to_owned(), credential)
            .await?;

        let user = match user {
            Some(user) if verified => user,
            _ => {
                debug!(username, "login rejected");
                return Err(Error::InvalidCredentials);
            }
        };

        let token = self.tokens.issue(&user.username, None)?;
        info!(username = %user.username, expires_at = %token.expires_at, "issued token");
        Ok(token)
    }

    /// Resolves the user a bearer token speaks for.
    pub async fn current_user(&self, token: &str) -> Result<User, Error> {
        let Some(subject) = self.tokens.verify(token).subject() else {
            return Err(Error::Unauthenticated);
        };
        self.resolve(&subject).await
    }

    pub async fn resolve(&self, subject: &str) -> Result<User, Error> {
        let conn = self.pool.get().await?;
        User::find_by_username(&conn, subject)
            .await?
            .ok_or(Error::Unauthenticated)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::{
        auth::{test_manager, test_service},
        db::run_migrations,
    };

    pub(crate) fn test_auth(dir: &TempDir) -> AuthManager {
        let url = dir.path().join("finauth.db");
        let url = url.to_str().unwrap();
        run_migrations(url).unwrap();
        let manager = deadpool_diesel::sqlite::Manager::new(url, deadpool_diesel::Runtime::Tokio1);
        let pool = deadpool_diesel::sqlite::Pool::builder(manager).build().unwrap();
        AuthManager::from_parts(pool, test_manager(), test_service("test-secret"))
    }

    #[tokio::test]
    async fn bad_hash_cost_is_a_credential_error() {
        let dir = tempfile::tempdir().unwrap();
        let url = dir.path().join("finauth.db");
        let manager = deadpool_diesel::sqlite::Manager::new(
            url.to_str().unwrap(),
            deadpool_diesel::Runtime::Tokio1,
        );
        let pool = deadpool_diesel::sqlite::Pool::builder(manager).build().unwrap();
        let config = AuthConfig {
            signing_secret: "secret".into(),
            hash_parallelism: 0,
            ..AuthConfig::default()
        };
        assert!(matches!(
            AuthManager::new(&config, pool),
            Err(CredentialError::Params(_))
        ));
    }

    fn alice() -> NewUserRequest {
        NewUserRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "pw123".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login_then_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let auth = test_auth(&dir);

        let user = auth.register(alice()).await.unwrap();
        assert_eq!(user.username, "alice");
        assert_ne!(user.hashed_password, "pw123");

        let token = auth.authenticate("alice", "pw123").await.unwrap();
        let me = auth.current_user(&token.token).await.unwrap();
        assert_eq!(me.id, user.id);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_look_alike() {
        let dir = tempfile::tempdir().unwrap();
        let auth = test_auth(&dir);
        auth.register(alice()).await.unwrap();

        let wrong = auth.authenticate("alice", "wrong").await.unwrap_err();
        let ghost = auth.authenticate("ghost", "pw123").await.unwrap_err();
        assert!(matches!(wrong, Error::InvalidCredentials));
        assert!(matches!(ghost, Error::InvalidCredentials));
        assert_eq!(wrong.to_string(), ghost.to_string());
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let auth = test_auth(&dir);
        auth.register(alice()).await.unwrap();

        let err = auth.register(alice()).await.unwrap_err();
        assert_eq!(err.to_string(), "username already registered");

        let mut same_mail = alice();
        same_mail.username = "alice2".into();
        let err = auth.register(same_mail).await.unwrap_err();
        assert_eq!(err.to_string(), "email already registered");
    }

    #[tokio::test]
    async fn token_for_deleted_or_unknown_subject_is_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let auth = test_auth(&dir);
        let orphan = auth.tokens().issue("nobody", None).unwrap();
        assert!(matches!(
            auth.current_user(&orphan.token).await,
            Err(Error::Unauthenticated)
        ));
        assert!(matches!(
            auth.current_user("garbage").await,
            Err(Error::Unauthenticated)
        ));
    }
}
