//! Refermesh Authentication
//!
//! A deliberately thin collaborator: Argon2id password hashing, HS256
//! access tokens, and the register/login/profile queries over the users
//! table. Authorization decisions (role and ownership checks) live in the
//! core services, keyed by the `(user_id, role)` pair this crate verifies.

pub mod error;
pub mod jwt;
pub mod password;

use refermesh_db::DbUser;
use refermesh_types::UserRole;
use sqlx::PgPool;
use uuid::Uuid;

pub use error::{AuthError, AuthResult};
pub use jwt::{JwtService, TokenClaims};

const USER_COLS: &str = "id, email, password_hash, full_name, phone, role, broker_id, \
     languages, rating, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct RegisterParams {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub broker_id: Option<Uuid>,
    pub languages: Vec<String>,
}

#[derive(Debug)]
pub struct LoginResponse {
    pub token: String,
    pub user: DbUser,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt: JwtService,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt_secret: &str) -> Self {
        Self {
            pool,
            jwt: JwtService::new(jwt_secret),
        }
    }

    pub async fn register(&self, params: RegisterParams) -> AuthResult<DbUser> {
        let email = params.email.trim().to_ascii_lowercase();
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Internal("invalid email".to_string()));
        }
        let password_hash = password::hash_password(&params.password)?;
        let role = params.role.unwrap_or(UserRole::Agent);

        let user = sqlx::query_as::<_, DbUser>(&format!(
            r#"
            INSERT INTO users (email, password_hash, full_name, phone, role, broker_id, languages)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {USER_COLS}
            "#
        ))
        .bind(&email)
        .bind(&password_hash)
        .bind(&params.full_name)
        .bind(&params.phone)
        .bind(role)
        .bind(params.broker_id)
        .bind(&params.languages)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                AuthError::DuplicateEmail
            }
            _ => AuthError::Database(e),
        })?;

        Ok(user)
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginResponse> {
        let email = email.trim().to_ascii_lowercase();

        let user = sqlx::query_as::<_, DbUser>(&format!(
            "SELECT {USER_COLS} FROM users WHERE email = $1"
        ))
        .bind(&email)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::InvalidCredentials)?;
        if !password::verify_password(password, hash) {
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt.issue(user.id, user.role)?;
        Ok(LoginResponse { token, user })
    }

    pub fn verify_token(&self, token: &str) -> AuthResult<(Uuid, UserRole)> {
        self.jwt.verify(token)
    }

    pub async fn get_user(&self, user_id: Uuid) -> AuthResult<DbUser> {
        sqlx::query_as::<_, DbUser>(&format!("SELECT {USER_COLS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
