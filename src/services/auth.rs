//! Authentication service
//!
//! Provides password hashing with Argon2 and local user management.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::config::BootstrapAdminConfig;
use crate::db::{format_timestamp, now_timestamp, parse_db_timestamp, parse_db_uuid};
use crate::models::{CreateUserRequest, User, UserRole};

const USER_COLUMNS: &str =
    "id, username, email, display_name, department, role, password_hash, is_active, created_at, updated_at";

/// Authentication service for user management
pub struct AuthService {
    pool: SqlitePool,
}

impl AuthService {
    /// Create a new auth service
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Hash a password using Argon2id
    pub fn hash_password(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();
        let password_hash = argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();
        Ok(password_hash)
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, password_hash: &str) -> Result<bool> {
        let parsed_hash = PasswordHash::new(password_hash)
            .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Authenticate a user by username and password
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>> {
        let user = self.get_user_by_username(username).await?;

        match user {
            Some(user) => {
                if Self::verify_password(password, &user.password_hash)? {
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            None => Ok(None),
        }
    }

    /// Get a user by username
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by username")?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    /// Get a user by ID
    pub async fn get_user_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by ID")?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    /// Get a user by email
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by email")?;

        Ok(row.map(|r| row_to_user(&r)))
    }

    pub async fn count_users(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")?;
        Ok(row.get("count"))
    }

    /// Create a new user
    pub async fn create_user(&self, req: &CreateUserRequest) -> Result<User> {
        if self.get_user_by_username(&req.username).await?.is_some() {
            anyhow::bail!("Username already exists");
        }
        if self.get_user_by_email(&req.email).await?.is_some() {
            anyhow::bail!("Email already exists");
        }

        let password_hash = Self::hash_password(&req.password)?;
        let mut user = User::new(
            req.username.clone(),
            req.email.clone(),
            password_hash,
            req.role,
        );
        if let Some(ref display_name) = req.display_name {
            user.display_name = display_name.clone();
        }
        user.department = req.department.clone();

        sqlx::query(
            "INSERT INTO users (id, username, email, display_name, department, role, password_hash, is_active, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        )
        .bind(user.id.to_string())
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(&user.department)
        .bind(user.role.as_str())
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(format_timestamp(user.created_at))
        .bind(format_timestamp(user.updated_at))
        .execute(&self.pool)
        .await
        .context("Failed to create user")?;

        Ok(user)
    }

    pub async fn set_active(&self, id: &Uuid, is_active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(is_active)
            .bind(now_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .context("Failed to update user status")?;

        Ok(result.rows_affected() > 0)
    }

    /// Create the initial administrator when no user exists yet
    ///
    /// Returns the created user, or `None` when users are already present.
    pub async fn ensure_bootstrap_admin(
        &self,
        bootstrap: &BootstrapAdminConfig,
    ) -> Result<Option<User>> {
        if self.count_users().await? > 0 {
            return Ok(None);
        }

        let req = CreateUserRequest {
            username: bootstrap.username.clone(),
            email: bootstrap.email.clone(),
            password: bootstrap.password.clone(),
            display_name: Some("Administrator".to_string()),
            department: None,
            role: UserRole::Admin,
        };
        let user = self.create_user(&req).await?;
        tracing::info!("Created bootstrap administrator '{}'", user.username);

        Ok(Some(user))
    }
}

/// Convert a database row to a User
fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> User {
    let role: String = row.get("role");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    User {
        id: parse_db_uuid(&row.get::<String, _>("id")),
        username: row.get("username"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        department: row.get("department"),
        role: role.parse().unwrap_or_default(),
        password_hash: row.get("password_hash"),
        is_active: row.get("is_active"),
        created_at: parse_db_timestamp(&created_at),
        updated_at: parse_db_timestamp(&updated_at),
    }
}
