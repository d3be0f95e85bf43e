use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{Result as HashResult, SaltString, rand_core::OsRng},
};

use bookclub_types::general::{ValidEmail, normalize_email};
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Row as _};
use tracing::debug;

use crate::{ChosenDB, ChosenRow, Error, error::Result, new_id};

fn hash_password(password: &str) -> HashResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)?
        .to_string();
    Ok(password_hash)
}

fn verify_password(password: &str, password_hash: &str) -> HashResult<bool> {
    let parsed_hash = PasswordHash::new(password_hash)?;
    let res = Argon2::default().verify_password(password.as_bytes(), &parsed_hash);
    if let Err(e) = res {
        debug!("Invalid password, error {e}");
    }
    Ok(res.is_ok())
}

#[derive(Debug, Serialize, Deserialize, Clone, Validate)]
pub struct CreateUser {
    #[garde(length(min = 2, max = 255))]
    pub name: String,
    #[garde(dive)]
    pub email: ValidEmail,
    #[garde(length(min = 6, max = 255))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: String,
    pub image: Option<String>,
    pub bio: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = String))]
    pub created_at: time::PrimitiveDateTime,
}

/// Public part of user, shown as author of discussions and posts
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserShort {
    pub id: String,
    pub name: Option<String>,
    pub image: Option<String>,
}

impl UserShort {
    /// Reads user columns aliased as `user_id`, `user_name`, `user_image`
    pub(crate) fn from_row_prefixed(row: &ChosenRow) -> Result<Self, sqlx::Error> {
        Ok(UserShort {
            id: row.try_get("user_id")?,
            name: row.try_get("user_name")?,
            image: row.try_get("user_image")?,
        })
    }
}

pub type UserRepository = UserRepositoryImpl<Pool<ChosenDB>>;

pub struct UserRepositoryImpl<E> {
    executor: E,
}

impl<'c, E> UserRepositoryImpl<E>
where
    for<'a> &'a E: sqlx::Executor<'c, Database = ChosenDB>,
{
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    pub async fn create(&self, payload: CreateUser) -> Result<User> {
        let id = new_id();
        let password = hash_password(&payload.password)?;
        let email = payload.email.normalized();
        sqlx::query("INSERT INTO users (id, name, email, password) VALUES (?, ?, ?, ?)")
            .bind(&id)
            .bind(payload.name.trim())
            .bind(&email)
            .bind(&password)
            .execute(&self.executor)
            .await
            .map_err(|e| Error::from_write(e, "User", "User"))?;

        self.get(&id).await
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, image, bio, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("User".to_string()))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<User> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, image, bio, created_at FROM users WHERE email = ?",
        )
        .bind(normalize_email(email))
        .fetch_optional(&self.executor)
        .await?
        .ok_or_else(|| Error::RecordNotFound("User".to_string()))
    }

    pub async fn check_password(&self, email: &str, password: &str) -> Result<User> {
        let (id, hashed_password): (String, String) =
            sqlx::query_as("SELECT id, password FROM users WHERE email = ?")
                .bind(normalize_email(email))
                .fetch_one(&self.executor)
                .await
                .map_err(|e| {
                    debug!("User check error: {e}");
                    Error::InvalidCredentials
                })?;
        if verify_password(password, &hashed_password).unwrap_or(false) {
            return self.get(&id).await;
        }
        Err(Error::InvalidCredentials)
    }
}
