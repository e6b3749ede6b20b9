//! User queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use bazaar_core::{Email, UserId, Username};

use super::PgStore;
use crate::db::{RepositoryError, UserStore};
use crate::models::{NewUser, User};

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i32,
    username: String,
    email: String,
    is_admin: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let username = Username::parse(&row.username).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid username in database: {e}"))
        })?;
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            username,
            email,
            is_admin: row.is_admin,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CredentialRow {
    #[sqlx(flatten)]
    user: UserRow,
    password_hash: String,
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row: UserRow = sqlx::query_as(
            r"
            INSERT INTO bazaar.users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, is_admin, created_at
            ",
        )
        .bind(user.username.as_str())
        .bind(user.email.as_str())
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("user already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        row.try_into()
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, email, is_admin, created_at FROM bazaar.users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }

    async fn get_user_credentials(
        &self,
        username: &Username,
    ) -> Result<Option<(User, String)>, RepositoryError> {
        let row: Option<CredentialRow> = sqlx::query_as(
            r"
            SELECT id, username, email, is_admin, created_at, password_hash
            FROM bazaar.users
            WHERE username = $1
            ",
        )
        .bind(username.as_str())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some((r.user.try_into()?, r.password_hash))),
            None => Ok(None),
        }
    }

    async fn set_admin(&self, username: &Username, is_admin: bool) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE bazaar.users SET is_admin = $2 WHERE username = $1")
            .bind(username.as_str())
            .bind(is_admin)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
