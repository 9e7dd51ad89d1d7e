//! User queries.

use async_trait::async_trait;
use uuid::Uuid;

use super::{PgStore, conflict_or_db};
use crate::models::auth::{User, UserWithPassword};
use crate::store::{StoreError, UserStore};
use crate::uuid::uuidv7;

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    login: String,
    is_moderator: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            login: row.login,
            is_moderator: row.is_moderator,
        }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<UserWithPassword>, StoreError> {
        let row = sqlx::query_as::<_, (Uuid, String, bool, String)>(
            "SELECT id, login, is_moderator, password_hash FROM users WHERE login = $1",
        )
        .bind(login)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|(id, login, is_moderator, password_hash)| UserWithPassword {
            user: User {
                id,
                login,
                is_moderator,
            },
            password_hash,
        }))
    }

    async fn get_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, login, is_moderator FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
        is_moderator: bool,
    ) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, login, password_hash, is_moderator)
            VALUES ($1, $2, $3, $4)
            RETURNING id, login, is_moderator
            "#,
        )
        .bind(uuidv7())
        .bind(login)
        .bind(password_hash)
        .bind(is_moderator)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "login already taken"))?;
        Ok(row.into())
    }

    async fn update_user(
        &self,
        id: Uuid,
        login: Option<&str>,
        password_hash: Option<&str>,
    ) -> Result<User, StoreError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            UPDATE users
            SET login = COALESCE($2, login),
                password_hash = COALESCE($3, password_hash)
            WHERE id = $1
            RETURNING id, login, is_moderator
            "#,
        )
        .bind(id)
        .bind(login)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or_db(e, "login already taken"))?;
        row.map(User::from)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))
    }
}
