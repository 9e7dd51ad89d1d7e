//! Interval queries.

use async_trait::async_trait;

use super::PgStore;
use crate::models::interval::{Interval, IntervalFilter, IntervalUpdate, NewInterval, PageRequest};
use crate::store::{CatalogStore, StoreError};

#[derive(Debug, sqlx::FromRow)]
struct IntervalRow {
    id: i64,
    title: String,
    description: String,
    tone: f64,
    photo_url: Option<String>,
    is_deleted: bool,
}

impl From<IntervalRow> for Interval {
    fn from(row: IntervalRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            tone: row.tone,
            photo_url: row.photo_url,
            is_deleted: row.is_deleted,
        }
    }
}

const FILTER: &str = r#"
    NOT is_deleted
    AND ($1::text IS NULL OR position(lower($1) IN lower(title)) > 0)
    AND ($2::float8 IS NULL OR tone >= $2)
    AND ($3::float8 IS NULL OR tone <= $3)
"#;

#[async_trait]
impl CatalogStore for PgStore {
    async fn list_intervals(
        &self,
        filter: &IntervalFilter,
        page: PageRequest,
    ) -> Result<(Vec<Interval>, i64), StoreError> {
        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM intervals WHERE {FILTER}"
        ))
        .bind(filter.title.as_deref())
        .bind(filter.tone_min)
        .bind(filter.tone_max)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query_as::<_, IntervalRow>(&format!(
            "SELECT id, title, description, tone, photo_url, is_deleted \
             FROM intervals WHERE {FILTER} ORDER BY id LIMIT $4 OFFSET $5"
        ))
        .bind(filter.title.as_deref())
        .bind(filter.tone_min)
        .bind(filter.tone_max)
        .bind(page.page_size)
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((rows.into_iter().map(Interval::from).collect(), total))
    }

    async fn get_interval(&self, id: i64) -> Result<Option<Interval>, StoreError> {
        let row = sqlx::query_as::<_, IntervalRow>(
            "SELECT id, title, description, tone, photo_url, is_deleted \
             FROM intervals WHERE id = $1 AND NOT is_deleted",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Interval::from))
    }

    async fn create_interval(&self, interval: &NewInterval) -> Result<Interval, StoreError> {
        let row = sqlx::query_as::<_, IntervalRow>(
            r#"
            INSERT INTO intervals (title, description, tone)
            VALUES ($1, $2, $3)
            RETURNING id, title, description, tone, photo_url, is_deleted
            "#,
        )
        .bind(&interval.title)
        .bind(&interval.description)
        .bind(interval.tone)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_interval(
        &self,
        id: i64,
        update: &IntervalUpdate,
    ) -> Result<Interval, StoreError> {
        let row = sqlx::query_as::<_, IntervalRow>(
            r#"
            UPDATE intervals
            SET title = COALESCE($2, title),
                description = COALESCE($3, description),
                tone = COALESCE($4, tone)
            WHERE id = $1 AND NOT is_deleted
            RETURNING id, title, description, tone, photo_url, is_deleted
            "#,
        )
        .bind(id)
        .bind(update.title.as_deref())
        .bind(update.description.as_deref())
        .bind(update.tone)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Interval::from)
            .ok_or_else(|| StoreError::NotFound(format!("interval {id}")))
    }

    async fn set_interval_photo(&self, id: i64, photo_url: &str) -> Result<Interval, StoreError> {
        let row = sqlx::query_as::<_, IntervalRow>(
            r#"
            UPDATE intervals SET photo_url = $2
            WHERE id = $1 AND NOT is_deleted
            RETURNING id, title, description, tone, photo_url, is_deleted
            "#,
        )
        .bind(id)
        .bind(photo_url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Interval::from)
            .ok_or_else(|| StoreError::NotFound(format!("interval {id}")))
    }

    async fn delete_interval(&self, id: i64) -> Result<(), StoreError> {
        let result =
            sqlx::query("UPDATE intervals SET is_deleted = TRUE WHERE id = $1 AND NOT is_deleted")
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("interval {id}")));
        }
        Ok(())
    }
}
