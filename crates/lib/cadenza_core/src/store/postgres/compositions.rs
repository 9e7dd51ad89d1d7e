//! Composition and composition item queries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::PgStore;
use crate::models::composition::{
    Belonging, Composition, CompositionField, CompositionFilter, CompositionItemView,
    CompositionStatus, CompositionUpdate,
};
use crate::store::{CompositionStore, StoreError};

const COLUMNS: &str = "id, creator_id, moderator_id, status, belonging, title, \
                       date_create, date_update, date_finish";

#[derive(Debug, sqlx::FromRow)]
struct CompositionRow {
    id: i64,
    creator_id: Uuid,
    moderator_id: Option<Uuid>,
    status: String,
    belonging: Option<String>,
    title: String,
    date_create: DateTime<Utc>,
    date_update: DateTime<Utc>,
    date_finish: Option<DateTime<Utc>>,
}

impl TryFrom<CompositionRow> for Composition {
    type Error = StoreError;

    fn try_from(row: CompositionRow) -> Result<Self, Self::Error> {
        let status = CompositionStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!("composition {}: status {:?}", row.id, row.status))
        })?;
        let belonging = match row.belonging.as_deref() {
            None => None,
            Some(raw) => Some(Belonging::parse(raw).ok_or_else(|| {
                StoreError::Corrupt(format!("composition {}: belonging {raw:?}", row.id))
            })?),
        };
        Ok(Self {
            id: row.id,
            creator_id: row.creator_id,
            moderator_id: row.moderator_id,
            status,
            belonging,
            title: row.title,
            date_create: row.date_create,
            date_update: row.date_update,
            date_finish: row.date_finish,
        })
    }
}

#[async_trait]
impl CompositionStore for PgStore {
    async fn find_draft(&self, creator_id: Uuid) -> Result<Option<Composition>, StoreError> {
        let row = sqlx::query_as::<_, CompositionRow>(&format!(
            "SELECT {COLUMNS} FROM compositions WHERE creator_id = $1 AND status = 'draft'"
        ))
        .bind(creator_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Composition::try_from).transpose()
    }

    async fn count_items(&self, composition_id: i64) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM composition_items WHERE composition_id = $1",
        )
        .bind(composition_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn upsert_draft_item(
        &self,
        creator_id: Uuid,
        interval_id: i64,
        amount: i32,
    ) -> Result<Composition, StoreError> {
        let mut tx = self.pool.begin().await?;

        // The partial unique index on (creator_id) WHERE status = 'draft'
        // turns a concurrent second insert into a no-op.
        sqlx::query(
            r#"
            INSERT INTO compositions (creator_id, status)
            VALUES ($1, 'draft')
            ON CONFLICT (creator_id) WHERE status = 'draft' DO NOTHING
            "#,
        )
        .bind(creator_id)
        .execute(&mut *tx)
        .await?;

        let draft_id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM compositions WHERE creator_id = $1 AND status = 'draft' FOR UPDATE",
        )
        .bind(creator_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO composition_items (composition_id, interval_id, amount)
            VALUES ($1, $2, $3)
            ON CONFLICT (composition_id, interval_id) DO UPDATE SET amount = EXCLUDED.amount
            "#,
        )
        .bind(draft_id)
        .bind(interval_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        let row = sqlx::query_as::<_, CompositionRow>(&format!(
            "UPDATE compositions SET date_update = now() WHERE id = $1 RETURNING {COLUMNS}"
        ))
        .bind(draft_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn update_item_amount(
        &self,
        composition_id: i64,
        interval_id: i64,
        amount: i32,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE composition_items SET amount = $3
            WHERE composition_id = $1 AND interval_id = $2
              AND EXISTS (
                  SELECT 1 FROM compositions
                  WHERE id = $1 AND status = 'draft'
                  FOR SHARE
              )
            "#,
        )
        .bind(composition_id)
        .bind(interval_id)
        .bind(amount)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "interval {interval_id} in composition {composition_id}"
            )));
        }
        Ok(())
    }

    async fn remove_item(&self, composition_id: i64, interval_id: i64) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM composition_items
            WHERE composition_id = $1 AND interval_id = $2
              AND EXISTS (
                  SELECT 1 FROM compositions
                  WHERE id = $1 AND status = 'draft'
                  FOR SHARE
              )
            "#,
        )
        .bind(composition_id)
        .bind(interval_id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!(
                "interval {interval_id} in composition {composition_id}"
            )));
        }
        Ok(())
    }

    async fn get_composition(&self, id: i64) -> Result<Option<Composition>, StoreError> {
        let row = sqlx::query_as::<_, CompositionRow>(&format!(
            "SELECT {COLUMNS} FROM compositions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Composition::try_from).transpose()
    }

    async fn list_items(
        &self,
        composition_id: i64,
    ) -> Result<Vec<CompositionItemView>, StoreError> {
        let rows = sqlx::query_as::<_, (i64, String, f64, i32)>(
            r#"
            SELECT ci.interval_id, i.title, i.tone, ci.amount
            FROM composition_items ci
            JOIN intervals i ON i.id = ci.interval_id
            WHERE ci.composition_id = $1
            ORDER BY ci.interval_id
            "#,
        )
        .bind(composition_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(interval_id, title, tone, amount)| CompositionItemView {
                interval_id,
                title,
                tone,
                amount,
            })
            .collect())
    }

    async fn list_compositions(
        &self,
        filter: &CompositionFilter,
    ) -> Result<Vec<Composition>, StoreError> {
        let rows = sqlx::query_as::<_, CompositionRow>(&format!(
            r#"
            SELECT {COLUMNS} FROM compositions
            WHERE status NOT IN ('draft', 'deleted')
              AND ($1::uuid IS NULL OR creator_id = $1)
              AND ($2::text IS NULL OR status = $2)
              AND ($3::date IS NULL OR (date_create AT TIME ZONE 'UTC')::date >= $3)
              AND ($4::date IS NULL OR (date_create AT TIME ZONE 'UTC')::date <= $4)
            ORDER BY id
            "#
        ))
        .bind(filter.creator_id)
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Composition::try_from).collect()
    }

    async fn apply_update(
        &self,
        id: i64,
        expected: Option<CompositionStatus>,
        update: &CompositionUpdate,
    ) -> Result<Composition, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Item edits hold a share lock on the composition row. Waiting here
        // means the guarded update below sees their committed effect.
        sqlx::query("SELECT id FROM compositions WHERE id = $1 FOR UPDATE")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let mut qb = QueryBuilder::<Postgres>::new("UPDATE compositions SET date_update = now()");
        for field in &update.fields {
            match field {
                CompositionField::Title(title) => {
                    qb.push(", title = ").push_bind(title.clone());
                }
                CompositionField::Belonging(belonging) => {
                    qb.push(", belonging = ")
                        .push_bind(belonging.map(|b| b.as_str()));
                }
                CompositionField::Status(status) => {
                    qb.push(", status = ").push_bind(status.as_str());
                }
                CompositionField::ModeratorId(moderator) => {
                    qb.push(", moderator_id = ").push_bind(*moderator);
                }
                CompositionField::DateFinish(date) => {
                    qb.push(", date_finish = ").push_bind(*date);
                }
            }
        }
        qb.push(" WHERE id = ").push_bind(id);
        if let Some(status) = expected {
            qb.push(" AND status = ").push_bind(status.as_str());
        }
        if update.require_items {
            qb.push(" AND EXISTS (SELECT 1 FROM composition_items WHERE composition_id = ")
                .push_bind(id)
                .push(")");
        }
        qb.push(" RETURNING ").push(COLUMNS);

        let row = qb
            .build_query_as::<CompositionRow>()
            .fetch_optional(&mut *tx)
            .await?;
        tx.commit().await?;
        match row {
            Some(row) => row.try_into(),
            None => Err(StoreError::NotFound(format!("composition {id}"))),
        }
    }
}
