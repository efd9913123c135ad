use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgConnection, PgPool, Postgres, QueryBuilder, Row};
use std::time::Duration;
use tracing::info;

use super::{
    resolve_server_timestamps, validate_query, Direction, Document, DocumentStore, Page,
    PageRequest, Query, StoreError, WriteBatch, WriteOp, WriteResult,
};
use crate::config::StoreConfig;

const CREATE_DOCUMENTS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS documents (
        collection  TEXT NOT NULL,
        id          TEXT COLLATE "C" NOT NULL,
        data        JSONB NOT NULL,
        updated_at  TIMESTAMPTZ NOT NULL,
        PRIMARY KEY (collection, id)
    )
"#;

/// Document store backed by a single Postgres JSONB table.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
}

impl PgDocumentStore {
    /// Connect using the store configuration and make sure the table exists.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("DATABASE_URL is not configured".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        let store = Self::from_pool(pool);
        store.ensure_schema().await?;
        info!("Connected postgres document store");
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(CREATE_DOCUMENTS_TABLE).execute(&self.pool).await?;
        Ok(())
    }

    async fn apply(conn: &mut PgConnection, op: WriteOp, at: DateTime<Utc>) -> Result<(), StoreError> {
        match op {
            WriteOp::Set { collection, id, mut data } => {
                resolve_server_timestamps(&mut data, at);
                sqlx::query(
                    r#"
                    INSERT INTO documents (collection, id, data, updated_at)
                    VALUES ($1, $2, $3, $4)
                    ON CONFLICT (collection, id)
                    DO UPDATE SET data = EXCLUDED.data, updated_at = EXCLUDED.updated_at
                    "#,
                )
                .bind(collection)
                .bind(id)
                .bind(Json(Value::Object(data)))
                .bind(at)
                .execute(&mut *conn)
                .await?;
            }
            WriteOp::Delete { collection, id } => {
                sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
                    .bind(collection)
                    .bind(id)
                    .execute(&mut *conn)
                    .await?;
            }
        }
        Ok(())
    }
}

fn into_document(value: Value) -> Result<Document, StoreError> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(StoreError::NotAnObject(other.to_string())),
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let row = sqlx::query("SELECT data FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let Json(value): Json<Value> = row.try_get("data")?;
                Ok(Some(into_document(value)?))
            }
            None => Ok(None),
        }
    }

    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        validate_query(query)?;

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT data FROM documents WHERE collection = ");
        builder.push_bind(collection.to_string());

        for (field, value) in &query.filters {
            builder
                .push(" AND data -> ")
                .push_bind(field.clone())
                .push(" = ")
                .push_bind(Json(value.clone()));
        }

        match &query.order_by {
            Some(order) => {
                builder.push(" ORDER BY data -> ").push_bind(order.field.clone());
                builder.push(match order.direction {
                    Direction::Ascending => " ASC NULLS FIRST",
                    Direction::Descending => " DESC NULLS LAST",
                });
                builder.push(", id ASC");
            }
            None => {
                builder.push(" ORDER BY id ASC");
            }
        }

        if let Some(limit) = query.limit {
            builder.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let Json(value): Json<Value> = row.try_get("data")?;
                into_document(value)
            })
            .collect()
    }

    async fn list(&self, collection: &str, page: &PageRequest) -> Result<Page, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, data FROM documents
            WHERE collection = $1 AND ($2::text IS NULL OR id > $2)
            ORDER BY id ASC
            LIMIT $3
            "#,
        )
        .bind(collection)
        .bind(page.cursor.as_deref())
        .bind((page.limit + 1) as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let Json(value): Json<Value> = row.try_get("data")?;
            documents.push((id, into_document(value)?));
        }

        Ok(Page::from_overfetch(documents, page.limit))
    }

    async fn set(&self, collection: &str, id: &str, data: Document) -> Result<WriteResult, StoreError> {
        self.commit(WriteBatch::new().set(collection, id, data)).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<WriteResult, StoreError> {
        self.commit(WriteBatch::new().delete(collection, id)).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<WriteResult, StoreError> {
        let write_time = Utc::now();
        let mut tx = self.pool.begin().await?;
        for op in batch.ops {
            Self::apply(&mut *tx, op, write_time).await?;
        }
        tx.commit().await?;
        Ok(WriteResult { write_time })
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
        info!("Closed postgres document store");
    }
}
