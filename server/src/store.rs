//! Persistence for the local bus stop catalog.
//!
//! Functions take any sqlx executor so the same queries serve both plain pool
//! access from the HTTP handlers and the sync transaction. `ars_id` carries a
//! unique index; violations surface as [`StoreError::DuplicateExternalCode`].

use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqliteConnection};
use utoipa::ToSchema;

/// Rows per INSERT statement, keeping bound parameters well below SQLite's limit
const MAX_ROWS_PER_INSERT: usize = 500;

/// Stop code the upstream uses for virtual, non-physical stops
pub const SENTINEL_ARS_ID: &str = "0";

/// A stored bus stop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Stop {
    pub id: i64,
    /// Upstream `stId`
    pub station_id: String,
    /// Upstream `stNm`
    pub station_name: String,
    /// Upstream `arsId`, unique
    pub ars_id: String,
    #[serde(rename = "adirection", skip_serializing_if = "Option::is_none")]
    #[sqlx(rename = "adirection")]
    pub direction: Option<String>,
}

/// A stop that has not been stored yet
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewStop {
    #[serde(default)]
    pub station_id: String,
    #[serde(default)]
    pub station_name: String,
    pub ars_id: String,
    #[serde(default, rename = "adirection")]
    pub direction: Option<String>,
}

/// True for codes that never denote a physical stop
pub fn is_sentinel_code(ars_id: &str) -> bool {
    let code = ars_id.trim();
    code.is_empty() || code == SENTINEL_ARS_ID
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("a stop with this arsId already exists")]
    DuplicateExternalCode,
    #[error("arsId must not be empty or \"0\"")]
    SentinelCode,
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateExternalCode,
            _ => StoreError::Database(err),
        }
    }
}

pub async fn insert<'e, E>(executor: E, stop: &NewStop) -> Result<Stop, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if is_sentinel_code(&stop.ars_id) {
        return Err(StoreError::SentinelCode);
    }

    let stored = sqlx::query_as(
        r#"
        INSERT INTO bus_stop (station_id, station_name, ars_id, adirection)
        VALUES (?, ?, ?, ?)
        RETURNING id, station_id, station_name, ars_id, adirection
        "#,
    )
    .bind(&stop.station_id)
    .bind(&stop.station_name)
    .bind(stop.ars_id.trim())
    .bind(&stop.direction)
    .fetch_one(executor)
    .await?;

    Ok(stored)
}

/// Insert all `stops` with multi-row INSERTs; returns the number of rows written.
///
/// Atomic only within the caller's transaction: a unique violation anywhere in
/// the batch fails the call and the caller is expected to roll back.
pub async fn insert_batch(conn: &mut SqliteConnection, stops: &[NewStop]) -> Result<u64, StoreError> {
    let mut inserted = 0;

    for chunk in stops.chunks(MAX_ROWS_PER_INSERT) {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new("INSERT INTO bus_stop (station_id, station_name, ars_id, adirection) ");
        builder.push_values(chunk, |mut row, stop| {
            row.push_bind(stop.station_id.as_str())
                .push_bind(stop.station_name.as_str())
                .push_bind(stop.ars_id.as_str())
                .push_bind(stop.direction.as_deref());
        });

        let result = builder.build().execute(&mut *conn).await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

pub async fn find_by_external_code<'e, E>(executor: E, ars_id: &str) -> Result<Option<Stop>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let stop = sqlx::query_as(
        "SELECT id, station_id, station_name, ars_id, adirection FROM bus_stop WHERE ars_id = ?",
    )
    .bind(ars_id)
    .fetch_optional(executor)
    .await?;

    Ok(stop)
}

/// Stops whose name contains `keyword` (case-sensitive), in insertion order.
///
/// A blank keyword matches nothing and does not touch the database.
pub async fn search_by_name<'e, E>(executor: E, keyword: &str) -> Result<Vec<Stop>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    if keyword.trim().is_empty() {
        return Ok(Vec::new());
    }

    let stops = sqlx::query_as(
        r#"
        SELECT id, station_id, station_name, ars_id, adirection
        FROM bus_stop
        WHERE instr(station_name, ?) > 0
        ORDER BY id
        "#,
    )
    .bind(keyword)
    .fetch_all(executor)
    .await?;

    Ok(stops)
}

/// Idempotent: deleting an unknown id succeeds.
pub async fn delete_by_id<'e, E>(executor: E, id: i64) -> Result<(), StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query("DELETE FROM bus_stop WHERE id = ?")
        .bind(id)
        .execute(executor)
        .await?;

    Ok(())
}

/// Every stored stop; unpaginated, so large catalogs produce large responses.
pub async fn list_all<'e, E>(executor: E) -> Result<Vec<Stop>, StoreError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let stops = sqlx::query_as(
        "SELECT id, station_id, station_name, ars_id, adirection FROM bus_stop ORDER BY id",
    )
    .fetch_all(executor)
    .await?;

    Ok(stops)
}
