//! Dataset metadata: one row per managed table, tracking its column
//! schema, period column and last loaded period.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use super::{Database, StoreError};
use crate::schema::ColumnSchema;

/// A table managed by the engine, as recorded in the `datasets` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDataset {
    pub id: String,
    pub table_name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period_column: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_period_value: Option<String>,
    pub row_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TargetDataset {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let columns_json: String = row.get("columns")?;
        let columns = serde_json::from_str(&columns_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok(Self {
            id: row.get("id")?,
            table_name: row.get("table_name")?,
            columns,
            period_column: row.get("period_column")?,
            last_period_value: row.get("last_period_value")?,
            row_count: row.get::<_, i64>("row_count")?.max(0) as u64,
            created_at: parse_timestamp(row, "created_at")?,
            updated_at: parse_timestamp(row, "updated_at")?,
        })
    }

    /// Canonical column names in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

fn parse_timestamp(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub fn insert(db: &Database, dataset: &TargetDataset) -> Result<(), StoreError> {
    let columns_json = serde_json::to_string(&dataset.columns)?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO datasets (id, table_name, columns, period_column, last_period_value, row_count, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                dataset.id,
                dataset.table_name,
                columns_json,
                dataset.period_column,
                dataset.last_period_value,
                dataset.row_count as i64,
                dataset.created_at.to_rfc3339(),
                dataset.updated_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    })
}

/// Updates the load bookkeeping after rows were appended.
pub fn update_load_state(
    db: &Database,
    id: &str,
    row_count: u64,
    last_period_value: Option<&str>,
) -> Result<(), StoreError> {
    let changed = db.with_conn(|conn| {
        conn.execute(
            "UPDATE datasets SET row_count = ?2, last_period_value = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                id,
                row_count as i64,
                last_period_value,
                Utc::now().to_rfc3339()
            ],
        )
        .map_err(StoreError::from)
    })?;
    if changed == 0 {
        return Err(StoreError::DatasetNotFound(id.to_string()));
    }
    Ok(())
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<TargetDataset>, StoreError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM datasets WHERE id = ?1",
            [id],
            TargetDataset::from_row,
        )
        .optional()
        .map_err(StoreError::from)
    })
}

pub fn find_by_table_name(db: &Database, name: &str) -> Result<Option<TargetDataset>, StoreError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT * FROM datasets WHERE table_name = ?1",
            [name],
            TargetDataset::from_row,
        )
        .optional()
        .map_err(StoreError::from)
    })
}

/// All datasets, oldest first. Used to rebuild the similarity index on
/// startup.
pub fn list_all(db: &Database) -> Result<Vec<TargetDataset>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM datasets ORDER BY created_at ASC")?;
        let rows = stmt.query_map([], TargetDataset::from_row)?;
        let mut datasets = Vec::new();
        for row in rows {
            datasets.push(row?);
        }
        Ok(datasets)
    })
}

pub fn count(db: &Database) -> Result<i64, StoreError> {
    db.with_conn(|conn| {
        conn.query_row("SELECT COUNT(*) FROM datasets", [], |row| row.get(0))
            .map_err(StoreError::from)
    })
}
