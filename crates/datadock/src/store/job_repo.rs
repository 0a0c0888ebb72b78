//! Persistence for job snapshots. Rows keep nested values (schema,
//! candidates, decision, approval, history) as JSON strings; the registry
//! owns the conversion to and from domain types.

use rusqlite::types::ToSql;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, StoreError};

#[derive(Debug, Clone, Default)]
pub struct JobRow {
    pub id: String,
    pub file_name: String,
    pub source_path: String,
    pub status: String,
    pub message: Option<String>,
    pub error: Option<String>,
    pub inferred_schema: Option<String>,
    pub candidates: Option<String>,
    pub decision: Option<String>,
    pub approval: Option<String>,
    pub history: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            file_name: row.get("file_name")?,
            source_path: row.get("source_path")?,
            status: row.get("status")?,
            message: row.get("message")?,
            error: row.get("error")?,
            inferred_schema: row.get("inferred_schema")?,
            candidates: row.get("candidates")?,
            decision: row.get("decision")?,
            approval: row.get("approval")?,
            history: row.get("history")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Filter for [`query`]. All fields are optional and AND-ed together.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Inserts or fully replaces the snapshot for `row.id`.
pub fn upsert(db: &Database, row: &JobRow) -> Result<(), StoreError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT OR REPLACE INTO jobs (
                id, file_name, source_path, status, message, error,
                inferred_schema, candidates, decision, approval, history,
                created_at, updated_at, completed_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                row.id,
                row.file_name,
                row.source_path,
                row.status,
                row.message,
                row.error,
                row.inferred_schema,
                row.candidates,
                row.decision,
                row.approval,
                row.history,
                row.created_at,
                row.updated_at,
                row.completed_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, StoreError> {
    db.with_conn(|conn| {
        conn.query_row("SELECT * FROM jobs WHERE id = ?1", [id], JobRow::from_row)
            .optional()
            .map_err(StoreError::from)
    })
}

/// Jobs matching `filter`, newest first.
pub fn query(db: &Database, filter: &JobFilter) -> Result<Vec<JobRow>, StoreError> {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(status) = &filter.status {
        params.push(Box::new(status.clone()));
        conditions.push(format!("status = ?{}", params.len()));
    }

    let mut sql = String::from("SELECT * FROM jobs");
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
        if let Some(offset) = filter.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    db.with_conn(|conn| {
        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let rows = stmt.query_map(param_refs.as_slice(), JobRow::from_row)?;
        let mut jobs = Vec::new();
        for row in rows {
            jobs.push(row?);
        }
        Ok(jobs)
    })
}

pub fn count(db: &Database) -> Result<i64, StoreError> {
    db.with_conn(|conn| {
        conn.query_row("SELECT COUNT(*) FROM jobs", [], |row| row.get(0))
            .map_err(StoreError::from)
    })
}

/// Number of jobs in each status, for the counts endpoint.
pub fn count_by_status(db: &Database) -> Result<Vec<(String, i64)>, StoreError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut counts = Vec::new();
        for row in rows {
            counts.push(row?);
        }
        Ok(counts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sample_row(id: &str, status: &str, created_at: &str) -> JobRow {
        JobRow {
            id: id.to_string(),
            file_name: format!("{id}.csv"),
            source_path: format!("/in/{id}.csv"),
            status: status.to_string(),
            created_at: created_at.to_string(),
            updated_at: created_at.to_string(),
            ..JobRow::default()
        }
    }

    #[test]
    fn test_upsert_then_find() {
        let db = test_db();
        upsert(&db, &sample_row("j1", "created", "2024-01-01T00:00:00Z")).unwrap();

        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found.file_name, "j1.csv");
        assert_eq!(found.status, "created");
        assert!(found.decision.is_none());
    }

    #[test]
    fn test_upsert_replaces_existing_snapshot() {
        let db = test_db();
        upsert(&db, &sample_row("j1", "created", "2024-01-01T00:00:00Z")).unwrap();

        let mut updated = sample_row("j1", "awaiting_approval", "2024-01-01T00:00:00Z");
        updated.decision = Some("{\"loadType\":\"one_time_load\"}".to_string());
        upsert(&db, &updated).unwrap();

        let found = find_by_id(&db, "j1").unwrap().unwrap();
        assert_eq!(found.status, "awaiting_approval");
        assert!(found.decision.is_some());
        assert_eq!(count(&db).unwrap(), 1);
    }

    #[test]
    fn test_query_newest_first_with_filter_and_limit() {
        let db = test_db();
        upsert(&db, &sample_row("j1", "completed", "2024-01-01T00:00:00Z")).unwrap();
        upsert(&db, &sample_row("j2", "completed", "2024-01-02T00:00:00Z")).unwrap();
        upsert(&db, &sample_row("j3", "failed", "2024-01-03T00:00:00Z")).unwrap();

        let all = query(&db, &JobFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id, "j3");

        let completed = query(
            &db,
            &JobFilter {
                status: Some("completed".to_string()),
                ..JobFilter::default()
            },
        )
        .unwrap();
        assert_eq!(completed.len(), 2);
        assert_eq!(completed[0].id, "j2");

        let page = query(
            &db,
            &JobFilter {
                limit: Some(1),
                offset: Some(1),
                ..JobFilter::default()
            },
        )
        .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, "j2");
    }

    #[test]
    fn test_count_by_status_groups() {
        let db = test_db();
        upsert(&db, &sample_row("j1", "completed", "2024-01-01T00:00:00Z")).unwrap();
        upsert(&db, &sample_row("j2", "completed", "2024-01-02T00:00:00Z")).unwrap();
        upsert(&db, &sample_row("j3", "failed", "2024-01-03T00:00:00Z")).unwrap();

        let counts = count_by_status(&db).unwrap();
        assert_eq!(
            counts,
            vec![
                ("completed".to_string(), 2),
                ("failed".to_string(), 1)
            ]
        );
    }
}
