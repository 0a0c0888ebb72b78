//! Data tables created and appended to at commit time. Table and column
//! names are validated before interpolation since DDL cannot use bound
//! parameters.

use rusqlite::params_from_iter;

use super::{Database, StoreError};
use crate::schema::ColumnSchema;

/// Names of internal tables that data tables must not shadow.
const RESERVED_TABLES: &[&str] = &["jobs", "datasets", "_migrations"];

pub const MAX_IDENTIFIER_LEN: usize = 64;

/// Checks that `name` is usable as a data-table identifier: canonical
/// characters only, within length, and not shadowing an internal table.
pub fn validate_table_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name.len() > MAX_IDENTIFIER_LEN
        || !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(StoreError::InvalidTableName(name.to_string()));
    }
    if RESERVED_TABLES.contains(&name) || name.starts_with("sqlite_") {
        return Err(StoreError::InvalidTableName(name.to_string()));
    }
    Ok(())
}

pub fn table_exists(db: &Database, name: &str) -> Result<bool, StoreError> {
    db.with_conn(|conn| {
        conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
            [name],
            |row| row.get(0),
        )
        .map_err(StoreError::from)
    })
}

/// Creates a data table with one TEXT/INTEGER/REAL column per schema entry.
pub fn create_table(db: &Database, name: &str, columns: &[ColumnSchema]) -> Result<(), StoreError> {
    validate_table_name(name)?;
    if columns.is_empty() {
        return Err(StoreError::InvalidTableName(format!(
            "{name} (no columns)"
        )));
    }
    for column in columns {
        validate_column_name(&column.name)?;
    }
    if table_exists(db, name)? {
        return Err(StoreError::TableExists(name.to_string()));
    }

    let column_defs: Vec<String> = columns
        .iter()
        .map(|c| format!("\"{}\" {}", c.name, c.data_type.sql_type()))
        .collect();
    let sql = format!("CREATE TABLE \"{}\" ({})", name, column_defs.join(", "));
    db.with_conn(|conn| {
        conn.execute(&sql, [])?;
        Ok(())
    })
}

/// Appends `rows` in `column_names` order inside a single transaction.
/// Rows shorter than the column list are right-padded with NULL; empty
/// cells are stored as NULL. Returns the number of rows inserted.
pub fn insert_rows(
    db: &Database,
    name: &str,
    column_names: &[String],
    rows: &[Vec<String>],
) -> Result<u64, StoreError> {
    validate_table_name(name)?;
    for column in column_names {
        validate_column_name(column)?;
    }
    if rows.is_empty() {
        return Ok(0);
    }

    let quoted: Vec<String> = column_names.iter().map(|c| format!("\"{c}\"")).collect();
    let placeholders: Vec<String> = (1..=column_names.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO \"{}\" ({}) VALUES ({})",
        name,
        quoted.join(", "),
        placeholders.join(", ")
    );

    db.with_conn(|conn| {
        let tx = conn.unchecked_transaction()?;
        let mut inserted = 0u64;
        {
            let mut stmt = tx.prepare(&sql)?;
            for row in rows {
                let values = (0..column_names.len()).map(|i| {
                    row.get(i)
                        .map(|v| v.as_str())
                        .filter(|v| !v.is_empty())
                });
                stmt.execute(params_from_iter(values))?;
                inserted += 1;
            }
        }
        tx.commit()?;
        Ok(inserted)
    })
}

pub fn row_count(db: &Database, name: &str) -> Result<u64, StoreError> {
    validate_table_name(name)?;
    db.with_conn(|conn| {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM \"{name}\""),
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    })
}

fn validate_column_name(name: &str) -> Result<(), StoreError> {
    if name.is_empty()
        || name.len() > MAX_IDENTIFIER_LEN
        || !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(StoreError::InvalidTableName(format!("column {name}")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn test_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn sales_columns() -> Vec<ColumnSchema> {
        vec![
            ColumnSchema::new("month", ColumnType::Date),
            ColumnSchema::new("region", ColumnType::Text),
            ColumnSchema::new("amount", ColumnType::Float),
        ]
    }

    #[test]
    fn test_create_insert_and_count() {
        let db = test_db();
        create_table(&db, "sales", &sales_columns()).unwrap();
        assert!(table_exists(&db, "sales").unwrap());

        let columns: Vec<String> = sales_columns().iter().map(|c| c.name.clone()).collect();
        let rows = vec![
            vec!["2024-01".into(), "north".into(), "10.5".into()],
            vec!["2024-02".into(), "south".into(), "11.0".into()],
        ];
        let inserted = insert_rows(&db, "sales", &columns, &rows).unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(row_count(&db, "sales").unwrap(), 2);
    }

    #[test]
    fn test_short_rows_are_padded_and_empty_cells_are_null() {
        let db = test_db();
        create_table(&db, "sales", &sales_columns()).unwrap();
        let columns: Vec<String> = sales_columns().iter().map(|c| c.name.clone()).collect();
        let rows = vec![vec!["2024-01".into(), "".into()]];
        insert_rows(&db, "sales", &columns, &rows).unwrap();

        let (region, amount): (Option<String>, Option<f64>) = db
            .with_conn(|conn| {
                conn.query_row("SELECT region, amount FROM sales", [], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })
                .map_err(StoreError::from)
            })
            .unwrap();
        assert_eq!(region, None);
        assert_eq!(amount, None);
    }

    #[test]
    fn test_create_existing_table_errors() {
        let db = test_db();
        create_table(&db, "sales", &sales_columns()).unwrap();
        let err = create_table(&db, "sales", &sales_columns()).unwrap_err();
        assert!(matches!(err, StoreError::TableExists(_)));
    }

    #[test]
    fn test_reserved_and_hostile_names_are_rejected() {
        assert!(validate_table_name("jobs").is_err());
        assert!(validate_table_name("_migrations").is_err());
        assert!(validate_table_name("sqlite_master").is_err());
        assert!(validate_table_name("sales; DROP TABLE jobs").is_err());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("Sales").is_err());
        assert!(validate_table_name("sales_2024").is_ok());
        assert!(validate_table_name("2024_sales").is_ok());
    }

    #[test]
    fn test_insert_into_missing_table_errors() {
        let db = test_db();
        let err = insert_rows(
            &db,
            "ghost",
            &["a".to_string()],
            &[vec!["1".to_string()]],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
