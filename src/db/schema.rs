//! Schema catalog loading.
//!
//! Reads every base table with its columns, key roles, comments and foreign keys
//! in a handful of bulk queries against the information schema (PRAGMA calls on
//! SQLite). The raw rows are assembled into `TableSchema` values by `assemble`.

use crate::db::pool::DbPool;
use crate::error::AgentResult;
use crate::models::{ColumnInfo, TableSchema};
use std::collections::BTreeMap;
use tracing::debug;

/// One foreign key edge as read from the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyRow {
    pub table: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
}

/// Schema inspector for database introspection.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Load every base table of the connected database.
    ///
    /// `database` selects the MySQL schema; `None` uses the connection's default.
    pub async fn load_tables(pool: &DbPool, database: Option<&str>) -> AgentResult<Vec<TableSchema>> {
        let tables = match pool {
            DbPool::Postgres(p) => postgres::load_tables(p).await?,
            DbPool::MySql(p) => mysql::load_tables(p, database).await?,
            DbPool::SQLite(p) => sqlite::load_tables(p).await?,
        };
        debug!(count = tables.len(), "Loaded table schemas");
        Ok(tables)
    }
}

/// Build table schemas from raw introspection rows.
///
/// Columns must arrive in ordinal order per table. Columns or foreign keys that
/// name an unlisted table are ignored.
pub fn assemble(
    tables: Vec<(String, Option<String>)>,
    columns: Vec<(String, ColumnInfo)>,
    foreign_keys: Vec<ForeignKeyRow>,
) -> Vec<TableSchema> {
    let mut by_name: BTreeMap<String, TableSchema> = tables
        .into_iter()
        .map(|(name, comment)| {
            let mut table = TableSchema::new(&name);
            if let Some(c) = comment.filter(|c| !c.trim().is_empty()) {
                table = table.with_comment(c);
            }
            (name, table)
        })
        .collect();

    for (table_name, column) in columns {
        if let Some(table) = by_name.get_mut(&table_name) {
            table.columns.push(column);
        }
    }

    for fk in foreign_keys {
        let Some(table) = by_name.get_mut(&fk.table) else {
            continue;
        };
        if let Some(idx) = table.columns.iter().position(|c| c.name == fk.column) {
            let column = table.columns[idx].clone();
            table.columns[idx] = column.with_reference(fk.ref_table, fk.ref_column);
        }
    }

    by_name.into_values().collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

mod queries {
    pub mod postgres {
        pub const TABLES: &str = r#"
            SELECT
                t.table_name,
                obj_description((quote_ident(t.table_schema) || '.' || quote_ident(t.table_name))::regclass) AS table_comment
            FROM information_schema.tables t
            WHERE t.table_schema = 'public'
            AND t.table_type = 'BASE TABLE'
            ORDER BY t.table_name
            "#;

        pub const COLUMNS: &str = r#"
            SELECT
                c.table_name,
                c.column_name,
                format_type(a.atttypid, a.atttypmod) AS column_type,
                c.is_nullable,
                c.column_default,
                EXISTS (
                    SELECT 1
                    FROM information_schema.table_constraints tc
                    JOIN information_schema.key_column_usage kcu
                        ON tc.constraint_name = kcu.constraint_name
                        AND tc.table_schema = kcu.table_schema
                    WHERE tc.table_schema = c.table_schema
                    AND tc.table_name = c.table_name
                    AND kcu.column_name = c.column_name
                    AND tc.constraint_type = 'PRIMARY KEY'
                ) AS is_primary_key,
                col_description(t.oid, a.attnum) AS column_comment
            FROM information_schema.columns c
            JOIN pg_class t ON t.relname = c.table_name
            JOIN pg_namespace n ON n.oid = t.relnamespace AND n.nspname = c.table_schema
            JOIN pg_attribute a ON a.attrelid = t.oid AND a.attname = c.column_name
            WHERE c.table_schema = 'public'
            ORDER BY c.table_name, c.ordinal_position
            "#;

        pub const FOREIGN_KEYS: &str = r#"
            SELECT
                tc.table_name,
                kcu.column_name,
                ccu.table_name AS foreign_table_name,
                ccu.column_name AS foreign_column_name
            FROM information_schema.table_constraints tc
            JOIN information_schema.key_column_usage kcu
                ON tc.constraint_name = kcu.constraint_name
                AND tc.table_schema = kcu.table_schema
            JOIN information_schema.constraint_column_usage ccu
                ON ccu.constraint_name = tc.constraint_name
                AND ccu.table_schema = tc.table_schema
            WHERE tc.table_schema = 'public'
            AND tc.constraint_type = 'FOREIGN KEY'
            "#;
    }

    pub mod mysql {
        pub const TABLES: &str = r#"
            SELECT
                CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME,
                CONVERT(TABLE_COMMENT USING utf8) AS TABLE_COMMENT
            FROM information_schema.TABLES
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
            AND TABLE_TYPE = 'BASE TABLE'
            ORDER BY TABLE_NAME
            "#;

        pub const COLUMNS: &str = r#"
            SELECT
                CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME,
                CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
                CONVERT(COLUMN_TYPE USING utf8) AS COLUMN_TYPE,
                CONVERT(IS_NULLABLE USING utf8) AS IS_NULLABLE,
                CONVERT(COLUMN_DEFAULT USING utf8) AS COLUMN_DEFAULT,
                CONVERT(COLUMN_KEY USING utf8) AS COLUMN_KEY,
                CONVERT(COLUMN_COMMENT USING utf8) AS COLUMN_COMMENT
            FROM information_schema.COLUMNS
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
            ORDER BY TABLE_NAME, ORDINAL_POSITION
            "#;

        pub const FOREIGN_KEYS: &str = r#"
            SELECT
                CONVERT(TABLE_NAME USING utf8) AS TABLE_NAME,
                CONVERT(COLUMN_NAME USING utf8) AS COLUMN_NAME,
                CONVERT(REFERENCED_TABLE_NAME USING utf8) AS REFERENCED_TABLE_NAME,
                CONVERT(REFERENCED_COLUMN_NAME USING utf8) AS REFERENCED_COLUMN_NAME
            FROM information_schema.KEY_COLUMN_USAGE
            WHERE TABLE_SCHEMA = COALESCE(?, DATABASE())
            AND REFERENCED_TABLE_NAME IS NOT NULL
            "#;
    }

    pub mod sqlite {
        pub const TABLES: &str = r#"
            SELECT name FROM sqlite_master
            WHERE type = 'table'
            AND name NOT LIKE 'sqlite_%'
            ORDER BY name
            "#;
    }
}

mod postgres {
    use super::*;
    use sqlx::{PgPool, Row};

    pub async fn load_tables(pool: &PgPool) -> AgentResult<Vec<TableSchema>> {
        let table_rows = sqlx::query(queries::postgres::TABLES)
            .fetch_all(pool)
            .await?;
        let tables = table_rows
            .iter()
            .map(|row| {
                let name: String = row.get("table_name");
                let comment: Option<String> = row.try_get("table_comment").ok().flatten();
                (name, comment)
            })
            .collect();

        let column_rows = sqlx::query(queries::postgres::COLUMNS)
            .fetch_all(pool)
            .await?;
        let columns = column_rows
            .iter()
            .map(|row| {
                let table: String = row.get("table_name");
                let name: String = row.get("column_name");
                let column_type: String = row.get("column_type");
                let nullable: String = row.get("is_nullable");
                let is_pk: bool = row.try_get("is_primary_key").unwrap_or(false);

                let mut col =
                    ColumnInfo::new(name, column_type, nullable == "YES").with_primary_key(is_pk);
                if let Some(def) = row.try_get::<Option<String>, _>("column_default").ok().flatten() {
                    col = col.with_default(def);
                }
                if let Some(c) = non_empty(row.try_get("column_comment").ok().flatten()) {
                    col = col.with_comment(c);
                }
                (table, col)
            })
            .collect();

        let fk_rows = sqlx::query(queries::postgres::FOREIGN_KEYS)
            .fetch_all(pool)
            .await?;
        let foreign_keys = fk_rows
            .iter()
            .map(|row| ForeignKeyRow {
                table: row.get("table_name"),
                column: row.get("column_name"),
                ref_table: row.get("foreign_table_name"),
                ref_column: row.get("foreign_column_name"),
            })
            .collect();

        Ok(assemble(tables, columns, foreign_keys))
    }
}

mod mysql {
    use super::*;
    use sqlx::mysql::MySqlRow;
    use sqlx::{MySqlPool, Row};

    /// MySQL may return VARBINARY instead of VARCHAR depending on charset configuration.
    fn get_optional_string(row: &MySqlRow, column: &str) -> Option<String> {
        row.try_get::<Option<String>, _>(column)
            .ok()
            .flatten()
            .or_else(|| {
                row.try_get::<Option<Vec<u8>>, _>(column)
                    .ok()
                    .flatten()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
            })
    }

    fn get_string(row: &MySqlRow, column: &str) -> String {
        get_optional_string(row, column).unwrap_or_default()
    }

    pub async fn load_tables(pool: &MySqlPool, database: Option<&str>) -> AgentResult<Vec<TableSchema>> {
        let table_rows = sqlx::query(queries::mysql::TABLES)
            .bind(database)
            .fetch_all(pool)
            .await?;
        let tables = table_rows
            .iter()
            .map(|row| {
                (
                    get_string(row, "TABLE_NAME"),
                    non_empty(get_optional_string(row, "TABLE_COMMENT")),
                )
            })
            .filter(|(name, _)| !name.is_empty())
            .collect();

        let column_rows = sqlx::query(queries::mysql::COLUMNS)
            .bind(database)
            .fetch_all(pool)
            .await?;
        let columns = column_rows
            .iter()
            .map(|row| {
                let is_pk = get_string(row, "COLUMN_KEY") == "PRI";
                let mut col = ColumnInfo::new(
                    get_string(row, "COLUMN_NAME"),
                    get_string(row, "COLUMN_TYPE"),
                    get_string(row, "IS_NULLABLE") == "YES",
                )
                .with_primary_key(is_pk);
                if let Some(def) = get_optional_string(row, "COLUMN_DEFAULT") {
                    col = col.with_default(def);
                }
                if let Some(c) = non_empty(get_optional_string(row, "COLUMN_COMMENT")) {
                    col = col.with_comment(c);
                }
                (get_string(row, "TABLE_NAME"), col)
            })
            .collect();

        let fk_rows = sqlx::query(queries::mysql::FOREIGN_KEYS)
            .bind(database)
            .fetch_all(pool)
            .await?;
        let foreign_keys = fk_rows
            .iter()
            .map(|row| ForeignKeyRow {
                table: get_string(row, "TABLE_NAME"),
                column: get_string(row, "COLUMN_NAME"),
                ref_table: get_string(row, "REFERENCED_TABLE_NAME"),
                ref_column: get_string(row, "REFERENCED_COLUMN_NAME"),
            })
            .collect();

        Ok(assemble(tables, columns, foreign_keys))
    }
}

mod sqlite {
    use super::*;
    use sqlx::{Row, SqlitePool};

    pub async fn load_tables(pool: &SqlitePool) -> AgentResult<Vec<TableSchema>> {
        let names: Vec<String> = sqlx::query(queries::sqlite::TABLES)
            .fetch_all(pool)
            .await?
            .iter()
            .map(|row| row.get("name"))
            .collect();

        let mut columns = Vec::new();
        let mut foreign_keys = Vec::new();
        for name in &names {
            let escaped = name.replace('\'', "''");

            let pragma_query = format!("PRAGMA table_info('{}')", escaped);
            for row in sqlx::query(&pragma_query).fetch_all(pool).await? {
                let notnull: i32 = row.get("notnull");
                let pk: i32 = row.get("pk");
                let mut col = ColumnInfo::new(
                    row.get::<String, _>("name"),
                    row.get::<String, _>("type"),
                    notnull == 0,
                )
                .with_primary_key(pk > 0);
                if let Some(def) = row.try_get::<Option<String>, _>("dflt_value").ok().flatten() {
                    col = col.with_default(def);
                }
                columns.push((name.clone(), col));
            }

            let fk_query = format!("PRAGMA foreign_key_list('{}')", escaped);
            for row in sqlx::query(&fk_query).fetch_all(pool).await? {
                foreign_keys.push(ForeignKeyRow {
                    table: name.clone(),
                    column: row.get("from"),
                    ref_table: row.get("table"),
                    // NULL when the key targets the parent's primary key implicitly
                    ref_column: row
                        .try_get::<Option<String>, _>("to")
                        .ok()
                        .flatten()
                        .unwrap_or_else(|| "id".to_string()),
                });
            }
        }

        let tables = names.into_iter().map(|n| (n, None)).collect();
        Ok(assemble(tables, columns, foreign_keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KeyRole;

    #[test]
    fn test_assemble_groups_columns_and_references() {
        let tables = vec![
            ("projects".to_string(), Some("".to_string())),
            ("company".to_string(), Some("Client organisations".to_string())),
        ];
        let columns = vec![
            (
                "company".to_string(),
                ColumnInfo::new("id", "int", false).with_primary_key(true),
            ),
            (
                "projects".to_string(),
                ColumnInfo::new("id", "int", false).with_primary_key(true),
            ),
            (
                "projects".to_string(),
                ColumnInfo::new("company_id", "int", true),
            ),
            ("orphan".to_string(), ColumnInfo::new("x", "int", true)),
        ];
        let fks = vec![ForeignKeyRow {
            table: "projects".to_string(),
            column: "company_id".to_string(),
            ref_table: "company".to_string(),
            ref_column: "id".to_string(),
        }];

        let schemas = assemble(tables, columns, fks);
        assert_eq!(schemas.len(), 2);
        assert_eq!(schemas[0].table_name, "company");
        assert_eq!(schemas[0].comment.as_deref(), Some("Client organisations"));
        assert!(schemas[1].comment.is_none());

        let fk_col = &schemas[1].columns[1];
        assert_eq!(fk_col.key, KeyRole::Foreign);
        assert_eq!(fk_col.references.as_ref().unwrap().table, "company");
    }
}
