use anyhow::{bail, Result};
use rusqlite::{params, types::Type, Connection, OptionalExtension};

pub const DEFAULT_TIMESTAMP: &str = "(cast(strftime('%s','now') as int))";

/// Offset added to every schema version before it is written to
/// `PRAGMA user_version`, so a database created by something else (version 0)
/// is never mistaken for one of ours.
pub const BASE_DB_VERSION: usize = 42000;

#[macro_export]
macro_rules! sqlite_column {
    ($name:expr, $sql_type:expr $(, $field:ident = $value:expr)*) => {
        {
            #[allow(unused_mut)]
            let mut column = $crate::sqlite_persistence::Column {
                name: $name,
                sql_type: $sql_type,
                is_primary_key: false,
                non_null: false,
                default_value: None,
            };
            $(
                column.$field = $value;
            )*
            column
        }
    };
}

#[derive(Debug, PartialEq, Eq)]
pub enum SqlType {
    Text,
    Integer,
    Blob,
}

impl SqlType {
    fn as_sql(&self) -> &'static str {
        match self {
            SqlType::Text => "TEXT",
            SqlType::Integer => "INTEGER",
            SqlType::Blob => "BLOB",
        }
    }

    fn from_sql(s: &str) -> Option<&'static SqlType> {
        match s {
            "TEXT" => Some(&SqlType::Text),
            "INTEGER" => Some(&SqlType::Integer),
            "BLOB" => Some(&SqlType::Blob),
            _ => None,
        }
    }
}

pub struct Column<'a, S: AsRef<str>> {
    pub name: S,
    pub sql_type: &'a SqlType,
    pub is_primary_key: bool,
    pub non_null: bool,
    pub default_value: Option<S>,
}

pub struct Table {
    pub name: &'static str,
    pub columns: &'static [Column<'static, &'static str>],
    pub indices: &'static [(&'static str, &'static str)],
}

impl Table {
    fn create_sql(&self) -> String {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let mut sql = format!("{} {}", column.name, column.sql_type.as_sql());
                if column.is_primary_key {
                    sql.push_str(" PRIMARY KEY");
                }
                if column.non_null {
                    sql.push_str(" NOT NULL");
                }
                if let Some(default_value) = column.default_value {
                    sql.push_str(&format!(" DEFAULT {}", default_value));
                }
                sql
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("CREATE TABLE {} ({});", self.name, columns)
    }

    pub fn create(&self, conn: &Connection) -> Result<()> {
        conn.execute(&self.create_sql(), params![])?;
        for (index_name, column_name) in self.indices {
            conn.execute(
                &format!(
                    "CREATE INDEX {} ON {}({});",
                    index_name, self.name, column_name
                ),
                params![],
            )?;
        }
        Ok(())
    }

    fn validate(&self, conn: &Connection) -> Result<()> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", self.name))?;
        let actual_columns = stmt
            .query_map(params![], |row| {
                let type_name: String = row.get(2)?;
                let sql_type = SqlType::from_sql(&type_name).ok_or_else(|| {
                    rusqlite::Error::InvalidColumnType(2, type_name.clone(), Type::Text)
                })?;
                Ok(Column {
                    name: row.get::<_, String>(1)?,
                    sql_type,
                    non_null: row.get::<_, i32>(3)? == 1,
                    default_value: row.get::<_, Option<String>>(4)?,
                    is_primary_key: row.get::<_, i32>(5)? == 1,
                })
            })?
            .collect::<Result<Vec<Column<'_, String>>, _>>()?;

        if actual_columns.is_empty() {
            bail!("Table {} does not exist", self.name);
        }
        if actual_columns.len() != self.columns.len() {
            bail!(
                "Table {} has {} columns, expected {}",
                self.name,
                actual_columns.len(),
                self.columns.len()
            );
        }

        for (actual, expected) in actual_columns.iter().zip(self.columns.iter()) {
            if actual.name != expected.name {
                bail!(
                    "Table {} column name mismatch: expected {}, got {}",
                    self.name,
                    expected.name,
                    actual.name
                );
            }
            if actual.sql_type != expected.sql_type
                || actual.non_null != expected.non_null
                || actual.is_primary_key != expected.is_primary_key
            {
                bail!(
                    "Table {} column {} does not match its declaration ({:?}, non_null={}, pk={})",
                    self.name,
                    expected.name,
                    expected.sql_type,
                    expected.non_null,
                    expected.is_primary_key
                );
            }
        }

        for (index_name, _) in self.indices {
            let index_exists = conn
                .query_row(
                    "SELECT 1 FROM sqlite_master WHERE type='index' AND name=?1 AND tbl_name=?2",
                    params![index_name, self.name],
                    |_| Ok(()),
                )
                .optional()?
                .is_some();
            if !index_exists {
                bail!("Table {} is missing index '{}'", self.name, index_name);
            }
        }
        Ok(())
    }
}

pub struct VersionedSchema {
    pub version: usize,
    pub tables: &'static [Table],
    pub migration: Option<fn(&Connection) -> Result<()>>,
}

impl VersionedSchema {
    pub fn create(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.create(conn)?;
        }
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + self.version),
            [],
        )?;
        Ok(())
    }

    pub fn validate(&self, conn: &Connection) -> Result<()> {
        for table in self.tables {
            table.validate(conn)?;
        }
        Ok(())
    }

    /// Brings `conn` to the last schema in `schemas`: creates it on an empty
    /// database, runs the pending migrations on an older one, and validates
    /// the result. Databases from an unknown or newer version are rejected.
    pub fn open_latest(conn: &mut Connection, schemas: &'static [VersionedSchema]) -> Result<()> {
        let Some(latest) = schemas.last() else {
            bail!("No schema declared");
        };

        let table_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
            [],
            |r| r.get(0),
        )?;
        if table_count == 0 {
            latest.create(conn)?;
            return Ok(());
        }

        let db_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if db_version < BASE_DB_VERSION as i64 {
            bail!(
                "Database has foreign user_version {}, refusing to touch it",
                db_version
            );
        }
        let mut current_version = (db_version - BASE_DB_VERSION as i64) as usize;
        if current_version > latest.version {
            bail!(
                "Database schema version {} is newer than the supported {}",
                current_version,
                latest.version
            );
        }

        if current_version < latest.version {
            let start_version = current_version;
            let tx = conn.transaction()?;
            for schema in schemas.iter().filter(|s| s.version > start_version) {
                if let Some(migration) = schema.migration {
                    migration(&tx)?;
                }
                current_version = schema.version;
            }
            tx.pragma_update(None, "user_version", BASE_DB_VERSION + current_version)?;
            tx.commit()?;
        }

        latest.validate(conn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES_TABLE: Table = Table {
        name: "notes",
        columns: &[
            sqlite_column!("id", &SqlType::Text, is_primary_key = true),
            sqlite_column!("body", &SqlType::Blob, non_null = true),
            sqlite_column!(
                "created",
                &SqlType::Integer,
                non_null = true,
                default_value = Some(DEFAULT_TIMESTAMP)
            ),
        ],
        indices: &[("idx_notes_created", "created")],
    };

    const NOTES_TABLE_V1: Table = Table {
        name: "notes",
        columns: &[
            sqlite_column!("id", &SqlType::Text, is_primary_key = true),
            sqlite_column!("body", &SqlType::Blob, non_null = true),
            sqlite_column!(
                "created",
                &SqlType::Integer,
                non_null = true,
                default_value = Some(DEFAULT_TIMESTAMP)
            ),
            sqlite_column!("size", &SqlType::Integer, non_null = true, default_value = Some("0")),
        ],
        indices: &[("idx_notes_created", "created")],
    };

    static SCHEMAS: &[VersionedSchema] = &[
        VersionedSchema {
            version: 0,
            tables: &[NOTES_TABLE],
            migration: None,
        },
        VersionedSchema {
            version: 1,
            tables: &[NOTES_TABLE_V1],
            migration: Some(add_size_column),
        },
    ];

    fn add_size_column(conn: &Connection) -> Result<()> {
        conn.execute(
            "ALTER TABLE notes ADD COLUMN size INTEGER NOT NULL DEFAULT 0",
            [],
        )?;
        Ok(())
    }

    fn user_version(conn: &Connection) -> i64 {
        conn.query_row("PRAGMA user_version", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn creates_latest_schema_on_empty_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        VersionedSchema::open_latest(&mut conn, SCHEMAS).unwrap();

        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 1) as i64);
        SCHEMAS[1].validate(&conn).unwrap();
    }

    #[test]
    fn migrates_older_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        SCHEMAS[0].create(&conn).unwrap();
        conn.execute("INSERT INTO notes (id, body) VALUES ('a', x'00')", [])
            .unwrap();

        VersionedSchema::open_latest(&mut conn, SCHEMAS).unwrap();

        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 1) as i64);
        let size: i64 = conn
            .query_row("SELECT size FROM notes WHERE id = 'a'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(size, 0);
    }

    #[test]
    fn rejects_foreign_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        conn.execute("CREATE TABLE something_else (x INTEGER)", [])
            .unwrap();

        let result = VersionedSchema::open_latest(&mut conn, SCHEMAS);
        assert!(result.unwrap_err().to_string().contains("foreign"));
    }

    #[test]
    fn rejects_newer_database() {
        let mut conn = Connection::open_in_memory().unwrap();
        SCHEMAS[1].create(&conn).unwrap();
        conn.execute(
            &format!("PRAGMA user_version = {}", BASE_DB_VERSION + 7),
            [],
        )
        .unwrap();

        let result = VersionedSchema::open_latest(&mut conn, SCHEMAS);
        assert!(result.unwrap_err().to_string().contains("newer"));
    }

    #[test]
    fn validate_detects_missing_index() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE notes (id TEXT PRIMARY KEY, body BLOB NOT NULL, created INTEGER NOT NULL DEFAULT (cast(strftime('%s','now') as int)))",
            [],
        )
        .unwrap();

        let result = SCHEMAS[0].validate(&conn);
        assert!(result.unwrap_err().to_string().contains("missing index"));
    }

    #[test]
    fn reopening_current_database_finds_its_indices() {
        let mut conn = Connection::open_in_memory().unwrap();
        VersionedSchema::open_latest(&mut conn, SCHEMAS).unwrap();
        conn.execute("INSERT INTO notes (id, body) VALUES ('a', x'00')", [])
            .unwrap();

        VersionedSchema::open_latest(&mut conn, SCHEMAS).unwrap();
        assert_eq!(user_version(&conn), (BASE_DB_VERSION + 1) as i64);
    }

    #[test]
    fn validate_detects_type_mismatch() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute(
            "CREATE TABLE notes (id TEXT PRIMARY KEY, body TEXT NOT NULL, created INTEGER NOT NULL)",
            [],
        )
        .unwrap();

        let result = SCHEMAS[0].validate(&conn);
        assert!(result.unwrap_err().to_string().contains("body"));
    }
}
