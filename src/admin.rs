//! Administrative helpers: thin single-statement wrappers on
//! [`Connection`], all running through the one-shot exec path.

use crate::error::Error;
use crate::ffi;
use crate::row_buffer::RowBuffer;
use crate::shape::check_identifier;
use crate::{Connection, Result};

/// Auto-vacuum modes of a database file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VacuumMode {
    /// Freed pages stay in the file.
    None,
    /// Freed pages move to the end of the file and are truncated away on
    /// commit.
    Full,
    /// Freed pages are tracked and reclaimed on demand.
    Incremental,
}

fn first_text(buffer: &RowBuffer) -> Option<&str> {
    buffer
        .rows()
        .first()
        .and_then(|row| row.columns().next())
        .and_then(|(_, text)| text)
}

fn parse_int(buffer: &RowBuffer, what: &str) -> Result<i64> {
    first_text(buffer)
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| {
            Error::UnableToExecuteQuery(
                ffi::Error::new(ffi::SQLITE_ERROR),
                Some(format!("unexpected {what} answer")),
            )
        })
}

impl Connection {
    /// The connection's cache size (`PRAGMA cache_size`). Positive values
    /// are pages, negative values are kibibytes.
    pub fn cache_size(&self) -> Result<i64> {
        let rows = self.exec("PRAGMA cache_size;")?;
        parse_int(&rows, "cache_size")
    }

    /// Set the connection's cache size (`PRAGMA cache_size`).
    pub fn set_cache_size(&self, size: i64) -> Result<()> {
        self.exec(&format!("PRAGMA cache_size = {size};")).map(drop)
    }

    /// Run `PRAGMA integrity_check`. Anything other than a single `ok`
    /// answer fails with [`Error::FailedIntegrityChecks`] carrying the
    /// engine's findings.
    pub fn integrity_check(&self) -> Result<()> {
        let rows = self.exec("PRAGMA integrity_check;")?;
        if rows.len() == 1 && first_text(&rows) == Some("ok") {
            return Ok(());
        }
        let findings: Vec<&str> = rows
            .rows()
            .iter()
            .filter_map(|row| row.columns().next().and_then(|(_, text)| text))
            .collect();
        Err(Error::FailedIntegrityChecks(findings.join("; ")))
    }

    /// The database's auto-vacuum mode (`PRAGMA auto_vacuum`).
    pub fn vacuum_mode(&self) -> Result<VacuumMode> {
        let rows = self.exec("PRAGMA auto_vacuum;")?;
        match parse_int(&rows, "auto_vacuum")? {
            0 => Ok(VacuumMode::None),
            1 => Ok(VacuumMode::Full),
            2 => Ok(VacuumMode::Incremental),
            other => Err(Error::UnableToExecuteQuery(
                ffi::Error::new(ffi::SQLITE_ERROR),
                Some(format!("unexpected auto_vacuum answer: {other}")),
            )),
        }
    }

    /// Set the database's auto-vacuum mode. The statement is followed by
    /// `VACUUM` so the mode takes effect on an existing file.
    pub fn set_vacuum_mode(&self, mode: VacuumMode) -> Result<()> {
        let value = match mode {
            VacuumMode::None => 0,
            VacuumMode::Full => 1,
            VacuumMode::Incremental => 2,
        };
        self.exec(&format!("PRAGMA auto_vacuum = {value}; VACUUM;"))
            .map(drop)
    }

    /// Create an index named `<table>_<field>_idx` over one field.
    pub fn create_index(&self, table: &str, field: &str) -> Result<()> {
        check_identifier(table)?;
        check_identifier(field)?;
        self.exec(&format!(
            "CREATE INDEX IF NOT EXISTS {table}_{field}_idx ON {table} ({field});"
        ))
        .map(drop)
    }

    /// Drop the index created by [`create_index`](Connection::create_index).
    pub fn drop_index(&self, table: &str, field: &str) -> Result<()> {
        check_identifier(table)?;
        check_identifier(field)?;
        self.exec(&format!("DROP INDEX IF EXISTS {table}_{field}_idx;"))
            .map(drop)
    }

    /// Number of records in a container.
    pub fn record_count(&self, table: &str) -> Result<u64> {
        check_identifier(table)?;
        let rows = self.exec(&format!("SELECT COUNT(*) FROM {table};"))?;
        parse_int(&rows, "COUNT(*)").map(|n| n.max(0) as u64)
    }

    /// Rename a container.
    pub fn rename_table(&self, old: &str, new: &str) -> Result<()> {
        check_identifier(old)?;
        check_identifier(new)?;
        self.exec(&format!("ALTER TABLE {old} RENAME TO {new};"))
            .map(drop)
    }

    /// Drop a container if it exists.
    pub fn drop_table(&self, table: &str) -> Result<()> {
        check_identifier(table)?;
        self.exec(&format!("DROP TABLE IF EXISTS {table};")).map(drop)
    }

    /// The schema-version integer (`PRAGMA user_version`). Quill treats it
    /// as an opaque integer owned by the application.
    pub fn schema_version(&self) -> Result<i64> {
        let rows = self.exec("PRAGMA user_version;")?;
        parse_int(&rows, "user_version")
    }

    /// Store the schema-version integer (`PRAGMA user_version`).
    pub fn set_schema_version(&self, version: i64) -> Result<()> {
        self.exec(&format!("PRAGMA user_version = {version};"))
            .map(drop)
    }
}
