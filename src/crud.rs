//! The CRUD facade: one prepared statement, driven end to end.

use std::fmt;
use std::mem;
use std::ptr;

use fallible_iterator::FallibleIterator;

use crate::bind::{bind_record, Record};
use crate::extract::{extract_row, ViewRow};
use crate::ffi;
use crate::raw_statement::RawStatement;
use crate::shape::View;
use crate::{Connection, Result};

/// Outcome of a single step of a prepared statement.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The statement ran to completion without producing a row.
    Done,
    /// The statement produced a row.
    Row,
}

/// Owner of one prepared statement.
///
/// A `Crud` is the runtime counterpart of a builder: the builder emits the
/// statement text once, the facade binds and steps it as often as needed.
/// The statement is reset between bindings and finalized when the facade
/// is dropped (or explicitly through [`finalize`](Crud::finalize), which
/// surfaces errors instead of logging them).
///
/// ```no_run
/// use quill::{BindValue, Connection, Record};
///
/// fn touch(conn: &Connection) -> quill::Result<()> {
///     let mut crud = conn.prepare("UPDATE users SET age = :age")?;
///     crud.exec(&Record::new().with("age", BindValue::Int(30)))?;
///     Ok(())
/// }
/// ```
pub struct Crud<'conn> {
    conn: &'conn Connection,
    stmt: RawStatement,
}

impl<'conn> Crud<'conn> {
    pub(crate) fn new(conn: &'conn Connection, stmt: RawStatement) -> Crud<'conn> {
        Crud { conn, stmt }
    }

    /// Bind a record to the statement without stepping it. Any previous
    /// position and bindings are cleared first.
    pub fn bind(&mut self, record: &Record<'_>) -> Result<()> {
        self.stmt.reset();
        self.stmt.clear_bindings();
        bind_record(&self.stmt, record)
    }

    /// Bind a record and step once. `Done` means the statement ran to
    /// completion; `Row` means it produced output (use the read methods
    /// to retrieve rows instead).
    ///
    /// A constraint violation leaves the statement reusable.
    pub fn exec(&mut self, record: &Record<'_>) -> Result<Outcome> {
        self.bind(record)?;
        let outcome = self.step()?;
        self.stmt.reset();
        Ok(outcome)
    }

    fn step(&mut self) -> Result<Outcome> {
        match self.stmt.step() {
            ffi::SQLITE_DONE => Ok(Outcome::Done),
            ffi::SQLITE_ROW => Ok(Outcome::Row),
            code => {
                self.stmt.reset();
                Err(self.stmt.decode_result(code).unwrap_err())
            }
        }
    }

    /// Step once and extract a single row through the view shape.
    /// `None` once the statement is exhausted, after which the statement
    /// is reset for reuse.
    ///
    /// Successive calls advance through the result set one row at a time.
    pub fn read_one(&mut self, view: &View) -> Result<Option<ViewRow>> {
        match self.step()? {
            Outcome::Done => {
                self.stmt.reset();
                Ok(None)
            }
            Outcome::Row => extract_row(&self.stmt, view).map(Some),
        }
    }

    /// Step to completion, extracting every row through the view shape.
    pub fn read_many(&mut self, view: &View) -> Result<Vec<ViewRow>> {
        let mut rows = Vec::new();
        loop {
            match self.step()? {
                Outcome::Done => {
                    self.stmt.reset();
                    return Ok(rows);
                }
                Outcome::Row => match extract_row(&self.stmt, view) {
                    Ok(row) => rows.push(row),
                    Err(err) => {
                        self.stmt.reset();
                        return Err(err);
                    }
                },
            }
        }
    }

    /// Read a single integer result from column 0; the companion for
    /// `SELECT COUNT(*)` statements, whose result column carries no
    /// field-shaped label.
    pub fn read_count(&mut self) -> Result<i64> {
        match self.step()? {
            Outcome::Done => {
                self.stmt.reset();
                Ok(0)
            }
            Outcome::Row => {
                let n = self.stmt.column_int64(0);
                self.stmt.reset();
                Ok(n)
            }
        }
    }

    /// An iterative reader: each `next` steps the statement once and
    /// extracts the produced row through the view shape.
    pub fn rows<'s>(&'s mut self, view: &'s View) -> ViewRows<'s, 'conn> {
        ViewRows {
            crud: self,
            view,
            done: false,
        }
    }

    /// Reset the statement to its freshly prepared state.
    pub fn reset(&mut self) {
        self.stmt.reset();
        self.stmt.clear_bindings();
    }

    /// Rows changed by the most recently completed statement on the
    /// owning connection.
    pub fn changes(&self) -> u64 {
        self.conn.changes()
    }

    /// Open a transaction on the owning connection.
    pub fn begin(&self) -> Result<()> {
        self.conn.begin()
    }

    /// Commit the open transaction on the owning connection.
    pub fn commit(&self) -> Result<()> {
        self.conn.commit()
    }

    /// Roll back the open transaction on the owning connection.
    pub fn rollback(&self) -> Result<()> {
        self.conn.rollback()
    }

    /// Finalize the statement, surfacing any error.
    ///
    /// Functionally equivalent to dropping the facade, which logs
    /// finalize-time errors instead of returning them.
    pub fn finalize(mut self) -> Result<()> {
        let stmt = mem::replace(&mut self.stmt, unsafe { RawStatement::new(ptr::null_mut()) });
        crate::error::check(stmt.finalize())
    }
}

impl fmt::Debug for Crud<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sql = if self.stmt.is_null() {
            Ok("")
        } else {
            self.stmt.sql().to_str()
        };
        f.debug_struct("Crud").field("sql", &sql).finish()
    }
}

impl Drop for Crud<'_> {
    fn drop(&mut self) {
        let stmt = mem::replace(&mut self.stmt, unsafe { RawStatement::new(ptr::null_mut()) });
        let code = stmt.finalize();
        if code != ffi::SQLITE_OK {
            tracing::warn!(code, "failed to finalize statement");
        }
    }
}

/// Fallible iterator over extracted rows; produced by [`Crud::rows`].
pub struct ViewRows<'s, 'conn> {
    crud: &'s mut Crud<'conn>,
    view: &'s View,
    done: bool,
}

impl FallibleIterator for ViewRows<'_, '_> {
    type Item = ViewRow;
    type Error = crate::Error;

    fn next(&mut self) -> Result<Option<ViewRow>> {
        if self.done {
            return Ok(None);
        }
        match self.crud.step() {
            Ok(Outcome::Row) => match extract_row(&self.crud.stmt, self.view) {
                Ok(row) => Ok(Some(row)),
                Err(err) => {
                    self.done = true;
                    self.crud.stmt.reset();
                    Err(err)
                }
            },
            Ok(Outcome::Done) => {
                self.done = true;
                self.crud.stmt.reset();
                Ok(None)
            }
            Err(err) => {
                self.done = true;
                Err(err)
            }
        }
    }
}
