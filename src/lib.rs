//! Quill is a thin, opinionated record layer over SQLite.
//!
//! User-declared shapes ([`Model`], [`View`], [`Filter`]) drive everything:
//! the statement builders emit `CREATE TABLE` / `SELECT` / `INSERT` /
//! `UPDATE` / `DELETE` text with named placeholders, and the bind/extract
//! engines translate between the engine's five-tag column model and user
//! values (scalars, optionals, enumerations, JSON-encoded nested records).
//! Routine application code never writes raw SQL strings and never touches
//! a per-column bind or extract call.
//!
//! ```
//! use quill::{
//!     create_table, BindValue, Connection, Create, CreateAction, Descriptor, FieldDef, Filter,
//!     Find, Model, Record, View,
//! };
//!
//! fn main() -> quill::Result<()> {
//!     let model = Model::new(&[
//!         FieldDef::new("uuid", Descriptor::Blob),
//!         FieldDef::new("name", Descriptor::Text),
//!         FieldDef::optional("age", Descriptor::Int),
//!     ])?;
//!     let view = View::new(&[
//!         FieldDef::new("name", Descriptor::Slice),
//!         FieldDef::optional("age", Descriptor::Int),
//!     ])?;
//!     let filter = Filter::new(&[FieldDef::new("name", Descriptor::Slice)])?;
//!
//!     let db = Connection::open_in_memory()?;
//!     db.exec(&create_table(&model, "users")?)?;
//!
//!     let id = quill::uuid7::new();
//!     let sql = Create::new("users", &model, CreateAction::Insert)?.statement()?;
//!     let mut insert = db.prepare(&sql)?;
//!     insert.exec(
//!         &Record::new()
//!             .with("uuid", BindValue::Blob(id.as_bytes()))
//!             .with("name", BindValue::Text(b"Alice"))
//!             .with("age", BindValue::Int(30)),
//!     )?;
//!
//!     let sql = Find::new("users", &view, &filter)?.statement()?;
//!     let mut find = db.prepare(&sql)?;
//!     let people = find.read_many(&view)?;
//!     assert_eq!(people.len(), 1);
//!     assert_eq!(people[0].get("age").unwrap().as_i64(), Some(30));
//!     Ok(())
//! }
//! ```
#![warn(missing_docs)]

pub use libsqlite3_sys as ffi;

use std::cell::RefCell;
use std::ffi::CStr;
use std::ffi::CString;
use std::os::raw::{c_char, c_int};
use std::path::Path;
use std::result;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::inner_connection::InnerConnection;

pub use crate::admin::VacuumMode;
pub use crate::bind::{BindValue, Record};
pub use crate::builder::{
    chain, filter, group, Count, Create, CreateAction, Delete, Find, Gate, Link, Op, Order, Token,
    Update,
};
pub use crate::crud::{Crud, Outcome, ViewRows};
pub use crate::error::Error;
pub use crate::extract::{Cell, ViewRow};
pub use crate::row_buffer::{RowBuffer, TextRow};
pub use crate::schema::create_table;
pub use crate::shape::{Descriptor, EnumSpec, FieldDef, Filter, Model, Type, View};

mod admin;
mod bind;
mod builder;
mod crud;
mod error;
mod extract;
mod inner_connection;
mod raw_statement;
mod row_buffer;
mod schema;
mod shape;
pub mod uuid7;
pub(crate) mod util;

/// A typedef of the result returned by many methods.
pub type Result<T, E = Error> = result::Result<T, E>;

unsafe fn errmsg_to_string(errmsg: *const c_char) -> String {
    String::from_utf8_lossy(CStr::from_ptr(errmsg).to_bytes()).into_owned()
}

// Helper to cast to c_int safely, returning the correct error type if the
// cast failed.
fn len_as_c_int(len: usize) -> Result<c_int> {
    if len >= (c_int::MAX as usize) {
        Err(Error::UnableToExecuteQuery(
            ffi::Error::new(ffi::SQLITE_TOOBIG),
            None,
        ))
    } else {
        Ok(len as c_int)
    }
}

/// Returns `Ok((ptr, len, SQLITE_STATIC | SQLITE_TRANSIENT))` for handing a
/// byte payload to a bind or prepare call. The destructor is `TRANSIENT`
/// (the engine copies) unless the payload is empty, in which case the
/// pointer is static anyway.
fn bytes_for_sqlite(b: &[u8]) -> Result<(*const c_char, c_int, ffi::sqlite3_destructor_type)> {
    let len = len_as_c_int(b.len())?;
    let (ptr, dtor) = if len != 0 {
        (b.as_ptr().cast::<c_char>(), ffi::SQLITE_TRANSIENT())
    } else {
        ("".as_ptr().cast::<c_char>(), ffi::SQLITE_STATIC())
    };
    Ok((ptr, len, dtor))
}

#[cfg(unix)]
fn path_to_cstring(p: &Path) -> Result<CString> {
    use std::os::unix::ffi::OsStrExt;
    Ok(CString::new(p.as_os_str().as_bytes())?)
}

#[cfg(not(unix))]
fn path_to_cstring(p: &Path) -> Result<CString> {
    let s = p.to_str().ok_or_else(|| Error::InvalidPath(p.to_owned()))?;
    Ok(CString::new(s)?)
}

/// Engine threading disciplines selectable at process initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Threading {
    /// No internal locking; the caller guarantees exclusive use.
    Single,
    /// Distinct handles may be used from distinct threads; a single handle
    /// must not be shared.
    Multi,
    /// A handle and its statements may be shared across threads; the
    /// engine serializes access.
    Serialized,
}

static INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Configure the engine's threading discipline and initialize it.
///
/// Must be called at most once per process, before the first [`Connection`]
/// is opened; a repeated call (or one made after the engine already
/// initialized itself) fails with [`Error::InterfaceMisuse`]. Opening
/// without `init` is permitted: the engine then self-initializes in its
/// compiled-in default mode.
///
/// ```no_run
/// quill::init(quill::Threading::Serialized)?;
/// # Ok::<(), quill::Error>(())
/// ```
pub fn init(threading: Threading) -> Result<()> {
    if INITIALIZED.load(Ordering::SeqCst) {
        return Err(Error::InterfaceMisuse(
            ffi::Error::new(ffi::SQLITE_MISUSE),
            Some("init may only be called once per process".to_owned()),
        ));
    }
    let option = match threading {
        Threading::Single => ffi::SQLITE_CONFIG_SINGLETHREAD,
        Threading::Multi => ffi::SQLITE_CONFIG_MULTITHREAD,
        Threading::Serialized => ffi::SQLITE_CONFIG_SERIALIZED,
    };
    error::check(unsafe { ffi::sqlite3_config(option as c_int) })?;
    error::check(unsafe { ffi::sqlite3_initialize() })?;
    INITIALIZED.store(true, Ordering::SeqCst);
    Ok(())
}

/// Release the engine's process-wide resources. Call after every
/// connection has been closed, at process end.
pub fn shutdown() -> Result<()> {
    INITIALIZED.store(false, Ordering::SeqCst);
    error::check(unsafe { ffi::sqlite3_shutdown() })
}

bitflags::bitflags! {
    /// Flags for opening SQLite database connections.
    ///
    /// See the [C documentation](https://www.sqlite.org/c3ref/open.html)
    /// for valid combinations.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[repr(C)]
    pub struct OpenFlags: c_int {
        /// The database is opened in read-only mode.
        const SQLITE_OPEN_READ_ONLY = ffi::SQLITE_OPEN_READONLY;
        /// The database is opened for reading and writing if possible.
        const SQLITE_OPEN_READ_WRITE = ffi::SQLITE_OPEN_READWRITE;
        /// The database is created if it does not already exist.
        const SQLITE_OPEN_CREATE = ffi::SQLITE_OPEN_CREATE;
        /// The filename can be interpreted as a URI.
        const SQLITE_OPEN_URI = ffi::SQLITE_OPEN_URI;
        /// The database will be opened as an in-memory database.
        const SQLITE_OPEN_MEMORY = ffi::SQLITE_OPEN_MEMORY;
        /// The connection opens in multi-thread threading mode.
        const SQLITE_OPEN_NO_MUTEX = ffi::SQLITE_OPEN_NOMUTEX;
        /// The connection opens in serialized threading mode.
        const SQLITE_OPEN_FULL_MUTEX = ffi::SQLITE_OPEN_FULLMUTEX;
    }
}

impl Default for OpenFlags {
    fn default() -> OpenFlags {
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
    }
}

/// A connection to a SQLite database.
pub struct Connection {
    db: RefCell<InnerConnection>,
}

unsafe impl Send for Connection {}

impl Connection {
    /// Open a connection to the database at `path`, creating the file if
    /// it does not exist. An empty path opens an in-memory database.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Connection> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Connection::open_in_memory();
        }
        Connection::open_with_flags(path, OpenFlags::default())
    }

    /// Open a connection to an in-memory database.
    pub fn open_in_memory() -> Result<Connection> {
        Connection::open_with_flags(":memory:", OpenFlags::default())
    }

    /// Open a connection with an explicit flag set.
    pub fn open_with_flags<P: AsRef<Path>>(path: P, flags: OpenFlags) -> Result<Connection> {
        let c_path = path_to_cstring(path.as_ref())?;
        InnerConnection::open_with_flags(&c_path, flags).map(|db| Connection {
            db: RefCell::new(db),
        })
    }

    /// Run a possibly multi-statement script through the one-shot exec
    /// path, collecting every result row in text form.
    ///
    /// This is the right tool for pragmas, DDL and other small
    /// non-binding statements; use [`prepare`](Connection::prepare) for
    /// anything that binds values or extracts typed rows.
    pub fn exec(&self, sql: &str) -> Result<RowBuffer> {
        self.db.borrow_mut().exec(sql)
    }

    /// Compile one statement and hand its ownership to a [`Crud`] facade.
    pub fn prepare(&self, sql: &str) -> Result<Crud<'_>> {
        let stmt = self.db.borrow_mut().prepare(sql)?;
        Ok(Crud::new(self, stmt))
    }

    /// Open a transaction. Nested transactions are not supported.
    pub fn begin(&self) -> Result<()> {
        self.exec("BEGIN;").map(drop)
    }

    /// Commit the open transaction.
    pub fn commit(&self) -> Result<()> {
        self.exec("COMMIT;").map(drop)
    }

    /// Roll back the open transaction.
    pub fn rollback(&self) -> Result<()> {
        self.exec("ROLLBACK;").map(drop)
    }

    /// The engine's message for the most recent failure on this handle.
    pub fn err_msg(&self) -> String {
        self.db.borrow().errmsg()
    }

    /// Rows changed by the most recently completed statement.
    pub fn changes(&self) -> u64 {
        self.db.borrow().changes()
    }

    /// ROWID of the most recent successful insert on this handle.
    pub fn last_insert_rowid(&self) -> i64 {
        self.db.borrow().last_insert_rowid()
    }

    /// Close the connection. Close-time errors are logged and otherwise
    /// ignored; closing happens on teardown paths where there is no one
    /// left to tell.
    pub fn close(self) {
        drop(self);
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection").finish()
    }
}
