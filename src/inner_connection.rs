use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int, c_uint, c_void};
use std::ptr;

use crate::error::{error_from_handle, error_from_sqlite_code, Error};
use crate::ffi;
use crate::raw_statement::RawStatement;
use crate::row_buffer::{RowBuffer, TextRow};
use crate::{OpenFlags, Result};

pub(crate) struct InnerConnection {
    db: *mut ffi::sqlite3,
}

unsafe impl Send for InnerConnection {}

impl InnerConnection {
    pub fn open_with_flags(c_path: &CStr, flags: OpenFlags) -> Result<InnerConnection> {
        unsafe {
            let mut db: *mut ffi::sqlite3 = ptr::null_mut();
            let r = ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags.bits(), ptr::null());
            if r != ffi::SQLITE_OK {
                let e = if db.is_null() {
                    error_from_sqlite_code(r, Some(c_path.to_string_lossy().to_string()))
                } else {
                    let e = error_from_handle(db, r);
                    ffi::sqlite3_close(db);
                    e
                };
                return Err(e);
            }

            // Extended result codes sharpen constraint diagnostics; the busy
            // timeout absorbs short lock contention between handles.
            ffi::sqlite3_extended_result_codes(db, 1);
            let r = ffi::sqlite3_busy_timeout(db, 5000);
            if r != ffi::SQLITE_OK {
                let e = error_from_handle(db, r);
                ffi::sqlite3_close(db);
                return Err(e);
            }

            Ok(InnerConnection { db })
        }
    }

    #[inline]
    pub fn decode_result(&self, code: c_int) -> Result<()> {
        if code == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(unsafe { error_from_handle(self.db, code) })
        }
    }

    pub fn close(&mut self) -> Result<()> {
        if self.db.is_null() {
            return Ok(());
        }
        let r = unsafe { ffi::sqlite3_close(self.db) };
        let r = self.decode_result(r);
        if r.is_ok() {
            self.db = ptr::null_mut();
        }
        r
    }

    pub fn errmsg(&self) -> String {
        unsafe { crate::errmsg_to_string(ffi::sqlite3_errmsg(self.db)) }
    }

    /// Run a possibly multi-statement script, copying every result row into
    /// an owned buffer via the engine's row callback. All column values come
    /// back in text form.
    pub fn exec(&mut self, sql: &str) -> Result<RowBuffer> {
        let c_sql = CString::new(sql)?;
        let mut buffer = RowBuffer::default();
        let mut errmsg: *mut c_char = ptr::null_mut();
        let r = unsafe {
            ffi::sqlite3_exec(
                self.db,
                c_sql.as_ptr(),
                Some(collect_text_row),
                (&mut buffer as *mut RowBuffer).cast::<c_void>(),
                &mut errmsg,
            )
        };
        if r == ffi::SQLITE_OK {
            Ok(buffer)
        } else {
            let message = if errmsg.is_null() {
                None
            } else {
                let message = unsafe { crate::errmsg_to_string(errmsg) };
                unsafe { ffi::sqlite3_free(errmsg.cast::<c_void>()) };
                Some(message)
            };
            Err(error_from_sqlite_code(r, message))
        }
    }

    /// Compile one statement, ignoring any tail. Statements are prepared
    /// with the persistent flag: every one of them is held by a long-lived
    /// facade.
    pub fn prepare(&mut self, sql: &str) -> Result<RawStatement> {
        let mut c_stmt: *mut ffi::sqlite3_stmt = ptr::null_mut();
        let (c_sql, len, _) = crate::bytes_for_sqlite(sql.as_bytes())?;
        let mut c_tail: *const c_char = ptr::null();
        let r = unsafe {
            ffi::sqlite3_prepare_v3(
                self.db,
                c_sql,
                len,
                ffi::SQLITE_PREPARE_PERSISTENT as c_uint,
                &mut c_stmt,
                &mut c_tail,
            )
        };
        if r != ffi::SQLITE_OK {
            return Err(unsafe { error_from_handle(self.db, r) });
        }
        // Empty input (or a bare comment) compiles to nothing.
        if c_stmt.is_null() {
            return Err(Error::InterfaceMisuse(
                ffi::Error::new(ffi::SQLITE_MISUSE),
                Some("prepared text contains no statement".to_owned()),
            ));
        }
        tracing::debug!(sql, "prepared statement");
        Ok(unsafe { RawStatement::new(c_stmt) })
    }

    #[inline]
    pub fn changes(&self) -> u64 {
        unsafe { ffi::sqlite3_changes(self.db) as u64 }
    }

    #[inline]
    pub fn last_insert_rowid(&self) -> i64 {
        unsafe { ffi::sqlite3_last_insert_rowid(self.db) }
    }
}

impl Drop for InnerConnection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(%err, "failed to close database handle");
        }
    }
}

unsafe extern "C" fn collect_text_row(
    state: *mut c_void,
    n_cols: c_int,
    values: *mut *mut c_char,
    names: *mut *mut c_char,
) -> c_int {
    let buffer = &mut *state.cast::<RowBuffer>();
    let mut row = TextRow::default();
    for i in 0..n_cols as isize {
        let name = CStr::from_ptr(*names.offset(i))
            .to_string_lossy()
            .into_owned();
        let value = *values.offset(i);
        let text = if value.is_null() {
            None
        } else {
            Some(CStr::from_ptr(value).to_string_lossy().into_owned())
        };
        row.push(name, text);
    }
    buffer.push(row);
    0
}
