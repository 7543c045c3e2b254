use std::ffi::CStr;
use std::os::raw::{c_int, c_void};
use std::ptr;
use std::slice::from_raw_parts;

use crate::error::error_from_handle;
use crate::ffi;
use crate::shape::Type;
use crate::Result;

// Private newtype for raw sqlite3_stmts that finalize themselves when dropped.
#[derive(Debug)]
pub(crate) struct RawStatement(*mut ffi::sqlite3_stmt);

impl RawStatement {
    #[inline]
    pub unsafe fn new(stmt: *mut ffi::sqlite3_stmt) -> RawStatement {
        RawStatement(stmt)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    #[inline]
    fn db(&self) -> *mut ffi::sqlite3 {
        unsafe { ffi::sqlite3_db_handle(self.0) }
    }

    /// Map a result code, pulling the engine's message off the owning handle.
    pub fn decode_result(&self, code: c_int) -> Result<()> {
        if code == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(unsafe { error_from_handle(self.db(), code) })
        }
    }

    #[inline]
    pub fn column_count(&self) -> usize {
        unsafe { ffi::sqlite3_column_count(self.0) as usize }
    }

    pub fn column_type(&self, idx: usize) -> Type {
        match unsafe { ffi::sqlite3_column_type(self.0, idx as c_int) } {
            ffi::SQLITE_INTEGER => Type::Integer,
            ffi::SQLITE_FLOAT => Type::Float,
            ffi::SQLITE_TEXT => Type::Text,
            ffi::SQLITE_BLOB => Type::Blob,
            ffi::SQLITE_NULL => Type::Null,
            _ => unreachable!("sqlite3_column_type returned invalid value"),
        }
    }

    #[inline]
    pub fn column_name(&self, idx: usize) -> &CStr {
        unsafe { CStr::from_ptr(ffi::sqlite3_column_name(self.0, idx as c_int)) }
    }

    #[inline]
    pub fn column_int64(&self, idx: usize) -> i64 {
        unsafe { ffi::sqlite3_column_int64(self.0, idx as c_int) }
    }

    #[inline]
    pub fn column_double(&self, idx: usize) -> f64 {
        unsafe { ffi::sqlite3_column_double(self.0, idx as c_int) }
    }

    /// Copy a TEXT column out of the engine's scratch space. `None` for NULL.
    pub fn column_text(&self, idx: usize) -> Option<Vec<u8>> {
        unsafe {
            let text = ffi::sqlite3_column_text(self.0, idx as c_int);
            if text.is_null() {
                return None;
            }
            let len = ffi::sqlite3_column_bytes(self.0, idx as c_int);
            debug_assert!(len >= 0);
            Some(from_raw_parts(text.cast::<u8>(), len as usize).to_vec())
        }
    }

    /// Copy a BLOB column out of the engine's scratch space. `None` for NULL.
    pub fn column_blob(&self, idx: usize) -> Option<Vec<u8>> {
        unsafe {
            let blob = ffi::sqlite3_column_blob(self.0, idx as c_int);
            let len = ffi::sqlite3_column_bytes(self.0, idx as c_int);
            debug_assert!(len >= 0);
            if blob.is_null() {
                // A zero-length BLOB comes back as a NULL pointer; NULL
                // columns are screened out by the caller via column_type.
                return if len == 0 { Some(Vec::new()) } else { None };
            }
            Some(from_raw_parts(blob.cast::<u8>(), len as usize).to_vec())
        }
    }

    #[inline]
    pub fn step(&self) -> c_int {
        unsafe { ffi::sqlite3_step(self.0) }
    }

    #[inline]
    pub fn reset(&self) -> c_int {
        unsafe { ffi::sqlite3_reset(self.0) }
    }

    #[inline]
    pub fn clear_bindings(&self) -> c_int {
        unsafe { ffi::sqlite3_clear_bindings(self.0) }
    }

    #[inline]
    pub fn bind_parameter_count(&self) -> usize {
        unsafe { ffi::sqlite3_bind_parameter_count(self.0) as usize }
    }

    /// 1-based index of a named placeholder, if the compiled statement has it.
    pub fn bind_parameter_index(&self, name: &CStr) -> Option<usize> {
        match unsafe { ffi::sqlite3_bind_parameter_index(self.0, name.as_ptr()) } {
            0 => None,
            i => Some(i as usize),
        }
    }

    pub fn bind_null(&self, idx: usize) -> Result<()> {
        self.decode_result(unsafe { ffi::sqlite3_bind_null(self.0, idx as c_int) })
    }

    pub fn bind_int32(&self, idx: usize, value: i32) -> Result<()> {
        self.decode_result(unsafe { ffi::sqlite3_bind_int(self.0, idx as c_int, value) })
    }

    pub fn bind_int64(&self, idx: usize, value: i64) -> Result<()> {
        self.decode_result(unsafe { ffi::sqlite3_bind_int64(self.0, idx as c_int, value) })
    }

    pub fn bind_double(&self, idx: usize, value: f64) -> Result<()> {
        self.decode_result(unsafe { ffi::sqlite3_bind_double(self.0, idx as c_int, value) })
    }

    pub fn bind_text(&self, idx: usize, bytes: &[u8]) -> Result<()> {
        let (ptr, len, dtor) = crate::bytes_for_sqlite(bytes)?;
        self.decode_result(unsafe {
            ffi::sqlite3_bind_text(self.0, idx as c_int, ptr, len, dtor)
        })
    }

    pub fn bind_blob(&self, idx: usize, bytes: &[u8]) -> Result<()> {
        let len = crate::len_as_c_int(bytes.len())?;
        self.decode_result(unsafe {
            if len == 0 {
                ffi::sqlite3_bind_zeroblob(self.0, idx as c_int, 0)
            } else {
                ffi::sqlite3_bind_blob(
                    self.0,
                    idx as c_int,
                    bytes.as_ptr() as *const c_void,
                    len,
                    ffi::SQLITE_TRANSIENT(),
                )
            }
        })
    }

    #[inline]
    pub fn sql(&self) -> &CStr {
        unsafe { CStr::from_ptr(ffi::sqlite3_sql(self.0)) }
    }

    pub fn finalize(mut self) -> c_int {
        self.finalize_()
    }

    fn finalize_(&mut self) -> c_int {
        let r = unsafe { ffi::sqlite3_finalize(self.0) };
        self.0 = ptr::null_mut();
        r
    }
}

impl Drop for RawStatement {
    fn drop(&mut self) {
        self.finalize_();
    }
}
