use crate::builder::Gate;
use crate::ffi;
use crate::shape::Type;
use std::error;
use std::fmt;
use std::os::raw::c_int;
use std::path::PathBuf;
use std::str;

/// Enum listing possible errors from quill.
#[derive(Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// The database file could not be opened or created.
    UnableToOpen(ffi::Error, Option<String>),

    /// An API-order violation reached the engine (`SQLITE_MISUSE`), or a
    /// process-lifecycle call was repeated.
    InterfaceMisuse(ffi::Error, Option<String>),

    /// The engine rejected the SQL or the underlying call failed.
    UnableToExecuteQuery(ffi::Error, Option<String>),

    /// A unique or NOT NULL constraint was violated. The statement that
    /// reported this remains usable after a reset.
    UnmetConstraint(ffi::Error, Option<String>),

    /// A named placeholder is absent from the compiled statement.
    BindParameterNotFound(String),

    /// The column tag is incompatible with the field descriptor. Carries
    /// the field label and the tag the engine reported.
    MismatchedType(String, Type),

    /// An integer payload is wider than the field descriptor allows.
    /// Carries the field label and the offending value.
    MismatchedSize(String, i64),

    /// The payload is the right tag but not representable in the field's
    /// value domain (a boolean other than 0/1, an unknown enumeration
    /// ordinal or name, or an undecodable JSON body).
    MismatchedValue(String, String),

    /// A NULL column was read into a non-optional field.
    UnexpectedNullValue(String),

    /// A placeholder/column count or label set differs from the shape.
    MismatchedFields(String),

    /// The integrity pragma reported damage; carries the engine's answer.
    FailedIntegrityChecks(String),

    /// A builder step was invoked out of order. Carries the step name and
    /// the ordinal the builder had already reached.
    InvalidFunctionChain { step: &'static str, seq: u8 },

    /// The constraint gate passed at construction does not match the
    /// clauses that were actually assembled.
    MismatchedConstraint(Gate),

    /// An identifier is not fit for use as a container or field name.
    InvalidNamingConvention(String),

    /// A URN string does not have the canonical hyphenated shape.
    MalformedUrnString(String),

    /// A non-hex digit appeared where a hex digit was expected.
    InvalidHexCharacter(char),

    /// A string passed to the engine contained an embedded NUL.
    NulError(std::ffi::NulError),

    /// The engine returned text that is not valid UTF-8.
    Utf8Error(str::Utf8Error),

    /// A path could not be converted to a C-compatible string.
    InvalidPath(PathBuf),
}

impl From<str::Utf8Error> for Error {
    fn from(err: str::Utf8Error) -> Error {
        Error::Utf8Error(err)
    }
}

impl From<std::ffi::NulError> for Error {
    fn from(err: std::ffi::NulError) -> Error {
        Error::NulError(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::UnableToOpen(ref err, None) => err.fmt(f),
            Error::UnableToOpen(_, Some(ref s)) => write!(f, "unable to open database: {s}"),
            Error::InterfaceMisuse(ref err, None) => err.fmt(f),
            Error::InterfaceMisuse(_, Some(ref s)) => write!(f, "interface misuse: {s}"),
            Error::UnableToExecuteQuery(ref err, None) => err.fmt(f),
            Error::UnableToExecuteQuery(_, Some(ref s)) => write!(f, "{s}"),
            Error::UnmetConstraint(ref err, None) => err.fmt(f),
            Error::UnmetConstraint(_, Some(ref s)) => write!(f, "constraint not met: {s}"),
            Error::BindParameterNotFound(ref name) => {
                write!(f, "no such bind parameter in statement: {name}")
            }
            Error::MismatchedType(ref field, ref tag) => {
                write!(f, "column tag {tag} does not fit field `{field}`")
            }
            Error::MismatchedSize(ref field, value) => {
                write!(f, "value {value} is too wide for field `{field}`")
            }
            Error::MismatchedValue(ref field, ref value) => {
                write!(f, "value {value} is outside the domain of field `{field}`")
            }
            Error::UnexpectedNullValue(ref field) => {
                write!(f, "NULL in non-optional field `{field}`")
            }
            Error::MismatchedFields(ref msg) => write!(f, "{msg}"),
            Error::FailedIntegrityChecks(ref answer) => {
                write!(f, "integrity check failed: {answer}")
            }
            Error::InvalidFunctionChain { step, seq } => {
                write!(f, "builder step `{step}` called out of order (at step {seq})")
            }
            Error::MismatchedConstraint(Gate::Exact) => {
                write!(f, "gate Exact requires a when clause")
            }
            Error::MismatchedConstraint(Gate::All) => {
                write!(f, "gate All forbids a when clause")
            }
            Error::InvalidNamingConvention(ref name) => {
                write!(f, "invalid identifier: `{name}`")
            }
            Error::MalformedUrnString(ref urn) => write!(f, "malformed URN string: {urn}"),
            Error::InvalidHexCharacter(c) => write!(f, "invalid hex character: {c:?}"),
            Error::NulError(ref err) => err.fmt(f),
            Error::Utf8Error(ref err) => err.fmt(f),
            Error::InvalidPath(ref p) => write!(f, "invalid path: {}", p.to_string_lossy()),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::UnableToOpen(ref err, _)
            | Error::InterfaceMisuse(ref err, _)
            | Error::UnableToExecuteQuery(ref err, _)
            | Error::UnmetConstraint(ref err, _) => Some(err),
            Error::NulError(ref err) => Some(err),
            Error::Utf8Error(ref err) => Some(err),
            _ => None,
        }
    }
}

// These are public but not re-exported by lib.rs, so only visible within crate.

pub fn error_from_sqlite_code(code: c_int, message: Option<String>) -> Error {
    let err = ffi::Error::new(code);
    match err.code {
        ffi::ErrorCode::CannotOpen => Error::UnableToOpen(err, message),
        ffi::ErrorCode::ApiMisuse => Error::InterfaceMisuse(err, message),
        ffi::ErrorCode::ConstraintViolation => Error::UnmetConstraint(err, message),
        _ => Error::UnableToExecuteQuery(err, message),
    }
}

pub unsafe fn error_from_handle(db: *mut ffi::sqlite3, code: c_int) -> Error {
    let message = if db.is_null() {
        None
    } else {
        Some(crate::errmsg_to_string(ffi::sqlite3_errmsg(db)))
    };
    error_from_sqlite_code(code, message)
}

#[inline]
pub fn check(code: c_int) -> crate::Result<()> {
    if code == ffi::SQLITE_OK {
        Ok(())
    } else {
        Err(error_from_sqlite_code(code, None))
    }
}
