//! The bind engine: record values onto prepared statements.
//!
//! A [`Record`] is the ordered list of `(label, value)` pairs a statement
//! expects. Model fields bind under `:label`; filter positions bind under
//! their placeholder spelling (`_name`, `_age1`, …), so one record serves
//! statements that mix both.

use crate::error::Error;
use crate::raw_statement::RawStatement;
use crate::util::SmallCString;
use crate::Result;

/// One value to bind, dispatched by the field's descriptor class.
#[derive(Clone, Debug, PartialEq)]
pub enum BindValue<'a> {
    /// 64-bit integer scalar.
    Int(i64),
    /// Boolean scalar, stored as 0 or 1.
    Bool(bool),
    /// 64-bit float scalar.
    Float(f64),
    /// Enumeration ordinal, stored as INTEGER.
    Ordinal(i32),
    /// Enumeration variant name, stored as TEXT.
    Name(&'a str),
    /// Byte sequence stored verbatim as TEXT.
    Text(&'a [u8]),
    /// Byte sequence stored verbatim as BLOB.
    Blob(&'a [u8]),
    /// Nested record or sequence, JSON-encoded at bind time.
    Json(serde_json::Value),
    /// An absent optional; binds NULL.
    Null,
}

/// An ordered set of labelled bind values.
///
/// ```
/// use quill::{BindValue, Record};
///
/// let record = Record::new()
///     .with("age", BindValue::Int(30))
///     .with("_name", BindValue::Text(b"Alice"));
/// assert_eq!(record.len(), 2);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record<'a> {
    fields: Vec<(&'a str, BindValue<'a>)>,
}

impl<'a> Record<'a> {
    /// An empty record.
    pub fn new() -> Record<'a> {
        Record { fields: Vec::new() }
    }

    /// Append a labelled value, preserving order.
    pub fn with(mut self, label: &'a str, value: BindValue<'a>) -> Record<'a> {
        self.fields.push((label, value));
        self
    }

    /// Append a labelled value in place.
    pub fn push(&mut self, label: &'a str, value: BindValue<'a>) {
        self.fields.push((label, value));
    }

    /// The `(label, value)` pairs, in insertion order.
    pub fn fields(&self) -> &[(&'a str, BindValue<'a>)] {
        &self.fields
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// `true` if the record carries no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Bind every record field to its `:label` placeholder.
///
/// The statement's placeholder count must equal the record's field count,
/// and every label must resolve to a placeholder of the compiled text.
pub(crate) fn bind_record(stmt: &RawStatement, record: &Record<'_>) -> Result<()> {
    let expected = stmt.bind_parameter_count();
    if expected != record.len() {
        return Err(Error::MismatchedFields(format!(
            "statement has {expected} placeholders, record has {} fields",
            record.len()
        )));
    }
    for (label, value) in record.fields() {
        let mut name = String::with_capacity(label.len() + 1);
        name.push(':');
        name.push_str(label);
        let c_name = SmallCString::new(&name).map_err(Error::NulError)?;
        let idx = stmt
            .bind_parameter_index(c_name.as_cstr())
            .ok_or(Error::BindParameterNotFound(name))?;
        bind_value(stmt, idx, label, value)?;
    }
    Ok(())
}

fn bind_value(stmt: &RawStatement, idx: usize, label: &str, value: &BindValue<'_>) -> Result<()> {
    match value {
        BindValue::Int(v) => stmt.bind_int64(idx, *v),
        BindValue::Bool(v) => stmt.bind_int32(idx, i32::from(*v)),
        BindValue::Float(v) => stmt.bind_double(idx, *v),
        BindValue::Ordinal(v) => stmt.bind_int32(idx, *v),
        BindValue::Name(v) => stmt.bind_text(idx, v.as_bytes()),
        BindValue::Text(v) => stmt.bind_text(idx, v),
        BindValue::Blob(v) => stmt.bind_blob(idx, v),
        BindValue::Json(v) => {
            // Encoded into a transient buffer; the engine takes its own
            // copy before the bind call returns.
            let encoded = serde_json::to_string(v)
                .map_err(|err| Error::MismatchedValue(label.to_owned(), err.to_string()))?;
            stmt.bind_text(idx, encoded.as_bytes())
        }
        BindValue::Null => stmt.bind_null(idx),
    }
}
