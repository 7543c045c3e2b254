//! The extract engine: stepped rows into view-shaped values.
//!
//! Extraction dispatches on both the engine's column tag and the view
//! field's descriptor, copies every text/blob payload out of the engine's
//! scratch space, and resolves enumerations and JSON bodies into owned
//! values. A [`ViewRow`] owns everything it hands out.

use crate::error::Error;
use crate::raw_statement::RawStatement;
use crate::shape::{Descriptor, FieldDef, Type, View};
use crate::Result;

/// One extracted column value.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    /// From an INTEGER column.
    Int(i64),
    /// From an INTEGER column restricted to 0/1.
    Bool(bool),
    /// From a REAL column.
    Float(f64),
    /// Raw bytes copied from a TEXT or BLOB column.
    Bytes(Vec<u8>),
    /// An enumeration variant, resolved through the field's spec from
    /// either its stored ordinal or its stored name.
    Variant(usize, &'static str),
    /// A decoded JSON body.
    Json(serde_json::Value),
    /// An optional field read from NULL.
    Absent,
}

impl Cell {
    /// The integer payload, if this is an `Int` cell.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Cell::Int(v) => Some(v),
            _ => None,
        }
    }

    /// The boolean payload, if this is a `Bool` cell.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Cell::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// The float payload, if this is a `Float` cell.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Cell::Float(v) => Some(v),
            _ => None,
        }
    }

    /// The byte payload, if this is a `Bytes` cell.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match *self {
            Cell::Bytes(ref v) => Some(v),
            _ => None,
        }
    }

    /// The `(ordinal, name)` pair, if this is a `Variant` cell.
    pub fn as_variant(&self) -> Option<(usize, &'static str)> {
        match *self {
            Cell::Variant(ordinal, name) => Some((ordinal, name)),
            _ => None,
        }
    }

    /// The decoded JSON body, if this is a `Json` cell.
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match *self {
            Cell::Json(ref v) => Some(v),
            _ => None,
        }
    }

    /// `true` for an absent optional.
    pub fn is_absent(&self) -> bool {
        matches!(*self, Cell::Absent)
    }
}

/// One extracted row: ordered `(label, cell)` pairs owned by the caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewRow {
    cells: Vec<(String, Cell)>,
}

impl ViewRow {
    /// The cell for the given field label.
    pub fn get(&self, label: &str) -> Option<&Cell> {
        self.cells
            .iter()
            .find(|(l, _)| l == label)
            .map(|(_, cell)| cell)
    }

    /// Ordered `(label, cell)` pairs.
    pub fn cells(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(label, cell)| (label.as_str(), cell))
    }

    /// Number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// `true` if the row carries no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Extract the row the statement is positioned on into a view value.
///
/// The column count must match the view's field count and the label sets
/// must coincide; both are checked before any payload is touched.
pub(crate) fn extract_row(stmt: &RawStatement, view: &View) -> Result<ViewRow> {
    let count = stmt.column_count();
    if count != view.fields().len() {
        return Err(Error::MismatchedFields(format!(
            "statement returns {count} columns, view has {} fields",
            view.fields().len()
        )));
    }
    let mut labels = Vec::with_capacity(count);
    for idx in 0..count {
        let label = stmt.column_name(idx).to_str().map_err(Error::Utf8Error)?;
        if view.field(label).is_none() {
            return Err(Error::MismatchedFields(format!(
                "column `{label}` has no matching view field"
            )));
        }
        labels.push(label.to_owned());
    }
    for field in view.fields() {
        if !labels.iter().any(|l| l == field.label()) {
            return Err(Error::MismatchedFields(format!(
                "view field `{}` has no matching column",
                field.label()
            )));
        }
    }

    let mut cells = Vec::with_capacity(count);
    for (idx, label) in labels.into_iter().enumerate() {
        let field = view
            .field(&label)
            .expect("label membership checked above");
        let cell = extract_cell(stmt, idx, &label, field)?;
        cells.push((label, cell));
    }
    Ok(ViewRow { cells })
}

fn extract_cell(stmt: &RawStatement, idx: usize, label: &str, field: &FieldDef) -> Result<Cell> {
    let tag = stmt.column_type(idx);
    if tag == Type::Null {
        return if field.is_optional() {
            Ok(Cell::Absent)
        } else {
            Err(Error::UnexpectedNullValue(label.to_owned()))
        };
    }
    match field.descriptor() {
        Descriptor::Bool => match tag {
            Type::Integer => match stmt.column_int64(idx) {
                0 => Ok(Cell::Bool(false)),
                1 => Ok(Cell::Bool(true)),
                v => Err(Error::MismatchedValue(label.to_owned(), v.to_string())),
            },
            _ => Err(Error::MismatchedType(label.to_owned(), tag)),
        },
        Descriptor::Int => match tag {
            Type::Integer => Ok(Cell::Int(stmt.column_int64(idx))),
            _ => Err(Error::MismatchedType(label.to_owned(), tag)),
        },
        Descriptor::Float => match tag {
            Type::Float => Ok(Cell::Float(stmt.column_double(idx))),
            _ => Err(Error::MismatchedType(label.to_owned(), tag)),
        },
        Descriptor::Slice => match tag {
            Type::Text => Ok(Cell::Bytes(stmt.column_text(idx).unwrap_or_default())),
            Type::Blob => Ok(Cell::Bytes(stmt.column_blob(idx).unwrap_or_default())),
            _ => Err(Error::MismatchedType(label.to_owned(), tag)),
        },
        Descriptor::DynEnum(spec) => match tag {
            Type::Integer => {
                let stored = stmt.column_int64(idx);
                if stored < 0 || stored > i64::from(u32::MAX) {
                    return Err(Error::MismatchedSize(label.to_owned(), stored));
                }
                match spec.name(stored) {
                    Some(name) => Ok(Cell::Variant(stored as usize, name)),
                    None => Err(Error::MismatchedValue(label.to_owned(), stored.to_string())),
                }
            }
            Type::Text => {
                let bytes = stmt.column_text(idx).unwrap_or_default();
                let name = std::str::from_utf8(&bytes)?;
                match spec.ordinal(name) {
                    Some(ordinal) => Ok(Cell::Variant(ordinal, spec.variants()[ordinal])),
                    None => Err(Error::MismatchedValue(label.to_owned(), name.to_owned())),
                }
            }
            _ => Err(Error::MismatchedType(label.to_owned(), tag)),
        },
        Descriptor::DynJson => match tag {
            Type::Text => {
                let bytes = stmt.column_text(idx).unwrap_or_default();
                serde_json::from_slice(&bytes)
                    .map(Cell::Json)
                    .map_err(|err| Error::MismatchedValue(label.to_owned(), err.to_string()))
            }
            _ => Err(Error::MismatchedType(label.to_owned(), tag)),
        },
        // View shapes only hold readable descriptors.
        _ => unreachable!("write-only descriptor in view shape"),
    }
}
