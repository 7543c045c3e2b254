//! Field descriptors and record shapes.
//!
//! A *shape* is a named, ordered sequence of labelled fields that drives
//! both SQL emission and value conversion:
//!
//! * [`Model`] describes how a record is written. Every field is either a
//!   raw scalar or a cast onto one of the engine's storage classes, and a
//!   non-optional `uuid` BLOB field is mandatory (it becomes the primary
//!   key).
//! * [`View`] describes how a record is read back. Fields are raw scalars
//!   or dynamic descriptors that resolve enumerations and JSON payloads,
//!   and any field may be optional.
//! * [`Filter`] restricts which labels may appear in `WHERE` and
//!   `ORDER BY` clauses; its fields are raw scalars only.
//!
//! Shapes are validated on construction, so a malformed shape never
//! reaches the statement builder or the engine.

use std::fmt;

use crate::error::Error;
use crate::Result;

/// The label every model must carry; it becomes the primary key.
pub(crate) const UUID: &str = "uuid";

/// SQLite storage tags, as reported for a column of a stepped row.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Type {
    /// NULL
    Null,
    /// 64-bit signed integer
    Integer,
    /// 64-bit IEEE floating point number
    Float,
    /// UTF-8 text
    Text,
    /// Uninterpreted bytes
    Blob,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Type::Null => f.pad("Null"),
            Type::Integer => f.pad("Integer"),
            Type::Float => f.pad("Float"),
            Type::Text => f.pad("Text"),
            Type::Blob => f.pad("Blob"),
        }
    }
}

/// An enumeration described by its ordered variant names.
///
/// The ordinal of a variant is its index in the table; the name is the
/// entry itself. Declare one per user enumeration and reference it from
/// field descriptors:
///
/// ```
/// use quill::EnumSpec;
///
/// static COLOR: EnumSpec = EnumSpec::new(&["red", "green", "blue"]);
/// assert_eq!(COLOR.ordinal("green"), Some(1));
/// assert_eq!(COLOR.name(2), Some("blue"));
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct EnumSpec {
    variants: &'static [&'static str],
}

impl EnumSpec {
    /// A spec over the given variant names, in ordinal order.
    pub const fn new(variants: &'static [&'static str]) -> EnumSpec {
        EnumSpec { variants }
    }

    /// The variant names, in ordinal order.
    pub fn variants(&self) -> &'static [&'static str] {
        self.variants
    }

    /// Ordinal of the named variant.
    pub fn ordinal(&self, name: &str) -> Option<usize> {
        self.variants.iter().position(|v| *v == name)
    }

    /// Name of the variant with the given ordinal.
    pub fn name(&self, ordinal: i64) -> Option<&'static str> {
        usize::try_from(ordinal)
            .ok()
            .and_then(|i| self.variants.get(i).copied())
    }
}

/// The closed set of per-field type annotations.
///
/// The first four are raw scalars. `Ordinal`, `Named`, `Json`, `Text` and
/// `Blob` are write-side casts onto a storage class; `DynEnum` and
/// `DynJson` are read-side descriptors that accept whichever stored form
/// the column carries.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Descriptor {
    /// 64-bit signed integer, stored as INTEGER.
    Int,
    /// Two-valued, stored as INTEGER restricted to 0 or 1.
    Bool,
    /// 64-bit float, stored as REAL.
    Float,
    /// Uninterpreted byte sequence, read as-is from a TEXT or BLOB column.
    Slice,
    /// Enumeration stored as its INTEGER ordinal.
    Ordinal(&'static EnumSpec),
    /// Enumeration stored as its TEXT variant name.
    Named(&'static EnumSpec),
    /// Nested record or sequence, stored as JSON TEXT.
    Json,
    /// Byte sequence stored verbatim as TEXT.
    Text,
    /// Byte sequence stored verbatim as BLOB.
    Blob,
    /// Enumeration read back from an INTEGER ordinal or a TEXT name.
    DynEnum(&'static EnumSpec),
    /// Nested record or sequence read back from JSON TEXT.
    DynJson,
}

impl Descriptor {
    /// The storage tag this descriptor produces when bound. For read-side
    /// descriptors this is the canonical (not the only accepted) tag.
    pub fn storage(&self) -> Type {
        match *self {
            Descriptor::Int | Descriptor::Bool | Descriptor::Ordinal(_) => Type::Integer,
            Descriptor::DynEnum(_) => Type::Integer,
            Descriptor::Float => Type::Float,
            Descriptor::Named(_) | Descriptor::Json | Descriptor::Text => Type::Text,
            Descriptor::DynJson => Type::Text,
            Descriptor::Slice | Descriptor::Blob => Type::Blob,
        }
    }

    fn writable(&self) -> bool {
        !matches!(
            *self,
            Descriptor::Slice | Descriptor::DynEnum(_) | Descriptor::DynJson
        )
    }

    fn readable(&self) -> bool {
        matches!(
            *self,
            Descriptor::Int
                | Descriptor::Bool
                | Descriptor::Float
                | Descriptor::Slice
                | Descriptor::DynEnum(_)
                | Descriptor::DynJson
        )
    }

    fn filterable(&self) -> bool {
        matches!(
            *self,
            Descriptor::Int | Descriptor::Bool | Descriptor::Float | Descriptor::Slice
        )
    }
}

/// One labelled field of a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FieldDef {
    label: &'static str,
    descriptor: Descriptor,
    optional: bool,
}

impl FieldDef {
    /// A mandatory field.
    pub const fn new(label: &'static str, descriptor: Descriptor) -> FieldDef {
        FieldDef {
            label,
            descriptor,
            optional: false,
        }
    }

    /// A nullable field.
    pub const fn optional(label: &'static str, descriptor: Descriptor) -> FieldDef {
        FieldDef {
            label,
            descriptor,
            optional: true,
        }
    }

    /// The field label.
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// The field's type annotation.
    pub fn descriptor(&self) -> Descriptor {
        self.descriptor
    }

    /// Whether the field admits NULL.
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Container and field names: a letter followed by letters, digits or
/// underscores. A leading underscore is reserved for filter placeholders.
pub(crate) fn check_identifier(name: &str) -> Result<()> {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return Err(Error::InvalidNamingConvention(name.to_owned())),
    }
    if chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(Error::InvalidNamingConvention(name.to_owned()))
    }
}

fn check_labels(fields: &[FieldDef]) -> Result<()> {
    for (i, field) in fields.iter().enumerate() {
        check_identifier(field.label)?;
        if fields[..i].iter().any(|f| f.label == field.label) {
            return Err(Error::MismatchedFields(format!(
                "duplicate field label `{}`",
                field.label
            )));
        }
    }
    Ok(())
}

fn find<'a>(fields: &'a [FieldDef], label: &str) -> Option<&'a FieldDef> {
    fields.iter().find(|f| f.label == label)
}

/// A write shape: every field is a raw scalar or a storage cast, and the
/// mandatory `uuid` field is a non-optional BLOB.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    fields: Vec<FieldDef>,
}

impl Model {
    /// Validate and build a model shape.
    pub fn new(fields: &[FieldDef]) -> Result<Model> {
        check_labels(fields)?;
        for field in fields {
            if !field.descriptor.writable() {
                return Err(Error::MismatchedFields(format!(
                    "model field `{}` uses a read-only descriptor",
                    field.label
                )));
            }
        }
        match find(fields, UUID) {
            None => {
                return Err(Error::MismatchedFields(
                    "model shape has no `uuid` field".to_owned(),
                ))
            }
            Some(field) => {
                if field.descriptor != Descriptor::Blob {
                    return Err(Error::MismatchedType(
                        UUID.to_owned(),
                        field.descriptor.storage(),
                    ));
                }
                if field.optional {
                    return Err(Error::MismatchedFields(
                        "`uuid` field must not be optional".to_owned(),
                    ));
                }
            }
        }
        Ok(Model {
            fields: fields.to_vec(),
        })
    }

    /// The fields, in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub(crate) fn field(&self, label: &str) -> Option<&FieldDef> {
        find(&self.fields, label)
    }
}

/// A read shape: raw scalars plus dynamic enum/JSON descriptors, any of
/// which may be optional.
#[derive(Clone, Debug, PartialEq)]
pub struct View {
    fields: Vec<FieldDef>,
}

impl View {
    /// Validate and build a view shape.
    pub fn new(fields: &[FieldDef]) -> Result<View> {
        check_labels(fields)?;
        for field in fields {
            if !field.descriptor.readable() {
                return Err(Error::MismatchedFields(format!(
                    "view field `{}` uses a write-only descriptor",
                    field.label
                )));
            }
        }
        Ok(View {
            fields: fields.to_vec(),
        })
    }

    /// The fields, in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub(crate) fn field(&self, label: &str) -> Option<&FieldDef> {
        find(&self.fields, label)
    }
}

/// A restriction shape: the labels allowed in `WHERE` and `ORDER BY`,
/// typed with raw scalars only.
#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    fields: Vec<FieldDef>,
}

impl Filter {
    /// Validate and build a filter shape.
    pub fn new(fields: &[FieldDef]) -> Result<Filter> {
        check_labels(fields)?;
        for field in fields {
            if !field.descriptor.filterable() {
                return Err(Error::MismatchedFields(format!(
                    "filter field `{}` must be a raw scalar",
                    field.label
                )));
            }
            if field.optional {
                return Err(Error::MismatchedFields(format!(
                    "filter field `{}` must not be optional",
                    field.label
                )));
            }
        }
        Ok(Filter {
            fields: fields.to_vec(),
        })
    }

    /// The fields, in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub(crate) fn field(&self, label: &str) -> Option<&FieldDef> {
        find(&self.fields, label)
    }
}
