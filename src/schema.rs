//! `CREATE TABLE` emission from a model shape.

use crate::shape::{check_identifier, Descriptor, Model, Type, UUID};
use crate::Result;

/// Emit the `CREATE TABLE` text for a model shape.
///
/// Tables are always declared `STRICT, WITHOUT ROWID`. Column types follow
/// each field's storage class, non-optional fields get `NOT NULL`, and the
/// `uuid` field becomes the primary key (implicitly non-null).
///
/// ```
/// use quill::{create_table, Descriptor, FieldDef, Model};
///
/// let model = Model::new(&[
///     FieldDef::new("uuid", Descriptor::Blob),
///     FieldDef::new("name", Descriptor::Text),
/// ])?;
/// let sql = create_table(&model, "users")?;
/// assert!(sql.starts_with("CREATE TABLE IF NOT EXISTS users"));
/// # Ok::<(), quill::Error>(())
/// ```
pub fn create_table(model: &Model, table: &str) -> Result<String> {
    check_identifier(table)?;
    let mut sql = String::from("CREATE TABLE IF NOT EXISTS ");
    sql.push_str(table);
    sql.push_str(" (");
    for (i, field) in model.fields().iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str("\n\t");
        sql.push_str(field.label());
        sql.push(' ');
        sql.push_str(column_type(field.descriptor()));
        if field.label() == UUID {
            sql.push_str(" PRIMARY KEY");
        } else if !field.is_optional() {
            sql.push_str(" NOT NULL");
        }
    }
    sql.push_str("\n) STRICT, WITHOUT ROWID;");
    Ok(sql)
}

fn column_type(descriptor: Descriptor) -> &'static str {
    match descriptor.storage() {
        Type::Integer => "INTEGER",
        Type::Float => "REAL",
        Type::Text => "TEXT",
        Type::Blob => "BLOB",
        // Model shapes only hold writable descriptors, all of which have a
        // concrete storage class.
        Type::Null => unreachable!("model descriptor without storage class"),
    }
}
