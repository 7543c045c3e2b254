//! Compositional SQL statement builders.
//!
//! Builders are transient values: one is created against the relevant
//! shapes, driven through its optional steps, and consumed by
//! [`statement`](Find::statement) to yield the final SQL text. Every
//! filter position renders a `:_field` placeholder and every bind
//! position a `:field` placeholder, so filter values and record values
//! coexist in one statement without collisions.
//!
//! Steps are order-checked: a [`Find`] walks a monotonically increasing
//! ladder (`dist` → `when` → `sort` → `limit` → `skip`), and [`Update`] /
//! [`Delete`] carry a constraint gate that forces the caller to say, at
//! construction time, whether the statement is meant to touch selected
//! records ([`Gate::Exact`]) or the whole container ([`Gate::All`]).
//! Misuse fails while the statement is being built, never at the engine.

use std::fmt::Write;

use crate::error::Error;
use crate::shape::{check_identifier, Descriptor, Filter, Model, View, UUID};
use crate::Result;

/// Comparison operators usable in a filter position.
///
/// `Like`/`NotLike` require a byte-sequence filter field; the caller
/// supplies the `%`-anchored pattern in the bound value. `In`/`NotIn`
/// carry the number of placeholders to emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `LIKE`
    Like,
    /// `NOT LIKE`
    NotLike,
    /// `BETWEEN :_f1 AND :_f2`
    Between,
    /// `IN (:_f1, …, :_fn)`; the arity must be at least 1
    In(usize),
    /// `NOT IN (:_f1, …, :_fn)`; the arity must be at least 1
    NotIn(usize),
    /// `IS NULL`; binds nothing
    Null,
    /// `IS NOT NULL`; binds nothing
    NotNull,
}

/// Logical connectives for chaining filter tokens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Link {
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `NOT`
    Not,
}

/// Sort direction for [`Find::sort`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Order {
    /// `ASC`
    Asc,
    /// `DESC`
    Desc,
}

/// The constraint gate for [`Update`] and [`Delete`].
///
/// `Exact` demands a `when` clause; `All` forbids one. The gate is fixed
/// at construction and checked when the statement is emitted, so an
/// accidental full-container update cannot be built.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    /// The statement must be constrained by a `when` clause.
    Exact,
    /// The statement deliberately touches every record.
    All,
}

/// Conflict handling for [`Create`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CreateAction {
    /// `INSERT`
    Insert,
    /// `INSERT OR REPLACE`
    Replace,
    /// `INSERT OR IGNORE`
    Ignore,
}

/// One rendered clause fragment, produced by [`filter`], [`chain`] or
/// [`group`] and consumed by a builder's `when` step.
#[derive(Clone, Debug, PartialEq)]
pub struct Token(String);

impl Token {
    fn as_str(&self) -> &str {
        &self.0
    }
}

/// Render one comparison against a filter-shape field.
///
/// Fails if `field` is not a label of the filter shape, if a pattern
/// operator is applied to a non-byte field, or if an `In`/`NotIn` arity
/// is zero.
pub fn filter(shape: &Filter, field: &str, op: Op) -> Result<Token> {
    let def = shape
        .field(field)
        .ok_or_else(|| Error::MismatchedFields(format!("`{field}` is not a filter field")))?;
    if matches!(op, Op::Like | Op::NotLike) && def.descriptor() != Descriptor::Slice {
        return Err(Error::MismatchedType(
            field.to_owned(),
            def.descriptor().storage(),
        ));
    }
    let mut t = String::new();
    match op {
        Op::Eq => {
            let _ = write!(t, "{field} = :_{field}");
        }
        Op::Ne => {
            let _ = write!(t, "{field} != :_{field}");
        }
        Op::Gt => {
            let _ = write!(t, "{field} > :_{field}");
        }
        Op::Lt => {
            let _ = write!(t, "{field} < :_{field}");
        }
        Op::Ge => {
            let _ = write!(t, "{field} >= :_{field}");
        }
        Op::Le => {
            let _ = write!(t, "{field} <= :_{field}");
        }
        Op::Like => {
            let _ = write!(t, "{field} LIKE :_{field}");
        }
        Op::NotLike => {
            let _ = write!(t, "{field} NOT LIKE :_{field}");
        }
        Op::Between => {
            let _ = write!(t, "{field} BETWEEN :_{field}1 AND :_{field}2");
        }
        Op::In(n) | Op::NotIn(n) => {
            if n == 0 {
                return Err(Error::InvalidFunctionChain { step: "in", seq: 0 });
            }
            let keyword = if matches!(op, Op::In(_)) { "IN" } else { "NOT IN" };
            let _ = write!(t, "{field} {keyword} (");
            for i in 1..=n {
                if i > 1 {
                    t.push_str(", ");
                }
                let _ = write!(t, ":_{field}{i}");
            }
            t.push(')');
        }
        Op::Null => {
            let _ = write!(t, "{field} IS NULL");
        }
        Op::NotNull => {
            let _ = write!(t, "{field} IS NOT NULL");
        }
    }
    Ok(Token(t))
}

/// A logical connective token.
pub fn chain(link: Link) -> Token {
    Token(
        match link {
            Link::And => "AND",
            Link::Or => "OR",
            Link::Not => "NOT",
        }
        .to_owned(),
    )
}

/// A parenthesised group of tokens, single-space separated.
pub fn group(tokens: &[Token]) -> Token {
    let mut t = String::from("(");
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            t.push(' ');
        }
        t.push_str(token.as_str());
    }
    t.push(')');
    Token(t)
}

fn join_when(sql: &mut String, tokens: &[Token], seq: u8) -> Result<()> {
    if tokens.is_empty() {
        return Err(Error::InvalidFunctionChain { step: "when", seq });
    }
    sql.push_str("\nWHERE ");
    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            sql.push(' ');
        }
        sql.push_str(token.as_str());
    }
    Ok(())
}

/// Builder for `SELECT` statements over a view shape.
///
/// The optional steps form a ladder with ordinals `when` (2), `sort` (3),
/// `limit` (4) and `skip` (5); each may be skipped but never revisited,
/// and `dist` is only valid before any of them. The terminal
/// [`statement`](Find::statement) consumes the builder.
#[derive(Debug)]
pub struct Find<'a> {
    sql: String,
    seq: u8,
    distinct: bool,
    view: &'a View,
    filter: &'a Filter,
}

impl<'a> Find<'a> {
    /// Start a `SELECT <view labels> FROM <table>` statement.
    pub fn new(table: &str, view: &'a View, filter: &'a Filter) -> Result<Find<'a>> {
        check_identifier(table)?;
        let mut sql = String::from("SELECT ");
        for (i, field) in view.fields().iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(field.label());
        }
        sql.push_str(" FROM ");
        sql.push_str(table);
        Ok(Find {
            sql,
            seq: 1,
            distinct: false,
            view,
            filter,
        })
    }

    /// Deduplicate the result set. Only valid as the first step.
    pub fn dist(mut self) -> Result<Self> {
        if self.seq != 1 || self.distinct {
            return Err(Error::InvalidFunctionChain {
                step: "dist",
                seq: self.seq,
            });
        }
        self.sql.insert_str("SELECT".len(), " DISTINCT");
        self.distinct = true;
        Ok(self)
    }

    /// Append a `WHERE` clause from the given tokens.
    pub fn when(mut self, tokens: &[Token]) -> Result<Self> {
        if self.seq >= 2 {
            return Err(Error::InvalidFunctionChain {
                step: "when",
                seq: self.seq,
            });
        }
        join_when(&mut self.sql, tokens, self.seq)?;
        self.seq = 2;
        Ok(self)
    }

    /// Append an `ORDER BY` clause. Each field must be a label of the view
    /// or filter shape; the caller's ordering is preserved.
    pub fn sort(mut self, orderings: &[(&str, Order)]) -> Result<Self> {
        if self.seq >= 3 || orderings.is_empty() {
            return Err(Error::InvalidFunctionChain {
                step: "sort",
                seq: self.seq,
            });
        }
        self.sql.push_str("\nORDER BY ");
        for (i, (field, order)) in orderings.iter().enumerate() {
            if self.view.field(field).is_none() && self.filter.field(field).is_none() {
                return Err(Error::MismatchedFields(format!(
                    "`{field}` is not a view or filter field"
                )));
            }
            if i > 0 {
                self.sql.push_str(", ");
            }
            self.sql.push_str(field);
            self.sql.push_str(match order {
                Order::Asc => " ASC",
                Order::Desc => " DESC",
            });
        }
        self.seq = 3;
        Ok(self)
    }

    /// Append a `LIMIT` clause.
    pub fn limit(mut self, n: u64) -> Result<Self> {
        if self.seq >= 4 {
            return Err(Error::InvalidFunctionChain {
                step: "limit",
                seq: self.seq,
            });
        }
        let _ = write!(self.sql, "\nLIMIT {n}");
        self.seq = 4;
        Ok(self)
    }

    /// Append an `OFFSET` clause.
    pub fn skip(mut self, n: u64) -> Result<Self> {
        if self.seq >= 5 {
            return Err(Error::InvalidFunctionChain {
                step: "skip",
                seq: self.seq,
            });
        }
        let _ = write!(self.sql, "\nOFFSET {n}");
        self.seq = 5;
        Ok(self)
    }

    /// Consume the builder and emit the statement text.
    pub fn statement(self) -> Result<String> {
        finish(self.sql, self.seq)
    }
}

/// Builder for `SELECT COUNT(*)` statements.
#[derive(Debug)]
pub struct Count {
    sql: String,
    seq: u8,
}

impl Count {
    /// Start a `SELECT COUNT(*) FROM <table>` statement.
    pub fn new(table: &str) -> Result<Count> {
        check_identifier(table)?;
        Ok(Count {
            sql: format!("SELECT COUNT(*) FROM {table}"),
            seq: 1,
        })
    }

    /// Append a `WHERE` clause from the given tokens.
    pub fn when(mut self, tokens: &[Token]) -> Result<Self> {
        if self.seq >= 2 {
            return Err(Error::InvalidFunctionChain {
                step: "when",
                seq: self.seq,
            });
        }
        join_when(&mut self.sql, tokens, self.seq)?;
        self.seq = 2;
        Ok(self)
    }

    /// Consume the builder and emit the statement text.
    pub fn statement(self) -> Result<String> {
        finish(self.sql, self.seq)
    }
}

/// Builder for `INSERT` statements over a model shape.
#[derive(Debug)]
pub struct Create {
    sql: String,
}

impl Create {
    /// Start an `INSERT [OR …] INTO <table> (…) VALUES (…)` statement
    /// binding every model field by name.
    pub fn new(table: &str, model: &Model, action: CreateAction) -> Result<Create> {
        check_identifier(table)?;
        let mut sql = String::from(match action {
            CreateAction::Insert => "INSERT INTO ",
            CreateAction::Replace => "INSERT OR REPLACE INTO ",
            CreateAction::Ignore => "INSERT OR IGNORE INTO ",
        });
        sql.push_str(table);
        sql.push_str(" (");
        for (i, field) in model.fields().iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(field.label());
        }
        sql.push_str(") VALUES (");
        for (i, field) in model.fields().iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push(':');
            sql.push_str(field.label());
        }
        sql.push(')');
        Ok(Create { sql })
    }

    /// Consume the builder and emit the statement text.
    pub fn statement(self) -> Result<String> {
        finish(self.sql, 1)
    }
}

/// Builder for `UPDATE` statements over a model shape.
///
/// Every model field except `uuid` appears in the `SET` list; the row
/// identity of a WITHOUT ROWID table is never rewritten.
#[derive(Debug)]
pub struct Update {
    sql: String,
    gate: Gate,
    has_when: bool,
}

impl Update {
    /// Start an `UPDATE <table> SET …` statement with the given gate.
    pub fn new(table: &str, model: &Model, gate: Gate) -> Result<Update> {
        check_identifier(table)?;
        let mut sql = format!("UPDATE {table} SET ");
        let mut emitted = 0usize;
        for field in model.fields() {
            if field.label() == UUID {
                continue;
            }
            if emitted > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "{label} = :{label}", label = field.label());
            emitted += 1;
        }
        if emitted == 0 {
            return Err(Error::MismatchedFields(
                "model shape has no updatable fields".to_owned(),
            ));
        }
        Ok(Update {
            sql,
            gate,
            has_when: false,
        })
    }

    /// Append a `WHERE` clause from the given tokens.
    pub fn when(mut self, tokens: &[Token]) -> Result<Self> {
        if self.has_when {
            return Err(Error::InvalidFunctionChain {
                step: "when",
                seq: 2,
            });
        }
        join_when(&mut self.sql, tokens, 1)?;
        self.has_when = true;
        Ok(self)
    }

    /// Consume the builder, check the constraint gate, and emit the
    /// statement text.
    pub fn statement(self) -> Result<String> {
        check_gate(self.gate, self.has_when)?;
        finish(self.sql, 1)
    }
}

/// Builder for `DELETE` statements.
#[derive(Debug)]
pub struct Delete {
    sql: String,
    gate: Gate,
    has_when: bool,
}

impl Delete {
    /// Start a `DELETE FROM <table>` statement with the given gate.
    pub fn new(table: &str, gate: Gate) -> Result<Delete> {
        check_identifier(table)?;
        Ok(Delete {
            sql: format!("DELETE FROM {table}"),
            gate,
            has_when: false,
        })
    }

    /// Append a `WHERE` clause from the given tokens.
    pub fn when(mut self, tokens: &[Token]) -> Result<Self> {
        if self.has_when {
            return Err(Error::InvalidFunctionChain {
                step: "when",
                seq: 2,
            });
        }
        join_when(&mut self.sql, tokens, 1)?;
        self.has_when = true;
        Ok(self)
    }

    /// Consume the builder, check the constraint gate, and emit the
    /// statement text.
    pub fn statement(self) -> Result<String> {
        check_gate(self.gate, self.has_when)?;
        finish(self.sql, 1)
    }
}

fn check_gate(gate: Gate, has_when: bool) -> Result<()> {
    match gate {
        Gate::Exact if !has_when => Err(Error::MismatchedConstraint(Gate::Exact)),
        Gate::All if has_when => Err(Error::MismatchedConstraint(Gate::All)),
        _ => Ok(()),
    }
}

fn finish(sql: String, seq: u8) -> Result<String> {
    if sql.ends_with(';') {
        return Err(Error::InvalidFunctionChain {
            step: "statement",
            seq,
        });
    }
    Ok(sql + ";")
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::shape::{FieldDef, Model, View};

    fn shapes() -> (View, Filter) {
        let view = View::new(&[
            FieldDef::new("name", Descriptor::Slice),
            FieldDef::new("age", Descriptor::Int),
        ])
        .unwrap();
        let filter = Filter::new(&[
            FieldDef::new("name", Descriptor::Slice),
            FieldDef::new("age", Descriptor::Int),
        ])
        .unwrap();
        (view, filter)
    }

    fn users_model() -> Model {
        Model::new(&[
            FieldDef::new("uuid", Descriptor::Blob),
            FieldDef::new("name", Descriptor::Text),
            FieldDef::new("age", Descriptor::Int),
            FieldDef::optional("bio", Descriptor::Blob),
        ])
        .unwrap()
    }

    #[test]
    fn test_find_full_ladder() -> crate::Result<()> {
        let (view, filter) = shapes();
        let sql = Find::new("users", &view, &filter)?
            .dist()?
            .when(&[group(&[
                super::filter(&filter, "name", Op::Eq)?,
                chain(Link::And),
                super::filter(&filter, "age", Op::In(3))?,
            ])])?
            .sort(&[("name", Order::Asc), ("age", Order::Desc)])?
            .limit(10)?
            .skip(12)?
            .statement()?;
        assert_eq!(
            sql,
            "SELECT DISTINCT name, age FROM users\n\
             WHERE (name = :_name AND age IN (:_age1, :_age2, :_age3))\n\
             ORDER BY name ASC, age DESC\n\
             LIMIT 10\n\
             OFFSET 12;"
        );
        Ok(())
    }

    #[test]
    fn test_find_sparse_ladder() -> crate::Result<()> {
        let (view, filter) = shapes();
        // Skipping steps is allowed as long as the order is preserved.
        let sql = Find::new("users", &view, &filter)?
            .sort(&[("age", Order::Asc)])?
            .skip(5)?
            .statement()?;
        assert_eq!(
            sql,
            "SELECT name, age FROM users\nORDER BY age ASC\nOFFSET 5;"
        );
        Ok(())
    }

    #[test]
    fn test_find_out_of_order() -> crate::Result<()> {
        let (view, filter) = shapes();
        let t = super::filter(&filter, "age", Op::Gt)?;

        let err = Find::new("users", &view, &filter)?
            .limit(1)?
            .when(std::slice::from_ref(&t))
            .unwrap_err();
        assert_eq!(err, Error::InvalidFunctionChain { step: "when", seq: 4 });

        let err = Find::new("users", &view, &filter)?
            .when(std::slice::from_ref(&t))?
            .dist()
            .unwrap_err();
        assert_eq!(err, Error::InvalidFunctionChain { step: "dist", seq: 2 });

        let err = Find::new("users", &view, &filter)?
            .skip(1)?
            .limit(1)
            .unwrap_err();
        assert_eq!(err, Error::InvalidFunctionChain { step: "limit", seq: 5 });

        let err = Find::new("users", &view, &filter)?
            .dist()?
            .dist()
            .unwrap_err();
        assert_eq!(err, Error::InvalidFunctionChain { step: "dist", seq: 1 });
        Ok(())
    }

    #[test]
    fn test_filter_tokens() -> crate::Result<()> {
        let (_, filter) = shapes();
        let cases: &[(Op, &str)] = &[
            (Op::Eq, "age = :_age"),
            (Op::Ne, "age != :_age"),
            (Op::Gt, "age > :_age"),
            (Op::Lt, "age < :_age"),
            (Op::Ge, "age >= :_age"),
            (Op::Le, "age <= :_age"),
            (Op::Between, "age BETWEEN :_age1 AND :_age2"),
            (Op::In(2), "age IN (:_age1, :_age2)"),
            (Op::NotIn(1), "age NOT IN (:_age1)"),
            (Op::Null, "age IS NULL"),
            (Op::NotNull, "age IS NOT NULL"),
        ];
        for (op, rendered) in cases {
            assert_eq!(super::filter(&filter, "age", *op)?.as_str(), *rendered);
        }
        assert_eq!(
            super::filter(&filter, "name", Op::Like)?.as_str(),
            "name LIKE :_name"
        );
        assert_eq!(
            super::filter(&filter, "name", Op::NotLike)?.as_str(),
            "name NOT LIKE :_name"
        );
        Ok(())
    }

    #[test]
    fn test_filter_misuse() {
        let (_, filter) = shapes();
        // Unknown field.
        assert!(matches!(
            super::filter(&filter, "height", Op::Eq),
            Err(Error::MismatchedFields(_))
        ));
        // Pattern operator on a non-byte field.
        assert!(matches!(
            super::filter(&filter, "age", Op::Like),
            Err(Error::MismatchedType(..))
        ));
        // Empty IN list.
        assert!(matches!(
            super::filter(&filter, "age", Op::In(0)),
            Err(Error::InvalidFunctionChain { step: "in", .. })
        ));
    }

    #[test]
    fn test_group_and_chain() -> crate::Result<()> {
        let (_, filter) = shapes();
        let t = group(&[
            super::filter(&filter, "age", Op::Gt)?,
            chain(Link::Or),
            group(&[chain(Link::Not), super::filter(&filter, "name", Op::Null)?]),
        ]);
        assert_eq!(t.as_str(), "(age > :_age OR (NOT name IS NULL))");
        Ok(())
    }

    #[test]
    fn test_sort_validates_fields() -> crate::Result<()> {
        let (view, filter) = shapes();
        assert!(matches!(
            Find::new("users", &view, &filter)?.sort(&[("height", Order::Asc)]),
            Err(Error::MismatchedFields(_))
        ));
        Ok(())
    }

    #[test]
    fn test_count() -> crate::Result<()> {
        let (_, filter) = shapes();
        assert_eq!(Count::new("users")?.statement()?, "SELECT COUNT(*) FROM users;");
        assert_eq!(
            Count::new("users")?
                .when(&[super::filter(&filter, "age", Op::Ge)?])?
                .statement()?,
            "SELECT COUNT(*) FROM users\nWHERE age >= :_age;"
        );
        let err = Count::new("users")?
            .when(&[super::filter(&filter, "age", Op::Ge)?])?
            .when(&[super::filter(&filter, "age", Op::Le)?])
            .unwrap_err();
        assert_eq!(err, Error::InvalidFunctionChain { step: "when", seq: 2 });
        Ok(())
    }

    #[test]
    fn test_create() -> crate::Result<()> {
        let model = users_model();
        assert_eq!(
            Create::new("users", &model, CreateAction::Insert)?.statement()?,
            "INSERT INTO users (uuid, name, age, bio) VALUES (:uuid, :name, :age, :bio);"
        );
        assert!(Create::new("users", &model, CreateAction::Replace)?
            .statement()?
            .starts_with("INSERT OR REPLACE INTO users"));
        assert!(Create::new("users", &model, CreateAction::Ignore)?
            .statement()?
            .starts_with("INSERT OR IGNORE INTO users"));
        Ok(())
    }

    #[test]
    fn test_update_gates() -> crate::Result<()> {
        let model = users_model();
        let (_, filter) = shapes();

        let sql = Update::new("users", &model, Gate::Exact)?
            .when(&[super::filter(&filter, "name", Op::Eq)?])?
            .statement()?;
        assert_eq!(
            sql,
            "UPDATE users SET name = :name, age = :age, bio = :bio\nWHERE name = :_name;"
        );

        // Exact without a when clause.
        assert_eq!(
            Update::new("users", &model, Gate::Exact)?
                .statement()
                .unwrap_err(),
            Error::MismatchedConstraint(Gate::Exact)
        );
        // All with a when clause.
        assert_eq!(
            Update::new("users", &model, Gate::All)?
                .when(&[super::filter(&filter, "name", Op::Eq)?])?
                .statement()
                .unwrap_err(),
            Error::MismatchedConstraint(Gate::All)
        );
        // All alone touches the whole container.
        assert_eq!(
            Update::new("users", &model, Gate::All)?.statement()?,
            "UPDATE users SET name = :name, age = :age, bio = :bio;"
        );
        Ok(())
    }

    #[test]
    fn test_delete_gates() -> crate::Result<()> {
        let (_, filter) = shapes();
        assert_eq!(
            Delete::new("users", Gate::Exact)?
                .when(&[super::filter(&filter, "age", Op::Lt)?])?
                .statement()?,
            "DELETE FROM users\nWHERE age < :_age;"
        );
        assert_eq!(
            Delete::new("users", Gate::Exact)?.statement().unwrap_err(),
            Error::MismatchedConstraint(Gate::Exact)
        );
        assert_eq!(
            Delete::new("users", Gate::All)?.statement()?,
            "DELETE FROM users;"
        );
        Ok(())
    }

    #[test]
    fn test_table_name_rules() {
        let (view, filter) = shapes();
        assert!(matches!(
            Find::new("users u", &view, &filter),
            Err(Error::InvalidNamingConvention(_))
        ));
        assert!(matches!(
            Delete::new("1users", Gate::All),
            Err(Error::InvalidNamingConvention(_))
        ));
    }
}
