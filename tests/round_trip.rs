//! End-to-end coverage: schema emission against the live engine, full
//! bind/extract symmetry across every descriptor class, placeholder
//! naming, and transaction behavior.

use quill::{
    chain, create_table, filter, group, BindValue, Connection, Count, Create, CreateAction,
    Delete, Descriptor, EnumSpec, FieldDef, Filter, Find, Gate, Link, Model, Op, Order, Record,
    Result, Update, View,
};
use serde_json::json;

static ROLE: EnumSpec = EnumSpec::new(&["admin", "member", "guest"]);

fn users_model() -> Result<Model> {
    Model::new(&[
        FieldDef::new("uuid", Descriptor::Blob),
        FieldDef::new("name", Descriptor::Text),
        FieldDef::new("active", Descriptor::Bool),
        FieldDef::new("age", Descriptor::Int),
        FieldDef::new("score", Descriptor::Float),
        FieldDef::new("role", Descriptor::Ordinal(&ROLE)),
        FieldDef::new("rank", Descriptor::Named(&ROLE)),
        FieldDef::new("socials", Descriptor::Json),
        FieldDef::optional("bio", Descriptor::Blob),
    ])
}

fn users_view() -> Result<View> {
    View::new(&[
        FieldDef::new("uuid", Descriptor::Slice),
        FieldDef::new("name", Descriptor::Slice),
        FieldDef::new("active", Descriptor::Bool),
        FieldDef::new("age", Descriptor::Int),
        FieldDef::new("score", Descriptor::Float),
        FieldDef::new("role", Descriptor::DynEnum(&ROLE)),
        FieldDef::new("rank", Descriptor::DynEnum(&ROLE)),
        FieldDef::new("socials", Descriptor::DynJson),
        FieldDef::optional("bio", Descriptor::Slice),
    ])
}

fn users_filter() -> Result<Filter> {
    Filter::new(&[
        FieldDef::new("uuid", Descriptor::Slice),
        FieldDef::new("name", Descriptor::Slice),
        FieldDef::new("age", Descriptor::Int),
    ])
}

fn users_db() -> Result<Connection> {
    let db = Connection::open_in_memory()?;
    db.exec(&create_table(&users_model()?, "users")?)?;
    Ok(db)
}

fn insert_user<'a>(
    db: &Connection,
    uuid: &'a [u8],
    name: &'a str,
    age: i64,
    bio: BindValue<'a>,
) -> Result<()> {
    let model = users_model()?;
    let sql = Create::new("users", &model, CreateAction::Insert)?.statement()?;
    let mut insert = db.prepare(&sql)?;
    insert.exec(
        &Record::new()
            .with("uuid", BindValue::Blob(uuid))
            .with("name", BindValue::Text(name.as_bytes()))
            .with("active", BindValue::Bool(true))
            .with("age", BindValue::Int(age))
            .with("score", BindValue::Float(0.5))
            .with("role", BindValue::Ordinal(1))
            .with("rank", BindValue::Name("guest"))
            .with(
                "socials",
                BindValue::Json(json!([{"fb": "a", "yt": "b"}, {"fb": "c", "yt": "d"}])),
            )
            .with("bio", bio),
    )?;
    Ok(())
}

#[test]
fn schema_round_trip() -> Result<()> {
    let model = users_model()?;
    let sql = create_table(&model, "users")?;
    let db = Connection::open_in_memory()?;
    db.exec(&sql)?;

    let info = db.exec("PRAGMA table_info(users);")?;
    assert_eq!(info.len(), model.fields().len());
    let expected = [
        ("uuid", "BLOB"),
        ("name", "TEXT"),
        ("active", "INTEGER"),
        ("age", "INTEGER"),
        ("score", "REAL"),
        ("role", "INTEGER"),
        ("rank", "TEXT"),
        ("socials", "TEXT"),
        ("bio", "BLOB"),
    ];
    for (row, (name, column_type)) in info.rows().iter().zip(expected) {
        assert_eq!(row.get("name"), Some(name));
        assert_eq!(row.get("type"), Some(column_type));
        if name == "uuid" {
            assert_eq!(row.get("pk"), Some("1"));
        } else {
            assert_eq!(row.get("pk"), Some("0"));
            let optional = name == "bio";
            assert_eq!(row.get("notnull"), Some(if optional { "0" } else { "1" }));
        }
    }
    Ok(())
}

#[test]
fn bind_extract_symmetry() -> Result<()> {
    let db = users_db()?;
    let view = users_view()?;
    let fq = users_filter()?;

    let low = [0u8; 16];
    let high = [0xFFu8; 16];
    insert_user(&db, &low, "Alice", 30, BindValue::Null)?;
    insert_user(&db, &high, "Bob", 40, BindValue::Blob(b"hi there"))?;

    let sql = Find::new("users", &view, &fq)?
        .sort(&[("uuid", Order::Asc)])?
        .statement()?;
    let mut find = db.prepare(&sql)?;
    let rows = find.read_many(&view)?;
    assert_eq!(rows.len(), 2);

    let alice = &rows[0];
    assert_eq!(alice.get("uuid").unwrap().as_bytes(), Some(&low[..]));
    assert_eq!(alice.get("name").unwrap().as_bytes(), Some(&b"Alice"[..]));
    assert_eq!(alice.get("active").unwrap().as_bool(), Some(true));
    assert_eq!(alice.get("age").unwrap().as_i64(), Some(30));
    assert_eq!(alice.get("score").unwrap().as_f64(), Some(0.5));
    assert_eq!(alice.get("role").unwrap().as_variant(), Some((1, "member")));
    assert_eq!(alice.get("rank").unwrap().as_variant(), Some((2, "guest")));
    assert_eq!(
        alice.get("socials").unwrap().as_json(),
        Some(&json!([{"fb": "a", "yt": "b"}, {"fb": "c", "yt": "d"}]))
    );
    assert!(alice.get("bio").unwrap().is_absent());

    let bob = &rows[1];
    assert_eq!(bob.get("uuid").unwrap().as_bytes(), Some(&high[..]));
    assert_eq!(bob.get("bio").unwrap().as_bytes(), Some(&b"hi there"[..]));
    Ok(())
}

#[test]
fn enumeration_storage_forms() -> Result<()> {
    let db = users_db()?;
    insert_user(&db, &[1u8; 16], "Cara", 25, BindValue::Null)?;

    // The ordinal cast stores the INTEGER ordinal, the name cast stores
    // the variant label.
    let rows = db.exec("SELECT role, rank, typeof(role) AS tr, typeof(rank) AS tn FROM users")?;
    let row = &rows.rows()[0];
    assert_eq!(row.get("role"), Some("1"));
    assert_eq!(row.get("tr"), Some("integer"));
    assert_eq!(row.get("rank"), Some("guest"));
    assert_eq!(row.get("tn"), Some("text"));
    Ok(())
}

#[test]
fn optional_fields_persist_as_null() -> Result<()> {
    let db = users_db()?;
    insert_user(&db, &[2u8; 16], "Dana", 35, BindValue::Null)?;
    let rows = db.exec("SELECT bio, typeof(bio) AS tb FROM users")?;
    assert_eq!(rows.rows()[0].get("bio"), None);
    assert_eq!(rows.rows()[0].get("tb"), Some("null"));
    Ok(())
}

#[test]
fn filtered_find_and_count() -> Result<()> {
    let db = users_db()?;
    let view = users_view()?;
    let fq = users_filter()?;
    insert_user(&db, &[1u8; 16], "Alice", 30, BindValue::Null)?;
    insert_user(&db, &[2u8; 16], "Bob", 40, BindValue::Null)?;
    insert_user(&db, &[3u8; 16], "Carol", 50, BindValue::Null)?;

    let sql = Find::new("users", &view, &fq)?
        .when(&[group(&[
            filter(&fq, "age", Op::Ge)?,
            chain(Link::And),
            filter(&fq, "name", Op::NotLike)?,
        ])])?
        .statement()?;
    let mut find = db.prepare(&sql)?;
    find.bind(
        &Record::new()
            .with("_age", BindValue::Int(40))
            .with("_name", BindValue::Text(b"C%")),
    )?;
    let rows = find.read_many(&view)?;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name").unwrap().as_bytes(), Some(&b"Bob"[..]));

    let sql = Count::new("users")?
        .when(&[filter(&fq, "age", Op::Between)?])?
        .statement()?;
    let mut count = db.prepare(&sql)?;
    count.bind(
        &Record::new()
            .with("_age1", BindValue::Int(35))
            .with("_age2", BindValue::Int(55)),
    )?;
    assert_eq!(count.read_count()?, 2);
    Ok(())
}

#[test]
fn update_and_delete_round_trip() -> Result<()> {
    let db = users_db()?;
    let model = users_model()?;
    let fq = users_filter()?;
    insert_user(&db, &[1u8; 16], "Alice", 30, BindValue::Null)?;
    insert_user(&db, &[2u8; 16], "Bob", 40, BindValue::Null)?;

    let sql = Update::new("users", &model, Gate::Exact)?
        .when(&[filter(&fq, "name", Op::Eq)?])?
        .statement()?;
    let mut update = db.prepare(&sql)?;
    update.exec(
        &Record::new()
            .with("name", BindValue::Text(b"Alicia"))
            .with("active", BindValue::Bool(false))
            .with("age", BindValue::Int(31))
            .with("score", BindValue::Float(0.75))
            .with("role", BindValue::Ordinal(0))
            .with("rank", BindValue::Name("admin"))
            .with("socials", BindValue::Json(json!([])))
            .with("bio", BindValue::Null)
            .with("_name", BindValue::Text(b"Alice")),
    )?;
    assert_eq!(update.changes(), 1);

    let rows = db.exec("SELECT name, age FROM users ORDER BY age")?;
    assert_eq!(rows.rows()[0].get("name"), Some("Alicia"));
    assert_eq!(rows.rows()[0].get("age"), Some("31"));

    let sql = Delete::new("users", Gate::Exact)?
        .when(&[filter(&fq, "age", Op::Gt)?])?
        .statement()?;
    let mut delete = db.prepare(&sql)?;
    delete.exec(&Record::new().with("_age", BindValue::Int(35)))?;
    assert_eq!(db.record_count("users")?, 1);

    let sql = Delete::new("users", Gate::All)?.statement()?;
    db.prepare(&sql)?.exec(&Record::new())?;
    assert_eq!(db.record_count("users")?, 0);
    Ok(())
}

#[test]
fn placeholder_naming_property() -> Result<()> {
    let model = users_model()?;
    let view = users_view()?;
    let fq = users_filter()?;

    let statements = [
        Find::new("users", &view, &fq)?
            .dist()?
            .when(&[group(&[
                filter(&fq, "name", Op::Eq)?,
                chain(Link::And),
                filter(&fq, "age", Op::In(3))?,
                chain(Link::Or),
                filter(&fq, "age", Op::Between)?,
            ])])?
            .sort(&[("name", Order::Asc)])?
            .limit(10)?
            .skip(12)?
            .statement()?,
        Count::new("users")?
            .when(&[filter(&fq, "uuid", Op::Eq)?])?
            .statement()?,
        Create::new("users", &model, CreateAction::Replace)?.statement()?,
        Update::new("users", &model, Gate::Exact)?
            .when(&[filter(&fq, "uuid", Op::Eq)?])?
            .statement()?,
        Delete::new("users", Gate::Exact)?
            .when(&[filter(&fq, "name", Op::NotIn(2))?])?
            .statement()?,
    ];

    let model_labels: Vec<&str> = model.fields().iter().map(|f| f.label()).collect();
    let filter_labels: Vec<&str> = fq.fields().iter().map(|f| f.label()).collect();
    let placeholder = regex::Regex::new(r":(\w+)").unwrap();

    for sql in &statements {
        for capture in placeholder.captures_iter(sql) {
            let name = capture.get(1).unwrap().as_str();
            if let Some(rest) = name.strip_prefix('_') {
                let base = rest.trim_end_matches(|c: char| c.is_ascii_digit());
                assert!(
                    filter_labels.contains(&base),
                    "filter placeholder `:{name}` in `{sql}`"
                );
            } else {
                assert!(
                    model_labels.contains(&name),
                    "bind placeholder `:{name}` in `{sql}`"
                );
            }
        }
    }
    Ok(())
}

#[test]
fn transaction_atomicity() -> Result<()> {
    let db = users_db()?;
    let model = users_model()?;
    let sql = Create::new("users", &model, CreateAction::Insert)?.statement()?;
    let mut insert = db.prepare(&sql)?;

    insert.begin()?;
    insert_user(&db, &[9u8; 16], "Eve", 20, BindValue::Null)?;
    insert.rollback()?;
    assert_eq!(db.record_count("users")?, 0);

    insert.begin()?;
    insert_user(&db, &[9u8; 16], "Eve", 20, BindValue::Null)?;
    insert.commit()?;
    assert_eq!(db.record_count("users")?, 1);
    Ok(())
}

#[test]
fn urn_round_trip() {
    let id = quill::uuid7::new();
    let urn = quill::uuid7::to_urn(&id);
    assert_eq!(quill::uuid7::from_urn(&urn).unwrap(), id);

    let id = quill::uuid7::from_urn("6ba7b811-9dad-11d1-80b4-00c04fd430c8").unwrap();
    assert_eq!(
        quill::uuid7::to_urn(&id),
        "6ba7b811-9dad-11d1-80b4-00c04fd430c8"
    );
}
