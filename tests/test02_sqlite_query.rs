#![cfg(feature = "sqlite")]

mod common;

use chrono::NaiveDate;
use common::sqlite_connection;
use sqlbridge::prelude::*;
use tempfile::tempdir;

fn seed(conn: &Connection) -> Result<(), SqlBridgeError> {
    Query::new(
        conn,
        "CREATE TABLE people(id INTEGER PRIMARY KEY, name TEXT, born DATE, score REAL, active BOOL)",
    )
    .exec()?;
    let mut insert = Query::new(
        conn,
        "INSERT INTO people(name, born, score, active) VALUES(:name, :born, :score, :active)",
    );
    for (name, born, score) in [
        ("alice", NaiveDate::from_ymd_opt(1990, 4, 1), 7.5),
        ("bob", NaiveDate::from_ymd_opt(1985, 12, 24), 3.25),
        ("carol", None, 9.0),
    ] {
        insert
            .bind("name", name)?
            .bind("born", born)?
            .bind("score", score)?
            .bind("active", name != "bob")?;
        assert_eq!(insert.exec()?, 1);
    }
    Ok(())
}

#[test]
fn next_requires_an_open_query() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "lifecycle.db")?;
    seed(&conn)?;

    let mut query = Query::new(&conn, "SELECT name FROM people ORDER BY id");
    assert_eq!(query.state(), QueryState::Closed);
    assert!(matches!(
        query.next(),
        Err(SqlBridgeError::QueryState(QueryStateError::QueryNotOpen))
    ));

    query.open()?;
    assert!(query.is_active());
    let mut names = Vec::new();
    while !query.eof() {
        names.push(query.field_by_name("NAME")?.to_display_string());
        query.next()?;
    }
    assert_eq!(names, ["alice", "bob", "carol"]);
    // Past the end, next keeps reporting no row.
    assert!(!query.next()?);

    query.close();
    query.close();
    assert_eq!(query.state(), QueryState::Closed);
    assert!(query.next().is_err());
    assert_eq!(conn.linked_query_count(), 0);
    Ok(())
}

#[test]
fn fields_carry_declared_types() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "types.db")?;
    seed(&conn)?;

    let mut query = Query::new(
        &conn,
        "SELECT id, name, born, score, active FROM people WHERE name = :name",
    );
    query.bind("name", "alice")?;
    query.open()?;
    assert_eq!(query.fields().len(), 5);
    assert_eq!(query.field_by_name("id")?.value(), &Variant::Int64(1));
    assert_eq!(query.field_by_name("name")?.value(), &Variant::String("alice".into()));
    assert_eq!(
        query.field_by_name("born")?.value().as_date(),
        NaiveDate::from_ymd_opt(1990, 4, 1)
    );
    assert_eq!(query.field_by_name("score")?.value().as_f64(), Some(7.5));
    assert_eq!(query.field_by_name("active")?.value().as_bool(), Some(true));
    assert_eq!(query.field(3).map(Field::alignment), Some(Alignment::Right));
    assert!(matches!(
        query.field_by_name("missing"),
        Err(SqlBridgeError::QueryState(QueryStateError::UnknownField(_)))
    ));
    Ok(())
}

#[test]
fn repeated_placeholder_binds_every_occurrence() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "repeat.db")?;
    seed(&conn)?;

    let mut query = Query::new(
        &conn,
        "SELECT count(*) FROM people WHERE score > :limit OR id = :limit",
    );
    assert_eq!(query.param_count(), 1);
    assert_eq!(query.params().get("limit").map(|p| p.bind_positions().len()), Some(2));
    query.bind("limit", 5.0)?;
    assert_eq!(query.scalar()?.as_i64(), Some(2));

    assert!(matches!(
        query.bind("nope", 1),
        Err(SqlBridgeError::QueryState(QueryStateError::UnknownParameter(_)))
    ));
    Ok(())
}

#[test]
fn null_parameters_and_values() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "nulls.db")?;
    seed(&conn)?;

    let mut query = Query::new(&conn, "SELECT born FROM people WHERE name = :name");
    query.bind("name", "carol")?;
    query.open()?;
    assert!(query.field(0).is_some_and(Field::is_null));

    let mut update = Query::new(&conn, "UPDATE people SET born = :born WHERE born IS NOT NULL");
    update.param("born")?.set_null();
    assert_eq!(update.exec()?, 2);
    Ok(())
}

#[test]
fn set_sql_resets_the_statement() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "reset.db")?;
    seed(&conn)?;

    let mut query = Query::new(&conn, "SELECT id, name FROM people");
    query.open()?;
    assert_eq!(query.fields().len(), 2);

    query.set_sql("SELECT count(*) AS total FROM people WHERE active = :flag");
    assert_eq!(query.state(), QueryState::Closed);
    assert!(query.fields().is_empty());
    assert_eq!(query.param_count(), 1);
    query.bind("flag", true)?;
    query.open()?;
    assert_eq!(query.field_by_name("total")?.value().as_i64(), Some(2));
    Ok(())
}

#[test]
fn reopen_uses_new_parameter_values() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "reopen.db")?;
    seed(&conn)?;

    let mut query = Query::new(&conn, "SELECT name FROM people WHERE id = :id");
    query.prepare()?;
    assert!(query.is_prepared());
    for (id, expected) in [(3, "carol"), (1, "alice")] {
        query.bind("id", id)?;
        query.open()?;
        assert_eq!(query.field(0).map(Field::to_display_string).as_deref(), Some(expected));
    }
    Ok(())
}

#[test]
fn driver_errors_name_the_failing_step() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "errors.db")?;

    let err = Query::new(&conn, "SELECT * FROM no_such_table").open().unwrap_err();
    assert!(
        matches!(err, SqlBridgeError::DriverError { ref operation, .. } if operation == "queryPrepare"),
        "{err}"
    );
    assert!(err.to_string().contains("no_such_table"));
    Ok(())
}

#[test]
fn object_list_reports_tables_and_views() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "catalog.db")?;
    seed(&conn)?;
    Query::new(&conn, "CREATE VIEW adults AS SELECT * FROM people").exec()?;

    assert_eq!(conn.object_list(ObjectType::Tables)?, vec!["people".to_string()]);
    assert_eq!(conn.object_list(ObjectType::Views)?, vec!["adults".to_string()]);
    assert!(conn.object_list(ObjectType::Procedures)?.is_empty());
    assert!(conn.object_list(ObjectType::Databases)?.contains(&"main".to_string()));
    Ok(())
}

#[test]
fn select_reports_fetched_rows_not_previous_changes() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let conn = sqlite_connection(dir.path(), "counts.db")?;
    seed(&conn)?;
    assert_eq!(Query::new(&conn, "UPDATE people SET score = score + 1").exec()?, 3);

    let mut query = Query::new(&conn, "SELECT name FROM people WHERE score > :min");
    query.bind("min", 5)?;
    query.open()?;
    assert_eq!(query.rows_affected(), 2);

    let deleted = Query::new(&conn, "DELETE FROM people WHERE name = 'bob' RETURNING id").exec()?;
    assert_eq!(deleted, 1);
    assert_eq!(Query::new(&conn, "SELECT id FROM people WHERE 0").exec()?, 0);
    Ok(())
}
