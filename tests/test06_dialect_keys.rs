mod common;

use std::sync::{Arc, Mutex};

use common::{Response, ScriptedDriver, scripted_connection};
use sqlbridge::prelude::*;

fn names(n: usize) -> Vec<Vec<Variant>> {
    (0..n).map(|i| vec![Variant::from(format!("n{i}"))]).collect()
}

#[test]
fn oracle_reserves_sequence_values_before_inserting() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, recording) = scripted_connection(
        ConnectionType::Oracle,
        Box::new(|sql, _| {
            Ok(if sql.contains(".nextval") {
                Response::rows(&["NEXTVAL"], (41..46).map(|id| vec![Variant::Int64(id)]).collect())
            } else {
                Response::affected(3)
            })
        }),
    );

    let ids = conn.bulk_insert("orders", Some("id"), &["name"], &names(5), 3)?;
    assert_eq!(ids, [41, 42, 43, 44, 45]);

    let rec = recording.lock().unwrap();
    assert_eq!(rec.executed_matching("sq_id_orders.nextval"), 1);
    assert_eq!(rec.executed_matching("INSERT ALL"), 2);
    assert!(rec.executed[1].contains("INTO orders(name,id) VALUES(:1,:2)"));
    // Keys are bound client-side next to each row's values.
    assert_eq!(
        rec.bound[1],
        [
            ("name_0".to_string(), Variant::from("n0")),
            ("id_0".to_string(), Variant::Int64(41)),
            ("name_1".to_string(), Variant::from("n1")),
            ("id_1".to_string(), Variant::Int64(42)),
            ("name_2".to_string(), Variant::from("n2")),
            ("id_2".to_string(), Variant::Int64(43)),
        ]
    );
    assert_eq!(rec.bound[2][3], ("id_1".to_string(), Variant::Int64(45)));
    assert!(rec.events.contains(&"commit".to_string()));
    Ok(())
}

#[test]
fn mysql_counts_up_from_last_insert_id_under_a_table_lock() -> Result<(), Box<dyn std::error::Error>> {
    let first_ids = Arc::new(Mutex::new(vec![100_i64, 200]));
    let (conn, recording) = scripted_connection(
        ConnectionType::MySql,
        Box::new(move |sql, _| {
            Ok(if sql == "SELECT LAST_INSERT_ID()" {
                Response::scalar("id", first_ids.lock().unwrap().remove(0))
            } else {
                Response::affected(2)
            })
        }),
    );

    let ids = conn.bulk_insert("orders", Some("id"), &["name"], &names(3), 2)?;
    assert_eq!(ids, [100, 101, 200]);

    let rec = recording.lock().unwrap();
    assert_eq!(rec.executed.first().map(String::as_str), Some("LOCK TABLES orders WRITE"));
    assert_eq!(rec.executed.last().map(String::as_str), Some("UNLOCK TABLES"));
    assert_eq!(rec.executed_matching("LAST_INSERT_ID"), 2);
    assert!(!rec.executed.iter().any(|sql| sql.contains("RETURNING")));
    Ok(())
}

#[test]
fn mssql_counts_back_from_identity() -> Result<(), Box<dyn std::error::Error>> {
    let (conn, _) = scripted_connection(
        ConnectionType::Mssql,
        Box::new(|sql, _| {
            Ok(if sql == "SELECT @@IDENTITY" {
                Response::scalar("id", Variant::Int64(10))
            } else {
                Response::affected(4)
            })
        }),
    );
    let ids = conn.bulk_insert("orders", Some("id"), &["name"], &names(4), 100)?;
    assert_eq!(ids, [7, 8, 9, 10]);
    Ok(())
}

#[test]
fn large_values_stream_through_put_data() -> Result<(), Box<dyn std::error::Error>> {
    let (driver, recording) = ScriptedDriver::new(
        ConnectionType::Mssql,
        Box::new(|_, _| Ok(Response::affected(1))),
    );
    let conn = Connection::with_driver(
        ConnectionString::new("scripted", "localhost", "docs"),
        Box::new(driver.with_inline_threshold(1024)),
    );

    let body = vec![7_u8; 40_000];
    let mut query = Query::new(&conn, "INSERT INTO docs(title, body) VALUES(:title, :body)");
    query.bind("title", "short")?.bind("body", body.clone())?;
    assert_eq!(query.exec()?, 1);

    let rec = recording.lock().unwrap();
    assert_eq!(rec.chunks, [16 * 1024, 16 * 1024, 40_000 - 32 * 1024]);
    assert_eq!(rec.deferred_payloads, [body]);
    assert!(rec.events.contains(&"param_data 2".to_string()));
    assert_eq!(rec.executed.len(), 1);
    Ok(())
}

#[test]
fn small_values_stay_inline() -> Result<(), Box<dyn std::error::Error>> {
    let (driver, recording) = ScriptedDriver::new(
        ConnectionType::Mssql,
        Box::new(|_, _| Ok(Response::affected(1))),
    );
    let conn = Connection::with_driver(
        ConnectionString::new("scripted", "localhost", "docs"),
        Box::new(driver.with_inline_threshold(1024)),
    );
    let mut query = Query::new(&conn, "INSERT INTO docs(title, pages) VALUES(:title, :pages)");
    query.bind("title", "x".repeat(100))?.bind("pages", 4_000_i64)?;
    query.exec()?;
    assert!(recording.lock().unwrap().chunks.is_empty());
    Ok(())
}

#[test]
fn reserve_ids_is_oracle_only() {
    let err = sqlbridge::bulk::reserve_ids_sql(ConnectionType::Postgres, "t", 3).unwrap_err();
    assert!(matches!(err, SqlBridgeError::UnsupportedDialectOperation { .. }));
}
