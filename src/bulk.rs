//! Multi-row insert and delete in fixed-size groups.
//!
//! A full group reuses one prepared template; the last, shorter group gets a template built
//! for its own row count. Surrogate keys come back through `RETURNING` (`PostgreSQL`,
//! `SQLite`), a reserved sequence range (Oracle), `LAST_INSERT_ID()` (`MySQL`) or
//! `@@IDENTITY` (MSSQL).

use tracing::{debug, warn};

use crate::connection::Connection;
use crate::error::SqlBridgeError;
use crate::query::Query;
use crate::types::{ConnectionType, Variant};

pub const DEFAULT_GROUP_SIZE: usize = 100;

/// Oracle identifiers are limited to 30 characters.
const MAX_SEQUENCE_TABLE_NAME: usize = 27;

const KEYS_PER_LINE: usize = 10;

/// SQLite's default `SQLITE_MAX_COMPOUND_SELECT`.
pub const SQLITE_MAX_COMPOUND_SELECT: usize = 500;

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER`.
const SQLITE_MAX_VARIABLES: usize = 32_766;

/// Largest group the dialect accepts in one statement for `columns` bound values per row.
fn dialect_group_limit(dialect: ConnectionType, columns: usize) -> usize {
    match dialect {
        ConnectionType::Sqlite => {
            SQLITE_MAX_COMPOUND_SELECT.min((SQLITE_MAX_VARIABLES / columns.max(1)).max(1))
        }
        _ => usize::MAX,
    }
}

/// Placeholder name for `column` in row `row` of a template.
fn param_name(column: &str, row: usize) -> String {
    let sanitized: String = column
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    format!("{sanitized}_{row}")
}

/// Name of the sequence feeding `table`'s surrogate key on Oracle.
#[must_use]
pub fn table_sequence_name(table: &str) -> String {
    let short: String = table.chars().take(MAX_SEQUENCE_TABLE_NAME).collect();
    format!("sq_id_{short}")
}

fn insert_columns(dialect: ConnectionType, key_column: Option<&str>, columns: &[&str]) -> Vec<String> {
    let mut all: Vec<String> = columns.iter().map(ToString::to_string).collect();
    if let (ConnectionType::Oracle, Some(key)) = (dialect, key_column) {
        if !columns.iter().any(|c| c.eq_ignore_ascii_case(key)) {
            all.push(key.to_string());
        }
    }
    all
}

fn row_params(columns: &[String], row: usize) -> Vec<String> {
    columns
        .iter()
        .map(|c| format!(":{}", param_name(c, row)))
        .collect()
}

/// Build the insert template for `rows` rows in the dialect's multi-row form.
///
/// ```rust
/// use sqlbridge::bulk::make_insert_sql;
/// use sqlbridge::prelude::*;
///
/// let sql = make_insert_sql(ConnectionType::Postgres, "users", None, &["id", "name"], 2)?;
/// assert_eq!(
///     sql,
///     "INSERT INTO users(id,name)\nVALUES\n  (:id_0,:name_0),\n  (:id_1,:name_1)"
/// );
/// # Ok::<(), SqlBridgeError>(())
/// ```
///
/// # Errors
/// Returns `SqlBridgeError::ParameterError` when there are no columns or no rows.
pub fn make_insert_sql(
    dialect: ConnectionType,
    table: &str,
    key_column: Option<&str>,
    columns: &[&str],
    rows: usize,
) -> Result<String, SqlBridgeError> {
    if columns.is_empty() || rows == 0 {
        return Err(SqlBridgeError::ParameterError(format!(
            "bulk insert into {table} needs at least one column and one row"
        )));
    }
    let all = insert_columns(dialect, key_column, columns);
    let column_list = all.join(",");

    let mut sql = match dialect {
        ConnectionType::Sqlite => {
            let first: Vec<String> = row_params(&all, 0)
                .into_iter()
                .zip(&all)
                .map(|(p, c)| format!("{p} AS {c}"))
                .collect();
            let mut sql = format!("INSERT INTO {table}({column_list})\n     SELECT {}", first.join(","));
            for row in 1..rows {
                sql.push_str("\nUNION ALL SELECT ");
                sql.push_str(&row_params(&all, row).join(","));
            }
            sql
        }
        ConnectionType::Oracle => {
            let mut sql = String::from("INSERT ALL");
            for row in 0..rows {
                sql.push_str(&format!(
                    "\n  INTO {table}({column_list}) VALUES({})",
                    row_params(&all, row).join(",")
                ));
            }
            sql.push_str("\nSELECT * FROM DUAL");
            sql
        }
        ConnectionType::Postgres | ConnectionType::MySql | ConnectionType::Mssql => {
            let values: Vec<String> = (0..rows)
                .map(|row| format!("  ({})", row_params(&all, row).join(",")))
                .collect();
            format!("INSERT INTO {table}({column_list})\nVALUES\n{}", values.join(",\n"))
        }
    };

    if let (ConnectionType::Postgres | ConnectionType::Sqlite, Some(key)) = (dialect, key_column) {
        sql.push_str(&format!("\nRETURNING {key}"));
    }
    Ok(sql)
}

/// Build `DELETE FROM table WHERE key IN (...)` for `keys` keys.
///
/// # Errors
/// Returns `SqlBridgeError::ParameterError` when `keys` is zero.
pub fn make_delete_sql(table: &str, key_column: &str, keys: usize) -> Result<String, SqlBridgeError> {
    if keys == 0 {
        return Err(SqlBridgeError::ParameterError(format!(
            "bulk delete from {table} needs at least one key"
        )));
    }
    let mut sql = format!("DELETE FROM {table} WHERE {key_column} IN (\n  ");
    for i in 0..keys {
        if i > 0 {
            sql.push(',');
            sql.push_str(if i % KEYS_PER_LINE == 0 { "\n  " } else { " " });
        }
        sql.push(':');
        sql.push_str(&param_name(key_column, i));
    }
    sql.push(')');
    Ok(sql)
}

/// SQL returning `count` fresh values of the table's key sequence, one per row.
///
/// # Errors
/// Returns `SqlBridgeError::UnsupportedDialectOperation` for dialects without sequences
/// queried this way.
pub fn reserve_ids_sql(dialect: ConnectionType, table: &str, count: usize) -> Result<String, SqlBridgeError> {
    match dialect {
        ConnectionType::Oracle => Ok(format!(
            "WITH SERIES (IND) AS (SELECT ROWNUM FROM DUAL CONNECT BY ROWNUM <= {count}) \
             SELECT {}.nextval FROM SERIES",
            table_sequence_name(table)
        )),
        other => Err(SqlBridgeError::UnsupportedDialectOperation {
            operation: "reserveIds".to_string(),
            dialect: other.to_string(),
        }),
    }
}

/// SQL reading the identity generated by the last insert.
///
/// `MySQL` reports the first id of a multi-row insert, MSSQL the last one.
///
/// # Errors
/// Returns `SqlBridgeError::UnsupportedDialectOperation` for other dialects.
pub fn last_insert_id_sql(dialect: ConnectionType) -> Result<&'static str, SqlBridgeError> {
    match dialect {
        ConnectionType::MySql => Ok("SELECT LAST_INSERT_ID()"),
        ConnectionType::Mssql => Ok("SELECT @@IDENTITY"),
        other => Err(SqlBridgeError::UnsupportedDialectOperation {
            operation: "lastInsertId".to_string(),
            dialect: other.to_string(),
        }),
    }
}

fn id_from(value: &Variant) -> Result<i64, SqlBridgeError> {
    value
        .as_i64()
        .ok_or_else(|| SqlBridgeError::DecodeError(format!("generated key is not an integer: {value:?}")))
}

/// Collect the first column of every row of an opened query.
fn collect_ids(query: &mut Query<'_>) -> Result<Vec<i64>, SqlBridgeError> {
    let mut ids = Vec::new();
    query.open()?;
    while !query.eof() {
        if let Some(field) = query.field(0) {
            ids.push(id_from(field.value())?);
        }
        query.next()?;
    }
    query.close();
    Ok(ids)
}

/// Grouped insert/delete against one table.
pub struct BulkQuery<'c> {
    connection: &'c Connection,
    dialect: ConnectionType,
    table: String,
    key_column: Option<String>,
    columns: Vec<String>,
    group_size: usize,
    insert_template: Option<Query<'c>>,
    delete_template: Option<Query<'c>>,
}

impl<'c> BulkQuery<'c> {
    /// Group sizes above what the dialect accepts in one statement are reduced to that limit.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ParameterError` for a zero group size.
    pub fn new(
        connection: &'c Connection,
        table: &str,
        key_column: Option<&str>,
        columns: &[&str],
        group_size: usize,
    ) -> Result<Self, SqlBridgeError> {
        if group_size == 0 {
            return Err(SqlBridgeError::ParameterError(
                "bulk group size must be at least 1".to_string(),
            ));
        }
        let dialect = connection.connection_type();
        let limit = dialect_group_limit(dialect, columns.len());
        if group_size > limit {
            debug!("bulk group size {group_size} reduced to {limit} for {dialect:?}");
        }
        Ok(Self {
            connection,
            dialect,
            table: table.to_string(),
            key_column: key_column.map(ToString::to_string),
            columns: columns.iter().map(ToString::to_string).collect(),
            group_size: group_size.min(limit),
            insert_template: None,
            delete_template: None,
        })
    }

    #[must_use]
    pub fn group_size(&self) -> usize {
        self.group_size
    }

    fn column_refs(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    fn build_insert(&self, rows: usize) -> Result<Query<'c>, SqlBridgeError> {
        let sql = make_insert_sql(
            self.dialect,
            &self.table,
            self.key_column.as_deref(),
            &self.column_refs(),
            rows,
        )?;
        Ok(Query::new(self.connection, &sql))
    }

    fn build_delete(&self, keys: usize) -> Result<Query<'c>, SqlBridgeError> {
        let key_column = self.key_column.as_deref().ok_or_else(|| {
            SqlBridgeError::ParameterError(format!("bulk delete from {} needs a key column", self.table))
        })?;
        let sql = make_delete_sql(&self.table, key_column, keys)?;
        Ok(Query::new(self.connection, &sql))
    }

    /// Position of the key among the inserted columns when ids are assigned client-side.
    fn client_key_position(&self) -> Option<usize> {
        let key = self.key_column.as_deref()?;
        if self.dialect != ConnectionType::Oracle {
            return None;
        }
        Some(
            self.columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(key))
                .unwrap_or(self.columns.len()),
        )
    }

    fn reserve_ids(&self, count: usize) -> Result<Vec<i64>, SqlBridgeError> {
        let sql = reserve_ids_sql(self.dialect, &self.table, count)?;
        let ids = collect_ids(&mut Query::new(self.connection, &sql))?;
        if ids.len() != count {
            return Err(SqlBridgeError::DecodeError(format!(
                "reserved {} ids for {} rows",
                ids.len(),
                count
            )));
        }
        Ok(ids)
    }

    fn bind_group(
        &self,
        query: &mut Query<'c>,
        group: &[Vec<Variant>],
        reserved: &[i64],
    ) -> Result<(), SqlBridgeError> {
        let key_position = self.client_key_position();
        let width = match key_position {
            Some(pos) if pos == self.columns.len() => self.columns.len() + 1,
            _ => self.columns.len(),
        };
        for (r, row) in group.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let param = query.param_at(r * width + c).ok_or_else(|| {
                    SqlBridgeError::ParameterError(format!("bulk template has no slot for row {r} column {c}"))
                })?;
                param.set_value(value.clone());
            }
            if let (Some(pos), Some(id)) = (key_position, reserved.get(r)) {
                let param = query.param_at(r * width + pos).ok_or_else(|| {
                    SqlBridgeError::ParameterError(format!("bulk template has no key slot for row {r}"))
                })?;
                param.set_value(*id);
            }
        }
        Ok(())
    }

    fn run_insert_group(
        &self,
        query: &mut Query<'c>,
        group: &[Vec<Variant>],
        reserved: &[i64],
        ids: &mut Vec<i64>,
    ) -> Result<(), SqlBridgeError> {
        self.bind_group(query, group, reserved)?;
        if self.key_column.is_none() {
            query.exec()?;
            return Ok(());
        }
        let rows = i64::try_from(group.len()).unwrap_or(i64::MAX);
        match self.dialect {
            ConnectionType::Postgres | ConnectionType::Sqlite => {
                ids.extend(collect_ids(query)?);
            }
            ConnectionType::Oracle => {
                query.exec()?;
                ids.extend_from_slice(reserved);
            }
            ConnectionType::MySql => {
                query.exec()?;
                let first = id_from(&Query::new(self.connection, last_insert_id_sql(self.dialect)?).scalar()?)?;
                ids.extend(first..first + rows);
            }
            ConnectionType::Mssql => {
                query.exec()?;
                let last = id_from(&Query::new(self.connection, last_insert_id_sql(self.dialect)?).scalar()?)?;
                ids.extend(last - rows + 1..=last);
            }
        }
        Ok(())
    }

    fn insert_groups(&mut self, rows: &[Vec<Variant>]) -> Result<Vec<i64>, SqlBridgeError> {
        let reserved = match self.client_key_position() {
            Some(_) => self.reserve_ids(rows.len())?,
            None => Vec::new(),
        };
        let mut ids = Vec::with_capacity(rows.len());
        for (g, group) in rows.chunks(self.group_size).enumerate() {
            let start = g * self.group_size;
            let group_ids = reserved.get(start..start + group.len()).unwrap_or(&[]);
            let full = group.len() == self.group_size;
            let cached = if full { self.insert_template.take() } else { None };
            let mut query = match cached {
                Some(template) => template,
                None => self.build_insert(group.len())?,
            };
            let result = self.run_insert_group(&mut query, group, group_ids, &mut ids);
            if full {
                self.insert_template = Some(query);
            }
            result?;
        }
        Ok(ids)
    }

    /// Insert every row and return generated keys in row order (empty without a key column).
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ParameterError` for a row whose length differs from the
    /// column list, or the driver error of the failing group. Groups already inserted stay.
    pub fn insert_rows(&mut self, rows: &[Vec<Variant>]) -> Result<Vec<i64>, SqlBridgeError> {
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != self.columns.len()) {
            return Err(SqlBridgeError::ParameterError(format!(
                "row {i} has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        debug!(
            "bulk insert of {} rows into {} in groups of {}",
            rows.len(),
            self.table,
            self.group_size
        );

        if self.dialect != ConnectionType::MySql {
            return self.insert_groups(rows);
        }
        Query::new(self.connection, &format!("LOCK TABLES {} WRITE", self.table)).exec()?;
        let result = self.insert_groups(rows);
        if let Err(err) = Query::new(self.connection, "UNLOCK TABLES").exec() {
            warn!("Exception in unlockTables: {err}");
        }
        result
    }

    /// Delete every row whose key is in `keys`; returns the number of rows removed.
    ///
    /// # Errors
    /// Returns `SqlBridgeError::ParameterError` without a key column, or the driver error of
    /// the failing group.
    pub fn delete_rows(&mut self, keys: &[Variant]) -> Result<u64, SqlBridgeError> {
        if keys.is_empty() {
            return Ok(0);
        }
        debug!("bulk delete of {} keys from {}", keys.len(), self.table);
        let mut deleted = 0;
        for group in keys.chunks(self.group_size) {
            let full = group.len() == self.group_size;
            let cached = if full { self.delete_template.take() } else { None };
            let mut query = match cached {
                Some(template) => template,
                None => self.build_delete(group.len())?,
            };
            for (i, key) in group.iter().enumerate() {
                if let Some(param) = query.param_at(i) {
                    param.set_value(key.clone());
                }
            }
            let result = query.exec();
            if full {
                self.delete_template = Some(query);
            }
            deleted += result?;
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlite_template_uses_union_all() {
        let sql = make_insert_sql(ConnectionType::Sqlite, "t", Some("id"), &["a", "b"], 2).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO t(a,b)\n     SELECT :a_0 AS a,:b_0 AS b\nUNION ALL SELECT :a_1,:b_1\nRETURNING id"
        );
    }

    #[test]
    fn oracle_template_appends_key_column() {
        let sql = make_insert_sql(ConnectionType::Oracle, "t", Some("id"), &["a"], 2).unwrap();
        assert_eq!(
            sql,
            "INSERT ALL\n  INTO t(a,id) VALUES(:a_0,:id_0)\n  INTO t(a,id) VALUES(:a_1,:id_1)\nSELECT * FROM DUAL"
        );
    }

    #[test]
    fn mysql_template_has_no_returning() {
        let sql = make_insert_sql(ConnectionType::MySql, "t", Some("id"), &["a"], 1).unwrap();
        assert_eq!(sql, "INSERT INTO t(a)\nVALUES\n  (:a_0)");
    }

    #[test]
    fn delete_template_wraps_every_ten_keys() {
        let sql = make_delete_sql("t", "id", 12).unwrap();
        assert!(sql.starts_with("DELETE FROM t WHERE id IN (\n  :id_0, :id_1,"));
        assert!(sql.contains(":id_9,\n  :id_10, :id_11)"));
    }

    #[test]
    fn sequence_name_is_truncated() {
        let table = "a".repeat(40);
        assert_eq!(table_sequence_name(&table).len(), "sq_id_".len() + 27);
        assert_eq!(table_sequence_name("orders"), "sq_id_orders");
    }

    #[test]
    fn reserve_ids_only_on_oracle() {
        let sql = reserve_ids_sql(ConnectionType::Oracle, "orders", 3).unwrap();
        assert!(sql.contains("CONNECT BY ROWNUM <= 3"));
        assert!(sql.ends_with("SELECT sq_id_orders.nextval FROM SERIES"));
        assert!(matches!(
            reserve_ids_sql(ConnectionType::Postgres, "orders", 3),
            Err(SqlBridgeError::UnsupportedDialectOperation { .. })
        ));
    }

    #[test]
    fn empty_template_is_rejected() {
        assert!(make_insert_sql(ConnectionType::Postgres, "t", None, &[], 3).is_err());
        assert!(make_delete_sql("t", "id", 0).is_err());
    }

    #[test]
    fn sqlite_groups_stay_within_compound_and_variable_limits() {
        assert_eq!(dialect_group_limit(ConnectionType::Sqlite, 2), SQLITE_MAX_COMPOUND_SELECT);
        assert_eq!(dialect_group_limit(ConnectionType::Sqlite, 100), 327);
        assert_eq!(dialect_group_limit(ConnectionType::Sqlite, 0), SQLITE_MAX_COMPOUND_SELECT);
        assert_eq!(dialect_group_limit(ConnectionType::Postgres, 100), usize::MAX);
    }

    #[test]
    fn column_names_are_sanitized_in_placeholders() {
        assert_eq!(param_name("order date", 3), "order_date_3");
    }
}
