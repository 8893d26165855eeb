#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};

use sqlbridge::driver::{BindSlot, Driver, ExecuteStatus, StatementHandle};
use sqlbridge::field::{ColumnInfo, Field};
use sqlbridge::prelude::*;

/// What a scripted statement returns.
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Variant>>,
    pub affected: u64,
}

impl Response {
    pub fn affected(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    pub fn rows(columns: &[&str], rows: Vec<Vec<Variant>>) -> Self {
        Self {
            columns: columns.iter().map(ToString::to_string).collect(),
            affected: rows.len() as u64,
            rows,
        }
    }

    pub fn scalar(column: &str, value: impl Into<Variant>) -> Self {
        Self::rows(&[column], vec![vec![value.into()]])
    }
}

/// Everything the driver was asked to do, in order.
#[derive(Debug, Clone, Default)]
pub struct Recording {
    pub executed: Vec<String>,
    pub bound: Vec<Vec<(String, Variant)>>,
    pub events: Vec<String>,
    pub chunks: Vec<usize>,
    pub deferred_payloads: Vec<Vec<u8>>,
}

impl Recording {
    pub fn executed_matching(&self, needle: &str) -> usize {
        self.executed.iter().filter(|sql| sql.contains(needle)).count()
    }
}

pub type Responder = Box<dyn FnMut(&str, &[(String, Variant)]) -> Result<Response, String> + Send>;

#[derive(Default)]
struct ScriptedStatement {
    slots: Vec<(u32, String, Variant, bool)>,
    pending: VecDeque<u32>,
    received: Vec<u8>,
    sql: String,
    columns: Vec<String>,
    rows: VecDeque<Vec<Variant>>,
    affected: u64,
}

/// A driver that answers from a closure and records every call.
pub struct ScriptedDriver {
    kind: ConnectionType,
    responder: Responder,
    recording: Arc<Mutex<Recording>>,
    inline_threshold: Option<usize>,
    commit_error: Option<String>,
    active: bool,
    statements: HashMap<StatementHandle, ScriptedStatement>,
    next_handle: u64,
}

impl ScriptedDriver {
    pub fn new(kind: ConnectionType, responder: Responder) -> (Self, Arc<Mutex<Recording>>) {
        let recording = Arc::new(Mutex::new(Recording::default()));
        (
            Self {
                kind,
                responder,
                recording: Arc::clone(&recording),
                inline_threshold: None,
                commit_error: None,
                active: false,
                statements: HashMap::new(),
                next_handle: 0,
            },
            recording,
        )
    }

    pub fn with_inline_threshold(mut self, threshold: usize) -> Self {
        self.inline_threshold = Some(threshold);
        self
    }

    /// Make every commit fail with `message`, the way a deferred constraint would.
    pub fn with_failing_commit(mut self, message: &str) -> Self {
        self.commit_error = Some(message.to_string());
        self
    }

    fn event(&self, event: String) {
        self.recording.lock().unwrap().events.push(event);
    }

    fn statement(&mut self, stmt: StatementHandle) -> Result<&mut ScriptedStatement, SqlBridgeError> {
        self.statements
            .get_mut(&stmt)
            .ok_or_else(|| SqlBridgeError::driver("scripted", format!("no statement {stmt}")))
    }

    fn finish(&mut self, stmt: StatementHandle) -> Result<ExecuteStatus, SqlBridgeError> {
        let entry = self
            .statements
            .get_mut(&stmt)
            .ok_or_else(|| SqlBridgeError::driver("scripted", format!("no statement {stmt}")))?;
        let params: Vec<(String, Variant)> = entry
            .slots
            .iter()
            .map(|(_, name, value, _)| (name.clone(), value.clone()))
            .collect();
        {
            let mut rec = self.recording.lock().unwrap();
            rec.executed.push(entry.sql.clone());
            rec.bound.push(params.clone());
        }
        let response = (self.responder)(&entry.sql, &params)
            .map_err(|message| SqlBridgeError::driver("scripted", message))?;
        entry.columns = response.columns;
        entry.rows = response.rows.into();
        entry.affected = response.affected;
        Ok(ExecuteStatus::Done)
    }
}

impl Driver for ScriptedDriver {
    fn connection_type(&self) -> ConnectionType {
        self.kind
    }

    fn open(&mut self, _connection_string: &ConnectionString) -> Result<(), SqlBridgeError> {
        self.active = true;
        self.event("open".to_string());
        Ok(())
    }

    fn close(&mut self) -> Result<(), SqlBridgeError> {
        self.active = false;
        self.statements.clear();
        self.event("close".to_string());
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn begin_transaction(&mut self) -> Result<(), SqlBridgeError> {
        self.event("begin".to_string());
        Ok(())
    }

    fn end_transaction(&mut self, commit: bool) -> Result<(), SqlBridgeError> {
        self.event(if commit { "commit" } else { "rollback" }.to_string());
        match &self.commit_error {
            Some(message) if commit => Err(SqlBridgeError::driver("scripted", message.clone())),
            _ => Ok(()),
        }
    }

    fn alloc_stmt(&mut self) -> Result<StatementHandle, SqlBridgeError> {
        self.next_handle += 1;
        let handle = StatementHandle(self.next_handle);
        self.statements.insert(handle, ScriptedStatement::default());
        Ok(handle)
    }

    fn free_stmt(&mut self, stmt: StatementHandle) -> Result<(), SqlBridgeError> {
        self.statements.remove(&stmt);
        self.event(format!("free {stmt}"));
        Ok(())
    }

    fn close_stmt(&mut self, stmt: StatementHandle) -> Result<(), SqlBridgeError> {
        self.statement(stmt)?.rows.clear();
        Ok(())
    }

    fn prepare(&mut self, stmt: StatementHandle, sql: &str) -> Result<(), SqlBridgeError> {
        self.statement(stmt)?.sql = sql.to_string();
        self.event("prepare".to_string());
        Ok(())
    }

    fn bind_parameters(
        &mut self,
        stmt: StatementHandle,
        params: &[BindSlot<'_>],
    ) -> Result<(), SqlBridgeError> {
        let entry = self.statement(stmt)?;
        entry.slots = params
            .iter()
            .map(|s| (s.position, s.name.to_string(), s.value.clone(), s.deferred))
            .collect();
        entry.pending = params
            .iter()
            .filter(|s| s.deferred)
            .map(|s| s.position)
            .collect();
        Ok(())
    }

    fn execute(&mut self, stmt: StatementHandle, sql: &str) -> Result<ExecuteStatus, SqlBridgeError> {
        let entry = self.statement(stmt)?;
        if entry.sql.is_empty() {
            entry.sql = sql.to_string();
        }
        match entry.pending.front() {
            Some(position) => Ok(ExecuteStatus::NeedData(*position)),
            None => self.finish(stmt),
        }
    }

    fn put_data(&mut self, stmt: StatementHandle, chunk: &[u8]) -> Result<(), SqlBridgeError> {
        self.statement(stmt)?.received.extend_from_slice(chunk);
        self.recording.lock().unwrap().chunks.push(chunk.len());
        Ok(())
    }

    fn param_data(&mut self, stmt: StatementHandle) -> Result<ExecuteStatus, SqlBridgeError> {
        let entry = self.statement(stmt)?;
        let position = entry.pending.pop_front();
        let payload = std::mem::take(&mut entry.received);
        let next = entry.pending.front().copied();
        self.recording.lock().unwrap().deferred_payloads.push(payload);
        self.event(format!("param_data {}", position.unwrap_or(0)));
        match next {
            Some(position) => Ok(ExecuteStatus::NeedData(position)),
            None => self.finish(stmt),
        }
    }

    fn col_count(&mut self, stmt: StatementHandle) -> Result<usize, SqlBridgeError> {
        Ok(self.statement(stmt)?.columns.len())
    }

    fn describe_columns(&mut self, stmt: StatementHandle) -> Result<Vec<ColumnInfo>, SqlBridgeError> {
        Ok(self
            .statement(stmt)?
            .columns
            .iter()
            .map(|name| ColumnInfo {
                name: name.clone(),
                ..ColumnInfo::default()
            })
            .collect())
    }

    fn fetch(&mut self, stmt: StatementHandle, fields: &mut [Field]) -> Result<bool, SqlBridgeError> {
        let Some(row) = self.statement(stmt)?.rows.pop_front() else {
            return Ok(false);
        };
        for (field, value) in fields.iter_mut().zip(row) {
            field.set_value(value);
        }
        Ok(true)
    }

    fn rows_affected(&self, stmt: StatementHandle) -> u64 {
        self.statements.get(&stmt).map_or(0, |s| s.affected)
    }

    fn error_text(&self, _stmt: StatementHandle) -> String {
        String::new()
    }

    fn object_list(&mut self, kind: ObjectType) -> Result<Vec<String>, SqlBridgeError> {
        Ok(vec![format!("{kind:?}").to_lowercase()])
    }

    fn param_mark(&self, index: u32) -> String {
        match self.kind {
            ConnectionType::Oracle => format!(":{index}"),
            ConnectionType::Postgres => format!("${index}"),
            _ => "?".to_string(),
        }
    }

    fn inline_threshold(&self) -> Option<usize> {
        self.inline_threshold
    }
}

/// A connection over a scripted driver that answers every statement with `responder`.
pub fn scripted_connection(
    kind: ConnectionType,
    responder: Responder,
) -> (Connection, Arc<Mutex<Recording>>) {
    let (driver, recording) = ScriptedDriver::new(kind, responder);
    let conn = Connection::with_driver(
        ConnectionString::new("scripted", "localhost", "test"),
        Box::new(driver),
    );
    (conn, recording)
}

pub fn sqlite_url(path: &Path) -> String {
    format!("sqlite3://localhost/{}", path.display())
}

/// Open a file-backed SQLite connection inside `dir`.
pub fn sqlite_connection(dir: &Path, file: &str) -> Result<Connection, SqlBridgeError> {
    let cs: ConnectionString = sqlite_url(&dir.join(file)).parse()?;
    let conn = Connection::new(cs)?;
    conn.open()?;
    Ok(conn)
}
