//! Common test helpers shared across integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Once;

use parking_lot::Mutex;
use tabula_orm::{Connection, DataType, Entity, Field, Row, Statement};
use tabula_sql::SqliteConnection;

// Common test entities used across multiple test files

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(table = "users")]
pub struct User {
    #[entity(key)]
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(table = "items", default_sort = "id")]
pub struct Item {
    pub id: i64,
    pub name: String,
    pub count: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(table = "memberships")]
pub struct Membership {
    #[entity(explicit_key)]
    pub user_id: i64,
    #[entity(explicit_key)]
    pub group_id: i64,
    pub role: String,
    #[entity(ignore_update)]
    pub joined: String,
    #[entity(computed)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Entity)]
#[entity(table = "audit_log")]
pub struct AuditEntry {
    pub message: String,
}

/// Install a `tracing` subscriber honouring `RUST_LOG`, once per test binary.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// In-memory `SQLite` database with the test tables created.
#[allow(clippy::missing_panics_doc)]
pub fn sqlite() -> SqliteConnection {
    init_tracing();
    let conn = SqliteConnection::in_memory().expect("open in-memory database");
    conn.execute_batch(
        "CREATE TABLE users (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, email TEXT);
         CREATE TABLE items (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT NOT NULL, count INTEGER NOT NULL);
         CREATE TABLE memberships (
             user_id INTEGER NOT NULL,
             group_id INTEGER NOT NULL,
             role TEXT NOT NULL,
             joined TEXT NOT NULL,
             label TEXT DEFAULT 'member',
             PRIMARY KEY (user_id, group_id)
         );
         CREATE TABLE audit_log (message TEXT NOT NULL);",
    )
    .expect("create tables");
    conn
}

/// Build a row from column/value pairs.
pub fn row(fields: &[(&str, DataType)]) -> Row {
    Row {
        index: "0".to_string(),
        fields: fields
            .iter()
            .map(|(name, value)| Field {
                name: (*name).to_string(),
                value: value.clone(),
            })
            .collect(),
    }
}

/// A connection that records every statement and answers from queued results.
///
/// The dialect is selected from `kind`, which stands in for the driver's type
/// name.
#[derive(Debug)]
pub struct MockConnection {
    kind: &'static str,
    state: Mutex<MockState>,
}

#[derive(Debug, Default)]
struct MockState {
    statements: Vec<(&'static str, Statement)>,
    rows: VecDeque<Vec<Row>>,
    affected: VecDeque<u64>,
    open: bool,
    opened: usize,
    closed: usize,
    fail_close: bool,
}

impl MockConnection {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            state: Mutex::new(MockState {
                open: true,
                ..MockState::default()
            }),
        }
    }

    pub fn closed(kind: &'static str) -> Self {
        let conn = Self::new(kind);
        conn.state.lock().open = false;
        conn
    }

    /// Queue the result of the next `query`.
    pub fn push_rows(&self, rows: Vec<Row>) {
        self.state.lock().rows.push_back(rows);
    }

    /// Queue the affected count of the next `exec` (defaults to 1).
    pub fn push_affected(&self, affected: u64) {
        self.state.lock().affected.push_back(affected);
    }

    pub fn fail_close(&self) {
        self.state.lock().fail_close = true;
    }

    /// Executed statements as `(method, statement)`.
    pub fn statements(&self) -> Vec<(&'static str, Statement)> {
        self.state.lock().statements.clone()
    }

    /// SQL of every executed statement.
    pub fn sql(&self) -> Vec<String> {
        self.state.lock().statements.iter().map(|(_, s)| s.query.clone()).collect()
    }

    pub fn is_open_now(&self) -> bool {
        self.state.lock().open
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opened
    }

    pub fn close_count(&self) -> usize {
        self.state.lock().closed
    }
}

impl Connection for MockConnection {
    fn query(&self, statement: &Statement) -> anyhow::Result<Vec<Row>> {
        let mut state = self.state.lock();
        anyhow::ensure!(state.open, "connection is closed");
        state.statements.push(("query", statement.clone()));
        Ok(state.rows.pop_front().unwrap_or_default())
    }

    fn exec(&self, statement: &Statement) -> anyhow::Result<u64> {
        let mut state = self.state.lock();
        anyhow::ensure!(state.open, "connection is closed");
        state.statements.push(("exec", statement.clone()));
        Ok(state.affected.pop_front().unwrap_or(1))
    }

    fn is_open(&self) -> bool {
        self.state.lock().open
    }

    fn open(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.open = true;
        state.opened += 1;
        Ok(())
    }

    fn close(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock();
        state.open = false;
        state.closed += 1;
        if state.fail_close {
            anyhow::bail!("close failed");
        }
        Ok(())
    }

    fn type_name(&self) -> &'static str {
        self.kind
    }
}

/// Normalize SQL by collapsing whitespace.
fn normalize_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize SQL for comparison by removing identifier quotes and normalizing whitespace.
/// Preserves quotes inside string literals.
fn canonicalize_sql(sql: &str) -> String {
    let mut cleaned = String::with_capacity(sql.len());
    let mut in_single_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' => {
                in_single_quote = !in_single_quote;
                cleaned.push(ch);
            }
            '"' | '`' | '[' | ']' if !in_single_quote => {
                // Strip identifier quoting to avoid brittle comparisons.
            }
            _ => cleaned.push(ch),
        }
    }

    normalize_sql(&cleaned)
}

/// Assert that SQL contains all expected fragments in order.
///
/// Strips identifier quotes of every dialect, normalizes whitespace, and checks
/// that fragments appear sequentially in the generated SQL.
#[allow(clippy::missing_panics_doc)]
pub fn assert_sql_contains(actual: &str, fragments: &[&str]) {
    let actual_canonical = canonicalize_sql(actual);
    let mut search_start = 0usize;

    for fragment in fragments {
        let fragment_canonical = canonicalize_sql(fragment);
        if fragment_canonical.is_empty() {
            continue;
        }

        if let Some(pos) = actual_canonical[search_start..].find(&fragment_canonical) {
            search_start += pos + fragment_canonical.len();
        } else {
            use std::io::Write;
            let mut stderr = std::io::stderr();
            writeln!(stderr, "*** fragment-canonical: {fragment_canonical}").unwrap();
            writeln!(stderr, "*** actual-canonical-sql: {actual_canonical}").unwrap();
            stderr.flush().unwrap();

            panic!(
                "expected SQL fragment `{fragment_canonical}` not found in `{actual_canonical}`"
            );
        }
    }
}
