#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::process::{Command, ExitStatus};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, params};
use tempfile::TempDir;

use flux_activity::activity::category::SourceCategory;
use flux_activity::activity::engine::ActivityEngine;
use flux_activity::activity::query::{BoundQuery, format_instant};
use flux_activity::core::config::Config;
use flux_activity::store::sqlite::SqliteStore;
use flux_activity::store::{ActivityStore, RawRow, StoreError};

// ──────────────────── CLI harness ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_fxa") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "fxa.exe" } else { "fxa" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve fxa binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("fxa-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let output = Command::new(&bin_path)
        .args(args)
        .env_remove("FXA_OUTPUT_FORMAT")
        .env_remove("FXA_STORE_SQLITE_PATH")
        .env("FXA_LOG", "debug")
        .env("RUST_BACKTRACE", "1")
        .output()
        .expect("execute fxa command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

// ──────────────────── fixture database ────────────────────

/// Instant `minutes` after a fixed base, so fixtures are reproducible.
pub fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + chrono::Duration::minutes(minutes)
}

/// Stored text form of [`at`].
pub fn ts(minutes: i64) -> String {
    format_instant(at(minutes))
}

/// Which event-time columns a fixture table carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeColumns {
    Both,
    PrimaryOnly,
    FallbackOnly,
    Neither,
}

impl TimeColumns {
    const fn primary(self) -> bool {
        matches!(self, Self::Both | Self::PrimaryOnly)
    }

    const fn fallback(self) -> bool {
        matches!(self, Self::Both | Self::FallbackOnly)
    }
}

/// One history row; unset fields are stored as NULL.
#[derive(Debug, Clone)]
pub struct Row {
    pub id: i64,
    pub minute: i64,
    pub flux: i64,
    pub status: &'static str,
    pub progress: Option<i64>,
    pub duration_secs: Option<i64>,
    pub error: Option<&'static str>,
    pub items: Option<i64>,
    /// Time text stored verbatim instead of the canonical form of `minute`.
    pub raw_time: Option<&'static str>,
}

impl Row {
    pub fn new(id: i64, minute: i64) -> Self {
        Self {
            id,
            minute,
            flux: 42,
            status: "Success",
            progress: None,
            duration_secs: None,
            error: None,
            items: None,
            raw_time: None,
        }
    }

    pub fn flux(mut self, flux: i64) -> Self {
        self.flux = flux;
        self
    }

    pub fn status(mut self, status: &'static str) -> Self {
        self.status = status;
        self
    }

    pub fn progress(mut self, progress: i64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn duration(mut self, secs: i64) -> Self {
        self.duration_secs = Some(secs);
        self
    }

    pub fn error(mut self, error: &'static str) -> Self {
        self.error = Some(error);
        self
    }

    pub fn items(mut self, items: i64) -> Self {
        self.items = Some(items);
        self
    }

    pub fn raw_time(mut self, raw: &'static str) -> Self {
        self.raw_time = Some(raw);
        self
    }
}

/// SQLite history database in a temp dir, with per-table drift control.
pub struct Fixture {
    pub dir: TempDir,
    pub path: PathBuf,
    tables: HashMap<SourceCategory, TimeColumns>,
}

impl Fixture {
    /// Empty database; add tables with [`Fixture::table`].
    pub fn empty() -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let path = dir.path().join("history.sqlite3");
        Connection::open(&path)
            .and_then(|conn| conn.execute_batch("PRAGMA user_version = 1;"))
            .expect("create fixture db");
        Self {
            dir,
            path,
            tables: HashMap::new(),
        }
    }

    /// All five tables with both time columns.
    pub fn standard() -> Self {
        let mut fixture = Self::empty();
        for category in SourceCategory::ALL {
            fixture.table(category, TimeColumns::Both);
        }
        fixture
    }

    pub fn table(&mut self, category: SourceCategory, time: TimeColumns) -> &mut Self {
        let spec = category.spec();
        let mut columns = vec![
            format!("\"{}\" INTEGER PRIMARY KEY", spec.id_column),
            format!("\"{}\" INTEGER", spec.owner_column),
            format!("\"{}\" TEXT", spec.status_column),
            format!("\"{}\" INTEGER", spec.progress_column),
            format!("\"{}\" INTEGER", spec.duration_column),
            format!("\"{}\" TEXT", spec.error_column),
            format!("\"{}\" TEXT", spec.completed_column),
            format!("\"{}\" INTEGER", spec.count_column),
        ];
        if time.primary() {
            columns.push("\"timestamp\" TEXT".to_string());
        }
        if time.fallback() {
            columns.push("\"started_at\" TEXT".to_string());
        }
        let sql = format!(
            "CREATE TABLE \"{}\" ({})",
            spec.default_table,
            columns.join(", ")
        );
        self.conn().execute_batch(&sql).expect("create fixture table");
        self.tables.insert(category, time);
        self
    }

    pub fn insert(&mut self, category: SourceCategory, row: Row) -> &mut Self {
        let spec = category.spec();
        let time = *self
            .tables
            .get(&category)
            .expect("insert into a table created by this fixture");
        let stamp = row.raw_time.map_or_else(|| ts(row.minute), str::to_string);
        let completed = ts(row.minute + 1);
        let conn = self.conn();
        conn.execute(
            &format!(
                "INSERT INTO \"{}\" (\"{}\", \"{}\", \"{}\", \"{}\", \"{}\", \"{}\", \"{}\", \"{}\")
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                spec.default_table,
                spec.id_column,
                spec.owner_column,
                spec.status_column,
                spec.progress_column,
                spec.duration_column,
                spec.error_column,
                spec.completed_column,
                spec.count_column,
            ),
            params![
                row.id,
                row.flux,
                row.status,
                row.progress,
                row.duration_secs,
                row.error,
                completed,
                row.items
            ],
        )
        .expect("insert fixture row");
        for (present, column) in [(time.primary(), "timestamp"), (time.fallback(), "started_at")] {
            if present {
                conn.execute(
                    &format!(
                        "UPDATE \"{}\" SET \"{column}\" = ?1 WHERE \"{}\" = ?2",
                        spec.default_table, spec.id_column
                    ),
                    params![stamp, row.id],
                )
                .expect("stamp fixture row");
            }
        }
        self
    }

    fn conn(&self) -> Connection {
        Connection::open(&self.path).expect("open fixture db")
    }

    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.store.sqlite_path = self.path.clone();
        config
    }

    pub fn store(&self) -> SqliteStore {
        SqliteStore::open(&self.path, Duration::from_millis(1_000)).expect("open fixture store")
    }

    pub fn engine(&self) -> ActivityEngine<SqliteStore> {
        ActivityEngine::new(self.store(), &self.config())
    }

    pub fn recording_engine(&self) -> ActivityEngine<RecordingStore<SqliteStore>> {
        ActivityEngine::new(RecordingStore::new(self.store()), &self.config())
    }

    /// Write a config file pointing at this database and return its path.
    pub fn write_config(&self) -> PathBuf {
        let path = self.dir.path().join("config.toml");
        let body = format!(
            "[store]\nsqlite_path = {:?}\nbusy_timeout_ms = 1000\n",
            self.path.display().to_string()
        );
        fs::write(&path, body).expect("write fixture config");
        path
    }
}

// ──────────────────── recording store ────────────────────

/// One observed store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub category: SourceCategory,
    pub order_by: Option<&'static str>,
    pub predicate_columns: Vec<&'static str>,
}

/// Wraps a store and records every fetch it forwards.
pub struct RecordingStore<S> {
    inner: S,
    calls: Mutex<Vec<Call>>,
}

impl<S> RecordingStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    /// Calls for one category, in the order they were made.
    pub fn calls_for(&self, category: SourceCategory) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.category == category)
            .collect()
    }
}

impl<S: ActivityStore> ActivityStore for RecordingStore<S> {
    fn fetch(&self, query: &BoundQuery) -> Result<Vec<RawRow>, StoreError> {
        self.calls.lock().push(Call {
            category: query.category,
            order_by: query.order_by,
            predicate_columns: query.predicates.iter().map(|p| p.column).collect(),
        });
        self.inner.fetch(query)
    }
}
