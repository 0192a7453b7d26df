use async_trait::async_trait;
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

use crate::models::{Incident, IncidentReport};

pub const TABLE_SUFFIX: &str = "dfes_incidents";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
    #[error("database connection lock poisoned")]
    Poisoned,
    #[error("invalid table prefix '{0}': only ASCII letters, digits and '_' are allowed")]
    InvalidPrefix(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Inserts the report, or overwrites every non-key field of the row
    /// already holding its report id. The two cases are told apart atomically.
    async fn upsert(&self, report: IncidentReport) -> Result<UpsertOutcome, StoreError>;
    /// Rows with `date >= since`, newest first.
    async fn recent(&self, since: i64) -> Result<Vec<Incident>, StoreError>;
}

pub fn validate_prefix(prefix: &str) -> Result<(), StoreError> {
    if prefix
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        Ok(())
    } else {
        Err(StoreError::InvalidPrefix(prefix.to_string()))
    }
}

fn schema_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            dsr_id TEXT NOT NULL UNIQUE,
            date INTEGER NOT NULL,
            outtime TEXT NOT NULL DEFAULT '',
            intime TEXT NOT NULL DEFAULT '',
            station TEXT NOT NULL DEFAULT '',
            call_type TEXT NOT NULL DEFAULT '',
            activity_live TEXT NOT NULL DEFAULT '',
            near TEXT NOT NULL DEFAULT '',
            at TEXT NOT NULL DEFAULT '',
            vehicle TEXT NOT NULL DEFAULT '',
            taluka TEXT NOT NULL DEFAULT '',
            village TEXT NOT NULL DEFAULT '',
            activity_sms TEXT NOT NULL DEFAULT ''
        );
        CREATE INDEX IF NOT EXISTS {table}_date_idx ON {table}(date);"
    )
}

const COLUMNS: &str = "id, dsr_id, date, outtime, intime, station, call_type, activity_live, \
                       near, at, vehicle, taluka, village, activity_sms";

fn row_to_incident(row: &Row<'_>) -> rusqlite::Result<Incident> {
    Ok(Incident {
        id: row.get("id")?,
        report_id: row.get("dsr_id")?,
        date: row.get("date")?,
        out_time: row.get("outtime")?,
        in_time: row.get("intime")?,
        station: row.get("station")?,
        call_type: row.get("call_type")?,
        activity_live: row.get("activity_live")?,
        near_location: row.get("near")?,
        at_location: row.get("at")?,
        vehicle: row.get("vehicle")?,
        taluka: row.get("taluka")?,
        village: row.get("village")?,
        activity_sms: row.get("activity_sms")?,
    })
}

/// SQLite-backed store. Every call runs on the blocking pool against one
/// shared connection.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    table: Arc<str>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>, prefix: &str) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Self::with_connection(conn, prefix)
    }

    pub fn open_in_memory(prefix: &str) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?, prefix)
    }

    fn with_connection(conn: Connection, prefix: &str) -> Result<Self, StoreError> {
        validate_prefix(prefix)?;
        let table = format!("{prefix}{TABLE_SUFFIX}");
        conn.execute_batch(&schema_sql(&table))?;
        debug!("Ensured table {}", table);
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.into(),
        })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn find(&self, report_id: &str) -> Result<Option<Incident>, StoreError> {
        let report_id = report_id.to_string();
        self.run(move |conn, table| {
            let mut stmt =
                conn.prepare(&format!("SELECT {COLUMNS} FROM {table} WHERE dsr_id = ?1"))?;
            let found = stmt
                .query_map(params![report_id], row_to_incident)?
                .next()
                .transpose()?;
            Ok(found)
        })
        .await
    }

    pub async fn count(&self) -> Result<i64, StoreError> {
        self.run(|conn, table| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
        })
        .await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &str) -> rusqlite::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        let table = Arc::clone(&self.table);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            f(&mut *guard, &*table).map_err(StoreError::from)
        })
        .await?
    }
}

fn upsert_sync(
    conn: &mut Connection,
    table: &str,
    report: &IncidentReport,
) -> rusqlite::Result<UpsertOutcome> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let existed: bool = tx.query_row(
        &format!("SELECT EXISTS(SELECT 1 FROM {table} WHERE dsr_id = ?1)"),
        params![report.report_id],
        |row| row.get(0),
    )?;
    tx.execute(
        &format!(
            "INSERT INTO {table} (dsr_id, date, outtime, intime, station, call_type,
                activity_live, near, at, vehicle, taluka, village, activity_sms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(dsr_id) DO UPDATE SET
                date = excluded.date,
                outtime = excluded.outtime,
                intime = excluded.intime,
                station = excluded.station,
                call_type = excluded.call_type,
                activity_live = excluded.activity_live,
                near = excluded.near,
                at = excluded.at,
                vehicle = excluded.vehicle,
                taluka = excluded.taluka,
                village = excluded.village,
                activity_sms = excluded.activity_sms"
        ),
        params![
            report.report_id,
            report.date,
            report.out_time,
            report.in_time,
            report.station,
            report.call_type,
            report.activity_live,
            report.near_location,
            report.at_location,
            report.vehicle,
            report.taluka,
            report.village,
            report.activity_sms,
        ],
    )?;
    tx.commit()?;
    Ok(if existed {
        UpsertOutcome::Updated
    } else {
        UpsertOutcome::Inserted
    })
}

#[async_trait]
impl IncidentStore for SqliteStore {
    async fn upsert(&self, report: IncidentReport) -> Result<UpsertOutcome, StoreError> {
        self.run(move |conn, table| upsert_sync(conn, table, &report))
            .await
    }

    async fn recent(&self, since: i64) -> Result<Vec<Incident>, StoreError> {
        self.run(move |conn, table| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM {table} WHERE date >= ?1 ORDER BY date DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map(params![since], row_to_incident)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }
}
