use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use codejudge_core::{ExecutionError, Language, SubmissionRecord, VerdictStatus};
use codejudge_pipeline::VerdictSink;
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

mod embedded {
    refinery::embed_migrations!("migrations");
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Migration error: {0}")]
    Migration(#[from] refinery::Error),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
    #[error("Lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A persisted graded submission. Source is stored but never serialized.
#[derive(Debug, Clone, Serialize)]
pub struct StoredSubmission {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub identity: String,
    pub problem_id: String,
    pub language: Language,
    #[serde(skip_serializing)]
    pub source_code: String,
    pub status: VerdictStatus,
    pub passed_count: u32,
    pub total_count: u32,
}

pub struct SqliteSubmissionStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSubmissionStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self::with_connection(conn)?;
        tracing::info!("Submission store initialized at {:?}", path);
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self> {
        embedded::migrations::runner().run(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn insert(&self, record: &SubmissionRecord) -> Result<String> {
        insert_record(&self.conn, record, Utc::now())
    }

    pub fn get(&self, id: &str) -> Result<Option<StoredSubmission>> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;
        let mut rows = stmt.query_map(params![id], read_row)?;
        let found = rows.next().transpose()?.map(decode).transpose();
        found
    }

    /// Newest first.
    pub fn list_for_identity(
        &self,
        identity: &str,
        limit: usize,
    ) -> Result<Vec<StoredSubmission>> {
        self.list_where("identity", identity, limit)
    }

    /// Newest first.
    pub fn list_for_problem(
        &self,
        problem_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredSubmission>> {
        self.list_where("problem_id", problem_id, limit)
    }

    fn list_where(&self, column: &str, value: &str, limit: usize) -> Result<Vec<StoredSubmission>> {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        let sql = format!(
            "{} WHERE {} = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            SELECT_COLUMNS, column
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params![value, limit], read_row)?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(decode(row?)?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl VerdictSink for SqliteSubmissionStore {
    async fn persist(&self, record: &SubmissionRecord) -> codejudge_core::Result<()> {
        let conn = self.conn.clone();
        let record = record.clone();

        let id = tokio::task::spawn_blocking(move || insert_record(&conn, &record, Utc::now()))
            .await
            .map_err(|e| ExecutionError::Persistence(format!("write task failed: {}", e)))?
            .map_err(|e| ExecutionError::Persistence(e.to_string()))?;

        tracing::debug!("Saved submission {}", id);
        Ok(())
    }
}

const SELECT_COLUMNS: &str = "SELECT id, created_at, identity, problem_id, language, source_code, status, passed_count, total_count FROM submissions";

fn insert_record(
    conn: &Mutex<Connection>,
    record: &SubmissionRecord,
    created_at: DateTime<Utc>,
) -> Result<String> {
    let conn = conn.lock().map_err(|_| StoreError::LockPoisoned)?;
    let id = Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO submissions (id, created_at, identity, problem_id, language, source_code, status, passed_count, total_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            created_at.to_rfc3339(),
            record.identity,
            record.problem_id,
            record.language.runtime_name(),
            record.source_code,
            status_to_str(record.status),
            record.passed_count,
            record.total_count,
        ],
    )?;

    Ok(id)
}

struct RowData {
    id: String,
    created_at: String,
    identity: String,
    problem_id: String,
    language: String,
    source_code: String,
    status: String,
    passed_count: u32,
    total_count: u32,
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RowData> {
    Ok(RowData {
        id: row.get(0)?,
        created_at: row.get(1)?,
        identity: row.get(2)?,
        problem_id: row.get(3)?,
        language: row.get(4)?,
        source_code: row.get(5)?,
        status: row.get(6)?,
        passed_count: row.get(7)?,
        total_count: row.get(8)?,
    })
}

fn decode(row: RowData) -> Result<StoredSubmission> {
    let created_at = DateTime::parse_from_rfc3339(&row.created_at)
        .map_err(|e| StoreError::Corrupt(format!("created_at for {}: {}", row.id, e)))?
        .with_timezone(&Utc);
    let language: Language = row
        .language
        .parse()
        .map_err(|_| StoreError::Corrupt(format!("language for {}: {}", row.id, row.language)))?;
    let status = status_from_str(&row.status)
        .ok_or_else(|| StoreError::Corrupt(format!("status for {}: {}", row.id, row.status)))?;

    Ok(StoredSubmission {
        id: row.id,
        created_at,
        identity: row.identity,
        problem_id: row.problem_id,
        language,
        source_code: row.source_code,
        status,
        passed_count: row.passed_count,
        total_count: row.total_count,
    })
}

fn status_to_str(status: VerdictStatus) -> &'static str {
    match status {
        VerdictStatus::Accepted => "accepted",
        VerdictStatus::WrongAnswer => "wrong_answer",
    }
}

fn status_from_str(s: &str) -> Option<VerdictStatus> {
    match s {
        "accepted" => Some(VerdictStatus::Accepted),
        "wrong_answer" => Some(VerdictStatus::WrongAnswer),
        _ => None,
    }
}
