use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{QueryBuilder, Sqlite};
use uuid::Uuid;

use super::{JobStore, StoreError, StoreResult};
use crate::lifecycle::{JobRecord, JobState, RecordFilter, RecordPatch};

/// `active_slot` is 1 while a record is active and NULL once archived.
/// SQLite allows any number of NULLs under UNIQUE, so the constraint admits
/// exactly one active row.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS job_records (
    id TEXT PRIMARY KEY,
    job_id TEXT NOT NULL,
    part_name TEXT NOT NULL,
    machine_name TEXT NOT NULL,
    start_time TEXT NOT NULL,
    end_time TEXT,
    duration TEXT,
    active_slot INTEGER UNIQUE CHECK (active_slot = 1)
)
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, job_id, part_name, machine_name, start_time, end_time, duration FROM job_records";

type RecordRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

#[derive(Debug, Clone)]
pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    /// Open (creating if missing) the database at `database_url` and apply the schema.
    ///
    /// # Errors
    /// Returns `StoreError::Unavailable` if the URL is invalid or the connection fails.
    #[tracing::instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| StoreError::Unavailable(format!("Invalid database URL: {e}")))?
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .create_if_missing(true);

        let pool = SqlitePool::connect_with(options).await.map_err(unavailable)?;
        let store = Self { pool };
        store.migrate().await?;

        tracing::debug!("sqlite job store ready");
        Ok(store)
    }

    /// Private in-memory database on a single long-lived connection.
    pub async fn connect_in_memory() -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StoreError::Unavailable(format!("Invalid database URL: {e}")))?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(unavailable)?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    #[tracing::instrument(skip(self))]
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_job_records_job_id ON job_records (job_id)")
            .execute(&self.pool)
            .await
            .map_err(unavailable)?;
        Ok(())
    }

    async fn active_job_id(&self) -> StoreResult<Option<String>> {
        let row = sqlx::query_as::<_, (String,)>(
            "SELECT job_id FROM job_records WHERE active_slot = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(unavailable)?;
        Ok(row.map(|(job_id,)| job_id))
    }

    async fn fetch_by_id(&self, id: Uuid) -> StoreResult<Option<JobRecord>> {
        let row = sqlx::query_as::<_, RecordRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(row_to_record).transpose()
    }

    fn filtered_query<'a>(filter: &'a RecordFilter) -> QueryBuilder<'a, Sqlite> {
        let mut qb = QueryBuilder::<Sqlite>::new(SELECT_COLUMNS);
        qb.push(" WHERE 1 = 1");
        if let Some(ref job_id) = filter.job_id {
            qb.push(" AND job_id = ").push_bind(job_id.as_str());
        }
        match filter.state {
            Some(JobState::Active) => {
                qb.push(" AND end_time IS NULL");
            }
            Some(JobState::Archived) => {
                qb.push(" AND end_time IS NOT NULL");
            }
            None => {}
        }
        qb.push(" ORDER BY rowid");
        qb
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    #[tracing::instrument(skip(self, record), fields(job_id = %record.job_id))]
    async fn insert(&self, record: JobRecord) -> StoreResult<JobRecord> {
        let active_slot: Option<i64> = record.is_active().then_some(1);
        let result = sqlx::query(
            r#"
            INSERT INTO job_records
                (id, job_id, part_name, machine_name, start_time, end_time, duration, active_slot)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.job_id)
        .bind(&record.part_name)
        .bind(&record.machine_name)
        .bind(encode_time(record.start_time))
        .bind(record.end_time.map(encode_time))
        .bind(record.duration.as_deref())
        .bind(active_slot)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(record),
            Err(sqlx::Error::Database(ref db_err)) if db_err.is_unique_violation() => {
                if record.is_active() {
                    let job_id = self
                        .active_job_id()
                        .await?
                        .unwrap_or_else(|| "unknown".to_string());
                    Err(StoreError::ActiveExists { job_id })
                } else {
                    Err(StoreError::Corrupt(format!(
                        "duplicate record id {}",
                        record.id
                    )))
                }
            }
            Err(e) => Err(unavailable(e)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn find_one(&self, filter: &RecordFilter) -> StoreResult<Option<JobRecord>> {
        let mut qb = Self::filtered_query(filter);
        qb.push(" LIMIT 1");
        let row = qb
            .build_query_as::<RecordRow>()
            .fetch_optional(&self.pool)
            .await
            .map_err(unavailable)?;
        row.map(row_to_record).transpose()
    }

    #[tracing::instrument(skip(self))]
    async fn find_many(&self, filter: &RecordFilter) -> StoreResult<Vec<JobRecord>> {
        let mut qb = Self::filtered_query(filter);
        let rows = qb
            .build_query_as::<RecordRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(unavailable)?;
        rows.into_iter().map(row_to_record).collect()
    }

    #[tracing::instrument(skip(self, patch), fields(record_id = %id))]
    async fn update(&self, id: Uuid, patch: RecordPatch) -> StoreResult<JobRecord> {
        let result = sqlx::query(
            r#"
            UPDATE job_records
            SET end_time = ?, duration = ?, active_slot = NULL
            WHERE id = ? AND end_time IS NULL
            "#,
        )
        .bind(encode_time(patch.end_time))
        .bind(&patch.duration)
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(unavailable)?;

        if result.rows_affected() == 0 {
            return match self.fetch_by_id(id).await? {
                Some(_) => Err(StoreError::Archived(id)),
                None => Err(StoreError::NotFound(id)),
            };
        }

        self.fetch_by_id(id).await?.ok_or(StoreError::NotFound(id))
    }
}

fn unavailable(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

fn encode_time(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn decode_time(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp {value:?}: {e}")))
}

fn row_to_record(row: RecordRow) -> StoreResult<JobRecord> {
    let (id, job_id, part_name, machine_name, start_time, end_time, duration) = row;
    let id = Uuid::parse_str(&id)
        .map_err(|e| StoreError::Corrupt(format!("bad record id {id:?}: {e}")))?;
    Ok(JobRecord {
        id,
        job_id,
        part_name,
        machine_name,
        start_time: decode_time(&start_time)?,
        end_time: end_time.as_deref().map(decode_time).transpose()?,
        duration,
    })
}
