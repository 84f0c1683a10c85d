//! Catalog Store (C2): persistence over PostgreSQL via `sqlx`.
//!
//! Grounded on `original_source/data_parser/job_processor.py`'s `fetch_jobs` (raw
//! `FOR UPDATE SKIP LOCKED` query), `_mark_jobs_processing`, and `_update_job_status`
//! (fresh session on failure) — translated into a connection-pooled `sqlx::PgPool` store.

use chrono::NaiveDate;
use futures::{Stream, TryStreamExt};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{Agency, Job, JobStatus, Title, TitleVersion, WordCountRecord};

/// Idempotent schema setup. Full migration tooling is out of scope (spec §1); this mirrors
/// the "run an embedded schema string at pool construction" idiom this corpus already uses.
const CREATE_TABLES: &str = r#"
CREATE TABLE IF NOT EXISTS agencies (
    id BIGSERIAL PRIMARY KEY,
    agency_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    short_name TEXT,
    display_name TEXT NOT NULL,
    sortable_name TEXT,
    docs JSONB NOT NULL DEFAULT '[]',
    slug TEXT NOT NULL UNIQUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS titles (
    id BIGSERIAL PRIMARY KEY,
    number INTEGER NOT NULL UNIQUE,
    name TEXT NOT NULL,
    latest_amended_on DATE,
    latest_issue_date DATE,
    up_to_date_as_of DATE,
    reserved BOOLEAN NOT NULL DEFAULT false,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS title_versions (
    id BIGSERIAL PRIMARY KEY,
    title_number INTEGER NOT NULL REFERENCES titles(number),
    version_date DATE NOT NULL,
    amendment_date DATE,
    issue_date DATE,
    identifier TEXT,
    name TEXT,
    part TEXT,
    substantive BOOLEAN,
    removed BOOLEAN,
    subpart TEXT,
    type TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (title_number, version_date, part, subpart)
);

CREATE TABLE IF NOT EXISTS version_processing_jobs (
    id BIGSERIAL PRIMARY KEY,
    title_number INTEGER NOT NULL,
    version_date DATE NOT NULL,
    status TEXT NOT NULL DEFAULT 'PENDING',
    attempt_count INTEGER NOT NULL DEFAULT 0,
    last_attempt_at TIMESTAMPTZ,
    error_message TEXT,
    lock_id UUID,
    lock_acquired_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (title_number, version_date)
);

CREATE TABLE IF NOT EXISTS version_word_counts (
    id BIGSERIAL PRIMARY KEY,
    task_id BIGINT NOT NULL REFERENCES version_processing_jobs(id),
    title_number INTEGER NOT NULL,
    version_date DATE NOT NULL,
    type TEXT NOT NULL,
    code TEXT NOT NULL,
    word_statistics JSONB NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    UNIQUE (task_id, title_number, version_date, type, code)
);
"#;

#[derive(Clone)]
pub struct CatalogStore {
    pool: PgPool,
}

impl CatalogStore {
    pub async fn connect(database_url: &str) -> PipelineResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.run_schema().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run_schema(&self) -> PipelineResult<()> {
        sqlx::query(CREATE_TABLES).execute(&self.pool).await?;
        Ok(())
    }

    // ---- ingestion (C1 consumer) -----------------------------------------------------

    pub async fn upsert_agencies(&self, agencies: &[Agency]) -> PipelineResult<()> {
        let mut tx = self.pool.begin().await?;
        for agency in agencies {
            let docs = serde_json::to_value(&agency.docs)
                .map_err(|e| PipelineError::Data(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO agencies (agency_id, name, short_name, display_name, sortable_name, docs, slug)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (agency_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    short_name = EXCLUDED.short_name,
                    display_name = EXCLUDED.display_name,
                    sortable_name = EXCLUDED.sortable_name,
                    docs = EXCLUDED.docs,
                    slug = EXCLUDED.slug
                "#,
            )
            .bind(&agency.agency_id)
            .bind(&agency.name)
            .bind(&agency.short_name)
            .bind(&agency.display_name)
            .bind(&agency.sortable_name)
            .bind(docs)
            .bind(&agency.slug)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_titles(&self, titles: &[Title]) -> PipelineResult<()> {
        let mut tx = self.pool.begin().await?;
        for title in titles {
            sqlx::query(
                r#"
                INSERT INTO titles (number, name, latest_amended_on, latest_issue_date, up_to_date_as_of, reserved)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (number) DO UPDATE SET
                    name = EXCLUDED.name,
                    latest_amended_on = EXCLUDED.latest_amended_on,
                    latest_issue_date = EXCLUDED.latest_issue_date,
                    up_to_date_as_of = EXCLUDED.up_to_date_as_of,
                    reserved = EXCLUDED.reserved
                "#,
            )
            .bind(title.number)
            .bind(&title.name)
            .bind(title.latest_amended_on)
            .bind(title.latest_issue_date)
            .bind(title.up_to_date_as_of)
            .bind(title.reserved)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn upsert_title_versions(
        &self,
        title_number: i32,
        versions: &[TitleVersion],
    ) -> PipelineResult<()> {
        let mut tx = self.pool.begin().await?;
        for v in versions {
            sqlx::query(
                r#"
                INSERT INTO title_versions
                    (title_number, version_date, amendment_date, issue_date, identifier, name, part, substantive, removed, subpart, type)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (title_number, version_date, part, subpart) DO UPDATE SET
                    amendment_date = EXCLUDED.amendment_date,
                    issue_date = EXCLUDED.issue_date,
                    identifier = EXCLUDED.identifier,
                    name = EXCLUDED.name,
                    substantive = EXCLUDED.substantive,
                    removed = EXCLUDED.removed,
                    type = EXCLUDED.type
                "#,
            )
            .bind(title_number)
            .bind(v.version_date)
            .bind(v.amendment_date)
            .bind(v.issue_date)
            .bind(&v.identifier)
            .bind(&v.name)
            .bind(&v.part)
            .bind(v.substantive)
            .bind(v.removed)
            .bind(&v.subpart)
            .bind(&v.r#type)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    // ---- catalog reads ------------------------------------------------------------

    pub async fn list_agencies(&self) -> PipelineResult<Vec<Agency>> {
        let rows = sqlx::query_as::<_, Agency>(
            "SELECT agency_id, name, short_name, display_name, sortable_name, docs, slug FROM agencies",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_title_numbers(&self) -> PipelineResult<Vec<i32>> {
        let rows = sqlx::query_scalar::<_, i32>("SELECT number FROM titles ORDER BY number")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn list_versions_for_title(
        &self,
        title_number: i32,
    ) -> PipelineResult<Vec<TitleVersion>> {
        let rows = sqlx::query_as::<_, TitleVersion>(
            r#"
            SELECT title_number, version_date, amendment_date, issue_date, identifier, name,
                   part, substantive, removed, subpart, type
            FROM title_versions
            WHERE title_number = $1
            ORDER BY version_date DESC
            "#,
        )
        .bind(title_number)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    // ---- planner (C3) ---------------------------------------------------------------

    /// Idempotent on `(title_number, version_date)` via the unique index (spec §4.2, §9).
    /// Commits every 100 rows plus a final remainder commit to bound transaction size
    /// (spec §4.3, grounded on `job_queue.py::create_processing_jobs_for_title_versions`'s
    /// `if jobs_created % 100 == 0: commit()`), rather than one giant transaction per title.
    pub async fn create_pending_jobs_for_title(
        &self,
        title_number: i32,
        version_dates: &[NaiveDate],
    ) -> PipelineResult<usize> {
        const COMMIT_BATCH_SIZE: usize = 100;
        let mut created = 0;
        for chunk in version_dates.chunks(COMMIT_BATCH_SIZE) {
            let mut tx = self.pool.begin().await?;
            for &version_date in chunk {
                sqlx::query(
                    r#"
                    INSERT INTO version_processing_jobs (title_number, version_date, status)
                    VALUES ($1, $2, 'PENDING')
                    ON CONFLICT (title_number, version_date) DO NOTHING
                    "#,
                )
                .bind(title_number)
                .bind(version_date)
                .execute(&mut *tx)
                .await?;
                created += 1;
            }
            tx.commit().await?;
        }
        Ok(created)
    }

    // ---- dispatcher (C7) --------------------------------------------------------------

    /// Claims up to `batch_size` PENDING jobs under `FOR UPDATE SKIP LOCKED`, flips them to
    /// PROCESSING, and commits before returning — the critical ordering contract of spec §5.
    pub async fn claim_pending_jobs(
        &self,
        batch_size: i64,
        lock_id: Uuid,
    ) -> PipelineResult<Vec<Job>> {
        let mut tx = self.pool.begin().await?;

        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT id FROM version_processing_jobs
            WHERE status = 'PENDING'
            ORDER BY created_at
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(batch_size)
        .fetch_all(&mut *tx)
        .await?;

        if ids.is_empty() {
            tx.commit().await?;
            return Ok(Vec::new());
        }

        let jobs = sqlx::query_as::<_, Job>(
            r#"
            UPDATE version_processing_jobs
            SET status = 'PROCESSING',
                attempt_count = attempt_count + 1,
                lock_id = $2,
                lock_acquired_at = now(),
                updated_at = now()
            WHERE id = ANY($1)
            RETURNING id, title_number, version_date, status, attempt_count, lock_id,
                      lock_acquired_at, error_message, created_at, updated_at, last_attempt_at
            "#,
        )
        .bind(&ids)
        .bind(lock_id)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(jobs)
    }

    pub async fn update_job_status(
        &self,
        job_id: i64,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> PipelineResult<()> {
        sqlx::query(
            r#"
            UPDATE version_processing_jobs
            SET status = $2,
                error_message = $3,
                last_attempt_at = now(),
                updated_at = now(),
                lock_id = NULL,
                lock_acquired_at = NULL
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(status.as_str())
        .bind(error_message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes any previously-persisted word counts for `task_id`, then inserts `rows`, in a
    /// single transaction — the delete-then-insert rerun policy resolved in DESIGN.md.
    pub async fn replace_word_counts(
        &self,
        task_id: i64,
        rows: &[WordCountRecord],
    ) -> PipelineResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM version_word_counts WHERE task_id = $1")
            .bind(task_id)
            .execute(&mut *tx)
            .await?;

        for row in rows {
            let stats = serde_json::to_value(&row.word_statistics)
                .map_err(|e| PipelineError::Data(e.to_string()))?;
            sqlx::query(
                r#"
                INSERT INTO version_word_counts (task_id, title_number, version_date, type, code, word_statistics)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(row.task_id)
            .bind(row.title_number)
            .bind(row.version_date)
            .bind(&row.r#type)
            .bind(&row.code)
            .bind(stats)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Resets PROCESSING jobs whose lock is older than `ttl` back to PENDING (spec §5 lock
    /// TTL sweeper). Returns the number of jobs reclaimed.
    pub async fn reclaim_expired_locks(&self, ttl_seconds: i64) -> PipelineResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE version_processing_jobs
            SET status = 'PENDING',
                lock_id = NULL,
                lock_acquired_at = NULL,
                updated_at = now()
            WHERE status = 'PROCESSING'
              AND lock_acquired_at < now() - ($1 || ' seconds')::interval
            "#,
        )
        .bind(ttl_seconds.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// All persisted word counts, for the Aggregator (C8), as a lazy sequence (spec §4.2): rows
    /// stream off the wire one at a time rather than materializing the whole table, since
    /// aggregation runs over potentially millions of rows (spec §1).
    pub fn stream_word_counts(
        &self,
    ) -> impl Stream<Item = PipelineResult<WordCountRecord>> + '_ {
        sqlx::query(
            "SELECT task_id, title_number, version_date, type, code, word_statistics FROM version_word_counts",
        )
        .fetch(&self.pool)
        .map_err(PipelineError::from)
        .and_then(|row| async move {
            let stats: serde_json::Value = row.try_get("word_statistics")?;
            let word_statistics = serde_json::from_value(stats)
                .map_err(|e| PipelineError::Data(e.to_string()))?;
            Ok(WordCountRecord {
                task_id: row.try_get("task_id")?,
                title_number: row.try_get("title_number")?,
                version_date: row.try_get("version_date")?,
                r#type: row.try_get("type")?,
                code: row.try_get("code")?,
                word_statistics,
            })
        })
    }
}
