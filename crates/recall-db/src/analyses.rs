//! Idempotent analysis repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use recall_core::{
    AnalysisRecord, AnalysisRepository, AnalysisSnapshot, Difficulty, Error, Result,
    UpsertAnalysisRequest,
};

/// PostgreSQL implementation of AnalysisRepository.
///
/// Idempotency is store-level: the composite natural key
/// (user_id, url, approach_name) carries a unique constraint, and the
/// upsert is a single `INSERT … ON CONFLICT DO UPDATE`, so concurrent or
/// redelivered submissions can never create duplicate parents.
pub struct PgAnalysisRepository {
    pool: Pool<Postgres>,
}

impl PgAnalysisRepository {
    /// Create a new PgAnalysisRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_record_row(row: sqlx::postgres::PgRow) -> AnalysisRecord {
        AnalysisRecord {
            id: row.get("id"),
            user_id: row.get("user_id"),
            url: row.get("url"),
            approach_name: row.get("approach_name"),
            name: row.get("name"),
            domain: row.get("domain"),
            key_algorithm: row.get("key_algorithm"),
            difficulty: Difficulty::from_str_lossy(row.get("difficulty")),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    fn parse_snapshot_row(row: sqlx::postgres::PgRow) -> Result<AnalysisSnapshot> {
        let pseudo_code: serde_json::Value = row.get("pseudo_code");
        let tags: serde_json::Value = row.get("tags");
        Ok(AnalysisSnapshot {
            id: row.get("id"),
            problem_id: row.get("problem_id"),
            pseudo_code: serde_json::from_value(pseudo_code)?,
            time_complexity: row.get("time_complexity"),
            space_complexity: row.get("space_complexity"),
            tags: serde_json::from_value(tags)?,
            notes: row.get("notes"),
            created_at: row.get("created_at"),
        })
    }
}

#[async_trait]
impl AnalysisRepository for PgAnalysisRepository {
    async fn upsert_analysis(&self, req: UpsertAnalysisRequest) -> Result<Uuid> {
        let domain = req
            .outcome
            .domain()
            .ok_or_else(|| Error::InvalidInput("analysis tags missing domain".into()))?
            .to_string();
        let key_algorithm = req
            .outcome
            .key_algorithm()
            .ok_or_else(|| Error::InvalidInput("analysis tags missing key algorithm".into()))?
            .to_string();

        let now = Utc::now();
        let username = req
            .user_details
            .username
            .clone()
            .unwrap_or_else(|| req.user_id.clone());
        // Unique placeholder keeps the NOT NULL + UNIQUE email constraint
        // satisfied for identity providers that withhold the address.
        let email = req
            .user_details
            .email
            .clone()
            .unwrap_or_else(|| format!("{}@placeholder.email", req.user_id));

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Create-if-absent; never overwrites existing profile fields.
        sqlx::query(
            "INSERT INTO app_user (id, username, email, created_at)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO NOTHING",
        )
        .bind(&req.user_id)
        .bind(&username)
        .bind(&email)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        let problem_id: Uuid = sqlx::query_scalar(
            "INSERT INTO problem
                 (id, user_id, url, approach_name, name, domain, key_algorithm,
                  difficulty, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
             ON CONFLICT (user_id, url, approach_name) DO UPDATE
             SET name = EXCLUDED.name,
                 domain = EXCLUDED.domain,
                 key_algorithm = EXCLUDED.key_algorithm,
                 difficulty = EXCLUDED.difficulty,
                 updated_at = EXCLUDED.updated_at
             RETURNING id",
        )
        .bind(Uuid::now_v7())
        .bind(&req.user_id)
        .bind(&req.url)
        .bind(&req.outcome.approach_name)
        .bind(&req.outcome.name)
        .bind(&domain)
        .bind(&key_algorithm)
        .bind(req.outcome.difficulty.as_str())
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO analysis
                 (id, problem_id, pseudo_code, time_complexity, space_complexity,
                  tags, notes, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(Uuid::now_v7())
        .bind(problem_id)
        .bind(serde_json::to_value(&req.outcome.pseudo_code)?)
        .bind(&req.outcome.time)
        .bind(&req.outcome.space)
        .bind(serde_json::to_value(&req.outcome.tags)?)
        .bind(req.notes.as_deref().unwrap_or(""))
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        tracing::debug!(
            subsystem = "db",
            component = "analysis_writer",
            op = "upsert_analysis",
            user_id = %req.user_id,
            problem_url = %req.url,
            "Analysis upserted"
        );
        Ok(problem_id)
    }

    async fn get_by_natural_key(
        &self,
        user_id: &str,
        url: &str,
        approach_name: &str,
    ) -> Result<Option<AnalysisRecord>> {
        let row = sqlx::query(
            "SELECT id, user_id, url, approach_name, name, domain, key_algorithm,
                    difficulty, created_at, updated_at
             FROM problem
             WHERE user_id = $1 AND url = $2 AND approach_name = $3",
        )
        .bind(user_id)
        .bind(url)
        .bind(approach_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_record_row))
    }

    async fn snapshots(&self, problem_id: Uuid) -> Result<Vec<AnalysisSnapshot>> {
        let rows = sqlx::query(
            "SELECT id, problem_id, pseudo_code, time_complexity, space_complexity,
                    tags, notes, created_at
             FROM analysis
             WHERE problem_id = $1
             ORDER BY created_at ASC, id ASC",
        )
        .bind(problem_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        rows.into_iter().map(Self::parse_snapshot_row).collect()
    }
}
