//! Graph upsert engine and user-scoped similarity queries.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use recall_core::{
    ContextHit, EntityKind, Error, GraphData, GraphEmbeddings, GraphLink, GraphNode, GraphRepository,
    JobPayload, Result, Vector,
};

/// PostgreSQL + pgvector implementation of GraphRepository.
///
/// All writes use natural-key MERGE semantics (`INSERT … ON CONFLICT`):
/// node upserts always refresh the name/embedding attributes, edge upserts
/// are no-ops on conflict. Redelivered jobs are therefore idempotent
/// without any application-level locking.
pub struct PgGraphRepository {
    pool: Pool<Postgres>,
}

impl PgGraphRepository {
    /// Create a new PgGraphRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn similar_for_kind(
        &self,
        kind: EntityKind,
        user_id: &str,
        query: &Vector,
        limit: i64,
    ) -> Result<Vec<ContextHit>> {
        // Each kind is filtered to nodes reachable from the requesting
        // user's SUBMITTED edge chain. DISTINCT ON collapses multi-path
        // reachability; the wrapper re-orders by score after dedup.
        let sql = match kind {
            EntityKind::Problem => {
                "SELECT name, score FROM (
                     SELECT p.name AS name,
                            1.0 - (p.embedding <=> $1::vector) AS score
                     FROM graph_problem p
                     JOIN submitted s ON s.problem_url = p.url
                     WHERE s.user_id = $2
                 ) sub ORDER BY score DESC LIMIT $3"
            }
            EntityKind::Approach => {
                "SELECT name, score FROM (
                     SELECT DISTINCT ON (a.name)
                            a.name AS name,
                            1.0 - (a.embedding <=> $1::vector) AS score
                     FROM graph_approach a
                     JOIN solved_with sw ON sw.approach_name = a.name
                     JOIN submitted s ON s.problem_url = sw.problem_url
                     WHERE s.user_id = $2
                     ORDER BY a.name, a.embedding <=> $1::vector
                 ) sub ORDER BY score DESC LIMIT $3"
            }
            EntityKind::Concept => {
                "SELECT name, score FROM (
                     SELECT DISTINCT ON (c.name)
                            c.name AS name,
                            1.0 - (c.embedding <=> $1::vector) AS score
                     FROM graph_concept c
                     JOIN belongs_to bt ON bt.concept_name = c.name
                     JOIN solved_with sw ON sw.approach_name = bt.approach_name
                     JOIN submitted s ON s.problem_url = sw.problem_url
                     WHERE s.user_id = $2
                     ORDER BY c.name, c.embedding <=> $1::vector
                 ) sub ORDER BY score DESC LIMIT $3"
            }
        };

        let rows = sqlx::query(sql)
            .bind(query)
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| ContextHit {
                kind,
                name: row.get("name"),
                score: row.get::<f64, _>("score") as f32,
            })
            .collect())
    }
}

#[async_trait]
impl GraphRepository for PgGraphRepository {
    async fn apply_job(&self, payload: &JobPayload, embeddings: &GraphEmbeddings) -> Result<()> {
        let problem = &payload.problem;
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query("INSERT INTO graph_user (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(&payload.user_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO graph_problem (url, name, embedding)
             VALUES ($1, $2, $3)
             ON CONFLICT (url) DO UPDATE
             SET name = EXCLUDED.name, embedding = EXCLUDED.embedding",
        )
        .bind(&problem.url)
        .bind(&problem.name)
        .bind(&embeddings.problem)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO graph_approach (name, embedding)
             VALUES ($1, $2)
             ON CONFLICT (name) DO UPDATE SET embedding = EXCLUDED.embedding",
        )
        .bind(&problem.approach_name)
        .bind(&embeddings.approach)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO graph_concept (name, embedding)
             VALUES ($1, $2)
             ON CONFLICT (name) DO UPDATE SET embedding = EXCLUDED.embedding",
        )
        .bind(&problem.domain)
        .bind(&embeddings.concept)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO submitted (user_id, problem_url)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(&payload.user_id)
        .bind(&problem.url)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO solved_with (problem_url, approach_name)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(&problem.url)
        .bind(&problem.approach_name)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query(
            "INSERT INTO belongs_to (approach_name, concept_name)
             VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(&problem.approach_name)
        .bind(&problem.domain)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        tracing::info!(
            subsystem = "graph",
            component = "graph_upsert",
            op = "apply_job",
            user_id = %payload.user_id,
            problem_url = %problem.url,
            "Knowledge graph updated"
        );
        Ok(())
    }

    async fn similar_entities(
        &self,
        user_id: &str,
        query: &Vector,
        per_kind: i64,
    ) -> Result<Vec<ContextHit>> {
        let mut hits = Vec::new();
        for kind in [EntityKind::Problem, EntityKind::Approach, EntityKind::Concept] {
            hits.extend(self.similar_for_kind(kind, user_id, query, per_kind).await?);
        }

        tracing::debug!(
            subsystem = "graph",
            component = "retrieval",
            op = "similar_entities",
            user_id = %user_id,
            result_count = hits.len(),
            "Similarity retrieval complete"
        );
        Ok(hits)
    }

    async fn user_subgraph(&self, user_id: &str) -> Result<GraphData> {
        let mut nodes = vec![GraphNode {
            id: format!("user:{user_id}"),
            label: "User".to_string(),
            name: user_id.to_string(),
            url: None,
        }];
        let mut links = Vec::new();

        let problems = sqlx::query(
            "SELECT p.url, p.name FROM graph_problem p
             JOIN submitted s ON s.problem_url = p.url
             WHERE s.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        for row in &problems {
            let url: String = row.get("url");
            nodes.push(GraphNode {
                id: format!("problem:{url}"),
                label: "Problem".to_string(),
                name: row.get("name"),
                url: Some(url.clone()),
            });
            links.push(GraphLink {
                source: format!("user:{user_id}"),
                target: format!("problem:{url}"),
                label: "SUBMITTED".to_string(),
            });
        }

        let approaches = sqlx::query(
            "SELECT DISTINCT sw.problem_url, sw.approach_name
             FROM solved_with sw
             JOIN submitted s ON s.problem_url = sw.problem_url
             WHERE s.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut seen_approaches = std::collections::HashSet::new();
        for row in &approaches {
            let name: String = row.get("approach_name");
            let problem_url: String = row.get("problem_url");
            if seen_approaches.insert(name.clone()) {
                nodes.push(GraphNode {
                    id: format!("approach:{name}"),
                    label: "Approach".to_string(),
                    name: name.clone(),
                    url: None,
                });
            }
            links.push(GraphLink {
                source: format!("problem:{problem_url}"),
                target: format!("approach:{name}"),
                label: "SOLVED_WITH".to_string(),
            });
        }

        let concepts = sqlx::query(
            "SELECT DISTINCT bt.approach_name, bt.concept_name
             FROM belongs_to bt
             JOIN solved_with sw ON sw.approach_name = bt.approach_name
             JOIN submitted s ON s.problem_url = sw.problem_url
             WHERE s.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut seen_concepts = std::collections::HashSet::new();
        for row in &concepts {
            let concept: String = row.get("concept_name");
            let approach: String = row.get("approach_name");
            if seen_concepts.insert(concept.clone()) {
                nodes.push(GraphNode {
                    id: format!("concept:{concept}"),
                    label: "Concept".to_string(),
                    name: concept.clone(),
                    url: None,
                });
            }
            links.push(GraphLink {
                source: format!("approach:{approach}"),
                target: format!("concept:{concept}"),
                label: "BELONGS_TO".to_string(),
            });
        }

        Ok(GraphData { nodes, links })
    }
}
