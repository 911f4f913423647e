/// Workflow persistence
///
/// Graph definitions live in a single SQLite table as JSON, keyed by graph
/// id. Storage is deliberately dumb: no versioning, no soft deletes — the
/// in-memory graph registry is rebuilt from here at startup and kept current
/// by the API handlers.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::workflow::types::WorkflowGraph;

pub struct WorkflowStorage {
    pool: SqlitePool,
}

impl WorkflowStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS workflows (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                definition TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        tracing::info!("🗄️ workflow schema ready");
        Ok(())
    }

    /// Insert or replace a graph definition.
    pub async fn save(&self, graph: &WorkflowGraph) -> Result<()> {
        let definition = serde_json::to_string(graph)?;
        sqlx::query(
            r#"
            INSERT INTO workflows (id, name, definition)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                definition = excluded.definition,
                updated_at = datetime('now')
            "#,
        )
        .bind(&graph.id)
        .bind(&graph.name)
        .bind(&definition)
        .execute(&self.pool)
        .await?;
        tracing::info!("💾 saved workflow '{}' ({})", graph.name, graph.id);
        Ok(())
    }

    pub async fn get(&self, id: &str) -> Result<Option<WorkflowGraph>> {
        let row = sqlx::query("SELECT definition FROM workflows WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let definition: String = row.get("definition");
                Ok(Some(serde_json::from_str(&definition)?))
            }
            None => Ok(None),
        }
    }

    pub async fn load_all(&self) -> Result<Vec<WorkflowGraph>> {
        let rows = sqlx::query("SELECT definition FROM workflows ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        let mut graphs = Vec::with_capacity(rows.len());
        for row in rows {
            let definition: String = row.get("definition");
            match serde_json::from_str(&definition) {
                Ok(graph) => graphs.push(graph),
                Err(e) => tracing::warn!("⚠️ skipping unparsable workflow row: {}", e),
            }
        }
        Ok(graphs)
    }

    /// Returns whether a row was actually removed.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::types::{Connection, ErrorPolicy, Node};
    use serde_json::Value;

    async fn storage() -> WorkflowStorage {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        let storage = WorkflowStorage::new(pool);
        storage.init_schema().await.unwrap();
        storage
    }

    fn graph(id: &str) -> WorkflowGraph {
        WorkflowGraph {
            id: id.to_string(),
            name: format!("Graph {id}"),
            nodes: vec![Node {
                id: "a".to_string(),
                name: "A".to_string(),
                node_type: "custom.noop".to_string(),
                params: Value::Null,
                on_error: ErrorPolicy::default(),
                retry_on_fail: false,
            }],
            connections: Vec::<Connection>::new(),
        }
    }

    #[tokio::test]
    async fn save_and_get_round_trip() {
        let storage = storage().await;
        storage.save(&graph("wf-1")).await.unwrap();

        let loaded = storage.get("wf-1").await.unwrap().unwrap();
        assert_eq!(loaded.id, "wf-1");
        assert_eq!(loaded.nodes.len(), 1);
        assert!(storage.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let storage = storage().await;
        storage.save(&graph("wf-1")).await.unwrap();

        let mut updated = graph("wf-1");
        updated.name = "Renamed".to_string();
        storage.save(&updated).await.unwrap();

        let loaded = storage.get("wf-1").await.unwrap().unwrap();
        assert_eq!(loaded.name, "Renamed");
        assert_eq!(storage.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_reports_whether_row_existed() {
        let storage = storage().await;
        storage.save(&graph("wf-1")).await.unwrap();
        assert!(storage.delete("wf-1").await.unwrap());
        assert!(!storage.delete("wf-1").await.unwrap());
    }
}
