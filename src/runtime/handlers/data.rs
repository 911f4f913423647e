/// SQLite data handlers
///
/// `data.write` persists incoming items into a named table, `data.read` pulls
/// rows back out as items. Tables are created on first write with TEXT
/// columns, so node authors only declare the column list. All identifiers
/// coming from params are sanitized before they touch SQL text; values always
/// go through bind parameters.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use sqlx::{Column, Row, SqlitePool};

use crate::runtime::handlers::{HandlerContext, NodeHandler};
use crate::workflow::types::Node;

/// Identifiers are interpolated into DDL/DML, so only `[A-Za-z0-9_]` passes
/// and the first character must not be a digit.
fn sanitize_identifier(raw: &str) -> anyhow::Result<String> {
    let clean: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if clean.is_empty() || clean.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        anyhow::bail!("invalid SQL identifier: '{}'", raw);
    }
    Ok(clean)
}

fn table_param(node: &Node) -> anyhow::Result<String> {
    let table = node
        .params
        .get("table")
        .and_then(|t| t.as_str())
        .ok_or_else(|| anyhow::anyhow!("node '{}' missing 'table' param", node.id))?;
    sanitize_identifier(table)
}

fn column_params(node: &Node) -> anyhow::Result<Vec<String>> {
    let columns = node
        .params
        .get("columns")
        .and_then(|c| c.as_array())
        .ok_or_else(|| anyhow::anyhow!("node '{}' missing 'columns' param", node.id))?;
    columns
        .iter()
        .map(|c| {
            c.as_str()
                .ok_or_else(|| anyhow::anyhow!("column names must be strings"))
                .and_then(sanitize_identifier)
        })
        .collect()
}

/// Writes every incoming item as one row, taking values from the item's
/// object fields by column name. Items pass through unchanged so the node can
/// sit mid-chain.
///
/// Expected params: `{ "table": "events", "columns": ["kind", "payload"] }`
pub struct DataWriteHandler {
    pool: SqlitePool,
}

impl DataWriteHandler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn ensure_table_exists(&self, table: &str, columns: &[String]) -> anyhow::Result<()> {
        let column_defs: Vec<String> = columns.iter().map(|c| format!("{} TEXT", c)).collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (id INTEGER PRIMARY KEY AUTOINCREMENT, {})",
            table,
            column_defs.join(", ")
        );
        sqlx::query(&sql).execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl NodeHandler for DataWriteHandler {
    async fn execute(
        &self,
        node: &Node,
        items: Vec<Value>,
        _ctx: &HandlerContext,
    ) -> anyhow::Result<Vec<Value>> {
        let table = table_param(node)?;
        let columns = column_params(node)?;
        self.ensure_table_exists(&table, &columns).await?;

        let placeholders: Vec<&str> = columns.iter().map(|_| "?").collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders.join(", ")
        );

        let mut written = 0u64;
        for item in &items {
            let mut query = sqlx::query(&sql);
            for column in &columns {
                let value = item.get(column).cloned().unwrap_or(Value::Null);
                let text = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                };
                query = query.bind(text);
            }
            query.execute(&self.pool).await?;
            written += 1;
        }

        tracing::debug!("💾 wrote {} row(s) to '{}' (node: {})", written, table, node.id);
        Ok(items)
    }
}

/// Reads rows back as items, each row becoming one object keyed by column
/// name. Input items are ignored.
///
/// Expected params: `{ "table": "events", "where": "kind = 'error'",
/// "limit": 100 }` — `where` and `limit` optional.
pub struct DataReadHandler {
    pool: SqlitePool,
}

impl DataReadHandler {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NodeHandler for DataReadHandler {
    async fn execute(
        &self,
        node: &Node,
        _items: Vec<Value>,
        _ctx: &HandlerContext,
    ) -> anyhow::Result<Vec<Value>> {
        let table = table_param(node)?;
        let limit = node
            .params
            .get("limit")
            .and_then(|l| l.as_u64())
            .unwrap_or(100);

        let mut sql = format!("SELECT * FROM {}", table);
        // The filter clause is free-form SQL; the table name above is the
        // trust boundary, the clause is the node author's responsibility.
        if let Some(filter) = node.params.get("where").and_then(|w| w.as_str()) {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        sql.push_str(&format!(" LIMIT {}", limit));

        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        tracing::debug!("📖 read {} row(s) from '{}' (node: {})", rows.len(), table, node.id);

        let items = rows
            .into_iter()
            .map(|row| {
                let mut object = Map::new();
                for column in row.columns() {
                    let name = column.name().to_string();
                    let value: Option<String> = row.try_get(name.as_str()).ok();
                    match value {
                        Some(text) => {
                            // Values round-trip as TEXT; recover structure
                            // where the stored text parses as JSON.
                            let parsed =
                                serde_json::from_str::<Value>(&text).unwrap_or(Value::String(text));
                            object.insert(name, parsed);
                        }
                        None => {
                            let id: Option<i64> = row.try_get(name.as_str()).ok();
                            object.insert(name, id.map(|v| json!(v)).unwrap_or(Value::Null));
                        }
                    }
                }
                Value::Object(object)
            })
            .collect();

        Ok(items)
    }
}
