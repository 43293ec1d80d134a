//! Neo4j over Bolt.
//!
//! Every write is a parameterized `MERGE`; labels and relationship types come
//! from closed enums and are the only parts spliced into query text.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use neo4rs::{query, BoltList, BoltMap, BoltString, BoltType, ConfigBuilder, Graph, Query};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wfgraph_model::{EdgeKind, EdgeSpec, NodeLabel, NodeRef, PropertyMap, PropertyValue};

use crate::{GraphStore, GraphSummary, StoreError};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    pub password: String,
    pub database: String,
    pub max_connections: usize,
}

impl Default for Neo4jConfig {
    fn default() -> Self {
        Self {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: String::new(),
            database: "neo4j".to_string(),
            max_connections: 16,
        }
    }
}

impl Neo4jConfig {
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.uri.trim().is_empty() {
            return Err(StoreError::Config("neo4j uri is empty".to_string()));
        }
        if self.password.is_empty() {
            return Err(StoreError::Config(
                "neo4j password is empty (set NEO4J_PASSWORD)".to_string(),
            ));
        }
        if self.max_connections == 0 {
            return Err(StoreError::Config(
                "neo4j max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// One row of `dbms.components()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerComponent {
    pub name: String,
    pub versions: Vec<String>,
    pub edition: String,
}

// ============================================================================
// Store
// ============================================================================

pub struct Neo4jStore {
    graph: Graph,
    uri: String,
}

impl std::fmt::Debug for Neo4jStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Neo4jStore").field("uri", &self.uri).finish()
    }
}

impl Neo4jStore {
    /// Open a connection pool and verify it with a round trip.
    pub async fn connect(config: &Neo4jConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let connect_err = |source| StoreError::Connect {
            uri: config.uri.clone(),
            source,
        };

        let bolt = ConfigBuilder::default()
            .uri(config.uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .db(config.database.as_str())
            .max_connections(config.max_connections)
            .build()
            .map_err(connect_err)?;
        let graph = Graph::connect(bolt).await.map_err(connect_err)?;

        let store = Self {
            graph,
            uri: config.uri.clone(),
        };
        match store.ping().await {
            Ok(message) => debug!(uri = %store.uri, %message, "neo4j ping"),
            Err(StoreError::Query(source)) => return Err(connect_err(source)),
            Err(other) => return Err(other),
        }
        info!(uri = %store.uri, database = %config.database, "connected to neo4j");
        Ok(store)
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub async fn ping(&self) -> Result<String, StoreError> {
        let mut stream = self
            .graph
            .execute(query("RETURN 'Connection successful!' AS message"))
            .await?;
        let row = stream
            .next()
            .await?
            .ok_or_else(|| StoreError::Result("ping returned no rows".to_string()))?;
        row.get::<String>("message")
            .map_err(|e| StoreError::Result(format!("ping: {e}")))
    }

    pub async fn components(&self) -> Result<Vec<ServerComponent>, StoreError> {
        let mut stream = self
            .graph
            .execute(query(
                "CALL dbms.components() YIELD name, versions, edition \
                 RETURN name, versions, edition",
            ))
            .await?;
        let mut components = Vec::new();
        while let Some(row) = stream.next().await? {
            let field = |e: neo4rs::DeError| StoreError::Result(format!("dbms.components: {e}"));
            components.push(ServerComponent {
                name: row.get("name").map_err(field)?,
                versions: row.get("versions").map_err(field)?,
                edition: row.get("edition").map_err(field)?,
            });
        }
        Ok(components)
    }

    /// Create a uniqueness constraint on each label's natural key.
    ///
    /// Missing schema privileges are logged and tolerated; `MERGE` keeps
    /// working without the constraints, only slower.
    pub async fn ensure_constraints(&self) {
        for label in NodeLabel::ALL {
            match self.graph.run(query(&constraint_cypher(label))).await {
                Ok(()) => debug!(%label, "uniqueness constraint ensured"),
                Err(e) => warn!(%label, error = %e, "could not create uniqueness constraint"),
            }
        }
    }

    async fn count_rows(&self, q: Query, column: &str) -> Result<BTreeMap<String, u64>, StoreError> {
        let mut stream = self.graph.execute(q).await?;
        let mut counts = BTreeMap::<String, u64>::new();
        while let Some(row) = stream.next().await? {
            let key: String = row
                .get(column)
                .map_err(|e| StoreError::Result(format!("{column}: {e}")))?;
            let count: i64 = row
                .get("count")
                .map_err(|e| StoreError::Result(format!("count: {e}")))?;
            *counts.entry(key).or_default() += u64::try_from(count).unwrap_or(0);
        }
        Ok(counts)
    }
}

#[async_trait]
impl GraphStore for Neo4jStore {
    async fn upsert_node(&self, node: &NodeRef, properties: &PropertyMap) -> Result<(), StoreError> {
        let q = query(&upsert_cypher(node.label))
            .param("key", node.key.as_str())
            .param("props", bolt_map(properties));
        self.graph.run(q).await?;
        Ok(())
    }

    async fn merge_edge(&self, edge: &EdgeSpec) -> Result<bool, StoreError> {
        let mut q = query(&merge_edge_cypher(edge.kind, edge.from.label, edge.to.label))
            .param("from", edge.from.key.as_str())
            .param("to", edge.to.key.as_str());
        if edge.kind.carries_quantity() {
            q = q.param("quantity", edge.quantity.unwrap_or(1));
        }

        let mut stream = self.graph.execute(q).await?;
        let Some(row) = stream.next().await? else {
            return Ok(false);
        };
        let merged: i64 = row
            .get("cnt")
            .map_err(|e| StoreError::Result(format!("merge {edge}: {e}")))?;
        // Drain so the statement completes before the next one is sent.
        while stream.next().await?.is_some() {}
        Ok(merged > 0)
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        info!(uri = %self.uri, "cleared all nodes and relationships");
        Ok(())
    }

    async fn summary(&self) -> Result<GraphSummary, StoreError> {
        let nodes = self
            .count_rows(
                query("MATCH (n) RETURN coalesce(labels(n)[0], '') AS label, count(*) AS count"),
                "label",
            )
            .await?;
        let edges = self
            .count_rows(
                query("MATCH ()-[r]->() RETURN type(r) AS type, count(*) AS count"),
                "type",
            )
            .await?;
        Ok(GraphSummary { nodes, edges })
    }
}

// ============================================================================
// Cypher
// ============================================================================

pub(crate) fn upsert_cypher(label: NodeLabel) -> String {
    format!(
        "MERGE (n:{label} {{{key}: $key}}) SET n += $props",
        label = label.as_str(),
        key = label.key_property(),
    )
}

pub(crate) fn merge_edge_cypher(kind: EdgeKind, from: NodeLabel, to: NodeLabel) -> String {
    let set = if kind.carries_quantity() {
        " SET e.quantity = $quantity"
    } else {
        ""
    };
    format!(
        "MATCH (a:{from} {{{from_key}: $from}}) \
         MATCH (b:{to} {{{to_key}: $to}}) \
         MERGE (a)-[e:{kind}]->(b){set} \
         RETURN count(e) AS cnt",
        from = from.as_str(),
        from_key = from.key_property(),
        to = to.as_str(),
        to_key = to.key_property(),
        kind = kind.as_str(),
    )
}

pub(crate) fn constraint_cypher(label: NodeLabel) -> String {
    format!(
        "CREATE CONSTRAINT {name}_key IF NOT EXISTS FOR (n:{label}) REQUIRE n.{key} IS UNIQUE",
        name = label.as_str().to_lowercase(),
        label = label.as_str(),
        key = label.key_property(),
    )
}

// ============================================================================
// Bolt conversion
// ============================================================================

pub(crate) fn bolt_value(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::Bool(b) => BoltType::from(*b),
        PropertyValue::Int(i) => BoltType::from(*i),
        PropertyValue::Float(f) => BoltType::from(*f),
        PropertyValue::String(s) => BoltType::from(s.as_str()),
        PropertyValue::List(items) => BoltType::List(BoltList {
            value: items.iter().map(bolt_value).collect(),
        }),
    }
}

pub(crate) fn bolt_map(properties: &PropertyMap) -> BoltType {
    let value: HashMap<BoltString, BoltType> = properties
        .iter()
        .map(|(k, v)| (BoltString::new(k), bolt_value(v)))
        .collect();
    BoltType::Map(BoltMap { value })
}
