//! Validated entities → graph writes.
//!
//! ```text
//!   upsert_resources ──► upsert_weapons ──► upsert_recipes_and_links
//!        Resource          Weapon              Recipe
//!                          CategoryIndex       BUILDS   (Weapon, else Resource)
//!                          Category            REQUIRES (Resource)
//!                          BELONGS_TO
//! ```
//!
//! Passes must run in this order: edges only attach to nodes that already
//! exist. Each pass is a complete batch of keyed writes, so any pass can be
//! re-run on its own. A failed write skips that record or edge and is counted.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};
use wfgraph_model::{
    Category, EdgeSpec, Entity, NodeLabel, NodeRef, Recipe, Resource, Weapon,
};
use wfgraph_store::GraphStore;

use crate::IngestError;

const RESOURCE_PROGRESS_EVERY: usize = 500;
const WEAPON_PROGRESS_EVERY: usize = 100;
const RECIPE_PROGRESS_EVERY: usize = 500;

// ============================================================================
// Reports
// ============================================================================

/// Node writes of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodePassReport {
    pub upserted: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WeaponReport {
    pub nodes: NodePassReport,
    pub categories: usize,
    pub belongs_to: usize,
    pub failed_edges: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecipeReport {
    pub nodes: NodePassReport,
    pub builds_weapon: usize,
    pub builds_resource: usize,
    /// Recipes whose `resultType` is neither an ingested Weapon nor Resource.
    pub unresolved_builds: usize,
    pub requires: usize,
    /// Ingredients whose `ItemType` is not an ingested Resource.
    pub unresolved_ingredients: usize,
    pub failed_edges: usize,
}

impl RecipeReport {
    pub fn builds(&self) -> usize {
        self.builds_weapon + self.builds_resource
    }
}

// ============================================================================
// Category index
// ============================================================================

/// Category name → member weapons, gathered from the weapon pass.
///
/// Membership follows each weapon node's stored `productCategory`: when a key
/// repeats, the last record carrying the field decides it, and a blank value
/// leaves the weapon ungrouped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryIndex {
    members: BTreeMap<String, Vec<NodeRef>>,
}

impl CategoryIndex {
    pub fn collect<'w>(weapons: impl IntoIterator<Item = &'w Weapon>) -> Self {
        let mut latest: BTreeMap<NodeRef, &Weapon> = BTreeMap::new();
        for weapon in weapons {
            if weapon.product_category.is_some() {
                latest.insert(weapon.node_ref(), weapon);
            }
        }

        let mut index = Self::default();
        for (node, weapon) in latest {
            if let Some(category) = weapon.category() {
                index.insert(category, node);
            }
        }
        index
    }

    pub fn insert(&mut self, category: &str, weapon: NodeRef) {
        let members = self.members.entry(category.to_string()).or_default();
        if !members.contains(&weapon) {
            members.push(weapon);
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self, category: &str) -> &[NodeRef] {
        self.members.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[NodeRef])> {
        self.members
            .iter()
            .map(|(name, weapons)| (Category::new(name), weapons.as_slice()))
    }
}

// ============================================================================
// Materializer
// ============================================================================

pub struct Materializer<'a, S: GraphStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: GraphStore + ?Sized> Materializer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub async fn upsert_resources(&self, resources: &[Resource]) -> NodePassReport {
        let (report, _) = self.upsert_all(resources, RESOURCE_PROGRESS_EVERY).await;
        info!(
            upserted = report.upserted,
            failed = report.failed,
            "resources ingested"
        );
        report
    }

    pub async fn upsert_weapons(&self, weapons: &[Weapon]) -> WeaponReport {
        let (nodes, upserted) = self.upsert_all(weapons, WEAPON_PROGRESS_EVERY).await;
        let mut report = WeaponReport {
            nodes,
            ..WeaponReport::default()
        };

        let index = CategoryIndex::collect(upserted);
        self.link_categories(&index, &mut report).await;

        info!(
            upserted = report.nodes.upserted,
            failed = report.nodes.failed,
            categories = report.categories,
            belongs_to = report.belongs_to,
            "weapons ingested"
        );
        report
    }

    pub async fn upsert_recipes_and_links(&self, recipes: &[Recipe]) -> RecipeReport {
        let (nodes, upserted) = self.upsert_all(recipes, RECIPE_PROGRESS_EVERY).await;
        let mut report = RecipeReport {
            nodes,
            ..RecipeReport::default()
        };

        for recipe in upserted {
            let node = recipe.node_ref();
            self.link_product(recipe, &node, &mut report).await;
            self.link_ingredients(recipe, &node, &mut report).await;
        }

        info!(
            upserted = report.nodes.upserted,
            failed = report.nodes.failed,
            builds = report.builds(),
            requires = report.requires,
            unresolved_builds = report.unresolved_builds,
            "recipes ingested"
        );
        report
    }

    // ------------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------------

    async fn upsert_entity<E: Entity>(&self, entity: &E) -> Result<NodeRef, IngestError> {
        let node = entity.node_ref();
        let properties = entity
            .properties()
            .map_err(|source| IngestError::Properties {
                node: node.clone(),
                source,
            })?;
        self.store.upsert_node(&node, &properties).await?;
        Ok(node)
    }

    /// Upsert every entity, returning the ones that were written.
    async fn upsert_all<'e, E: Entity>(
        &self,
        entities: &'e [E],
        progress_every: usize,
    ) -> (NodePassReport, Vec<&'e E>) {
        let total = entities.len();
        info!(kind = %E::KIND, total, "upserting");

        let mut report = NodePassReport::default();
        let mut written = Vec::with_capacity(total);
        for (i, entity) in entities.iter().enumerate() {
            match self.upsert_entity(entity).await {
                Ok(_) => {
                    report.upserted += 1;
                    written.push(entity);
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(
                        kind = %E::KIND,
                        unique_name = entity.unique_name(),
                        error = %e,
                        "upsert failed, skipping record"
                    );
                }
            }
            if (i + 1) % progress_every == 0 {
                info!(kind = %E::KIND, done = i + 1, total, "progress");
            }
        }
        (report, written)
    }

    // ------------------------------------------------------------------------
    // Edges
    // ------------------------------------------------------------------------

    async fn link_categories(&self, index: &CategoryIndex, report: &mut WeaponReport) {
        for (category, weapons) in index.iter() {
            let category_node = category.node_ref();
            if let Err(e) = self
                .store
                .upsert_node(&category_node, &Default::default())
                .await
            {
                warn!(category = %category.name, error = %e, "category upsert failed");
                report.failed_edges += weapons.len();
                continue;
            }
            report.categories += 1;

            for weapon in weapons {
                let edge = EdgeSpec::belongs_to(weapon.clone(), category_node.clone());
                match self.store.merge_edge(&edge).await {
                    Ok(true) => report.belongs_to += 1,
                    Ok(false) => debug!(%edge, "endpoint missing, edge skipped"),
                    Err(e) => {
                        report.failed_edges += 1;
                        warn!(%edge, error = %e, "edge merge failed");
                    }
                }
            }
        }
    }

    /// BUILDS: a Weapon with the result's key wins; a Resource is tried only
    /// when no Weapon matched.
    async fn link_product(&self, recipe: &Recipe, node: &NodeRef, report: &mut RecipeReport) {
        for label in [NodeLabel::Weapon, NodeLabel::Resource] {
            let product = NodeRef::new(label, &recipe.result_type);
            let edge = EdgeSpec::builds(node.clone(), product, recipe.produced_count());
            match self.store.merge_edge(&edge).await {
                Ok(true) => {
                    match label {
                        NodeLabel::Weapon => report.builds_weapon += 1,
                        _ => report.builds_resource += 1,
                    }
                    return;
                }
                Ok(false) => continue,
                Err(e) => {
                    report.failed_edges += 1;
                    warn!(%edge, error = %e, "edge merge failed");
                    return;
                }
            }
        }
        report.unresolved_builds += 1;
        debug!(
            recipe = %recipe.unique_name,
            result_type = %recipe.result_type,
            "result type not ingested, no BUILDS edge"
        );
    }

    async fn link_ingredients(&self, recipe: &Recipe, node: &NodeRef, report: &mut RecipeReport) {
        for ingredient in &recipe.ingredients {
            let Some(item_type) = ingredient.item_type() else {
                continue;
            };
            let resource = NodeRef::new(NodeLabel::Resource, item_type);
            let edge = EdgeSpec::requires(node.clone(), resource, ingredient.quantity());
            match self.store.merge_edge(&edge).await {
                Ok(true) => report.requires += 1,
                Ok(false) => {
                    report.unresolved_ingredients += 1;
                    debug!(%edge, "ingredient is not an ingested resource");
                }
                Err(e) => {
                    report.failed_edges += 1;
                    warn!(%edge, error = %e, "edge merge failed");
                }
            }
        }
    }
}
