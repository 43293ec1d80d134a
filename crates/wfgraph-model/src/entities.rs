//! Typed export entities.
//!
//! Every entity declares the fields the graph cares about and keeps anything
//! else in `extra`, which is flattened back out when the entity is turned
//! into node properties. Newly added export fields therefore still reach the
//! store without a schema change here.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::de::opt_int;
use crate::graph::{NodeLabel, NodeRef};
use crate::manifest::EntityKind;
use crate::properties::{properties_from_object, PropertyMap};

// ============================================================================
// Entity trait
// ============================================================================

/// Shared behavior of the sourced entity kinds.
pub trait Entity: Serialize + DeserializeOwned + Sized {
    const KIND: EntityKind;

    /// Fields that must be present, non-null, non-empty strings.
    const REQUIRED: &'static [&'static str];

    /// Declared fields that become edges instead of node properties.
    const EXCLUDED: &'static [&'static str] = &[];

    fn unique_name(&self) -> &str;

    fn node_ref(&self) -> NodeRef {
        NodeRef::new(Self::KIND.label(), self.unique_name())
    }

    /// Declared and passthrough fields, minus the key and [`Entity::EXCLUDED`].
    fn properties(&self) -> Result<PropertyMap, serde_json::Error> {
        let mut object = match serde_json::to_value(self)? {
            Value::Object(object) => object,
            _ => Map::new(),
        };
        object.remove("uniqueName");
        for field in Self::EXCLUDED {
            object.remove(*field);
        }
        Ok(properties_from_object(&object))
    }
}

// ============================================================================
// Weapon
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub unique_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub blocking_angle: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex_secret: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub combo_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub damage_per_shot: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_from_codex: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fire_rate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_through: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub heavy_attack_damage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub heavy_slam_attack: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub heavy_slam_radial_damage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub heavy_slam_radius: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub magazine_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub mastery_req: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub max_level_cap: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub multishot: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noise: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub omega_attenuation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prime_omega_attenuation: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proc_chance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reload_time: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinel: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub slam_attack: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub slam_radial_damage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub slam_radius: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub slide_attack: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub slot: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_damage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wind_up: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Weapon {
    const KIND: EntityKind = EntityKind::Weapon;
    const REQUIRED: &'static [&'static str] = &["uniqueName", "name"];

    fn unique_name(&self) -> &str {
        &self.unique_name
    }
}

impl Weapon {
    /// The grouping category, if the weapon names a non-blank one.
    pub fn category(&self) -> Option<&str> {
        self.product_category
            .as_deref()
            .filter(|c| !c.trim().is_empty())
    }
}

// ============================================================================
// Resource
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub unique_name: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex_secret: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_from_codex: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub prime_selling_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_in_inventory: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Resource {
    const KIND: EntityKind = EntityKind::Resource;
    const REQUIRED: &'static [&'static str] = &["uniqueName", "name"];

    fn unique_name(&self) -> &str {
        &self.unique_name
    }
}

// ============================================================================
// Recipe
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub unique_name: String,
    /// `uniqueName` of the item this recipe produces.
    pub result_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub always_available: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub build_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub build_time: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex_secret: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consume_on_use: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_from_codex: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingredients: Vec<Ingredient>,
    /// Number of items produced per build.
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub num: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub prime_selling_price: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub secret_ingredients: Vec<Ingredient>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub skip_build_time_price: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Entity for Recipe {
    const KIND: EntityKind = EntityKind::Recipe;
    const REQUIRED: &'static [&'static str] = &["uniqueName", "resultType"];
    const EXCLUDED: &'static [&'static str] = &["ingredients", "secretIngredients", "resultType"];

    fn unique_name(&self) -> &str {
        &self.unique_name
    }
}

impl Recipe {
    /// Quantity carried by the BUILDS edge.
    pub fn produced_count(&self) -> i64 {
        self.num.unwrap_or(1)
    }
}

/// One ingredient reference inside a recipe.
///
/// Entries are kept even without an `ItemType` so that one odd entry does
/// not reject the whole recipe; such entries simply produce no edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ingredient {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_int")]
    pub item_count: Option<i64>,
    /// Category hint from the export; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_category: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Ingredient {
    pub fn item_type(&self) -> Option<&str> {
        self.item_type.as_deref().filter(|t| !t.is_empty())
    }

    /// Quantity carried by the REQUIRES edge.
    pub fn quantity(&self) -> i64 {
        self.item_count.unwrap_or(1)
    }
}

// ============================================================================
// Category
// ============================================================================

/// Grouping node derived from a weapon's `productCategory`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
}

impl Category {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn node_ref(&self) -> NodeRef {
        NodeRef::new(NodeLabel::Category, &self.name)
    }
}
