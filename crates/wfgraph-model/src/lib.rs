//! wfgraph data model
//!
//! Typed views over the public game-data export and the identities they take
//! on once written into the property graph:
//!
//! ```text
//!   manifest JSON ──► RawRecord ──► validate ──► Weapon / Resource / Recipe
//!                                                   │
//!                                                   ▼
//!                                 NodeRef + PropertyMap, EdgeSpec (BUILDS, ...)
//! ```
//!
//! - [`entities`]: declared fields per entity kind plus an opaque passthrough bag
//! - [`validate`]: raw record → typed entity, failing per record
//! - [`properties`]: store-neutral property values
//! - [`graph`]: node labels, node identities and edge kinds
//! - [`manifest`]: which export document carries which entity kind

mod de;
pub mod entities;
pub mod graph;
pub mod manifest;
pub mod properties;
pub mod validate;

pub use entities::{Category, Entity, Ingredient, Recipe, Resource, Weapon};
pub use graph::{EdgeKind, EdgeSpec, NodeLabel, NodeRef};
pub use manifest::{records_from_document, DocumentError, EntityKind};
pub use properties::{PropertyMap, PropertyValue};
pub use validate::{validate, validate_batch, RecordFailure, ValidatedBatch, ValidationError};

/// One untyped entity instance from a manifest's top-level array.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// A record that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedNode {
    Weapon(Weapon),
    Resource(Resource),
    Recipe(Recipe),
}
