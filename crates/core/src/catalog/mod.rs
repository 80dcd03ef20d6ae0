//! Immutable upgrade catalog and its loader.

/// Reading and validating content files.
pub mod loader;
mod models;

pub use loader::{load_catalog, CatalogLoader, ContentError, TAB_NAMES};
pub use models::{
    Catalog, GameConfig, TabDefinition, UpgradeDefinition, UpgradeId, QUIT_SENTINEL,
};
