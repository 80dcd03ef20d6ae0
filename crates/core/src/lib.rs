#![warn(clippy::all, missing_docs)]

//! Economy engine for the Sizzle Star idle game.
//!
//! This crate hosts the upgrade catalog, the persisted economy state,
//! purchase and accrual rules, the navigation cursor, save-file
//! persistence, and the session object that drives them one event at
//! a time. Terminal rendering lives in the `sizzle-tui` crate.

pub mod accrual;
pub mod catalog;
pub mod config;
pub mod economy;
pub mod navigation;
pub mod purchase;
pub mod save;
pub mod session;

pub use catalog::{
    load_catalog, Catalog, ContentError, GameConfig, TabDefinition, UpgradeDefinition,
};
pub use self::config::AppConfig;
pub use economy::EconomyState;
pub use navigation::NavigationState;
pub use purchase::PurchaseResult;
pub use save::{LoadOutcome, SaveError, SaveManager};
pub use session::{Control, GameEvent, GameSession, Snapshot, StartKind};
