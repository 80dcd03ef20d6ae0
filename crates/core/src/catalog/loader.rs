use std::{
    collections::HashSet,
    fs, io,
    path::{Path, PathBuf},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use super::models::{Catalog, GameConfig, TabDefinition, UpgradeDefinition, UpgradeId};

/// Tab sources, in navigation order.
pub const TAB_NAMES: [&str; 5] = ["main", "sales", "kitchen", "ingred", "settings"];

const TAB_DIR: &str = "tabs";
const CONFIG_FILE: &str = "config.json";

/// Failure to produce a catalog. Always fatal at startup.
#[derive(Debug, Error)]
pub enum ContentError {
    /// An expected source file does not exist.
    #[error("missing content file {}", path.display())]
    Missing {
        /// Expected location.
        path: PathBuf,
    },
    /// The file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// Offending file.
        path: PathBuf,
        /// Underlying I/O failure.
        source: io::Error,
    },
    /// The file is not valid JSON of the expected shape.
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// Offending file.
        path: PathBuf,
        /// Underlying decode failure.
        source: serde_json::Error,
    },
    /// The file parsed but violates a content rule.
    #[error("invalid content in {}: {reason}", path.display())]
    Invalid {
        /// Offending file.
        path: PathBuf,
        /// Human readable explanation.
        reason: String,
    },
}

/// Reads tab and config sources beneath a content directory.
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    root_path: PathBuf,
}

impl CatalogLoader {
    /// Build a loader rooted at the given content directory.
    pub fn new(root_path: impl Into<PathBuf>) -> Self {
        Self {
            root_path: root_path.into(),
        }
    }

    /// Path of the definition file for a tab identifier.
    pub fn tab_path(&self, name: &str) -> PathBuf {
        self.root_path.join(TAB_DIR).join(format!("{name}Tab.json"))
    }

    /// Path of the global config file.
    pub fn config_path(&self) -> PathBuf {
        self.root_path.join(CONFIG_FILE)
    }

    /// Load every expected tab plus the global config.
    pub fn load(&self) -> Result<Catalog, ContentError> {
        let mut tabs = Vec::with_capacity(TAB_NAMES.len());
        for name in TAB_NAMES {
            let path = self.tab_path(name);
            let raw: RawTab = read_json(&path)?;
            let tab = build_tab(&path, raw)?;
            debug!(tab = %tab.name, upgrades = tab.upgrades.len(), "Loaded tab");
            tabs.push(tab);
        }

        let config_path = self.config_path();
        let config: GameConfig = read_json(&config_path)?;
        validate_config(&config_path, &config)?;

        let mut names = HashSet::new();
        for (tab, file) in tabs.iter().zip(TAB_NAMES) {
            if !names.insert(tab.name.as_str()) {
                return Err(ContentError::Invalid {
                    path: self.tab_path(file),
                    reason: format!("duplicate tab name '{}'", tab.name),
                });
            }
        }

        info!(
            root = %self.root_path.display(),
            tabs = tabs.len(),
            fps = config.fps,
            "Catalog loaded"
        );
        Ok(Catalog { tabs, config })
    }
}

/// Load the catalog from `base_path`.
pub fn load_catalog(base_path: impl Into<PathBuf>) -> Result<Catalog, ContentError> {
    CatalogLoader::new(base_path).load()
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ContentError> {
    let content = fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ContentError::Missing {
                path: path.to_path_buf(),
            }
        } else {
            ContentError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;
    serde_json::from_str(&content).map_err(|source| ContentError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn build_tab(path: &Path, raw: RawTab) -> Result<TabDefinition, ContentError> {
    let invalid = |reason: String| ContentError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err(invalid("tab name is empty".to_string()));
    }
    if raw.upgrades.is_empty() {
        return Err(invalid(format!("tab '{name}' has no upgrades")));
    }
    let currency = raw
        .currency
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty());

    let mut ids = HashSet::new();
    let mut descriptions = HashSet::new();
    let mut upgrades = Vec::with_capacity(raw.upgrades.len());
    for upgrade in raw.upgrades {
        let description = upgrade.name;
        if description.trim().is_empty() {
            return Err(invalid(format!("tab '{name}' has an upgrade without a name")));
        }
        for (field, value) in [
            ("cost", upgrade.cost),
            ("growthRate", upgrade.growth_rate),
            ("production", upgrade.production),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(format!(
                    "upgrade '{description}' has {field} {value}; expected a finite non-negative number"
                )));
            }
        }
        if upgrade.growth_rate <= 0.0 {
            return Err(invalid(format!(
                "upgrade '{description}' has growthRate 0; expected a positive number"
            )));
        }

        let id = upgrade
            .id
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(UpgradeId::new)
            .unwrap_or_else(|| UpgradeId::from_description(&description));
        if !descriptions.insert(description.clone()) {
            return Err(invalid(format!("duplicate upgrade '{description}'")));
        }
        if !ids.insert(id.clone()) {
            return Err(invalid(format!("duplicate upgrade id '{id}'")));
        }

        upgrades.push(UpgradeDefinition {
            id,
            description,
            base_cost: upgrade.cost,
            cost_growth_rate: upgrade.growth_rate,
            base_production: upgrade.production,
        });
    }

    Ok(TabDefinition {
        name,
        icon: raw.icon,
        currency,
        upgrades,
    })
}

fn validate_config(path: &Path, config: &GameConfig) -> Result<(), ContentError> {
    if config.fps == 0 || config.rows == 0 || config.cols == 0 {
        return Err(ContentError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "fps, rows and cols must be at least 1 (got {}, {}, {})",
                config.fps, config.rows, config.cols
            ),
        });
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RawTab {
    name: String,
    #[serde(default)]
    icon: String,
    #[serde(default)]
    currency: Option<String>,
    upgrades: Vec<RawUpgrade>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawUpgrade {
    #[serde(default)]
    id: Option<String>,
    name: String,
    cost: f64,
    growth_rate: f64,
    production: f64,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::Result;
    use tempfile::tempdir;

    /// Write a minimal but complete content directory used across the crate's tests.
    pub(crate) fn write_fixture(root: &Path) -> Result<()> {
        let tabs = root.join(TAB_DIR);
        fs::create_dir_all(&tabs)?;
        fs::write(
            tabs.join("mainTab.json"),
            r#"{"name": "Main", "icon": "*", "upgrades": [
                {"name": "Welcome", "cost": 0, "growthRate": 1, "production": 0}
            ]}"#,
        )?;
        fs::write(
            tabs.join("salesTab.json"),
            r#"{"name": "Sales", "icon": "$", "currency": "yen", "upgrades": [
                {"name": "Hire a worker", "cost": 10, "growthRate": 1.14, "production": 5},
                {"name": "Food stall", "cost": 100, "growthRate": 1.2, "production": 40}
            ]}"#,
        )?;
        fs::write(
            tabs.join("kitchenTab.json"),
            r#"{"name": "Kitchen", "icon": "+", "currency": "fried rice", "upgrades": [
                {"id": "wok", "name": "Buy a wok", "cost": 5, "growthRate": 1.1, "production": 1}
            ]}"#,
        )?;
        fs::write(
            tabs.join("ingredTab.json"),
            r#"{"name": "Ingred", "icon": "%", "currency": "vegetables", "upgrades": [
                {"name": "Plant a garden", "cost": 2, "growthRate": 1.07, "production": 0.5}
            ]}"#,
        )?;
        fs::write(
            tabs.join("settingsTab.json"),
            r#"{"name": "Settings", "icon": "=", "upgrades": [
                {"name": "Quit", "cost": 0, "growthRate": 1, "production": 0}
            ]}"#,
        )?;
        fs::write(
            root.join(CONFIG_FILE),
            r#"{"fps": 30, "rows": 10, "cols": 30}"#,
        )?;
        Ok(())
    }

    #[test]
    fn loads_tabs_in_fixed_order() -> Result<()> {
        let temp = tempdir()?;
        write_fixture(temp.path())?;

        let catalog = load_catalog(temp.path())?;
        let names: Vec<_> = catalog.tabs.iter().map(|tab| tab.name.as_str()).collect();
        assert_eq!(names, ["Main", "Sales", "Kitchen", "Ingred", "Settings"]);
        assert_eq!(catalog.config.fps, 30);
        assert_eq!(catalog.currencies(), ["yen", "fried rice", "vegetables"]);

        let sales = catalog.tab_named("Sales").expect("sales tab");
        assert_eq!(sales.upgrades[0].id.as_str(), "hire-a-worker");
        assert_eq!(sales.upgrades[0].base_cost, 10.0);
        assert_eq!(sales.upgrades[0].cost_growth_rate, 1.14);
        let kitchen = catalog.tab_named("Kitchen").expect("kitchen tab");
        assert_eq!(kitchen.upgrades[0].id.as_str(), "wok");
        assert!(catalog.tabs[4].upgrades[0].is_quit());
        Ok(())
    }

    #[test]
    fn missing_tab_is_reported() -> Result<()> {
        let temp = tempdir()?;
        write_fixture(temp.path())?;
        fs::remove_file(temp.path().join("tabs/kitchenTab.json"))?;

        let err = load_catalog(temp.path()).unwrap_err();
        assert!(matches!(err, ContentError::Missing { ref path } if path.ends_with("kitchenTab.json")));
        Ok(())
    }

    #[test]
    fn malformed_json_is_a_parse_error() -> Result<()> {
        let temp = tempdir()?;
        write_fixture(temp.path())?;
        fs::write(temp.path().join(CONFIG_FILE), "{\"fps\": 30, \"rows\": ")?;

        let err = load_catalog(temp.path()).unwrap_err();
        assert!(matches!(err, ContentError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn missing_required_field_is_a_parse_error() -> Result<()> {
        let temp = tempdir()?;
        write_fixture(temp.path())?;
        fs::write(
            temp.path().join("tabs/salesTab.json"),
            r#"{"name": "Sales", "upgrades": [{"name": "Hire a worker", "cost": 10}]}"#,
        )?;

        let err = load_catalog(temp.path()).unwrap_err();
        assert!(matches!(err, ContentError::Parse { .. }));
        Ok(())
    }

    #[test]
    fn rejects_invalid_upgrades() -> Result<()> {
        let temp = tempdir()?;
        write_fixture(temp.path())?;
        let sales = temp.path().join("tabs/salesTab.json");

        fs::write(
            &sales,
            r#"{"name": "Sales", "currency": "yen", "upgrades": [
                {"name": "A", "cost": -1, "growthRate": 1.1, "production": 1}
            ]}"#,
        )?;
        assert!(matches!(
            load_catalog(temp.path()),
            Err(ContentError::Invalid { .. })
        ));

        fs::write(
            &sales,
            r#"{"name": "Sales", "currency": "yen", "upgrades": [
                {"name": "A", "cost": 1, "growthRate": 1.1, "production": 1},
                {"name": "A", "cost": 2, "growthRate": 1.1, "production": 1}
            ]}"#,
        )?;
        assert!(matches!(
            load_catalog(temp.path()),
            Err(ContentError::Invalid { .. })
        ));

        fs::write(&sales, r#"{"name": "Sales", "currency": "yen", "upgrades": []}"#)?;
        assert!(matches!(
            load_catalog(temp.path()),
            Err(ContentError::Invalid { .. })
        ));
        Ok(())
    }

    #[test]
    fn rejects_zero_fps() -> Result<()> {
        let temp = tempdir()?;
        write_fixture(temp.path())?;
        fs::write(
            temp.path().join(CONFIG_FILE),
            r#"{"tickRate": 0, "rows": 10, "cols": 30}"#,
        )?;
        assert!(matches!(
            load_catalog(temp.path()),
            Err(ContentError::Invalid { .. })
        ));
        Ok(())
    }
}
