use std::fmt;

use serde::{Deserialize, Serialize};

/// Description of the entry whose activation ends the session instead of buying something.
pub const QUIT_SENTINEL: &str = "Quit";

/// Stable identifier of an upgrade within its tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UpgradeId(String);

impl UpgradeId {
    /// Wrap an explicit identifier.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Derive an identifier from a description: lowercase ASCII alphanumerics joined by `-`.
    pub fn from_description(description: &str) -> Self {
        let mut slug = String::with_capacity(description.len());
        let mut pending_dash = false;
        for ch in description.chars() {
            if ch.is_ascii_alphanumeric() {
                if pending_dash && !slug.is_empty() {
                    slug.push('-');
                }
                pending_dash = false;
                slug.push(ch.to_ascii_lowercase());
            } else {
                pending_dash = true;
            }
        }
        if slug.is_empty() {
            slug.push_str("upgrade");
        }
        Self(slug)
    }

    /// Borrow the raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UpgradeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Presentation settings read from `config.json`. They never affect the economy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Ticks per second driving accrual and redraws.
    #[serde(alias = "tickRate")]
    pub fps: u32,
    /// Height of the display area in cells.
    pub rows: u16,
    /// Width of the display area in cells.
    pub cols: u16,
}

impl GameConfig {
    /// Interval between two periodic ticks.
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(1) / self.fps.max(1)
    }
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            rows: 10,
            cols: 30,
        }
    }
}

/// A purchasable upgrade.
#[derive(Debug, Clone, PartialEq)]
pub struct UpgradeDefinition {
    /// Stable identifier, explicit in content or derived from the description.
    pub id: UpgradeId,
    /// Display text, unique within its tab.
    pub description: String,
    /// Price of the first copy.
    pub base_cost: f64,
    /// Multiplier applied to the price for every copy already owned.
    pub cost_growth_rate: f64,
    /// Currency produced per second by each owned copy.
    pub base_production: f64,
}

impl UpgradeDefinition {
    /// Whether selecting this entry ends the session.
    pub fn is_quit(&self) -> bool {
        self.description == QUIT_SENTINEL
    }

    /// Price of the next copy given how many are already owned.
    pub fn cost_at(&self, owned: u64) -> f64 {
        self.base_cost * self.cost_growth_rate.powf(owned as f64)
    }
}

/// A navigable group of upgrades.
#[derive(Debug, Clone, PartialEq)]
pub struct TabDefinition {
    /// Display name, also the key under which ownership is persisted.
    pub name: String,
    /// Short glyph shown in the tab bar.
    pub icon: String,
    /// Currency this tab trades in; `None` for informational tabs.
    pub currency: Option<String>,
    /// Upgrades in navigation order. Never empty.
    pub upgrades: Vec<UpgradeDefinition>,
}

impl TabDefinition {
    /// Whether upgrades on this tab can be bought.
    pub fn is_economic(&self) -> bool {
        self.currency.is_some()
    }

    /// Find an upgrade by stable identifier.
    pub fn upgrade(&self, id: &UpgradeId) -> Option<&UpgradeDefinition> {
        self.upgrades.iter().find(|upgrade| &upgrade.id == id)
    }
}

/// Immutable content loaded once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    /// Tabs in navigation order.
    pub tabs: Vec<TabDefinition>,
    /// Presentation settings.
    pub config: GameConfig,
}

impl Catalog {
    /// Tab at `index`, if any.
    pub fn tab(&self, index: usize) -> Option<&TabDefinition> {
        self.tabs.get(index)
    }

    /// Find a tab by name.
    pub fn tab_named(&self, name: &str) -> Option<&TabDefinition> {
        self.tabs.iter().find(|tab| tab.name == name)
    }

    /// Distinct currencies in tab order.
    pub fn currencies(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for currency in self.tabs.iter().filter_map(|tab| tab.currency.as_deref()) {
            if !out.contains(&currency) {
                out.push(currency);
            }
        }
        out
    }
}
