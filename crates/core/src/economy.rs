//! Mutable, persisted record of balances and ownership.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::catalog::{Catalog, TabDefinition, UpgradeDefinition, UpgradeId};

/// How many copies of one upgrade the player owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeOwnership {
    /// Stable identifier at the time the entry was last linked to the catalog.
    pub id: UpgradeId,
    /// Description at the time the entry was last linked; used to relink older saves.
    pub description: String,
    /// Copies owned. Never decreases.
    pub owned: u64,
}

impl UpgradeOwnership {
    fn unowned(upgrade: &UpgradeDefinition) -> Self {
        Self {
            id: upgrade.id.clone(),
            description: upgrade.description.clone(),
            owned: 0,
        }
    }

    fn same_wording(&self, upgrade: &UpgradeDefinition) -> bool {
        self.description == upgrade.description
    }
}

/// Ownership entries for one tab, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabOwnership {
    /// Name of the catalog tab.
    pub tab: String,
    /// Entries in catalog order, followed by any orphans.
    pub upgrades: Vec<UpgradeOwnership>,
}

/// Entries that no longer match anything in the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// `(tab, description)` for each persisted entry without a catalog counterpart.
    pub orphaned: Vec<(String, String)>,
    /// Catalog upgrades that had no persisted entry and were seeded at zero.
    pub seeded: usize,
}

/// Balances, ownership and the accrual clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyState {
    /// Moment up to which production has been credited.
    pub last_accrual: DateTime<Utc>,
    /// Balance per currency name.
    pub balances: BTreeMap<String, f64>,
    /// Ownership per economic tab.
    pub tabs: Vec<TabOwnership>,
}

impl EconomyState {
    /// Zero balances and zero ownership for every upgrade on an economic tab.
    pub fn fresh(catalog: &Catalog, now: DateTime<Utc>) -> Self {
        let balances = catalog
            .currencies()
            .into_iter()
            .map(|currency| (currency.to_string(), 0.0))
            .collect();
        let tabs = catalog
            .tabs
            .iter()
            .filter(|tab| tab.is_economic())
            .map(|tab| TabOwnership {
                tab: tab.name.clone(),
                upgrades: tab.upgrades.iter().map(UpgradeOwnership::unowned).collect(),
            })
            .collect();
        Self {
            last_accrual: now,
            balances,
            tabs,
        }
    }

    /// Current balance of `currency`; unknown currencies hold nothing.
    pub fn balance(&self, currency: &str) -> f64 {
        self.balances.get(currency).copied().unwrap_or(0.0)
    }

    /// Add `amount` to a balance, keeping it finite and non-negative.
    pub fn credit(&mut self, currency: &str, amount: f64) {
        let entry = self.balances.entry(currency.to_string()).or_insert(0.0);
        *entry = clamp_balance(*entry + amount);
    }

    /// Remove `amount` from a balance. Callers check affordability first.
    pub(crate) fn debit(&mut self, currency: &str, amount: f64) {
        let entry = self.balances.entry(currency.to_string()).or_insert(0.0);
        *entry = clamp_balance(*entry - amount);
    }

    /// Ownership entry for an upgrade on a tab.
    pub fn ownership(&self, tab: &str, id: &UpgradeId) -> Option<&UpgradeOwnership> {
        self.tabs
            .iter()
            .find(|entry| entry.tab == tab)
            .and_then(|entry| entry.upgrades.iter().find(|upgrade| &upgrade.id == id))
    }

    /// Copies owned of an upgrade on a tab; missing entries count as zero.
    pub fn owned(&self, tab: &str, id: &UpgradeId) -> u64 {
        self.ownership(tab, id).map(|entry| entry.owned).unwrap_or(0)
    }

    pub(crate) fn ownership_mut(
        &mut self,
        tab: &TabDefinition,
        upgrade: &UpgradeDefinition,
    ) -> &mut UpgradeOwnership {
        let index = match self.tabs.iter().position(|entry| entry.tab == tab.name) {
            Some(index) => index,
            None => {
                self.tabs.push(TabOwnership {
                    tab: tab.name.clone(),
                    upgrades: Vec::new(),
                });
                self.tabs.len() - 1
            }
        };
        let upgrades = &mut self.tabs[index].upgrades;
        let position = match upgrades.iter().position(|entry| entry.id == upgrade.id) {
            Some(position) => position,
            None => {
                upgrades.push(UpgradeOwnership::unowned(upgrade));
                upgrades.len() - 1
            }
        };
        &mut upgrades[position]
    }

    /// Reason the state cannot be trusted, if any balance is negative or non-finite.
    pub fn validate(&self) -> Result<(), String> {
        for (currency, amount) in &self.balances {
            if !amount.is_finite() || *amount < 0.0 {
                return Err(format!("balance of {currency} is {amount}"));
            }
        }
        Ok(())
    }

    /// Relink persisted ownership to the current catalog.
    ///
    /// Entries are matched by stable id first, then by exact description so that
    /// saves written before ids existed keep their progress. Matched entries adopt
    /// the catalog's current id and description. Catalog upgrades with no entry are
    /// seeded at zero. Entries that match nothing are kept after the linked ones
    /// so their counts are not lost if the wording comes back.
    pub fn reconcile(&mut self, catalog: &Catalog) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for currency in catalog.currencies() {
            self.balances.entry(currency.to_string()).or_insert(0.0);
        }

        let mut previous = std::mem::take(&mut self.tabs);
        for tab in catalog.tabs.iter().filter(|tab| tab.is_economic()) {
            let index = previous.iter().position(|entry| entry.tab == tab.name);
            let mut persisted = match index {
                Some(index) => previous.remove(index).upgrades,
                None => Vec::new(),
            };

            // Every id claims its entry before any description fallback runs.
            let mut slots: Vec<Option<UpgradeOwnership>> = tab
                .upgrades
                .iter()
                .map(|upgrade| {
                    let index = persisted.iter().position(|entry| entry.id == upgrade.id)?;
                    Some(persisted.remove(index))
                })
                .collect();
            for (slot, upgrade) in slots.iter_mut().zip(&tab.upgrades) {
                if slot.is_some() {
                    continue;
                }
                if let Some(index) = persisted
                    .iter()
                    .position(|entry| entry.same_wording(upgrade))
                {
                    *slot = Some(persisted.remove(index));
                }
            }

            let mut linked = Vec::with_capacity(tab.upgrades.len());
            for (slot, upgrade) in slots.into_iter().zip(&tab.upgrades) {
                match slot {
                    Some(mut entry) => {
                        entry.id = upgrade.id.clone();
                        entry.description = upgrade.description.clone();
                        linked.push(entry);
                    }
                    None => {
                        report.seeded += 1;
                        linked.push(UpgradeOwnership::unowned(upgrade));
                    }
                }
            }

            for orphan in persisted {
                warn!(
                    tab = %tab.name,
                    upgrade = %orphan.description,
                    owned = orphan.owned,
                    "Saved upgrade no longer exists in the catalog"
                );
                report
                    .orphaned
                    .push((tab.name.clone(), orphan.description.clone()));
                linked.push(orphan);
            }

            self.tabs.push(TabOwnership {
                tab: tab.name.clone(),
                upgrades: linked,
            });
        }

        for stale in previous {
            warn!(tab = %stale.tab, "Saved tab no longer exists in the catalog");
            for orphan in &stale.upgrades {
                report
                    .orphaned
                    .push((stale.tab.clone(), orphan.description.clone()));
            }
            self.tabs.push(stale);
        }

        report
    }
}

fn clamp_balance(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else if value.is_infinite() && value > 0.0 {
        f64::MAX
    } else {
        value.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{load_catalog, loader::tests::write_fixture, GameConfig};
    use anyhow::Result;
    use tempfile::tempdir;

    fn catalog() -> Result<Catalog> {
        let temp = tempdir()?;
        write_fixture(temp.path())?;
        Ok(load_catalog(temp.path())?)
    }

    #[test]
    fn fresh_state_seeds_every_economic_upgrade() -> Result<()> {
        let catalog = catalog()?;
        let state = EconomyState::fresh(&catalog, Utc::now());

        assert_eq!(state.balances.len(), 3);
        assert!(state.balances.values().all(|amount| *amount == 0.0));
        let tabs: Vec<_> = state.tabs.iter().map(|entry| entry.tab.as_str()).collect();
        assert_eq!(tabs, ["Sales", "Kitchen", "Ingred"]);
        let sales = &state.tabs[0];
        assert_eq!(sales.upgrades.len(), 2);
        assert_eq!(sales.upgrades[0].description, "Hire a worker");
        assert!(sales.upgrades.iter().all(|entry| entry.owned == 0));
        Ok(())
    }

    #[test]
    fn credit_never_leaves_balances_unusable() {
        let mut state = EconomyState {
            last_accrual: Utc::now(),
            balances: BTreeMap::new(),
            tabs: Vec::new(),
        };
        state.credit("yen", f64::MAX);
        state.credit("yen", f64::MAX);
        assert_eq!(state.balance("yen"), f64::MAX);
        state.debit("yen", f64::INFINITY);
        assert_eq!(state.balance("yen"), 0.0);
        assert!(state.validate().is_ok());
    }

    #[test]
    fn reconcile_links_by_id_then_description() -> Result<()> {
        let catalog = catalog()?;
        let mut state = EconomyState::fresh(&catalog, Utc::now());
        state.balances.clear();
        state.tabs = vec![
            TabOwnership {
                tab: "Sales".to_string(),
                upgrades: vec![
                    UpgradeOwnership {
                        id: UpgradeId::new("legacy"),
                        description: "Food stall".to_string(),
                        owned: 4,
                    },
                    UpgradeOwnership {
                        id: UpgradeId::new("hire-a-worker"),
                        description: "Hire some workers".to_string(),
                        owned: 2,
                    },
                    UpgradeOwnership {
                        id: UpgradeId::new("gone"),
                        description: "Sell lemonade".to_string(),
                        owned: 9,
                    },
                ],
            },
            TabOwnership {
                tab: "Arcade".to_string(),
                upgrades: vec![UpgradeOwnership {
                    id: UpgradeId::new("claw"),
                    description: "Claw machine".to_string(),
                    owned: 1,
                }],
            },
        ];

        let report = state.reconcile(&catalog);

        let sales = &state.tabs[0];
        assert_eq!(sales.tab, "Sales");
        assert_eq!(sales.upgrades[0].id.as_str(), "hire-a-worker");
        assert_eq!(sales.upgrades[0].description, "Hire a worker");
        assert_eq!(sales.upgrades[0].owned, 2);
        assert_eq!(sales.upgrades[1].id.as_str(), "food-stall");
        assert_eq!(sales.upgrades[1].owned, 4);
        assert_eq!(sales.upgrades[2].description, "Sell lemonade");
        assert_eq!(sales.upgrades[2].owned, 9);

        assert_eq!(state.tabs[1].tab, "Kitchen");
        assert_eq!(state.tabs[2].tab, "Ingred");
        assert_eq!(state.tabs[3].tab, "Arcade");
        assert_eq!(report.seeded, 2);
        assert_eq!(
            report.orphaned,
            vec![
                ("Sales".to_string(), "Sell lemonade".to_string()),
                ("Arcade".to_string(), "Claw machine".to_string()),
            ]
        );
        assert_eq!(state.balance("fried rice"), 0.0);
        assert!(state.balances.contains_key("vegetables"));
        Ok(())
    }

    #[test]
    fn ids_are_claimed_before_old_wording() {
        let upgrade = |id: &str, description: &str| UpgradeDefinition {
            id: UpgradeId::new(id),
            description: description.to_string(),
            base_cost: 1.0,
            cost_growth_rate: 1.1,
            base_production: 1.0,
        };
        let catalog = Catalog {
            tabs: vec![TabDefinition {
                name: "Sales".to_string(),
                icon: "$".to_string(),
                currency: Some("yen".to_string()),
                upgrades: vec![upgrade("x", "Beta"), upgrade("b", "Bravo")],
            }],
            config: GameConfig::default(),
        };
        let mut state = EconomyState {
            last_accrual: Utc::now(),
            balances: BTreeMap::new(),
            tabs: vec![TabOwnership {
                tab: "Sales".to_string(),
                upgrades: vec![UpgradeOwnership {
                    id: UpgradeId::new("b"),
                    description: "Beta".to_string(),
                    owned: 9,
                }],
            }],
        };

        let report = state.reconcile(&catalog);

        assert_eq!(state.owned("Sales", &UpgradeId::new("x")), 0);
        assert_eq!(state.owned("Sales", &UpgradeId::new("b")), 9);
        assert_eq!(state.tabs[0].upgrades[1].description, "Bravo");
        assert_eq!(report.seeded, 1);
        assert!(report.orphaned.is_empty());
    }
}
