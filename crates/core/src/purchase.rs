//! Buying upgrades.

use tracing::{debug, info};

use crate::{
    catalog::{Catalog, TabDefinition, UpgradeDefinition},
    economy::EconomyState,
    navigation::NavigationState,
};

/// What activating the current selection did.
#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseResult {
    /// One copy was bought.
    Purchased {
        /// Amount debited.
        cost: f64,
        /// Copies owned after the purchase.
        owned: u64,
        /// Price of the following copy.
        next_cost: f64,
    },
    /// The tab's balance is below the current price. Nothing changed.
    InsufficientFunds {
        /// Current price.
        cost: f64,
        /// Balance at the time of the attempt.
        balance: f64,
    },
    /// The selection is on a tab without a currency. Nothing changed.
    NotForSale,
    /// The selection is the quit entry; the caller should save and stop.
    Quit,
}

/// Price of the next copy of `upgrade` on `tab`, from current ownership.
pub fn current_cost(
    state: &EconomyState,
    tab: &TabDefinition,
    upgrade: &UpgradeDefinition,
) -> f64 {
    upgrade.cost_at(state.owned(&tab.name, &upgrade.id))
}

/// Try to buy the selected upgrade of the active tab.
pub fn attempt_purchase(
    nav: &NavigationState,
    catalog: &Catalog,
    state: &mut EconomyState,
) -> PurchaseResult {
    let (tab, upgrade) = match nav
        .current_tab(catalog)
        .zip(nav.current_upgrade(catalog))
    {
        Some(pair) => pair,
        None => return PurchaseResult::NotForSale,
    };

    if upgrade.is_quit() {
        return PurchaseResult::Quit;
    }

    let currency = match tab.currency.as_deref() {
        Some(currency) => currency,
        None => return PurchaseResult::NotForSale,
    };

    let cost = current_cost(state, tab, upgrade);
    let balance = state.balance(currency);
    if !cost.is_finite() || balance < cost {
        debug!(upgrade = %upgrade.id, cost, balance, "Insufficient funds");
        return PurchaseResult::InsufficientFunds { cost, balance };
    }

    state.debit(currency, cost);
    let entry = state.ownership_mut(tab, upgrade);
    entry.owned = entry.owned.saturating_add(1);
    let owned = entry.owned;
    let next_cost = upgrade.cost_at(owned);

    info!(
        tab = %tab.name,
        upgrade = %upgrade.id,
        cost,
        owned,
        "Purchased upgrade"
    );
    PurchaseResult::Purchased {
        cost,
        owned,
        next_cost,
    }
}
