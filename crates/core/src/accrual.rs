//! Passive, time-based production.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::{
    catalog::{Catalog, TabDefinition},
    economy::EconomyState,
};

/// What a single accrual step credited.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccrualReport {
    /// Seconds credited, after clamping to zero.
    pub elapsed_secs: f64,
    /// Amount credited per currency. Currencies with no production are omitted.
    pub credited: BTreeMap<String, f64>,
}

impl AccrualReport {
    /// Whether anything was credited.
    pub fn is_empty(&self) -> bool {
        self.credited.values().all(|amount| *amount == 0.0)
    }
}

/// Units per second produced by every owned upgrade on `tab`.
pub fn production_rate(tab: &TabDefinition, state: &EconomyState) -> f64 {
    tab.upgrades
        .iter()
        .map(|upgrade| state.owned(&tab.name, &upgrade.id) as f64 * upgrade.base_production)
        .sum()
}

/// Units per second per currency across the whole catalog.
pub fn production_rates(catalog: &Catalog, state: &EconomyState) -> BTreeMap<String, f64> {
    let mut rates = BTreeMap::new();
    for tab in &catalog.tabs {
        if let Some(currency) = tab.currency.as_deref() {
            *rates.entry(currency.to_string()).or_insert(0.0) += production_rate(tab, state);
        }
    }
    rates
}

/// Credit production for the wall-clock time between the last accrual and `now`.
///
/// Calling this twice with the same `now` credits once. A clock that moved
/// backwards credits nothing and leaves the accrual timestamp where it was.
pub fn accrue(state: &mut EconomyState, catalog: &Catalog, now: DateTime<Utc>) -> AccrualReport {
    let elapsed = now.signed_duration_since(state.last_accrual);
    let elapsed_secs = match elapsed.num_microseconds() {
        Some(micros) => micros as f64 / 1_000_000.0,
        None => elapsed.num_milliseconds() as f64 / 1_000.0,
    }
    .max(0.0);

    let mut report = AccrualReport {
        elapsed_secs,
        credited: BTreeMap::new(),
    };
    if elapsed_secs > 0.0 {
        for (currency, rate) in production_rates(catalog, state) {
            if rate <= 0.0 {
                continue;
            }
            let amount = rate * elapsed_secs;
            state.credit(&currency, amount);
            report.credited.insert(currency, amount);
        }
        state.last_accrual = now;
    }
    report
}

/// One-shot accrual for time spent while the game was not running.
pub fn catch_up(state: &mut EconomyState, catalog: &Catalog, now: DateTime<Utc>) -> AccrualReport {
    let report = accrue(state, catalog, now);
    debug!(
        elapsed_secs = report.elapsed_secs,
        currencies = report.credited.len(),
        "Offline progress credited"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        catalog::{load_catalog, loader::tests::write_fixture, UpgradeId},
        economy::EconomyState,
    };
    use anyhow::Result;
    use chrono::Duration;
    use proptest::prelude::*;
    use tempfile::tempdir;

    fn catalog() -> Catalog {
        let temp = tempdir().expect("tempdir");
        write_fixture(temp.path()).expect("fixture");
        load_catalog(temp.path()).expect("catalog")
    }

    fn own(state: &mut EconomyState, catalog: &Catalog, tab: &str, id: &str, count: u64) {
        let tab = catalog.tab_named(tab).expect("tab");
        let upgrade = tab.upgrade(&UpgradeId::new(id)).expect("upgrade");
        state.ownership_mut(tab, upgrade).owned = count;
    }

    #[test]
    fn rates_sum_owned_production() {
        let catalog = catalog();
        let mut state = EconomyState::fresh(&catalog, Utc::now());
        own(&mut state, &catalog, "Sales", "hire-a-worker", 3);
        own(&mut state, &catalog, "Sales", "food-stall", 2);
        own(&mut state, &catalog, "Kitchen", "wok", 4);

        let rates = production_rates(&catalog, &state);
        assert_eq!(rates["yen"], 3.0 * 5.0 + 2.0 * 40.0);
        assert_eq!(rates["fried rice"], 4.0);
        assert_eq!(rates["vegetables"], 0.0);
    }

    #[test]
    fn ticks_are_time_based_and_idempotent() -> Result<()> {
        let catalog = catalog();
        let start = Utc::now();
        let mut state = EconomyState::fresh(&catalog, start);
        own(&mut state, &catalog, "Sales", "hire-a-worker", 2);

        let later = start + Duration::milliseconds(1_500);
        let report = accrue(&mut state, &catalog, later);
        assert_eq!(report.elapsed_secs, 1.5);
        assert_eq!(state.balance("yen"), 15.0);
        assert_eq!(state.last_accrual, later);

        let report = accrue(&mut state, &catalog, later);
        assert!(report.is_empty());
        assert_eq!(state.balance("yen"), 15.0);
        Ok(())
    }

    #[test]
    fn backwards_clock_credits_nothing() {
        let catalog = catalog();
        let start = Utc::now();
        let mut state = EconomyState::fresh(&catalog, start);
        own(&mut state, &catalog, "Sales", "hire-a-worker", 1);

        let report = accrue(&mut state, &catalog, start - Duration::hours(2));
        assert_eq!(report.elapsed_secs, 0.0);
        assert_eq!(state.balance("yen"), 0.0);
        assert_eq!(state.last_accrual, start);
    }

    proptest! {
        #[test]
        fn offline_progress_matches_rate_times_elapsed(
            workers in 0u64..50,
            stalls in 0u64..50,
            start_balance in 0.0f64..1e6,
            offline_secs in 1i64..(30 * 24 * 3600),
        ) {
            let catalog = catalog();
            let t0 = Utc::now();
            let mut state = EconomyState::fresh(&catalog, t0);
            state.credit("yen", start_balance);
            own(&mut state, &catalog, "Sales", "hire-a-worker", workers);
            own(&mut state, &catalog, "Sales", "food-stall", stalls);
            let rate = workers as f64 * 5.0 + stalls as f64 * 40.0;

            let t1 = t0 + Duration::seconds(offline_secs);
            catch_up(&mut state, &catalog, t1);

            let expected = start_balance + rate * offline_secs as f64;
            prop_assert!((state.balance("yen") - expected).abs() <= expected.max(1.0) * 1e-12);
            prop_assert_eq!(state.last_accrual, t1);
        }
    }
}
