//! Cursor over tabs and upgrades. Never persisted.

use crate::catalog::{Catalog, TabDefinition, UpgradeDefinition};

/// Active tab plus the remembered selection on every tab.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationState {
    active_tab: usize,
    selections: Vec<usize>,
}

impl NavigationState {
    /// Cursor on the first upgrade of the first tab.
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            active_tab: 0,
            selections: vec![0; catalog.tabs.len()],
        }
    }

    /// Index of the active tab.
    pub fn active_tab(&self) -> usize {
        self.active_tab
    }

    /// Selection index on `tab`.
    pub fn selection(&self, tab: usize) -> usize {
        self.selections.get(tab).copied().unwrap_or(0)
    }

    /// Selection index on the active tab.
    pub fn active_selection(&self) -> usize {
        self.selection(self.active_tab)
    }

    /// Active tab definition.
    pub fn current_tab<'a>(&self, catalog: &'a Catalog) -> Option<&'a TabDefinition> {
        catalog.tab(self.active_tab)
    }

    /// Selected upgrade on the active tab.
    pub fn current_upgrade<'a>(&self, catalog: &'a Catalog) -> Option<&'a UpgradeDefinition> {
        self.current_tab(catalog)
            .and_then(|tab| tab.upgrades.get(self.active_selection()))
    }
}

/// Move the active tab by `delta`, stopping at either end.
pub fn move_tab(nav: &mut NavigationState, catalog: &Catalog, delta: isize) {
    nav.active_tab = clamp_index(nav.active_tab, delta, catalog.tabs.len());
}

/// Move the selection on the active tab by `delta`, stopping at either end.
pub fn move_selection(nav: &mut NavigationState, catalog: &Catalog, delta: isize) {
    let len = catalog
        .tab(nav.active_tab)
        .map(|tab| tab.upgrades.len())
        .unwrap_or(0);
    if nav.selections.len() <= nav.active_tab {
        nav.selections.resize(nav.active_tab + 1, 0);
    }
    let current = nav.selections[nav.active_tab];
    nav.selections[nav.active_tab] = clamp_index(current, delta, len);
}

fn clamp_index(current: usize, delta: isize, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let target = if delta.is_negative() {
        current.saturating_sub(delta.unsigned_abs())
    } else {
        current.saturating_add(delta.unsigned_abs())
    };
    target.min(len - 1)
}
