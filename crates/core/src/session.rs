//! The single owner of all game state, driven one event at a time.

use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::{
    accrual::{self, AccrualReport},
    catalog::{Catalog, TabDefinition, UpgradeDefinition},
    economy::EconomyState,
    navigation::{self, NavigationState},
    purchase::{self, PurchaseResult},
    save::{LoadOutcome, SaveError, SaveManager},
};

/// Discrete inputs consumed by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameEvent {
    /// Move between tabs.
    NavigateTab(isize),
    /// Move within the active tab.
    NavigateSelection(isize),
    /// Buy the selection, or quit when it is the quit entry.
    Activate,
    /// Periodic clock tick.
    Tick,
    /// External interrupt.
    Terminate,
}

/// What the run loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Keep running.
    Continue,
    /// State has been saved (or the attempt recorded); stop the loop.
    Exit,
}

/// Where the starting economy state came from.
#[derive(Debug, Clone, PartialEq)]
pub enum StartKind {
    /// A save was read and caught up.
    Restored {
        /// Offline production credited before play resumed.
        offline: AccrualReport,
    },
    /// No save existed.
    Fresh,
    /// The save was unusable; play starts fresh.
    Recovered {
        /// Why the save was rejected.
        reason: String,
    },
}

/// Read-only view handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    /// Immutable content.
    pub catalog: &'a Catalog,
    /// Balances and ownership.
    pub economy: &'a EconomyState,
    /// Cursor.
    pub navigation: &'a NavigationState,
    /// Latest status message, if any.
    pub status: Option<&'a str>,
}

impl<'a> Snapshot<'a> {
    /// Price of the next copy of `upgrade` on `tab`.
    pub fn cost(&self, tab: &TabDefinition, upgrade: &UpgradeDefinition) -> f64 {
        purchase::current_cost(self.economy, tab, upgrade)
    }

    /// Copies owned of `upgrade` on `tab`.
    pub fn owned(&self, tab: &TabDefinition, upgrade: &UpgradeDefinition) -> u64 {
        self.economy.owned(&tab.name, &upgrade.id)
    }

    /// Production per second per currency.
    pub fn rates(&self) -> BTreeMap<String, f64> {
        accrual::production_rates(self.catalog, self.economy)
    }

    /// Active tab definition.
    pub fn current_tab(&self) -> Option<&'a TabDefinition> {
        self.navigation.current_tab(self.catalog)
    }

    /// Selected upgrade on the active tab.
    pub fn current_upgrade(&self) -> Option<&'a UpgradeDefinition> {
        self.navigation.current_upgrade(self.catalog)
    }
}

/// Catalog, economy, cursor and save manager for one process lifetime.
pub struct GameSession {
    catalog: Catalog,
    economy: EconomyState,
    navigation: NavigationState,
    saves: SaveManager,
    autosave: Option<Duration>,
    last_checkpoint: DateTime<Utc>,
    status: Option<String>,
    shutdown_error: Option<SaveError>,
    save_blocked: Option<String>,
    finished: bool,
}

impl GameSession {
    /// Restore or initialise the economy, crediting offline progress before play begins.
    pub fn start(catalog: Catalog, saves: SaveManager, now: DateTime<Utc>) -> (Self, StartKind) {
        let mut save_blocked = None;
        let (economy, kind) = match saves.load() {
            Ok(LoadOutcome::Found(mut state)) => {
                let report = state.reconcile(&catalog);
                if !report.orphaned.is_empty() {
                    warn!(
                        orphaned = report.orphaned.len(),
                        "Some saved upgrades no longer match the catalog"
                    );
                }
                if report.seeded > 0 {
                    info!(seeded = report.seeded, "New upgrades added since the last save");
                }
                let offline = accrual::catch_up(&mut state, &catalog, now);
                (state, StartKind::Restored { offline })
            }
            Ok(LoadOutcome::NotFound) => {
                info!(path = %saves.path().display(), "No save found; starting fresh");
                (EconomyState::fresh(&catalog, now), StartKind::Fresh)
            }
            Err(err) => {
                warn!(%err, "Save unusable; starting fresh");
                // The unreadable file must never be replaced by this fresh state.
                if let Err(move_err) = saves.quarantine() {
                    error!(%move_err, "Failed to move unusable save aside; saving disabled");
                    save_blocked = Some(format!(
                        "{} could not be moved aside",
                        saves.path().display()
                    ));
                }
                (
                    EconomyState::fresh(&catalog, now),
                    StartKind::Recovered {
                        reason: err.to_string(),
                    },
                )
            }
        };

        let status = match &kind {
            StartKind::Restored { offline } => welcome_back(offline),
            StartKind::Fresh => "Welcome to Sizzle Star!".to_string(),
            StartKind::Recovered { reason } => match &save_blocked {
                Some(_) => format!("Started a new game without saving: {reason}"),
                None => format!("Started a new game: {reason}"),
            },
        };

        let navigation = NavigationState::new(&catalog);
        let session = Self {
            catalog,
            economy,
            navigation,
            saves,
            autosave: None,
            last_checkpoint: now,
            status: Some(status),
            shutdown_error: None,
            save_blocked,
            finished: false,
        };
        (session, kind)
    }

    /// Enable checkpoints every `interval` of play.
    pub fn with_autosave(mut self, interval: Option<Duration>) -> Self {
        self.autosave = interval;
        self
    }

    /// Process one event to completion.
    pub fn handle(&mut self, event: GameEvent, now: DateTime<Utc>) -> Control {
        if self.finished {
            return Control::Exit;
        }
        match event {
            GameEvent::NavigateTab(delta) => {
                navigation::move_tab(&mut self.navigation, &self.catalog, delta);
                Control::Continue
            }
            GameEvent::NavigateSelection(delta) => {
                navigation::move_selection(&mut self.navigation, &self.catalog, delta);
                Control::Continue
            }
            GameEvent::Activate => self.activate(now),
            GameEvent::Tick => {
                accrual::accrue(&mut self.economy, &self.catalog, now);
                self.checkpoint(now);
                Control::Continue
            }
            GameEvent::Terminate => {
                self.shutdown(now);
                Control::Exit
            }
        }
    }

    fn activate(&mut self, now: DateTime<Utc>) -> Control {
        let description = self
            .navigation
            .current_upgrade(&self.catalog)
            .map(|upgrade| upgrade.description.clone())
            .unwrap_or_default();
        let currency = self
            .navigation
            .current_tab(&self.catalog)
            .and_then(|tab| tab.currency.clone())
            .unwrap_or_default();

        match purchase::attempt_purchase(&self.navigation, &self.catalog, &mut self.economy) {
            PurchaseResult::Purchased {
                owned, next_cost, ..
            } => {
                self.set_status(format!(
                    "Bought {description} (owned {owned}). Next costs {} {currency}",
                    format_amount(next_cost)
                ));
                Control::Continue
            }
            PurchaseResult::InsufficientFunds { cost, balance } => {
                self.set_status(format!(
                    "{description} costs {} {currency}; you have {}",
                    format_amount(cost),
                    format_amount(balance)
                ));
                Control::Continue
            }
            PurchaseResult::NotForSale => {
                self.set_status(format!("{description} is not for sale"));
                Control::Continue
            }
            PurchaseResult::Quit => {
                self.shutdown(now);
                Control::Exit
            }
        }
    }

    /// Credit production up to `now`, save, and refuse further events.
    ///
    /// A save failure is logged and kept for [`GameSession::take_shutdown_error`].
    pub fn shutdown(&mut self, now: DateTime<Utc>) {
        if self.finished {
            return;
        }
        accrual::accrue(&mut self.economy, &self.catalog, now);
        if let Some(reason) = self.save_blocked.clone() {
            warn!(%reason, "Skipping save on exit");
            self.set_status(format!("Progress not saved: {reason}"));
            self.finished = true;
            return;
        }
        match self.saves.save(&self.economy) {
            Ok(()) => self.set_status("Progress saved".to_string()),
            Err(err) => {
                error!(%err, "Failed to save on exit");
                self.set_status(format!("Save failed: {err}"));
                self.shutdown_error = Some(err);
            }
        }
        self.finished = true;
    }

    fn checkpoint(&mut self, now: DateTime<Utc>) {
        let Some(interval) = self.autosave else {
            return;
        };
        if self.save_blocked.is_some() {
            return;
        }
        let due = now
            .signed_duration_since(self.last_checkpoint)
            .to_std()
            .map(|elapsed| elapsed >= interval)
            .unwrap_or(false);
        if !due {
            return;
        }
        self.last_checkpoint = now;
        if let Err(err) = self.saves.save(&self.economy) {
            error!(%err, "Checkpoint failed");
            self.set_status(format!("Auto-save failed: {err}"));
        }
    }

    /// Read-only view of the current state.
    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            catalog: &self.catalog,
            economy: &self.economy,
            navigation: &self.navigation,
            status: self.status.as_deref(),
        }
    }

    /// Immutable content.
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Current balances and ownership.
    pub fn economy(&self) -> &EconomyState {
        &self.economy
    }

    /// Current cursor.
    pub fn navigation(&self) -> &NavigationState {
        &self.navigation
    }

    /// Whether the session has shut down.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Save failure recorded during shutdown, if any.
    pub fn take_shutdown_error(&mut self) -> Option<SaveError> {
        self.shutdown_error.take()
    }

    fn set_status(&mut self, message: String) {
        self.status = Some(message);
    }
}

fn welcome_back(offline: &AccrualReport) -> String {
    if offline.is_empty() {
        return "Welcome back!".to_string();
    }
    let earned = offline
        .credited
        .iter()
        .filter(|(_, amount)| **amount > 0.0)
        .map(|(currency, amount)| format!("{} {currency}", format_amount(*amount)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Welcome back! In {} away you earned {earned}",
        format_elapsed(offline.elapsed_secs)
    )
}

/// Compact human-readable amount: `11.40`, `12.35K`, `4.00M`, `1.23e21`.
pub fn format_amount(value: f64) -> String {
    const SUFFIXES: [&str; 6] = ["", "K", "M", "B", "T", "Qa"];
    if !value.is_finite() {
        return value.to_string();
    }
    let mut scaled = value;
    for suffix in SUFFIXES {
        if scaled.abs() < 1000.0 {
            return format!("{scaled:.2}{suffix}");
        }
        scaled /= 1000.0;
    }
    format!("{value:.2e}")
}

fn format_elapsed(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    let (days, hours, minutes, seconds) = (
        total / 86_400,
        total / 3_600 % 24,
        total / 60 % 60,
        total % 60,
    );
    if days > 0 {
        format!("{days}d {hours}h")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
