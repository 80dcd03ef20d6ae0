use std::{io, pin::pin, thread, time::Duration};

use anyhow::{Context, Result};
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use sizzle_core::{
    session::format_amount, Control, GameEvent, GameSession, SaveError, Snapshot,
};
use tokio::{
    sync::mpsc,
    time::{self, MissedTickBehavior},
};
use tracing::{debug, info};

const INPUT_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct Theme {
    primary_fg: Color,
    accent: Color,
    muted: Color,
    selection_bg: Color,
    success: Color,
    warning: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            primary_fg: Color::White,
            accent: Color::Yellow,
            muted: Color::DarkGray,
            selection_bg: Color::DarkGray,
            success: Color::Green,
            warning: Color::Red,
        }
    }
}

/// Terminal front end: renders snapshots and feeds events into the session.
pub struct SizzleApp {
    session: GameSession,
    theme: Theme,
}

impl SizzleApp {
    pub fn new(session: GameSession) -> Self {
        Self {
            session,
            theme: Theme::default(),
        }
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut stdout = io::stdout();
        enable_raw_mode().context("failed to enter raw mode")?;
        execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend).context("failed to create terminal")?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let result = self.event_loop(&mut terminal).await;
        if result.is_err() && !self.session.is_finished() {
            self.session.shutdown(Utc::now());
        }

        restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> Result<()> {
        let (input_tx, mut input_rx) = mpsc::channel::<Event>(128);
        spawn_input_thread(input_tx);

        let tick_interval = self.session.catalog().config.tick_interval();
        let mut ticker = time::interval(tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut interrupt = pin!(tokio::signal::ctrl_c());
        info!(tick_ms = tick_interval.as_millis() as u64, "Entering run loop");

        loop {
            terminal.draw(|frame| self.draw(frame))?;

            let event = tokio::select! {
                maybe_input = input_rx.recv() => match maybe_input {
                    Some(input) => map_input(&input),
                    None => Some(GameEvent::Terminate),
                },
                _ = ticker.tick() => Some(GameEvent::Tick),
                _ = &mut interrupt => Some(GameEvent::Terminate),
            };

            let Some(event) = event else {
                continue;
            };
            if !matches!(event, GameEvent::Tick) {
                debug!(?event, "Handling event");
            }
            if self.session.handle(event, Utc::now()) == Control::Exit {
                info!("Session finished");
                break;
            }
        }
        Ok(())
    }

    pub fn take_shutdown_error(&mut self) -> Option<SaveError> {
        self.session.take_shutdown_error()
    }

    fn draw(&self, frame: &mut Frame) {
        let snapshot = self.session.snapshot();
        let config = snapshot.catalog.config;
        let area = frame.size();
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(config.rows.saturating_add(2)),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_tabs(frame, rows[0], &snapshot);
        self.render_balances(frame, rows[1], &snapshot);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(config.cols.saturating_add(24)),
                Constraint::Min(20),
            ])
            .split(rows[2]);
        self.render_upgrades(frame, body[0], &snapshot);
        self.render_details(frame, body[1], &snapshot);
        self.render_status(frame, rows[3], &snapshot);
        self.render_help(frame, rows[4]);
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
        let titles: Vec<Line> = snapshot
            .catalog
            .tabs
            .iter()
            .map(|tab| Line::from(format!("{} {}", tab.icon, tab.name)))
            .collect();
        let tabs = Tabs::new(titles)
            .select(snapshot.navigation.active_tab())
            .block(Block::default().borders(Borders::ALL).title("Sizzle Star"))
            .style(Style::default().fg(self.theme.muted))
            .highlight_style(
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            );
        frame.render_widget(tabs, area);
    }

    fn render_balances(&self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
        let rates = snapshot.rates();
        let mut spans = Vec::new();
        for tab in snapshot.catalog.tabs.iter().filter(|tab| tab.is_economic()) {
            let Some(currency) = tab.currency.as_deref() else {
                continue;
            };
            if !spans.is_empty() {
                spans.push(Span::raw("   "));
            }
            let rate = rates.get(currency).copied().unwrap_or(0.0);
            spans.push(Span::styled(
                format!("{} {} {}", tab.icon, format_amount(snapshot.economy.balance(currency)), currency),
                Style::default()
                    .fg(self.theme.primary_fg)
                    .add_modifier(Modifier::BOLD),
            ));
            spans.push(Span::styled(
                format!(" (+{}/s)", format_amount(rate)),
                Style::default().fg(self.theme.muted),
            ));
        }
        let balances = Paragraph::new(Line::from(spans))
            .block(Block::default().borders(Borders::ALL).title("Balances"));
        frame.render_widget(balances, area);
    }

    fn render_upgrades(&self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
        let Some(tab) = snapshot.current_tab() else {
            return;
        };
        let balance = tab
            .currency
            .as_deref()
            .map(|currency| snapshot.economy.balance(currency));

        let items: Vec<ListItem> = tab
            .upgrades
            .iter()
            .map(|upgrade| {
                let mut spans = vec![Span::raw(upgrade.description.clone())];
                if let Some(balance) = balance {
                    let cost = snapshot.cost(tab, upgrade);
                    let cost_color = if balance >= cost {
                        self.theme.success
                    } else {
                        self.theme.muted
                    };
                    spans.push(Span::styled(
                        format!("  x{}", snapshot.owned(tab, upgrade)),
                        Style::default().fg(self.theme.accent),
                    ));
                    spans.push(Span::styled(
                        format!("  {} {}", format_amount(cost), tab.icon),
                        Style::default().fg(cost_color),
                    ));
                }
                ListItem::new(Line::from(spans))
            })
            .collect();

        let mut state = ListState::default();
        state.select(Some(snapshot.navigation.active_selection()));
        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL).title(tab.name.as_str()))
            .highlight_style(Style::default().bg(self.theme.selection_bg))
            .highlight_symbol("▶ ");
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_details(&self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
        let (Some(tab), Some(upgrade)) = (snapshot.current_tab(), snapshot.current_upgrade())
        else {
            return;
        };

        let mut lines = vec![
            Line::from(Span::styled(
                upgrade.description.clone(),
                Style::default()
                    .fg(self.theme.accent)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
        ];
        match tab.currency.as_deref() {
            _ if upgrade.is_quit() => {
                lines.push(Line::from("Save your progress and close the shop."));
                lines.push(Line::from("Production keeps running while you are away."));
            }
            Some(currency) => {
                let owned = snapshot.owned(tab, upgrade);
                let cost = snapshot.cost(tab, upgrade);
                let balance = snapshot.economy.balance(currency);
                lines.push(Line::from(format!("Owned: {owned}")));
                lines.push(Line::from(format!(
                    "Next costs: {} {currency}",
                    format_amount(cost)
                )));
                lines.push(Line::from(format!(
                    "Produces: {} {currency}/s each",
                    format_amount(upgrade.base_production)
                )));
                lines.push(Line::from(format!(
                    "Currently: {} {currency}/s",
                    format_amount(owned as f64 * upgrade.base_production)
                )));
                if balance < cost {
                    lines.push(Line::from(""));
                    lines.push(Line::from(Span::styled(
                        format!("Need {} more", format_amount(cost - balance)),
                        Style::default().fg(self.theme.warning),
                    )));
                }
            }
            None => {}
        }

        let details = Paragraph::new(lines)
            .block(Block::default().borders(Borders::ALL).title("Details"))
            .wrap(Wrap { trim: true });
        frame.render_widget(details, area);
    }

    fn render_status(&self, frame: &mut Frame, area: Rect, snapshot: &Snapshot) {
        let status = Paragraph::new(snapshot.status.unwrap_or("Ready"))
            .style(Style::default().fg(self.theme.primary_fg))
            .block(Block::default().borders(Borders::ALL).title("Status"));
        frame.render_widget(status, area);
    }

    fn render_help(&self, frame: &mut Frame, area: Rect) {
        let help = Paragraph::new("←/→ tabs  ↑/↓ select  Enter buy  q quit")
            .style(Style::default().fg(self.theme.muted));
        frame.render_widget(help, area);
    }
}

fn map_input(event: &Event) -> Option<GameEvent> {
    match event {
        Event::Key(key) => map_key(key),
        _ => None,
    }
}

fn map_key(key: &KeyEvent) -> Option<GameEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') => Some(GameEvent::Terminate),
            _ => None,
        };
    }
    match key.code {
        KeyCode::Left | KeyCode::Char('h') | KeyCode::BackTab => Some(GameEvent::NavigateTab(-1)),
        KeyCode::Right | KeyCode::Char('l') | KeyCode::Tab => Some(GameEvent::NavigateTab(1)),
        KeyCode::Up | KeyCode::Char('k') => Some(GameEvent::NavigateSelection(-1)),
        KeyCode::Down | KeyCode::Char('j') => Some(GameEvent::NavigateSelection(1)),
        KeyCode::Enter | KeyCode::Char(' ') => Some(GameEvent::Activate),
        KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('Q') => Some(GameEvent::Terminate),
        _ => None,
    }
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_thread(sender: mpsc::Sender<Event>) {
    thread::spawn(move || loop {
        match event::poll(INPUT_POLL) {
            Ok(true) => match event::read() {
                Ok(evt) => {
                    if sender.blocking_send(evt).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            },
            Ok(false) => {
                if sender.is_closed() {
                    break;
                }
            }
            Err(_) => break,
        }
    });
}
