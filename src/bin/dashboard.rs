mod dashboard_app;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dashboard_app::{format_ms, format_usd, short_address, truncate, AppState, ConnectionStatus, Focus};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> io::Result<()> {
    let base_url = std::env::var("API_URL").unwrap_or_else(|_| "http://localhost:3000".to_string());

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .map_err(io::Error::other)?;

    let mut app = AppState::new(base_url);

    // first poll so the opening frame has data
    app.refresh(&client).await;

    // raw mode + alternate screen
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut tables = TableStates::default();

    let result = run_loop(&mut terminal, &mut app, &client, &mut tables).await;

    // restore even if the loop errored
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

#[derive(Default)]
struct TableStates {
    collections: TableState,
    wallets: TableState,
}

impl TableStates {
    fn focused(&mut self, focus: Focus) -> &mut TableState {
        match focus {
            Focus::Collections => &mut self.collections,
            Focus::Wallets => &mut self.wallets,
        }
    }
}

// ---------------------------------------------------------------------------
// Main event loop
// ---------------------------------------------------------------------------

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut AppState,
    client: &reqwest::Client,
    tables: &mut TableStates,
) -> io::Result<()> {
    let mut last_tick = std::time::Instant::now();

    loop {
        terminal.draw(|f| render(f, app, tables))?;

        let timeout = POLL_INTERVAL
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);

        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') | KeyCode::Char('Q') => return Ok(()),
                        KeyCode::Char('r') | KeyCode::Char('R') => {
                            app.refresh(client).await;
                            last_tick = std::time::Instant::now();
                        }
                        KeyCode::Char('d') | KeyCode::Char('D') => {
                            app.trigger_deep_refresh(client).await;
                        }
                        KeyCode::Tab => app.toggle_focus(),
                        KeyCode::Down | KeyCode::Char('j') => {
                            let max = app.focused_len().saturating_sub(1);
                            let state = tables.focused(app.focus);
                            let next = state.selected().map_or(0, |i| (i + 1).min(max));
                            state.select(Some(next));
                        }
                        KeyCode::Up | KeyCode::Char('k') => {
                            let state = tables.focused(app.focus);
                            let prev = state.selected().map_or(0, |i| i.saturating_sub(1));
                            state.select(Some(prev));
                        }
                        _ => {}
                    }
                }
            }
        }

        if last_tick.elapsed() >= POLL_INTERVAL {
            app.refresh(client).await;
            last_tick = std::time::Instant::now();
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(f: &mut Frame, app: &AppState, tables: &mut TableStates) {
    let area = f.area();

    // header, two tables, key/latency footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // header
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(area);

    render_header(f, app, chunks[0]);
    render_body(f, app, tables, chunks[1]);
    render_footer(f, app, chunks[2]);
}

fn render_header(f: &mut Frame, app: &AppState, area: Rect) {
    let (status_text, status_color) = match &app.status {
        ConnectionStatus::Connected => ("● connected".to_string(), Color::Green),
        ConnectionStatus::Connecting => ("◌ connecting".to_string(), Color::Yellow),
        ConnectionStatus::Error(e) => (format!("✗ {}", truncate(e, 40)), Color::Red),
    };
    let label = Style::default().fg(Color::White);

    let summary = &app.collection_summary;
    let collections_line = Line::from(vec![
        Span::styled(
            " Claim Scanner  ",
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::styled(status_text, Style::default().fg(status_color)),
        Span::raw("  │  "),
        Span::styled(format!("{} collections", summary.total_collections), label),
        Span::raw("  │  "),
        Span::styled(format!("{} unique wallets", summary.total_unique_wallets), label),
        Span::raw("  │  "),
        Span::styled(
            format!("top: {} ({})", truncate(&summary.top_collection, 20), summary.top_collection_wallets),
            label,
        ),
    ]);

    let wallets_line = match &app.wallet_summary {
        Some(w) => Line::from(vec![
            Span::styled(" Balances  ", Style::default().fg(Color::Cyan)),
            Span::styled(format_usd(w.total_value_usd), Style::default().fg(Color::Green)),
            Span::raw("  │  "),
            Span::styled(format!("ETH {}", format_usd(w.total_eth_usd)), label),
            Span::raw("  │  "),
            Span::styled(format!("HL {}", format_usd(w.total_hl_usd)), label),
            Span::raw("  │  "),
            Span::styled(format!("avg {}", format_usd(w.avg_value_usd)), label),
            Span::raw("  │  "),
            Span::styled(format!("{}/{} ok", w.wallets_successful, w.wallets_scanned), label),
            Span::raw("  │  "),
            Span::styled(format!("HYPE ${:.2}", w.hype_price), label),
        ]),
        None => Line::from(Span::styled(
            " Balances  no wallet scan yet",
            Style::default().fg(Color::DarkGray),
        )),
    };

    let paragraph = Paragraph::new(vec![collections_line, wallets_line]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray)),
    );

    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, app: &AppState, tables: &mut TableStates, area: Rect) {
    // Horizontal split: collections (45%) | wallets (55%)
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
        .split(area);

    render_collections_table(f, app, &mut tables.collections, halves[0]);
    render_wallets_table(f, app, &mut tables.wallets, halves[1]);
}

fn panel(title: &'static str, focused: bool) -> Block<'static> {
    let border = if focused { Color::Cyan } else { Color::DarkGray };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border))
        .title(Span::styled(
            title,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ))
}

fn header_row(labels: &[&'static str]) -> Row<'static> {
    let cells = labels
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));
    Row::new(cells).height(1)
}

fn render_collections_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let rows: Vec<Row> = app
        .collections
        .iter()
        .map(|c| {
            let category_color = match c.category.as_str() {
                "NFT" => Color::Magenta,
                "DeFi" => Color::LightBlue,
                _ => Color::Gray,
            };
            Row::new(vec![
                Cell::from(c.rank.to_string()).style(Style::default().fg(Color::DarkGray)),
                Cell::from(truncate(&c.entity, 24)),
                Cell::from(c.category.clone()).style(Style::default().fg(category_color)),
                Cell::from(c.unique_wallets.to_string()).style(Style::default().fg(Color::Cyan)),
                Cell::from(format!("{:.2}%", c.percentage)),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(10),
            Constraint::Length(6),
            Constraint::Length(8),
            Constraint::Length(7),
        ],
    )
    .header(header_row(&["#", "Collection", "Type", "Wallets", "Share"]))
    .block(panel(" COLLECTIONS ", app.focus == Focus::Collections))
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_wallets_table(f: &mut Frame, app: &AppState, state: &mut TableState, area: Rect) {
    let rows: Vec<Row> = app
        .wallets
        .iter()
        .map(|w| {
            let usd_color = if !w.success {
                Color::Red
            } else if w.balance_usd >= 10_000.0 {
                Color::Green
            } else if w.balance_usd >= 100.0 {
                Color::Yellow
            } else {
                Color::White
            };
            Row::new(vec![
                Cell::from(short_address(&w.address)),
                Cell::from(format_usd(w.balance_usd)).style(Style::default().fg(usd_color)),
                Cell::from(format_usd(w.eth_balance_usd)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(format_usd(w.hl_balance_usd)).style(Style::default().fg(Color::DarkGray)),
                Cell::from(w.token_count.to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(13),
            Constraint::Min(12),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(6),
        ],
    )
    .header(header_row(&["Wallet", "USD", "ETH", "HL", "Tokens"]))
    .block(panel(" TOP WALLETS ", app.focus == Focus::Wallets))
    .row_highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    );

    f.render_stateful_widget(table, area, state);
}

fn render_footer(f: &mut Frame, app: &AppState, area: Rect) {
    let refresh_state = if app.health.deep_refresh_running {
        Span::styled("deep refresh running  ", Style::default().fg(Color::Magenta))
    } else {
        Span::raw("")
    };
    let flash = app.flash.as_deref().unwrap_or("");

    let line = Line::from(vec![
        Span::styled(" [q] ", Style::default().fg(Color::Yellow)),
        Span::raw("quit  "),
        Span::styled("[r] ", Style::default().fg(Color::Yellow)),
        Span::raw("refresh  "),
        Span::styled("[d] ", Style::default().fg(Color::Yellow)),
        Span::raw("deep refresh  "),
        Span::styled("[tab] ", Style::default().fg(Color::Yellow)),
        Span::raw("switch  "),
        Span::styled("[↑↓ / j k] ", Style::default().fg(Color::Yellow)),
        Span::raw("scroll  "),
        refresh_state,
        Span::styled(
            format!(
                "fetch p50 {} p95 {} p99 {} ({} samples)  ",
                format_ms(app.latency.p50_ms),
                format_ms(app.latency.p95_ms),
                format_ms(app.latency.p99_ms),
                app.latency.samples,
            ),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(flash.to_string(), Style::default().fg(Color::Cyan)),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().fg(Color::White));
    f.render_widget(paragraph, area);
}
