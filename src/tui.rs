use crate::dashboard::{Dashboard, Origin, RefreshOutcome, Snapshot};
use crate::portfolio::{format_amount, format_money, format_with_commas};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{BarChart, Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;
use tui_big_text::{BigText, PixelSize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tab {
    Overview,
    Holdings,
}

impl Tab {
    fn title(self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::Holdings => "Holdings",
        }
    }

    fn all() -> &'static [Tab] {
        &[Tab::Overview, Tab::Holdings]
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "overview" => Some(Tab::Overview),
            "holdings" => Some(Tab::Holdings),
            _ => None,
        }
    }
}

pub struct App {
    pub current_tab: Tab,
    pub dashboard: Dashboard,
    pub snapshot: Arc<Snapshot>,
    pub should_quit: bool,
    pub loading: bool,
    pub error_message: Option<String>,
    pub currency: String,
    pub selected: usize,
    refresh_sender: mpsc::UnboundedSender<RefreshOutcome>,
    refresh_receiver: mpsc::UnboundedReceiver<RefreshOutcome>,
}

impl App {
    pub fn new(dashboard: Dashboard, currency: String) -> App {
        let (refresh_sender, refresh_receiver) = mpsc::unbounded_channel();
        App {
            current_tab: Tab::Overview,
            snapshot: dashboard.snapshot(),
            dashboard,
            should_quit: false,
            loading: false,
            error_message: None,
            currency,
            selected: 0,
            refresh_sender,
            refresh_receiver,
        }
    }

    /// Start a refresh in the background unless one is already running.
    pub fn request_refresh(&mut self) {
        if self.loading {
            debug!("refresh already in flight");
            return;
        }
        self.loading = true;

        let refresher = self.dashboard.refresher();
        let sender = self.refresh_sender.clone();
        tokio::spawn(async move {
            let outcome = refresher.run().await;
            // receiver only goes away when the app quits
            let _ = sender.send(outcome);
        });
    }

    pub fn try_receive_refresh(&mut self) -> bool {
        match self.refresh_receiver.try_recv() {
            Ok(outcome) => {
                self.apply(outcome);
                true
            }
            Err(_) => false,
        }
    }

    pub fn apply(&mut self, outcome: RefreshOutcome) {
        let error = self.dashboard.apply(outcome);
        self.snapshot = self.dashboard.snapshot();
        self.loading = false;
        self.error_message = error.map(|e| {
            let mut lines = vec![format!("{e}. Showing the example portfolio.")];
            lines.extend(e.details());
            lines.join("\n")
        });
        self.selected = self.selected.min(self.snapshot.holdings.len().saturating_sub(1));
    }

    pub fn next_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + 1) % tabs.len()];
    }

    pub fn previous_tab(&mut self) {
        let tabs = Tab::all();
        let current_index = tabs
            .iter()
            .position(|&t| t == self.current_tab)
            .unwrap_or(0);
        self.current_tab = tabs[(current_index + tabs.len() - 1) % tabs.len()];
    }

    pub fn select_next(&mut self) {
        if self.selected < self.snapshot.holdings.len().saturating_sub(1) {
            self.selected += 1;
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    fn handle_key(&mut self, code: KeyCode) {
        if self.error_message.is_some() {
            // any key dismisses the warning
            self.error_message = None;
            return;
        }

        match code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('r') => self.request_refresh(),
            KeyCode::Char('h') | KeyCode::Left | KeyCode::BackTab => self.previous_tab(),
            KeyCode::Char('l') | KeyCode::Right | KeyCode::Tab => self.next_tab(),
            KeyCode::Char('j') | KeyCode::Down if self.current_tab == Tab::Holdings => {
                self.select_next()
            }
            KeyCode::Char('k') | KeyCode::Up if self.current_tab == Tab::Holdings => {
                self.select_previous()
            }
            KeyCode::Char('1') => self.current_tab = Tab::Overview,
            KeyCode::Char('2') => self.current_tab = Tab::Holdings,
            _ => {}
        }
    }
}

pub async fn run_tui(
    dashboard: Dashboard,
    currency: String,
    tab: Option<Tab>,
) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(dashboard, currency);
    if let Some(tab) = tab {
        app.current_tab = tab;
    }
    app.request_refresh();

    let res = run_app(&mut terminal, &mut app).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        app.try_receive_refresh();

        if crossterm::event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key.code);
                }
            }
        }

        if app.should_quit {
            break;
        }

        // let the background refresh make progress
        tokio::task::yield_now().await;
    }
    Ok(())
}

fn ui(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    let tab_titles: Vec<Line> = Tab::all()
        .iter()
        .map(|t| {
            let style = if *t == app.current_tab {
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::White)
            };
            Line::from(Span::styled(t.title(), style))
        })
        .collect();

    let tabs = Tabs::new(tab_titles)
        .block(Block::default().borders(Borders::ALL).title("sheetfolio"))
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Yellow))
        .select(
            Tab::all()
                .iter()
                .position(|&t| t == app.current_tab)
                .unwrap_or(0),
        );
    f.render_widget(tabs, chunks[0]);

    match app.current_tab {
        Tab::Overview => render_overview(f, chunks[1], app),
        Tab::Holdings => render_holdings(f, chunks[1], app),
    }

    render_status(f, chunks[2], app);

    if let Some(error) = &app.error_message {
        render_error_popup(f, error);
    }
}

fn origin_label(snapshot: &Snapshot) -> String {
    match &snapshot.origin {
        Origin::Live { source } => format!("live via {}", source.label),
        Origin::Fallback { .. } => "example data (sheet unavailable)".to_string(),
        Origin::Placeholder => "example data".to_string(),
    }
}

fn render_status(f: &mut Frame, area: Rect, app: &App) {
    let state = if app.loading {
        Span::styled("Refreshing...", Style::default().fg(Color::Yellow))
    } else {
        Span::styled(
            format!(
                "Last refreshed {}",
                app.snapshot.refreshed_at.format("%Y-%m-%d %H:%M:%S")
            ),
            Style::default().fg(Color::Gray),
        )
    };
    let source_color = if app.snapshot.is_live() {
        Color::Green
    } else if app.snapshot.warning().is_some() {
        Color::Red
    } else {
        Color::Yellow
    };

    let status = Paragraph::new(Line::from(vec![
        state,
        Span::raw(" | "),
        Span::styled(origin_label(&app.snapshot), Style::default().fg(source_color)),
        Span::raw(" | r refresh | h/l tabs | j/k select | q quit"),
    ]));
    f.render_widget(status, area);
}

fn signed_color(v: f64) -> Color {
    if v >= 0.0 {
        Color::Green
    } else {
        Color::Red
    }
}

fn card<'a>(title: &'a str, value: String, color: Color) -> Paragraph<'a> {
    Paragraph::new(value)
        .style(Style::default().fg(color).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(title))
}

fn render_overview(f: &mut Frame, area: Rect, app: &App) {
    let snapshot = &app.snapshot;
    let summary = &snapshot.summary;
    let info = snapshot.portfolio.info();

    let mut constraints = vec![Constraint::Length(7), Constraint::Length(3)];
    if info.is_some() {
        constraints.push(Constraint::Length(3));
    }
    constraints.push(Constraint::Min(0));

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    // Total market value
    let big_text_value = format_money(summary.total_market_value, &app.currency);
    let big_text = BigText::builder()
        .pixel_size(PixelSize::Quadrant)
        .style(
            Style::default()
                .fg(Color::Green)
                .add_modifier(Modifier::BOLD),
        )
        .lines(vec![big_text_value.clone().into()])
        .build();

    let big_text_block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Market Value ({})", app.currency))
        .title_alignment(Alignment::Center);
    f.render_widget(big_text_block, main_chunks[0]);

    let inner = main_chunks[0].inner(ratatui::layout::Margin {
        horizontal: 1,
        vertical: 1,
    });
    let big_text_width = big_text_value.chars().count() as u16 * 4;
    let centered_area = if big_text_width < inner.width {
        let margin = (inner.width - big_text_width) / 2;
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Length(margin),
                Constraint::Min(0),
                Constraint::Length(margin),
            ])
            .split(inner)[1]
    } else {
        inner
    };
    f.render_widget(big_text, centered_area);

    // Summary cards
    let cards = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(main_chunks[1]);
    f.render_widget(
        card(
            "Invested",
            format_money(summary.total_invested, &app.currency),
            Color::White,
        ),
        cards[0],
    );
    f.render_widget(
        card(
            "Gain/Loss",
            format_money(summary.total_gain_loss, &app.currency),
            signed_color(summary.total_gain_loss),
        ),
        cards[1],
    );
    f.render_widget(
        card(
            "Return",
            format!("{:.2}%", summary.return_pct),
            signed_color(summary.return_pct),
        ),
        cards[2],
    );

    let mut next = 2;
    if let Some(info) = info {
        let account = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(main_chunks[next]);
        f.render_widget(
            card(
                "Starting Size",
                format_money(info.starting_size, &app.currency),
                Color::White,
            ),
            account[0],
        );
        f.render_widget(
            card(
                "Current Size",
                format!(
                    "{} ({:+.2}%)",
                    format_money(info.current_size, &app.currency),
                    info.account_growth_pct()
                ),
                signed_color(info.account_growth_pct()),
            ),
            account[1],
        );
        let month_title = if info.current_month.is_empty() {
            "Monthly P/L".to_string()
        } else {
            format!("{} P/L", info.current_month)
        };
        f.render_widget(
            Paragraph::new(format!(
                "{} ({:.2}%)",
                format_money(info.monthly_pl, &app.currency),
                info.monthly_pl_percent
            ))
            .style(
                Style::default()
                    .fg(signed_color(info.monthly_pl))
                    .add_modifier(Modifier::BOLD),
            )
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(month_title)),
            account[2],
        );
        next += 1;
    }

    render_weights(f, main_chunks[next], snapshot);
}

fn render_weights(f: &mut Frame, area: Rect, snapshot: &Snapshot) {
    let holdings = snapshot.by_market_value();
    let data: Vec<(&str, u64)> = holdings
        .iter()
        .map(|h| (h.symbol.as_str(), h.weight_pct.max(0.0).round() as u64))
        .collect();

    let barchart = BarChart::default()
        .block(Block::default().borders(Borders::ALL).title("Weight %"))
        .data(&data)
        .bar_width(7)
        .bar_gap(2)
        .bar_style(Style::default().fg(Color::Yellow))
        .value_style(Style::default().fg(Color::Black).bg(Color::Yellow));

    f.render_widget(barchart, area);
}

fn render_holdings(f: &mut Frame, area: Rect, app: &App) {
    let snapshot = &app.snapshot;
    let tracked = snapshot.portfolio.info().is_some();

    let mut header_names = vec!["Symbol", "Qty", "Buy", "Price"];
    let mut constraints = vec![
        Constraint::Length(8),
        Constraint::Length(10),
        Constraint::Length(10),
        Constraint::Length(10),
    ];
    if tracked {
        header_names.push("Stop");
        constraints.push(Constraint::Length(10));
    }
    header_names.extend(["Value", "G/L", "%G/L", "Weight", "Bought"]);
    constraints.extend([
        Constraint::Length(14),
        Constraint::Length(12),
        Constraint::Length(9),
        Constraint::Length(8),
        Constraint::Min(10),
    ]);

    let header = Row::new(header_names.iter().map(|h| {
        Cell::from(*h).style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        )
    }))
    .height(1)
    .bottom_margin(1);

    let rows = snapshot.by_market_value().into_iter().enumerate().map(|(i, h)| {
        let row_style = if i == app.selected {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        let pl_style = Style::default().fg(signed_color(h.gain_loss));

        let mut cells = vec![
            Cell::from(h.symbol.clone()).style(Style::default().add_modifier(Modifier::BOLD)),
            Cell::from(format_amount(h.quantity)),
            Cell::from(format!("{:.2}", h.buy_price)),
            Cell::from(format!("{:.2}", h.current_price)),
        ];
        if tracked {
            cells.push(Cell::from(
                h.stop_loss
                    .filter(|s| *s > 0.0)
                    .map(|s| format!("{s:.2}"))
                    .unwrap_or_else(|| "-".to_string()),
            ));
        }
        cells.extend([
            Cell::from(format_with_commas(h.market_value)),
            Cell::from(format_with_commas(h.gain_loss)).style(pl_style),
            Cell::from(format!("{:.2}%", h.return_pct)).style(pl_style),
            Cell::from(format!("{:.1}%", h.weight_pct)),
            Cell::from(h.buy_date.clone()),
        ]);

        Row::new(cells).height(1).style(row_style)
    });

    let summary = &snapshot.summary;
    let total_style = Style::default()
        .fg(Color::Green)
        .add_modifier(Modifier::BOLD);
    let mut total_cells = vec![
        Cell::from("TOTAL").style(total_style),
        Cell::from(""),
        Cell::from(""),
        Cell::from(""),
    ];
    if tracked {
        total_cells.push(Cell::from(""));
    }
    total_cells.extend([
        Cell::from(format_with_commas(summary.total_market_value)).style(total_style),
        Cell::from(format_with_commas(summary.total_gain_loss))
            .style(Style::default().fg(signed_color(summary.total_gain_loss))),
        Cell::from(format!("{:.2}%", summary.return_pct))
            .style(Style::default().fg(signed_color(summary.return_pct))),
        Cell::from(""),
        Cell::from(""),
    ]);
    let total_row = Row::new(total_cells).height(1);

    let table = Table::new(rows.chain(std::iter::once(total_row)), constraints)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!("Holdings ({})", snapshot.holdings.len())),
        )
        .style(Style::default().fg(Color::White));

    f.render_widget(table, area);
}

fn render_error_popup(f: &mut Frame, error: &str) {
    let popup_area = centered_rect(60, 30, f.area());
    f.render_widget(Clear, popup_area);

    let error_paragraph = Paragraph::new(error)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Warning (any key to dismiss)")
                .style(Style::default().fg(Color::Yellow)),
        )
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(error_paragraph, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
