use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use fiscal_shift::chart::ChartView;
use fiscal_shift::derive::{CardValues, Direction, MetricValues, ParameterCard};
use fiscal_shift::heatmap;
use fiscal_shift::sparkline;
use fiscal_shift::{CategoryFilter, Dashboard, LoadState, ViewSession};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction as LayoutDirection, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Cell, Chart, Dataset, GraphType, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Parameters,
    Heatmap,
    Aggregates,
}

impl Page {
    pub fn next(&self) -> Self {
        match self {
            Page::Parameters => Page::Heatmap,
            Page::Heatmap => Page::Aggregates,
            Page::Aggregates => Page::Parameters,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Page::Parameters => Page::Aggregates,
            Page::Heatmap => Page::Parameters,
            Page::Aggregates => Page::Heatmap,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Page::Parameters => "Parameters",
            Page::Heatmap => "Heatmap",
            Page::Aggregates => "Aggregates",
        }
    }
}

pub struct App {
    pub dashboard: Dashboard,
    pub session: ViewSession,
    /// Cards for the active filter, rebuilt when data or filter changes
    pub cards: Vec<ParameterCard>,
    pub state: TableState,
    pub current_page: Page,
    pub show_detail: bool,
}

impl App {
    pub fn new(session: ViewSession) -> Self {
        Self {
            dashboard: Dashboard::new(),
            session,
            cards: Vec::new(),
            state: TableState::default(),
            current_page: Page::Parameters,
            show_detail: false,
        }
    }

    /// Pull finished fetches into the dashboard
    pub fn poll_updates(&mut self) {
        if self.session.drain(&mut self.dashboard) {
            self.refresh_cards();
        }
    }

    pub fn refetch(&mut self) {
        self.session.refetch(&mut self.dashboard);
        self.show_detail = false;
        self.refresh_cards();
    }

    fn refresh_cards(&mut self) {
        self.cards = self.dashboard.cards();
        if self.cards.is_empty() {
            self.state.select(None);
        } else {
            let i = self.state.selected().unwrap_or(0).min(self.cards.len() - 1);
            self.state.select(Some(i));
        }
        self.sync_selection();
    }

    pub fn apply_filter(&mut self, filter: CategoryFilter) {
        self.dashboard.set_filter(filter);
        self.state.select(None);
        self.refresh_cards();
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
        self.sync_selection();
    }

    fn sync_selection(&mut self) {
        match self.selected_card().map(|c| c.key.clone()) {
            Some(key) if self.show_detail => {
                self.dashboard.select(&key);
            }
            _ => self.dashboard.clear_selection(),
        }
    }

    pub fn selected_card(&self) -> Option<&ParameterCard> {
        self.state.selected().and_then(|i| self.cards.get(i))
    }

    pub fn next_page(&mut self) {
        self.current_page = self.current_page.next();
    }

    pub fn previous_page(&mut self) {
        self.current_page = self.current_page.previous();
    }

    pub fn next(&mut self) {
        let len = self.cards.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i < len - 1 => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
        self.sync_selection();
    }

    pub fn previous(&mut self) {
        let len = self.cards.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
        self.sync_selection();
    }

    pub fn page_down(&mut self) {
        let len = self.cards.len();
        if len == 0 {
            return;
        }
        let i = self.state.selected().map_or(0, |i| (i + 10).min(len - 1));
        self.state.select(Some(i));
        self.sync_selection();
    }

    pub fn page_up(&mut self) {
        let i = self.state.selected().map_or(0, |i| i.saturating_sub(10));
        self.state.select(Some(i));
        self.sync_selection();
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!(error = %err, "terminal loop failed");
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    loop {
        app.poll_updates();
        terminal.draw(|f| ui(f, app))?;

        // Poll so fetch results show up without a key press
        if !event::poll(Duration::from_millis(150))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter if app.current_page == Page::Parameters => app.toggle_detail(),
                KeyCode::Tab => app.next_page(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Char('r') => app.refetch(),
                KeyCode::Char(c @ '0'..='4') => {
                    let idx = c as usize - '0' as usize;
                    app.apply_filter(CategoryFilter::OPTIONS[idx]);
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => {
                    if !app.cards.is_empty() {
                        app.state.select(Some(0));
                        app.sync_selection();
                    }
                }
                KeyCode::End => {
                    if !app.cards.is_empty() {
                        app.state.select(Some(app.cards.len() - 1));
                        app.sync_selection();
                    }
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Length(3), // Header with navigation
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    match app.current_page {
        Page::Parameters => {
            if !render_load_state(f, chunks[1], &app.dashboard.comparison, " Parameters ") {
                if app.show_detail {
                    let content_chunks = Layout::default()
                        .direction(LayoutDirection::Horizontal)
                        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
                        .split(chunks[1]);

                    render_cards(f, content_chunks[0], app);
                    render_detail_panel(f, content_chunks[1], app);
                } else {
                    render_cards(f, chunks[1], app);
                }
            }
        }
        Page::Heatmap => {
            if !render_load_state(f, chunks[1], &app.dashboard.comparison, " Heatmap ") {
                render_heatmap(f, chunks[1], app);
            }
        }
        Page::Aggregates => {
            if !render_load_state(f, chunks[1], &app.dashboard.aggregate, " Aggregates ") {
                render_aggregates(f, chunks[1], app);
            }
        }
    }

    render_status_bar(f, chunks[2], app);
}

/// Draw loading/error/no-data placeholders. Returns true if it drew anything.
fn render_load_state<T>(f: &mut Frame, area: Rect, state: &LoadState<T>, title: &str) -> bool {
    let (text, color) = match state {
        LoadState::Loading => ("  Loading...".to_string(), Color::Cyan),
        LoadState::Failed(message) => (format!("  Error loading data: {}  (r to retry)", message), Color::Red),
        LoadState::Ready(None) => ("  No data".to_string(), Color::DarkGray),
        LoadState::Ready(Some(_)) => return false,
    };

    let paragraph = Paragraph::new(vec![Line::from(""), Line::from(Span::styled(text, Style::default().fg(color)))])
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(title.to_string()),
        );
    f.render_widget(paragraph, area);
    true
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let pages = [Page::Parameters, Page::Heatmap, Page::Aggregates];

    let mut tab_spans = vec![];
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if *page == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.title().to_string(), style));
    }

    if let Some(doc) = app.dashboard.comparison.data() {
        tab_spans.push(Span::raw("  |  "));
        tab_spans.push(Span::styled(
            format!("{} → {}", doc.metadata.old_baseline, doc.metadata.new_baseline),
            Style::default().fg(Color::White),
        ));
    }

    tab_spans.push(Span::raw("  |  "));
    for (i, option) in CategoryFilter::OPTIONS.iter().enumerate() {
        let style = if *option == app.dashboard.filter {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        tab_spans.push(Span::styled(format!("{}:{} ", i, option.label()), style));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn category_color(category: fiscal_shift::Category) -> Color {
    match category {
        fiscal_shift::Category::Revenue => Color::Blue,
        fiscal_shift::Category::Spending => Color::Red,
        fiscal_shift::Category::Income => Color::Green,
        fiscal_shift::Category::Cpi => Color::Rgb(0xF9, 0x73, 0x16),
    }
}

fn direction_color(direction: Direction) -> Color {
    match direction {
        Direction::Up => Color::Green,
        Direction::Down => Color::Red,
    }
}

fn render_cards(f: &mut Frame, area: Rect, app: &mut App) {
    let header_cells = ["Parameter", "Category", "Year", "Old", "New", "Change", "Trend"]
        .iter()
        .map(|h| Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)));

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.cards.iter().map(|card| {
        let (old, new, change) = match &card.values {
            CardValues::Compared { old_text, new_text, badge } => {
                let change = match badge {
                    Some(b) => Cell::from(b.text.clone()).style(Style::default().fg(direction_color(b.direction))),
                    None => Cell::from(""),
                };
                (old_text.clone(), new_text.clone(), change)
            }
            CardValues::NewOnly { new_text } => (String::new(), new_text.clone(), Cell::from("")),
            CardValues::Empty => (String::new(), "-".to_string(), Cell::from("")),
        };

        let trend = card
            .sparkline
            .as_ref()
            .map(|s| sparkline::to_glyphs(&s.new, s.frame))
            .unwrap_or_default();

        Row::new(vec![
            Cell::from(truncate(&card.label, 36)),
            Cell::from(card.category.label()).style(Style::default().fg(category_color(card.category))),
            Cell::from(card.year.clone().unwrap_or_default()),
            Cell::from(old).style(Style::default().fg(Color::DarkGray)),
            Cell::from(new),
            change,
            Cell::from(truncate(&trend, 24)).style(Style::default().fg(Color::Cyan)),
        ])
        .height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(38),
            Constraint::Length(10),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(12),
            Constraint::Length(9),
            Constraint::Min(10),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(" Parameters ({}) ", app.cards.len())),
    )
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    match app.dashboard.selected_chart() {
        Some(chart) => render_chart(f, area, &chart),
        None => {
            let no_selection = Paragraph::new("No parameter selected").block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Yellow))
                    .title(" Comparison "),
            );
            f.render_widget(no_selection, area);
        }
    }
}

/// Line chart with the delta region drawn as vertical dots between the lines
fn render_chart(f: &mut Frame, area: Rect, chart: &ChartView) {
    let series: Vec<Vec<(f64, f64)>> = chart.traces.iter().map(|t| t.xy()).collect();

    let mut shade: Vec<(f64, f64)> = Vec::new();
    if let Some(delta) = &chart.delta {
        // Polygon is new values forward then old values backward
        let half = delta.values.len() / 2;
        for i in 0..half {
            let year = delta.years[i].trim().parse::<f64>().unwrap_or_default();
            let new = delta.values[i];
            let old = delta.values[delta.values.len() - 1 - i];
            for step in 1..8 {
                shade.push((year, old + (new - old) * step as f64 / 8.0));
            }
        }
    }

    let palette = [Color::DarkGray, Color::Cyan, Color::Gray, Color::Blue];
    let mut datasets: Vec<Dataset> = chart
        .traces
        .iter()
        .zip(series.iter())
        .enumerate()
        .map(|(i, (trace, points))| {
            Dataset::default()
                .name(trace.name.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(palette[i % palette.len()]))
                .data(points)
        })
        .collect();

    if !shade.is_empty() {
        datasets.push(
            Dataset::default()
                .marker(Marker::Dot)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Rgb(0x31, 0x97, 0x95)))
                .data(&shade),
        );
    }

    let (y_lo, y_hi) = chart.value_bounds().unwrap_or((0.0, 1.0));
    let (x_lo, x_hi) = chart.year_bounds().unwrap_or((0, 1));
    let (y_min, y_max) = chart.padded_value_bounds().unwrap_or((0.0, 1.0));
    let x_hi = if x_hi == x_lo { x_hi + 1 } else { x_hi };

    let y_labels = vec![
        Span::raw(axis_value(y_lo, &chart.y_axis)),
        Span::raw(axis_value(y_hi, &chart.y_axis)),
    ];

    let widget = Chart::new(datasets)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Yellow))
                .title(format!(" {} ", chart.title)),
        )
        .x_axis(
            Axis::default()
                .title("Year")
                .style(Style::default().fg(Color::Gray))
                .bounds([x_lo as f64, x_hi as f64])
                .labels(vec![Span::raw(x_lo.to_string()), Span::raw(x_hi.to_string())]),
        )
        .y_axis(
            Axis::default()
                .title(chart.y_axis.clone())
                .style(Style::default().fg(Color::Gray))
                .bounds([y_min, y_max])
                .labels(y_labels),
        );

    f.render_widget(widget, area);
}

fn axis_value(value: f64, axis: &str) -> String {
    if axis == "USD" {
        fiscal_shift::format_currency(value)
    } else {
        fiscal_shift::format_index(value)
    }
}

fn render_heatmap(f: &mut Frame, area: Rect, app: &App) {
    let Some(matrix) = app.dashboard.heatmap() else {
        let empty = Paragraph::new("  No projection-year changes for this filter").block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(" Heatmap "),
        );
        f.render_widget(empty, area);
        return;
    };

    let mut header_cells = vec![Cell::from("Parameter").style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))];
    header_cells.extend(
        matrix
            .years
            .iter()
            .map(|y| Cell::from(y.clone()).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))),
    );
    let header = Row::new(header_cells).style(Style::default().bg(Color::DarkGray)).height(1);

    let bound = matrix.bound();
    let rows = matrix.cells.iter().enumerate().map(|(r, row)| {
        let mut cells = vec![Cell::from(truncate(&matrix.row_labels[r], 30))];
        cells.extend(row.iter().map(|cell| {
            let heatmap::Rgb(red, green, blue) = heatmap::cell_color(cell.value, bound);
            let mut style = Style::default().bg(Color::Rgb(red, green, blue)).fg(Color::Black);
            if !cell.present {
                style = style.add_modifier(Modifier::DIM | Modifier::ITALIC);
            }
            Cell::from(format!("{:>7}", fiscal_shift::format_percent(cell.value))).style(style)
        }));
        Row::new(cells).height(1)
    });

    let mut widths = vec![Constraint::Length(32)];
    widths.extend(matrix.years.iter().map(|_| Constraint::Length(8)));

    let table = Table::new(rows, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(format!(
                " Percentage change across parameters  (scale ±{}) ",
                fiscal_shift::format_percent(bound)
            )),
    );

    f.render_widget(table, area);
}

fn render_aggregates(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([Constraint::Length(8), Constraint::Min(0)])
        .split(area);

    let card_chunks = Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(chunks[0]);

    for (card, slot) in app.dashboard.metric_cards().iter().zip(card_chunks.iter()) {
        let mut content = vec![Line::from(Span::styled(
            card.description.clone(),
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        ))];

        match &card.values {
            MetricValues::Compared {
                old_text,
                new_text,
                badge,
                diff_text,
            } => {
                content.push(Line::from(vec![
                    Span::styled(old_text.clone(), Style::default().fg(Color::DarkGray)),
                    Span::raw(" → "),
                    Span::styled(new_text.clone(), Style::default().add_modifier(Modifier::BOLD)),
                ]));

                let mut change = vec![];
                if let Some(b) = badge {
                    let arrow = match b.direction {
                        Direction::Up => "▲ ",
                        Direction::Down => "▼ ",
                    };
                    change.push(Span::styled(
                        format!("{}{}", arrow, b.text),
                        Style::default().fg(direction_color(b.direction)),
                    ));
                    change.push(Span::raw(" "));
                }
                if let Some(d) = diff_text {
                    change.push(Span::styled(d.clone(), Style::default().fg(Color::DarkGray)));
                }
                content.push(Line::from(change));
            }
            MetricValues::NoData => {}
        }
        content.push(Line::from(Span::styled(card.footnote(), Style::default().fg(Color::DarkGray))));

        let paragraph = Paragraph::new(content).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", card.label)),
        );
        f.render_widget(paragraph, *slot);
    }

    if let Some((revenue_spending, balance)) = app.dashboard.aggregate_charts() {
        let chart_chunks = Layout::default()
            .direction(LayoutDirection::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);
        render_chart(f, chart_chunks[0], &revenue_spending);
        render_chart(f, chart_chunks[1], &balance);
    }
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let selected = app.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = app.cards.len();

    let mut status_spans = vec![Span::styled(
        format!(" Row: {}/{} ", selected, total),
        Style::default().fg(Color::Cyan),
    )];

    if app.dashboard.filter != CategoryFilter::All {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(
            format!("Filter: {}", app.dashboard.filter.label()),
            Style::default().fg(Color::Green),
        ));
        status_spans.push(Span::raw(" ("));
        status_spans.push(Span::styled("0", Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(" all)"));
    }

    for (key, label) in [
        ("Enter", " Chart | "),
        ("Tab", " Page | "),
        ("0-4", " Category | "),
        ("r", " Reload | "),
        ("↑/↓", " Nav | "),
    ] {
        if key == "Enter" {
            status_spans.push(Span::raw(" | "));
        }
        status_spans.push(Span::styled(key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(label));
    }
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
