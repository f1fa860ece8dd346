use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};
use chrono::NaiveDate;
use std::cell::RefCell;
use std::io::stdout;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::api::HttpApi;
use crate::catalog::{self, Catalog, Named};
use crate::models::{Category, Item, ListingFilter, ListingKind, Location, NavParams, RecencyWindow};
use crate::search::{FilterChange, ListingSearchController, Notifier};
use crate::session::Session;
use crate::worker::{self, FetchWorker};

/// Scroll units one list row stands for.
const ROW_UNITS: f64 = 100.0;
const NOTICE_TTL: Duration = Duration::from_secs(5);

struct Notice {
    message: String,
    shown_at: Instant,
}

/// Transient one-line message under the list.
#[derive(Clone, Default)]
struct NoticeBoard(Rc<RefCell<Option<Notice>>>);

impl NoticeBoard {
    fn current(&self) -> Option<String> {
        self.0
            .borrow()
            .as_ref()
            .filter(|n| n.shown_at.elapsed() < NOTICE_TTL)
            .map(|n| n.message.clone())
    }
}

impl Notifier for NoticeBoard {
    fn error(&mut self, message: &str) {
        *self.0.borrow_mut() = Some(Notice {
            message: message.to_string(),
            shown_at: Instant::now(),
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickField {
    Category,
    Location,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PickOption {
    Any,
    Entry(i64, String),
}

impl PickField {
    fn label(self) -> &'static str {
        match self {
            PickField::Category => "Category",
            PickField::Location => "Location",
        }
    }

    fn change(self, option: PickOption) -> FilterChange {
        match (self, option) {
            (PickField::Category, PickOption::Any) => FilterChange::Category(None),
            (PickField::Category, PickOption::Entry(id, name)) => FilterChange::Category(Some(Category { id, name })),
            (PickField::Location, PickOption::Any) => FilterChange::Location(None),
            (PickField::Location, PickOption::Entry(id, name)) => FilterChange::Location(Some(Location { id, name })),
        }
    }
}

/// Category or location chooser narrowed by typed text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Picker {
    field: PickField,
    query: String,
    selected: usize,
}

impl Picker {
    fn new(field: PickField) -> Self {
        Self {
            field,
            query: String::new(),
            selected: 0,
        }
    }

    fn options(&self, catalog: &Catalog) -> Vec<PickOption> {
        fn entries<T: Named>(items: &[T], query: &str) -> Vec<PickOption> {
            catalog::search(items, query)
                .into_iter()
                .map(|e| PickOption::Entry(e.id(), e.name().to_string()))
                .collect()
        }

        let mut options = vec![PickOption::Any];
        options.extend(match self.field {
            PickField::Category => entries(&catalog.categories, &self.query),
            PickField::Location => entries(&catalog.locations, &self.query),
        });
        options
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DateField {
    From,
    To,
}

/// Date range and recency editor; applied as one filter replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
struct DateForm {
    from: String,
    to: String,
    recency: Option<RecencyWindow>,
    focus: DateField,
}

impl DateForm {
    fn from_filter(filter: &ListingFilter) -> Self {
        let format = |date: Option<NaiveDate>| date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        Self {
            from: format(filter.date_from),
            to: format(filter.date_to),
            recency: filter.recency,
            focus: DateField::From,
        }
    }

    fn focused(&mut self) -> &mut String {
        match self.focus {
            DateField::From => &mut self.from,
            DateField::To => &mut self.to,
        }
    }

    fn switch_focus(&mut self) {
        self.focus = match self.focus {
            DateField::From => DateField::To,
            DateField::To => DateField::From,
        };
    }

    fn apply(&self, base: &ListingFilter) -> Result<ListingFilter, String> {
        let date_from = parse_date(&self.from)?;
        let date_to = parse_date(&self.to)?;
        if let (Some(from), Some(to)) = (date_from, date_to) {
            if from > to {
                return Err(format!("Start date {} is after end date {}", from, to));
            }
        }
        Ok(ListingFilter {
            date_from,
            date_to,
            recency: self.recency,
            ..base.clone()
        })
    }
}

fn parse_date(raw: &str) -> Result<Option<NaiveDate>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| format!("'{}' is not a date, use YYYY-MM-DD", raw))
}

fn next_recency(recency: Option<RecencyWindow>) -> Option<RecencyWindow> {
    match recency {
        None => Some(RecencyWindow::Week),
        Some(RecencyWindow::Week) => Some(RecencyWindow::Month),
        Some(RecencyWindow::Month) => None,
    }
}

enum Mode {
    Browse,
    Search(String),
    Pick(Picker),
    Dates(DateForm),
}

struct AppState {
    controller: ListingSearchController,
    catalog: Catalog,
    notices: NoticeBoard,
    selected: usize,
    detail_scroll: u16,
    mode: Mode,
}

impl AppState {
    fn current_item(&self) -> Option<&Item> {
        self.controller.items().get(self.selected)
    }

    fn next(&mut self) {
        let len = self.controller.items().len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
            self.detail_scroll = 0;
        }
    }

    fn prev(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.detail_scroll = 0;
        }
    }

    fn reset_selection(&mut self) {
        self.selected = 0;
        self.detail_scroll = 0;
    }

    fn clamp_selection(&mut self) {
        let len = self.controller.items().len();
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }

    fn scroll_offset(&self) -> f64 {
        self.selected as f64 * ROW_UNITS
    }
}

pub fn run_browse(api: HttpApi, session: Session, mut nav: NavParams) -> Result<()> {
    let mut notices = NoticeBoard::default();
    let catalog = match Catalog::fetch(&api) {
        Ok(catalog) => catalog,
        Err(e) => {
            tracing::warn!("Categories and locations unavailable: {}", e);
            notices.error("Could not load categories and locations");
            Catalog::default()
        }
    };
    let controller = ListingSearchController::new(&nav, Box::new(notices.clone()));
    let worker = FetchWorker::spawn(api)?;

    let mut state = AppState {
        controller,
        catalog,
        notices,
        selected: 0,
        detail_scroll: 0,
        mode: Mode::Browse,
    };
    worker.submit(state.controller.on_focus(&nav));

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &worker, &session);

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    state.controller.on_exit(&mut nav);
    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    worker: &FetchWorker,
    session: &Session,
) -> Result<()> {
    let mut list_state = ListState::default();
    let mut signed_in = session.is_signed_in();

    loop {
        while let Some(outcome) = worker.try_recv() {
            if let Some(job) = worker::apply(&mut state.controller, outcome) {
                worker.submit(job);
            }
            state.clamp_selection();
        }

        if signed_in && !session.is_signed_in() {
            state.notices.clone().error("Signed out. Run `finder login` to sign in again.");
        }
        signed_in = session.is_signed_in();

        list_state.select((!state.controller.items().is_empty()).then_some(state.selected));
        terminal.draw(|frame| draw(frame, state, &mut list_state))?;

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }
        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match state.mode {
                Mode::Browse => {
                    if !handle_browse_key(state, worker, key) {
                        break;
                    }
                }
                Mode::Search(_) => handle_search_key(state, worker, key),
                Mode::Pick(_) => handle_pick_key(state, worker, key),
                Mode::Dates(_) => handle_dates_key(state, worker, key),
            }
        }
    }
    Ok(())
}

fn handle_browse_key(state: &mut AppState, worker: &FetchWorker, key: KeyEvent) -> bool {
    let controller = &mut state.controller;
    let request = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => return false,
        KeyCode::Tab | KeyCode::Left | KeyCode::Right => {
            let other = controller.active_tab().other();
            let request = controller.set_active_tab(other);
            state.reset_selection();
            request
        }
        KeyCode::Down | KeyCode::Char('j') => {
            state.next();
            let offset = state.scroll_offset();
            state.controller.on_scroll(offset)
        }
        KeyCode::Up | KeyCode::Char('k') => {
            state.prev();
            None
        }
        KeyCode::Char('J') | KeyCode::PageDown => {
            state.detail_scroll = state.detail_scroll.saturating_add(3);
            None
        }
        KeyCode::Char('K') | KeyCode::PageUp => {
            state.detail_scroll = state.detail_scroll.saturating_sub(3);
            None
        }
        KeyCode::Char('/') => {
            state.mode = Mode::Search(controller.filter().q.clone());
            None
        }
        KeyCode::Char('f') => {
            if let Some(action) = controller.toggle_favorite() {
                worker.submit(action);
            }
            None
        }
        KeyCode::Char('r') => {
            state.reset_selection();
            Some(state.controller.pull_to_refresh())
        }
        KeyCode::Char('p') => {
            let with_photo = !controller.filter().with_photo;
            controller.set_filter_field(FilterChange::WithPhoto(with_photo))
        }
        KeyCode::Char('b') => {
            let with_body = !controller.filter().with_body;
            controller.set_filter_field(FilterChange::WithBody(with_body))
        }
        KeyCode::Char('w') => {
            let recency = next_recency(controller.filter().recency);
            controller.set_filter_field(FilterChange::Recency(recency))
        }
        KeyCode::Char('c') => {
            state.mode = Mode::Pick(Picker::new(PickField::Category));
            None
        }
        KeyCode::Char('l') => {
            state.mode = Mode::Pick(Picker::new(PickField::Location));
            None
        }
        KeyCode::Char('d') => {
            state.mode = Mode::Dates(DateForm::from_filter(controller.filter()));
            None
        }
        _ => None,
    };

    if let Some(request) = request {
        worker.submit(request);
    }
    true
}

fn handle_search_key(state: &mut AppState, worker: &FetchWorker, key: KeyEvent) {
    let Mode::Search(buffer) = &mut state.mode else {
        return;
    };
    match key.code {
        KeyCode::Esc => state.mode = Mode::Browse,
        KeyCode::Enter => {
            let query = buffer.trim().to_string();
            state.mode = Mode::Browse;
            if let Some(request) = state.controller.set_filter_field(FilterChange::Query(query)) {
                state.reset_selection();
                worker.submit(request);
            }
        }
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Char(c) => buffer.push(c),
        _ => {}
    }
}

fn handle_pick_key(state: &mut AppState, worker: &FetchWorker, key: KeyEvent) {
    let Mode::Pick(picker) = &mut state.mode else {
        return;
    };
    match key.code {
        KeyCode::Esc => state.mode = Mode::Browse,
        KeyCode::Up => picker.selected = picker.selected.saturating_sub(1),
        KeyCode::Down => {
            if picker.selected + 1 < picker.options(&state.catalog).len() {
                picker.selected += 1;
            }
        }
        KeyCode::Enter => {
            let field = picker.field;
            let choice = picker.options(&state.catalog).into_iter().nth(picker.selected);
            state.mode = Mode::Browse;
            if let Some(request) = choice.and_then(|c| state.controller.set_filter_field(field.change(c))) {
                state.reset_selection();
                worker.submit(request);
            }
        }
        KeyCode::Backspace => {
            picker.query.pop();
            picker.selected = 0;
        }
        KeyCode::Char(c) => {
            picker.query.push(c);
            picker.selected = 0;
        }
        _ => {}
    }
}

fn handle_dates_key(state: &mut AppState, worker: &FetchWorker, key: KeyEvent) {
    let Mode::Dates(form) = &mut state.mode else {
        return;
    };
    match key.code {
        KeyCode::Esc => state.mode = Mode::Browse,
        KeyCode::Tab | KeyCode::Up | KeyCode::Down => form.switch_focus(),
        KeyCode::Left | KeyCode::Right => form.recency = next_recency(form.recency),
        KeyCode::Backspace => {
            form.focused().pop();
        }
        KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => form.focused().push(c),
        KeyCode::Enter => match form.apply(state.controller.filter()) {
            Ok(edited) => {
                state.mode = Mode::Browse;
                if let Some(request) = state.controller.replace_filter(edited) {
                    state.reset_selection();
                    worker.submit(request);
                }
            }
            Err(message) => state.notices.clone().error(&message),
        },
        _ => {}
    }
}

/// Centered rectangle of at most `width` x `height` inside `area`.
fn popup_area(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

fn draw_picker(frame: &mut Frame, area: Rect, picker: &Picker, catalog: &Catalog) {
    let entries: Vec<ListItem> = picker
        .options(catalog)
        .into_iter()
        .map(|option| match option {
            PickOption::Any => ListItem::new(format!("Any {}", picker.field.label().to_lowercase()))
                .style(Style::default().fg(Color::DarkGray)),
            PickOption::Entry(_, name) => ListItem::new(name),
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(picker.selected));

    let area = popup_area(area, 40, 14);
    let list = List::new(entries)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(format!(" {}: {}_ ", picker.field.label(), picker.query)),
        )
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_widget(Clear, area);
    frame.render_stateful_widget(list, area, &mut list_state);
}

fn draw_dates(frame: &mut Frame, area: Rect, form: &DateForm) {
    let field_style = |field: DateField| {
        if form.focus == field {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        }
    };
    let cursor = |field: DateField| if form.focus == field { "_" } else { "" };
    let recency = form.recency.map(RecencyWindow::label).unwrap_or("any time");

    let lines = vec![
        Line::from(Span::styled(format!("From: {}{}", form.from, cursor(DateField::From)), field_style(DateField::From))),
        Line::from(Span::styled(format!("To:   {}{}", form.to, cursor(DateField::To)), field_style(DateField::To))),
        Line::from(format!("Last: < {} >", recency)),
        Line::from(""),
        Line::from(Span::styled(
            "Tab:field  ←/→:recency  Enter:apply  Esc:cancel",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let area = popup_area(area, 52, 7);
    let editor = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title(" Dates (YYYY-MM-DD) "));
    frame.render_widget(Clear, area);
    frame.render_widget(editor, area);
}

fn draw(frame: &mut Frame, state: &AppState, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame.area());

    let controller = &state.controller;

    // Tabs
    let selected_tab = ListingKind::ALL
        .iter()
        .position(|k| *k == controller.active_tab())
        .unwrap_or(0);
    let favorite = match (controller.is_favorited(), controller.favorite_filter_id()) {
        (true, Some(id)) => format!("★ #{}", id),
        (true, None) => "★".to_string(),
        (false, _) => "☆".to_string(),
    };
    let tabs = Tabs::new(ListingKind::ALL.iter().map(|k| k.label()).collect::<Vec<_>>())
        .select(selected_tab)
        .block(Block::default().borders(Borders::ALL).title(format!(" finder {} ", favorite)))
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, rows[0]);

    // Search line
    let (search_text, search_style) = match &state.mode {
        Mode::Search(buffer) => (format!("{}_", buffer), Style::default().fg(Color::Yellow)),
        _ if controller.filter().q.is_empty() => ("Search...".to_string(), Style::default().fg(Color::DarkGray)),
        _ => (controller.filter().q.clone(), Style::default()),
    };
    let search = Paragraph::new(search_text)
        .style(search_style)
        .block(Block::default().borders(Borders::ALL).title(" Search "));
    frame.render_widget(search, rows[1]);

    // Filter chips
    let chips = controller.filter().chips();
    let chips_line = if chips.is_empty() {
        Line::from(Span::styled(" no filters", Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(
            chips
                .into_iter()
                .flat_map(|chip| {
                    [
                        Span::raw(" "),
                        Span::styled(format!("[{}]", chip), Style::default().fg(Color::Cyan)),
                    ]
                })
                .collect::<Vec<_>>(),
        )
    };
    frame.render_widget(Paragraph::new(chips_line), rows[2]);

    // List + detail
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[3]);

    let items = controller.items();
    let more = if controller.has_more_pages() { "+" } else { "" };
    let list_title = format!(
        " {} ({}{}, p.{}) ",
        controller.active_tab().label(),
        items.len(),
        more,
        controller.current_page()
    );

    if controller.is_loading() && items.is_empty() {
        let loading = Paragraph::new("Loading...").block(Block::default().borders(Borders::ALL).title(list_title));
        frame.render_widget(loading, body[0]);
    } else {
        let entries: Vec<ListItem> = items
            .iter()
            .map(|item| {
                let reward = if item.for_remuneration { "$" } else { " " };
                let photo = if item.photos.is_empty() { " " } else { "▣" };
                let place = item.location.as_ref().map(|l| l.name.as_str()).unwrap_or("?");
                ListItem::new(format!("{}{} {} | {}", reward, photo, truncate(&item.name, 30), place))
            })
            .collect();
        let title = if controller.is_refreshing() || controller.is_loading() {
            format!("{}… ", list_title)
        } else {
            list_title
        };
        let list = List::new(entries)
            .block(Block::default().borders(Borders::ALL).title(title))
            .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
            .highlight_symbol("> ");
        frame.render_stateful_widget(list, body[0], list_state);
    }

    let detail = Paragraph::new(build_detail(state.current_item()))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false })
        .scroll((state.detail_scroll, 0));
    frame.render_widget(detail, body[1]);

    match &state.mode {
        Mode::Pick(picker) => draw_picker(frame, rows[3], picker, &state.catalog),
        Mode::Dates(form) => draw_dates(frame, rows[3], form),
        Mode::Browse | Mode::Search(_) => {}
    }

    // Footer: notice wins over help
    let footer = match state.notices.current() {
        Some(message) => Paragraph::new(format!(" {}", message)).style(Style::default().fg(Color::Red)),
        None => Paragraph::new(
            " Tab:kind  j/k:move  /:search  f:favorite  r:refresh  p:photo b:body w:recency  c:category l:location d:dates  q:quit",
        )
        .style(Style::default().fg(Color::DarkGray)),
    };
    frame.render_widget(footer, rows[4]);
}

fn build_detail(item: Option<&Item>) -> Text<'_> {
    let Some(item) = item else {
        return Text::raw("Nothing selected");
    };

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::from(Span::styled(
        &item.name,
        Style::default().add_modifier(Modifier::BOLD),
    )));

    let status_style = match item.kind {
        ListingKind::Seeking => Style::default().fg(Color::Red),
        ListingKind::Found => Style::default().fg(Color::Magenta),
    };
    lines.push(Line::from(Span::styled(item.kind.label(), status_style)));

    if let Some(category) = &item.category {
        lines.push(Line::from(format!("Category: {}", category.name)));
    }
    if let Some(location) = &item.location {
        lines.push(Line::from(format!("Location: {}", location.name)));
    }
    if let Some(date) = &item.action_at {
        lines.push(Line::from(format!("Date: {}", date)));
    }
    if let Some(phone) = &item.phone {
        lines.push(Line::from(format!("Phone: {}", phone)));
    }
    if item.for_remuneration {
        lines.push(Line::from(Span::styled("For a reward", Style::default().fg(Color::Green))));
    }
    for photo in &item.photos {
        lines.push(Line::from(Span::styled(
            format!("Photo: {}", photo.url),
            Style::default().fg(Color::Blue),
        )));
    }

    lines.push(Line::from(""));

    match item.description.as_deref().filter(|d| !d.trim().is_empty()) {
        Some(description) => {
            for line in textwrap::fill(description, 60).lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        None => lines.push(Line::from(Span::styled(
            "(No description)",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    Text::from(lines)
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("Ключі від авто", 8), "Ключі...");
        assert_eq!(truncate("Keys", 8), "Keys");
    }

    #[test]
    fn test_notice_board_expires() {
        let mut board = NoticeBoard::default();
        assert_eq!(board.current(), None);
        board.error("Server error");
        assert_eq!(board.current().as_deref(), Some("Server error"));

        board.0.borrow_mut().as_mut().unwrap().shown_at = Instant::now() - NOTICE_TTL;
        assert_eq!(board.current(), None);
    }

    fn catalog() -> Catalog {
        Catalog {
            categories: vec![
                Category {
                    id: 1,
                    name: "Keys".to_string(),
                },
                Category {
                    id: 2,
                    name: "Pets".to_string(),
                },
            ],
            locations: vec![Location {
                id: 9,
                name: "Lviv".to_string(),
            }],
        }
    }

    #[test]
    fn test_picker_offers_any_then_matches() {
        let mut picker = Picker::new(PickField::Category);
        assert_eq!(picker.options(&catalog()).len(), 3);

        picker.query = "pe".to_string();
        let options = picker.options(&catalog());
        assert_eq!(options, vec![PickOption::Any, PickOption::Entry(2, "Pets".to_string())]);
        assert_eq!(
            PickField::Category.change(options[1].clone()),
            FilterChange::Category(Some(Category {
                id: 2,
                name: "Pets".to_string(),
            }))
        );
        assert_eq!(PickField::Location.change(PickOption::Any), FilterChange::Location(None));
    }

    #[test]
    fn test_date_form_builds_edited_filter() {
        let base = ListingFilter {
            q: "bag".to_string(),
            ..ListingFilter::default()
        };
        let mut form = DateForm::from_filter(&base);
        form.focused().push_str("2024-05-01");
        form.switch_focus();
        form.focused().push_str("2024-05-31");
        form.recency = next_recency(form.recency);

        let edited = form.apply(&base).unwrap();
        assert_eq!(edited.date_from, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(edited.date_to, NaiveDate::from_ymd_opt(2024, 5, 31));
        assert_eq!(edited.recency, Some(RecencyWindow::Week));
        assert_eq!(edited.q, "bag");
        assert_eq!(DateForm::from_filter(&edited).from, "2024-05-01");
    }

    #[test]
    fn test_date_form_rejects_bad_input() {
        let base = ListingFilter::default();
        let mut form = DateForm::from_filter(&base);
        form.from = "2024-13-01".to_string();
        assert!(form.apply(&base).unwrap_err().contains("not a date"));

        form.from = "2024-06-02".to_string();
        form.to = "2024-06-01".to_string();
        assert!(form.apply(&base).unwrap_err().contains("after end date"));
    }

    #[test]
    fn test_date_form_edit_reaches_controller_as_one_fetch() {
        let mut controller = ListingSearchController::new(&NavParams::default(), Box::new(NoticeBoard::default()));
        let mut form = DateForm::from_filter(controller.filter());
        form.from = "2024-01-10".to_string();

        let request = controller.replace_filter(form.apply(controller.filter()).unwrap()).unwrap();
        assert_eq!(request.params.action_at_from, NaiveDate::from_ymd_opt(2024, 1, 10));
        assert_eq!(controller.filter().date_from, NaiveDate::from_ymd_opt(2024, 1, 10));
    }

    #[test]
    fn test_popup_area_fits_inside() {
        let area = Rect::new(0, 0, 30, 10);
        assert_eq!(popup_area(area, 40, 6), Rect::new(0, 2, 30, 6));
    }

    #[test]
    fn test_row_offsets_feed_scroll_threshold() {
        let notices = NoticeBoard::default();
        let state = AppState {
            controller: ListingSearchController::new(&NavParams::default(), Box::new(notices.clone())),
            catalog: Catalog::default(),
            notices,
            selected: 5,
            detail_scroll: 0,
            mode: Mode::Browse,
        };
        assert_eq!(state.scroll_offset(), 500.0);
    }
}
