// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use pointsgo_app::{
    AppCommand, AppMode, AppState, AvailabilityChange, AvailabilityMark, CabinClass, ColumnId,
    DEFAULT_PAGE_SIZE, DEFAULT_PROGRAMS, DateRange, FieldError, FilterTarget, Flight,
    FlightField, FlightFormInput, FlightId, FlightTableState, GridState, NewFlight, SeatStatus,
    SortDirection, day_label, iso_day, long_day_label, program_label,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use std::collections::BTreeMap;
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use time::{Date, Month, OffsetDateTime};

const COLUMN_WIDTHS: [usize; 6] = [8, 13, 9, 14, 18, 5];
const GRID_LABEL_WIDTH: usize = 10;
const GRID_CELL_WIDTH: usize = 8;
const EXPANDED_MARK: &str = "▲";
const COLLAPSED_MARK: &str = "▼";
const FILTER_MARK: &str = "*";

/// Backend operations the console needs. Mutations invalidate the flight
/// query on success so the next `load_flights` refetches.
pub trait AppRuntime {
    fn load_flights(&mut self) -> Result<Vec<Flight>>;
    fn invalidate_flights(&mut self);
    fn create_flight(&mut self, flight: &NewFlight) -> Result<()>;
    fn delete_flight(&mut self, id: &FlightId) -> Result<()>;
    fn update_program(&mut self, id: &FlightId, program: &str) -> Result<()>;
    fn update_availability(&mut self, id: &FlightId, change: &AvailabilityChange) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiOptions {
    pub page_size: usize,
    pub programs: Vec<String>,
}

impl Default for UiOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            programs: DEFAULT_PROGRAMS.iter().map(|tag| (*tag).to_owned()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TableStatus {
    SortAsc(&'static str),
    SortDesc(&'static str),
    SortCleared,
    SortUnavailable(&'static str),
    FilterUnavailable(&'static str),
    FiltersCleared,
    Expanded,
    Collapsed,
    NoRows,
    FirstPage,
    LastPage,
    PageSize(usize),
    Page(usize, usize),
    Refreshed(usize),
}

impl TableStatus {
    fn message(self) -> String {
        match self {
            Self::SortAsc(column) => format!("sort {column} asc"),
            Self::SortDesc(column) => format!("sort {column} desc"),
            Self::SortCleared => "sort cleared".to_owned(),
            Self::SortUnavailable(column) => format!("sort unavailable: {column}"),
            Self::FilterUnavailable(column) => format!("filter unavailable: {column}"),
            Self::FiltersCleared => "filters cleared".to_owned(),
            Self::Expanded => "row expanded".to_owned(),
            Self::Collapsed => "row collapsed".to_owned(),
            Self::NoRows => "no rows".to_owned(),
            Self::FirstPage => "already on first page".to_owned(),
            Self::LastPage => "already on last page".to_owned(),
            Self::PageSize(size) => format!("page size {size}"),
            Self::Page(page, count) => format!("page {page} of {count}"),
            Self::Refreshed(1) => "1 flight loaded".to_owned(),
            Self::Refreshed(count) => format!("{count} flights loaded"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct FormUiState {
    input: FlightFormInput,
    field: FlightField,
    show_errors: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct InputUiState {
    buffer: String,
    original: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DatePickerUiState {
    cursor: Date,
    start: Option<Date>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ProgramPickerUiState {
    cursor: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone)]
struct ViewData {
    flights: Vec<Flight>,
    table: FlightTableState,
    selected_row: usize,
    selected_col: usize,
    grids: BTreeMap<FlightId, GridState>,
    focus: Option<FlightId>,
    form: FormUiState,
    input: InputUiState,
    date_picker: Option<DatePickerUiState>,
    program_picker: Option<ProgramPickerUiState>,
    programs: Vec<String>,
    today: Date,
    help_visible: bool,
    status_token: u64,
}

impl ViewData {
    fn new(options: &UiOptions, today: Date) -> Result<Self> {
        Ok(Self {
            flights: Vec::new(),
            table: FlightTableState::with_page_size(options.page_size)?,
            selected_row: 0,
            selected_col: 0,
            grids: BTreeMap::new(),
            focus: None,
            form: FormUiState::default(),
            input: InputUiState::default(),
            date_picker: None,
            program_picker: None,
            programs: options.programs.clone(),
            today,
            help_visible: false,
            status_token: 0,
        })
    }

    fn page_rows(&self) -> Vec<&Flight> {
        self.table.page(&self.flights).rows
    }

    fn row_count(&self) -> usize {
        self.table.rows(&self.flights).len()
    }

    fn selected_flight(&self) -> Option<&Flight> {
        self.page_rows().get(self.selected_row).copied()
    }

    fn focused_flight(&self) -> Option<&Flight> {
        let id = self.focus.as_ref()?;
        self.flights.iter().find(|flight| &flight.id == id)
    }

    fn selected_column(&self) -> ColumnId {
        ColumnId::ALL[self.selected_col.min(ColumnId::ALL.len() - 1)]
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    options: &UiOptions,
) -> Result<()> {
    let today = OffsetDateTime::now_utc().date();
    let mut view_data = ViewData::new(options, today)?;

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let (internal_tx, internal_rx) = mpsc::channel();

    if let Err(error) = refresh_view_data(runtime, &mut view_data) {
        tracing::warn!(error = %error, "initial load failed");
        emit_status(
            state,
            &mut view_data,
            &internal_tx,
            format!("load failed: {error}"),
        );
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        match event::poll(Duration::from_millis(120)) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(error) => {
                result = Err(error).context("poll event");
                break;
            }
        }
        match event::read() {
            Ok(Event::Key(key)) => {
                if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                    break;
                }
            }
            Ok(_) => {}
            Err(error) => {
                result = Err(error).context("read event");
                break;
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn refresh_view_data<R: AppRuntime>(runtime: &mut R, view_data: &mut ViewData) -> Result<()> {
    view_data.flights = runtime.load_flights()?;
    for id in view_data.table.prune_expanded(&view_data.flights) {
        view_data.grids.remove(&id);
    }
    if view_data.focused_flight().is_none() {
        view_data.focus = None;
    }
    let row_count = view_data.row_count();
    view_data.table.clamp_page(row_count);
    clamp_selection(view_data);
    Ok(())
}

/// Reports a mutation outcome. Success refetches; failure keeps the
/// displayed rows and logs.
fn finish_mutation<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    action: &'static str,
    result: Result<()>,
    success: String,
) {
    if let Err(error) = result {
        tracing::warn!(action, error = %error, "mutation failed");
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("{action} failed: {error}"),
        );
        return;
    }
    tracing::info!(action, "mutation succeeded");
    if let Err(error) = refresh_view_data(runtime, view_data) {
        tracing::warn!(error = %error, "refetch failed");
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("{success}; load failed: {error}"),
        );
        return;
    }
    emit_status(state, view_data, internal_tx, success);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if state.delete_dialog_open() {
        handle_delete_dialog_key(state, runtime, view_data, internal_tx, key);
        return false;
    }

    if view_data.help_visible {
        if key.code == KeyCode::Esc || key.code == KeyCode::Char('?') {
            view_data.help_visible = false;
            emit_status(state, view_data, internal_tx, "help hidden");
        }
        return false;
    }

    let mode = state.mode;
    match mode {
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
        AppMode::Grid => handle_grid_key(state, runtime, view_data, internal_tx, key),
        AppMode::Form => handle_form_key(state, runtime, view_data, internal_tx, key),
        AppMode::FilterInput(target) => {
            handle_filter_input_key(state, view_data, internal_tx, target, key);
        }
        AppMode::PageInput => handle_page_input_key(state, view_data, internal_tx, key),
        AppMode::DatePicker => handle_date_picker_key(state, view_data, internal_tx, key),
        AppMode::ProgramPicker => {
            handle_program_picker_key(state, runtime, view_data, internal_tx, key);
        }
    }
    false
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let status = match key.code {
        KeyCode::Char('j') | KeyCode::Down => {
            move_row(view_data, 1);
            None
        }
        KeyCode::Char('k') | KeyCode::Up => {
            move_row(view_data, -1);
            None
        }
        KeyCode::Char('h') | KeyCode::Left => {
            move_col(view_data, -1);
            None
        }
        KeyCode::Char('l') | KeyCode::Right => {
            move_col(view_data, 1);
            None
        }
        KeyCode::Char('s') => Some(cycle_sort(view_data)),
        KeyCode::Char('S') => {
            view_data.table.clear_sort();
            view_data.selected_row = 0;
            Some(TableStatus::SortCleared)
        }
        KeyCode::Char('f') => {
            let column = view_data.selected_column();
            if !column.can_filter() {
                Some(TableStatus::FilterUnavailable(column.label()))
            } else {
                open_filter_input(state, view_data, FilterTarget::Column(column));
                None
            }
        }
        KeyCode::Char('/') => {
            open_filter_input(state, view_data, FilterTarget::Global);
            None
        }
        KeyCode::Char('c') => {
            for column in ColumnId::ALL.into_iter().filter(|column| column.can_filter()) {
                let _ = view_data.table.set_column_filter(column, "");
            }
            view_data.table.set_global_filter("");
            view_data.selected_row = 0;
            Some(TableStatus::FiltersCleared)
        }
        KeyCode::Enter | KeyCode::Char(' ') => toggle_expansion(view_data),
        KeyCode::Tab => {
            focus_grid(state, view_data, internal_tx);
            None
        }
        KeyCode::Char('a') => {
            view_data.form = FormUiState::default();
            state.dispatch(AppCommand::OpenForm);
            None
        }
        KeyCode::Char('d') => {
            match view_data.selected_flight().map(|flight| flight.id.clone()) {
                Some(id) => {
                    state.dispatch(AppCommand::OpenDeleteDialog(id));
                    None
                }
                None => Some(TableStatus::NoRows),
            }
        }
        KeyCode::Char(']') => {
            let rows = view_data.row_count();
            let moved = view_data.table.next_page(rows);
            view_data.selected_row = 0;
            (!moved).then_some(TableStatus::LastPage)
        }
        KeyCode::Char('[') => {
            let moved = view_data.table.previous_page();
            view_data.selected_row = 0;
            (!moved).then_some(TableStatus::FirstPage)
        }
        KeyCode::Char('}') => {
            let rows = view_data.row_count();
            view_data.table.last_page(rows);
            view_data.selected_row = 0;
            Some(page_status(view_data))
        }
        KeyCode::Char('{') => {
            view_data.table.first_page();
            view_data.selected_row = 0;
            Some(page_status(view_data))
        }
        KeyCode::Char('+') | KeyCode::Char('=') => {
            view_data.selected_row = 0;
            Some(TableStatus::PageSize(view_data.table.cycle_page_size(1)))
        }
        KeyCode::Char('-') => {
            view_data.selected_row = 0;
            Some(TableStatus::PageSize(view_data.table.cycle_page_size(-1)))
        }
        KeyCode::Char('#') => {
            view_data.input = InputUiState::default();
            state.dispatch(AppCommand::OpenPageInput);
            None
        }
        KeyCode::Char('r') => {
            runtime.invalidate_flights();
            match refresh_view_data(runtime, view_data) {
                Ok(()) => Some(TableStatus::Refreshed(view_data.flights.len())),
                Err(error) => {
                    tracing::warn!(error = %error, "refresh failed");
                    emit_status(state, view_data, internal_tx, format!("load failed: {error}"));
                    None
                }
            }
        }
        KeyCode::Char('?') => {
            view_data.help_visible = true;
            None
        }
        _ => None,
    };

    if let Some(status) = status {
        emit_status(state, view_data, internal_tx, status.message());
    }
}

fn move_row(view_data: &mut ViewData, delta: isize) {
    let rows = view_data.page_rows().len();
    if rows == 0 {
        view_data.selected_row = 0;
        return;
    }
    let next = view_data.selected_row as isize + delta;
    view_data.selected_row = next.clamp(0, rows as isize - 1) as usize;
}

fn move_col(view_data: &mut ViewData, delta: isize) {
    let last = ColumnId::ALL.len() as isize - 1;
    let next = view_data.selected_col as isize + delta;
    view_data.selected_col = next.clamp(0, last) as usize;
}

fn clamp_selection(view_data: &mut ViewData) {
    let rows = view_data.page_rows().len();
    view_data.selected_row = view_data.selected_row.min(rows.saturating_sub(1));
}

fn cycle_sort(view_data: &mut ViewData) -> TableStatus {
    let column = view_data.selected_column();
    view_data.selected_row = 0;
    match view_data.table.toggle_sort(column) {
        Ok(Some(SortDirection::Asc)) => TableStatus::SortAsc(column.label()),
        Ok(Some(SortDirection::Desc)) => TableStatus::SortDesc(column.label()),
        Ok(None) => TableStatus::SortCleared,
        Err(_) => TableStatus::SortUnavailable(column.label()),
    }
}

fn page_status(view_data: &ViewData) -> TableStatus {
    let count = view_data.table.page_count(view_data.row_count());
    TableStatus::Page(view_data.table.page_index() + 1, count)
}

fn toggle_expansion(view_data: &mut ViewData) -> Option<TableStatus> {
    let Some(id) = view_data.selected_flight().map(|flight| flight.id.clone()) else {
        return Some(TableStatus::NoRows);
    };
    if view_data.table.toggle_expanded(&id) {
        view_data.grids.entry(id).or_default();
        return Some(TableStatus::Expanded);
    }
    view_data.grids.remove(&id);
    if view_data.focus.as_ref() == Some(&id) {
        view_data.focus = None;
    }
    Some(TableStatus::Collapsed)
}

fn focus_grid(state: &mut AppState, view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    let Some(id) = view_data.selected_flight().map(|flight| flight.id.clone()) else {
        emit_status(state, view_data, internal_tx, TableStatus::NoRows.message());
        return;
    };
    if !view_data.table.is_expanded(&id) {
        view_data.table.toggle_expanded(&id);
    }
    view_data.grids.entry(id.clone()).or_default();
    view_data.focus = Some(id);
    state.dispatch(AppCommand::EnterGrid);
    emit_status(
        state,
        view_data,
        internal_tx,
        "grid: D dates | y/n mark | h/l day | j/k class | H/L week | p program | esc back",
    );
}

fn open_filter_input(state: &mut AppState, view_data: &mut ViewData, target: FilterTarget) {
    let current = match target {
        FilterTarget::Global => view_data.table.global_filter().to_owned(),
        FilterTarget::Column(column) => view_data
            .table
            .column_filter(column)
            .unwrap_or_default()
            .to_owned(),
    };
    view_data.input = InputUiState {
        buffer: current.clone(),
        original: current,
    };
    state.dispatch(AppCommand::OpenFilterInput(target));
}

fn apply_filter(view_data: &mut ViewData, target: FilterTarget, value: &str) -> Result<()> {
    match target {
        FilterTarget::Global => view_data.table.set_global_filter(value),
        FilterTarget::Column(column) => view_data.table.set_column_filter(column, value)?,
    }
    view_data.selected_row = 0;
    Ok(())
}

fn handle_filter_input_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    target: FilterTarget,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            let original = view_data.input.original.clone();
            let _ = apply_filter(view_data, target, &original);
            view_data.input = InputUiState::default();
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "filter edit canceled");
            return;
        }
        KeyCode::Enter => {
            let value = std::mem::take(&mut view_data.input).buffer;
            state.dispatch(AppCommand::ExitToNav);
            let message = if value.is_empty() {
                format!("{} filter cleared", target.label())
            } else {
                format!("{} filter: {value}", target.label())
            };
            emit_status(state, view_data, internal_tx, message);
            return;
        }
        KeyCode::Backspace => {
            view_data.input.buffer.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.input.buffer.push(ch);
        }
        _ => return,
    }

    let value = view_data.input.buffer.clone();
    if let Err(error) = apply_filter(view_data, target, &value) {
        emit_status(state, view_data, internal_tx, error.to_string());
    }
}

fn handle_page_input_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Esc => {
            view_data.input = InputUiState::default();
            state.dispatch(AppCommand::ExitToNav);
        }
        KeyCode::Enter => {
            let raw = std::mem::take(&mut view_data.input).buffer;
            state.dispatch(AppCommand::ExitToNav);
            let page = if raw.is_empty() {
                Ok(1)
            } else {
                raw.parse::<usize>()
            };
            let Ok(page) = page else {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("page {raw:?} is not a number"),
                );
                return;
            };
            let rows = view_data.row_count();
            view_data.table.go_to_page(page, rows);
            view_data.selected_row = 0;
            let status = page_status(view_data);
            emit_status(state, view_data, internal_tx, status.message());
        }
        KeyCode::Backspace => {
            view_data.input.buffer.pop();
        }
        KeyCode::Char(ch) if ch.is_ascii_digit() => {
            view_data.input.buffer.push(ch);
        }
        _ => {}
    }
}

fn handle_delete_dialog_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            let Some(id) = state.delete_target.clone() else {
                return;
            };
            let result = runtime.delete_flight(&id);
            state.dispatch(AppCommand::CloseDeleteDialog);
            finish_mutation(
                state,
                runtime,
                view_data,
                internal_tx,
                "delete",
                result,
                format!("flight {id} deleted"),
            );
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            state.dispatch(AppCommand::CloseDeleteDialog);
            emit_status(state, view_data, internal_tx, "delete canceled");
        }
        _ => {}
    }
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let field = view_data.form.field;
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            view_data.form = FormUiState::default();
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "form canceled");
        }
        (KeyCode::Tab, _) | (KeyCode::Down, _) => view_data.form.field = field.next(),
        (KeyCode::BackTab, _) | (KeyCode::Up, _) => view_data.form.field = field.previous(),
        (KeyCode::Enter, _) => submit_form(state, runtime, view_data, internal_tx),
        (KeyCode::Char('s'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
            submit_form(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Backspace, _) => {
            view_data.form.input.field_mut(field).pop();
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.form.input.field_mut(field).push(ch);
        }
        _ => {}
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let flight = match view_data.form.input.validate() {
        Ok(flight) => flight,
        Err(error) => {
            view_data.form.show_errors = true;
            emit_status(state, view_data, internal_tx, error.to_string());
            return;
        }
    };

    let result = runtime.create_flight(&flight);
    view_data.form = FormUiState::default();
    state.dispatch(AppCommand::ExitToNav);
    finish_mutation(
        state,
        runtime,
        view_data,
        internal_tx,
        "create",
        result,
        format!(
            "flight {} {}-{} created",
            flight.airline, flight.origin, flight.destination
        ),
    );
}

fn leave_grid(state: &mut AppState, view_data: &mut ViewData) {
    view_data.focus = None;
    view_data.date_picker = None;
    view_data.program_picker = None;
    state.dispatch(AppCommand::ExitToNav);
}

fn handle_grid_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(flight) = view_data.focused_flight().cloned() else {
        leave_grid(state, view_data);
        emit_status(state, view_data, internal_tx, "flight no longer listed");
        return;
    };
    let id = flight.id.clone();

    let message = {
        let grid = view_data.grids.entry(id.clone()).or_default();
        match key.code {
            KeyCode::Esc | KeyCode::Tab => None,
            KeyCode::Char('h') | KeyCode::Left => {
                grid.move_day(-1);
                Some(None)
            }
            KeyCode::Char('l') | KeyCode::Right => {
                grid.move_day(1);
                Some(None)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                grid.set_class(CabinClass::Economy);
                Some(None)
            }
            KeyCode::Char('j') | KeyCode::Down => {
                grid.set_class(CabinClass::Business);
                Some(None)
            }
            KeyCode::Char('H') | KeyCode::Char('[') => {
                Some((!grid.previous_window()).then_some("no earlier days"))
            }
            KeyCode::Char('L') | KeyCode::Char(']') => {
                Some((!grid.next_window()).then_some("no later days"))
            }
            KeyCode::Char('x') => {
                grid.clear_range();
                Some(Some("dates cleared"))
            }
            _ => Some(None),
        }
    };

    match key.code {
        KeyCode::Esc | KeyCode::Tab => {
            leave_grid(state, view_data);
            return;
        }
        KeyCode::Char('y') => {
            mark_cell(state, runtime, view_data, internal_tx, &flight, AvailabilityMark::Available);
            return;
        }
        KeyCode::Char('n') => {
            mark_cell(state, runtime, view_data, internal_tx, &flight, AvailabilityMark::Unavailable);
            return;
        }
        KeyCode::Char('D') => {
            open_date_picker(state, view_data, &id);
            return;
        }
        KeyCode::Char('p') => {
            open_program_picker(state, view_data, internal_tx, &flight);
            return;
        }
        _ => {}
    }

    if let Some(Some(message)) = message {
        emit_status(state, view_data, internal_tx, message);
    }
}

fn mark_cell<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    flight: &Flight,
    mark: AvailabilityMark,
) {
    let change = view_data
        .grids
        .get(&flight.id)
        .and_then(|grid| grid.change_at_cursor(flight, mark));
    let Some(change) = change else {
        emit_status(
            state,
            view_data,
            internal_tx,
            "pick a date range first (D)",
        );
        return;
    };

    let result = runtime.update_availability(&flight.id, &change);
    let outcome = match change.value {
        Some(true) => "available",
        Some(false) => "unavailable",
        None => "cleared",
    };
    finish_mutation(
        state,
        runtime,
        view_data,
        internal_tx,
        "availability update",
        result,
        format!(
            "{} {} {outcome}",
            day_label(change.date),
            change.class.label().to_lowercase()
        ),
    );
}

fn open_date_picker(state: &mut AppState, view_data: &mut ViewData, id: &FlightId) {
    let start = view_data
        .grids
        .get(id)
        .and_then(GridState::range)
        .map(|range| range.start);
    let cursor = start
        .filter(|date| *date >= view_data.today)
        .unwrap_or(view_data.today);
    view_data.date_picker = Some(DatePickerUiState {
        cursor,
        start: None,
    });
    state.dispatch(AppCommand::OpenDatePicker);
}

fn handle_date_picker_key(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(picker) = view_data.date_picker else {
        state.dispatch(AppCommand::EnterGrid);
        return;
    };
    let current = picker.cursor;

    let next = match key.code {
        KeyCode::Esc => {
            view_data.date_picker = None;
            state.dispatch(AppCommand::EnterGrid);
            emit_status(state, view_data, internal_tx, "date pick canceled");
            return;
        }
        KeyCode::Enter | KeyCode::Char(' ') => {
            pick_date(state, view_data, internal_tx, picker);
            return;
        }
        KeyCode::Char('x') => {
            if let Some(id) = view_data.focus.clone() {
                view_data.grids.entry(id).or_default().clear_range();
            }
            view_data.date_picker = None;
            state.dispatch(AppCommand::EnterGrid);
            emit_status(state, view_data, internal_tx, "dates cleared");
            return;
        }
        KeyCode::Char('h') | KeyCode::Left => shift_date_by_days(current, -1),
        KeyCode::Char('l') | KeyCode::Right => shift_date_by_days(current, 1),
        KeyCode::Char('j') | KeyCode::Down => shift_date_by_days(current, 7),
        KeyCode::Char('k') | KeyCode::Up => shift_date_by_days(current, -7),
        KeyCode::Char('H') => shift_date_by_months(current, -1),
        KeyCode::Char('L') => shift_date_by_months(current, 1),
        _ => None,
    };

    let Some(date) = next else {
        return;
    };
    let today = view_data.today;
    if date < today {
        view_data.date_picker = Some(DatePickerUiState {
            cursor: today,
            ..picker
        });
        emit_status(
            state,
            view_data,
            internal_tx,
            format!("dates before {} are disabled", long_day_label(today)),
        );
        return;
    }
    view_data.date_picker = Some(DatePickerUiState {
        cursor: date,
        ..picker
    });
}

fn pick_date(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    picker: DatePickerUiState,
) {
    let cursor = picker.cursor;
    let start = match picker.start {
        Some(start) if cursor >= start => start,
        _ => {
            view_data.date_picker = Some(DatePickerUiState {
                start: Some(cursor),
                ..picker
            });
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("start {} -- pick an end date", long_day_label(cursor)),
            );
            return;
        }
    };

    let selection = [start, cursor];
    let Some(range) = DateRange::from_selection(&selection) else {
        return;
    };
    let range = match range.not_before(view_data.today) {
        Ok(range) => range,
        Err(error) => {
            emit_status(state, view_data, internal_tx, error.to_string());
            return;
        }
    };
    let Some(id) = view_data.focus.clone() else {
        view_data.date_picker = None;
        state.dispatch(AppCommand::ExitToNav);
        return;
    };
    view_data.grids.entry(id).or_default().set_selection(&selection);
    view_data.date_picker = None;
    state.dispatch(AppCommand::EnterGrid);
    emit_status(
        state,
        view_data,
        internal_tx,
        format!(
            "{} days from {} to {}",
            range.day_count(),
            long_day_label(range.start),
            long_day_label(range.end)
        ),
    );
}

fn shift_date_by_days(date: Date, days: i64) -> Option<Date> {
    date.checked_add(time::Duration::days(days))
}

fn shift_date_by_months(date: Date, months: i32) -> Option<Date> {
    let base_month = i32::from(date.month() as u8);
    let total_month = base_month - 1 + months;
    let year = date.year() + total_month.div_euclid(12);
    let month = Month::try_from((total_month.rem_euclid(12) + 1) as u8).ok()?;
    let day = date.day().min(last_day_of_month(year, month)?);
    Date::from_calendar_date(year, month, day).ok()
}

fn last_day_of_month(year: i32, month: Month) -> Option<u8> {
    let (next_year, next_month) = match month {
        Month::December => (year + 1, Month::January),
        _ => (year, month.next()),
    };
    let first_next_month = Date::from_calendar_date(next_year, next_month, 1).ok()?;
    first_next_month.previous_day().map(|last| last.day())
}

fn open_program_picker(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    flight: &Flight,
) {
    if view_data.programs.is_empty() {
        emit_status(state, view_data, internal_tx, "no programs configured");
        return;
    }
    let cursor = flight
        .program
        .as_deref()
        .and_then(|current| view_data.programs.iter().position(|tag| tag == current))
        .unwrap_or(0);
    view_data.program_picker = Some(ProgramPickerUiState { cursor });
    state.dispatch(AppCommand::OpenProgramPicker);
}

fn handle_program_picker_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(picker) = view_data.program_picker else {
        state.dispatch(AppCommand::EnterGrid);
        return;
    };
    let last = view_data.programs.len().saturating_sub(1);

    match key.code {
        KeyCode::Esc => {
            view_data.program_picker = None;
            state.dispatch(AppCommand::EnterGrid);
        }
        KeyCode::Char('j') | KeyCode::Down => {
            view_data.program_picker = Some(ProgramPickerUiState {
                cursor: (picker.cursor + 1).min(last),
            });
        }
        KeyCode::Char('k') | KeyCode::Up => {
            view_data.program_picker = Some(ProgramPickerUiState {
                cursor: picker.cursor.saturating_sub(1),
            });
        }
        KeyCode::Enter => {
            let Some(program) = view_data.programs.get(picker.cursor).cloned() else {
                return;
            };
            let Some(id) = view_data.focus.clone() else {
                return;
            };
            view_data.program_picker = None;
            state.dispatch(AppCommand::EnterGrid);
            let result = runtime.update_program(&id, &program);
            finish_mutation(
                state,
                runtime,
                view_data,
                internal_tx,
                "program update",
                result,
                format!("program set to {}", program_label(Some(&program))),
            );
        }
        _ => {}
    }
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(frame.area());

    let table = Paragraph::new(table_lines(state, view_data)).block(
        Block::default()
            .title(table_title(view_data))
            .borders(Borders::ALL),
    );
    frame.render_widget(table, layout[0]);

    let status = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status, layout[1]);

    if state.mode == AppMode::Form {
        let area = centered_rect(50, 40, frame.area());
        frame.render_widget(Clear, area);
        let form = Paragraph::new(render_form_overlay_text(&view_data.form))
            .block(Block::default().title("new flight").borders(Borders::ALL));
        frame.render_widget(form, area);
    }

    if let Some(picker) = view_data.date_picker {
        let area = centered_rect(40, 50, frame.area());
        frame.render_widget(Clear, area);
        let calendar = Paragraph::new(render_date_picker_overlay_text(picker, view_data.today))
            .block(Block::default().title("dates").borders(Borders::ALL));
        frame.render_widget(calendar, area);
    }

    if let Some(picker) = view_data.program_picker {
        let current = view_data
            .focused_flight()
            .and_then(|flight| flight.program.as_deref());
        let area = centered_rect(40, 40, frame.area());
        frame.render_widget(Clear, area);
        let programs = Paragraph::new(render_program_picker_text(
            &view_data.programs,
            picker,
            current,
        ))
        .block(Block::default().title("program").borders(Borders::ALL));
        frame.render_widget(programs, area);
    }

    if let Some(id) = &state.delete_target {
        let area = centered_rect(44, 24, frame.area());
        frame.render_widget(Clear, area);
        let flight = view_data.flights.iter().find(|flight| &flight.id == id);
        let dialog = Paragraph::new(render_delete_dialog_text(id, flight)).block(
            Block::default()
                .title("confirm deletion")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Red)),
        );
        frame.render_widget(dialog, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 60, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn table_title(view_data: &ViewData) -> String {
    let page = view_data.table.page(&view_data.flights);
    let mut title = format!(
        "pointsgo | {}/{} flights | page {}/{} | {} per page",
        page.total_rows,
        view_data.flights.len(),
        page.page_index + 1,
        page.page_count,
        view_data.table.page_size()
    );
    if !view_data.table.global_filter().is_empty() {
        title.push_str(&format!(" | search {:?}", view_data.table.global_filter()));
    }
    title
}

fn pad(value: &str, width: usize) -> String {
    let mut out: String = value.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat_n(' ', width.saturating_sub(len) + 1));
    out
}

fn header_label(view_data: &ViewData, column: ColumnId) -> String {
    let mut label = column.label().to_owned();
    if let Some(sort) = view_data.table.sort()
        && sort.column == column
    {
        label.push_str(match sort.direction {
            SortDirection::Asc => " ↑",
            SortDirection::Desc => " ↓",
        });
    }
    if view_data.table.column_filter(column).is_some() {
        label.push_str(FILTER_MARK);
    }
    label
}

fn row_cells(flight: &Flight, expanded: bool) -> [String; 6] {
    let marker = if expanded {
        EXPANDED_MARK
    } else {
        COLLAPSED_MARK
    };
    [
        flight.origin.clone(),
        flight.destination.clone(),
        flight.airline.clone(),
        flight
            .last_updated
            .map(|at| long_day_label(at.date()))
            .unwrap_or_default(),
        format!("{} {marker}", flight.program_label()),
        "del".to_owned(),
    ]
}

fn table_lines(state: &AppState, view_data: &ViewData) -> Vec<Line<'static>> {
    let nav = state.mode == AppMode::Nav;
    let header = ColumnId::ALL
        .iter()
        .zip(COLUMN_WIDTHS)
        .enumerate()
        .map(|(index, (column, width))| {
            let mut style = Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD);
            if nav && index == view_data.selected_col {
                style = style.fg(Color::Cyan).add_modifier(Modifier::UNDERLINED);
            }
            Span::styled(pad(&header_label(view_data, *column), width), style)
        })
        .collect::<Vec<_>>();

    let mut lines = vec![Line::from(header)];
    let rows = view_data.page_rows();
    if rows.is_empty() {
        let message = if view_data.flights.is_empty() {
            "no flights -- press a to add one"
        } else {
            "no flights match the filters -- press c to clear"
        };
        lines.push(Line::from(Span::styled(
            message,
            Style::default().fg(Color::DarkGray),
        )));
        return lines;
    }

    for (index, flight) in rows.into_iter().enumerate() {
        let expanded = view_data.table.is_expanded(&flight.id);
        let text = row_cells(flight, expanded)
            .iter()
            .zip(COLUMN_WIDTHS)
            .map(|(cell, width)| pad(cell, width))
            .collect::<String>();
        let style = if index == view_data.selected_row && matches!(state.mode, AppMode::Nav) {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(text, style)));

        if expanded {
            let focused = state.mode == AppMode::Grid && view_data.focus.as_ref() == Some(&flight.id);
            lines.extend(grid_lines(flight, view_data.grids.get(&flight.id), focused));
        }
    }
    lines
}

fn seat_cell(status: SeatStatus) -> (&'static str, Style) {
    match status {
        SeatStatus::Available => ("yes", Style::default().fg(Color::Green)),
        SeatStatus::Unavailable => ("no", Style::default().fg(Color::Red)),
        SeatStatus::Unknown => ("-", Style::default().fg(Color::DarkGray)),
    }
}

fn grid_lines(flight: &Flight, grid: Option<&GridState>, focused: bool) -> Vec<Line<'static>> {
    let indent = "    ";
    let range = grid
        .and_then(GridState::range)
        .map(|range| {
            format!(
                "{} - {} ({} days)",
                long_day_label(range.start),
                long_day_label(range.end),
                range.day_count()
            )
        })
        .unwrap_or_else(|| "none".to_owned());
    let mut lines = vec![Line::from(Span::styled(
        format!(
            "{indent}program: {} | dates: {range}",
            flight.program_label()
        ),
        Style::default().fg(Color::Gray),
    ))];

    let Some(grid) = grid.filter(|grid| !grid.days().is_empty()) else {
        lines.push(Line::from(Span::styled(
            format!("{indent}no dates picked -- tab to focus, then D"),
            Style::default().fg(Color::DarkGray),
        )));
        return lines;
    };

    let previous = if grid.can_previous_window() { "◀" } else { " " };
    let next = if grid.can_next_window() { "▶" } else { " " };
    let visible = grid.visible_days();
    let mut header = format!("{indent}{previous} {}", pad("", GRID_LABEL_WIDTH - 1));
    for day in visible {
        header.push_str(&pad(&day_label(*day), GRID_CELL_WIDTH - 1));
    }
    header.push_str(next);
    lines.push(Line::from(Span::styled(
        header,
        Style::default().add_modifier(Modifier::BOLD),
    )));

    let (cursor_day, cursor_class) = grid.cursor();
    for class in CabinClass::ALL {
        let mut spans = vec![Span::raw(format!(
            "{indent}  {}",
            pad(class.label(), GRID_LABEL_WIDTH - 1)
        ))];
        for (index, day) in visible.iter().enumerate() {
            let (text, mut style) = seat_cell(flight.seat_status(&iso_day(*day), class));
            if focused && index == cursor_day && class == cursor_class {
                style = style.add_modifier(Modifier::REVERSED | Modifier::BOLD);
            }
            spans.push(Span::styled(pad(text, GRID_CELL_WIDTH - 1), style));
        }
        lines.push(Line::from(spans));
    }
    lines
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if view_data.help_visible {
        return String::new();
    }
    let hints = match state.mode {
        AppMode::FilterInput(target) => {
            format!("{}: {}_ | enter keep | esc cancel", target.label(), view_data.input.buffer)
        }
        AppMode::PageInput => format!(
            "go to page: {}_ | enter go | esc cancel",
            view_data.input.buffer
        ),
        _ if state.delete_dialog_open() => "y/enter delete | n/esc cancel".to_owned(),
        AppMode::Nav => {
            "j/k/h/l | s/S sort | f filter / search c clear | enter expand tab grid | a add d del | [/] {/} pages +/- size # page | r refresh | ? help | ctrl+q".to_owned()
        }
        AppMode::Grid => {
            "h/l day j/k class | H/L week | y yes n no | D dates x clear | p program | esc back".to_owned()
        }
        AppMode::Form => "tab field | enter submit | esc cancel".to_owned(),
        AppMode::DatePicker => "h/l day j/k week H/L month | enter pick | x clear | esc cancel".to_owned(),
        AppMode::ProgramPicker => "j/k move | enter select | esc cancel".to_owned(),
    };
    match &state.status_line {
        Some(status) => format!("{} | {status} | {hints}", state.mode.badge()),
        None => format!("{} | {hints}", state.mode.badge()),
    }
}

fn field_error_text(error: FieldError) -> String {
    match error {
        FieldError::Required => "required".to_owned(),
        FieldError::TooLong { max } => format!("max {max} chars"),
    }
}

fn render_form_overlay_text(form: &FormUiState) -> String {
    let mut lines = FlightField::ALL
        .iter()
        .map(|field| {
            let marker = if *field == form.field { ">" } else { " " };
            let cursor = if *field == form.field { "_" } else { "" };
            let mut line = format!(
                "{marker} {} {}{cursor}",
                pad(field.label(), 12),
                form.input.field(*field)
            );
            if form.show_errors
                && let Some(error) = form.input.field_error(*field)
            {
                line.push_str(&format!("  ({})", field_error_text(error)));
            }
            line
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push("tab/shift+tab field | enter or ctrl+s submit | esc cancel".to_owned());
    lines.join("\n")
}

fn render_delete_dialog_text(id: &FlightId, flight: Option<&Flight>) -> String {
    let target = flight
        .map(|flight| {
            format!(
                "{} {}-{}",
                flight.airline, flight.origin, flight.destination
            )
        })
        .unwrap_or_else(|| id.to_string());
    [
        "Are you sure you want to delete this flight?".to_owned(),
        format!("{target} (id {id})"),
        String::new(),
        "y/enter delete | n/esc cancel".to_owned(),
    ]
    .join("\n")
}

fn render_program_picker_text(
    programs: &[String],
    picker: ProgramPickerUiState,
    current: Option<&str>,
) -> String {
    let mut lines = programs
        .iter()
        .enumerate()
        .map(|(index, tag)| {
            let cursor = if index == picker.cursor { ">" } else { " " };
            let active = if Some(tag.as_str()) == current { "*" } else { " " };
            format!("{cursor}{active} {tag}")
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push("j/k move | enter select | esc cancel".to_owned());
    lines.join("\n")
}

fn render_date_picker_overlay_text(picker: DatePickerUiState, today: Date) -> String {
    let cursor = picker.cursor;
    let mut lines = vec![
        format!("{} {}", cursor.month(), cursor.year()),
        "Mo  Tu  We  Th  Fr  Sa  Su".to_owned(),
    ];

    let first = Date::from_calendar_date(cursor.year(), cursor.month(), 1).ok();
    let last_day = last_day_of_month(cursor.year(), cursor.month()).unwrap_or(28);
    let offset = first.map_or(0, |date| usize::from(date.weekday().number_days_from_monday()));
    let mut week = "    ".repeat(offset);
    for day in 1..=last_day {
        let Ok(date) = Date::from_calendar_date(cursor.year(), cursor.month(), day) else {
            continue;
        };
        let in_range = picker
            .start
            .is_some_and(|start| date >= start && date <= cursor);
        let cell = if date == cursor {
            format!("[{day:>2}]")
        } else if date < today {
            " -- ".to_owned()
        } else if in_range {
            format!("*{day:>2} ")
        } else {
            format!(" {day:>2} ")
        };
        week.push_str(&cell);
        if date.weekday().number_days_from_monday() == 6 {
            lines.push(week.trim_end().to_owned());
            week = String::new();
        }
    }
    if !week.is_empty() {
        lines.push(week.trim_end().to_owned());
    }

    let start = picker
        .start
        .map(long_day_label)
        .unwrap_or_else(|| "-".to_owned());
    lines.push(String::new());
    lines.push(format!("start: {start}  cursor: {}", long_day_label(cursor)));
    lines.push("enter picks start, then end".to_owned());
    lines.join("\n")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
table: j/k rows | h/l columns | s sort (asc, desc, off) | S clear sort\n\
table: f column filter | / search | c clear filters | r refresh\n\
table: enter/space expand | tab focus grid | a add | d delete\n\
pages: ] next | [ previous | } last | { first | +/- page size | # go to page\n\
grid: h/l day | j/k class | H/L or [/] week | y available | n unavailable\n\
grid: D pick dates | x clear dates | p program | esc/tab back\n\
dates: h/l day | j/k week | H/L month | enter start then end | x clear | esc cancel\n\
form: tab/shift+tab field | enter or ctrl+s submit | esc cancel"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::{
        AppRuntime, FormUiState, InternalEvent, UiOptions, ViewData, handle_key_event,
        help_overlay_text, process_internal_events, refresh_view_data, render_date_picker_overlay_text,
        render_delete_dialog_text, render_form_overlay_text, shift_date_by_months, status_text,
        table_lines,
    };
    use anyhow::{Result, anyhow};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use pointsgo_app::{
        AppMode, AppState, AvailabilityChange, CabinClass, ColumnId, DEFAULT_PROGRAMS,
        FilterTarget, Flight, FlightId, NewFlight,
    };
    use pointsgo_testkit::{fixture_today, sample_flight, with_availability};
    use ratatui::text::Line;
    use std::sync::mpsc;
    use time::{Date, Month};

    #[derive(Debug, Default)]
    struct TestRuntime {
        flights: Vec<Flight>,
        loads: usize,
        invalidations: usize,
        fail_mutations: bool,
        created: Vec<NewFlight>,
        deleted: Vec<FlightId>,
        programs: Vec<(FlightId, String)>,
        availability: Vec<(FlightId, AvailabilityChange)>,
    }

    impl TestRuntime {
        fn with_flights(flights: Vec<Flight>) -> Self {
            Self {
                flights,
                ..Self::default()
            }
        }

        fn check_failure(&self) -> Result<()> {
            if self.fail_mutations {
                return Err(anyhow!("server error (500): backend down"));
            }
            Ok(())
        }
    }

    impl AppRuntime for TestRuntime {
        fn load_flights(&mut self) -> Result<Vec<Flight>> {
            self.loads += 1;
            Ok(self.flights.clone())
        }

        fn invalidate_flights(&mut self) {
            self.invalidations += 1;
        }

        fn create_flight(&mut self, flight: &NewFlight) -> Result<()> {
            self.check_failure()?;
            self.created.push(flight.clone());
            let id = (self.flights.len() + 100).to_string();
            self.flights.push(sample_flight(
                &id,
                &flight.airline,
                &flight.origin,
                &flight.destination,
            ));
            Ok(())
        }

        fn delete_flight(&mut self, id: &FlightId) -> Result<()> {
            self.check_failure()?;
            self.deleted.push(id.clone());
            self.flights.retain(|flight| &flight.id != id);
            Ok(())
        }

        fn update_program(&mut self, id: &FlightId, program: &str) -> Result<()> {
            self.check_failure()?;
            self.programs.push((id.clone(), program.to_owned()));
            if let Some(flight) = self.flights.iter_mut().find(|flight| &flight.id == id) {
                flight.program = Some(program.to_owned());
            }
            Ok(())
        }

        fn update_availability(&mut self, id: &FlightId, change: &AvailabilityChange) -> Result<()> {
            self.check_failure()?;
            self.availability.push((id.clone(), *change));
            Ok(())
        }
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn internal_tx() -> mpsc::Sender<InternalEvent> {
        let (tx, _rx) = mpsc::channel();
        tx
    }

    fn setup(flights: Vec<Flight>) -> Result<(AppState, TestRuntime, ViewData)> {
        let mut runtime = TestRuntime::with_flights(flights);
        let mut view_data = ViewData::new(&UiOptions::default(), fixture_today())?;
        refresh_view_data(&mut runtime, &mut view_data)?;
        Ok((AppState::default(), runtime, view_data))
    }

    fn press(
        state: &mut AppState,
        runtime: &mut TestRuntime,
        view_data: &mut ViewData,
        keys: &[KeyEvent],
    ) {
        let tx = internal_tx();
        for key in keys {
            let _ = handle_key_event(state, runtime, view_data, &tx, *key);
        }
    }

    fn type_text(text: &str) -> Vec<KeyEvent> {
        text.chars().map(|ch| key(KeyCode::Char(ch))).collect()
    }

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|span| span.content.as_ref()).collect()
    }

    fn rendered(state: &AppState, view_data: &ViewData) -> Vec<String> {
        table_lines(state, view_data).iter().map(line_text).collect()
    }

    fn status(state: &AppState) -> &str {
        state.status_line.as_deref().unwrap_or_default()
    }

    #[test]
    fn single_flight_renders_one_row_with_expand_control() -> Result<()> {
        let (state, _runtime, view_data) = setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        let lines = rendered(&state, &view_data);

        assert_eq!(lines.len(), 2);
        let header = &lines[0];
        for label in ["Origin", "Destination", "Airline", "Last Updated", "Program"] {
            assert!(header.contains(label), "{label} missing from {header}");
        }
        let row = &lines[1];
        assert!(row.starts_with("JFK"));
        assert!(row.contains("LAX"));
        assert!(row.contains("AA"));
        assert!(row.contains("N/A ▼"));
        let program_at = header.find("Program").expect("program header");
        let marker_at = row.find("N/A").expect("program cell");
        assert_eq!(
            header[..program_at].chars().count(),
            row[..marker_at].chars().count()
        );
        Ok(())
    }

    #[test]
    fn empty_collection_renders_hint() -> Result<()> {
        let (state, _runtime, view_data) = setup(Vec::new())?;
        let lines = rendered(&state, &view_data);
        assert_eq!(lines.len(), 2);
        assert!(lines[1].contains("no flights"));
        Ok(())
    }

    #[test]
    fn over_long_airline_is_rejected_before_request() -> Result<()> {
        let (mut state, mut runtime, mut view_data) = setup(Vec::new())?;
        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(type_text("AAL"));
        keys.push(key(KeyCode::Tab));
        keys.extend(type_text("JFK"));
        keys.push(key(KeyCode::Tab));
        keys.extend(type_text("LAX"));
        keys.push(key(KeyCode::Enter));
        press(&mut state, &mut runtime, &mut view_data, &keys);

        assert!(runtime.created.is_empty());
        assert_eq!(state.mode, AppMode::Form);
        assert!(status(&state).contains("airline must be at most 2 characters"));
        assert!(render_form_overlay_text(&view_data.form).contains("(max 2 chars)"));
        Ok(())
    }

    #[test]
    fn valid_form_creates_and_refetches() -> Result<()> {
        let (mut state, mut runtime, mut view_data) = setup(Vec::new())?;
        let loads_before = runtime.loads;
        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(type_text("UA"));
        keys.push(key(KeyCode::Tab));
        keys.extend(type_text("SFO"));
        keys.push(key(KeyCode::Tab));
        keys.extend(type_text("EWR"));
        keys.push(key(KeyCode::Enter));
        press(&mut state, &mut runtime, &mut view_data, &keys);

        assert_eq!(runtime.created.len(), 1);
        assert_eq!(runtime.created[0].origin, "SFO");
        assert_eq!(runtime.loads, loads_before + 1);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(view_data.form, FormUiState::default());
        assert_eq!(view_data.flights.len(), 1);
        assert_eq!(status(&state), "flight UA SFO-EWR created");
        Ok(())
    }

    #[test]
    fn failed_create_clears_form_and_keeps_rows() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        runtime.fail_mutations = true;
        let loads_before = runtime.loads;
        let mut keys = vec![key(KeyCode::Char('a'))];
        keys.extend(type_text("DL"));
        keys.push(key(KeyCode::Tab));
        keys.extend(type_text("ATL"));
        keys.push(key(KeyCode::Tab));
        keys.extend(type_text("JFK"));
        keys.push(key(KeyCode::Enter));
        press(&mut state, &mut runtime, &mut view_data, &keys);

        assert_eq!(runtime.loads, loads_before);
        assert_eq!(view_data.form, FormUiState::default());
        assert_eq!(view_data.flights.len(), 1);
        assert!(status(&state).starts_with("create failed: server error (500)"));
        Ok(())
    }

    #[test]
    fn confirmed_delete_refetches_without_the_row() -> Result<()> {
        let (mut state, mut runtime, mut view_data) = setup(vec![
            sample_flight("1", "AA", "JFK", "LAX"),
            sample_flight("2", "UA", "SFO", "EWR"),
        ])?;

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('d'))]);
        assert_eq!(state.delete_target, Some(FlightId::new("1")));
        assert!(render_delete_dialog_text(&FlightId::new("1"), view_data.flights.first())
            .contains("AA JFK-LAX"));

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('y'))]);
        assert!(!state.delete_dialog_open());
        assert_eq!(runtime.deleted, vec![FlightId::new("1")]);
        assert!(view_data.flights.iter().all(|flight| flight.id.as_str() != "1"));
        assert_eq!(status(&state), "flight 1 deleted");
        Ok(())
    }

    #[test]
    fn failed_delete_still_closes_dialog() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        runtime.fail_mutations = true;

        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[key(KeyCode::Char('d')), key(KeyCode::Enter)],
        );
        assert!(!state.delete_dialog_open());
        assert_eq!(view_data.flights.len(), 1);
        assert!(status(&state).starts_with("delete failed"));
        Ok(())
    }

    #[test]
    fn dialog_blocks_other_keys_until_canceled() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[key(KeyCode::Char('d')), key(KeyCode::Char('a'))],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(state.delete_dialog_open());

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Esc)]);
        assert!(!state.delete_dialog_open());
        assert!(runtime.deleted.is_empty());
        Ok(())
    }

    #[test]
    fn global_search_keeps_fuzzy_matches() -> Result<()> {
        let (mut state, mut runtime, mut view_data) = setup(vec![
            sample_flight("1", "AA", "JFK", "LAX"),
            sample_flight("2", "UA", "SFO", "EWR"),
            sample_flight("3", "aa", "ORD", "DFW"),
        ])?;
        let mut keys = vec![key(KeyCode::Char('/'))];
        keys.extend(type_text("AA"));
        press(&mut state, &mut runtime, &mut view_data, &keys);
        assert_eq!(state.mode, AppMode::FilterInput(FilterTarget::Global));
        assert!(status_text(&state, &view_data).contains("search: AA_"));

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Enter)]);
        let ids: Vec<&str> = view_data
            .page_rows()
            .iter()
            .map(|flight| flight.id.as_str())
            .collect();
        assert_eq!(ids, vec!["1", "3"]);
        assert_eq!(state.mode, AppMode::Nav);
        Ok(())
    }

    #[test]
    fn escape_restores_previous_filter() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        let mut keys = vec![key(KeyCode::Char('f'))];
        keys.extend(type_text("zz"));
        press(&mut state, &mut runtime, &mut view_data, &keys);
        assert!(view_data.page_rows().is_empty());

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Esc)]);
        assert_eq!(view_data.table.column_filter(ColumnId::Origin), None);
        assert_eq!(view_data.page_rows().len(), 1);
        Ok(())
    }

    #[test]
    fn sort_key_reports_direction_and_refuses_unsortable() -> Result<()> {
        let (mut state, mut runtime, mut view_data) = setup(vec![
            sample_flight("1", "AA", "JFK", "LAX"),
            sample_flight("2", "DL", "ATL", "JFK"),
        ])?;
        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('s'))]);
        assert_eq!(status(&state), "sort Origin asc");
        assert_eq!(view_data.page_rows()[0].id.as_str(), "2");
        assert!(rendered(&state, &view_data)[0].contains("Origin ↑"));

        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[
                key(KeyCode::Char('l')),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('s')),
            ],
        );
        assert_eq!(status(&state), "sort unavailable: Last Updated");
        Ok(())
    }

    #[test]
    fn page_keys_and_page_input() -> Result<()> {
        let flights = (0..25)
            .map(|index| sample_flight(&index.to_string(), "AA", "JFK", "LAX"))
            .collect();
        let (mut state, mut runtime, mut view_data) = setup(flights)?;

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char(']'))]);
        assert_eq!(view_data.table.page_index(), 1);

        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[key(KeyCode::Char('#')), key(KeyCode::Char('9')), key(KeyCode::Enter)],
        );
        assert_eq!(view_data.table.page_index(), 2);
        assert_eq!(status(&state), "page 3 of 3");

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('+'))]);
        assert_eq!(view_data.table.page_size(), 20);
        assert_eq!(view_data.table.page_index(), 0);
        Ok(())
    }

    #[test]
    fn grid_flow_picks_range_and_toggles_cell() -> Result<()> {
        let flight = with_availability(
            sample_flight("1", "AA", "JFK", "LAX"),
            "2024-06-01",
            Some(true),
            None,
        );
        let (mut state, mut runtime, mut view_data) = setup(vec![flight])?;

        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[
                key(KeyCode::Tab),
                key(KeyCode::Char('D')),
                key(KeyCode::Enter),
                key(KeyCode::Char('l')),
                key(KeyCode::Char('l')),
                key(KeyCode::Enter),
            ],
        );
        assert_eq!(state.mode, AppMode::Grid);
        let grid = view_data
            .grids
            .get(&FlightId::new("1"))
            .expect("grid state");
        assert_eq!(grid.days().len(), 3);

        let lines = rendered(&state, &view_data);
        assert!(lines.iter().any(|line| line.contains("Jun 1") && line.contains("Jun 3")));
        assert!(lines.iter().any(|line| line.contains("Economy") && line.contains("yes")));

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('y'))]);
        let (id, change) = runtime.availability.first().expect("update sent");
        assert_eq!(id.as_str(), "1");
        assert_eq!(
            change.to_body(),
            serde_json::json!({"2024-06-01": {"economy": null}})
        );
        assert_eq!(status(&state), "Jun 1 economy cleared");

        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[key(KeyCode::Char('l')), key(KeyCode::Char('j')), key(KeyCode::Char('n'))],
        );
        let (_, change) = runtime.availability.last().expect("second update");
        assert_eq!(change.class, CabinClass::Business);
        assert_eq!(
            change.to_body(),
            serde_json::json!({"2024-06-02": {"buisness": false}})
        );
        Ok(())
    }

    #[test]
    fn marking_without_range_sends_nothing() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[key(KeyCode::Tab), key(KeyCode::Char('y'))],
        );
        assert!(runtime.availability.is_empty());
        assert_eq!(status(&state), "pick a date range first (D)");
        Ok(())
    }

    #[test]
    fn date_picker_refuses_past_dates() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[key(KeyCode::Tab), key(KeyCode::Char('D')), key(KeyCode::Char('h'))],
        );
        let picker = view_data.date_picker.expect("picker open");
        assert_eq!(picker.cursor, fixture_today());
        assert!(status(&state).contains("are disabled"));

        let calendar = render_date_picker_overlay_text(picker, fixture_today());
        assert!(calendar.starts_with("June 2024"));
        assert!(calendar.contains("[ 1]"));
        Ok(())
    }

    #[test]
    fn end_before_start_restarts_range() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[
                key(KeyCode::Tab),
                key(KeyCode::Char('D')),
                key(KeyCode::Char('l')),
                key(KeyCode::Enter),
                key(KeyCode::Char('h')),
                key(KeyCode::Enter),
            ],
        );
        assert_eq!(state.mode, AppMode::DatePicker);
        let picker = view_data.date_picker.expect("picker open");
        assert_eq!(picker.start, Some(fixture_today()));
        Ok(())
    }

    #[test]
    fn collapsing_row_discards_grid_state() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[
                key(KeyCode::Tab),
                key(KeyCode::Char('D')),
                key(KeyCode::Enter),
                key(KeyCode::Enter),
                key(KeyCode::Esc),
            ],
        );
        assert_eq!(state.mode, AppMode::Nav);
        assert!(view_data.grids.contains_key(&FlightId::new("1")));

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Enter)]);
        assert!(!view_data.table.is_expanded(&FlightId::new("1")));
        assert!(!view_data.grids.contains_key(&FlightId::new("1")));

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Enter)]);
        let grid = view_data
            .grids
            .get(&FlightId::new("1"))
            .expect("fresh grid state");
        assert!(grid.range().is_none());
        Ok(())
    }

    #[test]
    fn week_navigation_stops_at_boundaries() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        let mut keys = vec![key(KeyCode::Tab), key(KeyCode::Char('D')), key(KeyCode::Enter)];
        keys.extend(std::iter::repeat_n(key(KeyCode::Char('j')), 1));
        keys.extend(std::iter::repeat_n(key(KeyCode::Char('l')), 2));
        keys.push(key(KeyCode::Enter));
        press(&mut state, &mut runtime, &mut view_data, &keys);

        let grid = view_data
            .grids
            .get(&FlightId::new("1"))
            .expect("grid state");
        assert_eq!(grid.days().len(), 10);

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('H'))]);
        assert_eq!(status(&state), "no earlier days");
        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('L'))]);
        let grid = view_data
            .grids
            .get(&FlightId::new("1"))
            .expect("grid state");
        assert_eq!(grid.visible_days().len(), 3);
        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('L'))]);
        assert_eq!(status(&state), "no later days");
        Ok(())
    }

    #[test]
    fn program_picker_updates_program() -> Result<()> {
        let (mut state, mut runtime, mut view_data) =
            setup(vec![sample_flight("1", "AA", "JFK", "LAX")])?;
        press(
            &mut state,
            &mut runtime,
            &mut view_data,
            &[
                key(KeyCode::Tab),
                key(KeyCode::Char('p')),
                key(KeyCode::Char('j')),
                key(KeyCode::Enter),
            ],
        );
        assert_eq!(
            runtime.programs,
            vec![(FlightId::new("1"), DEFAULT_PROGRAMS[1].to_owned())]
        );
        assert_eq!(state.mode, AppMode::Grid);
        assert_eq!(status(&state), "program set to Aeroplan");
        assert!(rendered(&state, &view_data)[1].contains("Aeroplan ▲"));
        Ok(())
    }

    #[test]
    fn refresh_key_invalidates_and_reloads() -> Result<()> {
        let (mut state, mut runtime, mut view_data) = setup(Vec::new())?;
        runtime.flights.push(sample_flight("9", "B6", "BOS", "FLL"));
        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('r'))]);
        assert_eq!(runtime.invalidations, 1);
        assert_eq!(view_data.flights.len(), 1);
        assert_eq!(status(&state), "1 flight loaded");

        runtime.flights.push(sample_flight("10", "AS", "SEA", "ANC"));
        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('r'))]);
        assert_eq!(status(&state), "2 flights loaded");
        Ok(())
    }

    #[test]
    fn refetch_prunes_deleted_expanded_rows() -> Result<()> {
        let (mut state, mut runtime, mut view_data) = setup(vec![
            sample_flight("1", "AA", "JFK", "LAX"),
            sample_flight("2", "UA", "SFO", "EWR"),
        ])?;
        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Tab)]);
        runtime.flights.retain(|flight| flight.id.as_str() != "1");
        refresh_view_data(&mut runtime, &mut view_data)?;
        assert!(view_data.focus.is_none());
        assert!(view_data.grids.is_empty());

        press(&mut state, &mut runtime, &mut view_data, &[key(KeyCode::Char('y'))]);
        assert_eq!(state.mode, AppMode::Nav);
        assert_eq!(status(&state), "flight no longer listed");
        Ok(())
    }

    #[test]
    fn stale_status_clear_token_is_ignored() -> Result<()> {
        let (mut state, _runtime, mut view_data) = setup(Vec::new())?;
        let (tx, rx) = mpsc::channel();
        super::emit_status(&mut state, &mut view_data, &tx, "first");
        super::emit_status(&mut state, &mut view_data, &tx, "second");

        tx.send(InternalEvent::ClearStatus { token: 1 })?;
        process_internal_events(&mut state, &view_data, &rx);
        assert_eq!(status(&state), "second");

        tx.send(InternalEvent::ClearStatus { token: 2 })?;
        process_internal_events(&mut state, &view_data, &rx);
        assert!(state.status_line.is_none());
        Ok(())
    }

    #[test]
    fn month_shift_clamps_to_month_end() {
        let date = Date::from_calendar_date(2024, Month::January, 31).expect("valid date");
        assert_eq!(
            shift_date_by_months(date, 1),
            Date::from_calendar_date(2024, Month::February, 29).ok()
        );
        assert_eq!(
            shift_date_by_months(date, -1),
            Date::from_calendar_date(2023, Month::December, 31).ok()
        );
    }

    #[test]
    fn ctrl_q_quits_and_help_toggles() -> Result<()> {
        let (mut state, mut runtime, mut view_data) = setup(Vec::new())?;
        let tx = internal_tx();
        assert!(!handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            key(KeyCode::Char('?')),
        ));
        assert!(view_data.help_visible);
        assert!(help_overlay_text().contains("go to page"));
        assert!(handle_key_event(
            &mut state,
            &mut runtime,
            &mut view_data,
            &tx,
            KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL),
        ));
        Ok(())
    }
}
