use anyhow::Result;
use chrono::Utc;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use materials_budget::{format_price, BudgetStore, Confirmation, KeyValueStore, MaterialId};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use rust_decimal::Decimal;
use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    AddForm,
    EditForm(MaterialId),
    QuantityEntry(MaterialId),
    ConfirmClear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Price,
}

/// Name/price fields shared by the add and edit forms. View-local, never
/// persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormState {
    pub name: String,
    pub price: String,
    pub focus: FormField,
}

impl Default for FormState {
    fn default() -> Self {
        Self {
            name: String::new(),
            price: String::new(),
            focus: FormField::Name,
        }
    }
}

impl FormState {
    fn push(&mut self, c: char) {
        match self.focus {
            FormField::Name => self.name.push(c),
            FormField::Price => {
                if c.is_ascii_digit() || c == '.' || c == '-' {
                    self.price.push(c);
                }
            }
        }
    }

    fn pop(&mut self) {
        match self.focus {
            FormField::Name => self.name.pop(),
            FormField::Price => self.price.pop(),
        };
    }

    fn switch_focus(&mut self) {
        self.focus = match self.focus {
            FormField::Name => FormField::Price,
            FormField::Price => FormField::Name,
        };
    }

    /// Unparseable prices count as 0, which validation then rejects
    fn price_value(&self) -> Decimal {
        Decimal::from_str(self.price.trim()).unwrap_or(Decimal::ZERO)
    }
}

pub struct App<S: KeyValueStore> {
    pub store: BudgetStore<S>,
    pub state: TableState,
    pub mode: Mode,
    pub form: FormState,
    pub quantity_input: String,
    pub last_saved_display: String,
    pub status: Option<String>,
    export_dir: PathBuf,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(store: BudgetStore<S>, export_dir: PathBuf) -> Self {
        let mut state = TableState::default();
        if !store.is_empty() {
            state.select(Some(0));
        }
        let last_saved_display = store.view(Utc::now()).last_saved_display;

        Self {
            store,
            state,
            mode: Mode::Browse,
            form: FormState::default(),
            quantity_input: String::new(),
            last_saved_display,
            status: None,
            export_dir,
        }
    }

    /// Periodic tick: only the "last saved" text is recomputed
    pub fn on_tick(&mut self) {
        self.last_saved_display = self.store.view(Utc::now()).last_saved_display;
    }

    pub fn selected_id(&self) -> Option<MaterialId> {
        self.state
            .selected()
            .and_then(|i| self.store.materials().get(i))
            .map(|m| m.id)
    }

    // ========================================================================
    // NAVIGATION
    // ========================================================================

    pub fn next(&mut self) {
        let len = self.store.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.store.len();
        if len == 0 {
            return;
        }
        let i = match self.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.state.select(Some(i));
    }

    fn clamp_selection(&mut self) {
        let len = self.store.len();
        if len == 0 {
            self.state.select(None);
        } else {
            let i = self.state.selected().unwrap_or(0).min(len - 1);
            self.state.select(Some(i));
        }
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    pub fn open_add_form(&mut self) {
        self.form = FormState::default();
        self.mode = Mode::AddForm;
    }

    pub fn submit_add(&mut self) {
        match self.store.add_material(&self.form.name, self.form.price_value()) {
            Some(_) => {
                self.form = FormState::default();
                self.mode = Mode::Browse;
                self.state.select(Some(self.store.len() - 1));
                self.status = None;
                self.on_tick();
            }
            None => {
                self.status = Some("Nombre y precio mayor que 0 son obligatorios".to_string());
            }
        }
    }

    pub fn open_edit_form(&mut self) {
        let Some(material) = self.selected_id().and_then(|id| self.store.get(id)) else {
            return;
        };
        self.form = FormState {
            name: material.name.clone(),
            price: material.price.to_string(),
            focus: FormField::Name,
        };
        self.mode = Mode::EditForm(material.id);
    }

    pub fn submit_edit(&mut self, id: MaterialId) {
        if self.store.edit_material(id, &self.form.name, self.form.price_value()) {
            self.form = FormState::default();
            self.mode = Mode::Browse;
            self.status = None;
            self.on_tick();
        } else {
            self.status = Some("Nombre y precio mayor que 0 son obligatorios".to_string());
        }
    }

    pub fn toggle_current(&mut self) {
        if let Some(id) = self.selected_id() {
            self.store.toggle_selected(id);
            self.on_tick();
        }
    }

    pub fn remove_current(&mut self) {
        if let Some(id) = self.selected_id() {
            self.store.remove_material(id);
            self.clamp_selection();
            self.on_tick();
        }
    }

    /// Quantity controls only apply to selected materials
    fn current_if_selected(&mut self) -> Option<MaterialId> {
        let id = self.selected_id()?;
        if self.store.get(id).is_some_and(|m| m.is_selected) {
            Some(id)
        } else {
            self.status = Some("Selecciona el material para cambiar la cantidad".to_string());
            None
        }
    }

    pub fn increment_current(&mut self) {
        if let Some(id) = self.current_if_selected() {
            self.store.increment_quantity(id);
            self.on_tick();
        }
    }

    pub fn decrement_current(&mut self) {
        if let Some(id) = self.current_if_selected() {
            self.store.decrement_quantity(id);
            self.on_tick();
        }
    }

    pub fn start_quantity_entry(&mut self) {
        if let Some(id) = self.current_if_selected() {
            self.quantity_input.clear();
            self.mode = Mode::QuantityEntry(id);
        }
    }

    pub fn submit_quantity(&mut self, id: MaterialId) {
        if let Ok(quantity) = self.quantity_input.trim().parse::<i64>() {
            self.store.set_quantity(id, quantity);
            self.on_tick();
        }
        self.quantity_input.clear();
        self.mode = Mode::Browse;
    }

    pub fn answer_clear(&mut self, confirmation: Confirmation) {
        if self.store.clear_all(confirmation) {
            self.state.select(None);
            self.status = Some("Presupuesto limpiado".to_string());
            self.on_tick();
        }
        self.mode = Mode::Browse;
    }

    pub fn export(&mut self) {
        let snapshot = self.store.export_snapshot();
        self.status = Some(match snapshot.write_to_dir(&self.export_dir) {
            Ok(path) => format!("Exportado a {}", path.display()),
            Err(err) => {
                tracing::error!(error = ?err, "export failed");
                format!("No se pudo exportar: {}", err)
            }
        });
    }

    // ========================================================================
    // KEY HANDLING
    // ========================================================================

    /// Returns true when the user asked to quit
    pub fn handle_key(&mut self, key: KeyEvent) -> bool {
        match self.mode {
            Mode::Browse => return self.handle_browse_key(key),
            Mode::AddForm | Mode::EditForm(_) => self.handle_form_key(key),
            Mode::QuantityEntry(id) => match key.code {
                KeyCode::Enter => self.submit_quantity(id),
                KeyCode::Esc => self.mode = Mode::Browse,
                KeyCode::Backspace => {
                    self.quantity_input.pop();
                }
                KeyCode::Char(c) if c.is_ascii_digit() || c == '-' => self.quantity_input.push(c),
                _ => {}
            },
            Mode::ConfirmClear => {
                let answer = match key.code {
                    KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Char('s') | KeyCode::Char('S') => {
                        Confirmation::Confirmed
                    }
                    _ => Confirmation::Declined,
                };
                self.answer_clear(answer);
            }
        }
        false
    }

    fn handle_browse_key(&mut self, key: KeyEvent) -> bool {
        self.status = None;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Down | KeyCode::Char('j') => self.next(),
            KeyCode::Up | KeyCode::Char('k') => self.previous(),
            KeyCode::Home => {
                if !self.store.is_empty() {
                    self.state.select(Some(0));
                }
            }
            KeyCode::End => {
                if !self.store.is_empty() {
                    self.state.select(Some(self.store.len() - 1));
                }
            }
            KeyCode::Char('a') => self.open_add_form(),
            KeyCode::Char('e') | KeyCode::Enter => self.open_edit_form(),
            KeyCode::Char(' ') => self.toggle_current(),
            KeyCode::Char('+') | KeyCode::Char('=') | KeyCode::Right => self.increment_current(),
            KeyCode::Char('-') | KeyCode::Left => self.decrement_current(),
            KeyCode::Char('n') => self.start_quantity_entry(),
            KeyCode::Char('d') | KeyCode::Delete => self.remove_current(),
            KeyCode::Char('x') => self.export(),
            KeyCode::Char('C') => self.mode = Mode::ConfirmClear,
            _ => {}
        }
        false
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.form = FormState::default();
                self.mode = Mode::Browse;
                self.status = None;
            }
            KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => self.form.switch_focus(),
            KeyCode::Backspace => self.form.pop(),
            KeyCode::Enter => match self.mode {
                Mode::AddForm => self.submit_add(),
                Mode::EditForm(id) => self.submit_edit(id),
                _ => {}
            },
            KeyCode::Char(c) => self.form.push(c),
            _ => {}
        }
    }
}

pub fn run_ui<S: KeyValueStore>(app: &mut App<S>, tick_rate: Duration) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, tick_rate);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res?;
    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: KeyValueStore>(
    terminal: &mut Terminal<B>,
    app: &mut App<S>,
    tick_rate: Duration,
) -> io::Result<()> {
    let mut last_tick = Instant::now();
    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key) {
                    return Ok(());
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}

// ============================================================================
// RENDERING
// ============================================================================

fn ui<S: KeyValueStore>(f: &mut Frame, app: &mut App<S>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Header with total
            Constraint::Min(0),    // Materials
            Constraint::Length(3), // Summary footer
            Constraint::Length(3), // Key help / status
        ])
        .split(f.size());

    render_header(f, chunks[0], app);
    render_table(f, chunks[1], app);
    render_summary(f, chunks[2], app);
    render_status_bar(f, chunks[3], app);

    match app.mode {
        Mode::AddForm => render_form(f, app, " 🔨 Agregar Nuevo Material "),
        Mode::EditForm(_) => render_form(f, app, " ✏️ Editar Material "),
        Mode::QuantityEntry(_) => render_quantity_entry(f, app),
        Mode::ConfirmClear => render_confirm_clear(f),
        Mode::Browse => {}
    }
}

fn render_header<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let content = vec![
        Line::from(vec![
            Span::styled(
                "💰 Presupuesto de Materiales",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw("   "),
            Span::styled("Total del Presupuesto: ", Style::default().fg(Color::White)),
            Span::styled(
                format_price(app.store.calculate_total()),
                Style::default().fg(Color::Green).add_modifier(Modifier::BOLD),
            ),
        ]),
        Line::from(vec![
            Span::styled(
                "Gestiona tu presupuesto de construcción",
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("   "),
            Span::styled(
                format!("{} materiales seleccionados", app.store.selected_count()),
                Style::default().fg(Color::Yellow),
            ),
        ]),
    ];

    let header = Paragraph::new(content)
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn render_table<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &mut App<S>) {
    let header_cells = ["", "Material", "Precio por unidad", "Cantidad", "Total"]
        .iter()
        .map(|h| {
            Cell::from(*h).style(
                Style::default()
                    .fg(Color::Yellow)
                    .add_modifier(Modifier::BOLD),
            )
        });

    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = app.store.materials().iter().map(|m| {
        let (check, color) = if m.is_selected {
            ("[x]", Color::Green)
        } else {
            ("[ ]", Color::DarkGray)
        };

        let cells = vec![
            Cell::from(check).style(Style::default().fg(color)),
            Cell::from(truncate(&m.name, 38)),
            Cell::from(format_price(m.price)),
            Cell::from(m.quantity.to_string()).style(Style::default().fg(if m.is_selected {
                Color::White
            } else {
                Color::DarkGray
            })),
            Cell::from(format_price(m.selected_total())).style(Style::default().fg(color)),
        ];

        Row::new(cells).height(1)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Length(40),
            Constraint::Length(20),
            Constraint::Length(10),
            Constraint::Length(14),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White))
            .title(" 📋 Lista de Materiales "),
    )
    .highlight_style(
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.state);
}

fn render_summary<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let line = Line::from(vec![
        Span::raw(format!(
            " Total de materiales: {} | Seleccionados: {} ",
            app.store.len(),
            app.store.selected_count()
        )),
        Span::raw(" | "),
        Span::styled(
            format!("💾 {}", app.last_saved_display),
            Style::default().fg(Color::Cyan),
        ),
    ]);

    let summary = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(summary, area);
}

fn render_status_bar<S: KeyValueStore>(f: &mut Frame, area: Rect, app: &App<S>) {
    let line = if let Some(status) = &app.status {
        Line::from(Span::styled(format!(" {}", status), Style::default().fg(Color::Yellow)))
    } else {
        let mut spans = Vec::new();
        for (i, (key, label)) in [
            ("a", "Agregar"),
            ("e", "Editar"),
            ("Espacio", "Seleccionar"),
            ("+/-", "Cantidad"),
            ("n", "Cantidad exacta"),
            ("d", "Eliminar"),
            ("x", "Exportar"),
            ("C", "Limpiar Todo"),
            ("q", "Salir"),
        ]
        .iter()
        .enumerate()
        {
            if i > 0 {
                spans.push(Span::raw(" | "));
            }
            spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
            spans.push(Span::raw(format!(" {}", label)));
        }
        Line::from(spans)
    };

    let status_bar = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_form<S: KeyValueStore>(f: &mut Frame, app: &App<S>, title: &str) {
    let area = centered_rect(60, 9, f.size());
    let field_style = |field: FormField| {
        if app.form.focus == field {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        }
    };

    let content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Nombre del Material: ", field_style(FormField::Name)),
            Span::raw(app.form.name.as_str()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Precio por Unidad:   ", field_style(FormField::Price)),
            Span::raw(app.form.price.as_str()),
        ]),
        Line::from(""),
        Line::from(Span::styled(
            "  Enter guardar | Tab cambiar campo | Esc cancelar",
            Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
        )),
    ];

    let form = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(title),
    );

    f.render_widget(Clear, area);
    f.render_widget(form, area);
}

fn render_quantity_entry<S: KeyValueStore>(f: &mut Frame, app: &App<S>) {
    let area = centered_rect(40, 5, f.size());
    let content = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled("  Cantidad: ", Style::default().fg(Color::Yellow)),
            Span::raw(app.quantity_input.as_str()),
        ]),
    ];

    let popup = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Yellow))
            .title(" Cantidad "),
    );

    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

fn render_confirm_clear(f: &mut Frame) {
    let area = centered_rect(70, 6, f.size());
    let content = vec![
        Line::from(""),
        Line::from("¿Estás seguro de que quieres limpiar todo el presupuesto?"),
        Line::from("Esta acción no se puede deshacer."),
        Line::from(Span::styled("(s/n)", Style::default().fg(Color::Yellow))),
    ];

    let popup = Paragraph::new(content).alignment(Alignment::Center).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red))
            .title(" 🗑️ Limpiar Todo "),
    );

    f.render_widget(Clear, area);
    f.render_widget(popup, area);
}

/// Rect of `width` percent and `height` rows, centered in `r`
fn centered_rect(width: u16, height: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - width) / 2),
            Constraint::Percentage(width),
            Constraint::Percentage((100 - width) / 2),
        ])
        .split(vertical[1])[1]
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len - 3).collect();
        format!("{}...", kept)
    }
}
