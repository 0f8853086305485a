use anyhow::{ensure, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame, Terminal,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use canvapet_keys::config::Config;
use canvapet_keys::logging::{init_tracing, LogRingBuffer};
use canvapet_keys::shortcuts::{
    DispatchOutcome, DispatcherHandle, EventTarget, HandlerTable, KeyEventHub, KeyPress,
    ScopeController, ShortcutDispatcher, ShortcutRegistry,
};
use canvapet_keys::ui::KeyPressIndicator;

type History = Rc<RefCell<VecDeque<String>>>;

fn push_history(history: &History, max: usize, entry: String) {
    let mut history = history.borrow_mut();
    history.push_front(entry);
    while history.len() > max {
        history.pop_back();
    }
}

struct ShortcutDebugger {
    hub: KeyEventHub,
    scopes: ScopeController,
    // Keeps the listener attached for the lifetime of the debugger
    _dispatcher: ShortcutDispatcher,
    handle: DispatcherHandle,
    indicator: KeyPressIndicator,
    action_history: History,
    logs: LogRingBuffer,
    max_history: usize,
    typing: bool,
    should_quit: bool,
}

impl ShortcutDebugger {
    fn new(config: &Config, logs: LogRingBuffer) -> Result<Self> {
        let registry = Arc::new(config.build_registry()?);
        let hub = KeyEventHub::new();
        let scopes = ScopeController::new();
        let max_history = config.display.max_history;
        let action_history: History = Rc::new(RefCell::new(VecDeque::new()));

        let mut dispatcher = ShortcutDispatcher::new(Arc::clone(&registry), scopes.clone());
        let handlers = handler_table(&registry, dispatcher.handle(), &action_history, max_history);
        dispatcher.start(
            &hub,
            handlers.into_callback(),
            config.dispatch_options(),
        )?;
        ensure!(
            hub.listener_count() == 1,
            "Expected exactly one dispatcher on the hub"
        );

        let mut indicator = KeyPressIndicator::new();
        indicator.set_enabled(config.display.show_key_indicator);

        Ok(Self {
            hub,
            scopes,
            handle: dispatcher.handle(),
            _dispatcher: dispatcher,
            indicator,
            action_history,
            logs,
            max_history,
            typing: false,
            should_quit: false,
        })
    }

    fn handle_key(&mut self, key: KeyEvent) {
        // Debugger controls are handled before the dispatcher sees anything
        match (key.code, key.modifiers) {
            (KeyCode::Char('q'), KeyModifiers::CONTROL) => {
                self.should_quit = true;
                return;
            }
            (KeyCode::F(2), _) => {
                let next = self.handle.current_scope().next();
                // A scope pinned by the config stays pinned; cycle the pin itself
                if self.handle.pinned_scope().is_some() {
                    self.handle.set_scope(next);
                    self.note(format!("Pinned scope switched to {}", next));
                } else {
                    self.scopes.set_scope(next);
                    self.note(format!("Scope switched to {}", next));
                }
                return;
            }
            (KeyCode::F(3), _) => {
                let enabled = !self.handle.is_enabled();
                self.handle.set_enabled(enabled);
                self.note(format!("Dispatcher {}", if enabled { "enabled" } else { "disabled" }));
                return;
            }
            (KeyCode::F(4), _) => {
                self.typing = !self.typing;
                self.note(format!(
                    "Focus {}",
                    if self.typing { "in text input" } else { "on page" }
                ));
                return;
            }
            _ => {}
        }

        let target = if self.typing {
            EventTarget::element("input")
        } else {
            EventTarget::none()
        };
        let mut press = match KeyPress::from_crossterm(&key, target) {
            Some(press) => press,
            None => return,
        };

        let now = Instant::now();
        self.hub.emit_at(&mut press, now);
        let outcome = self
            .handle
            .last_outcome()
            .unwrap_or(DispatchOutcome::Inactive);
        self.indicator.record(&press, outcome, now);

        let message = match outcome {
            DispatchOutcome::Dispatched(action) => format!("Key '{}' → {}", press, action),
            DispatchOutcome::HandlerFailed(action) => {
                format!("Key '{}' → {} (handler failed)", press, action)
            }
            DispatchOutcome::Suppressed(action) => {
                format!("Key '{}' → {} (not allowed)", press, action)
            }
            DispatchOutcome::Unmatched => {
                let pending = self.handle.pending_sequence();
                if pending.len() > 1 {
                    format!("Key '{}' → waiting ({})", press, pending.join(" "))
                } else {
                    format!("Key '{}' → No mapping", press)
                }
            }
            DispatchOutcome::Ignored => format!("Key '{}' → typed into input", press),
            DispatchOutcome::Disabled => format!("Key '{}' → passed through", press),
            DispatchOutcome::Inactive => format!("Key '{}' → dispatcher inactive", press),
        };
        self.note(message);
    }

    fn on_idle(&mut self) {
        let now = Instant::now();
        self.hub.tick(now);
        self.indicator.prune(now);
    }

    fn note(&self, message: String) {
        push_history(&self.action_history, self.max_history, message);
    }

    fn draw(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(7),  // Status panel
                Constraint::Min(8),     // Action history
                Constraint::Length(3),  // Key indicator
                Constraint::Length(10), // Log panel
            ])
            .split(f.area());

        self.draw_status(f, chunks[0]);
        self.draw_action_history(f, chunks[1]);
        self.draw_indicator(f, chunks[2]);
        self.draw_logs(f, chunks[3]);
    }

    fn draw_status(&self, f: &mut Frame, area: Rect) {
        let pending = self.handle.pending_sequence();
        let status_text = vec![
            Line::from(vec![Span::styled(
                "Shortcut Debugger",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )]),
            Line::from(vec![
                Span::raw("Scope: "),
                Span::styled(
                    self.handle.current_scope().to_string(),
                    Style::default().fg(Color::Yellow),
                ),
                if self.handle.pinned_scope().is_some() {
                    Span::styled(" (pinned)", Style::default().fg(Color::DarkGray))
                } else {
                    Span::raw("")
                },
                Span::raw("  Dispatcher: "),
                if self.handle.is_enabled() {
                    Span::styled("enabled", Style::default().fg(Color::Green))
                } else {
                    Span::styled("disabled", Style::default().fg(Color::Red))
                },
                Span::raw("  Focus: "),
                Span::styled(
                    if self.typing { "text input" } else { "page" },
                    Style::default().fg(Color::Magenta),
                ),
            ]),
            Line::from(vec![
                Span::raw("Pending sequence: "),
                if pending.is_empty() {
                    Span::styled("(none)", Style::default().fg(Color::DarkGray))
                } else {
                    Span::styled(
                        pending.join(" "),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    )
                },
            ]),
            Line::from(""),
            Line::from(vec![
                Span::styled("Keys: ", Style::default().fg(Color::DarkGray)),
                Span::raw("F2 scope, F3 enable/disable, F4 focus input, Ctrl+Q quit"),
            ]),
        ];

        let status = Paragraph::new(status_text)
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, area);
    }

    fn draw_action_history(&self, f: &mut Frame, area: Rect) {
        let history = self.action_history.borrow();
        let items: Vec<ListItem> = history
            .iter()
            .enumerate()
            .map(|(i, msg)| {
                let style = if i == 0 {
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                ListItem::new(msg.clone()).style(style)
            })
            .collect();

        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .title("Action History (newest first)"),
        );
        f.render_widget(list, area);
    }

    fn draw_indicator(&self, f: &mut Frame, area: Rect) {
        let block = Block::default().borders(Borders::ALL).title("Recent Keys");
        let inner = block.inner(area);
        f.render_widget(block, area);
        self.indicator.render(f, inner, Instant::now());
    }

    fn draw_logs(&self, f: &mut Frame, area: Rect) {
        let visible = area.height.saturating_sub(2) as usize;
        let items: Vec<ListItem> = self
            .logs
            .get_recent(visible)
            .into_iter()
            .map(|entry| {
                let color = match entry.level.as_str() {
                    "ERROR" => Color::Red,
                    "WARN" => Color::Yellow,
                    "DEBUG" | "TRACE" => Color::DarkGray,
                    _ => Color::Gray,
                };
                ListItem::new(entry.format_for_display()).style(Style::default().fg(color))
            })
            .collect();

        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Log"));
        f.render_widget(list, area);
    }
}

/// Handlers that just report which region handled what
fn handler_table(
    registry: &ShortcutRegistry,
    dispatcher: DispatcherHandle,
    history: &History,
    max_history: usize,
) -> HandlerTable {
    let mut table = HandlerTable::for_dispatcher(dispatcher);
    for def in registry.all() {
        let history = Rc::clone(history);
        let (scope, action) = (def.scope, def.action);
        table.register(scope, action, move || {
            push_history(&history, max_history, format!("  {} handled by {} region", action, scope));
            Ok(())
        });
    }
    table
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, mut app: ShortcutDebugger) -> io::Result<()> {
    loop {
        terminal.draw(|f| app.draw(f))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key);

                if app.should_quit {
                    return Ok(());
                }
            }
        }
        app.on_idle();
    }
}

fn main() -> Result<()> {
    let logs = init_tracing("debug")?;
    let config = Config::load()?;
    let app = ShortcutDebugger::new(&config, logs)?;

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
        println!("Error: {:?}", err);
    }

    Ok(())
}
