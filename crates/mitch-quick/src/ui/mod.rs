//! Terminal dashboard: keeps the KPI tiles live against a running server,
//! pausing the refresh while the terminal loses focus.

use std::collections::VecDeque;
use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, Show};
use crossterm::event::{
    self, DisableFocusChange, EnableFocusChange, Event, KeyCode, KeyEventKind, KeyModifiers,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Wrap};

use crate::config::AppConfig;
use crate::dom::{Document, ElementRef};
use crate::error::{Error, Result};
use crate::host::{Host, ModalHelpers, NoopModals};
use crate::keys::KeyPress;
use crate::notify::{Severity, Toast, ToastId};
use crate::refresh::RefreshOutcome;
use crate::runtime::{Event as PageEvent, Runtime};
use crate::sanitize;
use crate::transport::HttpTransport;

const LOG_LINES: usize = 200;

/// Host backed by the terminal: reloads become a KPI re-fetch, everything
/// else lands in the activity log.
#[derive(Default)]
struct TerminalHost {
    log: VecDeque<String>,
    reload_requested: bool,
    modals: NoopModals,
}

impl TerminalHost {
    fn push(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        let stamp = chrono::Local::now().format("%H:%M:%S");
        self.log.push_back(format!("{stamp} {line}"));
    }
}

impl Host for TerminalHost {
    fn reload(&mut self) {
        self.reload_requested = true;
    }

    fn navigate(&mut self, url: &str) {
        self.push(format!("navigate {url}"));
    }

    fn init_tooltips(&mut self) {}

    fn init_popovers(&mut self) {}

    fn show_toast(&mut self, toast: &Toast) {
        self.push(format!("[{}] {}", toast.severity, toast.message));
    }

    fn hide_toast(&mut self, _id: ToastId) {}

    fn hide_modal(&mut self, id: &str) {
        self.push(format!("close {id}"));
    }

    fn focus(&mut self, element: &ElementRef) {
        self.push(format!("focus {element:?}"));
    }

    fn register_service_worker(&mut self, _script: &str) -> Result<()> {
        Err(Error::msg("service workers are not available in a terminal"))
    }

    fn modals(&mut self) -> &mut dyn ModalHelpers {
        &mut self.modals
    }
}

struct App {
    rt: Runtime<TerminalHost>,
    base_url: String,
    focused: bool,
    show_help: bool,
    last_outcome: Option<RefreshOutcome>,
}

impl App {
    fn new(config: AppConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.runtime.base_url, config.runtime.request_timeout())?;
        let base_url = config.runtime.base_url.clone();
        let path = config
            .runtime
            .refresh_routes
            .last()
            .cloned()
            .unwrap_or_else(|| "/dashboard".into());
        let mut doc = Document {
            path,
            ..Document::default()
        };
        for id in [
            &config.dom.total_invested_id,
            &config.dom.total_net_profit_id,
            &config.dom.average_roi_id,
            &config.dom.items_sold_id,
        ] {
            doc.text.insert(id.clone(), "-".into());
        }

        let mut rt = Runtime::init(config, doc, TerminalHost::default(), Box::new(transport))?;
        let first = rt.refresh_dashboard();
        Ok(Self {
            rt,
            base_url,
            focused: true,
            show_help: false,
            last_outcome: Some(first),
        })
    }

    fn refresh_now(&mut self) {
        let outcome = self.rt.refresh_dashboard();
        if let RefreshOutcome::Failed(e) = &outcome {
            self.rt.notify(&sanitize::clean(e), Severity::Error);
        }
        self.last_outcome = Some(outcome);
    }

    fn on_focus(&mut self, focused: bool) {
        self.focused = focused;
        if let Some(outcome) = self.rt.on_visibility_changed(!focused) {
            self.last_outcome = Some(outcome);
        }
    }

    /// Returns true to quit.
    fn handle_key(&mut self, code: KeyCode, mods: KeyModifiers) -> bool {
        if self.show_help {
            self.show_help = false;
            return false;
        }
        match code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('c') if mods.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Char('?') => self.show_help = true,
            KeyCode::Char('r') if mods.is_empty() => self.refresh_now(),
            KeyCode::Char(c) => {
                let press = KeyPress {
                    key: c.to_string(),
                    ctrl: mods.contains(KeyModifiers::CONTROL),
                    meta: mods.contains(KeyModifiers::SUPER),
                };
                let _ = self.rt.dispatch(PageEvent::KeyDown(press));
            }
            KeyCode::Esc => {
                let _ = self.rt.dispatch(PageEvent::KeyDown(KeyPress::plain("Escape")));
            }
            _ => {}
        }
        if std::mem::take(&mut self.rt.host_mut().reload_requested) {
            self.refresh_now();
        }
        false
    }

    fn draw(&self, f: &mut ratatui::Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(f.area());

        self.draw_header(f, chunks[0]);
        self.draw_main(f, chunks[1]);
        self.draw_footer(f, chunks[2]);

        if self.show_help {
            self.draw_help(f);
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame, area: Rect) {
        let now = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let updated = self
            .rt
            .refresh_state()
            .last_update()
            .map(|t| {
                t.with_timezone(&chrono::Local)
                    .format("updated %H:%M:%S")
                    .to_string()
            })
            .unwrap_or_else(|| "never updated".into());
        let state = if self.focused { "live" } else { "paused" };
        let line = Line::from(vec![
            Span::styled("Mitch Quick: Dashboard", Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled(self.base_url.clone(), Style::default().fg(Color::Gray)),
            Span::raw("  "),
            Span::styled(state, Style::default().fg(Color::LightBlue)),
            Span::raw("  "),
            Span::styled(updated, Style::default().fg(Color::Gray)),
            Span::raw("  "),
            Span::styled(now, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(Text::from(line)).block(
            Block::default()
                .borders(Borders::BOTTOM)
                .border_type(BorderType::Plain),
        );
        f.render_widget(p, area);
    }

    fn draw_main(&self, f: &mut ratatui::Frame, area: Rect) {
        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);
        self.draw_kpis(f, cols[0]);

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(8), Constraint::Min(0)])
            .split(cols[1]);
        self.draw_toasts(f, rows[0]);
        self.draw_log(f, rows[1]);
    }

    fn draw_kpis(&self, f: &mut ratatui::Frame, area: Rect) {
        let dom = &self.rt.config().dom;
        let doc = self.rt.document();
        let tiles = [
            ("Total invested", &dom.total_invested_id),
            ("Net profit", &dom.total_net_profit_id),
            ("Average ROI", &dom.average_roi_id),
            ("Items sold", &dom.items_sold_id),
        ];
        let mut lines = Vec::new();
        for (label, id) in tiles {
            let value = doc.text_of(id).unwrap_or("-").to_string();
            lines.push(Line::from(vec![
                Span::styled(format!("{label:<16}"), Style::default().fg(Color::Gray)),
                Span::styled(value, Style::default().add_modifier(Modifier::BOLD)),
            ]));
            lines.push(Line::raw(""));
        }
        if let Some(RefreshOutcome::Failed(e)) = &self.last_outcome {
            lines.push(Line::from(Span::styled(
                sanitize::clean(e),
                Style::default().fg(Color::Red),
            )));
        }
        let p = Paragraph::new(lines).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("KPIs"),
        );
        f.render_widget(p, area);
    }

    fn draw_toasts(&self, f: &mut ratatui::Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .rt
            .toasts()
            .iter()
            .rev()
            .map(|t| {
                ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<8}", t.severity.to_string()),
                        Style::default().fg(severity_color(t.severity)),
                    ),
                    Span::raw(t.message.clone()),
                ]))
            })
            .collect();
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("Notifications"),
        );
        f.render_widget(list, area);
    }

    fn draw_log(&self, f: &mut ratatui::Frame, area: Rect) {
        let height = area.height.saturating_sub(2) as usize;
        let log = &self.rt.host().log;
        let items: Vec<ListItem> = log
            .iter()
            .skip(log.len().saturating_sub(height))
            .map(|l| ListItem::new(l.clone()))
            .collect();
        let list = List::new(items).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title("Activity"),
        );
        f.render_widget(list, area);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame, area: Rect) {
        let p = Paragraph::new("[r] Refresh  [Ctrl+R] Reload  [Esc] Close  [?] Help  [q] Quit")
            .style(Style::default().fg(Color::Gray))
            .block(Block::default().borders(Borders::TOP));
        f.render_widget(p, area);
    }

    fn draw_help(&self, f: &mut ratatui::Frame) {
        let area = centered_rect(60, 50, f.area());
        let text = vec![
            Line::raw("KPIs refresh on the configured interval while the"),
            Line::raw("terminal has focus, and right away when it regains it."),
            Line::raw(""),
            Line::raw("r        fetch KPIs now"),
            Line::raw("Ctrl+R   reload"),
            Line::raw("Ctrl+K   focus search"),
            Line::raw("Esc      close dialogs"),
            Line::raw("q        quit"),
        ];
        f.render_widget(Clear, area);
        let p = Paragraph::new(text).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Double)
                .title("Help"),
        );
        f.render_widget(p, area);
    }
}

fn severity_color(s: Severity) -> Color {
    match s {
        Severity::Success => Color::Green,
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Cyan,
    }
}

pub fn run_watch(config: AppConfig) -> Result<()> {
    let app = App::new(config)?;

    let mut stdout = io::stdout();
    enable_raw_mode().map_err(|e| Error::msg(e.to_string()))?;
    execute!(stdout, EnterAlternateScreen, Hide, EnableFocusChange)
        .map_err(|e| Error::msg(e.to_string()))?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(|e| Error::msg(e.to_string()))?;
    terminal
        .clear()
        .map_err(|e| Error::msg(format!("tui clear failed: {e}")))?;

    let result = run_loop(&mut terminal, app);

    disable_raw_mode().ok();
    execute!(
        terminal.backend_mut(),
        DisableFocusChange,
        LeaveAlternateScreen,
        Show
    )
    .ok();
    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, mut app: App) -> Result<()> {
    let tick = Duration::from_millis(250);
    let mut last = Instant::now();
    loop {
        terminal
            .draw(|f| app.draw(f))
            .map_err(|e| Error::msg(format!("draw failed: {e}")))?;

        if event::poll(tick).map_err(|e| Error::msg(e.to_string()))? {
            match event::read().map_err(|e| Error::msg(e.to_string()))? {
                Event::Key(k) => {
                    if k.kind == KeyEventKind::Press && app.handle_key(k.code, k.modifiers) {
                        return Ok(());
                    }
                }
                Event::FocusLost => app.on_focus(false),
                Event::FocusGained => app.on_focus(true),
                _ => {}
            }
        }

        let now = Instant::now();
        app.rt.advance(now - last);
        last = now;
    }
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r)[1];
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical)[1]
}
