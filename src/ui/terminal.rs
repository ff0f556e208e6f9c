use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Terminal,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    config::AppConfig,
    core::{
        error::NinaError,
        host::{Host, Panel, ViewportListener},
        session::Session,
        types::{Bounds, GeoPoint, Severity},
    },
    pipeline::renderer::{PanelView, EMPTY_TEXT, ERROR_PREFIX, LOADING_TEXT},
    ui::app::{App, Pan},
};

/// Host backed by a terminal window; the whole screen is the panel.
pub struct TerminalHost {
    app: Arc<Mutex<App>>,
    attached: watch::Sender<bool>,
    listeners: Mutex<Vec<ViewportListener>>,
}

pub struct TerminalPanel {
    app: Arc<Mutex<App>>,
}

impl TerminalHost {
    pub fn new(center: GeoPoint) -> Self {
        let (attached, _) = watch::channel(false);
        Self {
            app: Arc::new(Mutex::new(App::new(center))),
            attached,
            listeners: Mutex::new(Vec::new()),
        }
    }

    fn mark_attached(&self) {
        self.attached.send_replace(true);
    }

    fn pan(&self, dir: Pan) {
        let viewport = lock(&self.app).pan(dir);
        for listener in lock(&self.listeners).iter() {
            listener(viewport);
        }
    }
}

impl Panel for TerminalPanel {
    fn set_label(&self, text: &str, title: &str) {
        let mut app = lock(&self.app);
        app.label = text.to_string();
        app.title = title.to_string();
    }

    fn show(&self, view: &PanelView) {
        lock(&self.app).show(view.clone());
    }
}

impl Host for TerminalHost {
    type Panel = TerminalPanel;

    fn register_panel(&self, name: &str) -> Result<Self::Panel, NinaError> {
        lock(&self.app).log(format!("[+] panel registered: {}", name));
        Ok(TerminalPanel {
            app: self.app.clone(),
        })
    }

    fn wait_attached(
        &self,
        _panel: &Self::Panel,
    ) -> impl Future<Output = Result<(), NinaError>> + Send {
        let mut rx = self.attached.subscribe();
        async move {
            rx.wait_for(|attached| *attached)
                .await
                .map(|_| ())
                .map_err(|_| NinaError::Host("terminal closed before attach".into()))
        }
    }

    fn viewport_center(&self) -> Option<GeoPoint> {
        Some(lock(&self.app).center)
    }

    fn viewport_bounds(&self) -> Option<Bounds> {
        lock(&self.app).viewport().bounds
    }

    fn on_viewport_change(&self, listener: ViewportListener) {
        lock(&self.listeners).push(listener);
    }
}

type MountTask = JoinHandle<Result<Arc<Session<TerminalHost>>, NinaError>>;

pub async fn run_tui(config: AppConfig, center: GeoPoint) -> Result<(), NinaError> {
    let host = Arc::new(TerminalHost::new(center));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mount_host = host.clone();
    let mut mount_task: Option<MountTask> =
        Some(tokio::spawn(async move { Session::mount(mount_host, &config).await }));
    let mut session: Option<Arc<Session<TerminalHost>>> = None;

    loop {
        terminal.draw(|f| draw_ui(f, &lock(&host.app)))?;
        host.mark_attached();

        if event::poll(Duration::from_millis(250))? {
            if let Event::Key(key) = event::read()? {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => break,
                    KeyCode::Char('r') => match &session {
                        Some(s) => {
                            let s = s.clone();
                            tokio::spawn(async move { s.refresh().await });
                        }
                        None => lock(&host.app).log("still mounting, refresh ignored"),
                    },
                    KeyCode::Up => host.pan(Pan::North),
                    KeyCode::Down => host.pan(Pan::South),
                    KeyCode::Left => host.pan(Pan::West),
                    KeyCode::Right => host.pan(Pan::East),
                    KeyCode::Char('j') | KeyCode::Tab => lock(&host.app).next(),
                    KeyCode::Char('k') => lock(&host.app).prev(),
                    _ => {}
                }
            }
        }

        if let Some(handle) = mount_task.take() {
            if handle.is_finished() {
                match handle.await {
                    Ok(Ok(s)) => session = Some(s),
                    Ok(Err(err)) => lock(&host.app).show(PanelView::Errored {
                        message: err.to_string(),
                    }),
                    Err(join_err) => lock(&host.app).show(PanelView::Errored {
                        message: join_err.to_string(),
                    }),
                }
            } else {
                mount_task = Some(handle);
            }
        }
    }

    if let Some(s) = session {
        s.teardown();
    }
    if let Some(handle) = mount_task {
        handle.abort();
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Minor => Color::Yellow,
        Severity::Moderate => Color::Magenta,
        Severity::Severe => Color::LightRed,
        Severity::Extreme => Color::Red,
    }
}

fn draw_ui(f: &mut ratatui::Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(7),
                Constraint::Length(7),
            ]
            .as_ref(),
        )
        .split(f.size());

    let title = Paragraph::new(Line::from(vec![
        Span::styled(
            format!(" {} ", app.label),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ),
        Span::styled(app.title.clone(), Style::default().fg(Color::Yellow)),
        Span::raw(format!(
            " | {:.3},{:.3} | r=REFRESH arrows=PAN j/k=SELECT q=QUIT",
            app.center.lat, app.center.lon
        )),
    ]))
    .block(Block::default().borders(Borders::ALL));
    f.render_widget(title, chunks[0]);

    let summary_line = match &app.view {
        PanelView::Populated { summary, .. } => Line::from(
            Severity::ALL
                .iter()
                .map(|s| {
                    Span::styled(
                        format!("{}: {}  ", s.as_str(), summary.count(*s)),
                        Style::default().fg(severity_color(*s)),
                    )
                })
                .collect::<Vec<_>>(),
        ),
        PanelView::Loading => Line::from(LOADING_TEXT),
        PanelView::Empty => Line::from(EMPTY_TEXT),
        PanelView::Errored { message } => Line::from(Span::styled(
            format!("{}: {}", ERROR_PREFIX, message),
            Style::default().fg(Color::Red),
        )),
    };
    let summary = Paragraph::new(summary_line)
        .block(Block::default().borders(Borders::ALL).title("Übersicht"));
    f.render_widget(summary, chunks[1]);

    let items: Vec<ListItem> = match &app.view {
        PanelView::Populated { alerts, .. } => alerts
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let marker = if i == app.selected { "▶ " } else { "  " };
                let distance = a.distance.clone().unwrap_or_default();
                ListItem::new(Line::from(vec![
                    Span::raw(marker),
                    Span::styled(
                        format!("[{}] ", a.type_label),
                        Style::default().fg(severity_color(a.severity)),
                    ),
                    Span::styled(
                        a.headline.clone(),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                    Span::raw(format!(" 📍 {} {} 🕒 {}", a.area, distance, a.time)),
                ]))
            })
            .collect(),
        _ => Vec::new(),
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Warnungen"));
    f.render_widget(list, chunks[2]);

    let detail = match &app.view {
        PanelView::Populated { alerts, .. } => alerts
            .get(app.selected)
            .map(|a| format!("{}\n{}", a.description, a.detail_link))
            .unwrap_or_default(),
        _ => String::new(),
    };
    let detail = Paragraph::new(detail)
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL).title("Details"));
    f.render_widget(detail, chunks[3]);

    let logs: Vec<ListItem> = app
        .logs
        .iter()
        .rev()
        .take(5)
        .map(|l| ListItem::new(l.clone()))
        .collect();
    let log_list = List::new(logs).block(Block::default().borders(Borders::ALL).title("Log"));
    f.render_widget(log_list, chunks[4]);
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
