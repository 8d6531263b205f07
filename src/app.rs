use std::sync::mpsc;
use std::time::Instant;

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use tokio::runtime::Handle;

use crate::host::{CommandChannel, Dispatcher};
use crate::model::config::AppConfig;
use crate::model::repository::RepositoryRecord;
use crate::msg::Msg;
use crate::panel::toast::{ToastLevel, Toasts};
use crate::panel::{Effect, Panel, PanelMsg};

/// Rows each repository takes in the list.
const ROW_HEIGHT: usize = 2;

pub struct App<D> {
    pub panel: Panel<Toasts>,
    channel: CommandChannel<D>,
    runtime: Handle,
    event_tx: mpsc::Sender<Msg>,
    selected: usize,
    pub should_quit: bool,
}

impl<D> App<D>
where
    D: Dispatcher + Clone + 'static,
{
    pub fn new(
        config: &AppConfig,
        channel: CommandChannel<D>,
        runtime: Handle,
        event_tx: mpsc::Sender<Msg>,
    ) -> Self {
        let toasts = Toasts::new(config.panel.max_toasts, config.panel.toast_ttl());

        Self {
            panel: Panel::new(toasts, config.panel.delete_confirm_window()),
            channel,
            runtime,
            event_tx,
            selected: 0,
            should_quit: false,
        }
    }

    // ── MVU: Update ──────────────────────────────────────────────

    pub fn update(&mut self, msg: Msg) -> Result<()> {
        match msg {
            Msg::Key(key) => self.handle_key(key),
            Msg::Panel(panel_msg) => self.dispatch(panel_msg),
            Msg::Tick => self.panel.notifier_mut().prune(Instant::now()),
            Msg::Resize => {}
        }
        Ok(())
    }

    fn dispatch(&mut self, msg: PanelMsg) {
        let reloaded = matches!(msg, PanelMsg::Loaded(Ok(_)));

        if let Some(effect) = self.panel.update(msg) {
            self.spawn_effect(effect);
        }

        if reloaded {
            self.clamp_selection();
        }
    }

    /// Perform the host call off the UI thread; its outcome comes back as a `Msg`.
    fn spawn_effect(&self, effect: Effect) {
        tracing::debug!(?effect, "spawning host call");
        let channel = self.channel.clone();
        let tx = self.event_tx.clone();

        self.runtime.spawn(async move {
            let settled = effect.perform(&channel).await;
            if tx.send(Msg::Panel(settled)).is_err() {
                tracing::debug!("ui loop gone, dropping host result");
            }
        });
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        if self.panel.add_form().visible {
            self.handle_key_add_form(key);
        } else {
            self.handle_key_browse(key);
        }
    }

    fn handle_key_browse(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.move_selection(1),
            KeyCode::Char('k') | KeyCode::Up => self.move_selection(-1),
            KeyCode::Char('r') => self.dispatch(PanelMsg::Refresh),
            KeyCode::Char('a') => self.dispatch(PanelMsg::ShowAddForm),
            KeyCode::Char('u') => {
                if let Some(record) = self.selected_record().filter(|r| r.can_update()) {
                    self.dispatch(PanelMsg::UpdateRequested(record));
                }
            }
            KeyCode::Char('d') => {
                if let Some(record) = self.selected_record() {
                    self.dispatch(PanelMsg::DeleteClicked(record));
                }
            }
            _ => {}
        }
    }

    fn handle_key_add_form(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => self.dispatch(PanelMsg::HideAddForm),
            KeyCode::Enter => self.dispatch(PanelMsg::SubmitAdd),
            KeyCode::Backspace => self.dispatch(PanelMsg::AddUrlBackspace),
            KeyCode::Char(ch)
                if key.modifiers.is_empty() || key.modifiers == KeyModifiers::SHIFT =>
            {
                self.dispatch(PanelMsg::AddUrlInput(ch));
            }
            _ => {}
        }
    }

    fn selected_record(&self) -> Option<RepositoryRecord> {
        self.panel.directory().get(self.selected).cloned()
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.panel.directory().len();
        if len == 0 {
            self.selected = 0;
            return;
        }

        let max = len.saturating_sub(1) as isize;
        self.selected = (self.selected as isize + delta).clamp(0, max) as usize;
    }

    fn clamp_selection(&mut self) {
        self.selected = self
            .selected
            .min(self.panel.directory().len().saturating_sub(1));
    }

    // ── MVU: View ────────────────────────────────────────────────

    pub fn view(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // title bar
                Constraint::Min(1),    // body
                Constraint::Length(1), // status bar
            ])
            .split(frame.area());

        self.render_title_bar(frame, chunks[0]);
        self.render_repositories(frame, chunks[1]);
        self.render_status_bar(frame, chunks[2]);

        if self.panel.add_form().visible {
            self.render_add_overlay(frame);
        }
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let count = self
            .panel
            .directory()
            .records()
            .map(|records| format!(" ({})", records.len()))
            .unwrap_or_default();

        let title = Line::from(vec![
            Span::styled(
                format!(" Image Repositories{count} "),
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                " a add  u update  d delete  r reload  q quit ",
                Style::default().fg(Color::Gray),
            ),
        ]);

        frame.render_widget(
            Paragraph::new(title).style(Style::default().bg(Color::Rgb(12, 12, 18))),
            area,
        );
    }

    fn render_repositories(&self, frame: &mut Frame, area: Rect) {
        let Some(records) = self.panel.directory().records() else {
            render_placeholder(frame, area, "Loading repositories…");
            return;
        };

        if records.is_empty() {
            render_placeholder(frame, area, "No Repositories Added");
            return;
        }

        let visible = (area.height as usize / ROW_HEIGHT).max(1);
        let top = self.selected.saturating_sub(visible - 1);

        let lines: Vec<Line> = records
            .iter()
            .enumerate()
            .skip(top)
            .take(visible)
            .flat_map(|(idx, record)| self.record_lines(record, idx == self.selected))
            .collect();

        frame.render_widget(Paragraph::new(lines), area);
    }

    fn record_lines(&self, record: &RepositoryRecord, selected: bool) -> [Line<'static>; ROW_HEIGHT] {
        let name_style = if selected {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD)
        };

        let mut header = vec![Span::styled(format!(" {} ", record.name), name_style)];
        if let Some(description) = record.description.as_deref().filter(|d| !d.is_empty()) {
            header.push(Span::styled(
                format!(" {description}"),
                Style::default().fg(Color::Gray),
            ));
        }
        if self.panel.is_refreshing(&record.path) {
            header.push(Span::styled(
                "  refreshing…",
                Style::default().fg(Color::Yellow),
            ));
        }
        if self.panel.is_delete_armed(&record.path) {
            header.push(Span::styled(
                "  press d again to delete",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            ));
        }

        let source = record
            .update_url
            .clone()
            .unwrap_or_else(|| "no update URL".to_string());
        let detail = Line::from(Span::styled(
            format!(
                "   updated {} · {source}",
                record.last_updated_display()
            ),
            Style::default().fg(Color::DarkGray),
        ));

        [Line::from(header), detail]
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let (label, label_bg) = if self.panel.add_form().visible {
            ("ADD", Color::Cyan)
        } else {
            ("BROWSE", Color::Magenta)
        };

        let mode_span = Span::styled(
            format!(" {label} "),
            Style::default()
                .fg(Color::Black)
                .bg(label_bg)
                .add_modifier(Modifier::BOLD),
        );

        let info = match self.panel.notifier().latest() {
            Some(toast) => {
                let fg = match toast.level {
                    ToastLevel::Success => Color::Green,
                    ToastLevel::Error => Color::Red,
                };
                Span::styled(
                    format!(" {}: {} ", toast.title, toast.message),
                    Style::default().fg(fg).bg(Color::DarkGray),
                )
            }
            None => Span::styled(
                format!(" {} ", self.selected_summary()),
                Style::default().fg(Color::Gray).bg(Color::DarkGray),
            ),
        };

        let bar = Line::from(vec![mode_span, info]);
        let status = Paragraph::new(bar).style(Style::default().bg(Color::DarkGray));
        frame.render_widget(status, area);
    }

    fn selected_summary(&self) -> String {
        match self.panel.directory().get(self.selected) {
            Some(record) => record.path.clone(),
            None => String::new(),
        }
    }

    fn render_add_overlay(&self, frame: &mut Frame) {
        let area = centered_rect(70, 30, frame.area());
        frame.render_widget(Clear, area);

        let form = self.panel.add_form();
        let footer = if form.submitting {
            Span::styled("Adding…", Style::default().fg(Color::Yellow))
        } else {
            Span::styled(
                "Enter to add · Esc to cancel",
                Style::default().fg(Color::DarkGray),
            )
        };

        let body = Paragraph::new(vec![
            Line::from(format!("> {}", form.url)),
            Line::from(""),
            Line::from(Span::styled(
                "Paste a URL to an image repository JSON file.",
                Style::default().fg(Color::Gray),
            )),
            Line::from(footer),
        ])
        .wrap(Wrap { trim: false })
        .block(
            Block::default()
                .title(" Add Image Repository ")
                .borders(Borders::ALL)
                .style(Style::default().bg(Color::Rgb(15, 15, 24))),
        );
        frame.render_widget(body, area);

        if !form.submitting {
            let typed = u16::try_from(form.url.chars().count()).unwrap_or(u16::MAX);
            let cursor_x = area.x.saturating_add(3).saturating_add(typed);
            let cursor_y = area.y + 1;
            frame.set_cursor_position((cursor_x.min(area.right().saturating_sub(2)), cursor_y));
        }
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect, text: &str) {
    let area = centered_rect(60, 20, area);
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            text.to_string(),
            Style::default().fg(Color::DarkGray),
        )))
        .alignment(ratatui::layout::Alignment::Center),
        area,
    );
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
