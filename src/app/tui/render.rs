use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Cell, Clear, Gauge, Padding, Paragraph, Row, Table, TableState,
    Wrap,
};

use crate::catalog::Episode;
use crate::player::{SessionStatus, Side, Snapshot};

use super::super::format::{format_clock, progress_ratio, truncate};
use super::WatchView;

/// Screen regions that take pointer input, kept from the last frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct WatchLayout {
    pub(crate) video: Rect,
    pub(crate) progress: Rect,
}

pub(super) fn draw_watch(
    frame: &mut Frame,
    snapshot: &Snapshot,
    episodes: &[Episode],
    view: &WatchView,
) -> WatchLayout {
    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(header(snapshot, view), chunks[0]);
    frame.render_widget(video_panel(snapshot), chunks[1]);
    render_progress(frame, snapshot, chunks[2]);

    let controls = Paragraph::new(controls_line(snapshot))
        .alignment(Alignment::Center)
        .block(panel_block("Controls"));
    frame.render_widget(controls, chunks[3]);

    let status_widget = Paragraph::new(view.status.clone())
        .style(status_style(&view.status))
        .block(panel_block("Status"));
    frame.render_widget(status_widget, chunks[4]);

    if let Some(input) = &view.prompt {
        let text = format!(
            "Episode number or chapter id:\n\n> {input}_\n\n[Enter] Go   [Esc] Cancel"
        );
        render_modal(frame, &text, "Go To Episode");
    } else if let Some(cursor) = view.quality_menu {
        render_quality_menu(frame, snapshot, cursor);
    } else if snapshot.episode_list_open {
        render_episode_list(frame, snapshot, episodes, view.episode_cursor);
    } else if snapshot.stats_open {
        render_modal(frame, &stats_text(snapshot), "Stats");
    }

    WatchLayout {
        video: chunks[1],
        progress: chunks[2],
    }
}

fn header(snapshot: &Snapshot, view: &WatchView) -> Paragraph<'static> {
    let episode_text = match (snapshot.episode_index, &snapshot.episode_name) {
        (Some(index), Some(name)) => format!(
            "EP {}/{}  {}",
            index + 1,
            snapshot.episode_count,
            truncate(name, 40)
        ),
        _ => "-".to_string(),
    };
    let quality_text = snapshot
        .selected_quality
        .map(|tier| format!("{tier}p"))
        .unwrap_or_else(|| "no video".to_string());

    Paragraph::new(Line::from(vec![
        Span::styled(
            "DRAMAWATCH",
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(
            truncate(&view.content_id, 24),
            Style::default().fg(Color::Rgb(185, 195, 210)),
        ),
        Span::styled("   ", Style::default()),
        Span::styled(episode_text, Style::default().fg(Color::Rgb(230, 230, 230))),
        Span::styled("   ", Style::default()),
        Span::styled(quality_text, Style::default().fg(Color::Yellow)),
    ]))
    .alignment(Alignment::Center)
    .block(panel_block("Now Watching"))
}

fn video_panel(snapshot: &Snapshot) -> Paragraph<'static> {
    let muted_style = Style::default().fg(Color::Rgb(185, 195, 210));
    let mut lines = vec![Line::from("")];

    match snapshot.status {
        SessionStatus::Loading => lines.push(Line::styled("Loading episodes...", muted_style)),
        SessionStatus::NoContent => lines.push(Line::styled(
            "No episodes available",
            Style::default()
                .fg(Color::Rgb(255, 145, 120))
                .add_modifier(Modifier::BOLD),
        )),
        SessionStatus::Ready if !snapshot.video_available => lines.push(Line::styled(
            "Video not available",
            Style::default()
                .fg(Color::Rgb(255, 145, 120))
                .add_modifier(Modifier::BOLD),
        )),
        SessionStatus::Ready => {
            let state = if let Some(err) = &snapshot.load_error {
                Line::styled(
                    format!("Playback error: {}", truncate(err, 60)),
                    Style::default().fg(Color::Rgb(255, 145, 120)),
                )
            } else if snapshot.switching_quality {
                Line::styled("Switching quality...", muted_style)
            } else if snapshot.playing {
                Line::styled(
                    "▶  PLAYING",
                    Style::default()
                        .fg(Color::Rgb(130, 190, 255))
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                Line::styled(
                    "❚❚  PAUSED",
                    Style::default()
                        .fg(Color::Rgb(230, 235, 242))
                        .add_modifier(Modifier::BOLD),
                )
            };
            lines.push(state);
            lines.push(Line::from(""));
            lines.push(Line::styled(cue_text(snapshot.cue), Style::default().fg(Color::Yellow)));
            if let Some(next) = &snapshot.next_episode {
                lines.push(Line::from(""));
                lines.push(Line::styled(
                    format!(
                        "Up next: {}  in {}s   [n] play now",
                        truncate(&next.name, 40),
                        next.countdown_secs
                    ),
                    Style::default().fg(Color::Rgb(205, 165, 255)),
                ));
            }
        }
    }

    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(panel_block("Video"))
}

fn cue_text(cue: Option<Side>) -> String {
    match cue {
        Some(Side::Left) => "«  5s".to_string(),
        Some(Side::Right) => "5s  »".to_string(),
        None => String::new(),
    }
}

fn render_progress(frame: &mut Frame, snapshot: &Snapshot, area: Rect) {
    let ratio = progress_ratio(snapshot.current_time, snapshot.duration);
    let label = if snapshot.controls_visible() || snapshot.dragging {
        format!(
            "{} / {}",
            format_clock(snapshot.current_time),
            format_clock(snapshot.duration)
        )
    } else {
        String::new()
    };
    let fg = if snapshot.controls_visible() {
        Color::Rgb(130, 190, 255)
    } else {
        Color::Rgb(72, 82, 96)
    };
    let gauge = Gauge::default()
        .block(panel_block("Progress"))
        .gauge_style(
            Style::default()
                .fg(fg)
                .bg(Color::Black)
                .add_modifier(Modifier::BOLD),
        )
        .label(label)
        .ratio(ratio);
    frame.render_widget(gauge, area);
}

fn pill(text: String, active: bool) -> Span<'static> {
    let style = if active {
        pill_active()
    } else {
        pill_inactive()
    };
    Span::styled(text, style)
}

fn controls_line(snapshot: &Snapshot) -> Line<'static> {
    let hint_style = Style::default().fg(Color::Rgb(185, 195, 210));
    if !snapshot.controls_visible() {
        return Line::styled("move the mouse or press space to show controls", hint_style);
    }

    let play = if snapshot.playing {
        " ❚❚ PAUSE "
    } else {
        " ▶ PLAY "
    };
    let quality = snapshot
        .selected_quality
        .map(|tier| format!(" {tier}p "))
        .unwrap_or_else(|| " -- ".to_string());
    Line::from(vec![
        pill(play.to_string(), true),
        Span::styled(" ", Style::default()),
        pill(" MUTE ".to_string(), snapshot.muted),
        Span::styled(" ", Style::default()),
        pill(" FULL ".to_string(), snapshot.fullscreen),
        Span::styled(" ", Style::default()),
        pill(quality, false),
        Span::styled(
            "   ←/→ seek  f full  m mute  e episodes  q quality  i stats  n next  g go to  Esc quit",
            hint_style,
        ),
    ])
}

fn render_quality_menu(frame: &mut Frame, snapshot: &Snapshot, cursor: usize) {
    let mut text = String::from("Select quality\n");
    for (idx, tier) in snapshot.qualities.iter().enumerate() {
        let marker = if idx == cursor { "▸" } else { " " };
        let current = if Some(*tier) == snapshot.selected_quality {
            "  (current)"
        } else {
            ""
        };
        text.push_str(&format!("\n{marker} {tier}p{current}"));
    }
    text.push_str("\n\n[q/↓] Next   [Enter] Apply   [Esc] Close");
    render_modal(frame, &text, "Quality");
}

fn render_episode_list(frame: &mut Frame, snapshot: &Snapshot, episodes: &[Episode], cursor: usize) {
    let area = centered_fixed_rect(
        72.min(frame.area().width.saturating_sub(4)),
        frame.area().height.saturating_sub(6).max(6),
        frame.area(),
    );
    render_popup_shadow(frame, area);
    frame.render_widget(Clear, area);

    let rows: Vec<Row> = episodes
        .iter()
        .enumerate()
        .map(|(idx, episode)| {
            let playing = if Some(idx) == snapshot.episode_index {
                "▶"
            } else {
                ""
            };
            let tiers = episode.renditions().len();
            Row::new(vec![
                Cell::from(format!("{}", idx + 1)),
                Cell::from(truncate(&episode.display_name(), 40)),
                Cell::from(if tiers == 0 {
                    "no video".to_string()
                } else {
                    format!("{tiers} quality")
                }),
                Cell::from(playing),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(20),
            Constraint::Length(12),
            Constraint::Length(2),
        ],
    )
    .header(
        Row::new(vec!["#", "Episode", "Video", ""]).style(
            Style::default()
                .fg(Color::Rgb(110, 170, 255))
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(modal_block("Episodes  [↑/↓] Move  [Enter] Play  [Esc] Close"))
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(110, 170, 255))
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");

    let mut state = TableState::default();
    state.select((!episodes.is_empty()).then_some(cursor.min(episodes.len().saturating_sub(1))));
    frame.render_stateful_widget(table, area, &mut state);
}

fn stats_text(snapshot: &Snapshot) -> String {
    format!(
        "Source\n{}\n\nQuality\n{}\n\nPosition\n{} / {}\n\nMuted {}   Fullscreen {}\n\nPress i to close.",
        snapshot
            .source_url
            .as_deref()
            .map(|url| truncate(url, 56))
            .unwrap_or_else(|| "-".to_string()),
        snapshot
            .selected_quality
            .map(|tier| format!("{tier}p of {:?}", snapshot.qualities))
            .unwrap_or_else(|| "-".to_string()),
        format_clock(snapshot.current_time),
        format_clock(snapshot.duration),
        if snapshot.muted { "yes" } else { "no" },
        if snapshot.fullscreen { "yes" } else { "no" },
    )
}

fn render_modal(frame: &mut Frame, text: &str, title: &'static str) {
    let popup_area = popup_rect_for_text(frame.area(), text);
    render_popup_shadow(frame, popup_area);
    frame.render_widget(Clear, popup_area);
    let popup = Paragraph::new(text.to_string())
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(modal_block(title));
    frame.render_widget(popup, popup_area);
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn modal_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(
            Style::default()
                .fg(Color::Rgb(160, 190, 235))
                .add_modifier(Modifier::BOLD),
        )
        .title(title)
        .padding(Padding::new(2, 2, 1, 1))
}

fn pill_active() -> Style {
    Style::default()
        .bg(Color::Rgb(110, 170, 255))
        .fg(Color::Black)
        .add_modifier(Modifier::BOLD)
}

fn pill_inactive() -> Style {
    Style::default()
        .bg(Color::Rgb(72, 82, 96))
        .fg(Color::Rgb(230, 235, 242))
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let clamped_width = width.min(area.width.max(1));
    let clamped_height = height.min(area.height.max(1));
    let x = area.x + area.width.saturating_sub(clamped_width) / 2;
    let y = area.y + area.height.saturating_sub(clamped_height) / 2;
    Rect::new(x, y, clamped_width, clamped_height)
}

fn render_popup_shadow(frame: &mut Frame, popup_area: Rect) {
    let area = frame.area();
    let shadow = Rect::new(
        (popup_area.x + 1).min(area.x + area.width.saturating_sub(1)),
        (popup_area.y + 1).min(area.y + area.height.saturating_sub(1)),
        popup_area.width.saturating_sub(1),
        popup_area.height.saturating_sub(1),
    );
    if shadow.width == 0 || shadow.height == 0 {
        return;
    }
    let shadow_block = Block::default().style(Style::default().bg(Color::Rgb(14, 16, 24)));
    frame.render_widget(shadow_block, shadow);
}

fn popup_rect_for_text(area: Rect, text: &str) -> Rect {
    let max_line_width = text
        .lines()
        .map(|line| line.chars().count() as u16)
        .max()
        .unwrap_or(0);
    let line_count = text.lines().count() as u16;

    let available_width = area.width.saturating_sub(2).max(1);
    let min_width = 40.min(available_width);
    let max_width = 72.min(available_width);
    let desired_width = max_line_width.saturating_add(8);
    let width = desired_width.clamp(min_width, max_width);

    let available_height = area.height.saturating_sub(2).max(1);
    let min_height = 8.min(available_height);
    let max_height = 22.min(available_height);
    let desired_height = line_count.saturating_add(4);
    let height = desired_height.clamp(min_height, max_height);

    centered_fixed_rect(width, height, area)
}
