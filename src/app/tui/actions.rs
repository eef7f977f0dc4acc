use std::time::Duration;

use crossterm::event::{KeyCode, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

use crate::catalog::Episode;
use crate::player::{BarGeometry, Focus, Key, KeyValueStore, MediaSink, PlaybackController};

use super::WatchView;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(super) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(super) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

fn player_key(code: KeyCode) -> Key {
    match code {
        KeyCode::Char(' ') => Key::Space,
        KeyCode::Char(c) => Key::Char(c),
        KeyCode::Left => Key::Left,
        KeyCode::Right => Key::Right,
        _ => Key::Other,
    }
}

/// Accepts a 1-based episode number or an exact chapter id.
pub(crate) fn resolve_episode_input(input: &str, episodes: &[Episode]) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Some(episode) = episodes.iter().find(|ep| ep.chapter_id == input) {
        return Some(episode.chapter_id.clone());
    }
    let number = input.parse::<usize>().ok()?;
    episodes
        .get(number.checked_sub(1)?)
        .map(|ep| ep.chapter_id.clone())
}

fn cycle(index: usize, len: usize, forward: bool) -> usize {
    if len == 0 {
        return 0;
    }
    if forward {
        (index + 1) % len
    } else {
        (index + len - 1) % len
    }
}

pub(crate) fn handle_key_event<S: MediaSink, K: KeyValueStore>(
    controller: &mut PlaybackController<S, K>,
    view: &mut WatchView,
    code: KeyCode,
    now: Duration,
) -> Flow {
    let focus = if view.prompt.is_some() {
        Focus::TextInput
    } else {
        Focus::Player
    };
    if controller.handle_key(player_key(code), focus, now) {
        return Flow::Continue;
    }

    if view.prompt.is_some() {
        handle_prompt_key(controller, view, code, now);
        return Flow::Continue;
    }

    let snapshot = controller.snapshot();
    if let Some(cursor) = view.quality_menu {
        let count = snapshot.qualities.len();
        match code {
            KeyCode::Char('q') | KeyCode::Down => {
                view.quality_menu = Some(cycle(cursor, count, true));
            }
            KeyCode::Up => view.quality_menu = Some(cycle(cursor, count, false)),
            KeyCode::Enter => {
                view.quality_menu = None;
                if let Some(&tier) = snapshot.qualities.get(cursor) {
                    view.status = if controller.change_quality(tier, now) {
                        status_info(&format!("Switching to {tier}p..."))
                    } else {
                        status_info(&format!("Already playing {tier}p."))
                    };
                }
            }
            KeyCode::Esc => view.quality_menu = None,
            _ => {}
        }
        return Flow::Continue;
    }

    if snapshot.episode_list_open {
        let count = controller.episodes().len();
        match code {
            KeyCode::Up => view.episode_cursor = view.episode_cursor.saturating_sub(1),
            KeyCode::Down => {
                view.episode_cursor = (view.episode_cursor + 1).min(count.saturating_sub(1));
            }
            KeyCode::Enter => {
                let target = controller
                    .episodes()
                    .get(view.episode_cursor)
                    .map(|ep| ep.chapter_id.clone());
                if let Some(chapter_id) = target {
                    controller.select_episode(&chapter_id, now);
                }
            }
            KeyCode::Esc | KeyCode::Char('e') => controller.toggle_episode_list(),
            _ => {}
        }
        return Flow::Continue;
    }

    match code {
        KeyCode::Char('e') => {
            if snapshot.episode_count == 0 {
                view.status = status_error("No episodes to list.");
            } else {
                view.episode_cursor = snapshot.episode_index.unwrap_or(0);
                controller.toggle_episode_list();
            }
        }
        KeyCode::Char('q') => {
            if snapshot.qualities.is_empty() {
                view.status = status_error("No qualities available for this episode.");
            } else {
                let selected = snapshot
                    .selected_quality
                    .and_then(|tier| snapshot.qualities.iter().position(|q| *q == tier))
                    .unwrap_or(0);
                view.quality_menu = Some(selected);
            }
        }
        KeyCode::Char('n') => {
            if !controller.select_next(now) {
                view.status = status_info("This is the last episode.");
            }
        }
        KeyCode::Char('g') => {
            if snapshot.episode_count > 0 {
                view.prompt = Some(String::new());
            }
        }
        KeyCode::Esc | KeyCode::Char('x') => return Flow::Quit,
        _ => {}
    }
    Flow::Continue
}

fn handle_prompt_key<S: MediaSink, K: KeyValueStore>(
    controller: &mut PlaybackController<S, K>,
    view: &mut WatchView,
    code: KeyCode,
    now: Duration,
) {
    match code {
        KeyCode::Esc => {
            view.prompt = None;
            view.status = status_info("Go to canceled.");
        }
        KeyCode::Enter => {
            let input = view.prompt.take().unwrap_or_default();
            match resolve_episode_input(&input, controller.episodes()) {
                Some(chapter_id) => {
                    controller.select_episode(&chapter_id, now);
                }
                None => {
                    view.status = status_error(&format!("No episode matches \"{}\".", input.trim()));
                }
            }
        }
        KeyCode::Backspace => {
            if let Some(input) = view.prompt.as_mut() {
                input.pop();
            }
        }
        KeyCode::Char(c) => {
            if let Some(input) = view.prompt.as_mut() {
                input.push(c);
            }
        }
        _ => {}
    }
}

fn contains(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x
        && column < rect.x.saturating_add(rect.width)
        && row >= rect.y
        && row < rect.y.saturating_add(rect.height)
}

/// The gauge inside the progress panel's borders.
pub(crate) fn bar_geometry(panel: Rect) -> BarGeometry {
    BarGeometry {
        left: f64::from(panel.x.saturating_add(1)),
        width: f64::from(panel.width.saturating_sub(2)),
    }
}

pub(crate) fn handle_mouse_event<S: MediaSink, K: KeyValueStore>(
    controller: &mut PlaybackController<S, K>,
    view: &mut WatchView,
    mouse: MouseEvent,
    now: Duration,
) {
    let layout = view.layout;
    let (column, row) = (mouse.column, mouse.row);
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if contains(layout.progress, column, row) {
                controller.drag_begin(f64::from(column), bar_geometry(layout.progress));
            } else if contains(layout.video, column, row) {
                controller.tap(
                    f64::from(column - layout.video.x),
                    f64::from(layout.video.width),
                    now,
                );
            }
        }
        MouseEventKind::Drag(MouseButton::Left) => {
            controller.drag_move(f64::from(column), bar_geometry(layout.progress));
        }
        MouseEventKind::Up(MouseButton::Left) => controller.drag_end(now),
        MouseEventKind::Moved => {
            let inside = contains(layout.video, column, row) || contains(layout.progress, column, row);
            if inside {
                controller.pointer_enter();
            } else if view.pointer_inside {
                controller.pointer_leave(now);
            }
            view.pointer_inside = inside;
        }
        _ => {}
    }
}
