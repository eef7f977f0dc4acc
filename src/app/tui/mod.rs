mod actions;
mod render;
mod session;

use std::io;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyEventKind};
use log::info;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::catalog::CatalogClient;
use crate::config::Config;
use crate::db::Database;
#[cfg(unix)]
use crate::player::MpvSink;
use crate::player::{MediaSink, PlaybackController, SessionStatus};

pub(crate) use self::actions::{Flow, handle_key_event, handle_mouse_event};
#[cfg(test)]
pub(crate) use self::actions::{bar_geometry, resolve_episode_input};
use self::actions::{status_error, status_info};
pub(crate) use self::render::WatchLayout;
use self::render::draw_watch;
use self::session::TuiSession;

const TICK: Duration = Duration::from_millis(200);

/// View-only state of the watch screen. Playback state lives in the
/// controller; this holds cursors, the prompt and the last layout.
#[derive(Debug, Clone, Default)]
pub(crate) struct WatchView {
    pub(crate) content_id: String,
    pub(crate) status: String,
    pub(crate) episode_cursor: usize,
    pub(crate) quality_menu: Option<usize>,
    pub(crate) prompt: Option<String>,
    pub(crate) pointer_inside: bool,
    pub(crate) layout: WatchLayout,
}

impl WatchView {
    pub(crate) fn new(content_id: &str) -> Self {
        Self {
            content_id: content_id.to_string(),
            status: status_info("Loading episodes..."),
            ..Self::default()
        }
    }
}

/// Starts mpv before taking over the terminal so a launch failure is
/// reported on a normal screen.
#[cfg(unix)]
pub(crate) fn run_watch(
    config: &Config,
    store: Option<Database>,
    content_id: &str,
    initial_episode: Option<&str>,
) -> Result<()> {
    let sink = MpvSink::spawn(&config.player.mpv_path, &config.player.mpv_args)?;
    watch_loop(config, sink, store, content_id, initial_episode)
}

#[cfg(not(unix))]
pub(crate) fn run_watch(
    _config: &Config,
    _store: Option<Database>,
    _content_id: &str,
    _initial_episode: Option<&str>,
) -> Result<()> {
    anyhow::bail!("the watch view drives mpv over a Unix socket and is not available on this platform")
}

#[cfg_attr(not(unix), allow(dead_code))]
fn watch_loop<S: MediaSink>(
    config: &Config,
    sink: S,
    store: Option<Database>,
    content_id: &str,
    initial_episode: Option<&str>,
) -> Result<()> {
    let mut controller =
        PlaybackController::new(content_id, sink, store, config.player.to_settings());
    let client = CatalogClient::new(config);

    let mut session = TuiSession::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))
        .context("failed to initialize terminal backend")?;
    terminal.clear()?;

    let started = Instant::now();
    let mut view = WatchView::new(content_id);
    let snapshot = controller.snapshot();
    let mut layout = view.layout;
    terminal.draw(|frame| {
        layout = draw_watch(frame, &snapshot, controller.episodes(), &view);
    })?;
    view.layout = layout;

    controller.load_episodes(&client, initial_episode, started.elapsed());
    view.status = match controller.snapshot().status {
        SessionStatus::NoContent => status_error("No episodes available. Press Esc to quit."),
        _ => status_info("Playing in the mpv window. Space play/pause, e episodes, q quality, g go to."),
    };

    loop {
        controller.pump(started.elapsed());
        let snapshot = controller.snapshot();
        if controller.take_scroll_request() {
            view.episode_cursor = snapshot.episode_index.unwrap_or(0);
            if let Some(name) = &snapshot.episode_name {
                view.status = status_info(&format!("Now watching {name}."));
            }
        }

        let mut layout = view.layout;
        terminal.draw(|frame| {
            layout = draw_watch(frame, &snapshot, controller.episodes(), &view);
        })?;
        view.layout = layout;

        if !event::poll(poll_timeout(controller.next_deadline(), started.elapsed()))? {
            continue;
        }

        let now = started.elapsed();
        let flow = match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                handle_key_event(&mut controller, &mut view, key.code, now)
            }
            Event::Mouse(mouse) => {
                handle_mouse_event(&mut controller, &mut view, mouse, now);
                Flow::Continue
            }
            _ => Flow::Continue,
        };
        if flow == Flow::Quit {
            break;
        }
    }

    controller.teardown();
    info!("watch view closed for {content_id}");
    terminal.show_cursor()?;
    session.leave()?;
    Ok(())
}

/// Waits at most one tick, less when a session timer is due sooner.
pub(crate) fn poll_timeout(next_deadline: Option<Duration>, now: Duration) -> Duration {
    next_deadline
        .map(|deadline| deadline.saturating_sub(now).min(TICK))
        .unwrap_or(TICK)
}
