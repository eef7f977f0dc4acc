//! mpv as the media element, driven over its JSON IPC socket.
//!
//! mpv runs in its own window with the terminal detached, starts idle and
//! paused, and keeps the last frame open at end of file so `eof-reached`
//! can be observed. Property changes come back as lines on the socket and
//! are folded into [`MediaEvent`]s on each poll.

use std::env;
use std::fs;
use std::io::{self, BufRead, BufReader, ErrorKind, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use log::{debug, info, warn};
use serde_json::{Value, json};

use super::clamp_seek;
use super::media::{MediaError, MediaEvent, MediaSink};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const CONNECT_RETRY: Duration = Duration::from_millis(50);
const OBSERVED: [&str; 5] = ["time-pos", "duration", "pause", "eof-reached", "fullscreen"];

/// What mpv last reported, plus the bookkeeping to tell the current file's
/// messages from a file it is replacing.
#[derive(Debug)]
struct PlayerState {
    attached: bool,
    /// `loadfile` commands sent whose `start-file` has not arrived yet.
    awaiting_start: u32,
    file_loaded: bool,
    has_data: bool,
    position: f64,
    duration: f64,
    paused: bool,
    eof: bool,
    fullscreen: bool,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            attached: false,
            awaiting_start: 0,
            file_loaded: false,
            has_data: false,
            position: 0.0,
            duration: f64::NAN,
            paused: true,
            eof: false,
            fullscreen: false,
        }
    }
}

impl PlayerState {
    /// A new source starts paused, without a `Pause` event.
    fn begin_load(&mut self) {
        self.attached = true;
        self.paused = true;
        self.awaiting_start += 1;
        self.file_loaded = false;
        self.has_data = false;
        self.position = 0.0;
        self.duration = f64::NAN;
        self.eof = false;
    }

    fn detach(&mut self) {
        self.attached = false;
        self.file_loaded = false;
        self.has_data = false;
        self.position = 0.0;
        self.duration = f64::NAN;
        self.eof = false;
    }

    fn is_current(&self) -> bool {
        self.attached && self.awaiting_start == 0
    }

    /// Folds one IPC message into the state and returns the events it raises.
    fn apply(&mut self, msg: &Value) -> Vec<MediaEvent> {
        match msg.get("event").and_then(Value::as_str) {
            Some("property-change") => {
                let name = msg.get("name").and_then(Value::as_str).unwrap_or_default();
                self.apply_property(name, msg.get("data").unwrap_or(&Value::Null))
            }
            Some("start-file") => {
                self.awaiting_start = self.awaiting_start.saturating_sub(1);
                Vec::new()
            }
            Some("file-loaded") if self.is_current() => {
                self.file_loaded = true;
                self.ready_events()
            }
            // Duration can still be unknown at `file-loaded` for some streams;
            // the first restart means the file is seekable either way.
            Some("playback-restart") if self.is_current() && self.file_loaded && !self.has_data => {
                self.has_data = true;
                vec![MediaEvent::LoadedMetadata, MediaEvent::LoadedData]
            }
            Some("end-file") if self.is_current() => {
                if msg.get("reason").and_then(Value::as_str) != Some("error") {
                    return Vec::new();
                }
                let message = msg
                    .get("file_error")
                    .and_then(Value::as_str)
                    .unwrap_or("playback failed")
                    .to_string();
                self.file_loaded = false;
                self.has_data = false;
                vec![MediaEvent::Error(message)]
            }
            Some(_) => Vec::new(),
            None => {
                if let Some(error) = msg.get("error").and_then(Value::as_str)
                    && error != "success"
                {
                    debug!("mpv request {} failed: {error}", msg["request_id"]);
                }
                Vec::new()
            }
        }
    }

    fn apply_property(&mut self, name: &str, data: &Value) -> Vec<MediaEvent> {
        match name {
            "time-pos" => match data.as_f64() {
                Some(pos) if self.is_current() => {
                    self.position = pos.max(0.0);
                    if self.has_data {
                        vec![MediaEvent::TimeUpdate]
                    } else {
                        Vec::new()
                    }
                }
                _ => Vec::new(),
            },
            "duration" => {
                if !self.is_current() {
                    return Vec::new();
                }
                self.duration = data.as_f64().unwrap_or(f64::NAN);
                self.ready_events()
            }
            "pause" => match data.as_bool() {
                Some(paused) if paused != self.paused => {
                    self.paused = paused;
                    if !self.attached {
                        Vec::new()
                    } else if paused {
                        vec![MediaEvent::Pause]
                    } else {
                        vec![MediaEvent::Play]
                    }
                }
                _ => Vec::new(),
            },
            "eof-reached" => {
                let reached = data.as_bool().unwrap_or(false);
                let newly = reached && !self.eof;
                self.eof = reached;
                if newly && self.is_current() && self.file_loaded {
                    if self.duration.is_finite() {
                        self.position = self.duration;
                    }
                    vec![MediaEvent::Ended]
                } else {
                    Vec::new()
                }
            }
            "fullscreen" => {
                if let Some(fullscreen) = data.as_bool() {
                    self.fullscreen = fullscreen;
                }
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Data is announced once per file, when it is loaded and its duration
    /// is known.
    fn ready_events(&mut self) -> Vec<MediaEvent> {
        if self.file_loaded
            && !self.has_data
            && self.duration.is_finite()
            && self.duration > 0.0
        {
            self.has_data = true;
            vec![MediaEvent::LoadedMetadata, MediaEvent::LoadedData]
        } else {
            Vec::new()
        }
    }
}

/// A [`MediaSink`] backed by an mpv process.
pub(crate) struct MpvSink {
    child: Option<Child>,
    socket_path: Option<PathBuf>,
    reader: BufReader<UnixStream>,
    writer: UnixStream,
    partial: Vec<u8>,
    request_id: u64,
    state: PlayerState,
    source: Option<String>,
    queued: Vec<MediaEvent>,
    closed: bool,
}

impl MpvSink {
    /// Launches `program` idle and paused and connects to its IPC socket.
    pub(crate) fn spawn(program: &str, extra_args: &[String]) -> Result<Self> {
        let socket_path =
            env::temp_dir().join(format!("dramawatch-mpv-{}.sock", std::process::id()));
        let _ = fs::remove_file(&socket_path);

        let mut cmd = Command::new(program);
        cmd.arg(format!("--input-ipc-server={}", socket_path.display()))
            .args([
                "--idle=yes",
                "--force-window=yes",
                "--keep-open=yes",
                "--pause=yes",
                "--no-terminal",
            ])
            .args(extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to launch {program}; is mpv installed?"))?;
        let stream = match connect(&socket_path, &mut child) {
            Ok(stream) => stream,
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(err.context(format!("{program} did not open its IPC socket")));
            }
        };

        let mut sink = Self::from_stream(stream)?;
        sink.child = Some(child);
        sink.socket_path = Some(socket_path);
        for (id, property) in OBSERVED.iter().enumerate() {
            sink.send(json!(["observe_property", id + 1, property]))
                .with_context(|| format!("failed to observe {property}"))?;
        }
        info!("started {program} for playback");
        Ok(sink)
    }

    fn from_stream(stream: UnixStream) -> Result<Self> {
        stream
            .set_nonblocking(true)
            .context("failed to make the mpv socket non-blocking")?;
        let writer = stream
            .try_clone()
            .context("failed to clone the mpv socket")?;
        Ok(Self {
            child: None,
            socket_path: None,
            reader: BufReader::new(stream),
            writer,
            partial: Vec::new(),
            request_id: 1,
            state: PlayerState::default(),
            source: None,
            queued: Vec::new(),
            closed: false,
        })
    }

    fn send(&mut self, command: Value) -> io::Result<()> {
        let line = json!({ "command": command, "request_id": self.request_id });
        self.request_id += 1;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()
    }

    fn set_property(&mut self, name: &str, value: Value) -> io::Result<()> {
        self.send(json!(["set_property", name, value]))
    }

    fn read_messages(&mut self, events: &mut Vec<MediaEvent>) {
        while !self.closed {
            match self.reader.read_until(b'\n', &mut self.partial) {
                Ok(0) => self.mark_closed(events, "mpv closed its IPC connection".to_string()),
                Ok(_) if self.partial.last() != Some(&b'\n') => {}
                Ok(_) => {
                    let line = std::mem::take(&mut self.partial);
                    match serde_json::from_slice::<Value>(&line) {
                        Ok(msg) => events.extend(self.state.apply(&msg)),
                        Err(err) => debug!("ignoring malformed mpv message: {err}"),
                    }
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => self.mark_closed(events, format!("mpv IPC read failed: {err}")),
            }
        }
    }

    fn check_process(&mut self, events: &mut Vec<MediaEvent>) {
        if self.closed {
            return;
        }
        let exited = match self.child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => Some(format!("mpv exited ({status})")),
            Some(Err(err)) => Some(format!("could not query mpv: {err}")),
            _ => None,
        };
        if let Some(message) = exited {
            self.mark_closed(events, message);
        }
    }

    fn mark_closed(&mut self, events: &mut Vec<MediaEvent>, message: String) {
        warn!("{message}");
        self.closed = true;
        self.state.detach();
        events.push(MediaEvent::Error(message));
    }
}

fn connect(path: &Path, child: &mut Child) -> Result<UnixStream> {
    let deadline = Instant::now() + CONNECT_TIMEOUT;
    loop {
        if let Some(status) = child.try_wait()? {
            bail!("player exited early ({status})");
        }
        match UnixStream::connect(path) {
            Ok(stream) => return Ok(stream),
            Err(err) if Instant::now() >= deadline => {
                return Err(err).with_context(|| format!("could not connect to {}", path.display()));
            }
            Err(_) => thread::sleep(CONNECT_RETRY),
        }
    }
}

impl MediaSink for MpvSink {
    fn load(&mut self, url: &str) {
        self.state.begin_load();
        self.source = Some(url.to_string());
        debug!("loading {url}");
        let sent = self
            .set_property("pause", json!(true))
            .and_then(|()| self.send(json!(["loadfile", url, "replace"])));
        if let Err(err) = sent {
            self.queued
                .push(MediaEvent::Error(format!("could not reach mpv: {err}")));
        }
    }

    fn unload(&mut self) {
        self.source = None;
        self.state.detach();
        if let Err(err) = self.send(json!(["stop"])) {
            debug!("stop failed: {err}");
        }
    }

    fn play(&mut self) -> Result<(), MediaError> {
        if self.source.is_none() {
            return Err(MediaError::NoSource);
        }
        self.set_property("pause", json!(false))
            .map_err(|err| MediaError::PlayRejected(err.to_string()))
    }

    fn pause(&mut self) {
        if let Err(err) = self.set_property("pause", json!(true)) {
            debug!("pause failed: {err}");
        }
    }

    fn seek(&mut self, secs: f64) {
        if !self.state.has_data {
            return;
        }
        let target = clamp_seek(secs, self.state.duration);
        if let Err(err) = self.send(json!(["seek", target, "absolute"])) {
            debug!("seek failed: {err}");
            return;
        }
        self.state.position = target;
        self.queued.push(MediaEvent::TimeUpdate);
    }

    fn set_muted(&mut self, muted: bool) {
        if let Err(err) = self.set_property("mute", json!(muted)) {
            debug!("mute failed: {err}");
        }
    }

    fn request_fullscreen(&mut self) -> Result<(), MediaError> {
        self.set_property("fullscreen", json!(true))
            .map_err(|err| MediaError::FullscreenDenied(err.to_string()))?;
        self.state.fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) {
        match self.set_property("fullscreen", json!(false)) {
            Ok(()) => self.state.fullscreen = false,
            Err(err) => debug!("leaving fullscreen failed: {err}"),
        }
    }

    fn is_fullscreen(&self) -> bool {
        self.state.fullscreen
    }

    fn current_time(&self) -> f64 {
        self.state.position
    }

    fn duration(&self) -> f64 {
        self.state.duration
    }

    fn is_paused(&self) -> bool {
        self.state.paused
    }

    fn has_data(&self) -> bool {
        self.state.has_data
    }

    fn is_attached(&self) -> bool {
        self.source.is_some()
    }

    fn poll_events(&mut self, _now: Duration) -> Vec<MediaEvent> {
        let mut events = std::mem::take(&mut self.queued);
        self.read_messages(&mut events);
        self.check_process(&mut events);
        events
    }
}

impl Drop for MpvSink {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = self.send(json!(["quit"]));
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(path) = self.socket_path.take() {
            let _ = fs::remove_file(path);
        }
    }
}
