//! Event-driven playback engine: one cursor over an abstract item count.
//!
//! **Used by**: ListPlayer (file slideshow), AnimationPlayer (GIF frames)
//!
//! # States
//!
//! - **Stopped**: no loop thread, the engine owner mutates the cursor directly
//! - **Playing**: loop thread advances the cursor and emits blocking frames
//! - **Paused**: loop thread alive but parked on its command channel
//!
//! # Ownership
//!
//! While Playing or Paused the loop thread owns the cursor. Every operation
//! (pause/resume/stop, but also next/previous/seek/max index/direction and
//! cursor queries) is sent over a zero-capacity channel as a request carrying
//! its own reply sender, and is applied by the loop between two frames. No
//! step of the loop ever interleaves with an external mutation.
//!
//! # Frame events
//!
//! The callback receives `(index, should_block)`. `should_block == true` only
//! for autonomous advancement: the callback is expected to hold the frame for
//! its dwell time before returning (the loop does no timing of its own).
//! Everything else (stop, seek, next...) emits with `should_block == false`.
//!
//! The callback runs on the loop thread while playing and must not call back
//! into the engine.

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use log::{debug, error, info, trace};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

/// Frame callback: (index, should_block)
pub type FrameCallback = Box<dyn FnMut(i64, bool) + Send>;

/// Result of every engine operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
    Ok,
    /// Play requested with nothing to play
    EmptyPlaylist,
    /// Wrong number of arguments for the action
    ArgCountMismatch,
    /// Action not valid in the current state
    Confused,
}

impl PlaybackStatus {
    /// Operation succeeded (anything but the three failure statuses)
    pub fn is_success(self) -> bool {
        !matches!(
            self,
            PlaybackStatus::EmptyPlaylist | PlaybackStatus::ArgCountMismatch | PlaybackStatus::Confused
        )
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
            PlaybackStatus::Ok => "ok",
            PlaybackStatus::EmptyPlaylist => "empty playlist",
            PlaybackStatus::ArgCountMismatch => "argument count mismatch",
            PlaybackStatus::Confused => "not possible in current state",
        };
        f.write_str(s)
    }
}

/// Engine actions for generic dispatch (command console, scripted control)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Play,
    Pause,
    Resume,
    /// Toggle: stopped -> play, playing -> pause, paused -> resume
    PlayPause,
    Stop,
    /// Toggle: running -> stop, stopped -> play
    PlayStop,
    Next,
    Previous,
    Seek,
    SetMaxIndex,
    SetDirection,
}

impl Action {
    /// Number of integer arguments the action takes
    pub fn arity(self) -> usize {
        match self {
            Action::Seek | Action::SetMaxIndex | Action::SetDirection => 1,
            _ => 0,
        }
    }
}

impl FromStr for Action {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "play" => Ok(Action::Play),
            "pause" => Ok(Action::Pause),
            "resume" => Ok(Action::Resume),
            "toggle" | "playpause" | "space" => Ok(Action::PlayPause),
            "stop" => Ok(Action::Stop),
            "playstop" => Ok(Action::PlayStop),
            "next" | "n" => Ok(Action::Next),
            "prev" | "previous" | "p" => Ok(Action::Previous),
            "seek" | "goto" => Ok(Action::Seek),
            "max" | "setmax" => Ok(Action::SetMaxIndex),
            "dir" | "direction" => Ok(Action::SetDirection),
            other => Err(format!("unknown action '{}'", other)),
        }
    }
}

/// Cursor over `[0, max_index)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub index: i64,
    pub max_index: i64,
    /// Autonomous step per iteration (negative plays backwards)
    pub direction: i64,
}

impl Default for Cursor {
    fn default() -> Self {
        Self { index: 0, max_index: 0, direction: 1 }
    }
}

impl Cursor {
    /// Move by `offset` with wraparound at both ends
    fn step(&mut self, offset: i64) {
        self.index = if self.max_index > 0 {
            (self.index + offset).rem_euclid(self.max_index)
        } else {
            0
        };
    }

    /// Clamp into `[0, max_index]`. Returns false when already there.
    fn seek(&mut self, index: i64) -> bool {
        let target = index.min(self.max_index).max(0);
        if target == self.index {
            return false;
        }
        self.index = target;
        true
    }

    /// Returns true when the cursor had to be reset
    fn set_max_index(&mut self, max_index: i64) -> bool {
        self.max_index = max_index;
        if self.index > max_index {
            self.index = 0;
            return true;
        }
        false
    }
}

/// Cursor + callback, locked by whichever thread currently drives playback
struct Core {
    cursor: Cursor,
    on_frame: FrameCallback,
}

impl Core {
    fn emit(&mut self, should_block: bool) {
        (self.on_frame)(self.cursor.index, should_block);
    }

    /// Cursor mutations shared by the stopped path and the loop thread
    fn apply(&mut self, cmd: Command) -> PlaybackStatus {
        match cmd {
            Command::Next => {
                self.cursor.step(1);
                self.emit(false);
            }
            Command::Previous => {
                self.cursor.step(-1);
                self.emit(false);
            }
            Command::Seek(index) => {
                self.cursor.seek(index);
                self.emit(false);
            }
            Command::SetMaxIndex(n) => {
                if self.cursor.set_max_index(n) {
                    self.emit(false);
                }
            }
            Command::SetDirection(d) => self.cursor.direction = d,
            Command::Query => {}
            Command::Pause | Command::Resume | Command::Stop => return PlaybackStatus::Confused,
        }
        PlaybackStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Pause,
    Resume,
    Stop,
    Next,
    Previous,
    Seek(i64),
    SetMaxIndex(i64),
    SetDirection(i64),
    Query,
}

struct Request {
    cmd: Command,
    reply: Sender<Reply>,
}

#[derive(Debug, Clone, Copy)]
struct Reply {
    status: PlaybackStatus,
    cursor: Cursor,
}

/// Handle on a live loop thread
struct Running {
    commands: Sender<Request>,
    handle: JoinHandle<()>,
    paused: bool,
}

pub struct PlaybackEngine {
    core: Arc<Mutex<Core>>,
    running: Option<Running>,
}

impl PlaybackEngine {
    pub fn new(on_frame: impl FnMut(i64, bool) + Send + 'static) -> Self {
        Self {
            core: Arc::new(Mutex::new(Core {
                cursor: Cursor::default(),
                on_frame: Box::new(on_frame),
            })),
            running: None,
        }
    }

    /// Generic entry point: validates argument count, then runs the action.
    pub fn dispatch(&mut self, action: Action, args: &[i64]) -> PlaybackStatus {
        if args.len() != action.arity() {
            return PlaybackStatus::ArgCountMismatch;
        }
        match action {
            Action::Play => self.play(),
            Action::Pause => self.pause(),
            Action::Resume => self.resume(),
            Action::PlayPause => self.play_pause(),
            Action::Stop => self.stop(),
            Action::PlayStop => self.play_stop(),
            Action::Next => self.next(),
            Action::Previous => self.previous(),
            Action::Seek => self.seek(args[0]),
            Action::SetMaxIndex => self.set_max_index(args[0]),
            Action::SetDirection => self.set_direction(args[0]),
        }
    }

    /// Start the loop thread. `Confused` if already running.
    pub fn play(&mut self) -> PlaybackStatus {
        if self.running.is_some() {
            return PlaybackStatus::Confused;
        }
        if self.lock_core().cursor.max_index <= 0 {
            debug!("Play refused: empty playlist");
            return PlaybackStatus::EmptyPlaylist;
        }

        let (tx, rx) = bounded::<Request>(0);
        let core = Arc::clone(&self.core);
        let spawned = std::thread::Builder::new()
            .name("fic-player".into())
            .spawn(move || run_loop(&core, &rx));

        match spawned {
            Ok(handle) => {
                info!("Playback started");
                self.running = Some(Running { commands: tx, handle, paused: false });
                PlaybackStatus::Playing
            }
            Err(e) => {
                error!("Failed to spawn playback thread: {}", e);
                PlaybackStatus::Confused
            }
        }
    }

    /// Park the loop. `Confused` unless currently Playing.
    pub fn pause(&mut self) -> PlaybackStatus {
        if self.status() != PlaybackStatus::Playing {
            return PlaybackStatus::Confused;
        }
        self.request(Command::Pause).status
    }

    /// Unpark the loop. `Confused` unless currently Paused.
    pub fn resume(&mut self) -> PlaybackStatus {
        if self.status() != PlaybackStatus::Paused {
            return PlaybackStatus::Confused;
        }
        self.request(Command::Resume).status
    }

    pub fn play_pause(&mut self) -> PlaybackStatus {
        match self.status() {
            PlaybackStatus::Stopped => self.play(),
            PlaybackStatus::Paused => self.resume(),
            _ => self.pause(),
        }
    }

    pub fn play_stop(&mut self) -> PlaybackStatus {
        if self.running.is_some() { self.stop() } else { self.play() }
    }

    /// Synchronous stop: returns after the loop emitted `(0, false)` and exited.
    ///
    /// No frame event fires once this returns. `Confused` when already stopped.
    pub fn stop(&mut self) -> PlaybackStatus {
        if self.running.is_none() {
            return PlaybackStatus::Confused;
        }
        let status = self.request(Command::Stop).status;
        if let Some(running) = self.running.take() {
            drop(running.commands);
            if running.handle.join().is_err() {
                error!("Playback thread panicked");
            }
        }
        info!("Playback stopped");
        status
    }

    pub fn next(&mut self) -> PlaybackStatus {
        self.mutate(Command::Next)
    }

    pub fn previous(&mut self) -> PlaybackStatus {
        self.mutate(Command::Previous)
    }

    pub fn seek(&mut self, index: i64) -> PlaybackStatus {
        self.mutate(Command::Seek(index))
    }

    pub fn set_max_index(&mut self, max_index: i64) -> PlaybackStatus {
        self.mutate(Command::SetMaxIndex(max_index))
    }

    pub fn set_direction(&mut self, direction: i64) -> PlaybackStatus {
        self.mutate(Command::SetDirection(direction))
    }

    /// Stopped / Playing / Paused
    pub fn status(&self) -> PlaybackStatus {
        match &self.running {
            None => PlaybackStatus::Stopped,
            Some(r) if r.paused => PlaybackStatus::Paused,
            Some(_) => PlaybackStatus::Playing,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Cursor snapshot (asks the loop when running)
    pub fn cursor(&self) -> Cursor {
        match &self.running {
            Some(r) => self.ask(r, Command::Query).cursor,
            None => self.lock_core().cursor,
        }
    }

    pub fn index(&self) -> i64 {
        self.cursor().index
    }

    fn mutate(&mut self, cmd: Command) -> PlaybackStatus {
        if self.running.is_some() {
            self.request(cmd).status
        } else {
            self.lock_core().apply(cmd)
        }
    }

    /// Round-trip a command through the loop and track pause state
    fn request(&mut self, cmd: Command) -> Reply {
        let Some(running) = self.running.as_ref() else {
            return Reply { status: PlaybackStatus::Confused, cursor: self.lock_core().cursor };
        };
        let reply = self.ask(running, cmd);
        if let Some(running) = self.running.as_mut() {
            match reply.status {
                PlaybackStatus::Paused => running.paused = true,
                PlaybackStatus::Playing => running.paused = false,
                _ => {}
            }
        }
        reply
    }

    fn ask(&self, running: &Running, cmd: Command) -> Reply {
        let (reply_tx, reply_rx) = bounded(1);
        let sent = running.commands.send(Request { cmd, reply: reply_tx });
        match sent.ok().and_then(|_| reply_rx.recv().ok()) {
            Some(reply) => reply,
            None => {
                error!("Playback thread is gone, command {:?} dropped", cmd);
                Reply { status: PlaybackStatus::Confused, cursor: Cursor::default() }
            }
        }
    }

    fn lock_core(&self) -> std::sync::MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.stop();
        }
    }
}

/// Loop thread body: owns the core until Stop (or the owner vanishes).
fn run_loop(core: &Mutex<Core>, commands: &Receiver<Request>) {
    let mut core = core.lock().unwrap_or_else(|e| e.into_inner());
    let mut paused = false;

    loop {
        let request = if paused {
            match commands.recv() {
                Ok(req) => Some(req),
                Err(_) => break,
            }
        } else {
            match commands.try_recv() {
                Ok(req) => Some(req),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => break,
            }
        };

        let Some(Request { cmd, reply }) = request else {
            let direction = core.cursor.direction;
            core.cursor.step(direction);
            trace!("Frame {} (blocking)", core.cursor.index);
            core.emit(true);
            continue;
        };

        let status = match cmd {
            Command::Pause => {
                paused = true;
                PlaybackStatus::Paused
            }
            Command::Resume => {
                paused = false;
                PlaybackStatus::Playing
            }
            Command::Stop => {
                core.cursor.index = 0;
                core.emit(false);
                let _ = reply.send(Reply { status: PlaybackStatus::Stopped, cursor: core.cursor });
                return;
            }
            other => core.apply(other),
        };
        let _ = reply.send(Reply { status, cursor: core.cursor });
    }
    debug!("Playback loop exited without stop");
}
