use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/* ============================== Public API ============================== */

/// Outward-facing playback handle owned by a session. Implementations must
/// never block the tick loop; failures are theirs to log.
pub trait AudioService {
    fn play_track(&mut self, path: &Path, start_ms: f64, volume: f32);
    fn pause(&mut self);
    fn resume(&mut self);
    fn stop(&mut self);

    /// One-shot readiness signal for the track started by `play_track`.
    /// `None` means the service has nothing to wait for.
    fn take_ready_signal(&mut self) -> Option<ReadySignal> {
        None
    }
}

/// Fires once when the backend has buffered enough to start.
#[derive(Debug)]
pub struct ReadySignal {
    rx: Receiver<()>,
}

#[derive(Debug)]
pub struct ReadyNotifier {
    tx: Sender<()>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReadyOutcome {
    Ready,
    TimedOut,
    /// The backend went away without signalling.
    Abandoned,
}

pub fn ready_pair() -> (ReadyNotifier, ReadySignal) {
    let (tx, rx) = mpsc::channel();
    (ReadyNotifier { tx }, ReadySignal { rx })
}

impl ReadyNotifier {
    pub fn notify(self) {
        let _ = self.tx.send(());
    }
}

impl ReadySignal {
    /// Waits once, at most `timeout`.
    pub fn wait(self, timeout: Duration) -> ReadyOutcome {
        match self.rx.recv_timeout(timeout) {
            Ok(()) => ReadyOutcome::Ready,
            Err(RecvTimeoutError::Timeout) => ReadyOutcome::TimedOut,
            Err(RecvTimeoutError::Disconnected) => ReadyOutcome::Abandoned,
        }
    }
}

/// Silent backend for headless runs and tests.
#[derive(Debug, Default)]
pub struct NullAudio;

impl AudioService for NullAudio {
    fn play_track(&mut self, path: &Path, start_ms: f64, _volume: f32) {
        info!(
            "Audio disabled; not playing '{}' (start {start_ms:.0}ms).",
            path.display()
        );
    }
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn stop(&mut self) {}
}

// Commands to an audio backend thread
#[derive(Clone, Debug, PartialEq)]
pub enum AudioCommand {
    // Path, start offset (ms), volume (0..=1)
    PlayTrack(PathBuf, f64, f32),
    Pause,
    Resume,
    Stop,
}

/// Forwards commands to a backend thread over a channel. A gone backend is
/// logged once and play continues silently.
#[derive(Debug)]
pub struct ChannelAudio {
    command_sender: Sender<AudioCommand>,
    ready: Option<ReadySignal>,
    pending_notifier: Option<Sender<ReadyNotifier>>,
    disconnected: bool,
}

impl ChannelAudio {
    /// Returns the service plus the backend's ends: the command receiver and
    /// a channel that hands over one [`ReadyNotifier`] per started track.
    pub fn new() -> (Self, Receiver<AudioCommand>, Receiver<ReadyNotifier>) {
        let (command_sender, command_receiver) = mpsc::channel();
        let (notifier_tx, notifier_rx) = mpsc::channel();
        (
            Self {
                command_sender,
                ready: None,
                pending_notifier: Some(notifier_tx),
                disconnected: false,
            },
            command_receiver,
            notifier_rx,
        )
    }

    fn send(&mut self, cmd: AudioCommand) {
        if self.disconnected {
            return;
        }
        if let Err(e) = self.command_sender.send(cmd) {
            warn!("Audio backend unavailable ({e}); continuing without audio.");
            self.disconnected = true;
        }
    }
}

impl AudioService for ChannelAudio {
    fn play_track(&mut self, path: &Path, start_ms: f64, volume: f32) {
        let volume = if volume.is_finite() {
            volume.clamp(0.0, 1.0)
        } else {
            1.0
        };
        let start_ms = if start_ms.is_finite() {
            start_ms.max(0.0)
        } else {
            0.0
        };
        if let Some(handoff) = &self.pending_notifier {
            let (notifier, signal) = ready_pair();
            if handoff.send(notifier).is_ok() {
                self.ready = Some(signal);
            } else {
                self.pending_notifier = None;
            }
        }
        self.send(AudioCommand::PlayTrack(path.to_path_buf(), start_ms, volume));
    }

    fn pause(&mut self) {
        self.send(AudioCommand::Pause);
    }

    fn resume(&mut self) {
        self.send(AudioCommand::Resume);
    }

    fn stop(&mut self) {
        self.send(AudioCommand::Stop);
    }

    fn take_ready_signal(&mut self) -> Option<ReadySignal> {
        self.ready.take()
    }
}
