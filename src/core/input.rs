use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use log::warn;

/// Anything that can press a target: the pointer button or one of the two
/// game keys.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum HitButton {
    Mouse = 0,
    Key1 = 1,
    Key2 = 2,
}

impl HitButton {
    pub const COUNT: usize = 3;

    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Mouse => "Mouse",
            Self::Key1 => "Key1",
            Self::Key2 => "Key2",
        }
    }
}

impl FromStr for HitButton {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mouse" => Ok(Self::Mouse),
            "key1" => Ok(Self::Key1),
            "key2" => Ok(Self::Key2),
            _ => Err(()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerMoved { x: f32, y: f32 },
    Button { button: HitButton, pressed: bool },
}

/// Result of feeding one button edge into [`ButtonState`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// That button went from up to down, whatever else is held.
    Press,
    /// The last held button went up.
    Release,
    None,
}

/// Held state per [`HitButton`]. Every button that goes down presses on its
/// own, so alternating keys in a stream both land. The combined state only
/// decides slider holding and the final release.
#[derive(Clone, Copy, Debug, Default)]
pub struct ButtonState {
    down: [bool; HitButton::COUNT],
}

impl ButtonState {
    #[inline(always)]
    pub fn any_down(&self) -> bool {
        self.down.iter().any(|d| *d)
    }

    #[inline(always)]
    pub fn is_down(&self, button: HitButton) -> bool {
        self.down[button.index()]
    }

    pub fn apply(&mut self, button: HitButton, pressed: bool) -> Transition {
        let was_down = self.down[button.index()];
        let any_before = self.any_down();
        self.down[button.index()] = pressed;
        if pressed && !was_down {
            Transition::Press
        } else if any_before && !self.any_down() {
            Transition::Release
        } else {
            Transition::None
        }
    }

    pub fn clear(&mut self) {
        self.down = [false; HitButton::COUNT];
    }
}

/// Producer half of the input queue. Not `Clone`: there is exactly one
/// producer per session.
#[derive(Debug)]
pub struct InputSender {
    tx: Sender<InputEvent>,
}

/// Consumer half, owned by the session and drained once per tick.
#[derive(Debug)]
pub struct InputReceiver {
    rx: Receiver<InputEvent>,
    disconnected: bool,
}

pub fn channel() -> (InputSender, InputReceiver) {
    let (tx, rx) = mpsc::channel();
    (
        InputSender { tx },
        InputReceiver {
            rx,
            disconnected: false,
        },
    )
}

impl InputSender {
    /// Queues an event. Returns false once the consumer is gone.
    #[inline(always)]
    pub fn send(&self, event: InputEvent) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn pointer_moved(&self, x: f32, y: f32) -> bool {
        self.send(InputEvent::PointerMoved { x, y })
    }

    pub fn button(&self, button: HitButton, pressed: bool) -> bool {
        self.send(InputEvent::Button { button, pressed })
    }
}

impl InputReceiver {
    /// Moves everything queued so far into `out`, oldest first.
    pub fn drain_into(&mut self, out: &mut Vec<InputEvent>) {
        loop {
            match self.rx.try_recv() {
                Ok(ev) => out.push(ev),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.disconnected {
                        warn!("Input producer disconnected; no further input will arrive.");
                        self.disconnected = true;
                    }
                    break;
                }
            }
        }
    }

    /// Drops anything queued without applying it.
    pub fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}
