use crate::config::Config;
use crate::core::audio::{AudioService, ReadyOutcome};
use crate::core::clock::Clock;
use crate::core::input::{self, ButtonState, InputEvent, InputReceiver, InputSender, Transition};
use crate::game::active::{ActiveEntry, ActiveKind, ActiveSet};
use crate::game::difficulty::DifficultyParams;
use crate::game::element::ElementId;
use crate::game::judge::{Judge, PressOutcome};
use crate::game::judgment::Judgment;
use crate::game::mods::ModSet;
use crate::game::scheduler::{DisposalSource, Scheduler, WindowExpiry};
use crate::game::score::{Grade, HudSnapshot, JudgementCounts, ScoreState};
use crate::game::timeline::Timeline;
use chrono::Local;
use glam::Vec2;
use log::{debug, info, warn};
use smallvec::SmallVec;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

// Hidden: circles fade out between these fractions of their approach.
const HIDDEN_FADE_START: f32 = 0.4;
const HIDDEN_FADE_END: f32 = 0.7;

/// What the session does when health reaches zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailPolicy {
    /// Keep playing; depletion is only reported.
    #[default]
    Ignore,
    /// Terminate the session the tick health hits zero.
    EndSession,
}

impl FailPolicy {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ignore => "Ignore",
            Self::EndSession => "EndSession",
        }
    }
}

impl FromStr for FailPolicy {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "endsession" | "end" | "fail" => Ok(Self::EndSession),
            _ => Err(()),
        }
    }
}

impl core::fmt::Display for FailPolicy {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The music that goes with a map.
#[derive(Clone, Debug, PartialEq)]
pub struct TrackInfo {
    pub name: String,
    pub audio_path: PathBuf,
    /// Position in the audio file that lines up with map time 0.
    pub audio_start_ms: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub tick_ms: f64,
    pub music_volume: f32,
    pub audio_ready_timeout_ms: u64,
    pub fail_policy: FailPolicy,
    pub auto_skip_lead_ms: f64,
    pub mods: ModSet,
    pub track: Option<TrackInfo>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SessionConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            tick_ms: f64::from(cfg.tick_ms),
            music_volume: cfg.music_volume,
            audio_ready_timeout_ms: cfg.audio_ready_timeout_ms,
            fail_policy: cfg.fail_policy,
            auto_skip_lead_ms: cfg.auto_skip_lead_ms,
            mods: ModSet::empty(),
            track: None,
        }
    }

    pub fn with_mods(mut self, mods: ModSet) -> Self {
        self.mods = mods;
        self
    }

    pub fn with_track(mut self, track: TrackInfo) -> Self {
        self.track = Some(track);
        self
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum ViewKind {
    Circle,
    Slider {
        head: Vec2,
        tail: Vec2,
        /// Current follow point along the path.
        follow: Vec2,
        held_points: f64,
        dragging: bool,
    },
}

/// Read-only render state for one active element.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ActiveView {
    pub id: ElementId,
    pub position: Vec2,
    pub target_time_ms: f64,
    /// 0 when the element appears, 1 at its target time.
    pub approach_progress: f32,
    pub opacity: f32,
    pub kind: ViewKind,
}

pub type TickEvents = SmallVec<[Judgment; 4]>;

#[derive(Clone, Debug, PartialEq)]
pub struct TickOutput {
    /// `None` once the session has been terminated.
    pub map_time_ms: Option<f64>,
    pub active: Vec<ActiveView>,
    pub hud: HudSnapshot,
    pub events: TickEvents,
    pub in_break: bool,
    pub finished: bool,
}

/// End-of-play result, written out by the runner.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct SessionSummary {
    pub map_name: String,
    pub mods: String,
    pub score: u64,
    pub accuracy_percent: f64,
    pub max_combo: u32,
    pub counts: JudgementCounts,
    pub grade: Grade,
    pub health: f64,
    pub depleted: bool,
    pub failed: bool,
    pub finished: bool,
    pub played_at: String,
}

/// One play of one map: owns the clock, the timeline, the active set and the
/// score, and is driven by `tick`.
pub struct Session<A: AudioService, D: DisposalSource = WindowExpiry> {
    timeline: Timeline,
    params: DifficultyParams,
    config: SessionConfig,
    audio: A,
    clock: Clock,
    scheduler: Scheduler<D>,
    active: ActiveSet,
    judge: Judge,
    score: ScoreState,
    input: InputReceiver,
    // Events waiting for the next tick, oldest first.
    pending_input: Vec<InputEvent>,
    buttons: ButtonState,
    pointer: Vec2,
    judged_scratch: Vec<Judgment>,
    depleted_seen: bool,
    failed: bool,
    finished: bool,
}

impl<A: AudioService> Session<A, WindowExpiry> {
    /// Starts play at `wall_now_ms` and returns the session with the producer
    /// half of its input queue.
    pub fn start(
        timeline: Timeline,
        params: DifficultyParams,
        audio: A,
        config: SessionConfig,
        wall_now_ms: f64,
    ) -> (Self, InputSender) {
        Self::start_with_disposal(timeline, params, audio, config, WindowExpiry, wall_now_ms)
    }
}

impl<A: AudioService, D: DisposalSource> Session<A, D> {
    pub fn start_with_disposal(
        timeline: Timeline,
        params: DifficultyParams,
        audio: A,
        config: SessionConfig,
        disposal: D,
        wall_now_ms: f64,
    ) -> (Self, InputSender) {
        let (tx, rx) = input::channel();
        let mut session = Self {
            timeline,
            params,
            config,
            audio,
            clock: Clock::start(wall_now_ms),
            scheduler: Scheduler::new(disposal),
            active: ActiveSet::new(),
            judge: Judge::new(),
            score: ScoreState::new(),
            input: rx,
            pending_input: Vec::new(),
            buttons: ButtonState::default(),
            pointer: Vec2::ZERO,
            judged_scratch: Vec::new(),
            depleted_seen: false,
            failed: false,
            finished: false,
        };
        session.begin(wall_now_ms);
        (session, tx)
    }

    fn begin(&mut self, wall_now_ms: f64) {
        let waited_ms = self.start_audio(0.0);
        self.clock = Clock::start(wall_now_ms + waited_ms);
        info!(
            "Session started: {} elements ({} judgeable), mods={}, approach={:.0}ms, windows={:?}, radius={:.1}px",
            self.timeline.len(),
            self.timeline.judgeable_count(),
            self.config.mods,
            self.params.approach_duration_ms,
            self.params.timing_windows_ms(),
            self.params.hit_radius_px
        );
    }

    /// Starts the track at `map_time_ms` and waits once for readiness.
    /// Returns how long the wait took.
    fn start_audio(&mut self, map_time_ms: f64) -> f64 {
        let Some(track) = &self.config.track else {
            return 0.0;
        };
        let start_ms = track.audio_start_ms + map_time_ms.max(0.0);
        self.audio
            .play_track(&track.audio_path, start_ms, self.config.music_volume);
        let Some(signal) = self.audio.take_ready_signal() else {
            return 0.0;
        };
        let started = Instant::now();
        match signal.wait(Duration::from_millis(self.config.audio_ready_timeout_ms)) {
            ReadyOutcome::Ready => debug!("Audio ready."),
            ReadyOutcome::TimedOut => warn!(
                "Audio not ready after {}ms; starting without waiting further.",
                self.config.audio_ready_timeout_ms
            ),
            ReadyOutcome::Abandoned => warn!("Audio backend went away before signalling ready."),
        }
        started.elapsed().as_secs_f64() * 1000.0
    }

    /// Queues an input event from the owning thread. Events already waiting
    /// in the channel keep their place ahead of it.
    pub fn on_input(&mut self, event: InputEvent) {
        self.input.drain_into(&mut self.pending_input);
        self.pending_input.push(event);
    }

    pub fn tick(&mut self, wall_now_ms: f64) -> TickOutput {
        let Some(map_time_ms) = self.clock.map_time_ms(wall_now_ms) else {
            return self.terminated_output();
        };
        if !self.clock.is_running() {
            let in_break = self.scheduler.in_break(map_time_ms);
            return self.output(map_time_ms, TickEvents::new(), in_break);
        }

        self.input.drain_into(&mut self.pending_input);

        self.scheduler.activate(
            &mut self.timeline,
            &mut self.active,
            map_time_ms,
            &self.params,
        );

        self.judged_scratch.clear();
        self.scheduler.expire(
            &mut self.active,
            &mut self.judge,
            map_time_ms,
            &self.params,
            &mut self.judged_scratch,
        );

        self.apply_pending_input(map_time_ms);

        self.judge.accrue(
            self.buttons.any_down(),
            self.pointer,
            map_time_ms,
            self.config.tick_ms,
            &mut self.active,
            &self.params,
        );

        let mut events = TickEvents::new();
        for judgment in self.judged_scratch.drain(..) {
            self.score.apply_judgement(judgment.rank, &self.params);
            events.push(judgment);
        }

        let in_break = self.scheduler.in_break(map_time_ms);
        if !in_break {
            self.score.apply_tick(self.config.tick_ms, &self.params);
        }

        self.check_depletion();

        if !self.finished && self.scheduler.is_finished(&self.timeline, &self.active) {
            self.finished = true;
            info!(
                "Map finished at {map_time_ms:.0}ms: score={}, accuracy={:.2}%, max combo={}",
                self.score.score(),
                self.score.accuracy_percent(),
                self.score.max_combo()
            );
        }

        if self.clock.is_terminated() {
            let mut out = self.terminated_output();
            out.events = events;
            return out;
        }
        self.output(map_time_ms, events, in_break)
    }

    fn apply_pending_input(&mut self, map_time_ms: f64) {
        let pending = std::mem::take(&mut self.pending_input);
        for event in &pending {
            match *event {
                InputEvent::PointerMoved { x, y } => {
                    self.pointer = Vec2::new(x, y);
                }
                InputEvent::Button { button, pressed } => {
                    match self.buttons.apply(button, pressed) {
                        Transition::Press => self.press(map_time_ms),
                        Transition::Release => {
                            self.judge.on_release(map_time_ms, &mut self.active);
                        }
                        Transition::None => {}
                    }
                }
            }
        }
        // Hand the allocation back for the next tick.
        self.pending_input = pending;
        self.pending_input.clear();
    }

    fn press(&mut self, map_time_ms: f64) {
        let outcome = self.judge.on_press(
            self.pointer,
            map_time_ms,
            &mut self.active,
            &self.params,
        );
        match outcome {
            Some(PressOutcome::Judged(j)) => {
                self.clock.register_hit();
                self.judged_scratch.push(j);
            }
            Some(PressOutcome::Grabbed(_)) => self.clock.register_hit(),
            None => {}
        }
    }

    fn check_depletion(&mut self) {
        if !self.score.is_depleted() || self.depleted_seen {
            return;
        }
        self.depleted_seen = true;
        match self.config.fail_policy {
            FailPolicy::Ignore => info!("Health depleted; fail policy is Ignore, play continues."),
            FailPolicy::EndSession => {
                info!("Player has failed!");
                self.failed = true;
                self.terminate();
            }
        }
    }

    pub fn pause(&mut self, wall_now_ms: f64) {
        if !self.clock.is_running() {
            return;
        }
        self.clock.pause(wall_now_ms);
        self.audio.pause();
        info!(
            "Session paused at {:.0}ms",
            self.clock.map_time_ms(wall_now_ms).unwrap_or_default()
        );
    }

    pub fn resume(&mut self, wall_now_ms: f64) {
        if !self.clock.is_paused() {
            return;
        }
        let paused_at = self.clock.map_time_ms(wall_now_ms).unwrap_or_default();
        self.clock.resume(wall_now_ms);
        self.audio.resume();
        self.settle_paused_input(paused_at);
        info!("Session resumed");
    }

    /// Presses and moves made while paused are not replayed. Releases are,
    /// at the pause instant, so no key stays held that the player let go.
    fn settle_paused_input(&mut self, paused_at_ms: f64) {
        self.input.drain_into(&mut self.pending_input);
        let mut dropped = 0usize;
        for event in std::mem::take(&mut self.pending_input) {
            match event {
                InputEvent::Button {
                    button,
                    pressed: false,
                } => {
                    if self.buttons.apply(button, false) == Transition::Release {
                        self.judge.on_release(paused_at_ms, &mut self.active);
                    }
                }
                _ => dropped += 1,
            }
        }
        if dropped > 0 {
            debug!("Dropped {dropped} input events queued during pause");
        }
    }

    /// Map time the intro skip jumps to: shortly before the initial break
    /// ends, or one approach before the first element.
    pub fn intro_skip_target_ms(&self) -> Option<f64> {
        let break_end = self.timeline.initial_break_end_ms();
        if break_end > 0.0 {
            return Some(break_end - self.config.auto_skip_lead_ms.max(0.0));
        }
        self.timeline
            .first_judgeable_time()
            .map(|t| t - self.params.approach_duration_ms)
    }

    /// Jumps ahead to the skip target. Refused once anything has been hit,
    /// while paused, or when the target is not ahead of the current time.
    pub fn skip_intro(&mut self, wall_now_ms: f64) -> bool {
        if !self.clock.is_running() {
            return false;
        }
        let (Some(now), Some(target)) = (
            self.clock.map_time_ms(wall_now_ms),
            self.intro_skip_target_ms(),
        ) else {
            return false;
        };
        if !self.clock.skip_intro(target - now) {
            return false;
        }
        info!("Skipped intro from {now:.0}ms to {target:.0}ms");
        let waited_ms = self.start_audio(target);
        self.clock.stall(waited_ms);
        true
    }

    /// Starts the same map over from map time 0.
    pub fn restart(&mut self, wall_now_ms: f64) {
        self.audio.stop();
        self.timeline.reset();
        self.scheduler.reset();
        self.active.clear();
        self.judge.reset();
        self.score = ScoreState::new();
        self.input.discard_pending();
        self.pending_input.clear();
        self.buttons.clear();
        self.depleted_seen = false;
        self.failed = false;
        self.finished = false;
        info!("Session restarting");
        self.begin(wall_now_ms);
    }

    /// Stops ticking for good: drops the active set and stops audio.
    pub fn terminate(&mut self) {
        if self.clock.is_terminated() {
            return;
        }
        self.clock.terminate();
        self.active.clear();
        self.judge.reset();
        self.pending_input.clear();
        self.input.discard_pending();
        self.audio.stop();
        info!("Session terminated");
    }

    #[inline(always)]
    pub fn hud(&self) -> HudSnapshot {
        self.score.hud()
    }

    pub const fn score_state(&self) -> &ScoreState {
        &self.score
    }

    pub const fn params(&self) -> &DifficultyParams {
        &self.params
    }

    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    pub const fn is_terminated(&self) -> bool {
        self.clock.is_terminated()
    }

    pub const fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn map_time_ms(&self, wall_now_ms: f64) -> Option<f64> {
        self.clock.map_time_ms(wall_now_ms)
    }

    pub const fn audio(&self) -> &A {
        &self.audio
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            map_name: self
                .config
                .track
                .as_ref()
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            mods: self.config.mods.to_string(),
            score: self.score.score(),
            accuracy_percent: self.score.accuracy_percent(),
            max_combo: self.score.max_combo(),
            counts: *self.score.counts(),
            grade: self.score.grade(),
            health: self.score.health(),
            depleted: self.depleted_seen,
            failed: self.failed,
            finished: self.finished,
            played_at: Local::now().to_rfc3339(),
        }
    }

    fn terminated_output(&self) -> TickOutput {
        TickOutput {
            map_time_ms: None,
            active: Vec::new(),
            hud: self.score.hud(),
            events: TickEvents::new(),
            in_break: false,
            finished: true,
        }
    }

    fn output(&self, map_time_ms: f64, events: TickEvents, in_break: bool) -> TickOutput {
        let active = self
            .active
            .iter()
            .map(|e| self.view_of(e, map_time_ms))
            .collect();
        TickOutput {
            map_time_ms: Some(map_time_ms),
            active,
            hud: self.score.hud(),
            events,
            in_break,
            finished: self.finished,
        }
    }

    fn view_of(&self, entry: &ActiveEntry, map_time_ms: f64) -> ActiveView {
        let approach = self.params.approach_duration_ms.max(f64::EPSILON);
        let target = entry.target_time();
        let approach_progress = (1.0 - (target - map_time_ms) / approach).clamp(0.0, 1.0) as f32;
        match &entry.kind {
            ActiveKind::Circle(c) => ActiveView {
                id: entry.id,
                position: Vec2::new(c.x, c.y),
                target_time_ms: target,
                approach_progress,
                opacity: self.circle_opacity(approach_progress, map_time_ms - target),
                kind: ViewKind::Circle,
            },
            ActiveKind::Slider(s, progress) => ActiveView {
                id: entry.id,
                position: s.head(),
                target_time_ms: target,
                approach_progress,
                opacity: 1.0,
                kind: ViewKind::Slider {
                    head: s.head(),
                    tail: s.tail(),
                    follow: s.point_at_distance(progress.follow_distance),
                    held_points: progress.held_points,
                    dragging: self.judge.drag_target() == Some(entry.id),
                },
            },
        }
    }

    fn circle_opacity(&self, approach_progress: f32, past_target_ms: f64) -> f32 {
        // Past the target the circle fades over the Miss window.
        let late_fade = if past_target_ms > 0.0 {
            let cutoff = self.params.timing.miss_cutoff_ms().max(f64::EPSILON);
            (1.0 - past_target_ms / cutoff).clamp(0.0, 1.0) as f32
        } else {
            1.0
        };
        if !self.config.mods.contains(ModSet::HIDDEN) {
            return late_fade;
        }
        let hidden = 1.0
            - ((approach_progress - HIDDEN_FADE_START) / (HIDDEN_FADE_END - HIDDEN_FADE_START))
                .clamp(0.0, 1.0);
        hidden.min(late_fade)
    }
}
