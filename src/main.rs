use clicksync::config::{self, Config};
use clicksync::core::audio::{AudioCommand, AudioService, ChannelAudio, NullAudio, ReadyNotifier};
use clicksync::core::input::{HitButton, InputSender};
use clicksync::game::autoplay::AutoplayScript;
use clicksync::game::difficulty::derive;
use clicksync::game::mods::ModSet;
use clicksync::game::parsing::map::{MapData, load_map};
use clicksync::game::session::{Session, SessionConfig, TrackInfo};
use clicksync::game::timeline::Timeline;
use log::{debug, error, info, warn};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

const USAGE: &str = "usage: clicksync <map> [--hardrock] [--hidden] [--autoplay] [--mute]";

#[derive(Debug, Default)]
struct Args {
    map: PathBuf,
    mods: ModSet,
    autoplay: bool,
    mute: bool,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args, String> {
    let mut out = Args::default();
    let mut map = None;
    for arg in args {
        match arg.as_str() {
            "--autoplay" => out.autoplay = true,
            "--mute" => out.mute = true,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => match ModSet::from_key(&flag[2..]) {
                Some(m) => out.mods |= m,
                None => return Err(format!("unknown option '{flag}'\n{USAGE}")),
            },
            _ if map.is_none() => map = Some(PathBuf::from(arg)),
            _ => return Err(format!("unexpected argument '{arg}'\n{USAGE}")),
        }
    }
    out.map = map.ok_or_else(|| USAGE.to_string())?;
    Ok(out)
}

/// A bare map name is looked up as `<maps_dir>/<name>/<name>.txt`.
fn resolve_map_path(arg: PathBuf, cfg: &Config) -> PathBuf {
    if arg.is_file() {
        return arg;
    }
    let dir = PathBuf::from(&cfg.maps_dir).join(&arg);
    let candidate = dir.join(arg.with_extension("txt"));
    if candidate.is_file() { candidate } else { arg }
}

/// Control commands typed on stdin alongside input events.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Control {
    Pause,
    Resume,
    Skip,
    Restart,
    Quit,
}

/// Reads one command per line: `move X Y`, `down B`, `up B`, `tap B` where
/// B is mouse, key1, key2 or a configured game key; or a control word.
fn spawn_stdin_reader(input: InputSender, control: Sender<Control>, cfg: Config) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let mut words = line.split_whitespace();
            let Some(cmd) = words.next() else { continue };
            let button = |w: Option<&str>| -> Option<HitButton> {
                let w = w?;
                w.parse::<HitButton>().ok().or_else(|| {
                    let mut chars = w.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => cfg.game_key(c),
                        _ => None,
                    }
                })
            };
            let cmd = cmd.to_ascii_lowercase();
            let sent = match cmd.as_str() {
                "move" => {
                    let x = words.next().and_then(|v| v.parse::<f32>().ok());
                    let y = words.next().and_then(|v| v.parse::<f32>().ok());
                    match (x, y) {
                        (Some(x), Some(y)) => input.pointer_moved(x, y),
                        _ => {
                            warn!("Ignoring malformed move command '{line}'");
                            true
                        }
                    }
                }
                "down" | "up" | "tap" => match button(words.next()) {
                    Some(b) if cmd == "down" => input.button(b, true),
                    Some(b) if cmd == "up" => input.button(b, false),
                    Some(b) => input.button(b, true) && input.button(b, false),
                    None => {
                        warn!("Ignoring '{line}': unknown button");
                        true
                    }
                },
                word => {
                    let ctl = match word {
                        "pause" => Some(Control::Pause),
                        "resume" => Some(Control::Resume),
                        "skip" => Some(Control::Skip),
                        "restart" => Some(Control::Restart),
                        "quit" | "exit" => Some(Control::Quit),
                        _ => None,
                    };
                    match ctl {
                        Some(c) => control.send(c).is_ok(),
                        None => {
                            warn!("Unknown command '{word}'");
                            true
                        }
                    }
                }
            };
            if !sent {
                break;
            }
        }
        debug!("Input reader finished");
    });
}

/// Stand-in playback thread: logs what it is told and reports ready at once.
fn spawn_audio_logger(commands: Receiver<AudioCommand>, notifiers: Receiver<ReadyNotifier>) {
    thread::spawn(move || {
        for cmd in commands.iter() {
            match cmd {
                AudioCommand::PlayTrack(path, start_ms, volume) => {
                    if !path.is_file() {
                        warn!("Audio file '{}' not found.", path.display());
                    }
                    info!(
                        "Playing '{}' from {start_ms:.0}ms at volume {volume:.2}",
                        path.display()
                    );
                    if let Ok(notifier) = notifiers.try_recv() {
                        notifier.notify();
                    }
                }
                other => debug!("Audio command: {other:?}"),
            }
        }
    });
}

/// Keeps ticks on an `epoch + n * tick` grid so the work done in a tick does
/// not stretch its period.
#[derive(Debug)]
struct TickPacer {
    tick_ms: f64,
    next_ms: f64,
}

impl TickPacer {
    fn new(start_ms: f64, tick_ms: f64) -> Self {
        Self {
            tick_ms,
            next_ms: start_ms,
        }
    }

    /// How long to sleep after a tick that finished at `now_ms`.
    fn wait_after(&mut self, now_ms: f64) -> Duration {
        self.next_ms += self.tick_ms;
        let wait_ms = self.next_ms - now_ms;
        if wait_ms < -self.tick_ms {
            // More than a tick behind: restart the grid rather than burst.
            self.next_ms = now_ms;
            return Duration::ZERO;
        }
        Duration::from_secs_f64(wait_ms.max(0.0) / 1000.0)
    }
}

fn play<A: AudioService>(map: &MapData, args: &Args, cfg: &Config, audio: A) -> String {
    let mods = args.mods;
    let params = derive(map.knobs, mods);
    let timeline = Timeline::build(
        &map.elements,
        map.initial_break_end_ms,
        mods,
        cfg.playfield_height,
    );
    let mut script = args
        .autoplay
        .then(|| AutoplayScript::from_timeline(&timeline, f64::from(cfg.tick_ms)));
    let session_config = SessionConfig::from_config(cfg)
        .with_mods(mods)
        .with_track(TrackInfo {
            name: map.name.clone(),
            audio_path: map.audio_path.clone(),
            audio_start_ms: map.audio_start_ms,
        });

    let epoch = Instant::now();
    let wall_ms = move || epoch.elapsed().as_secs_f64() * 1000.0;

    let (mut session, input) = Session::start(timeline, params, audio, session_config, wall_ms());
    let (control_tx, control_rx) = mpsc::channel();
    // Autoplay feeds the queue from this thread; otherwise stdin does.
    let autoplay_input = if script.is_none() {
        spawn_stdin_reader(input, control_tx, cfg.clone());
        None
    } else {
        drop(control_tx);
        if session.skip_intro(wall_ms()) {
            debug!("Autoplay skipped the intro");
        }
        Some(input)
    };

    let mut pacer = TickPacer::new(wall_ms(), f64::from(cfg.tick_ms));
    let mut due = Vec::new();
    while !session.is_finished() && !session.is_terminated() {
        loop {
            match control_rx.try_recv() {
                Ok(Control::Pause) => session.pause(wall_ms()),
                Ok(Control::Resume) => session.resume(wall_ms()),
                Ok(Control::Skip) => {
                    if !session.skip_intro(wall_ms()) {
                        info!("Nothing to skip.");
                    }
                }
                Ok(Control::Restart) => {
                    session.restart(wall_ms());
                    if let Some(s) = script.as_mut() {
                        s.rewind();
                    }
                }
                Ok(Control::Quit) => session.terminate(),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }

        let now = wall_ms();
        if let (Some(s), Some(tx), Some(map_time)) =
            (script.as_mut(), autoplay_input.as_ref(), session.map_time_ms(now))
            && !session.is_paused()
        {
            s.drain_due(map_time, &mut due);
            for ev in due.drain(..) {
                tx.send(ev);
            }
        }
        let out = session.tick(now);
        for j in &out.events {
            debug!("{:?} for {} ({:?})", j.rank, j.id, j.cause);
        }
        thread::sleep(pacer.wait_after(wall_ms()));
    }

    let summary = session.summary();
    serde_json::to_string_pretty(&summary).unwrap_or_else(|e| {
        error!("Failed to serialize summary: {e}");
        String::new()
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    let cfg = config::get();
    log::set_max_level(cfg.log_level.as_level_filter());

    let args = parse_args(std::env::args().skip(1))?;
    let map_path = resolve_map_path(args.map.clone(), &cfg);
    let map = load_map(&map_path)?;

    let summary = if args.mute {
        play(&map, &args, &cfg, NullAudio)
    } else {
        let (audio, commands, notifiers) = ChannelAudio::new();
        spawn_audio_logger(commands, notifiers);
        play(&map, &args, &cfg, audio)
    };
    println!("{summary}");
    Ok(())
}
