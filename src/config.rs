use crate::core::input::HitButton;
use crate::game::session::FailPolicy;
use ini::Ini;
use log::{LevelFilter, info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

const CONFIG_FILE_NAME: &str = "clicksync.ini";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> LevelFilter {
        match self {
            Self::Off => LevelFilter::Off,
            Self::Error => LevelFilter::Error,
            Self::Warn => LevelFilter::Warn,
            Self::Info => LevelFilter::Info,
            Self::Debug => LevelFilter::Debug,
            Self::Trace => LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" | "none" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    pub maps_dir: String,
    /// Fixed tick length. Health drain and slider accrual use this, not the
    /// measured frame time.
    pub tick_ms: u32,
    pub fail_policy: FailPolicy,
    /// Intro skip lands this long before the initial break ends.
    pub auto_skip_lead_ms: f64,
    pub playfield_height: f32,
    pub game_key_1: char,
    pub game_key_2: char,
    /// 0.0..=1.0
    pub music_volume: f32,
    pub audio_ready_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            maps_dir: "maps".to_string(),
            tick_ms: 20,
            fail_policy: FailPolicy::Ignore,
            auto_skip_lead_ms: 1000.0,
            playfield_height: 600.0,
            game_key_1: 'z',
            game_key_2: 'x',
            music_volume: 0.1,
            audio_ready_timeout_ms: 2000,
        }
    }
}

impl Config {
    /// Which hit button a typed key maps to, if any.
    pub fn game_key(&self, key: char) -> Option<HitButton> {
        if key.eq_ignore_ascii_case(&self.game_key_1) {
            Some(HitButton::Key1)
        } else if key.eq_ignore_ascii_case(&self.game_key_2) {
            Some(HitButton::Key2)
        } else {
            None
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

static CONFIG_PATH: std::sync::LazyLock<PathBuf> = std::sync::LazyLock::new(resolve_config_path);

// --- File I/O ---

/// Prefers a config in the working directory, then the platform config dir.
fn resolve_config_path() -> PathBuf {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return local;
    }
    directories::ProjectDirs::from("", "", "clicksync")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
        .unwrap_or(local)
}

pub fn config_path() -> &'static Path {
    CONFIG_PATH.as_path()
}

fn to_ini(cfg: &Config) -> Ini {
    let mut conf = Ini::new();
    // Keys in alphabetical order per section.
    conf.with_section(Some("Options"))
        .set("LogLevel", cfg.log_level.as_str())
        .set("MapsDir", cfg.maps_dir.as_str());
    conf.with_section(Some("Gameplay"))
        .set("AutoSkipLeadMs", cfg.auto_skip_lead_ms.to_string())
        .set("FailPolicy", cfg.fail_policy.as_str())
        .set("GameKey1", cfg.game_key_1.to_string())
        .set("GameKey2", cfg.game_key_2.to_string())
        .set("PlayfieldHeight", cfg.playfield_height.to_string())
        .set("TickMs", cfg.tick_ms.to_string());
    conf.with_section(Some("Audio"))
        .set("AudioReadyTimeoutMs", cfg.audio_ready_timeout_ms.to_string())
        .set("MusicVolume", cfg.music_volume.to_string());
    conf
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    to_ini(&Config::default()).write_to_file(path)
}

/// Reads `key` from `section`, keeping `default` when it is missing or bad.
fn read<T: FromStr>(conf: &Ini, section: &str, key: &str, default: T) -> T {
    let Some(raw) = conf.get_from(Some(section), key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!("Ignoring invalid value '{raw}' for [{section}] {key}; using default.");
            default
        }
    }
}

fn read_key(conf: &Ini, key: &str, default: char) -> char {
    match conf.get_from(Some("Gameplay"), key).map(str::trim) {
        None => default,
        Some(s) if s.chars().count() == 1 => s.chars().next().unwrap_or(default),
        Some(s) => {
            warn!("Ignoring invalid game key '{s}' for [Gameplay] {key}; using default.");
            default
        }
    }
}

/// Builds a config from parsed INI data, falling back per key.
pub fn from_ini(conf: &Ini) -> Config {
    let default = Config::default();
    let mut cfg = Config {
        log_level: read(conf, "Options", "LogLevel", default.log_level),
        maps_dir: read(conf, "Options", "MapsDir", default.maps_dir.clone()),
        tick_ms: read(conf, "Gameplay", "TickMs", default.tick_ms),
        fail_policy: read(conf, "Gameplay", "FailPolicy", default.fail_policy),
        auto_skip_lead_ms: read(conf, "Gameplay", "AutoSkipLeadMs", default.auto_skip_lead_ms),
        playfield_height: read(conf, "Gameplay", "PlayfieldHeight", default.playfield_height),
        game_key_1: read_key(conf, "GameKey1", default.game_key_1),
        game_key_2: read_key(conf, "GameKey2", default.game_key_2),
        music_volume: read(conf, "Audio", "MusicVolume", default.music_volume),
        audio_ready_timeout_ms: read(
            conf,
            "Audio",
            "AudioReadyTimeoutMs",
            default.audio_ready_timeout_ms,
        ),
    };

    // Range guards.
    if cfg.tick_ms == 0 {
        warn!("TickMs must be positive; using {}.", default.tick_ms);
        cfg.tick_ms = default.tick_ms;
    }
    if !cfg.music_volume.is_finite() {
        cfg.music_volume = default.music_volume;
    }
    cfg.music_volume = cfg.music_volume.clamp(0.0, 1.0);
    if !cfg.auto_skip_lead_ms.is_finite() || cfg.auto_skip_lead_ms < 0.0 {
        cfg.auto_skip_lead_ms = default.auto_skip_lead_ms;
    }
    if !(cfg.playfield_height.is_finite() && cfg.playfield_height > 0.0) {
        cfg.playfield_height = default.playfield_height;
    }
    if cfg.game_key_1.eq_ignore_ascii_case(&cfg.game_key_2) {
        warn!("GameKey1 and GameKey2 are the same; using defaults.");
        cfg.game_key_1 = default.game_key_1;
        cfg.game_key_2 = default.game_key_2;
    }
    cfg
}

pub fn load() {
    let path = config_path();
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(path) {
        Ok(conf) => {
            let loaded = from_ini(&conf);
            *CONFIG.lock().unwrap() = loaded;
            info!("Configuration loaded from '{}'.", path.display());
        }
        Err(e) => {
            warn!(
                "Failed to load '{}': {e}. Using default configuration.",
                path.display()
            );
        }
    }
}

pub fn get() -> Config {
    CONFIG.lock().unwrap().clone()
}
