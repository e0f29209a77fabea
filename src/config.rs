use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::core::audio::SAMPLE_RATE;
use crate::core::notation::MIN_NOTE_SPEED;
use crate::core::synth::bell;
use crate::core::synth::render::write_mono_wav;

const APP_DIR: &str = "hourlychime";
const CONFIG_FILE: &str = "config.json";
const SOUNDS_DIR: &str = "sounds";
pub const DEFAULT_CHIME_SOUND: &str = "gc-chime.wav";
pub const DEFAULT_PRELUDE_SOUND: &str = "gc-prelude.wav";

/// `strike_interval_ms` value that chains strikes back to back
pub const CHAINED_STRIKES: i64 = -1;

/// What the chime plays
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum ChimeMode {
    #[default]
    Notes,
    File,
    GrandfatherClock,
}

/// User settings, read fresh for every chime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChimeConfig {
    pub mode: ChimeMode,
    pub notes: String,
    pub note_speed: f32,
    pub audio_file_path: Option<PathBuf>,
    pub strike_file_path: Option<PathBuf>,
    pub prelude_file_path: Option<PathBuf>,
    pub strike_interval_ms: i64,
    pub volume: f32,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        Self {
            mode: ChimeMode::Notes,
            notes: "C E G C5".to_string(),
            note_speed: 1.0,
            audio_file_path: None,
            strike_file_path: None,
            prelude_file_path: None,
            strike_interval_ms: 2000,
            volume: 1.0,
        }
    }
}

impl ChimeConfig {
    /// Copy with every field forced into its valid range
    pub fn sanitized(&self) -> Self {
        let mut cfg = self.clone();
        cfg.volume = if cfg.volume.is_nan() {
            1.0
        } else {
            cfg.volume.clamp(0.0, 1.0)
        };
        if !(cfg.note_speed > 0.0) || !cfg.note_speed.is_finite() {
            cfg.note_speed = MIN_NOTE_SPEED;
        }
        cfg.strike_interval_ms = cfg.strike_interval_ms.max(CHAINED_STRIKES);
        cfg
    }

    /// Delay between strikes, `None` when strikes are chained
    pub fn strike_delay(&self) -> Option<Duration> {
        u64::try_from(self.strike_interval_ms)
            .ok()
            .map(Duration::from_millis)
    }

    pub fn audio_file(&self) -> Option<&Path> {
        non_empty(&self.audio_file_path)
    }

    pub fn strike_file(&self) -> Option<&Path> {
        non_empty(&self.strike_file_path)
    }

    pub fn prelude_file(&self) -> Option<&Path> {
        non_empty(&self.prelude_file_path)
    }
}

/// An empty path in the settings means "no sound"
fn non_empty(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| !p.as_os_str().is_empty())
}

/// Where the sequencer gets its settings
pub trait ConfigProvider {
    fn load(&self) -> Result<ChimeConfig>;
    fn save(&self, config: &ChimeConfig) -> Result<()>;
    fn defaults(&self) -> ChimeConfig;

    /// `load`, falling back to the defaults on any error
    fn load_or_default(&self) -> ChimeConfig {
        match self.load() {
            Ok(config) => config,
            Err(err) => {
                warn!("Could not load config, using defaults: {:#}", err);
                self.defaults()
            }
        }
    }
}

/// JSON settings file under the user's config directory
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    dir: PathBuf,
}

impl JsonConfigStore {
    /// Store rooted at `<config dir>/hourlychime`
    pub fn new() -> Result<Self> {
        let mut dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        dir.push(APP_DIR);
        Ok(Self::with_dir(dir))
    }

    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    pub fn sounds_dir(&self) -> PathBuf {
        self.dir.join(SOUNDS_DIR)
    }

    fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.sounds_dir())
            .with_context(|| format!("Failed to create {}", self.sounds_dir().display()))
    }

    /// Write the bundled bell sounds into the sounds directory, leaving
    /// existing files alone
    pub fn ensure_assets(&self) -> Result<()> {
        self.ensure_dirs()?;
        let bundled: [(&str, fn(u32) -> Vec<f32>); 2] = [
            (DEFAULT_CHIME_SOUND, bell::strike_sound),
            (DEFAULT_PRELUDE_SOUND, bell::prelude_sound),
        ];
        for (name, render) in bundled {
            let path = self.sounds_dir().join(name);
            if !path.exists() {
                write_mono_wav(&render(SAMPLE_RATE), &path)?;
                info!("Installed bundled sound {}", path.display());
            }
        }
        Ok(())
    }
}

impl ConfigProvider for JsonConfigStore {
    fn load(&self) -> Result<ChimeConfig> {
        if let Err(err) = self.ensure_assets() {
            warn!("Could not install bundled sounds: {:#}", err);
        }
        let path = self.config_path();
        if !path.exists() {
            let config = self.defaults();
            self.save(&config)?;
            info!("Wrote default config to {}", path.display());
            return Ok(config);
        }

        let file = File::open(&path)
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut config: ChimeConfig = serde_json::from_reader(file)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        // null paths keep the bundled sounds
        let defaults = self.defaults();
        config.audio_file_path = config.audio_file_path.or(defaults.audio_file_path);
        config.strike_file_path = config.strike_file_path.or(defaults.strike_file_path);
        config.prelude_file_path = config.prelude_file_path.or(defaults.prelude_file_path);
        Ok(config)
    }

    fn save(&self, config: &ChimeConfig) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let json = serde_json::to_string_pretty(config).context("Failed to serialize config")?;
        let path = self.config_path();
        let mut file = File::create(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        file.write_all(json.as_bytes())
            .context("Failed to write config data")?;
        Ok(())
    }

    fn defaults(&self) -> ChimeConfig {
        let sounds = self.sounds_dir();
        ChimeConfig {
            audio_file_path: Some(sounds.join(DEFAULT_CHIME_SOUND)),
            strike_file_path: Some(sounds.join(DEFAULT_CHIME_SOUND)),
            prelude_file_path: Some(sounds.join(DEFAULT_PRELUDE_SOUND)),
            ..ChimeConfig::default()
        }
    }
}
