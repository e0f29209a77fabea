use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use log::info;

mod app;
mod config;
mod core;
mod messaging;
mod utils;

use crate::app::ChimeApp;
use crate::config::{ChimeMode, ConfigProvider, JsonConfigStore};
use crate::core::notation::NoteParser;
use crate::core::synth::render::render_to_wav;
use crate::utils::helpers::format_duration;

#[derive(Parser, Debug)]
#[command(name = "hourly-chime")]
#[command(about = "Chimes on the hour with notes, a sound file or a grandfather clock", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chime on every hour change until interrupted
    Run,
    /// Play one chime now and exit when it is done
    Test {
        /// Override the configured mode
        #[arg(short, long, value_enum)]
        mode: Option<ChimeMode>,

        /// Override the configured note string
        #[arg(short, long)]
        notes: Option<String>,

        /// Override the configured note speed
        #[arg(short, long)]
        speed: Option<f32>,

        /// Hour (0-23) used for the grandfather clock strike count
        #[arg(long, value_parser = clap::value_parser!(u32).range(0..24))]
        hour: Option<u32>,
    },
    /// Write a note string to a WAV file instead of the speakers
    Render {
        #[arg(short, long)]
        notes: String,

        #[arg(short, long, default_value_t = 1.0)]
        speed: f32,

        #[arg(short, long, default_value_t = 1.0)]
        volume: f32,

        #[arg(short, long)]
        output: PathBuf,
    },
    /// Inspect or reset the settings file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the settings file location
    Path,
    /// Print the settings in effect
    Show,
    /// Overwrite the settings file with defaults
    Reset,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let store = JsonConfigStore::new()?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            info!("Starting hourly chime, settings in {}", store.config_path().display());
            let mut app = ChimeApp::new(store)?;
            app.stop_on_enter()?;
            app.run()
        }
        Command::Test {
            mode,
            notes,
            speed,
            hour,
        } => {
            let mut config = store.load_or_default();
            if let Some(mode) = mode {
                config.mode = mode;
            }
            if let Some(notes) = notes {
                config.notes = notes;
            }
            if let Some(speed) = speed {
                config.note_speed = speed;
            }
            info!("Playing test chime in {:?} mode, press Enter to stop", config.mode);
            let mut app = ChimeApp::new(store)?;
            app.stop_on_enter()?;
            app.play_once(config, hour)
        }
        Command::Render {
            notes,
            speed,
            volume,
            output,
        } => {
            let sequence = NoteParser::default().parse(&notes, speed);
            let frames = render_to_wav(sequence, volume, &output)?;
            let length = std::time::Duration::from_secs_f64(
                frames as f64 / f64::from(crate::core::audio::SAMPLE_RATE),
            );
            info!("Wrote {} of audio to {}", format_duration(length), output.display());
            Ok(())
        }
        Command::Config { action } => {
            match action {
                ConfigAction::Path => println!("{}", store.config_path().display()),
                ConfigAction::Show => {
                    let config = store.load_or_default();
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                ConfigAction::Reset => {
                    store.save(&store.defaults())?;
                    info!("Reset {}", store.config_path().display());
                }
            }
            Ok(())
        }
    }
}
