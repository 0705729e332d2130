mod digest;
mod script;
mod state;

use anyhow::{Context, bail};
use clap::Parser;
use digest::{AudioSummary, DigestAudioOutput};
use env_logger::Env;
use psg_config::{HostConfig, StateFormat, TimingMode};
use psg_core::HostCore;
use script::Script;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{fs, io};

// Frames to run when neither the script nor the options give a length
const DEFAULT_FRAMES: u32 = 60;

/// Contents of the optional TOML config file. Command-line options take precedence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
struct FileConfig {
    host: HostConfig,
    state_format: StateFormat,
    frames: Option<u32>,
}

#[derive(Parser)]
struct Args {
    /// Register write script path
    #[arg(short = 's', long)]
    script: Option<PathBuf>,

    /// Number of frames to run; defaults to the length of the script, or 60 without a script
    #[arg(short = 'n', long)]
    frames: Option<u32>,

    /// TOML config file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Timing mode (Ntsc / Pal)
    #[arg(long)]
    timing_mode: Option<TimingMode>,

    /// Count frames without any register writes as lag frames (true / false)
    #[arg(long)]
    lag_on_empty_frame: Option<bool>,

    /// Save state format (Binary / Text)
    #[arg(long)]
    state_format: Option<StateFormat>,

    /// Load a save state before running the script
    #[arg(long)]
    load_state: Option<PathBuf>,

    /// Write a save state after running the script
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Save and reload the final state, then check that the reloaded core produces the same
    /// samples and state for one more frame
    #[arg(long, default_value_t)]
    verify_round_trip: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let file_config = match &args.config {
        Some(path) => read_config(path)?,
        None => FileConfig::default(),
    };

    let host_config = HostConfig {
        timing_mode: args.timing_mode.unwrap_or(file_config.host.timing_mode),
        lag_on_empty_frame: args.lag_on_empty_frame.unwrap_or(file_config.host.lag_on_empty_frame),
    };
    let state_format = args.state_format.unwrap_or(file_config.state_format);

    let script = match &args.script {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Unable to read script '{}'", path.display()))?;
            let script = Script::parse(&text)
                .with_context(|| format!("Unable to parse script '{}'", path.display()))?;
            log::info!("Loaded {} commands from '{}'", script.events().len(), path.display());
            script
        }
        None => Script::default(),
    };

    let frames = args.frames.or(file_config.frames).unwrap_or(match script.frame_count() {
        0 => DEFAULT_FRAMES,
        script_frames => script_frames,
    });
    if script.frame_count() > frames {
        log::warn!("Script covers {} frames but only {frames} will be run", script.frame_count());
    }

    let mut host = HostCore::new(host_config);

    if let Some(path) = &args.load_state {
        let state = state::load_from_file(path, state_format)
            .with_context(|| format!("Unable to read state file '{}'", path.display()))?;
        host.load_state(state_format, &state)
            .with_context(|| format!("Unable to load state from '{}'", path.display()))?;
    }

    let summary = run_script(&mut host, &script, frames)?;
    println!("frames={frames} lag_frames={} {summary}", host.lag_count());

    if args.verify_round_trip {
        verify_round_trip(&host, state_format)?;
        log::info!("{state_format} state round trip verified");
    }

    if let Some(path) = &args.save_state {
        let state = host.save_state(state_format)?;
        state::save_to_file(path, state_format, &state)
            .with_context(|| format!("Unable to write state file '{}'", path.display()))?;
    }

    Ok(())
}

fn read_config(path: &Path) -> anyhow::Result<FileConfig> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::warn!("Config file '{}' not found; using default config", path.display());
            return Ok(FileConfig::default());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Unable to read config file '{}'", path.display()));
        }
    };

    toml::from_str(&text)
        .with_context(|| format!("Unable to parse config file '{}'", path.display()))
}

fn run_script(host: &mut HostCore, script: &Script, frames: u32) -> anyhow::Result<AudioSummary> {
    let mut audio_output = DigestAudioOutput::new();
    for frame in 0..frames {
        let events = script.frame_events(frame);
        if let Some(cycle) = events.reset_cycle {
            host.schedule_reset(cycle);
        }

        host.run_frame(&events.writes, &mut audio_output)?;
    }

    Ok(audio_output.finish())
}

fn verify_round_trip(host: &HostCore, format: StateFormat) -> anyhow::Result<()> {
    let state = host.save_state(format)?;

    let mut original = host.clone();
    let mut restored = HostCore::new(host.config());
    restored.load_state(format, &state).context("Unable to load a state that was just saved")?;

    let expected = run_script(&mut original, &Script::default(), 1)?;
    let actual = run_script(&mut restored, &Script::default(), 1)?;
    if actual != expected {
        bail!("Restored core produced different samples: expected {expected}, got {actual}");
    }

    if restored.save_state(format)? != original.save_state(format)? {
        bail!("Restored core state differs from the original after one frame");
    }

    Ok(())
}
