//! Tessera - A data-driven 2D runtime
//!
//! Reads states, levels and entity templates from the media folder and runs
//! them through the state stack. Without a display backend the frames are
//! rendered headless.

mod demo;
mod engine;
mod headless;
mod settings;

use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tessera_ecs::ScriptEngine;
use tessera_state::{Context, FileDescriptions, FlatMap, InputBindings, Registries, StateManager};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::engine::Engine;
use crate::headless::{HeadlessWindow, ScriptedKey};
use crate::settings::EngineSettings;

/// Command line options. Anything given here overrides the settings file.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Cli {
    /// Settings file (default: <config dir>/tessera/settings.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Media root folder
    #[arg(short, long)]
    media: Option<PathBuf>,

    /// First state to push
    #[arg(short, long)]
    state: Option<String>,

    /// Stop after this many frames
    #[arg(short, long)]
    frames: Option<u64>,

    /// Fixed frame delta in seconds instead of wall-clock time
    #[arg(long)]
    delta: Option<f32>,

    /// Press a key on a frame, as FRAME:KEY (repeatable)
    #[arg(short, long = "press", value_name = "FRAME:KEY")]
    presses: Vec<ScriptedKey>,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    write_config: bool,

    /// Write the loaded key bindings, normalized, to PATH and exit
    #[arg(long, value_name = "PATH")]
    write_input: Option<PathBuf>,
}

fn init_logging(default_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;
    Ok(())
}

fn write_input(bindings: &InputBindings, path: &Path) -> Result<()> {
    let json = serde_json::Value::from(bindings.save_configuration());
    let content = serde_json::to_string_pretty(&json)?;
    fs::write(path, content).with_context(|| format!("Failed to write input bindings to {:?}", path))?;
    info!(bound = bindings.len(), "Saved input bindings to {:?}", path);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.config.clone().or_else(EngineSettings::settings_path);
    let loaded = settings_path.as_deref().map(EngineSettings::read);
    let mut settings = match &loaded {
        Some(Ok(Some(settings))) => settings.clone(),
        _ => EngineSettings::default(),
    };

    init_logging(&settings.log.level)?;

    match (&settings_path, loaded) {
        (None, _) => warn!("Could not determine config directory"),
        (Some(path), Some(Ok(Some(_)))) => info!("Loaded settings from {:?}", path),
        (Some(path), Some(Err(e))) => {
            warn!("Failed to load settings from {:?}: {}, using defaults", path, e)
        }
        _ => info!("No settings file found, using defaults"),
    }

    if let Some(media) = cli.media {
        settings.media.root = media;
    }
    if let Some(state) = cli.state {
        settings.run.initial_state = state;
    }
    if cli.frames.is_some() {
        settings.run.max_frames = cli.frames;
    }
    if cli.delta.is_some() {
        settings.run.fixed_delta = cli.delta;
    }

    if cli.write_config {
        let path = settings_path.context("No settings path to write to")?;
        settings.save_to(&path)?;
        return Ok(());
    }

    info!("Starting {}", settings.window.title);

    let paths = settings.media.paths();
    let scripts = demo::script_engine();
    for name in paths.script_names() {
        if !scripts.has_module(&name) {
            warn!(module = %name, "script file found but no engine module is registered for it");
        }
    }

    let registries = Registries::builtin();
    let map = FlatMap::new(settings.run.map_layers).with_folder(paths.maps.clone());
    let mut context = Context::new(
        &registries,
        Box::new(FileDescriptions::new(paths)),
        Rc::new(scripts),
        Box::new(map),
    );
    let bound = context
        .load_input_bindings()
        .context("Failed to read input bindings")?;
    debug!(bound, "input ready");

    if let Some(path) = cli.write_input {
        return write_input(&context.input, &path);
    }

    let mut states = StateManager::new(Rc::clone(&registries.states), context);
    states
        .push(&settings.run.initial_state)
        .with_context(|| format!("Failed to start in state '{}'", settings.run.initial_state))?;

    let mut window = HeadlessWindow::new(settings.window.title.clone());
    for press in &cli.presses {
        window.press(press);
    }
    info!(
        width = settings.window.width,
        height = settings.window.height,
        "Window created"
    );

    let mut engine = Engine::new(
        window,
        states,
        settings.run.clock(),
        settings.window.clear_color(),
    );
    engine.run(settings.run.fixed_delta, settings.run.max_frames);

    let window = engine.window();
    debug!(
        commands = window.commands().len(),
        clear_color = ?window.clear_color(),
        "last frame"
    );
    info!(
        frames = window.frames_presented(),
        total_time = engine.clock().total_time,
        stack = ?engine.states().names(),
        "Shutting down"
    );
    Ok(())
}
