// crates/seekmark-cli/src/settings.rs
//
// Effective settings: defaults, then the TOML file, then command-line flags.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::debug;

use seekmark_core::settings::Settings;

use crate::cli::CliArgs;

/// Parse a settings file. Missing keys keep their defaults.
pub fn load_file(path: &Path) -> Result<Settings> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let settings: Settings = toml::from_str(&text)
        .with_context(|| format!("failed to parse config file {}", path.display()))?;
    debug!(path = %path.display(), "settings file loaded");
    Ok(settings)
}

pub fn apply_cli(settings: &mut Settings, cli: &CliArgs) {
    if let Some(v) = cli.second_step {
        settings.second_step = v;
    }
    if let Some(v) = cli.stall_frames {
        settings.stall_frames = v;
    }
    if let Some(v) = cli.tick_ms {
        settings.tick_interval_ms = v;
    }
    if let Some(v) = cli.event_threshold {
        settings.event_filter.threshold = v;
    }
    if cli.below_threshold {
        settings.event_filter.above = false;
    }
}

pub fn resolve(cli: &CliArgs) -> Result<Settings> {
    let mut settings = match &cli.config {
        Some(path) => load_file(path)?,
        None => Settings::default(),
    };
    apply_cli(&mut settings, cli);
    settings.validate()?;
    Ok(settings)
}
