// crates/seekmark-cli/src/main.rs

mod app;
mod cli;
mod helpers;
mod paths;
mod settings;

use std::io;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use seekmark_core::state::{Project, VideoEntry};
use seekmark_media::{MediaWorker, StreamOpener, SyntheticOpener};

use crate::app::App;
use crate::cli::CliArgs;

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_tracing(args.verbose);

    let settings = settings::resolve(&args)?;
    let project_file = args.project_file();
    let mut project = Project::load(&project_file)
        .with_context(|| format!("loading {}", project_file.display()))?;

    let videos = paths::discover_videos(&args.folder);
    project.merge_videos(&args.folder, &videos);
    if args.synthetic.is_some() && project.entries.is_empty() {
        project.entries.push(VideoEntry::new("synthetic.mp4"));
    }
    info!(
        folder  = %args.folder.display(),
        found   = videos.len(),
        entries = project.entries.len(),
        "project ready"
    );

    let opener = build_opener(&args)?;
    let worker = MediaWorker::new(project, args.folder.clone(), settings, opener);

    let stdin = io::stdin();
    let mut app = App::new(worker, project_file, io::stdout());
    app.run(stdin.lock())
}

/// Logs go to stderr so they never interleave with the status lines.
fn init_tracing(verbose: u8) {
    let fallback = match verbose {
        0 => "seekmark=info,seekmark_media=info,seekmark_core=warn",
        1 => "seekmark=debug,seekmark_media=debug,seekmark_core=debug",
        _ => "seekmark=trace,seekmark_media=trace,seekmark_core=trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| fallback.into()))
        .with(fmt::layer().with_writer(io::stderr))
        .init();
}

fn build_opener(args: &CliArgs) -> Result<Arc<dyn StreamOpener>> {
    match &args.synthetic {
        Some(spec) => {
            info!(frames = spec.frame_count, fps = spec.fps, "using synthetic streams");
            Ok(Arc::new(SyntheticOpener::new(spec.clone())))
        }
        None => file_opener(),
    }
}

#[cfg(feature = "ffmpeg")]
fn file_opener() -> Result<Arc<dyn StreamOpener>> {
    Ok(Arc::new(seekmark_media::FfmpegOpener))
}

#[cfg(not(feature = "ffmpeg"))]
fn file_opener() -> Result<Arc<dyn StreamOpener>> {
    anyhow::bail!("built without the `ffmpeg` feature; rebuild with it or pass --synthetic FRAMES@FPS")
}
