// crates/seekmark-cli/src/cli.rs

use std::path::PathBuf;

use clap::{ArgAction, Parser};

use seekmark_media::SyntheticSpec;

#[derive(Debug, Parser)]
#[command(
    name = "seekmark",
    about = "Frame-accurate video navigation and event/point annotation",
    disable_help_subcommand = true
)]
pub struct CliArgs {
    /// Project folder; videos are discovered below it
    pub folder: PathBuf,

    /// Project file (defaults to <FOLDER>/project.json.gz; created on save).
    /// A `.gz` name is read and written gzip-compressed, anything else as JSON.
    #[arg(short = 'p', long = "project")]
    pub project: Option<PathBuf>,

    /// TOML settings file
    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    /// Use an in-memory stream instead of decoding files: FRAMES@FPS[:K1,K2,...]
    #[arg(long = "synthetic", value_name = "SPEC")]
    pub synthetic: Option<SyntheticSpec>,

    /// Raise log verbosity (-v debug, -vv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Coarse step in seconds
    #[arg(long = "second-step", value_parser = parse_positive_f64)]
    pub second_step: Option<f64>,

    /// Forward-decode budget in frames before a scan reseeks
    #[arg(long = "stall-frames", value_parser = parse_non_negative_f64)]
    pub stall_frames: Option<f64>,

    /// Worker tick interval in milliseconds
    #[arg(long = "tick-ms", value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: Option<u64>,

    /// Confidence threshold when jumping between matching events
    #[arg(long = "event-threshold", value_parser = parse_non_negative_f64)]
    pub event_threshold: Option<f64>,

    /// Match events at or below the threshold instead of at or above
    #[arg(long = "below-threshold")]
    pub below_threshold: bool,
}

impl CliArgs {
    pub fn project_file(&self) -> PathBuf {
        self.project.clone().unwrap_or_else(|| self.folder.join("project.json.gz"))
    }
}

fn parse_positive_f64(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(format!("'{value}' is not a positive number")),
    }
}

fn parse_non_negative_f64(value: &str) -> Result<f64, String> {
    match value.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(format!("'{value}' is not a non-negative number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_overrides_and_synthetic_spec() {
        let args = CliArgs::try_parse_from([
            "seekmark", "/data", "--synthetic", "100@25:1,50,99",
            "--stall-frames", "10", "-vv",
        ])
        .unwrap();
        assert_eq!(args.folder, PathBuf::from("/data"));
        assert_eq!(args.project_file(), PathBuf::from("/data/project.json.gz"));
        assert_eq!(args.synthetic.unwrap().keyframes, vec![1, 50, 99]);
        assert_eq!(args.stall_frames, Some(10.0));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(CliArgs::try_parse_from(["seekmark", "/d", "--second-step", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["seekmark", "/d", "--tick-ms", "0"]).is_err());
        assert!(CliArgs::try_parse_from(["seekmark", "/d", "--synthetic", "bogus"]).is_err());
    }
}
