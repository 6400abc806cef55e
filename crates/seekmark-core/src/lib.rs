// crates/seekmark-core/src/lib.rs
//
// Plain data shared by every seekmark crate: the project model, the keyframe
// index, annotation timelines, commands and channel message types.
// No ffmpeg, no threads.

pub mod annotations;
pub mod commands;
pub mod helpers;
pub mod keyframes;
pub mod media_types;
pub mod settings;
pub mod state;

pub use annotations::{ConfidenceFilter, Direction, EventSet, OverlayPoint, PointSet};
pub use commands::Command;
pub use keyframes::KeyframeIndex;
pub use media_types::{FrameImage, MediaResult};
pub use settings::Settings;
pub use state::{Project, ProjectError, VideoEntry};
