// crates/seekmark-media/src/session.rs
//
// VideoSession: the currently open video. Replaced wholesale on every load;
// the previous stream handle is closed before the next one is opened so at
// most one native handle exists at a time.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use seekmark_core::helpers::time::frame_step;

use crate::stream::{StreamOpener, VideoStream};

pub struct VideoSession {
    pub path:          PathBuf,
    /// 0 when the file could not be opened.
    pub frame_count:   u64,
    pub fps:           f64,
    /// Coarse navigation step in frames.
    pub frame_step:    u64,
    /// Frame most recently produced by the decoder; `None` before the first
    /// decode, after a failed seek, and for empty sessions.
    pub decoded_frame: Option<u64>,
    pub(crate) stream: Option<Box<dyn VideoStream>>,
}

impl VideoSession {
    /// Session with no stream, as left behind by an unreadable file.
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path:          path.into(),
            frame_count:   0,
            fps:           0.0,
            frame_step:    0,
            decoded_frame: None,
            stream:        None,
        }
    }

    /// Open `path`. Unreadable media is not an error here: it yields an empty
    /// session and every later seek on it fails softly.
    pub fn open(opener: &dyn StreamOpener, path: &Path, second_step: f64) -> Self {
        match opener.open(path) {
            Ok(stream) => {
                let info = stream.info();
                info!(
                    path = %path.display(),
                    frames = info.frame_count,
                    fps = info.fps,
                    "video loaded"
                );
                Self {
                    path:          path.to_path_buf(),
                    frame_count:   info.frame_count,
                    fps:           info.fps,
                    frame_step:    frame_step(info.fps, second_step),
                    decoded_frame: None,
                    stream:        Some(stream),
                }
            }
            Err(e) => {
                warn!(path = %path.display(), "cannot open video: {e}");
                Self::empty(path)
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Clamp a possibly out-of-range frame to `[1, frame_count]`.
    pub fn clamp(&self, frame: i64) -> u64 {
        let max = self.frame_count.max(1) as i64;
        frame.clamp(1, max) as u64
    }

    pub fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.close();
        }
        self.decoded_frame = None;
    }
}

impl Drop for VideoSession {
    fn drop(&mut self) {
        self.close();
    }
}
