// crates/seekmark-media/src/engine.rs
//
// SeekEngine: reaches an arbitrary 1-indexed frame in a stream that can only
// be entered at keyframes.
//
// Per request the engine decides between continuing to decode forward from
// the current position and a container seek, using the lazy keyframe index:
// two frames in the same known keyframe interval can be joined by linear
// decoding, anything else needs a seek. Every keyframe decoded on the way is
// recorded in the index, so navigation gets cheaper the more a video is
// explored.
//
// After the target has been found the engine keeps decoding until it has seen
// two keyframes (the one it entered on and the next one), so the interval
// following the target becomes known. Frames that pass by are never converted
// to RGBA; only the landed frame is.
//
// Corrective paths:
//   overshoot : the demuxer landed past the target: reseek, bounded, then one
//               fallback to the nearest known keyframe before giving up
//   stall     : a forward scan from a known position takes longer than
//               `stall_frames` frames' worth of wall-clock time: reseek once

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use seekmark_core::helpers::time::{estimate_seek_timestamp, frame_timestamp};
use seekmark_core::keyframes::KeyframeIndex;
use seekmark_core::media_types::FrameImage;
use seekmark_core::settings::Settings;

use crate::cancel::CancelToken;
use crate::error::MediaError;
use crate::helpers::seek::reseek;
use crate::session::VideoSession;
use crate::stream::{StreamOpener, VideoStream};

// ── Configuration & results ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekConfig {
    pub stall_frames:          f64,
    pub max_overshoot_retries: u32,
    pub second_step:           f64,
}

impl Default for SeekConfig {
    fn default() -> Self {
        SeekConfig::from(&Settings::default())
    }
}

impl From<&Settings> for SeekConfig {
    fn from(s: &Settings) -> Self {
        Self {
            stall_frames:          s.stall_frames,
            max_overshoot_retries: s.max_overshoot_retries,
            second_step:           s.second_step,
        }
    }
}

/// Counters for the work a seek actually did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SeekStats {
    pub container_seeks: u64,
    pub frames_decoded:  u64,
}

#[derive(Debug)]
pub enum SeekFailure {
    /// No video is open (unreadable file or nothing loaded).
    NoStream,
    /// The stream ended before the target was reached.
    DecodeExhausted,
    /// The demuxer kept landing past the target.
    Overshoot,
    Stream(MediaError),
}

#[derive(Debug)]
pub enum SeekStatus {
    /// Decoded up to the target.
    Landed,
    /// Target was the current position; no decoder work was done.
    Cached,
    /// Cancelled mid-scan; landed on the last decoded frame.
    Cancelled,
    Failed(SeekFailure),
}

#[derive(Debug)]
pub struct SeekOutcome {
    pub landed: u64,
    pub image:  Arc<FrameImage>,
    pub status: SeekStatus,
}

impl SeekOutcome {
    /// Cancellation counts as success: the landing is best effort, not wrong.
    pub fn success(&self) -> bool {
        !matches!(self.status, SeekStatus::Failed(_))
    }

    pub fn cancelled(&self) -> bool {
        matches!(self.status, SeekStatus::Cancelled)
    }

    fn failed(target: u64, failure: SeekFailure) -> Self {
        Self {
            landed: target,
            image:  Arc::new(FrameImage::placeholder()),
            status: SeekStatus::Failed(failure),
        }
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct SeekEngine {
    session: VideoSession,
    index:   KeyframeIndex,
    config:  SeekConfig,
    cancel:  CancelToken,
    stats:   SeekStats,
    /// Image of the frame the last successful seek landed on.
    landed:  Option<(u64, Arc<FrameImage>)>,
}

impl SeekEngine {
    pub fn new(config: SeekConfig, cancel: CancelToken) -> Self {
        Self {
            session: VideoSession::empty(""),
            index:   KeyframeIndex::new(),
            config,
            cancel,
            stats:   SeekStats::default(),
            landed:  None,
        }
    }

    /// Close the current video, then open `path` with the persisted index.
    pub fn load(&mut self, opener: &dyn StreamOpener, path: &Path, keyframes: KeyframeIndex) -> &VideoSession {
        self.session.close();
        let session = VideoSession::open(opener, path, self.config.second_step);
        self.install(session, keyframes);
        &self.session
    }

    /// Use an already opened stream as the current video.
    pub fn attach(&mut self, path: &Path, stream: Box<dyn VideoStream>, keyframes: KeyframeIndex) -> &VideoSession {
        self.session.close();
        let info = stream.info();
        let session = VideoSession {
            path:          path.to_path_buf(),
            frame_count:   info.frame_count,
            fps:           info.fps,
            frame_step:    seekmark_core::helpers::time::frame_step(info.fps, self.config.second_step),
            decoded_frame: None,
            stream:        Some(stream),
        };
        self.install(session, keyframes);
        &self.session
    }

    fn install(&mut self, session: VideoSession, keyframes: KeyframeIndex) {
        self.session = session;
        self.index = keyframes;
        self.landed = None;
    }

    pub fn session(&self) -> &VideoSession {
        &self.session
    }

    pub fn index(&self) -> &KeyframeIndex {
        &self.index
    }

    pub fn stats(&self) -> SeekStats {
        self.stats
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn set_config(&mut self, config: SeekConfig) {
        self.config = config;
    }

    pub fn close(&mut self) {
        self.session.close();
        self.landed = None;
    }

    /// Seek to `target`, reporting intermediate positions through `progress`
    /// while scanning forward from a known position.
    ///
    /// `target` is expected to be clamped by the caller; frame 0 is treated
    /// as 1 and frames past the end are attempted as given.
    /// The cancel flag is not cleared here; whoever schedules the pass owns
    /// that (see `CommandQueue::drain`), so a cancel raised just before the
    /// pass starts still stops it.
    pub fn seek(&mut self, target: u64, progress: &mut dyn FnMut(u64)) -> SeekOutcome {
        let target = target.max(1);

        if let Some((frame, image)) = &self.landed {
            if *frame == target && self.session.decoded_frame.is_some() {
                return SeekOutcome { landed: target, image: Arc::clone(image), status: SeekStatus::Cached };
            }
        }

        let fps = self.session.fps;
        let frame_count = self.session.frame_count;
        let decoded_before = self.session.decoded_frame;
        let Some(stream) = self.session.stream.as_deref_mut() else {
            debug!(target, "seek without an open stream");
            return SeekOutcome::failed(target, SeekFailure::NoStream);
        };

        if decoded_before == Some(target) {
            return match stream.current_image() {
                Ok(image) => {
                    let image = Arc::new(image);
                    self.landed = Some((target, Arc::clone(&image)));
                    SeekOutcome { landed: target, image, status: SeekStatus::Cached }
                }
                Err(e) => {
                    self.session.decoded_frame = None;
                    SeekOutcome::failed(target, SeekFailure::Stream(e))
                }
            };
        }
        if target > frame_count {
            warn!(target, frame_count, "seek past end of stream");
        }

        // ── Reseek or continue ────────────────────────────────────────────────
        let bracket   = self.index.bracket(target);
        let timestamp = estimate_seek_timestamp(target, fps);
        let needs_seek = match decoded_before {
            None => true,
            Some(d) => target < d || bracket == self.index.len() || self.index.bracket(d) != bracket,
        };
        let mut reseeked = false;
        if needs_seek {
            debug!(target, ?decoded_before, bracket, timestamp, "reseek");
            reseek(stream, timestamp, "seek");
            self.stats.container_seeks += 1;
            reseeked = true;
        }

        let live_updates = decoded_before.is_some_and(|d| target > d);
        // A known keyframe after the target means the next interval is known.
        let mut keyframes_found = if bracket < self.index.len() { 2 } else { 0 };
        let mut overshoots = 0u32;
        let mut fallback_used = false;
        let mut found: Option<FrameImage> = None;
        let mut cancelled: Option<(u64, FrameImage)> = None;
        let mut failure: Option<SeekFailure> = None;
        let started = Instant::now();

        // ── Approach the target ───────────────────────────────────────────────
        loop {
            let frame = match stream.demux_next() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    failure = Some(SeekFailure::Stream(e));
                    break;
                }
            };
            self.stats.frames_decoded += 1;
            let decoded = frame.number;
            self.session.decoded_frame = Some(decoded);

            if frame.keyframe {
                keyframes_found += 1;
                if self.index.insert(decoded) {
                    debug!(frame = decoded, "keyframe discovered");
                }
            }

            if decoded == target {
                match stream.current_image() {
                    Ok(image) => found = Some(image),
                    Err(e) => {
                        failure = Some(SeekFailure::Stream(e));
                        break;
                    }
                }
            } else if found.is_none() {
                if self.cancel.is_cancelled() {
                    match stream.current_image() {
                        Ok(image) => cancelled = Some((decoded, image)),
                        Err(e) => failure = Some(SeekFailure::Stream(e)),
                    }
                    break;
                } else if decoded > target {
                    overshoots += 1;
                    if overshoots <= self.config.max_overshoot_retries {
                        warn!(target, decoded, attempt = overshoots, "demuxer overshot, reseeking");
                        reseek(stream, timestamp, "overshoot");
                    } else if !fallback_used {
                        fallback_used = true;
                        let anchor = self.index.at_or_before(target).unwrap_or(1);
                        let ts = if anchor > 1 { frame_timestamp(anchor, fps) } else { 0 };
                        warn!(target, anchor, "overshoot retries exhausted, falling back to known keyframe");
                        reseek(stream, ts, "overshoot fallback");
                    } else {
                        failure = Some(SeekFailure::Overshoot);
                        break;
                    }
                    self.stats.container_seeks += 1;
                    reseeked = true;
                } else if !reseeked
                    && decoded < target
                    && started.elapsed().as_secs_f64() * fps >= self.config.stall_frames
                {
                    debug!(target, decoded, "forward scan stalled, reseeking");
                    reseek(stream, timestamp, "stall");
                    self.stats.container_seeks += 1;
                    reseeked = true;
                }
                if live_updates {
                    progress(decoded);
                }
            }

            if self.cancel.is_cancelled() || (found.is_some() && keyframes_found >= 2) {
                break;
            }
        }

        // ── Outcome ───────────────────────────────────────────────────────────
        let (landed, image, status) = match (found, cancelled, failure) {
            (Some(image), _, _) => (target, image, SeekStatus::Landed),
            (None, Some((frame, image)), _) => (frame, image, SeekStatus::Cancelled),
            (None, None, Some(failure)) => return self.fail(target, failure),
            (None, None, None) => return self.fail(target, SeekFailure::DecodeExhausted),
        };
        let image = Arc::new(image);
        self.landed = Some((landed, Arc::clone(&image)));
        debug!(target, landed, index = self.index.len(), "seek done");
        SeekOutcome { landed, image, status }
    }

    fn fail(&mut self, target: u64, failure: SeekFailure) -> SeekOutcome {
        warn!(target, ?failure, "seek failed");
        self.session.decoded_frame = None;
        self.landed = None;
        SeekOutcome::failed(target, failure)
    }
}
