// crates/seekmark-media/src/stream/synthetic.rs
//
// Deterministic in-memory stream: a fixed frame count, a fixed rate and an
// explicit keyframe list. Container seeks behave like a real demuxer seeking
// backward: they land on the keyframe at or before the requested timestamp.
//
// Each picture is a small solid tile whose colour encodes its frame number,
// so callers can check which frame they were handed (see `frame_of`).
//
// Knobs for exercising the seek engine's corrective paths:
//   overshoot_seeks : the next N seeks land on the keyframe AFTER the target
//   truncate_at     : demux ends early, as with a corrupt tail
//   decode_delay    : per-frame sleep, to make cancellation observable

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use std::collections::{HashMap, HashSet};

use seekmark_core::helpers::time::timestamp_frame;
use seekmark_core::media_types::FrameImage;
use tracing::trace;

use super::{DecodedFrame, StreamInfo, StreamOpener, VideoStream};
use crate::cancel::CancelToken;
use crate::error::MediaError;

const TILE: u32 = 8;

#[derive(Clone, Debug, PartialEq)]
pub struct SyntheticSpec {
    pub frame_count:     u64,
    pub fps:             f64,
    /// Sorted keyframe numbers; frame 1 is always a keyframe.
    pub keyframes:       Vec<u64>,
    pub decode_delay:    Duration,
    pub truncate_at:     Option<u64>,
    pub overshoot_seeks: usize,
}

impl SyntheticSpec {
    pub fn new(frame_count: u64, fps: f64, keyframes: &[u64]) -> Self {
        let mut keyframes = keyframes.to_vec();
        keyframes.push(1);
        keyframes.sort_unstable();
        keyframes.dedup();
        keyframes.retain(|&k| k >= 1 && k <= frame_count.max(1));
        Self {
            frame_count,
            fps,
            keyframes,
            decode_delay:    Duration::ZERO,
            truncate_at:     None,
            overshoot_seeks: 0,
        }
    }

    /// Keyframe every `interval` frames starting at 1.
    pub fn regular(frame_count: u64, fps: f64, interval: u64) -> Self {
        let interval = interval.max(1);
        let keys: Vec<u64> = (1..=frame_count).step_by(interval as usize).collect();
        Self::new(frame_count, fps, &keys)
    }

    pub fn with_decode_delay(mut self, delay: Duration) -> Self {
        self.decode_delay = delay;
        self
    }

    pub fn with_truncate_at(mut self, frame: u64) -> Self {
        self.truncate_at = Some(frame);
        self
    }

    pub fn with_overshoot_seeks(mut self, seeks: usize) -> Self {
        self.overshoot_seeks = seeks;
        self
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
#[error("invalid synthetic stream `{0}`; expected FRAMES@FPS[:K1,K2,...]")]
pub struct ParseSpecError(String);

/// `FRAMES@FPS[:K1,K2,...]`, e.g. `100@25:1,50,99`. Without a keyframe list
/// a keyframe is placed every second.
impl FromStr for SyntheticSpec {
    type Err = ParseSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSpecError(s.to_string());
        let (head, keys) = match s.split_once(':') {
            Some((head, keys)) => (head, Some(keys)),
            None => (s, None),
        };
        let (frames, fps) = head.split_once('@').ok_or_else(err)?;
        let frames: u64 = frames.trim().parse().map_err(|_| err())?;
        let fps: f64 = fps.trim().parse().map_err(|_| err())?;
        if frames == 0 || !(fps.is_finite() && fps > 0.0) {
            return Err(err());
        }
        match keys {
            Some(keys) => {
                let keys = keys
                    .split(',')
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| k.trim().parse::<u64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| err())?;
                Ok(Self::new(frames, fps, &keys))
            }
            None => Ok(Self::regular(frames, fps, fps.round() as u64)),
        }
    }
}

pub struct SyntheticStream {
    spec:            SyntheticSpec,
    /// Next frame `demux_next` will produce.
    position:        u64,
    current:         Option<u64>,
    overshoots_left: usize,
    emitted:         u64,
    cancel_after:    Option<(u64, CancelToken)>,
    open_handles:    Option<Arc<AtomicUsize>>,
    closed:          bool,
}

impl SyntheticStream {
    pub fn new(spec: SyntheticSpec) -> Self {
        let overshoots_left = spec.overshoot_seeks;
        Self {
            spec,
            position: 1,
            current: None,
            overshoots_left,
            emitted: 0,
            cancel_after: None,
            open_handles: None,
            closed: false,
        }
    }

    /// Fire `token` as soon as the `frames`-th picture has been produced.
    pub fn cancel_after(mut self, frames: u64, token: CancelToken) -> Self {
        self.cancel_after = Some((frames, token));
        self
    }

    /// Tile for frame `n`: the number is spread over the R, G and B bytes.
    pub fn pattern(n: u64) -> FrameImage {
        let rgba = [(n & 0xff) as u8, ((n >> 8) & 0xff) as u8, ((n >> 16) & 0xff) as u8, 255];
        FrameImage::solid(TILE, TILE, rgba)
    }

    /// Inverse of `pattern`.
    pub fn frame_of(image: &FrameImage) -> Option<u64> {
        let px = image.data.get(..4)?;
        if image.width != TILE || image.height != TILE {
            return None;
        }
        Some(px[0] as u64 | (px[1] as u64) << 8 | (px[2] as u64) << 16)
    }

    fn last_frame(&self) -> u64 {
        match self.spec.truncate_at {
            Some(t) => t.min(self.spec.frame_count),
            None => self.spec.frame_count,
        }
    }
}

impl VideoStream for SyntheticStream {
    fn info(&self) -> StreamInfo {
        StreamInfo { frame_count: self.spec.frame_count, fps: self.spec.fps }
    }

    fn seek_to(&mut self, timestamp: i64) -> Result<(), MediaError> {
        if self.closed {
            return Err(MediaError::Closed);
        }
        let wanted = timestamp_frame(timestamp, self.spec.fps);
        let keys = &self.spec.keyframes;
        let before = keys.partition_point(|&k| k <= wanted);
        let landing = if self.overshoots_left > 0 && before < keys.len() {
            self.overshoots_left -= 1;
            keys[before]
        } else {
            before.checked_sub(1).map(|i| keys[i]).unwrap_or(1)
        };
        trace!(timestamp, wanted, landing, "synthetic seek");
        self.position = landing;
        self.current = None;
        Ok(())
    }

    fn demux_next(&mut self) -> Result<Option<DecodedFrame>, MediaError> {
        if self.closed {
            return Err(MediaError::Closed);
        }
        if self.position > self.last_frame() {
            return Ok(None);
        }
        if !self.spec.decode_delay.is_zero() {
            std::thread::sleep(self.spec.decode_delay);
        }
        let number = self.position;
        self.position += 1;
        self.current = Some(number);
        self.emitted += 1;
        if let Some((after, token)) = &self.cancel_after {
            if self.emitted == *after {
                token.cancel();
            }
        }
        let keyframe = self.spec.keyframes.binary_search(&number).is_ok();
        Ok(Some(DecodedFrame { keyframe, number }))
    }

    fn current_image(&mut self) -> Result<FrameImage, MediaError> {
        if self.closed {
            return Err(MediaError::Closed);
        }
        self.current.map(Self::pattern).ok_or(MediaError::NoFrame)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(handles) = self.open_handles.take() {
            handles.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for SyntheticStream {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens synthetic streams by path. Unknown paths get the default spec.
pub struct SyntheticOpener {
    default:      SyntheticSpec,
    files:        HashMap<PathBuf, SyntheticSpec>,
    unreadable:   HashSet<PathBuf>,
    open_handles: Arc<AtomicUsize>,
}

impl SyntheticOpener {
    pub fn new(default: SyntheticSpec) -> Self {
        Self {
            default,
            files:        HashMap::new(),
            unreadable:   HashSet::new(),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, spec: SyntheticSpec) -> Self {
        self.files.insert(path.into(), spec);
        self
    }

    /// Make `open` fail for `path`, as for a corrupt or missing file.
    pub fn with_unreadable(mut self, path: impl Into<PathBuf>) -> Self {
        self.unreadable.insert(path.into());
        self
    }

    /// Live count of handles opened and not yet closed.
    pub fn open_handles(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.open_handles)
    }
}

impl StreamOpener for SyntheticOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoStream>, MediaError> {
        if self.unreadable.contains(path) {
            return Err(MediaError::unreadable(path, "synthetic: marked unreadable"));
        }
        let spec = self.files.get(path).unwrap_or(&self.default).clone();
        let mut stream = SyntheticStream::new(spec);
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        stream.open_handles = Some(Arc::clone(&self.open_handles));
        Ok(Box::new(stream))
    }

    fn exists(&self, path: &Path) -> bool {
        !self.unreadable.contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seekmark_core::helpers::time::{estimate_seek_timestamp, frame_timestamp};

    fn spec() -> SyntheticSpec {
        SyntheticSpec::new(100, 25.0, &[1, 50, 99])
    }

    #[test]
    fn starts_before_frame_one() {
        let mut s = SyntheticStream::new(spec());
        assert!(matches!(s.current_image(), Err(MediaError::NoFrame)));
        let f = s.demux_next().unwrap().unwrap();
        assert_eq!(f, DecodedFrame { keyframe: true, number: 1 });
        assert_eq!(SyntheticStream::frame_of(&s.current_image().unwrap()), Some(1));
    }

    #[test]
    fn seek_lands_on_prior_keyframe() {
        let mut s = SyntheticStream::new(spec());
        s.seek_to(estimate_seek_timestamp(75, 25.0)).unwrap();
        assert_eq!(s.demux_next().unwrap().unwrap().number, 50);
        s.seek_to(frame_timestamp(99, 25.0)).unwrap();
        assert_eq!(s.demux_next().unwrap().unwrap().number, 99);
        s.seek_to(0).unwrap();
        assert_eq!(s.demux_next().unwrap().unwrap().number, 1);
    }

    #[test]
    fn overshoot_lands_on_next_keyframe_once() {
        let mut s = SyntheticStream::new(spec().with_overshoot_seeks(1));
        s.seek_to(estimate_seek_timestamp(75, 25.0)).unwrap();
        assert_eq!(s.demux_next().unwrap().unwrap().number, 99);
        s.seek_to(estimate_seek_timestamp(75, 25.0)).unwrap();
        assert_eq!(s.demux_next().unwrap().unwrap().number, 50);
    }

    #[test]
    fn exhausts_at_truncation() {
        let mut s = SyntheticStream::new(spec().with_truncate_at(2));
        assert!(s.demux_next().unwrap().is_some());
        assert!(s.demux_next().unwrap().is_some());
        assert!(s.demux_next().unwrap().is_none());
    }

    #[test]
    fn cancel_after_fires_on_nth_frame() {
        let token = CancelToken::new();
        let mut s = SyntheticStream::new(spec()).cancel_after(2, token.clone());
        s.demux_next().unwrap();
        assert!(!token.is_cancelled());
        s.demux_next().unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn close_is_idempotent_and_tracked() {
        let opener = SyntheticOpener::new(spec());
        let handles = opener.open_handles();
        let mut a = opener.open(Path::new("a.mp4")).unwrap();
        assert_eq!(handles.load(Ordering::SeqCst), 1);
        a.close();
        a.close();
        assert_eq!(handles.load(Ordering::SeqCst), 0);
        assert!(matches!(a.demux_next(), Err(MediaError::Closed)));
        drop(a);
        assert_eq!(handles.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn opener_honours_unreadable() {
        let opener = SyntheticOpener::new(spec()).with_unreadable("bad.mp4");
        assert!(matches!(
            opener.open(Path::new("bad.mp4")),
            Err(MediaError::UnreadableMedia { .. })
        ));
    }

    #[test]
    fn parses_spec_strings() {
        let s: SyntheticSpec = "100@25:1,50,99".parse().unwrap();
        assert_eq!(s.keyframes, vec![1, 50, 99]);
        let r: SyntheticSpec = "100@25".parse().unwrap();
        assert_eq!(r.keyframes, vec![1, 26, 51, 76]);
        assert!("100".parse::<SyntheticSpec>().is_err());
        assert!("0@25".parse::<SyntheticSpec>().is_err());
    }
}
