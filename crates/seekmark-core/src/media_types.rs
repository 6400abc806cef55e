// crates/seekmark-core/src/media_types.rs
//
// Types that flow across the channel between seekmark-media and the front end.
// No ffmpeg, no threads. Just plain data.

use std::sync::Arc;

use crate::annotations::OverlayPoint;

/// Side length of the blank image shown when nothing could be decoded.
pub const PLACEHOLDER_SIZE: u32 = 100;

/// A decoded video frame as tightly packed RGBA rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameImage {
    pub width:  u32,
    pub height: u32,
    pub data:   Vec<u8>,
}

impl FrameImage {
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize * 4);
        Self { width, height, data }
    }

    /// Opaque black square used on failed seeks.
    pub fn placeholder() -> Self {
        let side = PLACEHOLDER_SIZE as usize;
        let data = [0, 0, 0, 255].repeat(side * side);
        Self { width: PLACEHOLDER_SIZE, height: PLACEHOLDER_SIZE, data }
    }

    /// Uniform-colour image, handy for synthetic streams.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba.repeat(width as usize * height as usize);
        Self { width, height, data }
    }

    pub fn is_placeholder(&self) -> bool {
        self.width == PLACEHOLDER_SIZE
            && self.height == PLACEHOLDER_SIZE
            && self.data.chunks_exact(4).all(|px| px == [0, 0, 0, 255])
    }
}

/// Results sent from the media worker thread to the front end.
#[derive(Clone, Debug)]
pub enum MediaResult {
    /// A `Load` finished. `frame_count == 0` means the file was unreadable.
    Loaded {
        file_id:     usize,
        frame_count: u64,
        fps:         f64,
        frame_step:  u64,
    },
    /// Frame to display: the landed frame plus the point overlay for it.
    /// On failure `image` is the placeholder and `overlay` is empty.
    Frame {
        file_id:      usize,
        frame:        u64,
        image:        Arc<FrameImage>,
        overlay:      Vec<OverlayPoint>,
        /// Event active at `frame`, for highlighting in the event list.
        active_event: Option<usize>,
        success:      bool,
        cancelled:    bool,
    },
    /// Best-effort position while a forward scan is still running.
    Progress { file_id: usize, frame: u64 },
    /// Event annotations of `file_id` changed; refresh the event list.
    EventsChanged { file_id: usize },
    Error { file_id: usize, msg: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_is_black_square() {
        let img = FrameImage::placeholder();
        assert_eq!((img.width, img.height), (100, 100));
        assert_eq!(img.data.len(), 100 * 100 * 4);
        assert!(img.is_placeholder());
        assert!(!FrameImage::solid(100, 100, [1, 2, 3, 255]).is_placeholder());
    }
}
