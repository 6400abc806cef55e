// crates/seekmark-media/src/stream/ffmpeg_backend.rs
//
// FfmpegStream: one open container + video decoder, kept alive for the whole
// time a video is active so navigation never re-opens the file.
//
// Decoding and RGBA conversion are separate steps. `demux_next` only decodes
// and keeps the last picture; `current_image` runs swscale on it. Frames the
// seek engine burns through on the way to a target are never scaled.

use std::path::{Path, PathBuf};
use std::sync::Once;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::{input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context as SwsContext, flag::Flags};
use ffmpeg::util::frame::video::Video as VideoFrame;
use tracing::{debug, warn};

use seekmark_core::helpers::time::frame_number;
use seekmark_core::media_types::FrameImage;

use super::{DecodedFrame, StreamInfo, StreamOpener, VideoStream};
use crate::error::MediaError;

static FFMPEG_INIT: Once = Once::new();

fn init_ffmpeg() {
    FFMPEG_INIT.call_once(|| {
        if let Err(e) = ffmpeg::init() {
            warn!("ffmpeg init failed: {e}");
        }
    });
}

// ── RGBA conversion ───────────────────────────────────────────────────────────

/// swscale to packed RGBA. Built on first use, since the pixel format is only
/// reliable after decoding, and rebuilt whenever the source size or format
/// changes mid-stream.
#[derive(Default)]
struct RgbaScaler {
    ctx:      Option<((Pixel, u32, u32), SwsContext)>,
    rebuilds: usize,
}

impl RgbaScaler {
    fn convert(&mut self, decoded: &VideoFrame) -> Result<FrameImage, MediaError> {
        let (w, h) = (decoded.width(), decoded.height());
        let key = (decoded.format(), w, h);
        let scaler = match &mut self.ctx {
            Some((cached, ctx)) if *cached == key => ctx,
            slot => {
                if slot.is_some() {
                    debug!(?key, "source geometry changed, rebuilding scaler");
                }
                let ctx = SwsContext::get(key.0, w, h, Pixel::RGBA, w, h, Flags::BILINEAR)
                    .map_err(|e| MediaError::Decode(e.to_string()))?;
                self.rebuilds += 1;
                &mut slot.insert((key, ctx)).1
            }
        };
        let mut out = VideoFrame::empty();
        scaler.run(decoded, &mut out).map_err(|e| MediaError::Decode(e.to_string()))?;

        let stride = out.stride(0);
        let raw    = out.data(0);
        let data: Vec<u8> = (0..h as usize)
            .flat_map(|row| {
                let s = row * stride;
                &raw[s..s + w as usize * 4]
            })
            .copied()
            .collect();
        Ok(FrameImage::new(w, h, data))
    }
}

// ── Stateful per-video decoder ────────────────────────────────────────────────

pub struct FfmpegStream {
    path:      PathBuf,
    ictx:      ffmpeg::format::context::Input,
    decoder:   ffmpeg::decoder::video::Video,
    video_idx: usize,
    start_pts: i64,
    tb_num:    i32,
    tb_den:    i32,
    info:      StreamInfo,
    /// Last picture returned by `demux_next`, unscaled.
    last:      Option<VideoFrame>,
    last_pts:  i64,
    scaler:    RgbaScaler,
    /// No packet read since open: the demuxer still sits at the start.
    untouched: bool,
    eof_sent:  bool,
    closed:    bool,
}

impl FfmpegStream {
    pub fn open(path: &Path) -> Result<Self, MediaError> {
        init_ffmpeg();
        let ictx = input(path).map_err(|e| MediaError::unreadable(path, e))?;
        let video_idx = ictx.streams().best(Type::Video)
            .ok_or_else(|| MediaError::unreadable(path, "no video stream"))?
            .index();

        let (tb_num, tb_den, start_pts, fps, frames, duration, dec_ctx) = {
            let stream = ictx.stream(video_idx)
                .ok_or_else(|| MediaError::unreadable(path, "video stream vanished"))?;
            let tb  = stream.time_base();
            let fps = f64::from(stream.avg_frame_rate());
            let start = stream.start_time();
            let start = if start == ffmpeg::ffi::AV_NOPTS_VALUE { 0 } else { start };
            let dur_secs = stream.duration() as f64 * tb.numerator() as f64
                / tb.denominator().max(1) as f64;
            let dec_ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                .map_err(|e| MediaError::unreadable(path, e))?;
            (tb.numerator(), tb.denominator(), start, fps, stream.frames(), dur_secs, dec_ctx)
        };
        let decoder = dec_ctx.decoder().video().map_err(|e| MediaError::unreadable(path, e))?;

        if !(fps.is_finite() && fps > 0.0) {
            return Err(MediaError::unreadable(path, "unknown frame rate"));
        }
        // nb_frames is not stored by every container; fall back to duration.
        let frame_count = if frames > 0 {
            frames as u64
        } else {
            let container_secs = ictx.duration() as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
            let secs = if duration > 0.0 { duration } else { container_secs };
            (secs * fps).round().max(0.0) as u64
        };
        if frame_count == 0 {
            return Err(MediaError::unreadable(path, "empty video stream"));
        }
        debug!(path = %path.display(), frame_count, fps, "opened video");

        Ok(Self {
            path: path.to_path_buf(),
            ictx,
            decoder,
            video_idx,
            start_pts,
            tb_num,
            tb_den,
            info: StreamInfo { frame_count, fps },
            last: None,
            last_pts: start_pts,
            scaler: RgbaScaler::default(),
            untouched: true,
            eof_sent: false,
            closed: false,
        })
    }

    fn next_packet(&mut self) -> Option<ffmpeg::Packet> {
        self.untouched = false;
        for (stream, packet) in self.ictx.packets().flatten() {
            if stream.index() == self.video_idx {
                return Some(packet);
            }
        }
        None
    }

    fn frame_of(&self, pts: i64) -> u64 {
        frame_number(pts, self.start_pts, self.tb_num, self.tb_den, self.info.fps)
    }
}

impl VideoStream for FfmpegStream {
    fn info(&self) -> StreamInfo {
        self.info
    }

    fn seek_to(&mut self, timestamp: i64) -> Result<(), MediaError> {
        if self.closed {
            return Err(MediaError::Closed);
        }
        if !crate::helpers::seek::seek_required(timestamp, self.untouched) {
            return Ok(());
        }
        crate::helpers::seek::seek_input(&mut self.ictx, timestamp)?;
        self.decoder.flush();
        self.last = None;
        self.eof_sent = false;
        Ok(())
    }

    fn demux_next(&mut self) -> Result<Option<DecodedFrame>, MediaError> {
        if self.closed {
            return Err(MediaError::Closed);
        }
        loop {
            let mut decoded = VideoFrame::empty();
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                // Some demuxers omit PTS on B-frames; step one tick past the last.
                let pts = decoded.timestamp().or(decoded.pts()).unwrap_or(self.last_pts + 1);
                self.last_pts = pts;
                let frame = DecodedFrame { keyframe: decoded.is_key(), number: self.frame_of(pts) };
                self.last = Some(decoded);
                return Ok(Some(frame));
            }
            if self.eof_sent {
                return Ok(None);
            }
            match self.next_packet() {
                Some(packet) => {
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        // Corrupt packets are skipped like the demuxer would.
                        debug!(path = %self.path.display(), "send_packet: {e}");
                    }
                }
                None => {
                    // Drain pictures still buffered for reordering.
                    self.decoder.send_eof().map_err(|e| MediaError::Decode(e.to_string()))?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn current_image(&mut self) -> Result<FrameImage, MediaError> {
        if self.closed {
            return Err(MediaError::Closed);
        }
        let decoded = self.last.as_ref().ok_or(MediaError::NoFrame)?;
        self.scaler.convert(decoded)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.last = None;
        self.scaler = RgbaScaler::default();
        debug!(path = %self.path.display(), "closed video");
    }
}

/// Opens real files through ffmpeg.
#[derive(Clone, Copy, Debug, Default)]
pub struct FfmpegOpener;

impl StreamOpener for FfmpegOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoStream>, MediaError> {
        Ok(Box::new(FfmpegStream::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaler_follows_geometry_changes() {
        let mut scaler = RgbaScaler::default();
        let image = scaler.convert(&VideoFrame::new(Pixel::YUV420P, 64, 48)).unwrap();
        assert_eq!((image.width, image.height), (64, 48));
        assert_eq!(image.data.len(), 64 * 48 * 4);

        scaler.convert(&VideoFrame::new(Pixel::YUV420P, 64, 48)).unwrap();
        assert_eq!(scaler.rebuilds, 1);

        let image = scaler.convert(&VideoFrame::new(Pixel::YUV420P, 32, 16)).unwrap();
        assert_eq!((image.width, image.height), (32, 16));
        assert_eq!(scaler.rebuilds, 2);

        scaler.convert(&VideoFrame::new(Pixel::RGB24, 32, 16)).unwrap();
        assert_eq!(scaler.rebuilds, 3);
    }
}
