// crates/seekmark-core/src/helpers/time.rs
//
// Frame-number ↔ timestamp arithmetic shared by the stream backends and the
// seek engine. Timestamps for container seeks are in TIME_BASE units
// (microseconds, the same unit ffmpeg's AV_TIME_BASE uses) so that this
// crate never needs to link ffmpeg.
//
// Frame numbers are 1-indexed everywhere: frame 1 starts at timestamp 0.

/// Container-level seek timestamp units per second.
pub const TIME_BASE: i64 = 1_000_000;

/// Frame number of a decoded picture from its presentation timestamp.
///
/// Decode order and presentation order differ for B-frames, and the decoder's
/// own counter resets on every seek, so the number is always derived from the
/// PTS relative to the stream start.
///
/// ```
/// use seekmark_core::helpers::time::frame_number;
/// // 1/12800 time base, 25 fps: one frame every 512 ticks.
/// assert_eq!(frame_number(0,    0, 1, 12800, 25.0), 1);
/// assert_eq!(frame_number(512,  0, 1, 12800, 25.0), 2);
/// assert_eq!(frame_number(1536, 512, 1, 12800, 25.0), 3);
/// ```
pub fn frame_number(pts: i64, start_pts: i64, tb_num: i32, tb_den: i32, fps: f64) -> u64 {
    if tb_den == 0 {
        return 1;
    }
    let secs = (pts - start_pts) as f64 * tb_num as f64 / tb_den as f64;
    let n = (secs * fps).round() + 1.0;
    n.max(1.0) as u64
}

/// Timestamp to hand to a container seek so that `target` is the frame
/// decoded right after landing: aim one frame early (and mind the 1-index),
/// floored, never negative.
///
/// ```
/// use seekmark_core::helpers::time::estimate_seek_timestamp;
/// assert_eq!(estimate_seek_timestamp(75, 25.0), 2_920_000);
/// assert_eq!(estimate_seek_timestamp(1, 25.0), 0);
/// assert_eq!(estimate_seek_timestamp(2, 25.0), 0);
/// ```
pub fn estimate_seek_timestamp(target: u64, fps: f64) -> i64 {
    if fps <= 0.0 {
        return 0;
    }
    let ts = ((target as f64 - 2.0) * TIME_BASE as f64 / fps).floor();
    ts.max(0.0) as i64
}

/// Timestamp at which `frame` starts.
///
/// ```
/// use seekmark_core::helpers::time::frame_timestamp;
/// assert_eq!(frame_timestamp(1, 25.0), 0);
/// assert_eq!(frame_timestamp(50, 25.0), 1_960_000);
/// ```
pub fn frame_timestamp(frame: u64, fps: f64) -> i64 {
    if fps <= 0.0 || frame <= 1 {
        return 0;
    }
    ((frame - 1) as f64 * TIME_BASE as f64 / fps).floor() as i64
}

/// Frame showing at timestamp `ts` (inverse of `frame_timestamp`).
pub fn timestamp_frame(ts: i64, fps: f64) -> u64 {
    if fps <= 0.0 || ts <= 0 {
        return 1;
    }
    // frame_timestamp floors, so allow for a sub-tick shortfall.
    (ts as f64 * fps / TIME_BASE as f64 + 1e-3).floor() as u64 + 1
}

/// Coarse navigation step in frames for a `second_step`-second jump.
pub fn frame_step(fps: f64, second_step: f64) -> u64 {
    if fps <= 0.0 {
        return 0;
    }
    (fps * second_step).round().max(1.0) as u64
}

/// Format a 1-indexed frame as `MM:SS:FF` at the stream's own rate.
///
/// ```
/// use seekmark_core::helpers::time::format_timecode;
/// assert_eq!(format_timecode(1,    25.0), "00:00:00");
/// assert_eq!(format_timecode(27,   25.0), "00:01:01");
/// assert_eq!(format_timecode(1501, 25.0), "01:00:00");
/// ```
pub fn format_timecode(frame: u64, fps: f64) -> String {
    if fps <= 0.0 {
        return "--:--:--".to_string();
    }
    let index = frame.saturating_sub(1);
    let per_sec = fps.round().max(1.0) as u64;
    let secs = (index as f64 / fps) as u64;
    let m  = secs / 60;
    let sc = secs % 60;
    let fr = index % per_sec;
    format!("{m:02}:{sc:02}:{fr:02}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_through_frame() {
        for fps in [23.976, 25.0, 29.97, 30.0, 59.94] {
            for frame in [1u64, 2, 49, 50, 51, 99, 1000, 54_321] {
                let ts = frame_timestamp(frame, fps);
                assert_eq!(timestamp_frame(ts, fps), frame, "fps {fps} frame {frame}");
            }
        }
    }

    #[test]
    fn estimate_lands_one_frame_early() {
        let ts = estimate_seek_timestamp(75, 25.0);
        assert_eq!(timestamp_frame(ts, 25.0), 74);
    }

    #[test]
    fn frame_number_handles_pts_before_start() {
        assert_eq!(frame_number(-512, 0, 1, 12800, 25.0), 1);
        assert_eq!(frame_number(100, 0, 1, 0, 25.0), 1);
    }

    #[test]
    fn frame_step_rounds() {
        assert_eq!(frame_step(29.97, 5.0), 150);
        assert_eq!(frame_step(25.0, 0.01), 1);
        assert_eq!(frame_step(0.0, 5.0), 0);
    }
}
