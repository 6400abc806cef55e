// crates/seekmark-core/src/commands.rs
//
// Navigation intents queued by the front end and consumed by the media
// worker's coalescing drain. Never persisted.

/// A queued navigation request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open the video of project entry `file_id`, then seek to its last frame.
    Load(usize),
    /// Seek the active video to a 1-indexed frame.
    Seek(u64),
}
