// crates/seekmark-media/src/error.rs

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    /// Missing file, unparsable container, or no video stream.
    #[error("unreadable media {path}: {reason}")]
    UnreadableMedia { path: PathBuf, reason: String },
    #[error("decode error: {0}")]
    Decode(String),
    #[error("container seek failed: {0}")]
    Seek(String),
    #[error("stream handle is closed")]
    Closed,
    #[error("no frame has been decoded yet")]
    NoFrame,
    #[error("png encode failed: {0}")]
    Png(#[from] png::EncodingError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MediaError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        MediaError::UnreadableMedia { path: path.into(), reason: reason.to_string() }
    }
}
