// crates/seekmark-cli/src/paths.rs
//
// Video discovery below the project folder.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "wmv", "flv", "webm", "m4v", "mpeg", "mpg", "h264",
];

pub fn is_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| VIDEO_EXTENSIONS.iter().any(|v| v.eq_ignore_ascii_case(e)))
}

/// Every video file below `folder`, recursively, in path order.
pub fn discover_videos(folder: &Path) -> Vec<PathBuf> {
    let mut videos: Vec<PathBuf> = WalkDir::new(folder)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_video(e.path()))
        .map(|e| e.into_path())
        .collect();
    videos.sort();
    videos
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn finds_videos_recursively_case_insensitive() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("sub/deeper")).unwrap();
        for name in ["b.mp4", "a.MOV", "notes.txt", "sub/c.mkv", "sub/deeper/d.h264", "sub/x.json"] {
            fs::write(root.join(name), b"").unwrap();
        }
        let found: Vec<_> = discover_videos(root)
            .into_iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(found, vec![
            PathBuf::from("a.MOV"),
            PathBuf::from("b.mp4"),
            PathBuf::from("sub/c.mkv"),
            PathBuf::from("sub/deeper/d.h264"),
        ]);
    }

    #[test]
    fn extension_check() {
        assert!(is_video(Path::new("x.WebM")));
        assert!(!is_video(Path::new("x.mp3")));
        assert!(!is_video(Path::new("mp4")));
    }
}
