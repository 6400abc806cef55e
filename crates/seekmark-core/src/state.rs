// crates/seekmark-core/src/state.rs
// Pure project data. No native handles, no threads.
// Serializable via serde in the shape the project JSON has always had:
//
//   { "labels": ["Nose", "Tail"],
//     "entries": [ { "path": "...", "frameId": 1,
//                    "points": {...}, "events": {...}, "keyframes": [...] } ] }
//
// Files ending in `.gz` are gzip-compressed JSON (the default); anything else
// is plain, pretty-printed JSON.
//
// The keyframe list is written by the seek engine only; everything else is
// edited by the front end under the worker's command discipline.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::annotations::{EventSet, PointSet};
use crate::keyframes::KeyframeIndex;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("cannot read or write project file {path}: {source}")]
    Io {
        path:   PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed project file {path}: {source}")]
    Json {
        path:   PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no entry {0} in project")]
    EntryOutOfRange(usize),
}

/// One video in the project plus everything annotated on it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VideoEntry {
    /// Relative to the project folder when possible.
    pub path:      PathBuf,
    /// Last viewed (or last requested) frame, 1-indexed.
    #[serde(rename = "frameId", default = "default_frame_id")]
    pub frame_id:  u64,
    #[serde(default, skip_serializing_if = "PointSet::is_empty")]
    pub points:    PointSet,
    #[serde(default, skip_serializing_if = "EventSet::is_empty")]
    pub events:    EventSet,
    #[serde(default)]
    pub keyframes: KeyframeIndex,
}

fn default_frame_id() -> u64 { 1 }

impl VideoEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path:      path.into(),
            frame_id:  1,
            points:    PointSet::default(),
            events:    EventSet::default(),
            keyframes: KeyframeIndex::default(),
        }
    }

    pub fn has_annotations(&self) -> bool {
        !self.events.is_empty() || !self.points.is_empty()
    }

    fn normalize(&mut self) {
        self.frame_id = self.frame_id.max(1);
        self.events.normalize();
        self.points.normalize();
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Project {
    /// Point label names; `PointSet` label ids index into this list.
    #[serde(default)]
    pub labels:  Vec<String>,
    #[serde(default)]
    pub entries: Vec<VideoEntry>,
}

impl Project {
    /// Parse a project file. A missing file yields an empty project so a new
    /// name can be given on the command line.
    pub fn load(path: &Path) -> Result<Self, ProjectError> {
        if !path.is_file() {
            info!(path = %path.display(), "project file not found, starting empty");
            return Ok(Self::default());
        }
        let io_err = |source| ProjectError::Io { path: path.to_path_buf(), source };
        let text = if is_gzip(path) {
            let mut text = String::new();
            GzDecoder::new(BufReader::new(File::open(path).map_err(io_err)?))
                .read_to_string(&mut text)
                .map_err(io_err)?;
            text
        } else {
            fs::read_to_string(path).map_err(io_err)?
        };
        let project = Self::from_json(&text)
            .map_err(|source| ProjectError::Json { path: path.to_path_buf(), source })?;
        debug!(entries = project.entries.len(), "project loaded");
        Ok(project)
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let mut project: Self = serde_json::from_str(text)?;
        for entry in &mut project.entries {
            entry.normalize();
        }
        Ok(project)
    }

    /// Serialize only the entries that carry annotations; unannotated videos
    /// are rediscovered from the project folder on the next run.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.kept())
    }

    fn kept(&self) -> Project {
        Project {
            labels:  self.labels.clone(),
            entries: self.entries.iter().filter(|e| e.has_annotations()).cloned().collect(),
        }
    }

    /// Write the project, gzip-compressed when `path` ends in `.gz`.
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let io_err = |source| ProjectError::Io { path: path.to_path_buf(), source };
        let json_err = |source| ProjectError::Json { path: path.to_path_buf(), source };
        if is_gzip(path) {
            let file = File::create(path).map_err(io_err)?;
            let mut gz = GzEncoder::new(BufWriter::new(file), Compression::default());
            serde_json::to_writer(&mut gz, &self.kept()).map_err(json_err)?;
            gz.finish().map_err(io_err)?.flush().map_err(io_err)?;
        } else {
            let text = self.to_json().map_err(json_err)?;
            fs::write(path, text).map_err(io_err)?;
        }
        info!(path = %path.display(), "project saved");
        Ok(())
    }

    pub fn entry(&self, file_id: usize) -> Result<&VideoEntry, ProjectError> {
        self.entries.get(file_id).ok_or(ProjectError::EntryOutOfRange(file_id))
    }

    pub fn entry_mut(&mut self, file_id: usize) -> Result<&mut VideoEntry, ProjectError> {
        self.entries.get_mut(file_id).ok_or(ProjectError::EntryOutOfRange(file_id))
    }

    /// Make entry paths relative to `folder` and append an entry for every
    /// video not already in the project. Existing annotations are kept.
    pub fn merge_videos(&mut self, folder: &Path, videos: &[PathBuf]) {
        for entry in &mut self.entries {
            entry.path = relative_to(folder, &entry.path);
        }
        for video in videos {
            let rel = relative_to(folder, video);
            if !self.entries.iter().any(|e| e.path == rel) {
                self.entries.push(VideoEntry::new(rel));
            }
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// `path` relative to `folder` if it lives under it, otherwise unchanged.
pub fn relative_to(folder: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(folder).map(Path::to_path_buf).unwrap_or_else(|_| path.to_path_buf())
}

/// Absolute location of an entry's video.
pub fn resolve_path(folder: &Path, entry: &VideoEntry) -> PathBuf {
    if entry.path.is_absolute() {
        entry.path.clone()
    } else {
        folder.join(&entry.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "labels": ["Nose", "Tail"],
        "entries": [
            {
                "path": "a.mp4",
                "frameId": 4,
                "points": {"frames": [4, 4, 136], "labels": [0, 1, 1],
                           "x": [67.25, 476.0, 412.9], "y": [303.6, 302.6, 492.8],
                           "p": [1, 1, 1]},
                "events": {"frames": [4, 64], "labels": ["label1", "label2"], "p": [1, 1]},
                "keyframes": [0, 30, 60]
            },
            { "path": "b.mp4" }
        ]
    }"#;

    #[test]
    fn parses_existing_shape() {
        let project = Project::from_json(SAMPLE).unwrap();
        assert_eq!(project.labels, vec!["Nose", "Tail"]);
        let a = project.entry(0).unwrap();
        assert_eq!(a.frame_id, 4);
        assert_eq!(a.points.len(), 3);
        assert_eq!(a.events.frames(), &[4, 64]);
        assert!(a.events.has_confidence());
        assert_eq!(a.keyframes.as_slice(), &[0, 30, 60]);
        let b = project.entry(1).unwrap();
        assert_eq!(b.frame_id, 1);
        assert!(b.keyframes.is_empty());
        assert!(matches!(project.entry(2), Err(ProjectError::EntryOutOfRange(2))));
    }

    #[test]
    fn to_json_keeps_only_annotated_entries() {
        let project = Project::from_json(SAMPLE).unwrap();
        let out = project.to_json().unwrap();
        let back = Project::from_json(&out).unwrap();
        assert_eq!(back.entries.len(), 1);
        assert_eq!(back.entries[0].path, PathBuf::from("a.mp4"));
        assert!(out.contains("\"frameId\""));
        assert!(out.contains("\"keyframes\""));
    }

    #[test]
    fn save_and_load_via_disk() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("project.json");
        let project = Project::from_json(SAMPLE).unwrap();
        project.save(&file).unwrap();
        let back = Project::load(&file).unwrap();
        assert_eq!(back.entries[0].events.labels(), &["label1", "label2"]);
    }

    #[test]
    fn gzip_project_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("project.json.gz");
        Project::from_json(SAMPLE).unwrap().save(&file).unwrap();

        // Really compressed: gzip magic, not JSON text.
        let raw = fs::read(&file).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let back = Project::load(&file).unwrap();
        assert_eq!(back.labels, vec!["Nose", "Tail"]);
        assert_eq!(back.entries[0].events.frames(), &[4, 64]);
        assert_eq!(back.entries[0].points.len(), 3);
    }

    #[test]
    fn plain_json_written_as_gz_name_is_rejected_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("project.json.gz");
        fs::write(&file, SAMPLE).unwrap();
        assert!(matches!(Project::load(&file), Err(ProjectError::Io { .. })));
    }

    #[test]
    fn duplicate_points_collapse_on_load() {
        let project = Project::from_json(r#"{"entries": [{"path": "a.mp4",
            "points": {"frames": [4, 4], "labels": [0, 0], "x": [1.0, 2.0], "y": [0.0, 0.0]}}]}"#)
            .unwrap();
        assert_eq!(project.entries[0].points.at_frame(4).len(), 1);
    }

    #[test]
    fn missing_file_is_empty_project() {
        let dir = tempfile::tempdir().unwrap();
        let project = Project::load(&dir.path().join("new.json")).unwrap();
        assert!(project.entries.is_empty());
    }

    #[test]
    fn merge_videos_relativizes_and_appends() {
        let folder = Path::new("/data/project");
        let mut project = Project::from_json(SAMPLE).unwrap();
        project.entries[0].path = PathBuf::from("/data/project/a.mp4");
        project.merge_videos(folder, &[
            PathBuf::from("/data/project/a.mp4"),
            PathBuf::from("/data/project/sub/c.mp4"),
        ]);
        let paths: Vec<_> = project.entries.iter().map(|e| e.path.clone()).collect();
        assert_eq!(paths, vec![
            PathBuf::from("a.mp4"),
            PathBuf::from("b.mp4"),
            PathBuf::from("sub/c.mp4"),
        ]);
        assert_eq!(resolve_path(folder, &project.entries[2]), folder.join("sub/c.mp4"));
    }
}
