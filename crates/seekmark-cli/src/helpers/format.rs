// crates/seekmark-cli/src/helpers/format.rs
//
// Text rendering of the status line, event list and label list.

use std::path::Path;

use seekmark_core::annotations::{EventSet, OverlayPoint};

/// `[file i:n / frame f:count] path`, 1-indexed file number.
pub fn status_line(file_id: Option<usize>, files: usize, frame: u64, frame_count: u64, path: &Path) -> String {
    match file_id {
        Some(id) if files > 0 => format!("[{}:{} / {}:{}] {}", id + 1, files, frame, frame_count, path.display()),
        _ => "[0:0 / 0:0] No files found.".to_string(),
    }
}

/// One line per event; the active one is marked.
pub fn event_rows(events: &EventSet, active: Option<usize>) -> Vec<String> {
    (0..events.len())
        .filter_map(|i| {
            let prefix = events.row_prefix(i)?;
            let label  = events.label(i)?;
            let mark   = if active == Some(i) { '>' } else { ' ' };
            Some(format!("{mark} {prefix}{label}"))
        })
        .collect()
}

pub fn label_rows(labels: &[String], active: usize) -> Vec<String> {
    labels.iter()
        .enumerate()
        .map(|(i, name)| {
            let mark = if i == active { '>' } else { ' ' };
            format!("{mark} {i}: {name}")
        })
        .collect()
}

pub fn overlay_summary(overlay: &[OverlayPoint], labels: &[String]) -> String {
    overlay.iter()
        .map(|p| {
            let name = labels.get(p.label).map(String::as_str).unwrap_or("?");
            format!("{name}@({:.1},{:.1})", p.x, p.y)
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_formats() {
        assert_eq!(status_line(Some(0), 3, 12, 100, Path::new("a.mp4")), "[1:3 / 12:100] a.mp4");
        assert_eq!(status_line(None, 0, 1, 0, Path::new("")), "[0:0 / 0:0] No files found.");
    }

    #[test]
    fn event_rows_mark_active() {
        let events = EventSet::from_pairs([(5, "a"), (120, "b")]);
        let rows = event_rows(&events, Some(1));
        assert_eq!(rows, vec!["  005 │ a", "> 120 │ b"]);
    }

    #[test]
    fn event_rows_with_confidence() {
        let events = EventSet::with_confidence(vec![7, 12], vec!["x".into(), "y".into()], vec![0.5, 1.0]);
        let rows = event_rows(&events, None);
        assert_eq!(rows, vec!["  07 0.50 | x", "  12 1.00 | y"]);
    }

    #[test]
    fn overlay_uses_label_names() {
        let overlay = [OverlayPoint { label: 1, x: 1.0, y: 2.0, confidence: 1.0 }];
        let labels = vec!["Nose".to_string(), "Tail".to_string()];
        assert_eq!(overlay_summary(&overlay, &labels), "Tail@(1.0,2.0)");
    }
}
