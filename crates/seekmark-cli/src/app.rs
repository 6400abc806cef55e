// crates/seekmark-cli/src/app.rs
//
// Line-oriented front end: one command per line on stdin, results from the
// media worker printed as they arrive. Every navigation goes through the
// worker's request API, so rapid input collapses exactly like key repeat.

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossbeam_channel::RecvTimeoutError;
use tracing::{debug, warn};

use seekmark_core::annotations::Direction;
use seekmark_core::helpers::time::format_timecode;
use seekmark_core::media_types::{FrameImage, MediaResult};
use seekmark_media::snapshot::save_png;
use seekmark_media::MediaWorker;

use crate::helpers::format::{event_rows, label_rows, overlay_summary, status_line};

const FRAME_WAIT: Duration = Duration::from_secs(10);

pub const HELP: &str = "\
commands:
  load N | next-file | prev-file       open video N (1-based) / cycle videos
  seek F | home | end                  go to frame F / first / last
  fwd [fine] [drag] | back [fine] [drag]
                                       coarse (or single-frame) step; drag moves the active event
  step N [drag]                        relative move by N frames
  event next|prev [match]              jump between events (match: same label, confidence filter)
  event add | event rm                 insert event here / remove active event
  event label TEXT | event confirm     edit active event
  event assign I                       move event I (0-based) to this frame
  events                               list events
  point set X Y | point rm             place / remove active label's point on this frame
  point next|prev                      jump between frames with points
  label add NAME | label rm | label next|prev | labels
  save | png PATH | cancel | status | help | quit";

// ── Input parsing ─────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Load(usize),
    RotateLoad(Direction),
    Seek(u64),
    Home,
    End,
    Step { direction: Direction, fine: bool, drag: bool },
    Relative { step: i64, drag: bool },
    EventRotate { direction: Direction, matching: bool },
    EventAdd,
    EventRemove,
    EventLabel(String),
    EventConfirm,
    EventAssign(usize),
    Events,
    PointSet { x: f64, y: f64 },
    PointRemove,
    PointRotate(Direction),
    LabelAdd(String),
    LabelRemove,
    LabelRotate(Direction),
    Labels,
    Save,
    Png(PathBuf),
    Cancel,
    Status,
    Help,
    Quit,
}

fn direction(word: Option<&str>) -> Result<Direction, String> {
    match word {
        Some("next") => Ok(Direction::Forward),
        Some("prev") => Ok(Direction::Backward),
        other => Err(format!("expected next|prev, got {:?}", other.unwrap_or(""))),
    }
}

fn number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> Result<T, String> {
    let word = word.ok_or_else(|| format!("missing {what}"))?;
    word.parse().map_err(|_| format!("'{word}' is not a valid {what}"))
}

pub fn parse_command(line: &str) -> Result<Input, String> {
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else { return Err("empty command".into()) };
    let rest: Vec<&str> = words.collect();
    let flag = |name: &str| rest.contains(&name);
    let first = rest.first().copied();

    let input = match head {
        "load" => {
            let n: usize = number(first, "file number")?;
            if n == 0 {
                return Err("file numbers start at 1".into());
            }
            Input::Load(n - 1)
        }
        "next-file" => Input::RotateLoad(Direction::Forward),
        "prev-file" => Input::RotateLoad(Direction::Backward),
        "seek" => Input::Seek(number(first, "frame")?),
        "home" => Input::Home,
        "end" => Input::End,
        "fwd" | "back" => Input::Step {
            direction: Direction::from_forward(head == "fwd"),
            fine:      flag("fine"),
            drag:      flag("drag"),
        },
        "step" => Input::Relative { step: number(first, "step")?, drag: flag("drag") },
        "event" => match first {
            Some("next") | Some("prev") => Input::EventRotate {
                direction: direction(first)?,
                matching:  rest.get(1) == Some(&"match"),
            },
            Some("add") => Input::EventAdd,
            Some("rm") => Input::EventRemove,
            Some("label") => Input::EventLabel(rest[1..].join(" ")),
            Some("confirm") => Input::EventConfirm,
            Some("assign") => Input::EventAssign(number(rest.get(1).copied(), "event index")?),
            other => return Err(format!("unknown event command {:?}", other.unwrap_or(""))),
        },
        "events" => Input::Events,
        "point" => match first {
            Some("set") => Input::PointSet {
                x: number(rest.get(1).copied(), "x")?,
                y: number(rest.get(2).copied(), "y")?,
            },
            Some("rm") => Input::PointRemove,
            Some("next") | Some("prev") => Input::PointRotate(direction(first)?),
            other => return Err(format!("unknown point command {:?}", other.unwrap_or(""))),
        },
        "label" => match first {
            Some("add") if rest.len() > 1 => Input::LabelAdd(rest[1..].join(" ")),
            Some("rm") => Input::LabelRemove,
            Some("next") | Some("prev") => Input::LabelRotate(direction(first)?),
            other => return Err(format!("unknown label command {:?}", other.unwrap_or(""))),
        },
        "labels" => Input::Labels,
        "save" => Input::Save,
        "png" => Input::Png(PathBuf::from(first.ok_or("missing output path")?)),
        "cancel" => Input::Cancel,
        "status" => Input::Status,
        "help" | "?" => Input::Help,
        "quit" | "exit" | "q" => Input::Quit,
        other => return Err(format!("unknown command '{other}' (try help)")),
    };
    Ok(input)
}

// ── App ───────────────────────────────────────────────────────────────────────

/// What is currently on "screen".
#[derive(Default)]
struct View {
    file_id:     Option<usize>,
    frame:       u64,
    frame_count: u64,
    fps:         f64,
    image:       Option<Arc<FrameImage>>,
}

pub struct App<W: Write> {
    worker:       MediaWorker,
    project_file: PathBuf,
    out:          W,
    point_label:  usize,
    view:         View,
    frame_wait:   Duration,
}

impl<W: Write> App<W> {
    pub fn new(worker: MediaWorker, project_file: PathBuf, out: W) -> Self {
        Self {
            worker,
            project_file,
            out,
            point_label: 0,
            view:        View::default(),
            frame_wait:  FRAME_WAIT,
        }
    }

    pub fn with_frame_wait(mut self, wait: Duration) -> Self {
        self.frame_wait = wait;
        self
    }

    pub fn run<R: BufRead>(&mut self, input: R) -> Result<()> {
        if self.worker.entry_count() > 0 {
            if self.worker.rotate_load(Direction::Forward).is_some() {
                self.pump(true)?;
            }
        } else {
            writeln!(self.out, "{}", status_line(None, 0, 0, 0, &self.worker.folder()))?;
        }
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(Input::Quit) => break,
                Ok(input) => {
                    let expect_frame = self.apply(input)?;
                    self.pump(expect_frame)?;
                }
                Err(msg) => writeln!(self.out, "error: {msg}")?,
            }
        }
        self.worker.shutdown();
        Ok(())
    }

    /// Carry out one command. Returns whether a frame result will follow.
    fn apply(&mut self, input: Input) -> Result<bool> {
        let w = &self.worker;
        let expect_frame = match input {
            Input::Load(id) => {
                if id >= w.entry_count() {
                    writeln!(self.out, "error: no file {}", id + 1)?;
                    false
                } else {
                    w.request_load(id);
                    true
                }
            }
            Input::RotateLoad(d) => {
                let found = w.rotate_load(d).is_some();
                if !found {
                    writeln!(self.out, "no readable videos")?;
                }
                found
            }
            Input::Seek(frame) => {
                let frame = match w.active_video() {
                    Some(v) if v.frame_count > 0 => frame.clamp(1, v.frame_count),
                    _ => frame.max(1),
                };
                w.request_seek(frame);
                true
            }
            Input::Home => {
                w.seek_home();
                true
            }
            Input::End => {
                w.seek_end();
                w.active_video().is_some_and(|v| v.frame_count > 0)
            }
            Input::Step { direction, fine, drag } => w.step(direction, fine, drag).is_some(),
            Input::Relative { step, drag } => w.relative_seek(step, drag).is_some(),
            Input::EventRotate { direction, matching } => w.rotate_event(direction, matching).is_some(),
            Input::EventAdd => w.insert_event().is_some(),
            Input::EventRemove => w.remove_event().is_some(),
            Input::EventLabel(text) => {
                if !w.set_event_label(&text) {
                    writeln!(self.out, "no active event")?;
                }
                false
            }
            Input::EventConfirm => {
                if !w.confirm_event() {
                    writeln!(self.out, "no detected event to confirm")?;
                }
                false
            }
            Input::EventAssign(index) => w.assign_event(index).is_some(),
            Input::Events => {
                self.print_events()?;
                false
            }
            Input::PointSet { x, y } => {
                let label = self.point_label;
                let has_label = w.with_project(|p| label < p.labels.len());
                if !has_label {
                    writeln!(self.out, "no point labels; use `label add NAME`")?;
                    false
                } else {
                    w.upsert_point(label, x, y)
                }
            }
            Input::PointRemove => w.remove_point(self.point_label),
            Input::PointRotate(d) => w.rotate_point(d).is_some(),
            Input::LabelAdd(name) => {
                self.point_label = w.add_label(&name);
                self.print_labels()?;
                false
            }
            Input::LabelRemove => {
                let removed = w.remove_label(self.point_label);
                let n = w.with_project(|p| p.labels.len());
                self.point_label = self.point_label.min(n.saturating_sub(1));
                self.print_labels()?;
                removed
            }
            Input::LabelRotate(d) => {
                let n = w.with_project(|p| p.labels.len());
                if n > 0 {
                    let step = if d == Direction::Forward { 1 } else { n - 1 };
                    self.point_label = (self.point_label + step) % n;
                }
                self.print_labels()?;
                false
            }
            Input::Labels => {
                self.print_labels()?;
                false
            }
            Input::Save => {
                match w.save_project(&self.project_file) {
                    Ok(()) => writeln!(self.out, "saved {}", self.project_file.display())?,
                    Err(e) => writeln!(self.out, "error: {e}")?,
                }
                false
            }
            Input::Png(path) => {
                match &self.view.image {
                    Some(image) => match save_png(image, &path) {
                        Ok(()) => writeln!(self.out, "wrote {}", path.display())?,
                        Err(e) => writeln!(self.out, "error: {e}")?,
                    },
                    None => writeln!(self.out, "nothing on screen yet")?,
                }
                false
            }
            Input::Cancel => {
                w.request_cancel();
                false
            }
            Input::Status => {
                self.print_status()?;
                false
            }
            Input::Help => {
                writeln!(self.out, "{HELP}")?;
                false
            }
            Input::Quit => false,
        };
        Ok(expect_frame)
    }

    /// Print worker results. With `expect_frame`, block until a frame arrives.
    fn pump(&mut self, expect_frame: bool) -> Result<()> {
        if expect_frame {
            loop {
                match self.worker.rx.recv_timeout(self.frame_wait) {
                    Ok(msg) => {
                        let was_frame = matches!(msg, MediaResult::Frame { .. });
                        self.handle(msg)?;
                        if was_frame {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        warn!("no frame after {:?}", self.frame_wait);
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        while let Ok(msg) = self.worker.rx.try_recv() {
            self.handle(msg)?;
        }
        Ok(())
    }

    fn handle(&mut self, msg: MediaResult) -> Result<()> {
        match msg {
            MediaResult::Loaded { file_id, frame_count, fps, .. } => {
                self.view.file_id = Some(file_id);
                self.view.frame_count = frame_count;
                self.view.fps = fps;
                debug!(file_id, frame_count, fps, "loaded");
            }
            MediaResult::Frame { file_id, frame, image, overlay, success, cancelled, .. } => {
                self.view.file_id = Some(file_id);
                self.view.frame = frame;
                self.view.image = Some(image);
                self.print_status()?;
                if cancelled {
                    writeln!(self.out, "  (cancelled)")?;
                }
                if !success {
                    writeln!(self.out, "  (frame unavailable)")?;
                }
                if !overlay.is_empty() {
                    let labels = self.worker.with_project(|p| p.labels.clone());
                    writeln!(self.out, "  points: {}", overlay_summary(&overlay, &labels))?;
                }
            }
            MediaResult::Progress { frame, .. } => {
                self.view.frame = frame;
            }
            MediaResult::EventsChanged { .. } => {}
            MediaResult::Error { msg, .. } => writeln!(self.out, "error: {msg}")?,
        }
        Ok(())
    }

    fn print_status(&mut self) -> Result<()> {
        let files = self.worker.entry_count();
        let path = self.worker.current_entry().map(|e| e.path).unwrap_or_default();
        let line = status_line(self.view.file_id, files, self.view.frame, self.view.frame_count, &path);
        let tc = format_timecode(self.view.frame, self.view.fps);
        writeln!(self.out, "{line}  {tc}")?;
        Ok(())
    }

    fn print_events(&mut self) -> Result<()> {
        let Some(entry) = self.worker.current_entry() else {
            writeln!(self.out, "no video")?;
            return Ok(());
        };
        let active = entry.events.frame_to_event_index(entry.frame_id);
        for row in event_rows(&entry.events, active) {
            writeln!(self.out, "{row}")?;
        }
        Ok(())
    }

    fn print_labels(&mut self) -> Result<()> {
        let labels = self.worker.with_project(|p| p.labels.clone());
        for row in label_rows(&labels, self.point_label) {
            writeln!(self.out, "{row}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seekmark_core::settings::Settings;
    use seekmark_core::state::{Project, VideoEntry};
    use seekmark_media::{StreamOpener, SyntheticOpener, SyntheticSpec};

    #[test]
    fn parses_navigation() {
        assert_eq!(parse_command("load 2"), Ok(Input::Load(1)));
        assert!(parse_command("load 0").is_err());
        assert_eq!(parse_command("seek 75"), Ok(Input::Seek(75)));
        assert_eq!(
            parse_command("fwd fine drag"),
            Ok(Input::Step { direction: Direction::Forward, fine: true, drag: true })
        );
        assert_eq!(parse_command("step -3"), Ok(Input::Relative { step: -3, drag: false }));
        assert_eq!(parse_command("  q  "), Ok(Input::Quit));
    }

    #[test]
    fn parses_annotation_commands() {
        assert_eq!(
            parse_command("event prev match"),
            Ok(Input::EventRotate { direction: Direction::Backward, matching: true })
        );
        assert_eq!(parse_command("event label heel strike"), Ok(Input::EventLabel("heel strike".into())));
        assert_eq!(parse_command("point set 1.5 2"), Ok(Input::PointSet { x: 1.5, y: 2.0 }));
        assert_eq!(parse_command("label add Left toe"), Ok(Input::LabelAdd("Left toe".into())));
        assert!(parse_command("point set 1").is_err());
        assert!(parse_command("warp 9").is_err());
    }

    fn app(out: Vec<u8>) -> App<Vec<u8>> {
        let project = Project {
            labels:  vec!["Nose".into()],
            entries: vec![VideoEntry::new("a.mp4"), VideoEntry::new("b.mp4")],
        };
        let opener: Arc<dyn StreamOpener> =
            Arc::new(SyntheticOpener::new(SyntheticSpec::new(100, 25.0, &[1, 50, 99])));
        let settings = Settings { tick_interval_ms: 5, ..Settings::default() };
        let worker = MediaWorker::new(project, "/videos", settings, opener);
        App::new(worker, PathBuf::from("/nonexistent/project.json"), out)
            .with_frame_wait(Duration::from_secs(5))
    }

    #[test]
    fn scripted_session() {
        let mut app = app(Vec::new());
        let script = "seek 75\nevent add\nfwd fine drag\nevents\npoint set 3 4\nend\nquit\n";
        app.run(script.as_bytes()).unwrap();
        let text = String::from_utf8(app.out.clone()).unwrap();
        assert!(text.contains("[1:2 / 1:100] a.mp4"), "{text}");
        assert!(text.contains("[1:2 / 75:100] a.mp4"), "{text}");
        assert!(text.contains("> 76 │ "), "{text}");
        assert!(text.contains("points: Nose@(3.0,4.0)"), "{text}");
        assert!(text.contains("[1:2 / 100:100] a.mp4"), "{text}");
    }
}
