// crates/seekmark-media/src/worker.rs
//
// MediaWorker: owns the command queue and the seek thread.
// All public API the front end calls lives here.
//
// Thread model:
//   interactive side  request_* and edit calls push a command, poke the
//                     cancel flag and mutate the project under the shared lock
//   seek thread       wakes on a fixed tick, drains the queue into at most
//                     one load or seek, drives the SeekEngine, reports back
//                     over `rx`
//
// The shared lock covers project data and queue bookkeeping only. Decoding
// runs outside it, so edits never wait for a seek to finish.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{select, tick, unbounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use seekmark_core::annotations::Direction;
use seekmark_core::commands::Command;
use seekmark_core::keyframes::KeyframeIndex;
use seekmark_core::media_types::MediaResult;
use seekmark_core::settings::Settings;
use seekmark_core::state::{resolve_path, Project, ProjectError, VideoEntry};

use crate::cancel::CancelToken;
use crate::coalescer::{CommandQueue, Drained};
use crate::engine::{SeekConfig, SeekEngine};
use crate::stream::StreamOpener;

// ── Shared state ──────────────────────────────────────────────────────────────

/// Properties of the video the seek thread has open.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ActiveVideo {
    pub file_id:     usize,
    /// 0 when the file could not be opened.
    pub frame_count: u64,
    pub fps:         f64,
    pub frame_step:  u64,
}

struct Shared {
    project: Project,
    folder:  PathBuf,
    /// Entry the front end is looking at; set as soon as a load is requested.
    active:  Option<usize>,
    /// Set once the seek thread has finished opening `active`.
    video:   Option<ActiveVideo>,
}

impl Shared {
    fn active_entry_mut(&mut self) -> Option<(usize, &mut VideoEntry)> {
        let file_id = self.active?;
        self.project.entry_mut(file_id).ok().map(|e| (file_id, e))
    }

    fn frame_count(&self, file_id: usize) -> Option<u64> {
        self.video.filter(|v| v.file_id == file_id && v.frame_count > 0).map(|v| v.frame_count)
    }
}

// ── Seek thread state ─────────────────────────────────────────────────────────

struct WorkerState {
    engine: SeekEngine,
    opener: Arc<dyn StreamOpener>,
    queue:  Arc<CommandQueue>,
    shared: Arc<Mutex<Shared>>,
    tx:     Sender<MediaResult>,
    /// Entry the engine's session belongs to. Seeks always target this one:
    /// `Shared::active` may already point at a video still waiting to load.
    loaded: Option<usize>,
}

impl WorkerState {
    /// One coalescing pass. Returns what was done.
    fn tick(&mut self) -> Drained {
        let action = self.queue.drain();
        match action {
            Drained::Load { file_id } => self.load(file_id),
            Drained::Seek { frame } => {
                if let Some(file_id) = self.loaded {
                    self.seek(file_id, frame);
                }
            }
            Drained::Idle => {}
        }
        action
    }

    fn load(&mut self, file_id: usize) {
        let lookup = {
            let shared = self.shared.lock();
            shared.project.entry(file_id)
                .map(|e| (resolve_path(&shared.folder, e), e.keyframes.clone()))
        };
        let (path, keyframes) = match lookup {
            Ok(found) => found,
            Err(e) => {
                warn!("load rejected: {e}");
                let _ = self.tx.send(MediaResult::Error { file_id, msg: e.to_string() });
                return;
            }
        };

        let session = self.engine.load(self.opener.as_ref(), &path, keyframes);
        self.loaded = Some(file_id);
        let video = ActiveVideo {
            file_id,
            frame_count: session.frame_count,
            fps:         session.fps,
            frame_step:  session.frame_step,
        };
        if video.frame_count == 0 {
            let _ = self.tx.send(MediaResult::Error {
                file_id,
                msg: format!("cannot read {}", path.display()),
            });
        }
        let _ = self.tx.send(MediaResult::Loaded {
            file_id,
            frame_count: video.frame_count,
            fps:         video.fps,
            frame_step:  video.frame_step,
        });

        // Seeks requested while the file was opening have already updated
        // frameId, so read it only now.
        let frame = {
            let mut shared = self.shared.lock();
            shared.video = Some(video);
            shared.project.entry(file_id).map(|e| e.frame_id).unwrap_or(1)
        };
        let frame = self.engine.session().clamp(i64::try_from(frame).unwrap_or(i64::MAX));
        self.seek(file_id, frame);
        let _ = self.tx.send(MediaResult::EventsChanged { file_id });
    }

    fn seek(&mut self, file_id: usize, frame: u64) {
        let tx = self.tx.clone();
        let mut progress = |f: u64| {
            let _ = tx.send(MediaResult::Progress { file_id, frame: f });
        };
        let outcome = self.engine.seek(frame, &mut progress);
        let success = outcome.success();

        let (overlay, active_event) = {
            let mut shared = self.shared.lock();
            match shared.project.entry_mut(file_id) {
                Ok(entry) => {
                    entry.keyframes = self.engine.index().clone();
                    // A queued command means this landing is already stale.
                    if success && self.queue.is_empty() {
                        entry.frame_id = outcome.landed;
                    }
                    let overlay = if success { entry.points.at_frame(outcome.landed) } else { Vec::new() };
                    (overlay, entry.events.frame_to_event_index(outcome.landed))
                }
                Err(_) => (Vec::new(), None),
            }
        };

        let _ = self.tx.send(MediaResult::Frame {
            file_id,
            frame: outcome.landed,
            cancelled: outcome.cancelled(),
            image: outcome.image,
            overlay,
            active_event,
            success,
        });
    }
}

// ── MediaWorker ───────────────────────────────────────────────────────────────

pub struct MediaWorker {
    /// Frames, progress and load results from the seek thread.
    pub rx:      Receiver<MediaResult>,
    tx:          Sender<MediaResult>,
    queue:       Arc<CommandQueue>,
    shared:      Arc<Mutex<Shared>>,
    cancel:      CancelToken,
    opener:      Arc<dyn StreamOpener>,
    settings:    Settings,
    shutdown_tx: Option<Sender<()>>,
    handle:      Option<JoinHandle<()>>,
}

impl MediaWorker {
    /// Start the seek thread. `folder` is the project folder entry paths are
    /// relative to.
    pub fn new(
        project:  Project,
        folder:   impl Into<PathBuf>,
        settings: Settings,
        opener:   Arc<dyn StreamOpener>,
    ) -> Self {
        // Unbounded: progress bursts must never block the seek thread when
        // the front end is slow to drain.
        let (tx, rx) = unbounded();
        let (shutdown_tx, shutdown_rx) = crossbeam_channel::bounded::<()>(1);
        let cancel = CancelToken::new();
        let queue  = Arc::new(CommandQueue::new(cancel.clone()));
        let shared = Arc::new(Mutex::new(Shared {
            project,
            folder: folder.into(),
            active: None,
            video:  None,
        }));

        let mut state = WorkerState {
            engine: SeekEngine::new(SeekConfig::from(&settings), cancel.clone()),
            opener: Arc::clone(&opener),
            queue:  Arc::clone(&queue),
            shared: Arc::clone(&shared),
            tx:     tx.clone(),
            loaded: None,
        };
        let interval = settings.tick_interval();

        let handle = thread::spawn(move || {
            let ticker = tick(interval);
            loop {
                select! {
                    recv(shutdown_rx) -> _ => break,
                    recv(ticker) -> _ => {
                        // A tick may be ready at the same time as shutdown.
                        if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                            break;
                        }
                        state.tick();
                    }
                }
            }
            state.engine.close();
            debug!("seek thread stopped");
        });

        Self {
            rx,
            tx,
            queue,
            shared,
            cancel,
            opener,
            settings,
            shutdown_tx: Some(shutdown_tx),
            handle:      Some(handle),
        }
    }

    /// Cancel the in-flight seek, stop the seek thread and close the video.
    pub fn shutdown(&mut self) {
        let Some(handle) = self.handle.take() else { return };
        // Cancels the in-flight pass and keeps any later tick idle.
        self.queue.close();
        // Dropping the sender wakes the select even if a send would not.
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.try_send(());
        }
        if handle.join().is_err() {
            warn!("seek thread panicked");
        }
        info!("media worker shut down");
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    /// Switch to project entry `file_id`. Supersedes every queued seek.
    pub fn request_load(&self, file_id: usize) {
        let mut shared = self.shared.lock();
        shared.active = Some(file_id);
        self.queue.push(Command::Load(file_id));
    }

    /// Seek the active video. The entry's `frameId` reflects the request
    /// immediately; the seek thread corrects it if the landing differs.
    pub fn request_seek(&self, frame: u64) {
        // frameId and the queue change under one lock so the seek thread
        // never records a stale landing over a newer request.
        let mut shared = self.shared.lock();
        if let Some((_, entry)) = shared.active_entry_mut() {
            entry.frame_id = frame;
        }
        self.queue.push(Command::Seek(frame));
    }

    /// Stop the in-flight seek where it is. Queued commands still run.
    pub fn request_cancel(&self) {
        self.cancel.cancel();
    }

    /// Re-emit the current frame, e.g. after its overlay changed.
    pub fn refresh(&self) {
        let frame = self.shared.lock().active_entry_mut().map(|(_, e)| e.frame_id);
        if let Some(frame) = frame {
            self.queue.push(Command::Seek(frame));
        }
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn active_file(&self) -> Option<usize> {
        self.shared.lock().active
    }

    pub fn active_video(&self) -> Option<ActiveVideo> {
        self.shared.lock().video
    }

    pub fn current_entry(&self) -> Option<VideoEntry> {
        self.shared.lock().active_entry_mut().map(|(_, e)| e.clone())
    }

    pub fn current_keyframe_index(&self) -> Option<KeyframeIndex> {
        self.shared.lock().active_entry_mut().map(|(_, e)| e.keyframes.clone())
    }

    pub fn entry_count(&self) -> usize {
        self.shared.lock().project.entries.len()
    }

    pub fn folder(&self) -> PathBuf {
        self.shared.lock().folder.clone()
    }

    /// Read-only access to the project under the shared lock.
    pub fn with_project<R>(&self, f: impl FnOnce(&Project) -> R) -> R {
        f(&self.shared.lock().project)
    }

    /// Mutate the active entry under the shared lock and announce the change.
    pub fn edit_entry<R>(&self, f: impl FnOnce(&mut VideoEntry) -> R) -> Option<R> {
        let (file_id, result) = {
            let mut shared = self.shared.lock();
            let (file_id, entry) = shared.active_entry_mut()?;
            (file_id, f(entry))
        };
        let _ = self.tx.send(MediaResult::EventsChanged { file_id });
        Some(result)
    }

    pub fn save_project(&self, path: &Path) -> Result<(), ProjectError> {
        self.shared.lock().project.save(path)
    }

    // ── Navigation ────────────────────────────────────────────────────────────

    /// Move `step` frames from the current position, clamped to the video.
    ///
    /// With `drag` the event active at the current frame moves along; if
    /// another event already sits on the destination nothing happens and
    /// `None` is returned.
    pub fn relative_seek(&self, step: i64, drag: bool) -> Option<u64> {
        let (file_id, target, dragged) = {
            let mut shared = self.shared.lock();
            let frame_count = shared.active.and_then(|id| shared.frame_count(id));
            let (file_id, entry) = shared.active_entry_mut()?;
            let current = entry.frame_id;
            let mut target = (current as i64).saturating_add(step).max(1) as u64;
            if let Some(n) = frame_count {
                target = target.min(n);
            }
            let mut dragged = false;
            if drag && entry.events.frame_to_event_index(current).is_some() {
                entry.events.move_event(current, target)?;
                dragged = true;
            }
            entry.frame_id = target;
            (file_id, target, dragged)
        };
        if dragged {
            let _ = self.tx.send(MediaResult::EventsChanged { file_id });
        }
        self.request_seek(target);
        Some(target)
    }

    /// Coarse step forward or backward by the video's frame step.
    pub fn step(&self, direction: Direction, fine: bool, drag: bool) -> Option<u64> {
        let step = if fine {
            1
        } else {
            self.active_video().map(|v| v.frame_step.max(1)).unwrap_or(1)
        };
        self.relative_seek(direction.sign() * step as i64, drag)
    }

    pub fn seek_home(&self) {
        self.request_seek(1);
    }

    pub fn seek_end(&self) {
        let end = {
            let shared = self.shared.lock();
            shared.active.and_then(|id| shared.frame_count(id))
        };
        if let Some(end) = end {
            self.request_seek(end);
        }
    }

    /// Load the next/previous entry whose video exists, wrapping around.
    pub fn rotate_load(&self, direction: Direction) -> Option<usize> {
        let candidate = {
            let shared = self.shared.lock();
            let n = shared.project.entries.len();
            if n == 0 {
                return None;
            }
            let start = match (shared.active, direction) {
                (Some(k), _) => k.min(n - 1),
                (None, Direction::Forward) => n - 1,
                (None, Direction::Backward) => 0,
            };
            (1..=n)
                .map(|i| match direction {
                    Direction::Forward => (start + i) % n,
                    Direction::Backward => (start + n * i - i) % n,
                })
                .find(|&k| {
                    let path = resolve_path(&shared.folder, &shared.project.entries[k]);
                    let exists = self.opener.exists(&path);
                    if !exists {
                        debug!(path = %path.display(), "skipping missing video");
                    }
                    exists
                })
        };
        if let Some(k) = candidate {
            self.request_load(k);
        }
        candidate
    }

    /// Jump to the next/previous event. With `matching`, only events with the
    /// current event's label that pass the configured confidence filter.
    pub fn rotate_event(&self, direction: Direction, matching: bool) -> Option<u64> {
        let frame = {
            let mut shared = self.shared.lock();
            let (_, entry) = shared.active_entry_mut()?;
            let filter = matching.then_some(&self.settings.event_filter);
            let k = entry.events.rotate(entry.frame_id, direction, filter)?;
            entry.events.frame(k)?
        };
        self.request_seek(frame);
        Some(frame)
    }

    /// Jump to the next/previous frame carrying point annotations.
    pub fn rotate_point(&self, direction: Direction) -> Option<u64> {
        let frame = {
            let mut shared = self.shared.lock();
            let (_, entry) = shared.active_entry_mut()?;
            entry.points.rotate(entry.frame_id, direction)?
        };
        self.request_seek(frame);
        Some(frame)
    }

    // ── Event editing ─────────────────────────────────────────────────────────

    /// Insert an event at the current frame. `None` if one is already there.
    pub fn insert_event(&self) -> Option<usize> {
        let inserted = self.edit_entry(|e| e.events.insert_event(e.frame_id)).flatten();
        if inserted.is_some() {
            self.refresh();
        }
        inserted
    }

    /// Remove the event active at the current frame and move to its
    /// neighbour. Returns the removed event's frame.
    pub fn remove_event(&self) -> Option<u64> {
        let (removed, neighbour) = self.edit_entry(|e| {
            let k = e.events.frame_to_event_index(e.frame_id)?;
            let removed = e.events.remove_at(k)?;
            // The event that followed moves into slot k; past the end, step back.
            let neighbour = e.events.frame(k)
                .or_else(|| k.checked_sub(1).and_then(|j| e.events.frame(j)));
            Some((removed, neighbour))
        })??;
        match neighbour {
            Some(frame) => self.request_seek(frame),
            None => self.refresh(),
        }
        Some(removed)
    }

    /// Set the text of the event active at the current frame.
    pub fn set_event_label(&self, text: &str) -> bool {
        self.edit_entry(|e| {
            e.events.frame_to_event_index(e.frame_id)
                .is_some_and(|k| e.events.set_label(k, text))
        })
        .unwrap_or(false)
    }

    /// Confirm a detected event (confidence 1).
    pub fn confirm_event(&self) -> bool {
        self.edit_entry(|e| {
            e.events.frame_to_event_index(e.frame_id)
                .is_some_and(|k| e.events.confirm(k))
        })
        .unwrap_or(false)
    }

    /// Retarget event `index` to the current frame. Returns its new index.
    pub fn assign_event(&self, index: usize) -> Option<usize> {
        let moved = self.edit_entry(|e| {
            let old = e.events.frame(index)?;
            e.events.move_event(old, e.frame_id)
        })?;
        if moved.is_some() {
            self.refresh();
        }
        moved
    }

    // ── Point editing ─────────────────────────────────────────────────────────

    pub fn upsert_point(&self, label: usize, x: f64, y: f64) -> bool {
        let done = self.edit_entry(|e| e.points.upsert(e.frame_id, label, x, y)).is_some();
        if done {
            self.refresh();
        }
        done
    }

    pub fn remove_point(&self, label: usize) -> bool {
        let removed = self.edit_entry(|e| e.points.remove(e.frame_id, label)).unwrap_or(false);
        if removed {
            self.refresh();
        }
        removed
    }

    /// Append a point label; returns its id.
    pub fn add_label(&self, name: &str) -> usize {
        let mut shared = self.shared.lock();
        shared.project.labels.push(name.to_string());
        shared.project.labels.len() - 1
    }

    /// Drop point label `label` and every point that used it in any entry.
    pub fn remove_label(&self, label: usize) -> bool {
        {
            let mut shared = self.shared.lock();
            if label >= shared.project.labels.len() {
                return false;
            }
            shared.project.labels.remove(label);
            for entry in &mut shared.project.entries {
                entry.points.forget_label(label);
            }
        }
        self.refresh();
        true
    }
}

impl Drop for MediaWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::synthetic::{SyntheticOpener, SyntheticSpec, SyntheticStream};
    use seekmark_core::annotations::EventSet;

    fn project(n: usize) -> Project {
        Project {
            labels:  vec!["Nose".into()],
            entries: (0..n).map(|i| VideoEntry::new(format!("v{i}.mp4"))).collect(),
        }
    }

    fn state(project: Project) -> (WorkerState, Receiver<MediaResult>) {
        state_with(project, SyntheticOpener::new(SyntheticSpec::new(100, 25.0, &[1, 50, 99])))
    }

    fn state_with(project: Project, opener: SyntheticOpener) -> (WorkerState, Receiver<MediaResult>) {
        let (tx, rx) = unbounded();
        let opener: Arc<dyn StreamOpener> = Arc::new(opener);
        let cancel = CancelToken::new();
        let state = WorkerState {
            engine: SeekEngine::new(SeekConfig::default(), cancel.clone()),
            opener,
            queue:  Arc::new(CommandQueue::new(cancel)),
            shared: Arc::new(Mutex::new(Shared {
                project,
                folder: PathBuf::from("/videos"),
                active: None,
                video:  None,
            })),
            tx,
            loaded: None,
        };
        (state, rx)
    }

    fn frames(rx: &Receiver<MediaResult>) -> Vec<u64> {
        rx.try_iter()
            .filter_map(|r| match r {
                MediaResult::Frame { frame, .. } => Some(frame),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn burst_of_seeks_decodes_once() {
        let (mut st, rx) = state(project(1));
        st.shared.lock().active = Some(0);
        st.queue.push(Command::Load(0));
        st.tick();
        let _ = frames(&rx);
        for f in [10, 20, 30] {
            st.queue.push(Command::Seek(f));
        }
        assert_eq!(st.tick(), Drained::Seek { frame: 30 });
        assert_eq!(frames(&rx), vec![30]);
        assert_eq!(st.tick(), Drained::Idle);
        assert!(frames(&rx).is_empty());
    }

    #[test]
    fn load_seeks_to_saved_frame_and_persists_keyframes() {
        let mut p = project(2);
        p.entries[1].frame_id = 75;
        let (mut st, rx) = state(p);
        st.shared.lock().active = Some(1);
        st.queue.push(Command::Seek(50));
        st.queue.push(Command::Load(1));
        assert_eq!(st.tick(), Drained::Load { file_id: 1 });

        let results: Vec<_> = rx.try_iter().collect();
        assert!(matches!(results[0], MediaResult::Loaded { file_id: 1, frame_count: 100, .. }));
        assert!(results.iter().any(|r| matches!(r, MediaResult::Frame { frame: 75, success: true, .. })));
        assert!(matches!(results.last(), Some(MediaResult::EventsChanged { file_id: 1 })));

        let shared = st.shared.lock();
        let entry = &shared.project.entries[1];
        assert_eq!(entry.frame_id, 75);
        assert_eq!(entry.keyframes.as_slice(), &[50, 99]);
    }

    #[test]
    fn frame_carries_overlay_and_active_event() {
        let mut p = project(1);
        p.entries[0].points.upsert(20, 0, 1.0, 2.0);
        p.entries[0].events = EventSet::from_pairs([(5, "a"), (15, "b")]);
        let (mut st, rx) = state(p);
        st.shared.lock().active = Some(0);
        st.queue.push(Command::Load(0));
        st.tick();
        let _: Vec<_> = rx.try_iter().collect();

        st.queue.push(Command::Seek(20));
        st.tick();
        match rx.try_recv() {
            Ok(MediaResult::Frame { frame, image, overlay, active_event, .. }) => {
                assert_eq!(frame, 20);
                assert_eq!(SyntheticStream::frame_of(&image), Some(20));
                assert_eq!(overlay.len(), 1);
                assert_eq!(active_event, Some(1));
            }
            other => panic!("expected frame, got {other:?}"),
        }
    }

    #[test]
    fn seek_lands_in_the_loaded_entry_while_another_load_is_pending() {
        let opener = SyntheticOpener::new(SyntheticSpec::new(100, 25.0, &[1, 50, 99]))
            .with_file("/videos/v1.mp4", SyntheticSpec::new(100, 25.0, &[1, 30, 60]));
        let (mut st, rx) = state_with(project(2), opener);
        st.shared.lock().active = Some(0);
        st.queue.push(Command::Load(0));
        st.tick();
        let _: Vec<_> = rx.try_iter().collect();

        // The front end switches to entry 1 while this seek of entry 0 is
        // already on its way to the engine.
        st.queue.push(Command::Seek(75));
        st.shared.lock().active = Some(1);
        assert_eq!(st.tick(), Drained::Seek { frame: 75 });

        assert!(rx.try_iter().any(|r| matches!(r, MediaResult::Frame { file_id: 0, frame: 75, .. })));
        let shared = st.shared.lock();
        assert_eq!(shared.project.entries[0].keyframes.as_slice(), &[1, 50, 99]);
        assert_eq!(shared.project.entries[0].frame_id, 75);
        assert!(shared.project.entries[1].keyframes.is_empty());
        assert_eq!(shared.project.entries[1].frame_id, 1);
    }

    #[test]
    fn unknown_entry_reports_error() {
        let (mut st, rx) = state(project(1));
        st.queue.push(Command::Load(7));
        st.tick();
        assert!(matches!(rx.try_recv(), Ok(MediaResult::Error { file_id: 7, .. })));
    }
}
