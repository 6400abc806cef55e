// crates/seekmark-media/src/coalescer.rs
//
// CommandQueue: collapses bursts of navigation requests into the latest
// intent.
//
// The interactive side pushes; the worker's tick drains. A pending load wins
// over everything queued (seeks meant for the old video are meaningless once
// a new one opens); otherwise only the most recent seek survives. The mutex
// guards queue bookkeeping only and is never held while decoding.
//
// The queue also owns the in-flight cancel flag: a push raises it and a drain
// clears it, both under the lock. A command pushed after a drain therefore
// always cancels the pass that drain started, and one pushed before it is
// part of that pass.

use std::collections::VecDeque;

use parking_lot::Mutex;

use seekmark_core::commands::Command;

use crate::cancel::CancelToken;

/// What one tick should do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Drained {
    Load { file_id: usize },
    Seek { frame: u64 },
    Idle,
}

#[derive(Default)]
struct Pending {
    queue:         VecDeque<Command>,
    loads_pending: usize,
    seeks_pending: usize,
    closed:        bool,
}

pub struct CommandQueue {
    inner:  Mutex<Pending>,
    cancel: CancelToken,
}

impl CommandQueue {
    /// `cancel` is the flag the seek engine polls.
    pub fn new(cancel: CancelToken) -> Self {
        Self { inner: Mutex::new(Pending::default()), cancel }
    }

    /// Queue `command` and cancel whatever pass is in flight. Ignored once
    /// the queue is closed.
    pub fn push(&self, command: Command) {
        let mut p = self.inner.lock();
        if p.closed {
            return;
        }
        self.cancel.cancel();
        match command {
            Command::Load(_) => p.loads_pending += 1,
            Command::Seek(_) => p.seeks_pending += 1,
        }
        p.queue.push_back(command);
    }

    /// Collapse everything queued into at most one action and clear the
    /// cancel flag for the pass about to run. A closed queue stays cancelled
    /// and drains to `Idle`.
    pub fn drain(&self) -> Drained {
        let mut p = self.inner.lock();
        if p.closed {
            return Drained::Idle;
        }
        self.cancel.reset();
        if p.loads_pending > 0 {
            // Latest load wins; seeks queued around it are dropped.
            let file_id = p.queue.iter().rev().find_map(|c| match c {
                Command::Load(id) => Some(*id),
                Command::Seek(_) => None,
            });
            p.queue.clear();
            p.loads_pending = 0;
            p.seeks_pending = 0;
            return match file_id {
                Some(file_id) => Drained::Load { file_id },
                None => Drained::Idle,
            };
        }
        if p.seeks_pending > 0 {
            let frame = p.queue.iter().rev().find_map(|c| match c {
                Command::Seek(frame) => Some(*frame),
                Command::Load(_) => None,
            });
            p.queue.clear();
            p.seeks_pending = 0;
            return match frame {
                Some(frame) => Drained::Seek { frame },
                None => Drained::Idle,
            };
        }
        Drained::Idle
    }

    /// Drop everything queued and cancel for good. Used on shutdown.
    pub fn close(&self) {
        let mut p = self.inner.lock();
        p.closed = true;
        p.queue.clear();
        p.loads_pending = 0;
        p.seeks_pending = 0;
        self.cancel.cancel();
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().queue.len()
    }
}
