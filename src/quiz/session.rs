use std::collections::HashMap;

use tokio::task::JoinHandle;

/// Observable quiz state of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuizPhase {
    Idle,
    Running { question_index: usize },
}

/// Result of a countdown expiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Moved on to the given question.
    Next(usize),
    /// Last question done; the session is gone.
    Ended,
    /// The countdown belongs to a session that was restarted or cancelled.
    Stale,
}

struct QuizSession {
    question_index: usize,
    total_questions: usize,
    epoch: u64,
    timer: Option<JoinHandle<()>>,
}

impl Drop for QuizSession {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Outcome of [`SessionTable::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Started {
    /// Epoch the new countdown must present.
    pub epoch: u64,
    /// A running session was replaced.
    pub restarted: bool,
}

/// Per-room quiz sessions. Each session owns at most one countdown task;
/// the epoch stamped on a session identifies the only countdown allowed to
/// drive it.
#[derive(Default)]
pub struct SessionTable {
    sessions: HashMap<String, QuizSession>,
    next_epoch: u64,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Puts the room at question 0, cancelling any running countdown first.
    pub fn start(&mut self, room_id: &str, total_questions: usize) -> Started {
        let restarted = self.cancel(room_id);
        if restarted {
            tracing::info!(room_id = %room_id, "Restarting running quiz");
        }

        self.next_epoch += 1;
        let epoch = self.next_epoch;
        self.sessions.insert(
            room_id.to_string(),
            QuizSession {
                question_index: 0,
                total_questions,
                epoch,
                timer: None,
            },
        );
        Started { epoch, restarted }
    }

    /// Hands the countdown task to its session. A handle for a session that
    /// is already gone or restarted is aborted instead.
    pub fn attach_timer(&mut self, room_id: &str, epoch: u64, timer: JoinHandle<()>) {
        match self.sessions.get_mut(room_id) {
            Some(session) if session.epoch == epoch => {
                if let Some(previous) = session.timer.replace(timer) {
                    previous.abort();
                }
            }
            _ => timer.abort(),
        }
    }

    pub fn is_current(&self, room_id: &str, epoch: u64) -> bool {
        self.sessions
            .get(room_id)
            .is_some_and(|session| session.epoch == epoch)
    }

    pub fn advance(&mut self, room_id: &str, epoch: u64) -> Advance {
        let Some(session) = self.sessions.get_mut(room_id) else {
            return Advance::Stale;
        };
        if session.epoch != epoch {
            return Advance::Stale;
        }

        if session.question_index + 1 < session.total_questions {
            session.question_index += 1;
            Advance::Next(session.question_index)
        } else {
            // The caller is the countdown itself, so release the handle
            // without aborting it.
            if let Some(mut session) = self.sessions.remove(room_id) {
                drop(session.timer.take());
            }
            Advance::Ended
        }
    }

    /// Drops the session and aborts its countdown. Returns whether one existed.
    pub fn cancel(&mut self, room_id: &str) -> bool {
        self.sessions.remove(room_id).is_some()
    }

    pub fn phase(&self, room_id: &str) -> QuizPhase {
        match self.sessions.get(room_id) {
            Some(session) => QuizPhase::Running {
                question_index: session.question_index,
            },
            None => QuizPhase::Idle,
        }
    }

    pub fn has_timer(&self, room_id: &str) -> bool {
        self.sessions
            .get(room_id)
            .and_then(|session| session.timer.as_ref())
            .is_some_and(|timer| !timer.is_finished())
    }
}
