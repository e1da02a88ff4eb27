//! Clock-driven task queue for voice cleanup and melody triggers
//!
//! Tasks are kept sorted by deadline. Each voice-lifecycle task is keyed
//! by note and carries the id of the voice it was scheduled for, so
//! cancelling or superseding one note never touches another.

use crate::synth::{NoteName, VoiceId};

/// What a task does when its deadline passes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskAction {
    /// Natural end of the envelope: drop the voice from the registry
    Expire(VoiceId),
    /// End of a key-release fade: stop the oscillators and drop the voice
    Discard(VoiceId),
    /// Melody step: start the note
    Trigger,
}

impl TaskAction {
    fn is_lifecycle(&self) -> bool {
        matches!(self, TaskAction::Expire(_) | TaskAction::Discard(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Task {
    pub deadline: f64,
    pub note: NoteName,
    pub action: TaskAction,
}

/// Pending tasks, earliest deadline first
#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: f64, note: NoteName, action: TaskAction) {
        let idx = self.tasks.partition_point(|t| t.deadline <= deadline);
        self.tasks.insert(idx, Task { deadline, note, action });
    }

    /// Cancel the cleanup/release work pending for `note`
    pub fn cancel_lifecycle(&mut self, note: &NoteName) -> usize {
        let before = self.tasks.len();
        self.tasks
            .retain(|t| !(t.note == *note && t.action.is_lifecycle()));
        before - self.tasks.len()
    }

    /// Cancel every pending melody trigger
    pub fn cancel_triggers(&mut self) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.action != TaskAction::Trigger);
        before - self.tasks.len()
    }

    /// Remove and return the earliest task due at `now`
    pub fn pop_due(&mut self, now: f64) -> Option<Task> {
        match self.tasks.first() {
            Some(task) if task.deadline <= now => Some(self.tasks.remove(0)),
            _ => None,
        }
    }

    pub fn pending_triggers(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.action == TaskAction::Trigger)
            .count()
    }

    pub fn deadline_for(&self, note: &NoteName) -> Option<f64> {
        self.tasks
            .iter()
            .find(|t| t.note == *note && t.action.is_lifecycle())
            .map(|t| t.deadline)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
