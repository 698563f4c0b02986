//! In-memory task registry for the process engine
//!
//! Tasks live in an arena of slots; freed slots are reused so the storage stays bounded by the
//! number of tasks that are live or inside the retention window. Every mutation builds a new
//! snapshot from the previous one and swaps it into the slot, so readers always see a whole
//! record.

use crate::extractor::ProgressSample;
use crate::task::{Task, TaskStatus};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

struct Slot {
    seq: u64,
    task: Task,
}

pub struct TaskRegistry {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    next_seq: u64,
    retention: Option<Duration>,
}

impl TaskRegistry {
    /// `retention` bounds how long terminal tasks stay visible; `None` keeps them forever
    pub fn new(retention: Option<Duration>) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            next_seq: 0,
            retention,
        }
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of allocated slots, live or free
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Insert a new task under a freshly generated id.
    ///
    /// `generate` is called until it yields an id not currently tracked.
    pub fn insert_with<G, M>(&mut self, mut generate: G, make: M) -> String
    where
        G: FnMut() -> String,
        M: FnOnce(String) -> Task,
    {
        let id = loop {
            let candidate = generate();
            if !self.index.contains_key(&candidate) {
                break candidate;
            }
            debug!("Task id collision on {}, regenerating", candidate);
        };

        let mut task = make(id.clone());
        task.id = id.clone();

        let slot = Slot {
            seq: self.next_seq,
            task,
        };
        self.next_seq += 1;

        let position = match self.free.pop() {
            Some(position) => {
                self.slots[position] = Some(slot);
                position
            }
            None => {
                self.slots.push(Some(slot));
                self.slots.len() - 1
            }
        };
        self.index.insert(id.clone(), position);
        id
    }

    pub fn get(&self, id: &str) -> Option<Task> {
        let position = *self.index.get(id)?;
        self.slots[position].as_ref().map(|slot| slot.task.clone())
    }

    /// All tasks in insertion order
    pub fn list(&self) -> Vec<Task> {
        let mut live: Vec<&Slot> = self.slots.iter().flatten().collect();
        live.sort_by_key(|slot| slot.seq);
        live.into_iter().map(|slot| slot.task.clone()).collect()
    }

    /// Replace the snapshot for `id` with whatever `f` builds from the previous one.
    /// Returns false when the task is unknown or `f` declines the update.
    fn replace<F>(&mut self, id: &str, f: F) -> bool
    where
        F: FnOnce(&Task) -> Option<Task>,
    {
        let Some(&position) = self.index.get(id) else {
            return false;
        };
        let Some(slot) = self.slots[position].as_mut() else {
            return false;
        };

        match f(&slot.task) {
            Some(next) => {
                slot.task = next;
                true
            }
            None => false,
        }
    }

    /// Merge a progress tick and mark the task active.
    ///
    /// Ignored once the task is terminal. Lengths never move backwards and the completed length
    /// never exceeds a known total.
    pub fn apply_progress(&mut self, id: &str, sample: &ProgressSample) -> bool {
        self.replace(id, |prev| {
            if prev.status.is_terminal() {
                return None;
            }

            let total = sample
                .total_bytes()
                .unwrap_or(0)
                .max(prev.total_length);
            let mut completed = sample
                .completed_bytes()
                .unwrap_or(0)
                .max(prev.completed_length);
            if total > 0 {
                completed = completed.min(total);
            }

            Some(Task {
                status: TaskStatus::Active,
                total_length: total,
                completed_length: completed,
                download_speed: sample.download_speed.filter(|s| *s >= 0.0),
                ..prev.clone()
            })
        })
    }

    /// Record a payload path reported by the extractor; the task takes the latest file's name
    pub fn record_output(&mut self, id: &str, path: PathBuf) -> bool {
        self.replace(id, |prev| {
            if prev.status.is_terminal() {
                return None;
            }

            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| prev.name.clone());

            // Playlists report one destination per entry
            let mut files = prev.files.clone();
            if !files.contains(&path) {
                files.push(path);
            }

            Some(Task {
                name,
                files,
                ..prev.clone()
            })
        })
    }

    /// Move a task into a terminal status
    pub fn finish(&mut self, id: &str, status: TaskStatus, error: Option<String>) -> bool {
        self.replace(id, |prev| {
            if !prev.status.can_transition_to(status) || prev.status == status {
                return None;
            }

            let mut next = Task {
                status,
                download_speed: None,
                error_message: error,
                finished_at: Some(Utc::now()),
                ..prev.clone()
            };
            if status == TaskStatus::Complete && next.total_length > 0 {
                next.completed_length = next.total_length;
            }
            Some(next)
        })
    }

    /// Drop terminal tasks that finished longer than the retention window ago
    pub fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let Some(retention) = self.retention else {
            return 0;
        };

        let expired: Vec<String> = self
            .slots
            .iter()
            .flatten()
            .filter(|slot| slot.task.status.is_terminal())
            .filter(|slot| {
                slot.task
                    .finished_at
                    .map(|at| now - at > retention)
                    .unwrap_or(false)
            })
            .map(|slot| slot.task.id.clone())
            .collect();

        for id in &expired {
            if let Some(position) = self.index.remove(id) {
                self.slots[position] = None;
                self.free.push(position);
            }
        }

        if !expired.is_empty() {
            debug!("Evicted {} finished tasks", expired.len());
        }
        expired.len()
    }
}
