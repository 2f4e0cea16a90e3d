//! Play queue management.

use std::collections::HashSet;

use super::state::PlayableTrack;

/// The play queue with current position tracking.
///
/// Entries are unique by track id. The cursor is always within
/// `[-1, len - 1]`, where -1 means nothing has been played yet.
#[derive(Debug, Clone)]
pub struct PlayQueue {
    items: Vec<PlayableTrack>,
    /// Current position in the queue (-1 = not started)
    position: i32,
    /// Track ids already handed out for preloading
    preloaded: HashSet<String>,
}

impl Default for PlayQueue {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            position: -1, // Not started
            preloaded: HashSet::new(),
        }
    }
}

impl PlayQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.index_of(track_id).is_some()
    }

    fn index_of(&self, track_id: &str) -> Option<usize> {
        self.items.iter().position(|t| t.id == track_id)
    }

    /// Append a track. Returns false if it is already queued.
    pub fn add(&mut self, track: PlayableTrack) -> bool {
        if self.contains(&track.id) {
            tracing::debug!(track_id = %track.id, "Track already in queue");
            return false;
        }
        self.items.push(track);
        true
    }

    /// Insert a track right after the current position.
    ///
    /// A track already in the queue is moved there instead of duplicated.
    pub fn add_next(&mut self, track: PlayableTrack) {
        if let Some(existing) = self.index_of(&track.id) {
            let target = if self.position < 0 {
                0
            } else if existing as i32 > self.position {
                self.position as usize + 1
            } else {
                // Moving from before the cursor shifts the cursor left
                self.position as usize
            };
            self.reorder(existing, target);
            return;
        }

        let insert_pos = if self.position < 0 {
            0
        } else {
            (self.position as usize + 1).min(self.items.len())
        };
        self.items.insert(insert_pos, track);
    }

    /// Clear the queue.
    pub fn clear(&mut self) {
        self.items.clear();
        self.position = -1;
    }

    /// Remove a track by id.
    pub fn remove(&mut self, track_id: &str) -> Option<PlayableTrack> {
        let index = self.index_of(track_id)?;
        let item = self.items.remove(index);

        if (index as i32) < self.position {
            self.position -= 1;
        }
        if self.position >= self.items.len() as i32 {
            self.position = self.items.len() as i32 - 1;
        }
        Some(item)
    }

    /// Move an item from one position to another.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from < self.items.len() && to < self.items.len() && from != to {
            let item = self.items.remove(from);
            self.items.insert(to, item);

            if self.position < 0 {
                return;
            }
            // Cursor follows the same entry
            let pos = self.position as usize;
            if from == pos {
                self.position = to as i32;
            } else if from < pos && to >= pos {
                self.position -= 1;
            } else if from > pos && to <= pos {
                self.position += 1;
            }
        }
    }

    /// Replace the queue, positioning the cursor on `current_id` if given.
    ///
    /// Duplicate ids keep their first occurrence. An unknown `current_id`
    /// puts the cursor at the start.
    pub fn set_tracks(&mut self, tracks: Vec<PlayableTrack>, current_id: Option<&str>) {
        let mut seen = HashSet::new();
        self.items = tracks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();

        self.position = match current_id {
            _ if self.items.is_empty() => -1,
            Some(id) => self.index_of(id).map(|i| i as i32).unwrap_or(0),
            None => -1,
        };
        tracing::debug!(len = self.items.len(), position = self.position, "Queue replaced");
    }

    /// Get all items in the queue.
    pub fn items(&self) -> &[PlayableTrack] {
        &self.items
    }

    /// Get current position (index into items).
    pub fn current_index(&self) -> Option<usize> {
        if self.position >= 0 && (self.position as usize) < self.items.len() {
            Some(self.position as usize)
        } else {
            None
        }
    }

    /// Get count of remaining tracks after current position.
    pub fn remaining_count(&self) -> usize {
        if self.position < 0 {
            self.items.len()
        } else {
            self.items.len().saturating_sub(self.position as usize + 1)
        }
    }

    pub fn current(&self) -> Option<&PlayableTrack> {
        self.current_index().and_then(|i| self.items.get(i))
    }

    /// Advance and hand the new entry to `play`.
    ///
    /// At the end of the queue nothing moves and `play` is not called.
    pub fn play_next<F: FnOnce(&PlayableTrack)>(&mut self, play: F) -> bool {
        let next = self.position + 1;
        if next as usize >= self.items.len() {
            tracing::debug!("End of queue");
            return false;
        }
        self.position = next;
        play(&self.items[next as usize]);
        true
    }

    /// Step back and hand the new entry to `play`.
    ///
    /// At the start of the queue nothing moves and `play` is not called.
    pub fn play_previous<F: FnOnce(&PlayableTrack)>(&mut self, play: F) -> bool {
        if self.position <= 0 || self.items.is_empty() {
            tracing::debug!("Start of queue");
            return false;
        }
        self.position -= 1;
        play(&self.items[self.position as usize]);
        true
    }

    /// Jump to a specific position.
    pub fn jump_to(&mut self, index: usize) -> Option<&PlayableTrack> {
        if index < self.items.len() {
            self.position = index as i32;
            self.current()
        } else {
            None
        }
    }

    /// The entry after the cursor, once per track id.
    pub fn take_preload(&mut self) -> Option<PlayableTrack> {
        let next = self.items.get((self.position + 1) as usize)?;
        if next.audio_url.is_empty() || !self.preloaded.insert(next.id.clone()) {
            return None;
        }
        Some(next.clone())
    }
}
