use std::collections::{HashMap, HashSet};

use super::connection::ConnectionId;
use crate::error::{QuizError, Result};

/// Which room a connection belongs to, and whether it counts as a member.
/// Room creators are bound but not counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: String,
    pub counted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Members remain; carries the new count.
    Remaining(usize),
    /// The count reached zero and the live entry was dropped.
    Emptied,
}

/// Domain view of rooms: which ids were created, how many members each live
/// room has, and which room every connection is bound to.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    created: HashSet<String>,
    members: HashMap<String, usize>,
    bindings: HashMap<ConnectionId, Binding>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the id and returns its current member count. Repeat calls
    /// leave the count untouched.
    pub fn create_room(&mut self, room_id: &str) -> usize {
        if self.created.insert(room_id.to_string()) {
            tracing::info!(room_id = %room_id, "Room created");
        }
        *self.members.entry(room_id.to_string()).or_insert(0)
    }

    pub fn join_room(&mut self, room_id: &str) -> Result<usize> {
        if !self.created.contains(room_id) {
            return Err(QuizError::RoomNotFound(room_id.to_string()));
        }
        let count = self.members.entry(room_id.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    /// Returns `None` when the room has no live entry.
    pub fn leave_room(&mut self, room_id: &str) -> Option<Departure> {
        let count = self.members.get_mut(room_id)?;
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.members.remove(room_id);
            tracing::info!(room_id = %room_id, "Room emptied");
            Some(Departure::Emptied)
        } else {
            Some(Departure::Remaining(*count))
        }
    }

    pub fn bind(&mut self, connection: &ConnectionId, binding: Binding) -> Option<Binding> {
        self.bindings.insert(connection.clone(), binding)
    }

    pub fn unbind(&mut self, connection: &ConnectionId) -> Option<Binding> {
        self.bindings.remove(connection)
    }

    pub fn binding(&self, connection: &ConnectionId) -> Option<&Binding> {
        self.bindings.get(connection)
    }

    pub fn is_created(&self, room_id: &str) -> bool {
        self.created.contains(room_id)
    }

    /// `None` when the room has no live entry.
    pub fn member_count(&self, room_id: &str) -> Option<usize> {
        self.members.get(room_id).copied()
    }
}
