use crate::directory::ConnectionId;
use std::collections::{BTreeSet, HashMap};

/// Groups connections under room codes. Rooms exist only while they have members.
#[derive(Debug, Default)]
pub struct RoomMembership {
    rooms: HashMap<String, BTreeSet<ConnectionId>>,
    by_connection: HashMap<ConnectionId, BTreeSet<String>>,
}

impl RoomMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `connection` to `room` and returns the other members currently in it.
    pub fn join(&mut self, room: &str, connection: ConnectionId) -> Vec<ConnectionId> {
        let members = self.rooms.entry(room.to_owned()).or_default();
        members.insert(connection);
        self.by_connection
            .entry(connection)
            .or_default()
            .insert(room.to_owned());
        members
            .iter()
            .copied()
            .filter(|&member| member != connection)
            .collect()
    }

    /// Removes `connection` from every room it joined.
    pub fn leave_all(&mut self, connection: ConnectionId) -> Vec<String> {
        let rooms = match self.by_connection.remove(&connection) {
            Some(rooms) => rooms,
            None => return Vec::new(),
        };
        for room in rooms.iter() {
            if let Some(members) = self.rooms.get_mut(room) {
                members.remove(&connection);
                if members.is_empty() {
                    self.rooms.remove(room);
                }
            }
        }
        rooms.into_iter().collect()
    }

    pub fn members(&self, room: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn rooms_of(&self, connection: ConnectionId) -> Vec<String> {
        self.by_connection
            .get(&connection)
            .map(|rooms| rooms.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }
}
