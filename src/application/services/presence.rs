//! Presence Counter
//!
//! Last-event-wins count of online users.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PresenceCounter {
    online: u64,
}

impl PresenceCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the count
    pub fn set(&mut self, online: u64) {
        self.online = online;
    }

    pub fn get(&self) -> u64 {
        self.online
    }
}
