//! Selection state threaded through one interactive session.

/// A gating key: a child menu entry is shown only when each of its keys is set.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ContextKey {
    UserId,
    DeviceId,
    SlotId,
}

#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Context {
    pub user_id: Option<i64>,
    pub device_id: Option<i64>,
    pub slot_id: Option<i64>,
    quit: bool,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, key: ContextKey) -> bool {
        match key {
            ContextKey::UserId => self.user_id.is_some(),
            ContextKey::DeviceId => self.device_id.is_some(),
            ContextKey::SlotId => self.slot_id.is_some(),
        }
    }

    pub fn has_all(&self, keys: &[ContextKey]) -> bool {
        keys.iter().all(|k| self.has(*k))
    }

    /// Sticky: nothing clears it for the rest of the session.
    pub fn request_quit(&mut self) {
        self.quit = true;
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Forget the selected user and everything selected beneath it.
    pub fn clear_user(&mut self) {
        self.user_id = None;
        self.slot_id = None;
        self.device_id = None;
    }
}
