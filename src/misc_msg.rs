//! Out-of-band text for command blocks.
//!
//! A block is too small to carry a string, so text payloads (instrument
//! names and the like) are parked here and referenced by the one-byte id in
//! [`CommandBlock::miscmsg`](crate::CommandBlock::miscmsg).

use parking_lot::Mutex;

use crate::command::NO_MSG;

/// Number of text slots; ids run `0..SLOTS` and never collide with [`NO_MSG`].
pub const SLOTS: usize = NO_MSG as usize;

pub struct MiscMessages {
    slots: Mutex<Vec<Option<String>>>,
}

impl Default for MiscMessages {
    fn default() -> Self {
        Self::new()
    }
}

impl MiscMessages {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(vec![None; SLOTS]),
        }
    }

    /// Store `text` and return its id, or `None` if every slot is in use.
    pub fn push(&self, text: impl Into<String>) -> Option<u8> {
        let mut slots = self.slots.lock();
        let id = slots.iter().position(Option::is_none)?;
        slots[id] = Some(text.into());
        Some(id as u8)
    }

    /// Take the text stored under `id`, freeing the slot.
    pub fn pop(&self, id: u8) -> Option<String> {
        if id == NO_MSG {
            return None;
        }
        self.slots.lock().get_mut(id as usize)?.take()
    }

    /// Slots currently holding text.
    pub fn in_use(&self) -> usize {
        self.slots.lock().iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop() {
        let texts = MiscMessages::new();
        let id = texts.push("Strings").unwrap();
        assert_ne!(id, NO_MSG);
        assert_eq!(texts.pop(id).as_deref(), Some("Strings"));
        assert_eq!(texts.pop(id), None);
    }

    #[test]
    fn slots_are_reused() {
        let texts = MiscMessages::new();
        let a = texts.push("a").unwrap();
        texts.pop(a);
        let b = texts.push("b").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn exhaustion() {
        let texts = MiscMessages::new();
        for i in 0..SLOTS {
            assert!(texts.push(i.to_string()).is_some());
        }
        assert!(texts.push("overflow").is_none());
        assert_eq!(texts.in_use(), SLOTS);
        assert_eq!(texts.pop(NO_MSG), None);
    }
}
