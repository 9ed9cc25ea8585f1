//! MIDI-learn: bind incoming controllers to parameter paths.
//!
//! A learn request arms a path. The next controller message to arrive is
//! bound to it; from then on that controller writes the path, scaled from
//! 0..=127 onto the parameter's range.

use hashbrown::HashMap;

use crate::command::{CommandBlock, SourceFlags, TypeFlags};

/// Bindings are preallocated so learning never grows the table on the audio thread.
pub const MAX_BINDINGS: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct LearnKey {
    pub channel: u8,
    pub control: u8,
}

pub struct MidiLearn {
    pending: Option<CommandBlock>,
    bindings: HashMap<LearnKey, CommandBlock>,
}

impl Default for MidiLearn {
    fn default() -> Self {
        Self::new()
    }
}

impl MidiLearn {
    pub fn new() -> Self {
        Self {
            pending: None,
            bindings: HashMap::with_capacity(MAX_BINDINGS),
        }
    }

    /// Arm `block`'s path; the next controller binds to it.
    pub fn arm(&mut self, block: &CommandBlock) {
        let mut template = *block;
        template.kind = TypeFlags::WRITE;
        template.source = SourceFlags::MIDI;
        self.pending = Some(template);
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Bind the armed path to `key`. Returns `false` if nothing was armed or the table is full.
    pub fn learn(&mut self, key: LearnKey) -> bool {
        if self.bindings.len() >= MAX_BINDINGS && !self.bindings.contains_key(&key) {
            return false;
        }
        match self.pending.take() {
            Some(template) => {
                self.bindings.insert(key, template);
                true
            }
            None => false,
        }
    }

    /// The write template bound to `key`, value unset.
    pub fn lookup(&self, key: LearnKey) -> Option<CommandBlock> {
        self.bindings.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending = None;
        self.bindings.clear();
    }

    pub fn bindings(&self) -> impl Iterator<Item = (&LearnKey, &CommandBlock)> {
        self.bindings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::part;

    const KEY: LearnKey = LearnKey {
        channel: 0,
        control: 74,
    };

    #[test]
    fn arm_then_learn() {
        let mut learn = MidiLearn::new();
        assert!(!learn.learn(KEY));

        learn.arm(&CommandBlock::read(part::VOLUME, 2).learn_request());
        assert!(learn.is_armed());
        assert!(learn.learn(KEY));
        assert!(!learn.is_armed());

        let bound = learn.lookup(KEY).unwrap();
        assert_eq!(bound.part, 2);
        assert_eq!(bound.kind, TypeFlags::WRITE);
        assert!(bound.source.contains(SourceFlags::MIDI));
    }

    #[test]
    fn rebinding_replaces() {
        let mut learn = MidiLearn::new();
        learn.arm(&CommandBlock::read(part::VOLUME, 0));
        learn.learn(KEY);
        learn.arm(&CommandBlock::read(part::PANNING, 0));
        learn.learn(KEY);
        assert_eq!(learn.len(), 1);
        assert_eq!(learn.lookup(KEY).unwrap().control, part::PANNING);
    }

    #[test]
    fn table_is_bounded() {
        let mut learn = MidiLearn::new();
        for i in 0..MAX_BINDINGS {
            learn.arm(&CommandBlock::read(part::VOLUME, 0));
            let key = LearnKey {
                channel: (i / 128) as u8,
                control: (i % 128) as u8,
            };
            assert!(learn.learn(key));
        }
        learn.arm(&CommandBlock::read(part::VOLUME, 0));
        assert!(!learn.learn(LearnKey {
            channel: 9,
            control: 1
        }));
        assert!(learn.is_armed());
    }
}
