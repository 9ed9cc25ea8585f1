//! Single-producer single-consumer command channels.
//!
//! Each control source (CLI, GUI, MIDI) gets its own channel into the audio
//! thread. The producer never blocks; a full channel rejects the block and
//! leaves it to the caller to report or retry.

use rtrb::{Consumer, Producer, RingBuffer};

use crate::command::{CommandBlock, SourceFlags};

/// Where a control channel's traffic originates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Cli,
    Gui,
    Midi,
}

impl Origin {
    pub fn source_flag(self) -> SourceFlags {
        match self {
            Origin::Cli => SourceFlags::CLI,
            Origin::Gui => SourceFlags::GUI,
            Origin::Midi => SourceFlags::MIDI,
        }
    }
}

/// Create a connected sender/receiver pair holding up to `capacity` blocks.
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (CommandSender { producer }, CommandReceiver { consumer })
}

/// Producer half, owned by one control thread.
pub struct CommandSender {
    producer: Producer<CommandBlock>,
}

impl CommandSender {
    /// Enqueue a block. Returns `false` if the channel is full.
    pub fn write(&mut self, block: &CommandBlock) -> bool {
        self.producer.push(*block).is_ok()
    }

    /// Free slots remaining.
    #[inline]
    pub fn slots(&self) -> usize {
        self.producer.slots()
    }

    /// The audio side has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Consumer half, owned by the render loop.
pub struct CommandReceiver {
    consumer: Consumer<CommandBlock>,
}

impl CommandReceiver {
    /// Dequeue the oldest block, if any.
    #[inline]
    pub fn read(&mut self) -> Option<CommandBlock> {
        self.consumer.pop().ok()
    }

    /// Look at the oldest block without removing it.
    #[inline]
    pub fn peek(&self) -> Option<&CommandBlock> {
        self.consumer.peek().ok()
    }

    /// Number of blocks ready to read.
    #[inline]
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_abandoned(&self) -> bool {
        self.consumer.is_abandoned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::part;

    #[test]
    fn fifo_order() {
        let (mut tx, mut rx) = command_channel(8);
        for i in 0..5 {
            assert!(tx.write(&CommandBlock::write(i as f32, part::VOLUME, 0)));
        }
        assert_eq!(rx.pending(), 5);
        for i in 0..5 {
            let block = rx.read().unwrap();
            assert_eq!(block.value, i as f32);
        }
        assert!(rx.read().is_none());
    }

    #[test]
    fn full_channel_rejects() {
        let (mut tx, mut rx) = command_channel(2);
        let block = CommandBlock::write(1.0, part::VOLUME, 0);
        assert!(tx.write(&block));
        assert!(tx.write(&block));
        assert!(!tx.write(&block));
        assert_eq!(tx.slots(), 0);

        rx.read();
        assert!(tx.write(&block));
    }

    #[test]
    fn peek_does_not_consume() {
        let (mut tx, mut rx) = command_channel(4);
        tx.write(&CommandBlock::write(7.0, part::PANNING, 1));
        assert_eq!(rx.peek().map(|b| b.value), Some(7.0));
        assert_eq!(rx.pending(), 1);
        assert_eq!(rx.read().map(|b| b.control), Some(part::PANNING));
    }

    #[test]
    fn abandoned_when_receiver_dropped() {
        let (tx, rx) = command_channel(4);
        drop(rx);
        assert!(tx.is_abandoned());
    }
}
