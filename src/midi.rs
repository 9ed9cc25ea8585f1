//! MIDI input: event decoding and the queue into the render loop.

use rtrb::{Consumer, Producer, RingBuffer};

/// Controller numbers handled by the engine itself.
pub mod cc {
    pub const VOLUME: u8 = 7;
    pub const PAN: u8 = 10;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const ALL_NOTES_OFF: u8 = 123;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    Controller { channel: u8, control: u8, value: u8 },
    /// -8192..=8191, centre 0.
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiEvent {
    /// Decode one channel voice message. Running status is not supported.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = status & 0x0f;
        let byte = |i: usize| data.get(i).map(|b| b & 0x7f);

        let event = match status & 0xf0 {
            0x80 => MidiEvent::NoteOff {
                channel,
                note: byte(0)?,
            },
            0x90 => {
                let (note, velocity) = (byte(0)?, byte(1)?);
                if velocity == 0 {
                    MidiEvent::NoteOff { channel, note }
                } else {
                    MidiEvent::NoteOn {
                        channel,
                        note,
                        velocity,
                    }
                }
            }
            0xb0 => MidiEvent::Controller {
                channel,
                control: byte(0)?,
                value: byte(1)?,
            },
            0xc0 => MidiEvent::ProgramChange {
                channel,
                program: byte(0)?,
            },
            0xe0 => {
                let raw = i16::from(byte(0)?) | (i16::from(byte(1)?) << 7);
                MidiEvent::PitchBend {
                    channel,
                    value: raw - 8192,
                }
            }
            _ => return None,
        };
        Some(event)
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::Controller { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => channel,
        }
    }
}

pub fn midi_channel(capacity: usize) -> (MidiSender, MidiReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity);
    (MidiSender { producer }, MidiReceiver { consumer })
}

/// Feeds events from a MIDI input thread.
pub struct MidiSender {
    producer: Producer<MidiEvent>,
}

impl MidiSender {
    /// Returns the event back if the queue is full.
    pub fn send(&mut self, event: MidiEvent) -> Result<(), MidiEvent> {
        self.producer
            .push(event)
            .map_err(|rtrb::PushError::Full(e)| e)
    }

    /// Decode and enqueue raw bytes. Returns `false` if undecodable or full.
    pub fn send_bytes(&mut self, bytes: &[u8]) -> bool {
        match MidiEvent::parse(bytes) {
            Some(event) => self.send(event).is_ok(),
            None => false,
        }
    }
}

pub struct MidiReceiver {
    consumer: Consumer<MidiEvent>,
}

impl MidiReceiver {
    #[inline]
    pub fn pending(&self) -> usize {
        self.consumer.slots()
    }

    #[inline]
    pub fn read(&mut self) -> Option<MidiEvent> {
        self.consumer.pop().ok()
    }
}
