//! Control-thread access to the synth.
//!
//! [`Controller`] is the write path: it checks a block against the current
//! limits, then queues it for the audio thread. [`Interface`] is the read
//! path and the handful of actions allowed under the shared lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::channel::{CommandSender, Origin};
use crate::command::{self, insert, section, CommandBlock, LimitRequest, SourceFlags, TypeFlags, UNUSED};
use crate::error::SubmitError;
use crate::lock::SynthLock;
use crate::meter::MeterReadings;
use crate::misc_msg::MiscMessages;
use crate::params::ParamDescriptor;
use crate::part::NUM_PARTS;
use crate::patch::Patch;
use crate::store::SynthState;

/// How a submitted block was accepted.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Reply {
    Done,
    /// The value was outside the control's range and has been clamped.
    RangeAdjusted { requested: f32, applied: f32 },
    /// The path depends on a block still in the queue; it is checked when applied.
    Unchecked,
}

/// Shared-lock view of the synth. Cheap to clone, usable from any thread.
#[derive(Clone)]
pub struct Interface {
    state: Arc<SynthLock<SynthState>>,
    shutup: Arc<AtomicBool>,
    texts: Arc<MiscMessages>,
}

impl Interface {
    pub(crate) fn new(
        state: Arc<SynthLock<SynthState>>,
        shutup: Arc<AtomicBool>,
        texts: Arc<MiscMessages>,
    ) -> Self {
        Self {
            state,
            shutup,
            texts,
        }
    }

    /// Read a value or a limit. Never writes; the write flag is ignored.
    ///
    /// Sets `INTEGER`/`LEARNABLE` on the block as reported by the control,
    /// or `ERROR` if the path doesn't resolve.
    pub fn query(&self, block: &mut CommandBlock) -> f32 {
        block.kind.remove(TypeFlags::WRITE);
        self.state.lock_shared().query(block)
    }

    pub fn read_value(&self, mut block: CommandBlock) -> f32 {
        self.query(&mut block)
    }

    pub fn limit(&self, mut block: CommandBlock, request: LimitRequest) -> f32 {
        block.kind = TypeFlags::LIMITS.with_limit_request(request);
        self.query(&mut block)
    }

    pub fn describe(&self, block: &CommandBlock) -> Option<ParamDescriptor> {
        self.state.lock_shared().describe(block)
    }

    /// Text-valued controls; currently the instrument name.
    pub fn read_text(&self, block: &CommandBlock) -> Option<String> {
        if block.control != command::part::INSTRUMENT_NAME {
            return None;
        }
        self.state.lock_shared().part_name(usize::from(block.part))
    }

    /// Park text for a block's `miscmsg`.
    pub fn push_text(&self, text: impl Into<String>) -> Option<u8> {
        self.texts.push(text)
    }

    pub fn note_on(&self, channel: u8, note: u8, velocity: u8) {
        let state = self.state.lock_shared();
        if velocity == 0 {
            state.note_off_shared(channel, note);
        } else {
            state.note_on_shared(channel, note, velocity);
        }
    }

    pub fn note_off(&self, channel: u8, note: u8) {
        self.state.lock_shared().note_off_shared(channel, note);
    }

    /// Enable or disable a part without going through a channel.
    pub fn part_on_off(&self, part: usize, enabled: bool) -> bool {
        self.state.lock_shared().part_on_off_shared(part, enabled)
    }

    /// Fade out and silence everything at the end of the next block. Takes no lock.
    pub fn panic(&self) {
        self.shutup.store(true, Ordering::Release);
    }

    pub fn meters(&self) -> MeterReadings {
        self.state.lock_shared().meters().readings()
    }

    pub fn snapshot(&self) -> Patch {
        self.state.lock_shared().snapshot()
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock_shared().is_initialized()
    }
}

/// One control thread's write path into the synth.
pub struct Controller {
    sender: CommandSender,
    origin: Origin,
    interface: Interface,
}

impl Controller {
    pub(crate) fn new(sender: CommandSender, origin: Origin, interface: Interface) -> Self {
        Self {
            sender,
            origin,
            interface,
        }
    }

    #[inline]
    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    /// Queue a block as-is. Returns `false` if the channel is full.
    pub fn write(&mut self, block: &CommandBlock) -> bool {
        self.sender.write(block)
    }

    /// Validate and queue a block.
    ///
    /// Writes are clamped into range first; the reply says so. Learn
    /// requests are refused for controls that can't be learned. Kit items
    /// and effect parameters that don't resolve yet are queued as they are
    /// and answered with [`Reply::Unchecked`].
    pub fn send(&mut self, mut block: CommandBlock) -> Result<Reply, SubmitError> {
        let requested = block.value;
        let mut probe = block;
        probe.kind = TypeFlags::LIMITS.with_limit_request(LimitRequest::Adjust);
        let applied = self.interface.query(&mut probe);
        if probe.is_error() {
            if !resolves_later(&block) {
                return Err(SubmitError::Unavailable);
            }
            return self.queue(block).map(|()| Reply::Unchecked);
        }
        if block.is_learn_request() && !probe.kind.contains(TypeFlags::LEARNABLE) {
            return Err(SubmitError::NotLearnable);
        }

        let mut reply = Reply::Done;
        if block.is_write() && !block.is_learn_request() && applied != requested {
            tracing::debug!(requested, applied, "range adjusted");
            block.value = applied;
            reply = Reply::RangeAdjusted { requested, applied };
        }

        self.queue(block).map(|()| reply)
    }

    fn queue(&mut self, mut block: CommandBlock) -> Result<(), SubmitError> {
        block.source.insert(self.origin.source_flag());
        if !self.sender.write(&block) {
            tracing::warn!(origin = ?self.origin, "control channel full, block dropped");
            return Err(SubmitError::ChannelFull);
        }
        Ok(())
    }

    /// Write `value` to `control` in section `part`.
    pub fn set(&mut self, value: f32, control: u8, part: u8) -> Result<Reply, SubmitError> {
        self.send(CommandBlock::write(value, control, part))
    }

    /// Rename a part. Applied after the block that picks it up has rendered.
    pub fn set_instrument_name(&mut self, part: u8, name: &str) -> Result<Reply, SubmitError> {
        let id = self.interface.push_text(name).ok_or(SubmitError::ChannelFull)?;
        let block = CommandBlock::write(0.0, command::part::INSTRUMENT_NAME, part)
            .with_miscmsg(id)
            .with_source(SourceFlags::LOW_PRIO);
        self.send(block).inspect_err(|_| {
            self.interface.texts.pop(id);
        })
    }

    /// Arm MIDI-learn for a control path.
    pub fn learn(&mut self, block: CommandBlock) -> Result<Reply, SubmitError> {
        self.send(block.learn_request())
    }
}

/// Kit items need kit mode on, effect parameters need their effect type in
/// place. Either may still be sitting in the queue when the block is sent.
fn resolves_later(block: &CommandBlock) -> bool {
    let kit_item = usize::from(block.part) < NUM_PARTS
        && block.insert == insert::KIT_GROUP
        && block.kit != 0
        && block.kit != UNUSED;
    let effect_param = matches!(block.part, section::SYSTEM_EFFECTS | section::INSERT_EFFECTS)
        && block.insert == UNUSED
        && block.kit != UNUSED
        && block.kit >= command::effect::TYPE_BASE;
    kit_item || effect_param
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{master, part};
    use crate::{Synth, SynthConfig};

    #[test]
    fn send_reports_range_adjustment() {
        let mut synth = Synth::new(SynthConfig::default()).unwrap();
        let mut cli = synth.connect(Origin::Cli);
        assert_eq!(
            cli.set(300.0, part::VOLUME, 0),
            Ok(Reply::RangeAdjusted {
                requested: 300.0,
                applied: 127.0
            })
        );
        assert_eq!(cli.set(50.0, part::VOLUME, 0), Ok(Reply::Done));
    }

    #[test]
    fn send_rejects_unknown_and_unlearnable() {
        let mut synth = Synth::new(SynthConfig::default()).unwrap();
        let mut cli = synth.connect(Origin::Cli);
        assert_eq!(cli.set(1.0, 77, section::MAIN), Err(SubmitError::Unavailable));
        assert_eq!(
            cli.learn(CommandBlock::read(part::MIDI_CHANNEL, 0)),
            Err(SubmitError::NotLearnable)
        );
        assert_eq!(cli.learn(CommandBlock::read(master::VOLUME, section::MAIN)), Ok(Reply::Done));
    }

    #[test]
    fn full_channel_is_reported() {
        let config = SynthConfig::default().with_channel_capacity(2);
        let mut synth = Synth::new(config).unwrap();
        let mut gui = synth.connect(Origin::Gui);
        assert!(gui.set(1.0, part::VOLUME, 0).is_ok());
        assert!(gui.set(2.0, part::VOLUME, 0).is_ok());
        assert_eq!(gui.set(3.0, part::VOLUME, 0), Err(SubmitError::ChannelFull));
    }

    #[test]
    fn shared_note_on_reaches_enabled_part() {
        let mut synth = Synth::new(SynthConfig::default()).unwrap();
        let interface = synth.interface();
        interface.note_on(0, 69, 100);

        let mut l = vec![0.0; 512];
        let mut r = vec![0.0; 512];
        synth.process(&[], &mut l, &mut r);
        assert!(l.iter().any(|s| s.abs() > 1e-4));
    }

    #[test]
    fn instrument_name_arrives() {
        let mut synth = Synth::new(SynthConfig::default()).unwrap();
        let mut gui = synth.connect(Origin::Gui);
        gui.set_instrument_name(4, "Glass Bells").unwrap();

        let mut l = vec![0.0; 64];
        let mut r = vec![0.0; 64];
        synth.process(&[], &mut l, &mut r);
        let name = gui
            .interface()
            .read_text(&CommandBlock::read(part::INSTRUMENT_NAME, 4));
        assert_eq!(name.as_deref(), Some("Glass Bells"));
    }
}
