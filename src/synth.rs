//! The master render loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use itertools::izip;

use crate::channel::{command_channel, CommandReceiver, Origin};
use crate::command::{CommandBlock, SourceFlags};
use crate::config::SynthConfig;
use crate::effect::InsertTarget;
use crate::error::Result;
use crate::factory::{BuiltinFactory, EngineFactory};
use crate::interface::{Controller, Interface};
use crate::lock::SynthLock;
use crate::midi::{midi_channel, MidiEvent, MidiReceiver, MidiSender};
use crate::misc_msg::MiscMessages;
use crate::node::ProcessContext;
use crate::params::{send_to_gain, volume_to_gain};
use crate::part::NUM_PARTS;
use crate::patch::Patch;
use crate::store::{Rack, SynthState};

/// The audio-thread side of the synth.
///
/// `Synth` owns the render loop. Everything else talks to it through
/// [`Controller`]s (command channels), [`MidiSender`]s (MIDI queues) and
/// [`Interface`]s (shared-lock reads), all created here before the synth is
/// moved to the audio thread.
///
/// # Creating an Instance
///
/// ```
/// use synthcore::{Origin, Synth, SynthConfig};
///
/// let mut synth = Synth::new(SynthConfig::default()).unwrap();
/// let gui = synth.connect(Origin::Gui);
/// let midi = synth.midi_input();
/// # let _ = (gui, midi);
/// ```
///
/// # Rendering
///
/// Call [`process`](Self::process) from the audio callback with however many
/// frames the host wants. Work is split into blocks of at most
/// [`buffer_size`](SynthConfig::buffer_size) samples. Per block:
///
/// 1. Pending commands are applied, then MIDI
/// 2. Each enabled part computes its samples
/// 3. Insertion effects run on their parts
/// 4. Part volume and panning are applied, ramped if they changed
/// 5. System effects run on the part sends and on earlier system effects
/// 6. Parts are summed into the master bus
/// 7. Master insertion effects run
/// 8. Master volume is applied and meters updated
/// 9. A pending panic fades the block out and silences everything
///
/// ```
/// use synthcore::{command::part, CommandBlock, Origin, Synth, SynthConfig};
///
/// let mut synth = Synth::new(SynthConfig::default()).unwrap();
/// let mut gui = synth.connect(Origin::Gui);
///
/// gui.send(CommandBlock::write(100.0, part::VOLUME, 0)).unwrap();
///
/// let mut left = vec![0.0; 512];
/// let mut right = vec![0.0; 512];
/// synth.process(&[], &mut left, &mut right);
/// ```
pub struct Synth {
    state: Arc<SynthLock<SynthState>>,
    shutup: Arc<AtomicBool>,
    texts: Arc<MiscMessages>,
    config: SynthConfig,

    receivers: Vec<CommandReceiver>,
    midi: Vec<MidiReceiver>,

    /// A mute-and-loop block waiting for the current block to fade out.
    deferred: Option<CommandBlock>,
    /// Low priority blocks to apply after rendering, with their channel index.
    low_prio: Vec<(usize, CommandBlock)>,
    /// Parts that computed this block.
    computed: [bool; NUM_PARTS],

    lock_misses: u64,
    blocks_rendered: u64,
}

impl Synth {
    /// A synth using the built-in engines.
    pub fn new(config: SynthConfig) -> Result<Self> {
        Self::with_factory(config, Arc::new(BuiltinFactory))
    }

    pub fn with_factory(config: SynthConfig, factory: Arc<dyn EngineFactory>) -> Result<Self> {
        config.validate()?;
        let ctx = ProcessContext {
            sample_rate: config.sample_rate,
            buffer_size: config.buffer_size,
        };
        let state = SynthState::new(factory, ctx)?;
        let shutup = Arc::clone(&state.shutup);
        let texts = Arc::clone(&state.texts);
        tracing::info!(
            sample_rate = ctx.sample_rate,
            buffer_size = ctx.buffer_size,
            "synth initialized"
        );

        Ok(Self {
            state: Arc::new(SynthLock::new(state, config.lock_wait)),
            shutup,
            texts,
            config,
            receivers: Vec::new(),
            midi: Vec::new(),
            deferred: None,
            low_prio: Vec::new(),
            computed: [false; NUM_PARTS],
            lock_misses: 0,
            blocks_rendered: 0,
        })
    }

    /// Open a command channel for one control thread.
    pub fn connect(&mut self, origin: Origin) -> Controller {
        let (sender, receiver) = command_channel(self.config.channel_capacity);
        self.receivers.push(receiver);
        // at most one low priority block per channel is ever held
        self.low_prio.reserve(self.receivers.len());
        Controller::new(sender, origin, self.interface())
    }

    /// Open a MIDI queue, drained every block after the command channels.
    pub fn midi_input(&mut self) -> MidiSender {
        let (sender, receiver) = midi_channel(self.config.midi_capacity);
        self.midi.push(receiver);
        sender
    }

    /// A read-side view for any thread.
    pub fn interface(&self) -> Interface {
        Interface::new(
            Arc::clone(&self.state),
            Arc::clone(&self.shutup),
            Arc::clone(&self.texts),
        )
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    #[inline]
    pub fn buffer_size(&self) -> usize {
        self.config.buffer_size
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    /// Times the audio thread gave up waiting for the engine lock.
    #[inline]
    pub fn lock_misses(&self) -> u64 {
        self.lock_misses
    }

    #[inline]
    pub fn blocks_rendered(&self) -> u64 {
        self.blocks_rendered
    }

    pub fn is_initialized(&self) -> bool {
        self.state.lock_shared().is_initialized()
    }

    /// Render `left.len()` frames. `events` are applied before the first block.
    pub fn process(&mut self, events: &[MidiEvent], left: &mut [f32], right: &mut [f32]) {
        let len = left.len().min(right.len());
        let block = self.config.buffer_size;
        let mut events = events;
        let mut offset = 0;
        while offset < len {
            let n = (len - offset).min(block);
            self.render_block(events, &mut left[offset..offset + n], &mut right[offset..offset + n]);
            events = &[];
            offset += n;
        }
    }

    fn render_block(&mut self, events: &[MidiEvent], left: &mut [f32], right: &mut [f32]) {
        left.fill(0.0);
        right.fill(0.0);
        let n = left.len();

        self.drain(events);
        self.compute_parts(n);

        {
            let Some(mut state) = self.state.timed_lock_exclusive() else {
                lock_missed(&mut self.lock_misses, "mix");
                return;
            };
            if state.is_initialized() {
                mix(&mut state, &self.computed, left, right);
            }
            if self.shutup.load(Ordering::Acquire) {
                fade_out(left, right);
                state.shut_up();
                self.shutup.store(false, Ordering::Release);
                tracing::debug!("engine silenced");
            }
        }

        self.apply_low_prio();
        self.blocks_rendered += 1;
    }

    /// Apply everything queued before this block started.
    fn drain(&mut self, events: &[MidiEvent]) {
        let Some(mut state) = self.state.timed_lock_exclusive() else {
            lock_missed(&mut self.lock_misses, "drain");
            if !events.is_empty() {
                tracing::warn!(count = events.len(), "MIDI events dropped, engine busy");
            }
            return;
        };

        // the engine faded out last block; now it's safe. A fade that
        // never ran (missed mix lock) leaves the flag up.
        if !self.shutup.load(Ordering::Acquire) {
            if let Some(mut block) = self.deferred.take() {
                state.dispatch(&mut block);
                rejected(&block);
            }
        }

        for (channel, receiver) in self.receivers.iter_mut().enumerate() {
            // keep FIFO order behind an unapplied low priority block
            if self.low_prio.iter().any(|(c, _)| *c == channel) {
                continue;
            }
            // only what was there when we started
            for _ in 0..receiver.pending() {
                let Some(next) = receiver.peek().copied() else {
                    break;
                };
                if next.source.contains(SourceFlags::MUTE_AND_LOOP) {
                    if self.deferred.is_none() {
                        receiver.read();
                        self.deferred = Some(next);
                        self.shutup.store(true, Ordering::Release);
                    }
                    break;
                }
                receiver.read();
                if next.source.contains(SourceFlags::LOW_PRIO) {
                    self.low_prio.push((channel, next));
                    break;
                }
                let mut block = next;
                state.dispatch(&mut block);
                rejected(&block);
            }
        }

        for receiver in self.midi.iter_mut() {
            for _ in 0..receiver.pending() {
                if let Some(event) = receiver.read() {
                    state.handle_midi(event);
                }
            }
        }
        for event in events {
            state.handle_midi(*event);
        }
    }

    /// Each part computes under its own short exclusive hold.
    fn compute_parts(&mut self, n: usize) {
        self.computed = [false; NUM_PARTS];
        for index in 0..NUM_PARTS {
            let Some(mut state) = self.state.timed_lock_exclusive() else {
                lock_missed(&mut self.lock_misses, "compute");
                continue;
            };
            if index >= state.active_parts() {
                break;
            }
            let part = state.rack.parts[index].get_mut();
            if part.is_enabled() {
                part.compute(n);
                self.computed[index] = true;
            }
        }
    }

    fn apply_low_prio(&mut self) {
        if self.low_prio.is_empty() {
            return;
        }
        let Some(mut state) = self.state.timed_lock_exclusive() else {
            lock_missed(&mut self.lock_misses, "low priority");
            return;
        };
        for (_, mut block) in self.low_prio.drain(..) {
            state.dispatch(&mut block);
            rejected(&block);
        }
    }

    /// Rebuild every engine for a new sample rate or buffer size, keeping all settings.
    ///
    /// On failure nothing of the old engine is left and the synth renders
    /// silence until a later call succeeds.
    pub fn reinit(&mut self, sample_rate: u32, buffer_size: usize) -> Result<()> {
        let config = self
            .config
            .clone()
            .with_sample_rate(sample_rate)
            .with_buffer_size(buffer_size);
        config.validate()?;
        let ctx = ProcessContext {
            sample_rate,
            buffer_size,
        };

        let mut state = self.state.lock_exclusive();
        let settings = state.is_initialized().then(|| state.snapshot());
        state.teardown();

        let factory = Arc::clone(&state.factory);
        let rack = match Rack::build(&*factory, &ctx) {
            Ok(rack) => rack,
            Err(e) => {
                tracing::error!("reinit at {sample_rate} Hz / {buffer_size} failed: {e}");
                return Err(e);
            }
        };
        state.install(rack, ctx);
        if let Some(settings) = settings {
            if let Err(e) = state.apply_patch(&settings) {
                state.teardown();
                tracing::error!("reinit at {sample_rate} Hz / {buffer_size} failed: {e}");
                return Err(e);
            }
        }
        drop(state);

        self.config = config;
        tracing::info!(sample_rate, buffer_size, "synth reinitialized");
        Ok(())
    }

    pub fn snapshot(&self) -> Patch {
        self.state.lock_shared().snapshot()
    }

    /// Replace all settings with `patch`. Not for the audio thread.
    pub fn apply_patch(&mut self, patch: &Patch) -> Result<()> {
        self.state.lock_exclusive().apply_patch(patch)
    }
}

fn lock_missed(misses: &mut u64, stage: &'static str) {
    *misses += 1;
    #[cfg(feature = "warn_on_lock_miss")]
    tracing::warn!(stage, "engine lock not acquired in time");
    #[cfg(not(feature = "warn_on_lock_miss"))]
    tracing::trace!(stage, "engine lock not acquired in time");
}

#[inline]
fn rejected(block: &CommandBlock) {
    if block.is_error() {
        tracing::debug!(?block, "command rejected");
    }
}

#[inline]
fn add_scaled(dst_l: &mut [f32], dst_r: &mut [f32], src_l: &[f32], src_r: &[f32], gain: f32) {
    for (dl, dr, sl, sr) in izip!(dst_l.iter_mut(), dst_r.iter_mut(), src_l, src_r) {
        *dl += sl * gain;
        *dr += sr * gain;
    }
}

/// Steps 3 to 8 of a block, on parts that already computed.
fn mix(state: &mut SynthState, computed: &[bool; NUM_PARTS], left: &mut [f32], right: &mut [f32]) {
    let n = left.len();

    // parts disabled from a control thread since last block
    for index in 0..state.rack.parts.len() {
        if core::mem::take(&mut state.rack.parts[index].get_mut().stale_effects) {
            state.release_part(index);
        }
    }

    let SynthState {
        rack,
        sys_to_sys,
        meters,
        master,
        scratch_l,
        scratch_r,
        ..
    } = state;
    let Rack {
        parts,
        sys_effects,
        ins_effects,
    } = rack;
    let playing = |p: usize| computed.get(p).copied().unwrap_or(false);

    for slot in ins_effects.iter_mut() {
        if let InsertTarget::Part(p) = slot.target {
            if playing(p) {
                let part = parts[p].get_mut();
                slot.process(&mut part.out_l[..n], &mut part.out_r[..n]);
            }
        }
    }

    for (p, part) in parts.iter_mut().enumerate() {
        if playing(p) {
            part.get_mut().apply_gain(n);
        }
    }

    for e in 0..sys_effects.len() {
        let (earlier, rest) = sys_effects.split_at_mut(e);
        let slot = &mut rest[0];
        if !slot.is_active() {
            continue;
        }
        let (tmp_l, tmp_r) = (&mut scratch_l[..n], &mut scratch_r[..n]);
        tmp_l.fill(0.0);
        tmp_r.fill(0.0);

        for (p, part) in parts.iter_mut().enumerate() {
            let part = part.get_mut();
            let level = part.sys_send.get(e).copied().unwrap_or(0.0);
            if playing(p) && level > 0.0 {
                add_scaled(tmp_l, tmp_r, &part.out_l[..n], &part.out_r[..n], send_to_gain(level));
            }
        }
        for (from, source) in earlier.iter().enumerate() {
            let level = sys_to_sys[from][e];
            if source.is_active() && level > 0.0 {
                add_scaled(tmp_l, tmp_r, &source.out_l[..n], &source.out_r[..n], send_to_gain(level));
            }
        }

        slot.process_and_keep(tmp_l, tmp_r);
        add_scaled(left, right, tmp_l, tmp_r, slot.out_volume());
    }

    for (p, part) in parts.iter_mut().enumerate() {
        if playing(p) {
            let part = part.get_mut();
            add_scaled(left, right, &part.out_l[..n], &part.out_r[..n], 1.0);
        }
    }

    for slot in ins_effects.iter_mut() {
        if slot.target == InsertTarget::Master {
            slot.process(left, right);
        }
    }

    let gain = volume_to_gain(master.volume);
    left.iter_mut().chain(right.iter_mut()).for_each(|s| *s *= gain);

    meters.measure(left, right);
    for (p, part) in parts.iter_mut().enumerate() {
        let peak = if playing(p) {
            let part = part.get_mut();
            part.out_l[..n]
                .iter()
                .zip(&part.out_r[..n])
                .fold(0f32, |peak, (l, r)| peak.max((l + r).abs()))
                * gain
        } else {
            0.0
        };
        meters.set_part_peak(p, peak);
    }
}

/// Linear fade to exactly zero on the last sample.
fn fade_out(left: &mut [f32], right: &mut [f32]) {
    let n = left.len();
    if n < 2 {
        left.fill(0.0);
        right.fill(0.0);
        return;
    }
    let last = (n - 1) as f32;
    for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
        let fade = (last - i as f32) / last;
        *l *= fade;
        *r *= fade;
    }
}
