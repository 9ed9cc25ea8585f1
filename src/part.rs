//! Part slots: one instrument channel of the synth.
//!
//! A [`Part`] owns its [`PartEngine`], its output buffers and the
//! mixer-facing parameters (volume, panning, sends, kit layout). The engine
//! itself is opaque; the part decides which notes reach it.

use crate::command::part as control;
use crate::node::PartEngine;
use crate::params::{needs_ramp, pan_gains, ramp, ParamDescriptor};

pub const NUM_PARTS: usize = 16;
pub const NUM_KIT_ITEMS: usize = 16;
pub const NUM_MIDI_CHANNELS: u8 = 16;

pub const DEFAULT_PART_VOLUME: f32 = 96.0;
pub const DEFAULT_PANNING: f32 = 64.0;

/// How notes are routed across kit items.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KitMode {
    /// Only item 0 is used; note ranges are ignored.
    #[default]
    Off,
    /// Every enabled item whose range covers the note plays.
    Multi,
    /// The first matching item plays.
    Single,
    /// Like multi; crossfading is left to the engine.
    CrossFade,
}

impl KitMode {
    pub fn from_value(value: f32) -> Self {
        match value as u8 {
            1 => KitMode::Multi,
            2 => KitMode::Single,
            3 => KitMode::CrossFade,
            _ => KitMode::Off,
        }
    }

    pub fn value(self) -> f32 {
        match self {
            KitMode::Off => 0.0,
            KitMode::Multi => 1.0,
            KitMode::Single => 2.0,
            KitMode::CrossFade => 3.0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KitItem {
    pub enabled: bool,
    pub muted: bool,
    pub min_note: u8,
    pub max_note: u8,
}

impl KitItem {
    const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            muted: false,
            min_note: 0,
            max_note: 127,
        }
    }

    #[inline]
    fn plays(&self, note: u8) -> bool {
        self.enabled && !self.muted && (self.min_note..=self.max_note).contains(&note)
    }
}

/// Descriptor of a part-level control, `None` if it doesn't exist.
pub fn descriptor(control: u8, sys_effects: usize) -> Option<ParamDescriptor> {
    let descriptor = match control {
        control::VOLUME => ParamDescriptor::integer(0.0, 127.0, DEFAULT_PART_VOLUME).learnable(),
        control::PANNING => ParamDescriptor::integer(0.0, 127.0, DEFAULT_PANNING).learnable(),
        control::MIDI_CHANNEL => {
            ParamDescriptor::integer(0.0, f32::from(NUM_MIDI_CHANNELS - 1), 0.0)
        }
        control::ENABLE => ParamDescriptor::toggle(false),
        control::KEY_SHIFT => ParamDescriptor::integer(-36.0, 36.0, 0.0),
        control::KIT_MODE => ParamDescriptor::integer(0.0, 3.0, 0.0),
        c if c >= control::SYS_SEND_BASE
            && usize::from(c - control::SYS_SEND_BASE) < sys_effects =>
        {
            ParamDescriptor::integer(0.0, 127.0, 0.0).learnable()
        }
        _ => return None,
    };
    Some(descriptor)
}

/// Descriptor of a kit item control.
pub fn kit_descriptor(control: u8, item: usize) -> Option<ParamDescriptor> {
    let descriptor = match control {
        // item 0 is always on
        control::KIT_ENABLE if item == 0 => ParamDescriptor::integer(1.0, 1.0, 1.0),
        control::KIT_ENABLE => ParamDescriptor::toggle(false),
        control::KIT_MUTE => ParamDescriptor::toggle(false),
        control::KIT_MIN_NOTE => ParamDescriptor::integer(0.0, 127.0, 0.0),
        control::KIT_MAX_NOTE => ParamDescriptor::integer(0.0, 127.0, 127.0),
        _ => return None,
    };
    Some(descriptor)
}

pub struct Part {
    pub(crate) enabled: bool,
    pub(crate) volume: f32,
    pub(crate) panning: f32,
    pub(crate) midi_channel: u8,
    pub(crate) key_shift: i8,
    pub(crate) kit_mode: KitMode,
    pub(crate) kit: [KitItem; NUM_KIT_ITEMS],
    pub(crate) sys_send: Vec<f32>,
    pub(crate) name: String,
    /// Disabled outside the audio thread; insertion effects still need clearing.
    pub(crate) stale_effects: bool,
    engine: Box<dyn PartEngine>,
    pub(crate) out_l: Vec<f32>,
    pub(crate) out_r: Vec<f32>,
    gain_l: f32,
    gain_r: f32,
}

impl Part {
    pub fn new(index: usize, engine: Box<dyn PartEngine>, buffer_size: usize, sys_effects: usize) -> Self {
        let (gain_l, gain_r) = pan_gains(DEFAULT_PART_VOLUME, DEFAULT_PANNING);
        let mut kit = [KitItem::new(false); NUM_KIT_ITEMS];
        kit[0].enabled = true;
        Self {
            enabled: false,
            volume: DEFAULT_PART_VOLUME,
            panning: DEFAULT_PANNING,
            midi_channel: (index % usize::from(NUM_MIDI_CHANNELS)) as u8,
            key_shift: 0,
            kit_mode: KitMode::Off,
            kit,
            sys_send: vec![0.0; sys_effects],
            name: String::new(),
            stale_effects: false,
            engine,
            out_l: vec![0.0; buffer_size],
            out_r: vec![0.0; buffer_size],
            gain_l,
            gain_r,
        }
    }

    /// Restore power-on parameters. Part 0 starts enabled.
    pub(crate) fn defaults(&mut self, index: usize) {
        self.enabled = index == 0;
        self.volume = DEFAULT_PART_VOLUME;
        self.panning = DEFAULT_PANNING;
        self.midi_channel = (index % usize::from(NUM_MIDI_CHANNELS)) as u8;
        self.key_shift = 0;
        self.set_kit_mode(KitMode::Off);
        self.sys_send.iter_mut().for_each(|s| *s = 0.0);
        self.name.clear();
        let (l, r) = pan_gains(self.volume, self.panning);
        self.gain_l = l;
        self.gain_r = r;
        self.cleanup();
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn midi_channel(&self) -> u8 {
        self.midi_channel
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kit_mode(&self) -> KitMode {
        self.kit_mode
    }

    pub fn kit_item(&self, item: usize) -> Option<&KitItem> {
        self.kit.get(item)
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        if self.enabled == enabled {
            return;
        }
        self.enabled = enabled;
        if !enabled {
            self.cleanup();
        }
    }

    /// Switching kit mode resets the layout; leaving kit mode drops items 1 and up.
    pub(crate) fn set_kit_mode(&mut self, mode: KitMode) {
        if mode == KitMode::Off {
            for item in &mut self.kit[1..] {
                *item = KitItem::new(false);
            }
            self.kit[0] = KitItem::new(true);
        }
        if self.kit_mode != mode {
            self.kit_mode = mode;
            self.engine.all_notes_off();
        }
    }

    pub(crate) fn kit_value(&self, item: usize, control: u8) -> f32 {
        let kit = &self.kit[item];
        match control {
            control::KIT_ENABLE => kit.enabled as u8 as f32,
            control::KIT_MUTE => kit.muted as u8 as f32,
            control::KIT_MIN_NOTE => f32::from(kit.min_note),
            control::KIT_MAX_NOTE => f32::from(kit.max_note),
            _ => 0.0,
        }
    }

    pub(crate) fn set_kit_value(&mut self, item: usize, control: u8, value: f32) {
        let kit = &mut self.kit[item];
        match control {
            control::KIT_ENABLE => kit.enabled = value != 0.0,
            control::KIT_MUTE => kit.muted = value != 0.0,
            control::KIT_MIN_NOTE => kit.min_note = value as u8,
            control::KIT_MAX_NOTE => kit.max_note = value as u8,
            _ => {}
        }
    }

    fn accepts(&self, note: u8) -> bool {
        match self.kit_mode {
            KitMode::Off => !self.kit[0].muted,
            _ => self.kit.iter().any(|item| item.plays(note)),
        }
    }

    fn shifted(&self, note: u8, master_shift: i8) -> Option<u8> {
        let note = i16::from(note) + i16::from(self.key_shift) + i16::from(master_shift);
        u8::try_from(note).ok().filter(|n| *n < 128)
    }

    pub fn note_on(&mut self, note: u8, velocity: u8, master_shift: i8) {
        if !self.enabled || !self.accepts(note) {
            return;
        }
        if let Some(shifted) = self.shifted(note, master_shift) {
            self.engine.note_on(shifted, velocity);
        }
    }

    pub fn note_off(&mut self, note: u8, master_shift: i8) {
        if let Some(shifted) = self.shifted(note, master_shift) {
            self.engine.note_off(shifted);
        }
    }

    /// Controllers the part understands itself; the rest go to the engine.
    pub fn controller(&mut self, control: u8, value: u8) {
        match control {
            7 => self.volume = f32::from(value.min(127)),
            10 => self.panning = f32::from(value.min(127)),
            123 => self.engine.all_notes_off(),
            _ => self.engine.controller(control, value),
        }
    }

    pub fn pitch_bend(&mut self, value: i16) {
        self.engine.pitch_bend(value);
    }

    pub fn is_idle(&self) -> bool {
        self.engine.is_idle()
    }

    /// Fill the first `n` samples of the part buffers.
    pub(crate) fn compute(&mut self, n: usize) {
        let (left, right) = (&mut self.out_l[..n], &mut self.out_r[..n]);
        let mut done = 0;
        while done < n {
            let produced = self.engine.compute(&mut left[done..], &mut right[done..]);
            if produced == 0 {
                left[done..].fill(0.0);
                right[done..].fill(0.0);
                break;
            }
            done += produced.min(n - done);
        }
    }

    /// Apply volume and panning, ramping from last block's gains if they moved.
    pub(crate) fn apply_gain(&mut self, n: usize) {
        let (new_l, new_r) = pan_gains(self.volume, self.panning);
        let (old_l, old_r) = (self.gain_l, self.gain_r);
        if needs_ramp(old_l, new_l) || needs_ramp(old_r, new_r) {
            for i in 0..n {
                self.out_l[i] *= ramp(old_l, new_l, i, n);
                self.out_r[i] *= ramp(old_r, new_r, i, n);
            }
        } else {
            self.out_l[..n].iter_mut().for_each(|s| *s *= new_l);
            self.out_r[..n].iter_mut().for_each(|s| *s *= new_r);
        }
        self.gain_l = new_l;
        self.gain_r = new_r;
    }

    pub(crate) fn silence(&mut self) {
        self.out_l.fill(0.0);
        self.out_r.fill(0.0);
    }

    pub fn cleanup(&mut self) {
        self.engine.cleanup();
        self.silence();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writes a constant, optionally in short chunks.
    struct Constant {
        level: f32,
        chunk: usize,
        notes: Vec<u8>,
    }

    impl PartEngine for Constant {
        fn note_on(&mut self, note: u8, _velocity: u8) {
            self.notes.push(note);
        }

        fn note_off(&mut self, note: u8) {
            self.notes.retain(|n| *n != note);
        }

        fn compute(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
            let n = left.len().min(self.chunk);
            left[..n].fill(self.level);
            right[..n].fill(self.level);
            n
        }

        fn cleanup(&mut self) {
            self.notes.clear();
        }

        fn is_idle(&self) -> bool {
            self.notes.is_empty()
        }
    }

    fn part(chunk: usize) -> Part {
        let engine = Constant {
            level: 1.0,
            chunk,
            notes: Vec::new(),
        };
        let mut part = Part::new(0, Box::new(engine), 64, 4);
        part.defaults(0);
        part
    }

    #[test]
    fn partial_fill_completes_block() {
        let mut part = part(10);
        part.compute(64);
        assert!(part.out_l.iter().all(|s| *s == 1.0));
    }

    #[test]
    fn zero_progress_fills_silence() {
        let mut part = part(0);
        part.out_l.fill(3.0);
        part.compute(64);
        assert!(part.out_l.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn kit_ranges_filter_notes() {
        let mut part = part(64);
        part.set_kit_mode(KitMode::Multi);
        part.set_kit_value(0, control::KIT_MAX_NOTE, 59.0);
        part.note_on(60, 100, 0);
        assert!(part.is_idle());
        part.note_on(40, 100, 0);
        assert!(!part.is_idle());
    }

    #[test]
    fn leaving_kit_mode_resets_items() {
        let mut part = part(64);
        part.set_kit_mode(KitMode::Multi);
        part.set_kit_value(3, control::KIT_ENABLE, 1.0);
        part.set_kit_mode(KitMode::Off);
        assert!(!part.kit[3].enabled);
        assert!(part.kit[0].enabled);
    }

    #[test]
    fn key_shift_out_of_range_drops_note() {
        let mut part = part(64);
        part.key_shift = 36;
        part.note_on(120, 100, 0);
        assert!(part.is_idle());
    }

    #[test]
    fn disable_cleans_up() {
        let mut part = part(64);
        part.note_on(60, 100, 0);
        part.set_enabled(false);
        assert!(part.is_idle());
    }
}
