//! Polyphonic sine voices

use crate::node::PartEngine;

pub const MAX_VOICES: usize = 16;

/// Samples per internal control step.
pub const DEFAULT_CHUNK: usize = 64;

#[derive(Clone, Copy, Debug)]
struct Voice {
    note: u8,
    phase: f32,
    phase_inc: f32,
    velocity: f32,
    envelope: f32,
    releasing: bool,
}

/// A small polyphonic sine synth with a linear attack/release envelope.
///
/// Renders in fixed chunks, so [`compute`](PartEngine::compute) may return
/// fewer samples than asked.
pub struct SineVoices {
    voices: [Option<Voice>; MAX_VOICES],
    sample_rate: f32,
    attack_step: f32,
    release_step: f32,
    bend: f32,
    chunk: usize,
    chunk_pos: usize,
}

impl SineVoices {
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            voices: [None; MAX_VOICES],
            sample_rate,
            attack_step: 1.0 / (0.005 * sample_rate),
            release_step: 1.0 / (0.05 * sample_rate),
            bend: 1.0,
            chunk: DEFAULT_CHUNK,
            chunk_pos: 0,
        }
    }

    pub fn with_chunk(mut self, chunk: usize) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    #[inline]
    pub fn active_voices(&self) -> usize {
        self.voices.iter().flatten().count()
    }

    fn frequency(note: u8) -> f32 {
        440.0 * 2f32.powf((f32::from(note) - 69.0) / 12.0)
    }

    /// A free voice, or the quietest one to steal.
    fn slot(&mut self) -> usize {
        if let Some(free) = self.voices.iter().position(Option::is_none) {
            return free;
        }
        let mut quietest = 0;
        for (i, voice) in self.voices.iter().enumerate() {
            if let (Some(v), Some(q)) = (voice, &self.voices[quietest]) {
                if v.envelope < q.envelope {
                    quietest = i;
                }
            }
        }
        quietest
    }
}

impl PartEngine for SineVoices {
    fn note_on(&mut self, note: u8, velocity: u8) {
        let slot = self.slot();
        self.voices[slot] = Some(Voice {
            note,
            phase: 0.0,
            phase_inc: Self::frequency(note) / self.sample_rate,
            velocity: f32::from(velocity.min(127)) / 127.0,
            envelope: 0.0,
            releasing: false,
        });
    }

    fn note_off(&mut self, note: u8) {
        for voice in self.voices.iter_mut().flatten() {
            if voice.note == note {
                voice.releasing = true;
            }
        }
    }

    fn pitch_bend(&mut self, value: i16) {
        // two semitones either way
        self.bend = 2f32.powf(f32::from(value) / 8192.0 * 2.0 / 12.0);
    }

    fn all_notes_off(&mut self) {
        for voice in self.voices.iter_mut().flatten() {
            voice.releasing = true;
        }
    }

    fn compute(&mut self, left: &mut [f32], right: &mut [f32]) -> usize {
        let n = left.len().min(right.len()).min(self.chunk - self.chunk_pos);
        left[..n].fill(0.0);
        right[..n].fill(0.0);

        for slot in self.voices.iter_mut() {
            let Some(voice) = slot else { continue };
            let inc = voice.phase_inc * self.bend;
            for i in 0..n {
                if voice.releasing {
                    voice.envelope -= self.release_step;
                } else if voice.envelope < 1.0 {
                    voice.envelope = (voice.envelope + self.attack_step).min(1.0);
                }
                if voice.envelope <= 0.0 {
                    break;
                }
                let sample = (voice.phase * core::f32::consts::TAU).sin()
                    * voice.velocity
                    * voice.envelope
                    * 0.25; // -12dB per voice
                left[i] += sample;
                right[i] += sample;

                voice.phase += inc;
                voice.phase -= (voice.phase >= 1.0) as u32 as f32;
            }
            if voice.envelope <= 0.0 {
                *slot = None;
            }
        }

        self.chunk_pos = (self.chunk_pos + n) % self.chunk;
        n
    }

    fn cleanup(&mut self) {
        self.voices = [None; MAX_VOICES];
        self.chunk_pos = 0;
        self.bend = 1.0;
    }

    #[inline]
    fn is_idle(&self) -> bool {
        self.voices.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_chunks() {
        let mut sine = SineVoices::new(48_000).with_chunk(48);
        let mut l = [0.0; 64];
        let mut r = [0.0; 64];
        assert_eq!(sine.compute(&mut l, &mut r), 48);
        assert_eq!(sine.compute(&mut l, &mut r), 48);
        assert_eq!(sine.compute(&mut l[..10], &mut r[..10]), 10);
        assert_eq!(sine.compute(&mut l, &mut r), 38);
    }

    #[test]
    fn note_sounds_and_releases() {
        let mut sine = SineVoices::new(48_000);
        let mut l = [0.0; 64];
        let mut r = [0.0; 64];
        sine.note_on(69, 127);
        sine.compute(&mut l, &mut r);
        assert!(l.iter().any(|s| s.abs() > 0.0));
        assert_eq!(l, r);

        sine.note_off(69);
        for _ in 0..100 {
            sine.compute(&mut l, &mut r);
        }
        assert!(sine.is_idle());
    }

    #[test]
    fn steals_when_full() {
        let mut sine = SineVoices::new(48_000);
        for note in 0..(MAX_VOICES as u8 + 4) {
            sine.note_on(40 + note, 100);
        }
        assert_eq!(sine.active_voices(), MAX_VOICES);
    }

    #[test]
    fn cleanup_silences() {
        let mut sine = SineVoices::new(48_000);
        sine.note_on(60, 100);
        sine.cleanup();
        assert!(sine.is_idle());
    }
}
