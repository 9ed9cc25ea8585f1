//! Built-in engines.
//!
//! Organized the same way as the signal path:
//!
//! ## Sources ([`source`])
//!
//! Part engines that turn notes into audio:
//! - [`SineVoices`] - Polyphonic sine voices with an attack/release envelope
//!
//! ## Effects ([`effect`])
//!
//! In-place stereo effects for system and insertion slots:
//! - [`Echo`] - Feedback delay
//! - [`Distortion`] - Soft clipper
//! - [`SlewLimiter`] - Rate-limits sudden changes
//! - [`Gain`] - Smoothed gain stage
//!
//! ## Sinks ([`sink`])
//!
//! - [`CpalSink`] - Drive a [`Synth`](crate::Synth) from a system audio device (requires `cpal_sink` feature)

pub mod effect;
pub mod sink;
pub mod source;

pub use effect::{Distortion, Echo, Gain, SlewLimiter};
pub use source::SineVoices;

#[cfg(feature = "cpal_sink")]
pub use sink::CpalSink;
