//! synthcore - a real-time multi-part synthesizer core
//!
//! Design principles:
//! - Control traffic is fixed-size command blocks over lock-free channels
//! - One dispatcher resolves every block by its coordinates and applies it
//! - The audio thread only ever waits a bounded time for the engine lock
//! - Part engines and effects are pluggable through a factory
//!
//! # Quick start
//!
//! ```
//! use synthcore::{command::part, MidiEvent, Origin, Synth, SynthConfig};
//!
//! let mut synth = Synth::new(SynthConfig::default()).unwrap();
//! let mut gui = synth.connect(Origin::Gui);
//!
//! // pan part 0 hard left
//! gui.set(0.0, part::PANNING, 0).unwrap();
//!
//! let note = MidiEvent::NoteOn { channel: 0, note: 60, velocity: 100 };
//! let mut left = [0.0f32; 256];
//! let mut right = [0.0f32; 256];
//! synth.process(&[note], &mut left, &mut right);
//! ```

extern crate alloc;

pub mod channel;
pub mod command;
pub mod config;
mod device;
pub mod effect;
mod error;
pub mod factory;
mod interface;
pub mod learn;
mod lock;
pub mod meter;
pub mod midi;
pub mod misc_msg;
mod node;
pub mod nodes;
pub mod params;
pub mod part;
pub mod patch;
mod store;
mod synth;

pub use channel::{command_channel, CommandReceiver, CommandSender, Origin};
pub use command::{CommandBlock, LimitRequest, SourceFlags, TypeFlags};
pub use config::SynthConfig;
pub use device::CpalDevice;
pub use effect::InsertTarget;
pub use error::{Result, SubmitError, SynthError};
pub use factory::{BuiltinFactory, EngineFactory};
pub use interface::{Controller, Interface, Reply};
pub use lock::{SynthLock, DEFAULT_LOCK_WAIT};
pub use meter::MeterReadings;
pub use midi::{MidiEvent, MidiSender};
pub use node::{EffectUnit, PartEngine, ProcessContext};
pub use params::{ParamDescriptor, ParamFlags};
pub use patch::{Patch, PatchEntry, StateVisitor};
pub use store::{Master, Rack, SynthState};
pub use synth::Synth;
