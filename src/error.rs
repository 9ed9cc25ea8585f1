//! Error types.

use thiserror::Error;

/// Failures of engine setup, reconfiguration and state restore.
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to allocate {what} {index}: {reason}")]
    Allocation {
        what: &'static str,
        index: usize,
        reason: String,
    },

    #[error("unknown effect type {0}")]
    UnknownEffect(u8),

    #[error("patch version {found} is not supported (expected {expected})")]
    PatchVersion { found: u32, expected: u32 },

    #[error("engine is not initialized")]
    NotInitialized,

    #[error("audio device error: {0}")]
    Device(String),
}

pub type Result<T, E = SynthError> = core::result::Result<T, E>;

/// Why a control thread's submission was not enqueued.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("control channel is full")]
    ChannelFull,

    #[error("control path does not resolve")]
    Unavailable,

    #[error("control cannot be MIDI-learned")]
    NotLearnable,
}
