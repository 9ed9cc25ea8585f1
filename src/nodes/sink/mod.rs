#[cfg(all(feature = "cpal_sink", feature = "std"))]
mod cpal_sink;

#[cfg(all(feature = "cpal_sink", feature = "std"))]
pub use cpal_sink::*;
