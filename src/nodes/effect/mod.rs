mod distortion;
mod echo;
mod gain;
mod slew_limiter;

pub use distortion::Distortion;
pub use echo::Echo;
pub use gain::Gain;
pub use slew_limiter::SlewLimiter;
