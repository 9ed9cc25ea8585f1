mod sine;

pub use sine::{SineVoices, DEFAULT_CHUNK, MAX_VOICES};
