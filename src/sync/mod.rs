pub mod normalize;
pub mod remux;
pub mod tempo;

pub use normalize::{normalize_audio, NormalizeOptions, NormalizedAudio};
pub use remux::{output_path_for, remux};
pub use tempo::{TempoPlan, MAX_STAGE, MAX_STAGES, MIN_STAGE, RATIO_TOLERANCE};
