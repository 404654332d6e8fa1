// Voice routing derivation and SFU signaling seam

pub mod routing;
pub mod sfu;

pub use routing::{derive_routing, voice_phase_for, VoicePhase, VoicePlayer};
pub use sfu::{NullSfu, SfuSignaling, VoiceError};
