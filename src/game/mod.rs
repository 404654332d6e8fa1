// Game runtime: roles, phases, night/day resolution, timers, events

mod day;
mod events;
#[allow(clippy::module_inception)]
mod game;
mod night;
mod roles;
mod runtime;
mod timers;

pub use events::{EventSink, GameEvent};
pub use game::{GameError, GameState};
pub use night::NightActions;
pub use roles::validate_settings;
pub use runtime::GameRuntime;

/// Seconds of role reveal before the first night.
pub const ROLE_REVEAL_SECS: u64 = 5;
/// Seconds between a result phase and the next day/night.
pub const RESULT_INTERSTITIAL_SECS: u64 = 3;
