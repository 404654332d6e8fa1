// Room model and thread-safe registry

mod registry;
#[allow(clippy::module_inception)]
mod room;

pub use registry::{DisconnectedPlayer, RoomError, RoomRegistry, EMPTY_ROOM_TTL, RECONNECT_WINDOW};
pub use room::{hash_password, Room};
