// WebSocket connection handling: upgrade, per-connection pumps, routes

mod connection;
mod handler;
mod routes;

pub use connection::{PING_PERIOD, PONG_WAIT, WRITE_WAIT};
pub use routes::create_router;
