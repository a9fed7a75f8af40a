//! HTTP and `WebSocket` command surface for the House Cup ledger.
//!
//! Translates REST requests and socket messages into calls against the
//! core [`Scoreboard`](housecup_core::Scoreboard),
//! [`Generator`](housecup_core::Generator), and
//! [`Hub`](housecup_core::Hub), and relays hub messages to connected
//! sockets. See [`handlers`] for the endpoint table and [`ws`] for the
//! socket protocol.

pub mod control;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

pub use error::ApiError;
pub use rate_limit::RateLimiter;
pub use router::{build_router, cors_layer};
pub use server::{ServerError, bind, serve, shutdown_signal};
pub use state::AppState;
