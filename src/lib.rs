//! # PopBridge
//!
//! `popbridge` accepts publish requests over HTTP and forwards them to a
//! topic-based message broker. Requests are acknowledged as soon as they are
//! accepted; delivery happens asynchronously, and messages accepted while the
//! broker is unreachable are held in memory until the connection comes back.
//!
//! ## Core Modules
//!
//! - `bridge`: connection supervision, the pending-message buffer and the
//!   publish dispatcher, tied together by the `Bridge` handle.
//! - `client`: the broker client seam (`BrokerClient`, `Session`, `Producer`)
//!   and its WebSocket implementation.
//! - `config`: loads server and broker settings from file and environment.
//! - `transport`: the ingress adapter and the HTTP server in front of it.
//! - `utils`: error taxonomy and logging setup.

pub mod bridge;
pub mod client;
pub mod config;
pub mod transport;
pub mod utils;

pub use bridge::Bridge;
pub use utils::error::BridgeError;
