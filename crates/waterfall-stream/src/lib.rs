//! Non-blocking waterfall streaming client.
//!
//! A producer (typically a real-time DSP or render loop) hands image rows to a
//! [`StreamClient`]; a dedicated worker thread owns the socket, encodes rows with
//! [`waterfall_proto`] and writes them to the visualization endpoint.
//!
//! - commands are queued without blocking and executed strictly in order
//! - rows and init messages are only sent while the socket is open, otherwise dropped
//! - connect, disconnect and transport errors arrive as [`ClientEvent`]s

pub mod client;
mod command;
pub mod config;
pub mod event;
pub mod state;
pub mod transport;
mod worker;

pub use client::{ClientError, StreamClient, StreamHandle};
pub use config::StreamConfig;
pub use event::ClientEvent;
pub use state::ConnectionState;
pub use waterfall_proto::Rgb;
