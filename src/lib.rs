//! Websocket text relay.
//!
//! Clients send text over `/ws`; each message is forwarded to an AMQP queue
//! and answered by the active provider. A health tracker fails over to the
//! next provider when attempts keep exceeding the latency threshold.

pub mod cli;
pub mod config;
pub mod logging;
pub mod provider;
pub mod relay;
pub mod server;
