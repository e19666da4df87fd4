//! Client-facing relay: sessions, the live connection registry and the
//! durable sink that inbound messages are forwarded to.

mod channel;
mod connections;
mod session;
mod sink;

pub use channel::{ChannelError, MessageChannel};
pub use connections::{ConnectionGuard, ConnectionId, ConnectionInfo, ConnectionRegistry};
pub use session::{RelaySession, SessionEnd};
pub use sink::{AmqpSink, OutboundMessage, SinkError, SinkPublisher};
