//! The gateway facade: builder, request path and event reporting.

mod builder;
pub mod events;
mod service;

pub use builder::GatewayBuilder;
pub use events::{ChannelEventSink, EventSink, GatewayEvent, NoopEventSink, TracingEventSink};
pub use service::{BackgroundTasks, Gateway, GatewayConfig, GatewayStats, ServiceStatus};
