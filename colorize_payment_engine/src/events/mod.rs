//! Settlement side effects are published as events.
//!
//! Whoever subscribes (analytics, conversion tracking, notifications) runs on its own task. A slow or failing
//! subscriber therefore can never delay or fail the settlement that produced the event.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
