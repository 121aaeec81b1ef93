//! Typed pub/sub plumbing shared by every pipeline component.
//!
//! Producers publish [`Event`]s through a cloneable [`EventEmitter`]; the
//! [`EventBus`] fans each event out to the registered [`EventSink`]s from a
//! background listener task. Sinks are isolated from each other: a failing
//! sink is logged and skipped, never propagated.
//!
//! # Example
//!
//! ```rust
//! use relaygraph::event_bus::{Event, EventBus, MemorySink};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let sink = MemorySink::new();
//! let bus = EventBus::with_sink(sink.clone());
//! bus.listen_for_events();
//!
//! let emitter = bus.emitter();
//! emitter.emit(Event::diagnostic("demo", "hello")).unwrap();
//!
//! bus.stop_listener().await;
//! assert_eq!(sink.snapshot().len(), 1);
//! # }
//! ```

mod bus;
mod emitter;
mod event;
mod sink;

pub use bus::EventBus;
pub use emitter::{EmitterError, EventEmitter};
pub use event::{
    ContactEvent, DiagnosticEvent, Event, GraphEvent, GraphEventKind, RealtimeEvent, RouterEvent,
    StatusEvent,
};
pub use sink::{ChannelSink, EventSink, MemorySink, StdOutSink};
