//! Trait seams between the presence core and its transports.

pub mod backplane;
pub mod event_log;
pub mod fanout;

pub use backplane::{Backplane, BackplaneMessage, BackplaneStream, Subscription};
pub use event_log::{EventLogConsumer, EventLogProducer, LogEntry};
pub use fanout::FanoutSink;
