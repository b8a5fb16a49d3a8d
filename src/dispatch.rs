//! The per-follower dispatch core: request bundles, bounded queues, worker
//! loops, the dispatcher facade, and batch completion fan-out.

pub mod dispatcher;
pub mod handler;
pub mod queue;
pub mod request;
mod worker;

pub use dispatcher::LogDispatcher;
pub use handler::BatchCompletionHandler;
pub use queue::{bounded, BoundedQueue, QueueConsumer};
pub use request::SendRequest;
