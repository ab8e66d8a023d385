//! sqs-worker is a library that polls an SQS queue and hands each message to a
//! [`Handler`].
//!
//! * Messages are received and handled one at a time.
//! * When the handler succeeds, the message is deleted from the queue.
//! * When the handler fails, the message is made visible again so it is
//!   redelivered right away.
//! * Failures to receive or acknowledge are logged and never stop the loop.

mod error;

pub mod dispatch;
pub mod handler;
pub mod message;
pub mod queue;
pub mod server;

pub use dispatch::{dispatch, Outcome};
pub use error::{BoxError, QueueError};
pub use handler::{Handler, Registry, Resolve};
pub use message::Message;
pub use queue::{Queue, SqsQueue};
pub use server::{Server, WithGracefulShutdown, IDLE_DELAY};
pub use tokio_util::sync::CancellationToken;
