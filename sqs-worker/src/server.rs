use crate::dispatch::dispatch;
use crate::handler::Resolve;
use crate::queue::Queue;
use futures::future::BoxFuture;
use std::future::{Future, IntoFuture};
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// How long to wait before polling again after the queue came back empty.
pub const IDLE_DELAY: Duration = Duration::from_millis(500);

/// Polls a queue and dispatches one message at a time until cancelled.
pub struct Server<C, R> {
    queue_url: Option<String>,
    connect: C,
    resolver: R,
}

impl<C, R> Server<C, R>
where
    R: Resolve,
{
    /// Create a new server.
    ///
    /// `connect` builds the queue client from the queue URL. It is only called once the URL
    /// has been checked, so a missing URL never reaches the queue service.
    pub fn new(queue_url: Option<String>, connect: C, resolver: R) -> Self {
        Self {
            queue_url,
            connect,
            resolver,
        }
    }

    pub fn queue_url(mut self, queue_url: impl Into<String>) -> Self {
        self.queue_url = Some(queue_url.into());
        self
    }

    pub fn resolver(mut self, resolver: R) -> Self {
        self.resolver = resolver;
        self
    }

    /// Returns a server that stops once `signal` resolves.
    pub fn with_graceful_shutdown<F>(self, signal: F) -> WithGracefulShutdown<C, R, F>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        WithGracefulShutdown {
            server: self,
            signal,
        }
    }

    /// Run the poll loop until `cancel` fires.
    ///
    /// A message that is being dispatched when `cancel` fires is still driven to completion.
    /// Errors are logged and never end the loop.
    pub async fn run<Q>(self, cancel: CancellationToken)
    where
        C: FnOnce(&str) -> Q,
        Q: Queue,
    {
        let Self {
            queue_url,
            connect,
            resolver,
        } = self;

        let Some(queue_url) = queue_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
        else {
            warn!("No queue URL configured, the worker will not poll for messages");
            return;
        };

        let queue = connect(queue_url);
        info!(queue_url, "Starting queue worker");

        while !cancel.is_cancelled() {
            match queue.receive_one(&cancel).await {
                Ok(Some(message)) => {
                    let message_id = message.id.clone();
                    let outcome = dispatch(&queue, &resolver, message, &cancel).await;
                    debug!(message_id, ?outcome, "Dispatched message");
                }
                Ok(None) => {
                    tokio::select! {
                        biased;

                        _ = cancel.cancelled() => {},
                        _ = sleep(IDLE_DELAY) => {},
                    }
                }
                // Receives interrupted by shutdown are expected.
                Err(err) if cancel.is_cancelled() => {
                    debug!(error = %err, "Receive interrupted by shutdown");
                }
                // Retried immediately, without backoff.
                Err(err) => {
                    error!(error = %err, "Failed to receive a message");
                }
            }
        }

        info!(queue_url, "Exiting queue worker loop");
    }
}

/// Server with graceful shutdown.
pub struct WithGracefulShutdown<C, R, F> {
    server: Server<C, R>,
    signal: F,
}

impl<C, Q, R, F> IntoFuture for WithGracefulShutdown<C, R, F>
where
    C: FnOnce(&str) -> Q + Send + 'static,
    Q: Queue + 'static,
    R: Resolve + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    type Output = ();
    type IntoFuture = BoxFuture<'static, ()>;

    fn into_future(self) -> Self::IntoFuture {
        let cancel = CancellationToken::new();

        let signal = self.signal;
        let trigger = cancel.clone();
        let watcher = tokio::spawn(async move {
            signal.await;
            trigger.cancel();
        });

        let server = self.server;
        Box::pin(async move {
            server.run(cancel).await;
            watcher.abort();
        })
    }
}
