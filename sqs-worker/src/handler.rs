use crate::error::BoxError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Business logic run for each received message.
///
/// Messages are delivered at least once, so implementations must tolerate seeing the same text
/// more than once.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Handler: Send + Sync {
    /// Consume the text of a message. Returning `Ok(())` deletes the message from the queue, an
    /// error makes it visible again for redelivery.
    async fn consume(&self, text: &str, cancel: &CancellationToken) -> Result<(), BoxError>;
}

/// Looks up the handler for a message. Called once per message.
pub trait Resolve: Send + Sync {
    fn resolve(&self) -> Option<Arc<dyn Handler>>;
}

impl<F> Resolve for F
where
    F: Fn() -> Option<Arc<dyn Handler>> + Send + Sync,
{
    fn resolve(&self) -> Option<Arc<dyn Handler>> {
        self()
    }
}

/// Holds the handler registered at startup, if any.
#[derive(Clone, Default)]
pub struct Registry {
    handler: Option<Arc<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler, replacing any previously registered one.
    pub fn register<H>(mut self, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.handler = Some(Arc::new(handler));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.handler.is_none()
    }
}

impl Resolve for Registry {
    fn resolve(&self) -> Option<Arc<dyn Handler>> {
        self.handler.clone()
    }
}
