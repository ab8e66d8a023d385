use crate::error::QueueError;
use crate::message::Message;
use async_trait::async_trait;
use aws_sdk_sqs::Client;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// The operations the poll loop needs from a remote queue.
///
/// Every call takes the loop's cancellation token. Implementations should stop waiting on the
/// remote service once it fires and return [`QueueError::Cancelled`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Queue: Send + Sync {
    /// Receive at most one message. `Ok(None)` means the queue is currently empty.
    async fn receive_one(&self, cancel: &CancellationToken) -> Result<Option<Message>, QueueError>;

    /// Delete a received message.
    async fn delete(
        &self,
        id: &str,
        receipt: &str,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError>;

    /// Change how long a received message stays invisible to other receivers. A zero `timeout`
    /// makes the message eligible for redelivery immediately.
    async fn set_visibility_timeout(
        &self,
        id: &str,
        receipt: &str,
        text: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError>;
}

/// [`Queue`] backed by an Amazon SQS queue.
///
/// The message id is only used for logging. SQS addresses a received message by its receipt
/// handle and does not allow the body to be rewritten, so `text` is ignored when changing
/// visibility.
#[derive(Debug, Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
    wait_time_seconds: Option<i32>,
}

impl SqsQueue {
    /// Create a new queue with the given client and queue URL.
    pub fn new(client: Client, queue_url: impl Into<String>) -> Self {
        Self {
            client,
            queue_url: queue_url.into(),
            wait_time_seconds: None,
        }
    }

    /// Long-poll for up to `seconds` when receiving. Left unset, SQS uses the queue's own
    /// `ReceiveMessageWaitTimeSeconds`.
    pub fn wait_time_seconds(mut self, seconds: i32) -> Self {
        self.wait_time_seconds = Some(seconds);
        self
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

#[async_trait]
impl Queue for SqsQueue {
    #[instrument(skip_all, fields(queue_url = %self.queue_url))]
    async fn receive_one(&self, cancel: &CancellationToken) -> Result<Option<Message>, QueueError> {
        let request = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(1)
            .set_wait_time_seconds(self.wait_time_seconds);

        let output = cancellable(cancel, request.send()).await?;

        output
            .messages
            .unwrap_or_default()
            .into_iter()
            .next()
            .map(Message::try_from)
            .transpose()
    }

    #[instrument(skip(self, receipt, cancel), fields(queue_url = %self.queue_url))]
    async fn delete(
        &self,
        id: &str,
        receipt: &str,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        let request = self
            .client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt);

        cancellable(cancel, request.send()).await?;
        Ok(())
    }

    #[instrument(skip(self, receipt, _text, cancel), fields(queue_url = %self.queue_url))]
    async fn set_visibility_timeout(
        &self,
        id: &str,
        receipt: &str,
        _text: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), QueueError> {
        let seconds = i32::try_from(timeout.as_secs()).unwrap_or(i32::MAX);
        let request = self
            .client
            .change_message_visibility()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt)
            .visibility_timeout(seconds);

        cancellable(cancel, request.send()).await?;
        Ok(())
    }
}

/// Await an SQS request unless the token fires first.
async fn cancellable<F, T, E>(cancel: &CancellationToken, request: F) -> Result<T, QueueError>
where
    F: Future<Output = Result<T, E>>,
    aws_sdk_sqs::Error: From<E>,
{
    tokio::select! {
        // `biased` so an already cancelled token never starts a request
        biased;

        _ = cancel.cancelled() => Err(QueueError::Cancelled),
        result = request => Ok(result.map_err(aws_sdk_sqs::Error::from)?),
    }
}
