use thiserror::Error;

/// Boxed error returned by handlers and by queue implementations that are not backed by SQS.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QueueError {
    #[error(transparent)]
    Sqs(#[from] aws_sdk_sqs::Error),

    /// The queue returned a message that cannot be acknowledged. Contains the name of the
    /// missing field.
    #[error("Received a message without a `{0}`")]
    MalformedMessage(&'static str),

    #[error("The queue operation was cancelled")]
    Cancelled,

    #[error(transparent)]
    Other(#[from] BoxError),
}
