use crate::error::QueueError;

/// A message received from the queue.
///
/// `receipt` is the continuation token issued for this particular receive. It is needed to
/// delete the message or change its visibility, and it stops being valid once the visibility
/// timeout of the receive has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub receipt: String,
    pub text: String,
}

impl Message {
    pub fn new(id: impl Into<String>, receipt: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            receipt: receipt.into(),
            text: text.into(),
        }
    }
}

impl TryFrom<aws_sdk_sqs::types::Message> for Message {
    type Error = QueueError;

    fn try_from(message: aws_sdk_sqs::types::Message) -> Result<Self, Self::Error> {
        let id = message
            .message_id
            .ok_or(QueueError::MalformedMessage("message_id"))?;
        let receipt = message
            .receipt_handle
            .ok_or(QueueError::MalformedMessage("receipt_handle"))?;

        Ok(Self {
            id,
            receipt,
            text: message.body.unwrap_or_default(),
        })
    }
}
