use crate::handler::Resolve;
use crate::message::Message;
use crate::queue::Queue;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// What happened to a message after it was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum Outcome {
    /// The handler succeeded and the message was deleted.
    Deleted,
    /// The handler succeeded but deleting the message failed. It will be redelivered once its
    /// visibility timeout expires.
    DeleteFailed,
    /// The handler failed and the message was made visible again.
    Released,
    /// The handler failed and making the message visible again also failed. It will be
    /// redelivered once its visibility timeout expires.
    ReleaseFailed,
    /// No handler was available. The message was left untouched.
    Unhandled,
}

/// Run the resolved handler for `message`, then acknowledge the message based on the result.
///
/// Failures of the handler and of the acknowledgment are logged here and never returned.
pub async fn dispatch<Q, R>(
    queue: &Q,
    resolver: &R,
    message: Message,
    cancel: &CancellationToken,
) -> Outcome
where
    Q: Queue + ?Sized,
    R: Resolve + ?Sized,
{
    let Some(handler) = resolver.resolve() else {
        warn!(
            message_id = %message.id,
            "Could not resolve a `Handler` for the message. Make sure a handler is registered."
        );
        return Outcome::Unhandled;
    };

    if let Err(err) = handler.consume(&message.text, cancel).await {
        error!(message_id = %message.id, error = %err, "Failed to handle message");

        return match queue
            .set_visibility_timeout(
                &message.id,
                &message.receipt,
                &message.text,
                Duration::ZERO,
                cancel,
            )
            .await
        {
            Ok(()) => {
                debug!(message_id = %message.id, "Released message for redelivery");
                Outcome::Released
            }
            Err(err) => {
                warn!(
                    message_id = %message.id,
                    error = %err,
                    "Failed to update message after failed handle"
                );
                Outcome::ReleaseFailed
            }
        };
    }

    match queue.delete(&message.id, &message.receipt, cancel).await {
        Ok(()) => {
            debug!(message_id = %message.id, "Deleted message");
            Outcome::Deleted
        }
        Err(err) => {
            warn!(
                message_id = %message.id,
                error = %err,
                "Failed to delete message after a successful handle"
            );
            Outcome::DeleteFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueueError;
    use crate::handler::{Handler, MockHandler, Registry};
    use crate::queue::MockQueue;
    use mockall::predicate::{always, eq};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn message() -> Message {
        Message::new("m1", "r1", "payload")
    }

    fn handler(succeed: bool) -> MockHandler {
        let mut handler = MockHandler::new();
        handler
            .expect_consume()
            .with(eq("payload"), always())
            .times(1)
            .returning(move |_, _| {
                if succeed {
                    Ok(())
                } else {
                    Err("boom".into())
                }
            });
        handler
    }

    fn count(lines: &[&str], level: &str) -> usize {
        lines.iter().filter(|line| line.contains(level)).count()
    }

    #[tokio::test]
    #[traced_test]
    async fn successful_handle_deletes_message() {
        let mut queue = MockQueue::new();
        queue
            .expect_delete()
            .with(eq("m1"), eq("r1"), always())
            .times(1)
            .returning(|_, _, _| Ok(()));
        queue.expect_set_visibility_timeout().never();
        let registry = Registry::new().register(handler(true));

        let outcome = dispatch(&queue, &registry, message(), &CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Deleted);
        logs_assert(|lines: &[&str]| match count(lines, "WARN") + count(lines, "ERROR") {
            0 => Ok(()),
            n => Err(format!("expected no warnings or errors, found {n}")),
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_handle_releases_message() {
        let mut queue = MockQueue::new();
        queue.expect_delete().never();
        queue
            .expect_set_visibility_timeout()
            .with(eq("m1"), eq("r1"), eq("payload"), eq(Duration::ZERO), always())
            .times(1)
            .returning(|_, _, _, _, _| Ok(()));
        let registry = Registry::new().register(handler(false));

        let outcome = dispatch(&queue, &registry, message(), &CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Released);
        assert!(logs_contain("Failed to handle message"));
        assert!(logs_contain("boom"));
        logs_assert(|lines: &[&str]| match count(lines, "WARN") {
            0 => Ok(()),
            n => Err(format!("expected no warnings, found {n}")),
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_release_is_logged_and_abandoned() {
        let mut queue = MockQueue::new();
        queue.expect_delete().never();
        queue
            .expect_set_visibility_timeout()
            .times(1)
            .returning(|_, _, _, _, _| Err(QueueError::Other("receipt expired".into())));
        let registry = Registry::new().register(handler(false));

        let outcome = dispatch(&queue, &registry, message(), &CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::ReleaseFailed);
        assert!(logs_contain("Failed to handle message"));
        assert!(logs_contain("Failed to update message after failed handle"));
        logs_assert(|lines: &[&str]| {
            match (count(lines, "ERROR"), count(lines, "WARN")) {
                (1, 1) => Ok(()),
                (errors, warnings) => Err(format!(
                    "expected one error and one warning, found {errors} and {warnings}"
                )),
            }
        });
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_delete_is_logged_and_abandoned() {
        let mut queue = MockQueue::new();
        queue
            .expect_delete()
            .times(1)
            .returning(|_, _, _| Err(QueueError::Other("receipt expired".into())));
        queue.expect_set_visibility_timeout().never();
        let registry = Registry::new().register(handler(true));

        let outcome = dispatch(&queue, &registry, message(), &CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::DeleteFailed);
        assert!(logs_contain(
            "Failed to delete message after a successful handle"
        ));
    }

    #[tokio::test]
    #[traced_test]
    async fn missing_handler_leaves_message_alone() {
        let mut queue = MockQueue::new();
        queue.expect_delete().never();
        queue.expect_set_visibility_timeout().never();

        let outcome = dispatch(&queue, &Registry::new(), message(), &CancellationToken::new()).await;

        assert_eq!(outcome, Outcome::Unhandled);
        assert!(logs_contain("Could not resolve a `Handler`"));
        logs_assert(|lines: &[&str]| match count(lines, "WARN") {
            1 => Ok(()),
            n => Err(format!("expected one warning, found {n}")),
        });
    }

    #[tokio::test]
    async fn handler_is_resolved_per_message() {
        let resolved = Arc::new(AtomicUsize::new(0));
        let counter = resolved.clone();
        let resolver = move || -> Option<Arc<dyn Handler>> {
            counter.fetch_add(1, Ordering::SeqCst);
            let mut handler = MockHandler::new();
            handler.expect_consume().returning(|_, _| Ok(()));
            let handler: Arc<dyn Handler> = Arc::new(handler);
            Some(handler)
        };
        let mut queue = MockQueue::new();
        queue.expect_delete().times(2).returning(|_, _, _| Ok(()));
        let cancel = CancellationToken::new();

        assert_eq!(dispatch(&queue, &resolver, message(), &cancel).await, Outcome::Deleted);
        assert_eq!(dispatch(&queue, &resolver, message(), &cancel).await, Outcome::Deleted);

        assert_eq!(resolved.load(Ordering::SeqCst), 2);
    }
}
