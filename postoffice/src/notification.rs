//! Management notifications emitted by the post office.

use tokio::sync::broadcast;
use tracing::trace;

use crate::address::Address;
use crate::observability::events;

const COMPONENT: &str = "notification";

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Notification {
    BindingAdded {
        name: String,
        address: Address,
        queue: String,
    },
    BindingRemoved {
        name: String,
        address: Address,
    },
    DuplicateMessageRejected {
        address: Address,
        duplicate_id: Vec<u8>,
        message_id: u64,
    },
}

/// Fire-and-forget broadcast of [`Notification`]s; lagging subscribers lose the oldest events.
pub(crate) struct NotificationSender {
    sender: broadcast::Sender<Notification>,
}

impl NotificationSender {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    pub(crate) fn send(&self, notification: Notification) {
        if let Err(unobserved) = self.sender.send(notification) {
            trace!(
                event = events::NOTIFICATION_UNOBSERVED,
                component = COMPONENT,
                notification = ?unobserved.0,
                "no notification subscribers"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Notification, NotificationSender};
    use crate::Address;

    #[tokio::test]
    async fn subscribers_receive_notifications_sent_after_subscribing() {
        let sender = NotificationSender::new(4);
        sender.send(Notification::BindingRemoved {
            name: "early".to_string(),
            address: Address::new("a"),
        });

        let mut receiver = sender.subscribe();
        sender.send(Notification::BindingRemoved {
            name: "late".to_string(),
            address: Address::new("a"),
        });

        assert_eq!(
            receiver.recv().await.unwrap(),
            Notification::BindingRemoved {
                name: "late".to_string(),
                address: Address::new("a"),
            }
        );
    }
}
