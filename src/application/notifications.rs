use crate::domain::notification::{ChangeKind, Notification, Table};
use crate::domain::ports::{ChangeFeed, ChangeSubscription, HostelStoreRef};
use crate::domain::session::Session;
use crate::domain::{NotificationId, StudentId};
use crate::error::{HostelError, Result};
use tracing::warn;

pub struct NotificationCenter {
    store: HostelStoreRef,
}

impl NotificationCenter {
    pub fn new(store: HostelStoreRef) -> Self {
        Self { store }
    }

    pub async fn list(&self, session: &Session) -> Result<Vec<Notification>> {
        self.store.notifications_for(session.user_id).await
    }

    pub async fn unread_count(&self, session: &Session) -> Result<usize> {
        let notifications = self.list(session).await?;
        Ok(notifications.iter().filter(|n| !n.read).count())
    }

    pub async fn mark_read(&self, session: &Session, id: NotificationId) -> Result<()> {
        let rows = self
            .store
            .mark_notification_read(id, session.user_id)
            .await?;
        if rows == 0 {
            return Err(HostelError::NotFound(format!("notification {id}")));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, session: &Session) -> Result<u64> {
        self.store.mark_all_notifications_read(session.user_id).await
    }

    /// Live inserts and updates of the session's own notifications.
    pub fn watch(&self, feed: &dyn ChangeFeed, session: &Session) -> NotificationWatch {
        NotificationWatch {
            subscription: feed.subscribe(
                Table::Notifications,
                &[ChangeKind::Insert, ChangeKind::Update],
            ),
            student: session.user_id,
        }
    }
}

pub struct NotificationWatch {
    subscription: ChangeSubscription,
    student: StudentId,
}

impl NotificationWatch {
    pub async fn next(&mut self) -> Option<Notification> {
        while let Some(event) = self.subscription.next().await {
            match serde_json::from_value::<Notification>(event.record) {
                Ok(notification) if notification.student_id == self.student => {
                    return Some(notification);
                }
                Ok(_) => {}
                Err(err) => warn!(error = %err, "skipping malformed notification event"),
            }
        }
        None
    }
}
