//! Per-user inbox over shared notifications, plus the expiry sweep.

use std::sync::Arc;

use domains::models::{
    NewNotification, Notification, NotificationQuery, NotificationType, NotificationView, Page,
    PageRequest,
};
use domains::ports::{Clock, NotificationRepository};
use domains::{AppError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::access::Actor;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    #[serde(default)]
    pub unread_only: bool,
    #[serde(rename = "type")]
    pub kind: Option<NotificationType>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub unread_count: u64,
}

pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(notifications: Arc<dyn NotificationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self {
            notifications,
            clock,
        }
    }

    pub async fn send(&self, new: NewNotification) -> Result<Notification> {
        let notification = Notification::new(new, self.clock.now());
        self.notifications.insert(&notification).await?;
        debug!(
            notification_id = %notification.id,
            recipients = notification.recipients.len(),
            "notification sent"
        );
        Ok(notification)
    }

    /// The caller's inbox, newest first, with their own read state.
    pub async fn list(
        &self,
        actor: &Actor,
        query: NotificationListQuery,
    ) -> Result<Page<NotificationView>> {
        let filter = NotificationQuery {
            unread_only: query.unread_only,
            kind: query.kind,
        };
        let page = self
            .notifications
            .list_for_user(
                actor.user_id,
                filter,
                PageRequest::new(query.page, query.limit),
                self.clock.now(),
            )
            .await?;
        Ok(into_views(page, actor.user_id))
    }

    /// The `n` newest visible notifications for the caller.
    pub async fn recent(&self, user_id: Uuid, n: u32) -> Result<Vec<NotificationView>> {
        let page = self
            .notifications
            .list_for_user(
                user_id,
                NotificationQuery::default(),
                PageRequest::new(Some(1), Some(n)),
                self.clock.now(),
            )
            .await?;
        Ok(into_views(page, user_id).items)
    }

    pub async fn unread_count(&self, actor: &Actor) -> Result<UnreadCount> {
        let unread_count = self
            .notifications
            .count_unread(actor.user_id, self.clock.now())
            .await?;
        Ok(UnreadCount { unread_count })
    }

    /// Idempotent: a second call keeps the first `readAt` and skips the write.
    pub async fn mark_read(&self, actor: &Actor, id: Uuid) -> Result<NotificationView> {
        let mut notification = self
            .notifications
            .find_by_id(id)
            .await?
            .filter(|n| n.recipient(actor.user_id).is_some())
            .ok_or_else(|| AppError::not_found("Notification", id))?;

        if notification.mark_read(actor.user_id, self.clock.now()) {
            self.notifications.update(&notification).await?;
        }
        notification
            .view_for(actor.user_id)
            .ok_or_else(|| AppError::not_found("Notification", id))
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.notifications.purge_expired(self.clock.now()).await?;
        if removed > 0 {
            info!(removed, "expired notifications purged");
        }
        Ok(removed)
    }
}

fn into_views(page: Page<Notification>, user_id: Uuid) -> Page<NotificationView> {
    let Page {
        items,
        total,
        current_page,
        total_pages,
    } = page;
    Page {
        items: items.iter().filter_map(|n| n.view_for(user_id)).collect(),
        total,
        current_page,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use domains::models::Role;
    use domains::ports::{ManualClock, MockNotificationRepository};

    fn actor(user_id: Uuid) -> Actor {
        Actor {
            user_id,
            email: "p@example.com".into(),
            role: Role::Parent,
        }
    }

    fn notification(recipients: Vec<Uuid>) -> Notification {
        Notification::new(
            NewNotification {
                title: "Sports day".into(),
                message: "Bring trainers".into(),
                kind: NotificationType::Announcement,
                recipients,
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn second_mark_read_skips_the_write() {
        let me = Uuid::now_v7();
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let mut read = notification(vec![me]);
        read.mark_read(me, start);

        let mut repo = MockNotificationRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(read.clone())));
        repo.expect_update().never();
        let svc = NotificationService::new(Arc::new(repo), clock.clone());

        clock.advance(Duration::hours(2));
        let view = svc.mark_read(&actor(me), Uuid::now_v7()).await.unwrap();
        assert!(view.read);
        assert_eq!(view.read_at, Some(start));
    }

    #[tokio::test]
    async fn strangers_get_not_found() {
        let n = notification(vec![Uuid::now_v7()]);
        let mut repo = MockNotificationRepository::new();
        repo.expect_find_by_id().returning(move |_| Ok(Some(n.clone())));
        let svc = NotificationService::new(Arc::new(repo), Arc::new(ManualClock::new(Utc::now())));

        let err = svc
            .mark_read(&actor(Uuid::now_v7()), Uuid::now_v7())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(entity, _) if entity == "Notification"));
    }

    #[tokio::test]
    async fn listing_projects_the_callers_read_state() {
        let (me, other) = (Uuid::now_v7(), Uuid::now_v7());
        let mut n = notification(vec![me, other]);
        n.mark_read(other, Utc::now());
        let mut repo = MockNotificationRepository::new();
        repo.expect_list_for_user()
            .returning(move |_, _, page, _| Ok(Page::new(vec![n.clone()], 1, page)));
        let svc = NotificationService::new(Arc::new(repo), Arc::new(ManualClock::new(Utc::now())));

        let page = svc
            .list(&actor(me), NotificationListQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(!page.items[0].read);
    }
}
