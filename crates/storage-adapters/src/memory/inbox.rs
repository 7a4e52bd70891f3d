use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use domains::models::{Notification, NotificationQuery, Page, PageRequest};
use domains::ports::NotificationRepository;
use domains::{AppError, Result};
use uuid::Uuid;

use super::{collect, page_of, MemoryStore};

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        match self.notifications.entry(notification.id) {
            Entry::Occupied(_) => Err(AppError::Conflict("Notification already exists".into())),
            Entry::Vacant(slot) => {
                slot.insert(notification.clone());
                Ok(())
            }
        }
    }

    async fn update(&self, notification: &Notification) -> Result<()> {
        let mut slot = self
            .notifications
            .get_mut(&notification.id)
            .ok_or_else(|| AppError::not_found("Notification", notification.id))?;
        *slot = notification.clone();
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.notifications.get(&id).map(|n| n.clone()))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: NotificationQuery,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> Result<Page<Notification>> {
        let inbox = collect(&self.notifications, |n| query.matches(n, user_id, now));
        Ok(page_of(inbox, |a, b| b.created_at.cmp(&a.created_at), page))
    }

    async fn count_unread(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let unread = NotificationQuery {
            unread_only: true,
            kind: None,
        };
        Ok(self
            .notifications
            .iter()
            .filter(|e| unread.matches(e.value(), user_id, now))
            .count() as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut removed = 0u64;
        self.notifications.retain(|_, n| {
            let keep = !n.is_expired_at(now);
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}
