//! # Notification
//!
//! A notification fans out to many recipients, each with independent read
//! state. Listings hide inactive and expired notifications and return only the
//! caller's own `read` / `readAt`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    Announcement,
    Assignment,
    Exam,
    Fee,
    Attendance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelatedKind {
    Assignment,
    Exam,
    Fee,
    Attendance,
    Result,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedTo {
    #[serde(rename = "type")]
    pub kind: RelatedKind,
    pub id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub user_id: Uuid,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub recipients: Vec<Recipient>,
    pub related_to: Option<RelatedTo>,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for [`Notification::new`]; recipients are user ids.
#[derive(Debug, Clone, Default)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub kind: NotificationType,
    pub recipients: Vec<Uuid>,
    pub related_to: Option<RelatedTo>,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
}

impl Notification {
    pub fn new(new: NewNotification, now: DateTime<Utc>) -> Self {
        let mut recipients: Vec<Recipient> = Vec::with_capacity(new.recipients.len());
        for user_id in new.recipients {
            if !recipients.iter().any(|r| r.user_id == user_id) {
                recipients.push(Recipient {
                    user_id,
                    read: false,
                    read_at: None,
                });
            }
        }
        Self {
            id: Uuid::now_v7(),
            title: new.title,
            message: new.message,
            kind: new.kind,
            recipients,
            related_to: new.related_to,
            priority: new.priority,
            action_url: new.action_url,
            expires_at: new.expires_at,
            created_by: new.created_by,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Active and not past `expires_at`.
    pub fn is_visible_at(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at.map_or(true, |exp| exp > now)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    pub fn recipient(&self, user_id: Uuid) -> Option<&Recipient> {
        self.recipients.iter().find(|r| r.user_id == user_id)
    }

    pub fn is_unread_by(&self, user_id: Uuid) -> bool {
        self.recipient(user_id).is_some_and(|r| !r.read)
    }

    /// Marks the user's copy read. Returns `true` only when state changed;
    /// a repeat call keeps the first `read_at`.
    pub fn mark_read(&mut self, user_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.recipients.iter_mut().find(|r| r.user_id == user_id) {
            Some(r) if !r.read => {
                r.read = true;
                r.read_at = Some(now);
                self.updated_at = now;
                true
            }
            _ => false,
        }
    }

    /// The notification as `user_id` sees it, or `None` if not a recipient.
    pub fn view_for(&self, user_id: Uuid) -> Option<NotificationView> {
        let recipient = self.recipient(user_id)?;
        Some(NotificationView {
            id: self.id,
            title: self.title.clone(),
            message: self.message.clone(),
            kind: self.kind,
            related_to: self.related_to.clone(),
            priority: self.priority,
            action_url: self.action_url.clone(),
            expires_at: self.expires_at,
            created_by: self.created_by,
            created_at: self.created_at,
            read: recipient.read,
            read_at: recipient.read_at,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationView {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub related_to: Option<RelatedTo>,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

/// Listing filters for one user's inbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationQuery {
    pub unread_only: bool,
    pub kind: Option<NotificationType>,
}

impl NotificationQuery {
    /// Full inbox predicate: addressed to the user, visible now, and matching
    /// the optional filters.
    pub fn matches(&self, n: &Notification, user_id: Uuid, now: DateTime<Utc>) -> bool {
        let Some(recipient) = n.recipient(user_id) else {
            return false;
        };
        n.is_visible_at(now)
            && (!self.unread_only || !recipient.read)
            && self.kind.map_or(true, |k| n.kind == k)
    }
}
