use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domains::models::{Notification, NotificationQuery, Page, PageRequest};
use domains::ports::NotificationRepository;
use domains::{AppError, Result};
use sqlx::types::Json;
use uuid::Uuid;

use super::{db_err, doc, enum_str, page_sql, paged, write_err, PgStore};

/// Containment filter matching a recipient entry, optionally unread only.
fn recipient_filter(user_id: Uuid, unread_only: bool) -> serde_json::Value {
    let mut entry = serde_json::json!({ "userId": user_id });
    if unread_only {
        entry["read"] = serde_json::Value::Bool(false);
    }
    serde_json::json!([entry])
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert(&self, notification: &Notification) -> Result<()> {
        sqlx::query(
            "INSERT INTO notifications (id, created_at, expires_at, is_active, doc)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(notification.id)
        .bind(notification.created_at)
        .bind(notification.expires_at)
        .bind(notification.is_active)
        .bind(Json(notification))
        .execute(&self.pool)
        .await
        .map_err(write_err("Notification already exists"))?;
        Ok(())
    }

    async fn update(&self, notification: &Notification) -> Result<()> {
        let done = sqlx::query(
            "UPDATE notifications SET expires_at = $2, is_active = $3, doc = $4 WHERE id = $1",
        )
        .bind(notification.id)
        .bind(notification.expires_at)
        .bind(notification.is_active)
        .bind(Json(notification))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if done.rows_affected() == 0 {
            return Err(AppError::not_found("Notification", notification.id));
        }
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>> {
        let row = sqlx::query("SELECT doc FROM notifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.as_ref().map(doc).transpose()
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: NotificationQuery,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> Result<Page<Notification>> {
        let kind = query.kind.as_ref().map(enum_str).transpose()?;
        let sql = page_sql(
            "SELECT doc, created_at FROM notifications
             WHERE is_active
               AND (expires_at IS NULL OR expires_at > $2)
               AND doc->'recipients' @> $1
               AND ($3::text IS NULL OR doc->>'type' = $3)",
            "created_at DESC",
            4,
        );
        let row = sqlx::query(&sql)
            .bind(recipient_filter(user_id, query.unread_only))
            .bind(now)
            .bind(kind)
            .bind(page.limit as i64)
            .bind(page.offset() as i64)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        paged(&row, page)
    }

    async fn count_unread(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications
             WHERE is_active
               AND (expires_at IS NULL OR expires_at > $2)
               AND doc->'recipients' @> $1",
        )
        .bind(recipient_filter(user_id, true))
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count as u64)
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let done = sqlx::query("DELETE FROM notifications WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(done.rows_affected())
    }
}
