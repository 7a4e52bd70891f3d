//! Profile responses joined with the owning user's public fields.

use std::collections::HashMap;

use domains::models::{Page, PublicUser, User};
use domains::ports::UserRepository;
use domains::Result;
use serde::Serialize;
use uuid::Uuid;

/// A profile with its account inlined under `user`.
#[derive(Debug, Clone, Serialize)]
pub struct WithUser<T> {
    #[serde(flatten)]
    pub profile: T,
    pub user: Option<PublicUser>,
}

/// One batched user lookup for the whole slice.
pub(crate) async fn attach_users<T>(
    users: &dyn UserRepository,
    items: Vec<T>,
    user_of: impl Fn(&T) -> Uuid,
) -> Result<Vec<WithUser<T>>> {
    let ids: Vec<Uuid> = items.iter().map(&user_of).collect();
    let found: HashMap<Uuid, User> = users
        .find_by_ids(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id, u))
        .collect();
    Ok(items
        .into_iter()
        .map(|profile| {
            let user = found.get(&user_of(&profile)).map(User::to_public);
            WithUser { profile, user }
        })
        .collect())
}

pub(crate) async fn attach_user<T>(
    users: &dyn UserRepository,
    profile: T,
    user_id: Uuid,
) -> Result<WithUser<T>> {
    let user = users.find_by_id(user_id).await?.map(|u| u.to_public());
    Ok(WithUser { profile, user })
}

pub(crate) async fn attach_users_page<T>(
    users: &dyn UserRepository,
    page: Page<T>,
    user_of: impl Fn(&T) -> Uuid,
) -> Result<Page<WithUser<T>>> {
    let Page {
        items,
        total,
        current_page,
        total_pages,
    } = page;
    Ok(Page {
        items: attach_users(users, items, user_of).await?,
        total,
        current_page,
        total_pages,
    })
}
