//! The user directory and self-service account changes.

use std::sync::Arc;

use domains::models::{Page, PageRequest, PublicUser, Role, User, UserFilter};
use domains::ports::{Clock, PasswordHasher, UserRepository};
use domains::{AppError, Result};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::access::Actor;
use crate::validation::validate_input;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub role: Option<Role>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressPatch {
    #[validate(length(min = 5, message = "Street address required"))]
    pub street: Option<String>,
    #[validate(length(min = 2, message = "City required"))]
    pub city: Option<String>,
    #[validate(length(min = 2, message = "State required"))]
    pub state: Option<String>,
    #[validate(length(min = 3, message = "ZIP code required"))]
    pub zip_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, max = 50, message = "First name must be 2-50 characters"))]
    pub first_name: Option<String>,
    #[validate(length(min = 2, max = 50, message = "Last name must be 2-50 characters"))]
    pub last_name: Option<String>,
    #[validate(custom(function = "crate::validation::phone"))]
    pub phone: Option<String>,
    #[validate(nested)]
    pub address: Option<AddressPatch>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(custom(
        function = "crate::validation::not_blank",
        message = "Current password required"
    ))]
    pub current_password: String,
    #[validate(length(min = 6, message = "New password must be at least 6 characters"))]
    pub new_password: String,
    #[validate(must_match(
        other = "new_password",
        message = "Password confirmation does not match new password"
    ))]
    pub confirm_password: String,
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    hasher: Arc<dyn PasswordHasher>,
    clock: Arc<dyn Clock>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        hasher: Arc<dyn PasswordHasher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { users, hasher, clock }
    }

    pub async fn list(&self, query: UserListQuery) -> Result<Page<PublicUser>> {
        let filter = UserFilter {
            role: query.role,
            search: query.search.map(|s| s.trim().to_string()),
        };
        let page = self
            .users
            .list(&filter, PageRequest::new(query.page, query.limit))
            .await?;
        Ok(page.map(|u| u.to_public()))
    }

    pub async fn get(&self, id: Uuid) -> Result<PublicUser> {
        Ok(self.load(id).await?.to_public())
    }

    pub async fn update(&self, actor: &Actor, id: Uuid, req: UpdateUserRequest) -> Result<PublicUser> {
        actor.require_self(id)?;
        validate_input(&req)?;
        let mut user = self.load(id).await?;

        let present = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        if let Some(first) = present(req.first_name) {
            user.first_name = first;
        }
        if let Some(last) = present(req.last_name) {
            user.last_name = last;
        }
        if let Some(phone) = present(req.phone) {
            user.phone = phone;
        }
        if let Some(patch) = req.address {
            let address = &mut user.address;
            if let Some(v) = present(patch.street) {
                address.street = v;
            }
            if let Some(v) = present(patch.city) {
                address.city = v;
            }
            if let Some(v) = present(patch.state) {
                address.state = v;
            }
            if let Some(v) = present(patch.zip_code) {
                address.zip_code = v;
            }
        }
        user.updated_at = self.clock.now();
        self.users.update(&user).await?;
        Ok(user.to_public())
    }

    pub async fn change_password(
        &self,
        actor: &Actor,
        id: Uuid,
        req: ChangePasswordRequest,
    ) -> Result<()> {
        actor.require_self(id)?;
        validate_input(&req)?;
        let mut user = self.load(id).await?;
        if !self
            .hasher
            .verify(&req.current_password, &user.password_hash)
            .await?
        {
            return Err(AppError::ValidationError("Current password is incorrect".into()));
        }
        user.password_hash = self.hasher.hash(&req.new_password).await?;
        user.updated_at = self.clock.now();
        self.users.update(&user).await?;
        info!(user_id = %id, "password changed");
        Ok(())
    }

    /// Soft delete: the row stays, login and bearer tokens stop working.
    pub async fn deactivate(&self, actor: &Actor, id: Uuid) -> Result<()> {
        actor.require_self(id)?;
        let mut user = self.load(id).await?;
        user.is_active = false;
        user.updated_at = self.clock.now();
        self.users.update(&user).await?;
        info!(user_id = %id, "account deactivated");
        Ok(())
    }

    async fn load(&self, id: Uuid) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use domains::models::{Address, NewUser};
    use domains::ports::{MockPasswordHasher, MockUserRepository, SystemClock};

    fn user() -> User {
        User::new(
            NewUser {
                first_name: "Ada".into(),
                last_name: "Lovelace".into(),
                email: "ada@example.com".into(),
                password_hash: "old".into(),
                phone: "+15550001".into(),
                date_of_birth: NaiveDate::from_ymd_opt(2010, 5, 1).unwrap(),
                role: Role::Student,
                address: Address {
                    street: "12 Main Street".into(),
                    city: "Springfield".into(),
                    state: "IL".into(),
                    zip_code: "62701".into(),
                },
            },
            Utc::now(),
        )
    }

    fn actor_for(user: &User) -> Actor {
        Actor {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }

    #[tokio::test]
    async fn only_the_owner_may_update() {
        let svc = UserService::new(
            Arc::new(MockUserRepository::new()),
            Arc::new(MockPasswordHasher::new()),
            Arc::new(SystemClock),
        );
        let stranger = actor_for(&user());
        let err = svc
            .update(&stranger, Uuid::now_v7(), UpdateUserRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn address_patch_merges_fields() {
        let existing = user();
        let actor = actor_for(&existing);
        let mut repo = MockUserRepository::new();
        let stored = existing.clone();
        repo.expect_find_by_id().returning(move |_| Ok(Some(stored.clone())));
        repo.expect_update()
            .withf(|u| u.address.city == "Shelbyville" && u.address.street == "12 Main Street")
            .times(1)
            .returning(|_| Ok(()));
        let svc = UserService::new(
            Arc::new(repo),
            Arc::new(MockPasswordHasher::new()),
            Arc::new(SystemClock),
        );

        let req = UpdateUserRequest {
            address: Some(AddressPatch {
                city: Some("Shelbyville".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = svc.update(&actor, existing.id, req).await.unwrap();
        assert_eq!(updated.address.zip_code, "62701");
    }

    #[tokio::test]
    async fn wrong_current_password_is_rejected() {
        let existing = user();
        let actor = actor_for(&existing);
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_id()
            .returning(move |_| Ok(Some(existing.clone())));
        repo.expect_update().never();
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().returning(|_, _| Ok(false));
        let svc = UserService::new(Arc::new(repo), Arc::new(hasher), Arc::new(SystemClock));

        let err = svc
            .change_password(
                &actor,
                actor.user_id,
                ChangePasswordRequest {
                    current_password: "nope".into(),
                    new_password: "newpass1".into(),
                    confirm_password: "newpass1".into(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(m) if m == "Current password is incorrect"));
    }
}
