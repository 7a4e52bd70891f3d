//! # User
//!
//! Identity, credentials and the login lockout state machine.
//!
//! Lockout: every failed password check increments `login_attempts`; reaching
//! [`MAX_LOGIN_ATTEMPTS`] sets `lock_until = now + LOCKOUT_WINDOW`. While the
//! lock is in force even a correct password is refused. A successful login
//! resets the counter and clears the lock.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::Role;

pub const MAX_LOGIN_ATTEMPTS: u32 = 5;

pub fn lockout_window() -> Duration {
    Duration::minutes(30)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
}

/// The three single-use or long-lived secrets a user can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    EmailVerification,
    PasswordReset,
    Remember,
}

impl TokenKind {
    pub fn ttl(&self) -> Duration {
        match self {
            TokenKind::EmailVerification => Duration::hours(24),
            TokenKind::PasswordReset => Duration::minutes(10),
            TokenKind::Remember => Duration::days(30),
        }
    }
}

/// SHA-256 hex digest of an issued token plus its expiry. The raw token is
/// only ever seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredToken {
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    /// Always stored lowercase.
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub role: Role,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub address: Address,
    #[serde(default)]
    pub role_data: serde_json::Value,
    pub last_login: Option<DateTime<Utc>>,
    pub login_attempts: u32,
    pub lock_until: Option<DateTime<Utc>>,
    pub remember_token: Option<StoredToken>,
    pub email_verification_token: Option<StoredToken>,
    pub password_reset_token: Option<StoredToken>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied at registration, already validated.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub role: Role,
    pub address: Address,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    LockedUntil(DateTime<Utc>),
}

impl User {
    pub fn new(new: NewUser, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::now_v7(),
            first_name: new.first_name.trim().to_string(),
            last_name: new.last_name.trim().to_string(),
            email: normalize_email(&new.email),
            password_hash: new.password_hash,
            phone: new.phone,
            date_of_birth: new.date_of_birth,
            role: new.role,
            is_active: true,
            is_email_verified: false,
            address: new.address,
            role_data: serde_json::Value::Object(Default::default()),
            last_login: None,
            login_attempts: 0,
            lock_until: None,
            remember_token: None,
            email_verification_token: None,
            password_reset_token: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn lock_state(&self, now: DateTime<Utc>) -> LockState {
        match self.lock_until {
            Some(until) if until > now => LockState::LockedUntil(until),
            _ => LockState::Unlocked,
        }
    }

    /// Records a failed password check and returns the resulting lock state.
    ///
    /// The counter is not reset when an old lock lapses, so the first failure
    /// after expiry relocks immediately.
    pub fn record_failed_login(&mut self, now: DateTime<Utc>) -> LockState {
        self.login_attempts = self.login_attempts.saturating_add(1);
        if self.login_attempts >= MAX_LOGIN_ATTEMPTS {
            self.lock_until = Some(now + lockout_window());
        }
        self.updated_at = now;
        self.lock_state(now)
    }

    pub fn record_successful_login(&mut self, now: DateTime<Utc>) {
        self.login_attempts = 0;
        self.lock_until = None;
        self.last_login = Some(now);
        self.updated_at = now;
    }

    fn slot(&mut self, kind: TokenKind) -> &mut Option<StoredToken> {
        match kind {
            TokenKind::EmailVerification => &mut self.email_verification_token,
            TokenKind::PasswordReset => &mut self.password_reset_token,
            TokenKind::Remember => &mut self.remember_token,
        }
    }

    pub fn token(&self, kind: TokenKind) -> Option<&StoredToken> {
        match kind {
            TokenKind::EmailVerification => self.email_verification_token.as_ref(),
            TokenKind::PasswordReset => self.password_reset_token.as_ref(),
            TokenKind::Remember => self.remember_token.as_ref(),
        }
    }

    /// Stores the digest of a freshly issued token, replacing any previous one.
    pub fn store_token(&mut self, kind: TokenKind, hash: String, now: DateTime<Utc>) {
        *self.slot(kind) = Some(StoredToken {
            hash,
            expires_at: now + kind.ttl(),
        });
        self.updated_at = now;
    }

    pub fn clear_token(&mut self, kind: TokenKind) {
        *self.slot(kind) = None;
    }

    /// True when `hash` matches the stored digest and it has not expired.
    pub fn token_matches(&self, kind: TokenKind, hash: &str, now: DateTime<Utc>) -> bool {
        self.token(kind)
            .is_some_and(|t| t.hash == hash && t.expires_at > now)
    }

    pub fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The user as returned over the API: no password hash, no token digests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicUser {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub role: Role,
    pub is_active: bool,
    pub is_email_verified: bool,
    pub address: Address,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            full_name: user.full_name(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            date_of_birth: user.date_of_birth,
            role: user.role,
            is_active: user.is_active,
            is_email_verified: user.is_email_verified,
            address: user.address.clone(),
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

/// What a bearer token asserts about its holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionClaims {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

impl From<&User> for SessionClaims {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// Filters for the user directory listing. Deactivated accounts never match.
#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<Role>,
    /// Case-insensitive substring over first name, last name and email.
    pub search: Option<String>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if !user.is_active {
            return false;
        }
        if let Some(role) = self.role {
            if user.role != role {
                return false;
            }
        }
        match &self.search {
            Some(term) if !term.is_empty() => {
                let term = term.to_lowercase();
                user.first_name.to_lowercase().contains(&term)
                    || user.last_name.to_lowercase().contains(&term)
                    || user.email.contains(&term)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(now: DateTime<Utc>) -> User {
        User::new(
            NewUser {
                first_name: " Ada ".into(),
                last_name: "Lovelace".into(),
                email: "Ada@Example.COM".into(),
                password_hash: "hash".into(),
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
            now,
        )
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn new_user_normalizes_identity() {
        let user = sample(t0());
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.first_name, "Ada");
        assert!(user.is_active);
        assert!(!user.is_email_verified);
    }

    #[test]
    fn fifth_failure_locks_for_thirty_minutes() {
        let now = t0();
        let mut user = sample(now);
        for _ in 0..4 {
            assert_eq!(user.record_failed_login(now), LockState::Unlocked);
        }
        let state = user.record_failed_login(now);
        assert_eq!(state, LockState::LockedUntil(now + Duration::minutes(30)));
        assert_eq!(
            user.lock_state(now + Duration::minutes(29)),
            LockState::LockedUntil(now + Duration::minutes(30))
        );
        assert_eq!(user.lock_state(now + Duration::minutes(30)), LockState::Unlocked);
    }

    #[test]
    fn success_after_expiry_resets_counter() {
        let now = t0();
        let mut user = sample(now);
        for _ in 0..5 {
            user.record_failed_login(now);
        }
        let later = now + Duration::minutes(31);
        user.record_successful_login(later);
        assert_eq!(user.login_attempts, 0);
        assert_eq!(user.lock_until, None);
        assert_eq!(user.last_login, Some(later));
    }

    #[test]
    fn tokens_expire() {
        let now = t0();
        let mut user = sample(now);
        user.store_token(TokenKind::PasswordReset, "digest".into(), now);
        assert!(user.token_matches(TokenKind::PasswordReset, "digest", now + Duration::minutes(9)));
        assert!(!user.token_matches(TokenKind::PasswordReset, "digest", now + Duration::minutes(10)));
        assert!(!user.token_matches(TokenKind::PasswordReset, "other", now));
        assert!(!user.token_matches(TokenKind::Remember, "digest", now));
    }

    #[test]
    fn public_view_hides_credentials() {
        let user = sample(t0());
        let json = serde_json::to_value(user.to_public()).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert_eq!(json["fullName"], "Ada Lovelace");
    }
}
