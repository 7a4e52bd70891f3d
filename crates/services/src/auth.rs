//! # Authentication
//!
//! Registration, login with lockout, bearer-token verification and the
//! token-based flows around them (remember me, email verification, password
//! reset).
//!
//! Raw tokens leave this module exactly once, in the response; the user row
//! only ever holds their SHA-256 digests.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use domains::models::{
    normalize_email, Address, LockState, NewParent, NewStudent, NewTeacher, NewUser, Parent,
    Profile, ProfileKind, PublicUser, Role, SessionClaims, Student, Teacher, TokenKind, User,
};
use domains::ports::{
    Clock, IdSequence, ParentRepository, PasswordHasher, Repositories, StudentRepository,
    TeacherRepository, TokenIssuer, UserRepository,
};
use domains::{AppError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::access::Actor;
use crate::captcha::CaptchaService;
use crate::tokens::{digest, generate_token};
use crate::validation::validate_input;

/// Session lifetimes and whether raw tokens may be echoed back to the client.
#[derive(Debug, Clone, Copy)]
pub struct AuthPolicy {
    pub session_ttl: Duration,
    pub remember_session_ttl: Duration,
    /// Set outside production so flows that would normally send an email can
    /// be exercised without one.
    pub echo_tokens: bool,
}

impl Default for AuthPolicy {
    fn default() -> Self {
        Self {
            session_ttl: Duration::hours(24),
            remember_session_ttl: Duration::days(30),
            echo_tokens: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddressInput {
    #[validate(length(min = 5, message = "Street address required"))]
    pub street: String,
    #[validate(length(min = 2, message = "City required"))]
    pub city: String,
    #[validate(length(min = 2, message = "State required"))]
    pub state: String,
    #[validate(length(min = 3, message = "ZIP code required"))]
    pub zip_code: String,
}

impl From<AddressInput> for Address {
    fn from(input: AddressInput) -> Self {
        Address {
            street: input.street.trim().to_string(),
            city: input.city.trim().to_string(),
            state: input.state.trim().to_string(),
            zip_code: input.zip_code.trim().to_string(),
        }
    }
}

/// Role-specific registration fields. Which ones are required depends on the role.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RoleDataInput {
    #[validate(custom(function = "crate::validation::grade_level"))]
    pub grade: Option<String>,
    pub class: Option<String>,
    pub section: Option<String>,
    #[validate(length(max = 10))]
    pub academic_year: Option<String>,
    pub subject: Option<String>,
    pub qualification: Option<String>,
    pub experience: Option<u32>,
    pub occupation: Option<String>,
}

impl RoleDataInput {
    fn require(value: &Option<String>, field: &str, message: &str) -> Result<String> {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => Ok(v.to_string()),
            _ => Err(AppError::invalid_field(field, message)),
        }
    }

    fn check_for(&self, role: Role) -> Result<()> {
        match role {
            Role::Student => {
                Self::require(&self.grade, "roleData.grade", "Grade is required for students")?;
            }
            Role::Teacher => {
                Self::require(&self.subject, "roleData.subject", "Subject is required for teachers")?;
                Self::require(
                    &self.qualification,
                    "roleData.qualification",
                    "Qualification is required for teachers",
                )?;
            }
            Role::Parent => {
                Self::require(
                    &self.occupation,
                    "roleData.occupation",
                    "Occupation is required for parents",
                )?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 50, message = "First name must be 2-50 characters"))]
    pub first_name: String,
    #[validate(length(min = 2, max = 50, message = "Last name must be 2-50 characters"))]
    pub last_name: String,
    #[validate(email(message = "Valid email required"))]
    pub email: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(
        other = "password",
        message = "Password confirmation does not match password"
    ))]
    pub confirm_password: String,
    #[validate(custom(function = "crate::validation::phone"))]
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub role: Role,
    #[validate(nested)]
    pub address: AddressInput,
    #[serde(default)]
    #[validate(nested)]
    pub role_data: RoleDataInput,
    #[serde(default)]
    #[validate(custom(function = "crate::validation::accepted"))]
    pub terms: bool,
    #[serde(default)]
    pub remember_me: bool,
    pub captcha_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email(message = "Valid email required"))]
    pub email: String,
    #[validate(custom(function = "crate::validation::not_blank", message = "Password required"))]
    pub password: String,
    pub role: Role,
    #[serde(default)]
    pub remember_me: bool,
    pub captcha_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Valid email required"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "crate::validation::not_blank", message = "Reset token required"))]
    pub token: String,
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub password: String,
    #[validate(must_match(
        other = "password",
        message = "Password confirmation does not match password"
    ))]
    pub confirm_password: String,
}

/// A successful register, login or session restore.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    pub user: PublicUser,
    pub token: String,
    pub remember_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_email_verification: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub user: PublicUser,
    pub profile: Option<Profile>,
}

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    students: Arc<dyn StudentRepository>,
    teachers: Arc<dyn TeacherRepository>,
    parents: Arc<dyn ParentRepository>,
    sequences: Arc<dyn IdSequence>,
    hasher: Arc<dyn PasswordHasher>,
    tokens: Arc<dyn TokenIssuer>,
    captcha: Arc<CaptchaService>,
    clock: Arc<dyn Clock>,
    policy: AuthPolicy,
}

impl AuthService {
    pub fn new(
        repos: &Repositories,
        hasher: Arc<dyn PasswordHasher>,
        tokens: Arc<dyn TokenIssuer>,
        captcha: Arc<CaptchaService>,
        clock: Arc<dyn Clock>,
        policy: AuthPolicy,
    ) -> Self {
        Self {
            users: repos.users.clone(),
            students: repos.students.clone(),
            teachers: repos.teachers.clone(),
            parents: repos.parents.clone(),
            sequences: repos.sequences.clone(),
            hasher,
            tokens,
            captcha,
            clock,
            policy,
        }
    }

    pub fn policy(&self) -> AuthPolicy {
        self.policy
    }

    pub async fn register(&self, req: RegisterRequest, remote_ip: Option<String>) -> Result<AuthSession> {
        validate_input(&req)?;
        req.role_data.check_for(req.role)?;
        self.captcha
            .check_token(req.captcha_token.as_deref(), remote_ip)
            .await?;

        let email = normalize_email(&req.email);
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(AppError::Conflict("User with this email already exists".into()));
        }

        let now = self.clock.now();
        let password_hash = self.hasher.hash(&req.password).await?;
        let mut user = User::new(
            NewUser {
                first_name: req.first_name,
                last_name: req.last_name,
                email,
                password_hash,
                phone: req.phone,
                date_of_birth: req.date_of_birth,
                role: req.role,
                address: req.address.into(),
            },
            now,
        );
        user.role_data = serde_json::to_value(&req.role_data)?;
        let verification = self.issue_token(&mut user, TokenKind::EmailVerification, now)?;
        let remember = if req.remember_me {
            Some(self.issue_token(&mut user, TokenKind::Remember, now)?)
        } else {
            None
        };

        let profile = self.build_profile(&user, &req.role_data, now).await?;
        self.users.create_account(&user, &profile).await?;
        info!(user_id = %user.id, role = %user.role, "account registered");
        debug!(user_id = %user.id, token = %verification, "email verification token issued");

        let token = self
            .tokens
            .issue(&SessionClaims::from(&user), self.policy.session_ttl)?;
        Ok(AuthSession {
            requires_email_verification: Some(!user.is_email_verified),
            verification_token: self.echo(verification),
            user: user.to_public(),
            token,
            remember_token: remember,
        })
    }

    async fn build_profile(&self, user: &User, data: &RoleDataInput, now: DateTime<Utc>) -> Result<Profile> {
        let code = self.next_code(ProfileKind::from(user.role), now).await?;
        let text = |v: &Option<String>| v.as_deref().map(str::trim).unwrap_or_default().to_string();
        Ok(match user.role {
            Role::Student => Profile::Student(Student::new(
                NewStudent {
                    user_id: user.id,
                    student_code: code,
                    grade: text(&data.grade),
                    class: data.class.clone(),
                    section: data.section.clone(),
                    academic_year: data
                        .academic_year
                        .clone()
                        .unwrap_or_else(|| now.year().to_string()),
                },
                now,
            )),
            Role::Teacher => {
                let subject = text(&data.subject);
                let mut teacher = Teacher::new(
                    NewTeacher {
                        user_id: user.id,
                        teacher_code: code,
                        department: subject.clone(),
                        qualification: text(&data.qualification),
                        subjects: vec![subject],
                    },
                    now,
                );
                teacher.total_experience = data.experience.unwrap_or(0);
                Profile::Teacher(teacher)
            }
            Role::Parent => Profile::Parent(Parent::new(
                NewParent {
                    user_id: user.id,
                    parent_code: code,
                    occupation: text(&data.occupation),
                },
                now,
            )),
        })
    }

    async fn next_code(&self, kind: ProfileKind, now: DateTime<Utc>) -> Result<String> {
        let year = now.year();
        let seq = self.sequences.next(&kind.sequence_key(year)).await?;
        Ok(kind.code(year, seq))
    }

    pub async fn login(&self, req: LoginRequest, remote_ip: Option<String>) -> Result<AuthSession> {
        validate_input(&req)?;
        self.captcha
            .check_token(req.captcha_token.as_deref(), remote_ip)
            .await?;

        let invalid = || AppError::Unauthorized("Invalid credentials".into());
        let mut user = self
            .users
            .find_by_email(&normalize_email(&req.email))
            .await?
            .filter(|u| u.role == req.role && u.is_active)
            .ok_or_else(invalid)?;

        let now = self.clock.now();
        if let LockState::LockedUntil(until) = user.lock_state(now) {
            warn!(user_id = %user.id, %until, "login refused: account locked");
            return Err(AppError::AccountLocked(until));
        }

        if !self.hasher.verify(&req.password, &user.password_hash).await? {
            let state = user.record_failed_login(now);
            self.users.update(&user).await?;
            if let LockState::LockedUntil(until) = state {
                warn!(user_id = %user.id, attempts = user.login_attempts, %until, "account locked");
            }
            return Err(invalid());
        }

        user.record_successful_login(now);
        let (ttl, remember) = if req.remember_me {
            let raw = self.issue_token(&mut user, TokenKind::Remember, now)?;
            (self.policy.remember_session_ttl, Some(raw))
        } else {
            (self.policy.session_ttl, None)
        };
        self.users.update(&user).await?;
        info!(user_id = %user.id, role = %user.role, "login succeeded");

        let token = self.tokens.issue(&SessionClaims::from(&user), ttl)?;
        Ok(AuthSession {
            user: user.to_public(),
            token,
            remember_token: remember,
            requires_email_verification: None,
            verification_token: None,
        })
    }

    /// Revokes the stored remember token when the caller is known.
    pub async fn logout(&self, actor: Option<&Actor>) -> Result<()> {
        let Some(actor) = actor else {
            return Ok(());
        };
        if let Some(mut user) = self.users.find_by_id(actor.user_id).await? {
            if user.remember_token.is_some() {
                user.clear_token(TokenKind::Remember);
                user.updated_at = self.clock.now();
                self.users.update(&user).await?;
            }
        }
        Ok(())
    }

    /// Trades a remember token for a fresh standard-length session.
    pub async fn restore_session(&self, raw: &str) -> Result<AuthSession> {
        let now = self.clock.now();
        let user = self
            .find_by_live_token(TokenKind::Remember, raw, now)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired remember token".into()))?;

        let token = self
            .tokens
            .issue(&SessionClaims::from(&user), self.policy.session_ttl)?;
        Ok(AuthSession {
            user: user.to_public(),
            token,
            remember_token: None,
            requires_email_verification: None,
            verification_token: None,
        })
    }

    /// Resolves a bearer token to a live, active account.
    pub async fn authenticate(&self, bearer: &str) -> Result<Actor> {
        let claims = self.tokens.verify(bearer)?;
        let user = self
            .users
            .find_by_id(claims.user_id)
            .await?
            .filter(|u| u.is_active)
            .ok_or_else(|| AppError::Unauthorized("User not found or inactive".into()))?;
        Ok(Actor {
            user_id: user.id,
            email: user.email,
            role: user.role,
        })
    }

    pub async fn me(&self, actor: &Actor) -> Result<CurrentUser> {
        let user = self.load_user(actor.user_id).await?;
        let profile = match user.role {
            Role::Student => self.students.find_by_user(user.id).await?.map(Profile::Student),
            Role::Teacher => self.teachers.find_by_user(user.id).await?.map(Profile::Teacher),
            Role::Parent => self.parents.find_by_user(user.id).await?.map(Profile::Parent),
        };
        Ok(CurrentUser {
            user: user.to_public(),
            profile,
        })
    }

    pub async fn verify_email(&self, raw: &str) -> Result<()> {
        let now = self.clock.now();
        let mut user = self
            .find_by_live_token(TokenKind::EmailVerification, raw, now)
            .await?
            .ok_or_else(|| {
                AppError::ValidationError("Invalid or expired verification token".into())
            })?;
        user.is_email_verified = true;
        user.clear_token(TokenKind::EmailVerification);
        user.updated_at = now;
        self.users.update(&user).await?;
        info!(user_id = %user.id, "email verified");
        Ok(())
    }

    /// Returns the new token when echoing is enabled.
    pub async fn resend_verification(&self, actor: &Actor) -> Result<Option<String>> {
        let mut user = self.load_user(actor.user_id).await?;
        if user.is_email_verified {
            return Err(AppError::ValidationError("Email is already verified".into()));
        }
        let now = self.clock.now();
        let raw = self.issue_token(&mut user, TokenKind::EmailVerification, now)?;
        self.users.update(&user).await?;
        debug!(user_id = %user.id, token = %raw, "email verification token reissued");
        Ok(self.echo(raw))
    }

    /// Same outcome whether or not the address is registered.
    pub async fn forgot_password(&self, req: ForgotPasswordRequest) -> Result<Option<String>> {
        validate_input(&req)?;
        let Some(mut user) = self
            .users
            .find_by_email(&normalize_email(&req.email))
            .await?
            .filter(|u| u.is_active)
        else {
            return Ok(None);
        };
        let now = self.clock.now();
        let raw = self.issue_token(&mut user, TokenKind::PasswordReset, now)?;
        self.users.update(&user).await?;
        debug!(user_id = %user.id, token = %raw, "password reset token issued");
        Ok(self.echo(raw))
    }

    pub async fn reset_password(&self, req: ResetPasswordRequest) -> Result<()> {
        validate_input(&req)?;
        let now = self.clock.now();
        let mut user = self
            .find_by_live_token(TokenKind::PasswordReset, &req.token, now)
            .await?
            .ok_or_else(|| AppError::ValidationError("Invalid or expired reset token".into()))?;

        user.password_hash = self.hasher.hash(&req.password).await?;
        user.clear_token(TokenKind::PasswordReset);
        user.login_attempts = 0;
        user.lock_until = None;
        user.updated_at = now;
        self.users.update(&user).await?;
        info!(user_id = %user.id, "password reset");
        Ok(())
    }

    async fn load_user(&self, id: Uuid) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::not_found("User", id))
    }

    async fn find_by_live_token(
        &self,
        kind: TokenKind,
        raw: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let hash = digest(raw.trim());
        Ok(self
            .users
            .find_by_token(kind, &hash)
            .await?
            .filter(|u| u.token_matches(kind, &hash, now)))
    }

    fn issue_token(&self, user: &mut User, kind: TokenKind, now: DateTime<Utc>) -> Result<String> {
        let raw = generate_token()?;
        user.store_token(kind, digest(&raw), now);
        Ok(raw)
    }

    fn echo(&self, raw: String) -> Option<String> {
        self.policy.echo_tokens.then_some(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{mock_repositories, MockSet};
    use chrono::TimeZone;
    use domains::ports::{
        ManualClock, MockCaptchaRenderer, MockCaptchaStore, MockCaptchaVerifier,
        MockPasswordHasher, MockTokenIssuer,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 8, 0, 0).unwrap()
    }

    fn stored_user(role: Role) -> User {
        User::new(
            NewUser {
                first_name: "Grace".into(),
                last_name: "Hopper".into(),
                email: "grace@example.com".into(),
                password_hash: "stored".into(),
                phone: "+15550002".into(),
                date_of_birth: NaiveDate::from_ymd_opt(1990, 12, 9).unwrap(),
                role,
                address: Address {
                    street: "1 Navy Yard".into(),
                    city: "Arlington".into(),
                    state: "VA".into(),
                    zip_code: "22202".into(),
                },
            },
            t0(),
        )
    }

    fn service(mocks: MockSet, hasher: MockPasswordHasher) -> AuthService {
        let clock = Arc::new(ManualClock::new(t0()));
        let captcha = Arc::new(CaptchaService::new(
            Arc::new(MockCaptchaStore::new()),
            Arc::new(MockCaptchaRenderer::new()),
            Arc::new(MockCaptchaVerifier::new()),
            clock.clone(),
        ));
        let mut tokens = MockTokenIssuer::new();
        tokens.expect_issue().returning(|_, _| Ok("jwt".into()));
        AuthService::new(
            &mock_repositories(mocks),
            Arc::new(hasher),
            Arc::new(tokens),
            captcha,
            clock,
            AuthPolicy::default(),
        )
    }

    fn login(role: Role) -> LoginRequest {
        LoginRequest {
            email: "Grace@Example.com".into(),
            password: "secret1".into(),
            role,
            remember_me: false,
            captcha_token: Some("math-captcha-7".into()),
        }
    }

    #[tokio::test]
    async fn wrong_role_is_invalid_credentials() {
        let mut mocks = MockSet::default();
        mocks
            .users
            .expect_find_by_email()
            .withf(|email| email == "grace@example.com")
            .returning(|_| Ok(Some(stored_user(Role::Teacher))));
        let svc = service(mocks, MockPasswordHasher::new());

        let err = svc.login(login(Role::Student), None).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(m) if m == "Invalid credentials"));
    }

    #[tokio::test]
    async fn locked_account_refuses_before_checking_password() {
        let mut mocks = MockSet::default();
        mocks.users.expect_find_by_email().returning(|_| {
            let mut user = stored_user(Role::Student);
            user.login_attempts = 5;
            user.lock_until = Some(t0() + Duration::minutes(10));
            Ok(Some(user))
        });
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().never();
        let svc = service(mocks, hasher);

        let err = svc.login(login(Role::Student), None).await.unwrap_err();
        assert!(matches!(err, AppError::AccountLocked(until) if until == t0() + Duration::minutes(10)));
    }

    #[tokio::test]
    async fn failed_password_is_counted() {
        let mut mocks = MockSet::default();
        mocks
            .users
            .expect_find_by_email()
            .returning(|_| Ok(Some(stored_user(Role::Student))));
        mocks
            .users
            .expect_update()
            .withf(|u| u.login_attempts == 1 && u.lock_until.is_none())
            .times(1)
            .returning(|_| Ok(()));
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().returning(|_, _| Ok(false));
        let svc = service(mocks, hasher);

        assert!(svc.login(login(Role::Student), None).await.is_err());
    }

    #[tokio::test]
    async fn remember_me_stores_only_the_digest() {
        let mut mocks = MockSet::default();
        mocks
            .users
            .expect_find_by_email()
            .returning(|_| Ok(Some(stored_user(Role::Parent))));
        mocks
            .users
            .expect_update()
            .withf(|u| u.remember_token.is_some() && u.login_attempts == 0 && u.last_login.is_some())
            .returning(|_| Ok(()));
        let mut hasher = MockPasswordHasher::new();
        hasher.expect_verify().returning(|_, _| Ok(true));
        let svc = service(mocks, hasher);

        let mut req = login(Role::Parent);
        req.remember_me = true;
        let session = svc.login(req, None).await.unwrap();
        let raw = session.remember_token.unwrap();
        assert_eq!(raw.len(), 64);
        assert_eq!(session.token, "jwt");
    }

    #[tokio::test]
    async fn teacher_registration_requires_subject() {
        let svc = service(MockSet::default(), MockPasswordHasher::new());
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "firstName": "Alan",
            "lastName": "Turing",
            "email": "alan@example.com",
            "password": "enigma42",
            "confirmPassword": "enigma42",
            "phone": "+441234567",
            "dateOfBirth": "1990-06-23",
            "role": "teacher",
            "address": {"street": "Bletchley Park", "city": "Milton Keynes", "state": "BK", "zipCode": "MK3"},
            "roleData": {"qualification": "PhD"},
            "terms": true,
            "captchaToken": "math-captcha-1"
        }))
        .unwrap();

        let AppError::InvalidFields(fields) = svc.register(req, None).await.unwrap_err() else {
            panic!("expected field errors");
        };
        assert_eq!(fields[0].field, "roleData.subject");
    }

    #[tokio::test]
    async fn forgot_password_is_silent_for_unknown_email() {
        let mut mocks = MockSet::default();
        mocks.users.expect_find_by_email().returning(|_| Ok(None));
        let svc = service(mocks, MockPasswordHasher::new());

        let echoed = svc
            .forgot_password(ForgotPasswordRequest {
                email: "nobody@example.com".into(),
            })
            .await
            .unwrap();
        assert_eq!(echoed, None);
    }
}
