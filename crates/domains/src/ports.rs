//! # Ports
//!
//! Every adapter implements one of these traits. Services hold them as
//! `Arc<dyn Trait>`, so the binary can swap in-memory, Postgres or Redis
//! backends without touching business logic.
//!
//! Repositories persist whole aggregates: embedded lists (submissions,
//! attendance records, exam entries, recipients) travel with their parent.
//! Unique-key violations surface as [`AppError::Conflict`](crate::error::AppError).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Assignment, AssignmentStatus, AttendanceKey, AttendanceSheet, CaptchaChallenge, CaptchaImage,
    Notification, NotificationQuery, Page, PageRequest, Parent, ParentFilter, Profile, ResultKey,
    ResultRecord, SessionClaims, Student, StudentFilter, Subject, Teacher, TeacherFilter, Term,
    TokenKind, User, UserFilter,
};

// ── Persistence ──────────────────────────────────────────────────────────────

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Inserts the user and their role profile together; neither is stored
    /// if either write fails. Duplicate email is a conflict.
    async fn create_account(&self, user: &User, profile: &Profile) -> Result<()>;
    async fn update(&self, user: &User) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<User>>;
    /// `email` must already be normalized.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    /// Looks up by stored token digest; expiry is checked by the caller.
    async fn find_by_token(&self, kind: TokenKind, hash: &str) -> Result<Option<User>>;
    /// Active users matching the filter, newest first.
    async fn list(&self, filter: &UserFilter, page: PageRequest) -> Result<Page<User>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn update(&self, student: &Student) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Student>>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Student>>;
    async fn find_by_code(&self, code: &str) -> Result<Option<Student>>;
    /// Ordered by student code.
    async fn list(&self, filter: &StudentFilter, page: PageRequest) -> Result<Page<Student>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TeacherRepository: Send + Sync {
    async fn update(&self, teacher: &Teacher) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Teacher>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Teacher>>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Teacher>>;
    /// Ordered by teacher code.
    async fn list(&self, filter: &TeacherFilter, page: PageRequest) -> Result<Page<Teacher>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ParentRepository: Send + Sync {
    async fn update(&self, parent: &Parent) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Parent>>;
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<Parent>>;
    /// Ordered by parent code.
    async fn list(&self, filter: &ParentFilter, page: PageRequest) -> Result<Page<Parent>>;
    /// Active parents linked to the student.
    async fn find_by_student(&self, student_id: Uuid) -> Result<Vec<Parent>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Duplicate (code, academic year) is a conflict.
    async fn insert(&self, subject: &Subject) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Subject>>;
    async fn find_by_ids(&self, ids: &[Uuid]) -> Result<Vec<Subject>>;
    /// Active subjects for a grade in one academic year, ordered by name.
    async fn list_by_grade(&self, grade: &str, academic_year: &str) -> Result<Vec<Subject>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    async fn insert(&self, assignment: &Assignment) -> Result<()>;
    async fn update(&self, assignment: &Assignment) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Assignment>>;
    /// Ordered by due date.
    async fn list_by_class(
        &self,
        class: &str,
        status: Option<AssignmentStatus>,
    ) -> Result<Vec<Assignment>>;
}

/// Which sheets a student summary reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceScope {
    pub student_id: Uuid,
    pub class: String,
    pub academic_year: Option<String>,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait AttendanceRepository: Send + Sync {
    async fn find_by_key(&self, key: &AttendanceKey) -> Result<Option<AttendanceSheet>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<AttendanceSheet>>;
    /// Inserts or replaces by id. A second sheet with the same key is a conflict.
    async fn save(&self, sheet: &AttendanceSheet) -> Result<()>;
    /// Sheets in scope that contain a record for the student.
    async fn list_for_student(&self, scope: &AttendanceScope) -> Result<Vec<AttendanceSheet>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn find_by_key(&self, key: &ResultKey) -> Result<Option<ResultRecord>>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<ResultRecord>>;
    /// Inserts or replaces by id. A second record with the same key is a conflict.
    async fn save(&self, record: &ResultRecord) -> Result<()>;
    async fn list_for_student(&self, student_id: Uuid) -> Result<Vec<ResultRecord>>;
    async fn list_published_for_class(
        &self,
        class: &str,
        academic_year: &str,
        term: Term,
    ) -> Result<Vec<ResultRecord>>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<()>;
    async fn update(&self, notification: &Notification) -> Result<()>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Notification>>;
    /// Visible notifications addressed to the user, newest first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        query: NotificationQuery,
        page: PageRequest,
        now: DateTime<Utc>,
    ) -> Result<Page<Notification>>;
    /// Visible notifications the user has not read.
    async fn count_unread(&self, user_id: Uuid, now: DateTime<Utc>) -> Result<u64>;
    /// Deletes notifications whose expiry has passed; returns how many.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Atomic named counters for human-readable profile codes.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdSequence: Send + Sync {
    /// Increments and returns the counter; the first call for a key yields 1.
    async fn next(&self, key: &str) -> Result<u64>;
}

/// Every repository the services need, bundled for wiring.
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub students: Arc<dyn StudentRepository>,
    pub teachers: Arc<dyn TeacherRepository>,
    pub parents: Arc<dyn ParentRepository>,
    pub subjects: Arc<dyn SubjectRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub attendance: Arc<dyn AttendanceRepository>,
    pub results: Arc<dyn ResultRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub sequences: Arc<dyn IdSequence>,
}

// ── Credentials ──────────────────────────────────────────────────────────────

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, password: &str) -> Result<String>;
    /// `Ok(false)` on mismatch; `Err` only when the stored hash is unusable.
    async fn verify(&self, password: &str, hash: &str) -> Result<bool>;
}

/// Signs and checks bearer tokens.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, claims: &SessionClaims, ttl: Duration) -> Result<String>;
    /// Rejects bad signatures and expired tokens with `Unauthorized`.
    fn verify(&self, token: &str) -> Result<SessionClaims>;
}

// ── Captcha ──────────────────────────────────────────────────────────────────

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CaptchaStore: Send + Sync {
    async fn put(&self, challenge: CaptchaChallenge) -> Result<()>;
    /// Removes and returns the challenge: each id can be checked once.
    async fn take(&self, id: &str) -> Result<Option<CaptchaChallenge>>;
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait CaptchaRenderer: Send + Sync {
    /// Draws `text` with noise derived from `seed`; equal inputs give equal images.
    fn render(&self, text: &str, seed: u64) -> Result<CaptchaImage>;
}

/// Third-party human verification (reCAPTCHA `siteverify`).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait CaptchaVerifier: Send + Sync {
    async fn verify(&self, token: &str, remote_ip: Option<String>) -> Result<bool>;
}

// ── Rate limiting ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Seconds until the oldest hit leaves the window; 0 when allowed.
    pub retry_after_secs: u64,
}

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Records one hit for `key` and decides against a sliding window.
    async fn hit(&self, key: &str, limit: u32, window: std::time::Duration) -> Result<RateDecision>;
}

// ── Time ─────────────────────────────────────────────────────────────────────

#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = to;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
